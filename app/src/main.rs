use std::path::PathBuf;

use clap::{Parser, Subcommand};
use common::config::Config;
use eyre::Result;
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod report;

const MODULES: &[&str] = &["common", "fio", "fio_basic"];

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[arg(short, long)]
    log: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate every experiment and render its charts (default)
    Plot {
        /// YAML experiment table, the built-in table is used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory for charts and summary files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the aggregated statistics without rendering
    Summary {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the built-in experiment table as YAML
    DefaultConfig,
}

fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("fio_report={log_level}"));
    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }
    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking))
        .init();

    let command = args.command.unwrap_or(Commands::Plot {
        config: None,
        output_dir: None,
    });
    if let Err(err) = run(command) {
        error!("{err:#?}");
        return Err(err);
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(&path),
        None => Ok(Config::default()),
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Plot { config, output_dir } => {
            let mut config = load_config(config)?;
            if let Some(output_dir) = output_dir {
                config.settings.output_dir = output_dir;
            }
            let reports = report::run_report(&config, true)?;
            report::write_outputs(&config.settings, &reports)?;
        }
        Commands::Summary { config } => {
            let config = load_config(config)?;
            let reports = report::run_report(&config, false)?;
            print!("{}", report::format_summary(&reports));
        }
        Commands::DefaultConfig => print!("{}", Config::default().to_yaml()?),
    }
    Ok(())
}
