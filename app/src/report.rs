use std::{fs::write, path::PathBuf};

use common::{
    config::{Config, ExperimentSpec, Settings},
    util::{Summary, ensure_dirs},
};
use eyre::{Context, Result};
use fio_basic::{
    render_experiment,
    stats::{AggregatedStats, aggregate},
};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub spec: ExperimentSpec,
    pub stats: AggregatedStats,
    pub charts: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub experiment: String,
    pub group: String,
    pub metric: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
}

/// Runs every experiment to completion before starting the next one. The
/// first failing experiment aborts the whole run.
pub fn run_report(config: &Config, render: bool) -> Result<Vec<ExperimentReport>> {
    let output_dir = &config.settings.output_dir;
    if render {
        ensure_dirs(&[output_dir.clone()])?;
    }

    config
        .experiments
        .iter()
        .map(|spec| {
            info!("Processing {}", spec.label);
            let records =
                fio::extract(spec).wrap_err(format!("Extract results for {}", spec.label))?;
            debug!("{} records for {}", records.len(), spec.label);
            let stats = aggregate(&records, spec.variable.as_ref());
            let charts = if render {
                render_experiment(&stats, spec, output_dir)?
            } else {
                Vec::new()
            };
            Ok(ExperimentReport {
                spec: spec.clone(),
                stats,
                charts,
            })
        })
        .collect()
}

pub fn summary_rows(reports: &[ExperimentReport]) -> Vec<SummaryRow> {
    let row = |report: &ExperimentReport, group: String, metric: String, count, s: &Summary| {
        SummaryRow {
            experiment: report.spec.label.clone(),
            group,
            metric,
            count,
            mean: s.mean,
            std: s.std,
            median: s.median,
        }
    };

    let mut rows = Vec::new();
    for report in reports {
        for group in &report.stats.groups {
            for (metric, s) in [
                ("write_bw", &group.write),
                ("read_bw", &group.read),
                ("total_bw", &group.total),
            ] {
                rows.push(row(report, group.label(), metric.to_owned(), group.count, s));
            }
        }
        let count = report.stats.groups.iter().map(|x| x.count).sum();
        for p in report.stats.latency.iter().flatten() {
            let metric = format!("latency_p{}", fio::ParamValue::Numeric(p.percentile));
            rows.push(row(report, String::new(), metric, count, &p.latency));
        }
    }
    rows
}

/// `plot_data/<label>.json` per experiment and a `summary.csv` over all of them
pub fn write_outputs(settings: &Settings, reports: &[ExperimentReport]) -> Result<()> {
    if settings.write_plot_data {
        let plot_data_dir = settings.output_dir.join("plot_data");
        ensure_dirs(&[plot_data_dir.clone()])?;
        for report in reports {
            let path = plot_data_dir.join(format!("{}.json", report.spec.label));
            write(&path, serde_json::to_string_pretty(&report.stats)?)
                .wrap_err(format!("Write {}", path.display()))?;
        }
    }

    let path = settings.output_dir.join("summary.csv");
    let mut writer =
        csv::Writer::from_path(&path).wrap_err(format!("Create {}", path.display()))?;
    for row in summary_rows(reports) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn format_summary(reports: &[ExperimentReport]) -> String {
    let mut out = format!(
        "{:<14} {:>8} {:<14} {:>5} {:>14} {:>14} {:>14}\n",
        "experiment", "group", "metric", "count", "mean", "std", "median"
    );
    for row in summary_rows(reports) {
        out.push_str(&format!(
            "{:<14} {:>8} {:<14} {:>5} {:>14.1} {:>14.1} {:>14.1}\n",
            row.experiment, row.group, row.metric, row.count, row.mean, row.std, row.median
        ));
    }
    out
}
