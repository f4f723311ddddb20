use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

pub const BLOCK_SIZE_ORDER: &[&str] = &[
    "1k", "2k", "4k", "8k", "16k", "32k", "64k", "128k", "256k", "512k", "1m",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    pub experiments: Vec<ExperimentSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory that receives the charts and summary files
    pub output_dir: PathBuf,
    /// Dump the aggregated statistics behind each chart into `plot_data/`
    pub write_plot_data: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            write_plot_data: true,
        }
    }
}

/// One experiment of the report: where its result files live and how the
/// independent variable is recovered from their filenames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub label: String,
    pub filename_prefix: String,
    pub source_directory: PathBuf,
    pub variable: Option<Variable>,
    /// Fixed upper bound of the bandwidth axis, in KB/s
    pub y_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub kind: ParamKind,
    /// Canonical group order, groups not listed here are placed after it
    pub order: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Numeric,
    IntegerCount,
    TextLabel,
}

impl Variable {
    pub fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            order: None,
        }
    }

    pub fn with_order(mut self, order: &[&str]) -> Self {
        self.order = Some(order.iter().map(|x| x.to_string()).collect());
        self
    }

    /// `write_percentage` -> `Write percentage`
    pub fn axis_label(&self) -> String {
        let spaced = self.name.replace('_', " ");
        let mut chars = spaced.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl ExperimentSpec {
    pub fn new(
        label: &str,
        filename_prefix: &str,
        source_directory: &str,
        variable: Option<Variable>,
        y_max: f64,
    ) -> Self {
        Self {
            label: label.to_owned(),
            filename_prefix: filename_prefix.to_owned(),
            source_directory: PathBuf::from(source_directory),
            variable,
            y_max,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let write_percentage = Variable::new("write_percentage", ParamKind::Numeric);
        Self {
            settings: Settings::default(),
            experiments: vec![
                ExperimentSpec::new(
                    "Ex1 seq",
                    "Exo1_seq",
                    "./fio_results_Exo1",
                    Some(write_percentage.clone()),
                    3e5,
                ),
                ExperimentSpec::new(
                    "Ex1 rand",
                    "Exo1_rand",
                    "./fio_results_Exo1",
                    Some(write_percentage),
                    3e5,
                ),
                ExperimentSpec::new(
                    "Ex2 bs",
                    "Exo2_bs",
                    "./fio_results_Exo2",
                    Some(
                        Variable::new("blocksize", ParamKind::TextLabel)
                            .with_order(BLOCK_SIZE_ORDER),
                    ),
                    1.2e6,
                ),
                ExperimentSpec::new("Ex3 bssplit", "Exo3_bssplit", "./fio_results_Exo3", None, 2e5),
                ExperimentSpec::new(
                    "Ex4 parallel",
                    "Exo4_parallel",
                    "./fio_results_Exo4",
                    Some(Variable::new("numjobs", ParamKind::IntegerCount)),
                    2e5,
                ),
            ],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            read_to_string(path).wrap_err(format!("Reading config file {}", path.display()))?;
        serde_yml::from_str(&contents).wrap_err(format!("Parsing config file {}", path.display()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self).context("Serialize config")
    }
}
