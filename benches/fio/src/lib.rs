use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
    fs::{read_dir, read_to_string},
    path::{Path, PathBuf},
};

use common::config::{ExperimentSpec, ParamKind};
use itertools::Itertools;
use regex::Regex;
use result::FioResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};


pub const RESULT_SUFFIX: &str = "_output.json";
/// Position of the varying parameter in `_` separated result filenames
pub const PARAM_TOKEN: usize = 2;
pub const RETAINED_PERCENTILES: [f64; 10] =
    [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 99.99];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Schema mismatch in {path}: {reason}")]
    SchemaMismatch { path: PathBuf, reason: String },
    #[error("Malformed filename {filename}: {reason}")]
    MalformedFilename { filename: String, reason: String },
    #[error("Invalid result file pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Numeric(f64),
    Count(u64),
    Label(String),
}

impl ParamValue {
    pub fn parse(token: &str, kind: ParamKind) -> Result<Self, String> {
        match kind {
            ParamKind::Numeric => match token.parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(ParamValue::Numeric(x)),
                Ok(_) => Err(format!("{token:?} is not a finite number")),
                Err(e) => Err(format!("{token:?} is not a number: {e}")),
            },
            ParamKind::IntegerCount => token
                .parse::<u64>()
                .map(ParamValue::Count)
                .map_err(|e| format!("{token:?} is not a count: {e}")),
            ParamKind::TextLabel => Ok(ParamValue::Label(token.to_owned())),
        }
    }

    /// Numbers ascending, labels lexicographic
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ParamValue::Numeric(a), ParamValue::Numeric(b)) => a.total_cmp(b),
            (ParamValue::Count(a), ParamValue::Count(b)) => a.cmp(b),
            (ParamValue::Label(a), ParamValue::Label(b)) => a.cmp(b),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Numeric(x) if x.fract() == 0.0 => write!(f, "{x:.1}"),
            ParamValue::Numeric(x) => write!(f, "{x}"),
            ParamValue::Count(x) => write!(f, "{x}"),
            ParamValue::Label(x) => f.write_str(x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileLatency {
    pub percentile: f64,
    pub latency_ns: f64,
}

/// One trial. `param` is set for experiments with a varying parameter,
/// `latency` for those without.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub param: Option<ParamValue>,
    pub write_bw: f64,
    pub read_bw: f64,
    pub latency: Option<Vec<PercentileLatency>>,
}

impl Record {
    pub fn total_bw(&self) -> f64 {
        self.write_bw + self.read_bw
    }
}

/// Result files of the experiment, sorted by filename
pub fn select_result_files(spec: &ExperimentSpec) -> Result<Vec<PathBuf>, ExtractError> {
    let dir = &spec.source_directory;
    let io_err = |source| ExtractError::Io {
        path: dir.clone(),
        source,
    };
    let pattern = Regex::new(&format!(
        "^{}.*{}$",
        regex::escape(&spec.filename_prefix),
        regex::escape(RESULT_SUFFIX)
    ))?;

    let mut files = Vec::new();
    for entry in read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if pattern.is_match(&entry.file_name().to_string_lossy()) {
            files.push(entry.path());
        }
    }
    Ok(files.into_iter().sorted().collect())
}

pub fn parse_filename_param(filename: &str, kind: ParamKind) -> Result<ParamValue, ExtractError> {
    let malformed = |reason: String| ExtractError::MalformedFilename {
        filename: filename.to_owned(),
        reason,
    };
    let token = filename.split('_').nth(PARAM_TOKEN).ok_or_else(|| {
        malformed(format!(
            "expected at least {} '_' separated tokens",
            PARAM_TOKEN + 1
        ))
    })?;
    ParamValue::parse(token, kind).map_err(malformed)
}

/// Keeps the ten deciles (plus 99.99) out of fio's percentile map, in order.
/// Retained percentiles fio did not report are left out.
pub fn retain_percentiles(percentiles: &BTreeMap<String, f64>) -> Vec<PercentileLatency> {
    let parsed = percentiles
        .iter()
        .filter_map(|(k, v)| k.trim().parse::<f64>().ok().map(|k| (k, *v)))
        .collect::<Vec<_>>();
    RETAINED_PERCENTILES
        .iter()
        .filter_map(|p| {
            parsed
                .iter()
                .find(|(k, _)| (k - p).abs() < 1e-6)
                .map(|(_, v)| PercentileLatency {
                    percentile: *p,
                    latency_ns: *v,
                })
        })
        .collect()
}

fn read_result(path: &Path) -> Result<FioResult, ExtractError> {
    let contents = read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|e| ExtractError::SchemaMismatch {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub fn extract_record(path: &Path, spec: &ExperimentSpec) -> Result<Record, ExtractError> {
    let result = read_result(path)?;
    let mismatch = |reason: &str| ExtractError::SchemaMismatch {
        path: path.to_path_buf(),
        reason: reason.to_owned(),
    };
    let job = result.jobs.first().ok_or_else(|| mismatch("no jobs"))?;

    let (param, latency) = match &spec.variable {
        Some(variable) => {
            let filename = path
                .file_name()
                .map(|x| x.to_string_lossy().into_owned())
                .unwrap_or_default();
            (Some(parse_filename_param(&filename, variable.kind)?), None)
        }
        None => {
            let percentiles = job
                .write
                .clat_ns
                .as_ref()
                .and_then(|x| x.percentile.as_ref())
                .ok_or_else(|| mismatch("missing write.clat_ns.percentile"))?;
            let retained = retain_percentiles(percentiles);
            if retained.len() < RETAINED_PERCENTILES.len() {
                debug!(
                    "{} reports {} of {} retained percentiles",
                    path.display(),
                    retained.len(),
                    RETAINED_PERCENTILES.len()
                );
            }
            (None, Some(retained))
        }
    };

    Ok(Record {
        param,
        write_bw: job.write.bw,
        read_bw: job.read.bw,
        latency,
    })
}

/// Reads every result file of the experiment into a record
pub fn extract(spec: &ExperimentSpec) -> Result<Vec<Record>, ExtractError> {
    let files = select_result_files(spec)?;
    if files.is_empty() {
        warn!(
            "No {}*{} files in {}",
            spec.filename_prefix,
            RESULT_SUFFIX,
            spec.source_directory.display()
        );
    }
    files
        .iter()
        .map(|path| {
            debug!("Extracting {}", path.display());
            extract_record(path, spec)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::Variable;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs::write;

    fn fio_json(write_bw: f64, read_bw: f64) -> serde_json::Value {
        json!({
            "fio version": "fio-3.36",
            "jobs": [{
                "jobname": "test",
                "read": { "bw": read_bw, "iops": 10.0 },
                "write": {
                    "bw": write_bw,
                    "clat_ns": {
                        "min": 100, "max": 9000, "mean": 500.5, "stddev": 12.0, "N": 40,
                        "percentile": {
                            "1.000000": 1, "5.000000": 5, "10.000000": 10, "20.000000": 20,
                            "30.000000": 30, "40.000000": 40, "50.000000": 50,
                            "60.000000": 60, "70.000000": 70, "80.000000": 80,
                            "90.000000": 90, "95.000000": 95, "99.000000": 99,
                            "99.500000": 995, "99.900000": 999, "99.950000": 9995,
                            "99.990000": 9999
                        }
                    }
                }
            }]
        })
    }

    fn spec(dir: &Path, prefix: &str, variable: Option<Variable>) -> ExperimentSpec {
        ExperimentSpec {
            label: "test".to_owned(),
            filename_prefix: prefix.to_owned(),
            source_directory: dir.to_path_buf(),
            variable,
            y_max: 1.0,
        }
    }

    #[test]
    fn selects_only_prefixed_result_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "Exo1_seq_25_output.json",
            "Exo1_seq_75_output.json",
            "Exo1_rand_25_output.json",
            "Exo1_seq_25_output.log",
            "notes.txt",
        ] {
            write(dir.path().join(name), "{}").unwrap();
        }
        let files = select_result_files(&spec(dir.path(), "Exo1_seq", None)).unwrap();
        let names = files
            .iter()
            .map(|x| x.file_name().unwrap().to_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, ["Exo1_seq_25_output.json", "Exo1_seq_75_output.json"]);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract(&spec(&dir.path().join("absent"), "Exo1", None)).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn filename_params_follow_kind() {
        assert_eq!(
            parse_filename_param("Exo1_seq_25_output.json", ParamKind::Numeric).unwrap(),
            ParamValue::Numeric(25.0)
        );
        assert_eq!(
            parse_filename_param("Exo4_parallel_8_output.json", ParamKind::IntegerCount).unwrap(),
            ParamValue::Count(8)
        );
        assert_eq!(
            parse_filename_param("Exo2_bs_128k_output.json", ParamKind::TextLabel).unwrap(),
            ParamValue::Label("128k".to_owned())
        );
        assert!(matches!(
            parse_filename_param("Exo4_parallel_many_output.json", ParamKind::IntegerCount),
            Err(ExtractError::MalformedFilename { .. })
        ));
        assert!(matches!(
            parse_filename_param("Exo4_output.json", ParamKind::Numeric),
            Err(ExtractError::MalformedFilename { .. })
        ));
        for token in ["nan", "inf", "-inf"] {
            assert!(matches!(
                parse_filename_param(&format!("Exo1_seq_{token}_output.json"), ParamKind::Numeric),
                Err(ExtractError::MalformedFilename { .. })
            ));
        }
    }

    #[test]
    fn numeric_values_display_with_a_decimal() {
        assert_eq!(ParamValue::Numeric(25.0).to_string(), "25.0");
        assert_eq!(ParamValue::Numeric(12.5).to_string(), "12.5");
        assert_eq!(ParamValue::Count(4).to_string(), "4");
    }

    #[test]
    fn extracts_param_records() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path().join("Exo1_seq_25_output.json"),
            fio_json(100.0, 50.0).to_string(),
        )
        .unwrap();
        write(
            dir.path().join("Exo1_seq_75_output.json"),
            fio_json(300.0, 20.0).to_string(),
        )
        .unwrap();
        let variable = Variable::new("write_percentage", ParamKind::Numeric);
        let records = extract(&spec(dir.path(), "Exo1_seq", Some(variable))).unwrap();
        assert_eq!(
            records,
            vec![
                Record {
                    param: Some(ParamValue::Numeric(25.0)),
                    write_bw: 100.0,
                    read_bw: 50.0,
                    latency: None,
                },
                Record {
                    param: Some(ParamValue::Numeric(75.0)),
                    write_bw: 300.0,
                    read_bw: 20.0,
                    latency: None,
                },
            ]
        );
    }

    #[test]
    fn keeps_exactly_the_ten_retained_percentiles() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path().join("Exo3_bssplit_1_output.json"),
            fio_json(1.0, 2.0).to_string(),
        )
        .unwrap();
        let records = extract(&spec(dir.path(), "Exo3_bssplit", None)).unwrap();
        let latency = records[0].latency.as_ref().unwrap();
        let kept = latency.iter().map(|x| x.percentile).collect::<Vec<_>>();
        assert_eq!(kept, RETAINED_PERCENTILES.to_vec());
        assert_eq!(latency[9].latency_ns, 9999.0);
        assert_eq!(records[0].param, None);
    }

    #[test]
    fn schema_mismatches() {
        let dir = tempfile::tempdir().unwrap();
        let bssplit = spec(dir.path(), "Exo3", None);

        let no_jobs = dir.path().join("Exo3_a_1_output.json");
        write(&no_jobs, json!({ "jobs": [] }).to_string()).unwrap();
        assert!(matches!(
            extract_record(&no_jobs, &bssplit),
            Err(ExtractError::SchemaMismatch { .. })
        ));

        let no_bw = dir.path().join("Exo3_b_1_output.json");
        write(&no_bw, json!({ "jobs": [{ "read": {}, "write": {} }] }).to_string()).unwrap();
        assert!(matches!(
            extract_record(&no_bw, &bssplit),
            Err(ExtractError::SchemaMismatch { .. })
        ));

        let no_percentiles = dir.path().join("Exo3_c_1_output.json");
        write(
            &no_percentiles,
            json!({ "jobs": [{ "read": { "bw": 1 }, "write": { "bw": 1 } }] }).to_string(),
        )
        .unwrap();
        assert!(matches!(
            extract_record(&no_percentiles, &bssplit),
            Err(ExtractError::SchemaMismatch { .. })
        ));

        let not_json = dir.path().join("Exo3_d_1_output.json");
        write(&not_json, "jobs:").unwrap();
        assert!(matches!(
            extract_record(&not_json, &bssplit),
            Err(ExtractError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn unreported_percentiles_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut partial = fio_json(1.0, 2.0);
        partial["jobs"][0]["write"]["clat_ns"]["percentile"]
            .as_object_mut()
            .unwrap()
            .remove("99.990000");
        write(dir.path().join("Exo3_bssplit_1_output.json"), fio_json(1.0, 2.0).to_string())
            .unwrap();
        write(dir.path().join("Exo3_bssplit_2_output.json"), partial.to_string()).unwrap();

        let records = extract(&spec(dir.path(), "Exo3_bssplit", None)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].latency.as_ref().unwrap().len(), 10);
        let kept = records[1]
            .latency
            .as_ref()
            .unwrap()
            .iter()
            .map(|x| x.percentile)
            .collect::<Vec<_>>();
        assert_eq!(kept, RETAINED_PERCENTILES[..9].to_vec());
    }
}
