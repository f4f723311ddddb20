use std::{
    fs::create_dir_all,
    path::PathBuf,
};

use eyre::{Context, Result, bail, eyre};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Mean, sample standard deviation and median of one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub median: f64,
}

impl Summary {
    /// Empty input gives NaN everywhere, a single value gives a NaN std.
    pub fn of(data: &[f64]) -> Self {
        Self {
            mean: mean(data),
            std: sample_std(data),
            median: median(data),
        }
    }
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Standard deviation with an N-1 denominator
pub fn sample_std(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return f64::NAN;
    }
    let mean = mean(data);
    let sum_sq = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    (sum_sq / (data.len() - 1) as f64).sqrt()
}

pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let sorted = data.iter().copied().sorted_by(f64::total_cmp).collect::<Vec<_>>();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn ensure_dirs(dirs: &[PathBuf]) -> Result<()> {
    for dir in dirs {
        create_dir_all(dir).wrap_err(format!("Create dir {}", dir.display()))?;
    }
    Ok(())
}

/// Parses fio style sizes such as `4k` or `1m` into bytes
pub fn parse_request_size(request_size: &str) -> Result<u64> {
    let request_size = request_size.to_lowercase();
    let (digits, multiplier) = if let Some(x) = request_size.strip_suffix('k') {
        (x, 1024)
    } else if let Some(x) = request_size.strip_suffix('m') {
        (x, 1024 * 1024)
    } else if let Some(x) = request_size.strip_suffix('g') {
        (x, 1024 * 1024 * 1024)
    } else {
        bail!("Unsupported request size {request_size}")
    };
    digits
        .parse::<u64>()
        .context(format!("Parse request size: {request_size}"))?
        .checked_mul(multiplier)
        .ok_or_else(|| eyre!("Request size {request_size} overflows u64"))
}
