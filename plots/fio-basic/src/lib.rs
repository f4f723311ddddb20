use std::path::{Path, PathBuf};

use common::{
    config::ExperimentSpec,
    plot::{
        BarChart, BarChartKind, BarSeries, MEDIAN_COLOR, READ_COLOR, SECONDARY_MEDIAN_COLOR,
        TOTAL_COLOR, WRITE_COLOR, auto_y_max, plot_bar_chart,
    },
};
use eyre::{Context, Result};
use fio::ParamValue;
use tracing::debug;

use crate::stats::AggregatedStats;

pub mod stats;

const GROUPED_WIDTH: f64 = 0.35;
const SINGLE_WIDTH: f64 = 0.8;
const LATENCY_WIDTH: f64 = 0.5;

/// Write and read bandwidth side by side, one pair per group. Without a
/// varying parameter the two bars get their own slot.
pub fn read_write_chart(stats: &AggregatedStats, spec: &ExperimentSpec, dir: &Path) -> BarChart {
    let filepath = BarChartKind::ReadWriteBandwidth.filepath(dir, &spec.label);
    let write = BarSeries::new("Write Bandwidth", WRITE_COLOR, "Write Median", MEDIAN_COLOR);
    let read = BarSeries::new(
        "Read Bandwidth",
        READ_COLOR,
        "Read Median",
        SECONDARY_MEDIAN_COLOR,
    );

    match &spec.variable {
        Some(variable) => BarChart {
            filepath,
            size: (1200, 700),
            x_labels: stats.groups.iter().map(|x| x.label()).collect(),
            x_desc: Some(variable.axis_label()),
            y_desc: BarChartKind::ReadWriteBandwidth.y_desc().to_owned(),
            y_max: spec.y_max,
            series: vec![
                write
                    .with_bars(stats.groups.iter().map(|x| x.write).enumerate().collect())
                    .with_offset(-GROUPED_WIDTH / 2.0)
                    .with_width(GROUPED_WIDTH),
                read.with_bars(stats.groups.iter().map(|x| x.read).enumerate().collect())
                    .with_offset(GROUPED_WIDTH / 2.0)
                    .with_width(GROUPED_WIDTH),
            ],
        },
        None => BarChart {
            filepath,
            size: (600, 600),
            x_labels: vec!["Write Bandwidth".to_owned(), "Read Bandwidth".to_owned()],
            x_desc: None,
            y_desc: BarChartKind::ReadWriteBandwidth.y_desc().to_owned(),
            y_max: spec.y_max,
            series: vec![
                write
                    .with_bars(stats.groups.iter().map(|x| (0, x.write)).collect())
                    .with_width(SINGLE_WIDTH),
                read.with_bars(stats.groups.iter().map(|x| (1, x.read)).collect())
                    .with_width(SINGLE_WIDTH),
            ],
        },
    }
}

pub fn total_chart(stats: &AggregatedStats, spec: &ExperimentSpec, dir: &Path) -> BarChart {
    let series = BarSeries::new("Total Bandwidth", TOTAL_COLOR, "Median Bandwidth", MEDIAN_COLOR);
    let (size, x_labels, x_desc, width) = match &spec.variable {
        Some(variable) => (
            (1000, 600),
            stats.groups.iter().map(|x| x.label()).collect(),
            Some(variable.axis_label()),
            GROUPED_WIDTH,
        ),
        None => ((600, 600), vec!["Total Bandwidth".to_owned()], None, SINGLE_WIDTH),
    };
    BarChart {
        filepath: BarChartKind::TotalBandwidth.filepath(dir, &spec.label),
        size,
        x_labels,
        x_desc,
        y_desc: BarChartKind::TotalBandwidth.y_desc().to_owned(),
        y_max: spec.y_max,
        series: vec![
            series
                .with_bars(stats.groups.iter().map(|x| x.total).enumerate().collect())
                .with_width(width),
        ],
    }
}

/// Mean latency per retained percentile, `None` when the experiment carries no
/// latency data
pub fn latency_chart(
    stats: &AggregatedStats,
    spec: &ExperimentSpec,
    dir: &Path,
) -> Option<BarChart> {
    let latency = stats.latency.as_ref()?;
    let series = vec![
        BarSeries::new("Mean Latency", WRITE_COLOR, "Median Latency", MEDIAN_COLOR)
            .with_bars(latency.iter().map(|x| x.latency).enumerate().collect())
            .with_width(LATENCY_WIDTH),
    ];
    Some(BarChart {
        filepath: BarChartKind::LatencyDeciles.filepath(dir, &spec.label),
        size: (1000, 600),
        x_labels: latency
            .iter()
            .map(|x| ParamValue::Numeric(x.percentile).to_string())
            .collect(),
        x_desc: Some("Centiles (%)".to_owned()),
        y_desc: BarChartKind::LatencyDeciles.y_desc().to_owned(),
        y_max: auto_y_max(&series),
        series,
    })
}

/// Writes every chart of one experiment into `dir` and returns their paths
pub fn render_experiment(
    stats: &AggregatedStats,
    spec: &ExperimentSpec,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut charts = vec![
        read_write_chart(stats, spec, dir),
        total_chart(stats, spec, dir),
    ];
    if spec.variable.is_none() {
        charts.extend(latency_chart(stats, spec, dir));
    }
    debug!("{} charts for {}", charts.len(), spec.label);

    charts
        .iter()
        .map(|chart| -> Result<PathBuf> {
            plot_bar_chart(chart)
                .wrap_err(format!("Plot {} for {}", chart.filepath.display(), spec.label))?;
            Ok(chart.filepath.clone())
        })
        .collect()
}
