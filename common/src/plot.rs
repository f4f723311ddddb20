use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use plotters::{
    prelude::{
        BindKeyPoints, BitMapBackend, ChartBuilder, Circle, ErrorBar, IntoDrawingArea, Rectangle,
        SeriesLabelPosition,
    },
    style::{BLACK, Color, IntoFont, RGBAColor, RGBColor, WHITE},
};
use tracing::{debug, info};

use crate::util::Summary;

pub const WRITE_COLOR: RGBColor = RGBColor(0, 0, 255);
pub const READ_COLOR: RGBColor = RGBColor(0, 128, 0);
pub const TOTAL_COLOR: RGBColor = RGBColor(128, 0, 128);
pub const MEDIAN_COLOR: RGBColor = RGBColor(255, 0, 0);
pub const SECONDARY_MEDIAN_COLOR: RGBColor = RGBColor(255, 165, 0);

const BAR_ALPHA: f64 = 0.6;
const MARKER_SIZE: i32 = 5;
const ERROR_BAR_CAP: u32 = 10;
/// Width of one x axis slot in chart coordinates
const SLOT: i32 = 1000;

fn to_units(slots: f64) -> i32 {
    (slots * SLOT as f64).round() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarChartKind {
    ReadWriteBandwidth,
    TotalBandwidth,
    LatencyDeciles,
}

impl BarChartKind {
    pub fn name(&self) -> &'static str {
        match self {
            BarChartKind::ReadWriteBandwidth => "read_write_bandwidth",
            BarChartKind::TotalBandwidth => "total_bandwidth",
            BarChartKind::LatencyDeciles => "latency_deciles",
        }
    }

    pub fn y_desc(&self) -> &'static str {
        match self {
            BarChartKind::LatencyDeciles => "Latency (ns)",
            _ => "Bandwidth (KB/s)",
        }
    }

    /// `<label>_<kind>_plot.png` inside `dir`
    pub fn filepath(&self, dir: &Path, label: &str) -> PathBuf {
        dir.join(format!("{label}_{}_plot.png", self.name()))
    }
}

/// Bars of one colour plus their median markers
#[derive(Debug, Clone)]
pub struct BarSeries {
    pub label: String,
    pub color: RGBColor,
    pub median_label: String,
    pub median_color: RGBColor,
    /// Slot index on the x axis and the statistics drawn there
    pub bars: Vec<(usize, Summary)>,
    /// Horizontal shift from the slot centre, in slot units
    pub offset: f64,
    pub width: f64,
}

#[derive(Debug, Clone)]
pub struct BarChart {
    pub filepath: PathBuf,
    pub size: (u32, u32),
    pub x_labels: Vec<String>,
    pub x_desc: Option<String>,
    pub y_desc: String,
    pub y_max: f64,
    pub series: Vec<BarSeries>,
}

impl BarSeries {
    pub fn new(label: &str, color: RGBColor, median_label: &str, median_color: RGBColor) -> Self {
        Self {
            label: label.to_owned(),
            color,
            median_label: median_label.to_owned(),
            median_color,
            bars: Vec::new(),
            offset: 0.0,
            width: 0.35,
        }
    }

    pub fn with_bars(mut self, bars: Vec<(usize, Summary)>) -> Self {
        self.bars = bars;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }
}

/// Upper bound that fits every mean + std and median of the given series, with
/// some headroom. Falls back to 1 when nothing finite is present.
pub fn auto_y_max(series: &[BarSeries]) -> f64 {
    let top = series
        .iter()
        .flat_map(|s| s.bars.iter())
        .flat_map(|(_, s)| [s.mean + s.std.max(0.0), s.median, s.mean])
        .filter(|x| x.is_finite())
        .fold(0.0, f64::max);
    if top > 0.0 { top * 1.1 } else { 1.0 }
}

/// Mean bars with std error bars and median markers. Values above `y_max`
/// are clipped to the plotting area, non-finite values are not drawn.
pub fn plot_bar_chart(chart: &BarChart) -> Result<()> {
    debug!(
        "Rendering {} with {} slots",
        chart.filepath.display(),
        chart.x_labels.len()
    );
    let slots = chart.x_labels.len();
    let x_end = slots.max(1) as i32 * SLOT - SLOT / 2;
    let key_points = (0..slots).map(|x| x as i32 * SLOT).collect::<Vec<_>>();
    let y_max = chart.y_max;
    let clip = |y: f64| y.clamp(0.0, y_max);

    let root = BitMapBackend::new(&chart.filepath, chart.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d((-SLOT / 2..x_end).with_key_points(key_points), 0f64..y_max)
        .wrap_err("Build chart")?;

    let axis_label_style = ("sans-serif", 16).into_font();
    let labels = &chart.x_labels;
    let x_formatter = |x: &i32| match (*x >= 0 && x % SLOT == 0, usize::try_from(x / SLOT)) {
        (true, Ok(slot)) => labels.get(slot).cloned().unwrap_or_default(),
        _ => String::new(),
    };
    let y_formatter = |y: &f64| format!("{y:.0}");
    let mut mesh = ctx.configure_mesh();
    mesh.disable_x_mesh()
        .light_line_style(RGBAColor(235, 235, 235, 1.0))
        .bold_line_style(RGBAColor(200, 200, 200, 1.0))
        .x_labels(slots.max(1))
        .x_label_style(axis_label_style.clone())
        .x_label_formatter(&x_formatter)
        .y_desc(chart.y_desc.as_str())
        .y_label_style(axis_label_style)
        .y_label_formatter(&y_formatter);
    if let Some(x_desc) = &chart.x_desc {
        mesh.x_desc(x_desc.as_str());
    }
    mesh.draw().wrap_err("Draw mesh")?;

    for series in &chart.series {
        let color = series.color;
        let half = to_units(series.width / 2.0);
        let drawn = series
            .bars
            .iter()
            .map(|(slot, s)| (*slot as i32 * SLOT + to_units(series.offset), *s))
            .filter(|(_, s)| s.mean.is_finite())
            .collect::<Vec<_>>();

        ctx.draw_series(drawn.iter().map(|(x, s)| {
            Rectangle::new(
                [(x - half, 0.0), (x + half, clip(s.mean))],
                color.mix(BAR_ALPHA).filled(),
            )
        }))?
        .label(series.label.as_str())
        .legend(move |(x, y)| {
            Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.mix(BAR_ALPHA).filled())
        });

        ctx.draw_series(drawn.iter().filter(|(_, s)| s.std.is_finite()).map(|(x, s)| {
            ErrorBar::new_vertical(
                *x,
                clip(s.mean - s.std),
                clip(s.mean),
                clip(s.mean + s.std),
                BLACK.stroke_width(1),
                ERROR_BAR_CAP,
            )
        }))?;

        let median_color = series.median_color;
        ctx.draw_series(
            drawn
                .iter()
                .filter(|(_, s)| s.median.is_finite() && s.median <= y_max)
                .map(|(x, s)| Circle::new((*x, s.median), MARKER_SIZE, median_color.filled())),
        )?
        .label(series.median_label.as_str())
        .legend(move |(x, y)| Circle::new((x + 5, y), MARKER_SIZE, median_color.filled()));
    }

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .margin(10)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .label_font(("sans-serif", 14).into_font())
        .draw()
        .wrap_err("Draw legend")?;

    root.present()
        .wrap_err(format!("Write {}", chart.filepath.display()))?;
    info!("Wrote {}", chart.filepath.display());
    Ok(())
}
