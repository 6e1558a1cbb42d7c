//! Chart construction and rendering.
//!
//! `render` turns a bound directive plus the dataset into a `ResolvedChart`,
//! performing count aggregation on the fly when the directive asked for it.
//! Construction failure (for example a line chart over a text column) yields
//! `None` rather than an error: the chart degrades to absent and the round
//! continues.

pub mod word_cloud;

use std::path::Path;

use anyhow::{Context, Result};
use plotters::prelude::*;
use tracing::warn;

use crate::dataset::Dataset;
use crate::directive::{BoundDirective, XyKind, YSeries};

/// Canvas size shared by all chart kinds so they are interchangeable
/// downstream (display, export slides).
pub const CANVAS_WIDTH: u32 = 800;
pub const CANVAS_HEIGHT: u32 = 500;

const SLICE_COLORS: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesKind {
    Line,
    Scatter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    /// One bar per category.
    Bars {
        x_label: String,
        y_label: String,
        categories: Vec<String>,
        values: Vec<f64>,
    },
    /// Slice per category, magnitude per value.
    Pie {
        categories: Vec<String>,
        values: Vec<f64>,
    },
    /// Numeric 2-D series for line and scatter plots.
    Series {
        kind: SeriesKind,
        x_label: String,
        y_label: String,
        points: Vec<(f64, f64)>,
    },
    /// Term frequencies, descending, capped.
    WordCloud { terms: Vec<(String, u64)> },
}

/// A renderable chart plus its originating title.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChart {
    pub title: String,
    pub data: ChartData,
}

/// Build a renderable chart from a bound directive, or `None` when the
/// data cannot support the requested kind.
pub fn render(bound: &BoundDirective, dataset: &Dataset) -> Option<ResolvedChart> {
    let chart = match bound {
        BoundDirective::WordCloud { text_column, title } => {
            let column = dataset.column(text_column)?;
            let terms = word_cloud::term_frequencies(column.values());
            if terms.is_empty() {
                warn!(column = %text_column, "No terms to draw, skipping word cloud");
                return None;
            }
            ResolvedChart {
                title: title.clone(),
                data: ChartData::WordCloud { terms },
            }
        }
        BoundDirective::Xy { kind, x_column, y_series, title } => {
            let data = match kind {
                XyKind::Bar | XyKind::Pie => {
                    categorical_data(*kind, dataset, x_column, y_series)?
                }
                XyKind::Line | XyKind::Scatter => {
                    numeric_series(*kind, dataset, x_column, y_series)?
                }
            };
            ResolvedChart { title: title.clone(), data }
        }
    };
    Some(chart)
}

fn categorical_data(
    kind: XyKind,
    dataset: &Dataset,
    x_column: &str,
    y_series: &YSeries,
) -> Option<ChartData> {
    let (categories, values, y_label) = match y_series {
        YSeries::Count => {
            let counts = dataset.value_counts(x_column);
            let (categories, values): (Vec<String>, Vec<f64>) = counts
                .into_iter()
                .map(|(category, count)| (category, count as f64))
                .unzip();
            (categories, values, "Count".to_string())
        }
        YSeries::Column(y_column) => {
            let x = dataset.column(x_column)?;
            let y = dataset.column(y_column)?;
            let mut categories = Vec::new();
            let mut values = Vec::new();
            for (row, cell) in x.values().iter().enumerate() {
                if let Some(value) = y.numeric(row) {
                    categories.push(cell.clone());
                    values.push(value);
                }
            }
            (categories, values, axis_label(y_column))
        }
    };

    if values.is_empty() {
        warn!(column = %x_column, "No plottable rows for categorical chart");
        return None;
    }

    Some(match kind {
        XyKind::Pie => ChartData::Pie { categories, values },
        _ => ChartData::Bars {
            x_label: axis_label(x_column),
            y_label,
            categories,
            values,
        },
    })
}

fn numeric_series(
    kind: XyKind,
    dataset: &Dataset,
    x_column: &str,
    y_series: &YSeries,
) -> Option<ChartData> {
    let series_kind = match kind {
        XyKind::Line => SeriesKind::Line,
        _ => SeriesKind::Scatter,
    };

    let (points, y_label) = match y_series {
        YSeries::Count => {
            // Aggregated counts have categorical x; plot them by rank.
            let points = dataset
                .value_counts(x_column)
                .into_iter()
                .enumerate()
                .map(|(idx, (_, count))| (idx as f64, count as f64))
                .collect::<Vec<_>>();
            (points, "Count".to_string())
        }
        YSeries::Column(y_column) => {
            let x = dataset.column(x_column)?;
            let y = dataset.column(y_column)?;
            let mut points = Vec::new();
            for row in 0..dataset.row_count() {
                if let (Some(xv), Some(yv)) = (x.numeric(row), y.numeric(row)) {
                    points.push((xv, yv));
                }
            }
            (points, axis_label(y_column))
        }
    };

    if points.is_empty() {
        warn!(
            x = %x_column,
            "No numeric point pairs for line/scatter chart"
        );
        return None;
    }

    Some(ChartData::Series {
        kind: series_kind,
        x_label: axis_label(x_column),
        y_label,
        points,
    })
}

/// Axis label derived from a field name: separators become spaces, words
/// are title-cased.
pub fn axis_label(field: &str) -> String {
    field
        .split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl ResolvedChart {
    /// Draw the chart to a PNG at `path`.
    pub fn write_png(&self, path: &Path) -> Result<()> {
        let root =
            BitMapBackend::new(path, (CANVAS_WIDTH, CANVAS_HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;

        match &self.data {
            ChartData::Bars { x_label, y_label, categories, values } => {
                self.draw_bars(&root, x_label, y_label, categories, values)?;
            }
            ChartData::Pie { categories, values } => {
                self.draw_pie(&root, categories, values)?;
            }
            ChartData::Series { kind, x_label, y_label, points } => {
                self.draw_series(&root, kind, x_label, y_label, points)?;
            }
            ChartData::WordCloud { terms } => {
                word_cloud::draw_terms(&root, &self.title, terms)?;
            }
        }

        root.present()
            .with_context(|| format!("Failed to write chart to {}", path.display()))?;
        Ok(())
    }

    fn draw_bars(
        &self,
        root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
        x_label: &str,
        y_label: &str,
        categories: &[String],
        values: &[f64],
    ) -> Result<()> {
        let mut chart = ChartBuilder::on(root)
            .margin(20)
            .caption(&self.title, ("sans-serif", 24).into_font())
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0..categories.len(), bar_y_range(values))?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(categories.len().min(20))
            .x_label_formatter(&|x| categories.get(*x).cloned().unwrap_or_default())
            .x_desc(x_label)
            .y_desc(y_label)
            .draw()?;

        chart.draw_series(values.iter().enumerate().map(|(idx, value)| {
            Rectangle::new([(idx, 0.0), (idx + 1, *value)], BLUE.mix(0.4).filled())
        }))?;
        Ok(())
    }

    fn draw_pie(
        &self,
        root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
        categories: &[String],
        values: &[f64],
    ) -> Result<()> {
        let root = root.titled(&self.title, ("sans-serif", 24).into_font())?;
        let dims = root.dim_in_pixel();
        let center = (dims.0 as i32 / 2, dims.1 as i32 / 2);
        let radius = (dims.0.min(dims.1) as f64 / 2.0) * 0.7;

        let colors: Vec<RGBColor> = SLICE_COLORS
            .iter()
            .cycle()
            .take(values.len())
            .cloned()
            .collect();

        let mut pie = Pie::new(&center, &radius, values, &colors, categories);
        pie.label_style(("sans-serif", 16).into_font().color(&BLACK));
        root.draw(&pie)?;
        Ok(())
    }

    fn draw_series(
        &self,
        root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
        kind: &SeriesKind,
        x_label: &str,
        y_label: &str,
        points: &[(f64, f64)],
    ) -> Result<()> {
        let (x_range, y_range) = series_ranges(points);

        let mut chart = ChartBuilder::on(root)
            .margin(20)
            .caption(&self.title, ("sans-serif", 24).into_font())
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_range, y_range)?;

        chart
            .configure_mesh()
            .x_desc(x_label)
            .y_desc(y_label)
            .draw()?;

        match kind {
            SeriesKind::Line => {
                chart.draw_series(LineSeries::new(points.iter().cloned(), &BLUE))?;
            }
            SeriesKind::Scatter => {
                chart.draw_series(
                    points
                        .iter()
                        .map(|(x, y)| Circle::new((*x, *y), 4, BLUE.filled())),
                )?;
            }
        }
        Ok(())
    }
}

/// Y range for bar charts: baseline at zero, stretched to cover negative
/// values so no bar gets clipped.
fn bar_y_range(values: &[f64]) -> std::ops::Range<f64> {
    let max = values.iter().cloned().fold(0.0f64, f64::max);
    let min = values.iter().cloned().fold(0.0f64, f64::min);
    let pad = (max - min).max(1.0) * 0.05;
    let start = if min < 0.0 { min - pad } else { 0.0 };
    start..(max + pad)
}

fn series_ranges(points: &[(f64, f64)]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for (x, y) in points {
        x_min = x_min.min(*x);
        x_max = x_max.max(*x);
        y_min = y_min.min(*y);
        y_max = y_max.max(*y);
    }
    // Degenerate ranges make plotters unhappy; pad them out.
    if x_min == x_max {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if y_min == y_max {
        y_min -= 1.0;
        y_max += 1.0;
    }
    (x_min..x_max, y_min..y_max)
}
