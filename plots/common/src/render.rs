use std::{fs, ops::Range, path::PathBuf};

use eyre::{Context, ContextCompat, Result};
use plotters::{
    coord::ranged1d::{AsRangedCoord, ValueFormatter},
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info};

use crate::chart::{BarChart, Chart, Marker, OverlayChart, Rgb, Scale, SeriesStyle, XyChart};

const FONT: &str = "sans-serif";
const TITLE_FONT_SIZE: u32 = 28;
const AXIS_LABEL_FONT_SIZE: u32 = 20;
const TICK_LABEL_FONT_SIZE: u32 = 16;
const LEGEND_FONT_SIZE: u32 = 16;
const DATA_LABEL_FONT_SIZE: u32 = 14;

impl From<Rgb> for RGBColor {
    fn from(value: Rgb) -> Self {
        RGBColor(value.0, value.1, value.2)
    }
}

/// Renders every chart that has data, returning the written paths in input
/// order. Charts without any point are skipped.
pub fn render_charts(charts: &[Chart]) -> Result<Vec<PathBuf>> {
    let charts = charts
        .iter()
        .filter(|chart| {
            if !chart.has_data() {
                debug!("Skipping empty chart {:?}", chart.filepath());
            }
            chart.has_data()
        })
        .collect::<Vec<_>>();
    charts
        .par_iter()
        .map(|chart| {
            render_chart(chart)?;
            Ok(chart.filepath().to_path_buf())
        })
        .collect()
}

pub fn render_chart(chart: &Chart) -> Result<()> {
    if let Some(parent) = chart.filepath().parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)?;
    }
    match chart {
        Chart::Xy(x) => render_xy(x),
        Chart::Bar(x) => render_bar(x),
        Chart::Overlay(x) => render_overlay(x),
    }
    .wrap_err_with(|| format!("Render {:?} ({})", chart.filepath(), chart.title()))?;
    info!("Saved {:?}", chart.filepath());
    Ok(())
}

/// Data range padded so that points do not sit on the frame
fn axis_range(scale: Scale, values: impl Iterator<Item = f64>) -> Option<Range<f64>> {
    let (min, max) = values
        .filter(|v| scale.accepts(*v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return None;
    }
    Some(match scale {
        Scale::Linear => {
            let pad = if max > min {
                (max - min) * 0.05
            } else {
                min.abs().max(1.0) * 0.1
            };
            (min - pad)..(max + pad)
        }
        Scale::Log10 | Scale::Log2 => (min / 1.2)..(max * 1.2),
    })
}

fn category_label(categories: &[String], x: f64) -> String {
    let idx = x.round();
    if idx < 0.0 || (x - idx).abs() > 0.25 {
        return String::new();
    }
    categories.get(idx as usize).cloned().unwrap_or_default()
}

fn render_xy(chart: &XyChart) -> Result<()> {
    let points = || {
        chart
            .series
            .iter()
            .flat_map(|s| s.points.iter())
            .filter(|p| chart.accepts(**p))
    };
    let x = match &chart.categories {
        Some(categories) => -0.5..(categories.len() as f64 - 0.5),
        None => axis_range(chart.x.scale, points().map(|p| p.0)).context("No x values")?,
    };
    let y = axis_range(chart.y.scale, points().map(|p| p.1)).context("No y values")?;

    match (chart.x.scale, chart.y.scale) {
        (Scale::Linear, Scale::Linear) => draw_xy(chart, x, y),
        (Scale::Linear, ys) => draw_xy(chart, x, y.log_scale().base(ys.base())),
        (xs, Scale::Linear) => draw_xy(chart, x.log_scale().base(xs.base()), y),
        (xs, ys) => draw_xy(
            chart,
            x.log_scale().base(xs.base()),
            y.log_scale().base(ys.base()),
        ),
    }
}

fn draw_xy<X, Y>(chart: &XyChart, x_spec: X, y_spec: Y) -> Result<()>
where
    X: AsRangedCoord<Value = f64>,
    Y: AsRangedCoord<Value = f64>,
    X::CoordDescType: ValueFormatter<f64>,
    Y::CoordDescType: ValueFormatter<f64>,
{
    let root = BitMapBackend::new(&chart.filepath, chart.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(&chart.title, (FONT, TITLE_FONT_SIZE))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(x_spec, y_spec)?;

    let categories = chart.categories.clone().unwrap_or_default();
    let category_formatter = |x: &f64| category_label(&categories, *x);
    {
        let mut mesh = ctx.configure_mesh();
        mesh.x_desc(chart.x.label.as_str())
            .y_desc(chart.y.label.as_str())
            .label_style((FONT, TICK_LABEL_FONT_SIZE))
            .axis_desc_style((FONT, AXIS_LABEL_FONT_SIZE));
        if chart.categories.is_some() {
            mesh.disable_x_mesh()
                .x_labels(categories.len())
                .x_label_formatter(&category_formatter);
        }
        mesh.draw()?;
    }

    let accepts = |p: &(f64, f64)| chart.accepts(*p);
    for series in &chart.series {
        let color: RGBColor = series.color.into();
        let points = series
            .points
            .iter()
            .copied()
            .filter(accepts)
            .collect::<Vec<_>>();
        if points.is_empty() {
            continue;
        }

        let anno = match series.style {
            SeriesStyle::Line(_) => {
                ctx.draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            }
            SeriesStyle::Scatter => {
                ctx.draw_series(points.iter().map(|p| Circle::new(*p, 5, color.filled())))?
            }
        };
        if let Some(label) = &series.label {
            anno.label(label.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.filled()));
        }

        match series.style {
            SeriesStyle::Line(Some(Marker::Circle)) => {
                ctx.draw_series(points.iter().map(|p| Circle::new(*p, 4, color.filled())))?;
            }
            SeriesStyle::Line(Some(Marker::Square)) => {
                ctx.draw_series(points.iter().map(|p| {
                    EmptyElement::at(*p) + Rectangle::new([(-4, -4), (4, 4)], color.filled())
                }))?;
            }
            SeriesStyle::Line(None) | SeriesStyle::Scatter => {}
        }

        if !series.point_labels.is_empty() {
            ctx.draw_series(
                series
                    .points
                    .iter()
                    .zip(&series.point_labels)
                    .filter(|(p, _)| accepts(*p))
                    .map(|(p, text)| {
                        EmptyElement::at(*p)
                            + Text::new(
                                text.clone(),
                                (6, -20),
                                (FONT, DATA_LABEL_FONT_SIZE).into_font(),
                            )
                    }),
            )?;
        }
    }

    if chart.series.iter().any(|s| s.label.is_some()) {
        ctx.configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((FONT, LEGEND_FONT_SIZE))
            .draw()?;
    }

    root.present()?;
    Ok(())
}

fn render_bar(chart: &BarChart) -> Result<()> {
    let error_at = |errors: &[Option<f64>], idx: usize| errors.get(idx).copied().flatten();
    let (bottom, top) = chart
        .groups
        .iter()
        .flat_map(|g| {
            g.values.iter().enumerate().filter_map(move |(idx, v)| {
                v.map(|v| {
                    let err = error_at(&g.errors, idx).unwrap_or(0.0).abs();
                    (v - err, v + err)
                })
            })
        })
        .fold((0.0f64, 0.0f64), |(lo, hi), (a, b)| (lo.min(a), hi.max(b)));
    let top = if top > 0.0 { top * 1.15 } else { 1.0 };
    let bottom = if bottom < 0.0 { bottom * 1.15 } else { 0.0 };
    let n = chart.categories.len();

    let root = BitMapBackend::new(&chart.filepath, chart.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(&chart.title, (FONT, TITLE_FONT_SIZE))
        .margin(20)
        .x_label_area_size(80)
        .y_label_area_size(90)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), bottom..top)?;

    let category_formatter = |x: &f64| category_label(&chart.categories, *x);
    {
        let mut mesh = ctx.configure_mesh();
        mesh.disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&category_formatter)
            .y_desc(chart.y_label.as_str())
            .label_style((FONT, TICK_LABEL_FONT_SIZE))
            .axis_desc_style((FONT, AXIS_LABEL_FONT_SIZE));
        if let Some(label) = &chart.x_label {
            mesh.x_desc(label.as_str());
        }
        mesh.draw()?;
    }

    let group_width = 0.8;
    let bar_width = group_width / chart.groups.len().max(1) as f64;
    for (group_idx, group) in chart.groups.iter().enumerate() {
        let color: RGBColor = group.color.into();
        let bars = group
            .values
            .iter()
            .enumerate()
            .filter_map(|(idx, v)| {
                let center = idx as f64 - group_width / 2.0 + bar_width * (group_idx as f64 + 0.5);
                v.map(|v| (center, v, error_at(&group.errors, idx)))
            })
            .collect::<Vec<_>>();

        let anno = ctx.draw_series(bars.iter().map(|&(center, v, _)| {
            Rectangle::new(
                [(center - bar_width * 0.45, 0.0), (center + bar_width * 0.45, v)],
                color.mix(0.85).filled(),
            )
        }))?;
        if let Some(label) = &group.label {
            anno.label(label.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.filled()));
        }

        ctx.draw_series(bars.iter().filter_map(|&(center, v, err)| {
            err.map(|e| ErrorBar::new_vertical(center, v - e, v, v + e, BLACK.filled(), 10))
        }))?;

        if let Some(annotation) = &chart.annotation {
            ctx.draw_series(bars.iter().map(|&(center, v, err)| {
                Text::new(
                    annotation.format(v),
                    (center, v + err.unwrap_or(0.0) + (top - bottom) * 0.01),
                    (FONT, DATA_LABEL_FONT_SIZE)
                        .into_font()
                        .color(&BLACK)
                        .pos(Pos::new(HPos::Center, VPos::Bottom)),
                )
            }))?;
        }
    }

    if chart.groups.iter().any(|g| g.label.is_some()) {
        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((FONT, LEGEND_FONT_SIZE))
            .draw()?;
    }

    root.present()?;
    Ok(())
}

fn render_overlay(chart: &OverlayChart) -> Result<()> {
    let half = chart.bar_width / 2.0;
    let xs = chart.line.points.iter().map(|p| p.0).chain(
        chart
            .bars
            .iter()
            .flat_map(|b| [b.0 * (1.0 - half), b.0 * (1.0 + half)]),
    );
    let x = axis_range(chart.x.scale, xs).context("No x values")?;
    let line_y = axis_range(
        Scale::Linear,
        chart
            .line
            .points
            .iter()
            .filter(|p| chart.x.scale.accepts(p.0))
            .map(|p| p.1),
    )
    .unwrap_or(0.0..1.0);
    let bar_top = chart.bars.iter().map(|b| b.1).fold(0.0f64, f64::max);
    let bar_y = 0.0..if bar_top > 0.0 { bar_top * 1.1 } else { 1.0 };

    match chart.x.scale {
        Scale::Linear => draw_overlay(chart, x, line_y, bar_y),
        scale => draw_overlay(chart, x.log_scale().base(scale.base()), line_y, bar_y),
    }
}

fn draw_overlay<X>(chart: &OverlayChart, x_spec: X, line_y: Range<f64>, bar_y: Range<f64>) -> Result<()>
where
    X: AsRangedCoord<Value = f64> + Clone,
    X::CoordDescType: ValueFormatter<f64>,
{
    let root = BitMapBackend::new(&chart.filepath, chart.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(&chart.title, (FONT, TITLE_FONT_SIZE))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .right_y_label_area_size(90)
        .build_cartesian_2d(x_spec.clone(), line_y)?
        .set_secondary_coord(x_spec, bar_y);

    let line_color: RGBColor = chart.line.color.into();
    let bar_color: RGBColor = chart.bar_color.into();

    ctx.configure_mesh()
        .x_desc(chart.x.label.as_str())
        .y_desc(chart.line_axis.as_str())
        .label_style((FONT, TICK_LABEL_FONT_SIZE))
        .axis_desc_style((FONT, AXIS_LABEL_FONT_SIZE).into_font().color(&line_color))
        .draw()?;
    ctx.configure_secondary_axes()
        .y_desc(chart.bar_axis.as_str())
        .label_style((FONT, TICK_LABEL_FONT_SIZE))
        .axis_desc_style((FONT, AXIS_LABEL_FONT_SIZE).into_font().color(&bar_color))
        .draw()?;

    let half = chart.bar_width / 2.0;
    ctx.draw_secondary_series(
        chart
            .bars
            .iter()
            .filter(|b| chart.x.scale.accepts(b.0))
            .map(|&(x, y)| {
                Rectangle::new(
                    [(x * (1.0 - half), 0.0), (x * (1.0 + half), y)],
                    bar_color.mix(0.6).filled(),
                )
            }),
    )?;

    let points = chart
        .line
        .points
        .iter()
        .copied()
        .filter(|p| chart.x.scale.accepts(p.0) && p.1.is_finite())
        .collect::<Vec<_>>();
    ctx.draw_series(LineSeries::new(points.clone(), line_color.stroke_width(2)))?;
    ctx.draw_series(points.iter().map(|p| Circle::new(*p, 4, line_color.filled())))?;

    root.present()?;
    Ok(())
}
