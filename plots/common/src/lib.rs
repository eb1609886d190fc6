pub mod chart;
mod render;
mod report;

pub use chart::{
    Axis, BarAnnotation, BarChart, BarGroup, Chart, Marker, OverlayChart, Rgb, Scale, Series,
    SeriesStyle, XyChart,
};
pub use render::{render_chart, render_charts};
pub use report::Report;
