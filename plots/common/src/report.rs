use std::path::PathBuf;

use eyre::Result;

use crate::{chart::Chart, render::render_charts};

/// Charts and text a report produces, built without touching the output dir
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub charts: Vec<Chart>,
    /// Printed to stdout in order
    pub summary: Vec<String>,
}

impl Report {
    pub fn new(charts: Vec<Chart>) -> Self {
        Self {
            charts,
            summary: Vec::new(),
        }
    }

    pub fn with_summary(mut self, text: impl Into<String>) -> Self {
        self.summary.push(text.into());
        self
    }

    /// Chart whose file is named `name`
    pub fn chart(&self, name: &str) -> Option<&Chart> {
        self.charts
            .iter()
            .find(|c| c.filepath().file_name().and_then(|x| x.to_str()) == Some(name))
    }

    /// Prints the summary, then renders every chart with data
    pub fn publish(&self) -> Result<Vec<PathBuf>> {
        for text in &self.summary {
            println!("{text}");
        }
        render_charts(&self.charts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Axis, Series, XyChart};

    #[test]
    fn finds_charts_by_file_name() {
        let report = Report::new(vec![
            XyChart::new(
                PathBuf::from("plots/a.png"),
                "a",
                Axis::linear("x"),
                Axis::linear("y"),
            )
            .with_series(Series::line(vec![(1.0, 2.0)], crate::Rgb::BLUE))
            .into(),
        ])
        .with_summary("table");
        assert_eq!(report.chart("a.png").map(Chart::title), Some("a"));
        assert!(report.chart("plots/a.png").is_none());
        assert_eq!(report.summary, ["table"]);
    }
}
