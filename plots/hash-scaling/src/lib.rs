use std::path::{Path, PathBuf};

use common::{
    plot::Plot,
    stats::ratio,
    table::{list_files, read_csv},
};
use eyre::Result;
use itertools::Itertools;
use plot_common::{Axis, Chart, Marker, Report, Rgb, Series, XyChart};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SIZE: (u32, u32) = (1600, 1200);

/// Coarse against fine grained locking hash table throughput over threads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashScaling {
    pub results_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for HashScaling {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            output_dir: PathBuf::from("plots"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HashRow {
    pub dataset: u64,
    pub threads: u32,
    pub workload: String,
    pub coarse_tput: f64,
    pub fine_tput: f64,
}

/// Adds the coarse (circles) and fine (squares) lines over thread count
fn with_lock_series(
    chart: XyChart,
    rows: &[&HashRow],
    coarse: impl Fn(&HashRow) -> Option<f64>,
    fine: impl Fn(&HashRow) -> Option<f64>,
) -> XyChart {
    let coarse_points = rows
        .iter()
        .filter_map(|r| Some((r.threads as f64, coarse(*r)?)))
        .collect();
    let fine_points = rows
        .iter()
        .filter_map(|r| Some((r.threads as f64, fine(*r)?)))
        .collect();
    chart
        .with_series(Series::line(coarse_points, Rgb::BLUE).with_label("Coarse-Grained"))
        .with_series(
            Series::line(fine_points, Rgb::ORANGE)
                .with_marker(Some(Marker::Square))
                .with_label("Fine-Grained"),
        )
}

impl HashScaling {
    pub async fn report(&self, root: &Path) -> Result<Report> {
        let mut rows = Vec::new();
        for path in list_files(root.join(&self.results_dir), "csv").await? {
            rows.extend(read_csv::<HashRow>(&path).await?);
        }
        debug!("Loaded {} hash table rows", rows.len());

        let out = root.join(&self.output_dir);
        let workloads = rows
            .iter()
            .map(|r| r.workload.as_str())
            .unique()
            .collect::<Vec<_>>();
        let datasets = rows
            .iter()
            .map(|r| r.dataset)
            .unique()
            .sorted()
            .collect::<Vec<_>>();

        let mut throughput_charts = Vec::new();
        let mut speedup_charts = Vec::new();
        for (workload, dataset) in workloads.iter().cartesian_product(&datasets) {
            let subset = rows
                .iter()
                .filter(|r| r.workload == *workload && r.dataset == *dataset)
                .sorted_by_key(|r| r.threads)
                .collect::<Vec<_>>();
            let Some(base) = subset.first() else {
                continue;
            };

            let chart = XyChart::new(
                out.join(format!("{workload}_{dataset}_throughput.png")),
                format!("{workload} - Dataset {dataset} keys"),
                Axis::log2("Number of Threads"),
                Axis::linear("Throughput (ops/s)"),
            )
            .with_size(SIZE);
            throughput_charts.push(Chart::from(with_lock_series(
                chart,
                &subset,
                |r| Some(r.coarse_tput),
                |r| Some(r.fine_tput),
            )));

            if base.coarse_tput <= 0.0 || base.fine_tput <= 0.0 {
                warn!(
                    "{workload} {dataset}: throughput at {} threads is not positive, no speedup",
                    base.threads
                );
                continue;
            }
            let unit = if base.threads == 1 { "Thread" } else { "Threads" };
            let chart = XyChart::new(
                out.join(format!("{workload}_{dataset}_speedup.png")),
                format!("{workload} - Dataset {dataset} keys (Speedup)"),
                Axis::log2("Number of Threads"),
                Axis::linear(format!("Speedup vs {} {unit}", base.threads)),
            )
            .with_size(SIZE);
            speedup_charts.push(Chart::from(with_lock_series(
                chart,
                &subset,
                |r| ratio(r.coarse_tput, base.coarse_tput),
                |r| ratio(r.fine_tput, base.fine_tput),
            )));
        }

        throughput_charts.extend(speedup_charts);
        Ok(Report::new(throughput_charts))
    }
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for HashScaling {
    fn name(&self) -> &'static str {
        "HashScaling"
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.results_dir.clone()]
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn plot(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let written = self.report(root).await?.publish()?;
        for path in &written {
            println!("Saved plot: {path:?}");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const HEADER: &str = "Dataset,Threads,Workload,CoarseTput,FineTput\n";

    fn results() -> TempDir {
        let dir = TempDir::new().unwrap();
        let results = dir.path().join("results");
        std::fs::create_dir_all(&results).unwrap();
        std::fs::write(
            results.join("lookup.csv"),
            format!("{HEADER}100000,4,lookup,150,400\n100000,1,lookup,100,100\n"),
        )
        .unwrap();
        std::fs::write(
            results.join("insert.csv"),
            format!("{HEADER}10000,2,insert,0,50\n10000,8,insert,10,90\n"),
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn throughput_sorted_by_threads() {
        let dir = results();
        let report = HashScaling::default().report(dir.path()).await.unwrap();
        let Some(Chart::Xy(chart)) = report.chart("lookup_100000_throughput.png") else {
            panic!("missing throughput chart");
        };
        assert_eq!(chart.series[0].points, vec![(1.0, 100.0), (4.0, 150.0)]);
        assert_eq!(chart.series[1].points, vec![(1.0, 100.0), (4.0, 400.0)]);
        assert_eq!(chart.series[1].style, plot_common::SeriesStyle::Line(Some(Marker::Square)));
        assert!(report.chart("lookup_10000_throughput.png").is_none());
    }

    #[tokio::test]
    async fn speedup_relative_to_fewest_threads() {
        let dir = results();
        let report = HashScaling::default().report(dir.path()).await.unwrap();
        let Some(Chart::Xy(chart)) = report.chart("lookup_100000_speedup.png") else {
            panic!("missing speedup chart");
        };
        assert_eq!(chart.series[0].points, vec![(1.0, 1.0), (4.0, 1.5)]);
        assert_eq!(chart.series[1].points, vec![(1.0, 1.0), (4.0, 4.0)]);
        assert_eq!(chart.y.label, "Speedup vs 1 Thread");
    }

    #[tokio::test]
    async fn zero_baseline_skips_speedup() {
        let dir = results();
        let report = HashScaling::default().report(dir.path()).await.unwrap();
        assert!(report.chart("insert_10000_throughput.png").is_some());
        assert!(report.chart("insert_10000_speedup.png").is_none());
    }

    #[tokio::test]
    async fn report_is_deterministic() {
        let dir = results();
        let plot = HashScaling::default();
        assert_eq!(
            plot.report(dir.path()).await.unwrap(),
            plot.report(dir.path()).await.unwrap()
        );
    }
}
