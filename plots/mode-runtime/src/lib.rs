use std::path::{Path, PathBuf};

use common::{
    error::DataError,
    plot::Plot,
    stats::{group_by_key, mean, paired_speedup, sample_std},
    table::{file_stem, list_files, read_csv},
    util::title_case,
};
use eyre::Result;
use itertools::Itertools;
use plot_common::{BarChart, BarGroup, Chart, Report, Rgb};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

const MODE_SIZE: (u32, u32) = (1200, 800);
const SPEEDUP_SIZE: (u32, u32) = (1600, 1200);

#[derive(Debug, Clone, Deserialize)]
struct ModeRow {
    #[serde(rename = "Mode", alias = "THP_Mode")]
    mode: String,
    #[serde(rename = "Time_s")]
    time_s: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct PairedRow {
    #[serde(rename = "Run")]
    run: String,
    #[serde(rename = "Time_s")]
    time_s: f64,
}

/// Every CSV in `dir` with its file stem, in name order
async fn load_benchmarks<T: DeserializeOwned>(dir: &Path) -> Result<Vec<(String, PathBuf, Vec<T>)>> {
    let mut benchmarks = Vec::new();
    for path in list_files(dir, "csv").await? {
        let rows = read_csv(&path).await?;
        benchmarks.push((file_stem(&path)?, path, rows));
    }
    Ok(benchmarks)
}

fn no_csv_files(dir: &Path) -> Report {
    Report::default().with_summary(format!("No CSV files found in {dir:?}"))
}

/// Mean runtime per mode with sample standard deviation, one chart per CSV
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeRuntime {
    pub results_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for ModeRuntime {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            output_dir: PathBuf::from("plots"),
        }
    }
}

impl ModeRuntime {
    pub async fn report(&self, root: &Path) -> Result<Report> {
        let dir = root.join(&self.results_dir);
        let benchmarks = load_benchmarks::<ModeRow>(&dir).await?;
        if benchmarks.is_empty() {
            return Ok(no_csv_files(&dir));
        }

        let out = root.join(&self.output_dir);
        let charts = benchmarks
            .into_iter()
            .map(|(stem, _, rows)| mode_chart(&stem, &rows, &out))
            .collect();
        Ok(Report::new(charts))
    }
}

fn mode_chart(stem: &str, rows: &[ModeRow], out: &Path) -> Chart {
    let modes = group_by_key(rows, |r| r.mode.clone())
        .into_iter()
        .filter_map(|(mode, group)| {
            let times = group.iter().map(|r| r.time_s).collect::<Vec<_>>();
            Some((mode, mean(&times)?, sample_std(&times)))
        })
        .sorted_by(|a, b| a.1.total_cmp(&b.1))
        .collect::<Vec<_>>();
    debug!("{stem}: {} modes", modes.len());

    BarChart::new(
        out.join(format!("{stem}.png")),
        format!("{} Benchmark", title_case(stem)),
        "Average Runtime (s)",
        modes.iter().map(|(mode, _, _)| mode.clone()).collect(),
    )
    .with_x_label("Mode")
    .with_group(
        BarGroup::new(modes.iter().map(|m| Some(m.1)).collect(), Rgb::MUTED_BLUE)
            .with_errors(modes.iter().map(|m| m.2).collect()),
    )
    .with_annotation(2, "")
    .with_size(MODE_SIZE)
    .into()
}

/// Average slower/faster ratio of the two modes of each run, one bar per CSV
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairedSpeedup {
    pub results_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PairedSpeedup {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            output_dir: PathBuf::from("plots"),
        }
    }
}

/// Mean over runs of the per-run speedup. Every run must hold exactly two
/// observations.
fn benchmark_speedup(path: &Path, rows: &[PairedRow]) -> Result<f64, DataError> {
    let mut speedups = Vec::new();
    for (run, group) in group_by_key(rows, |r| r.run.clone()) {
        if group.len() != 2 {
            return Err(DataError::UnpairedRun {
                run,
                path: path.to_path_buf(),
                found: group.len(),
            });
        }
        let times = group.iter().map(|r| r.time_s).collect::<Vec<_>>();
        speedups.push(paired_speedup(&times)?);
    }
    mean(&speedups).ok_or_else(|| DataError::NoData(path.to_path_buf()))
}

impl PairedSpeedup {
    pub async fn report(&self, root: &Path) -> Result<Report> {
        let dir = root.join(&self.results_dir);
        let benchmarks = load_benchmarks::<PairedRow>(&dir).await?;
        if benchmarks.is_empty() {
            return Ok(no_csv_files(&dir));
        }

        let mut names = Vec::new();
        let mut speedups = Vec::new();
        for (stem, path, rows) in &benchmarks {
            let speedup = benchmark_speedup(path, rows)?;
            debug!("{stem}: {speedup:.3}x");
            names.push(stem.clone());
            speedups.push(Some(speedup));
        }

        let chart = BarChart::new(
            root.join(&self.output_dir).join("paired_speedup.png"),
            "Paired Speedup Across Benchmarks",
            "Average Speedup (slower/faster)",
            names,
        )
        .with_group(BarGroup::new(speedups, Rgb::MUTED_BLUE))
        .with_annotation(2, "x")
        .with_size(SPEEDUP_SIZE);
        Ok(Report::new(vec![chart.into()]))
    }
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for ModeRuntime {
    fn name(&self) -> &'static str {
        "ModeRuntime"
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

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for PairedSpeedup {
    fn name(&self) -> &'static str {
        "PairedSpeedup"
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
            println!("Saved paired speedup plot: {path:?}");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn results(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let results = dir.path().join("results");
        std::fs::create_dir_all(&results).unwrap();
        for (name, data) in files {
            std::fs::write(results.join(name), data).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn modes_sorted_by_mean_runtime() {
        let dir = results(&[(
            "thp_test.csv",
            "Run,THP_Mode,Time_s\n1,never,4.0\n1,always,2.0\n2,never,6.0\n2,always,2.0\n",
        )]);
        let report = ModeRuntime::default().report(dir.path()).await.unwrap();
        let Some(Chart::Bar(chart)) = report.chart("thp_test.png") else {
            panic!("missing mode chart");
        };
        assert_eq!(chart.title, "Thp Test Benchmark");
        assert_eq!(chart.categories, ["always", "never"]);
        assert_eq!(chart.groups[0].values, vec![Some(2.0), Some(5.0)]);
        assert_eq!(chart.groups[0].errors[0], Some(0.0));
        assert!((chart.groups[0].errors[1].unwrap() - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(chart.annotation.as_ref().map(|a| a.format(5.0)), Some("5.00".to_owned()));
    }

    #[tokio::test]
    async fn single_observation_has_no_error_bar() {
        let dir = results(&[("zero_copy_io.csv", "Run,Mode,Time_s\n1,copy,3.0\n1,zero_copy,1.0\n")]);
        let report = ModeRuntime::default().report(dir.path()).await.unwrap();
        let Some(Chart::Bar(chart)) = report.chart("zero_copy_io.png") else {
            panic!("missing mode chart");
        };
        assert_eq!(chart.title, "Zero Copy Io Benchmark");
        assert_eq!(chart.groups[0].errors, vec![None, None]);
    }

    #[tokio::test]
    async fn speedup_is_mean_of_per_run_ratios() {
        let dir = results(&[
            ("b_async.csv", "Run,Mode,Time_s\n1,sync,8.0\n1,async,2.0\n2,sync,3.0\n2,async,6.0\n"),
            ("a_smt.csv", "Run,Mode,Time_s\n1,on,1.5\n1,off,1.5\n"),
        ]);
        let report = PairedSpeedup::default().report(dir.path()).await.unwrap();
        let Some(Chart::Bar(chart)) = report.chart("paired_speedup.png") else {
            panic!("missing speedup chart");
        };
        assert_eq!(chart.categories, ["a_smt", "b_async"]);
        assert_eq!(chart.groups[0].values, vec![Some(1.0), Some(3.0)]);
        for value in chart.groups[0].values.iter().flatten() {
            assert!(*value >= 1.0);
        }
        assert_eq!(chart.annotation.as_ref().map(|a| a.format(3.0)), Some("3.00x".to_owned()));
    }

    #[tokio::test]
    async fn unpaired_run_is_an_error() {
        let dir = results(&[("smt.csv", "Run,Mode,Time_s\n1,on,1.0\n1,off,2.0\n2,on,1.0\n")]);
        let err = PairedSpeedup::default().report(dir.path()).await.unwrap_err();
        let data_err = err.downcast_ref::<DataError>().unwrap();
        assert!(matches!(data_err, DataError::UnpairedRun { run, found: 1, .. } if run == "2"));
        assert!(err.to_string().contains("smt.csv"));
    }

    #[tokio::test]
    async fn no_csv_files_is_not_an_error() {
        let dir = results(&[("notes.txt", "")]);
        let report = ModeRuntime::default().report(dir.path()).await.unwrap();
        assert!(report.charts.is_empty());
        assert!(report.summary[0].contains("No CSV files"));
        let report = PairedSpeedup::default().report(dir.path()).await.unwrap();
        assert!(report.charts.is_empty());
    }

    #[tokio::test]
    async fn report_is_deterministic() {
        let dir = results(&[("smt.csv", "Run,Mode,Time_s\n1,on,1.0\n1,off,2.0\n")]);
        let plot = PairedSpeedup::default();
        assert_eq!(
            plot.report(dir.path()).await.unwrap(),
            plot.report(dir.path()).await.unwrap()
        );
    }
}
