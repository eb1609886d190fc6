use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use common::{
    plot::Plot,
    stats::{group_mean, ratio},
    table::read_csv,
};
use eyre::Result;
use itertools::Itertools;
use plot_common::{Axis, BarChart, BarGroup, Chart, Report, Rgb, Series, XyChart};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SWEEP_FILE: &str = "output.csv";
const MISALIGN_FILE: &str = "misalign_output.csv";
const STRIDE_FILE: &str = "stride_output.csv";

const SIZE: (u32, u32) = (800, 600);
const DTYPES: [&str; 2] = ["f32", "f64"];
const IMPLS: [&str; 2] = ["simd", "scalar"];

/// SIMD against scalar compute kernels over problem size, stride and alignment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelSweep {
    pub results_dir: PathBuf,
    pub output_dir: PathBuf,
    pub locality_kernel: String,
    pub locality_dtype: String,
}

impl Default for KernelSweep {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            output_dir: PathBuf::from("graphs"),
            locality_kernel: "saxpy".to_owned(),
            locality_dtype: "f32".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KernelRow {
    pub kernel: String,
    pub dtype: String,
    #[serde(rename = "impl")]
    pub implementation: String,
    #[serde(rename = "N")]
    pub n: u64,
    pub stride: Option<f64>,
    pub misalign: String,
    pub time_ms: f64,
    pub gflops: f64,
}

fn select<'a>(
    rows: &'a [KernelRow],
    kernel: &str,
    dtype: &str,
    implementation: &str,
) -> Vec<&'a KernelRow> {
    rows.iter()
        .filter(|r| r.kernel == kernel && r.dtype == dtype && r.implementation == implementation)
        .collect()
}

fn gflops_by_n(rows: &[&KernelRow]) -> Vec<(f64, f64)> {
    rows.iter()
        .sorted_by_key(|r| r.n)
        .map(|r| (r.n as f64, r.gflops))
        .collect()
}

impl KernelSweep {
    /// Builds every chart from the three sweep files without rendering
    pub async fn report(&self, root: &Path) -> Result<Report> {
        let dir = root.join(&self.results_dir);
        let (sweep, misalign, stride) = tokio::try_join!(
            read_csv::<KernelRow>(dir.join(SWEEP_FILE)),
            read_csv::<KernelRow>(dir.join(MISALIGN_FILE)),
            read_csv::<KernelRow>(dir.join(STRIDE_FILE)),
        )?;

        let out = root.join(&self.output_dir);
        let mut charts = self.kernel_charts(&sweep, &out);
        charts.extend(self.speedup_charts(&sweep, &out));
        charts.extend(self.locality_chart(&sweep, &out));
        charts.extend(stride_chart(&stride, &out));
        charts.extend(alignment_chart(&misalign, &out));
        Ok(Report::new(charts))
    }

    fn kernel_charts(&self, rows: &[KernelRow], out: &Path) -> Vec<Chart> {
        let mut charts = Vec::new();
        for kernel in rows.iter().map(|r| r.kernel.as_str()).unique() {
            for (dtype, implementation) in DTYPES.iter().cartesian_product(IMPLS) {
                let subset = select(rows, kernel, dtype, implementation);
                if subset.is_empty() {
                    debug!("No {kernel} {implementation} {dtype} rows");
                    continue;
                }
                let chart = XyChart::new(
                    out.join(format!("{kernel}_{implementation}_{dtype}.png")),
                    format!(
                        "{} - {} {dtype}",
                        kernel.to_uppercase(),
                        implementation.to_uppercase()
                    ),
                    Axis::log10("Problem Size N"),
                    Axis::linear("GFLOP/s"),
                )
                .with_series(
                    Series::line(gflops_by_n(&subset), Rgb::BLUE)
                        .with_label(format!("{implementation}-{dtype}")),
                )
                .with_size(SIZE);
                charts.push(chart.into());
            }
        }
        charts
    }

    /// Scalar time over SIMD time, joined on N after averaging repeated sizes
    fn speedup_charts(&self, rows: &[KernelRow], out: &Path) -> Vec<Chart> {
        let mut charts = Vec::new();
        for kernel in rows.iter().map(|r| r.kernel.as_str()).unique() {
            for dtype in DTYPES {
                let time_per_n = |implementation: &str| {
                    group_mean(
                        &select(rows, kernel, dtype, implementation),
                        |r| r.n,
                        |r| Some(r.time_ms),
                    )
                    .into_iter()
                    .collect::<BTreeMap<_, _>>()
                };
                let simd = time_per_n("simd");
                let scalar = time_per_n("scalar");
                if simd.is_empty() || scalar.is_empty() {
                    debug!("{kernel} {dtype} lacks one implementation, no speedup");
                    continue;
                }

                let points = scalar
                    .iter()
                    .filter_map(|(n, scalar)| {
                        let speedup = ratio(*scalar, *simd.get(n)?)?;
                        Some((*n as f64, speedup))
                    })
                    .collect::<Vec<_>>();
                let chart = XyChart::new(
                    out.join(format!("{kernel}_speedup_time_{dtype}.png")),
                    format!("{} Speedup (Time-based) - {dtype}", kernel.to_uppercase()),
                    Axis::log10("Problem Size N"),
                    Axis::linear("Speedup (Scalar Time / SIMD Time)"),
                )
                .with_series(Series::line(points, Rgb::PURPLE))
                .with_size(SIZE);
                charts.push(chart.into());
            }
        }
        charts
    }

    fn locality_chart(&self, rows: &[KernelRow], out: &Path) -> Option<Chart> {
        let subset = rows
            .iter()
            .filter(|r| r.kernel == self.locality_kernel && r.dtype == self.locality_dtype)
            .collect::<Vec<_>>();
        if subset.is_empty() {
            debug!(
                "No rows for locality sweep of {} {}",
                self.locality_kernel, self.locality_dtype
            );
            return None;
        }

        let mut chart = XyChart::new(
            out.join(format!(
                "locality_sweep_{}_{}.png",
                self.locality_kernel, self.locality_dtype
            )),
            format!(
                "Locality Sweep ({} {})",
                self.locality_kernel.to_uppercase(),
                self.locality_dtype
            ),
            Axis::log10("Problem Size N"),
            Axis::linear("GFLOP/s"),
        )
        .with_size(SIZE);
        for (idx, implementation) in subset
            .iter()
            .map(|r| r.implementation.as_str())
            .unique()
            .enumerate()
        {
            let rows = subset
                .iter()
                .copied()
                .filter(|r| r.implementation == implementation)
                .collect::<Vec<_>>();
            chart = chart.with_series(
                Series::line(gflops_by_n(&rows), Rgb::cycle(idx)).with_label(implementation),
            );
        }
        Some(chart.into())
    }
}

fn stride_chart(rows: &[KernelRow], out: &Path) -> Option<Chart> {
    let first = rows.first()?;
    let points = rows
        .iter()
        .filter_map(|r| Some((r.stride?, r.gflops)))
        .collect::<Vec<_>>();
    let chart = XyChart::new(
        out.join("stride_effects.png"),
        format!(
            "Stride Effects ({}, {}, N={})",
            first.kernel, first.dtype, first.n
        ),
        Axis::linear("Stride"),
        Axis::linear("GFLOP/s"),
    )
    .with_series(Series::line(points, Rgb::BLUE))
    .with_size(SIZE);
    Some(chart.into())
}

/// One bar group per misalignment offset over `dtype-N` categories
fn alignment_chart(rows: &[KernelRow], out: &Path) -> Option<Chart> {
    let first = rows.first()?;
    let category = |r: &KernelRow| format!("{}-{}", r.dtype, r.n);
    let categories = rows.iter().map(category).unique().collect::<Vec<_>>();

    let mut chart = BarChart::new(
        out.join("alignment_tail.png"),
        format!("Alignment & Tail Handling ({})", first.kernel.to_uppercase()),
        "GFLOP/s",
        categories.clone(),
    )
    .with_size(SIZE);
    for (idx, misalign) in rows.iter().map(|r| r.misalign.as_str()).unique().enumerate() {
        let subset = rows
            .iter()
            .filter(|r| r.misalign == misalign)
            .collect::<Vec<_>>();
        let means = group_mean(&subset, |r| category(*r), |r| Some(r.gflops))
            .into_iter()
            .collect::<BTreeMap<_, _>>();
        let values = categories.iter().map(|c| means.get(c).copied()).collect();
        chart = chart.with_group(
            BarGroup::new(values, Rgb::cycle(idx)).with_label(format!("misalign={misalign}")),
        );
    }
    Some(chart.into())
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for KernelSweep {
    fn name(&self) -> &'static str {
        "KernelSweep"
    }

    fn inputs(&self) -> Vec<PathBuf> {
        [SWEEP_FILE, MISALIGN_FILE, STRIDE_FILE]
            .iter()
            .map(|x| self.results_dir.join(x))
            .collect()
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn plot(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let written = self.report(root).await?.publish()?;
        println!(
            "Generated {} graphs in {:?}",
            written.len(),
            root.join(&self.output_dir)
        );
        Ok(written)
    }
}
