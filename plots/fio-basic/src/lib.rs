use std::path::{Path, PathBuf};

use common::{
    plot::Plot,
    table::list_files,
    util::{format_value, markdown_table},
};
use eyre::{Context, Result};
use fio::{DirectionRecord, FioRecord};
use futures::future::try_join_all;
use itertools::Itertools;
use plot_common::{Axis, BarChart, BarGroup, Chart, Report, Rgb, Series, XyChart};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SIZE: (u32, u32) = (960, 720);
const BS_PATTERNS: [&str; 2] = ["randread", "read"];

/// SSD characterization from a directory of fio json results. Jobs are
/// told apart by their name prefix: `zeroq`, `bs_`, `mix_<N>R`,
/// `qd_randread` and `tail_lat`.
///
/// Block sizes are binary, so `4k` sits at x = 4096 on the `bs_*` charts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FioBasic {
    pub results_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for FioBasic {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            output_dir: PathBuf::from("plots"),
        }
    }
}

fn with_prefix<'a>(records: &'a [FioRecord], prefix: &str) -> Vec<&'a FioRecord> {
    records
        .iter()
        .filter(|r| r.jobname.starts_with(prefix))
        .collect()
}

/// ` (4k randrw)` from the first record that names both
fn workload_suffix(records: &[&FioRecord]) -> String {
    records
        .iter()
        .find_map(|r| Some(format!(" ({} {})", r.bs.as_ref()?, r.rw.as_ref()?)))
        .unwrap_or_default()
}

fn line_chart(
    out: &Path,
    file: &str,
    title: String,
    x: Axis,
    y: &str,
    series: Series,
) -> XyChart {
    XyChart::new(out.join(file), title, x, Axis::linear(y))
        .with_series(series)
        .with_size(SIZE)
}

impl FioBasic {
    pub async fn report(&self, root: &Path) -> Result<Report> {
        let dir = root.join(&self.results_dir);
        let files = list_files(&dir, "json").await?;
        let records = try_join_all(files.iter().map(|path| FioRecord::load(path))).await?;
        debug!("Loaded {} fio results from {dir:?}", records.len());

        let out = root.join(&self.output_dir);
        let mut report = Report::default();
        zero_queue(&records, &out, &mut report);
        block_size_sweep(&records, &out, &mut report)?;
        rw_mix(&records, &out, &mut report)?;
        queue_depth(&records, &out, &mut report);
        tail_latency(&records, &mut report);
        Ok(report)
    }
}

fn zero_queue(records: &[FioRecord], out: &Path, report: &mut Report) {
    let zeroq = with_prefix(records, "zeroq")
        .into_iter()
        .sorted_by(|a, b| a.jobname.cmp(&b.jobname))
        .collect::<Vec<_>>();

    let rows = zeroq
        .iter()
        .map(|r| {
            let read = r.read.as_ref();
            let write = r.write.as_ref();
            vec![
                r.file.clone(),
                r.jobname.clone(),
                r.rw.clone().unwrap_or_default(),
                r.bs.clone().unwrap_or_default(),
                r.iodepth.to_string(),
                r.numjobs.to_string(),
                format_value(read.map(|x| x.iops)),
                format_value(read.map(DirectionRecord::bw_mib)),
                format_value(read.map(|x| x.lat_mean_us)),
                format_value(write.map(|x| x.iops)),
                format_value(write.map(DirectionRecord::bw_mib)),
                format_value(write.map(|x| x.lat_mean_us)),
            ]
        })
        .collect::<Vec<_>>();
    report.summary.push(format!(
        "\nZero-queue baselines:\n{}",
        markdown_table(
            &[
                "file",
                "jobname",
                "rw",
                "bs",
                "iodepth",
                "numjobs",
                "read_iops",
                "read_bw_MiB",
                "read_lat_us",
                "write_iops",
                "write_bw_MiB",
                "write_lat_us",
            ],
            &rows,
        )
    ));

    report.charts.push(zeroq_bars(
        &zeroq,
        out.join("zeroq_bandwidth.png"),
        "Zero-queue: Bandwidth comparison",
        "Bandwidth (MiB/s)",
        DirectionRecord::bw_mib,
    ));
    report.charts.push(zeroq_bars(
        &zeroq,
        out.join("zeroq_iops.png"),
        "Zero-queue: IOPS comparison",
        "IOPS",
        |x| x.iops,
    ));
}

/// Read and write side by side per job
fn zeroq_bars(
    zeroq: &[&FioRecord],
    filepath: PathBuf,
    title: &str,
    y: &str,
    value: fn(&DirectionRecord) -> f64,
) -> Chart {
    let read = zeroq.iter().map(|r| r.read.as_ref().map(value)).collect();
    let write = zeroq.iter().map(|r| r.write.as_ref().map(value)).collect();
    BarChart::new(
        filepath,
        title,
        y,
        zeroq.iter().map(|r| r.jobname.clone()).collect(),
    )
    .with_group(BarGroup::new(read, Rgb::BLUE).with_label("read"))
    .with_group(BarGroup::new(write, Rgb::ORANGE).with_label("write"))
    .with_size(SIZE)
    .into()
}

fn block_size_sweep(records: &[FioRecord], out: &Path, report: &mut Report) -> Result<()> {
    let sweep = with_prefix(records, "bs_");
    for pattern in BS_PATTERNS {
        let mut points = Vec::new();
        for record in sweep.iter().filter(|r| r.rw.as_deref() == Some(pattern)) {
            let bs = record
                .block_size()
                .with_context(|| format!("Block size of {}", record.file))?;
            match (bs, &record.read) {
                (Some(bs), Some(read)) => points.push((bs as f64, read)),
                _ => debug!("{} has no block size or read metrics", record.file),
            }
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let bandwidth = points.iter().map(|(bs, r)| (*bs, r.bw_mib())).collect();
        let latency = points.iter().map(|(bs, r)| (*bs, r.lat_mean_us)).collect();
        report.charts.push(
            line_chart(
                out,
                &format!("bs_{pattern}_bandwidth.png"),
                format!("{pattern} - Bandwidth vs Block size"),
                Axis::log2("Block size (bytes)"),
                "Bandwidth (MiB/s)",
                Series::line(bandwidth, Rgb::BLUE),
            )
            .into(),
        );
        report.charts.push(
            line_chart(
                out,
                &format!("bs_{pattern}_latency.png"),
                format!("{pattern} - Latency vs Block size"),
                Axis::log2("Block size (bytes)"),
                "Latency (us)",
                Series::line(latency, Rgb::RED),
            )
            .into(),
        );
    }
    Ok(())
}

/// Read share parsed from `mix_<N>R...`, metrics of reads falling back to
/// writes for write-only mixes
fn rw_mix(records: &[FioRecord], out: &Path, report: &mut Report) -> Result<()> {
    let pattern = Regex::new(r"mix_(\d+)R")?;
    let mixes = with_prefix(records, "mix_");
    let points = mixes
        .iter()
        .filter_map(|r| {
            let Some(mix) = pattern
                .captures(&r.jobname)
                .and_then(|c| c[1].parse::<u32>().ok())
            else {
                warn!("No read share in job name {:?}", r.jobname);
                return None;
            };
            Some((mix as f64, r.primary()?))
        })
        .sorted_by(|a, b| a.0.total_cmp(&b.0))
        .collect::<Vec<_>>();
    let suffix = workload_suffix(&mixes);

    let iops = points.iter().map(|(x, r)| (*x, r.iops)).collect();
    let latency = points.iter().map(|(x, r)| (*x, r.lat_mean_us)).collect();
    let bandwidth = points.iter().map(|(x, r)| (*x, r.bw_mib())).collect();
    let charts = [
        ("mix_iops.png", "IOPS", "IOPS", Series::line(iops, Rgb::BLUE)),
        (
            "mix_latency.png",
            "Latency",
            "Latency (us)",
            Series::line(latency, Rgb::RED),
        ),
        (
            "mix_bandwidth.png",
            "Bandwidth",
            "Bandwidth (MiB/s)",
            Series::line(bandwidth, Rgb::GREEN),
        ),
    ];
    for (file, metric, y, series) in charts {
        report.charts.push(
            line_chart(
                out,
                file,
                format!("{metric} vs Read/Write Mix{suffix}"),
                Axis::linear("% Reads"),
                y,
                series,
            )
            .into(),
        );
    }
    Ok(())
}

fn queue_depth(records: &[FioRecord], out: &Path, report: &mut Report) {
    let sweep = with_prefix(records, "qd_randread");
    let suffix = workload_suffix(&sweep);
    let points = sweep
        .iter()
        .filter_map(|r| Some((r.iodepth, r.read.as_ref()?)))
        .sorted_by_key(|(depth, _)| *depth)
        .collect::<Vec<_>>();

    report.charts.push(
        line_chart(
            out,
            "qd_latency.png",
            format!("Latency vs Queue Depth{suffix}"),
            Axis::log2("Queue Depth"),
            "Latency (us)",
            Series::line(
                points.iter().map(|(d, r)| (*d as f64, r.lat_mean_us)).collect(),
                Rgb::RED,
            ),
        )
        .into(),
    );
    report.charts.push(
        line_chart(
            out,
            "qd_throughput.png",
            format!("Throughput vs Queue Depth{suffix}"),
            Axis::log2("Queue Depth"),
            "Throughput (IOPS)",
            Series::line(
                points.iter().map(|(d, r)| (*d as f64, r.iops)).collect(),
                Rgb::BLUE,
            ),
        )
        .into(),
    );
    report.charts.push(
        line_chart(
            out,
            "qd_tradeoff_curve.png",
            format!("Throughput vs Latency{suffix}"),
            Axis::linear("Latency (us)"),
            "Throughput (IOPS)",
            Series::line(
                points.iter().map(|(_, r)| (r.lat_mean_us, r.iops)).collect(),
                Rgb::BLUE,
            )
            .with_point_labels(points.iter().map(|(d, _)| format!("QD={d}")).collect()),
        )
        .into(),
    );
}

fn tail_latency(records: &[FioRecord], report: &mut Report) {
    let rows = with_prefix(records, "tail_lat")
        .into_iter()
        .map(|r| {
            let read = r.read.as_ref();
            vec![
                r.jobname.clone(),
                r.iodepth.to_string(),
                format_value(read.and_then(|x| x.p50_us)),
                format_value(read.and_then(|x| x.p95_us)),
                format_value(read.and_then(|x| x.p99_us)),
                format_value(read.and_then(|x| x.p999_us)),
            ]
        })
        .collect::<Vec<_>>();
    report.summary.push(format!(
        "\nTail latency characterization:\n{}",
        markdown_table(
            &[
                "jobname",
                "iodepth",
                "read_p50_us",
                "read_p95_us",
                "read_p99_us",
                "read_p99.9_us",
            ],
            &rows,
        )
    ));
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for FioBasic {
    fn name(&self) -> &'static str {
        "FioBasic"
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.results_dir.clone()]
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn plot(&self, root: &Path) -> Result<Vec<PathBuf>> {
        self.report(root).await?.publish()
    }
}
