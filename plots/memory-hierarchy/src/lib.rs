use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use common::{
    plot::Plot,
    stats::{F64Key, group_by_key, group_mean, linear_fit, mean, ratio, read_percent},
    table::read_delimited,
    util::{format_value, markdown_table},
};
use eyre::Result;
use itertools::Itertools;
use plot_common::{Axis, Chart, OverlayChart, Report, Rgb, Series, XyChart};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CACHE_LATENCIES: &str = "cache_latencies.csv";
const LOADED_LATENCY: &str = "loaded_latency_1to1RW.csv";
const BANDWIDTH_STRIDE: &str = "bandwidth_stride_seq.csv";
const LATENCY_STRIDE: &str = "latency_stride_seq.csv";
const RW_MIX: &str = "Read_Write_Mix_latency_bw.csv";
const INTENSITY: &str = "intensity_loaded_latency_threads.csv";
const WORKING_SET: &str = "working_set_sweep.csv";
const CACHE_MISS: &str = "cache_miss_performance.csv";
const TLB_MISS: &str = "tlb_miss_performance.csv";

const SMALL: (u32, u32) = (600, 400);
const MEDIUM: (u32, u32) = (700, 500);

const CACHE_LEVELS: [&str; 4] = ["L1", "L2", "L3", "DRAM"];

/// Read/write ratio label and overlay file name, in column order of the
/// stride bandwidth file
const RW_RATIOS: [(&str, &str); 3] = [
    ("1:1 R/W", "stride_latency_bandwidth_overlay.png"),
    ("2:1 R/W", "stride_latency_bandwidth_overlay_2to1RW.png"),
    ("3:1 R/W", "stride_latency_bandwidth_overlay_3to1RW.png"),
];

/// Cache and DRAM latency, loaded latency, bandwidth and miss impact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryHierarchy {
    pub csv_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for MemoryHierarchy {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("csv"),
            output_dir: PathBuf::from("plots"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CacheLatency {
    cache: String,
    ns: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct LoadedLatency {
    #[serde(rename = "size_MiB")]
    size_mib: f64,
    #[serde(rename = "Inject_Delay")]
    inject_delay: f64,
    latency_ns: f64,
    #[serde(rename = "Bandwidth_MB/s")]
    bandwidth: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct StrideBandwidth {
    stride: f64,
    #[serde(rename = "1:1RW_MB/s")]
    one_to_one: f64,
    #[serde(rename = "2:1RW_MB/s")]
    two_to_one: f64,
    #[serde(rename = "3:1RW_MB/s")]
    three_to_one: f64,
}

impl StrideBandwidth {
    fn by_ratio(&self) -> [f64; 3] {
        [self.one_to_one, self.two_to_one, self.three_to_one]
    }
}

#[derive(Debug, Clone, Deserialize)]
struct StrideLatency {
    stride: f64,
    ns: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct RwMix {
    #[serde(rename = "Reads")]
    reads: f64,
    #[serde(rename = "Writes")]
    writes: f64,
    #[serde(rename = "Bandwidth_MB/s")]
    bandwidth: f64,
    #[serde(rename = "Latency_ns")]
    latency_ns: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct Intensity {
    threads: u32,
    #[serde(rename = "Bandwidth_MB/s")]
    bandwidth: f64,
    #[serde(rename = "Latency_ns")]
    latency_ns: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkingSet {
    #[serde(rename = "size_KB")]
    size_kb: f64,
    ns: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct CacheMiss {
    caches_misses: f64,
    time_elapsed_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct TlbMiss {
    tlb_load_misses: f64,
    tlb_loads: f64,
    time_elapsed_seconds: f64,
}

impl MemoryHierarchy {
    pub async fn report(&self, root: &Path) -> Result<Report> {
        let dir = root.join(&self.csv_dir);
        let (caches, loaded, stride_bw, stride_lat, mix) = tokio::try_join!(
            read_delimited::<CacheLatency>(dir.join(CACHE_LATENCIES)),
            read_delimited::<LoadedLatency>(dir.join(LOADED_LATENCY)),
            read_delimited::<StrideBandwidth>(dir.join(BANDWIDTH_STRIDE)),
            read_delimited::<StrideLatency>(dir.join(LATENCY_STRIDE)),
            read_delimited::<RwMix>(dir.join(RW_MIX)),
        )?;
        let (intensity, working_set, cache_miss, tlb_miss) = tokio::try_join!(
            read_delimited::<Intensity>(dir.join(INTENSITY)),
            read_delimited::<WorkingSet>(dir.join(WORKING_SET)),
            read_delimited::<CacheMiss>(dir.join(CACHE_MISS)),
            read_delimited::<TlbMiss>(dir.join(TLB_MISS)),
        )?;

        let out = root.join(&self.output_dir);
        let mut charts = vec![cache_latency_chart(&caches, &out), loaded_latency_chart(&loaded, &out)];
        charts.extend(stride_overlays(&stride_lat, &stride_bw, &out));
        charts.extend(rw_mix_charts(&mix, &out));
        charts.push(intensity_chart(&intensity, &out));
        charts.push(working_set_chart(&working_set, &out));

        let misses = cache_miss
            .iter()
            .map(|r| (r.caches_misses, r.time_elapsed_seconds))
            .collect::<Vec<_>>();
        charts.push(fitted_scatter(
            misses,
            out.join("cache_miss_perf.png"),
            "Impact of Cache Misses on Runtime",
            "Cache Misses",
        ));

        let ratios = tlb_miss
            .iter()
            .filter_map(|r| {
                let miss_ratio = ratio(r.tlb_load_misses, r.tlb_loads);
                if miss_ratio.is_none() {
                    warn!("Dropping TLB row with {} loads", r.tlb_loads);
                }
                Some((miss_ratio?, r.time_elapsed_seconds))
            })
            .collect::<Vec<_>>();
        charts.push(fitted_scatter(
            ratios,
            out.join("tlb_miss_perf.png"),
            "Impact of TLB Misses on Runtime",
            "TLB Miss Ratio (misses/loads)",
        ));

        Ok(Report::new(charts).with_summary(loaded_latency_table(&loaded)))
    }
}

/// Known levels in hierarchy order, repeated measurements averaged
fn cache_latency_chart(rows: &[CacheLatency], out: &Path) -> Chart {
    for row in rows.iter().filter(|r| !CACHE_LEVELS.contains(&r.cache.as_str())) {
        warn!("Dropping unknown cache level {:?}", row.cache);
    }
    let by_level = group_mean(rows, |r| r.cache.clone(), |r| Some(r.ns))
        .into_iter()
        .collect::<BTreeMap<_, _>>();
    let levels = CACHE_LEVELS
        .iter()
        .filter_map(|level| Some((*level, *by_level.get(*level)?)))
        .collect::<Vec<_>>();

    XyChart::new(
        out.join("cache_latencies.png"),
        "Zero-Queue Cache & DRAM Latencies",
        Axis::linear("Level"),
        Axis::linear("Latency (ns)"),
    )
    .with_categories(levels.iter().map(|(level, _)| level.to_string()).collect())
    .with_series(Series::line(
        levels
            .iter()
            .enumerate()
            .map(|(idx, (_, ns))| (idx as f64, *ns))
            .collect(),
        Rgb::BLUE,
    ))
    .with_size(SMALL)
    .into()
}

fn loaded_latency_chart(rows: &[LoadedLatency], out: &Path) -> Chart {
    let mut chart = XyChart::new(
        out.join("loaded_latency.png"),
        "Loaded Latency Sweep (1:1 R/W)",
        Axis::linear("Inject Delay"),
        Axis::linear("Latency (ns)"),
    )
    .with_size(MEDIUM);
    for (idx, (size, group)) in group_by_key(rows, |r| F64Key(r.size_mib))
        .into_iter()
        .enumerate()
    {
        let points = group
            .iter()
            .sorted_by(|a, b| a.inject_delay.total_cmp(&b.inject_delay))
            .map(|r| (r.inject_delay, r.latency_ns))
            .collect();
        chart = chart
            .with_series(Series::line(points, Rgb::cycle(idx)).with_label(format!("{} MiB", size.0)));
    }
    chart.into()
}

fn loaded_latency_table(rows: &[LoadedLatency]) -> String {
    let table = group_by_key(rows, |r| F64Key(r.size_mib))
        .into_iter()
        .map(|(size, group)| {
            let bandwidth = group.iter().map(|r| r.bandwidth).collect::<Vec<_>>();
            let latency = group.iter().map(|r| r.latency_ns).collect::<Vec<_>>();
            vec![
                format_value(Some(size.0)),
                format_value(mean(&bandwidth)),
                format_value(mean(&latency)),
            ]
        })
        .collect::<Vec<_>>();
    format!(
        "\n### Loaded Latency Table (Mean Bandwidth & Latency) ###\n{}",
        markdown_table(&["size_MiB", "Bandwidth_MB/s", "latency_ns"], &table)
    )
}

/// Latency line joined with each bandwidth column on stride
fn stride_overlays(
    latency: &[StrideLatency],
    bandwidth: &[StrideBandwidth],
    out: &Path,
) -> Vec<Chart> {
    let bandwidth = bandwidth
        .iter()
        .map(|r| (F64Key(r.stride), r.by_ratio()))
        .collect::<BTreeMap<_, _>>();
    let joined = latency
        .iter()
        .filter_map(|r| Some((r.stride, r.ns, *bandwidth.get(&F64Key(r.stride))?)))
        .collect::<Vec<_>>();
    if joined.len() < latency.len() {
        debug!(
            "{} latency strides have no bandwidth row",
            latency.len() - joined.len()
        );
    }

    RW_RATIOS
        .iter()
        .enumerate()
        .map(|(idx, (label, file))| {
            OverlayChart {
                filepath: out.join(file),
                title: format!("Latency & Bandwidth Across Strides ({label})"),
                x: Axis::log2("Stride (bytes)"),
                line_axis: "Latency (ns)".to_owned(),
                line: Series::line(joined.iter().map(|(s, ns, _)| (*s, *ns)).collect(), Rgb::BLUE)
                    .with_label("Latency (ns)"),
                bar_axis: "Bandwidth (MB/s)".to_owned(),
                bars: joined.iter().map(|(s, _, bw)| (*s, bw[idx])).collect(),
                bar_color: Rgb::ORANGE,
                bar_width: 0.3,
                size: MEDIUM,
            }
            .into()
        })
        .collect()
}

fn rw_mix_charts(rows: &[RwMix], out: &Path) -> Vec<Chart> {
    let with_percent = rows
        .iter()
        .filter_map(|r| {
            let percent = read_percent(r.reads, r.writes);
            if percent.is_none() {
                warn!("Dropping mix row with {} reads, {} writes", r.reads, r.writes);
            }
            Some((percent?, r))
        })
        .collect::<Vec<_>>();
    let bandwidth = group_mean(&with_percent, |(p, _)| F64Key(*p), |(_, r)| Some(r.bandwidth));
    let latency = group_mean(&with_percent, |(p, _)| F64Key(*p), |(_, r)| Some(r.latency_ns));

    let chart = |file: &str, metric: &str, label: &str, means: Vec<(F64Key, f64)>| -> Chart {
        XyChart::new(
            out.join(file),
            format!("Read/Write Mix: Mean {metric} vs % Reads"),
            Axis::linear("% Reads"),
            Axis::linear(label),
        )
        .with_series(Series::line(
            means.into_iter().map(|(p, v)| (p.0, v)).collect(),
            Rgb::BLUE,
        ))
        .with_size(MEDIUM)
        .into()
    };
    vec![
        chart("rw_bandwidth.png", "Bandwidth", "Bandwidth (MB/s)", bandwidth),
        chart("rw_latency.png", "Latency", "Latency (ns)", latency),
    ]
}

fn intensity_chart(rows: &[Intensity], out: &Path) -> Chart {
    let mut chart = XyChart::new(
        out.join("intensity_latency_bandwidth.png"),
        "Throughput vs Latency (Threads)",
        Axis::linear("Bandwidth (MB/s)"),
        Axis::linear("Latency (ns)"),
    )
    .with_size(MEDIUM);
    for (idx, (threads, group)) in group_by_key(rows, |r| r.threads).into_iter().enumerate() {
        let points = group
            .iter()
            .sorted_by(|a, b| a.bandwidth.total_cmp(&b.bandwidth))
            .map(|r| (r.bandwidth, r.latency_ns))
            .collect();
        chart = chart.with_series(
            Series::scatter(points, Rgb::cycle(idx)).with_label(format!("{threads} threads")),
        );
    }
    chart.into()
}

fn working_set_chart(rows: &[WorkingSet], out: &Path) -> Chart {
    XyChart::new(
        out.join("working_set.png"),
        "Working Set Size Sweep (Cache -> DRAM)",
        Axis::log2("Working Set Size (KB)"),
        Axis::linear("Latency (ns)"),
    )
    .with_series(Series::line(
        rows.iter().map(|r| (r.size_kb, r.ns)).collect(),
        Rgb::BLUE,
    ))
    .with_size(SMALL)
    .into()
}

/// Data scatter with its least-squares line across the observed x range
fn fitted_scatter(points: Vec<(f64, f64)>, filepath: PathBuf, title: &str, x_label: &str) -> Chart {
    let fit = match linear_fit(&points) {
        Ok(fit) => Some(fit),
        Err(err) => {
            warn!("No best fit for {title}: {err}");
            None
        }
    };
    let x_range = points.iter().map(|p| p.0).minmax().into_option();

    let mut chart = XyChart::new(
        filepath,
        title,
        Axis::linear(x_label),
        Axis::linear("Elapsed Time (s)"),
    )
    .with_series(Series::scatter(points, Rgb::BLUE).with_label("Data"))
    .with_size(MEDIUM);
    if let (Some(fit), Some((lo, hi))) = (fit, x_range) {
        chart = chart.with_series(
            Series::line(vec![(lo, fit.at(lo)), (hi, fit.at(hi))], Rgb::RED)
                .with_marker(None)
                .with_label("Best fit"),
        );
    }
    chart.into()
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for MemoryHierarchy {
    fn name(&self) -> &'static str {
        "MemoryHierarchy"
    }

    fn inputs(&self) -> Vec<PathBuf> {
        [
            CACHE_LATENCIES,
            LOADED_LATENCY,
            BANDWIDTH_STRIDE,
            LATENCY_STRIDE,
            RW_MIX,
            INTENSITY,
            WORKING_SET,
            CACHE_MISS,
            TLB_MISS,
        ]
        .iter()
        .map(|x| self.csv_dir.join(x))
        .collect()
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn plot(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let written = self.report(root).await?.publish()?;
        println!("Plots saved in {:?}", root.join(&self.output_dir));
        Ok(written)
    }
}
