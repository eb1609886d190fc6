use std::path::{Path, PathBuf};

use common::{
    plot::Plot,
    stats::{F64Key, group_by_key, group_mean, mean, throughput},
    table::read_csv,
};
use eyre::Result;
use plot_common::{Axis, Chart, Report, Rgb, Series, XyChart};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SIZE: (u32, u32) = (1600, 1200);
const DYNAMIC_FILTERS: [&str; 2] = ["cuckoo", "quotient"];

/// Space, accuracy and throughput of approximate membership filters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterTradeoffs {
    pub results_file: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for FilterTradeoffs {
    fn default() -> Self {
        Self {
            results_file: PathBuf::from("results/all_results.csv"),
            output_dir: PathBuf::from("plots"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilterRow {
    pub filter: String,
    #[serde(rename = "N")]
    pub n: f64,
    #[serde(rename = "FPR_Target")]
    pub fpr_target: f64,
    pub workload: String,
    pub neg_share: f64,
    pub load_factor: f64,
    pub threads: u32,
    #[serde(rename = "Insert_s")]
    pub insert_s: f64,
    #[serde(rename = "Query_s")]
    pub query_s: f64,
    pub false_pos_rate: f64,
    #[serde(rename = "BPE")]
    pub bpe: f64,
}

impl FilterRow {
    pub fn query_throughput(&self) -> Option<f64> {
        throughput(self.n, self.query_s)
    }

    pub fn insert_throughput(&self) -> Option<f64> {
        throughput(self.n, self.insert_s)
    }
}

pub fn filter_color(filter: &str) -> Rgb {
    match filter {
        "bloom" => Rgb::MUTED_BLUE,
        "xor" => Rgb::MUTED_GREEN,
        "cuckoo" => Rgb::MUTED_RED,
        "quotient" => Rgb::MUTED_PURPLE,
        _ => Rgb::cycle(0),
    }
}

/// bloom, xor, cuckoo, and quotient only when the results contain it
fn filter_order(rows: &[FilterRow]) -> Vec<&'static str> {
    let mut order = vec!["bloom", "xor", "cuckoo"];
    if rows.iter().any(|r| r.filter == "quotient") {
        order.push("quotient");
    }
    order
}

/// One line per filter of the mean of `value` over each `key`
struct FilterLines<'a> {
    rows: &'a [FilterRow],
    filters: Vec<&'static str>,
}

impl FilterLines<'_> {
    fn chart(
        &self,
        chart: XyChart,
        keep: impl Fn(&FilterRow) -> bool,
        key: impl Fn(&FilterRow) -> f64,
        value: impl Fn(&FilterRow) -> Option<f64>,
    ) -> Chart {
        let mut chart = chart.with_size(SIZE);
        for filter in &self.filters {
            let subset = self
                .rows
                .iter()
                .filter(|r| r.filter == *filter && keep(*r))
                .collect::<Vec<_>>();
            let points = group_mean(&subset, |r| F64Key(key(*r)), |r| value(*r))
                .into_iter()
                .map(|(k, v)| (k.0, v))
                .collect::<Vec<_>>();
            if points.is_empty() {
                debug!("No {filter} rows for {:?}", chart.filepath);
                continue;
            }
            chart = chart.with_series(
                Series::line(points, filter_color(filter)).with_label(*filter),
            );
        }
        chart.into()
    }
}

/// Mean observed FPR against mean BPE per target FPR
fn space_vs_accuracy(rows: &[FilterRow], filters: &[&str], out: &Path) -> Chart {
    let mut chart = XyChart::new(
        out.join("space_vs_accuracy.png"),
        "Space vs Accuracy (Bloom, XOR, Cuckoo)",
        Axis::log10("False Positive Rate (log scale)"),
        Axis::linear("Bits per Entry (BPE)"),
    )
    .with_size(SIZE);
    for filter in filters.iter().filter(|f| **f != "quotient") {
        let subset = rows.iter().filter(|r| r.filter == *filter);
        let points = group_by_key(subset, |r| F64Key(r.fpr_target))
            .into_values()
            .filter_map(|group| {
                let fpr = group.iter().map(|r| r.false_pos_rate).collect::<Vec<_>>();
                let bpe = group.iter().map(|r| r.bpe).collect::<Vec<_>>();
                Some((mean(&fpr)?, mean(&bpe)?))
            })
            .collect::<Vec<_>>();
        if points.is_empty() {
            continue;
        }
        chart = chart.with_series(Series::line(points, filter_color(filter)).with_label(*filter));
    }
    chart.into()
}

impl FilterTradeoffs {
    pub async fn report(&self, root: &Path) -> Result<Report> {
        let path = root.join(&self.results_file);
        let rows = read_csv::<FilterRow>(&path).await?;
        let out = root.join(&self.output_dir);

        let lines = FilterLines {
            rows: &rows,
            filters: filter_order(&rows),
        };
        let query_axis = || Axis::linear("Query Throughput (ops/s)");
        let charts = vec![
            space_vs_accuracy(&rows, &lines.filters, &out),
            lines.chart(
                XyChart::new(
                    out.join("lookup_throughput.png"),
                    "Lookup Throughput vs Negative Lookup Share",
                    Axis::linear("Negative Lookup Share (%)"),
                    query_axis(),
                ),
                |r| r.workload == "read-only",
                |r| r.neg_share * 100.0,
                FilterRow::query_throughput,
            ),
            FilterLines {
                rows: &rows,
                filters: DYNAMIC_FILTERS.to_vec(),
            }
            .chart(
                XyChart::new(
                    out.join("insert_delete_throughput.png"),
                    "Insert/Delete Throughput vs Load Factor (Dynamic Filters)",
                    Axis::linear("Load Factor"),
                    Axis::linear("Insert Throughput (ops/s)"),
                ),
                |r| r.workload != "read-only",
                |r| r.load_factor,
                FilterRow::insert_throughput,
            ),
            lines.chart(
                XyChart::new(
                    out.join("thread_scaling.png"),
                    "Thread Scaling (Read-Mostly Workload)",
                    Axis::linear("Threads"),
                    query_axis(),
                ),
                |r| r.workload == "read-mostly",
                |r| r.threads as f64,
                FilterRow::query_throughput,
            ),
            lines.chart(
                XyChart::new(
                    out.join("throughput_vs_size.png"),
                    "Throughput vs Dataset Size (Read-Only, No Negatives)",
                    Axis::linear("Dataset Size (Million Keys)"),
                    query_axis(),
                ),
                |r| r.workload == "read-only" && r.neg_share == 0.0,
                |r| r.n / 1e6,
                FilterRow::query_throughput,
            ),
        ];

        Ok(Report::new(charts).with_summary(format!(
            "Loaded {} rows from {:?}",
            rows.len(),
            self.results_file
        )))
    }
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for FilterTradeoffs {
    fn name(&self) -> &'static str {
        "FilterTradeoffs"
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.results_file.clone()]
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn plot(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let written = self.report(root).await?.publish()?;
        for path in &written {
            println!("Saved: {path:?}");
        }
        Ok(written)
    }
}
