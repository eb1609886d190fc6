use std::collections::BTreeMap;

use eyre::{ContextCompat, Result};
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FioResult {
    #[serde(rename = "fio version", default)]
    pub fio_version: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub time: String,
    pub jobs: Vec<Job>,
    pub disk_util: Option<Vec<DiskUtil>>,
}

impl FioResult {
    /// Parses fio's json output. fio may print notes before the document,
    /// anything ahead of the first `{` is skipped.
    pub fn from_output(output: &str) -> Result<Self> {
        let start = output.find('{').context("No json object in fio output")?;
        Ok(serde_json::from_str(&output[start..])?)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub jobname: String,
    #[serde(default)]
    pub groupid: i64,
    #[serde(default)]
    pub error: i64,
    #[serde(rename = "job options", default)]
    pub job_options: JobOptions,
    #[serde(default)]
    pub read: IoStats,
    #[serde(default)]
    pub write: IoStats,
    #[serde(default)]
    pub job_runtime: i64,
    #[serde(default)]
    pub usr_cpu: f64,
    #[serde(default)]
    pub sys_cpu: f64,
}

/// fio reports every option as a string
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOptions {
    pub name: Option<String>,
    pub filename: Option<String>,
    pub rw: Option<String>,
    pub bs: Option<String>,
    pub ioengine: Option<String>,
    pub iodepth: Option<String>,
    pub numjobs: Option<String>,
    pub direct: Option<String>,
    pub runtime: Option<String>,
    pub ramp_time: Option<String>,
    pub size: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoStats {
    pub io_bytes: i64,
    pub io_kbytes: i64,
    pub bw_bytes: i64,
    /// KiB/s
    pub bw: i64,
    pub iops: f64,
    pub runtime: i64,
    pub total_ios: i64,
    pub slat_ns: LatNs,
    pub clat_ns: ClatNs,
    pub lat_ns: LatNs,
    pub bw_mean: f64,
    pub iops_mean: f64,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatNs {
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub stddev: f64,
    #[serde(rename = "N")]
    pub n: i64,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClatNs {
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub stddev: f64,
    #[serde(rename = "N")]
    pub n: i64,
    pub percentile: Option<Percentile>,
}

/// Completion latency percentiles in ns, keyed the way fio prints them
/// (`"99.000000"`)
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentile(pub BTreeMap<String, f64>);

impl Percentile {
    pub fn get(&self, percentile: f64) -> Option<f64> {
        self.0.get(&format!("{percentile:.6}")).copied()
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskUtil {
    pub name: String,
    pub read_ios: i64,
    pub write_ios: i64,
    pub read_merges: i64,
    pub write_merges: i64,
    pub read_ticks: i64,
    pub write_ticks: i64,
    pub in_queue: i64,
    pub util: f64,
}
