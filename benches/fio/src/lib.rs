pub mod result;

use std::path::Path;

use common::util::parse_data_size;
use eyre::{Context, ContextCompat, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;
use tracing::debug;

use crate::result::{FioResult, IoStats};

const NS_PER_US: f64 = 1000.0;

/// Metrics of one I/O direction of a job
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionRecord {
    pub iops: f64,
    /// KiB/s
    pub bw_kib: f64,
    pub lat_mean_us: f64,
    pub p50_us: Option<f64>,
    pub p95_us: Option<f64>,
    pub p99_us: Option<f64>,
    pub p999_us: Option<f64>,
}

impl DirectionRecord {
    /// `None` when the direction moved no bytes
    fn from_stats(stats: &IoStats) -> Option<Self> {
        if stats.io_bytes <= 0 {
            return None;
        }
        let percentile = |p: f64| {
            stats
                .clat_ns
                .percentile
                .as_ref()
                .and_then(|x| x.get(p))
                .map(|x| x / NS_PER_US)
        };
        Some(Self {
            iops: stats.iops,
            bw_kib: stats.bw as f64,
            lat_mean_us: stats.clat_ns.mean / NS_PER_US,
            p50_us: percentile(50.0),
            p95_us: percentile(95.0),
            p99_us: percentile(99.0),
            p999_us: percentile(99.9),
        })
    }

    pub fn bw_mib(&self) -> f64 {
        self.bw_kib * common::KIB_TO_MIB
    }
}

/// The first job of one fio result file, flattened
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FioRecord {
    pub file: String,
    pub jobname: String,
    pub rw: Option<String>,
    pub bs: Option<String>,
    pub iodepth: u32,
    pub numjobs: u32,
    pub read: Option<DirectionRecord>,
    pub write: Option<DirectionRecord>,
}

impl FioRecord {
    pub fn from_result(file: &str, result: &FioResult) -> Result<Self> {
        let job = result
            .jobs
            .first()
            .with_context(|| format!("No jobs in {file}"))?;
        let options = &job.job_options;
        let count = |value: &Option<String>, name: &str| -> Result<u32> {
            match value {
                Some(x) => x
                    .trim()
                    .parse::<u32>()
                    .with_context(|| format!("Parse {name} {x:?} in {file}")),
                None => Ok(0),
            }
        };
        Ok(Self {
            file: file.to_owned(),
            jobname: job.jobname.clone(),
            rw: options.rw.clone(),
            bs: options.bs.clone(),
            iodepth: count(&options.iodepth, "iodepth")?,
            numjobs: count(&options.numjobs, "numjobs")?,
            read: DirectionRecord::from_stats(&job.read),
            write: DirectionRecord::from_stats(&job.write),
        })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let output = read_to_string(path)
            .await
            .with_context(|| format!("Read {path:?}"))?;
        let result = FioResult::from_output(&output).with_context(|| format!("Parse {path:?}"))?;
        let file = path
            .file_name()
            .and_then(|x| x.to_str())
            .with_context(|| format!("Invalid file name {path:?}"))?;
        debug!("Loaded {} jobs from {path:?}", result.jobs.len());
        Self::from_result(file, &result)
    }

    /// Block size in bytes, `None` when the job did not set one
    pub fn block_size(&self) -> Result<Option<u64>> {
        self.bs.as_deref().map(parse_data_size).transpose()
    }

    /// Read metrics, or write metrics for write-only jobs
    pub fn primary(&self) -> Option<&DirectionRecord> {
        self.read.as_ref().or(self.write.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const RANDREAD_QD4: &str = r#"{
      "fio version" : "fio-3.36",
      "timestamp" : 1727000000,
      "time" : "Sun Sep 22 10:13:20 2024",
      "jobs" : [
        {
          "jobname" : "qd_randread_4",
          "groupid" : 0,
          "error" : 0,
          "job options" : {
            "rw" : "randread",
            "bs" : "4k",
            "iodepth" : "4",
            "numjobs" : "1"
          },
          "read" : {
            "io_bytes" : 1048576,
            "bw" : 204800,
            "iops" : 51200.5,
            "clat_ns" : {
              "min" : 10000,
              "max" : 900000,
              "mean" : 77500.0,
              "stddev" : 1200.0,
              "N" : 256,
              "percentile" : {
                "50.000000" : 70000,
                "95.000000" : 95000,
                "99.000000" : 120000,
                "99.900000" : 400000
              }
            }
          },
          "write" : {
            "io_bytes" : 0,
            "bw" : 0,
            "iops" : 0.0,
            "clat_ns" : { "min" : 0, "max" : 0, "mean" : 0.0, "stddev" : 0.0, "N" : 0 }
          }
        }
      ]
    }"#;

    #[test]
    fn flattens_first_job() {
        let result: FioResult = serde_json::from_str(RANDREAD_QD4).unwrap();
        let record = FioRecord::from_result("qd4.json", &result).unwrap();
        assert_eq!(record.jobname, "qd_randread_4");
        assert_eq!(record.rw.as_deref(), Some("randread"));
        assert_eq!(record.iodepth, 4);
        assert_eq!(record.numjobs, 1);
        assert_eq!(record.block_size().unwrap(), Some(4096));
        assert!(record.write.is_none());

        let read = record.read.unwrap();
        assert_eq!(read.iops, 51200.5);
        assert_eq!(read.bw_mib(), 200.0);
        assert_eq!(read.lat_mean_us, 77.5);
        assert_eq!(read.p50_us, Some(70.0));
        assert_eq!(read.p999_us, Some(400.0));
    }

    #[test]
    fn missing_options_default_to_zero() {
        let result: FioResult =
            serde_json::from_str(r#"{"jobs": [{"jobname": "zeroq_write"}]}"#).unwrap();
        let record = FioRecord::from_result("w.json", &result).unwrap();
        assert_eq!(record.iodepth, 0);
        assert_eq!(record.numjobs, 0);
        assert_eq!(record.block_size().unwrap(), None);
        assert!(record.primary().is_none());
    }

    #[test]
    fn no_jobs_is_an_error() {
        let result: FioResult = serde_json::from_str(r#"{"jobs": []}"#).unwrap();
        assert!(FioRecord::from_result("empty.json", &result).is_err());
    }

    #[tokio::test]
    async fn skips_notes_before_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qd4.json");
        std::fs::write(&path, format!("note: both iodepth >= 1 and synchronous I/O engine\n{RANDREAD_QD4}")).unwrap();
        let record = FioRecord::load(&path).await.unwrap();
        assert_eq!(record.file, "qd4.json");
        assert_eq!(record.primary().map(|x| x.iops), Some(51200.5));
    }
}
