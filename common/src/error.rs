use std::path::PathBuf;

use thiserror::Error;

/// Result data that does not have the shape a report relies on.
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("Run {run} in {path:?} does not have exactly 2 modes (found {found})")]
    UnpairedRun {
        run: String,
        path: PathBuf,
        found: usize,
    },
    #[error("Expected exactly 2 observations, got {0}")]
    NotPaired(usize),
    #[error("{what} must be positive, got {value}")]
    NonPositive { what: &'static str, value: f64 },
    #[error("Need at least {needed} points, got {got}")]
    InsufficientPoints { needed: usize, got: usize },
    #[error("All x values are identical ({0}), cannot fit a line")]
    DegenerateFit(f64),
    #[error("No usable rows in {0:?}")]
    NoData(PathBuf),
}
