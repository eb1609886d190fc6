use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::plot::Plot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    /// Directory every plot resolves its relative paths against
    #[serde(default = "default_root")]
    pub root: PathBuf,
    pub plots: Vec<Box<dyn Plot>>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
