use core::fmt::Debug;
use std::path::{Path, PathBuf};

use dyn_clone::{DynClone, clone_trait_object};
use eyre::{Context, Result};
use futures::future::join_all;
use tokio::fs::create_dir_all;
use tracing::{debug, info, warn};

#[typetag::serde(tag = "type")]
#[async_trait::async_trait]
pub trait Plot: Debug + DynClone + Send + Sync {
    /// Name used to select the plot on the command line
    fn name(&self) -> &'static str;
    /// Files or directories the plot reads, relative to the root
    fn inputs(&self) -> Vec<PathBuf>;
    /// Directory the charts are written to, relative to the root
    fn output_dir(&self) -> &Path;
    /// Reads the results, renders every chart and prints the textual summary
    ///
    /// Arguments:
    /// * `root` - The directory relative paths are resolved against
    ///
    /// Returns the paths of the written images
    async fn plot(&self, root: &Path) -> Result<Vec<PathBuf>>;
}
clone_trait_object!(Plot);

pub async fn ensure_plot_dirs(dirs: &[PathBuf]) -> Result<()> {
    let create_jobs = dirs.iter().map(create_dir_all);
    for (res, dir) in join_all(create_jobs).await.into_iter().zip(dirs) {
        res.with_context(|| format!("Create {dir:?}"))?;
    }
    Ok(())
}

/// Runs each plot in order, stopping at the first failure
pub async fn run_plots(plots: &[Box<dyn Plot>], root: &Path) -> Result<Vec<PathBuf>> {
    if plots.is_empty() {
        debug!("No plots");
        return Ok(Vec::new());
    }

    let out_dirs = plots
        .iter()
        .map(|plot| root.join(plot.output_dir()))
        .collect::<Vec<_>>();
    ensure_plot_dirs(&out_dirs).await?;

    let mut written = Vec::new();
    for plot in plots {
        for input in plot.inputs() {
            if !root.join(&input).exists() {
                warn!("{}: input {input:?} not found under {root:?}", plot.name());
            }
        }
        debug!("Running {}", plot.name());
        let files = plot
            .plot(root)
            .await
            .wrap_err_with(|| format!("Plot {}", plot.name()))?;
        info!("{} wrote {} charts", plot.name(), files.len());
        written.extend(files);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Touch {
        output_dir: PathBuf,
        fail: bool,
    }

    #[async_trait::async_trait]
    #[typetag::serde]
    impl Plot for Touch {
        fn name(&self) -> &'static str {
            "Touch"
        }

        fn inputs(&self) -> Vec<PathBuf> {
            Vec::new()
        }

        fn output_dir(&self) -> &Path {
            &self.output_dir
        }

        async fn plot(&self, root: &Path) -> Result<Vec<PathBuf>> {
            if self.fail {
                eyre::bail!("no data");
            }
            let path = root.join(&self.output_dir).join("touch.png");
            tokio::fs::write(&path, b"").await?;
            Ok(vec![path])
        }
    }

    fn touch(dir: &str, fail: bool) -> Box<dyn Plot> {
        Box::new(Touch {
            output_dir: PathBuf::from(dir),
            fail,
        })
    }

    #[tokio::test]
    async fn creates_output_dirs_before_plotting() {
        let root = TempDir::new().unwrap();
        let written = run_plots(&[touch("a/b", false), touch("c", false)], root.path())
            .await
            .unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let root = TempDir::new().unwrap();
        let err = run_plots(&[touch("a", true), touch("b", false)], root.path())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Plot Touch"));
        assert!(!root.path().join("b/touch.png").exists());
    }

    #[tokio::test]
    async fn no_plots_is_empty() {
        let root = TempDir::new().unwrap();
        assert!(run_plots(&[], root.path()).await.unwrap().is_empty());
    }
}
