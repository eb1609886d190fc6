use std::path::PathBuf;

use common::{config::Config, plot::Plot};
use filter_tradeoffs::FilterTradeoffs;
use fio_basic::FioBasic;
use hash_scaling::HashScaling;
use kernel_sweep::KernelSweep;
use memory_hierarchy::MemoryHierarchy;
use mode_runtime::{ModeRuntime, PairedSpeedup};

/// Tracing targets of every crate in the workspace
pub const LOG_TARGETS: &[&str] = &[
    "common",
    "plot_common",
    "fio",
    "kernel_sweep",
    "memory_hierarchy",
    "fio_basic",
    "mode_runtime",
    "filter_tradeoffs",
    "hash_scaling",
    "default_plots",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlotKind {
    KernelSweep,
    MemoryHierarchy,
    FioBasic,
    ModeRuntime,
    PairedSpeedup,
    FilterTradeoffs,
    HashScaling,
}

impl PlotKind {
    pub const ALL: [PlotKind; 7] = [
        PlotKind::KernelSweep,
        PlotKind::MemoryHierarchy,
        PlotKind::FioBasic,
        PlotKind::ModeRuntime,
        PlotKind::PairedSpeedup,
        PlotKind::FilterTradeoffs,
        PlotKind::HashScaling,
    ];

    pub fn default_plot(&self) -> Box<dyn Plot> {
        match *self {
            PlotKind::KernelSweep => Box::new(KernelSweep::default()),
            PlotKind::MemoryHierarchy => Box::new(MemoryHierarchy::default()),
            PlotKind::FioBasic => Box::new(FioBasic::default()),
            PlotKind::ModeRuntime => Box::new(ModeRuntime::default()),
            PlotKind::PairedSpeedup => Box::new(PairedSpeedup::default()),
            PlotKind::FilterTradeoffs => Box::new(FilterTradeoffs::default()),
            PlotKind::HashScaling => Box::new(HashScaling::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.default_plot().name()
    }

    /// Kebab-case form of the name, e.g. `kernel-sweep`
    pub fn slug(&self) -> String {
        let mut slug = String::new();
        for (i, c) in self.name().char_indices() {
            if c.is_uppercase() && i > 0 {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
        }
        slug
    }

    /// Matches either the report name or its slug, ignoring case
    pub fn from_name(name: &str) -> Option<PlotKind> {
        PlotKind::ALL.into_iter().find(|kind| {
            kind.name().eq_ignore_ascii_case(name) || kind.slug().eq_ignore_ascii_case(name)
        })
    }

    /// The default report as it would appear in a config file
    pub fn describe(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.default_plot())
    }
}

/// A config running every report with its default paths
pub fn default_config(name: impl Into<String>) -> Config {
    Config {
        name: name.into(),
        root: PathBuf::from("."),
        plots: PlotKind::ALL.iter().map(PlotKind::default_plot).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut names = PlotKind::ALL.iter().map(PlotKind::name).collect::<Vec<_>>();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), PlotKind::ALL.len());
    }

    #[test]
    fn lookup_by_name_or_slug() {
        assert_eq!(PlotKind::from_name("FioBasic"), Some(PlotKind::FioBasic));
        assert_eq!(PlotKind::from_name("kernel-sweep"), Some(PlotKind::KernelSweep));
        assert_eq!(PlotKind::from_name("PAIRED-SPEEDUP"), Some(PlotKind::PairedSpeedup));
        assert_eq!(PlotKind::from_name("ycsb"), None);
        assert_eq!(PlotKind::MemoryHierarchy.slug(), "memory-hierarchy");
    }

    #[test]
    fn describe_tags_the_type() {
        let json = PlotKind::HashScaling.describe().unwrap();
        assert!(json.contains(r#""type":"HashScaling""#));
        assert!(json.contains(r#""results_dir":"results""#));
    }

    #[test]
    fn default_config_round_trips() {
        let config = default_config("all");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        let names = parsed.plots.iter().map(|p| p.name()).collect::<Vec<_>>();
        let expected = PlotKind::ALL.iter().map(PlotKind::name).collect::<Vec<_>>();
        assert_eq!(names, expected);
        assert_eq!(parsed.root, PathBuf::from("."));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let parsed: Config =
            serde_json::from_str(r#"{"name": "fio", "plots": [{"type": "FioBasic"}]}"#).unwrap();
        assert_eq!(parsed.plots[0].name(), "FioBasic");
        assert_eq!(parsed.plots[0].output_dir(), std::path::Path::new("plots"));
        assert_eq!(parsed.plots[0].inputs(), vec![PathBuf::from("results")]);
    }
}
