use std::path::{Path, PathBuf};

use chrono::Local;
use clap::{Parser, Subcommand};
use common::{config::Config, plot::run_plots};
use default_plots::{LOG_TARGETS, PlotKind, default_config};
use eyre::{Context, ContextCompat, Result, bail};
use tokio::fs::{read_to_string, try_exists, write};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long)]
    log: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available reports
    Ls,
    /// Run one report with its default paths
    Run {
        /// Report name, e.g. FioBasic or fio-basic
        report: String,
        /// Directory the report's paths are relative to
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Run every report listed in a config file
    Plot {
        #[arg(short, long, default_value = "reports.yaml")]
        config_file: PathBuf,
    },
    /// Write a config file listing every report with its defaults
    Init {
        #[arg(short, long, default_value = "reports.yaml")]
        config_file: PathBuf,
        #[arg(short, long, default_value = "reports")]
        name: String,
        /// Replace an existing config file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("bench_reports={log_level}"));

    if !args.log.is_empty() {
        for log in &args.log {
            env_filter = env_filter.add_directive(log.parse()?);
        }
    }

    for module in LOG_TARGETS {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking))
        .init();

    let res = match args.command {
        Commands::Ls => list_reports(),
        Commands::Run { report, dir } => run_report(&report, &dir).await,
        Commands::Plot { config_file } => plot(&config_file).await,
        Commands::Init {
            config_file,
            name,
            force,
        } => init(&config_file, name, force).await,
    };
    if let Err(err) = &res {
        error!("{err:#?}");
    }
    res
}

fn list_reports() -> Result<()> {
    for kind in PlotKind::ALL {
        println!("{} ({}) -> {}", kind.name(), kind.slug(), kind.describe()?);
    }
    Ok(())
}

async fn run_report(report: &str, dir: &Path) -> Result<()> {
    let kind = PlotKind::from_name(report)
        .with_context(|| format!("Unknown report {report:?}, see `ls` for the list"))?;
    let written = run_plots(&[kind.default_plot()], dir).await?;
    info!("{} wrote {} files under {dir:?}", kind.name(), written.len());
    Ok(())
}

async fn plot(config_file: &Path) -> Result<()> {
    let config: Config = serde_yml::from_str(
        &read_to_string(config_file)
            .await
            .with_context(|| format!("Reading {config_file:?}"))?,
    )
    .with_context(|| format!("Parsing {config_file:?}"))?;

    let written = run_plots(&config.plots, &config.root).await?;
    println!(
        "{}: {} reports, {} files written at {}",
        config.name,
        config.plots.len(),
        written.len(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

async fn init(config_file: &Path, name: String, force: bool) -> Result<()> {
    if !force && try_exists(config_file).await? {
        bail!("{config_file:?} already exists, pass --force to replace it");
    }
    let config = default_config(name);
    write(config_file, serde_yml::to_string(&config)?)
        .await
        .with_context(|| format!("Writing {config_file:?}"))?;
    println!("Wrote {} reports to {config_file:?}", config.plots.len());
    Ok(())
}
