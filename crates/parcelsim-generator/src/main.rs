//! CLI entry point for the ParcelSim generator and query benchmark.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use parcelsim_core::{Layout, PartitionId, Status, TimeBounds};
use parcelsim_generator::{
    config::{AppConfig, DEFAULT_CONFIG_FILE},
    payload::PayloadKind,
    report::Report,
    workload::run_windows,
};
use parcelsim_query::{
    Benchmark, BenchmarkPreset, BenchmarkTarget, LatestStrategy, QueryExecutor, QueryRequest,
};
use parcelsim_store::{MemoryStore, Store};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "parcelsim")]
#[command(about = "Synthetic parcel-tracking data generator and latest-state query benchmark")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Store snapshot file (overrides the configured path)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and load reporting-window containers
    Generate {
        /// Reporting windows to generate (default: all configured)
        #[arg(short, long, value_delimiter = ',')]
        window: Vec<String>,

        /// Layouts to generate (default: both)
        #[arg(short, long, value_delimiter = ',')]
        layout: Vec<Layout>,

        /// Multiply every volume by this factor
        #[arg(short, long, default_value = "1.0")]
        scale: f64,

        /// Worker threads (0 = CPU count)
        #[arg(long)]
        workers: Option<usize>,

        /// Entities per chunk
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Extra payload for flat-snapshot records
        #[arg(short, long)]
        payload: Option<PayloadKind>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,

        /// Output file for report (markdown)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Run one latest-state count query
    Query {
        /// Reporting window whose container to query
        #[arg(short, long, conflicts_with = "container")]
        window: Option<String>,

        /// Explicit container name
        #[arg(long)]
        container: Option<String>,

        /// Container layout
        #[arg(short, long)]
        layout: Layout,

        /// Partition ids, comma separated
        #[arg(short, long, value_delimiter = ',')]
        partitions: Vec<PartitionId>,

        /// Statuses by code, label or name, comma separated
        #[arg(short, long, value_delimiter = ',')]
        statuses: Vec<Status>,

        /// First day of the time filter
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,

        /// Last day of the time filter
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,

        /// Latest-state strategy (append-only layout)
        #[arg(long)]
        strategy: Option<LatestStrategy>,

        /// Execution budget in milliseconds
        #[arg(long)]
        budget_ms: Option<u64>,

        /// Output file for report (markdown)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Run the standard query preset across reporting-window containers
    Benchmark {
        /// Reporting windows to benchmark (default: all configured)
        #[arg(short, long, value_delimiter = ',')]
        window: Vec<String>,

        /// Layouts to benchmark (default: both)
        #[arg(short, long, value_delimiter = ',')]
        layout: Vec<Layout>,

        /// Repeat each query this many times
        #[arg(short, long)]
        iterations: Option<usize>,

        /// Latest-state strategy (append-only layout)
        #[arg(long)]
        strategy: Option<LatestStrategy>,

        /// First day of the time filter
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,

        /// Last day of the time filter
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,

        /// Output file for report (markdown)
        #[arg(short, long)]
        output: Option<String>,

        /// Also output JSON report
        #[arg(long)]
        json: bool,
    },

    /// Write the standard configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { force } = &cli.command {
        init_logging("info")?;
        return init_config(&cli.config, *force);
    }

    let config = AppConfig::load_or_standard(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    init_logging(&config.logging.level)?;

    let snapshot = cli
        .snapshot
        .clone()
        .unwrap_or_else(|| config.store.snapshot_path.clone());

    let (report, output, json) = match cli.command {
        Commands::Generate {
            window,
            layout,
            scale,
            workers,
            batch_size,
            payload,
            no_progress,
            output,
        } => {
            info!("Starting generation");
            let mut app = config.clone();
            app.generator = app.generator.scaled(scale)?;
            if let Some(workers) = workers {
                app.generator.pool.workers = workers;
            }
            if let Some(batch_size) = batch_size {
                app.generator.pool.batch_size = batch_size;
            }
            if let Some(payload) = payload {
                app.generator.payload = payload;
            }

            let windows = app
                .select_windows(&window)?
                .into_iter()
                .map(|w| w.scaled(scale))
                .collect::<parcelsim_generator::Result<Vec<_>>>()?;

            let store = if snapshot.exists() {
                MemoryStore::load_snapshot(&snapshot)
                    .with_context(|| format!("Failed to read snapshot {}", snapshot.display()))?
            } else {
                MemoryStore::new()
            };

            let loads = run_windows(&store, &app, &windows, &layouts_or_both(layout), !no_progress)?;
            store
                .save_snapshot(&snapshot)
                .with_context(|| format!("Failed to write snapshot {}", snapshot.display()))?;
            (Report::from_loads(loads), output, false)
        }

        Commands::Query {
            window,
            container,
            layout,
            partitions,
            statuses,
            from,
            to,
            strategy,
            budget_ms,
            output,
        } => {
            let (container, window_days) = match (window, container) {
                (Some(label), None) => {
                    let window = config
                        .select_windows(&[label])?
                        .into_iter()
                        .next()
                        .context("No window selected")?;
                    (window.container(layout), Some(window.window_days()))
                }
                (None, Some(container)) => (container, None),
                _ => bail!("Either --window or --container is required"),
            };

            let mut builder = QueryRequest::builder(layout)
                .partitions(partitions)
                .statuses(statuses)
                .strategy(strategy.unwrap_or(config.query.strategy));
            if let Some(bounds) = day_bounds(from, to)? {
                builder = builder.time(bounds);
            }
            if let Some(days) = window_days {
                builder = builder.window_days(days);
            }
            if let Some(ms) = budget_ms {
                builder = builder.budget(Duration::from_millis(ms));
            }
            let request = builder.build()?;

            let store = open_snapshot(&snapshot)?;
            let executor = QueryExecutor::new().with_timeouts(config.query.timeouts.clone());
            let plan = executor.plan(&request)?;
            let mut session = store.open_session()?;
            let outcome = executor.execute(&mut session, &container, &request)?;
            (Report::from_query(outcome, plan.explain()), output, false)
        }

        Commands::Benchmark {
            window,
            layout,
            iterations,
            strategy,
            from,
            to,
            output,
            json,
        } => {
            info!("Starting benchmark");
            let windows = config.select_windows(&window)?;
            let layouts = layouts_or_both(layout);
            let targets: Vec<BenchmarkTarget> = windows
                .iter()
                .flat_map(|w| {
                    layouts
                        .iter()
                        .map(move |l| BenchmarkTarget::new(w.container(*l), *l, w.window_days()))
                })
                .collect();

            let preset = BenchmarkPreset {
                time: day_bounds(from, to)?,
                strategy: strategy.unwrap_or(config.query.strategy),
                ..Default::default()
            };
            let executor = QueryExecutor::new().with_timeouts(config.query.timeouts.clone());
            let store = open_snapshot(&snapshot)?;
            let bench = Benchmark::new(executor, preset)
                .with_iterations(iterations.unwrap_or(config.query.iterations))
                .run(&store, &targets)?;
            (Report::from_benchmark(bench), output, json)
        }

        Commands::InitConfig { force } => return init_config(&cli.config, force),
    };

    // Print summary to console
    report.print_summary();

    // Save report if output file specified
    if let Some(output_path) = output {
        let md_path = if output_path.ends_with(".md") {
            output_path
        } else {
            format!("{}.md", output_path)
        };

        std::fs::write(&md_path, report.to_markdown())?;
        info!("Markdown report saved to: {}", md_path);

        if json {
            let json_path = md_path.replace(".md", ".json");
            std::fs::write(&json_path, report.to_json())?;
            info!("JSON report saved to: {}", json_path);
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {}", level))?,
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    AppConfig::write_default(path)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    info!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn open_snapshot(path: &Path) -> Result<MemoryStore> {
    MemoryStore::load_snapshot(path).with_context(|| {
        format!(
            "Failed to read snapshot {} (run `parcelsim generate` first)",
            path.display()
        )
    })
}

fn layouts_or_both(layouts: Vec<Layout>) -> Vec<Layout> {
    if layouts.is_empty() {
        vec![Layout::FlatSnapshot, Layout::AppendOnly]
    } else {
        layouts
    }
}

fn day_bounds(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Option<TimeBounds>> {
    match (from, to) {
        (Some(from), Some(to)) => Ok(Some(TimeBounds::whole_days(from, to)?)),
        (None, None) => Ok(None),
        _ => bail!("--from and --to must be given together"),
    }
}
