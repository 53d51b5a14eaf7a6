use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use alpine_bump::config::{self, Config};
use alpine_bump::index::{
    IndexFetcher, IndexLayout, IndexRecord, IndexStore, ParameterSpace, RebuildReport,
};
use alpine_bump::logging;
use alpine_bump::update::process_targets;

#[derive(Parser)]
#[command(name = "alpine-bump")]
#[command(version, about = "Keep Alpine package pins in Dockerfiles up to date")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file, defaults to $XDG_CONFIG_HOME/alpine-bump.json
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the local package index
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Bump the pinned package in each directory's Dockerfile
    Update(UpdateArgs),
}

#[derive(Subcommand)]
enum DbAction {
    /// Download every index and rebuild the store
    Update,
    /// Find packages by name
    Search {
        #[arg(required = true)]
        terms: Vec<String>,
        /// Match names exactly instead of by substring
        #[arg(long)]
        exact: bool,
    },
    /// Print every stored record
    Dump,
}

#[derive(Args)]
struct UpdateArgs {
    /// Directories containing a Dockerfile
    #[arg(default_value = ".")]
    dirs: Vec<PathBuf>,

    /// Rebuild the index store before updating
    #[arg(long)]
    update_db: bool,

    /// Write updated Dockerfiles back
    #[arg(long)]
    save: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let _guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    let config_path = cli.config.unwrap_or_else(config::config_path);
    let config = Config::load(&config_path)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, config))
}

async fn run(command: Command, config: Config) -> anyhow::Result<ExitCode> {
    let store = IndexStore::open(IndexLayout::from_config(&config))
        .context("Failed to open index store")?;

    match command {
        Command::Db { action } => match action {
            DbAction::Update => db_update(&store, &config).await,
            DbAction::Search { terms, exact } => db_search(&store, &terms, exact),
            DbAction::Dump => db_dump(&store),
        },
        Command::Update(args) => update(&store, &config, args).await,
    }
}

async fn rebuild(store: &IndexStore, config: &Config) -> anyhow::Result<RebuildReport> {
    let fetcher = IndexFetcher::from_config(&config.index)?;
    let space = ParameterSpace::from_config(&config.index);
    let deadline = config.index.deadline_secs.map(Duration::from_secs);

    let report = store
        .rebuild(&fetcher, &space, deadline)
        .await
        .context("Failed to rebuild index store")?;

    for failure in &report.failures {
        eprintln!("FAILED {}: {}", failure.triple, failure.error);
    }
    Ok(report)
}

async fn db_update(store: &IndexStore, config: &Config) -> anyhow::Result<ExitCode> {
    let report = rebuild(store, config).await?;

    println!(
        "{} records from {}/{} indices",
        report.records,
        report.succeeded(),
        report.attempted
    );

    Ok(ExitCode::SUCCESS)
}

fn db_search(store: &IndexStore, terms: &[String], exact: bool) -> anyhow::Result<ExitCode> {
    for term in terms {
        for record in store.search(term, exact)? {
            print_record(&record);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn db_dump(store: &IndexStore) -> anyhow::Result<ExitCode> {
    let records = store.records()?;
    for record in &records {
        print_record(record);
    }
    println!("{} records", records.len());
    Ok(ExitCode::SUCCESS)
}

fn print_record(record: &IndexRecord) {
    println!(
        "{}\t{}\t{}\t{}\t{}",
        record.package, record.version, record.branch, record.repository, record.architecture
    );
}

async fn update(store: &IndexStore, config: &Config, args: UpdateArgs) -> anyhow::Result<ExitCode> {
    let rebuilt = match store.rebuilt_at()? {
        Some(_) if args.update_db => Some(rebuild(store, config).await?),
        None => {
            warn!("Index store has never been built, rebuilding now");
            Some(rebuild(store, config).await?)
        }
        Some(rebuilt_at) => {
            if store.needs_refresh(config.index.refresh_interval)? {
                warn!(
                    "Index store was last rebuilt at {}, run with --update-db to refresh",
                    format_timestamp(rebuilt_at)
                );
            }
            None
        }
    };

    // Packages of a failed index would read as not found
    let mut failed = rebuilt.is_some_and(|report| !report.is_complete());
    if failed {
        warn!("Some indices failed to download, results may be incomplete");
    }

    for (dir, result) in process_targets(&args.dirs, store, args.save) {
        match result {
            Ok(summary) => println!("{summary}"),
            Err(e) => {
                failed = true;
                eprintln!("ERROR {}: {}", dir.display(), e);
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}
