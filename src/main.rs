//! maskcmp: incremental GT comparison CLI.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use maskcmp::backend::CommandBackend;
use maskcmp::cache::{CacheEngine, VersionCheck};
use maskcmp::compare::ComparisonRunner;
use maskcmp::config::{CacheConfig, Config, ConfigError};
use maskcmp::constants;
use maskcmp::env::Env;
use maskcmp::models::{BaseFolderPaths, ComparisonFolder, ComparisonRequest};

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use cli::args::{CacheAction, Cli, Command, CompareArgs, FileSource};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let env = Env::real();

    let cwd = std::env::current_dir().ok();
    let mut config = load_config(cwd.as_deref(), &env, std::io::stderr).context("failed to load configuration")?;
    init_logging(&env, &config.log.filter);

    if let Some(dir) = cli.cache_dir {
        config.cache.dir = Some(dir);
    }

    match cli.command {
        Command::Compare(args) => run_compare(*args, config).await,
        Command::Cache { action } => run_cache(action, &config).await,
        Command::Version => run_version(),
    }
}

/// Load configuration with a temporary subscriber in place.
///
/// The global subscriber depends on `[log] filter`, so it cannot exist yet;
/// warnings raised while loading go to `writer` filtered by `MASKCMP_LOG`.
fn load_config<W>(work_dir: Option<&Path>, env: &Env, writer: W) -> Result<Config, ConfigError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(log_filter(env, "warn"))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .finish();
    tracing::subscriber::with_default(subscriber, || Config::load(work_dir, env))
}

/// `MASKCMP_LOG` wins over the configured directive. Invalid input means `warn`.
fn log_filter(env: &Env, configured: &str) -> EnvFilter {
    let directive = env
        .var(constants::ENV_LOG)
        .unwrap_or_else(|| configured.to_string());
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the stderr log subscriber. `MASKCMP_LOG` wins over `[log] filter`.
fn init_logging(env: &Env, configured: &str) {
    let filter = log_filter(env, configured);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Print detailed version and build information.
fn run_version() -> Result<()> {
    use colored::Colorize;

    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    println!("{}     {}", "target:".dimmed(), constants::TARGET);
    Ok(())
}

/// Open the configured cache and run the version check.
///
/// A cache that cannot be opened is not fatal: the run continues uncached.
async fn open_engine(config: &CacheConfig) -> CacheEngine {
    let engine = match CacheEngine::from_config(config).await {
        Ok(engine) => engine,
        Err(e) => {
            warn!(error = %e, "cache unavailable, continuing without it");
            return CacheEngine::disabled();
        }
    };
    match engine.initialize().await {
        Ok(VersionCheck::Invalidated { removed, .. }) if removed > 0 => {
            eprintln!("Cache written by another version; removed {removed} stale entry/entries.");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "cache version check failed"),
    }
    engine
}

/// Read common file names from the command line or a list file.
async fn common_files(source: FileSource) -> Result<Vec<String>> {
    match source {
        FileSource::Inline(files) => Ok(files),
        FileSource::List(path) => {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect())
        }
    }
}

/// Run an incremental comparison and print the merged results as JSON.
async fn run_compare(args: CompareArgs, mut config: Config) -> Result<()> {
    let source = args.file_source().map_err(|e| anyhow::anyhow!(e))?;
    let files = common_files(source).await?;
    if files.is_empty() {
        bail!("no file names to compare");
    }

    if let Some(command) = args.backend {
        config.backend.command = Some(command);
    }
    let backend = CommandBackend::from_config(&config.backend).context("cannot run comparison")?;

    let engine = if args.no_cache {
        CacheEngine::disabled()
    } else {
        open_engine(&config.cache).await
    };

    let request = ComparisonRequest {
        base: BaseFolderPaths {
            original: args.original,
            gt: args.gt,
            mine: args.mine,
        },
        comparisons: args
            .comparisons
            .into_iter()
            .map(|c| ComparisonFolder::new(c.name, c.path))
            .collect(),
        common_files: files,
    };

    let runner = ComparisonRunner::new(Arc::new(engine), Arc::new(backend));
    let outcome = runner.run(&request).await.context("comparison failed")?;

    let json = serde_json::to_string_pretty(&outcome.results).context("failed to serialize results")?;
    println!("{json}");
    cli::print_summary(&outcome);
    Ok(())
}

/// Manage the comparison cache.
///
/// Works on the configured directory even when caching is switched off.
async fn run_cache(action: CacheAction, config: &Config) -> Result<()> {
    use colored::Colorize;

    let dir = config
        .cache
        .resolved_dir()
        .context("cache directory could not be determined")?;

    if let CacheAction::Path = action {
        println!("{}", dir.display());
        return Ok(());
    }

    let engine = CacheEngine::open(dir.clone())
        .await
        .with_context(|| format!("failed to open cache at {}", dir.display()))?;
    engine.initialize().await.context("cache version check failed")?;

    match action {
        CacheAction::Stats => {
            let stats = engine.stats().await.context("failed to read cache stats")?;
            println!("Cache entries: {}", stats.entries);
            println!("Cache size:    {}", stats.human_size());
            if let Some(meta) = engine.metadata().await {
                println!("Last cleanup:  {}", meta.last_cleanup.format("%Y-%m-%d %H:%M:%S UTC"));
                println!("Written by:    {}", meta.version);
            }
        }
        CacheAction::List => {
            let entries = engine
                .list_all_entries()
                .await
                .context("failed to list cache entries")?;
            if entries.is_empty() {
                println!("No cached comparisons.");
                return Ok(());
            }
            for entry in &entries {
                println!(
                    "  {}  {}  {}",
                    entry.cache_key.bold(),
                    entry.comparison_name.cyan(),
                    entry.comparison_path.display().to_string().dimmed(),
                );
                println!(
                    "         {}  {}   {}  {}   {}  {}",
                    "gt:".cyan(),
                    entry.base_paths.gt.display(),
                    "files:".cyan(),
                    entry.results.len(),
                    "used:".cyan(),
                    entry.last_accessed_at.format("%Y-%m-%d %H:%M"),
                );
            }
        }
        CacheAction::Clear => {
            let removed = engine.clear_all().await.context("failed to clear cache")?;
            println!("Cleared {removed} cached comparison(s).");
        }
        CacheAction::Cleanup { max_age_days } => {
            let days = max_age_days.unwrap_or(config.cache.max_age_days);
            let removed = engine.cleanup(days).await.context("cache cleanup failed")?;
            println!("Removed {removed} comparison(s) unused for {days} day(s).");
        }
        CacheAction::Remove { file_name } => {
            if !engine
                .delete_entry(&file_name)
                .await
                .with_context(|| format!("failed to remove {file_name}"))?
            {
                bail!("no cached comparison named {file_name}");
            }
            println!("Removed {file_name}.");
        }
        CacheAction::Path => {}
    }

    Ok(())
}
