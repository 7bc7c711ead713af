//! Clap argument types and validation.

use clap::Parser;
use std::path::PathBuf;

/// Incremental GT comparison for segmentation masks.
#[derive(Parser, Debug)]
#[command(name = "maskcmp", version = maskcmp::constants::VERSION)]
pub struct Cli {
    /// Cache directory (overrides MASKCMP_CACHE_DIR and config files).
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Score result folders against GT, reusing cached comparisons.
    Compare(Box<CompareArgs>),

    /// Inspect and maintain the comparison cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print version and build information.
    Version,
}

/// Cache management subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache statistics (entry count, size, last cleanup).
    Stats,
    /// List cached comparisons, most recently used first.
    List,
    /// Print the cache directory path.
    Path,
    /// Remove all cached comparisons.
    Clear,
    /// Remove comparisons not used within the given number of days.
    Cleanup {
        /// Age threshold in days (default: config `max_age_days`, else 30).
        #[arg(long)]
        max_age_days: Option<u32>,
    },
    /// Remove a single cached comparison by file name.
    Remove {
        /// Entry file name as shown by `cache list`.
        file_name: String,
    },
}

/// A `NAME=PATH` comparison folder argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFolder {
    pub name: String,
    pub path: PathBuf,
}

/// Parse `NAME=PATH`. The name may not contain `=`; the path may.
pub fn parse_named_folder(raw: &str) -> Result<NamedFolder, String> {
    let (name, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing name in `{raw}`"));
    }
    if path.is_empty() {
        return Err(format!("missing path in `{raw}`"));
    }
    Ok(NamedFolder {
        name: name.to_string(),
        path: PathBuf::from(path),
    })
}

/// Where the list of common file names comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Given on the command line.
    Inline(Vec<String>),
    /// One name per line in a file.
    List(PathBuf),
}

/// Arguments for the `compare` subcommand.
#[derive(Parser, Debug)]
pub struct CompareArgs {
    // --- Base folders ---
    /// Folder of original images.
    #[arg(long)]
    pub original: PathBuf,

    /// Ground-truth mask folder.
    #[arg(long)]
    pub gt: PathBuf,

    /// Your own result folder.
    #[arg(long)]
    pub mine: PathBuf,

    /// Comparison folder as NAME=PATH. Repeatable.
    #[arg(long = "comparison", value_parser = parse_named_folder)]
    pub comparisons: Vec<NamedFolder>,

    // --- Files (one required) ---
    /// File names present in every folder. Comma-separated or repeated.
    #[arg(long = "file", value_delimiter = ',')]
    pub files: Vec<String>,

    /// Read file names from a file, one per line.
    #[arg(long)]
    pub files_from: Option<PathBuf>,

    // --- Behavior ---
    /// Neither read nor write the cache.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Backend command (overrides MASKCMP_BACKEND and config files).
    #[arg(long)]
    pub backend: Option<String>,
}

impl CompareArgs {
    /// Validate that exactly one file source is given.
    pub fn file_source(&self) -> Result<FileSource, String> {
        match (self.files.is_empty(), &self.files_from) {
            (false, Some(_)) => Err("specify either --file or --files-from, not both".into()),
            (true, None) => Err("no files specified: use --file or --files-from".into()),
            (false, None) => Ok(FileSource::Inline(self.files.clone())),
            (true, Some(path)) => Ok(FileSource::List(path.clone())),
        }
    }
}
