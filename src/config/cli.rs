use crate::config::toml_config::ToolchainConfig;
use crate::core::ConfigProvider;
use crate::domain::model::{Arch, Platform, Target};
use crate::utils::error::Result;
use crate::utils::fs_tree::MAX_SIZE_MB;
use crate::utils::validation::{self, Validate};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "toolchain-bins")]
#[command(about = "Package prebuilt toolchains into deduplicated, checksummed tar.zst archives")]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log CPU and memory usage between phases
    #[arg(long, global = true)]
    pub monitor: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download, strip, deduplicate and archive one toolchain
    Fetch(FetchArgs),
    /// Analyze or collapse duplicate binaries
    Dedupe(DedupeArgs),
    /// Build a tar.zst from a deduplicated directory using hard links
    HardlinkArchive(HardlinkArchiveArgs),
    /// Expand a tar.zst archive
    Expand(ExpandArgs),
    /// Split an archive into parts below the hosting size limit
    Split(SplitArgs),
    /// Reassemble a split archive
    Join(JoinArgs),
    /// Write .sha256 files next to the given files
    Checksum(ChecksumArgs),
    /// Add or replace a version entry in manifest.json
    Manifest(ManifestArgs),
    /// Compare compression methods and levels on a directory
    Bench(BenchArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Tool recipe name (e.g. clang, nodejs)
    #[arg(long, default_value = "clang")]
    pub tool: String,

    #[arg(long, value_enum)]
    pub platform: Platform,

    #[arg(long, value_enum)]
    pub arch: Arch,

    /// Override the recipe version
    #[arg(long)]
    pub version: Option<String>,

    /// Use already extracted binaries instead of downloading
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    #[arg(long, default_value = "work")]
    pub work_dir: PathBuf,

    /// Defaults to assets/<tool>/<platform>/<arch>
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long, default_value = "22")]
    pub zstd_level: i32,

    /// Split the archive when it is larger than this
    #[arg(long, default_value = "99")]
    pub max_size_mb: u64,

    /// Keep intermediate files (for debugging)
    #[arg(long)]
    pub keep_intermediate: bool,

    /// Recipe file; the built-in recipes are used when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl FetchArgs {
    pub fn into_job(self, config: &ToolchainConfig) -> FetchJob {
        let target = Target::new(self.platform, self.arch);
        let output_dir = self
            .output_dir
            .unwrap_or_else(|| config.default_output_dir(&self.tool, target));

        FetchJob {
            tool: self.tool,
            target,
            version: self.version,
            source_dir: self.source_dir,
            work_dir: self.work_dir,
            output_dir,
            zstd_level: self.zstd_level,
            max_size_mb: self.max_size_mb,
            keep_intermediate: self.keep_intermediate,
        }
    }
}

/// Fully resolved settings for one `fetch` run.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub tool: String,
    pub target: Target,
    pub version: Option<String>,
    pub source_dir: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
    pub zstd_level: i32,
    pub max_size_mb: u64,
    pub keep_intermediate: bool,
}

impl FetchJob {
    pub fn new(tool: &str, target: Target, work_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            tool: tool.to_string(),
            target,
            version: None,
            source_dir: None,
            work_dir,
            output_dir,
            zstd_level: 22,
            max_size_mb: 99,
            keep_intermediate: false,
        }
    }
}

impl ConfigProvider for FetchJob {
    fn tool(&self) -> &str {
        &self.tool
    }

    fn target(&self) -> Target {
        self.target
    }

    fn version_override(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn zstd_level(&self) -> i32 {
        self.zstd_level
    }

    fn max_size_mb(&self) -> u64 {
        self.max_size_mb
    }

    fn keep_intermediate(&self) -> bool {
        self.keep_intermediate
    }
}

impl Validate for FetchJob {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("tool", &self.tool)?;
        validation::validate_zstd_level("zstd_level", self.zstd_level)?;
        validation::validate_size_mb("max_size_mb", self.max_size_mb, 2)?;
        validation::validate_path("work_dir", &self.work_dir.to_string_lossy())?;
        validation::validate_path("output_dir", &self.output_dir.to_string_lossy())?;
        if let Some(version) = &self.version {
            validation::validate_non_empty_string("version", version)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
pub struct DedupeArgs {
    /// Directory containing the binaries
    pub source: PathBuf,

    /// Destination for the deduplicated (or expanded) structure
    pub dest: Option<PathBuf>,

    /// Only print the duplicate analysis
    #[arg(long)]
    pub analyze: bool,

    /// Treat SOURCE as a deduplicated structure and restore every file
    #[arg(long, conflicts_with = "analyze")]
    pub expand: bool,
}

#[derive(Debug, Clone, Args)]
pub struct HardlinkArchiveArgs {
    /// Directory containing dedup_manifest.json and canonical binaries
    pub deduped_dir: PathBuf,

    pub output_dir: PathBuf,

    /// Archive base name
    #[arg(long, default_value = "win_binaries")]
    pub name: String,

    #[arg(long, default_value = "22")]
    pub zstd_level: i32,
}

#[derive(Debug, Clone, Args)]
pub struct ExpandArgs {
    pub archive: PathBuf,

    pub output_dir: PathBuf,

    /// Original directory to compare the extracted binaries against
    #[arg(long)]
    pub verify: Option<PathBuf>,

    /// Keep hard links instead of converting to independent files
    #[arg(long)]
    pub keep_hardlinks: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SplitArgs {
    pub archive: PathBuf,

    /// Size of each part in MB
    #[arg(long, default_value = "95", value_parser = clap::value_parser!(u64).range(1..=MAX_SIZE_MB))]
    pub part_size: u64,

    /// Defaults to the archive's directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// manifest.json to update with part information
    #[arg(long, requires = "base_url")]
    pub manifest: Option<PathBuf>,

    /// Base URL the parts are served from
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct JoinArgs {
    /// Archive name or any of its .partN files
    pub archive: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct ChecksumArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct ManifestArgs {
    pub manifest: PathBuf,

    #[arg(long)]
    pub version: String,

    #[arg(long)]
    pub href: String,

    #[arg(long)]
    pub sha256: String,

    /// Do not move the "latest" pointer
    #[arg(long)]
    pub no_latest: bool,
}

#[derive(Debug, Clone, Args)]
pub struct BenchArgs {
    pub source_dir: PathBuf,

    #[arg(long, default_value = "bench")]
    pub output_dir: PathBuf,

    #[arg(long, value_delimiter = ',', default_values_t = vec![1, 3, 9, 19, 22])]
    pub zstd_levels: Vec<i32>,

    #[arg(long, value_delimiter = ',', default_values_t = vec![6, 9])]
    pub xz_levels: Vec<u32>,

    #[arg(long, value_delimiter = ',', default_values_t = vec![6, 9])]
    pub gzip_levels: Vec<u32>,
}
