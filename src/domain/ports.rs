use crate::domain::model::{PackageReport, Target};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Job-level settings a pipeline run needs, independent of where they came from.
pub trait ConfigProvider: Send + Sync {
    fn tool(&self) -> &str;
    fn target(&self) -> Target;
    fn version_override(&self) -> Option<&str>;
    fn source_dir(&self) -> Option<&Path>;
    fn work_dir(&self) -> &Path;
    fn output_dir(&self) -> &Path;
    fn zstd_level(&self) -> i32;
    fn max_size_mb(&self) -> u64;
    fn keep_intermediate(&self) -> bool;
}

/// Staged tree handed from `prepare` to `package`.
#[derive(Debug, Clone)]
pub struct StagedTree {
    pub root: PathBuf,
    pub dedup_manifest: Option<PathBuf>,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Obtain the unpacked upstream distribution.
    async fn fetch(&self) -> Result<PathBuf>;
    /// Reduce it to the shipped layout.
    async fn prepare(&self, extracted: PathBuf) -> Result<StagedTree>;
    /// Archive, compress, checksum and publish.
    async fn package(&self, staged: StagedTree) -> Result<PackageReport>;
    /// Remove anything a failed run left at the final location.
    async fn abort(&self) {}
}
