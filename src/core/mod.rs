pub mod archive;
pub mod bench;
pub mod checksum;
pub mod dedup;
pub mod download;
pub mod engine;
pub mod extract;
pub mod hardlink;
pub mod manifest;
pub mod mingw;
pub mod split;
pub mod strip;

pub use crate::domain::model::PackageReport;
pub use crate::domain::ports::{ConfigProvider, Pipeline, StagedTree};
pub use crate::utils::error::Result;

use crate::utils::error::BinsError;

/// Run blocking filesystem or compression work off the async runtime.
pub async fn blocking<T, F>(task: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BinsError::processing(format!("{} task failed: {}", task, e)))?
}
