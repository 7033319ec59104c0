use crate::core::{blocking, checksum};
use crate::utils::error::{BinsError, Result};
use crate::utils::fs_tree::mib;
use crate::utils::progress::ProgressReporter;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { bytes: u64 },
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumVerdict {
    Verified(String),
    /// The listing has no entry for this file name.
    NotListed,
}

#[derive(Debug, Clone, Default)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Marker that exists only while `dest` is being written.
    pub fn breadcrumb_path(dest: &Path) -> PathBuf {
        let mut name = dest.as_os_str().to_owned();
        name.push(".downloading");
        PathBuf::from(name)
    }

    /// Download `url` to `dest` unless a complete copy is already there.
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<DownloadOutcome> {
        let breadcrumb = Self::breadcrumb_path(dest);

        // 上次下載中斷：清掉不完整的檔案
        if fs::try_exists(&breadcrumb).await? {
            tracing::warn!(
                "⚠️  Found incomplete download marker: {}",
                breadcrumb.display()
            );
            if fs::try_exists(dest).await? {
                tracing::info!("Removing partial download: {}", dest.display());
                fs::remove_file(dest).await?;
            }
            fs::remove_file(&breadcrumb).await?;
        }

        if fs::try_exists(dest).await? {
            tracing::info!("File already exists: {} - skipping download", dest.display());
            return Ok(DownloadOutcome::AlreadyPresent);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        tracing::info!("⬇️  Downloading from: {}", url);
        tracing::debug!("Saving to: {}", dest.display());
        fs::write(&breadcrumb, b"").await?;

        match self.stream_to_file(url, dest).await {
            Ok(bytes) => {
                fs::remove_file(&breadcrumb).await?;
                tracing::info!("Downloaded {} ({:.2} MB)", dest.display(), mib(bytes));
                Ok(DownloadOutcome::Downloaded { bytes })
            }
            Err(e) => {
                let _ = fs::remove_file(dest).await;
                let _ = fs::remove_file(&breadcrumb).await;
                Err(e)
            }
        }
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await?;
        tracing::debug!("Response status: {}", response.status());

        if !response.status().is_success() {
            return Err(BinsError::DownloadError {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut progress = ProgressReporter::new("Downloading", response.content_length());
        let mut file = fs::File::create(dest).await?;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            progress.advance(chunk.len() as u64);
        }
        file.flush().await?;

        Ok(progress.bytes())
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(BinsError::DownloadError {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Check `archive` against an upstream `SHASUMS256.txt`-style listing.
    /// The listing is cached as `cache` so repeated runs stay offline.
    pub async fn verify_upstream_checksum(
        &self,
        archive: &Path,
        checksums_url: &str,
        cache: &Path,
    ) -> Result<ChecksumVerdict> {
        let listing = if fs::try_exists(cache).await? {
            tracing::debug!("Using cached checksum list: {}", cache.display());
            fs::read_to_string(cache).await?
        } else {
            tracing::info!("Fetching checksum list: {}", checksums_url);
            let text = self.fetch_text(checksums_url).await?;
            if let Some(parent) = cache.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(cache, &text).await?;
            text
        };

        let sums = checksum::parse_checksum_list(&listing);
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(expected) = sums.get(&name) else {
            tracing::warn!(
                "⚠️  {} is not listed in {} - skipping verification",
                name,
                checksums_url
            );
            return Ok(ChecksumVerdict::NotListed);
        };

        let path = archive.to_path_buf();
        let actual = blocking("checksum", move || checksum::sha256_file(&path)).await?;

        if &actual != expected {
            return Err(BinsError::ChecksumMismatch {
                file: name,
                expected: expected.clone(),
                actual,
            });
        }

        tracing::info!("✅ Checksum verified: {}", actual);
        Ok(ChecksumVerdict::Verified(actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_writes_file_and_clears_breadcrumb() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/llvm.tar.xz");
            then.status(200).body("archive-bytes");
        });

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("llvm.tar.xz");
        let outcome = Downloader::new()
            .fetch(&server.url("/llvm.tar.xz"), &dest)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(outcome, DownloadOutcome::Downloaded { bytes: 13 });
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive-bytes");
        assert!(!Downloader::breadcrumb_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_fetch_http_error_leaves_nothing_behind() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("missing.zip");
        let err = Downloader::new()
            .fetch(&server.url("/missing"), &dest)
            .await
            .unwrap_err();

        mock.assert();
        assert!(matches!(err, BinsError::DownloadError { status: 404, .. }));
        assert!(!dest.exists());
        assert!(!Downloader::breadcrumb_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded_again() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/node.zip");
            then.status(200).body("new");
        });

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("node.zip");
        std::fs::write(&dest, b"old").unwrap();

        let outcome = Downloader::new()
            .fetch(&server.url("/node.zip"), &dest)
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::AlreadyPresent);
        mock.assert_hits(0);
        assert_eq!(std::fs::read(&dest).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_breadcrumb_forces_redownload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/node.zip");
            then.status(200).body("complete");
        });

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("node.zip");
        std::fs::write(&dest, b"parti").unwrap();
        std::fs::write(Downloader::breadcrumb_path(&dest), b"").unwrap();

        let outcome = Downloader::new()
            .fetch(&server.url("/node.zip"), &dest)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(outcome, DownloadOutcome::Downloaded { bytes: 8 });
        assert_eq!(std::fs::read(&dest).unwrap(), b"complete");
    }

    #[tokio::test]
    async fn test_verify_upstream_checksum() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("node-v1-linux-x64.tar.xz");
        std::fs::write(&archive, b"hello").unwrap();
        let good = checksum::sha256_bytes(b"hello");

        let server = MockServer::start();
        let listing = format!("{}  node-v1-linux-x64.tar.xz\n{}  other.zip\n", good, "00");
        let mock = server.mock(|when, then| {
            when.method(GET).path("/SHASUMS256.txt");
            then.status(200).body(listing);
        });

        let downloader = Downloader::new();
        let cache = temp.path().join("SHASUMS256.txt");
        let verdict = downloader
            .verify_upstream_checksum(&archive, &server.url("/SHASUMS256.txt"), &cache)
            .await
            .unwrap();
        assert_eq!(verdict, ChecksumVerdict::Verified(good));

        // 第二次使用快取
        downloader
            .verify_upstream_checksum(&archive, &server.url("/SHASUMS256.txt"), &cache)
            .await
            .unwrap();
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn test_checksum_mismatch_and_unlisted() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("node.tar.xz");
        std::fs::write(&archive, b"tampered").unwrap();

        let cache = temp.path().join("SHASUMS256.txt");
        std::fs::write(&cache, "deadbeef  node.tar.xz\n").unwrap();
        let downloader = Downloader::new();

        let err = downloader
            .verify_upstream_checksum(&archive, "https://unused.invalid/SHASUMS256.txt", &cache)
            .await
            .unwrap_err();
        assert!(matches!(err, BinsError::ChecksumMismatch { .. }));

        std::fs::write(&cache, "deadbeef  something-else.tar.xz\n").unwrap();
        let verdict = downloader
            .verify_upstream_checksum(&archive, "https://unused.invalid/SHASUMS256.txt", &cache)
            .await
            .unwrap();
        assert_eq!(verdict, ChecksumVerdict::NotListed);
    }
}
