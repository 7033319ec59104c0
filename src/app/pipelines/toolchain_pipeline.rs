use crate::config::toml_config::{ToolRecipe, ToolchainConfig};
use crate::core::download::Downloader;
use crate::core::{
    archive, blocking, checksum, dedup, extract, hardlink, manifest, mingw, split, strip,
};
use crate::core::{ConfigProvider, PackageReport, Pipeline, StagedTree};
use crate::domain::model::{PartRef, Platform, ReleaseEntry};
use crate::utils::error::{BinsError, Result};
use crate::utils::fs_tree::{self, mib, MIB};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Packages one tool for one target according to its recipe.
pub struct ToolchainPipeline<C: ConfigProvider> {
    pub(crate) config: C,
    pub(crate) toolchain: ToolchainConfig,
    pub(crate) recipe: ToolRecipe,
    pub(crate) downloader: Downloader,
    /// Set once the final archive starts being written.
    output_started: AtomicBool,
}

impl<C: ConfigProvider> ToolchainPipeline<C> {
    pub fn new(config: C, toolchain: ToolchainConfig) -> Result<Self> {
        let recipe = toolchain.recipe(config.tool())?.clone();
        Ok(Self {
            config,
            toolchain,
            recipe,
            downloader: Downloader::new(),
            output_started: AtomicBool::new(false),
        })
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn version(&self) -> &str {
        self.config
            .version_override()
            .unwrap_or(self.recipe.version.as_str())
    }

    pub fn archive_name(&self) -> String {
        self.recipe
            .archive_name(self.config.tool(), self.config.target(), self.version())
    }

    pub fn final_archive(&self) -> PathBuf {
        self.config
            .output_dir()
            .join(format!("{}.tar.zst", self.archive_name()))
    }

    fn work(&self, name: &str) -> PathBuf {
        self.config.work_dir().join(name)
    }

    async fn download_and_extract(&self) -> Result<PathBuf> {
        let target = self.config.target();
        let url = self.recipe.url_for(self.config.tool(), target, self.version())?;
        let file_name = url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| BinsError::processing(format!("cannot derive file name from {}", url)))?
            .to_string();

        let downloads = self.work("downloads");
        let archive = downloads.join(&file_name);
        self.downloader.fetch(&url, &archive).await?;

        if let Some(checksums_url) = self.recipe.checksums_url_for(target, self.version()) {
            let cache = downloads.join(format!("{}-{}.sha256sums", self.config.tool(), self.version()));
            self.downloader
                .verify_upstream_checksum(&archive, &checksums_url, &cache)
                .await?;
        }

        let extract_dir = self.work("extracted");
        let stale = extract_dir.clone();
        blocking("cleanup", move || fs_tree::remove_if_exists(&stale)).await?;
        extract::extract_archive(&archive, &extract_dir).await?;

        extract::find_root(&extract_dir, self.recipe.root_prefix.as_deref())
    }

    async fn install_supplements(&self, bin_dir: &Path) {
        let platform = self.config.target().platform;
        for (index, supplement) in self.recipe.supplements_for(platform).enumerate() {
            tracing::info!("➕ Installing supplement from {}", supplement.url);
            let scratch = self.work("supplements").join(index.to_string());
            match strip::install_supplement(&self.downloader, supplement, bin_dir, &scratch).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!("⚠️  Supplement {} provided nothing", supplement.install_as),
                Err(e) => tracing::warn!("⚠️  Failed to install {}: {}", supplement.install_as, e),
            }
        }
    }
}

#[async_trait::async_trait]
impl<C: ConfigProvider> Pipeline for ToolchainPipeline<C> {
    async fn fetch(&self) -> Result<PathBuf> {
        tracing::info!(
            "🚀 {} {} for {}",
            self.config.tool(),
            self.version(),
            self.config.target()
        );

        match self.config.source_dir() {
            Some(source) => {
                if !source.is_dir() {
                    return Err(BinsError::InvalidConfigValueError {
                        field: "source_dir".to_string(),
                        value: source.display().to_string(),
                        reason: "directory does not exist".to_string(),
                    });
                }
                tracing::info!("Using pre-extracted binaries from {}", source.display());
                Ok(source.to_path_buf())
            }
            None => self.download_and_extract().await,
        }
    }

    async fn prepare(&self, extracted: PathBuf) -> Result<StagedTree> {
        let target = self.config.target();
        let stripped = self.work("stripped");

        let rules = self.recipe.strip.clone();
        let out = stripped.clone();
        let report = blocking("strip", move || {
            fs_tree::remove_if_exists(&out)?;
            strip::apply_rules(&rules, &extracted, &out, target)
        })
        .await?;
        tracing::info!(
            "✂️  Kept {} binaries, excluded {} files ({:.2} MB), removed {:.2} MB",
            report.kept,
            report.excluded_files,
            mib(report.excluded_bytes),
            mib(report.removed_bytes)
        );

        let bin = stripped.join("bin");
        self.install_supplements(&bin).await;
        if self.recipe.strip_symbols && target.platform == Platform::Linux && bin.is_dir() {
            strip::strip_symbols(&bin).await?;
        }

        let staging = self.work("hardlinked").join(self.archive_name());
        let manifest_path = stripped.join(dedup::MANIFEST_FILE);
        let dedup_manifest = {
            let stripped = stripped.clone();
            let staging = staging.clone();
            let manifest_path = manifest_path.clone();
            blocking("dedup", move || stage_tree(&stripped, &staging, &manifest_path)).await?
        };

        if target.platform == Platform::Win {
            if let Some(recipe) = &self.recipe.mingw {
                mingw::integrate(
                    &self.downloader,
                    recipe,
                    target.arch,
                    &staging,
                    &self.work("mingw"),
                )
                .await?;
            }
        }

        Ok(StagedTree {
            root: staging,
            dedup_manifest: dedup_manifest.then_some(manifest_path),
        })
    }

    async fn package(&self, staged: StagedTree) -> Result<PackageReport> {
        let archive_name = self.archive_name();
        let output_dir = self.config.output_dir().to_path_buf();
        let tar_path = self.work(&format!("{}.tar", archive_name));
        let final_archive = self.final_archive();
        let level = self.config.zstd_level();

        {
            let root = staged.root.clone();
            let tar_path = tar_path.clone();
            blocking("tar", move || {
                archive::create_tar(&root, &tar_path)?;
                archive::verify_permissions(&tar_path)
            })
            .await?;
        }

        fs::create_dir_all(&output_dir)?;
        self.output_started.store(true, Ordering::SeqCst);
        let (sha256, size) = {
            let tar_path = tar_path.clone();
            let final_archive = final_archive.clone();
            blocking("compress", move || {
                let size = archive::compress_zstd(&tar_path, &final_archive, level)?;
                let (sha256, _) = checksum::write_sidecar(&final_archive)?;
                Ok((sha256, size))
            })
            .await?
        };
        tracing::info!("🔐 SHA-256: {}", sha256);

        let file_name = format!("{}.tar.zst", archive_name);
        let tool = self.config.tool();
        let target = self.config.target();
        let max_size_mb = self.config.max_size_mb();

        let parts = if size > max_size_mb.saturating_mul(MIB) {
            tracing::info!(
                "Archive is {:.2} MB, above the {} MB limit - splitting",
                mib(size),
                max_size_mb
            );
            let final_archive = final_archive.clone();
            let output_dir = output_dir.clone();
            let name = file_name.clone();
            blocking("split", move || {
                let parts = split::split_archive(&final_archive, max_size_mb.saturating_sub(1).max(1), &output_dir)?;
                split::write_join_scripts(&output_dir, &name, parts.len())?;
                fs::remove_file(&final_archive)?;
                Ok(parts)
            })
            .await?
        } else {
            Vec::new()
        };

        let part_refs = (!parts.is_empty()).then(|| {
            parts
                .iter()
                .map(|p| PartRef {
                    href: self.toolchain.href_for(tool, target, &p.file_name()),
                    sha256: p.sha256.clone(),
                })
                .collect()
        });
        let manifest_path = output_dir.join(manifest::MANIFEST_FILE);
        manifest::update_manifest_file(
            &manifest_path,
            self.version(),
            ReleaseEntry {
                parts: part_refs,
                ..ReleaseEntry::new(self.toolchain.href_for(tool, target, &file_name), sha256.clone())
            },
            true,
        )?;

        if self.config.keep_intermediate() {
            tracing::info!("Keeping intermediate files in {}", self.config.work_dir().display());
        } else {
            let mut leftovers = vec![
                tar_path,
                self.work("stripped"),
                self.work("hardlinked"),
                self.work("supplements"),
                self.work("mingw"),
            ];
            if self.config.source_dir().is_none() {
                leftovers.push(self.work("extracted"));
            }
            blocking("cleanup", move || {
                for path in leftovers {
                    fs_tree::remove_if_exists(&path)?;
                }
                Ok(())
            })
            .await?;
        }
        self.output_started.store(false, Ordering::SeqCst);

        Ok(PackageReport {
            archive_name,
            archive: final_archive,
            sha256,
            size,
            parts,
            manifest: Some(manifest_path),
        })
    }

    async fn abort(&self) {
        if !self.output_started.load(Ordering::SeqCst) {
            return;
        }
        let archive = self.final_archive();
        for path in [checksum::sidecar_path(&archive), archive] {
            if path.exists() {
                tracing::warn!("Removing incomplete output {}", path.display());
                let _ = fs::remove_file(&path);
            }
        }
    }
}

/// Deduplicate `stripped/bin` and build the hard-linked staging tree.
/// Returns whether a dedup manifest was written.
fn stage_tree(stripped: &Path, staging: &Path, manifest_path: &Path) -> Result<bool> {
    fs_tree::remove_if_exists(staging)?;
    fs::create_dir_all(staging)?;

    let bin = stripped.join("bin");
    let has_bin = bin.is_dir();
    if has_bin {
        let manifest = dedup::deduplicate(&bin)?;
        dedup::write_manifest(&manifest, manifest_path)?;
        let out_bin = staging.join("bin");
        hardlink::create_hardlink_structure(&manifest, &bin, &out_bin)?;
        copy_symlinks(&bin, &out_bin)?;
    }

    for entry in fs::read_dir(stripped)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == "bin" || name == dedup::MANIFEST_FILE {
            continue;
        }
        let target = staging.join(&name);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            fs_tree::copy_tree(&entry.path(), &target, |_| false)?;
        } else if file_type.is_symlink() {
            fs_tree::replace_with_symlink(&fs::read_link(entry.path())?, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(has_bin)
}

/// Dedup only hashes regular files; carry `bin` symlinks (aliases) over as-is.
fn copy_symlinks(from: &Path, to: &Path) -> Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        if entry.file_type()?.is_symlink() {
            let link = fs::read_link(entry.path())?;
            fs_tree::replace_with_symlink(&link, &to.join(entry.file_name()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::FetchJob;
    use crate::core::engine::ArchiveEngine;
    use crate::domain::model::{Arch, Target};
    use tempfile::TempDir;

    const RECIPES: &str = r#"
[repository]
base_url = "https://example.com/assets"

[tools.clang]
version = "19.1.7"
archive_prefix = "llvm"

[tools.clang.urls]
"linux-x86_64" = "https://example.com/LLVM-{version}-Linux-X64.tar.xz"

[tools.clang.strip]
mode = "allowlist"
keep_binaries = ["clang", "clang++", "lld", "ld.lld"]
exclude_lib_patterns = ["libflang_rt"]
"#;

    fn write(path: &Path, data: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn fake_llvm(root: &Path) -> PathBuf {
        let source = root.join("LLVM-19.1.7-Linux-X64");
        write(&source.join("bin/clang"), b"clang driver");
        write(&source.join("bin/clang++"), b"clang driver");
        write(&source.join("bin/lld"), b"linker");
        write(&source.join("bin/ld.lld"), b"linker");
        write(&source.join("bin/opt"), b"optimizer");
        write(&source.join("lib/clang/19/include/stddef.h"), b"#pragma once");
        write(&source.join("lib/clang/19/lib/libflang_rt.a"), b"fortran");
        source
    }

    fn job(temp: &Path, source: PathBuf) -> FetchJob {
        let mut job = FetchJob::new(
            "clang",
            Target::new(Platform::Linux, Arch::X86_64),
            temp.join("work"),
            temp.join("assets/clang/linux/x86_64"),
        );
        job.source_dir = Some(source);
        job.zstd_level = 3;
        job
    }

    #[tokio::test]
    async fn test_source_dir_run_produces_archive_and_manifest() {
        let temp = TempDir::new().unwrap();
        let source = fake_llvm(temp.path());
        let config = ToolchainConfig::from_toml_str(RECIPES).unwrap();
        let pipeline = ToolchainPipeline::new(job(temp.path(), source.clone()), config).unwrap();
        assert_eq!(pipeline.archive_name(), "llvm-19.1.7-linux-x86_64");

        let report = ArchiveEngine::new(pipeline).run().await.unwrap();
        assert!(!report.is_split());
        assert!(report.archive.exists());
        assert_eq!(report.sha256, checksum::sha256_file(&report.archive).unwrap());
        assert!(checksum::sidecar_path(&report.archive).exists());

        let manifest = manifest::ReleaseManifest::load(&report.manifest.unwrap()).unwrap();
        assert_eq!(manifest.latest.as_deref(), Some("19.1.7"));
        assert_eq!(
            manifest.get("19.1.7").unwrap().href,
            "https://example.com/assets/clang/linux/x86_64/llvm-19.1.7-linux-x86_64.tar.zst"
        );

        let root = archive::expand_archive(&report.archive, &temp.path().join("check"), true).unwrap();
        assert!(root.join("lib/clang/19/include/stddef.h").exists());
        assert!(!root.join("lib/clang/19/lib/libflang_rt.a").exists());
        assert!(!root.join("bin/opt").exists());
        assert_eq!(archive::verify_extraction(&root, Some(&source.join("bin"))).unwrap(), 4);
        if cfg!(unix) {
            assert_eq!(hardlink::verify_hardlinks(&root.join("bin")).unwrap(), (2, 4));
        }

        assert!(source.join("bin/opt").exists());
        assert!(!temp.path().join("work/stripped").exists());
        assert!(!temp.path().join("work/hardlinked").exists());
    }

    #[tokio::test]
    async fn test_keep_intermediate_leaves_work_tree() {
        let temp = TempDir::new().unwrap();
        let source = fake_llvm(temp.path());
        let config = ToolchainConfig::from_toml_str(RECIPES).unwrap();
        let mut job = job(temp.path(), source);
        job.keep_intermediate = true;

        ArchiveEngine::new(ToolchainPipeline::new(job, config).unwrap())
            .run()
            .await
            .unwrap();

        let work = temp.path().join("work");
        assert!(work.join("stripped").join(dedup::MANIFEST_FILE).exists());
        assert!(work.join("hardlinked/llvm-19.1.7-linux-x86_64/bin/clang++").exists());
        assert!(work.join("llvm-19.1.7-linux-x86_64.tar").exists());
    }

    #[tokio::test]
    async fn test_missing_source_dir_is_reported() {
        let temp = TempDir::new().unwrap();
        let config = ToolchainConfig::from_toml_str(RECIPES).unwrap();
        let pipeline =
            ToolchainPipeline::new(job(temp.path(), temp.path().join("nope")), config).unwrap();

        let err = ArchiveEngine::new(pipeline).run().await.unwrap_err();
        assert!(matches!(err, BinsError::InvalidConfigValueError { .. }));
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        let temp = TempDir::new().unwrap();
        let config = ToolchainConfig::from_toml_str(RECIPES).unwrap();
        let mut job = job(temp.path(), temp.path().to_path_buf());
        job.tool = "emsdk".to_string();
        assert!(ToolchainPipeline::new(job, config).is_err());
    }

    fn lld_tarball() -> Vec<u8> {
        let data: &[u8] = b"extra linker";
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "extras/bin/lld-extra", data).unwrap();
        let tar = builder.into_inner().unwrap();
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        std::io::Write::write_all(&mut encoder, &tar).unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn test_supplements_apply_to_matching_platform() {
        use httpmock::prelude::*;

        let temp = TempDir::new().unwrap();
        let source = fake_llvm(temp.path());
        let server = MockServer::start();
        let linux = server.mock(|when, then| {
            when.method(GET).path("/linux-extra.tar.gz");
            then.status(200).body(lld_tarball());
        });
        let broken = server.mock(|when, then| {
            when.method(GET).path("/broken.tar.gz");
            then.status(500);
        });
        let darwin = server.mock(|when, then| {
            when.method(GET).path("/darwin-extra.tar.gz");
            then.status(200).body(lld_tarball());
        });

        let recipes = format!(
            r#"{base}
[[tools.clang.supplements]]
platform = "linux"
url = "{linux}"
candidates = ["lld-extra"]
install_as = "ld.extra"
aliases = ["ld.extra2"]

[[tools.clang.supplements]]
platform = "linux"
url = "{broken}"
candidates = ["anything"]
install_as = "never"

[[tools.clang.supplements]]
platform = "darwin"
url = "{darwin}"
candidates = ["lld-extra"]
install_as = "ld64.lld"
"#,
            base = RECIPES,
            linux = server.url("/linux-extra.tar.gz"),
            broken = server.url("/broken.tar.gz"),
            darwin = server.url("/darwin-extra.tar.gz"),
        );
        let config = ToolchainConfig::from_toml_str(&recipes).unwrap();
        let pipeline = ToolchainPipeline::new(job(temp.path(), source), config).unwrap();
        let report = ArchiveEngine::new(pipeline).run().await.unwrap();

        linux.assert();
        broken.assert();
        darwin.assert_hits(0);

        let root = archive::expand_archive(&report.archive, &temp.path().join("check"), false).unwrap();
        assert_eq!(fs::read(root.join("bin/ld.extra")).unwrap(), b"extra linker");
        assert!(!root.join("bin/never").exists());
        assert!(!root.join("bin/ld64.lld").exists());
        #[cfg(unix)]
        assert_eq!(fs::read_link(root.join("bin/ld.extra2")).unwrap(), Path::new("ld.extra"));
    }

    #[tokio::test]
    async fn test_abort_removes_partial_output_only_once_started() {
        let temp = TempDir::new().unwrap();
        let config = ToolchainConfig::from_toml_str(RECIPES).unwrap();
        let pipeline = ToolchainPipeline::new(job(temp.path(), temp.path().to_path_buf()), config).unwrap();

        let archive = pipeline.final_archive();
        let sidecar = checksum::sidecar_path(&archive);
        write(&archive, b"previous release");
        write(&sidecar, b"ab  llvm-19.1.7-linux-x86_64.tar.zst\n");

        // 尚未開始寫入：保留上一次的產出
        pipeline.abort().await;
        assert!(archive.exists());
        assert!(sidecar.exists());

        pipeline.output_started.store(true, Ordering::SeqCst);
        write(&archive, b"half written");
        pipeline.abort().await;
        assert!(!archive.exists());
        assert!(!sidecar.exists());
    }

    #[tokio::test]
    async fn test_keep_recipe_packages_prebuilt_tree() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("iwyu/linux/x86_64");
        write(&source.join("bin/include-what-you-use"), b"iwyu");
        write(&source.join("bin/fix_includes.py"), b"#!/usr/bin/env python3");
        write(&source.join("share/include-what-you-use/gcc.libc.imp"), b"[]");

        let config = ToolchainConfig::builtin().unwrap();
        let mut job = FetchJob::new(
            "iwyu",
            Target::new(Platform::Linux, Arch::X86_64),
            temp.path().join("work"),
            temp.path().join("assets/iwyu/linux/x86_64"),
        );
        job.source_dir = Some(source);
        job.zstd_level = 3;

        let report = ArchiveEngine::new(ToolchainPipeline::new(job, config).unwrap())
            .run()
            .await
            .unwrap();
        assert_eq!(report.archive_name, "iwyu-0.25-linux-x86_64");

        let root = archive::expand_archive(&report.archive, &temp.path().join("check"), false).unwrap();
        assert_eq!(fs::read(root.join("bin/include-what-you-use")).unwrap(), b"iwyu");
        let data = root.join("share/include-what-you-use/gcc.libc.imp");
        assert!(data.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode(&root.join("bin/fix_includes.py")), 0o755);
            assert_eq!(mode(&data), 0o644);
        }
    }

    fn llvm_mingw_zip() -> Vec<u8> {
        use std::io::Write;

        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for path in [
            "llvm-mingw-20251104-ucrt-x86_64/bin/clang.exe",
            "llvm-mingw-20251104-ucrt-x86_64/include/windows.h",
            "llvm-mingw-20251104-ucrt-x86_64/x86_64-w64-mingw32/lib/libkernel32.a",
            "llvm-mingw-20251104-ucrt-x86_64/aarch64-w64-mingw32/lib/libkernel32.a",
            "llvm-mingw-20251104-ucrt-x86_64/generic-w64-mingw32/include/stdio.h",
            "llvm-mingw-20251104-ucrt-x86_64/lib/clang/21/lib/windows/libclang_rt.builtins-x86_64.a",
        ] {
            zip.start_file::<_, ()>(path, zip::write::FileOptions::default())
                .unwrap();
            zip.write_all(b"x").unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_sysroot_recipe_packages_headers_and_libraries() {
        use httpmock::prelude::*;

        let temp = TempDir::new().unwrap();
        let server = MockServer::start();
        let release = server.mock(|when, then| {
            when.method(GET).path("/llvm-mingw-20251104-ucrt-x86_64.zip");
            then.status(200).body(llvm_mingw_zip());
        });

        let recipes = format!(
            r#"
[repository]
base_url = "https://example.com/assets"

[tools.mingw]
version = "21.1.5"
archive_prefix = "mingw-sysroot"
root_prefix = "llvm-mingw"

[tools.mingw.urls]
"win-x86_64" = "{url}"

[tools.mingw.strip]
mode = "sysroot"
"#,
            url = server.url("/llvm-mingw-20251104-ucrt-x86_64.zip"),
        );
        let config = ToolchainConfig::from_toml_str(&recipes).unwrap();
        let mut job = FetchJob::new(
            "mingw",
            Target::new(Platform::Win, Arch::X86_64),
            temp.path().join("work"),
            temp.path().join("assets/mingw/win/x86_64"),
        );
        job.zstd_level = 3;

        let report = ArchiveEngine::new(ToolchainPipeline::new(job, config).unwrap())
            .run()
            .await
            .unwrap();
        release.assert();
        assert_eq!(report.archive_name, "mingw-sysroot-21.1.5-win-x86_64");

        let manifest = manifest::ReleaseManifest::load(&report.manifest.unwrap()).unwrap();
        assert_eq!(
            manifest.get("21.1.5").unwrap().href,
            "https://example.com/assets/mingw/win/x86_64/mingw-sysroot-21.1.5-win-x86_64.tar.zst"
        );

        let root = archive::expand_archive(&report.archive, &temp.path().join("check"), false).unwrap();
        assert!(root.join("include/windows.h").exists());
        assert!(root.join("x86_64-w64-mingw32/lib/libkernel32.a").exists());
        assert!(root.join("generic-w64-mingw32/include/stdio.h").exists());
        assert!(root
            .join("lib/clang/21/lib/windows/libclang_rt.builtins-x86_64.a")
            .exists());
        assert!(!root.join("aarch64-w64-mingw32").exists());
        assert!(!root.join("bin").exists());
    }
}
