use crate::config::toml_config::MingwRecipe;
use crate::core::download::Downloader;
use crate::core::{blocking, extract};
use crate::domain::model::Arch;
use crate::utils::error::{BinsError, Result};
use crate::utils::fs_tree;
use std::path::{Path, PathBuf};

const ROOT_PREFIX: &str = "llvm-mingw";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MingwReport {
    pub copied_dirs: Vec<String>,
    pub files: usize,
}

/// Directories of an LLVM-MinGW release that make up the Windows GNU sysroot.
pub fn sysroot_dirs(arch: Arch) -> Vec<PathBuf> {
    vec![
        PathBuf::from("include"),
        PathBuf::from(format!("{}-w64-mingw32", arch.gnu_name())),
        PathBuf::from("generic-w64-mingw32"),
        Path::new("lib").join("clang"),
    ]
}

/// Download the LLVM-MinGW release for `arch` and merge its sysroot into `staging`.
pub async fn integrate(
    downloader: &Downloader,
    recipe: &MingwRecipe,
    arch: Arch,
    staging: &Path,
    scratch: &Path,
) -> Result<MingwReport> {
    let url = recipe.url_for(arch)?;
    let file_name = url
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| BinsError::processing(format!("cannot derive file name from {}", url)))?;

    tracing::info!("🪟 Integrating LLVM-MinGW {} sysroot ({})", recipe.version, arch.as_str());
    let archive = scratch.join(file_name);
    downloader.fetch(&url, &archive).await?;

    let extract_dir = scratch.join("mingw-extracted");
    extract::extract_archive(&archive, &extract_dir).await?;
    let root = extract::find_root(&extract_dir, Some(ROOT_PREFIX))?;

    let staging = staging.to_path_buf();
    blocking("mingw copy", move || copy_sysroot(&root, &staging, arch)).await
}

/// Copy the sysroot directories from an extracted release root into
/// `staging`, replacing any existing copies.
pub fn copy_sysroot(mingw_root: &Path, staging: &Path, arch: Arch) -> Result<MingwReport> {
    let mut report = MingwReport::default();

    for dir in sysroot_dirs(arch) {
        let source = mingw_root.join(&dir);
        if !source.is_dir() {
            tracing::warn!("  ⚠️  {} not present in LLVM-MinGW release", dir.display());
            continue;
        }
        let stats = fs_tree::replace_tree(&source, &staging.join(&dir))?;
        tracing::info!("  ✓ {} ({} files)", dir.display(), stats.files);
        report.files += stats.files;
        report.copied_dirs.push(dir.to_string_lossy().replace('\\', "/"));
    }

    if report.copied_dirs.is_empty() {
        return Err(BinsError::processing(format!(
            "no sysroot directories found in {}",
            mingw_root.display()
        )));
    }
    Ok(report)
}
