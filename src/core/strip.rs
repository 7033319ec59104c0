use crate::config::toml_config::{StripRules, Supplement};
use crate::core::download::Downloader;
use crate::core::{extract, mingw};
use crate::domain::model::{Platform, Target};
use crate::utils::error::{BinsError, Result};
use crate::utils::fs_tree::{self, mib};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Headers and text files are always shipped, whatever the exclude patterns say.
const ALWAYS_KEEP_SUFFIXES: &[&str] = &[".h", ".inc", ".modulemap", ".tcc", ".txt"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripReport {
    pub kept: usize,
    pub skipped: Vec<String>,
    pub excluded_files: usize,
    pub excluded_bytes: u64,
    pub removed_bytes: u64,
    pub lib_clang_copied: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolStripReport {
    pub stripped: usize,
    pub failed: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Reduce `extracted` into `out` according to `rules`.
pub fn apply_rules(
    rules: &StripRules,
    extracted: &Path,
    out: &Path,
    target: Target,
) -> Result<StripReport> {
    match rules {
        StripRules::Allowlist {
            keep_binaries,
            exclude_lib_patterns,
        } => apply_allowlist(extracted, out, target.platform, keep_binaries, exclude_lib_patterns),
        StripRules::Prune {
            remove_dirs,
            remove_files,
            remove_executables,
            remove_modules,
        } => {
            fs_tree::copy_tree(extracted, out, |_| false)?;
            prune(out, remove_dirs, remove_files, remove_executables, remove_modules)
        }
        StripRules::Keep => {
            let copied = fs_tree::copy_tree(extracted, out, |_| false)?;
            Ok(StripReport {
                kept: copied.files,
                ..StripReport::default()
            })
        }
        StripRules::Sysroot => {
            let copied = mingw::copy_sysroot(extracted, out, target.arch)?;
            Ok(StripReport {
                kept: copied.files,
                ..StripReport::default()
            })
        }
    }
}

/// Shallowest `bin` directory below `root`.
pub fn find_bin_dir(root: &Path) -> Result<PathBuf> {
    find_dir(root, |p| p.file_name().is_some_and(|n| n == "bin"))
        .ok_or_else(|| BinsError::processing(format!("No bin directory found in {}", root.display())))
}

fn find_lib_clang(root: &Path) -> Option<PathBuf> {
    find_dir(root, |p| {
        p.file_name().is_some_and(|n| n == "clang")
            && p.parent()
                .and_then(|parent| parent.file_name())
                .is_some_and(|n| n == "lib")
    })
}

fn find_dir<F: Fn(&Path) -> bool>(root: &Path, predicate: F) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_dir() && predicate(e.path()))
        .min_by_key(|e| e.depth())
        .map(|e| e.into_path())
}

pub fn should_exclude_lib_file(path: &Path, patterns: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if ALWAYS_KEEP_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
        return false;
    }
    patterns.iter().any(|pattern| name.contains(pattern.as_str()))
}

pub fn apply_allowlist(
    extracted: &Path,
    out: &Path,
    platform: Platform,
    keep_binaries: &[String],
    exclude_lib_patterns: &[String],
) -> Result<StripReport> {
    let bin_dir = find_bin_dir(extracted)?;
    tracing::info!("Found bin directory: {}", bin_dir.display());

    let out_bin = out.join("bin");
    fs::create_dir_all(&out_bin)?;
    let mut report = StripReport::default();

    for name in keep_binaries {
        let file_name = format!("{}{}", name, platform.exe_suffix());
        let source = bin_dir.join(&file_name);
        if source.is_file() {
            fs::copy(&source, out_bin.join(&file_name))?;
            tracing::debug!("  ✓ {}", file_name);
            report.kept += 1;
        } else {
            tracing::debug!("  - {} (not found)", file_name);
            report.skipped.push(file_name);
        }
    }

    if let Some(lib_clang) = find_lib_clang(extracted) {
        tracing::info!("Copying lib/clang from {}", lib_clang.display());
        let stats = fs_tree::copy_tree(&lib_clang, &out.join("lib").join("clang"), |p| {
            should_exclude_lib_file(p, exclude_lib_patterns)
        })?;
        report.lib_clang_copied = true;
        report.excluded_files = stats.excluded;
        report.excluded_bytes = stats.excluded_bytes;
    }

    tracing::info!(
        "Kept {} binaries, skipped {} (not found)",
        report.kept,
        report.skipped.len()
    );
    if report.excluded_files > 0 {
        tracing::info!(
            "Excluded {} optional lib files ({:.1} MB)",
            report.excluded_files,
            mib(report.excluded_bytes)
        );
    }
    Ok(report)
}

pub fn prune(
    root: &Path,
    remove_dirs: &[String],
    remove_files: &[String],
    remove_executables: &[String],
    remove_modules: &[String],
) -> Result<StripReport> {
    let mut report = StripReport::default();

    for dir in remove_dirs {
        remove_counted(&root.join(dir), &mut report)?;
    }
    for file in remove_files {
        remove_counted(&root.join(file), &mut report)?;
    }

    let bin_dir = root.join("bin");
    if bin_dir.is_dir() {
        let mut victims: Vec<PathBuf> = fs::read_dir(&bin_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| remove_executables.iter().any(|x| n.starts_with(x.as_str())))
            })
            .collect();
        victims.sort();
        for victim in victims {
            remove_counted(&victim, &mut report)?;
        }
    }

    let node_modules = root.join("lib").join("node_modules");
    for module in remove_modules {
        remove_counted(&node_modules.join(module), &mut report)?;
    }

    tracing::info!("Removed {:.1} MB of unneeded files", mib(report.removed_bytes));
    Ok(report)
}

fn remove_counted(path: &Path, report: &mut StripReport) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    let size = if meta.is_dir() {
        fs_tree::dir_size(path)?
    } else {
        meta.len()
    };
    tracing::debug!("  Removing {} ({:.1} MB)", path.display(), mib(size));
    fs_tree::remove_if_exists(path)?;
    report.removed_bytes += size;
    Ok(())
}

/// Install an extra upstream binary (e.g. lld for macOS) into `bin_dir`.
/// Returns false when the download had no matching file.
pub async fn install_supplement(
    downloader: &Downloader,
    supplement: &Supplement,
    bin_dir: &Path,
    scratch: &Path,
) -> Result<bool> {
    let file_name = supplement
        .url
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("supplement.tar.xz");
    let archive = scratch.join(file_name);
    downloader.fetch(&supplement.url, &archive).await?;

    let unpack_dir = scratch.join("unpacked");
    extract::extract_archive(&archive, &unpack_dir).await?;

    let found = supplement.candidates.iter().find_map(|candidate| {
        WalkDir::new(&unpack_dir)
            .sort_by_file_name()
            .into_iter()
            .flatten()
            .find(|e| e.file_type().is_file() && e.file_name() == candidate.as_str())
            .map(|e| e.into_path())
    });

    let Some(binary) = found else {
        tracing::warn!("  ✗ None of {:?} found in {}", supplement.candidates, file_name);
        return Ok(false);
    };

    fs::create_dir_all(bin_dir)?;
    let installed = bin_dir.join(&supplement.install_as);
    fs::copy(&binary, &installed)?;
    fs_tree::set_mode(&installed, 0o755)?;
    tracing::info!("  ✓ Installed {}", installed.display());

    for alias in &supplement.aliases {
        fs_tree::replace_with_symlink(Path::new(&supplement.install_as), &bin_dir.join(alias))?;
        tracing::info!("  ✓ Linked {} -> {}", alias, supplement.install_as);
    }
    Ok(true)
}

/// Run `llvm-strip --strip-all` over every regular file in `bin_dir`.
/// A missing `llvm-strip` is not an error: binaries stay larger but work.
pub async fn strip_symbols(bin_dir: &Path) -> Result<SymbolStripReport> {
    let llvm_strip = which::which("llvm-strip").ok();
    strip_symbols_with(llvm_strip.as_deref(), bin_dir).await
}

/// Same as [`strip_symbols`] with an explicit stripper; `None` skips.
pub async fn strip_symbols_with(
    llvm_strip: Option<&Path>,
    bin_dir: &Path,
) -> Result<SymbolStripReport> {
    let mut report = SymbolStripReport::default();

    let Some(llvm_strip) = llvm_strip else {
        tracing::warn!("⚠️  llvm-strip not found - skipping binary stripping");
        return Ok(report);
    };
    tracing::info!("Using: {}", llvm_strip.display());

    let mut binaries: Vec<PathBuf> = fs::read_dir(bin_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    binaries.sort();

    for binary in binaries {
        let name = binary.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let before = fs::metadata(&binary)?.len();

        let output = tokio::process::Command::new(llvm_strip)
            .arg("--strip-all")
            .arg(&binary)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let after = fs::metadata(&binary)?.len();
                tracing::debug!(
                    "  ✓ {:30} {:7.1} MB → {:7.1} MB",
                    name,
                    mib(before),
                    mib(after)
                );
                report.stripped += 1;
                report.bytes_before += before;
                report.bytes_after += after;
            }
            Ok(out) => {
                tracing::warn!(
                    "  ✗ {:30} - Failed to strip: {}",
                    name,
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                report.failed += 1;
            }
            Err(e) => {
                tracing::warn!("  ✗ {:30} - Error: {}", name, e);
                report.failed += 1;
            }
        }
    }

    let saved = report.bytes_before.saturating_sub(report.bytes_after);
    tracing::info!(
        "Stripped {} binaries: {:.2} MB → {:.2} MB (saved {:.2} MB)",
        report.stripped,
        mib(report.bytes_before),
        mib(report.bytes_after),
        mib(saved)
    );
    Ok(report)
}
