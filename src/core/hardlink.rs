use crate::domain::model::DedupManifest;
use crate::utils::error::{BinsError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HardlinkReport {
    pub copied: usize,
    pub linked: usize,
    /// Hard link failed and a full copy was written instead.
    pub copied_fallback: usize,
    pub missing: usize,
}

/// Lay out `out_bin` so every manifest entry exists, with duplicates
/// sharing one inode with the first copy of their canonical file.
pub fn create_hardlink_structure(
    manifest: &DedupManifest,
    source_bin: &Path,
    out_bin: &Path,
) -> Result<HardlinkReport> {
    fs::create_dir_all(out_bin)?;
    let mut report = HardlinkReport::default();
    // canonical name -> first file written for it
    let mut first_copy: HashMap<&str, PathBuf> = HashMap::new();

    for (file, canonical) in &manifest.manifest {
        let source = source_bin.join(canonical);
        if !source.exists() {
            tracing::warn!("⚠️  Canonical file missing, skipping {}: {}", file, source.display());
            report.missing += 1;
            continue;
        }

        let dest = out_bin.join(file);
        if dest.exists() {
            fs::remove_file(&dest)?;
        }

        match first_copy.get(canonical.as_str()) {
            None => {
                fs::copy(&source, &dest)?;
                first_copy.insert(canonical.as_str(), dest);
                report.copied += 1;
            }
            Some(existing) => match fs::hard_link(existing, &dest) {
                Ok(()) => report.linked += 1,
                Err(e) => {
                    tracing::warn!("Hard link failed for {} ({}), copying instead", file, e);
                    fs::copy(&source, &dest)?;
                    report.copied_fallback += 1;
                }
            },
        }
    }

    tracing::info!(
        "🔗 Hard-link structure: {} copied, {} linked, {} fallback copies",
        report.copied,
        report.linked,
        report.copied_fallback
    );
    Ok(report)
}

/// Count distinct inodes against regular files in `bin_dir`.
#[cfg(unix)]
pub fn verify_hardlinks(bin_dir: &Path) -> Result<(usize, usize)> {
    use std::collections::HashSet;
    use std::os::unix::fs::MetadataExt;

    let mut inodes = HashSet::new();
    let mut total = 0;
    for entry in fs::read_dir(bin_dir)? {
        let entry = entry?;
        let meta = fs::symlink_metadata(entry.path())?;
        if meta.is_file() {
            inodes.insert((meta.dev(), meta.ino()));
            total += 1;
        }
    }
    Ok((inodes.len(), total))
}

#[cfg(not(unix))]
pub fn verify_hardlinks(bin_dir: &Path) -> Result<(usize, usize)> {
    let total = fs::read_dir(bin_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .count();
    Ok((total, total))
}

/// Replace every hard-linked file below `dir` with an independent copy.
/// Returns the number of files rewritten.
#[cfg(unix)]
pub fn break_hardlinks(dir: &Path) -> Result<usize> {
    use std::collections::BTreeMap;
    use std::os::unix::fs::MetadataExt;
    use walkdir::WalkDir;

    let mut groups: BTreeMap<(u64, u64), Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = entry.metadata()?;
        if meta.nlink() > 1 {
            groups
                .entry((meta.dev(), meta.ino()))
                .or_default()
                .push(entry.into_path());
        }
    }

    let mut rewritten = 0;
    for paths in groups.values() {
        // 第一個保留原 inode，其餘各自複製
        for path in paths.iter().skip(1) {
            detach(path)?;
            rewritten += 1;
        }
    }

    if rewritten > 0 {
        tracing::info!("Converted {} hard links into independent files", rewritten);
    }
    Ok(rewritten)
}

#[cfg(not(unix))]
pub fn break_hardlinks(_dir: &Path) -> Result<usize> {
    Ok(0)
}

#[cfg(unix)]
fn detach(path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| BinsError::processing(format!("{} has no parent", path.display())))?;
    let permissions = fs::metadata(path)?.permissions();

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    std::io::copy(&mut fs::File::open(path)?, temp.as_file_mut())?;
    temp.as_file().set_permissions(permissions)?;
    temp.persist(path).map_err(|e| BinsError::IoError(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dedup;
    use tempfile::TempDir;

    fn source_bin(root: &Path) -> PathBuf {
        let bin = root.join("stripped/bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("clang"), b"clang-binary").unwrap();
        fs::write(bin.join("clang++"), b"clang-binary").unwrap();
        fs::write(bin.join("clang-cl"), b"clang-binary").unwrap();
        fs::write(bin.join("llvm-nm"), b"nm").unwrap();
        bin
    }

    #[test]
    fn test_duplicates_share_inodes() {
        let temp = TempDir::new().unwrap();
        let bin = source_bin(temp.path());
        let manifest = dedup::deduplicate(&bin).unwrap();

        let out = temp.path().join("hardlinked/bin");
        let report = create_hardlink_structure(&manifest, &bin, &out).unwrap();
        assert_eq!(report.copied, 2);
        assert_eq!(report.linked + report.copied_fallback, 2);

        let (unique, total) = verify_hardlinks(&out).unwrap();
        assert_eq!(total, 4);
        if cfg!(unix) {
            assert_eq!(unique, 2);
        }
        assert_eq!(fs::read(out.join("clang-cl")).unwrap(), b"clang-binary");
    }

    #[test]
    fn test_missing_canonical_is_skipped() {
        let temp = TempDir::new().unwrap();
        let bin = source_bin(temp.path());
        let mut manifest = dedup::deduplicate(&bin).unwrap();
        manifest.manifest.insert("lld".into(), "lld".into());

        let out = temp.path().join("out");
        let report = create_hardlink_structure(&manifest, &bin, &out).unwrap();
        assert_eq!(report.missing, 1);
        assert!(!out.join("lld").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_break_hardlinks_detaches_files() {
        let temp = TempDir::new().unwrap();
        let bin = source_bin(temp.path());
        let manifest = dedup::deduplicate(&bin).unwrap();
        let out = temp.path().join("root/bin");
        create_hardlink_structure(&manifest, &bin, &out).unwrap();

        let rewritten = break_hardlinks(&out).unwrap();
        assert_eq!(rewritten, 2);
        assert_eq!(verify_hardlinks(&out).unwrap(), (4, 4));

        fs::write(out.join("clang"), b"changed").unwrap();
        assert_eq!(fs::read(out.join("clang++")).unwrap(), b"clang-binary");
    }
}
