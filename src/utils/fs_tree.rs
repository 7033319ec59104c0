use crate::utils::error::{BinsError, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub excluded: usize,
    pub excluded_bytes: u64,
}

/// Recursively copy `src` into `dst`. Symlinks are recreated as symlinks.
/// Files for which `exclude` returns true are skipped and counted.
pub fn copy_tree<F>(src: &Path, dst: &Path, exclude: F) -> Result<CopyStats>
where
    F: Fn(&Path) -> bool,
{
    let mut stats = CopyStats::default();
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).sort_by_file_name().min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| BinsError::processing(format!("path outside of copy root: {}", e)))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            replace_with_symlink(&link, &target)?;
            stats.files += 1;
        } else if exclude(entry.path()) {
            stats.excluded += 1;
            stats.excluded_bytes += entry.metadata()?.len();
            tracing::debug!("  Excluding: {}", relative.display());
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            stats.files += 1;
        }
    }

    Ok(stats)
}

/// Copy `src` to `dst`, removing whatever `dst` held before.
pub fn replace_tree(src: &Path, dst: &Path) -> Result<CopyStats> {
    remove_if_exists(dst)?;
    copy_tree(src, dst, |_| false)
}

pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Sum of regular file sizes below `path`.
pub fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

#[cfg(unix)]
pub fn replace_with_symlink(link_target: &Path, at: &Path) -> Result<()> {
    remove_if_exists(at)?;
    std::os::unix::fs::symlink(link_target, at)?;
    Ok(())
}

// Windows 需要管理員權限建立 symlink，改為複製實體檔案
#[cfg(not(unix))]
pub fn replace_with_symlink(link_target: &Path, at: &Path) -> Result<()> {
    remove_if_exists(at)?;
    let resolved = at.parent().map(|p| p.join(link_target)).unwrap_or_else(|| link_target.to_path_buf());
    fs::copy(resolved, at)?;
    Ok(())
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

pub const MIB: u64 = 1024 * 1024;

/// Largest megabyte count whose byte size still fits in a `u64`.
pub const MAX_SIZE_MB: u64 = u64::MAX / MIB;

pub fn mib(bytes: u64) -> f64 {
    bytes as f64 / MIB as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_tree_with_exclusions() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("lib/clang/19/include")).unwrap();
        fs::write(src.join("lib/clang/19/include/stddef.h"), b"header").unwrap();
        fs::write(src.join("lib/clang/19/libflang_rt.a"), b"fortran").unwrap();

        let dst = temp.path().join("dst");
        let stats = copy_tree(&src, &dst, |p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains("libflang_rt"))
        })
        .unwrap();

        assert_eq!(stats.files, 1);
        assert_eq!(stats.excluded, 1);
        assert_eq!(stats.excluded_bytes, 7);
        assert!(dst.join("lib/clang/19/include/stddef.h").exists());
        assert!(!dst.join("lib/clang/19/libflang_rt.a").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_preserves_symlinks() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("lld"), b"linker").unwrap();
        std::os::unix::fs::symlink("lld", src.join("ld64.lld")).unwrap();

        let dst = temp.path().join("dst");
        copy_tree(&src, &dst, |_| false).unwrap();

        let meta = fs::symlink_metadata(dst.join("ld64.lld")).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_link(dst.join("ld64.lld")).unwrap(), Path::new("lld"));
    }

    #[test]
    fn test_dir_size_and_remove() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("share");
        fs::create_dir_all(dir.join("man")).unwrap();
        fs::write(dir.join("man/node.1"), vec![0u8; 100]).unwrap();
        fs::write(dir.join("README"), vec![0u8; 28]).unwrap();

        assert_eq!(dir_size(&dir).unwrap(), 128);
        remove_if_exists(&dir).unwrap();
        assert!(!dir.exists());
        remove_if_exists(&dir).unwrap();
    }
}
