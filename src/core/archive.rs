//! Tarball creation, permission normalisation and zstd compression.
//!
//! Archives are reproducible: entries are walked in sorted order and
//! headers carry a fixed mtime with uid/gid 0. Files sharing an inode are
//! written once and referenced by hard-link entries, which is what keeps
//! the deduplicated LLVM `bin` directory small inside the archive.

use crate::core::{checksum, extract, hardlink};
use crate::utils::error::{BinsError, Result};
use crate::utils::fs_tree::mib;
use crate::utils::progress::ProgressReporter;
use crate::utils::validation::validate_zstd_level;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tar::{EntryType, Header, HeaderMode};
use walkdir::WalkDir;

const CHUNK_SIZE: usize = 1024 * 1024;
const PLAIN_SUFFIXES: [&str; 7] = [".h", ".inc", ".modulemap", ".tcc", ".txt", ".a", ".syms"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TarStats {
    pub files: usize,
    pub hardlinks: usize,
    pub symlinks: usize,
    pub dirs: usize,
}

/// Mode a regular file at archive path `path` must carry, if any rule covers it.
pub fn expected_mode(path: &str) -> Option<u32> {
    let path = format!("/{}", path.replace('\\', "/").trim_start_matches('/'));

    if path.contains("/lib/") {
        if PLAIN_SUFFIXES.iter().any(|s| path.ends_with(s)) {
            Some(0o644)
        } else if path.ends_with(".so") || path.ends_with(".dylib") || path.contains(".so.") {
            Some(0o755)
        } else if path.contains("/bin/") {
            Some(0o755)
        } else {
            None
        }
    } else if path.contains("/bin/") {
        Some(0o755)
    } else if path.contains("/share/") {
        Some(0o644)
    } else {
        None
    }
}

pub fn normalized_mode(path: &str, current: u32) -> u32 {
    expected_mode(path).unwrap_or(current & 0o7777)
}

/// Write `source_dir` into an uncompressed tarball at `out_tar`. Entries
/// are rooted at the directory's own name.
pub fn create_tar(source_dir: &Path, out_tar: &Path) -> Result<TarStats> {
    let base = source_dir
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| BinsError::processing(format!("{} has no directory name", source_dir.display())))?;

    tracing::info!("📦 Creating tar archive {} from {}", out_tar.display(), source_dir.display());
    let mut builder = tar::Builder::new(BufWriter::new(File::create(out_tar)?));
    builder.follow_symlinks(false);

    let mut stats = TarStats::default();
    let mut seen = InodeTracker::default();

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| BinsError::processing(format!("path outside of archive root: {}", e)))?;
        let name = base.join(relative);
        let name_str = name.to_string_lossy().replace('\\', "/");
        let meta = entry.metadata()?;

        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(&meta, HeaderMode::Deterministic);

        if entry.file_type().is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            builder.append_data(&mut header, &name, io::empty())?;
            stats.dirs += 1;
        } else if entry.file_type().is_symlink() {
            let target = fs::read_link(entry.path())?;
            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            builder.append_link(&mut header, &name, &target)?;
            stats.symlinks += 1;
        } else if let Some(first) = seen.first_path(&meta, &name) {
            header.set_entry_type(EntryType::Link);
            header.set_size(0);
            header.set_mode(normalized_mode(&name_str, header.mode()?));
            builder.append_link(&mut header, &name, &first)?;
            tracing::debug!("  link {} -> {}", name_str, first.display());
            stats.hardlinks += 1;
        } else {
            header.set_mode(normalized_mode(&name_str, header.mode()?));
            builder.append_data(&mut header, &name, BufReader::new(File::open(entry.path())?))?;
            stats.files += 1;
        }
    }

    builder.into_inner()?.flush()?;
    tracing::info!(
        "Tar complete: {} files, {} hard links, {} symlinks, {} directories ({:.2} MB)",
        stats.files,
        stats.hardlinks,
        stats.symlinks,
        stats.dirs,
        mib(fs::metadata(out_tar)?.len())
    );
    Ok(stats)
}

/// Remembers the first archive path written for each inode.
#[derive(Default)]
struct InodeTracker {
    #[cfg(unix)]
    first: std::collections::HashMap<(u64, u64), PathBuf>,
}

impl InodeTracker {
    #[cfg(unix)]
    fn first_path(&mut self, meta: &fs::Metadata, name: &Path) -> Option<PathBuf> {
        use std::os::unix::fs::MetadataExt;

        if meta.nlink() < 2 {
            return None;
        }
        let key = (meta.dev(), meta.ino());
        if let Some(first) = self.first.get(&key) {
            return Some(first.clone());
        }
        self.first.insert(key, name.to_path_buf());
        None
    }

    #[cfg(not(unix))]
    fn first_path(&mut self, _meta: &fs::Metadata, _name: &Path) -> Option<PathBuf> {
        None
    }
}

/// Check every regular file entry of an uncompressed tarball against the
/// mode rules. Returns how many executables and shared libraries passed.
pub fn verify_permissions(tar_path: &Path) -> Result<usize> {
    let mut archive = tar::Archive::new(BufReader::new(File::open(tar_path)?));
    let mut issues = Vec::new();
    let mut checked = 0;

    for entry in archive.entries()? {
        let entry = entry?;
        let header = entry.header();
        if header.entry_type() != EntryType::Regular {
            continue;
        }
        let path = entry.path()?.to_string_lossy().into_owned();
        let mode = header.mode()? & 0o777;

        if let Some(expected) = expected_mode(&path) {
            if mode != expected {
                issues.push(format!("{}: {:o} (expected {:o})", path, mode, expected));
            } else if expected == 0o755 {
                checked += 1;
            }
        }
    }

    if !issues.is_empty() {
        for issue in &issues {
            tracing::error!("  ❌ {}", issue);
        }
        return Err(BinsError::PermissionCheck { issues });
    }

    tracing::info!("✅ Permissions verified ({} executables and libraries)", checked);
    Ok(checked)
}

/// Stream `input` through a multithreaded zstd encoder into `output`.
/// Returns the compressed size. A partial `output` is removed on failure.
pub fn compress_zstd(input: &Path, output: &Path, level: i32) -> Result<u64> {
    validate_zstd_level("zstd_level", level)?;
    let threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as u32;
    tracing::info!(
        "🗜️  Compressing {} with zstd level {} ({} threads)",
        input.display(),
        level,
        threads
    );

    match write_zstd(input, output, level, threads) {
        Ok(size) => Ok(size),
        Err(e) => {
            let _ = fs::remove_file(output);
            Err(e)
        }
    }
}

fn write_zstd(input: &Path, output: &Path, level: i32, threads: u32) -> Result<u64> {
    let original = fs::metadata(input)?.len();
    let mut reader = File::open(input)?;
    let mut encoder = zstd::stream::write::Encoder::new(BufWriter::new(File::create(output)?), level)?;
    encoder.include_checksum(true)?;
    if threads > 1 {
        encoder.multithread(threads)?;
    }

    let mut progress = ProgressReporter::new("Compressing", Some(original));
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        encoder.write_all(&buffer[..n])?;
        progress.advance(n as u64);
    }
    encoder.finish()?.flush()?;

    let compressed = fs::metadata(output)?.len();
    let ratio = if compressed > 0 { original as f64 / compressed as f64 } else { 0.0 };
    tracing::info!(
        "Compressed {:.2} MB -> {:.2} MB ({:.1}x) in {:.1}s",
        mib(original),
        mib(compressed),
        ratio,
        progress.elapsed().as_secs_f64()
    );
    Ok(compressed)
}

/// Unpack a `.tar.zst` (or plain `.tar`) and return the extracted root.
/// Hard links in `<root>/bin` become independent files unless
/// `keep_hardlinks` is set.
pub fn expand_archive(archive: &Path, out_dir: &Path, keep_hardlinks: bool) -> Result<PathBuf> {
    tracing::info!("📂 Expanding {} into {}", archive.display(), out_dir.display());
    fs::create_dir_all(out_dir)?;

    let reader = BufReader::new(File::open(archive)?);
    let name = archive.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".zst") {
        extract::unpack_tar(zstd::stream::read::Decoder::with_buffer(reader)?, out_dir)?;
    } else {
        extract::unpack_tar(reader, out_dir)?;
    }

    let root = extract::find_root(out_dir, None)?;
    let bin = root.join("bin");
    if !keep_hardlinks && bin.is_dir() {
        hardlink::break_hardlinks(&bin)?;
    }
    Ok(root)
}

/// Hash every file in `<root>/bin`; with `original`, each must also exist
/// there with identical content. Returns the number of files checked.
pub fn verify_extraction(root: &Path, original: Option<&Path>) -> Result<usize> {
    let bin = root.join("bin");
    let mut names: Vec<_> = fs::read_dir(&bin)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name())
        .collect();
    names.sort();

    let mut problems = Vec::new();
    for name in &names {
        let hash = checksum::sha256_file(&bin.join(name))?;
        let Some(original) = original else { continue };

        let reference = original.join(name);
        if !reference.exists() {
            problems.push(format!("{} missing from reference", name.to_string_lossy()));
        } else if checksum::sha256_file(&reference)? != hash {
            problems.push(format!("{} content differs", name.to_string_lossy()));
        }
    }

    if !problems.is_empty() {
        return Err(BinsError::processing(format!(
            "extraction verification failed: {}",
            problems.join("; ")
        )));
    }
    tracing::info!("✅ Verified {} files in {}", names.len(), bin.display());
    Ok(names.len())
}
