//! Duplicate detection for toolchain `bin` directories.
//!
//! LLVM ships several executables that are byte-identical (`clang`,
//! `clang++`, `clang-cl`, `clang-cpp`; `lld` and its flavours). The manifest
//! produced here maps every file name to one canonical copy so the archive
//! can store the data once and hard-link the rest.

use crate::core::checksum;
use crate::domain::model::{DedupManifest, DedupStats};
use crate::utils::error::{BinsError, Result};
use crate::utils::fs_tree::mib;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "dedup_manifest.json";

/// Files grouped by content hash, plus each group's file size.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub hash_to_files: BTreeMap<String, Vec<String>>,
    pub hash_to_size: BTreeMap<String, u64>,
}

/// Hash every regular file directly inside `dir`.
pub fn analyze(dir: &Path) -> Result<Analysis> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    files.sort();

    tracing::info!("Hashing {} files in {}", files.len(), dir.display());
    let mut analysis = Analysis::default();

    for path in files {
        let hash = checksum::sha256_file(&path)?;
        let size = fs::metadata(&path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        analysis.hash_to_size.entry(hash.clone()).or_insert(size);
        analysis.hash_to_files.entry(hash).or_default().push(name);
    }

    Ok(analysis)
}

pub fn build_manifest(analysis: &Analysis) -> DedupManifest {
    let mut manifest = DedupManifest::default();

    for (hash, files) in &analysis.hash_to_files {
        let mut sorted = files.clone();
        sorted.sort();
        let canonical = sorted[0].clone();

        for file in &sorted {
            manifest.manifest.insert(file.clone(), canonical.clone());
        }
        manifest.canonical_files.insert(hash.clone(), canonical);
    }

    manifest.stats = calculate_savings(analysis);
    manifest
}

pub fn calculate_savings(analysis: &Analysis) -> DedupStats {
    let total_files: usize = analysis.hash_to_files.values().map(Vec::len).sum();
    let unique_files = analysis.hash_to_files.len();

    let total_size: u64 = analysis
        .hash_to_files
        .iter()
        .map(|(hash, files)| analysis.hash_to_size[hash] * files.len() as u64)
        .sum();
    let deduped_size: u64 = analysis.hash_to_size.values().sum();
    let savings = total_size - deduped_size;

    DedupStats {
        total_size,
        deduped_size,
        savings,
        savings_percent: if total_size > 0 {
            savings as f64 / total_size as f64 * 100.0
        } else {
            0.0
        },
        duplicate_count: total_files - unique_files,
    }
}

pub fn deduplicate(dir: &Path) -> Result<DedupManifest> {
    let analysis = analyze(dir)?;
    let manifest = build_manifest(&analysis);
    log_summary(&manifest);
    Ok(manifest)
}

pub fn log_summary(manifest: &DedupManifest) {
    let stats = &manifest.stats;
    tracing::info!(
        "Unique files: {}, duplicates: {}",
        manifest.canonical_files.len(),
        stats.duplicate_count
    );
    tracing::info!(
        "Total size: {:.2} MB, deduplicated: {:.2} MB, savings: {:.2} MB ({:.1}%)",
        mib(stats.total_size),
        mib(stats.deduped_size),
        mib(stats.savings),
        stats.savings_percent
    );
    for (canonical, files) in manifest.duplicate_groups() {
        tracing::debug!("  {} <- {}", canonical, files.join(", "));
    }
}

pub fn write_manifest(manifest: &DedupManifest, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<DedupManifest> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Copy only canonical files from `source` into `dest/bin` and write the
/// manifest to `dest`.
pub fn create_deduped_structure(source: &Path, dest: &Path) -> Result<DedupManifest> {
    let manifest = deduplicate(source)?;
    let dest_bin = dest.join("bin");
    fs::create_dir_all(&dest_bin)?;

    for canonical in manifest.canonical_files.values() {
        fs::copy(source.join(canonical), dest_bin.join(canonical))?;
    }
    write_manifest(&manifest, &dest.join(MANIFEST_FILE))?;

    tracing::info!(
        "Wrote {} canonical files to {}",
        manifest.canonical_files.len(),
        dest_bin.display()
    );
    Ok(manifest)
}

/// Inverse of [`create_deduped_structure`]: every manifest entry becomes an
/// independent file in `output/bin`.
pub fn expand_deduped_structure(deduped: &Path, output: &Path) -> Result<usize> {
    let manifest = read_manifest(&deduped.join(MANIFEST_FILE))?;
    let source_bin = deduped.join("bin");
    let output_bin = output.join("bin");
    fs::create_dir_all(&output_bin)?;

    for (file, canonical) in &manifest.manifest {
        let source = source_bin.join(canonical);
        if !source.exists() {
            return Err(BinsError::processing(format!(
                "canonical file {} for {} is missing",
                canonical, file
            )));
        }
        fs::copy(&source, output_bin.join(file))?;
    }

    Ok(manifest.manifest.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bin_dir_with_duplicates(root: &Path) -> PathBuf {
        let bin = root.join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("clang++"), vec![1u8; 100]).unwrap();
        fs::write(bin.join("clang"), vec![1u8; 100]).unwrap();
        fs::write(bin.join("clang-cpp"), vec![1u8; 100]).unwrap();
        fs::write(bin.join("lld"), vec![2u8; 40]).unwrap();
        fs::write(bin.join("ld.lld"), vec![2u8; 40]).unwrap();
        fs::write(bin.join("llvm-ar"), vec![3u8; 10]).unwrap();
        bin
    }

    #[test]
    fn test_canonical_is_alphabetically_first() {
        let temp = TempDir::new().unwrap();
        let bin = bin_dir_with_duplicates(temp.path());

        let manifest = deduplicate(&bin).unwrap();
        assert_eq!(manifest.canonical_for("clang++"), Some("clang"));
        assert_eq!(manifest.canonical_for("clang-cpp"), Some("clang"));
        assert_eq!(manifest.canonical_for("lld"), Some("ld.lld"));
        assert_eq!(manifest.canonical_for("llvm-ar"), Some("llvm-ar"));
        assert_eq!(manifest.canonical_files.len(), 3);
    }

    #[test]
    fn test_savings_arithmetic() {
        let temp = TempDir::new().unwrap();
        let bin = bin_dir_with_duplicates(temp.path());

        let stats = deduplicate(&bin).unwrap().stats;
        assert_eq!(stats.total_size, 300 + 80 + 10);
        assert_eq!(stats.deduped_size, 100 + 40 + 10);
        assert_eq!(stats.savings, 240);
        assert_eq!(stats.duplicate_count, 3);
        assert!((stats.savings_percent - 240.0 / 390.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_directory_has_zero_stats() {
        let temp = TempDir::new().unwrap();
        let stats = deduplicate(temp.path()).unwrap().stats;
        assert_eq!(stats, DedupStats::default());
    }

    #[test]
    fn test_subdirectories_are_ignored() {
        let temp = TempDir::new().unwrap();
        let bin = bin_dir_with_duplicates(temp.path());
        fs::create_dir_all(bin.join("nested")).unwrap();
        fs::write(bin.join("nested/clang"), vec![1u8; 100]).unwrap();

        let manifest = deduplicate(&bin).unwrap();
        assert_eq!(manifest.manifest.len(), 6);
    }

    #[test]
    fn test_deduped_structure_round_trip() {
        let temp = TempDir::new().unwrap();
        let bin = bin_dir_with_duplicates(temp.path());
        let deduped = temp.path().join("deduped");

        create_deduped_structure(&bin, &deduped).unwrap();
        let stored: Vec<_> = fs::read_dir(deduped.join("bin")).unwrap().collect();
        assert_eq!(stored.len(), 3);
        assert!(deduped.join(MANIFEST_FILE).exists());

        let expanded = temp.path().join("expanded");
        let count = expand_deduped_structure(&deduped, &expanded).unwrap();
        assert_eq!(count, 6);
        assert_eq!(
            fs::read(expanded.join("bin/clang-cpp")).unwrap(),
            fs::read(bin.join("clang-cpp")).unwrap()
        );
    }

    #[test]
    fn test_manifest_json_shape() {
        let temp = TempDir::new().unwrap();
        let bin = bin_dir_with_duplicates(temp.path());
        let manifest = deduplicate(&bin).unwrap();
        let path = temp.path().join(MANIFEST_FILE);
        write_manifest(&manifest, &path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["manifest"]["clang++"], "clang");
        assert_eq!(json["stats"]["duplicate_count"], 3);
        assert_eq!(read_manifest(&path).unwrap(), manifest);
    }
}
