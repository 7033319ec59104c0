//! One handler per CLI subcommand.

use crate::app::pipelines::ToolchainPipeline;
use crate::config::cli::{
    BenchArgs, ChecksumArgs, DedupeArgs, ExpandArgs, FetchArgs, HardlinkArchiveArgs, JoinArgs,
    ManifestArgs, SplitArgs,
};
use crate::config::toml_config::ToolchainConfig;
use crate::core::engine::ArchiveEngine;
use crate::core::{archive, bench, blocking, checksum, dedup, hardlink, manifest, split};
use crate::domain::model::{PackageReport, ReleaseEntry};
use crate::utils::error::{BinsError, Result};
use crate::utils::fs_tree::{self, mib};
use crate::utils::validation::Validate;
use std::fs;
use std::path::{Path, PathBuf};

pub async fn fetch(args: FetchArgs, monitor: bool) -> Result<PackageReport> {
    let config = ToolchainConfig::load(args.config.as_deref())?;
    config.validate()?;

    let job = args.into_job(&config);
    job.validate()?;
    tracing::debug!("Fetch job: {:?}", job);

    let pipeline = ToolchainPipeline::new(job, config)?;
    let report = ArchiveEngine::new_with_monitoring(pipeline, monitor).run().await?;

    println!("✅ {} ({:.2} MB)", report.archive.display(), mib(report.size));
    println!("   sha256: {}", report.sha256);
    for part in &report.parts {
        println!("   part: {} ({:.2} MB)", part.path.display(), mib(part.size));
    }
    Ok(report)
}

pub async fn dedupe(args: DedupeArgs) -> Result<()> {
    blocking("dedupe", move || {
        if args.analyze {
            let manifest = dedup::deduplicate(&args.source)?;
            for (canonical, files) in manifest.duplicate_groups() {
                println!("{} <- {}", canonical, files.join(", "));
            }
            println!(
                "{} duplicates, {:.2} MB saved ({:.1}%)",
                manifest.stats.duplicate_count,
                mib(manifest.stats.savings),
                manifest.stats.savings_percent
            );
            return Ok(());
        }

        let dest = args.dest.ok_or_else(|| BinsError::MissingConfigError {
            field: "dest".to_string(),
        })?;
        if args.expand {
            let count = dedup::expand_deduped_structure(&args.source, &dest)?;
            println!("✅ Restored {} files into {}", count, dest.join("bin").display());
        } else {
            let manifest = dedup::create_deduped_structure(&args.source, &dest)?;
            println!(
                "✅ Stored {} unique files in {}",
                manifest.canonical_files.len(),
                dest.display()
            );
        }
        Ok(())
    })
    .await
}

pub async fn hardlink_archive(args: HardlinkArchiveArgs) -> Result<PathBuf> {
    blocking("hardlink-archive", move || {
        let manifest = dedup::read_manifest(&args.deduped_dir.join(dedup::MANIFEST_FILE))?;
        fs::create_dir_all(&args.output_dir)?;

        let staging = tempfile::TempDir::new_in(&args.output_dir)?;
        let root = staging.path().join(&args.name);
        hardlink::create_hardlink_structure(&manifest, &args.deduped_dir.join("bin"), &root.join("bin"))?;
        let (unique, total) = hardlink::verify_hardlinks(&root.join("bin"))?;
        tracing::info!("{} files share {} inodes", total, unique);

        let tar_path = staging.path().join(format!("{}.tar", args.name));
        archive::create_tar(&root, &tar_path)?;
        archive::verify_permissions(&tar_path)?;

        let output = args.output_dir.join(format!("{}.tar.zst", args.name));
        let size = archive::compress_zstd(&tar_path, &output, args.zstd_level)?;
        let (digest, _) = checksum::write_sidecar(&output)?;

        println!("✅ {} ({:.2} MB)", output.display(), mib(size));
        println!("   sha256: {}", digest);
        Ok(output)
    })
    .await
}

pub async fn expand(args: ExpandArgs) -> Result<PathBuf> {
    blocking("expand", move || {
        let root = archive::expand_archive(&args.archive, &args.output_dir, args.keep_hardlinks)?;
        let reference = args.verify.as_deref().map(reference_bin);
        let checked = archive::verify_extraction(&root, reference.as_deref())?;
        println!("✅ Expanded to {} ({} binaries checked)", root.display(), checked);
        Ok(root)
    })
    .await
}

/// Accept either a toolchain root or its `bin` directory as reference.
fn reference_bin(path: &Path) -> PathBuf {
    let bin = path.join("bin");
    if bin.is_dir() {
        bin
    } else {
        path.to_path_buf()
    }
}

pub async fn split(args: SplitArgs) -> Result<()> {
    blocking("split", move || {
        let out_dir = match &args.output_dir {
            Some(dir) => dir.clone(),
            None => args
                .archive
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        let parts = split::split_archive(&args.archive, args.part_size, &out_dir)?;
        if parts.is_empty() {
            println!("Nothing to split: {} is empty", args.archive.display());
            return Ok(());
        }

        let name = args
            .archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        split::write_join_scripts(&out_dir, &name, parts.len())?;

        if let (Some(manifest_path), Some(base_url)) = (&args.manifest, &args.base_url) {
            let full = checksum::sha256_file(&args.archive)?;
            manifest::attach_parts_to_file(manifest_path, &name, &full, &parts, base_url)?;
        }

        for part in &parts {
            println!("{}  {} ({:.2} MB)", part.sha256, part.path.display(), mib(part.size));
        }
        Ok(())
    })
    .await
}

pub async fn join(args: JoinArgs) -> Result<PathBuf> {
    blocking("join", move || {
        let (archive, parts) = split::discover_parts(&args.archive)?;
        let output = args.output.unwrap_or_else(|| archive.clone());
        let digest = split::join_parts(&parts, &output)?;

        let sidecar = checksum::sidecar_path(&archive);
        if sidecar.exists() {
            let listed = checksum::parse_checksum_list(&fs::read_to_string(&sidecar)?);
            if let Some(expected) = listed.values().next() {
                if *expected != digest {
                    fs_tree::remove_if_exists(&output)?;
                    return Err(BinsError::ChecksumMismatch {
                        file: output.display().to_string(),
                        expected: expected.clone(),
                        actual: digest,
                    });
                }
                tracing::info!("✅ Checksum matches {}", sidecar.display());
            }
        }

        println!("✅ {} ({})", output.display(), digest);
        Ok(output)
    })
    .await
}

pub async fn checksum(args: ChecksumArgs) -> Result<()> {
    blocking("checksum", move || {
        for file in &args.files {
            let (digest, sidecar) = checksum::write_sidecar(file)?;
            println!("{}  {} -> {}", digest, file.display(), sidecar.display());
        }
        Ok(())
    })
    .await
}

pub fn update_manifest(args: ManifestArgs) -> Result<()> {
    manifest::update_manifest_file(
        &args.manifest,
        &args.version,
        ReleaseEntry::new(args.href, args.sha256.to_ascii_lowercase()),
        !args.no_latest,
    )?;
    println!("✅ {} updated with {}", args.manifest.display(), args.version);
    Ok(())
}

pub async fn bench(args: BenchArgs) -> Result<bench::BenchReport> {
    blocking("bench", move || {
        let options = bench::BenchOptions {
            gzip_levels: args.gzip_levels,
            xz_levels: args.xz_levels,
            zstd_levels: args.zstd_levels,
        };
        let report = bench::run(&args.source_dir, &args.output_dir, &options)?;
        println!("📊 Report: {}", report.csv_path.display());
        Ok(report)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dedupe_then_hardlink_archive_then_expand() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("win/bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("clang.exe"), b"driver").unwrap();
        fs::write(bin.join("clang++.exe"), b"driver").unwrap();
        fs::write(bin.join("lld.exe"), b"linker").unwrap();

        let deduped = temp.path().join("deduped");
        dedupe(DedupeArgs {
            source: bin.clone(),
            dest: Some(deduped.clone()),
            analyze: false,
            expand: false,
        })
        .await
        .unwrap();

        let archive = hardlink_archive(HardlinkArchiveArgs {
            deduped_dir: deduped,
            output_dir: temp.path().join("out"),
            name: "win_binaries".to_string(),
            zstd_level: 3,
        })
        .await
        .unwrap();
        assert!(checksum::sidecar_path(&archive).exists());

        let root = expand(ExpandArgs {
            archive,
            output_dir: temp.path().join("expanded"),
            verify: Some(temp.path().join("win")),
            keep_hardlinks: false,
        })
        .await
        .unwrap();
        assert!(root.ends_with("win_binaries"));
        assert_eq!(fs::read(root.join("bin/clang++.exe")).unwrap(), b"driver");
    }

    #[tokio::test]
    async fn test_dedupe_requires_dest() {
        let temp = TempDir::new().unwrap();
        let err = dedupe(DedupeArgs {
            source: temp.path().to_path_buf(),
            dest: None,
            analyze: false,
            expand: false,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, BinsError::MissingConfigError { .. }));
    }

    #[tokio::test]
    async fn test_split_join_with_manifest() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("nodejs-22.11.0-win-x86_64.tar.zst");
        let data: Vec<u8> = (0..(3 * 1024 * 1024 + 7)).map(|i| (i * 7 % 256) as u8).collect();
        fs::write(&archive, &data).unwrap();
        checksum::write_sidecar(&archive).unwrap();

        let manifest_path = temp.path().join("manifest.json");
        update_manifest(ManifestArgs {
            manifest: manifest_path.clone(),
            version: "22.11.0".to_string(),
            href: "https://x/nodejs-22.11.0-win-x86_64.tar.zst".to_string(),
            sha256: "AA".to_string(),
            no_latest: false,
        })
        .unwrap();

        let parts_dir = temp.path().join("parts");
        split(SplitArgs {
            archive: archive.clone(),
            part_size: 1,
            output_dir: Some(parts_dir.clone()),
            manifest: Some(manifest_path.clone()),
            base_url: Some("https://x".to_string()),
        })
        .await
        .unwrap();

        let saved = manifest::ReleaseManifest::load(&manifest_path).unwrap();
        let entry = saved.get("22.11.0").unwrap();
        assert_eq!(entry.parts.as_ref().unwrap().len(), 4);
        assert_eq!(entry.sha256, checksum::sha256_file(&archive).unwrap());

        // 與原始檔案放在同一目錄以便比對 sidecar
        for part in fs::read_dir(&parts_dir).unwrap() {
            let part = part.unwrap();
            fs::rename(part.path(), temp.path().join(part.file_name())).unwrap();
        }
        fs::remove_file(&archive).unwrap();

        let joined = join(JoinArgs {
            archive: temp.path().join("nodejs-22.11.0-win-x86_64.tar.zst.part2"),
            output: None,
        })
        .await
        .unwrap();
        assert_eq!(fs::read(&joined).unwrap(), data);
    }

    #[tokio::test]
    async fn test_join_rejects_parts_that_do_not_match_sidecar() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("llvm-19.1.7-win-x86_64.tar.zst");
        let data: Vec<u8> = (0..(2 * 1024 * 1024 + 5)).map(|i| (i % 253) as u8).collect();
        fs::write(&archive, &data).unwrap();
        let (expected, _) = checksum::write_sidecar(&archive).unwrap();

        let parts = split::split_archive(&archive, 1, temp.path()).unwrap();
        fs::remove_file(&archive).unwrap();
        fs::write(&parts[1].path, b"corrupted").unwrap();

        let err = join(JoinArgs {
            archive: parts[0].path.clone(),
            output: None,
        })
        .await
        .unwrap_err();

        match err {
            BinsError::ChecksumMismatch { expected: listed, actual, .. } => {
                assert_eq!(listed, expected);
                assert_ne!(actual, expected);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!archive.exists());
    }
}
