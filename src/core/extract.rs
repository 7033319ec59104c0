use crate::core::blocking;
use crate::utils::error::{BinsError, Result};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarXz,
    TarGz,
    TarZst,
    Tar,
    Zip,
    /// Windows installers and 7z archives, handled by the external `7z`.
    SevenZip,
}

impl ArchiveFormat {
    pub fn detect(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let format = if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            ArchiveFormat::TarXz
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            ArchiveFormat::TarGz
        } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            ArchiveFormat::TarZst
        } else if name.ends_with(".tar") {
            ArchiveFormat::Tar
        } else if name.ends_with(".zip") {
            ArchiveFormat::Zip
        } else if name.ends_with(".exe") || name.ends_with(".7z") {
            ArchiveFormat::SevenZip
        } else {
            return Err(BinsError::UnsupportedFormat { file: name });
        };
        Ok(format)
    }
}

/// Unpack `archive` into `extract_dir` and return `extract_dir`.
pub async fn extract_archive(archive: &Path, extract_dir: &Path) -> Result<PathBuf> {
    let format = ArchiveFormat::detect(archive)?;
    tracing::info!("📦 Extracting {} ({:?})", archive.display(), format);
    tokio::fs::create_dir_all(extract_dir).await?;
    let start = Instant::now();

    match format {
        ArchiveFormat::SevenZip => extract_with_7z(archive, extract_dir).await?,
        _ => {
            let archive = archive.to_path_buf();
            let dest = extract_dir.to_path_buf();
            blocking("extract", move || extract_native(format, &archive, &dest)).await?;
        }
    }

    tracing::info!("Extraction complete in {:.1}s", start.elapsed().as_secs_f64());
    Ok(extract_dir.to_path_buf())
}

pub fn extract_native(format: ArchiveFormat, archive: &Path, dest: &Path) -> Result<()> {
    let file = BufReader::new(File::open(archive)?);
    match format {
        ArchiveFormat::TarXz => unpack_tar(xz2::read::XzDecoder::new(file), dest),
        ArchiveFormat::TarGz => unpack_tar(flate2::read::GzDecoder::new(file), dest),
        ArchiveFormat::TarZst => unpack_tar(zstd::stream::read::Decoder::with_buffer(file)?, dest),
        ArchiveFormat::Tar => unpack_tar(file, dest),
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(file)?;
            tracing::debug!("Zip contains {} entries", zip.len());
            zip.extract(dest)?;
            Ok(())
        }
        ArchiveFormat::SevenZip => Err(BinsError::processing(
            "7z archives must go through the external extractor",
        )),
    }
}

pub fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(dest)?;
    Ok(())
}

async fn extract_with_7z(archive: &Path, dest: &Path) -> Result<()> {
    let seven_zip = ["7z", "7za", "7zz"]
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| BinsError::ToolNotFound {
            tool: "7z".to_string(),
            hint: "Install 7-Zip (https://www.7-zip.org/) or pass --source-dir with pre-extracted binaries".to_string(),
        })?;

    tracing::info!("Using {} to extract installer", seven_zip.display());
    let output = tokio::process::Command::new(&seven_zip)
        .arg("x")
        .arg(archive)
        .arg(format!("-o{}", dest.display()))
        .arg("-y")
        .output()
        .await?;

    if !output.status.success() {
        return Err(BinsError::CommandFailed {
            command: format!("{} x {}", seven_zip.display(), archive.display()),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Locate the distribution root inside an extraction directory: the single
/// top-level directory, or the first one whose name starts with `prefix`.
/// Falls back to `extract_dir` itself when neither applies.
pub fn find_root(extract_dir: &Path, prefix: Option<&str>) -> Result<PathBuf> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(extract_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    dirs.sort();

    if let Some(prefix) = prefix {
        return dirs
            .into_iter()
            .find(|d| {
                d.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
            })
            .ok_or_else(|| {
                BinsError::processing(format!(
                    "Could not find a '{}*' directory in {}",
                    prefix,
                    extract_dir.display()
                ))
            });
    }

    if dirs.len() == 1 {
        return Ok(dirs.remove(0));
    }
    Ok(extract_dir.to_path_buf())
}
