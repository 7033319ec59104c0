use crate::core::archive;
use crate::utils::error::{BinsError, Result};
use crate::utils::fs_tree::mib;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Gzip,
    Xz,
    Zstd,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Gzip => "gzip",
            Method::Xz => "xz",
            Method::Zstd => "zstd",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Method::Gzip => "gz",
            Method::Xz => "xz",
            Method::Zstd => "zst",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub gzip_levels: Vec<u32>,
    pub xz_levels: Vec<u32>,
    pub zstd_levels: Vec<i32>,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            gzip_levels: vec![6, 9],
            xz_levels: vec![6, 9],
            zstd_levels: vec![1, 3, 9, 19, 22],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub method: String,
    pub level: i32,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub ratio: f64,
    pub seconds: f64,
}

#[derive(Debug, Clone)]
pub struct BenchReport {
    pub tar_size: u64,
    pub results: Vec<BenchResult>,
    pub csv_path: PathBuf,
}

/// Tar `source_dir` once, then compress the tarball with every requested
/// method and level. Results are sorted smallest first.
pub fn run(source_dir: &Path, output_dir: &Path, options: &BenchOptions) -> Result<BenchReport> {
    fs::create_dir_all(output_dir)?;
    let tar_path = output_dir.join("bench.tar");
    archive::create_tar(source_dir, &tar_path)?;
    let tar_size = fs::metadata(&tar_path)?.len();
    tracing::info!("📊 Benchmarking compression of {:.2} MB tarball", mib(tar_size));

    let mut results = Vec::new();
    let runs = options
        .gzip_levels
        .iter()
        .map(|l| (Method::Gzip, *l as i32))
        .chain(options.xz_levels.iter().map(|l| (Method::Xz, *l as i32)))
        .chain(options.zstd_levels.iter().map(|l| (Method::Zstd, *l)));

    for (method, level) in runs {
        let out = output_dir.join(format!("bench.{}{}.tar.{}", method.as_str(), level, method.extension()));
        let start = Instant::now();
        let size = compress(method, level, &tar_path, &out)?;
        let seconds = start.elapsed().as_secs_f64();
        let _ = fs::remove_file(&out);

        tracing::info!("  {:5} level {:2}: {:8.2} MB in {:6.1}s", method.as_str(), level, mib(size), seconds);
        results.push(BenchResult {
            method: method.as_str().to_string(),
            level,
            size_bytes: size,
            size_mb: mib(size),
            ratio: if size > 0 { tar_size as f64 / size as f64 } else { 0.0 },
            seconds,
        });
    }
    fs::remove_file(&tar_path)?;

    results.sort_by_key(|r| r.size_bytes);
    log_table(&results);

    let csv_path = output_dir.join(format!(
        "compression_report_{}.csv",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    write_csv(&results, &csv_path)?;
    tracing::info!("Report written to {}", csv_path.display());

    Ok(BenchReport {
        tar_size,
        results,
        csv_path,
    })
}

fn compress(method: Method, level: i32, input: &Path, output: &Path) -> Result<u64> {
    match method {
        Method::Zstd => archive::compress_zstd(input, output, level),
        Method::Gzip => {
            let level = u32::try_from(level).ok().filter(|l| *l <= 9).ok_or_else(|| {
                invalid_level("gzip_levels", level, "gzip levels are 0-9")
            })?;
            let mut encoder = flate2::write::GzEncoder::new(
                BufWriter::new(File::create(output)?),
                flate2::Compression::new(level),
            );
            io::copy(&mut BufReader::new(File::open(input)?), &mut encoder)?;
            encoder.finish()?.flush()?;
            Ok(fs::metadata(output)?.len())
        }
        Method::Xz => {
            let level = u32::try_from(level).ok().filter(|l| *l <= 9).ok_or_else(|| {
                invalid_level("xz_levels", level, "xz presets are 0-9")
            })?;
            let mut encoder = xz2::write::XzEncoder::new(BufWriter::new(File::create(output)?), level);
            io::copy(&mut BufReader::new(File::open(input)?), &mut encoder)?;
            encoder.finish()?.flush()?;
            Ok(fs::metadata(output)?.len())
        }
    }
}

fn invalid_level(field: &str, level: i32, reason: &str) -> BinsError {
    BinsError::InvalidConfigValueError {
        field: field.to_string(),
        value: level.to_string(),
        reason: reason.to_string(),
    }
}

fn log_table(results: &[BenchResult]) {
    tracing::info!("{:<6} {:>5} {:>12} {:>8} {:>9}", "method", "level", "size (MB)", "ratio", "time (s)");
    for r in results {
        tracing::info!(
            "{:<6} {:>5} {:>12.2} {:>7.2}x {:>9.1}",
            r.method,
            r.level,
            r.size_mb,
            r.ratio,
            r.seconds
        );
    }
}

pub fn write_csv(results: &[BenchResult], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;
    Ok(())
}
