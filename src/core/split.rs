use crate::domain::model::ArchivePart;
use crate::utils::error::{BinsError, Result};
use crate::utils::fs_tree::{mib, set_mode, MIB};
use crate::utils::validation;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const COPY_BUFFER: usize = 4 * 1024 * 1024;

pub fn part_path(dir: &Path, archive_name: &str, index: usize) -> PathBuf {
    dir.join(format!("{}.part{}", archive_name, index))
}

/// Cut `archive` into `<name>.part1..N` of at most `part_size_mb` MiB each.
pub fn split_archive(archive: &Path, part_size_mb: u64, out_dir: &Path) -> Result<Vec<ArchivePart>> {
    if !archive.is_file() {
        return Err(BinsError::processing(format!(
            "archive not found: {}",
            archive.display()
        )));
    }
    validation::validate_size_mb("part_size", part_size_mb, 1)?;

    let name = file_name(archive);
    let total = fs::metadata(archive)?.len();
    let part_size = part_size_mb * MIB;
    fs::create_dir_all(out_dir)?;

    // 先清掉上次切出來的分片
    for (_, stale) in list_parts(out_dir, &name)? {
        tracing::debug!("Removing stale part {}", stale.display());
        fs::remove_file(&stale)?;
    }

    tracing::info!(
        "✂️  Splitting {} ({:.2} MB) into {} MB parts",
        name,
        mib(total),
        part_size_mb
    );

    let mut reader = File::open(archive)?;
    let mut parts = Vec::new();
    let mut buffer = vec![0u8; COPY_BUFFER];
    let mut remaining = total;

    while remaining > 0 {
        let path = part_path(out_dir, &name, parts.len() + 1);
        let mut writer = BufWriter::new(File::create(&path)?);
        let mut hasher = Sha256::new();
        let mut written = 0u64;
        let target = part_size.min(remaining);

        while written < target {
            let want = (target - written).min(buffer.len() as u64) as usize;
            let n = reader.read(&mut buffer[..want])?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n])?;
            hasher.update(&buffer[..n]);
            written += n as u64;
        }
        writer.flush()?;

        if written == 0 {
            fs::remove_file(&path)?;
            break;
        }
        remaining -= written;

        let part = ArchivePart {
            path,
            sha256: hex::encode(hasher.finalize()),
            size: written,
        };
        tracing::info!("  {} ({:.2} MB)", part.file_name(), mib(part.size));
        parts.push(part);
    }

    Ok(parts)
}

/// Write `<name>.join` (POSIX sh) and `<name>.join.py` next to the parts.
pub fn write_join_scripts(out_dir: &Path, archive_name: &str, part_count: usize) -> Result<(PathBuf, PathBuf)> {
    let part_names: Vec<String> = (1..=part_count)
        .map(|i| format!("{}.part{}", archive_name, i))
        .collect();

    let shell = out_dir.join(format!("{}.join", archive_name));
    let mut script = String::from("#!/bin/sh\nset -e\ncd \"$(dirname \"$0\")\"\n");
    script.push_str(&format!("cat {} > '{}'\n", quoted(&part_names), archive_name));
    script.push_str(&format!("echo \"Joined {} parts into {}\"\n", part_count, archive_name));
    fs::write(&shell, script)?;
    set_mode(&shell, 0o755)?;

    let python = out_dir.join(format!("{}.join.py", archive_name));
    let list = part_names
        .iter()
        .map(|p| format!("    \"{}\",", p))
        .collect::<Vec<_>>()
        .join("\n");
    let script = format!(
        "#!/usr/bin/env python3\n\
         import os\n\
         import shutil\n\
         \n\
         HERE = os.path.dirname(os.path.abspath(__file__))\n\
         PARTS = [\n{list}\n]\n\
         \n\
         with open(os.path.join(HERE, \"{name}\"), \"wb\") as out:\n\
         \x20   for part in PARTS:\n\
         \x20       with open(os.path.join(HERE, part), \"rb\") as src:\n\
         \x20           shutil.copyfileobj(src, out)\n\
         print(\"Joined {count} parts into {name}\")\n",
        list = list,
        name = archive_name,
        count = part_count,
    );
    fs::write(&python, script)?;

    Ok((shell, python))
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find `<name>.partN` files for `archive` (or for the archive a part
/// belongs to), ordered by part number.
pub fn discover_parts(archive_or_part: &Path) -> Result<(PathBuf, Vec<PathBuf>)> {
    let dir = archive_or_part
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let given = file_name(archive_or_part);
    let archive_name = match given.rsplit_once(".part") {
        Some((base, index)) if index.parse::<usize>().is_ok() => base.to_string(),
        _ => given,
    };

    let parts = list_parts(dir, &archive_name)?;
    if parts.is_empty() {
        return Err(BinsError::processing(format!(
            "no parts found for {} in {}",
            archive_name,
            dir.display()
        )));
    }
    Ok((dir.join(archive_name), parts.into_iter().map(|(_, p)| p).collect()))
}

fn list_parts(dir: &Path, archive_name: &str) -> Result<Vec<(usize, PathBuf)>> {
    let prefix = format!("{}.part", archive_name);
    let mut parts: Vec<(usize, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let index = name.strip_prefix(&prefix)?.parse::<usize>().ok()?;
            Some((index, e.path()))
        })
        .collect();
    parts.sort_by_key(|(index, _)| *index);
    Ok(parts)
}

/// Concatenate `parts` in numeric order into `output`, returning its SHA-256.
pub fn join_parts(parts: &[PathBuf], output: &Path) -> Result<String> {
    let mut ordered: Vec<&PathBuf> = parts.iter().collect();
    ordered.sort_by_key(|p| part_index(p));

    let mut writer = BufWriter::new(File::create(output)?);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; COPY_BUFFER];

    for part in ordered {
        tracing::debug!("  + {}", part.display());
        let mut reader = File::open(part)?;
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n])?;
            hasher.update(&buffer[..n]);
        }
    }
    writer.flush()?;

    let digest = hex::encode(hasher.finalize());
    tracing::info!("🧩 Joined {} parts into {} ({})", parts.len(), output.display(), digest);
    Ok(digest)
}

fn part_index(path: &Path) -> usize {
    file_name(path)
        .rsplit_once(".part")
        .and_then(|(_, index)| index.parse().ok())
        .unwrap_or(usize::MAX)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
