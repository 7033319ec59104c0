use crate::utils::error::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const HASH_BUFFER: usize = 4 * 1024 * 1024;

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Writes `<file>.sha256` as `<hex> *<name>` and returns the digest.
pub fn write_sidecar(path: &Path) -> Result<(String, PathBuf)> {
    let digest = sha256_file(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sidecar = sidecar_path(path);
    std::fs::write(&sidecar, format!("{} *{}\n", digest, name))?;
    tracing::debug!("Wrote {}", sidecar.display());
    Ok((digest, sidecar))
}

pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Parses `SHASUMS256.txt`-style listings: `<hex>  <name>` or `<hex> *<name>`.
pub fn parse_checksum_list(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let digest = fields.next()?;
            let name = fields.next()?.trim_start_matches('*');
            Some((name.to_string(), digest.to_ascii_lowercase()))
        })
        .collect()
}
