use crate::domain::model::{ArchivePart, PartRef, ReleaseEntry};
use crate::utils::error::{BinsError, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

/// `manifest.json` published next to each tool's archives.
///
/// Versions normally live at the top level beside `latest`; manifests
/// written by older tooling nest them under `versions`, and that layout is
/// kept when such a file is updated. Keys that are not release entries
/// (tool metadata, notes) are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawManifest")]
pub struct ReleaseManifest {
    pub latest: Option<String>,
    pub versions: Option<BTreeMap<String, ReleaseEntry>>,
    pub releases: BTreeMap<String, ReleaseEntry>,
    /// Top-level keys whose values are not release entries.
    pub extra: BTreeMap<String, Value>,
    /// Same, inside the nested `versions` table.
    pub versions_extra: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    latest: Option<String>,
    #[serde(default)]
    versions: Option<BTreeMap<String, Value>>,
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

/// Split a JSON table into release entries and everything else.
fn partition(table: BTreeMap<String, Value>) -> (BTreeMap<String, ReleaseEntry>, BTreeMap<String, Value>) {
    let mut entries = BTreeMap::new();
    let mut others = BTreeMap::new();
    for (key, value) in table {
        if !value.is_object() {
            others.insert(key, value);
            continue;
        }
        match serde_json::from_value::<ReleaseEntry>(value.clone()) {
            Ok(entry) => {
                entries.insert(key, entry);
            }
            Err(_) => {
                others.insert(key, value);
            }
        }
    }
    (entries, others)
}

impl From<RawManifest> for ReleaseManifest {
    fn from(raw: RawManifest) -> Self {
        let (releases, extra) = partition(raw.rest);
        let (versions, versions_extra) = match raw.versions {
            Some(table) => {
                let (entries, others) = partition(table);
                (Some(entries), others)
            }
            None => (None, BTreeMap::new()),
        };
        Self {
            latest: raw.latest,
            versions,
            releases,
            extra,
            versions_extra,
        }
    }
}

fn write_table<M: SerializeMap>(
    map: &mut M,
    entries: &BTreeMap<String, ReleaseEntry>,
    others: &BTreeMap<String, Value>,
) -> std::result::Result<(), M::Error> {
    for (key, value) in others {
        map.serialize_entry(key, value)?;
    }
    for (version, entry) in entries {
        map.serialize_entry(version, entry)?;
    }
    Ok(())
}

struct NestedVersions<'a> {
    entries: &'a BTreeMap<String, ReleaseEntry>,
    others: &'a BTreeMap<String, Value>,
}

impl Serialize for NestedVersions<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len() + self.others.len()))?;
        write_table(&mut map, self.entries, self.others)?;
        map.end()
    }
}

impl Serialize for ReleaseManifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(latest) = &self.latest {
            map.serialize_entry("latest", latest)?;
        }
        if let Some(versions) = &self.versions {
            map.serialize_entry(
                "versions",
                &NestedVersions {
                    entries: versions,
                    others: &self.versions_extra,
                },
            )?;
        }
        write_table(&mut map, &self.releases, &self.extra)?;
        map.end()
    }
}

impl ReleaseManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        fs::write(path, json)?;
        Ok(())
    }

    pub fn get(&self, version: &str) -> Option<&ReleaseEntry> {
        self.releases
            .get(version)
            .or_else(|| self.versions.as_ref().and_then(|v| v.get(version)))
    }

    /// Insert or replace `version`, optionally making it `latest`.
    /// Extra fields of a replaced entry survive unless `entry` sets them.
    pub fn upsert(&mut self, version: &str, mut entry: ReleaseEntry, mark_latest: bool) {
        let table = match self.versions.as_mut() {
            Some(nested) if !self.releases.contains_key(version) => nested,
            _ => &mut self.releases,
        };
        if let Some(previous) = table.remove(version) {
            for (key, value) in previous.extra {
                entry.extra.entry(key).or_insert(value);
            }
        }
        table.insert(version.to_string(), entry);
        if mark_latest {
            self.latest = Some(version.to_string());
        }
    }

    /// Record `parts` on the version whose href names `archive_name`.
    /// Returns the version that was updated.
    pub fn attach_parts(
        &mut self,
        archive_name: &str,
        full_sha256: &str,
        parts: &[ArchivePart],
        base_url: &str,
    ) -> Result<String> {
        let refs: Vec<PartRef> = parts
            .iter()
            .map(|p| PartRef {
                href: format!("{}/{}", base_url.trim_end_matches('/'), p.file_name()),
                sha256: p.sha256.clone(),
            })
            .collect();

        let top_level = self.releases.iter_mut();
        let nested = self.versions.iter_mut().flat_map(|v| v.iter_mut());
        for (version, entry) in top_level.chain(nested) {
            if entry.href.contains(archive_name) {
                entry.sha256 = full_sha256.to_string();
                entry.parts = Some(refs);
                return Ok(version.clone());
            }
        }

        Err(BinsError::ManifestEntryNotFound {
            manifest: PathBuf::from(MANIFEST_FILE),
            archive: archive_name.to_string(),
        })
    }
}

/// Load, update and save `path` in one go.
pub fn update_manifest_file(path: &Path, version: &str, entry: ReleaseEntry, mark_latest: bool) -> Result<()> {
    let mut manifest = ReleaseManifest::load_or_default(path)?;
    manifest.upsert(version, entry, mark_latest);
    manifest.save(path)?;
    tracing::info!("📝 Updated {} ({})", path.display(), version);
    Ok(())
}

pub fn attach_parts_to_file(
    path: &Path,
    archive_name: &str,
    full_sha256: &str,
    parts: &[ArchivePart],
    base_url: &str,
) -> Result<String> {
    let mut manifest = ReleaseManifest::load(path)?;
    let version = manifest
        .attach_parts(archive_name, full_sha256, parts, base_url)
        .map_err(|e| match e {
            BinsError::ManifestEntryNotFound { archive, .. } => BinsError::ManifestEntryNotFound {
                manifest: path.to_path_buf(),
                archive,
            },
            other => other,
        })?;
    manifest.save(path)?;
    tracing::info!("📝 Attached {} parts to {} in {}", parts.len(), version, path.display());
    Ok(version)
}
