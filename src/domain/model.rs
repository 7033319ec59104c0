use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::utils::error::BinsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Win,
    Linux,
    Darwin,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Win => "win",
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
        }
    }

    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Platform::Win => ".exe",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Arch {
    #[serde(rename = "x86_64")]
    #[cfg_attr(feature = "cli", value(name = "x86_64"))]
    X86_64,
    #[serde(rename = "arm64")]
    #[cfg_attr(feature = "cli", value(name = "arm64"))]
    Arm64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Spelling used by most upstream release file names.
    pub fn upstream_alias(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x64",
            Arch::Arm64 => "arm64",
        }
    }

    /// GNU triple prefix, e.g. the MinGW sysroot directory name.
    pub fn gnu_name(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "aarch64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    pub platform: Platform,
    pub arch: Arch,
}

impl Target {
    pub fn new(platform: Platform, arch: Arch) -> Self {
        Self { platform, arch }
    }

    /// Expand `{version}`, `{platform}`, `{arch}` and `{arch_alias}` in a template.
    pub fn render(&self, template: &str, version: &str) -> String {
        template
            .replace("{version}", version)
            .replace("{platform}", self.platform.as_str())
            .replace("{arch_alias}", self.arch.upstream_alias())
            .replace("{arch}", self.arch.as_str())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.platform.as_str(), self.arch.as_str())
    }
}

impl FromStr for Target {
    type Err = BinsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BinsError::InvalidConfigValueError {
            field: "target".to_string(),
            value: s.to_string(),
            reason: "expected <win|linux|darwin>-<x86_64|arm64>".to_string(),
        };
        let (platform, arch) = s.split_once('-').ok_or_else(invalid)?;
        let platform = match platform {
            "win" => Platform::Win,
            "linux" => Platform::Linux,
            "darwin" => Platform::Darwin,
            _ => return Err(invalid()),
        };
        let arch = match arch {
            "x86_64" => Arch::X86_64,
            "arm64" => Arch::Arm64,
            _ => return Err(invalid()),
        };
        Ok(Target { platform, arch })
    }
}

/// Savings from collapsing identical binaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupStats {
    pub total_size: u64,
    pub deduped_size: u64,
    pub savings: u64,
    pub savings_percent: f64,
    pub duplicate_count: usize,
}

/// Written next to the stripped tree as `dedup_manifest.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupManifest {
    /// file name -> canonical file name
    pub manifest: BTreeMap<String, String>,
    /// content hash -> canonical file name
    pub canonical_files: BTreeMap<String, String>,
    pub stats: DedupStats,
}

impl DedupManifest {
    pub fn canonical_for(&self, file: &str) -> Option<&str> {
        self.manifest.get(file).map(String::as_str)
    }

    pub fn duplicate_groups(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (file, canonical) in &self.manifest {
            groups.entry(canonical.as_str()).or_default().push(file.as_str());
        }
        groups.retain(|_, files| files.len() > 1);
        groups
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRef {
    pub href: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub href: String,
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<PartRef>>,
    /// Fields written by other tools (`version`, `platform`, ...), kept as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ReleaseEntry {
    pub fn new(href: impl Into<String>, sha256: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            sha256: sha256.into(),
            parts: None,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePart {
    pub path: PathBuf,
    pub sha256: String,
    pub size: u64,
}

impl ArchivePart {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What the package phase produced.
#[derive(Debug, Clone)]
pub struct PackageReport {
    pub archive_name: String,
    pub archive: PathBuf,
    pub sha256: String,
    pub size: u64,
    pub parts: Vec<ArchivePart>,
    pub manifest: Option<PathBuf>,
}

impl PackageReport {
    pub fn is_split(&self) -> bool {
        !self.parts.is_empty()
    }
}
