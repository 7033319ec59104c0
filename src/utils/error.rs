use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BinsError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV report error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Download of {url} failed with HTTP status {status}")]
    DownloadError { url: String, status: u16 },

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Unsupported target {target} for tool '{tool}'")]
    UnsupportedTarget { tool: String, target: String },

    #[error("Unsupported archive format: {file}")]
    UnsupportedFormat { file: String },

    #[error("Required external tool '{tool}' was not found on PATH")]
    ToolNotFound { tool: String, hint: String },

    #[error("External command '{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Tar archive has {} entries with incorrect permissions", issues.len())]
    PermissionCheck { issues: Vec<String> },

    #[error("No manifest entry references archive '{archive}' in {}", manifest.display())]
    ManifestEntryNotFound { manifest: PathBuf, archive: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, BinsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Integrity,
    Filesystem,
    Archive,
    Environment,
    Configuration,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BinsError {
    pub fn processing(message: impl Into<String>) -> Self {
        BinsError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BinsError::HttpError(_) | BinsError::DownloadError { .. } => ErrorCategory::Network,
            BinsError::ChecksumMismatch { .. } | BinsError::PermissionCheck { .. } => {
                ErrorCategory::Integrity
            }
            BinsError::IoError(_) | BinsError::WalkError(_) => ErrorCategory::Filesystem,
            BinsError::ZipError(_) | BinsError::UnsupportedFormat { .. } => ErrorCategory::Archive,
            BinsError::ToolNotFound { .. } | BinsError::CommandFailed { .. } => {
                ErrorCategory::Environment
            }
            BinsError::UnsupportedTarget { .. }
            | BinsError::MissingConfigError { .. }
            | BinsError::InvalidConfigValueError { .. }
            | BinsError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            BinsError::CsvError(_)
            | BinsError::SerializationError(_)
            | BinsError::ManifestEntryNotFound { .. }
            | BinsError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 網路錯誤通常重試即可
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Integrity => ErrorSeverity::Critical,
            ErrorCategory::Environment | ErrorCategory::Filesystem => ErrorSeverity::Critical,
            ErrorCategory::Archive
            | ErrorCategory::Configuration
            | ErrorCategory::Processing => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            BinsError::HttpError(_) | BinsError::DownloadError { .. } => {
                "Check network connectivity and that the release URL still exists, then re-run; partial downloads are cleaned up automatically".to_string()
            }
            BinsError::ChecksumMismatch { file, .. } => format!(
                "Delete {} and download it again; if the mismatch persists the upstream release may have been replaced",
                file
            ),
            BinsError::PermissionCheck { .. } => {
                "Inspect the staging directory for files with unexpected modes and re-run the archive step".to_string()
            }
            BinsError::ToolNotFound { hint, .. } => hint.clone(),
            BinsError::CommandFailed { command, .. } => {
                format!("Run '{}' manually to see the full output", command)
            }
            BinsError::UnsupportedTarget { tool, .. } => format!(
                "Add a URL for this target under [tools.{}.urls] in the recipe file",
                tool
            ),
            BinsError::UnsupportedFormat { .. } => {
                "Supported formats: .tar.xz, .tar.gz, .tar.zst, .tar, .zip, .exe/.7z (via 7z)".to_string()
            }
            BinsError::ManifestEntryNotFound { .. } => {
                "Add the version to manifest.json first (toolchain-bins manifest ...)".to_string()
            }
            BinsError::MissingConfigError { field } => {
                format!("Set '{}' in the recipe file or on the command line", field)
            }
            BinsError::InvalidConfigValueError { field, .. }
            | BinsError::ConfigValidationError { field, .. } => {
                format!("Fix the value of '{}' and try again", field)
            }
            BinsError::IoError(_) | BinsError::WalkError(_) => {
                "Check that the paths exist and that there is enough free disk space".to_string()
            }
            BinsError::ZipError(_) => "The zip file may be truncated; delete it and download again".to_string(),
            BinsError::CsvError(_) | BinsError::SerializationError(_) | BinsError::ProcessingError { .. } => {
                "Re-run with --verbose for details".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Download failed: {}", self),
            ErrorCategory::Integrity => format!("Integrity check failed: {}", self),
            ErrorCategory::Filesystem => format!("File system error: {}", self),
            ErrorCategory::Archive => format!("Archive error: {}", self),
            ErrorCategory::Environment => format!("Missing or failing tool: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Processing => format!("Packaging failed: {}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_retryable() {
        let err = BinsError::DownloadError {
            url: "https://example.com/a.tar.xz".to_string(),
            status: 503,
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_checksum_mismatch_is_critical() {
        let err = BinsError::ChecksumMismatch {
            file: "node.tar.xz".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.recovery_suggestion().contains("node.tar.xz"));
        assert!(err.user_friendly_message().starts_with("Integrity check failed"));
    }

    #[test]
    fn test_tool_not_found_uses_hint() {
        let err = BinsError::ToolNotFound {
            tool: "7z".to_string(),
            hint: "Install 7-Zip".to_string(),
        };
        assert_eq!(err.recovery_suggestion(), "Install 7-Zip");
    }
}
