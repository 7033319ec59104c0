use crate::utils::error::{BinsError, Result};
use crate::utils::fs_tree::MAX_SIZE_MB;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(BinsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(BinsError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(BinsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

/// URL templates are checked after substituting dummy values for the
/// `{version}`-style placeholders.
pub fn validate_url_template(field_name: &str, template: &str) -> Result<()> {
    let sample = template
        .replace("{version}", "0.0.0")
        .replace("{platform}", "linux")
        .replace("{arch_alias}", "x64")
        .replace("{arch}", "x86_64");
    validate_url(field_name, &sample).map_err(|_| BinsError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: template.to_string(),
        reason: "Not a valid http(s) URL template".to_string(),
    })
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(BinsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(BinsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BinsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BinsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_zstd_level(field_name: &str, level: i32) -> Result<()> {
    validate_range(field_name, level, 1, 22)
}

/// A size in MB that is at least `min` and converts to bytes without overflow.
pub fn validate_size_mb(field_name: &str, value: u64, min: u64) -> Result<()> {
    validate_range(field_name, value, min, MAX_SIZE_MB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("repository.base_url", "https://example.com/assets").is_ok());
        assert!(validate_url("repository.base_url", "http://example.com").is_ok());
        assert!(validate_url("repository.base_url", "").is_err());
        assert!(validate_url("repository.base_url", "not a url").is_err());
        assert!(validate_url("repository.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_url_template() {
        assert!(validate_url_template(
            "tools.nodejs.urls",
            "https://nodejs.org/dist/v{version}/node-v{version}-{platform}-{arch_alias}.tar.xz"
        )
        .is_ok());
        assert!(validate_url_template("tools.nodejs.urls", "{version}.tar.xz").is_err());
    }

    #[test]
    fn test_validate_zstd_level() {
        assert!(validate_zstd_level("zstd_level", 22).is_ok());
        assert!(validate_zstd_level("zstd_level", 1).is_ok());
        assert!(validate_zstd_level("zstd_level", 0).is_err());
        assert!(validate_zstd_level("zstd_level", 23).is_err());
    }

    #[test]
    fn test_validate_size_mb() {
        assert!(validate_size_mb("max_size_mb", 99, 2).is_ok());
        assert!(validate_size_mb("max_size_mb", 1, 2).is_err());
        assert!(validate_size_mb("max_size_mb", MAX_SIZE_MB, 2).is_ok());
        assert!(matches!(
            validate_size_mb("max_size_mb", MAX_SIZE_MB + 1, 2),
            Err(BinsError::InvalidConfigValueError { .. })
        ));
        assert!(validate_size_mb("max_size_mb", u64::MAX / 2, 2).is_err());
    }

    #[test]
    fn test_validate_path_and_strings() {
        assert!(validate_path("work_dir", "work").is_ok());
        assert!(validate_path("work_dir", "").is_err());
        assert!(validate_path("work_dir", "a\0b").is_err());
        assert!(validate_non_empty_string("version", "  ").is_err());
    }
}
