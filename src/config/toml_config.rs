use crate::domain::model::{Arch, Platform, Target};
use crate::utils::error::{BinsError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const BUILTIN_RECIPES: &str = include_str!("../../recipes.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolRecipe>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Public URL that `assets_dir` is served from.
    pub base_url: String,
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecipe {
    pub version: String,
    pub archive_prefix: Option<String>,
    /// Name prefix of the top-level directory inside the upstream archive.
    pub root_prefix: Option<String>,
    pub checksums_url: Option<String>,
    #[serde(default)]
    pub strip_symbols: bool,
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
    pub strip: StripRules,
    #[serde(default)]
    pub supplements: Vec<Supplement>,
    pub mingw: Option<MingwRecipe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StripRules {
    /// Keep only the listed executables plus `lib/clang`.
    Allowlist {
        keep_binaries: Vec<String>,
        #[serde(default)]
        exclude_lib_patterns: Vec<String>,
    },
    /// Keep everything except the listed paths.
    Prune {
        #[serde(default)]
        remove_dirs: Vec<String>,
        #[serde(default)]
        remove_files: Vec<String>,
        #[serde(default)]
        remove_executables: Vec<String>,
        #[serde(default)]
        remove_modules: Vec<String>,
    },
    /// Ship the tree unchanged (pre-built per-platform directories).
    Keep,
    /// Keep only the Windows GNU sysroot of an LLVM-MinGW release.
    Sysroot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplement {
    pub platform: Platform,
    pub url: String,
    pub candidates: Vec<String>,
    pub install_as: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MingwRecipe {
    pub version: String,
    /// arch -> URL template
    pub urls: BTreeMap<String, String>,
}

impl MingwRecipe {
    pub fn url_for(&self, arch: Arch) -> Result<String> {
        self.urls
            .get(arch.as_str())
            .map(|t| t.replace("{version}", &self.version))
            .ok_or_else(|| BinsError::UnsupportedTarget {
                tool: "llvm-mingw".to_string(),
                target: arch.as_str().to_string(),
            })
    }
}

impl ToolRecipe {
    pub fn url_for(&self, tool: &str, target: Target, version: &str) -> Result<String> {
        if let Some(template) = self.urls.get(&target.to_string()) {
            return Ok(target.render(template, version));
        }
        let available: Vec<String> = self.supported_targets().iter().map(Target::to_string).collect();
        if available.is_empty() {
            tracing::warn!("⚠️  {} has no download URLs; pass --source-dir", tool);
        } else {
            tracing::warn!("⚠️  {} has no release for {} (available: {})", tool, target, available.join(", "));
        }
        Err(BinsError::UnsupportedTarget {
            tool: tool.to_string(),
            target: target.to_string(),
        })
    }

    pub fn checksums_url_for(&self, target: Target, version: &str) -> Option<String> {
        self.checksums_url
            .as_deref()
            .map(|template| target.render(template, version))
    }

    /// `{prefix}-{version}-{platform}-{arch}`, without extension.
    pub fn archive_name(&self, tool: &str, target: Target, version: &str) -> String {
        let prefix = self.archive_prefix.as_deref().unwrap_or(tool);
        format!("{}-{}-{}", prefix, version, target)
    }

    pub fn supplements_for(&self, platform: Platform) -> impl Iterator<Item = &Supplement> {
        self.supplements.iter().filter(move |s| s.platform == platform)
    }

    pub fn supported_targets(&self) -> Vec<Target> {
        self.urls.keys().filter_map(|k| k.parse().ok()).collect()
    }
}

impl ToolchainConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| BinsError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Recipes shipped inside the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_RECIPES)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    /// 替換環境變數 (例如 ${GITHUB_REPOSITORY})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn recipe(&self, tool: &str) -> Result<&ToolRecipe> {
        self.tools.get(tool).ok_or_else(|| BinsError::InvalidConfigValueError {
            field: "tool".to_string(),
            value: tool.to_string(),
            reason: format!(
                "Unknown tool. Known tools: {}",
                self.tools.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        })
    }

    /// `assets/<tool>/<platform>/<arch>`
    pub fn default_output_dir(&self, tool: &str, target: Target) -> PathBuf {
        Path::new(&self.repository.assets_dir)
            .join(tool)
            .join(target.platform.as_str())
            .join(target.arch.as_str())
    }

    /// Public URL a file under `assets/<tool>/<platform>/<arch>` is served from.
    pub fn href_for(&self, tool: &str, target: Target, file_name: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.repository.base_url.trim_end_matches('/'),
            tool,
            target.platform.as_str(),
            target.arch.as_str(),
            file_name
        )
    }
}

impl Validate for ToolchainConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("repository.base_url", &self.repository.base_url)?;
        validation::validate_path("repository.assets_dir", &self.repository.assets_dir)?;

        for (name, recipe) in &self.tools {
            validation::validate_non_empty_string(&format!("tools.{}.version", name), &recipe.version)?;

            for (target, template) in &recipe.urls {
                let field = format!("tools.{}.urls.{}", name, target);
                target.parse::<Target>().map_err(|_| BinsError::InvalidConfigValueError {
                    field: field.clone(),
                    value: target.clone(),
                    reason: "Keys must look like linux-x86_64".to_string(),
                })?;
                validation::validate_url_template(&field, template)?;
            }

            if let Some(url) = &recipe.checksums_url {
                validation::validate_url_template(&format!("tools.{}.checksums_url", name), url)?;
            }

            if let StripRules::Allowlist { keep_binaries, .. } = &recipe.strip {
                if keep_binaries.is_empty() {
                    return Err(BinsError::ConfigValidationError {
                        field: format!("tools.{}.strip.keep_binaries", name),
                        message: "An allowlist must name at least one binary".to_string(),
                    });
                }
            }

            if recipe.strip == StripRules::Sysroot {
                let targets = recipe.supported_targets();
                if let Some(target) = targets.iter().find(|t| t.platform != Platform::Win) {
                    return Err(BinsError::ConfigValidationError {
                        field: format!("tools.{}.urls.{}", name, target),
                        message: "A sysroot recipe only packages Windows targets".to_string(),
                    });
                }
            }

            for supplement in &recipe.supplements {
                validation::validate_url(&format!("tools.{}.supplements.url", name), &supplement.url)?;
            }

            if let Some(mingw) = &recipe.mingw {
                for (arch, template) in &mingw.urls {
                    validation::validate_url_template(
                        &format!("tools.{}.mingw.urls.{}", name, arch),
                        template,
                    )?;
                }
            }
        }

        Ok(())
    }
}
