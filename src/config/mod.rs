#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{Cli, Command, FetchJob};
pub use toml_config::{StripRules, ToolRecipe, ToolchainConfig};
