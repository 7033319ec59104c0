pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{Cli, Command, FetchJob};

pub use app::pipelines::ToolchainPipeline;
pub use config::ToolchainConfig;
pub use core::engine::ArchiveEngine;
pub use domain::model::{Arch, PackageReport, Platform, Target};
pub use utils::error::{BinsError, Result};
