pub mod toolchain_pipeline;

pub use toolchain_pipeline::ToolchainPipeline;
