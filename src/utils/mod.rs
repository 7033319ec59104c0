pub mod error;
pub mod fs_tree;
pub mod logger;
pub mod monitor;
pub mod progress;
pub mod validation;
