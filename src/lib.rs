pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{CommandStage, CommandStageFactory};
pub use config::{RunConfig, StageCommand};
pub use crate::core::runner::FsctRunner;
pub use domain::model::{Parameters, RunOptions, RunSummary, StageKind};
pub use utils::error::{FsctError, Result};
