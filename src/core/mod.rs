pub mod cores;
pub mod runner;

pub use crate::domain::model::{Parameters, RunOptions, RunSummary, StageKind, StageReport};
pub use crate::domain::ports::{Stage, StageFactory};
pub use crate::utils::error::Result;
