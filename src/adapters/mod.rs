// Adapters layer: concrete stage implementations backed by external systems.

pub mod command_stage;

pub use command_stage::{CommandStage, CommandStageFactory};
