use crate::domain::model::{Parameters, StageKind};
use crate::utils::error::Result;
use async_trait::async_trait;

/// A constructed stage, ready to run once.
#[async_trait]
pub trait Stage: Send {
    fn name(&self) -> &str;

    async fn run(&mut self) -> Result<()>;
}

/// Construction step of a stage. The runner builds the stage right before it
/// runs and drops it right after.
pub trait StageFactory: Send + Sync {
    fn kind(&self) -> StageKind;

    fn build(&self, parameters: &Parameters) -> Result<Box<dyn Stage>>;
}
