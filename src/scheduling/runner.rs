//! Job body execution seam

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::models::JobDefinition;

/// The body invoked on every fire. Implementations run on the trigger
/// engine's dispatch tasks, decoupled from lifecycle-operation callers.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, definition: &JobDefinition) -> Result<()>;
}

/// Default runner: logs each fire.
pub struct LoggingJobRunner;

#[async_trait]
impl JobRunner for LoggingJobRunner {
    async fn run(&self, definition: &JobDefinition) -> Result<()> {
        info!(
            "Executing job '{}' at {}",
            definition.key(),
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(())
    }
}
