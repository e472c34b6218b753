use crate::error::{PipelineError, Result};
use crate::reader::{DrainPolicy, ReadStrategy};
use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 3;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Settings for one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Ring buffer capacity; must be positive
    pub capacity: usize,
    /// Delay between reader pops
    pub poll_interval: Duration,
    pub read_strategy: ReadStrategy,
    pub drain_policy: DrainPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            read_strategy: ReadStrategy::default(),
            drain_policy: DrainPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Check that the configuration can build a pipeline
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(PipelineError::Config(
                "buffer capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
