//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Threaded component lifecycle for the R-Swarm runtime."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::time::Duration;

use r_swarm_msg::ProcessingMode;

use crate::budget::DEFAULT_ERROR_THRESHOLD;
use crate::priority::ThreadPriority;

/// Per-instance scheduling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSettings {
    /// Instance name, also the worker thread name.
    pub name: String,
    /// Idle wait between passes and periodic tick. `None` waits for events only.
    pub interval: Option<Duration>,
    /// Events processed per pass.
    pub mode: ProcessingMode,
    /// Worker thread priority.
    pub priority: ThreadPriority,
    /// Consecutive faults tolerated before forced shutdown.
    pub error_threshold: u32,
}

impl Default for ComponentSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            interval: Some(Duration::from_secs(1)),
            mode: ProcessingMode::default(),
            priority: ThreadPriority::default(),
            error_threshold: DEFAULT_ERROR_THRESHOLD,
        }
    }
}

impl ComponentSettings {
    /// Default settings under a given instance name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Override the interval.
    pub fn with_interval(mut self, interval: Option<Duration>) -> Self {
        self.interval = interval;
        self
    }

    /// Override the processing mode.
    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the thread priority.
    pub fn with_priority(mut self, priority: ThreadPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Override the error threshold.
    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }
}
