//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Threaded component lifecycle for the R-Swarm runtime."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Scheduling priority requested for a component's worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPriority {
    /// Inherit the process priority.
    #[default]
    Normal,
    /// Slightly favoured.
    High,
    /// Strongly favoured.
    VeryHigh,
    /// Highest niceness the OS allows.
    Realtime,
}

impl ThreadPriority {
    /// Unix nice value for this priority.
    pub fn nice(self) -> i32 {
        match self {
            ThreadPriority::Normal => 0,
            ThreadPriority::High => -5,
            ThreadPriority::VeryHigh => -10,
            ThreadPriority::Realtime => -20,
        }
    }

    /// Apply to the calling thread. Returns whether the OS accepted it.
    ///
    /// Raising priority usually needs privileges; refusal is not an error.
    pub fn apply_to_current_thread(self) -> bool {
        if self == ThreadPriority::Normal {
            return true;
        }
        apply_nice(self.nice())
    }
}

#[cfg(unix)]
fn apply_nice(nice: i32) -> bool {
    // On Linux a PRIO_PROCESS target of 0 addresses the calling thread.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if rc != 0 {
        tracing::debug!(nice, error = %std::io::Error::last_os_error(), "thread priority not applied");
    }
    rc == 0
}

#[cfg(not(unix))]
fn apply_nice(nice: i32) -> bool {
    tracing::debug!(nice, "thread priority unsupported on this platform");
    false
}
