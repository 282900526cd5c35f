//! ---
//! swarm_section: "03-persistence-logging"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Structured logging helpers for components and interfaces."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for tests and tools.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Component instance name.
    pub component: Option<&'a str>,
    /// Component kind id.
    pub kind: Option<&'a str>,
    /// Subsystem category (lifecycle, handler, transport, codec).
    pub category: Option<&'a str>,
    /// Communication interface tag.
    pub interface: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a component instance name.
    pub fn with_component(mut self, component: &'a str) -> Self {
        self.component = Some(component);
        self
    }

    /// Attach a component kind id.
    pub fn with_kind(mut self, kind: &'a str) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Attach a category.
    pub fn with_category(mut self, category: &'a str) -> Self {
        self.category = Some(category);
        self
    }

    /// Attach an interface tag.
    pub fn with_interface(mut self, interface: &'a str) -> Self {
        self.interface = Some(interface);
        self
    }
}

/// Outcome attached to lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The transition completed as requested.
    Success,
    /// The transition was forced by a fault.
    Fault,
}

impl LifecycleOutcome {
    /// Lower-case label written to the `outcome` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Success => "success",
            LifecycleOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
///
/// Successful transitions log at info, faults at error.
pub fn log_lifecycle_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LifecycleOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    match outcome {
        LifecycleOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            component = ctx.component.unwrap_or(""),
            kind = ctx.kind.unwrap_or(""),
            category = ctx.category.unwrap_or("lifecycle"),
            message = %message
        ),
        LifecycleOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            component = ctx.component.unwrap_or(""),
            kind = ctx.kind.unwrap_or(""),
            category = ctx.category.unwrap_or("lifecycle"),
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_component("udp0")
            .with_kind("udp")
            .with_interface("udp0");
        swarm_info!(context = ctx.clone(), "interface bound");
        swarm_debug!("debug message");
        swarm_warn!(context = ctx.clone(), "datagram dropped: {} bytes", 12);
        swarm_error!(context = ctx, "error code: {}", 42);
    }

    #[test]
    fn lifecycle_helper_emits() {
        init();
        let ctx = LogContext::new().with_component("flightless");
        log_lifecycle_event(
            Some(&ctx),
            "component.deactivated",
            "deactivated",
            LifecycleOutcome::Success,
        );
        log_lifecycle_event(
            None,
            "component.forced_shutdown",
            "forced shutdown",
            LifecycleOutcome::Fault,
        );
        assert_eq!(LifecycleOutcome::Fault.as_str(), "fault");
    }
}
