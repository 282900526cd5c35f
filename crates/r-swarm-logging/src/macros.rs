//! ---
//! swarm_section: "03-persistence-logging"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Structured logging helpers for components and interfaces."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Context-enriched logging macros.

/// Shared expansion of the `swarm_*` macros.
#[doc(hidden)]
#[macro_export]
macro_rules! __swarm_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            component = ctx.component.unwrap_or(""),
            kind = ctx.kind.unwrap_or(""),
            category = ctx.category.unwrap_or(""),
            interface = ctx.interface.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with component context.
#[macro_export]
macro_rules! swarm_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__swarm_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__swarm_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with component context.
#[macro_export]
macro_rules! swarm_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__swarm_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__swarm_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with component context.
#[macro_export]
macro_rules! swarm_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__swarm_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__swarm_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with component context.
#[macro_export]
macro_rules! swarm_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__swarm_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__swarm_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
