//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Threaded component lifecycle for the R-Swarm runtime."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! The component contract implemented by vehicles, backends, controllers,
//! and interfaces.
use r_swarm_msg::{BusError, HandlerContext, HandlerTable, KindId};
use r_swarm_schema::Record;

/// A unit of behavior driven by its own worker thread.
///
/// Hooks default to no-ops. Returning an error from any hook counts against
/// the component's error budget.
pub trait Component: Send + Sized + 'static {
    /// Kind id used for registration, logging, and the loop guard.
    const KIND: KindId;

    /// Whether the component wants a periodic thread alongside its main loop.
    const PERIODIC: bool = false;

    /// Validated handler table for this component type.
    fn handlers() -> Result<HandlerTable<Self>, BusError>;

    /// Runs once per activation before the component subscribes.
    fn on_activate(&mut self, _ctx: &HandlerContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs when the component stops being active.
    fn on_deactivate(&mut self, _ctx: &HandlerContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs at the start of every scheduling pass.
    fn pre_process(&mut self, _ctx: &HandlerContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs at the end of every scheduling pass.
    fn post_process(&mut self, _ctx: &HandlerContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Body of the periodic thread; only called when `PERIODIC` is set.
    fn periodic(&mut self, _ctx: &HandlerContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// `POWER_UP` was delivered.
    fn on_power_up(&mut self, _ctx: &HandlerContext, _state: &Record) -> anyhow::Result<()> {
        Ok(())
    }

    /// The component is powering down, by event (`Some`) or by force (`None`).
    fn on_power_down(
        &mut self,
        _ctx: &HandlerContext,
        _state: Option<&Record>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// `INITIALIZATION` was delivered.
    fn on_initialize(&mut self, _ctx: &HandlerContext, _state: &Record) -> anyhow::Result<()> {
        Ok(())
    }
}
