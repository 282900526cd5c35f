//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Vehicle runtime, component registry, and reference collaborators."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Flight backends.
//!
//! [`backend_table`] routes every command event to a [`FlightBackend`]
//! method and evaluates the returned state update to
//! `MOVEMENT_DATA_UPDATE` and `DRONE_DATA_UPDATE`. Concrete backends inherit
//! that table. [`Flightless`] is the hardware-free backend: commands move the
//! simulated vehicle instantly.
use r_swarm_common::unix_seconds;
use r_swarm_logging::{swarm_info, swarm_warn, LogContext};
use r_swarm_msg::{BusError, EventType, HandlerContext, HandlerFn, HandlerSpec, HandlerTable, KindId};
use r_swarm_rt::Component;
use r_swarm_schema::{Record, RecordKind, Value, Vector3, VehicleState};
use serde::{Deserialize, Serialize};

/// Climb used when a start command carries no altitude.
pub const DEFAULT_TAKE_OFF_ALTITUDE: f64 = 5.0;

const MOVEMENT: [EventType; 2] = [EventType::MovementDataUpdate, EventType::DroneDataUpdate];

/// Outcome of a command: the partial state update to publish, if any.
pub type Update = anyhow::Result<Option<Record>>;

/// Backend settings read from the component's configuration arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FlightSettings {
    /// Climb applied by `COMMAND_START` unless the command names one.
    pub take_off_altitude: f64,
}

impl Default for FlightSettings {
    fn default() -> Self {
        Self {
            take_off_altitude: DEFAULT_TAKE_OFF_ALTITUDE,
        }
    }
}

/// Command surface shared by every flight backend.
///
/// `args` is the command's `msg` record. Returning `Ok(None)` refuses the
/// command without counting a fault.
pub trait FlightBackend: Component {
    /// Absorb a state update published by another component.
    fn absorb(&mut self, update: &Record) -> anyhow::Result<()>;
    /// `COMMAND_START`.
    fn take_off(&mut self, ctx: &HandlerContext, args: Option<&Record>) -> Update;
    /// `COMMAND_POS_HOLD`.
    fn hold_position(&mut self, ctx: &HandlerContext, args: Option<&Record>) -> Update;
    /// `COMMAND_RTL`.
    fn return_to_launch(&mut self, ctx: &HandlerContext, args: Option<&Record>) -> Update;
    /// `COMMAND_LAND`.
    fn land(&mut self, ctx: &HandlerContext, args: Option<&Record>) -> Update;
    /// `COMMAND_CHANGE_COURSE`.
    fn change_course(&mut self, ctx: &HandlerContext, args: Option<&Record>) -> Update;
    /// `COMMAND_ARM`.
    fn arm(&mut self, ctx: &HandlerContext, args: Option<&Record>) -> Update;
    /// `COMMAND_DISARM`.
    fn disarm(&mut self, ctx: &HandlerContext, args: Option<&Record>) -> Update;
}

fn on_state_update<B: FlightBackend>(backend: &mut B, _ctx: &HandlerContext, update: &Record) -> Update {
    backend.absorb(update)?;
    Ok(None)
}

fn on_start<B: FlightBackend>(backend: &mut B, ctx: &HandlerContext, command: &Record) -> Update {
    backend.take_off(ctx, command.get_record("msg"))
}

fn on_pos_hold<B: FlightBackend>(backend: &mut B, ctx: &HandlerContext, command: &Record) -> Update {
    backend.hold_position(ctx, command.get_record("msg"))
}

fn on_rtl<B: FlightBackend>(backend: &mut B, ctx: &HandlerContext, command: &Record) -> Update {
    backend.return_to_launch(ctx, command.get_record("msg"))
}

fn on_land<B: FlightBackend>(backend: &mut B, ctx: &HandlerContext, command: &Record) -> Update {
    backend.land(ctx, command.get_record("msg"))
}

fn on_change_course<B: FlightBackend>(backend: &mut B, ctx: &HandlerContext, command: &Record) -> Update {
    backend.change_course(ctx, command.get_record("msg"))
}

fn on_arm<B: FlightBackend>(backend: &mut B, ctx: &HandlerContext, command: &Record) -> Update {
    backend.arm(ctx, command.get_record("msg"))
}

fn on_disarm<B: FlightBackend>(backend: &mut B, ctx: &HandlerContext, command: &Record) -> Update {
    backend.disarm(ctx, command.get_record("msg"))
}

/// Handler table every flight backend starts from.
pub fn backend_table<B: FlightBackend>() -> Result<HandlerTable<B>, BusError> {
    let command = |handler: HandlerFn<B>| {
        HandlerSpec::new(RecordKind::Command, handler).evaluates(&MOVEMENT, RecordKind::PartialState)
    };
    HandlerTable::builder(B::KIND)
        .on(
            EventType::DroneDataUpdate,
            HandlerSpec::new(RecordKind::PartialState, on_state_update::<B>),
        )
        .on(EventType::CommandStart, command(on_start::<B>))
        .on(EventType::CommandPosHold, command(on_pos_hold::<B>))
        .on(EventType::CommandRtl, command(on_rtl::<B>))
        .on(EventType::CommandLand, command(on_land::<B>))
        .on(EventType::CommandChangeCourse, command(on_change_course::<B>))
        .on(EventType::CommandArm, command(on_arm::<B>))
        .on(EventType::CommandDisarm, command(on_disarm::<B>))
        .build()
}

/// Simulated backend with no hardware behind it.
#[derive(Debug, Clone)]
pub struct Flightless {
    settings: FlightSettings,
    state: Record,
    route: Vec<Vector3>,
}

impl Flightless {
    /// Backend starting from a full vehicle state.
    pub fn new(state: Record, settings: FlightSettings) -> Self {
        Self {
            settings,
            state,
            route: Vec::new(),
        }
    }

    /// Current simulated vehicle state.
    pub fn state(&self) -> &Record {
        &self.state
    }

    /// Goals accepted through `COMMAND_CHANGE_COURSE`, oldest first.
    pub fn route(&self) -> &[Vector3] {
        &self.route
    }

    fn log_context(&self) -> LogContext<'static> {
        LogContext::new()
            .with_kind(Self::KIND.as_str())
            .with_category("flight")
    }

    fn current(&self) -> VehicleState {
        self.state.state().unwrap_or(VehicleState::Initialization)
    }

    fn position(&self) -> Vector3 {
        self.state.get_vector("position").unwrap_or_default()
    }

    /// True (and logged) when `action` needs an airborne vehicle.
    fn refuse_grounded(&self, action: &str) -> bool {
        let state = self.current();
        if state.is_grounded() {
            swarm_warn!(context = self.log_context(), "{action} refused: vehicle grounded in {state}");
            return true;
        }
        false
    }

    /// Stop all motion, enter `state`, and apply the update locally.
    fn settle(
        &mut self,
        state: VehicleState,
        position: Option<Vector3>,
        extra: Vec<(&'static str, Value)>,
    ) -> anyhow::Result<Record> {
        let zero = Vector3::default();
        let mut update = Record::builder(RecordKind::PartialState)
            .field("acceleration", zero)
            .field("velocity", zero)
            .field("state", state);
        if let Some(position) = position {
            update = update.field("position", position);
        }
        for (name, value) in extra {
            update = update.field(name, value);
        }
        let update = update.build()?;
        self.state.update_from(&update)?;
        Ok(update)
    }
}

impl FlightBackend for Flightless {
    fn absorb(&mut self, update: &Record) -> anyhow::Result<()> {
        self.state.update_from(update)?;
        Ok(())
    }

    fn take_off(&mut self, _ctx: &HandlerContext, args: Option<&Record>) -> Update {
        if self.current() == VehicleState::Disarmed {
            swarm_warn!(context = self.log_context(), "take off refused: vehicle still disarmed");
            return Ok(None);
        }
        let altitude = args
            .and_then(|args| args.get_float("takeOffAltitude"))
            .unwrap_or(self.settings.take_off_altitude);
        let position = self.position() + Vector3::new(0.0, 0.0, altitude);
        swarm_info!(context = self.log_context(), "taking off to {altitude} m");
        let update = self.settle(
            VehicleState::AtStart,
            Some(position),
            vec![("start_time", Value::Float(unix_seconds()))],
        )?;
        Ok(Some(update))
    }

    fn hold_position(&mut self, _ctx: &HandlerContext, _args: Option<&Record>) -> Update {
        if self.refuse_grounded("position hold") {
            return Ok(None);
        }
        Ok(Some(self.settle(VehicleState::PosHold, None, Vec::new())?))
    }

    fn return_to_launch(&mut self, _ctx: &HandlerContext, _args: Option<&Record>) -> Update {
        if self.refuse_grounded("return to launch") {
            return Ok(None);
        }
        let home = self.state.get_vector("starting_position").unwrap_or_default();
        swarm_info!(context = self.log_context(), "returning to launch at {home:?}");
        Ok(Some(self.settle(VehicleState::Rtl, Some(home), Vec::new())?))
    }

    fn land(&mut self, _ctx: &HandlerContext, _args: Option<&Record>) -> Update {
        if self.refuse_grounded("landing") {
            return Ok(None);
        }
        let Vector3 { x, y, .. } = self.position();
        swarm_info!(context = self.log_context(), "landing");
        Ok(Some(self.settle(VehicleState::Land, Some(Vector3::new(x, y, 0.0)), Vec::new())?))
    }

    fn change_course(&mut self, _ctx: &HandlerContext, args: Option<&Record>) -> Update {
        if self.refuse_grounded("course change") {
            return Ok(None);
        }
        let Some(target) = args.and_then(|args| args.get("target")).and_then(parse_target) else {
            swarm_warn!(context = self.log_context(), "course change ignored: no usable target");
            return Ok(None);
        };
        swarm_info!(context = self.log_context(), "going to {target:?}");
        self.route.push(target);
        let update = self.settle(
            VehicleState::FlyingToGoal,
            Some(target),
            vec![("current_target", Value::Vector(target))],
        )?;
        Ok(Some(update))
    }

    fn arm(&mut self, _ctx: &HandlerContext, _args: Option<&Record>) -> Update {
        Ok(Some(self.settle(VehicleState::Idle, None, Vec::new())?))
    }

    fn disarm(&mut self, _ctx: &HandlerContext, _args: Option<&Record>) -> Update {
        Ok(Some(self.settle(VehicleState::Disarmed, None, Vec::new())?))
    }
}

/// A target is a vector, or text such as `(1, 2, 3)` or `1,2,3`.
fn parse_target(value: &Value) -> Option<Vector3> {
    match value {
        Value::Vector(target) => Some(*target),
        Value::Str(text) => {
            let parts = text
                .trim()
                .trim_matches(|c| matches!(c, '(' | ')' | '[' | ']'))
                .split(',')
                .map(|part| part.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .ok()?;
            match parts.as_slice() {
                [x, y, z] => Some(Vector3::new(*x, *y, *z)),
                _ => None,
            }
        }
        _ => None,
    }
}

impl Component for Flightless {
    const KIND: KindId = KindId::new("flightless");

    fn handlers() -> Result<HandlerTable<Self>, BusError> {
        HandlerTable::builder(Self::KIND)
            .inherit(&backend_table::<Self>()?)
            .build()
    }

    fn on_initialize(&mut self, _ctx: &HandlerContext, state: &Record) -> anyhow::Result<()> {
        if state.kind() == RecordKind::FullState {
            self.state = state.clone();
        } else {
            self.state.update_from(state)?;
        }
        Ok(())
    }

    /// Lands an airborne vehicle before the backend stops.
    fn on_power_down(&mut self, ctx: &HandlerContext, _state: Option<&Record>) -> anyhow::Result<()> {
        if self.current().is_grounded() {
            return Ok(());
        }
        let Vector3 { x, y, .. } = self.position();
        swarm_info!(context = self.log_context(), "powering down in flight; landing");
        let update = self.settle(VehicleState::Land, Some(Vector3::new(x, y, 0.0)), Vec::new())?;
        for target in MOVEMENT {
            ctx.raise(target, update.clone())?;
        }
        Ok(())
    }
}
