//! ---
//! swarm_section: "02-messaging-ipc-data-model"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Event taxonomy, mediator, and handler tables."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Per-component handler tables.
//!
//! A table maps event types to plain function handlers. Tables are built once
//! at registration time: ancestors are merged first, the component's own
//! entries override them, and every signature is validated before the table
//! can be used. Lifecycle events are pre-registered and owned by the runtime.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use r_swarm_schema::{Record, RecordKind};
use serde::{Deserialize, Serialize};

use crate::event::{Event, KindId};
use crate::event_type::EventType;
use crate::mediator::Mediator;
use crate::{BusError, Result};

/// Handler signature: component state, raise context, payload.
///
/// A returned record is published to every evaluation event type declared for
/// the handler.
pub type HandlerFn<C> = fn(&mut C, &HandlerContext, &Record) -> anyhow::Result<Option<Record>>;

/// How many queued events a component processes per scheduling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Pop and run one event, then yield.
    #[default]
    DrainOne,
    /// Run every queued event before yielding.
    DrainAll,
}

/// Runtime hook bound to a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleHook {
    /// `POWER_UP`.
    PowerUp,
    /// `POWER_DOWN`.
    PowerDown,
    /// `INITIALIZATION`.
    Initialize,
}

impl LifecycleHook {
    fn for_event(event_type: EventType) -> Option<Self> {
        match event_type {
            EventType::PowerUp => Some(LifecycleHook::PowerUp),
            EventType::PowerDown => Some(LifecycleHook::PowerDown),
            EventType::Initialization => Some(LifecycleHook::Initialize),
            _ => None,
        }
    }
}

/// A registered handler and its declared signature.
pub struct HandlerSpec<C> {
    input: RecordKind,
    handler: HandlerFn<C>,
    evaluates: Vec<EventType>,
    output: Option<RecordKind>,
}

impl<C> Clone for HandlerSpec<C> {
    fn clone(&self) -> Self {
        Self {
            input: self.input,
            handler: self.handler,
            evaluates: self.evaluates.clone(),
            output: self.output,
        }
    }
}

impl<C> fmt::Debug for HandlerSpec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("input", &self.input)
            .field("evaluates", &self.evaluates)
            .field("output", &self.output)
            .finish()
    }
}

impl<C> HandlerSpec<C> {
    /// Handler taking payloads of `input` kind.
    pub fn new(input: RecordKind, handler: HandlerFn<C>) -> Self {
        Self {
            input,
            handler,
            evaluates: Vec::new(),
            output: None,
        }
    }

    /// Publish the handler's result as `events`, declaring its `output` kind.
    pub fn evaluates(mut self, events: &[EventType], output: RecordKind) -> Self {
        self.evaluates = events.to_vec();
        self.output = Some(output);
        self
    }

    /// Declared input kind.
    pub fn input(&self) -> RecordKind {
        self.input
    }

    /// Evaluation targets.
    pub fn evaluation_targets(&self) -> &[EventType] {
        &self.evaluates
    }
}

enum Entry<C> {
    Lifecycle(LifecycleHook),
    Handler(HandlerSpec<C>),
}

impl<C> Clone for Entry<C> {
    fn clone(&self) -> Self {
        match self {
            Entry::Lifecycle(hook) => Entry::Lifecycle(*hook),
            Entry::Handler(spec) => Entry::Handler(spec.clone()),
        }
    }
}

/// Outcome of routing one event through a table.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A handler ran; carries its result.
    Handled(Option<Record>),
    /// The event belongs to the runtime.
    Lifecycle(LifecycleHook),
    /// No entry for this event type.
    Unhandled,
}

/// Context passed to handlers for raising events.
#[derive(Clone)]
pub struct HandlerContext {
    mediator: Arc<Mediator>,
    origin: KindId,
}

impl HandlerContext {
    /// Context raising events on behalf of `origin`.
    pub fn new(mediator: Arc<Mediator>, origin: KindId) -> Self {
        Self { mediator, origin }
    }

    /// Component kind stamped on raised events.
    pub fn origin(&self) -> KindId {
        self.origin
    }

    /// Publish `payload` as a derived event of `event_type`.
    pub fn raise(&self, event_type: EventType, payload: Record) -> Result<()> {
        self.mediator
            .publish(Event::derived(event_type, payload, self.origin)?);
        Ok(())
    }

    /// Mediator handle for callers that need to publish external events.
    pub fn mediator(&self) -> &Arc<Mediator> {
        &self.mediator
    }
}

/// Validated event-type-to-handler mapping for component type `C`.
pub struct HandlerTable<C> {
    owner: KindId,
    entries: BTreeMap<EventType, Entry<C>>,
}

impl<C> Clone for HandlerTable<C> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner,
            entries: self.entries.clone(),
        }
    }
}

impl<C> fmt::Debug for HandlerTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("owner", &self.owner)
            .field("events", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C> HandlerTable<C> {
    /// Start a table for components of kind `owner`.
    pub fn builder(owner: KindId) -> HandlerTableBuilder<C> {
        HandlerTableBuilder {
            owner,
            inherited: BTreeMap::new(),
            own: Vec::new(),
        }
    }

    /// Table holding only the lifecycle entries.
    pub fn lifecycle_only(owner: KindId) -> Self {
        Self {
            owner,
            entries: root_entries(),
        }
    }

    /// Component kind owning this table.
    pub fn owner(&self) -> KindId {
        self.owner
    }

    /// Event types the component subscribes to.
    pub fn event_types(&self) -> impl Iterator<Item = EventType> + '_ {
        self.entries.keys().copied()
    }

    /// Whether an entry exists for `event_type`.
    pub fn handles(&self, event_type: EventType) -> bool {
        self.entries.contains_key(&event_type)
    }

    /// Handler registered for `event_type`, if any.
    pub fn handler(&self, event_type: EventType) -> Option<&HandlerSpec<C>> {
        match self.entries.get(&event_type) {
            Some(Entry::Handler(spec)) => Some(spec),
            _ => None,
        }
    }

    /// Route `event` to its handler and publish any evaluation results.
    ///
    /// Lifecycle events are returned to the caller untouched. A result whose
    /// kind does not fit the declared output fails the handler.
    pub fn dispatch(
        &self,
        component: &mut C,
        ctx: &HandlerContext,
        event: &Event,
    ) -> anyhow::Result<Dispatch> {
        let spec = match self.entries.get(&event.event_type()) {
            None => return Ok(Dispatch::Unhandled),
            Some(Entry::Lifecycle(hook)) => return Ok(Dispatch::Lifecycle(*hook)),
            Some(Entry::Handler(spec)) => spec,
        };
        let result = (spec.handler)(component, ctx, event.payload())
            .with_context(|| format!("{} handler for {}", self.owner, event.event_type()))?;
        if let (Some(record), Some(output)) = (&result, spec.output) {
            if !output.accepts(record.kind()) {
                anyhow::bail!(
                    "{} handler for {} returned {} instead of {}",
                    self.owner,
                    event.event_type(),
                    record.kind(),
                    output
                );
            }
            for target in &spec.evaluates {
                ctx.raise(*target, record.clone())?;
            }
        }
        Ok(Dispatch::Handled(result))
    }
}

fn root_entries<C>() -> BTreeMap<EventType, Entry<C>> {
    [EventType::PowerUp, EventType::PowerDown, EventType::Initialization]
        .into_iter()
        .filter_map(|event| LifecycleHook::for_event(event).map(|hook| (event, Entry::Lifecycle(hook))))
        .collect()
}

/// Builder returned by [`HandlerTable::builder`].
pub struct HandlerTableBuilder<C> {
    owner: KindId,
    inherited: BTreeMap<EventType, Entry<C>>,
    own: Vec<(EventType, HandlerSpec<C>)>,
}

impl<C> HandlerTableBuilder<C> {
    /// Merge an ancestor's entries; entries registered on this builder win.
    pub fn inherit(mut self, ancestor: &HandlerTable<C>) -> Self {
        for (event, entry) in &ancestor.entries {
            self.inherited.entry(*event).or_insert_with(|| entry.clone());
        }
        self
    }

    /// Register a handler for one event type.
    pub fn on(mut self, event_type: EventType, spec: HandlerSpec<C>) -> Self {
        self.own.push((event_type, spec));
        self
    }

    /// Register the same handler for several event types.
    pub fn on_any(mut self, event_types: &[EventType], spec: HandlerSpec<C>) -> Self {
        for event_type in event_types {
            self.own.push((*event_type, spec.clone()));
        }
        self
    }

    /// Validate every registration and produce the table.
    pub fn build(self) -> Result<HandlerTable<C>> {
        let owner = self.owner;
        let mut entries = root_entries();
        for (event, entry) in self.inherited {
            if let Entry::Handler(spec) = entry {
                entries.insert(event, Entry::Handler(spec));
            }
        }
        for (event, spec) in self.own {
            validate(owner, event, &spec)?;
            entries.insert(event, Entry::Handler(spec));
        }
        Ok(HandlerTable { owner, entries })
    }
}

fn validate<C>(owner: KindId, event: EventType, spec: &HandlerSpec<C>) -> Result<()> {
    let fail = |reason: String| BusError::HandlerSignature {
        owner: owner.as_str(),
        event,
        reason,
    };
    if event.is_lifecycle() {
        return Err(fail("lifecycle events are handled by the component runtime".into()));
    }
    if !spec.input.accepts(event.payload_kind()) {
        return Err(fail(format!(
            "handler takes {} but {} carries {}",
            spec.input,
            event,
            event.payload_kind()
        )));
    }
    if spec.output.is_some() && spec.evaluates.is_empty() {
        return Err(fail("an output kind needs at least one evaluation event".into()));
    }
    if let Some(output) = spec.output {
        for target in &spec.evaluates {
            if target.payload_kind() != output {
                return Err(fail(format!(
                    "evaluation to {target} expects {} but the handler returns {output}",
                    target.payload_kind()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_swarm_schema::vehicle::{command, default_state};
    use r_swarm_schema::{CommandKind, VehicleState};

    #[derive(Default)]
    struct Counter {
        hits: Vec<&'static str>,
    }

    fn base_land(c: &mut Counter, _: &HandlerContext, _: &Record) -> anyhow::Result<Option<Record>> {
        c.hits.push("base-land");
        Ok(None)
    }

    fn base_stop(c: &mut Counter, _: &HandlerContext, _: &Record) -> anyhow::Result<Option<Record>> {
        c.hits.push("base-stop");
        Ok(None)
    }

    fn child_land(c: &mut Counter, _: &HandlerContext, _: &Record) -> anyhow::Result<Option<Record>> {
        c.hits.push("child-land");
        let mut state = default_state()?;
        state.set("state", VehicleState::Land)?;
        Ok(Some(state.into_partial()))
    }

    fn kind() -> KindId {
        KindId::new("counter")
    }

    fn ctx() -> HandlerContext {
        HandlerContext::new(Arc::new(Mediator::new()), kind())
    }

    fn base_table() -> HandlerTable<Counter> {
        HandlerTable::builder(kind())
            .on(EventType::CommandLand, HandlerSpec::new(RecordKind::Command, base_land))
            .on(EventType::CommandStop, HandlerSpec::new(RecordKind::Command, base_stop))
            .build()
            .expect("base table")
    }

    #[test]
    fn inheritance_overrides_ancestor_entries() {
        let table = HandlerTable::builder(kind())
            .inherit(&base_table())
            .on(
                EventType::CommandLand,
                HandlerSpec::new(RecordKind::Command, child_land)
                    .evaluates(&[EventType::DroneDataUpdate], RecordKind::PartialState),
            )
            .build()
            .expect("child table");
        assert!(table.handles(EventType::PowerDown));
        assert!(table.handles(EventType::CommandStop));

        let mut counter = Counter::default();
        let ctx = ctx();
        let land = Event::new(
            EventType::CommandLand,
            command(CommandKind::Land, Record::empty()).expect("command"),
        )
        .expect("event");
        let stop = Event::new(
            EventType::CommandStop,
            command(CommandKind::Stop, Record::empty()).expect("command"),
        )
        .expect("event");
        let outcome = table.dispatch(&mut counter, &ctx, &land).expect("dispatch");
        assert!(matches!(outcome, Dispatch::Handled(Some(_))));
        table.dispatch(&mut counter, &ctx, &stop).expect("dispatch");
        assert_eq!(counter.hits, vec!["child-land", "base-stop"]);
        assert_eq!(ctx.mediator().metrics().published, 1);
    }

    #[test]
    fn lifecycle_events_are_reserved() {
        let err = HandlerTable::<Counter>::builder(kind())
            .on(EventType::PowerDown, HandlerSpec::new(RecordKind::FullState, base_land))
            .build()
            .expect_err("power down is runtime owned");
        assert!(matches!(err, BusError::HandlerSignature { event: EventType::PowerDown, .. }));

        let table = HandlerTable::<Counter>::lifecycle_only(kind());
        let event = Event::new(EventType::PowerDown, default_state().expect("state")).expect("event");
        let outcome = table
            .dispatch(&mut Counter::default(), &ctx(), &event)
            .expect("dispatch");
        assert_eq!(outcome, Dispatch::Lifecycle(LifecycleHook::PowerDown));
    }

    #[test]
    fn signatures_are_validated() {
        let wrong_input = HandlerTable::<Counter>::builder(kind())
            .on(EventType::CommandLand, HandlerSpec::new(RecordKind::Sensor, base_land))
            .build();
        assert!(matches!(wrong_input, Err(BusError::HandlerSignature { .. })));

        let wrong_output = HandlerTable::<Counter>::builder(kind())
            .on(
                EventType::CommandLand,
                HandlerSpec::new(RecordKind::Base, base_land).evaluates(
                    &[EventType::DroneDataUpdate, EventType::SendPacket],
                    RecordKind::PartialState,
                ),
            )
            .build();
        assert!(matches!(wrong_output, Err(BusError::HandlerSignature { .. })));
    }
}
