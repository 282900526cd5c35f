//! ---
//! swarm_section: "01-core-functionality"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Threaded component lifecycle for the R-Swarm runtime."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
//! Worker threads driving a component through its lifecycle.
//!
//! Each runner owns one main thread, started on first activation, and an
//! optional periodic thread started by the main thread. The main thread sleeps
//! on a condition variable until the mediator queues an event or a lifecycle
//! change wakes it. Wake-ups are level-triggered through the `woken` flag so a
//! notify that lands before the wait is never lost.
//!
//! Lock order is component, then inbox. The inbox lock is never held while a
//! hook or handler runs.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use r_swarm_logging::{
    log_lifecycle_event, swarm_debug, swarm_error, swarm_info, swarm_warn, LifecycleOutcome,
    LogContext,
};
use r_swarm_msg::mediator::next_subscriber_id;
use r_swarm_msg::{
    Dispatch, Event, EventType, HandlerContext, HandlerTable, KindId, LifecycleHook, Mediator,
    ProcessingMode, Subscriber, SubscriberId,
};
use r_swarm_schema::Record;

use crate::budget::ErrorBudget;
use crate::component::Component;
use crate::settings::ComponentSettings;
use crate::{Result, RuntimeError};

/// Point-in-time view of a running component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentStatus {
    /// Instance name.
    pub name: String,
    /// Component kind.
    pub kind: KindId,
    /// Subscribed and processing.
    pub active: bool,
    /// Worker loop still alive.
    pub powered: bool,
    /// Events waiting in the inbox.
    pub queued: usize,
    /// Events taken from the inbox so far.
    pub processed: u64,
    /// Faults counted so far.
    pub faults: u64,
    /// Whether the error budget forced a shutdown.
    pub forced_shutdown: bool,
}

/// Object-safe control surface over runners of any component type.
pub trait ComponentControl: Send + Sync {
    /// Instance name.
    fn name(&self) -> &str;
    /// Component kind.
    fn kind(&self) -> KindId;
    /// Subscribe and start processing.
    fn activate(&self) -> Result<()>;
    /// Stop processing; `force` also powers the component down.
    fn deactivate(&self, force: bool);
    /// Power down and wait for the worker to exit.
    fn shutdown(&self);
    /// Current status snapshot.
    fn status(&self) -> ComponentStatus;
}

struct Inbox {
    events: VecDeque<Event>,
    active: bool,
    powered: bool,
    woken: bool,
}

struct Shared<C: Component> {
    id: SubscriberId,
    settings: ComponentSettings,
    component: Mutex<C>,
    table: HandlerTable<C>,
    inbox: Mutex<Inbox>,
    signal: Condvar,
    tick: Condvar,
    mediator: Arc<Mediator>,
    ctx: HandlerContext,
    budget: ErrorBudget,
    processed: AtomicU64,
}

impl<C: Component> Subscriber for Shared<C> {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn kind(&self) -> KindId {
        C::KIND
    }

    fn notify(&self, event: Event) {
        let mut inbox = self.inbox.lock();
        if !inbox.powered {
            return;
        }
        inbox.events.push_back(event);
        inbox.woken = true;
        drop(inbox);
        self.signal.notify_all();
    }
}

impl<C: Component> Shared<C> {
    fn log_context(&self, category: &'static str) -> LogContext<'_> {
        LogContext::new()
            .with_component(&self.settings.name)
            .with_kind(C::KIND.as_str())
            .with_category(category)
    }

    fn is_powered(&self) -> bool {
        self.inbox.lock().powered
    }

    fn wake(&self) {
        self.inbox.lock().woken = true;
        self.signal.notify_all();
        self.tick.notify_all();
    }

    fn run(self: Arc<Self>) {
        self.settings.priority.apply_to_current_thread();
        let periodic = self.spawn_periodic();

        while self.wait_for_work() {
            while self.has_work() {
                self.pass();
                if !self.is_powered() {
                    break;
                }
                self.idle();
            }
        }

        if let Some(handle) = periodic {
            if handle.join().is_err() {
                swarm_error!(context = self.log_context("lifecycle"), "periodic thread panicked");
            }
        }
        swarm_info!(context = self.log_context("lifecycle"), "powered down");
    }

    fn spawn_periodic(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !C::PERIODIC {
            return None;
        }
        let interval = self.settings.interval?;
        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("{}-periodic", self.settings.name))
            .spawn(move || shared.run_periodic(interval));
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                swarm_error!(
                    context = self.log_context("lifecycle"),
                    "failed to spawn periodic thread: {err}"
                );
                None
            }
        }
    }

    /// Blocks until something is queued or signalled. False once powered down.
    fn wait_for_work(&self) -> bool {
        let mut inbox = self.inbox.lock();
        while inbox.powered && inbox.events.is_empty() && !inbox.woken {
            self.signal.wait(&mut inbox);
        }
        inbox.woken = false;
        inbox.powered
    }

    fn has_work(&self) -> bool {
        let inbox = self.inbox.lock();
        inbox.powered && (inbox.active || !inbox.events.is_empty())
    }

    fn idle(&self) {
        let mut inbox = self.inbox.lock();
        if inbox.woken || !inbox.events.is_empty() || !inbox.powered {
            inbox.woken = false;
            return;
        }
        match self.settings.interval {
            Some(interval) => {
                self.signal.wait_for(&mut inbox, interval);
            }
            None => self.signal.wait(&mut inbox),
        }
        inbox.woken = false;
    }

    fn pop(&self) -> Option<Event> {
        let mut inbox = self.inbox.lock();
        if !inbox.powered {
            return None;
        }
        inbox.events.pop_front()
    }

    fn pass(&self) {
        let mut component = self.component.lock();
        if let Err(err) = component.pre_process(&self.ctx) {
            if self.fault(&mut component, "pre_process", err) {
                return;
            }
        }
        match self.settings.mode {
            ProcessingMode::DrainOne => {
                if let Some(event) = self.pop() {
                    if !self.handle(&mut component, &event) {
                        return;
                    }
                }
            }
            ProcessingMode::DrainAll => {
                while let Some(event) = self.pop() {
                    if !self.handle(&mut component, &event) {
                        return;
                    }
                }
            }
        }
        if let Err(err) = component.post_process(&self.ctx) {
            self.fault(&mut component, "post_process", err);
        }
    }

    /// Run one event. False when the component must stop processing.
    fn handle(&self, component: &mut C, event: &Event) -> bool {
        self.processed.fetch_add(1, Ordering::Relaxed);
        match self.table.dispatch(component, &self.ctx, event) {
            Ok(Dispatch::Handled(_)) => self.budget.record_success(),
            Ok(Dispatch::Lifecycle(hook)) => self.lifecycle(component, hook, event.payload()),
            Ok(Dispatch::Unhandled) => {
                swarm_debug!(
                    context = self.log_context("handler"),
                    "no handler for {}",
                    event.event_type()
                );
            }
            Err(err) => {
                if self.fault(component, "handler", err) {
                    return false;
                }
            }
        }
        self.is_powered()
    }

    fn lifecycle(&self, component: &mut C, hook: LifecycleHook, state: &Record) {
        let outcome = match hook {
            LifecycleHook::PowerUp => {
                let outcome = component.on_power_up(&self.ctx, state);
                self.inbox.lock().powered = true;
                outcome
            }
            LifecycleHook::PowerDown => {
                self.power_down(component, Some(state));
                Ok(())
            }
            LifecycleHook::Initialize => component.on_initialize(&self.ctx, state),
        };
        if let Err(err) = outcome {
            self.fault(component, "lifecycle", err);
        }
    }

    fn run_periodic(&self, interval: Duration) {
        loop {
            {
                let mut inbox = self.inbox.lock();
                loop {
                    if !inbox.powered {
                        return;
                    }
                    if inbox.active || !inbox.events.is_empty() {
                        break;
                    }
                    self.tick.wait(&mut inbox);
                }
            }
            {
                let mut component = self.component.lock();
                match component.periodic(&self.ctx) {
                    Ok(()) => self.budget.record_success(),
                    Err(err) => {
                        if self.fault(&mut component, "periodic", err) {
                            return;
                        }
                    }
                }
            }
            let mut inbox = self.inbox.lock();
            if inbox.powered {
                self.tick.wait_for(&mut inbox, interval);
            }
        }
    }

    /// Count a fault. True when it exhausted the budget and the component was
    /// shut down.
    fn fault(&self, component: &mut C, stage: &'static str, err: anyhow::Error) -> bool {
        self.mediator.record_fault();
        let streak = self.budget.record_fault();
        swarm_error!(
            context = self.log_context(stage),
            "{stage} fault {streak}/{}: {err:#}",
            self.budget.threshold()
        );
        if !self.budget.is_exhausted() {
            return false;
        }
        if self.budget.trip() {
            log_lifecycle_event(
                Some(&self.log_context("lifecycle")),
                "component.forced_shutdown",
                &format!("forced shutdown after {streak} consecutive faults"),
                LifecycleOutcome::Fault,
            );
            self.power_down(component, None);
            self.retire(component);
        }
        true
    }

    fn power_down(&self, component: &mut C, state: Option<&Record>) {
        if !self.is_powered() {
            return;
        }
        if let Err(err) = component.on_power_down(&self.ctx, state) {
            self.mediator.record_fault();
            swarm_error!(
                context = self.log_context("lifecycle"),
                "power down hook failed: {err:#}"
            );
        }
        self.inbox.lock().powered = false;
        self.mediator.unsubscribe_all(self.id);
        self.wake();
    }

    /// Leave the active state. False when the component was not active.
    ///
    /// A powered component keeps its `POWER_DOWN` subscription so the bus can
    /// still power it down while inactive.
    fn retire(&self, component: &mut C) -> bool {
        let powered = {
            let mut inbox = self.inbox.lock();
            if !inbox.active {
                return false;
            }
            inbox.active = false;
            inbox.powered
        };
        if powered {
            for event_type in self.table.event_types() {
                if event_type != EventType::PowerDown {
                    self.mediator.unsubscribe(self.id, event_type);
                }
            }
        } else {
            self.mediator.unsubscribe_all(self.id);
        }
        if let Err(err) = component.on_deactivate(&self.ctx) {
            self.mediator.record_fault();
            swarm_error!(
                context = self.log_context("lifecycle"),
                "deactivation hook failed: {err:#}"
            );
        }
        self.wake();
        true
    }
}

/// Drives one component instance on its own worker thread.
pub struct ComponentRunner<C: Component> {
    shared: Arc<Shared<C>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Component> ComponentRunner<C> {
    /// Runner using the component type's own handler table.
    pub fn new(component: C, mediator: Arc<Mediator>, settings: ComponentSettings) -> Result<Self> {
        let table = C::handlers()?;
        Ok(Self::with_table(component, table, mediator, settings))
    }

    /// Runner with an explicitly supplied table.
    pub fn with_table(
        component: C,
        table: HandlerTable<C>,
        mediator: Arc<Mediator>,
        mut settings: ComponentSettings,
    ) -> Self {
        if settings.name.is_empty() {
            settings.name = C::KIND.as_str().to_owned();
        }
        let shared = Arc::new(Shared {
            id: next_subscriber_id(),
            component: Mutex::new(component),
            table,
            inbox: Mutex::new(Inbox {
                events: VecDeque::new(),
                active: false,
                powered: true,
                woken: false,
            }),
            signal: Condvar::new(),
            tick: Condvar::new(),
            ctx: HandlerContext::new(Arc::clone(&mediator), C::KIND),
            mediator,
            budget: ErrorBudget::new(settings.error_threshold),
            processed: AtomicU64::new(0),
            settings,
        });
        Self {
            shared,
            worker: Mutex::new(None),
        }
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.shared.settings.name
    }

    /// Scheduling settings.
    pub fn settings(&self) -> &ComponentSettings {
        &self.shared.settings
    }

    /// Mediator subscription id.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.shared.id
    }

    /// Subscribe to every table entry, drop stale events, and wake the worker.
    ///
    /// The worker thread is started on the first activation only. Activating
    /// an active component logs a warning and does nothing else.
    pub fn activate(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        let shared = &self.shared;
        {
            let inbox = shared.inbox.lock();
            if !inbox.powered {
                return Err(RuntimeError::PoweredDown(shared.settings.name.clone()));
            }
            if inbox.active {
                swarm_warn!(context = shared.log_context("lifecycle"), "already active");
                return Ok(());
            }
        }

        if let Err(err) = shared.component.lock().on_activate(&shared.ctx) {
            let reason = format!("{err:#}");
            log_lifecycle_event(
                Some(&shared.log_context("lifecycle")),
                "component.activation_failed",
                &reason,
                LifecycleOutcome::Fault,
            );
            return Err(RuntimeError::Activation {
                name: shared.settings.name.clone(),
                reason,
            });
        }

        {
            let mut inbox = shared.inbox.lock();
            inbox.events.clear();
            inbox.active = true;
        }
        for event_type in shared.table.event_types() {
            shared
                .mediator
                .subscribe(Arc::clone(shared) as Arc<dyn Subscriber>, event_type);
        }

        if worker.is_none() {
            let runner = Arc::clone(shared);
            let spawned = thread::Builder::new()
                .name(shared.settings.name.clone())
                .spawn(move || runner.run());
            match spawned {
                Ok(handle) => *worker = Some(handle),
                Err(source) => {
                    shared.retire(&mut shared.component.lock());
                    return Err(RuntimeError::Spawn {
                        name: shared.settings.name.clone(),
                        source,
                    });
                }
            }
        }

        shared.wake();
        log_lifecycle_event(
            Some(&shared.log_context("lifecycle")),
            "component.activated",
            "activated",
            LifecycleOutcome::Success,
        );
        Ok(())
    }

    /// Stop processing new events; queued events still drain.
    ///
    /// The `POWER_DOWN` subscription stays until the component is unpowered.
    /// With `force` the component is powered down first and its worker exits.
    pub fn deactivate(&self, force: bool) {
        let _control = self.worker.lock();
        let shared = &self.shared;
        let mut component = shared.component.lock();
        if force {
            shared.power_down(&mut component, None);
        }
        if shared.retire(&mut component) {
            log_lifecycle_event(
                Some(&shared.log_context("lifecycle")),
                "component.deactivated",
                "deactivated",
                LifecycleOutcome::Success,
            );
        }
    }

    /// Power down and join the worker unless called from the worker itself.
    pub fn shutdown(&self) {
        self.deactivate(true);
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                swarm_error!(context = self.shared.log_context("lifecycle"), "worker panicked");
            }
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> ComponentStatus {
        let shared = &self.shared;
        let inbox = shared.inbox.lock();
        ComponentStatus {
            name: shared.settings.name.clone(),
            kind: C::KIND,
            active: inbox.active,
            powered: inbox.powered,
            queued: inbox.events.len(),
            processed: shared.processed.load(Ordering::Relaxed),
            faults: shared.budget.total(),
            forced_shutdown: shared.budget.is_tripped(),
        }
    }

    /// Run `f` against the component while its worker is idle.
    pub fn with_component<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.shared.component.lock())
    }
}

impl<C: Component> ComponentControl for ComponentRunner<C> {
    fn name(&self) -> &str {
        Self::name(self)
    }

    fn kind(&self) -> KindId {
        C::KIND
    }

    fn activate(&self) -> Result<()> {
        Self::activate(self)
    }

    fn deactivate(&self, force: bool) {
        Self::deactivate(self, force)
    }

    fn shutdown(&self) {
        Self::shutdown(self)
    }

    fn status(&self) -> ComponentStatus {
        Self::status(self)
    }
}

impl<C: Component> Drop for ComponentRunner<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
