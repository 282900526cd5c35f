//! ---
//! swarm_section: "15-testing-qa-runbook"
//! swarm_subsection: "module"
//! swarm_type: "source"
//! swarm_scope: "code"
//! swarm_description: "Ordering, loop guard, and periodic behavior of running components."
//! swarm_version: "v0.0.0-prealpha"
//! swarm_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use r_swarm_msg::{
    BusError, Event, EventType, HandlerContext, HandlerSpec, HandlerTable, KindId, Mediator,
    ProcessingMode,
};
use r_swarm_rt::{Component, ComponentControl, ComponentRunner, ComponentSettings};
use r_swarm_schema::vehicle::command;
use r_swarm_schema::{CommandKind, Record, RecordKind};

fn wait_until(mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

fn land(seq: i64) -> Event {
    let args = Record::builder(RecordKind::Base)
        .field("seq", seq)
        .build()
        .expect("args");
    Event::new(
        EventType::CommandLand,
        command(CommandKind::Land, args).expect("command"),
    )
    .expect("event")
}

#[derive(Default)]
struct Recorder {
    seen: Vec<i64>,
}

fn record_seq(recorder: &mut Recorder, _: &HandlerContext, cmd: &Record) -> anyhow::Result<Option<Record>> {
    let seq = cmd
        .get_record("msg")
        .and_then(|args| args.get_int("seq"))
        .unwrap_or(-1);
    recorder.seen.push(seq);
    Ok(None)
}

impl Component for Recorder {
    const KIND: KindId = KindId::new("recorder");

    fn handlers() -> Result<HandlerTable<Self>, BusError> {
        HandlerTable::builder(Self::KIND)
            .on(EventType::CommandLand, HandlerSpec::new(RecordKind::Command, record_seq))
            .build()
    }
}

#[derive(Default)]
struct Echo {
    handled: usize,
}

fn echo_land(echo: &mut Echo, ctx: &HandlerContext, cmd: &Record) -> anyhow::Result<Option<Record>> {
    echo.handled += 1;
    ctx.raise(EventType::CommandLand, cmd.clone())?;
    Ok(None)
}

impl Component for Echo {
    const KIND: KindId = KindId::new("echo");

    fn handlers() -> Result<HandlerTable<Self>, BusError> {
        HandlerTable::builder(Self::KIND)
            .on(EventType::CommandLand, HandlerSpec::new(RecordKind::Command, echo_land))
            .build()
    }
}

#[derive(Default)]
struct Ticker {
    ticks: usize,
}

impl Component for Ticker {
    const KIND: KindId = KindId::new("ticker");
    const PERIODIC: bool = true;

    fn handlers() -> Result<HandlerTable<Self>, BusError> {
        Ok(HandlerTable::lifecycle_only(Self::KIND))
    }

    fn periodic(&mut self, _: &HandlerContext) -> anyhow::Result<()> {
        self.ticks += 1;
        Ok(())
    }
}

#[test]
fn each_subscriber_sees_publish_order() {
    let mediator = Arc::new(Mediator::new());
    let settings = |name: &str, mode| {
        ComponentSettings::named(name)
            .with_mode(mode)
            .with_interval(Some(Duration::from_millis(5)))
    };
    let one = ComponentRunner::new(
        Recorder::default(),
        Arc::clone(&mediator),
        settings("recorder-one", ProcessingMode::DrainOne),
    )
    .expect("runner");
    let all = ComponentRunner::new(
        Recorder::default(),
        Arc::clone(&mediator),
        settings("recorder-all", ProcessingMode::DrainAll),
    )
    .expect("runner");
    one.activate().expect("activate");
    all.activate().expect("activate");

    for seq in 0..100 {
        mediator.publish(land(seq));
    }
    let expected: Vec<i64> = (0..100).collect();
    assert!(wait_until(|| one.with_component(|r| r.seen.len()) == 100));
    assert!(wait_until(|| all.with_component(|r| r.seen.len()) == 100));
    assert_eq!(one.with_component(|r| r.seen.clone()), expected);
    assert_eq!(all.with_component(|r| r.seen.clone()), expected);
}

#[test]
fn raised_events_do_not_return_to_their_origin_kind() {
    let mediator = Arc::new(Mediator::new());
    let echo = ComponentRunner::new(
        Echo::default(),
        Arc::clone(&mediator),
        ComponentSettings::named("echo").with_interval(Some(Duration::from_millis(5))),
    )
    .expect("runner");
    let listener = ComponentRunner::new(
        Recorder::default(),
        Arc::clone(&mediator),
        ComponentSettings::named("listener").with_interval(Some(Duration::from_millis(5))),
    )
    .expect("runner");
    echo.activate().expect("activate");
    listener.activate().expect("activate");

    mediator.publish(land(7));
    assert!(wait_until(|| listener.with_component(|r| r.seen.len()) == 2));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(echo.with_component(|e| e.handled), 1);
    assert_eq!(listener.with_component(|r| r.seen.clone()), vec![7, 7]);
    assert_eq!(mediator.metrics().suppressed, 1);
}

#[test]
fn periodic_thread_runs_only_while_active() {
    let mediator = Arc::new(Mediator::new());
    let ticker = ComponentRunner::new(
        Ticker::default(),
        Arc::clone(&mediator),
        ComponentSettings::named("ticker").with_interval(Some(Duration::from_millis(5))),
    )
    .expect("runner");
    let control: &dyn ComponentControl = &ticker;
    control.activate().expect("activate");
    assert!(wait_until(|| ticker.with_component(|t| t.ticks) >= 3));

    control.deactivate(false);
    thread::sleep(Duration::from_millis(20));
    let paused = ticker.with_component(|t| t.ticks);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(ticker.with_component(|t| t.ticks), paused);

    control.shutdown();
    assert!(!control.status().powered);
}
