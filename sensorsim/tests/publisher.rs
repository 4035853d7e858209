//! Publisher loop behaviour against a fake publish channel.
//!
//! All tests run on a paused clock, so intervals are exact and the suite
//! finishes instantly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::field::{Field, Visit};
use tracing::instrument::WithSubscriber;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use sensorsim::{
    BackendConfig, Format, GeneratorConfig, Overrides, PublishChannel, PublishError,
    PublisherConfig, PublisherLoop, SensorReading, SimulatedTemperature, SimulatorConfig,
    SimulatorRunner,
};
use sensorsim_common::decode_auto;

#[derive(Debug, Clone)]
struct Call {
    pubsub_name: String,
    topic: String,
    reading: SensorReading,
    started_at: Instant,
}

/// Records every publish; optionally slow and optionally failing on odd calls.
#[derive(Clone, Default)]
struct FakeChannel {
    calls: Arc<Mutex<Vec<Call>>>,
    latency: Duration,
    fail_odd: bool,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl FakeChannel {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    fn failing_odd_calls() -> Self {
        Self {
            fail_odd: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl PublishChannel for FakeChannel {
    async fn publish(
        &self,
        pubsub_name: &str,
        topic: &str,
        payload: Vec<u8>,
    ) -> Result<(), PublishError> {
        let started_at = Instant::now();
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reading: SensorReading = decode_auto(&payload).expect("payload must decode");
        let number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                pubsub_name: pubsub_name.to_string(),
                topic: topic.to_string(),
                reading,
                started_at,
            });
            calls.len()
        };

        if self.fail_odd && number % 2 == 1 {
            Err(PublishError::Transport {
                backend: pubsub_name.to_string(),
                key: topic.to_string(),
                message: "broker unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A log event with its fields rendered as strings.
#[derive(Debug, Clone)]
struct CapturedEvent {
    level: Level,
    fields: BTreeMap<String, String>,
}

/// Tracing layer that keeps every event it sees.
#[derive(Clone, Default)]
struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventCapture {
    fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.level == level)
            .cloned()
            .collect()
    }
}

struct FieldRecorder<'a>(&'a mut BTreeMap<String, String>);

impl Visit for FieldRecorder<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}

impl<S: Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = BTreeMap::new();
        event.record(&mut FieldRecorder(&mut fields));
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            fields,
        });
    }
}

fn generator() -> SimulatedTemperature {
    SimulatedTemperature::new(&GeneratorConfig {
        seed: Some(11),
        ..Default::default()
    })
    .unwrap()
}

fn config_with_interval(ms: i64) -> PublisherConfig {
    SimulatorConfig::default()
        .resolve(&Overrides {
            feed_interval_ms: Some(ms),
            ..Default::default()
        })
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_publishes_to_default_topic_at_interval() {
    let channel = FakeChannel::default();
    let (tx, rx) = watch::channel(false);
    let start = Instant::now();

    let handle = tokio::spawn(
        PublisherLoop::new(config_with_interval(100), channel.clone(), generator()).run(rx),
    );

    tokio::time::sleep(Duration::from_millis(350)).await;
    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    let calls = channel.calls();
    assert!((3..=4).contains(&calls.len()), "got {} calls", calls.len());
    assert_eq!(stats.success, calls.len());
    assert_eq!(stats.failed, 0);

    for call in &calls {
        assert_eq!(call.pubsub_name, "messaging");
        assert_eq!(call.topic, "telemetry");
    }
    for pair in calls.windows(2) {
        assert!(pair[1].reading.timestamp > pair[0].reading.timestamp);
        assert_eq!(pair[1].reading.sequence, pair[0].reading.sequence + 1);
        assert!(pair[1].started_at - pair[0].started_at >= Duration::from_millis(100));
    }
    assert!(calls[0].started_at - start >= Duration::from_millis(100));
    assert!(channel.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_keeps_ticking_through_failures() {
    let channel = FakeChannel::failing_odd_calls();
    let capture = EventCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(
        PublisherLoop::new(config_with_interval(50), channel.clone(), generator())
            .run(rx)
            .with_subscriber(subscriber),
    );

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!handle.is_finished(), "loop must not exit before cancellation");

    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    let attempts = channel.call_count();
    assert!((4..=5).contains(&attempts), "got {} attempts", attempts);
    assert_eq!(stats.total(), attempts);
    assert_eq!(stats.failed, attempts.div_ceil(2));
    assert_eq!(stats.success, attempts / 2);

    let warnings = capture.at_level(Level::WARN);
    assert_eq!(warnings.len(), stats.failed);
    for warning in &warnings {
        assert_eq!(warning.fields["pubsub"], "messaging");
        assert_eq!(warning.fields["topic"], "telemetry");
        assert!(
            warning.fields["error"].contains("broker unavailable"),
            "error detail missing: {:?}",
            warning.fields
        );
    }
    let sequences: Vec<_> = warnings.iter().map(|w| w.fields["sequence"].clone()).collect();
    assert_eq!(sequences.first().map(String::as_str), Some("1"));
}

#[tokio::test(start_paused = true)]
async fn test_tick_count_tracks_elapsed_time() {
    let channel = FakeChannel::default();
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(
        PublisherLoop::new(config_with_interval(20), channel.clone(), generator()).run(rx),
    );

    tokio::time::sleep(Duration::from_millis(1000)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    let ticks = channel.call_count();
    assert!((49..=51).contains(&ticks), "got {} ticks", ticks);
}

#[tokio::test(start_paused = true)]
async fn test_one_publish_in_flight_with_fixed_delay() {
    let latency = Duration::from_millis(30);
    let channel = FakeChannel::with_latency(latency);
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(
        PublisherLoop::new(config_with_interval(10), channel.clone(), generator()).run(rx),
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(channel.max_in_flight.load(Ordering::SeqCst), 1);

    let calls = channel.calls();
    assert!(calls.len() >= 4);
    for pair in calls.windows(2) {
        // Next wait starts only after the previous publish resolved.
        assert!(pair[1].started_at - pair[0].started_at >= latency + Duration::from_millis(10));
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_publish_is_bounded() {
    let interval = Duration::from_millis(100);
    let latency = Duration::from_millis(80);
    let channel = FakeChannel::with_latency(latency);
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(
        PublisherLoop::new(config_with_interval(100), channel.clone(), generator()).run(rx),
    );

    // First publish runs from 100ms to 180ms; cancel in the middle of it.
    tokio::time::sleep(Duration::from_millis(130)).await;
    let cancelled_at = Instant::now();
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert!(cancelled_at.elapsed() <= interval + latency);
    assert_eq!(channel.call_count(), 1);
    assert!(channel.is_closed());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(channel.call_count(), 1, "no publish after cancellation");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_first_tick() {
    let channel = FakeChannel::default();
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(
        PublisherLoop::new(config_with_interval(1000), channel.clone(), generator()).run(rx),
    );

    tokio::time::sleep(Duration::from_millis(10)).await;
    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.total(), 0);
    assert_eq!(channel.call_count(), 0);
    assert!(channel.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_sender_stops_loop() {
    let channel = FakeChannel::default();
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(
        PublisherLoop::new(config_with_interval(100), channel.clone(), generator()).run(rx),
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    drop(tx);
    handle.await.unwrap();

    assert_eq!(channel.call_count(), 1);
    assert!(channel.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_cbor_payloads() {
    let channel = FakeChannel::default();
    let (tx, rx) = watch::channel(false);
    let config = PublisherConfig::new(100, "messaging", "plant/temp")
        .unwrap()
        .with_format(Format::Cbor);

    let handle = tokio::spawn(PublisherLoop::new(config, channel.clone(), generator()).run(rx));

    tokio::time::sleep(Duration::from_millis(250)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    let calls = channel.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].topic, "plant/temp");
    assert_eq!(calls[0].reading.source, "simulated-temperature-sensor");
}

#[tokio::test(start_paused = true)]
async fn test_default_generator_run() {
    let channel = FakeChannel::default();
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(sensorsim::run(config_with_interval(100), channel.clone(), rx));

    tokio::time::sleep(Duration::from_millis(150)).await;
    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.success, 1);
    let reading = &channel.calls()[0].reading;
    assert!((15.0..=30.0).contains(&reading.temperature));
}

#[tokio::test]
async fn test_invalid_interval_never_starts() {
    for ms in [0, -250] {
        let overrides = Overrides {
            feed_interval_ms: Some(ms),
            ..Default::default()
        };
        let result = SimulatorRunner::new(&SimulatorConfig::default(), &overrides).await;
        assert!(
            matches!(
                result,
                Err(sensorsim::Error::Config(sensorsim::ConfigError::Invalid { .. }))
            ),
            "interval {} should be rejected",
            ms
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_runner_with_log_backend() {
    let mut file = SimulatorConfig::default();
    file.backends.insert("console".to_string(), BackendConfig::Log);
    let overrides = Overrides {
        feed_interval_ms: Some(10),
        pubsub_name: Some("console".to_string()),
        ..Default::default()
    };

    let runner = SimulatorRunner::new(&file, &overrides).await.unwrap();
    assert_eq!(runner.config().pubsub_name(), "console");
    assert_eq!(runner.config().topic(), "telemetry");

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(runner.run(rx));

    tokio::time::sleep(Duration::from_millis(55)).await;
    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.success, 5);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_runner_rejects_undeclared_backend() {
    let mut file = SimulatorConfig::default();
    file.backends.insert("console".to_string(), BackendConfig::Log);

    let result = SimulatorRunner::new(&file, &Overrides::default()).await;
    assert!(matches!(
        result,
        Err(sensorsim::Error::Config(sensorsim::ConfigError::UnknownBackend { .. }))
    ));
}
