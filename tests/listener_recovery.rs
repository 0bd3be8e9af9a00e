mod common;

use common::RecordingConfigurator;
use credbridge::errors::SerialError;
use credbridge::listener::{CredentialListener, ListenerState, ListenerTiming};
use credbridge::serial::mock::{MockConnector, MockLink};
use credbridge::serial::{RetryPolicy, SerialSession, SerialSettings};
use credbridge::shutdown;
use std::io::ErrorKind;
use std::time::{Duration, Instant};

fn timing(reconnect: Duration) -> ListenerTiming {
    ListenerTiming {
        poll_interval: Duration::ZERO,
        reconnect_delay: reconnect,
    }
}

#[tokio::test]
async fn becomes_active_after_repeated_open_failures() {
    let connector = MockConnector::new().fail_times(5).then_link(MockLink::new());
    let stats = connector.stats();
    let session = SerialSession::new(
        SerialSettings::default(),
        RetryPolicy::unbounded(Duration::ZERO),
        connector,
    );
    let mut listener = CredentialListener::new(
        session,
        RecordingConfigurator::new(),
        timing(Duration::ZERO),
    );
    let (_trigger, mut sd) = shutdown::channel();

    assert_eq!(listener.state(), ListenerState::NoSession);
    listener.step(&mut sd).await.unwrap();
    assert_eq!(listener.state(), ListenerState::Active);
    assert_eq!(stats.failures(), 5);
    assert_eq!(stats.connects(), 6);
    assert_eq!(listener.session().open_attempts(), 6);
}

#[tokio::test]
async fn open_waits_backoff_between_attempts() {
    let backoff = Duration::from_millis(15);
    let connector = MockConnector::new().fail_times(3).then_link(MockLink::new());
    let mut session = SerialSession::new(
        SerialSettings::default(),
        RetryPolicy::unbounded(backoff),
        connector,
    );
    let (_trigger, mut sd) = shutdown::channel();
    let start = Instant::now();
    session.open(&mut sd).await.unwrap();
    assert!(start.elapsed() >= backoff * 3);
    assert!(session.is_open());
}

#[tokio::test]
async fn io_error_tears_down_and_reopens() {
    let (trigger, mut sd) = shutdown::channel();
    let first = MockLink::new()
        .line("Provisioned Credentials: SSID: First, Password: one")
        .io_error(ErrorKind::BrokenPipe);
    let second = MockLink::new()
        .line("Provisioned Credentials: SSID: Second, Password: two")
        .shutdown_when_drained(trigger);
    let connector = MockConnector::new()
        .fail_times(1)
        .then_link(first)
        .fail_times(2)
        .then_link(second);
    let stats = connector.stats();
    let session = SerialSession::new(
        SerialSettings::default(),
        RetryPolicy::unbounded(Duration::ZERO),
        connector,
    );
    let cfg = RecordingConfigurator::new();
    let mut listener = CredentialListener::new(session, cfg.clone(), timing(Duration::ZERO));

    let result = tokio::time::timeout(Duration::from_secs(5), listener.run(&mut sd))
        .await
        .expect("listener did not stop")
        .expect("listener failed");

    assert_eq!(result.session_losses, 1);
    assert_eq!(result.applied, 2);
    assert_eq!(
        cfg.calls(),
        vec![
            ("First".to_string(), "one".to_string()),
            ("Second".to_string(), "two".to_string()),
        ]
    );
    assert_eq!(listener.session().opens(), 2);
    assert_eq!(stats.connects(), 5);
    // Both links released: the broken one on error, the second on shutdown.
    assert_eq!(stats.links_dropped(), 2);
    assert_eq!(listener.state(), ListenerState::Shutdown);
}

#[tokio::test]
async fn waits_reconnect_delay_after_losing_device() {
    let reconnect = Duration::from_millis(30);
    let (trigger, mut sd) = shutdown::channel();
    let connector = MockConnector::new()
        .then_link(MockLink::new().io_error(ErrorKind::BrokenPipe))
        .then_link(MockLink::new().shutdown_when_drained(trigger));
    let stats = connector.stats();
    let session = SerialSession::new(
        SerialSettings::default(),
        RetryPolicy::unbounded(Duration::ZERO),
        connector,
    );
    let mut listener =
        CredentialListener::new(session, RecordingConfigurator::new(), timing(reconnect));

    let start = Instant::now();
    let result = tokio::time::timeout(Duration::from_secs(5), listener.run(&mut sd))
        .await
        .expect("listener did not stop")
        .expect("listener failed");

    // Open retries have no backoff here, so the only wait is the post-loss delay.
    assert!(start.elapsed() >= reconnect);
    assert_eq!(result.session_losses, 1);
    assert_eq!(stats.connects(), 2);
    assert_eq!(listener.session().opens(), 2);
}

#[tokio::test]
async fn bounded_retry_surfaces_error() {
    let session = SerialSession::new(
        SerialSettings::default(),
        RetryPolicy::bounded(Duration::ZERO, 4),
        MockConnector::new(),
    );
    let mut listener = CredentialListener::new(
        session,
        RecordingConfigurator::new(),
        timing(Duration::ZERO),
    );
    let (_trigger, mut sd) = shutdown::channel();
    match listener.run(&mut sd).await {
        Err(SerialError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 4),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(listener.state(), ListenerState::Shutdown);
}

#[tokio::test]
async fn shutdown_while_device_absent() {
    let (trigger, mut sd) = shutdown::channel();
    let session = SerialSession::new(
        SerialSettings::default(),
        RetryPolicy::unbounded(Duration::from_secs(60)),
        MockConnector::new(),
    );
    let mut listener = CredentialListener::new(
        session,
        RecordingConfigurator::new(),
        timing(Duration::from_secs(60)),
    );
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.trigger();
    });
    let stats = tokio::time::timeout(Duration::from_secs(5), listener.run(&mut sd))
        .await
        .expect("shutdown not honoured")
        .expect("listener failed");
    assert_eq!(stats.lines_received, 0);
    assert_eq!(listener.state(), ListenerState::Shutdown);
    assert!(!listener.session().is_open());
}
