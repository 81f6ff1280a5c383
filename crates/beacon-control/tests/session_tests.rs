use beacon_control::device::{MockLocator, SessionSettings};
use beacon_control::dmx::FRAME_LEN;
use beacon_control::{ConnectionEvent, DeviceSession, SessionState};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn fast_settings() -> SessionSettings {
    SessionSettings {
        discovery_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_frames_reach_the_bridge() {
    let locator = MockLocator::with_devices(&["EN0001"]);
    let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());

    session.universe().set_color_u8(1, 255, 10, 20).unwrap();
    session.connect("EN0001").unwrap();
    assert!(wait_for(|| locator.write_count() >= 10));

    let frame = locator.last_write().expect("no frame written");
    assert_eq!(frame.len(), FRAME_LEN);
    assert_eq!(&frame[..4], &[0x7E, 0x06, 0x01, 0x02]);
    assert_eq!(frame[4], 0, "start code");
    assert_eq!(&frame[5..8], &[255, 10, 20]);
    assert!(frame[8..517].iter().all(|&b| b == 0));
    assert_eq!(frame[517], 0xE7);

    session.disconnect().unwrap();
}

#[test]
fn test_universe_changes_show_up_in_later_frames() {
    let locator = MockLocator::with_devices(&["EN0001"]);
    let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());

    session.connect("EN0001").unwrap();
    assert!(wait_for(|| locator.write_count() > 0));

    session.universe().set_channel(512, 99).unwrap();
    assert!(wait_for(|| {
        locator
            .last_write()
            .map(|frame| frame[4 + 512] == 99)
            .unwrap_or(false)
    }));

    session.disconnect().unwrap();
}

#[test]
fn test_no_frames_while_searching() {
    let locator = MockLocator::new();
    let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());

    session.connect("EN0001").unwrap();
    assert!(wait_for(|| locator.enumerations() >= 5));

    assert_eq!(session.state(), SessionState::Searching);
    assert!(!session.is_connected());
    assert_eq!(locator.write_count(), 0);
    assert_eq!(locator.opens(), 0);

    session.disconnect().unwrap();
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn test_discovery_polls_at_its_interval() {
    let locator = MockLocator::new();
    let session = DeviceSession::new(Arc::new(locator.clone()), SessionSettings::default());

    session.connect("EN0001").unwrap();
    std::thread::sleep(Duration::from_millis(550));
    session.disconnect().unwrap();

    // One attempt right away, then one every 100ms
    let attempts = locator.enumerations();
    assert!((3..=8).contains(&attempts), "{} attempts", attempts);
}

#[test]
fn test_enumeration_failures_are_retried() {
    let locator = MockLocator::with_devices(&["EN0001"]);
    locator.set_fail_enumeration(true);
    let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());

    session.connect("EN0001").unwrap();
    assert!(wait_for(|| locator.enumerations() >= 3));
    assert_eq!(session.state(), SessionState::Searching);

    locator.set_fail_enumeration(false);
    assert!(wait_for(|| session.is_connected()));
    session.disconnect().unwrap();
}

#[test]
fn test_open_failures_are_retried() {
    let locator = MockLocator::with_devices(&["EN0001"]);
    locator.set_fail_open(true);
    let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());

    session.connect("EN0001").unwrap();
    assert!(wait_for(|| locator.enumerations() >= 3));
    assert!(!session.is_connected());

    locator.set_fail_open(false);
    assert!(wait_for(|| session.is_connected()));
    assert_eq!(locator.opens(), 1);
    session.disconnect().unwrap();
}

#[test]
fn test_write_failure_reconnects() {
    let locator = MockLocator::with_devices(&["EN0001"]);
    let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());
    let events = session.subscribe();

    session.connect("EN0001").unwrap();
    assert_eq!(
        events.recv_timeout(Duration::from_secs(5)).unwrap(),
        ConnectionEvent::Connected("EN0001".to_string())
    );

    locator.fail_next_writes(1);
    assert_eq!(
        events.recv_timeout(Duration::from_secs(5)).unwrap(),
        ConnectionEvent::Disconnected("EN0001".to_string())
    );
    assert_eq!(
        events.recv_timeout(Duration::from_secs(5)).unwrap(),
        ConnectionEvent::Connected("EN0001".to_string())
    );

    assert!(session.is_connected());
    assert_eq!(locator.opens(), 2);
    assert_eq!(locator.open_links(), 1);
    session.disconnect().unwrap();
}

#[test]
fn test_unplug_and_replug() {
    let locator = MockLocator::with_devices(&["EN0001"]);
    let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());

    session.connect("EN0001").unwrap();
    assert!(wait_for(|| session.is_connected()));

    locator.unplug("EN0001");
    assert!(wait_for(|| session.state() == SessionState::Searching));
    assert_eq!(locator.open_links(), 0);

    let writes = locator.write_count();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(locator.write_count(), writes);

    locator.plug("EN0001");
    assert!(wait_for(|| session.is_connected()));
    assert!(wait_for(|| locator.write_count() > writes));
    session.disconnect().unwrap();
}

#[test]
fn test_other_bridges_are_ignored() {
    let locator = MockLocator::with_devices(&["EN0002"]);
    let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());

    session.connect("EN0001").unwrap();
    assert!(wait_for(|| locator.enumerations() >= 3));
    assert_eq!(locator.opens(), 0);

    locator.plug("EN0001");
    assert!(wait_for(|| session.is_connected()));
    session.disconnect().unwrap();
}

#[test]
fn test_observers_see_every_edge() {
    let locator = MockLocator::with_devices(&["EN0001"]);
    let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    session.on_event(move |event| sink.lock().push(event.clone()));

    session.connect("EN0001").unwrap();
    assert!(wait_for(|| session.is_connected()));
    session.disconnect().unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            ConnectionEvent::Connected("EN0001".to_string()),
            ConnectionEvent::Disconnected("EN0001".to_string()),
        ]
    );
}

#[test]
fn test_reconnect_to_another_bridge() {
    let locator = MockLocator::with_devices(&["EN0001", "EN0002"]);
    let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());

    session.connect("EN0001").unwrap();
    assert!(wait_for(|| session.is_connected()));

    session.connect("EN0002").unwrap();
    assert_eq!(session.serial_number().as_deref(), Some("EN0002"));
    assert!(wait_for(|| session.is_connected()));
    assert_eq!(locator.open_links(), 1);

    session.disconnect().unwrap();
    assert_eq!(locator.open_links(), 0);
}

#[test]
fn test_drop_closes_the_handle() {
    let locator = MockLocator::with_devices(&["EN0001"]);
    {
        let session = DeviceSession::new(Arc::new(locator.clone()), fast_settings());
        session.connect("EN0001").unwrap();
        assert!(wait_for(|| session.is_connected()));
    }
    assert_eq!(locator.open_links(), 0);
}
