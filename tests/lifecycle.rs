//! Connection lifecycle against a mock bridge.

mod common;

use std::time::Duration;

use bridge_client::{ClientEvent, ConnectionState, Error, Role};
use common::{
    MockBridge, ProbeReply, Script, UploadReply, closed_port, drain, fast_policy, spawn_client,
    wait_for_state,
};

#[tokio::test]
async fn test_probe_success_reaches_ready() {
    let bridge = MockBridge::start().await;
    let (client, mut events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;

    let device = client.device_status();
    assert!(device.reachable);
    assert_eq!(device.port.as_deref(), Some("COM3"));

    let events = drain(&mut events);
    assert_eq!(
        events.first(),
        Some(&ClientEvent::ConnectionStatusChanged {
            text: "Connecting to device...".into(),
            is_error: false
        })
    );
    assert!(events.contains(&ClientEvent::DeviceIndicatorChanged {
        connected: true,
        label: "Connected (COM3)".into()
    }));
    assert!(events.contains(&ClientEvent::ConnectionStatusChanged {
        text: "Connected (COM3)".into(),
        is_error: false
    }));
}

#[tokio::test]
async fn test_device_unreachable_rejects_and_retries() {
    let bridge = MockBridge::with_script(Script {
        probe: ProbeReply::Unreachable(Some("No device".into())),
        upload: UploadReply::Success,
    })
    .await;
    let (client, mut events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    let err = client.check_connection().await.unwrap_err();
    assert!(matches!(err, Error::DeviceUnreachable { .. }));
    assert_eq!(err.reason(), "No device");
    assert_eq!(client.state(), ConnectionState::Failed);
    assert_eq!(client.device_status().label(), "No device");

    // Retried after the reconnect delay without any further call
    bridge.wait_for_connections(2).await;

    let events = drain(&mut events);
    assert!(events.contains(&ClientEvent::ConnectionStatusChanged {
        text: "No device".into(),
        is_error: true
    }));
    assert!(events.contains(&ClientEvent::DeviceIndicatorChanged {
        connected: false,
        label: "No device".into()
    }));
}

#[tokio::test]
async fn test_missing_reason_defaults_to_device_not_found() {
    let bridge = MockBridge::with_script(Script {
        probe: ProbeReply::Unreachable(None),
        upload: UploadReply::Success,
    })
    .await;
    let (client, _events) = spawn_client(&bridge.url(), Role::Receive, fast_policy());

    let err = client.check_connection().await.unwrap_err();
    assert_eq!(err.reason(), "Device not found");
}

#[tokio::test]
async fn test_probe_timeout_is_distinct_from_unreachable() {
    let bridge = MockBridge::with_script(Script {
        probe: ProbeReply::Silent,
        upload: UploadReply::Success,
    })
    .await;
    let (client, mut events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    let err = client.check_connection().await.unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(err, Error::Timeout { .. }));
    assert_eq!(err.reason(), "timeout");
    assert_eq!(client.state(), ConnectionState::Failed);

    assert!(drain(&mut events).contains(&ClientEvent::ConnectionStatusChanged {
        text: "Device check timed out".into(),
        is_error: true
    }));
}

#[tokio::test]
async fn test_remote_close_while_ready_reconnects() {
    let bridge = MockBridge::start().await;
    let (client, mut events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;
    drain(&mut events);

    bridge.drop_connections();
    wait_for_state(&client, ConnectionState::Closed).await;

    // Back to Ready on a fresh session, no operator action
    bridge.wait_for_connections(2).await;
    wait_for_state(&client, ConnectionState::Ready).await;
    assert!(client.status().generation.as_u64() >= 2);

    let events = drain(&mut events);
    assert!(events.contains(&ClientEvent::ConnectionStatusChanged {
        text: "Connection lost".into(),
        is_error: true
    }));
    assert!(events.contains(&ClientEvent::DeviceIndicatorChanged {
        connected: false,
        label: "Connection lost".into()
    }));
}

#[tokio::test]
async fn test_no_bridge_fails_with_transport_error() {
    let port = closed_port().await;
    let (client, mut events) = spawn_client(
        &format!("ws://127.0.0.1:{port}"),
        Role::Transmit,
        fast_policy(),
    );

    let err = client.check_connection().await.unwrap_err();
    assert!(err.is_connection_error());
    assert!(client.state().is_awaiting_retry() || client.state().is_attempting());

    assert!(drain(&mut events).contains(&ClientEvent::DeviceIndicatorChanged {
        connected: false,
        label: "Connection failed".into()
    }));

    client.shutdown().await;
}

#[tokio::test]
async fn test_liveness_probes_while_ready() {
    let bridge = MockBridge::start().await;
    let policy = fast_policy().with_probe_interval(Duration::from_millis(100));
    let (client, _events) = spawn_client(&bridge.url(), Role::Transmit, policy);

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(bridge.probes() >= 3, "probes: {}", bridge.probes());
    assert_eq!(client.state(), ConnectionState::Ready);
    assert_eq!(bridge.connections(), 1);
}

#[tokio::test]
async fn test_device_lost_during_liveness_check() {
    let bridge = MockBridge::start().await;
    let policy = fast_policy().with_probe_interval(Duration::from_millis(100));
    let (client, mut events) = spawn_client(&bridge.url(), Role::Transmit, policy);

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;
    drain(&mut events);

    bridge.set_probe(ProbeReply::Unreachable(Some("Serial port closed".into())));
    wait_for_state(&client, ConnectionState::Closed).await;

    assert!(!client.device_status().reachable);
    assert!(drain(&mut events).contains(&ClientEvent::DeviceIndicatorChanged {
        connected: false,
        label: "Serial port closed".into()
    }));

    // Device comes back; the retry reaches Ready again
    bridge.set_probe(ProbeReply::Connected(None));
    wait_for_state(&client, ConnectionState::Ready).await;
    assert_eq!(client.device_status().label(), "Connected");
}

#[tokio::test]
async fn test_connect_when_ready_reprobes() {
    let bridge = MockBridge::start().await;
    let (client, _events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;
    let probes = bridge.probes();

    client.connect().expect("connect");
    let device = client.check_connection().await.expect("probe");

    assert!(device.reachable);
    assert!(bridge.probes() > probes);
    assert_eq!(bridge.connections(), 1);
}

#[tokio::test]
async fn test_concurrent_checks_share_one_probe() {
    let bridge = MockBridge::start().await;
    let (client, _events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;
    let before = bridge.probes();

    let (a, b) = tokio::join!(client.check_connection(), client.check_connection());
    assert_eq!(a.expect("first"), b.expect("second"));
    assert_eq!(bridge.probes(), before + 1);
}

#[tokio::test]
async fn test_shutdown_is_terminal() {
    let bridge = MockBridge::start().await;
    let (client, mut events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;

    client.shutdown().await;
    assert_eq!(client.state(), ConnectionState::Idle);
    assert!(client.is_shutdown());
    assert!(matches!(client.check_connection().await, Err(Error::Shutdown)));

    // No reconnect after teardown
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(bridge.connections(), 1);

    let events = drain(&mut events);
    assert_eq!(
        events.last(),
        Some(&ClientEvent::DeviceIndicatorChanged {
            connected: false,
            label: "Disconnected".into()
        })
    );
}

#[tokio::test]
async fn test_dropping_last_handle_tears_down() {
    let bridge = MockBridge::start().await;
    let (client, mut events) = spawn_client(&bridge.url(), Role::Receive, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;
    drain(&mut events);

    let mut status = client.watch_status();
    drop(client);

    tokio::time::timeout(common::WAIT, status.wait_for(|s| s.state == ConnectionState::Idle))
        .await
        .expect("teardown")
        .ok();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut events).contains(&ClientEvent::ConnectionStatusChanged {
        text: "Disconnected".into(),
        is_error: false
    }));
}
