//! Uploads, raw envelopes and notifications against a mock bridge.

mod common;

use std::time::Duration;

use anyhow::Result;
use bridge_client::{ClientEvent, ConnectionState, Error, FileUpload, RequestKind, Role};
use common::{MockBridge, UploadReply, drain, fast_policy, spawn_client, wait_for_state};
use serde_json::json;

fn transfers(events: &[ClientEvent]) -> Vec<&ClientEvent> {
    events
        .iter()
        .filter(|e| matches!(e, ClientEvent::TransferCompleted { .. }))
        .collect()
}

#[tokio::test]
async fn test_upload_success_completes_once() -> Result<()> {
    let bridge = MockBridge::start().await;
    let (client, mut events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;
    drain(&mut events);

    let payload = vec![0xA5_u8; 1024];
    let receipt = client.upload_file("test.bin", 1024, &payload).await?;

    assert_eq!(receipt.filename, "test.bin");
    assert_eq!(receipt.size, 1024);

    let received = bridge.uploads();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].filename, "test.bin");
    assert_eq!(received[0].payload, payload);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = drain(&mut events);
    assert_eq!(
        transfers(&events),
        vec![&ClientEvent::TransferCompleted {
            ok: true,
            detail: "File sent to device".into()
        }]
    );
    assert!(events.contains(&ClientEvent::ConnectionStatusChanged {
        text: "File sent to device".into(),
        is_error: false
    }));
    Ok(())
}

#[tokio::test]
async fn test_upload_from_disk() -> Result<()> {
    let bridge = MockBridge::start().await;
    let (client, _events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("firmware.hex");
    tokio::fs::write(&path, b":00000001FF\n").await?;

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;

    let receipt = client.upload(FileUpload::read(&path).await?).await?;
    assert_eq!(receipt.filename, "firmware.hex");
    assert_eq!(receipt.size, 12);
    assert_eq!(bridge.uploads()[0].payload, b":00000001FF\n");
    Ok(())
}

#[tokio::test]
async fn test_upload_rejected_by_bridge() {
    let bridge = MockBridge::start().await;
    bridge.set_upload(UploadReply::Error("Disk full".into()));
    let (client, mut events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;
    drain(&mut events);

    let err = client.upload_file("test.bin", 3, b"abc").await.unwrap_err();
    assert!(matches!(err, Error::TransferRejected { .. }));
    assert_eq!(err.reason(), "Disk full");
    assert!(!err.is_recoverable());

    // Not retried, session stays up
    assert_eq!(client.state(), ConnectionState::Ready);
    assert_eq!(bridge.uploads().len(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = drain(&mut events);
    assert_eq!(
        transfers(&events),
        vec![&ClientEvent::TransferCompleted {
            ok: false,
            detail: "Disk full".into()
        }]
    );
}

#[tokio::test]
async fn test_upload_timeout() {
    let bridge = MockBridge::start().await;
    bridge.set_upload(UploadReply::Silent);
    let (client, mut events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;
    drain(&mut events);

    let err = client.upload_file("slow.bin", 1, &[1]).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));

    let events = drain(&mut events);
    assert_eq!(transfers(&events).len(), 1);
}

#[tokio::test]
async fn test_second_application_request_is_rejected() {
    let bridge = MockBridge::start().await;
    bridge.set_upload(UploadReply::Silent);
    let (client, _events) = spawn_client(&bridge.url(), Role::Transmit, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;

    let led = json!({"type": "led", "on": true});
    let (first, second) = tokio::join!(
        client.upload_file("a.bin", 1, &[1]),
        client.send_raw(&led)
    );

    assert!(matches!(first, Err(Error::Timeout { .. })));
    assert!(matches!(
        second,
        Err(Error::RequestInFlight {
            kind: RequestKind::Upload
        })
    ));
}

#[tokio::test]
async fn test_send_raw_resolves_on_ack() -> Result<()> {
    let bridge = MockBridge::start().await;
    let (client, _events) = spawn_client(&bridge.url(), Role::Receive, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;

    let message = json!({"type": "led", "on": true});
    let len = client.send_raw(&message).await?;
    assert_eq!(len, Some(message.to_string().len() as u64));
    Ok(())
}

#[tokio::test]
async fn test_session_loss_cancels_pending_upload() {
    let bridge = MockBridge::start().await;
    bridge.set_upload(UploadReply::Silent);
    let policy = fast_policy().with_request_timeout(Duration::from_secs(10));
    let (client, mut events) = spawn_client(&bridge.url(), Role::Transmit, policy);

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;
    drain(&mut events);

    let uploader = {
        let client = client.clone();
        tokio::spawn(async move { client.upload_file("big.bin", 1, &[7]).await })
    };

    tokio::time::timeout(common::WAIT, async {
        while bridge.uploads().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("upload reached bridge");

    bridge.drop_connections();

    let result = uploader.await.expect("join");
    assert!(matches!(result, Err(Error::Cancelled)));

    let events = drain(&mut events);
    assert_eq!(
        transfers(&events),
        vec![&ClientEvent::TransferCompleted {
            ok: false,
            detail: "Transfer cancelled".into()
        }]
    );
}

#[tokio::test]
async fn test_unsolicited_frames_become_notifications() {
    let bridge = MockBridge::start().await;
    let (client, mut events) = spawn_client(&bridge.url(), Role::Receive, fast_policy());

    client.connect().expect("connect");
    wait_for_state(&client, ConnectionState::Ready).await;
    drain(&mut events);

    bridge.push(r#"{"type":"data_received","data":"AQID"}"#);
    bridge.push("this is not json");
    bridge.push(r#"{"type":"firmware_version","version":"1.2"}"#);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let events = drain(&mut events);
    assert_eq!(
        events,
        vec![
            ClientEvent::Notification {
                text: "New data received".into()
            },
            ClientEvent::Notification {
                text: "Unhandled message: firmware_version".into()
            },
        ]
    );

    // Malformed frames never disturb the session
    assert_eq!(client.state(), ConnectionState::Ready);
    assert!(client.check_connection().await.is_ok());
}
