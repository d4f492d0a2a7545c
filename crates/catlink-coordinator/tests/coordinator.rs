//! Coordinator behavior against a scripted cloud client

mod common;

use std::sync::Arc;
use std::time::Duration;

use catlink_client::ClientError;
use catlink_coordinator::{Coordinator, CoordinatorError, CoordinatorEvent, PollError, PollState};
use catlink_core::ApiRequest;
use catlink_registry::{CommandError, DeviceAction};
use common::{account_config, sample_devices, MockCloudClient};
use serde_json::json;
use tokio::sync::broadcast;

fn coordinator(client: Arc<MockCloudClient>) -> Arc<Coordinator> {
    let (events, _) = broadcast::channel(64);
    Coordinator::new(account_config("entry-1"), client, events)
}

fn drain(rx: &mut broadcast::Receiver<CoordinatorEvent>) -> Vec<CoordinatorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_refresh_builds_descriptors() {
    let client = MockCloudClient::new(sample_devices());
    let coordinator = coordinator(client.clone());

    let summary = coordinator.refresh().await.unwrap();
    assert_eq!(summary.devices, 2);
    assert_eq!(summary.added, vec!["101", "202"]);
    assert_eq!(coordinator.state(), PollState::Idle);
    assert!(coordinator.is_available());

    let scooper = coordinator.device("101").await.unwrap();
    assert_eq!(scooper.name, "Upstairs");
    assert_eq!(scooper.mac, "aa:bb:cc:dd:ee:ff");
    assert_eq!(client.logins(), 1);
}

#[tokio::test]
async fn test_concurrent_refreshes_share_one_fetch() {
    let client = MockCloudClient::new(sample_devices());
    client.set_delay(Duration::from_millis(50));
    let coordinator = coordinator(client.clone());

    let (a, b) = tokio::join!(coordinator.refresh(), coordinator.refresh());
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(client.list_calls(), 1);
    assert_eq!(client.logins(), 1);

    // A later trigger starts a new cycle and reuses the session
    coordinator.refresh().await.unwrap();
    assert_eq!(client.list_calls(), 2);
    assert_eq!(client.logins(), 1);
}

#[tokio::test]
async fn test_trigger_while_fetching_is_coalesced() {
    let client = MockCloudClient::new(sample_devices());
    let gate = client.hold_fetches();
    let coordinator = coordinator(client.clone());

    let first = tokio::spawn({
        let c = coordinator.clone();
        async move { c.refresh().await }
    });
    client.wait_for_fetch(1).await;
    assert_eq!(coordinator.state(), PollState::Fetching);

    let second = tokio::spawn({
        let c = coordinator.clone();
        async move { c.refresh().await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    gate.notify_one();

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(client.list_calls(), 1);
}

#[tokio::test]
async fn test_auth_failure_then_success_restores_availability() {
    let client = MockCloudClient::new(sample_devices());
    client.push_list(Err(ClientError::Auth("token expired".into())));
    let coordinator = coordinator(client.clone());
    let mut rx = coordinator.subscribe();

    let err = coordinator.refresh().await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(coordinator.state(), PollState::Error);
    assert!(!coordinator.is_available());
    assert_eq!(coordinator.last_error(), Some(err));
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        CoordinatorEvent::AvailabilityChanged { available: false, .. }
    )));

    coordinator.refresh().await.unwrap();
    assert_eq!(coordinator.state(), PollState::Idle);
    assert!(coordinator.is_available());
    assert_eq!(coordinator.last_error(), None);
    // The expired session was dropped, so the second cycle logged in again
    assert_eq!(client.logins(), 2);
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        CoordinatorEvent::AvailabilityChanged { available: true, .. }
    )));
}

#[tokio::test]
async fn test_network_failure_keeps_descriptors() {
    let client = MockCloudClient::new(sample_devices());
    let coordinator = coordinator(client.clone());
    coordinator.refresh().await.unwrap();

    client.push_list(Err(ClientError::Network("timed out".into())));
    let err = coordinator.refresh().await.unwrap_err();
    assert!(matches!(err, PollError::Client(ClientError::Network(_))));
    assert_eq!(coordinator.devices().await.len(), 2);
    assert_eq!(client.logins(), 1);
}

#[tokio::test]
async fn test_entities_announced_once() {
    let client = MockCloudClient::new(sample_devices());
    let coordinator = coordinator(client.clone());
    let mut rx = coordinator.subscribe();

    let first = coordinator.refresh().await.unwrap();
    assert!(first.new_entities > 0);
    let second = coordinator.refresh().await.unwrap();
    assert_eq!(second.new_entities, 0);

    let events = drain(&mut rx);
    let added = events
        .iter()
        .filter(|e| matches!(e, CoordinatorEvent::EntitiesAdded { .. }))
        .count();
    let updated = events
        .iter()
        .filter(|e| matches!(e, CoordinatorEvent::DevicesUpdated { .. }))
        .count();
    assert_eq!(added, 1);
    assert_eq!(updated, 2);
}

#[tokio::test]
async fn test_command_triggers_one_refresh() {
    let client = MockCloudClient::new(sample_devices());
    let coordinator = coordinator(client.clone());
    coordinator.refresh().await.unwrap();

    coordinator
        .send_command("101", DeviceAction::SetMode("manual".into()))
        .await
        .unwrap();

    assert_eq!(client.command_count(), 1);
    assert_eq!(client.list_calls(), 2);
    let (device_id, request) = client.commands.lock().unwrap()[0].clone();
    assert_eq!(device_id, "101");
    assert_eq!(request.path, "token/device/changeMode");
    assert_eq!(request.params["workModel"], "01");
}

#[tokio::test]
async fn test_command_waits_for_cycle_in_flight() {
    let client = MockCloudClient::new(sample_devices());
    client.push_list(Ok(Vec::new()));
    let coordinator = coordinator(client.clone());
    coordinator.refresh().await.unwrap();
    assert!(coordinator.device("101").await.is_none());

    client.hold_fetches();
    let cycle = tokio::spawn({
        let c = coordinator.clone();
        async move { c.refresh().await }
    });
    client.wait_for_fetch(2).await;

    let command = tokio::spawn({
        let c = coordinator.clone();
        async move { c.send_command("101", DeviceAction::Clean).await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(client.command_count(), 0);
    assert!(!command.is_finished());

    client.release_fetches();
    assert_eq!(cycle.await.unwrap().unwrap().devices, 2);
    command.await.unwrap().unwrap();
    assert_eq!(client.command_count(), 1);
    assert_eq!(client.list_calls(), 3);
}

#[tokio::test]
async fn test_invalid_command_sends_nothing() {
    let client = MockCloudClient::new(sample_devices());
    let coordinator = coordinator(client.clone());
    coordinator.refresh().await.unwrap();

    let err = coordinator
        .send_command("202", DeviceAction::Clean)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Command(CommandError::Unsupported { .. })));

    let err = coordinator
        .send_command("999", DeviceAction::Clean)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Command(CommandError::DeviceNotFound(_))));

    assert_eq!(client.command_count(), 0);
    assert_eq!(client.list_calls(), 1);
}

#[tokio::test]
async fn test_entity_command_by_unique_id() {
    let client = MockCloudClient::new(sample_devices());
    let coordinator = coordinator(client.clone());
    coordinator.refresh().await.unwrap();

    coordinator
        .entity_command("PUREPRO_11:22:33:44:55:66-run_mode", Some(&json!("INDUCTION_SPRING")))
        .await
        .unwrap();
    let (device_id, request) = client.commands.lock().unwrap()[0].clone();
    assert_eq!(device_id, "202");
    assert_eq!(request.params["runMode"], "INDUCTION_SPRING");

    let err = coordinator.entity_command("PUREPRO_00:00:00:00:00:00-run_mode", None).await;
    assert!(matches!(err, Err(CoordinatorError::EntityNotFound(_))));
}

#[tokio::test]
async fn test_request_api_throw_flag() {
    let client = MockCloudClient::new(sample_devices());
    let coordinator = coordinator(client.clone());

    client.push_request(Err(ClientError::Network("down".into())));
    let body = coordinator
        .request_api(ApiRequest::get("token/device/info").param("deviceId", "101"), false)
        .await
        .unwrap();
    assert_eq!(body, json!({}));

    client.push_request(Err(ClientError::Network("down".into())));
    let err = coordinator
        .request_api(ApiRequest::get("token/device/info"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Client(ClientError::Network(_))));

    let body = coordinator
        .request_api(ApiRequest::get("token/device/info"), true)
        .await
        .unwrap();
    assert_eq!(body["returnCode"], 0);
    assert_eq!(client.requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_result_after_close_is_discarded() {
    let client = MockCloudClient::new(sample_devices());
    let gate = client.hold_fetches();
    let coordinator = coordinator(client.clone());
    let mut rx = coordinator.subscribe();

    let pending = tokio::spawn({
        let c = coordinator.clone();
        async move { c.refresh().await }
    });
    client.wait_for_fetch(1).await;

    coordinator.close().await;
    gate.notify_one();

    assert_eq!(pending.await.unwrap(), Err(PollError::Closed));
    assert_eq!(coordinator.state(), PollState::Idle);
    assert!(coordinator.devices().await.is_empty());
    assert!(drain(&mut rx).is_empty());
    assert_eq!(coordinator.refresh().await, Err(PollError::Closed));
}

#[tokio::test(start_paused = true)]
async fn test_timer_polls_on_interval() {
    let client = MockCloudClient::new(sample_devices());
    let coordinator = coordinator(client.clone());
    coordinator.refresh().await.unwrap();
    coordinator.start();
    assert!(coordinator.is_running());

    tokio::time::sleep(Duration::from_secs(61)).await;
    client.wait_for_fetch(2).await;

    coordinator.close().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!coordinator.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_oversized_interval_is_capped() {
    let client = MockCloudClient::new(sample_devices());
    let mut config = account_config("entry-1");
    config.account.scan_interval = Duration::MAX;
    let (events, _) = broadcast::channel(64);
    let coordinator = Coordinator::new(config, client.clone(), events);

    coordinator.start();
    tokio::time::sleep(Duration::from_secs(catlink_core::MAX_SCAN_INTERVAL_SECS + 1)).await;
    client.wait_for_fetch(1).await;
    assert!(coordinator.is_running());

    coordinator.close().await;
}
