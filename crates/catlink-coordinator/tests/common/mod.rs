//! Shared helpers for coordinator tests

#![allow(dead_code)]

pub mod mock_client;

pub use mock_client::MockCloudClient;

use catlink_client::RawDevice;
use catlink_config_entries::{AccountConfig, AccountOrigin};
use catlink_core::Account;
use serde_json::{json, Value};

pub fn account_config(entry_id: &str) -> AccountConfig {
    AccountConfig {
        entry_id: Some(entry_id.to_string()),
        account: Account::new("13800000000", "secret"),
        devices: Vec::new(),
        origin: AccountOrigin::Entry,
    }
}

pub fn raw_devices(value: Value) -> Vec<RawDevice> {
    value
        .as_array()
        .expect("device list fixture must be an array")
        .iter()
        .map(|d| d.as_object().cloned().expect("device must be an object"))
        .collect()
}

/// One Scooper and one Pure2 fountain
pub fn sample_devices() -> Vec<RawDevice> {
    raw_devices(json!([
        {
            "id": "101",
            "deviceType": "SCOOPER",
            "deviceName": "Upstairs",
            "mac": "AABBCCDDEEFF",
            "detail": {"workStatus": "00", "workModel": "00", "weight": 6.5, "online": true}
        },
        {
            "id": "202",
            "deviceType": "PUREPRO",
            "mac": "112233445566",
            "detail": {"runMode": "CONTINUOUS_SPRING", "waterLevelNum": 70, "online": true}
        }
    ]))
}
