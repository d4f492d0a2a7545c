//! Reading accounts and device overrides back out of config entries

use std::collections::HashMap;
use std::time::Duration;

use catlink_config::{ConfigError, ConfigResult};
use catlink_core::{
    keys, parse_interval_value, Account, ApiBase, DeviceDefaults, DeviceOverride, Language,
    DEFAULT_PHONE_IAC, DEFAULT_SCAN_INTERVAL_SECS,
};
use serde_json::Value;

use crate::entry::ConfigEntry;

/// Build the account of an entry from `data` overlaid with `options`
pub fn account_from_entry(entry: &ConfigEntry) -> ConfigResult<Account> {
    account_from_map(&entry.merged(), &entry.title)
}

/// UI per-device overrides stored in the entry options
pub fn device_overrides_from_entry(entry: &ConfigEntry) -> ConfigResult<Vec<DeviceOverride>> {
    match entry.options.get(keys::DEVICES) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::invalid(keys::DEVICES, e.to_string())),
    }
}

pub(crate) fn account_from_map(map: &HashMap<String, Value>, label: &str) -> ConfigResult<Account> {
    let phone = json_string(map.get(keys::PHONE)).ok_or_else(|| ConfigError::MissingField {
        account: label.to_string(),
        field: keys::PHONE,
    })?;
    let password =
        json_string(map.get(keys::PASSWORD)).ok_or_else(|| ConfigError::MissingField {
            account: label.to_string(),
            field: keys::PASSWORD,
        })?;

    let phone_iac =
        json_string(map.get(keys::PHONE_IAC)).unwrap_or_else(|| DEFAULT_PHONE_IAC.to_string());

    let api_base = match json_string(map.get(keys::API_BASE)) {
        Some(raw) => raw
            .parse::<ApiBase>()
            .map_err(|e| ConfigError::invalid(keys::API_BASE, e))?,
        None => ApiBase::default(),
    };

    let language = match json_string(map.get(keys::LANGUAGE)) {
        Some(raw) => raw
            .parse::<Language>()
            .map_err(|e| ConfigError::invalid(keys::LANGUAGE, e))?,
        None => Language::default(),
    };

    let scan_interval = map
        .get(keys::SCAN_INTERVAL)
        .filter(|v| !v.is_null())
        .map(parse_interval_value)
        .unwrap_or(Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS));

    let mut account = Account::new(phone, password)
        .with_phone_iac(phone_iac)
        .with_api_base(api_base)
        .with_language(language)
        .with_scan_interval(scan_interval);
    account.device_defaults = device_defaults_from_map(map)?;
    Ok(account)
}

/// Account-level tuning stored at the top level of entry data
pub(crate) fn device_defaults_from_map(map: &HashMap<String, Value>) -> ConfigResult<DeviceDefaults> {
    let defaults = DeviceDefaults {
        empty_weight: json_f64(map, keys::EMPTY_WEIGHT)?,
        max_samples_litter: json_u32(map, keys::MAX_SAMPLES_LITTER)?,
        stable_duration: json_u32(map, keys::STABLE_DURATION)?,
        min_eating_amount: json_u32(map, keys::MIN_EATING_AMOUNT)?,
        spike_threshold: json_u32(map, keys::SPIKE_THRESHOLD)?,
    };
    match defaults.out_of_range() {
        Some(key) => Err(ConfigError::invalid(key, "value out of range")),
        None => Ok(defaults),
    }
}

/// Strings and numbers as a trimmed, non-empty string
pub(crate) fn json_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_f64(map: &HashMap<String, Value>, key: &'static str) -> ConfigResult<Option<f64>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, format!("'{}' is not a number", s))),
        Some(other) => Err(ConfigError::invalid(key, format!("{} is not a number", other))),
    }
}

pub(crate) fn json_u32(map: &HashMap<String, Value>, key: &'static str) -> ConfigResult<Option<u32>> {
    Ok(json_f64(map, key)?.map(|v| v.max(0.0).round() as u32))
}
