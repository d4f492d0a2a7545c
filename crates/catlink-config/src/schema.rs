//! Schema of the `catlink:` configuration section
//!
//! ```yaml
//! catlink:
//!   phone: "13800000000"
//!   password: !secret catlink_password
//!   api_base: china
//!   scan_interval: "00:01:00"
//!   accounts:
//!     - phone: "13900000000"
//!       password: !secret second_password
//!       devices:
//!         - mac: AA:BB:CC:DD:EE:FF
//!           empty_weight: 3.0
//!   devices:
//!     - name: Living room feeder
//!       mac: "112233445566"
//!       spike_threshold: 150
//! ```

use catlink_core::{
    keys, parse_interval_value, Account, AccountKey, ApiBase, DeviceDefaults, DeviceOverride,
    Language, DEFAULT_PHONE_IAC,
};
use serde_yaml::{Mapping, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

/// One account declared in YAML; any field may be absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YamlAccount {
    pub phone: Option<String>,
    pub phone_iac: Option<String>,
    pub password: Option<String>,
    pub api_base: Option<ApiBase>,
    pub language: Option<Language>,
    pub scan_interval: Option<Duration>,
    pub device_defaults: DeviceDefaults,
    /// Overrides declared under this account only
    pub devices: Vec<DeviceOverride>,
}

impl YamlAccount {
    /// Parse one account mapping
    pub fn from_mapping(map: &Mapping) -> ConfigResult<Self> {
        let api_base = match scalar(map, keys::API_BASE) {
            Some(raw) => Some(parse_api_base(&raw)?),
            None => None,
        };

        let language = match scalar(map, keys::LANGUAGE) {
            Some(raw) => Some(
                raw.parse::<Language>()
                    .map_err(|e| ConfigError::invalid(keys::LANGUAGE, e))?,
            ),
            None => None,
        };

        let scan_interval = map
            .get(keys::SCAN_INTERVAL)
            .filter(|v| !v.is_null())
            .map(|v| {
                serde_json::to_value(v)
                    .map(|json| parse_interval_value(&json))
                    .map_err(|e| ConfigError::invalid(keys::SCAN_INTERVAL, e.to_string()))
            })
            .transpose()?;

        let device_defaults = parse_device_defaults(map)?;
        let devices = parse_device_list(map.get(keys::DEVICES));

        Ok(Self {
            phone: scalar(map, keys::PHONE),
            phone_iac: scalar(map, keys::PHONE_IAC),
            password: scalar(map, keys::PASSWORD),
            api_base,
            language,
            scan_interval,
            device_defaults,
            devices,
        })
    }

    pub fn phone_iac(&self) -> &str {
        self.phone_iac.as_deref().unwrap_or(DEFAULT_PHONE_IAC)
    }

    /// Identity, when a phone number is present
    pub fn key(&self) -> Option<AccountKey> {
        self.phone.as_ref().map(|phone| AccountKey {
            username: format!("{}-{}", self.phone_iac(), phone),
            api_base: self.api_base.clone().unwrap_or_default(),
        })
    }

    /// Label used in logs and errors
    pub fn label(&self) -> String {
        self.key()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "<no phone>".to_string())
    }

    /// Build an [`Account`]; fails when phone or password is absent
    pub fn to_account(&self) -> ConfigResult<Account> {
        let phone = self.phone.as_deref().ok_or_else(|| ConfigError::MissingField {
            account: self.label(),
            field: keys::PHONE,
        })?;
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField {
                account: self.label(),
                field: keys::PASSWORD,
            })?;

        let mut account = Account::new(phone, password)
            .with_phone_iac(self.phone_iac())
            .with_api_base(self.api_base.clone().unwrap_or_default())
            .with_language(self.language.unwrap_or_default());
        if let Some(interval) = self.scan_interval {
            account = account.with_scan_interval(interval);
        }
        account.device_defaults = self.device_defaults.clone();
        Ok(account)
    }

    /// Data handed to the import step of the config flow
    pub fn import_data(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut data = serde_json::Map::new();
        if let Some(phone) = &self.phone {
            data.insert(keys::PHONE.into(), phone.clone().into());
        }
        data.insert(keys::PHONE_IAC.into(), self.phone_iac().into());
        if let Some(password) = &self.password {
            data.insert(keys::PASSWORD.into(), password.clone().into());
        }
        if let Some(api_base) = &self.api_base {
            data.insert(keys::API_BASE.into(), api_base.as_str().into());
        }
        if let Some(language) = self.language {
            data.insert(keys::LANGUAGE.into(), language.code().into());
        }
        if let Some(interval) = self.scan_interval {
            data.insert(
                keys::SCAN_INTERVAL.into(),
                catlink_core::format_hms(interval).into(),
            );
        }
        if let Ok(serde_json::Value::Object(defaults)) =
            serde_json::to_value(&self.device_defaults)
        {
            data.extend(defaults);
        }
        data
    }
}

/// The parsed `catlink:` section
#[derive(Debug, Default)]
pub struct CatlinkYaml {
    pub accounts: Vec<YamlAccount>,
    /// Overrides applying to every account
    pub devices: Vec<DeviceOverride>,
    /// Accounts that could not be parsed; other accounts are unaffected
    pub rejected: Vec<ConfigError>,
}

impl CatlinkYaml {
    /// Extract the section from a loaded `configuration.yaml`
    pub fn from_root(root: &Value) -> ConfigResult<Self> {
        match root.get(catlink_core::DOMAIN) {
            Some(section) if !section.is_null() => Self::from_section(section),
            _ => {
                debug!("No {} section in configuration", catlink_core::DOMAIN);
                Ok(Self::default())
            }
        }
    }

    pub fn from_section(section: &Value) -> ConfigResult<Self> {
        let map = section
            .as_mapping()
            .ok_or_else(|| ConfigError::invalid(catlink_core::DOMAIN, "expected a mapping"))?;

        let mut parsed = Self {
            devices: parse_device_list(map.get(keys::DEVICES)),
            ..Default::default()
        };

        let mut candidates: Vec<&Mapping> = Vec::new();
        if let Some(list) = map.get(keys::ACCOUNTS) {
            let seq = list
                .as_sequence()
                .ok_or_else(|| ConfigError::invalid(keys::ACCOUNTS, "expected a list"))?;
            for item in seq {
                match item.as_mapping() {
                    Some(m) => candidates.push(m),
                    None => parsed
                        .rejected
                        .push(ConfigError::invalid(keys::ACCOUNTS, "entry is not a mapping")),
                }
            }
        }
        // The section itself is an account when it carries credentials inline
        if map.contains_key(keys::PHONE) || map.contains_key(keys::PASSWORD) {
            candidates.push(map);
        }

        for candidate in candidates {
            match YamlAccount::from_mapping(candidate) {
                Ok(account) => parsed.accounts.push(account),
                Err(e) => {
                    warn!("Ignoring invalid YAML account: {}", e);
                    parsed.rejected.push(e);
                }
            }
        }

        debug!(
            "Parsed {} YAML accounts and {} device overrides",
            parsed.accounts.len(),
            parsed.devices.len()
        );
        Ok(parsed)
    }

    /// Overrides for one account: section-wide ones, then the account's own
    pub fn devices_for(&self, account: &YamlAccount) -> Vec<DeviceOverride> {
        let mut merged: Vec<DeviceOverride> = Vec::new();
        for device in self.devices.iter().chain(account.devices.iter()) {
            merged.retain(|d| d.key() != device.key());
            merged.push(device.clone());
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.devices.is_empty()
    }
}

fn parse_api_base(raw: &str) -> ConfigResult<ApiBase> {
    raw.parse::<ApiBase>()
        .map_err(|e| ConfigError::invalid(keys::API_BASE, e))
}

/// Read a scalar as a string; numbers are accepted for phone-like fields
fn scalar(map: &Mapping, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number(map: &Mapping, key: &'static str) -> ConfigResult<Option<f64>> {
    let Some(raw) = scalar(map, key) else {
        return Ok(None);
    };
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| ConfigError::invalid(key, format!("'{}' is not a number", raw)))
}

fn whole(map: &Mapping, key: &'static str) -> ConfigResult<Option<u32>> {
    Ok(number(map, key)?.map(|v| v.max(0.0).round() as u32))
}

fn parse_device_defaults(map: &Mapping) -> ConfigResult<DeviceDefaults> {
    let defaults = DeviceDefaults {
        empty_weight: number(map, keys::EMPTY_WEIGHT)?,
        max_samples_litter: whole(map, keys::MAX_SAMPLES_LITTER)?,
        stable_duration: whole(map, keys::STABLE_DURATION)?,
        min_eating_amount: whole(map, keys::MIN_EATING_AMOUNT)?,
        spike_threshold: whole(map, keys::SPIKE_THRESHOLD)?,
    };
    match defaults.out_of_range() {
        Some(key) => Err(ConfigError::invalid(key, "value out of range")),
        None => Ok(defaults),
    }
}

fn parse_device(map: &Mapping) -> ConfigResult<DeviceOverride> {
    let mac = scalar(map, keys::MAC)
        .ok_or_else(|| ConfigError::invalid(keys::MAC, "device override requires a MAC"))?;
    Ok(DeviceOverride {
        name: scalar(map, keys::NAME),
        mac,
        tuning: parse_device_defaults(map)?,
    })
}

/// Parse a `devices:` list, skipping malformed entries
fn parse_device_list(value: Option<&Value>) -> Vec<DeviceOverride> {
    let Some(seq) = value.and_then(Value::as_sequence) else {
        return Vec::new();
    };
    seq.iter()
        .filter_map(|item| {
            let parsed = item
                .as_mapping()
                .ok_or_else(|| ConfigError::invalid(keys::DEVICES, "entry is not a mapping"))
                .and_then(parse_device);
            match parsed {
                Ok(device) => Some(device),
                Err(e) => {
                    warn!("Ignoring device override: {}", e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use catlink_core::Region;

    fn section(yaml: &str) -> CatlinkYaml {
        let root: Value = serde_yaml::from_str(yaml).unwrap();
        CatlinkYaml::from_root(&root).unwrap()
    }

    #[test]
    fn test_inline_and_listed_accounts() {
        let parsed = section(
            r#"
catlink:
  phone: 13800000000
  password: pw1
  scan_interval: "00:02:00"
  accounts:
    - phone: "13900000000"
      phone_iac: "1"
      password: pw2
      api_base: euroamerica
"#,
        );
        assert_eq!(parsed.accounts.len(), 2);

        let listed = parsed.accounts[0].to_account().unwrap();
        assert_eq!(listed.username(), "1-13900000000");
        assert_eq!(listed.api_base, ApiBase::from(Region::Euroamerica));

        let inline = parsed.accounts[1].to_account().unwrap();
        assert_eq!(inline.phone, "13800000000");
        assert_eq!(inline.scan_interval, Duration::from_secs(120));
        assert_eq!(inline.api_base, ApiBase::from(Region::China));
    }

    #[test]
    fn test_missing_password() {
        let parsed = section("catlink:\n  phone: '138'\n");
        let err = parsed.accounts[0].to_account().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                field: "password",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_account_does_not_reject_others() {
        let parsed = section(
            r#"
catlink:
  accounts:
    - phone: "1"
      password: a
      language: fr_FR
    - phone: "2"
      password: b
"#,
        );
        assert_eq!(parsed.accounts.len(), 1);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.accounts[0].phone.as_deref(), Some("2"));
    }

    #[test]
    fn test_devices_for_account_override_section() {
        let parsed = section(
            r#"
catlink:
  phone: "1"
  password: a
  devices:
    - mac: AA:BB:CC:DD:EE:FF
      empty_weight: 1.0
    - mac: "112233445566"
      spike_threshold: 150
    - name: no mac
  accounts:
    - phone: "2"
      password: b
      devices:
        - mac: aabbccddeeff
          empty_weight: 3.0
"#,
        );
        assert_eq!(parsed.devices.len(), 2);

        let second = &parsed.accounts[0];
        let devices = parsed.devices_for(second);
        assert_eq!(devices.len(), 2);
        let target = devices.iter().find(|d| d.matches("AABBCCDDEEFF")).unwrap();
        assert_eq!(target.tuning.empty_weight, Some(3.0));

        let inline = &parsed.accounts[1];
        let devices = parsed.devices_for(inline);
        let target = devices.iter().find(|d| d.matches("AABBCCDDEEFF")).unwrap();
        assert_eq!(target.tuning.empty_weight, Some(1.0));
    }

    #[test]
    fn test_out_of_range_device_defaults_rejected() {
        let parsed = section("catlink:\n  phone: '1'\n  password: a\n  spike_threshold: 5\n");
        assert!(parsed.accounts.is_empty());
        assert!(matches!(
            parsed.rejected[0],
            ConfigError::InvalidValue { ref key, .. } if key == "spike_threshold"
        ));
    }

    #[test]
    fn test_import_data() {
        let parsed = section(
            "catlink:\n  phone: '138'\n  password: pw\n  scan_interval: 90\n  empty_weight: 2.5\n",
        );
        let data = parsed.accounts[0].import_data();
        assert_eq!(data["phone"], "138");
        assert_eq!(data["phone_iac"], "86");
        assert_eq!(data["scan_interval"], "00:01:30");
        assert_eq!(data["empty_weight"], 2.5);
        assert!(!data.contains_key("api_base"));
    }

    #[test]
    fn test_no_section() {
        let root: Value = serde_yaml::from_str("homeassistant: {}\n").unwrap();
        assert!(CatlinkYaml::from_root(&root).unwrap().is_empty());
    }
}
