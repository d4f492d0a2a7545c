//! Config Store: one de-duplicated account list from YAML and config entries
//!
//! A config entry for the same `(username, api_base)` as a YAML account wins
//! on credentials and interval. YAML device overrides survive the merge
//! unless the entry carries its own override for the same MAC.

use std::collections::HashSet;
use std::sync::Arc;

use catlink_config::{CatlinkYaml, ConfigError, ConfigResult, YamlAccount};
use catlink_core::{keys, Account, AccountKey, DeviceOverride};
use tracing::{debug, info, warn};

use crate::account::{account_from_entry, device_overrides_from_entry};
use crate::entry::{ConfigEntry, ConfigEntryUpdate};
use crate::flow::{ConfigFlow, CredentialValidator, FlowResult};
use crate::manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult};

/// Where a merged account came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOrigin {
    /// Config entry only
    Entry,
    /// Config entry with a matching YAML account
    EntryWithYaml,
    /// YAML only (import failed or was skipped)
    Yaml,
}

/// One account ready for a coordinator
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Backing config entry, absent for YAML-only accounts
    pub entry_id: Option<String>,
    pub account: Account,
    pub devices: Vec<DeviceOverride>,
    pub origin: AccountOrigin,
}

impl AccountConfig {
    /// Entry id, or a synthetic `yaml:` id for YAML-only accounts
    pub fn id(&self) -> String {
        match &self.entry_id {
            Some(entry_id) => entry_id.clone(),
            None => format!("yaml:{}", self.account.unique_id()),
        }
    }

    /// Override for one device, by MAC in any notation
    pub fn device_override(&self, mac: &str) -> Option<&DeviceOverride> {
        self.devices.iter().find(|d| d.matches(mac))
    }
}

/// Result of [`ConfigStore::merge`]
#[derive(Debug, Default)]
pub struct MergeReport {
    pub accounts: Vec<AccountConfig>,
    /// Accounts that could not be built; the others are unaffected
    pub errors: Vec<ConfigError>,
}

pub struct ConfigStore {
    entries: Arc<ConfigEntries>,
    validator: Arc<dyn CredentialValidator>,
}

impl ConfigStore {
    pub fn new(entries: Arc<ConfigEntries>, validator: Arc<dyn CredentialValidator>) -> Self {
        Self { entries, validator }
    }

    pub fn entries(&self) -> &Arc<ConfigEntries> {
        &self.entries
    }

    /// Import every YAML account through the config flow
    ///
    /// Accounts that already have an entry abort with `already_configured`,
    /// so restarts never create duplicates.
    pub async fn import_yaml(&self, yaml: &CatlinkYaml) -> ConfigEntriesResult<Vec<FlowResult>> {
        let mut results = Vec::with_capacity(yaml.accounts.len());
        for account in &yaml.accounts {
            let mut flow = ConfigFlow::new(self.entries.clone(), self.validator.clone());
            let result = flow.step_import(account.import_data()).await?;
            if let FlowResult::Abort(reason) = &result {
                debug!("YAML import of {} aborted: {}", account.label(), reason.as_str());
            }
            results.push(result);
        }
        Ok(results)
    }

    /// Merge config entries with the YAML section
    pub fn merge(&self, yaml: &CatlinkYaml) -> MergeReport {
        let mut report = MergeReport::default();
        let mut seen: HashSet<AccountKey> = HashSet::new();

        for entry in self.entries.entries() {
            match merge_entry(&entry, yaml) {
                Ok(config) => {
                    if seen.insert(config.account.key()) {
                        report.accounts.push(config);
                    } else {
                        warn!(
                            "Skipping duplicate config entry {} for {}",
                            entry.entry_id,
                            config.account.key()
                        );
                    }
                }
                Err(e) => {
                    warn!("Config entry {} is invalid: {}", entry.title, e);
                    report.errors.push(e);
                }
            }
        }

        for yaml_account in &yaml.accounts {
            if yaml_account.key().is_some_and(|key| seen.contains(&key)) {
                continue;
            }
            match yaml_account.to_account() {
                Ok(account) => {
                    if !seen.insert(account.key()) {
                        continue;
                    }
                    debug!("Using YAML-only account {}", account.key());
                    report.accounts.push(AccountConfig {
                        entry_id: None,
                        account,
                        devices: yaml.devices_for(yaml_account),
                        origin: AccountOrigin::Yaml,
                    });
                }
                Err(e) => {
                    warn!("YAML account {} is incomplete: {}", yaml_account.label(), e);
                    report.errors.push(e);
                }
            }
        }

        info!(
            "Merged {} accounts ({} rejected)",
            report.accounts.len(),
            report.errors.len()
        );
        report
    }

    /// Merged configuration of one entry
    pub fn resolve_entry(
        &self,
        entry_id: &str,
        yaml: &CatlinkYaml,
    ) -> ConfigEntriesResult<AccountConfig> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        Ok(merge_entry(&entry, yaml)?)
    }

    /// Store a UI override for one device, replacing any for the same MAC
    pub async fn set_device_override(
        &self,
        entry_id: &str,
        device: DeviceOverride,
    ) -> ConfigEntriesResult<ConfigEntry> {
        if device.mac.trim().is_empty() {
            return Err(ConfigError::invalid(keys::MAC, "must not be empty").into());
        }
        if let Some(key) = device.tuning.out_of_range() {
            return Err(ConfigError::invalid(key, "value out of range").into());
        }

        self.update_device_overrides(entry_id, |devices| {
            devices.retain(|d| d.key() != device.key());
            devices.push(device);
        })
        .await
    }

    /// Drop the UI override for one device
    pub async fn remove_device_override(
        &self,
        entry_id: &str,
        mac: &str,
    ) -> ConfigEntriesResult<ConfigEntry> {
        self.update_device_overrides(entry_id, |devices| devices.retain(|d| !d.matches(mac)))
            .await
    }

    async fn update_device_overrides(
        &self,
        entry_id: &str,
        edit: impl FnOnce(&mut Vec<DeviceOverride>),
    ) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        let mut devices = device_overrides_from_entry(&entry)?;
        edit(&mut devices);

        let value = serde_json::to_value(&devices)
            .map_err(|e| ConfigError::invalid(keys::DEVICES, e.to_string()))?;
        let mut options = entry.options.clone();
        if devices.is_empty() {
            options.remove(keys::DEVICES);
        } else {
            options.insert(keys::DEVICES.to_string(), value);
        }

        self.entries
            .update(entry_id, ConfigEntryUpdate::new().options(options))
            .await
    }
}

fn merge_entry(entry: &ConfigEntry, yaml: &CatlinkYaml) -> ConfigResult<AccountConfig> {
    let mut account = account_from_entry(entry)?;
    let key = account.key();
    let matched: Option<&YamlAccount> = yaml
        .accounts
        .iter()
        .find(|a| a.key().as_ref() == Some(&key));

    let yaml_devices = match matched {
        Some(yaml_account) => {
            account.device_defaults = account.device_defaults.or(&yaml_account.device_defaults);
            yaml.devices_for(yaml_account)
        }
        None => yaml.devices.clone(),
    };

    let ui_devices = device_overrides_from_entry(entry)?;
    let mut devices: Vec<DeviceOverride> = yaml_devices
        .into_iter()
        .filter(|d| !ui_devices.iter().any(|ui| ui.key() == d.key()))
        .collect();
    devices.extend(ui_devices);

    Ok(AccountConfig {
        entry_id: Some(entry.entry_id.clone()),
        account,
        devices,
        origin: if matched.is_some() {
            AccountOrigin::EntryWithYaml
        } else {
            AccountOrigin::Entry
        },
    })
}
