//! Device Registry Builder
//!
//! Turns the raw device list of one account into descriptors. Descriptors
//! are updated in place across polls, so a device keeps its id, its litter
//! weight window and its eating history. Devices missing from a poll are
//! kept until the account is unloaded.

use catlink_core::{format_mac, DeviceDefaults, DeviceKind, DeviceOverride, DeviceSettings};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::descriptor::{detail_of, DeviceDescriptor, DeviceIdentity, DeviceState};
use crate::eating::{EatingConfig, EatingDetector, EatingEvent};
use crate::entities::{descriptions, EntityDescription};
use crate::error::RegistryError;
use crate::feeder::FeederState;
use crate::fountain::FountainState;
use crate::litter_box::{LitterBoxState, LitterHistory};
use crate::payload::{text, Object};

#[derive(Debug, Clone)]
struct DeviceEntry {
    descriptor: DeviceDescriptor,
    litter: LitterHistory,
    eating: Option<EatingDetector>,
}

/// Outcome of applying one device list
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Ids seen for the first time
    pub added: Vec<String>,
    pub updated: Vec<String>,
    /// Payloads that could not be used
    pub skipped: Vec<RegistryError>,
    /// Meals that ended during this build, by device id
    pub eating_events: Vec<(String, EatingEvent)>,
}

impl BuildReport {
    pub fn device_count(&self) -> usize {
        self.added.len() + self.updated.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: IndexMap<String, DeviceEntry>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a device list with the account's overrides and defaults
    pub fn apply(
        &mut self,
        payloads: &[Object],
        overrides: &[DeviceOverride],
        defaults: &DeviceDefaults,
        now: DateTime<Utc>,
    ) -> BuildReport {
        let mut report = BuildReport::default();

        for raw in payloads {
            let identity = match DeviceIdentity::from_raw(raw) {
                Ok(identity) => identity,
                Err(e) => {
                    warn!("Skipping device: {}", e);
                    report.skipped.push(e);
                    continue;
                }
            };

            let device_override = overrides.iter().find(|o| o.matches(&identity.mac));
            let settings = DeviceSettings::resolve(device_override, defaults);
            let name = identity.display_name(device_override.and_then(|o| o.name.as_deref()));
            let id = identity.id.clone();

            let is_new = !self.devices.contains_key(&id);
            let entry = self.devices.entry(id.clone()).or_insert_with(|| {
                debug!(
                    "Created device '{}' ({}, id {}, mac {}) with {:?}",
                    name, identity.kind, identity.id, identity.mac, settings
                );
                DeviceEntry::new(&identity, name.clone(), settings, now)
            });

            if let Some(event) = entry.update(raw, &identity, name, settings, now) {
                report.eating_events.push((id.clone(), event));
            }

            if is_new {
                report.added.push(id);
            } else {
                report.updated.push(id);
            }
        }

        if !report.added.is_empty() {
            info!("Discovered {} new device(s)", report.added.len());
        }
        report
    }

    pub fn get(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.devices.get(id).map(|e| &e.descriptor)
    }

    pub fn get_by_mac(&self, mac: &str) -> Option<&DeviceDescriptor> {
        let mac = format_mac(mac);
        self.descriptors().find(|d| d.mac == mac)
    }

    /// Descriptors in discovery order
    pub fn descriptors(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.values().map(|e| &e.descriptor)
    }

    /// Cloned descriptors keyed by device id
    pub fn snapshot(&self) -> IndexMap<String, DeviceDescriptor> {
        self.devices
            .iter()
            .map(|(id, e)| (id.clone(), e.descriptor.clone()))
            .collect()
    }

    pub fn entity_descriptions(&self) -> Vec<EntityDescription> {
        self.descriptors().flat_map(descriptions).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}

impl DeviceEntry {
    fn new(identity: &DeviceIdentity, name: String, settings: DeviceSettings, now: DateTime<Utc>) -> Self {
        let state = match identity.kind {
            kind if kind.is_litter_box() => DeviceState::LitterBox(LitterBoxState::parse(
                &Object::new(),
                &Object::new(),
                &settings,
                &mut LitterHistory::default(),
            )),
            DeviceKind::PurePro => DeviceState::Fountain(FountainState::parse(&Object::new(), &Object::new())),
            kind => DeviceState::Feeder(FeederState::parse(kind, &Object::new(), &Object::new(), None, now)),
        };
        let eating = (identity.kind == DeviceKind::FeederPro)
            .then(|| EatingDetector::new(EatingConfig::from(&settings)));

        Self {
            descriptor: DeviceDescriptor {
                id: identity.id.clone(),
                kind: identity.kind,
                name,
                mac: identity.mac.clone(),
                model: identity.model.clone(),
                firmware: None,
                settings,
                state,
                updated_at: now,
            },
            litter: LitterHistory::default(),
            eating,
        }
    }

    /// Replace the snapshot; returns a meal that just ended
    fn update(
        &mut self,
        raw: &Object,
        identity: &DeviceIdentity,
        name: String,
        settings: DeviceSettings,
        now: DateTime<Utc>,
    ) -> Option<EatingEvent> {
        let detail = detail_of(raw);
        let mut event = None;

        let state = match identity.kind {
            kind if kind.is_litter_box() => {
                DeviceState::LitterBox(LitterBoxState::parse(raw, &detail, &settings, &mut self.litter))
            }
            DeviceKind::PurePro => DeviceState::Fountain(FountainState::parse(raw, &detail)),
            kind => {
                if let Some(detector) = self.eating.as_mut() {
                    detector.reconfigure(EatingConfig::from(&settings));
                    if !detail.is_empty() {
                        event = detector.process(FeederState::bowl_balance(&detail), now);
                    }
                }
                DeviceState::Feeder(FeederState::parse(kind, raw, &detail, self.eating.as_ref(), now))
            }
        };

        let d = &mut self.descriptor;
        d.name = name;
        d.mac = identity.mac.clone();
        d.model = identity.model.clone().or_else(|| text(&detail, "model"));
        d.firmware = text(&detail, "firmwareVersion").or_else(|| d.firmware.take());
        d.settings = settings;
        d.state = state;
        d.updated_at = now;
        event
    }
}

/// One-shot build without history
pub fn build_descriptors(
    payloads: &[Object],
    overrides: &[DeviceOverride],
    defaults: &DeviceDefaults,
    now: DateTime<Utc>,
) -> (IndexMap<String, DeviceDescriptor>, Vec<RegistryError>) {
    let mut registry = DeviceRegistry::new();
    let report = registry.apply(payloads, overrides, defaults, now);
    (registry.snapshot(), report.skipped)
}
