//! Device descriptors handed to entity adapters

use catlink_core::{format_mac, DeviceKind, DeviceSettings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};
use crate::feeder::FeederState;
use crate::fountain::FountainState;
use crate::litter_box::LitterBoxState;
use crate::payload::{object, text, Object};

/// Latest state snapshot, one variant per device family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceState {
    LitterBox(LitterBoxState),
    Feeder(FeederState),
    Fountain(FountainState),
}

/// One physical device and its latest state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Cloud device id, stable across polls
    pub id: String,
    pub kind: DeviceKind,
    pub name: String,
    /// Normalised MAC
    pub mac: String,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub settings: DeviceSettings,
    pub state: DeviceState,
    pub updated_at: DateTime<Utc>,
}

impl DeviceDescriptor {
    /// Id used for entity unique ids: `{kind}_{mac}`
    pub fn device_key(&self) -> String {
        format!("{}_{}", self.kind, self.mac)
    }

    pub fn online(&self) -> bool {
        match &self.state {
            DeviceState::LitterBox(s) => s.online,
            DeviceState::Feeder(s) => s.online,
            DeviceState::Fountain(s) => s.online,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            DeviceState::LitterBox(s) => s.error.as_deref(),
            DeviceState::Feeder(s) => s.error.as_deref(),
            DeviceState::Fountain(s) => s.error.as_deref(),
        }
    }

    pub fn litter_box(&self) -> Option<&LitterBoxState> {
        match &self.state {
            DeviceState::LitterBox(s) => Some(s),
            _ => None,
        }
    }

    pub fn feeder(&self) -> Option<&FeederState> {
        match &self.state {
            DeviceState::Feeder(s) => Some(s),
            _ => None,
        }
    }

    pub fn fountain(&self) -> Option<&FountainState> {
        match &self.state {
            DeviceState::Fountain(s) => Some(s),
            _ => None,
        }
    }
}

/// Identity fields read from a raw device payload
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentity {
    pub id: String,
    pub kind: DeviceKind,
    pub mac: String,
    pub name: Option<String>,
    pub model: Option<String>,
}

impl DeviceIdentity {
    pub fn from_raw(raw: &Object) -> RegistryResult<Self> {
        let id = text(raw, "id").ok_or(RegistryError::MissingField("id"))?;
        let device_type = text(raw, "deviceType").unwrap_or_default();
        let kind = DeviceKind::from_device_type(&device_type)
            .ok_or_else(|| RegistryError::UnknownDeviceType { id: id.clone(), device_type })?;

        Ok(Self {
            id,
            kind,
            mac: text(raw, "mac").map(|m| format_mac(&m)).unwrap_or_default(),
            name: text(raw, "deviceName"),
            model: text(raw, "model"),
        })
    }

    /// Override name, then the cloud name, then kind plus MAC suffix
    pub fn display_name(&self, override_name: Option<&str>) -> String {
        if let Some(name) = override_name.filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        if let Some(name) = &self.name {
            return name.clone();
        }
        let mut tail: Vec<char> = self.mac.chars().filter(|c| *c != ':').rev().take(4).collect();
        tail.reverse();
        let suffix: String = tail.into_iter().collect();
        format!("{} {}", self.kind, suffix.to_uppercase())
            .trim_end()
            .to_string()
    }
}

/// Detail payload embedded in a raw device, empty when the fetch failed
pub fn detail_of(raw: &Object) -> Object {
    object(raw, "detail").cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: serde_json::Value) -> Object {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_identity() {
        let raw = obj(json!({
            "id": 1234,
            "deviceType": "FEEDER_PRO",
            "mac": "AABBCCDDEEFF",
            "model": "fresh2-pro"
        }));
        let identity = DeviceIdentity::from_raw(&raw).unwrap();
        assert_eq!(identity.id, "1234");
        assert_eq!(identity.kind, DeviceKind::FeederPro);
        assert_eq!(identity.mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(identity.display_name(None), "FEEDER_PRO EEFF");
        assert_eq!(identity.display_name(Some("Kitchen")), "Kitchen");
    }

    #[test]
    fn test_identity_errors() {
        let unknown = obj(json!({"id": "1", "deviceType": "TOASTER"}));
        assert_eq!(
            DeviceIdentity::from_raw(&unknown),
            Err(RegistryError::UnknownDeviceType {
                id: "1".into(),
                device_type: "TOASTER".into()
            })
        );

        let no_id = obj(json!({"deviceType": "SCOOPER"}));
        assert_eq!(DeviceIdentity::from_raw(&no_id), Err(RegistryError::MissingField("id")));
    }

    #[test]
    fn test_display_name_with_non_ascii_mac() {
        let raw = obj(json!({"id": "1", "deviceType": "SCOOPER", "mac": "xéabc"}));
        let identity = DeviceIdentity::from_raw(&raw).unwrap();
        assert_eq!(identity.display_name(None), "SCOOPER ÉABC");

        let short = obj(json!({"id": "2", "deviceType": "PUREPRO", "mac": "é"}));
        let identity = DeviceIdentity::from_raw(&short).unwrap();
        assert_eq!(identity.display_name(None), "PUREPRO É");
    }
}
