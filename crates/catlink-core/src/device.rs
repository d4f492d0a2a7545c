//! Device kinds and per-device tuning

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use crate::keys;
use crate::mac::format_mac;

/// Device class reported by the cloud in `deviceType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Scooper SE / PRO litter box
    #[serde(rename = "SCOOPER")]
    Scooper,
    /// Scooper C1
    #[serde(rename = "LITTER_BOX_599")]
    LitterBox599,
    #[serde(rename = "FEEDER")]
    Feeder,
    /// Fresh2 feeder series
    #[serde(rename = "FEEDER_PRO")]
    FeederPro,
    /// Pure2 water fountain series
    #[serde(rename = "PUREPRO")]
    PurePro,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 5] = [
        DeviceKind::Scooper,
        DeviceKind::LitterBox599,
        DeviceKind::Feeder,
        DeviceKind::FeederPro,
        DeviceKind::PurePro,
    ];

    /// Map a cloud `deviceType` to a kind
    pub fn from_device_type(device_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == device_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Scooper => "SCOOPER",
            DeviceKind::LitterBox599 => "LITTER_BOX_599",
            DeviceKind::Feeder => "FEEDER",
            DeviceKind::FeederPro => "FEEDER_PRO",
            DeviceKind::PurePro => "PUREPRO",
        }
    }

    pub fn is_litter_box(&self) -> bool {
        matches!(self, DeviceKind::Scooper | DeviceKind::LitterBox599)
    }

    pub fn is_feeder(&self) -> bool {
        matches!(self, DeviceKind::Feeder | DeviceKind::FeederPro)
    }

    pub fn is_fountain(&self) -> bool {
        matches!(self, DeviceKind::PurePro)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account-wide defaults for device tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_samples_litter: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_eating_amount: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spike_threshold: Option<u32>,
}

impl DeviceDefaults {
    pub const EMPTY_WEIGHT_RANGE: RangeInclusive<f64> = 0.0..=10.0;
    pub const MAX_SAMPLES_LITTER_RANGE: RangeInclusive<u32> = 1..=100;
    pub const STABLE_DURATION_RANGE: RangeInclusive<u32> = 10..=300;
    pub const MIN_EATING_AMOUNT_RANGE: RangeInclusive<u32> = 1..=50;
    pub const SPIKE_THRESHOLD_RANGE: RangeInclusive<u32> = 50..=500;

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Key of the first value outside its accepted range
    pub fn out_of_range(&self) -> Option<&'static str> {
        fn outside<T: PartialOrd>(v: Option<T>, range: &RangeInclusive<T>) -> bool {
            v.is_some_and(|v| !range.contains(&v))
        }

        if outside(self.empty_weight, &Self::EMPTY_WEIGHT_RANGE) {
            Some(keys::EMPTY_WEIGHT)
        } else if outside(self.max_samples_litter, &Self::MAX_SAMPLES_LITTER_RANGE) {
            Some(keys::MAX_SAMPLES_LITTER)
        } else if outside(self.stable_duration, &Self::STABLE_DURATION_RANGE) {
            Some(keys::STABLE_DURATION)
        } else if outside(self.min_eating_amount, &Self::MIN_EATING_AMOUNT_RANGE) {
            Some(keys::MIN_EATING_AMOUNT)
        } else if outside(self.spike_threshold, &Self::SPIKE_THRESHOLD_RANGE) {
            Some(keys::SPIKE_THRESHOLD)
        } else {
            None
        }
    }

    /// Fill unset fields from `lower`
    pub fn or(&self, lower: &DeviceDefaults) -> DeviceDefaults {
        DeviceDefaults {
            empty_weight: self.empty_weight.or(lower.empty_weight),
            max_samples_litter: self.max_samples_litter.or(lower.max_samples_litter),
            stable_duration: self.stable_duration.or(lower.stable_duration),
            min_eating_amount: self.min_eating_amount.or(lower.min_eating_amount),
            spike_threshold: self.spike_threshold.or(lower.spike_threshold),
        }
    }
}

/// Optional per-device tuning keyed by MAC
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub mac: String,
    #[serde(flatten)]
    pub tuning: DeviceDefaults,
}

impl DeviceOverride {
    pub fn new(mac: impl Into<String>) -> Self {
        Self {
            name: None,
            mac: mac.into(),
            tuning: DeviceDefaults::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_empty_weight(mut self, kg: f64) -> Self {
        self.tuning.empty_weight = Some(kg);
        self
    }

    pub fn with_max_samples_litter(mut self, samples: u32) -> Self {
        self.tuning.max_samples_litter = Some(samples);
        self
    }

    pub fn with_stable_duration(mut self, secs: u32) -> Self {
        self.tuning.stable_duration = Some(secs);
        self
    }

    pub fn with_min_eating_amount(mut self, grams: u32) -> Self {
        self.tuning.min_eating_amount = Some(grams);
        self
    }

    pub fn with_spike_threshold(mut self, grams: u32) -> Self {
        self.tuning.spike_threshold = Some(grams);
        self
    }

    /// Normalised MAC used as the lookup key
    pub fn key(&self) -> String {
        format_mac(&self.mac)
    }

    /// Whether this override targets the given MAC (any notation)
    pub fn matches(&self, mac: &str) -> bool {
        !self.mac.is_empty() && self.key() == format_mac(mac)
    }
}

/// Fully resolved tuning for one device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Weight of the empty litter box in kg
    pub empty_weight: f64,
    /// Number of litter weight samples to average
    pub max_samples_litter: u32,
    /// Seconds without weight change before a bowl counts as stable
    pub stable_duration: u32,
    /// Minimum weight drop in grams treated as eating
    pub min_eating_amount: u32,
    /// Weight increase in grams treated as a cat stepping on the bowl
    pub spike_threshold: u32,
}

impl DeviceSettings {
    pub const DEFAULT_EMPTY_WEIGHT: f64 = 0.0;
    pub const DEFAULT_MAX_SAMPLES_LITTER: u32 = 24;
    pub const DEFAULT_STABLE_DURATION: u32 = 60;
    pub const DEFAULT_MIN_EATING_AMOUNT: u32 = 2;
    pub const DEFAULT_SPIKE_THRESHOLD: u32 = 100;

    /// Resolve settings: device override, then account defaults, then type defaults
    pub fn resolve(device: Option<&DeviceOverride>, account: &DeviceDefaults) -> Self {
        let layer = device.map(|d| &d.tuning);
        let pick = |f: fn(&DeviceDefaults) -> Option<u32>, default: u32| {
            layer.and_then(f).or_else(|| f(account)).unwrap_or(default)
        };

        Self {
            empty_weight: layer
                .and_then(|d| d.empty_weight)
                .or(account.empty_weight)
                .unwrap_or(Self::DEFAULT_EMPTY_WEIGHT),
            max_samples_litter: pick(|d| d.max_samples_litter, Self::DEFAULT_MAX_SAMPLES_LITTER),
            stable_duration: pick(|d| d.stable_duration, Self::DEFAULT_STABLE_DURATION),
            min_eating_amount: pick(|d| d.min_eating_amount, Self::DEFAULT_MIN_EATING_AMOUNT),
            spike_threshold: pick(|d| d.spike_threshold, Self::DEFAULT_SPIKE_THRESHOLD),
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self::resolve(None, &DeviceDefaults::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kind_mapping() {
        assert_eq!(DeviceKind::from_device_type("SCOOPER"), Some(DeviceKind::Scooper));
        assert_eq!(
            DeviceKind::from_device_type("LITTER_BOX_599"),
            Some(DeviceKind::LitterBox599)
        );
        assert_eq!(DeviceKind::from_device_type("PUREPRO"), Some(DeviceKind::PurePro));
        assert_eq!(DeviceKind::from_device_type("TOASTER"), None);
        assert!(DeviceKind::FeederPro.is_feeder());
        assert!(DeviceKind::LitterBox599.is_litter_box());
    }

    #[test]
    fn test_type_defaults() {
        let settings = DeviceSettings::default();
        assert_eq!(settings.empty_weight, 0.0);
        assert_eq!(settings.max_samples_litter, 24);
        assert_eq!(settings.stable_duration, 60);
        assert_eq!(settings.min_eating_amount, 2);
        assert_eq!(settings.spike_threshold, 100);
    }

    #[test]
    fn test_resolution_order() {
        let account = DeviceDefaults {
            empty_weight: Some(1.5),
            max_samples_litter: Some(12),
            ..Default::default()
        };
        let device = DeviceOverride::new("AABBCCDDEEFF").with_empty_weight(3.0);

        let settings = DeviceSettings::resolve(Some(&device), &account);
        assert_eq!(settings.empty_weight, 3.0);
        assert_eq!(settings.max_samples_litter, 12);
        assert_eq!(settings.spike_threshold, 100);

        let settings = DeviceSettings::resolve(None, &account);
        assert_eq!(settings.empty_weight, 1.5);
    }

    #[test]
    fn test_out_of_range() {
        let mut defaults = DeviceDefaults::default();
        assert_eq!(defaults.out_of_range(), None);

        defaults.empty_weight = Some(10.0);
        defaults.spike_threshold = Some(50);
        assert_eq!(defaults.out_of_range(), None);

        defaults.stable_duration = Some(5);
        assert_eq!(defaults.out_of_range(), Some("stable_duration"));

        defaults.empty_weight = Some(-0.5);
        assert_eq!(defaults.out_of_range(), Some("empty_weight"));
    }

    #[test]
    fn test_override_matches_any_mac_notation() {
        let device = DeviceOverride::new("AA-BB-CC-DD-EE-FF");
        assert!(device.matches("aabbccddeeff"));
        assert!(device.matches("AA:BB:CC:DD:EE:FF"));
        assert!(!device.matches("001122334455"));
        assert!(!DeviceOverride::new("").matches(""));
    }

    #[test]
    fn test_override_serde_flattens_tuning() {
        let json = serde_json::json!({"mac": "AABBCCDDEE", "empty_weight": 3.0});
        let parsed: DeviceOverride = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.tuning.empty_weight, Some(3.0));
        assert_eq!(parsed.tuning.max_samples_litter, None);
    }
}
