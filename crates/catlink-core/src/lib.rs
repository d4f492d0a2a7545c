//! Core types for the CatLink bridge
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: [`Account`], [`ApiBase`], [`DeviceKind`],
//! [`DeviceOverride`], [`DeviceSettings`] and [`ApiRequest`].

mod account;
mod device;
mod interval;
mod mac;
mod request;

pub use account::{Account, AccountKey, ApiBase, Language, Region};
pub use device::{DeviceDefaults, DeviceKind, DeviceOverride, DeviceSettings};
pub use interval::{
    clamp_interval, format_hms, format_human, parse_interval_str, parse_interval_value,
};
pub use mac::format_mac;
pub use request::{ApiRequest, HttpMethod};

/// Integration domain, used for storage keys and entity unique ids
pub const DOMAIN: &str = "catlink";

/// Default country calling code for CatLink accounts
pub const DEFAULT_PHONE_IAC: &str = "86";

/// Default polling interval in seconds
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

/// Smallest polling interval accepted from any configuration source
pub const MIN_SCAN_INTERVAL_SECS: u64 = 5;

/// Longest polling interval; larger configured values are capped
pub const MAX_SCAN_INTERVAL_SECS: u64 = 86_400;

/// Interval used when a configured value cannot be parsed
pub const FALLBACK_SCAN_INTERVAL_SECS: u64 = 600;

/// Manufacturer reported for every device
pub const MANUFACTURER: &str = "CatLink";

/// Configuration keys shared by YAML and config entries
pub mod keys {
    pub const PHONE: &str = "phone";
    pub const PHONE_IAC: &str = "phone_iac";
    pub const PASSWORD: &str = "password";
    pub const API_BASE: &str = "api_base";
    pub const LANGUAGE: &str = "language";
    pub const SCAN_INTERVAL: &str = "scan_interval";
    pub const DEVICES: &str = "devices";
    pub const ACCOUNTS: &str = "accounts";
    pub const NAME: &str = "name";
    pub const MAC: &str = "mac";
    pub const EMPTY_WEIGHT: &str = "empty_weight";
    pub const MAX_SAMPLES_LITTER: &str = "max_samples_litter";
    pub const STABLE_DURATION: &str = "stable_duration";
    pub const MIN_EATING_AMOUNT: &str = "min_eating_amount";
    pub const SPIKE_THRESHOLD: &str = "spike_threshold";
}
