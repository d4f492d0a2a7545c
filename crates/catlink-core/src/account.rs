//! Account identity and regional API endpoints

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::device::DeviceDefaults;
use crate::{DEFAULT_PHONE_IAC, DEFAULT_SCAN_INTERVAL_SECS};

/// CatLink cloud region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Global,
    China,
    Euroamerica,
    Singapore,
}

impl Region {
    /// All regions in the order they are offered to the user
    pub const ALL: [Region; 4] = [
        Region::Global,
        Region::China,
        Region::Euroamerica,
        Region::Singapore,
    ];

    /// API base URL for this region
    pub fn api_base(&self) -> &'static str {
        match self {
            Region::Global => "https://app.catlinks.cn/api/",
            Region::China => "https://app-sh.catlinks.cn/api/",
            Region::Euroamerica => "https://app-usa.catlinks.cn/api/",
            Region::Singapore => "https://app-sgp.catlinks.cn/api/",
        }
    }

    /// Configuration key of the region (`china`, `global`, ...)
    pub fn key(&self) -> &'static str {
        match self {
            Region::Global => "global",
            Region::China => "china",
            Region::Euroamerica => "euroamerica",
            Region::Singapore => "singapore",
        }
    }

    /// Human-readable region name
    pub fn display_name(&self) -> &'static str {
        match self {
            Region::Global => "Global",
            Region::China => "China",
            Region::Euroamerica => "United States",
            Region::Singapore => "Singapore",
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.key() == s)
            .ok_or_else(|| format!("unknown server region '{}'", s))
    }
}

/// API base URL of an account
///
/// Usually one of the four regional endpoints; custom URLs are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiBase(String);

impl ApiBase {
    pub fn new(url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The region this base belongs to, if it is one of the known endpoints
    pub fn region(&self) -> Option<Region> {
        Region::ALL.into_iter().find(|r| r.api_base() == self.0)
    }

    /// Join an API path onto the base
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.0, path.trim_start_matches('/'))
    }
}

impl FromStr for ApiBase {
    type Err = String;

    /// Accepts a region key (`china`, ...) or an http(s) URL
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(region) = s.parse::<Region>() {
            return Ok(region.into());
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(ApiBase::new(s));
        }
        Err(format!("'{}' is neither a region nor a URL", s))
    }
}

impl From<Region> for ApiBase {
    fn from(region: Region) -> Self {
        Self(region.api_base().to_string())
    }
}

impl Default for ApiBase {
    fn default() -> Self {
        Region::China.into()
    }
}

impl fmt::Display for ApiBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Language used for cloud responses and entity names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "zh_CN")]
    ZhCn,
    #[serde(rename = "en_GB")]
    EnGb,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::ZhCn => "zh_CN",
            Language::EnGb => "en_GB",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::ZhCn => "简体中文",
            Language::EnGb => "English",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zh_CN" => Ok(Language::ZhCn),
            "en_GB" => Ok(Language::EnGb),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

/// Identity of an account: `("{iac}-{phone}", api_base)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountKey {
    pub username: String,
    pub api_base: ApiBase,
}

impl AccountKey {
    /// Unique id used for the persisted config entry
    pub fn unique_id(&self) -> String {
        format!("{}@{}", self.username, self.api_base)
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.api_base)
    }
}

/// One set of CatLink cloud credentials plus region/interval/language settings
#[derive(Clone, PartialEq)]
pub struct Account {
    pub phone: String,
    pub phone_iac: String,
    /// Opaque credential forwarded to the cloud login endpoint
    pub password: String,
    pub api_base: ApiBase,
    pub language: Language,
    pub scan_interval: Duration,
    /// Account-wide device tuning, applied below per-device overrides
    pub device_defaults: DeviceDefaults,
}

impl Account {
    pub fn new(phone: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            phone_iac: DEFAULT_PHONE_IAC.to_string(),
            password: password.into(),
            api_base: ApiBase::default(),
            language: Language::default(),
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            device_defaults: DeviceDefaults::default(),
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.api_base = region.into();
        self
    }

    pub fn with_api_base(mut self, api_base: ApiBase) -> Self {
        self.api_base = api_base;
        self
    }

    pub fn with_phone_iac(mut self, phone_iac: impl Into<String>) -> Self {
        self.phone_iac = phone_iac.into();
        self
    }

    /// Set the polling interval, kept within the accepted bounds
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = crate::clamp_interval(interval);
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// `"{iac}-{phone}"`
    pub fn username(&self) -> String {
        format!("{}-{}", self.phone_iac, self.phone)
    }

    pub fn key(&self) -> AccountKey {
        AccountKey {
            username: self.username(),
            api_base: self.api_base.clone(),
        }
    }

    pub fn unique_id(&self) -> String {
        self.key().unique_id()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("phone", &self.phone)
            .field("phone_iac", &self.phone_iac)
            .field("password", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("language", &self.language)
            .field("scan_interval", &self.scan_interval)
            .field("device_defaults", &self.device_defaults)
            .finish()
    }
}
