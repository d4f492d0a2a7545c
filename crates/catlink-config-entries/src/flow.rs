//! Config flow and options flow
//!
//! The config flow walks `user → settings → [device_config] → confirm` and
//! creates a [`ConfigEntry`]. The import step turns one YAML account into an
//! entry without user interaction. The options flow edits an existing entry.
//!
//! Each step takes the submitted form as a JSON map, or `None` to ask for
//! the form.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use catlink_core::{
    format_hms, format_human, keys, parse_interval_value, Account, ApiBase, DeviceDefaults,
    DeviceSettings, Language, Region, DEFAULT_PHONE_IAC, DEFAULT_SCAN_INTERVAL_SECS,
    MIN_SCAN_INTERVAL_SECS,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::account::{account_from_map, json_string};
use crate::entry::{ConfigEntry, ConfigEntrySource, ConfigEntryUpdate};
use crate::manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult};

/// Submitted form values
pub type UserInput = serde_json::Map<String, Value>;

/// Form field selecting the API region
pub const SERVER_REGION: &str = "server_region";
/// Form field carrying the polling interval in whole seconds
pub const SCAN_INTERVAL_SECONDS: &str = "scan_interval_seconds";
/// Settings flag that routes to the device tuning step
pub const CONFIGURE_DEVICES: &str = "configure_devices";

/// Upper bound of the interval accepted by the options flow
pub const MAX_OPTIONS_INTERVAL_SECS: u64 = 3600;

/// Outcome of a credential check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidAuth,
    CannotConnect,
    Unknown(String),
}

impl ValidationError {
    /// Form error code
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidAuth => "invalid_auth",
            ValidationError::CannotConnect => "cannot_connect",
            ValidationError::Unknown(_) => "unknown",
        }
    }
}

/// Checks credentials against the cloud before an entry is created
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, account: &Account) -> Result<(), ValidationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    User,
    Settings,
    DeviceConfig,
    Confirm,
    /// The single options step
    Init,
}

impl FlowStep {
    pub fn id(&self) -> &'static str {
        match self {
            FlowStep::User => "user",
            FlowStep::Settings => "settings",
            FlowStep::DeviceConfig => "device_config",
            FlowStep::Confirm => "confirm",
            FlowStep::Init => "init",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    AlreadyConfigured,
    MissingRequiredFields,
    InvalidAuth,
    Unknown,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::AlreadyConfigured => "already_configured",
            AbortReason::MissingRequiredFields => "missing_required_fields",
            AbortReason::InvalidAuth => "invalid_auth",
            AbortReason::Unknown => "unknown",
        }
    }
}

/// Field key (or `base`) to error code
pub type FormErrors = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub enum FlowResult {
    /// Show (or re-show) a form
    Form {
        step: FlowStep,
        errors: FormErrors,
        /// Rendered configuration summary on the confirm step
        summary: Option<String>,
    },
    /// A new entry was persisted
    CreateEntry(ConfigEntry),
    /// An existing entry's options were persisted
    UpdateEntry(ConfigEntry),
    Abort(AbortReason),
}

impl FlowResult {
    fn form(step: FlowStep) -> Self {
        FlowResult::Form {
            step,
            errors: FormErrors::new(),
            summary: None,
        }
    }

    fn form_with_errors(step: FlowStep, errors: FormErrors) -> Self {
        FlowResult::Form {
            step,
            errors,
            summary: None,
        }
    }

    fn base_error(step: FlowStep, code: &str) -> Self {
        Self::form_with_errors(step, FormErrors::from([("base".to_string(), code.to_string())]))
    }
}

/// Interactive flow creating one config entry
pub struct ConfigFlow {
    entries: Arc<ConfigEntries>,
    validator: Arc<dyn CredentialValidator>,
    /// Values collected by earlier steps
    collected: UserInput,
}

impl ConfigFlow {
    pub fn new(entries: Arc<ConfigEntries>, validator: Arc<dyn CredentialValidator>) -> Self {
        Self {
            entries,
            validator,
            collected: UserInput::new(),
        }
    }

    /// Login step: phone, country code, password and region
    pub async fn step_user(&mut self, input: Option<UserInput>) -> ConfigEntriesResult<FlowResult> {
        let Some(input) = input else {
            return Ok(FlowResult::form(FlowStep::User));
        };

        let mut errors = FormErrors::new();
        let phone = required(&input, keys::PHONE, &mut errors);
        let password = required(&input, keys::PASSWORD, &mut errors);
        let phone_iac =
            json_string(input.get(keys::PHONE_IAC)).unwrap_or_else(|| DEFAULT_PHONE_IAC.to_string());
        let region = match json_string(input.get(SERVER_REGION)) {
            None => Region::China,
            Some(raw) => raw.parse::<Region>().unwrap_or_else(|_| {
                errors.insert(SERVER_REGION.to_string(), "invalid_region".to_string());
                Region::China
            }),
        };

        let (Some(phone), Some(password)) = (phone, password) else {
            return Ok(FlowResult::form_with_errors(FlowStep::User, errors));
        };
        if !errors.is_empty() {
            return Ok(FlowResult::form_with_errors(FlowStep::User, errors));
        }

        let account = Account::new(&phone, &password)
            .with_phone_iac(&phone_iac)
            .with_region(region);
        if let Err(e) = self.validator.validate(&account).await {
            warn!("Credential check failed for {}: {:?}", account.username(), e);
            return Ok(FlowResult::base_error(FlowStep::User, e.code()));
        }

        self.collected.insert(keys::PHONE.into(), phone.into());
        self.collected.insert(keys::PHONE_IAC.into(), phone_iac.into());
        self.collected.insert(keys::PASSWORD.into(), password.into());
        self.collected
            .insert(keys::API_BASE.into(), region.api_base().into());
        self.collected.insert(SERVER_REGION.into(), region.key().into());

        self.step_settings(None).await
    }

    /// Interval, language and whether to tune devices
    pub async fn step_settings(
        &mut self,
        input: Option<UserInput>,
    ) -> ConfigEntriesResult<FlowResult> {
        let Some(input) = input else {
            return Ok(FlowResult::form(FlowStep::Settings));
        };

        let mut errors = FormErrors::new();
        let interval = interval_seconds(&input, DEFAULT_SCAN_INTERVAL_SECS, None, &mut errors);
        let language = language(&input, Language::default(), &mut errors);
        if !errors.is_empty() {
            return Ok(FlowResult::form_with_errors(FlowStep::Settings, errors));
        }

        self.collected
            .insert(keys::SCAN_INTERVAL.into(), format_hms(interval).into());
        self.collected
            .insert(keys::LANGUAGE.into(), language.code().into());

        let configure_devices = input
            .get(CONFIGURE_DEVICES)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if configure_devices {
            self.step_device_config(None).await
        } else {
            self.step_confirm(None).await
        }
    }

    /// Account-wide device tuning
    pub async fn step_device_config(
        &mut self,
        input: Option<UserInput>,
    ) -> ConfigEntriesResult<FlowResult> {
        let Some(input) = input else {
            return Ok(FlowResult::form(FlowStep::DeviceConfig));
        };

        let mut errors = FormErrors::new();
        let tuning = tuning(&input, &HashMap::new(), &mut errors);
        if !errors.is_empty() {
            return Ok(FlowResult::form_with_errors(FlowStep::DeviceConfig, errors));
        }
        insert_tuning(&mut self.collected, &tuning);

        self.step_confirm(None).await
    }

    /// Show the summary, then create the entry on submit
    pub async fn step_confirm(
        &mut self,
        input: Option<UserInput>,
    ) -> ConfigEntriesResult<FlowResult> {
        if input.is_none() {
            return Ok(FlowResult::Form {
                step: FlowStep::Confirm,
                errors: FormErrors::new(),
                summary: Some(self.summary()),
            });
        }

        let mut data: HashMap<String, Value> = self
            .collected
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        data.remove(SERVER_REGION);

        let account = account_from_map(&data, "config flow")?;
        let title = format!("CatLink ({})", account.phone);
        let entry = ConfigEntry::new(title)
            .with_data(data)
            .with_unique_id(account.unique_id())
            .with_source(ConfigEntrySource::User);

        create_entry(&self.entries, entry).await
    }

    /// Import one YAML-declared account
    pub async fn step_import(&mut self, data: UserInput) -> ConfigEntriesResult<FlowResult> {
        let phone = json_string(data.get(keys::PHONE));
        let password = json_string(data.get(keys::PASSWORD));
        let (Some(phone), Some(password)) = (phone, password) else {
            error!("Missing required fields for YAML import: phone or password");
            return Ok(FlowResult::Abort(AbortReason::MissingRequiredFields));
        };

        let phone_iac =
            json_string(data.get(keys::PHONE_IAC)).unwrap_or_else(|| DEFAULT_PHONE_IAC.to_string());
        let api_base = match json_string(data.get(keys::API_BASE)) {
            None => ApiBase::default(),
            Some(raw) => match raw.parse::<ApiBase>() {
                Ok(base) => base,
                Err(e) => {
                    error!("Invalid api_base in YAML import: {}", e);
                    return Ok(FlowResult::Abort(AbortReason::Unknown));
                }
            },
        };
        let language = json_string(data.get(keys::LANGUAGE))
            .and_then(|raw| raw.parse::<Language>().ok())
            .unwrap_or_default();

        let account = Account::new(&phone, &password)
            .with_phone_iac(&phone_iac)
            .with_api_base(api_base.clone())
            .with_language(language);
        let unique_id = account.unique_id();

        if self.entries.get_by_unique_id(&unique_id).is_some() {
            debug!("Account {} already has a config entry, skipping import", unique_id);
            return Ok(FlowResult::Abort(AbortReason::AlreadyConfigured));
        }

        match self.validator.validate(&account).await {
            Ok(()) => {}
            Err(ValidationError::InvalidAuth) => {
                error!("Authentication failed during YAML import for account {}", unique_id);
                return Ok(FlowResult::Abort(AbortReason::InvalidAuth));
            }
            Err(e) => {
                error!("Error during YAML import validation for account {}: {:?}", unique_id, e);
                return Ok(FlowResult::Abort(AbortReason::Unknown));
            }
        }

        let scan_interval = match data.get(keys::SCAN_INTERVAL) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(v @ Value::Number(_)) => format_hms(parse_interval_value(v)),
            _ => format_hms(Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS)),
        };

        let mut entry_data = HashMap::from([
            (keys::PHONE.to_string(), Value::from(phone.clone())),
            (keys::PHONE_IAC.to_string(), Value::from(phone_iac)),
            (keys::PASSWORD.to_string(), Value::from(password)),
            (keys::API_BASE.to_string(), Value::from(api_base.as_str())),
            (keys::LANGUAGE.to_string(), Value::from(language.code())),
            (keys::SCAN_INTERVAL.to_string(), Value::from(scan_interval)),
        ]);
        for key in TUNING_KEYS {
            if let Some(value) = data.get(key).filter(|v| !v.is_null()) {
                entry_data.insert(key.to_string(), value.clone());
            }
        }

        let entry = ConfigEntry::new(format!("CatLink ({}) - Migrated from YAML", phone))
            .with_data(entry_data)
            .with_unique_id(unique_id.clone())
            .with_source(ConfigEntrySource::Import);

        let result = create_entry(&self.entries, entry).await?;
        if matches!(result, FlowResult::CreateEntry(_)) {
            info!("Imported YAML configuration for account {}", unique_id);
        }
        Ok(result)
    }

    fn summary(&self) -> String {
        let c = &self.collected;
        let text = |key: &str| json_string(c.get(key)).unwrap_or_default();

        let region = text(SERVER_REGION)
            .parse::<Region>()
            .map(|r| r.display_name().to_string())
            .unwrap_or_else(|_| text(keys::API_BASE));
        let interval = c
            .get(keys::SCAN_INTERVAL)
            .map(parse_interval_value)
            .unwrap_or(Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS));
        let language = text(keys::LANGUAGE)
            .parse::<Language>()
            .unwrap_or_default();

        let mut lines = vec![
            format!("Phone: {}", text(keys::PHONE)),
            format!("Country Code: +{}", text(keys::PHONE_IAC)),
            format!("Server Region: {}", region),
            format!("Update Interval: {}", format_human(interval)),
            format!("Language: {}", language.display_name()),
        ];

        if c.contains_key(keys::EMPTY_WEIGHT) {
            lines.push(format!("Empty Litter Box Weight: {} kg", text(keys::EMPTY_WEIGHT)));
            lines.push(format!("Litter Sample Count: {}", text(keys::MAX_SAMPLES_LITTER)));
            lines.push(format!("Stable Duration: {} seconds", text(keys::STABLE_DURATION)));
            lines.push(format!("Min Eating Amount: {} grams", text(keys::MIN_EATING_AMOUNT)));
            lines.push(format!("Spike Threshold: {} grams", text(keys::SPIKE_THRESHOLD)));
        }

        lines.join("\n")
    }
}

/// Flow editing an existing entry's options
pub struct OptionsFlow {
    entries: Arc<ConfigEntries>,
    validator: Arc<dyn CredentialValidator>,
    entry_id: String,
}

impl OptionsFlow {
    pub fn new(
        entries: Arc<ConfigEntries>,
        validator: Arc<dyn CredentialValidator>,
        entry_id: impl Into<String>,
    ) -> Self {
        Self {
            entries,
            validator,
            entry_id: entry_id.into(),
        }
    }

    /// The single options step; absent fields keep their current value
    pub async fn step_init(&self, input: Option<UserInput>) -> ConfigEntriesResult<FlowResult> {
        let entry = self
            .entries
            .get(&self.entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(self.entry_id.clone()))?;
        let Some(input) = input else {
            return Ok(FlowResult::form(FlowStep::Init));
        };

        let current = entry.merged();
        let current_text = |key: &str| json_string(current.get(key));
        let pick = |key: &str| json_string(input.get(key)).or_else(|| current_text(key));

        let mut errors = FormErrors::new();
        let phone = pick(keys::PHONE);
        let password = pick(keys::PASSWORD);
        if phone.is_none() {
            errors.insert(keys::PHONE.to_string(), "required".to_string());
        }
        if password.is_none() {
            errors.insert(keys::PASSWORD.to_string(), "required".to_string());
        }
        let phone_iac = pick(keys::PHONE_IAC).unwrap_or_else(|| DEFAULT_PHONE_IAC.to_string());

        let current_base = current_text(keys::API_BASE)
            .and_then(|raw| raw.parse::<ApiBase>().ok())
            .unwrap_or_default();
        let api_base = match json_string(input.get(SERVER_REGION)) {
            Some(raw) => match raw.parse::<Region>() {
                Ok(region) => ApiBase::from(region),
                Err(_) => {
                    errors.insert(SERVER_REGION.to_string(), "invalid_region".to_string());
                    current_base.clone()
                }
            },
            None => current_base.clone(),
        };

        let current_interval = current
            .get(keys::SCAN_INTERVAL)
            .map(parse_interval_value)
            .unwrap_or(Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS));
        let interval = interval_seconds(
            &input,
            current_interval.as_secs(),
            Some(MAX_OPTIONS_INTERVAL_SECS),
            &mut errors,
        );
        let current_language = current_text(keys::LANGUAGE)
            .and_then(|raw| raw.parse::<Language>().ok())
            .unwrap_or_default();
        let language = language(&input, current_language, &mut errors);
        let tuning = tuning(&input, &current, &mut errors);

        let (Some(phone), Some(password)) = (phone, password) else {
            return Ok(FlowResult::form_with_errors(FlowStep::Init, errors));
        };
        if !errors.is_empty() {
            return Ok(FlowResult::form_with_errors(FlowStep::Init, errors));
        }

        let account_changed = Some(&phone) != current_text(keys::PHONE).as_ref()
            || phone_iac
                != current_text(keys::PHONE_IAC).unwrap_or_else(|| DEFAULT_PHONE_IAC.to_string())
            || Some(&password) != current_text(keys::PASSWORD).as_ref()
            || api_base != current_base;

        let account = Account::new(&phone, &password)
            .with_phone_iac(&phone_iac)
            .with_api_base(api_base.clone());

        if account_changed {
            match self.validator.validate(&account).await {
                Ok(()) => {}
                Err(ValidationError::Unknown(reason)) => {
                    warn!("Credential check failed: {}", reason);
                    return Ok(FlowResult::base_error(FlowStep::Init, "unknown"));
                }
                Err(_) => return Ok(FlowResult::base_error(FlowStep::Init, "invalid_auth")),
            }
        }

        let mut options = entry.options.clone();
        options.insert(keys::PHONE.into(), phone.into());
        options.insert(keys::PHONE_IAC.into(), phone_iac.into());
        options.insert(keys::PASSWORD.into(), password.into());
        options.insert(keys::API_BASE.into(), api_base.as_str().into());
        options.insert(keys::SCAN_INTERVAL.into(), format_hms(interval).into());
        options.insert(keys::LANGUAGE.into(), language.code().into());
        let mut tuning_map = UserInput::new();
        insert_tuning(&mut tuning_map, &tuning);
        options.extend(tuning_map);

        let mut update = ConfigEntryUpdate::new().options(options);
        if account_changed {
            update = update.unique_id(Some(account.unique_id()));
        }

        match self.entries.update(&self.entry_id, update).await {
            Ok(updated) => {
                info!("Updated options for {}", updated.title);
                Ok(FlowResult::UpdateEntry(updated))
            }
            Err(ConfigEntriesError::AlreadyExists(unique_id)) => {
                warn!("Another entry already uses {}", unique_id);
                Ok(FlowResult::Abort(AbortReason::AlreadyConfigured))
            }
            Err(e) => Err(e),
        }
    }
}

const TUNING_KEYS: [&str; 5] = [
    keys::EMPTY_WEIGHT,
    keys::MAX_SAMPLES_LITTER,
    keys::STABLE_DURATION,
    keys::MIN_EATING_AMOUNT,
    keys::SPIKE_THRESHOLD,
];

async fn create_entry(
    entries: &ConfigEntries,
    entry: ConfigEntry,
) -> ConfigEntriesResult<FlowResult> {
    match entries.add(entry).await {
        Ok(entry) => Ok(FlowResult::CreateEntry(entry)),
        Err(ConfigEntriesError::AlreadyExists(unique_id)) => {
            debug!("Entry for {} already configured", unique_id);
            Ok(FlowResult::Abort(AbortReason::AlreadyConfigured))
        }
        Err(e) => Err(e),
    }
}

fn required(input: &UserInput, key: &str, errors: &mut FormErrors) -> Option<String> {
    let value = json_string(input.get(key));
    if value.is_none() {
        errors.insert(key.to_string(), "required".to_string());
    }
    value
}

fn interval_seconds(
    input: &UserInput,
    default: u64,
    max: Option<u64>,
    errors: &mut FormErrors,
) -> Duration {
    let secs = match input.get(SCAN_INTERVAL_SECONDS) {
        None | Some(Value::Null) => default,
        Some(v) => match v.as_u64() {
            Some(secs) => secs,
            None => {
                errors.insert(SCAN_INTERVAL_SECONDS.to_string(), "invalid_number".to_string());
                default
            }
        },
    };
    if secs < MIN_SCAN_INTERVAL_SECS || max.is_some_and(|max| secs > max) {
        errors.insert(SCAN_INTERVAL_SECONDS.to_string(), "out_of_range".to_string());
    }
    Duration::from_secs(secs)
}

fn language(input: &UserInput, default: Language, errors: &mut FormErrors) -> Language {
    match json_string(input.get(keys::LANGUAGE)) {
        None => default,
        Some(raw) => raw.parse::<Language>().unwrap_or_else(|_| {
            errors.insert(keys::LANGUAGE.to_string(), "invalid_language".to_string());
            default
        }),
    }
}

/// Read the five tuning values, falling back to `current`, then type defaults
fn tuning(
    input: &UserInput,
    current: &HashMap<String, Value>,
    errors: &mut FormErrors,
) -> DeviceSettings {
    let number = |key: &str, errors: &mut FormErrors| -> Option<f64> {
        let value = input.get(key).or_else(|| current.get(key))?;
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Null => return None,
            _ => None,
        };
        if parsed.is_none() {
            errors.insert(key.to_string(), "invalid_number".to_string());
        }
        parsed
    };
    let whole = |key: &str, errors: &mut FormErrors| {
        number(key, errors).map(|v| v.max(0.0).round() as u32)
    };

    let defaults = DeviceDefaults {
        empty_weight: number(keys::EMPTY_WEIGHT, errors),
        max_samples_litter: whole(keys::MAX_SAMPLES_LITTER, errors),
        stable_duration: whole(keys::STABLE_DURATION, errors),
        min_eating_amount: whole(keys::MIN_EATING_AMOUNT, errors),
        spike_threshold: whole(keys::SPIKE_THRESHOLD, errors),
    };
    if let Some(key) = defaults.out_of_range() {
        errors.insert(key.to_string(), "out_of_range".to_string());
    }
    DeviceSettings::resolve(None, &defaults)
}

fn insert_tuning(target: &mut UserInput, settings: &DeviceSettings) {
    target.insert(keys::EMPTY_WEIGHT.into(), settings.empty_weight.into());
    target.insert(
        keys::MAX_SAMPLES_LITTER.into(),
        settings.max_samples_litter.into(),
    );
    target.insert(keys::STABLE_DURATION.into(), settings.stable_duration.into());
    target.insert(
        keys::MIN_EATING_AMOUNT.into(),
        settings.min_eating_amount.into(),
    );
    target.insert(keys::SPIKE_THRESHOLD.into(), settings.spike_threshold.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StubValidator {
        result: Result<(), ValidationError>,
        calls: AtomicUsize,
    }

    impl StubValidator {
        fn new(result: Result<(), ValidationError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CredentialValidator for StubValidator {
        async fn validate(&self, _account: &Account) -> Result<(), ValidationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn input(value: Value) -> Option<UserInput> {
        match value {
            Value::Object(map) => Some(map),
            _ => panic!("expected object"),
        }
    }

    fn setup() -> (TempDir, Arc<ConfigEntries>) {
        let dir = TempDir::new().unwrap();
        let entries = Arc::new(ConfigEntries::new(Arc::new(Storage::new(dir.path()))));
        (dir, entries)
    }

    fn step_of(result: &FlowResult) -> Option<FlowStep> {
        match result {
            FlowResult::Form { step, .. } => Some(*step),
            _ => None,
        }
    }

    async fn run_user_flow(flow: &mut ConfigFlow, phone: &str) -> FlowResult {
        let r = flow
            .step_user(input(json!({"phone": phone, "password": "pw", "server_region": "singapore"})))
            .await
            .unwrap();
        assert_eq!(step_of(&r), Some(FlowStep::Settings));
        let r = flow
            .step_settings(input(json!({"scan_interval_seconds": 150, "language": "en_GB"})))
            .await
            .unwrap();
        assert_eq!(step_of(&r), Some(FlowStep::Confirm));
        flow.step_confirm(input(json!({}))).await.unwrap()
    }

    #[tokio::test]
    async fn test_happy_path_creates_entry() {
        let (_dir, entries) = setup();
        let mut flow = ConfigFlow::new(entries.clone(), StubValidator::new(Ok(())));

        let result = run_user_flow(&mut flow, "13800000000").await;
        let FlowResult::CreateEntry(entry) = result else {
            panic!("expected entry, got {:?}", result);
        };

        assert_eq!(entry.title, "CatLink (13800000000)");
        assert_eq!(
            entry.unique_id.as_deref(),
            Some("86-13800000000@https://app-sgp.catlinks.cn/api/")
        );
        assert_eq!(entry.data["scan_interval"], "00:02:30");
        assert_eq!(entry.data["language"], "en_GB");
        assert!(!entry.data.contains_key("server_region"));
        assert!(!entry.data.contains_key("empty_weight"));
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_summary() {
        let (_dir, entries) = setup();
        let mut flow = ConfigFlow::new(entries, StubValidator::new(Ok(())));
        flow.step_user(input(json!({"phone": "138", "password": "pw"})))
            .await
            .unwrap();
        flow.step_settings(input(json!({"scan_interval_seconds": 150, "configure_devices": true})))
            .await
            .unwrap();
        let result = flow
            .step_device_config(input(json!({"empty_weight": 1.5})))
            .await
            .unwrap();

        let FlowResult::Form {
            step: FlowStep::Confirm,
            summary: Some(summary),
            ..
        } = result
        else {
            panic!("expected confirm form");
        };
        assert!(summary.contains("Server Region: China"));
        assert!(summary.contains("Update Interval: 2 minutes 30 seconds"));
        assert!(summary.contains("Empty Litter Box Weight: 1.5 kg"));
        assert!(summary.contains("Spike Threshold: 100 grams"));
    }

    #[tokio::test]
    async fn test_duplicate_aborts() {
        let (_dir, entries) = setup();
        let validator = StubValidator::new(Ok(()));

        let mut first = ConfigFlow::new(entries.clone(), validator.clone());
        assert!(matches!(
            run_user_flow(&mut first, "138").await,
            FlowResult::CreateEntry(_)
        ));

        let mut second = ConfigFlow::new(entries.clone(), validator);
        assert!(matches!(
            run_user_flow(&mut second, "138").await,
            FlowResult::Abort(AbortReason::AlreadyConfigured)
        ));
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_user_step_errors() {
        let (_dir, entries) = setup();

        let mut flow = ConfigFlow::new(
            entries.clone(),
            StubValidator::new(Err(ValidationError::CannotConnect)),
        );
        let result = flow
            .step_user(input(json!({"phone": "138", "password": "pw"})))
            .await
            .unwrap();
        let FlowResult::Form { step, errors, .. } = result else {
            panic!("expected form");
        };
        assert_eq!(step, FlowStep::User);
        assert_eq!(errors["base"], "cannot_connect");

        let validator = StubValidator::new(Ok(()));
        let mut flow = ConfigFlow::new(entries, validator.clone());
        let result = flow
            .step_user(input(json!({"phone": "138"})))
            .await
            .unwrap();
        let FlowResult::Form { errors, .. } = result else {
            panic!("expected form");
        };
        assert_eq!(errors["password"], "required");
        assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_range_validation() {
        let (_dir, entries) = setup();
        let mut flow = ConfigFlow::new(entries, StubValidator::new(Ok(())));
        flow.step_user(input(json!({"phone": "138", "password": "pw"})))
            .await
            .unwrap();

        let result = flow
            .step_settings(input(json!({"scan_interval_seconds": 3})))
            .await
            .unwrap();
        let FlowResult::Form { errors, .. } = result else {
            panic!("expected form");
        };
        assert_eq!(errors["scan_interval_seconds"], "out_of_range");

        let result = flow
            .step_device_config(input(json!({"stable_duration": 5, "empty_weight": 2.0})))
            .await
            .unwrap();
        let FlowResult::Form { step, errors, .. } = result else {
            panic!("expected form");
        };
        assert_eq!(step, FlowStep::DeviceConfig);
        assert_eq!(errors["stable_duration"], "out_of_range");
    }

    #[tokio::test]
    async fn test_import_at_most_once() {
        let (_dir, entries) = setup();
        let validator = StubValidator::new(Ok(()));
        let data = input(json!({
            "phone": "138",
            "password": "pw",
            "scan_interval": 90,
            "empty_weight": 3.0
        }))
        .unwrap();

        let mut flow = ConfigFlow::new(entries.clone(), validator.clone());
        let FlowResult::CreateEntry(entry) = flow.step_import(data.clone()).await.unwrap() else {
            panic!("expected entry");
        };
        assert_eq!(entry.title, "CatLink (138) - Migrated from YAML");
        assert_eq!(entry.source, ConfigEntrySource::Import);
        assert_eq!(entry.data["api_base"], "https://app-sh.catlinks.cn/api/");
        assert_eq!(entry.data["scan_interval"], "00:01:30");
        assert_eq!(entry.data["empty_weight"], 3.0);

        let mut again = ConfigFlow::new(entries.clone(), validator.clone());
        assert!(matches!(
            again.step_import(data).await.unwrap(),
            FlowResult::Abort(AbortReason::AlreadyConfigured)
        ));
        assert_eq!(entries.len(), 1);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_import_aborts() {
        let (_dir, entries) = setup();

        let mut flow = ConfigFlow::new(entries.clone(), StubValidator::new(Ok(())));
        assert!(matches!(
            flow.step_import(input(json!({"phone": "138"})).unwrap())
                .await
                .unwrap(),
            FlowResult::Abort(AbortReason::MissingRequiredFields)
        ));

        let mut flow = ConfigFlow::new(
            entries.clone(),
            StubValidator::new(Err(ValidationError::InvalidAuth)),
        );
        assert!(matches!(
            flow.step_import(input(json!({"phone": "138", "password": "x"})).unwrap())
                .await
                .unwrap(),
            FlowResult::Abort(AbortReason::InvalidAuth)
        ));
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_import_default_interval() {
        let (_dir, entries) = setup();
        let mut flow = ConfigFlow::new(entries, StubValidator::new(Ok(())));
        let FlowResult::CreateEntry(entry) = flow
            .step_import(input(json!({"phone": "138", "password": "pw"})).unwrap())
            .await
            .unwrap()
        else {
            panic!("expected entry");
        };
        assert_eq!(entry.data["scan_interval"], "00:01:00");
    }

    #[tokio::test]
    async fn test_options_flow() {
        let (_dir, entries) = setup();
        let validator = StubValidator::new(Ok(()));
        let mut flow = ConfigFlow::new(entries.clone(), validator.clone());
        let FlowResult::CreateEntry(entry) = run_user_flow(&mut flow, "138").await else {
            panic!("expected entry");
        };
        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);

        let options = OptionsFlow::new(entries.clone(), validator.clone(), &entry.entry_id);
        let result = options
            .step_init(input(json!({"scan_interval_seconds": 7200})))
            .await
            .unwrap();
        let FlowResult::Form { errors, .. } = result else {
            panic!("expected form");
        };
        assert_eq!(errors["scan_interval_seconds"], "out_of_range");

        // Interval only: no credential check
        let result = options
            .step_init(input(json!({"scan_interval_seconds": 300, "spike_threshold": 200})))
            .await
            .unwrap();
        let FlowResult::UpdateEntry(updated) = result else {
            panic!("expected update");
        };
        assert_eq!(updated.options["scan_interval"], "00:05:00");
        assert_eq!(updated.options["spike_threshold"], 200);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);

        // Region change re-validates and moves the unique id
        let result = options
            .step_init(input(json!({"server_region": "global"})))
            .await
            .unwrap();
        let FlowResult::UpdateEntry(updated) = result else {
            panic!("expected update");
        };
        assert_eq!(validator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            updated.unique_id.as_deref(),
            Some("86-138@https://app.catlinks.cn/api/")
        );
    }

    #[tokio::test]
    async fn test_options_flow_rejects_bad_credentials() {
        let (_dir, entries) = setup();
        let entry = entries
            .add(ConfigEntry::new("CatLink (138)").with_data(HashMap::from([
                ("phone".to_string(), json!("138")),
                ("password".to_string(), json!("pw")),
            ])))
            .await
            .unwrap();

        let options = OptionsFlow::new(
            entries,
            StubValidator::new(Err(ValidationError::CannotConnect)),
            &entry.entry_id,
        );
        let result = options
            .step_init(input(json!({"password": "new"})))
            .await
            .unwrap();
        let FlowResult::Form { errors, .. } = result else {
            panic!("expected form");
        };
        assert_eq!(errors["base"], "invalid_auth");
    }
}
