//! Pure2 water fountains

use serde::{Deserialize, Serialize};

use crate::payload::{error_message, flag, float, int, last_log, text, Object};

/// `runMode` values accepted by the cloud
pub const RUN_MODES: [&str; 3] = ["CONTINUOUS_SPRING", "INDUCTION_SPRING", "INTERMITTENT_SPRING"];

/// Accept a cloud run mode or its friendly name
pub fn run_mode_for(value: &str) -> Option<&'static str> {
    if let Some(mode) = RUN_MODES.iter().copied().find(|m| *m == value) {
        return Some(mode);
    }
    match value.trim().to_lowercase().replace(' ', "_").as_str() {
        "continuous_spring" => Some("CONTINUOUS_SPRING"),
        "smart_spring" | "induction_spring" => Some("INDUCTION_SPRING"),
        "intermittent_spring" => Some("INTERMITTENT_SPRING"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FountainState {
    /// Water level description, or the run mode when absent
    pub state: String,
    pub run_mode: Option<String>,
    /// Percent
    pub water_level: i64,
    pub water_level_desc: Option<String>,
    /// Days until the filter should be replaced
    pub filter_countdown: i64,
    pub water_temperature: Option<f64>,
    pub water_quality: Option<i64>,
    /// Only reported by UV models
    pub uv_light: Option<bool>,
    /// Only reported by heated models
    pub water_heater: Option<bool>,
    pub locked: bool,
    pub online: bool,
    pub error: Option<String>,
    pub last_log: Option<String>,
}

impl FountainState {
    pub fn parse(raw: &Object, detail: &Object) -> Self {
        let run_mode = text(detail, "runMode");
        let water_level_desc = text(detail, "waterLevelStrDescription");
        let state = water_level_desc
            .clone()
            .or_else(|| run_mode.clone())
            .unwrap_or_default();
        let is_open = |key: &str| {
            detail
                .contains_key(key)
                .then(|| text(detail, key).as_deref() == Some("OPEN"))
        };

        Self {
            state,
            run_mode,
            water_level: int(detail, "waterLevelNum").unwrap_or(0),
            water_level_desc,
            filter_countdown: int(detail, "filterElementTimeCountdown").unwrap_or(0),
            water_temperature: float(detail, "waterTemperature").filter(|t| *t > 0.0),
            water_quality: int(detail, "waterQuality"),
            uv_light: is_open("ultravioletRaysSwitch"),
            water_heater: is_open("waterHeatSwitch"),
            locked: text(detail, "pureLockStatus").as_deref() == Some("LOCK"),
            online: flag(detail, "online")
                .or_else(|| flag(raw, "online"))
                .unwrap_or(false),
            error: error_message(detail),
            last_log: last_log(raw.get("logs")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: serde_json::Value) -> Object {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_fountain() {
        let detail = obj(json!({
            "runMode": "INDUCTION_SPRING",
            "waterLevelNum": "80",
            "waterLevelStrDescription": "Sufficient",
            "ultravioletRaysSwitch": "OPEN",
            "pureLockStatus": "UNLOCK",
            "waterTemperature": 0,
            "currentErrorType": "NONE",
            "online": true
        }));
        let state = FountainState::parse(&Object::new(), &detail);

        assert_eq!(state.state, "Sufficient");
        assert_eq!(state.water_level, 80);
        assert_eq!(state.uv_light, Some(true));
        assert_eq!(state.water_heater, None);
        assert_eq!(state.water_temperature, None);
        assert!(!state.locked);
        assert!(state.online);
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_state_falls_back_to_run_mode() {
        let detail = obj(json!({"runMode": "CONTINUOUS_SPRING", "waterHeatSwitch": "CLOSE"}));
        let state = FountainState::parse(&Object::new(), &detail);
        assert_eq!(state.state, "CONTINUOUS_SPRING");
        assert_eq!(state.water_heater, Some(false));
    }

    #[test]
    fn test_run_mode_aliases() {
        assert_eq!(run_mode_for("smart spring"), Some("INDUCTION_SPRING"));
        assert_eq!(run_mode_for("INTERMITTENT_SPRING"), Some("INTERMITTENT_SPRING"));
        assert_eq!(run_mode_for("turbo"), None);
    }
}
