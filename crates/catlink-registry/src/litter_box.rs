//! Scooper and Scooper C1 litter boxes

use std::collections::VecDeque;

use catlink_core::DeviceSettings;
use serde::{Deserialize, Serialize};

use crate::payload::{error_message, flag, float, int, last_log, text, Object};

/// `workModel` codes
pub const MODES: [(&str, &str); 4] = [
    ("00", "auto"),
    ("01", "manual"),
    ("02", "time"),
    ("03", "empty"),
];

/// `actionCmd` codes
pub const ACTIONS: [(&str, &str); 2] = [("01", "clean"), ("00", "pause")];

const WORK_STATUS: [(&str, &str); 3] = [("00", "idle"), ("01", "running"), ("02", "need_reset")];

/// Code for a mode or action label
pub fn code_for(table: &[(&'static str, &'static str)], label: &str) -> Option<&'static str> {
    table.iter().find(|(_, l)| *l == label).map(|(c, _)| *c)
}

fn label_for(table: &[(&str, &'static str)], code: &str) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, l)| *l)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LitterBoxState {
    /// `idle`, `running`, `need_reset` or the raw code
    pub work_status: Option<String>,
    pub mode: Option<String>,
    pub alarm: Option<String>,
    /// Scale reading in kg
    pub weight: Option<f64>,
    /// Averaged `weight - empty_weight` in kg
    pub litter_weight: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub induction_times: Option<i64>,
    pub manual_times: Option<i64>,
    /// Days until the litter should be replaced
    pub litter_countdown: Option<i64>,
    pub deodorant_countdown: Option<i64>,
    pub online: bool,
    pub error: Option<String>,
    pub last_log: Option<String>,
}

impl LitterBoxState {
    pub fn parse(
        raw: &Object,
        detail: &Object,
        settings: &DeviceSettings,
        history: &mut LitterHistory,
    ) -> Self {
        let weight = float(detail, "weight");
        let litter_weight = weight.and_then(|w| history.push(w - settings.empty_weight, settings));

        let work_status = text(detail, "workStatus")
            .map(|code| label_for(&WORK_STATUS, &code).map(str::to_string).unwrap_or(code));
        let mode = text(detail, "workModel")
            .map(|code| label_for(&MODES, &code).map(str::to_string).unwrap_or(code));

        Self {
            work_status,
            mode,
            alarm: text(detail, "alarmStatus"),
            weight,
            litter_weight,
            temperature: float(detail, "temperature"),
            humidity: float(detail, "humidity"),
            induction_times: int(detail, "inductionTimes"),
            manual_times: int(detail, "manualTimes"),
            litter_countdown: int(detail, "litterCountdown"),
            deodorant_countdown: int(detail, "deodorantCountdown"),
            online: flag(detail, "online").or_else(|| flag(raw, "online")).unwrap_or(false),
            error: error_message(detail),
            last_log: last_log(raw.get("logs")),
        }
    }
}

/// Net litter weight samples kept across polls
#[derive(Debug, Clone, Default)]
pub struct LitterHistory {
    samples: VecDeque<f64>,
}

impl LitterHistory {
    /// Record a sample and return the average of the kept window
    pub fn push(&mut self, net_weight: f64, settings: &DeviceSettings) -> Option<f64> {
        let max = settings.max_samples_litter.max(1) as usize;
        self.samples.push_back(net_weight);
        while self.samples.len() > max {
            self.samples.pop_front();
        }
        self.average()
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().sum();
        Some((sum / self.samples.len() as f64 * 100.0).round() / 100.0)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
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
    fn test_parse_litter_box() {
        let detail = obj(json!({
            "workStatus": "01",
            "workModel": "00",
            "weight": "5.5",
            "temperature": 24.5,
            "inductionTimes": 3,
            "online": true,
            "error": "NORMAL"
        }));
        let settings = DeviceSettings {
            empty_weight: 3.0,
            ..DeviceSettings::default()
        };
        let mut history = LitterHistory::default();
        let state = LitterBoxState::parse(&Object::new(), &detail, &settings, &mut history);

        assert_eq!(state.work_status.as_deref(), Some("running"));
        assert_eq!(state.mode.as_deref(), Some("auto"));
        assert_eq!(state.weight, Some(5.5));
        assert_eq!(state.litter_weight, Some(2.5));
        assert_eq!(state.induction_times, Some(3));
        assert!(state.online);
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_history_window() {
        let settings = DeviceSettings {
            max_samples_litter: 2,
            ..DeviceSettings::default()
        };
        let mut history = LitterHistory::default();
        history.push(1.0, &settings);
        history.push(2.0, &settings);
        assert_eq!(history.push(4.0, &settings), Some(3.0));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_unknown_mode_code_kept() {
        let detail = obj(json!({"workModel": "09"}));
        let mut history = LitterHistory::default();
        let state =
            LitterBoxState::parse(&Object::new(), &detail, &DeviceSettings::default(), &mut history);
        assert_eq!(state.mode.as_deref(), Some("09"));
        assert_eq!(state.litter_weight, None);
        assert!(history.is_empty());
    }

    #[test]
    fn test_codes() {
        assert_eq!(code_for(&MODES, "manual"), Some("01"));
        assert_eq!(code_for(&ACTIONS, "pause"), Some("00"));
        assert_eq!(code_for(&MODES, "turbo"), None);
    }
}
