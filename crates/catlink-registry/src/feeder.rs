//! Feeders: the original `FEEDER` and the Fresh2 `FEEDER_PRO` series

use catlink_core::DeviceKind;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::eating::EatingDetector;
use crate::payload::{error_message, flag, int, last_log, text, Object};

pub const DEFAULT_FOOD_OUT_COUNT: i64 = 1;
pub const DEFAULT_MAX_DAILY_FOOD: i64 = 2;
pub const DEFAULT_FOOD_BALANCE_LIMIT: i64 = 10;

/// `currentModel` of a Fresh2 feeder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeederMode {
    Smart,
    Timing,
}

impl FeederMode {
    pub const ALL: [FeederMode; 2] = [FeederMode::Smart, FeederMode::Timing];

    pub fn from_model(model: i64) -> Option<Self> {
        match model {
            0 => Some(FeederMode::Smart),
            1 => Some(FeederMode::Timing),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeederMode::Smart => "Smart Mode",
            FeederMode::Timing => "Timing Mode",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.label() == label)
    }

    /// `feederproRunMode` parameter value
    pub fn run_mode(&self) -> &'static str {
        match self {
            FeederMode::Smart => "00",
            FeederMode::Timing => "01",
        }
    }
}

/// Eating detection results for a Fresh2 feeder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EatingSummary {
    /// `eating`, `stabilizing`, `just_finished` or `idle`
    pub status: String,
    /// Last stable bowl weight, or the raw balance before one is known
    pub stable_weight: i64,
    pub daily_intake: i64,
    pub meals_today: usize,
    pub average_meal: f64,
    pub last_meal_amount: i64,
    /// Local `HH:MM` of the last meal today
    pub last_meal_time: Option<String>,
    pub current_amount: i64,
    pub current_duration_secs: i64,
}

impl EatingSummary {
    pub fn from_detector(detector: &EatingDetector, bowl_balance: i64, now: DateTime<Utc>) -> Self {
        let today: Vec<_> = detector.events_on(now).collect();
        let last = today.last();
        let daily_intake: i64 = today.iter().map(|e| e.amount).sum();
        let average_meal = if today.is_empty() {
            0.0
        } else {
            ((daily_intake as f64 / today.len() as f64) * 10.0).round() / 10.0
        };

        Self {
            status: detector.status(now).to_string(),
            stable_weight: detector.last_stable_weight().unwrap_or(bowl_balance),
            daily_intake,
            meals_today: today.len(),
            average_meal,
            last_meal_amount: last.map_or(0, |e| e.amount),
            last_meal_time: last.map(|e| e.end_time.with_timezone(&Local).format("%H:%M").to_string()),
            current_amount: detector.current_amount(),
            current_duration_secs: detector.current_duration(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederState {
    /// Bowl status (`sufficient`, `low`, `empty`) or the mode when unknown
    pub state: String,
    pub mode: Option<FeederMode>,
    /// Food in the bowl, grams
    pub bowl_balance: i64,
    pub total_food_intake: Option<i64>,
    pub food_out_count: i64,
    pub max_daily_food: i64,
    pub food_balance_limit: i64,
    pub total_balance_desc: Option<String>,
    pub desiccant_countdown: Option<i64>,
    pub key_lock: bool,
    pub indicator_light: bool,
    pub night_mode: bool,
    pub battery_installed: bool,
    pub all_timing: bool,
    pub error_alert: bool,
    /// Old feeder dispensing status
    pub food_out_status: Option<String>,
    pub auto_fill_status: Option<String>,
    pub online: bool,
    pub error: Option<String>,
    pub last_log: Option<String>,
    pub eating: Option<EatingSummary>,
}

impl FeederState {
    /// Food in the bowl reported by a detail payload
    pub fn bowl_balance(detail: &Object) -> i64 {
        int(detail, "weight").unwrap_or(0)
    }

    /// Parse a feeder snapshot; `detector` must already hold this sample
    pub fn parse(
        kind: DeviceKind,
        raw: &Object,
        detail: &Object,
        detector: Option<&EatingDetector>,
        now: DateTime<Utc>,
    ) -> Self {
        let bowl_balance = Self::bowl_balance(detail);
        let mode = match kind {
            DeviceKind::FeederPro => {
                FeederMode::from_model(int(detail, "currentModel").unwrap_or(0))
            }
            _ => None,
        };

        let state = match text(detail, "balanceStatusOfBowl").as_deref() {
            Some("2") => "sufficient".to_string(),
            Some("1") => "low".to_string(),
            Some("0") => "empty".to_string(),
            _ => match (kind, mode) {
                (DeviceKind::FeederPro, Some(FeederMode::Timing)) => "timing_mode".to_string(),
                (DeviceKind::FeederPro, _) => "smart_mode".to_string(),
                _ => text(detail, "foodOutStatus").unwrap_or_else(|| "unknown".to_string()),
            },
        };

        let eating = detector.map(|d| EatingSummary::from_detector(d, bowl_balance, now));

        Self {
            state,
            mode,
            bowl_balance,
            total_food_intake: int(detail, "totalFoodIntake"),
            food_out_count: int(detail, "autoFillNum").unwrap_or(DEFAULT_FOOD_OUT_COUNT),
            max_daily_food: int(detail, "maxFoodOutNumber").unwrap_or(DEFAULT_MAX_DAILY_FOOD),
            food_balance_limit: int(detail, "foodBalanceLimit")
                .unwrap_or(DEFAULT_FOOD_BALANCE_LIMIT),
            total_balance_desc: text(detail, "totalBalanceDesc"),
            desiccant_countdown: int(detail, "desiccantCountdown"),
            key_lock: flag(detail, "keyLockStatus").unwrap_or(false),
            indicator_light: text(detail, "indicatorLightStatus").as_deref() == Some("OPEN"),
            night_mode: flag(detail, "nightModeFlag").unwrap_or(false),
            battery_installed: int(detail, "batteryStatus") == Some(1),
            all_timing: flag(detail, "allTimingToggle").unwrap_or(false),
            error_alert: flag(detail, "errorAlertFlag").unwrap_or(true),
            food_out_status: text(detail, "foodOutStatus"),
            auto_fill_status: text(detail, "autoFillStatus"),
            online: flag(detail, "online").or_else(|| flag(raw, "online")).unwrap_or(false),
            error: error_message(detail),
            last_log: last_log(raw.get("logs")),
            eating,
        }
    }

    pub fn is_smart_mode(&self) -> bool {
        self.mode == Some(FeederMode::Smart)
    }
}
