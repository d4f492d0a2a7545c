//! Entity descriptions exposed for each device
//!
//! Every entity is identified by `{kind}_{mac}-{key}` so it stays the same
//! across polls and restarts. Adapters read `state` from the latest
//! description and turn writes into [`DeviceAction`]s with [`action_for`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::actions::{DeviceAction, PORTION_RANGE};
use crate::descriptor::{DeviceDescriptor, DeviceState};
use crate::error::{CommandError, CommandResult};
use crate::feeder::{FeederMode, FeederState};
use crate::fountain::{FountainState, RUN_MODES};
use crate::litter_box::{LitterBoxState, MODES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Sensor,
    BinarySensor,
    Switch,
    Select,
    Number,
    Button,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Sensor => "sensor",
            Platform::BinarySensor => "binary_sensor",
            Platform::Switch => "switch",
            Platform::Select => "select",
            Platform::Number => "number",
            Platform::Button => "button",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDescription {
    pub platform: Platform,
    pub key: String,
    pub unique_id: String,
    /// `{kind}_{mac}` of the owning device
    pub device_id: String,
    pub name: String,
    pub icon: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    pub state: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
}

impl EntityDescription {
    fn new(device: &DeviceDescriptor, platform: Platform, key: &str, icon: &'static str, state: Value) -> Self {
        let device_id = device.device_key();
        Self {
            platform,
            key: key.to_string(),
            unique_id: format!("{}-{}", device_id, key),
            device_id,
            name: format!("{} {}", device.name, title_case(key)),
            icon,
            unit: None,
            device_class: None,
            options: Vec::new(),
            min: None,
            max: None,
            state,
            attributes: None,
        }
    }

    fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    fn class(mut self, class: &'static str) -> Self {
        self.device_class = Some(class);
        self
    }

    fn options<I: IntoIterator<Item = S>, S: Into<String>>(mut self, options: I) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    fn range(mut self, (min, max): (i64, i64)) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    fn attributes(mut self, attributes: Value) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// All entities for a device, in a stable order
pub fn descriptions(device: &DeviceDescriptor) -> Vec<EntityDescription> {
    match &device.state {
        DeviceState::LitterBox(state) => litter_box(device, state),
        DeviceState::Feeder(state) => feeder(device, state),
        DeviceState::Fountain(state) => fountain(device, state),
    }
}

/// Map a write on entity `key` to a device action
pub fn action_for(key: &str, value: Option<&Value>) -> CommandResult<DeviceAction> {
    let text = || {
        value
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CommandError::InvalidOption {
                field: "value",
                value: value.map(Value::to_string).unwrap_or_default(),
            })
    };
    let number = || {
        value
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
            .ok_or_else(|| CommandError::InvalidOption {
                field: "value",
                value: value.map(Value::to_string).unwrap_or_default(),
            })
    };

    match key {
        "mode" => Ok(DeviceAction::SetMode(text()?)),
        "run_mode" => Ok(DeviceAction::SetRunMode(text()?)),
        "clean" => Ok(DeviceAction::Clean),
        "pause" => Ok(DeviceAction::Pause),
        "feed" => Ok(DeviceAction::Feed(value.map_or(Ok(1), |_| number())?)),
        "food_out_count" => Ok(DeviceAction::SetFoodOutCount(number()?)),
        "max_daily_food" => Ok(DeviceAction::SetMaxDailyFood(number()?)),
        other => Err(CommandError::InvalidOption {
            field: "entity",
            value: other.to_string(),
        }),
    }
}

fn error_entity(device: &DeviceDescriptor, error: Option<&str>) -> Option<EntityDescription> {
    error.map(|e| EntityDescription::new(device, Platform::Sensor, "error", "mdi:alert-circle", json!(e)))
}

fn online(device: &DeviceDescriptor, online: bool) -> EntityDescription {
    EntityDescription::new(device, Platform::BinarySensor, "online", "mdi:wifi", json!(online)).class("connectivity")
}

fn litter_box(device: &DeviceDescriptor, s: &LitterBoxState) -> Vec<EntityDescription> {
    use Platform::*;
    let mut out = vec![
        EntityDescription::new(device, Sensor, "state", "mdi:information", json!(s.work_status))
            .attributes(json!({"alarm": s.alarm, "mode": s.mode})),
        EntityDescription::new(device, Sensor, "litter_weight", "mdi:weight-kilogram", json!(s.litter_weight))
            .unit("kg")
            .class("weight")
            .attributes(json!({
                "empty_weight": device.settings.empty_weight,
                "max_samples": device.settings.max_samples_litter,
                "raw_weight": s.weight,
            })),
        EntityDescription::new(device, Sensor, "temperature", "mdi:thermometer", json!(s.temperature))
            .unit("°C")
            .class("temperature"),
        EntityDescription::new(device, Sensor, "humidity", "mdi:water-percent", json!(s.humidity))
            .unit("%")
            .class("humidity"),
        EntityDescription::new(device, Sensor, "induction_times", "mdi:cat", json!(s.induction_times)),
        EntityDescription::new(device, Sensor, "manual_times", "mdi:hand-back-left", json!(s.manual_times)),
        EntityDescription::new(device, Sensor, "litter_countdown", "mdi:calendar-clock", json!(s.litter_countdown))
            .unit("d"),
        EntityDescription::new(device, Sensor, "deodorant_countdown", "mdi:air-filter", json!(s.deodorant_countdown))
            .unit("d"),
        EntityDescription::new(device, Sensor, "last_log", "mdi:message", json!(s.last_log)),
        online(device, s.online),
        EntityDescription::new(device, Select, "mode", "mdi:menu", json!(s.mode))
            .options(MODES.iter().map(|(_, label)| *label)),
        EntityDescription::new(device, Button, "clean", "mdi:broom", Value::Null),
        EntityDescription::new(device, Button, "pause", "mdi:pause", Value::Null),
    ];
    out.extend(error_entity(device, s.error.as_deref()));
    out
}

fn feeder(device: &DeviceDescriptor, s: &FeederState) -> Vec<EntityDescription> {
    use Platform::*;
    let mut out = vec![
        EntityDescription::new(device, Sensor, "state", "mdi:food", json!(s.state)),
        EntityDescription::new(device, Sensor, "bowl_balance", "mdi:food-variant", json!(s.bowl_balance))
            .unit("g")
            .class("weight"),
        EntityDescription::new(device, Sensor, "last_log", "mdi:message", json!(s.last_log)),
        online(device, s.online),
    ];

    if s.mode.is_none() {
        out.push(
            EntityDescription::new(device, Sensor, "food_out_status", "mdi:food-turkey", json!(s.food_out_status))
                .attributes(json!({"auto_fill_status": s.auto_fill_status})),
        );
        out.push(EntityDescription::new(device, Button, "feed", "mdi:food-drumstick", Value::Null));
        out.extend(error_entity(device, s.error.as_deref()));
        return out;
    }

    out.extend([
        EntityDescription::new(device, Sensor, "total_food_intake", "mdi:food-apple", json!(s.total_food_intake))
            .unit("g"),
        EntityDescription::new(device, Sensor, "desiccant_countdown", "mdi:water-off", json!(s.desiccant_countdown))
            .unit("d"),
        EntityDescription::new(device, Sensor, "total_balance_desc", "mdi:food-drumstick", json!(s.total_balance_desc)),
        EntityDescription::new(device, BinarySensor, "key_lock", "mdi:lock", json!(s.key_lock)).class("lock"),
        EntityDescription::new(device, BinarySensor, "indicator_light", "mdi:led-on", json!(s.indicator_light))
            .class("light"),
        EntityDescription::new(device, BinarySensor, "night_mode", "mdi:weather-night", json!(s.night_mode)),
        EntityDescription::new(device, BinarySensor, "battery_installed", "mdi:battery", json!(s.battery_installed))
            .class("battery"),
        EntityDescription::new(device, Switch, "all_timing", "mdi:timer", json!(s.all_timing)),
        EntityDescription::new(device, Switch, "error_alert", "mdi:alert", json!(s.error_alert)),
        EntityDescription::new(device, Select, "mode", "mdi:menu", json!(s.mode.map(|m| m.label())))
            .options(FeederMode::ALL.iter().map(|m| m.label())),
        EntityDescription::new(device, Number, "food_out_count", "mdi:food", json!(s.food_out_count))
            .range(PORTION_RANGE),
    ]);
    if s.is_smart_mode() {
        out.push(
            EntityDescription::new(device, Number, "max_daily_food", "mdi:food-turkey", json!(s.max_daily_food))
                .range(PORTION_RANGE),
        );
    }

    if let Some(eating) = &s.eating {
        out.extend([
            EntityDescription::new(device, Sensor, "daily_actual_intake", "mdi:food-apple-outline", json!(eating.daily_intake))
                .unit("g")
                .attributes(json!({
                    "eating_events": eating.meals_today,
                    "last_event_time": eating.last_meal_time,
                    "last_event_amount": eating.last_meal_amount,
                    "average_per_meal": eating.average_meal,
                })),
            EntityDescription::new(device, Sensor, "eating_status", "mdi:cat", json!(eating.status))
                .attributes(json!({
                    "current_duration": eating.current_duration_secs,
                    "current_amount": eating.current_amount,
                    "stable_weight": eating.stable_weight,
                })),
            EntityDescription::new(device, Sensor, "bowl_weight_stable", "mdi:scale-balance", json!(eating.stable_weight))
                .unit("g")
                .class("weight")
                .attributes(json!({"raw_weight": s.bowl_balance})),
        ]);
    }

    out.extend(error_entity(device, s.error.as_deref()));
    out
}

fn fountain(device: &DeviceDescriptor, s: &FountainState) -> Vec<EntityDescription> {
    use Platform::*;
    let mut out = vec![
        EntityDescription::new(device, Sensor, "state", "mdi:water", json!(s.state))
            .attributes(json!({"run_mode": s.run_mode, "water_level_status": s.water_level_desc})),
        EntityDescription::new(device, Sensor, "water_level", "mdi:water-percent", json!(s.water_level)).unit("%"),
        EntityDescription::new(device, Sensor, "filter_countdown", "mdi:calendar-clock", json!(s.filter_countdown))
            .unit("d"),
        EntityDescription::new(device, Sensor, "water_quality", "mdi:water-check", json!(s.water_quality)),
        EntityDescription::new(device, Sensor, "last_log", "mdi:cat", json!(s.last_log)),
        online(device, s.online),
        EntityDescription::new(device, BinarySensor, "pure_locked", "mdi:lock", json!(s.locked)).class("lock"),
        EntityDescription::new(device, Select, "run_mode", "mdi:water-sync", json!(s.run_mode)).options(RUN_MODES),
    ];
    if let Some(temperature) = s.water_temperature {
        out.push(
            EntityDescription::new(device, Sensor, "water_temperature", "mdi:thermometer", json!(temperature))
                .unit("°C")
                .class("temperature"),
        );
    }
    if let Some(uv) = s.uv_light {
        out.push(EntityDescription::new(device, BinarySensor, "uv_light", "mdi:sun-wireless", json!(uv)).class("light"));
    }
    if let Some(heater) = s.water_heater {
        out.push(
            EntityDescription::new(device, BinarySensor, "water_heater", "mdi:water-boiler", json!(heater)).class("heat"),
        );
    }
    out.extend(error_entity(device, s.error.as_deref()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Object;
    use catlink_core::{DeviceKind, DeviceSettings};
    use chrono::Utc;

    fn device(kind: DeviceKind, state: DeviceState) -> DeviceDescriptor {
        DeviceDescriptor {
            id: "7".into(),
            kind,
            name: "Bowl".into(),
            mac: "aa:bb:cc:dd:ee:ff".into(),
            model: None,
            firmware: None,
            settings: DeviceSettings::default(),
            state,
            updated_at: Utc::now(),
        }
    }

    fn fresh2(model: i64) -> DeviceDescriptor {
        let detail = json!({"currentModel": model, "weight": 20}).as_object().cloned().unwrap();
        let state = FeederState::parse(DeviceKind::FeederPro, &Object::new(), &detail, None, Utc::now());
        device(DeviceKind::FeederPro, DeviceState::Feeder(state))
    }

    #[test]
    fn test_unique_ids() {
        let entities = descriptions(&fresh2(0));
        let bowl = entities.iter().find(|e| e.key == "bowl_balance").unwrap();
        assert_eq!(bowl.unique_id, "FEEDER_PRO_aa:bb:cc:dd:ee:ff-bowl_balance");
        assert_eq!(bowl.name, "Bowl Bowl Balance");
        assert_eq!(bowl.state, json!(20));

        let mut ids: Vec<_> = entities.iter().map(|e| e.unique_id.clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_max_daily_food_only_in_smart_mode() {
        let has = |d: &DeviceDescriptor| descriptions(d).iter().any(|e| e.key == "max_daily_food");
        assert!(has(&fresh2(0)));
        assert!(!has(&fresh2(1)));
    }

    #[test]
    fn test_fountain_optional_entities() {
        let detail = json!({"waterHeatSwitch": "OPEN"}).as_object().cloned().unwrap();
        let state = FountainState::parse(&Object::new(), &detail);
        let entities = descriptions(&device(DeviceKind::PurePro, DeviceState::Fountain(state)));
        assert!(entities.iter().any(|e| e.key == "water_heater" && e.state == json!(true)));
        assert!(!entities.iter().any(|e| e.key == "uv_light"));
        let select = entities.iter().find(|e| e.platform == Platform::Select).unwrap();
        assert_eq!(select.options.len(), 3);
    }

    #[test]
    fn test_action_for() {
        assert_eq!(
            action_for("mode", Some(&json!("auto"))),
            Ok(DeviceAction::SetMode("auto".into()))
        );
        assert_eq!(action_for("feed", None), Ok(DeviceAction::Feed(1)));
        assert_eq!(
            action_for("food_out_count", Some(&json!(3.0))),
            Ok(DeviceAction::SetFoodOutCount(3))
        );
        assert!(action_for("food_out_count", Some(&json!("x"))).is_err());
        assert!(action_for("bowl_balance", None).is_err());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("daily_actual_intake"), "Daily Actual Intake");
    }
}
