//! Device actions and the API requests they map to

use catlink_core::{ApiRequest, DeviceKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::DeviceDescriptor;
use crate::error::{CommandError, CommandResult};
use crate::feeder::{FeederMode, FeederState};
use crate::fountain::run_mode_for;
use crate::litter_box::{code_for, ACTIONS, MODES};

const DEVICE_ID: &str = "deviceId";

/// Range accepted for feeder portion counts
pub const PORTION_RANGE: (i64, i64) = (0, 999);

/// Something a user asks a device to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum DeviceAction {
    /// Litter box mode label or feeder mode label
    SetMode(String),
    /// Fountain run mode
    SetRunMode(String),
    Clean,
    Pause,
    /// Dispense portions now (original feeder)
    Feed(i64),
    SetFoodOutCount(i64),
    SetMaxDailyFood(i64),
}

impl DeviceAction {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceAction::SetMode(_) => "set_mode",
            DeviceAction::SetRunMode(_) => "set_run_mode",
            DeviceAction::Clean => "clean",
            DeviceAction::Pause => "pause",
            DeviceAction::Feed(_) => "feed",
            DeviceAction::SetFoodOutCount(_) => "set_food_out_count",
            DeviceAction::SetMaxDailyFood(_) => "set_max_daily_food",
        }
    }
}

/// Validate an action against the device and build its request
pub fn to_request(device: &DeviceDescriptor, action: &DeviceAction) -> CommandResult<ApiRequest> {
    let unsupported = || CommandError::Unsupported {
        kind: device.kind,
        action: action.name(),
    };

    let request = match (device.kind, action) {
        (kind, DeviceAction::SetMode(label)) if kind.is_litter_box() => {
            let code = code_for(&MODES, label).ok_or_else(|| CommandError::InvalidOption {
                field: "mode",
                value: label.clone(),
            })?;
            ApiRequest::post(litter_path(kind, "changeMode"))
                .param(DEVICE_ID, device.id.as_str())
                .param("workModel", code)
        }
        (kind, DeviceAction::Clean | DeviceAction::Pause) if kind.is_litter_box() => {
            let label = if *action == DeviceAction::Clean { "clean" } else { "pause" };
            let code = code_for(&ACTIONS, label).ok_or_else(unsupported)?;
            ApiRequest::post(litter_path(kind, "actionCmd"))
                .param(DEVICE_ID, device.id.as_str())
                .param("cmd", code)
        }
        (DeviceKind::FeederPro, DeviceAction::SetMode(label)) => {
            let mode = FeederMode::from_label(label).ok_or_else(|| CommandError::InvalidOption {
                field: "mode",
                value: label.clone(),
            })?;
            let state = feeder_state(device)?;
            switch_mode(device, mode, state.food_out_count, state.max_daily_food, state)
        }
        (DeviceKind::FeederPro, DeviceAction::SetFoodOutCount(count)) => {
            let count = in_range("food_out_count", *count)?;
            let state = feeder_state(device)?;
            let mode = state.mode.unwrap_or(FeederMode::Smart);
            switch_mode(device, mode, count, state.max_daily_food, state)
        }
        (DeviceKind::FeederPro, DeviceAction::SetMaxDailyFood(max)) => {
            let max = in_range("max_daily_food", *max)?;
            let state = feeder_state(device)?;
            if !state.is_smart_mode() {
                return Err(CommandError::RequiresSmartMode("max_daily_food"));
            }
            switch_mode(device, FeederMode::Smart, state.food_out_count, max, state)
        }
        (DeviceKind::Feeder, DeviceAction::Feed(portions)) => {
            let portions = in_range("portions", *portions)?;
            ApiRequest::post("token/device/feeder/foodOut")
                .param(DEVICE_ID, device.id.as_str())
                .param("footOutNum", portions)
        }
        (DeviceKind::PurePro, DeviceAction::SetRunMode(mode)) => {
            let mode = run_mode_for(mode).ok_or_else(|| CommandError::InvalidOption {
                field: "run_mode",
                value: mode.clone(),
            })?;
            ApiRequest::post("token/device/purepro/runMode")
                .param(DEVICE_ID, device.id.as_str())
                .param("runMode", mode)
        }
        _ => return Err(unsupported()),
    };

    debug!("{} on {} -> {}", action.name(), device.id, request.path);
    Ok(request)
}

fn litter_path(kind: DeviceKind, command: &str) -> String {
    match kind {
        DeviceKind::LitterBox599 => format!("token/litterbox/{}", command),
        _ => format!("token/device/{}", command),
    }
}

fn feeder_state(device: &DeviceDescriptor) -> CommandResult<&FeederState> {
    device.feeder().ok_or(CommandError::Unsupported {
        kind: device.kind,
        action: "feeder",
    })
}

fn in_range(field: &'static str, value: i64) -> CommandResult<i64> {
    let (min, max) = PORTION_RANGE;
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(CommandError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Fresh2 settings are always written together through `switchMode/v2`
fn switch_mode(
    device: &DeviceDescriptor,
    mode: FeederMode,
    food_out_count: i64,
    max_food: i64,
    state: &FeederState,
) -> ApiRequest {
    let request = ApiRequest::post("token/device/feederpro/switchMode/v2")
        .param(DEVICE_ID, device.id.as_str())
        .param("feederproRunMode", mode.run_mode())
        .param("foodOutCount", food_out_count);
    match mode {
        FeederMode::Smart => request
            .param("foodBalance", state.food_balance_limit)
            .param("maxFood", max_food),
        FeederMode::Timing => request,
    }
}
