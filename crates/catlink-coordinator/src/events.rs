//! Poll states and notifications sent to entity adapters

use catlink_registry::{DeviceDescriptor, EatingEvent, EntityDescription};
use serde::Serialize;

/// Lifecycle of one account's poll cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Fetching,
    Updating,
    /// Last cycle failed; retried on the next interval
    Error,
}

impl PollState {
    pub fn is_busy(&self) -> bool {
        matches!(self, PollState::Fetching | PollState::Updating)
    }
}

/// Broadcast to every subscriber of an integration
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorEvent {
    /// New snapshots after a successful cycle
    DevicesUpdated {
        coordinator: String,
        devices: Vec<DeviceDescriptor>,
    },
    /// Entities never announced before; each unique id appears once
    EntitiesAdded {
        coordinator: String,
        entities: Vec<EntityDescription>,
    },
    AvailabilityChanged {
        coordinator: String,
        available: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A feeder detected the end of a meal
    MealFinished {
        coordinator: String,
        device_id: String,
        event: EatingEvent,
    },
}

impl CoordinatorEvent {
    pub fn coordinator(&self) -> &str {
        match self {
            CoordinatorEvent::DevicesUpdated { coordinator, .. }
            | CoordinatorEvent::EntitiesAdded { coordinator, .. }
            | CoordinatorEvent::AvailabilityChanged { coordinator, .. }
            | CoordinatorEvent::MealFinished { coordinator, .. } => coordinator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_meal_event_serializes_with_type_tag() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let event = CoordinatorEvent::MealFinished {
            coordinator: "entry-1".into(),
            device_id: "303".into(),
            event: EatingEvent {
                start_time: at,
                end_time: at,
                start_weight: 50,
                end_weight: 40,
                amount: 10,
                duration_secs: 65,
                max_weight: 52,
            },
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "meal_finished");
        assert_eq!(value["event"]["amount"], 10);
        assert_eq!(event.coordinator(), "entry-1");

        let availability = CoordinatorEvent::AvailabilityChanged {
            coordinator: "entry-1".into(),
            available: true,
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&availability).unwrap(),
            json!({"type": "availability_changed", "coordinator": "entry-1", "available": true})
        );
    }
}
