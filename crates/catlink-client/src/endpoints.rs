//! Cloud API paths

use catlink_core::DeviceKind;

pub const LOGIN: &str = "login/password";
pub const DEVICE_LIST: &str = "token/device/union/list/sorted";

/// Request parameter naming the target device
pub const DEVICE_ID: &str = "deviceId";

/// Where a detail or log payload lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub path: &'static str,
    /// Key under `data` holding the payload
    pub data_key: &'static str,
}

/// Per-kind detail endpoint
pub fn detail(kind: DeviceKind) -> Endpoint {
    match kind {
        DeviceKind::Scooper => Endpoint {
            path: "token/device/info",
            data_key: "deviceInfo",
        },
        DeviceKind::LitterBox599 => Endpoint {
            path: "token/litterbox/info",
            data_key: "info",
        },
        DeviceKind::Feeder => Endpoint {
            path: "token/device/feeder/detail",
            data_key: "deviceInfo",
        },
        DeviceKind::FeederPro => Endpoint {
            path: "token/device/feederpro/detail",
            data_key: "deviceInfo",
        },
        DeviceKind::PurePro => Endpoint {
            path: "token/device/purepro/detail",
            data_key: "deviceInfo",
        },
    }
}

/// Per-kind recent log endpoint, where the cloud offers one
pub fn logs(kind: DeviceKind) -> Option<Endpoint> {
    match kind {
        DeviceKind::Scooper => Some(Endpoint {
            path: "token/device/scooper/stats/log/top5",
            data_key: "scooperLogTop5",
        }),
        DeviceKind::FeederPro => Some(Endpoint {
            path: "token/device/feederpro/stats/log/top5",
            data_key: "feederLogTop5",
        }),
        DeviceKind::PurePro => Some(Endpoint {
            path: "token/device/purepro/stats/log/top5",
            data_key: "pureLogTop5",
        }),
        DeviceKind::LitterBox599 | DeviceKind::Feeder => None,
    }
}
