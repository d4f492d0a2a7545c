//! Registry and command errors

use catlink_core::DeviceKind;
use thiserror::Error;

/// A device payload that could not be turned into a descriptor
///
/// Only that device is skipped; the rest of the build continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown device type '{device_type}' for device {id}")]
    UnknownDeviceType { id: String, device_type: String },

    #[error("Device payload is missing '{0}'")]
    MissingField(&'static str),
}

/// A device action rejected before anything was sent
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("{action} is not supported by {kind} devices")]
    Unsupported { kind: DeviceKind, action: &'static str },

    #[error("Unknown option '{value}' for {field}")]
    InvalidOption { field: &'static str, value: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{0} is only available in smart mode")]
    RequiresSmartMode(&'static str),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
pub type CommandResult<T> = Result<T, CommandError>;
