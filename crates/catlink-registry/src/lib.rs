//! Device registry for the CatLink bridge
//!
//! Builds typed [`DeviceDescriptor`]s from raw cloud payloads, describes the
//! entities each device exposes and maps device actions to API requests.

pub mod actions;
pub mod descriptor;
pub mod eating;
pub mod entities;
pub mod error;
pub mod feeder;
pub mod fountain;
pub mod litter_box;
pub mod payload;
pub mod registry;

pub use actions::{to_request, DeviceAction};
pub use descriptor::{DeviceDescriptor, DeviceIdentity, DeviceState};
pub use eating::{EatingConfig, EatingDetector, EatingEvent, EatingPhase};
pub use entities::{action_for, descriptions, EntityDescription, Platform};
pub use error::{CommandError, CommandResult, RegistryError, RegistryResult};
pub use feeder::{EatingSummary, FeederMode, FeederState};
pub use fountain::FountainState;
pub use litter_box::LitterBoxState;
pub use registry::{build_descriptors, BuildReport, DeviceRegistry};
