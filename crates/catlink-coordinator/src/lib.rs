//! Polling coordinators for the CatLink bridge
//!
//! # Key Types
//!
//! - [`Coordinator`] - Polls one account, owns its device descriptors
//! - [`Integration`] - Coordinators keyed by config entry id
//! - [`ClientValidator`] - Config flow credential checks through the cloud client

mod coordinator;
mod error;
mod events;
mod integration;
mod validator;

pub use coordinator::{Coordinator, PollSummary, DEFAULT_UNAVAILABLE_AFTER};
pub use error::{CoordinatorError, CoordinatorResult, PollError, PollResult};
pub use events::{CoordinatorEvent, PollState};
pub use integration::{Integration, SetupSummary};
pub use validator::ClientValidator;
