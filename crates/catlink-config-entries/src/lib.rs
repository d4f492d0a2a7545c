//! Config Entries
//!
//! Persisted, UI-managed CatLink accounts and everything that creates or
//! edits them.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - One persisted account configuration
//! - [`ConfigEntries`] - Manager for all entries, backed by `.storage`
//! - [`ConfigFlow`] / [`OptionsFlow`] - The setup wizard and the options editor
//! - [`ConfigStore`] - Merges YAML accounts with config entries
//!
//! # Storage
//!
//! Entries are persisted in `.storage/catlink.config_entries` with version
//! tracking. Lifecycle state is kept in memory only.

mod account;
pub mod entry;
pub mod flow;
pub mod manager;
pub mod state_machine;
pub mod storage;
pub mod store;

pub use account::{account_from_entry, device_overrides_from_entry};
pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryUpdate};
pub use flow::{
    AbortReason, ConfigFlow, CredentialValidator, FlowResult, FlowStep, FormErrors, OptionsFlow,
    UserInput, ValidationError,
};
pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, STORAGE_KEY,
    STORAGE_MINOR_VERSION, STORAGE_VERSION,
};
pub use state_machine::{ConfigEntryState, InvalidTransition};
pub use storage::{Storable, Storage, StorageError, StorageResult};
pub use store::{AccountConfig, AccountOrigin, ConfigStore, MergeReport};
