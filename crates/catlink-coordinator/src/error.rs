//! Coordinator errors

use catlink_client::ClientError;
use catlink_config::ConfigError;
use catlink_config_entries::ConfigEntriesError;
use catlink_registry::CommandError;
use thiserror::Error;

/// Outcome of a failed poll cycle
///
/// Clone so every caller coalesced into the same cycle gets the same error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The coordinator was closed while the cycle ran
    #[error("Coordinator closed")]
    Closed,
}

impl PollError {
    pub fn is_auth(&self) -> bool {
        matches!(self, PollError::Client(e) if e.is_auth())
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Entry already loaded: {0}")]
    AlreadyLoaded(String),

    /// Another entry already polls the same account
    #[error("Account {account} is already loaded by {loaded_by}")]
    DuplicateAccount { account: String, loaded_by: String },

    #[error("Coordinator closed")]
    Closed,
}

pub type PollResult<T> = Result<T, PollError>;
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
