//! Cloud client errors

use thiserror::Error;

/// Failure talking to the CatLink cloud
///
/// Clone so one failed poll can be handed to every coalesced caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Login refused or the session token expired
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection, timeout or HTTP status failure
    #[error("Network error: {0}")]
    Network(String),

    /// The response was not the JSON shape we expect
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The cloud answered with a non-zero `returnCode`
    #[error("Request rejected with code {code}: {message}")]
    Rejected { code: i64, message: String },
}

impl ClientError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Malformed(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
