//! Credential validation through the cloud client

use std::sync::Arc;

use async_trait::async_trait;
use catlink_client::{ClientError, CloudClient};
use catlink_config_entries::{CredentialValidator, ValidationError};
use catlink_core::Account;
use tracing::debug;

/// Validates config flow credentials by logging in
pub struct ClientValidator {
    client: Arc<dyn CloudClient>,
}

impl ClientValidator {
    pub fn new(client: Arc<dyn CloudClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialValidator for ClientValidator {
    async fn validate(&self, account: &Account) -> Result<(), ValidationError> {
        match self.client.authenticate(account).await {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!("Credential check for {} failed: {}", account.username(), e);
                Err(match e {
                    ClientError::Auth(_) => ValidationError::InvalidAuth,
                    ClientError::Network(_) => ValidationError::CannotConnect,
                    other => ValidationError::Unknown(other.to_string()),
                })
            }
        }
    }
}
