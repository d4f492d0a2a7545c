//! Integration: active coordinators keyed by config entry id

use std::sync::Arc;

use catlink_client::CloudClient;
use catlink_config::CatlinkYaml;
use catlink_config_entries::{AccountConfig, ConfigEntries, ConfigEntryState, ConfigStore};
use catlink_core::AccountKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::coordinator::Coordinator;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::events::CoordinatorEvent;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Outcome of [`Integration::setup_all`]
#[derive(Debug, Default)]
pub struct SetupSummary {
    pub loaded: Vec<String>,
    /// Entry id (or account label) and the reason
    pub failed: Vec<(String, String)>,
}

pub struct Integration {
    store: Arc<ConfigStore>,
    yaml: CatlinkYaml,
    client: Arc<dyn CloudClient>,
    coordinators: DashMap<String, Arc<Coordinator>>,
    /// Coordinator id owning each account, one per `(username, api_base)`
    accounts: DashMap<AccountKey, String>,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl Integration {
    pub fn new(store: Arc<ConfigStore>, yaml: CatlinkYaml, client: Arc<dyn CloudClient>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            yaml,
            client,
            coordinators: DashMap::new(),
            accounts: DashMap::new(),
            events,
        }
    }

    fn entries(&self) -> &Arc<ConfigEntries> {
        self.store.entries()
    }

    /// Events from every coordinator
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Coordinator>> {
        self.coordinators.get(id).map(|c| Arc::clone(c.value()))
    }

    pub fn coordinator_ids(&self) -> Vec<String> {
        self.coordinators.iter().map(|c| c.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.coordinators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty()
    }

    /// Set up one config entry
    ///
    /// Only a configuration error fails setup. A failed first refresh leaves
    /// the coordinator loaded in `Error`, retrying on its interval.
    pub async fn setup_entry(&self, entry_id: &str) -> CoordinatorResult<Arc<Coordinator>> {
        if self.coordinators.contains_key(entry_id) {
            return Err(CoordinatorError::AlreadyLoaded(entry_id.to_string()));
        }
        self.entries()
            .set_state(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let config = match self.store.resolve_entry(entry_id, &self.yaml) {
            Ok(config) => config,
            Err(e) => {
                error!("Setup of entry {} failed: {}", entry_id, e);
                self.entries()
                    .set_state(entry_id, ConfigEntryState::SetupError, Some(e.to_string()))?;
                return Err(e.into());
            }
        };

        if let Err(e) = self.reserve(&config) {
            warn!("Setup of entry {} skipped: {}", entry_id, e);
            self.entries()
                .set_state(entry_id, ConfigEntryState::SetupError, Some(e.to_string()))?;
            return Err(e);
        }

        let coordinator = self.start(config).await;
        self.entries()
            .set_state(entry_id, ConfigEntryState::Loaded, None)?;
        Ok(coordinator)
    }

    /// Set up an account that has no config entry
    pub async fn setup_account(&self, config: AccountConfig) -> CoordinatorResult<Arc<Coordinator>> {
        if let Some(entry_id) = &config.entry_id {
            return self.setup_entry(entry_id).await;
        }
        if self.coordinators.contains_key(&config.id()) {
            return Err(CoordinatorError::AlreadyLoaded(config.id()));
        }
        self.reserve(&config)?;
        Ok(self.start(config).await)
    }

    /// Claim the account for this config; a second claim is rejected
    fn reserve(&self, config: &AccountConfig) -> CoordinatorResult<()> {
        match self.accounts.entry(config.account.key()) {
            Entry::Occupied(owner) => Err(CoordinatorError::DuplicateAccount {
                account: owner.key().to_string(),
                loaded_by: owner.get().clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(config.id());
                Ok(())
            }
        }
    }

    async fn start(&self, config: AccountConfig) -> Arc<Coordinator> {
        let coordinator = Coordinator::new(config, Arc::clone(&self.client), self.events.clone());
        let id = coordinator.id().to_string();

        match coordinator.refresh().await {
            Ok(summary) => info!("{}: first refresh found {} devices", id, summary.devices),
            Err(e) => warn!("{}: first refresh failed, will retry: {}", id, e),
        }
        coordinator.start();
        self.coordinators.insert(id, Arc::clone(&coordinator));
        coordinator
    }

    /// Set up every config entry plus YAML-only accounts
    pub async fn setup_all(&self) -> SetupSummary {
        let mut summary = SetupSummary::default();

        for entry in self.entries().entries() {
            match self.setup_entry(&entry.entry_id).await {
                Ok(c) => summary.loaded.push(c.id().to_string()),
                Err(e) => summary.failed.push((entry.entry_id.clone(), e.to_string())),
            }
        }

        let merged = self.store.merge(&self.yaml);
        for config in merged.accounts.into_iter().filter(|c| c.entry_id.is_none()) {
            let id = config.id();
            match self.setup_account(config).await {
                Ok(c) => summary.loaded.push(c.id().to_string()),
                Err(e) => summary.failed.push((id, e.to_string())),
            }
        }

        info!(
            "Set up {} account(s), {} failed",
            summary.loaded.len(),
            summary.failed.len()
        );
        summary
    }

    /// Stop and drop one coordinator; returns whether it was loaded
    pub async fn unload_entry(&self, id: &str) -> CoordinatorResult<bool> {
        let entry_state = self.entries().get(id).map(|e| e.state);
        if let Some(state) = entry_state {
            if !matches!(state, ConfigEntryState::Loaded | ConfigEntryState::SetupError) {
                return Ok(false);
            }
            self.entries()
                .set_state(id, ConfigEntryState::UnloadInProgress, None)?;
        }

        let removed = self.coordinators.remove(id);
        if let Some((_, coordinator)) = &removed {
            coordinator.close().await;
            self.accounts
                .remove_if(&coordinator.account().key(), |_, owner| owner == id);
        }

        if entry_state.is_some() {
            self.entries().set_state(id, ConfigEntryState::NotLoaded, None)?;
        }
        info!("Unloaded {}", id);
        Ok(removed.is_some())
    }

    /// Unload and set up again, picking up changed options
    pub async fn reload_entry(&self, entry_id: &str) -> CoordinatorResult<Arc<Coordinator>> {
        self.unload_entry(entry_id).await?;
        self.setup_entry(entry_id).await
    }

    pub async fn shutdown(&self) {
        for id in self.coordinator_ids() {
            if let Err(e) = self.unload_entry(&id).await {
                warn!("Unloading {} failed: {}", id, e);
            }
        }
        info!("Integration stopped");
    }
}
