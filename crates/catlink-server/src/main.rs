//! CatLink bridge server
//!
//! Loads `configuration.yaml` and the persisted config entries from the
//! config directory, sets up one coordinator per account and polls until
//! Ctrl-C.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use catlink_client::HttpCloudClient;
use catlink_config::{load_yaml, CatlinkYaml};
use catlink_config_entries::{ConfigEntries, ConfigStore, Storage};
use catlink_coordinator::{ClientValidator, CoordinatorEvent, Integration};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "configuration.yaml";
const CONFIG_DIR_ENV: &str = "CATLINK_CONFIG";

/// Config directory from the first argument, `CATLINK_CONFIG`, or the cwd
fn config_dir() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_DIR_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn load_catlink_yaml(dir: &Path) -> Result<CatlinkYaml> {
    if !dir.join(CONFIG_FILE).exists() {
        info!("No {} in {:?}, using config entries only", CONFIG_FILE, dir);
        return Ok(CatlinkYaml::default());
    }
    let root = load_yaml(dir, CONFIG_FILE).context("loading configuration.yaml")?;
    let yaml = CatlinkYaml::from_root(&root)?;
    for rejected in &yaml.rejected {
        warn!("Rejected YAML account: {}", rejected);
    }
    Ok(yaml)
}

async fn log_events(integration: &Integration) {
    let mut events = integration.subscribe();
    loop {
        match events.recv().await {
            Ok(CoordinatorEvent::AvailabilityChanged {
                coordinator,
                available,
                error,
            }) => info!(
                "{} is {} {}",
                coordinator,
                if available { "available" } else { "unavailable" },
                error.unwrap_or_default()
            ),
            Ok(CoordinatorEvent::MealFinished {
                device_id, event, ..
            }) => info!(
                "Device {} finished a meal: {} g in {} s",
                device_id, event.amount, event.duration_secs
            ),
            Ok(event) => debug!(
                "{}",
                serde_json::to_string(&event).unwrap_or_else(|_| event.coordinator().to_string())
            ),
            Err(RecvError::Lagged(n)) => warn!("Event log lagged by {} events", n),
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let dir = config_dir();
    info!("Starting CatLink bridge with config directory {:?}", dir);

    let yaml = load_catlink_yaml(&dir)?;

    let entries = Arc::new(ConfigEntries::new(Arc::new(Storage::new(&dir))));
    entries.load().await.context("loading config entries")?;
    info!("Loaded {} config entries", entries.len());

    let client = Arc::new(HttpCloudClient::new()?);
    let validator = Arc::new(ClientValidator::new(client.clone()));
    let store = Arc::new(ConfigStore::new(entries, validator));

    if !yaml.accounts.is_empty() {
        let results = store.import_yaml(&yaml).await?;
        debug!("Imported {} YAML accounts", results.len());
    }

    let integration = Integration::new(store, yaml, client);
    let summary = integration.setup_all().await;
    for (id, reason) in &summary.failed {
        warn!("Account {} was not set up: {}", id, reason);
    }

    info!("CatLink bridge is running");
    tokio::select! {
        _ = log_events(&integration) => {}
        result = tokio::signal::ctrl_c() => result?,
    }

    info!("Shutting down...");
    integration.shutdown().await;
    Ok(())
}
