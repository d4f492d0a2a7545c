//! Polling Coordinator
//!
//! One coordinator per account. The execution slot is a mutex around the
//! cloud session: poll cycles, commands and passthrough requests all take
//! it, so an account never has two cloud calls or logins in flight.
//!
//! ```text
//! Idle → Fetching → Updating → Idle
//!           ↘ Error → Fetching (next interval)
//! ```
//!
//! Triggers that arrive while a cycle runs join that cycle through a shared
//! future and observe the same result.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use catlink_client::{ClientError, ClientResult, CloudClient, CommandAck, RawDevice, Session};
use catlink_config_entries::AccountConfig;
use catlink_core::{clamp_interval, Account, ApiRequest, DeviceOverride};
use catlink_registry::{
    action_for, to_request, CommandError, DeviceAction, DeviceDescriptor, DeviceRegistry,
    EntityDescription,
};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{CoordinatorError, CoordinatorResult, PollError, PollResult};
use crate::events::{CoordinatorEvent, PollState};

/// Consecutive failures before entities become unavailable
pub const DEFAULT_UNAVAILABLE_AFTER: u32 = 1;

/// Result of one successful poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub devices: usize,
    /// Device ids seen for the first time
    pub added: Vec<String>,
    /// Payloads skipped by the registry builder
    pub skipped: usize,
    pub new_entities: usize,
}

type Cycle = Shared<BoxFuture<'static, PollResult<PollSummary>>>;

pub struct Coordinator {
    id: String,
    account: Account,
    overrides: Vec<DeviceOverride>,
    client: Arc<dyn CloudClient>,
    /// Execution slot
    session: Mutex<Option<Session>>,
    registry: RwLock<DeviceRegistry>,
    in_flight: Mutex<Option<Cycle>>,
    announced: Mutex<HashSet<String>>,
    state: watch::Sender<PollState>,
    events: broadcast::Sender<CoordinatorEvent>,
    shutdown_tx: broadcast::Sender<()>,
    failures: AtomicU32,
    unavailable_after: u32,
    available: AtomicBool,
    running: AtomicBool,
    closed: AtomicBool,
    last_error: std::sync::RwLock<Option<PollError>>,
}

impl Coordinator {
    pub fn new(
        config: AccountConfig,
        client: Arc<dyn CloudClient>,
        events: broadcast::Sender<CoordinatorEvent>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(PollState::Idle);
        let (shutdown_tx, _) = broadcast::channel(1);

        Arc::new(Self {
            id: config.id(),
            account: config.account,
            overrides: config.devices,
            client,
            session: Mutex::new(None),
            registry: RwLock::new(DeviceRegistry::new()),
            in_flight: Mutex::new(None),
            announced: Mutex::new(HashSet::new()),
            state,
            events,
            shutdown_tx,
            failures: AtomicU32::new(0),
            unavailable_after: DEFAULT_UNAVAILABLE_AFTER,
            available: AtomicBool::new(true),
            running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            last_error: std::sync::RwLock::new(None),
        })
    }

    /// Entry id, or `yaml:{unique_id}` for YAML-only accounts
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn overrides(&self) -> &[DeviceOverride] {
        &self.overrides
    }

    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn watch_state(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<PollError> {
        self.last_error.read().ok().and_then(|e| e.clone())
    }

    /// Cloned descriptors in discovery order
    pub async fn devices(&self) -> Vec<DeviceDescriptor> {
        self.registry.read().await.descriptors().cloned().collect()
    }

    pub async fn device(&self, device_id: &str) -> Option<DeviceDescriptor> {
        self.registry.read().await.get(device_id).cloned()
    }

    pub async fn entities(&self) -> Vec<EntityDescription> {
        self.registry.read().await.entity_descriptions()
    }

    /// Run a poll cycle now, or join the one in flight
    pub async fn refresh(self: &Arc<Self>) -> PollResult<PollSummary> {
        if self.is_closed() {
            return Err(PollError::Closed);
        }

        let cycle = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.as_ref() {
                Some(cycle) => {
                    debug!("{}: joining poll cycle in flight", self.id);
                    cycle.clone()
                }
                None => {
                    let this = Arc::clone(self);
                    let cycle = async move { this.run_cycle().await }.boxed().shared();
                    *in_flight = Some(cycle.clone());
                    cycle
                }
            }
        };
        cycle.await
    }

    async fn run_cycle(self: Arc<Self>) -> PollResult<PollSummary> {
        self.set_state(PollState::Fetching);

        // The slot stays held until the payloads are merged
        let result = {
            let mut slot = self.session.lock().await;
            let fetched = match self.session_for(&mut slot).await {
                Ok(session) => {
                    let result = self.client.list_devices(&session).await;
                    Self::drop_session_on_auth(&mut slot, result)
                }
                Err(e) => Err(e),
            };

            if self.is_closed() {
                debug!("{}: discarding poll result after unload", self.id);
                Err(PollError::Closed)
            } else {
                match fetched {
                    Ok(payloads) => {
                        self.set_state(PollState::Updating);
                        match self.apply(payloads).await {
                            Some(summary) => {
                                self.record_success();
                                Ok(summary)
                            }
                            None => Err(PollError::Closed),
                        }
                    }
                    Err(e) => {
                        let e = PollError::from(e);
                        self.record_failure(&e);
                        Err(e)
                    }
                }
            }
        };

        self.set_state(match &result {
            Ok(_) | Err(PollError::Closed) => PollState::Idle,
            Err(_) => PollState::Error,
        });
        *self.in_flight.lock().await = None;
        result
    }

    /// Cached session, logging in when there is none
    async fn session_for(&self, slot: &mut Option<Session>) -> ClientResult<Session> {
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }
        debug!("{}: logging in as {}", self.id, self.account.username());
        let session = self.client.authenticate(&self.account).await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    fn drop_session_on_auth<T>(slot: &mut Option<Session>, result: ClientResult<T>) -> ClientResult<T> {
        if let Err(e) = &result {
            if e.is_auth() {
                *slot = None;
            }
        }
        result
    }

    /// Update descriptors and notify; `None` when closed meanwhile
    async fn apply(&self, payloads: Vec<RawDevice>) -> Option<PollSummary> {
        let (report, devices, entities) = {
            let mut registry = self.registry.write().await;
            if self.is_closed() {
                debug!("{}: closed during fetch, dropping payloads", self.id);
                return None;
            }
            let report = registry.apply(
                &payloads,
                &self.overrides,
                &self.account.device_defaults,
                Utc::now(),
            );
            let devices: Vec<DeviceDescriptor> = registry.descriptors().cloned().collect();
            (report, devices, registry.entity_descriptions())
        };

        let new_entities: Vec<EntityDescription> = {
            let mut announced = self.announced.lock().await;
            entities
                .into_iter()
                .filter(|e| announced.insert(e.unique_id.clone()))
                .collect()
        };

        let summary = PollSummary {
            devices: report.device_count(),
            added: report.added.clone(),
            skipped: report.skipped.len(),
            new_entities: new_entities.len(),
        };
        debug!(
            "{}: {} devices, {} new entities",
            self.id, summary.devices, summary.new_entities
        );

        if !new_entities.is_empty() {
            self.emit(CoordinatorEvent::EntitiesAdded {
                coordinator: self.id.clone(),
                entities: new_entities,
            });
        }
        for (device_id, event) in report.eating_events {
            self.emit(CoordinatorEvent::MealFinished {
                coordinator: self.id.clone(),
                device_id,
                event,
            });
        }
        self.emit(CoordinatorEvent::DevicesUpdated {
            coordinator: self.id.clone(),
            devices,
        });
        Some(summary)
    }

    fn record_success(&self) {
        self.failures.store(0, Ordering::SeqCst);
        if let Ok(mut last) = self.last_error.write() {
            *last = None;
        }
        if !self.available.swap(true, Ordering::SeqCst) {
            info!("{}: cloud reachable again", self.id);
            self.emit(CoordinatorEvent::AvailabilityChanged {
                coordinator: self.id.clone(),
                available: true,
                error: None,
            });
        }
    }

    fn record_failure(&self, error: &PollError) {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        warn!("{}: poll failed ({} in a row): {}", self.id, failures, error);
        if let Ok(mut last) = self.last_error.write() {
            *last = Some(error.clone());
        }
        if failures >= self.unavailable_after && self.available.swap(false, Ordering::SeqCst) {
            self.emit(CoordinatorEvent::AvailabilityChanged {
                coordinator: self.id.clone(),
                available: false,
                error: Some(error.to_string()),
            });
        }
    }

    fn set_state(&self, state: PollState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("{}: {:?} -> {:?}", self.id, previous, state);
        }
    }

    fn emit(&self, event: CoordinatorEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Send one device action, then refresh once
    pub async fn send_command(
        self: &Arc<Self>,
        device_id: &str,
        action: DeviceAction,
    ) -> CoordinatorResult<CommandAck> {
        if self.is_closed() {
            return Err(CoordinatorError::Closed);
        }

        let ack = {
            let mut slot = self.session.lock().await;
            let request = {
                let registry = self.registry.read().await;
                let device = registry
                    .get(device_id)
                    .ok_or_else(|| CommandError::DeviceNotFound(device_id.to_string()))?;
                to_request(device, &action)?
            };
            let session = self.session_for(&mut slot).await?;
            let result = self.client.send_command(&session, device_id, &request).await;
            Self::drop_session_on_auth(&mut slot, result)?
        };
        info!("{}: {} sent to {}", self.id, action.name(), device_id);

        if let Err(e) = self.refresh().await {
            warn!("{}: refresh after {} failed: {}", self.id, action.name(), e);
        }
        Ok(ack)
    }

    /// Write to an entity by unique id (select option, number value, button press)
    pub async fn entity_command(
        self: &Arc<Self>,
        unique_id: &str,
        value: Option<&Value>,
    ) -> CoordinatorResult<CommandAck> {
        let found = {
            let registry = self.registry.read().await;
            let found = registry.descriptors().find_map(|d| {
                let key = unique_id.strip_prefix(&d.device_key())?.strip_prefix('-')?;
                Some((d.id.clone(), key.to_string()))
            });
            found
        };
        let (device_id, key) =
            found.ok_or_else(|| CoordinatorError::EntityNotFound(unique_id.to_string()))?;
        let action = action_for(&key, value)?;
        self.send_command(&device_id, action).await
    }

    /// Forward an arbitrary API call through the execution slot
    ///
    /// With `throw` unset a failure is logged and `{}` is returned.
    pub async fn request_api(&self, request: ApiRequest, throw: bool) -> CoordinatorResult<Value> {
        if self.is_closed() {
            return Err(CoordinatorError::Closed);
        }

        let result: Result<Value, ClientError> = {
            let mut slot = self.session.lock().await;
            match self.session_for(&mut slot).await {
                Ok(session) => {
                    let result = self.client.request(&session, &request).await;
                    Self::drop_session_on_auth(&mut slot, result)
                }
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(body) => Ok(body),
            Err(e) if !throw => {
                warn!("{}: {} {} failed: {}", self.id, request.method, request.path, e);
                Ok(json!({}))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start the interval timer; the first tick is one interval from now
    pub fn start(self: &Arc<Self>) {
        if self.is_closed() || self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let period = clamp_interval(self.account.scan_interval);
        let first_tick = Instant::now()
            .checked_add(period)
            .unwrap_or_else(Instant::now);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let this = Arc::clone(self);
        info!("{}: polling every {:?}", self.id, period);

        tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Failures are recorded by the cycle itself
                        let _ = this.refresh().await;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            this.running.store(false, Ordering::SeqCst);
            debug!("{}: timer stopped", this.id);
        });
    }

    /// Stop polling and drop all device state
    ///
    /// A cycle still in flight completes, but its result is discarded.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
        self.registry.write().await.clear();
        self.announced.lock().await.clear();
        info!("{}: closed", self.id);
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("id", &self.id)
            .field("account", &self.account.username())
            .field("state", &self.state())
            .field("available", &self.is_available())
            .finish()
    }
}
