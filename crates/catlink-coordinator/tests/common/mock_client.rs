//! Scripted cloud client
//!
//! Device list responses are popped from a queue; once it is empty the
//! default list is returned. Every call is counted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use catlink_client::{ClientResult, CloudClient, CommandAck, RawDevice, Session};
use catlink_core::{Account, ApiRequest};
use serde_json::{json, Value};
use tokio::sync::Notify;

#[derive(Default)]
pub struct MockCloudClient {
    pub logins: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub commands: Mutex<Vec<(String, ApiRequest)>>,
    pub requests: Mutex<Vec<ApiRequest>>,
    login_results: Mutex<VecDeque<ClientResult<()>>>,
    list_results: Mutex<VecDeque<ClientResult<Vec<RawDevice>>>>,
    request_results: Mutex<VecDeque<ClientResult<Value>>>,
    devices: Mutex<Vec<RawDevice>>,
    delay: Mutex<Option<Duration>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockCloudClient {
    pub fn new(devices: Vec<RawDevice>) -> Arc<Self> {
        let client = Self::default();
        *client.devices.lock().unwrap() = devices;
        Arc::new(client)
    }

    pub fn push_login(&self, result: ClientResult<()>) {
        self.login_results.lock().unwrap().push_back(result);
    }

    pub fn push_list(&self, result: ClientResult<Vec<RawDevice>>) {
        self.list_results.lock().unwrap().push_back(result);
    }

    pub fn push_request(&self, result: ClientResult<Value>) {
        self.request_results.lock().unwrap().push_back(result);
    }

    /// Each device list call sleeps this long
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Device list calls wait until the returned handle is notified
    pub fn hold_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Let held and future device list calls through
    pub fn release_fetches(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.notify_waiters();
        }
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Yield until a device list call has started
    pub async fn wait_for_fetch(&self, calls: usize) {
        while self.list_calls() < calls {
            tokio::task::yield_now().await;
        }
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }
}

#[async_trait]
impl CloudClient for MockCloudClient {
    async fn authenticate(&self, account: &Account) -> ClientResult<Session> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(result) = self.login_results.lock().unwrap().pop_front() {
            result?;
        }
        Ok(Session {
            token: format!("token-{}", n),
            username: account.username(),
            api_base: account.api_base.clone(),
            language: account.language,
        })
    }

    async fn list_devices(&self, _session: &Session) -> ClientResult<Vec<RawDevice>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.list_results.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(self.devices.lock().unwrap().clone()),
        }
    }

    async fn send_command(
        &self,
        _session: &Session,
        device_id: &str,
        request: &ApiRequest,
    ) -> ClientResult<CommandAck> {
        self.commands
            .lock()
            .unwrap()
            .push((device_id.to_string(), request.clone()));
        Ok(CommandAck {
            return_code: 0,
            data: json!({}),
        })
    }

    async fn request(&self, _session: &Session, request: &ApiRequest) -> ClientResult<Value> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = self.request_results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(json!({"returnCode": 0, "data": {}})))
    }
}
