//! Cloud client trait and its reqwest implementation

use std::time::Duration;

use async_trait::async_trait;
use catlink_core::{Account, ApiRequest, DeviceKind, HttpMethod};
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::endpoints::{self, Endpoint};
use crate::error::{ClientError, ClientResult};
use crate::types::{check_session, check_success, return_code, CommandAck, RawDevice, Session};

/// Access to the CatLink cloud
///
/// Implementations must not hold any per-account state: the caller owns the
/// [`Session`] and serialises calls for one account.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Log in and open a session
    async fn authenticate(&self, account: &Account) -> ClientResult<Session>;

    /// All devices of the account, each with its `detail` (and `logs`) embedded
    async fn list_devices(&self, session: &Session) -> ClientResult<Vec<RawDevice>>;

    /// Send one command; a non-zero `returnCode` is an error
    async fn send_command(
        &self,
        session: &Session,
        device_id: &str,
        request: &ApiRequest,
    ) -> ClientResult<CommandAck>;

    /// Raw passthrough; returns the response body as-is once the session is accepted
    async fn request(&self, session: &Session, request: &ApiRequest) -> ClientResult<Value>;
}

/// [`CloudClient`] over HTTPS
pub struct HttpCloudClient {
    http: Client,
}

impl HttpCloudClient {
    pub const TIMEOUT: Duration = Duration::from_secs(30);
    const USER_AGENT: &'static str = "okhttp/3.10.0";
    const PLATFORM: &'static str = "ANDROID";

    pub fn new() -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(Self::TIMEOUT)
            .user_agent(Self::USER_AGENT)
            .build()?;
        Ok(Self { http })
    }

    async fn call(
        &self,
        url: String,
        language: &str,
        token: Option<&str>,
        request: &ApiRequest,
    ) -> ClientResult<Value> {
        let mut params = request.string_params();
        if let Some(token) = token {
            params.push(("token".to_string(), token.to_string()));
        }
        let now = Utc::now().timestamp_millis().to_string();
        params.push(("noncestr".to_string(), now.clone()));
        params.push(("timestamp".to_string(), now));

        trace!("{} {} {:?}", request.method, url, request.params);
        let builder = match request.method {
            HttpMethod::Get => self.http.get(&url).query(&params),
            HttpMethod::Post => self.http.post(&url).form(&params),
        };
        let response = builder.header("language", language).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::Auth(format!("HTTP {} from {}", status, url)));
        }
        if !status.is_success() {
            return Err(ClientError::Network(format!("HTTP {} from {}", status, url)));
        }

        let body: Value = response.json().await?;
        if !body.is_object() {
            return Err(ClientError::Malformed(format!("expected a JSON object from {}", url)));
        }
        Ok(body)
    }

    async fn session_call(&self, session: &Session, request: &ApiRequest) -> ClientResult<Value> {
        let body = self
            .call(
                session.api_base.join(&request.path),
                session.language.code(),
                Some(&session.token),
                request,
            )
            .await?;
        check_session(&body)?;
        Ok(body)
    }

    /// `data.{key}` of a successful response, `Null` otherwise
    async fn fetch_payload(
        &self,
        session: &Session,
        endpoint: Endpoint,
        device_id: &str,
    ) -> ClientResult<Value> {
        let request = ApiRequest::get(endpoint.path).param(endpoints::DEVICE_ID, device_id);
        let body = self.session_call(session, &request).await?;
        if return_code(&body) != 0 {
            warn!("{} for {} returned {}", endpoint.path, device_id, body);
            return Ok(Value::Null);
        }
        Ok(body
            .get("data")
            .and_then(|d| d.get(endpoint.data_key))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Embed `detail` and `logs` into one device object
    async fn enrich(&self, session: &Session, device: &mut RawDevice) -> ClientResult<()> {
        let Some(kind) = device
            .get("deviceType")
            .and_then(Value::as_str)
            .and_then(DeviceKind::from_device_type)
        else {
            return Ok(());
        };
        let Some(id) = device_id(device) else {
            return Ok(());
        };

        match self.fetch_payload(session, endpoints::detail(kind), &id).await {
            Ok(detail) => {
                device.insert("detail".to_string(), detail);
            }
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => warn!("Fetching detail of {} {} failed: {}", kind, id, e),
        }

        if let Some(endpoint) = endpoints::logs(kind) {
            match self.fetch_payload(session, endpoint, &id).await {
                Ok(logs) => {
                    device.insert("logs".to_string(), logs);
                }
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => debug!("Fetching logs of {} {} failed: {}", kind, id, e),
            }
        }
        Ok(())
    }
}

fn device_id(device: &RawDevice) -> Option<String> {
    match device.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl CloudClient for HttpCloudClient {
    async fn authenticate(&self, account: &Account) -> ClientResult<Session> {
        let request = ApiRequest::post(endpoints::LOGIN)
            .param("platform", Self::PLATFORM)
            .param("internationalCode", account.phone_iac.as_str())
            .param("mobile", account.phone.as_str())
            .param("password", account.password.as_str());

        let body = self
            .call(
                account.api_base.join(endpoints::LOGIN),
                account.language.code(),
                None,
                &request,
            )
            .await?;

        if return_code(&body) != 0 {
            return Err(ClientError::Auth(format!(
                "login refused for {}: {}",
                account.username(),
                body.get("msg").and_then(Value::as_str).unwrap_or_default()
            )));
        }
        let token = body
            .get("data")
            .and_then(|d| d.get("token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ClientError::Malformed("login response without token".to_string()))?;

        debug!("Logged in as {}", account.username());
        Ok(Session {
            token: token.to_string(),
            username: account.username(),
            api_base: account.api_base.clone(),
            language: account.language,
        })
    }

    async fn list_devices(&self, session: &Session) -> ClientResult<Vec<RawDevice>> {
        let request = ApiRequest::get(endpoints::DEVICE_LIST).param("type", "NONE");
        let body = self.session_call(session, &request).await?;
        check_success(&body)?;

        let devices = body
            .get("data")
            .and_then(|d| d.get("devices"))
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::Malformed("device list without data.devices".to_string()))?;

        let mut result = Vec::with_capacity(devices.len());
        for device in devices {
            let Some(object) = device.as_object() else {
                warn!("Ignoring non-object device entry: {}", device);
                continue;
            };
            let mut raw = object.clone();
            self.enrich(session, &mut raw).await?;
            result.push(raw);
        }
        debug!("Listed {} devices for {}", result.len(), session.username);
        Ok(result)
    }

    async fn send_command(
        &self,
        session: &Session,
        device_id: &str,
        request: &ApiRequest,
    ) -> ClientResult<CommandAck> {
        let body = self.session_call(session, request).await?;
        check_success(&body)?;
        debug!("Command {} accepted for {}", request.path, device_id);
        Ok(CommandAck {
            return_code: 0,
            data: body.get("data").cloned().unwrap_or(Value::Null),
        })
    }

    async fn request(&self, session: &Session, request: &ApiRequest) -> ClientResult<Value> {
        self.session_call(session, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_id_forms() {
        let device = |v: Value| v.as_object().cloned().unwrap();
        assert_eq!(device_id(&device(json!({"id": "abc"}))), Some("abc".to_string()));
        assert_eq!(device_id(&device(json!({"id": 42}))), Some("42".to_string()));
        assert_eq!(device_id(&device(json!({"id": ""}))), None);
        assert_eq!(device_id(&device(json!({}))), None);
    }

    #[test]
    fn test_client_builds() {
        assert!(HttpCloudClient::new().is_ok());
    }

    #[test]
    fn test_endpoint_table() {
        assert_eq!(
            endpoints::detail(DeviceKind::FeederPro).path,
            "token/device/feederpro/detail"
        );
        assert_eq!(
            endpoints::logs(DeviceKind::PurePro).map(|e| e.data_key),
            Some("pureLogTop5")
        );
        assert!(endpoints::logs(DeviceKind::Feeder).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = HttpCloudClient::new().unwrap();
        let account = catlink_core::Account::new("138", "pw")
            .with_api_base(catlink_core::ApiBase::new("http://127.0.0.1:9"));
        let err = client.authenticate(&account).await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }
}
