//! Session and payload types

use std::fmt;

use catlink_core::{ApiBase, Language};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// One device object from the device list, with `detail` and `logs` embedded
pub type RawDevice = serde_json::Map<String, Value>;

/// `returnCode` values meaning the session token is no longer valid
pub const TOKEN_ERROR_CODES: [i64; 2] = [1002, 1003];

/// An authenticated cloud session
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    /// `"{iac}-{phone}"`
    pub username: String,
    pub api_base: ApiBase,
    pub language: Language,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("api_base", &self.api_base)
            .field("language", &self.language)
            .finish()
    }
}

/// Acknowledgement of an accepted command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    pub return_code: i64,
    #[serde(default)]
    pub data: Value,
}

/// `returnCode` of a response; absent means success
pub fn return_code(body: &Value) -> i64 {
    match body.get("returnCode") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(-1),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(-1),
        _ => 0,
    }
}

fn message(body: &Value) -> String {
    body.get("msg")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Fail on token errors; other codes are left to the caller
pub fn check_session(body: &Value) -> ClientResult<()> {
    let code = return_code(body);
    if TOKEN_ERROR_CODES.contains(&code) {
        return Err(ClientError::Auth(format!(
            "token rejected ({}): {}",
            code,
            message(body)
        )));
    }
    Ok(())
}

/// Fail on any non-zero `returnCode`
pub fn check_success(body: &Value) -> ClientResult<()> {
    check_session(body)?;
    match return_code(body) {
        0 => Ok(()),
        code => Err(ClientError::Rejected {
            code,
            message: message(body),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_return_code_variants() {
        assert_eq!(return_code(&json!({"returnCode": 0})), 0);
        assert_eq!(return_code(&json!({"returnCode": "1002"})), 1002);
        assert_eq!(return_code(&json!({"data": {}})), 0);
        assert_eq!(return_code(&json!({"returnCode": "x"})), -1);
    }

    #[test]
    fn test_check_success() {
        assert!(check_success(&json!({"returnCode": 0, "data": {}})).is_ok());
        assert!(matches!(
            check_success(&json!({"returnCode": 1002, "msg": "expired"})),
            Err(ClientError::Auth(_))
        ));
        assert_eq!(
            check_success(&json!({"returnCode": 5, "msg": "busy"})),
            Err(ClientError::Rejected {
                code: 5,
                message: "busy".to_string()
            })
        );
        // Non-token failures pass the session check
        assert!(check_session(&json!({"returnCode": 5})).is_ok());
    }

    #[test]
    fn test_session_debug_redacts_token() {
        let session = Session {
            token: "secret-token".to_string(),
            username: "86-138".to_string(),
            api_base: ApiBase::default(),
            language: Language::default(),
        };
        let debug = format!("{:?}", session);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("86-138"));
    }
}
