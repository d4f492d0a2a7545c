//! Cloud API request description

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// HTTP method of a cloud API call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Parameters are sent as the query string
    #[default]
    Get,
    /// Parameters are sent as a form body
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// A request against the CatLink API, relative to the account's API base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    /// Path below the API base, e.g. `token/device/info`
    pub path: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Get,
            params: Map::new(),
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Post,
            params: Map::new(),
        }
    }

    /// Add a parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Parameters rendered as string pairs for query strings and form bodies
    pub fn string_params(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_params() {
        let req = ApiRequest::post("token/device/purepro/runMode")
            .param("deviceId", "123")
            .param("foodOutCount", 2)
            .param("enabled", true);

        assert_eq!(req.method, HttpMethod::Post);
        let params = req.string_params();
        assert!(params.contains(&("deviceId".to_string(), "123".to_string())));
        assert!(params.contains(&("foodOutCount".to_string(), "2".to_string())));
        assert!(params.contains(&("enabled".to_string(), "true".to_string())));
    }

    #[test]
    fn test_method_defaults_to_get() {
        let req: ApiRequest = serde_json::from_value(serde_json::json!({"path": "x"})).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.params.is_empty());
    }
}
