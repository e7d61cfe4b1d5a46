use serde::de::DeserializeOwned;

use crate::ipc::error::err;
use crate::ipc::types::Request;

pub fn required_i64(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Missing or null yields `None`.
pub fn optional<T: DeserializeOwned>(req: &Request, key: &str) -> Result<Option<T>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| err(&req.id, "bad_params", format!("invalid {}: {}", key, e), None)),
    }
}

pub fn required<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    optional(req, key)?
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// The whole params object as one payload.
pub fn params_as<T: DeserializeOwned>(req: &Request) -> Result<T, serde_json::Value> {
    serde_json::from_value(req.params.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid params: {}", e), None))
}

pub fn round_opt(v: Option<f64>) -> Option<f64> {
    v.map(crate::calc::round2)
}
