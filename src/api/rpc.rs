//! JSON-RPC 2.0 envelope

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runner::RunnerError;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Any failure reported by the runner itself
pub const SERVER_ERROR: i64 = -32000;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("the method {} does not exist", method))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }
}

impl From<RunnerError> for RpcError {
    fn from(e: RunnerError) -> Self {
        Self::new(SERVER_ERROR, e.to_string())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(INTERNAL_ERROR, e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Decode positional params into a tuple; missing params count as `[]`
pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    let params = match params {
        Value::Null => Value::Array(Vec::new()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_positional_params() {
        let (count,): (u64,) = parse_params(json!([3])).unwrap();
        assert_eq!(count, 3);

        let (a, b): (String, Option<u8>) = parse_params(json!(["x", null])).unwrap();
        assert_eq!((a.as_str(), b), ("x", None));

        let err = parse_params::<(u64,)>(json!(["three"])).unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
        assert_eq!(parse_params::<(u64,)>(Value::Null).unwrap_err().code, INVALID_PARAMS);
    }

    #[test]
    fn test_response_shape() {
        let ok = serde_json::to_value(RpcResponse::success(json!(1), json!("0x00"))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 1, "result": "0x00"}));

        let err = RpcResponse::failure(json!(2), RpcError::method_not_found("nope"));
        let err = serde_json::to_value(err).unwrap();
        assert_eq!(err["error"]["code"], METHOD_NOT_FOUND);
        assert!(err.get("result").is_none());
    }
}
