//! JSON-RPC handlers
//!
//! Every method is served from `POST /`. Mutations (blocks, resets,
//! submissions) take the runner's write lock; estimates and reads share
//! the read lock.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::api::rpc::{parse_params, RpcError, RpcRequest, RpcResponse, INVALID_REQUEST, PARSE_ERROR};
use crate::core::types::{Address, Hash, HexBytes};
use crate::core::MemChain;
use crate::mining::MAX_GENERATE_BLOCKS;
use crate::runner::{
    CallRequest, DeployRequest, Format, IterateMapRequest, ReadonlyCallRequest, Runner,
    TerminateRequest,
};

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub runner: Arc<RwLock<Runner<MemChain>>>,
}

impl ApiState {
    pub fn new(runner: Runner<MemChain>) -> Self {
        Self {
            runner: Arc::new(RwLock::new(runner)),
        }
    }
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// POST / - JSON-RPC 2.0 endpoint
pub async fn handle_rpc(State(state): State<ApiState>, body: String) -> Json<RpcResponse> {
    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return Json(RpcResponse::failure(
                Value::Null,
                RpcError::new(PARSE_ERROR, e.to_string()),
            ))
        }
    };
    if request.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
        return Json(RpcResponse::failure(
            request.id,
            RpcError::new(INVALID_REQUEST, "unsupported jsonrpc version"),
        ));
    }

    debug!("RPC call {}", request.method);
    let response = match dispatch(&state, &request.method, request.params).await {
        Ok(result) => RpcResponse::success(request.id, result),
        Err(error) => {
            warn!("RPC call {} failed: {}", request.method, error.message);
            RpcResponse::failure(request.id, error)
        }
    };
    Json(response)
}

fn to_result<T: Serialize>(value: T) -> Result<Value, RpcError> {
    Ok(serde_json::to_value(value)?)
}

async fn dispatch(state: &ApiState, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        // =====================================================================
        // Chain
        // =====================================================================
        "chain_generateBlocks" => {
            let (count,): (u64,) = parse_params(params)?;
            if count > MAX_GENERATE_BLOCKS {
                return Err(RpcError::invalid_params(format!(
                    "cannot generate more than {} blocks at once",
                    MAX_GENERATE_BLOCKS
                )));
            }
            let mut runner = state.runner.write().await;
            to_result(runner.generate_blocks(count))
        }
        "chain_resetTo" => {
            let (height,): (u64,) = parse_params(params)?;
            let mut runner = state.runner.write().await;
            runner.reset_to(height)?;
            Ok(Value::Null)
        }
        "chain_head" => to_result(state.runner.read().await.head()),
        "chain_getBalance" => {
            let (address,): (Address,) = parse_params(params)?;
            to_result(state.runner.read().await.balance(&address))
        }
        "chain_godAddress" => to_result(state.runner.read().await.god_address()),

        // =====================================================================
        // Committed transactions
        // =====================================================================
        "contract_deploy" => {
            let (request,): (DeployRequest,) = parse_params(params)?;
            to_result(state.runner.write().await.deploy(&request)?)
        }
        "contract_call" => {
            let (request,): (CallRequest,) = parse_params(params)?;
            to_result(state.runner.write().await.call(&request)?)
        }
        "contract_terminate" => {
            let (request,): (TerminateRequest,) = parse_params(params)?;
            to_result(state.runner.write().await.terminate(&request)?)
        }

        // =====================================================================
        // Estimates
        // =====================================================================
        "contract_estimateDeploy" => {
            let (request,): (DeployRequest,) = parse_params(params)?;
            to_result(state.runner.read().await.estimate_deploy(&request)?)
        }
        "contract_estimateCall" => {
            let (request,): (CallRequest,) = parse_params(params)?;
            to_result(state.runner.read().await.estimate_call(&request)?)
        }
        "contract_estimateTerminate" => {
            let (request,): (TerminateRequest,) = parse_params(params)?;
            to_result(state.runner.read().await.estimate_terminate(&request)?)
        }

        // =====================================================================
        // Reads
        // =====================================================================
        "contract_readData" => {
            let (contract, key, format): (Address, String, Format) = parse_params(params)?;
            to_result(state.runner.read().await.read_data(&contract, &key, format)?)
        }
        "contract_readonlyCall" => {
            let (request,): (ReadonlyCallRequest,) = parse_params(params)?;
            to_result(state.runner.read().await.readonly_call(&request)?)
        }
        "contract_readMap" => {
            let (contract, map, key, format): (Address, String, HexBytes, Format) =
                parse_params(params)?;
            to_result(state.runner.read().await.read_map(&contract, &map, &key.0, format)?)
        }
        "contract_iterateMap" => {
            let (contract, map, continuation_token, key_format, value_format, limit): (
                Address,
                String,
                Option<HexBytes>,
                Format,
                Format,
                usize,
            ) = parse_params(params)?;
            let request = IterateMapRequest {
                contract,
                map,
                continuation_token,
                key_format,
                value_format,
                limit,
            };
            to_result(state.runner.read().await.iterate_map(&request)?)
        }
        "contract_getStake" => {
            let (contract,): (Address,) = parse_params(params)?;
            to_result(state.runner.read().await.get_stake(&contract))
        }
        "contract_events" => {
            let (contract,): (Address,) = parse_params(params)?;
            to_result(state.runner.read().await.events(&contract))
        }
        "contract_getReceipt" => {
            let (tx_hash,): (Hash,) = parse_params(params)?;
            to_result(state.runner.read().await.get_receipt(&tx_hash)?)
        }

        _ => Err(RpcError::method_not_found(method)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::rpc::{INVALID_PARAMS, METHOD_NOT_FOUND, SERVER_ERROR};
    use crate::runner::context::testing::{counter_code, runner};
    use serde_json::json;

    async fn rpc(state: &ApiState, method: &str, params: Value) -> RpcResponse {
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
        let Json(response) = handle_rpc(State(state.clone()), body.to_string()).await;
        response
    }

    fn result(response: RpcResponse) -> Value {
        assert!(response.error.is_none(), "{:?}", response.error);
        response.result.unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health_check().await, "OK");
    }

    #[tokio::test]
    async fn test_deploy_call_and_read_over_rpc() {
        let (runner, god) = runner();
        let state = ApiState::new(runner);
        let code = format!("0x{}", hex::encode(counter_code()));

        let estimate = result(rpc(&state, "contract_estimateDeploy", json!([{"code": code}])).await);
        assert_eq!(estimate["success"], true);
        assert_eq!(estimate["method"], "deploy");
        let contract = estimate["contract"].clone();

        let tx_hash = result(rpc(&state, "contract_deploy", json!([{"code": code}])).await);
        result(rpc(&state, "chain_generateBlocks", json!([1])).await);
        let receipt = result(rpc(&state, "contract_getReceipt", json!([tx_hash])).await);
        assert_eq!(receipt["success"], true);
        assert_eq!(receipt["contract"], contract);

        let call = json!([{
            "contract": contract,
            "method": "bump",
            "args": [{"index": 0, "format": "uint64", "value": "3"}]
        }]);
        result(rpc(&state, "contract_call", call).await);
        result(rpc(&state, "chain_generateBlocks", json!([1])).await);

        let value = result(rpc(&state, "contract_readData", json!([contract, "count", "uint64"])).await);
        assert_eq!(value, 3);

        let head = result(rpc(&state, "chain_head", Value::Null).await);
        assert_eq!(head["height"], 2);
        let god_address = result(rpc(&state, "chain_godAddress", Value::Null).await);
        assert_eq!(god_address, json!(god.address()));

        let stake = result(rpc(&state, "contract_getStake", json!([contract])).await);
        assert!(stake["codeHash"].is_string());
    }

    #[tokio::test]
    async fn test_errors_map_to_codes() {
        let (runner, _) = runner();
        let state = ApiState::new(runner);

        let missing = rpc(&state, "chain_fly", json!([])).await;
        assert_eq!(missing.error.unwrap().code, METHOD_NOT_FOUND);

        let bad = rpc(&state, "chain_generateBlocks", json!(["many"])).await;
        assert_eq!(bad.error.unwrap().code, INVALID_PARAMS);

        let too_many = rpc(&state, "chain_generateBlocks", json!([u64::MAX])).await;
        assert_eq!(too_many.error.unwrap().code, INVALID_PARAMS);
        let head = result(rpc(&state, "chain_head", Value::Null).await);
        assert_eq!(head["height"], 0);

        let reset = rpc(&state, "chain_resetTo", json!([10])).await;
        assert_eq!(reset.error.unwrap().code, SERVER_ERROR);

        let contract = Address::new([9; 20]);
        let not_found = rpc(&state, "contract_readData", json!([contract, "count", "hex"])).await;
        let error = not_found.error.unwrap();
        assert_eq!(error.code, SERVER_ERROR);
        assert_eq!(error.message, "data is nil");

        let Json(garbage) = handle_rpc(State(state.clone()), "{".to_string()).await;
        assert_eq!(garbage.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_iterate_map_over_rpc() {
        let (runner, _) = runner();
        let state = ApiState::new(runner);
        let code = format!("0x{}", hex::encode(counter_code()));
        let estimate = result(rpc(&state, "contract_estimateDeploy", json!([{"code": code}])).await);
        let contract = estimate["contract"].clone();
        result(rpc(&state, "contract_deploy", json!([{"code": code}])).await);
        result(rpc(&state, "chain_generateBlocks", json!([1])).await);
        for k in 0..3 {
            let call = json!([{
                "contract": contract,
                "method": "remember",
                "args": [
                    {"index": 0, "format": "uint64", "value": k.to_string()},
                    {"index": 1, "format": "uint64", "value": "1"}
                ]
            }]);
            result(rpc(&state, "contract_call", call).await);
        }
        result(rpc(&state, "chain_generateBlocks", json!([1])).await);

        let page = result(
            rpc(&state, "contract_iterateMap", json!([contract, "seen", null, "uint64", "uint64", 2])).await,
        );
        assert_eq!(page["items"].as_array().unwrap().len(), 2);
        let token = page["continuationToken"].clone();
        assert!(token.is_string());

        let rest = result(
            rpc(&state, "contract_iterateMap", json!([contract, "seen", token, "uint64", "uint64", 2])).await,
        );
        assert_eq!(rest["items"], json!([{"key": 2, "value": 1}]));
        assert!(rest["continuationToken"].is_null());

        let events = result(rpc(&state, "contract_events", json!([contract])).await);
        assert_eq!(events.as_array().unwrap().len(), 3);
    }
}
