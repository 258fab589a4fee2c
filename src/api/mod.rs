//! JSON-RPC API
//!
//! JSON-RPC 2.0 over HTTP for driving the local node.
//!
//! # Endpoints
//!
//! - `POST /` - JSON-RPC 2.0, positional params
//! - `GET /health` - Liveness check
//!
//! # Methods
//!
//! ## Chain
//! - `chain_generateBlocks [count]`
//! - `chain_resetTo [height]`
//! - `chain_head`, `chain_godAddress`
//! - `chain_getBalance [address]`
//!
//! ## Contracts
//! - `contract_deploy`, `contract_call`, `contract_terminate` `[request]`
//! - `contract_estimateDeploy`, `contract_estimateCall`,
//!   `contract_estimateTerminate` `[request]`
//! - `contract_readData [contract, key, format]`
//! - `contract_readonlyCall [request]`
//! - `contract_readMap [contract, map, key, format]`
//! - `contract_iterateMap [contract, map, token, keyFormat, valueFormat, limit]`
//! - `contract_getStake [contract]`, `contract_events [contract]`
//! - `contract_getReceipt [txHash]`

pub mod handlers;
pub mod routes;
pub mod rpc;

pub use handlers::ApiState;
pub use routes::create_router;
pub use rpc::{RpcError, RpcRequest, RpcResponse};
