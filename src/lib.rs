//! Contract runner: a local single-validator node for smart contracts
//!
//! This crate provides an in-memory chain for contract development:
//! - Deploy, call and terminate transactions signed with secp256k1 keys
//! - Dry-run estimation against disposable state views
//! - Contract storage reads and paginated map scans
//! - On-demand block production with single-vote certificates
//! - A small stack VM with an assembler for contract code
//! - A JSON-RPC 2.0 server over HTTP
//!
//! # Example
//!
//! ```rust
//! use contract_runner::config::NodeConfig;
//! use contract_runner::core::HexBytes;
//! use contract_runner::runner::DeployRequest;
//! use contract_runner::Compiler;
//!
//! let (mut runner, _god) = NodeConfig::default().build_runner().unwrap();
//! let code = Compiler::new().compile(".method get\nPUSH 7\nRETURN").unwrap();
//!
//! let request = DeployRequest {
//!     code: HexBytes(code),
//!     ..DeployRequest::default()
//! };
//! let receipt = runner.estimate_deploy(&request).unwrap();
//! assert!(receipt.success);
//!
//! let tx_hash = runner.deploy(&request).unwrap();
//! runner.generate_blocks(1);
//! assert!(runner.get_receipt(&tx_hash).unwrap().success);
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod contract;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod runner;

// Re-export commonly used types
pub use crate::api::{create_router, ApiState};
pub use crate::config::NodeConfig;
pub use crate::contract::{Compiler, OpCode, Program, VM};
pub use crate::core::{Address, Amount, Block, Hash, LedgerEngine, MemChain, Receipt, Transaction};
pub use crate::crypto::KeyPair;
pub use crate::mining::{BlockProducer, Mempool};
pub use crate::runner::{Runner, RunnerError};
