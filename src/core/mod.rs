//! Core ledger components
//!
//! This module contains the in-memory ledger engine the runner drives:
//! - Identifiers, amounts and transaction payloads
//! - Transactions, blocks and single-vote certificates
//! - Copy-on-write application state
//! - Validation, fees and transaction execution
//! - The chain itself, behind the `LedgerEngine` trait

pub mod amount;
pub mod attachment;
pub mod block;
pub mod blockchain;
pub mod cert;
pub mod engine;
pub mod executor;
pub mod fee;
pub mod receipt;
pub mod state;
pub mod transaction;
pub mod types;
pub mod validation;

pub use amount::{Amount, ParseAmountError};
pub use attachment::{
    ArgSlot, CallContractAttachment, DeployContractAttachment, TerminateContractAttachment,
};
pub use block::{Block, BlockError, BlockHeader, MAX_BLOCK_TXS};
pub use blockchain::{BlockchainError, ChainConfig, MemChain, DEFAULT_NETWORK_ID};
pub use cert::{BlockCert, Vote, VoteHeader, STEP_FINAL};
pub use engine::LedgerEngine;
pub use executor::{
    contract_address, BlockContext, ExecutionError, TxExecution, DEPLOY_METHOD, TERMINATE_METHOD,
};
pub use fee::{DEFAULT_FEE_PER_GAS, GAS_PER_BYTE};
pub use receipt::{ContractEvent, Receipt};
pub use state::{Account, AppState, ContractState, MAX_CONTRACT_STORE_KEY_LENGTH};
pub use transaction::{Transaction, TransactionError, TxSignature, TxType};
pub use types::{Address, Hash, HexBytes, ParseIdError};
pub use validation::{ValidationError, ValidationMode};
