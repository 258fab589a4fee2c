//! Ledger engine interface
//!
//! The narrow surface the runner drives the chain through: propose, append
//! and certify blocks, roll back, hand out state views, and validate, run
//! and price transactions. [`crate::core::MemChain`] implements it in
//! memory; the runner and block producer are generic over it.

use crate::core::amount::Amount;
use crate::core::attachment::ArgSlot;
use crate::core::block::Block;
use crate::core::blockchain::{BlockchainError, ChainConfig};
use crate::core::cert::BlockCert;
use crate::core::executor::{self, BlockContext, ExecutionError, TxExecution};
use crate::core::fee;
use crate::core::receipt::{ContractEvent, Receipt};
use crate::core::state::AppState;
use crate::core::transaction::{Transaction, TransactionError};
use crate::core::types::{Address, Hash};
use crate::core::validation::{self, ValidationError, ValidationMode};

pub trait LedgerEngine {
    fn config(&self) -> &ChainConfig;

    fn head(&self) -> &Block;

    fn height(&self) -> u64 {
        self.head().height()
    }

    fn block_at(&self, height: u64) -> Option<&Block>;

    fn certificate(&self, hash: &Hash) -> Option<&BlockCert>;

    /// Build a block on the head from the pending pool
    fn propose_block(&mut self, proof: &[u8], timestamp: i64) -> Block;

    /// Validate and append a block, applying its transactions
    fn add_block(&mut self, block: Block) -> Result<(), BlockchainError>;

    fn validate_certificate(&self, hash: &Hash, cert: &BlockCert) -> Result<(), BlockchainError>;

    fn write_certificate(&mut self, hash: Hash, cert: BlockCert) -> Result<(), BlockchainError>;

    /// Roll the chain back so that `height` is the head
    fn reset_to(&mut self, height: u64) -> Result<(), BlockchainError>;

    /// Disposable view of the head state for checks and estimation
    fn state_for_check(&self) -> AppState;

    /// Snapshot of the head state for reads
    fn readonly_state(&self) -> AppState;

    fn submit_tx(&mut self, tx: Transaction) -> Result<Hash, BlockchainError>;

    /// Nonce the next transaction of `address` should carry
    fn next_nonce(&self, address: &Address) -> u64;

    fn receipt(&self, tx_hash: &Hash) -> Option<&Receipt>;

    /// Committed events of `contract` in emission order
    fn read_events(&self, contract: &Address) -> Vec<ContractEvent>;

    fn validate_tx(&self, state: &AppState, tx: &Transaction) -> Result<Address, ValidationError> {
        validation::validate_tx(state, tx, ValidationMode::Mempool)
    }

    fn run_tx(
        &self,
        state: &mut AppState,
        tx: &Transaction,
        from: Option<Address>,
        block: Option<BlockContext>,
    ) -> Result<TxExecution, TransactionError> {
        executor::run_tx(state, tx, from, block)
    }

    fn read_method(
        &self,
        state: &AppState,
        contract: &Address,
        method: &str,
        args: Vec<ArgSlot>,
    ) -> Result<Vec<u8>, ExecutionError> {
        executor::read_method(state, contract, method, args)
    }

    fn gas_cost(&self, state: &AppState, gas_used: u64) -> Amount {
        fee::gas_cost(state, gas_used)
    }

    fn calculate_fee(&self, state: &AppState, tx: &Transaction) -> Amount {
        fee::protocol_fee(state, tx)
    }
}
