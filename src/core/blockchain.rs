//! In-memory chain
//!
//! `MemChain` keeps the block list, certificates, receipts and events in
//! memory together with the head state and one recorded state per height,
//! which makes rolling back a matter of truncation.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::amount::Amount;
use crate::core::block::Block;
use crate::core::cert::{BlockCert, STEP_FINAL};
use crate::core::engine::LedgerEngine;
use crate::core::executor::{apply_tx, BlockContext};
use crate::core::receipt::{ContractEvent, Receipt};
use crate::core::state::AppState;
use crate::core::transaction::{Transaction, TransactionError};
use crate::core::types::{Address, Hash};
use crate::core::validation::{validate_tx, ValidationError, ValidationMode};
use crate::mining::mempool::{Mempool, MempoolError};

/// Network identifier of the local chain
pub const DEFAULT_NETWORK_ID: u32 = 0x99;

/// Blockchain-related errors
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),
    #[error("Block not found: {0}")]
    BlockNotFound(Hash),
    #[error("Cannot reset to height {target}: head is at {head}")]
    InvalidResetHeight { target: u64, head: u64 },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Mempool error: {0}")]
    Mempool(#[from] MempoolError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// Parameters the chain is created with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub network_id: u32,
    /// The single validator allowed to propose and certify blocks
    pub validator: Address,
    /// Genesis balances
    pub alloc: Vec<(Address, Amount)>,
    pub fee_per_gas: Amount,
    pub genesis_timestamp: i64,
}

/// The in-memory chain
#[derive(Debug)]
pub struct MemChain {
    config: ChainConfig,
    blocks: Vec<Block>,
    certs: HashMap<Hash, BlockCert>,
    /// Head state
    state: AppState,
    /// State after each height, indexed by height
    history: Vec<AppState>,
    receipts: HashMap<Hash, Receipt>,
    /// Events with the height that emitted them
    events: Vec<(u64, ContractEvent)>,
    mempool: Mempool,
}

impl MemChain {
    /// Create a chain with its genesis block
    pub fn new(config: ChainConfig) -> Self {
        let mut state = AppState::new(config.fee_per_gas.clone());
        for (address, balance) in &config.alloc {
            state.add_balance(address, balance);
        }
        let genesis = Block::genesis(config.genesis_timestamp);
        info!(
            "Genesis block {} created (network 0x{:x})",
            genesis.hash, config.network_id
        );

        Self {
            config,
            blocks: vec![genesis],
            certs: HashMap::new(),
            history: vec![state.clone()],
            state,
            receipts: HashMap::new(),
            events: Vec::new(),
            mempool: Mempool::new(),
        }
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    fn find_block(&self, hash: &Hash) -> Option<&Block> {
        self.blocks.iter().rev().find(|b| b.hash == *hash)
    }

    /// Check a block against the head without applying it
    fn validate_block(&self, block: &Block) -> Result<(), BlockchainError> {
        let head = self.head();

        block
            .validate()
            .map_err(|e| BlockchainError::InvalidBlock(e.to_string()))?;

        if block.height() != head.height() + 1 {
            return Err(BlockchainError::InvalidBlock(format!(
                "Invalid height: expected {}, got {}",
                head.height() + 1,
                block.height()
            )));
        }

        if block.header.parent_hash != head.hash {
            return Err(BlockchainError::InvalidBlock(
                "Invalid parent hash".to_string(),
            ));
        }

        if block.timestamp() <= head.timestamp() {
            return Err(BlockchainError::InvalidBlock(format!(
                "Timestamp {} does not advance past {}",
                block.timestamp(),
                head.timestamp()
            )));
        }

        if block.header.proposer != self.config.validator {
            return Err(BlockchainError::InvalidBlock(format!(
                "Unexpected proposer {}",
                block.header.proposer
            )));
        }

        Ok(())
    }
}

impl LedgerEngine for MemChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn head(&self) -> &Block {
        // The genesis block is never truncated away
        &self.blocks[self.blocks.len() - 1]
    }

    fn block_at(&self, height: u64) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    fn certificate(&self, hash: &Hash) -> Option<&BlockCert> {
        self.certs.get(hash)
    }

    fn propose_block(&mut self, proof: &[u8], timestamp: i64) -> Block {
        let head = self.head().clone();
        let context = BlockContext {
            height: head.height() + 1,
            timestamp,
        };

        let mut state = self.state.clone();
        let mut included = Vec::new();
        let mut dropped = Vec::new();
        for entry in self.mempool.entries_fifo(crate::core::block::MAX_BLOCK_TXS) {
            let applied = validate_tx(&state, &entry.tx, ValidationMode::Block)
                .map_err(BlockchainError::from)
                .and_then(|_| apply_tx(&mut state, &entry.tx, context).map_err(BlockchainError::from));
            match applied {
                Ok(_) => included.push(entry.tx.clone()),
                Err(e) => {
                    warn!("Dropping transaction {} from proposal: {}", entry.tx.hash(), e);
                    dropped.push(entry.tx.hash());
                }
            }
        }
        self.mempool.remove_transactions(&dropped);

        Block::new(
            &head.header,
            head.hash,
            timestamp,
            self.config.validator,
            proof.to_vec(),
            included,
        )
    }

    fn add_block(&mut self, block: Block) -> Result<(), BlockchainError> {
        self.validate_block(&block)?;

        let context = BlockContext {
            height: block.height(),
            timestamp: block.timestamp(),
        };
        let mut state = self.state.clone();
        let mut receipts = Vec::with_capacity(block.transactions.len());
        let mut events = Vec::new();
        for tx in &block.transactions {
            validate_tx(&state, tx, ValidationMode::Block)?;
            let (receipt, tx_events) = apply_tx(&mut state, tx, context)?;
            receipts.push(receipt);
            events.extend(tx_events);
        }

        let hashes: Vec<Hash> = block.transactions.iter().map(|tx| tx.hash()).collect();
        self.mempool.remove_transactions(&hashes);
        for (hash, receipt) in hashes.into_iter().zip(receipts) {
            self.receipts.insert(hash, receipt);
        }
        self.events
            .extend(events.into_iter().map(|e| (block.height(), e)));

        debug!(
            "Added block {} at height {} with {} transactions",
            block.hash,
            block.height(),
            block.transactions.len()
        );
        self.history.push(state.clone());
        self.state = state;
        self.blocks.push(block);
        Ok(())
    }

    fn validate_certificate(&self, hash: &Hash, cert: &BlockCert) -> Result<(), BlockchainError> {
        let invalid = |msg: &str| BlockchainError::InvalidCertificate(msg.to_string());
        let block = self
            .find_block(hash)
            .ok_or(BlockchainError::BlockNotFound(*hash))?;

        let [vote] = cert.votes.as_slice() else {
            return Err(invalid("expected exactly one vote"));
        };
        if vote.voter() != Some(self.config.validator) {
            return Err(invalid("vote is not signed by the validator"));
        }
        let header = &vote.header;
        if header.round != block.height() {
            return Err(invalid("round does not match block height"));
        }
        if header.step != STEP_FINAL {
            return Err(invalid("unexpected step"));
        }
        if header.parent_hash != block.header.parent_hash || header.voted_hash != block.hash {
            return Err(invalid("vote is for a different block"));
        }
        if header.turn_offline {
            return Err(invalid("vote turns the validator offline"));
        }
        Ok(())
    }

    fn write_certificate(&mut self, hash: Hash, cert: BlockCert) -> Result<(), BlockchainError> {
        self.validate_certificate(&hash, &cert)?;
        self.certs.insert(hash, cert);
        Ok(())
    }

    fn reset_to(&mut self, height: u64) -> Result<(), BlockchainError> {
        let head = self.height();
        if height > head {
            return Err(BlockchainError::InvalidResetHeight {
                target: height,
                head,
            });
        }

        let keep = height as usize + 1;
        for block in self.blocks.drain(keep..) {
            self.certs.remove(&block.hash);
        }
        self.history.truncate(keep);
        self.state = self.history[height as usize].clone();
        self.receipts
            .retain(|_, r| r.block_height.map_or(true, |h| h <= height));
        self.events.retain(|(h, _)| *h <= height);

        info!("Chain reset from height {} to {}", head, height);
        Ok(())
    }

    fn state_for_check(&self) -> AppState {
        self.state.clone()
    }

    fn readonly_state(&self) -> AppState {
        self.state.clone()
    }

    fn submit_tx(&mut self, tx: Transaction) -> Result<Hash, BlockchainError> {
        let sender = validate_tx(&self.state, &tx, ValidationMode::Mempool)?;
        let hash = self.mempool.add_transaction(tx, sender)?;
        info!("Accepted transaction {} from {}", hash, sender);
        Ok(hash)
    }

    fn next_nonce(&self, address: &Address) -> u64 {
        self.state.nonce(address) + self.mempool.pending_count(address) + 1
    }

    fn receipt(&self, tx_hash: &Hash) -> Option<&Receipt> {
        self.receipts.get(tx_hash)
    }

    fn read_events(&self, contract: &Address) -> Vec<ContractEvent> {
        self.events
            .iter()
            .filter(|(_, e)| e.contract == *contract)
            .map(|(_, e)| e.clone())
            .collect()
    }
}
