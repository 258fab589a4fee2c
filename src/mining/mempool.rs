//! Transaction pool (mempool) for pending transactions
//!
//! Holds validated transactions until the block producer includes them.
//! Transactions leave the pool in arrival order, which keeps each sender's
//! nonces ascending.

use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::core::transaction::Transaction;
use crate::core::types::{Address, Hash};

// =============================================================================
// Configuration
// =============================================================================

/// Default maximum mempool transaction count
pub const DEFAULT_MEMPOOL_SIZE: usize = 10_000;

// =============================================================================
// Error Types
// =============================================================================

/// Mempool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("Transaction already exists")]
    DuplicateTransaction,
    #[error("Mempool full")]
    MempoolFull,
}

// =============================================================================
// Mempool Entry
// =============================================================================

/// Entry in the mempool with metadata
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    pub tx: Transaction,
    pub sender: Address,
    /// When the transaction was added (Unix timestamp)
    pub added_time: i64,
}

// =============================================================================
// Mempool
// =============================================================================

/// Memory pool for pending transactions
#[derive(Debug)]
pub struct Mempool {
    /// Transactions indexed by hash
    entries: HashMap<Hash, MempoolEntry>,
    /// Transaction hashes in order of arrival
    by_time: Vec<Hash>,
    /// Pending transaction count per sender
    per_sender: HashMap<Address, u64>,
    max_size: usize,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_time: Vec::new(),
            per_sender: HashMap::new(),
            max_size: DEFAULT_MEMPOOL_SIZE,
        }
    }

    /// Add a validated transaction to the pool
    pub fn add_transaction(&mut self, tx: Transaction, sender: Address) -> Result<Hash, MempoolError> {
        let hash = tx.hash();
        if self.entries.contains_key(&hash) {
            return Err(MempoolError::DuplicateTransaction);
        }
        if self.entries.len() >= self.max_size {
            return Err(MempoolError::MempoolFull);
        }

        debug!("Pooled transaction {} from {}", hash, sender);
        *self.per_sender.entry(sender).or_insert(0) += 1;
        self.by_time.push(hash);
        self.entries.insert(
            hash,
            MempoolEntry {
                tx,
                sender,
                added_time: chrono::Utc::now().timestamp(),
            },
        );
        Ok(hash)
    }

    fn remove_transaction(&mut self, hash: &Hash) {
        let Some(entry) = self.entries.remove(hash) else {
            return;
        };
        self.by_time.retain(|h| h != hash);
        if let Some(count) = self.per_sender.get_mut(&entry.sender) {
            *count -= 1;
            if *count == 0 {
                self.per_sender.remove(&entry.sender);
            }
        }
    }

    /// Remove transactions that are now in a block
    pub fn remove_transactions(&mut self, hashes: &[Hash]) {
        for hash in hashes {
            self.remove_transaction(hash);
        }
    }

    /// Pending entries in arrival order, up to `limit`
    pub fn entries_fifo(&self, limit: usize) -> Vec<&MempoolEntry> {
        self.by_time
            .iter()
            .take(limit)
            .filter_map(|h| self.entries.get(h))
            .collect()
    }

    /// Number of pending transactions from `sender`
    pub fn pending_count(&self, sender: &Address) -> u64 {
        self.per_sender.get(sender).copied().unwrap_or(0)
    }
}

// =============================================================================
// Tests
// =============================================================================
