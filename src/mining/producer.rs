//! Local block producer
//!
//! Appends blocks on demand for a chain whose validator set is the local
//! key alone. Each block goes through `Proposed -> Appended -> Certified`:
//! the chain proposes it from the pending pool, appends it, and then
//! receives a certificate holding a single vote signed by the local key.
//!
//! A self-produced block or certificate that the chain rejects means the
//! node itself is broken, so those failures panic instead of returning.

use log::{debug, info};
use thiserror::Error;

use crate::core::cert::{BlockCert, Vote, VoteHeader, STEP_FINAL};
use crate::core::engine::LedgerEngine;
use crate::core::types::Hash;
use crate::crypto::KeyPair;

/// Seconds between consecutive local blocks
pub const DEFAULT_BLOCK_TIME_STEP: i64 = 20;

/// Most blocks a single `generate_blocks` request may ask for
pub const MAX_GENERATE_BLOCKS: u64 = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot reset to height {target}: head is at {head}")]
pub struct ResetError {
    pub target: u64,
    pub head: u64,
}

/// Produces and certifies blocks with the local validator key
pub struct BlockProducer {
    key: KeyPair,
    block_time_step: i64,
}

impl BlockProducer {
    pub fn new(key: KeyPair, block_time_step: i64) -> Self {
        Self {
            key,
            block_time_step: block_time_step.max(1),
        }
    }

    pub fn validator(&self) -> &KeyPair {
        &self.key
    }

    /// Append `count` certified blocks, returning their hashes
    ///
    /// # Panics
    ///
    /// If the chain rejects a block or certificate this producer built.
    pub fn generate_blocks<L: LedgerEngine>(&self, chain: &mut L, count: u64) -> Vec<Hash> {
        let mut produced = Vec::with_capacity(count.min(MAX_GENERATE_BLOCKS) as usize);
        for _ in 0..count {
            let timestamp = chain.head().timestamp() + self.block_time_step;
            let block = chain.propose_block(&[], timestamp);
            let hash = block.hash;
            let height = block.height();
            let parent_hash = block.header.parent_hash;
            let tx_count = block.transactions.len();

            if let Err(e) = chain.add_block(block) {
                panic!("local block {} at height {} rejected: {}", hash, height, e);
            }

            let header = VoteHeader {
                round: height,
                step: STEP_FINAL,
                parent_hash,
                voted_hash: hash,
                turn_offline: false,
            };
            let cert = match Vote::sign(header, &self.key) {
                Ok(vote) => BlockCert { votes: vec![vote] },
                Err(e) => panic!("cannot sign vote for block {}: {}", hash, e),
            };
            if let Err(e) = chain.write_certificate(hash, cert) {
                panic!("certificate for block {} rejected: {}", hash, e);
            }

            debug!("Block {} certified at height {} ({} txs)", hash, height, tx_count);
            produced.push(hash);
        }
        if count > 0 {
            info!("Generated {} block(s), head is at height {}", count, chain.height());
        }
        produced
    }

    /// Roll the chain back to `height`
    pub fn reset_to<L: LedgerEngine>(&self, chain: &mut L, height: u64) -> Result<(), ResetError> {
        let head = chain.height();
        if height > head {
            return Err(ResetError {
                target: height,
                head,
            });
        }
        chain.reset_to(height).map_err(|_| ResetError {
            target: height,
            head,
        })
    }
}
