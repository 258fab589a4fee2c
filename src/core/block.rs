//! Block implementation for the local chain
//!
//! A block contains a header with metadata and a list of transactions.
//! There is no proof of work: blocks are proposed by the single local
//! validator and finalized by a certificate (see [`crate::core::cert`]).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::transaction::Transaction;
use crate::core::types::{Address, Hash, HexBytes};
use crate::crypto::{calculate_merkle_root, double_sha256};

// =============================================================================
// Block Constants
// =============================================================================

/// Maximum number of transactions per block
pub const MAX_BLOCK_TXS: usize = 10_000;

// =============================================================================
// Block Errors
// =============================================================================

/// Block validation errors
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Too many transactions: {0} (max: {1})")]
    TooManyTransactions(usize, usize),
    #[error("Invalid transaction root")]
    InvalidTxRoot,
    #[error("Invalid block hash")]
    InvalidBlockHash,
}

/// Block header containing metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block height (genesis is 0)
    pub height: u64,
    /// Hash of the parent block
    pub parent_hash: Hash,
    /// Block time in unix seconds
    pub timestamp: i64,
    /// Merkle root of the transaction hashes
    pub tx_root: Hash,
    /// Address of the proposing validator
    pub proposer: Address,
    /// Proposer payload
    pub proof: HexBytes,
}

impl BlockHeader {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 32 + 8 + 32 + 20 + self.proof.0.len());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(self.parent_hash.as_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(self.tx_root.as_bytes());
        out.extend_from_slice(self.proposer.as_bytes());
        out.extend_from_slice(&self.proof.0);
        out
    }

    /// Calculate the hash of the block header
    pub fn hash(&self) -> Hash {
        Hash::from_digest(&double_sha256(&self.encode()))
    }
}

/// A block in the chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// Block hash (cached)
    pub hash: Hash,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a block on top of `parent`
    pub fn new(
        parent: &BlockHeader,
        parent_hash: Hash,
        timestamp: i64,
        proposer: Address,
        proof: Vec<u8>,
        transactions: Vec<Transaction>,
    ) -> Self {
        let header = BlockHeader {
            height: parent.height + 1,
            parent_hash,
            timestamp,
            tx_root: Self::calculate_tx_root(&transactions),
            proposer,
            proof: HexBytes(proof),
        };
        let hash = header.hash();
        Self {
            header,
            hash,
            transactions,
        }
    }

    /// Create the genesis block
    pub fn genesis(timestamp: i64) -> Self {
        let header = BlockHeader {
            height: 0,
            parent_hash: Hash::ZERO,
            timestamp,
            tx_root: Self::calculate_tx_root(&[]),
            proposer: Address::ZERO,
            proof: HexBytes::default(),
        };
        let hash = header.hash();
        Self {
            header,
            hash,
            transactions: Vec::new(),
        }
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    /// Merkle root over transaction hashes; all-zero for an empty block
    pub fn calculate_tx_root(transactions: &[Transaction]) -> Hash {
        if transactions.is_empty() {
            return Hash::ZERO;
        }
        let hashes: Vec<Vec<u8>> = transactions
            .iter()
            .map(|tx| tx.hash().as_bytes().to_vec())
            .collect();
        Hash::from_digest(&calculate_merkle_root(&hashes))
    }

    /// Structural checks that do not need chain context
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.transactions.len() > MAX_BLOCK_TXS {
            return Err(BlockError::TooManyTransactions(
                self.transactions.len(),
                MAX_BLOCK_TXS,
            ));
        }
        if self.header.tx_root != Self::calculate_tx_root(&self.transactions) {
            return Err(BlockError::InvalidTxRoot);
        }
        if self.hash != self.header.hash() {
            return Err(BlockError::InvalidBlockHash);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::amount::Amount;
    use crate::core::transaction::TxType;

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis(1_700_000_000);
        assert_eq!(genesis.height(), 0);
        assert!(genesis.header.parent_hash.is_zero());
        assert!(genesis.validate().is_ok());
    }

    #[test]
    fn test_child_links_to_parent() {
        let genesis = Block::genesis(100);
        let child = Block::new(&genesis.header, genesis.hash, 120, Address::ZERO, vec![], vec![]);
        assert_eq!(child.height(), 1);
        assert_eq!(child.header.parent_hash, genesis.hash);
        assert_ne!(child.hash, genesis.hash);
    }

    #[test]
    fn test_tampered_block_fails_validation() {
        let genesis = Block::genesis(100);
        let tx = Transaction::new(
            TxType::CallContract,
            Some(Address::new([1; 20])),
            Amount::zero(),
            Amount::zero(),
            1,
            vec![],
        );
        let mut block =
            Block::new(&genesis.header, genesis.hash, 120, Address::ZERO, vec![], vec![tx]);
        assert!(block.validate().is_ok());

        block.transactions.clear();
        assert!(matches!(block.validate(), Err(BlockError::InvalidTxRoot)));

        let mut block = Block::new(&genesis.header, genesis.hash, 120, Address::ZERO, vec![], vec![]);
        block.header.timestamp = 999;
        assert!(matches!(block.validate(), Err(BlockError::InvalidBlockHash)));
    }
}
