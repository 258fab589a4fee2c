//! Contract transactions
//!
//! A transaction carries a deploy, call or terminate payload together with
//! the value it moves and the fee ceiling its sender accepts. Signed
//! transactions carry the sender's public key; the sender address is
//! derived from it. Unsigned transactions only exist on the estimation
//! path, where the sender is supplied out of band.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::amount::Amount;
use crate::core::types::{Address, Hash, HexBytes};
use crate::crypto::{public_key_from_bytes, public_key_to_address, sha256, verify_signature, KeyPair};

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Transaction is not signed")]
    NotSigned,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] crate::crypto::KeyError),
}

// =============================================================================
// Transaction
// =============================================================================

/// Kind of contract operation a transaction performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    DeployContract,
    CallContract,
    TerminateContract,
}

impl TxType {
    fn tag(&self) -> u8 {
        match self {
            TxType::DeployContract => 0x0f,
            TxType::CallContract => 0x10,
            TxType::TerminateContract => 0x11,
        }
    }
}

/// Signature attached to a signed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    /// Compressed secp256k1 public key of the sender
    pub public_key: HexBytes,
    /// Compact ECDSA signature over the signing hash
    pub signature: HexBytes,
}

/// A contract transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_type: TxType,
    pub nonce: u64,
    pub epoch: u16,
    /// Target contract; `None` for deploys
    pub to: Option<Address>,
    pub amount: Amount,
    pub max_fee: Amount,
    pub tips: Amount,
    pub payload: HexBytes,
    pub signature: Option<TxSignature>,
}

impl Transaction {
    /// Create a new unsigned transaction
    pub fn new(
        tx_type: TxType,
        to: Option<Address>,
        amount: Amount,
        max_fee: Amount,
        nonce: u64,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            tx_type,
            nonce,
            epoch: 0,
            to,
            amount,
            max_fee,
            tips: Amount::zero(),
            payload: HexBytes(payload),
            signature: None,
        }
    }

    /// Canonical byte encoding; the signature is included on request
    fn encode(&self, with_signature: bool) -> Vec<u8> {
        fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(bytes);
        }

        let mut out = Vec::with_capacity(96 + self.payload.0.len());
        out.push(self.tx_type.tag());
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.epoch.to_be_bytes());
        match &self.to {
            Some(to) => {
                out.push(1);
                out.extend_from_slice(to.as_bytes());
            }
            None => out.push(0),
        }
        for amount in [&self.amount, &self.max_fee, &self.tips] {
            out.push(u8::from(amount.is_negative()));
            put_bytes(&mut out, &amount.to_bytes_be());
        }
        put_bytes(&mut out, &self.payload.0);

        if with_signature {
            if let Some(sig) = &self.signature {
                put_bytes(&mut out, &sig.public_key.0);
                put_bytes(&mut out, &sig.signature.0);
            }
        }
        out
    }

    /// The hash that gets signed
    pub fn signing_hash(&self) -> Vec<u8> {
        sha256(&self.encode(false))
    }

    /// Transaction hash (covers the signature)
    pub fn hash(&self) -> Hash {
        Hash::from_digest(&sha256(&self.encode(true)))
    }

    /// Encoded size in bytes, the basis of the protocol fee
    pub fn size(&self) -> usize {
        self.encode(true).len()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Sign with the provided key pair
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<(), TransactionError> {
        let signature = key_pair.sign(&self.signing_hash())?;
        self.signature = Some(TxSignature {
            public_key: HexBytes(key_pair.public_key_bytes()),
            signature: HexBytes(signature),
        });
        Ok(())
    }

    /// Recover the sender by verifying the signature
    pub fn sender(&self) -> Result<Address, TransactionError> {
        let sig = self.signature.as_ref().ok_or(TransactionError::NotSigned)?;
        let public_key = public_key_from_bytes(&sig.public_key.0)?;
        if !verify_signature(&public_key, &self.signing_hash(), &sig.signature.0)? {
            return Err(TransactionError::InvalidSignature);
        }
        Ok(public_key_to_address(&public_key))
    }
}
