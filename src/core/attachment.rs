//! Transaction payload attachments
//!
//! The payload of a contract transaction describes what to do: deploy code,
//! call a method, or terminate. Arguments are an ordered vector of byte
//! buffers where `None` marks an absent slot.

use serde::{Deserialize, Serialize};

use crate::core::transaction::TransactionError;
use crate::core::types::{Hash, HexBytes};

/// One argument slot; `None` is "no argument", distinct from an empty buffer
pub type ArgSlot = Option<Vec<u8>>;

/// Payload of a deploy transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployContractAttachment {
    pub code_hash: Hash,
    pub code: HexBytes,
    pub args: Vec<Option<HexBytes>>,
}

/// Payload of a call transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContractAttachment {
    pub method: String,
    pub args: Vec<Option<HexBytes>>,
}

/// Payload of a terminate transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateContractAttachment {
    pub args: Vec<Option<HexBytes>>,
}

fn wrap_args(args: Vec<ArgSlot>) -> Vec<Option<HexBytes>> {
    args.into_iter().map(|slot| slot.map(HexBytes)).collect()
}

fn unwrap_args(args: &[Option<HexBytes>]) -> Vec<ArgSlot> {
    args.iter()
        .map(|slot| slot.as_ref().map(|b| b.0.clone()))
        .collect()
}

fn decode<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T, TransactionError> {
    serde_json::from_slice(payload).map_err(|e| TransactionError::InvalidPayload(e.to_string()))
}

fn encode<T: Serialize>(attachment: &T) -> Result<Vec<u8>, TransactionError> {
    serde_json::to_vec(attachment).map_err(|e| TransactionError::InvalidPayload(e.to_string()))
}

impl DeployContractAttachment {
    pub fn new(code_hash: Hash, code: Vec<u8>, args: Vec<ArgSlot>) -> Self {
        Self {
            code_hash,
            code: HexBytes(code),
            args: wrap_args(args),
        }
    }

    pub fn args(&self) -> Vec<ArgSlot> {
        unwrap_args(&self.args)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        encode(self)
    }

    pub fn from_bytes(payload: &[u8]) -> Result<Self, TransactionError> {
        decode(payload)
    }
}

impl CallContractAttachment {
    pub fn new(method: &str, args: Vec<ArgSlot>) -> Self {
        Self {
            method: method.to_string(),
            args: wrap_args(args),
        }
    }

    pub fn args(&self) -> Vec<ArgSlot> {
        unwrap_args(&self.args)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        encode(self)
    }

    pub fn from_bytes(payload: &[u8]) -> Result<Self, TransactionError> {
        decode(payload)
    }
}

impl TerminateContractAttachment {
    pub fn new(args: Vec<ArgSlot>) -> Self {
        Self {
            args: wrap_args(args),
        }
    }

    pub fn args(&self) -> Vec<ArgSlot> {
        unwrap_args(&self.args)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        encode(self)
    }

    pub fn from_bytes(payload: &[u8]) -> Result<Self, TransactionError> {
        decode(payload)
    }
}
