//! Runner errors

use thiserror::Error;

use crate::core::blockchain::BlockchainError;
use crate::core::executor::ExecutionError;
use crate::core::transaction::TransactionError;
use crate::core::types::Address;
use crate::core::validation::ValidationError;
use crate::mining::producer::ResetError;
use crate::runner::codec::FormatError;

/// Failures of runner operations, returned to the caller as-is
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("no sender given and no default signer configured")]
    NoSigner,
    #[error("no local key for {0}")]
    MissingKey(Address),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Reset(#[from] ResetError),
    #[error(transparent)]
    Chain(#[from] BlockchainError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl RunnerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        RunnerError::NotFound(what.into())
    }
}

pub type RunnerResult<T> = Result<T, RunnerError>;
