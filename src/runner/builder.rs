//! Transaction builder
//!
//! Turns deploy, call and terminate requests into ledger transactions:
//! resolves the sender, encodes the arguments, wraps them in the matching
//! attachment and signs the result according to the [`BuildMode`].

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::amount::Amount;
use crate::core::attachment::{
    CallContractAttachment, DeployContractAttachment, TerminateContractAttachment,
};
use crate::core::engine::LedgerEngine;
use crate::core::transaction::{Transaction, TxType};
use crate::core::types::{Address, Hash, HexBytes};
use crate::runner::codec::{build_argument_vector, TypedValue};
use crate::runner::context::Runner;
use crate::runner::error::{RunnerError, RunnerResult};

/// Fee ceiling used when a request does not name one
pub const DEFAULT_MAX_FEE: &str = "1";

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployRequest {
    pub from: Option<Address>,
    pub code_hash: Option<Hash>,
    pub amount: Amount,
    pub args: Vec<TypedValue>,
    pub max_fee: Option<Amount>,
    pub code: HexBytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(default)]
    pub from: Option<Address>,
    pub contract: Address,
    pub method: String,
    #[serde(default)]
    pub amount: Amount,
    #[serde(default)]
    pub args: Vec<TypedValue>,
    #[serde(default)]
    pub max_fee: Option<Amount>,
    /// Block height hint accepted for compatibility; blocks are only produced on demand
    #[serde(default)]
    pub broadcast_block: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateRequest {
    #[serde(default)]
    pub from: Option<Address>,
    pub contract: Address,
    #[serde(default)]
    pub args: Vec<TypedValue>,
    #[serde(default)]
    pub max_fee: Option<Amount>,
}

// =============================================================================
// Building
// =============================================================================

/// Whether a transaction is built for submission or for estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Always signed by the sender's key
    Commit,
    /// Signed only when the sender's key is held locally
    Estimate,
}

/// A built transaction and the sender it was built for
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub tx: Transaction,
    pub sender: Address,
}

impl BuiltTransaction {
    pub fn is_signed(&self) -> bool {
        self.tx.is_signed()
    }
}

fn max_fee_or_default(max_fee: &Option<Amount>) -> Amount {
    match max_fee {
        Some(fee) => fee.clone(),
        None => DEFAULT_MAX_FEE.parse().unwrap_or_else(|_| Amount::zero()),
    }
}

impl<L: LedgerEngine> Runner<L> {
    pub fn build_deploy(
        &self,
        request: &DeployRequest,
        mode: BuildMode,
    ) -> RunnerResult<BuiltTransaction> {
        let sender = self.context.resolve_sender(request.from)?;
        let args = build_argument_vector(&request.args)?;
        let attachment = DeployContractAttachment::new(
            request.code_hash.unwrap_or(Hash::ZERO),
            request.code.0.clone(),
            args,
        );
        self.build(
            TxType::DeployContract,
            sender,
            None,
            request.amount.clone(),
            max_fee_or_default(&request.max_fee),
            attachment.to_bytes()?,
            mode,
        )
    }

    pub fn build_call(&self, request: &CallRequest, mode: BuildMode) -> RunnerResult<BuiltTransaction> {
        let sender = self.context.resolve_sender(request.from)?;
        let args = build_argument_vector(&request.args)?;
        let attachment = CallContractAttachment::new(&request.method, args);
        self.build(
            TxType::CallContract,
            sender,
            Some(request.contract),
            request.amount.clone(),
            max_fee_or_default(&request.max_fee),
            attachment.to_bytes()?,
            mode,
        )
    }

    pub fn build_terminate(
        &self,
        request: &TerminateRequest,
        mode: BuildMode,
    ) -> RunnerResult<BuiltTransaction> {
        let sender = self.context.resolve_sender(request.from)?;
        let args = build_argument_vector(&request.args)?;
        let attachment = TerminateContractAttachment::new(args);
        self.build(
            TxType::TerminateContract,
            sender,
            Some(request.contract),
            Amount::zero(),
            max_fee_or_default(&request.max_fee),
            attachment.to_bytes()?,
            mode,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        tx_type: TxType,
        sender: Address,
        to: Option<Address>,
        amount: Amount,
        max_fee: Amount,
        payload: Vec<u8>,
        mode: BuildMode,
    ) -> RunnerResult<BuiltTransaction> {
        let nonce = self.chain.next_nonce(&sender);
        let mut tx = Transaction::new(tx_type, to, amount, max_fee, nonce, payload);

        match (mode, self.context.keys.get(&sender)) {
            (_, Some(key)) => tx.sign(key)?,
            (BuildMode::Commit, None) => return Err(RunnerError::MissingKey(sender)),
            (BuildMode::Estimate, None) => {
                debug!("No local key for {}, estimating unsigned", sender);
            }
        }

        Ok(BuiltTransaction { tx, sender })
    }

    // =========================================================================
    // Committed path
    // =========================================================================

    pub fn deploy(&mut self, request: &DeployRequest) -> RunnerResult<Hash> {
        let built = self.build_deploy(request, BuildMode::Commit)?;
        self.submit(built)
    }

    pub fn call(&mut self, request: &CallRequest) -> RunnerResult<Hash> {
        let built = self.build_call(request, BuildMode::Commit)?;
        self.submit(built)
    }

    pub fn terminate(&mut self, request: &TerminateRequest) -> RunnerResult<Hash> {
        let built = self.build_terminate(request, BuildMode::Commit)?;
        self.submit(built)
    }

    fn submit(&mut self, built: BuiltTransaction) -> RunnerResult<Hash> {
        let state = self.chain.state_for_check();
        self.chain.validate_tx(&state, &built.tx)?;
        let hash = self.chain.submit_tx(built.tx)?;
        info!("Submitted transaction {} from {}", hash, built.sender);
        Ok(hash)
    }
}
