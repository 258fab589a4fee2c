//! Estimation pipeline
//!
//! Runs a built transaction against a disposable view of the head state
//! and reports what committing it would do. Nothing here reaches durable
//! state: the view is dropped when the call returns.

use log::debug;

use crate::core::engine::LedgerEngine;
use crate::core::receipt::Receipt;
use crate::core::transaction::TxType;
use crate::core::types::HexBytes;
use crate::runner::builder::{
    BuildMode, BuiltTransaction, CallRequest, DeployRequest, TerminateRequest,
};
use crate::runner::context::Runner;
use crate::runner::error::RunnerResult;

impl<L: LedgerEngine> Runner<L> {
    pub fn estimate_deploy(&self, request: &DeployRequest) -> RunnerResult<Receipt> {
        let built = self.build_deploy(request, BuildMode::Estimate)?;
        self.estimate(built)
    }

    pub fn estimate_call(&self, request: &CallRequest) -> RunnerResult<Receipt> {
        let built = self.build_call(request, BuildMode::Estimate)?;
        self.estimate(built)
    }

    pub fn estimate_terminate(&self, request: &TerminateRequest) -> RunnerResult<Receipt> {
        let built = self.build_terminate(request, BuildMode::Estimate)?;
        self.estimate(built)
    }

    fn estimate(&self, built: BuiltTransaction) -> RunnerResult<Receipt> {
        let mut state = self.chain.state_for_check();
        let signed = built.is_signed();
        let tx = &built.tx;

        // Nonces are not checked here
        if signed {
            self.chain.validate_tx(&state, tx)?;
        }

        // The executor does not move call value, a committing miner does
        if tx.tx_type == TxType::CallContract && !tx.amount.is_zero() {
            if let Some(contract) = tx.to {
                state.sub_balance(&built.sender, &tx.amount);
                state.add_balance(&contract, &tx.amount);
            }
        }

        let from = if signed { None } else { Some(built.sender) };
        let execution = self.chain.run_tx(&mut state, tx, from, None)?;
        let result = execution.result;

        let gas_cost = self.chain.gas_cost(&state, result.gas_used);
        let tx_fee = self.chain.calculate_fee(&state, tx);
        debug!(
            "Estimated {} on {}: success={} gas={}",
            execution.method, execution.contract, result.success, result.gas_used
        );

        Ok(Receipt {
            contract: execution.contract,
            method: execution.method,
            success: result.success,
            gas_used: result.gas_used,
            tx_hash: signed.then(|| tx.hash()),
            error: result.error,
            gas_cost,
            tx_fee,
            action_result: result.return_value.map(HexBytes),
            block_height: None,
        })
    }
}
