//! Runner context
//!
//! The default signer, the local keys and the chain handle travel together
//! in a [`Runner`] instead of living in process-wide globals, so several
//! simulated chains can coexist.

use log::info;
use serde::Serialize;

use crate::core::amount::Amount;
use crate::core::engine::LedgerEngine;
use crate::core::types::{Address, Hash};
use crate::crypto::KeyStore;
use crate::mining::producer::BlockProducer;
use crate::runner::error::{RunnerError, RunnerResult};

/// Sender resolution and signing capability
#[derive(Debug, Clone, Default)]
pub struct RunnerContext {
    /// Default signer used when a request names no sender
    pub god: Option<Address>,
    pub keys: KeyStore,
}

impl RunnerContext {
    pub fn new(god: Option<Address>, keys: KeyStore) -> Self {
        Self { god, keys }
    }

    /// An absent or zero sender becomes the default signer
    pub fn resolve_sender(&self, from: Option<Address>) -> RunnerResult<Address> {
        match from {
            Some(address) if !address.is_zero() => Ok(address),
            _ => self.god.ok_or(RunnerError::NoSigner),
        }
    }
}

/// Summary of the chain head
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadInfo {
    pub height: u64,
    pub hash: Hash,
    pub timestamp: i64,
}

/// A simulated chain together with its context and block producer
pub struct Runner<L: LedgerEngine> {
    pub context: RunnerContext,
    pub chain: L,
    pub producer: BlockProducer,
}

impl<L: LedgerEngine> Runner<L> {
    pub fn new(context: RunnerContext, chain: L, producer: BlockProducer) -> Self {
        Self {
            context,
            chain,
            producer,
        }
    }

    /// Append `count` certified blocks
    pub fn generate_blocks(&mut self, count: u64) -> Vec<Hash> {
        self.producer.generate_blocks(&mut self.chain, count)
    }

    /// Roll the chain back so that `height` is the head
    pub fn reset_to(&mut self, height: u64) -> RunnerResult<()> {
        self.producer.reset_to(&mut self.chain, height)?;
        info!("Reset to height {}", height);
        Ok(())
    }

    pub fn head(&self) -> HeadInfo {
        let head = self.chain.head();
        HeadInfo {
            height: head.height(),
            hash: head.hash,
            timestamp: head.timestamp(),
        }
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.chain.readonly_state().balance(address)
    }

    pub fn god_address(&self) -> Option<Address> {
        self.context.god
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::contract::Compiler;
    use crate::core::blockchain::{ChainConfig, MemChain, DEFAULT_NETWORK_ID};
    use crate::core::executor::contract_address;
    use crate::core::fee::DEFAULT_FEE_PER_GAS;
    use crate::core::types::HexBytes;
    use crate::crypto::{sha256, KeyPair};
    use crate::mining::producer::DEFAULT_BLOCK_TIME_STEP;
    use crate::runner::builder::DeployRequest;

    /// A counter with a map of per-key totals and an event per bump
    pub const COUNTER: &str = r#"
        .method deploy
            PUSH 0
            SSTOREK count
            HALT

        .method bump
            SLOADK count
            ARG 0
            ADD
            DUP
            SSTOREK count
            RETURN

        .method count
            SLOADK count
            RETURN

        .method remember
            ARG 0
            ARG 1
            MPUT seen
            ARG 0
            EMIT remembered 1
            HALT
    "#;

    /// A fresh runner whose god key is also the validator
    pub fn runner() -> (Runner<MemChain>, KeyPair) {
        let god = KeyPair::generate();
        let fee_per_gas: Amount = DEFAULT_FEE_PER_GAS.parse().unwrap();
        let chain = MemChain::new(ChainConfig {
            network_id: DEFAULT_NETWORK_ID,
            validator: god.address(),
            alloc: vec![(god.address(), Amount::from_whole(1_000_000))],
            fee_per_gas,
            genesis_timestamp: 1_000,
        });
        let mut keys = KeyStore::new();
        let address = keys.add(god.clone());
        let context = RunnerContext::new(Some(address), keys);
        let producer = BlockProducer::new(god.clone(), DEFAULT_BLOCK_TIME_STEP);
        (Runner::new(context, chain, producer), god)
    }

    pub fn counter_code() -> Vec<u8> {
        Compiler::new().compile(COUNTER).unwrap()
    }

    /// A runner with the counter deployed and mined at height 1
    pub fn deployed() -> (Runner<MemChain>, KeyPair, Address) {
        let (mut runner, god) = runner();
        let code = counter_code();
        let code_hash = Hash::from_digest(&sha256(&code));
        runner
            .deploy(&DeployRequest {
                code: HexBytes(code),
                ..DeployRequest::default()
            })
            .unwrap();
        runner.generate_blocks(1);
        let contract = contract_address(&god.address(), 1, &code_hash);
        (runner, god, contract)
    }
}
