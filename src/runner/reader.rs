//! State reader
//!
//! Point reads, readonly method calls and paginated map scans over a
//! snapshot of durable contract storage.

use serde::{Deserialize, Serialize};

use crate::core::amount::Amount;
use crate::core::engine::LedgerEngine;
use crate::core::receipt::{ContractEvent, Receipt};
use crate::core::state::MAX_CONTRACT_STORE_KEY_LENGTH;
use crate::core::types::{Address, Hash, HexBytes};
use crate::runner::codec::{build_argument_vector, decode, DecodedValue, Format, TypedValue};
use crate::runner::context::Runner;
use crate::runner::error::{RunnerError, RunnerResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadonlyCallRequest {
    pub contract: Address,
    pub method: String,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub args: Vec<TypedValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterateMapRequest {
    pub contract: Address,
    pub map: String,
    #[serde(default)]
    pub continuation_token: Option<HexBytes>,
    #[serde(default)]
    pub key_format: Format,
    #[serde(default)]
    pub value_format: Format,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapItem {
    pub key: DecodedValue,
    pub value: DecodedValue,
}

/// One page of a map scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPage {
    pub items: Vec<MapItem>,
    /// First key not returned; absent on the last page
    pub continuation_token: Option<HexBytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeInfo {
    pub code_hash: Option<Hash>,
    pub stake: Amount,
}

/// Upper bound of a map's keyspace: the name padded with 0xFF
fn map_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut max = prefix.to_vec();
    if max.len() < MAX_CONTRACT_STORE_KEY_LENGTH {
        max.resize(MAX_CONTRACT_STORE_KEY_LENGTH, 0xFF);
    }
    max
}

impl<L: LedgerEngine> Runner<L> {
    /// Read the value stored under `key` and decode it
    pub fn read_data(&self, contract: &Address, key: &str, format: Format) -> RunnerResult<DecodedValue> {
        self.read_key(contract, key.as_bytes(), format)
    }

    /// Read the entry `key` of map `map`
    pub fn read_map(
        &self,
        contract: &Address,
        map: &str,
        key: &[u8],
        format: Format,
    ) -> RunnerResult<DecodedValue> {
        let mut full_key = map.as_bytes().to_vec();
        full_key.extend_from_slice(key);
        self.read_key(contract, &full_key, format)
    }

    fn read_key(&self, contract: &Address, key: &[u8], format: Format) -> RunnerResult<DecodedValue> {
        let state = self.chain.readonly_state();
        let data = state
            .storage_get(contract, key)
            .ok_or_else(|| RunnerError::not_found("data is nil"))?;
        Ok(decode(format, data)?)
    }

    /// Run a method against durable state without keeping its writes
    pub fn readonly_call(&self, request: &ReadonlyCallRequest) -> RunnerResult<DecodedValue> {
        let args = build_argument_vector(&request.args)?;
        let state = self.chain.readonly_state();
        let data = self
            .chain
            .read_method(&state, &request.contract, &request.method, args)?;
        Ok(decode(request.format, &data)?)
    }

    /// Scan one page of a map in ascending key order
    pub fn iterate_map(&self, request: &IterateMapRequest) -> RunnerResult<MapPage> {
        let state = self.chain.readonly_state();
        let prefix = request.map.as_bytes();
        let max = map_upper_bound(prefix);
        let min = match &request.continuation_token {
            Some(token) if token.0.as_slice() > prefix => token.0.clone(),
            _ => prefix.to_vec(),
        };
        let limit = request.limit.max(1);

        let mut items = Vec::new();
        let mut continuation_token = None;
        for (key, value) in state.storage_range(&request.contract, &min, &max) {
            if items.len() == limit {
                continuation_token = Some(HexBytes(key.clone()));
                break;
            }
            let item_key = key.strip_prefix(prefix).unwrap_or(key);
            items.push(MapItem {
                key: decode(request.key_format, item_key)?,
                value: decode(request.value_format, value)?,
            });
        }

        Ok(MapPage {
            items,
            continuation_token,
        })
    }

    pub fn get_stake(&self, contract: &Address) -> StakeInfo {
        let state = self.chain.readonly_state();
        match state.contract(contract) {
            Some(info) => StakeInfo {
                code_hash: Some(info.code_hash),
                stake: info.stake.clone(),
            },
            None => StakeInfo {
                code_hash: None,
                stake: Amount::zero(),
            },
        }
    }

    /// Committed events of `contract` in emission order
    pub fn events(&self, contract: &Address) -> Vec<ContractEvent> {
        self.chain.read_events(contract)
    }

    pub fn get_receipt(&self, tx_hash: &Hash) -> RunnerResult<Receipt> {
        self.chain
            .receipt(tx_hash)
            .cloned()
            .ok_or_else(|| RunnerError::not_found(format!("receipt {} not found", tx_hash)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::word_to_bytes;
    use crate::core::MemChain;
    use crate::runner::builder::CallRequest;
    use crate::runner::codec::FormatError;
    use crate::runner::context::testing::deployed;

    fn call(runner: &mut Runner<MemChain>, contract: Address, method: &str, args: &[u64]) -> Hash {
        let request = CallRequest {
            from: None,
            contract,
            method: method.to_string(),
            amount: Amount::zero(),
            args: args
                .iter()
                .enumerate()
                .map(|(i, v)| TypedValue::new(i, Format::Uint64, v.to_string()))
                .collect(),
            max_fee: None,
            broadcast_block: 0,
        };
        runner.call(&request).unwrap()
    }

    fn fill_map(runner: &mut Runner<MemChain>, contract: Address, count: u64) {
        for k in 0..count {
            call(runner, contract, "remember", &[k, k * 10]);
        }
        runner.generate_blocks(1);
    }

    #[test]
    fn test_read_data() {
        let (mut runner, _, contract) = deployed();
        call(&mut runner, contract, "bump", &[4]);
        runner.generate_blocks(1);

        let value = runner.read_data(&contract, "count", Format::Uint64).unwrap();
        assert_eq!(value, DecodedValue::Uint(4));
        let raw = runner.read_data(&contract, "count", Format::Hex).unwrap();
        assert_eq!(raw.to_string(), format!("0x{}", hex::encode(word_to_bytes(4))));

        assert!(matches!(
            runner.read_data(&contract, "absent", Format::Hex),
            Err(RunnerError::NotFound(_))
        ));
    }

    #[test]
    fn test_readonly_call_discards_writes() {
        let (runner, _, contract) = deployed();
        let request = ReadonlyCallRequest {
            contract,
            method: "bump".to_string(),
            format: Format::Uint64,
            args: vec![TypedValue::new(0, Format::Uint64, "9")],
        };
        assert_eq!(runner.readonly_call(&request).unwrap(), DecodedValue::Uint(9));
        assert_eq!(runner.readonly_call(&request).unwrap(), DecodedValue::Uint(9));
        assert_eq!(
            runner.read_data(&contract, "count", Format::Uint64).unwrap(),
            DecodedValue::Uint(0)
        );
    }

    #[test]
    fn test_readonly_call_of_unknown_contract() {
        let (runner, _, _) = deployed();
        let request = ReadonlyCallRequest {
            contract: Address::new([9; 20]),
            method: "count".to_string(),
            format: Format::Uint64,
            args: vec![],
        };
        assert!(matches!(
            runner.readonly_call(&request),
            Err(RunnerError::Execution(_))
        ));
    }

    #[test]
    fn test_read_map_entry() {
        let (mut runner, _, contract) = deployed();
        fill_map(&mut runner, contract, 3);

        let value = runner
            .read_map(&contract, "seen", &2u64.to_be_bytes(), Format::Uint64)
            .unwrap();
        assert_eq!(value, DecodedValue::Uint(20));
        assert!(runner
            .read_map(&contract, "seen", &7u64.to_be_bytes(), Format::Uint64)
            .is_err());
    }

    #[test]
    fn test_iterate_map_pages_match_full_scan() {
        let (mut runner, _, contract) = deployed();
        fill_map(&mut runner, contract, 7);

        let mut request = IterateMapRequest {
            contract,
            map: "seen".to_string(),
            continuation_token: None,
            key_format: Format::Uint64,
            value_format: Format::Uint64,
            limit: 100,
        };
        let full = runner.iterate_map(&request).unwrap();
        assert_eq!(full.items.len(), 7);
        assert!(full.continuation_token.is_none());
        let keys: Vec<_> = full.items.iter().map(|i| i.key.clone()).collect();
        assert_eq!(keys, (0..7).map(DecodedValue::Uint).collect::<Vec<_>>());

        request.limit = 3;
        let mut paged = Vec::new();
        let mut pages = 0;
        loop {
            let page = runner.iterate_map(&request).unwrap();
            assert!(page.items.len() <= 3);
            paged.extend(page.items);
            pages += 1;
            match page.continuation_token {
                Some(token) => request.continuation_token = Some(token),
                None => break,
            }
        }
        assert_eq!(pages, 3);
        assert_eq!(paged, full.items);
    }

    #[test]
    fn test_iterate_map_stays_in_its_keyspace() {
        let (mut runner, _, contract) = deployed();
        fill_map(&mut runner, contract, 2);

        let request = IterateMapRequest {
            contract,
            map: "se".to_string(),
            continuation_token: None,
            key_format: Format::Hex,
            value_format: Format::Uint64,
            limit: 10,
        };
        // "se" covers the "seen" entries but not the "count" key
        let page = runner.iterate_map(&request).unwrap();
        assert_eq!(page.items.len(), 2);

        let request = IterateMapRequest {
            map: "other".to_string(),
            ..request
        };
        assert!(runner.iterate_map(&request).unwrap().items.is_empty());
    }

    #[test]
    fn test_iterate_map_decode_failure_aborts() {
        let (mut runner, _, contract) = deployed();
        fill_map(&mut runner, contract, 2);

        let request = IterateMapRequest {
            contract,
            map: "seen".to_string(),
            continuation_token: None,
            key_format: Format::Int8,
            value_format: Format::Uint64,
            limit: 10,
        };
        assert!(matches!(
            runner.iterate_map(&request),
            Err(RunnerError::Format(FormatError::Decode { .. }))
        ));
    }

    #[test]
    fn test_stake_and_events() {
        let (mut runner, _, contract) = deployed();
        let stake = runner.get_stake(&contract);
        assert!(stake.code_hash.is_some());
        assert!(stake.stake.is_zero());
        assert!(runner.get_stake(&Address::new([9; 20])).code_hash.is_none());

        fill_map(&mut runner, contract, 3);
        let events = runner.events(&contract);
        assert_eq!(events.len(), 3);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.event, "remembered");
            assert_eq!(event.args, vec![HexBytes(word_to_bytes(i as u64))]);
        }
    }

    #[test]
    fn test_receipt_is_gone_after_reset() {
        let (mut runner, _, contract) = deployed();
        let hash = call(&mut runner, contract, "bump", &[1]);
        runner.generate_blocks(1);
        assert!(runner.get_receipt(&hash).unwrap().success);

        runner.reset_to(1).unwrap();
        assert!(matches!(runner.get_receipt(&hash), Err(RunnerError::NotFound(_))));
        assert!(runner.events(&contract).is_empty());

        let parent = runner.chain.block_at(1).unwrap().hash;
        runner.generate_blocks(1);
        assert_eq!(runner.chain.block_at(2).unwrap().header.parent_hash, parent);
        assert_eq!(
            runner.read_data(&contract, "count", Format::Uint64).unwrap(),
            DecodedValue::Uint(0)
        );
    }
}
