//! Application state
//!
//! `StateDb` holds accounts, deployed contracts with their key/value
//! storage, the code store and the current fee per gas. `AppState` is a
//! copy-on-write handle over it: clones share the database until one of
//! them writes, at which point the writer gets a private copy. The chain
//! hands out clones for estimation and reads, so scratch writes never
//! reach the durable view.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::amount::Amount;
use crate::core::types::{Address, Hash};

/// Longest key a contract may store under
pub const MAX_CONTRACT_STORE_KEY_LENGTH: usize = 32;

/// Balance and nonce of an address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: Amount,
    pub nonce: u64,
}

/// A deployed contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractState {
    pub code_hash: Hash,
    pub stake: Amount,
    pub storage: BTreeMap<Vec<u8>, Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct StateDb {
    accounts: HashMap<Address, Account>,
    contracts: HashMap<Address, ContractState>,
    codes: HashMap<Hash, Vec<u8>>,
    fee_per_gas: Amount,
}

/// Copy-on-write view of the state database
#[derive(Debug, Clone, Default)]
pub struct AppState {
    db: Arc<StateDb>,
}

impl AppState {
    pub fn new(fee_per_gas: Amount) -> Self {
        Self {
            db: Arc::new(StateDb {
                fee_per_gas,
                ..StateDb::default()
            }),
        }
    }

    fn db_mut(&mut self) -> &mut StateDb {
        Arc::make_mut(&mut self.db)
    }

    /// True while both handles still point at the same database
    pub fn shares_db_with(&self, other: &AppState) -> bool {
        Arc::ptr_eq(&self.db, &other.db)
    }

    // ---- accounts ----

    pub fn balance(&self, address: &Address) -> Amount {
        self.db
            .accounts
            .get(address)
            .map(|a| a.balance.clone())
            .unwrap_or_default()
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.db.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    pub fn add_balance(&mut self, address: &Address, amount: &Amount) {
        let account = self.db_mut().accounts.entry(*address).or_default();
        account.balance += amount;
    }

    pub fn sub_balance(&mut self, address: &Address, amount: &Amount) {
        let account = self.db_mut().accounts.entry(*address).or_default();
        account.balance -= amount;
    }

    pub fn set_nonce(&mut self, address: &Address, nonce: u64) {
        self.db_mut().accounts.entry(*address).or_default().nonce = nonce;
    }

    // ---- fees ----

    pub fn fee_per_gas(&self) -> &Amount {
        &self.db.fee_per_gas
    }

    pub fn set_fee_per_gas(&mut self, fee_per_gas: Amount) {
        self.db_mut().fee_per_gas = fee_per_gas;
    }

    // ---- code ----

    pub fn code(&self, code_hash: &Hash) -> Option<&[u8]> {
        self.db.codes.get(code_hash).map(|c| c.as_slice())
    }

    pub fn put_code(&mut self, code_hash: Hash, code: Vec<u8>) {
        self.db_mut().codes.insert(code_hash, code);
    }

    // ---- contracts ----

    pub fn contract(&self, address: &Address) -> Option<&ContractState> {
        self.db.contracts.get(address)
    }

    pub fn contract_exists(&self, address: &Address) -> bool {
        self.db.contracts.contains_key(address)
    }

    pub fn create_contract(&mut self, address: Address, code_hash: Hash, stake: Amount) {
        self.db_mut().contracts.insert(
            address,
            ContractState {
                code_hash,
                stake,
                storage: BTreeMap::new(),
            },
        );
    }

    pub fn remove_contract(&mut self, address: &Address) -> Option<ContractState> {
        self.db_mut().contracts.remove(address)
    }

    pub fn storage_get(&self, contract: &Address, key: &[u8]) -> Option<&[u8]> {
        self.db
            .contracts
            .get(contract)?
            .storage
            .get(key)
            .map(|v| v.as_slice())
    }

    pub fn storage_put(&mut self, contract: &Address, key: Vec<u8>, value: Vec<u8>) {
        if let Some(c) = self.db_mut().contracts.get_mut(contract) {
            c.storage.insert(key, value);
        }
    }

    pub fn storage_remove(&mut self, contract: &Address, key: &[u8]) {
        if let Some(c) = self.db_mut().contracts.get_mut(contract) {
            c.storage.remove(key);
        }
    }

    /// Entries with `min <= key <= max` in ascending byte order
    pub fn storage_range<'a>(
        &'a self,
        contract: &Address,
        min: &[u8],
        max: &[u8],
    ) -> Box<dyn Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)> + 'a> {
        match self.db.contracts.get(contract) {
            Some(c) if min <= max => Box::new(c.storage.range(min.to_vec()..=max.to_vec())),
            _ => Box::new(std::iter::empty()),
        }
    }
}
