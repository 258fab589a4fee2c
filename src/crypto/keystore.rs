//! Local key store
//!
//! Holds the signing keys this node controls. The god key is always
//! present; extra keys may be imported from configuration.

use std::collections::HashMap;

use super::keys::{KeyError, KeyPair};
use crate::core::types::Address;

/// In-memory store of locally held keys, indexed by address
#[derive(Debug, Default, Clone)]
pub struct KeyStore {
    keys: HashMap<Address, KeyPair>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key pair and return its address
    pub fn add(&mut self, key_pair: KeyPair) -> Address {
        let address = key_pair.address();
        self.keys.insert(address, key_pair);
        address
    }

    /// Import a hex-encoded private key
    pub fn import_hex(&mut self, hex_key: &str) -> Result<Address, KeyError> {
        let key_pair = KeyPair::from_private_key_hex(hex_key)?;
        Ok(self.add(key_pair))
    }

    /// Whether this node can sign for `address`
    pub fn can_sign(&self, address: &Address) -> bool {
        self.keys.contains_key(address)
    }

    pub fn get(&self, address: &Address) -> Option<&KeyPair> {
        self.keys.get(address)
    }

    /// Sign a 32-byte hash with the key held for `address`
    pub fn sign(&self, address: &Address, hash: &[u8]) -> Option<Result<Vec<u8>, KeyError>> {
        self.keys.get(address).map(|kp| kp.sign(hash))
    }

    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.keys.keys().copied().collect();
        addresses.sort();
        addresses
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_sign() {
        let mut store = KeyStore::new();
        let kp = KeyPair::generate();
        let address = store.add(kp.clone());

        assert!(store.can_sign(&address));
        let signature = store.sign(&address, &[7u8; 32]).unwrap().unwrap();
        assert!(kp.verify(&[7u8; 32], &signature).unwrap());
    }

    #[test]
    fn test_unknown_address_cannot_sign() {
        let store = KeyStore::new();
        let stranger = KeyPair::generate().address();
        assert!(!store.can_sign(&stranger));
        assert!(store.sign(&stranger, &[0u8; 32]).is_none());
    }

    #[test]
    fn test_import_hex() {
        let mut store = KeyStore::new();
        let kp = KeyPair::generate();
        let address = store.import_hex(&kp.private_key_hex()).unwrap();
        assert_eq!(address, kp.address());
        assert_eq!(store.len(), 1);
    }
}
