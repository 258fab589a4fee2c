//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 / RIPEMD-160 hashing
//! - ECDSA key management (secp256k1)
//! - Merkle roots for block transaction lists
//! - The local key store used for signing

pub mod hash;
pub mod keys;
pub mod keystore;
pub mod merkle;

pub use hash::{double_sha256, hash160, sha256, sha256_hex};
pub use keys::{
    public_key_from_bytes, public_key_to_address, sign_message, verify_signature, KeyError,
    KeyPair,
};
pub use keystore::KeyStore;
pub use merkle::calculate_merkle_root;
