//! Block certificates
//!
//! A certificate is the set of validator votes finalizing a block. The
//! local chain has a validator set of one, so a valid certificate holds
//! exactly one vote.

use serde::{Deserialize, Serialize};

use crate::core::types::{Address, Hash, HexBytes};
use crate::crypto::{public_key_from_bytes, public_key_to_address, sha256, verify_signature, KeyError, KeyPair};

/// Consensus step a vote is cast in
pub const STEP_FINAL: u8 = 1;

/// The signed part of a vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteHeader {
    pub round: u64,
    pub step: u8,
    pub parent_hash: Hash,
    pub voted_hash: Hash,
    pub turn_offline: bool,
}

impl VoteHeader {
    /// Hash the validator signs; the same domain consensus messages use
    pub fn signature_hash(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(8 + 1 + 32 + 32 + 1);
        data.extend_from_slice(&self.round.to_be_bytes());
        data.push(self.step);
        data.extend_from_slice(self.parent_hash.as_bytes());
        data.extend_from_slice(self.voted_hash.as_bytes());
        data.push(u8::from(self.turn_offline));
        sha256(&data)
    }
}

/// A vote signed by a validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub header: VoteHeader,
    pub public_key: HexBytes,
    pub signature: HexBytes,
}

impl Vote {
    pub fn sign(header: VoteHeader, key_pair: &KeyPair) -> Result<Self, KeyError> {
        let signature = key_pair.sign(&header.signature_hash())?;
        Ok(Self {
            header,
            public_key: HexBytes(key_pair.public_key_bytes()),
            signature: HexBytes(signature),
        })
    }

    /// Address of the voter if the signature checks out
    pub fn voter(&self) -> Option<Address> {
        let public_key = public_key_from_bytes(&self.public_key.0).ok()?;
        match verify_signature(&public_key, &self.header.signature_hash(), &self.signature.0) {
            Ok(true) => Some(public_key_to_address(&public_key)),
            _ => None,
        }
    }
}

/// Votes finalizing one block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCert {
    pub votes: Vec<Vote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> VoteHeader {
        VoteHeader {
            round: 3,
            step: STEP_FINAL,
            parent_hash: Hash::new([1; 32]),
            voted_hash: Hash::new([2; 32]),
            turn_offline: false,
        }
    }

    #[test]
    fn test_vote_recovers_voter() {
        let kp = KeyPair::generate();
        let vote = Vote::sign(header(), &kp).unwrap();
        assert_eq!(vote.voter(), Some(kp.address()));
    }

    #[test]
    fn test_modified_vote_has_no_voter() {
        let kp = KeyPair::generate();
        let mut vote = Vote::sign(header(), &kp).unwrap();
        vote.header.turn_offline = true;
        assert_eq!(vote.voter(), None);
    }

    #[test]
    fn test_signature_hash_covers_every_field() {
        let base = header().signature_hash();
        let mut h = header();
        h.round = 4;
        assert_ne!(h.signature_hash(), base);
        let mut h = header();
        h.step = 2;
        assert_ne!(h.signature_hash(), base);
    }
}
