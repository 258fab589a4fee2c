//! Merkle root over block transactions
//!
//! Blocks commit to their transaction list through a binary hash tree of
//! transaction hashes.

use super::hash::sha256;

/// Calculate the merkle root from a list of transaction hashes
pub fn calculate_merkle_root(hashes: &[Vec<u8>]) -> Vec<u8> {
    if hashes.is_empty() {
        return sha256(b"");
    }

    if hashes.len() == 1 {
        return hashes[0].clone();
    }

    let mut current_level: Vec<Vec<u8>> = hashes.to_vec();

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity(current_level.len().div_ceil(2));

        for chunk in current_level.chunks(2) {
            // Odd levels pair the last hash with itself
            let right = chunk.get(1).unwrap_or(&chunk[0]);
            let mut data = chunk[0].clone();
            data.extend_from_slice(right);
            next_level.push(sha256(&data));
        }

        current_level = next_level;
    }

    current_level.remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merkle_root_single() {
        let hashes = vec![sha256(b"tx1")];
        let root = calculate_merkle_root(&hashes);
        assert_eq!(root, hashes[0]);
    }

    #[test]
    fn test_merkle_root_two() {
        let hash1 = sha256(b"tx1");
        let hash2 = sha256(b"tx2");
        let hashes = vec![hash1.clone(), hash2.clone()];

        let root = calculate_merkle_root(&hashes);

        let mut expected = hash1;
        expected.extend_from_slice(&hash2);
        assert_eq!(root, sha256(&expected));
    }

    #[test]
    fn test_merkle_root_odd() {
        let hashes = vec![sha256(b"tx1"), sha256(b"tx2"), sha256(b"tx3")];
        let root = calculate_merkle_root(&hashes);
        assert_eq!(root.len(), 32);
    }

    #[test]
    fn test_empty_merkle_root() {
        let hashes: Vec<Vec<u8>> = vec![];
        assert_eq!(calculate_merkle_root(&hashes), sha256(b""));
    }
}
