//! Transaction validation
//!
//! Ledger rules a signed transaction must satisfy before it may enter the
//! pool or a block. Pool-time checks are nonce-independent; block-time
//! checks additionally require the nonce to advance.

use thiserror::Error;

use crate::core::amount::Amount;
use crate::core::attachment::{
    CallContractAttachment, DeployContractAttachment, TerminateContractAttachment,
};
use crate::core::fee::protocol_fee;
use crate::core::state::AppState;
use crate::core::transaction::{Transaction, TxType};
use crate::core::types::Address;

/// Reasons a transaction is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("negative amount")]
    NegativeAmount,
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },
    #[error("max fee {max_fee} is below the protocol fee {required}")]
    FeeTooLow { max_fee: Amount, required: Amount },
    #[error("transaction has no recipient")]
    MissingRecipient,
    #[error("contract {0} does not exist")]
    UnknownContract(Address),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("invalid nonce: got {got}, expected greater than {current}")]
    InvalidNonce { got: u64, current: u64 },
}

/// Where the transaction is being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Mempool,
    Block,
}

/// Validate `tx` against `state`, returning the recovered sender
pub fn validate_tx(
    state: &AppState,
    tx: &Transaction,
    mode: ValidationMode,
) -> Result<Address, ValidationError> {
    let sender = tx.sender().map_err(|_| ValidationError::InvalidSignature)?;

    if tx.amount.is_negative() || tx.max_fee.is_negative() || tx.tips.is_negative() {
        return Err(ValidationError::NegativeAmount);
    }

    let required_fee = protocol_fee(state, tx);
    if tx.max_fee < required_fee {
        return Err(ValidationError::FeeTooLow {
            max_fee: tx.max_fee.clone(),
            required: required_fee,
        });
    }

    let required = &tx.amount + &tx.max_fee;
    let available = state.balance(&sender);
    if available < required {
        return Err(ValidationError::InsufficientFunds {
            required,
            available,
        });
    }

    let payload_err = |e: crate::core::transaction::TransactionError| {
        ValidationError::InvalidPayload(e.to_string())
    };
    match tx.tx_type {
        TxType::DeployContract => {
            DeployContractAttachment::from_bytes(&tx.payload.0).map_err(payload_err)?;
        }
        TxType::CallContract | TxType::TerminateContract => {
            let to = tx.to.ok_or(ValidationError::MissingRecipient)?;
            if !state.contract_exists(&to) {
                return Err(ValidationError::UnknownContract(to));
            }
            if tx.tx_type == TxType::CallContract {
                CallContractAttachment::from_bytes(&tx.payload.0).map_err(payload_err)?;
            } else {
                TerminateContractAttachment::from_bytes(&tx.payload.0).map_err(payload_err)?;
            }
        }
    }

    if mode == ValidationMode::Block {
        let current = state.nonce(&sender);
        if tx.nonce <= current {
            return Err(ValidationError::InvalidNonce {
                got: tx.nonce,
                current,
            });
        }
    }

    Ok(sender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fee::DEFAULT_FEE_PER_GAS;
    use crate::core::types::Hash;
    use crate::crypto::KeyPair;

    fn setup() -> (AppState, KeyPair, Address) {
        let kp = KeyPair::generate();
        let contract = Address::new([9; 20]);
        let mut state = AppState::new(DEFAULT_FEE_PER_GAS.parse().unwrap());
        state.add_balance(&kp.address(), &Amount::from_whole(10));
        state.create_contract(contract, Hash::ZERO, Amount::zero());
        (state, kp, contract)
    }

    fn call(to: Address, amount: Amount, max_fee: Amount, nonce: u64) -> Transaction {
        let payload = CallContractAttachment::new("inc", vec![]).to_bytes().unwrap();
        Transaction::new(TxType::CallContract, Some(to), amount, max_fee, nonce, payload)
    }

    #[test]
    fn test_valid_call() {
        let (state, kp, contract) = setup();
        let mut tx = call(contract, Amount::from_whole(1), Amount::from_whole(1), 1);
        tx.sign(&kp).unwrap();
        assert_eq!(validate_tx(&state, &tx, ValidationMode::Block), Ok(kp.address()));
    }

    #[test]
    fn test_unsigned_rejected() {
        let (state, _, contract) = setup();
        let tx = call(contract, Amount::zero(), Amount::from_whole(1), 1);
        assert_eq!(
            validate_tx(&state, &tx, ValidationMode::Mempool),
            Err(ValidationError::InvalidSignature)
        );
    }

    #[test]
    fn test_insufficient_funds() {
        let (state, kp, contract) = setup();
        let mut tx = call(contract, Amount::from_whole(10), Amount::from_whole(1), 1);
        tx.sign(&kp).unwrap();
        assert!(matches!(
            validate_tx(&state, &tx, ValidationMode::Mempool),
            Err(ValidationError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_fee_too_low() {
        let (state, kp, contract) = setup();
        let mut tx = call(contract, Amount::zero(), Amount::zero(), 1);
        tx.sign(&kp).unwrap();
        assert!(matches!(
            validate_tx(&state, &tx, ValidationMode::Mempool),
            Err(ValidationError::FeeTooLow { .. })
        ));
    }

    #[test]
    fn test_unknown_contract() {
        let (state, kp, _) = setup();
        let other = Address::new([1; 20]);
        let mut tx = call(other, Amount::zero(), Amount::from_whole(1), 1);
        tx.sign(&kp).unwrap();
        assert_eq!(
            validate_tx(&state, &tx, ValidationMode::Mempool),
            Err(ValidationError::UnknownContract(other))
        );
    }

    #[test]
    fn test_nonce_only_checked_for_blocks() {
        let (mut state, kp, contract) = setup();
        state.set_nonce(&kp.address(), 5);
        let mut tx = call(contract, Amount::zero(), Amount::from_whole(1), 3);
        tx.sign(&kp).unwrap();
        assert!(validate_tx(&state, &tx, ValidationMode::Mempool).is_ok());
        assert!(matches!(
            validate_tx(&state, &tx, ValidationMode::Block),
            Err(ValidationError::InvalidNonce { got: 3, current: 5 })
        ));
    }
}
