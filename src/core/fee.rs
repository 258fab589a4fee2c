//! Fee calculation
//!
//! Two components make up what a transaction pays:
//! - the protocol fee, proportional to the encoded size of the transaction
//! - the gas cost, proportional to the gas its execution used
//!
//! Both are priced in the state's current fee per gas.

use crate::core::amount::Amount;
use crate::core::state::AppState;
use crate::core::transaction::Transaction;

// =============================================================================
// Constants
// =============================================================================

/// Gas charged per encoded byte of a transaction
pub const GAS_PER_BYTE: u64 = 10;

/// Number of nodes sharing the network; fixed for the local chain
pub const NETWORK_SIZE: u64 = 1;

/// Default fee per gas: 0.00000001 DNA
pub const DEFAULT_FEE_PER_GAS: &str = "0.00000001";

// =============================================================================
// Fee functions
// =============================================================================

/// Price `gas_used` at the state's fee per gas
pub fn gas_cost(state: &AppState, gas_used: u64) -> Amount {
    state.fee_per_gas() * gas_used
}

/// Size-based fee every transaction owes, independent of execution
pub fn calculate_fee(network_size: u64, fee_per_gas: &Amount, tx: &Transaction) -> Amount {
    fee_per_gas * (tx.size() as u64 * GAS_PER_BYTE * network_size.max(1))
}

pub fn protocol_fee(state: &AppState, tx: &Transaction) -> Amount {
    calculate_fee(NETWORK_SIZE, state.fee_per_gas(), tx)
}

/// What a committed transaction is charged: its full cost, capped by `max_fee`
pub fn charged_fee(state: &AppState, tx: &Transaction, gas_used: u64) -> Amount {
    let full = protocol_fee(state, tx) + gas_cost(state, gas_used);
    full.min(tx.max_fee.clone())
}
