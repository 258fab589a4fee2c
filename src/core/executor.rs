//! Transaction execution
//!
//! Runs the payload of a contract transaction against an application state
//! through the contract VM. Execution failures do not surface as Rust
//! errors: they produce an unsuccessful [`TxExecution`] carrying the gas
//! used and the error message, as a receipt would.
//!
//! `run_tx` moves no value except recording a deploy's amount as the new
//! contract's stake. Committing a transaction with its value transfer and
//! fee is `apply_tx`.

use log::debug;
use thiserror::Error;

use crate::contract::{
    ExecutionContext, ExecutionResult, Program, ProgramError, VmError, DEFAULT_GAS_LIMIT, VM,
};
use crate::core::amount::Amount;
use crate::core::attachment::{
    ArgSlot, CallContractAttachment, DeployContractAttachment, TerminateContractAttachment,
};
use crate::core::fee::{charged_fee, gas_cost};
use crate::core::receipt::{ContractEvent, Receipt};
use crate::core::state::AppState;
use crate::core::transaction::{Transaction, TransactionError, TxType};
use crate::core::types::{Address, Hash, HexBytes};
use crate::crypto::{hash160, sha256};

/// Method run on deploy, if the program defines it
pub const DEPLOY_METHOD: &str = "deploy";
/// Method run on terminate, if the program defines it
pub const TERMINATE_METHOD: &str = "terminate";

/// Contract-level execution failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("contract {0} does not exist")]
    UnknownContract(Address),
    #[error("contract {0} already exists")]
    ContractExists(Address),
    #[error("no code stored for hash {0}")]
    MissingCode(Hash),
    #[error("code does not match code hash {0}")]
    CodeHashMismatch(Hash),
    #[error("invalid program: {0}")]
    InvalidProgram(#[from] ProgramError),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("{0}")]
    Vm(#[from] VmError),
}

impl From<TransactionError> for ExecutionError {
    fn from(e: TransactionError) -> Self {
        ExecutionError::InvalidPayload(e.to_string())
    }
}

/// Block a transaction executes in; `None` means not yet mined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub height: u64,
    pub timestamp: i64,
}

/// Raw result of running a transaction
#[derive(Debug, Clone)]
pub struct TxExecution {
    pub sender: Address,
    pub contract: Address,
    pub method: String,
    pub result: ExecutionResult,
}

/// Address a deploy creates
pub fn contract_address(from: &Address, nonce: u64, code_hash: &Hash) -> Address {
    let mut data = Vec::with_capacity(20 + 8 + 32);
    data.extend_from_slice(from.as_bytes());
    data.extend_from_slice(&nonce.to_be_bytes());
    data.extend_from_slice(code_hash.as_bytes());
    Address::new(hash160(&data))
}

fn vm_context(
    state: &AppState,
    sender: Address,
    contract: Address,
    args: Vec<ArgSlot>,
    call_value: &Amount,
    block: Option<BlockContext>,
) -> ExecutionContext {
    ExecutionContext {
        caller: sender,
        contract,
        timestamp: block.map(|b| b.timestamp.max(0) as u64).unwrap_or(0),
        block_number: block.map(|b| b.height).unwrap_or(0),
        args,
        call_value: call_value.saturating_u64(),
        self_balance: state.balance(&contract).saturating_u64(),
        gas_limit: DEFAULT_GAS_LIMIT,
    }
}

fn load_program(state: &AppState, contract: &Address) -> Result<Program, ExecutionError> {
    let info = state
        .contract(contract)
        .ok_or(ExecutionError::UnknownContract(*contract))?;
    let code = state
        .code(&info.code_hash)
        .ok_or(ExecutionError::MissingCode(info.code_hash))?;
    Ok(Program::decode(code)?)
}

/// Run `method` and write back its storage changes when it succeeds
fn invoke(
    state: &mut AppState,
    program: &Program,
    method: &str,
    context: ExecutionContext,
) -> Result<ExecutionResult, ExecutionError> {
    let contract = context.contract;
    let result = {
        let storage = &state
            .contract(&contract)
            .ok_or(ExecutionError::UnknownContract(contract))?
            .storage;
        VM::new(program, method, storage, context)?.run()
    };
    if result.success {
        for (key, value) in &result.storage_changes {
            state.storage_put(&contract, key.clone(), value.clone());
        }
    }
    Ok(result)
}

fn resolve_sender(tx: &Transaction, from: Option<Address>) -> Result<Address, TransactionError> {
    if tx.is_signed() {
        tx.sender()
    } else {
        from.ok_or(TransactionError::NotSigned)
    }
}

/// Run the payload of `tx` on `state`
///
/// Signed transactions execute as their signer; unsigned ones as `from`.
/// State changes are kept only if execution succeeded.
pub fn run_tx(
    state: &mut AppState,
    tx: &Transaction,
    from: Option<Address>,
    block: Option<BlockContext>,
) -> Result<TxExecution, TransactionError> {
    let sender = resolve_sender(tx, from)?;
    let mut scratch = state.clone();

    let (contract, method, outcome) = match tx.tx_type {
        TxType::DeployContract => {
            let (contract, outcome) = deploy(&mut scratch, tx, sender, block);
            (contract, DEPLOY_METHOD.to_string(), outcome)
        }
        TxType::CallContract => {
            let contract = tx.to.unwrap_or(Address::ZERO);
            match CallContractAttachment::from_bytes(&tx.payload.0) {
                Ok(attachment) => {
                    let outcome = call(&mut scratch, contract, &attachment, sender, &tx.amount, block);
                    (contract, attachment.method, outcome)
                }
                Err(e) => (contract, String::new(), Err(e.into())),
            }
        }
        TxType::TerminateContract => {
            let contract = tx.to.unwrap_or(Address::ZERO);
            let outcome = terminate(&mut scratch, tx, contract, sender, block);
            (contract, TERMINATE_METHOD.to_string(), outcome)
        }
    };

    let result = outcome.unwrap_or_else(|e| ExecutionResult::failed(0, e));
    if result.success {
        *state = scratch;
    } else {
        debug!(
            "Execution of {} on {} failed: {}",
            method,
            contract,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(TxExecution {
        sender,
        contract,
        method,
        result,
    })
}

fn deploy(
    state: &mut AppState,
    tx: &Transaction,
    sender: Address,
    block: Option<BlockContext>,
) -> (Address, Result<ExecutionResult, ExecutionError>) {
    let attachment = match DeployContractAttachment::from_bytes(&tx.payload.0) {
        Ok(a) => a,
        Err(e) => return (Address::ZERO, Err(e.into())),
    };

    // Empty code redeploys code already stored under the hash
    let code = if attachment.code.0.is_empty() {
        match state.code(&attachment.code_hash) {
            Some(code) => code.to_vec(),
            None => {
                return (
                    Address::ZERO,
                    Err(ExecutionError::MissingCode(attachment.code_hash)),
                )
            }
        }
    } else {
        attachment.code.0.clone()
    };
    let code_hash = Hash::from_digest(&sha256(&code));
    if !attachment.code_hash.is_zero() && attachment.code_hash != code_hash {
        return (
            Address::ZERO,
            Err(ExecutionError::CodeHashMismatch(attachment.code_hash)),
        );
    }

    let contract = contract_address(&sender, tx.nonce, &code_hash);
    let outcome = install(state, contract, code_hash, code, &attachment, tx, sender, block);
    (contract, outcome)
}

/// Store the code, create the contract and run its constructor
#[allow(clippy::too_many_arguments)]
fn install(
    state: &mut AppState,
    contract: Address,
    code_hash: Hash,
    code: Vec<u8>,
    attachment: &DeployContractAttachment,
    tx: &Transaction,
    sender: Address,
    block: Option<BlockContext>,
) -> Result<ExecutionResult, ExecutionError> {
    let program = Program::decode(&code)?;
    if state.contract_exists(&contract) {
        return Err(ExecutionError::ContractExists(contract));
    }
    state.put_code(code_hash, code);
    state.create_contract(contract, code_hash, tx.amount.clone());

    if !program.has_method(DEPLOY_METHOD) {
        return Ok(ExecutionResult {
            success: true,
            ..ExecutionResult::default()
        });
    }
    let context = vm_context(state, sender, contract, attachment.args(), &tx.amount, block);
    invoke(state, &program, DEPLOY_METHOD, context)
}

fn call(
    state: &mut AppState,
    contract: Address,
    attachment: &CallContractAttachment,
    sender: Address,
    amount: &Amount,
    block: Option<BlockContext>,
) -> Result<ExecutionResult, ExecutionError> {
    let program = load_program(state, &contract)?;
    let context = vm_context(state, sender, contract, attachment.args(), amount, block);
    invoke(state, &program, &attachment.method, context)
}

fn terminate(
    state: &mut AppState,
    tx: &Transaction,
    contract: Address,
    sender: Address,
    block: Option<BlockContext>,
) -> Result<ExecutionResult, ExecutionError> {
    let attachment = TerminateContractAttachment::from_bytes(&tx.payload.0)?;
    let program = load_program(state, &contract)?;

    let result = if program.has_method(TERMINATE_METHOD) {
        let context = vm_context(state, sender, contract, attachment.args(), &Amount::zero(), block);
        invoke(state, &program, TERMINATE_METHOD, context)?
    } else {
        ExecutionResult {
            success: true,
            ..ExecutionResult::default()
        }
    };

    if result.success {
        if let Some(removed) = state.remove_contract(&contract) {
            state.add_balance(&sender, &removed.stake);
        }
    }
    Ok(result)
}

/// Execute a method without keeping any of its writes
pub fn read_method(
    state: &AppState,
    contract: &Address,
    method: &str,
    args: Vec<ArgSlot>,
) -> Result<Vec<u8>, ExecutionError> {
    let program = load_program(state, contract)?;
    let info = state
        .contract(contract)
        .ok_or(ExecutionError::UnknownContract(*contract))?;
    let context = vm_context(state, Address::ZERO, *contract, args, &Amount::zero(), None);
    let mut vm = VM::new(&program, method, &info.storage, context)?;
    let result = vm.execute()?;
    Ok(result.return_value.unwrap_or_default())
}

/// Commit `tx` to `state`: advance the nonce, move the value, execute and
/// burn the fee. The transaction must already be validated.
pub fn apply_tx(
    state: &mut AppState,
    tx: &Transaction,
    block: BlockContext,
) -> Result<(Receipt, Vec<ContractEvent>), TransactionError> {
    let sender = tx.sender()?;
    if tx.nonce > state.nonce(&sender) {
        state.set_nonce(&sender, tx.nonce);
    }

    let mut scratch = state.clone();
    match (tx.tx_type, tx.to) {
        (TxType::CallContract, Some(to)) if !tx.amount.is_zero() => {
            scratch.sub_balance(&sender, &tx.amount);
            scratch.add_balance(&to, &tx.amount);
        }
        (TxType::DeployContract, _) => scratch.sub_balance(&sender, &tx.amount),
        _ => {}
    }

    let execution = run_tx(&mut scratch, tx, Some(sender), Some(block))?;
    if execution.result.success {
        *state = scratch;
    }

    let gas_used = execution.result.gas_used;
    let fee = charged_fee(state, tx, gas_used);
    state.sub_balance(&sender, &fee);

    let events = execution
        .result
        .events
        .iter()
        .map(|e| ContractEvent {
            contract: execution.contract,
            event: e.name.clone(),
            args: e.args.iter().cloned().map(HexBytes).collect(),
        })
        .collect();

    let receipt = Receipt {
        contract: execution.contract,
        method: execution.method,
        success: execution.result.success,
        gas_used,
        tx_hash: Some(tx.hash()),
        error: execution.result.error,
        gas_cost: gas_cost(state, gas_used),
        tx_fee: fee,
        action_result: execution.result.return_value.map(HexBytes),
        block_height: Some(block.height),
    };
    Ok((receipt, events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{word_to_bytes, Compiler};
    use crate::core::fee::DEFAULT_FEE_PER_GAS;
    use crate::crypto::KeyPair;

    const COUNTER: &str = "
        .method deploy
        ARG 0
        SSTOREK count
        HALT
        .method inc
        SLOADK count
        PUSH 1
        ADD
        DUP
        SSTOREK count
        EMIT incremented 1
        HALT
        .method get
        SLOADK count
        RETURN
        .method fail
        REVERT
    ";

    const BLOCK: BlockContext = BlockContext {
        height: 1,
        timestamp: 20,
    };

    fn setup() -> (AppState, KeyPair) {
        let kp = KeyPair::generate();
        let mut state = AppState::new(DEFAULT_FEE_PER_GAS.parse().unwrap());
        state.add_balance(&kp.address(), &Amount::from_whole(100));
        (state, kp)
    }

    fn deploy_tx(kp: &KeyPair, nonce: u64, amount: Amount, start: u64) -> Transaction {
        let code = Compiler::new().compile(COUNTER).unwrap();
        let payload = DeployContractAttachment::new(
            Hash::ZERO,
            code,
            vec![Some(start.to_be_bytes().to_vec())],
        )
        .to_bytes()
        .unwrap();
        let mut tx = Transaction::new(
            TxType::DeployContract,
            None,
            amount,
            Amount::from_whole(1),
            nonce,
            payload,
        );
        tx.sign(kp).unwrap();
        tx
    }

    fn call_tx(kp: &KeyPair, nonce: u64, contract: Address, method: &str, amount: Amount) -> Transaction {
        let payload = CallContractAttachment::new(method, vec![]).to_bytes().unwrap();
        let mut tx = Transaction::new(
            TxType::CallContract,
            Some(contract),
            amount,
            Amount::from_whole(1),
            nonce,
            payload,
        );
        tx.sign(kp).unwrap();
        tx
    }

    fn deployed(state: &mut AppState, kp: &KeyPair) -> Address {
        let (receipt, _) = apply_tx(state, &deploy_tx(kp, 1, Amount::from_whole(2), 5), BLOCK).unwrap();
        assert!(receipt.success, "{:?}", receipt.error);
        receipt.contract
    }

    #[test]
    fn test_deploy_runs_constructor_and_records_stake() {
        let (mut state, kp) = setup();
        let contract = deployed(&mut state, &kp);

        let info = state.contract(&contract).unwrap();
        assert_eq!(info.stake, Amount::from_whole(2));
        assert_eq!(state.storage_get(&contract, b"count"), Some(&word_to_bytes(5)[..]));
        assert_eq!(state.nonce(&kp.address()), 1);
        assert!(state.balance(&kp.address()) < Amount::from_whole(98));
    }

    #[test]
    fn test_call_updates_storage_and_emits() {
        let (mut state, kp) = setup();
        let contract = deployed(&mut state, &kp);

        let tx = call_tx(&kp, 2, contract, "inc", Amount::from_whole(3));
        let (receipt, events) = apply_tx(&mut state, &tx, BLOCK).unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.method, "inc");
        assert_eq!(receipt.tx_hash, Some(tx.hash()));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "incremented");
        assert_eq!(events[0].args, vec![HexBytes(word_to_bytes(6))]);
        assert_eq!(state.balance(&contract), Amount::from_whole(3));
        assert_eq!(
            read_method(&state, &contract, "get", vec![]).unwrap(),
            word_to_bytes(6)
        );
    }

    #[test]
    fn test_failed_call_keeps_value_and_charges_fee() {
        let (mut state, kp) = setup();
        let contract = deployed(&mut state, &kp);
        let before = state.balance(&kp.address());

        let tx = call_tx(&kp, 2, contract, "fail", Amount::from_whole(3));
        let (receipt, events) = apply_tx(&mut state, &tx, BLOCK).unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.error.as_deref(), Some("Execution reverted"));
        assert!(events.is_empty());
        assert_eq!(state.balance(&contract), Amount::zero());
        assert_eq!(state.balance(&kp.address()), before - receipt.tx_fee);
        assert_eq!(state.nonce(&kp.address()), 2);
    }

    #[test]
    fn test_run_tx_moves_no_value() {
        let (mut state, kp) = setup();
        let contract = deployed(&mut state, &kp);
        let sender_before = state.balance(&kp.address());

        let tx = call_tx(&kp, 2, contract, "inc", Amount::from_whole(3));
        let execution = run_tx(&mut state, &tx, None, None).unwrap();
        assert!(execution.result.success);
        assert_eq!(state.balance(&kp.address()), sender_before);
        assert_eq!(state.balance(&contract), Amount::zero());
    }

    #[test]
    fn test_unsigned_run_needs_sender() {
        let (mut state, kp) = setup();
        let contract = deployed(&mut state, &kp);
        let payload = CallContractAttachment::new("get", vec![]).to_bytes().unwrap();
        let tx = Transaction::new(
            TxType::CallContract,
            Some(contract),
            Amount::zero(),
            Amount::zero(),
            0,
            payload,
        );
        assert!(matches!(
            run_tx(&mut state, &tx, None, None),
            Err(TransactionError::NotSigned)
        ));
        let execution = run_tx(&mut state, &tx, Some(kp.address()), None).unwrap();
        assert_eq!(execution.sender, kp.address());
        assert_eq!(execution.result.return_value, Some(word_to_bytes(5)));
    }

    #[test]
    fn test_terminate_refunds_stake() {
        let (mut state, kp) = setup();
        let contract = deployed(&mut state, &kp);

        let payload = TerminateContractAttachment::new(vec![]).to_bytes().unwrap();
        let mut tx = Transaction::new(
            TxType::TerminateContract,
            Some(contract),
            Amount::zero(),
            Amount::from_whole(1),
            2,
            payload,
        );
        tx.sign(&kp).unwrap();
        let before = state.balance(&kp.address());
        let (receipt, _) = apply_tx(&mut state, &tx, BLOCK).unwrap();
        assert!(receipt.success);
        assert!(!state.contract_exists(&contract));
        assert_eq!(
            state.balance(&kp.address()),
            before + Amount::from_whole(2) - receipt.tx_fee
        );
    }

    #[test]
    fn test_redeploy_by_code_hash() {
        let (mut state, kp) = setup();
        let contract = deployed(&mut state, &kp);
        let code_hash = state.contract(&contract).unwrap().code_hash;

        let payload = DeployContractAttachment::new(code_hash, vec![], vec![])
            .to_bytes()
            .unwrap();
        let mut tx = Transaction::new(
            TxType::DeployContract,
            None,
            Amount::zero(),
            Amount::from_whole(1),
            2,
            payload,
        );
        tx.sign(&kp).unwrap();
        let (receipt, _) = apply_tx(&mut state, &tx, BLOCK).unwrap();
        assert!(receipt.success);
        assert_ne!(receipt.contract, contract);
        assert_eq!(state.contract(&receipt.contract).unwrap().code_hash, code_hash);
    }

    #[test]
    fn test_read_method_errors() {
        let (mut state, kp) = setup();
        let contract = deployed(&mut state, &kp);
        assert!(matches!(
            read_method(&state, &contract, "fail", vec![]),
            Err(ExecutionError::Vm(VmError::Reverted))
        ));
        assert!(matches!(
            read_method(&state, &Address::ZERO, "get", vec![]),
            Err(ExecutionError::UnknownContract(_))
        ));
    }
}
