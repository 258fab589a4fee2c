//! Contract virtual machine
//!
//! A stack-based VM for executing contract methods.
//! - 64-bit stack words, bounded stack
//! - Gas metering per opcode
//! - Byte-keyed storage read through to the contract's durable storage,
//!   with writes buffered until the caller decides to keep them

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::opcodes::OpCode;
use crate::contract::program::Program;
use crate::core::attachment::ArgSlot;
use crate::core::state::MAX_CONTRACT_STORE_KEY_LENGTH;
use crate::core::types::Address;

// =============================================================================
// VM Constants
// =============================================================================

/// Maximum stack size
const MAX_STACK_SIZE: usize = 1024;

/// Default gas limit
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

/// Maximum words an event may carry
pub const MAX_EVENT_ARGS: u8 = 16;

// =============================================================================
// VM Errors
// =============================================================================

/// VM execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u8),
    #[error("Out of gas")]
    OutOfGas,
    #[error("Invalid jump destination: {0}")]
    InvalidJump(u32),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Execution reverted")]
    Reverted,
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
    #[error("Storage key too long: {0} bytes (max: {1})")]
    KeyTooLong(usize, usize),
    #[error("Too many event arguments: {0} (max: {1})")]
    TooManyEventArgs(u8, u8),
    #[error("Truncated operand at {0}")]
    TruncatedOperand(usize),
}

/// Execution context for the VM
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub caller: Address,
    pub contract: Address,
    /// Block timestamp; 0 when not yet mined
    pub timestamp: u64,
    /// Block number; 0 when not yet mined
    pub block_number: u64,
    pub args: Vec<ArgSlot>,
    /// Value sent with the call, in base units
    pub call_value: u64,
    /// Contract balance, in base units
    pub self_balance: u64,
    pub gas_limit: u64,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            caller: Address::ZERO,
            contract: Address::ZERO,
            timestamp: 0,
            block_number: 0,
            args: Vec::new(),
            call_value: 0,
            self_balance: 0,
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

/// An event emitted during execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub name: String,
    pub args: Vec<Vec<u8>>,
}

/// Result of VM execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub success: bool,
    /// Returned word as 8 big-endian bytes
    pub return_value: Option<Vec<u8>>,
    pub gas_used: u64,
    /// Buffered storage writes
    pub storage_changes: BTreeMap<Vec<u8>, Vec<u8>>,
    pub events: Vec<EmittedEvent>,
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Result of a failed execution
    pub fn failed(gas_used: u64, error: impl ToString) -> Self {
        Self {
            success: false,
            gas_used,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Interpret up to the last 8 bytes of a buffer as a big-endian word
pub fn word_from_bytes(bytes: &[u8]) -> u64 {
    let tail = &bytes[bytes.len().saturating_sub(8)..];
    tail.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Encode a word as 8 big-endian bytes
pub fn word_to_bytes(word: u64) -> Vec<u8> {
    word.to_be_bytes().to_vec()
}

fn address_word(address: &Address) -> u64 {
    word_from_bytes(&address.as_bytes()[..8])
}

/// The contract virtual machine
pub struct VM<'a> {
    /// Stack for computation
    stack: Vec<u64>,
    /// Program counter
    pc: usize,
    /// Gas remaining
    gas: u64,
    /// Durable storage of the contract
    storage: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    /// Pending storage changes
    storage_changes: BTreeMap<Vec<u8>, Vec<u8>>,
    events: Vec<EmittedEvent>,
    code: &'a [u8],
    context: ExecutionContext,
    halted: bool,
    return_value: Option<u64>,
}

impl<'a> VM<'a> {
    /// Prepare a VM positioned at the entry of `method`
    pub fn new(
        program: &'a Program,
        method: &str,
        storage: &'a BTreeMap<Vec<u8>, Vec<u8>>,
        context: ExecutionContext,
    ) -> Result<Self, VmError> {
        let entry = program
            .entry(method)
            .ok_or_else(|| VmError::UnknownMethod(method.to_string()))?;
        Ok(Self {
            stack: Vec::with_capacity(256),
            pc: entry as usize,
            gas: context.gas_limit,
            storage,
            storage_changes: BTreeMap::new(),
            events: Vec::new(),
            code: &program.code,
            context,
            halted: false,
            return_value: None,
        })
    }

    pub fn gas_used(&self) -> u64 {
        self.context.gas_limit - self.gas
    }

    /// Execute until halt, returning the error on failure
    pub fn execute(&mut self) -> Result<ExecutionResult, VmError> {
        while !self.halted && self.pc < self.code.len() {
            self.step()?;
        }

        Ok(ExecutionResult {
            success: true,
            return_value: self.return_value.map(word_to_bytes),
            gas_used: self.gas_used(),
            storage_changes: std::mem::take(&mut self.storage_changes),
            events: std::mem::take(&mut self.events),
            error: None,
        })
    }

    /// Execute and fold any failure into an unsuccessful result
    pub fn run(mut self) -> ExecutionResult {
        match self.execute() {
            Ok(result) => result,
            Err(VmError::OutOfGas) => {
                ExecutionResult::failed(self.context.gas_limit, VmError::OutOfGas)
            }
            Err(e) => ExecutionResult::failed(self.gas_used(), e),
        }
    }

    /// Execute a single instruction
    fn step(&mut self) -> Result<(), VmError> {
        let opcode_byte = self.code[self.pc];
        let opcode = OpCode::from_byte(opcode_byte).ok_or(VmError::InvalidOpcode(opcode_byte))?;

        let gas_cost = self.gas_cost(&opcode);
        if self.gas < gas_cost {
            return Err(VmError::OutOfGas);
        }
        self.gas -= gas_cost;

        self.pc += 1;

        match opcode {
            OpCode::Push => {
                let value = self.read_u64()?;
                self.push(value)?;
            }
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let value = *self.stack.last().ok_or(VmError::StackUnderflow)?;
                self.push(value)?;
            }
            OpCode::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(VmError::StackUnderflow);
                }
                self.stack.swap(len - 1, len - 2);
            }
            OpCode::Add => self.binary(|a, b| Ok(a.wrapping_add(b)))?,
            OpCode::Sub => self.binary(|a, b| Ok(a.wrapping_sub(b)))?,
            OpCode::Mul => self.binary(|a, b| Ok(a.wrapping_mul(b)))?,
            OpCode::Div => self.binary(|a, b| a.checked_div(b).ok_or(VmError::DivisionByZero))?,
            OpCode::Mod => self.binary(|a, b| a.checked_rem(b).ok_or(VmError::DivisionByZero))?,
            OpCode::Eq => self.binary(|a, b| Ok(u64::from(a == b)))?,
            OpCode::Lt => self.binary(|a, b| Ok(u64::from(a < b)))?,
            OpCode::Gt => self.binary(|a, b| Ok(u64::from(a > b)))?,
            OpCode::Le => self.binary(|a, b| Ok(u64::from(a <= b)))?,
            OpCode::Ge => self.binary(|a, b| Ok(u64::from(a >= b)))?,
            OpCode::Neq => self.binary(|a, b| Ok(u64::from(a != b)))?,
            OpCode::And => self.binary(|a, b| Ok(a & b))?,
            OpCode::Or => self.binary(|a, b| Ok(a | b))?,
            OpCode::IsZero => {
                let a = self.pop()?;
                self.push(u64::from(a == 0))?;
            }
            OpCode::Not => {
                let a = self.pop()?;
                self.push(!a)?;
            }
            OpCode::Jump => {
                let offset = self.read_u32()?;
                self.jump(offset)?;
            }
            OpCode::JumpIf => {
                let offset = self.read_u32()?;
                let condition = self.pop()?;
                if condition != 0 {
                    self.jump(offset)?;
                }
            }
            OpCode::Halt => {
                self.halted = true;
            }
            OpCode::Return => {
                self.return_value = Some(self.pop()?);
                self.halted = true;
            }
            OpCode::Revert => {
                return Err(VmError::Reverted);
            }
            OpCode::SStore => {
                let value = self.pop()?;
                let key = self.pop()?;
                self.store(word_to_bytes(key), value)?;
            }
            OpCode::SLoad => {
                let key = self.pop()?;
                let value = self.load(&word_to_bytes(key));
                self.push(value)?;
            }
            OpCode::SStoreK => {
                let key = self.read_literal()?;
                let value = self.pop()?;
                self.store(key, value)?;
            }
            OpCode::SLoadK => {
                let key = self.read_literal()?;
                let value = self.load(&key);
                self.push(value)?;
            }
            OpCode::MPut => {
                let mut key = self.read_literal()?;
                let value = self.pop()?;
                let item = self.pop()?;
                key.extend_from_slice(&item.to_be_bytes());
                self.store(key, value)?;
            }
            OpCode::MGet => {
                let mut key = self.read_literal()?;
                let item = self.pop()?;
                key.extend_from_slice(&item.to_be_bytes());
                let value = self.load(&key);
                self.push(value)?;
            }
            OpCode::Caller => self.push(address_word(&self.context.caller))?,
            OpCode::Self_ => self.push(address_word(&self.context.contract))?,
            OpCode::Timestamp => self.push(self.context.timestamp)?,
            OpCode::BlockNumber => self.push(self.context.block_number)?,
            OpCode::SelfBalance => self.push(self.context.self_balance)?,
            OpCode::CallValue => self.push(self.context.call_value)?,
            OpCode::Arg => {
                let index = self.read_u8()? as usize;
                let value = match self.context.args.get(index) {
                    Some(Some(bytes)) => word_from_bytes(bytes),
                    _ => 0,
                };
                self.push(value)?;
            }
            OpCode::ArgCount => {
                self.push(self.context.args.len() as u64)?;
            }
            OpCode::HasArg => {
                let index = self.read_u8()? as usize;
                let present = matches!(self.context.args.get(index), Some(Some(_)));
                self.push(u64::from(present))?;
            }
            OpCode::Emit => {
                let name = self.read_literal()?;
                let count = self.read_u8()?;
                if count > MAX_EVENT_ARGS {
                    return Err(VmError::TooManyEventArgs(count, MAX_EVENT_ARGS));
                }
                let mut args = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    args.push(word_to_bytes(self.pop()?));
                }
                args.reverse();
                self.events.push(EmittedEvent {
                    name: String::from_utf8_lossy(&name).into_owned(),
                    args,
                });
            }
            OpCode::Nop => {}
        }

        Ok(())
    }

    fn binary(&mut self, f: impl Fn(u64, u64) -> Result<u64, VmError>) -> Result<(), VmError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(a, b)?)
    }

    fn jump(&mut self, offset: u32) -> Result<(), VmError> {
        if offset as usize >= self.code.len() {
            return Err(VmError::InvalidJump(offset));
        }
        self.pc = offset as usize;
        Ok(())
    }

    fn store(&mut self, key: Vec<u8>, value: u64) -> Result<(), VmError> {
        if key.len() > MAX_CONTRACT_STORE_KEY_LENGTH {
            return Err(VmError::KeyTooLong(key.len(), MAX_CONTRACT_STORE_KEY_LENGTH));
        }
        self.storage_changes.insert(key, word_to_bytes(value));
        Ok(())
    }

    /// Buffered writes shadow durable storage; missing keys read as 0
    fn load(&self, key: &[u8]) -> u64 {
        self.storage_changes
            .get(key)
            .or_else(|| self.storage.get(key))
            .map(|v| word_from_bytes(v))
            .unwrap_or(0)
    }

    /// Push value onto stack
    fn push(&mut self, value: u64) -> Result<(), VmError> {
        if self.stack.len() >= MAX_STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pop value from stack
    fn pop(&mut self) -> Result<u64, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], VmError> {
        let code = self.code;
        let bytes = code
            .get(self.pc..self.pc + n)
            .ok_or(VmError::TruncatedOperand(self.pc))?;
        self.pc += n;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, VmError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, VmError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, VmError> {
        Ok(word_from_bytes(self.read_bytes(8)?))
    }

    /// Length-prefixed literal operand
    fn read_literal(&mut self) -> Result<Vec<u8>, VmError> {
        let len = self.read_u8()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// Get gas cost for opcode
    fn gas_cost(&self, opcode: &OpCode) -> u64 {
        match opcode {
            OpCode::Push | OpCode::Pop | OpCode::Dup | OpCode::Swap => 2,
            OpCode::Add | OpCode::Sub | OpCode::Mul => 3,
            OpCode::Div | OpCode::Mod => 5,
            OpCode::Eq | OpCode::Lt | OpCode::Gt | OpCode::Le | OpCode::Ge | OpCode::Neq => 3,
            OpCode::And | OpCode::Or | OpCode::Not | OpCode::IsZero => 3,
            OpCode::Jump | OpCode::JumpIf => 8,
            OpCode::SStore | OpCode::SStoreK | OpCode::MPut => 20,
            OpCode::SLoad | OpCode::SLoadK | OpCode::MGet => 5,
            OpCode::SelfBalance => 10,
            OpCode::Emit => 30,
            OpCode::Caller
            | OpCode::Self_
            | OpCode::Timestamp
            | OpCode::BlockNumber
            | OpCode::CallValue => 2,
            OpCode::Arg | OpCode::ArgCount | OpCode::HasArg => 2,
            OpCode::Halt | OpCode::Return | OpCode::Revert => 0,
            OpCode::Nop => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_push(value: u64) -> Vec<u8> {
        let mut bytes = vec![OpCode::Push as u8];
        bytes.extend_from_slice(&value.to_be_bytes());
        bytes
    }

    fn literal(op: OpCode, key: &[u8]) -> Vec<u8> {
        let mut bytes = vec![op as u8, key.len() as u8];
        bytes.extend_from_slice(key);
        bytes
    }

    fn program(code: Vec<u8>) -> Program {
        let mut methods = BTreeMap::new();
        methods.insert("main".to_string(), 0);
        Program::new(methods, code)
    }

    fn run(code: Vec<u8>, context: ExecutionContext) -> ExecutionResult {
        let program = program(code);
        let storage = BTreeMap::new();
        VM::new(&program, "main", &storage, context).unwrap().run()
    }

    #[test]
    fn test_simple_addition() {
        let mut code = make_push(10);
        code.extend(make_push(20));
        code.push(OpCode::Add as u8);
        code.push(OpCode::Return as u8);

        let result = run(code, ExecutionContext::default());
        assert!(result.success);
        assert_eq!(result.return_value, Some(word_to_bytes(30)));
    }

    #[test]
    fn test_storage_changes_are_buffered() {
        let mut code = make_push(42);
        code.extend(literal(OpCode::SStoreK, b"answer"));
        code.extend(literal(OpCode::SLoadK, b"answer"));
        code.push(OpCode::Return as u8);

        let result = run(code, ExecutionContext::default());
        assert_eq!(result.return_value, Some(word_to_bytes(42)));
        assert_eq!(
            result.storage_changes.get(b"answer".as_slice()),
            Some(&word_to_bytes(42))
        );
    }

    #[test]
    fn test_map_keys_are_prefixed() {
        let mut code = make_push(7); // key
        code.extend(make_push(99)); // value
        code.extend(literal(OpCode::MPut, b"bal"));
        let result = run(code, ExecutionContext::default());

        let mut expected_key = b"bal".to_vec();
        expected_key.extend_from_slice(&7u64.to_be_bytes());
        assert_eq!(
            result.storage_changes.get(&expected_key),
            Some(&word_to_bytes(99))
        );
    }

    #[test]
    fn test_reads_durable_storage() {
        let program = program({
            let mut code = literal(OpCode::SLoadK, b"k");
            code.push(OpCode::Return as u8);
            code
        });
        let mut storage = BTreeMap::new();
        storage.insert(b"k".to_vec(), word_to_bytes(5));
        let result = VM::new(&program, "main", &storage, ExecutionContext::default())
            .unwrap()
            .run();
        assert_eq!(result.return_value, Some(word_to_bytes(5)));
    }

    #[test]
    fn test_args_and_absent_slots() {
        let mut code = vec![OpCode::Arg as u8, 0, OpCode::Arg as u8, 1, OpCode::Add as u8];
        code.extend([OpCode::HasArg as u8, 1, OpCode::Add as u8, OpCode::Return as u8]);
        let context = ExecutionContext {
            args: vec![Some(vec![5]), None],
            ..ExecutionContext::default()
        };
        let result = run(code, context);
        assert_eq!(result.return_value, Some(word_to_bytes(5)));
    }

    #[test]
    fn test_emit_event() {
        let mut code = make_push(1);
        code.extend(make_push(2));
        code.extend(literal(OpCode::Emit, b"pair"));
        code.push(2);
        let result = run(code, ExecutionContext::default());
        assert_eq!(
            result.events,
            vec![EmittedEvent {
                name: "pair".to_string(),
                args: vec![word_to_bytes(1), word_to_bytes(2)],
            }]
        );
    }

    #[test]
    fn test_out_of_gas_uses_whole_limit() {
        let mut code = Vec::new();
        for _ in 0..100 {
            code.extend(make_push(1));
        }
        let context = ExecutionContext {
            gas_limit: 100,
            ..ExecutionContext::default()
        };
        let result = run(code, context);
        assert!(!result.success);
        assert_eq!(result.gas_used, 100);
        assert_eq!(result.error.as_deref(), Some("Out of gas"));
    }

    #[test]
    fn test_revert_and_unknown_method() {
        let result = run(vec![OpCode::Revert as u8], ExecutionContext::default());
        assert!(!result.success);
        assert!(result.storage_changes.is_empty());

        let program = program(vec![]);
        let storage = BTreeMap::new();
        assert!(matches!(
            VM::new(&program, "nope", &storage, ExecutionContext::default()),
            Err(VmError::UnknownMethod(_))
        ));
    }

    #[test]
    fn test_word_from_bytes() {
        assert_eq!(word_from_bytes(&[]), 0);
        assert_eq!(word_from_bytes(&[1, 0]), 256);
        assert_eq!(word_from_bytes(&[9, 0, 0, 0, 0, 0, 0, 0, 0, 1]), 1);
    }
}
