//! Contract opcodes
//!
//! Defines the instruction set for the contract virtual machine.

use serde::{Deserialize, Serialize};

/// Shape of the operand that follows an opcode in the bytecode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    /// 8-bit index
    U8,
    /// 32-bit jump offset
    U32,
    /// 64-bit big-endian word
    U64,
    /// Length-prefixed byte literal (u8 length)
    Bytes,
    /// Length-prefixed byte literal followed by an 8-bit count
    BytesAndU8,
}

/// Opcodes for the contract VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    // Stack operations (0x00 - 0x0F)
    /// Push a value onto the stack
    Push = 0x00,
    /// Pop the top value from the stack
    Pop = 0x01,
    /// Duplicate the top value
    Dup = 0x02,
    /// Swap the top two values
    Swap = 0x03,

    // Arithmetic (0x10 - 0x1F)
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Mod = 0x14,

    // Comparison (0x20 - 0x2F)
    Eq = 0x20,
    Lt = 0x21,
    Gt = 0x22,
    Le = 0x23,
    Ge = 0x24,
    Neq = 0x25,
    IsZero = 0x26,

    // Logic (0x30 - 0x3F)
    And = 0x30,
    Or = 0x31,
    Not = 0x32,

    // Control flow (0x40 - 0x4F)
    /// Unconditional jump
    Jump = 0x40,
    /// Conditional jump (if top of stack is non-zero)
    JumpIf = 0x41,
    /// Halt execution without a result
    Halt = 0x42,
    /// Return the top of the stack
    Return = 0x43,
    /// Revert execution
    Revert = 0x44,

    // Storage (0x50 - 0x5F)
    /// Store by word key: key, value ->
    SStore = 0x50,
    /// Load by word key: key -> value
    SLoad = 0x51,
    /// Store under a literal key: value ->
    SStoreK = 0x52,
    /// Load from a literal key: -> value
    SLoadK = 0x53,
    /// Put into a named map: key, value ->
    MPut = 0x54,
    /// Get from a named map: key -> value
    MGet = 0x55,

    // Chain context (0x60 - 0x6F)
    /// Push caller address (first 8 bytes)
    Caller = 0x62,
    /// Push contract address (first 8 bytes)
    Self_ = 0x63,
    /// Push current block timestamp
    Timestamp = 0x64,
    /// Push current block number
    BlockNumber = 0x65,
    /// Push contract's balance in base units
    SelfBalance = 0x66,
    /// Push the value sent with the call in base units
    CallValue = 0x67,

    // Arguments (0x70 - 0x7F)
    /// Load argument by index (absent reads as 0)
    Arg = 0x70,
    /// Get number of argument slots
    ArgCount = 0x71,
    /// Push 1 if the argument slot is present
    HasArg = 0x72,

    // Events (0x80 - 0x8F)
    /// Emit a named event with the top `n` words as arguments
    Emit = 0x80,

    // No operation
    Nop = 0xFF,
}

impl OpCode {
    /// Convert byte to opcode
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            0x00 => OpCode::Push,
            0x01 => OpCode::Pop,
            0x02 => OpCode::Dup,
            0x03 => OpCode::Swap,
            0x10 => OpCode::Add,
            0x11 => OpCode::Sub,
            0x12 => OpCode::Mul,
            0x13 => OpCode::Div,
            0x14 => OpCode::Mod,
            0x20 => OpCode::Eq,
            0x21 => OpCode::Lt,
            0x22 => OpCode::Gt,
            0x23 => OpCode::Le,
            0x24 => OpCode::Ge,
            0x25 => OpCode::Neq,
            0x26 => OpCode::IsZero,
            0x30 => OpCode::And,
            0x31 => OpCode::Or,
            0x32 => OpCode::Not,
            0x40 => OpCode::Jump,
            0x41 => OpCode::JumpIf,
            0x42 => OpCode::Halt,
            0x43 => OpCode::Return,
            0x44 => OpCode::Revert,
            0x50 => OpCode::SStore,
            0x51 => OpCode::SLoad,
            0x52 => OpCode::SStoreK,
            0x53 => OpCode::SLoadK,
            0x54 => OpCode::MPut,
            0x55 => OpCode::MGet,
            0x62 => OpCode::Caller,
            0x63 => OpCode::Self_,
            0x64 => OpCode::Timestamp,
            0x65 => OpCode::BlockNumber,
            0x66 => OpCode::SelfBalance,
            0x67 => OpCode::CallValue,
            0x70 => OpCode::Arg,
            0x71 => OpCode::ArgCount,
            0x72 => OpCode::HasArg,
            0x80 => OpCode::Emit,
            0xFF => OpCode::Nop,
            _ => return None,
        };
        Some(op)
    }

    /// Look up an opcode by its assembler mnemonic
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_OPCODES
            .iter()
            .copied()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }

    /// Operand that follows this opcode
    pub fn operand(&self) -> Operand {
        match self {
            OpCode::Push => Operand::U64,
            OpCode::Jump | OpCode::JumpIf => Operand::U32,
            OpCode::Arg | OpCode::HasArg => Operand::U8,
            OpCode::SStoreK | OpCode::SLoadK | OpCode::MPut | OpCode::MGet => Operand::Bytes,
            OpCode::Emit => Operand::BytesAndU8,
            _ => Operand::None,
        }
    }

    /// Get opcode name for disassembly
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Push => "PUSH",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::Swap => "SWAP",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Eq => "EQ",
            OpCode::Lt => "LT",
            OpCode::Gt => "GT",
            OpCode::Le => "LE",
            OpCode::Ge => "GE",
            OpCode::Neq => "NEQ",
            OpCode::IsZero => "ISZERO",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::Not => "NOT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIf => "JUMPI",
            OpCode::Halt => "HALT",
            OpCode::Return => "RETURN",
            OpCode::Revert => "REVERT",
            OpCode::SStore => "SSTORE",
            OpCode::SLoad => "SLOAD",
            OpCode::SStoreK => "SSTOREK",
            OpCode::SLoadK => "SLOADK",
            OpCode::MPut => "MPUT",
            OpCode::MGet => "MGET",
            OpCode::Caller => "CALLER",
            OpCode::Self_ => "SELF",
            OpCode::Timestamp => "TIMESTAMP",
            OpCode::BlockNumber => "BLOCKNUMBER",
            OpCode::SelfBalance => "SELFBALANCE",
            OpCode::CallValue => "CALLVALUE",
            OpCode::Arg => "ARG",
            OpCode::ArgCount => "ARGCOUNT",
            OpCode::HasArg => "HASARG",
            OpCode::Emit => "EMIT",
            OpCode::Nop => "NOP",
        }
    }
}

const ALL_OPCODES: [OpCode; 41] = [
    OpCode::Push,
    OpCode::Pop,
    OpCode::Dup,
    OpCode::Swap,
    OpCode::Add,
    OpCode::Sub,
    OpCode::Mul,
    OpCode::Div,
    OpCode::Mod,
    OpCode::Eq,
    OpCode::Lt,
    OpCode::Gt,
    OpCode::Le,
    OpCode::Ge,
    OpCode::Neq,
    OpCode::IsZero,
    OpCode::And,
    OpCode::Or,
    OpCode::Not,
    OpCode::Jump,
    OpCode::JumpIf,
    OpCode::Halt,
    OpCode::Return,
    OpCode::Revert,
    OpCode::SStore,
    OpCode::SLoad,
    OpCode::SStoreK,
    OpCode::SLoadK,
    OpCode::MPut,
    OpCode::MGet,
    OpCode::Caller,
    OpCode::Self_,
    OpCode::Timestamp,
    OpCode::BlockNumber,
    OpCode::SelfBalance,
    OpCode::CallValue,
    OpCode::Arg,
    OpCode::ArgCount,
    OpCode::HasArg,
    OpCode::Emit,
    OpCode::Nop,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for op in ALL_OPCODES {
            let decoded = OpCode::from_byte(op as u8).unwrap();
            assert_eq!(op, decoded);
            assert_eq!(OpCode::from_name(op.name()), Some(op));
        }
    }

    #[test]
    fn test_mnemonics_are_case_insensitive() {
        assert_eq!(OpCode::from_name("mput"), Some(OpCode::MPut));
        assert_eq!(OpCode::from_name("BOGUS"), None);
    }

    #[test]
    fn test_operands() {
        assert_eq!(OpCode::Push.operand(), Operand::U64);
        assert_eq!(OpCode::Emit.operand(), Operand::BytesAndU8);
        assert_eq!(OpCode::Add.operand(), Operand::None);
    }
}
