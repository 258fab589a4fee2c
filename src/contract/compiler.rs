//! Contract assembler
//!
//! Compiles assembly-like source to a [`Program`]. Besides one instruction
//! per line, the source may contain:
//! - `.method name` to start a callable method at the current offset
//! - `:label` to mark a jump target
//! - `;` or `#` comments
//!
//! Literal operands (`SSTOREK`, `SLOADK`, `MPUT`, `MGET`, `EMIT`) are either
//! plain text or `0x`-prefixed hex.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::contract::opcodes::{OpCode, Operand};
use crate::contract::program::{Program, ProgramError};
use crate::core::state::MAX_CONTRACT_STORE_KEY_LENGTH;

/// Width of the word key `MPUT`/`MGET` append to the map name
const MAP_ITEM_KEY_LEN: usize = 8;

/// Compiler errors
#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("Unknown instruction: {0}")]
    UnknownInstruction(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Duplicate method: {0}")]
    DuplicateMethod(String),
    #[error("Program declares no methods")]
    NoMethods,
    #[error("Literal too long: {0}")]
    LiteralTooLong(String),
}

/// Assembler for contract programs
pub struct Compiler {
    /// Output bytecode
    code: Vec<u8>,
    /// Method entry points
    methods: BTreeMap<String, u32>,
    /// Label positions
    labels: HashMap<String, u32>,
    /// Pending label references (position, label_name)
    label_refs: Vec<(usize, String)>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            methods: BTreeMap::new(),
            labels: HashMap::new(),
            label_refs: Vec::new(),
        }
    }

    /// Compile source to encoded program bytes
    pub fn compile(&mut self, source: &str) -> Result<Vec<u8>, CompilerError> {
        Ok(self.compile_program(source)?.encode())
    }

    /// Compile source to a program
    pub fn compile_program(&mut self, source: &str) -> Result<Program, CompilerError> {
        self.code.clear();
        self.methods.clear();
        self.labels.clear();
        self.label_refs.clear();

        // First pass: emit code, collect labels and methods
        for line in source.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(label) = line.strip_prefix(':') {
                self.labels
                    .insert(label.trim().to_string(), self.code.len() as u32);
                continue;
            }

            if let Some(rest) = line.strip_prefix(".method") {
                let name = rest.trim();
                if name.is_empty() || name.len() > u8::MAX as usize {
                    return Err(CompilerError::InvalidArgument(line.to_string()));
                }
                if self
                    .methods
                    .insert(name.to_string(), self.code.len() as u32)
                    .is_some()
                {
                    return Err(CompilerError::DuplicateMethod(name.to_string()));
                }
                continue;
            }

            self.compile_instruction(line)?;
        }

        if self.methods.is_empty() {
            return Err(CompilerError::NoMethods);
        }

        // Second pass: resolve label references
        for (pos, label) in &self.label_refs {
            let addr = self
                .labels
                .get(label)
                .ok_or_else(|| CompilerError::UndefinedLabel(label.clone()))?;
            self.code[*pos..*pos + 4].copy_from_slice(&addr.to_be_bytes());
        }

        Ok(Program::new(self.methods.clone(), self.code.clone()))
    }

    /// Compile a single instruction
    fn compile_instruction(&mut self, line: &str) -> Result<(), CompilerError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(mnemonic) = parts.first() else {
            return Ok(());
        };
        let opcode = OpCode::from_name(mnemonic)
            .ok_or_else(|| CompilerError::UnknownInstruction(mnemonic.to_uppercase()))?;
        let operand = |i: usize| {
            parts.get(i).copied().ok_or_else(|| {
                CompilerError::InvalidArgument(format!("{} requires an operand", opcode.name()))
            })
        };

        self.code.push(opcode as u8);
        match opcode.operand() {
            Operand::None => {}
            Operand::U64 => {
                let value = parse_number(parts.get(1).unwrap_or(&"0"))?;
                self.code.extend_from_slice(&value.to_be_bytes());
            }
            Operand::U32 => {
                self.label_refs.push((self.code.len(), operand(1)?.to_string()));
                self.code.extend_from_slice(&[0, 0, 0, 0]); // Placeholder
            }
            Operand::U8 => {
                let raw = operand(1)?;
                let index = raw
                    .parse::<u8>()
                    .map_err(|_| CompilerError::InvalidNumber(raw.to_string()))?;
                self.code.push(index);
            }
            Operand::Bytes => {
                let raw = operand(1)?;
                let literal = parse_literal(raw)?;
                let limit = match opcode {
                    OpCode::MPut | OpCode::MGet => {
                        MAX_CONTRACT_STORE_KEY_LENGTH - MAP_ITEM_KEY_LEN
                    }
                    _ => MAX_CONTRACT_STORE_KEY_LENGTH,
                };
                if literal.len() > limit {
                    return Err(CompilerError::LiteralTooLong(raw.to_string()));
                }
                self.push_literal(&literal);
            }
            Operand::BytesAndU8 => {
                let raw = operand(1)?;
                let literal = parse_literal(raw)?;
                if literal.len() > u8::MAX as usize {
                    return Err(CompilerError::LiteralTooLong(raw.to_string()));
                }
                let count_raw = operand(2)?;
                let count = count_raw
                    .parse::<u8>()
                    .map_err(|_| CompilerError::InvalidNumber(count_raw.to_string()))?;
                self.push_literal(&literal);
                self.code.push(count);
            }
        }

        Ok(())
    }

    fn push_literal(&mut self, literal: &[u8]) {
        self.code.push(literal.len() as u8);
        self.code.extend_from_slice(literal);
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a number (decimal or hex)
fn parse_number(s: &str) -> Result<u64, CompilerError> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => s.parse::<u64>(),
    }
    .map_err(|_| CompilerError::InvalidNumber(s.to_string()))
}

/// Parse a literal operand: `0x`-prefixed hex or plain text
fn parse_literal(s: &str) -> Result<Vec<u8>, CompilerError> {
    match s.strip_prefix("0x") {
        Some(digits) => {
            hex::decode(digits).map_err(|_| CompilerError::InvalidArgument(s.to_string()))
        }
        None => Ok(s.as_bytes().to_vec()),
    }
}

fn render_literal(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.is_empty() && text.chars().all(|c| c.is_ascii_graphic()) => {
            text.to_string()
        }
        _ => format!("0x{}", hex::encode(bytes)),
    }
}

/// Disassemble encoded program bytes to a readable listing
pub fn disassemble(program: &[u8]) -> Result<String, ProgramError> {
    let program = Program::decode(program)?;
    let code = &program.code;
    let mut entries: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
    for (name, offset) in &program.methods {
        entries.entry(*offset).or_default().push(name);
    }

    let mut output = String::new();
    let mut pc = 0;

    while pc < code.len() {
        if let Some(names) = entries.get(&(pc as u32)) {
            for name in names {
                output.push_str(&format!(".method {}\n", name));
            }
        }

        let opcode_byte = code[pc];
        let Some(opcode) = OpCode::from_byte(opcode_byte) else {
            output.push_str(&format!("{:04x}: UNKNOWN 0x{:02x}\n", pc, opcode_byte));
            pc += 1;
            continue;
        };
        output.push_str(&format!("{:04x}: {}", pc, opcode.name()));
        pc += 1;

        match opcode.operand() {
            Operand::None => {}
            Operand::U8 => {
                if let Some(b) = code.get(pc) {
                    output.push_str(&format!(" {}", b));
                    pc += 1;
                }
            }
            Operand::U32 => {
                if let Some(b) = code.get(pc..pc + 4) {
                    let addr = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
                    output.push_str(&format!(" 0x{:04x}", addr));
                    pc += 4;
                }
            }
            Operand::U64 => {
                if let Some(b) = code.get(pc..pc + 8) {
                    let value = b.iter().fold(0u64, |acc, x| (acc << 8) | u64::from(*x));
                    output.push_str(&format!(" {}", value));
                    pc += 8;
                }
            }
            Operand::Bytes | Operand::BytesAndU8 => {
                let len = code.get(pc).copied().unwrap_or(0) as usize;
                if let Some(literal) = code.get(pc + 1..pc + 1 + len) {
                    output.push_str(&format!(" {}", render_literal(literal)));
                    pc += 1 + len;
                    if opcode.operand() == Operand::BytesAndU8 {
                        if let Some(count) = code.get(pc) {
                            output.push_str(&format!(" {}", count));
                            pc += 1;
                        }
                    }
                } else {
                    pc = code.len();
                }
            }
        }

        output.push('\n');
    }

    Ok(output)
}
