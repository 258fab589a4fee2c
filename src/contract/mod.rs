//! Contract execution
//!
//! Provides the stack-based virtual machine contracts run on.
//!
//! # Overview
//!
//! This module implements:
//! - The instruction set and its gas schedule
//! - The program container with its method table
//! - An assembler and disassembler
//! - The VM itself, with buffered storage writes and events
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use contract_runner::contract::{word_to_bytes, Compiler, ExecutionContext, VM};
//!
//! let program = Compiler::new()
//!     .compile_program("
//!         .method answer
//!         PUSH 42
//!         RETURN
//!     ")
//!     .unwrap();
//!
//! let storage = BTreeMap::new();
//! let result = VM::new(&program, "answer", &storage, ExecutionContext::default())
//!     .unwrap()
//!     .run();
//! assert_eq!(result.return_value, Some(word_to_bytes(42)));
//! ```

pub mod compiler;
pub mod opcodes;
pub mod program;
pub mod vm;

pub use compiler::{disassemble, Compiler, CompilerError};
pub use opcodes::{OpCode, Operand};
pub use program::{Program, ProgramError, PROGRAM_MAGIC};
pub use vm::{
    word_from_bytes, word_to_bytes, EmittedEvent, ExecutionContext, ExecutionResult, VmError,
    DEFAULT_GAS_LIMIT, VM,
};
