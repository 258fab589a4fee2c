//! Command-line interface

pub mod commands;

pub use commands::{
    cmd_compile, cmd_disassemble, cmd_keygen, cmd_start, resolve_config, CliResult,
    StartOverrides,
};
