//! CLI commands for the contract runner
//!
//! Implements the command handlers behind the binary's subcommands.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::api::{create_router, ApiState};
use crate::config::NodeConfig;
use crate::contract::{disassemble, Compiler};
use crate::crypto::KeyPair;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Overrides given on the command line
#[derive(Debug, Default, Clone)]
pub struct StartOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub god_key: Option<String>,
}

/// Resolve the effective config: file, then flags
pub fn resolve_config(path: Option<&Path>, overrides: StartOverrides) -> CliResult<NodeConfig> {
    let mut config = match path {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(host) = overrides.host {
        config.host = host;
    }
    if let Some(port) = overrides.port {
        config.port = port;
    }
    if overrides.god_key.is_some() {
        config.god_private_key = overrides.god_key;
    }
    config.validate()?;
    Ok(config)
}

/// Start the RPC server on a fresh chain
pub async fn cmd_start(config: NodeConfig) -> CliResult<()> {
    let (runner, god) = config.build_runner()?;
    let balance = runner.balance(&god.address());

    info!("God address: {}", god.address());
    info!("God private key: {}", god.private_key_hex());
    info!("God balance: {} DNA", balance);

    let addr = config.bind_address();
    let app = create_router(ApiState::new(runner));

    println!("🚀 Contract runner listening on http://{}", addr);
    println!("   📍 God address: {}", god.address());
    println!("   💰 Balance: {} DNA", balance);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Assemble a source file into a hex-encoded program
pub fn cmd_compile(file: &Path, output: Option<&PathBuf>) -> CliResult<()> {
    let source = fs::read_to_string(file)?;
    let program = Compiler::new().compile(&source)?;
    let encoded = format!("0x{}", hex::encode(&program));

    match output {
        Some(path) => {
            fs::write(path, &encoded)?;
            println!("✅ Compiled {} bytes to {:?}", program.len(), path);
        }
        None => println!("{}", encoded),
    }
    Ok(())
}

/// Print the assembly of a hex-encoded program, given inline or as a file
pub fn cmd_disassemble(input: &str) -> CliResult<()> {
    let text = if Path::new(input).is_file() {
        fs::read_to_string(input)?
    } else {
        input.to_string()
    };
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let code = hex::decode(digits)?;
    println!("{}", disassemble(&code)?);
    Ok(())
}

/// Generate a key pair for use as a god key or sender
pub fn cmd_keygen() -> CliResult<()> {
    let key = KeyPair::generate();
    println!("🔐 New key pair");
    println!("   📍 Address: {}", key.address());
    println!("   🔑 Private key: {}", key.private_key_hex());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"host": "0.0.0.0", "port": 7000}}"#).unwrap();

        let config = resolve_config(
            Some(file.path()),
            StartOverrides {
                port: Some(8000),
                ..StartOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_bad_god_key_flag_is_rejected() {
        let overrides = StartOverrides {
            god_key: Some("xyz".to_string()),
            ..StartOverrides::default()
        };
        assert!(resolve_config(None, overrides).is_err());
    }

    #[test]
    fn test_compile_to_file() {
        let mut source = NamedTempFile::new().unwrap();
        write!(source, ".method get\nPUSH 1\nRETURN\n").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.hex");

        cmd_compile(source.path(), Some(&out)).unwrap();
        let written = fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("0x"));
        assert!(cmd_disassemble(&written).is_ok());
        assert!(cmd_disassemble(out.to_str().unwrap()).is_ok());
    }
}
