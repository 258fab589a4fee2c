//! Contract runner CLI
//!
//! Starts the local single-validator node and offers contract tooling.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use contract_runner::cli::{self, StartOverrides};

#[derive(Parser)]
#[command(name = "contract-runner")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A local single-validator node for smart-contract development", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the JSON-RPC server on a fresh chain
    Start {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Hex private key of the god account
        #[arg(long)]
        god_key: Option<String>,
    },

    /// Assemble a contract source file
    Compile {
        /// Source file
        file: PathBuf,

        /// Write the hex program here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Disassemble a hex program, inline or from a file
    Disassemble {
        /// Hex string or path to a file holding one
        input: String,
    },

    /// Generate a new key pair
    Keygen,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            host,
            port,
            god_key,
        } => {
            let config = cli::resolve_config(
                cli.config.as_deref(),
                StartOverrides {
                    host,
                    port,
                    god_key,
                },
            )?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_start(config))?;
        }
        Commands::Compile { file, output } => {
            cli::cmd_compile(&file, output.as_ref())?;
        }
        Commands::Disassemble { input } => {
            cli::cmd_disassemble(&input)?;
        }
        Commands::Keygen => {
            cli::cmd_keygen()?;
        }
    }

    Ok(())
}
