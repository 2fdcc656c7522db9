use std::path::PathBuf;

use palc::{Parser, Subcommand};

/// CLI arguments
#[derive(Parser)]
#[command(name = "atlas")]
pub struct Cli {
    /// Program mode
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile Atlas source to bytecode
    Compile {
        /// Source file; standard input when omitted
        file: Option<PathBuf>,
        /// Output file for the compiled bytecode (default: compiled.atlb)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Execute a compiled bytecode file
    Execute {
        /// Bytecode file produced by `compile`
        file: PathBuf,
    },
}
