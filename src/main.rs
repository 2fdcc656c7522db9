use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use palc::Parser as _;

use atlas::bytecode::ByteCode;
use atlas::cli::{Cli, Command};
use atlas::compiler::Compiler;
use atlas::parser::Parser;
use atlas::vm::Vm;

const DEFAULT_OUTPUT: &str = "compiled.atlb";

fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Compile { file, output } => compile(file, output),
        Command::Execute { file } => execute(file),
    }
}

fn compile(file: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let source = match &file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?
        }
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Reading stdin")?;
            buffer
        }
    };

    let mut parser = Parser::new(&source);
    let program = parser.parse_program();
    if !parser.errors().is_empty() {
        for error in parser.errors() {
            eprintln!("{error}");
        }
        bail!("parsing failed with {} diagnostic(s)", parser.errors().len());
    }

    let mut compiler = Compiler::new();
    compiler.compile_program(&program)?;
    let bytecode = compiler.bytecode();

    let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let mut buffer = Vec::new();
    bytecode
        .write_to(&mut buffer)
        .context("Serializing bytecode")?;
    fs::write(&output, buffer).with_context(|| format!("Writing {}", output.display()))?;
    Ok(())
}

fn execute(file: PathBuf) -> Result<()> {
    let handle = File::open(&file).with_context(|| format!("Opening {}", file.display()))?;
    let mut reader = BufReader::new(handle);
    let bytecode = ByteCode::read_from(&mut reader)
        .with_context(|| format!("Reading bytecode from {}", file.display()))?;

    let mut vm = Vm::new(bytecode);
    vm.run()?;
    Ok(())
}
