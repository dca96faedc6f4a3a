mod bytecode;
mod frontend;
mod lang;
mod pipeline;
mod runtime;

use std::{
    error::Error,
    fs,
    io::{self, BufWriter},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Args, Parser, Subcommand};
use tracing::Level;

use crate::bytecode::ProgramBc;
use crate::bytecode::disasm::{print_bc, print_bc_stats};
use crate::frontend::listing::{disassemble, label_table, parse_listing};
use crate::frontend::parser::parse_source;
use crate::frontend::token_dumper::TokenDumper;
use crate::frontend::tokenizer::Tokenizer;
use crate::lang::instruction::encode_program;
use crate::pipeline::{CompileOptions, compile_source};
use crate::runtime::{VmBc, VmConfig};

const ARTIFACT_EXTENSION: &str = "wsbc";

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[arg(short, long, global = true, default_value_t = Level::WARN)]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a Whitespace source file to a bytecode artifact
    Build {
        /// Whitespace source file
        source: PathBuf,

        /// Artifact path (default: source path with a .wsbc extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail when the static stack check finds a possible underflow
        #[arg(long)]
        strict_stack: bool,
    },

    /// Run a compiled bytecode artifact
    Run {
        /// Bytecode artifact
        artifact: PathBuf,

        #[command(flatten)]
        limits: Limits,
    },

    /// Compile a source file in memory and run it
    Exec {
        /// Whitespace source file
        source: PathBuf,

        /// Fail when the static stack check finds a possible underflow
        #[arg(long)]
        strict_stack: bool,

        #[command(flatten)]
        limits: Limits,
    },

    /// Print the instruction listing of a source file
    Disasm {
        /// Whitespace source file
        source: PathBuf,

        /// Show the compiled bytecode instead
        #[arg(long)]
        bytecode: bool,

        /// Show bytecode statistics instead
        #[arg(long, conflicts_with = "bytecode")]
        stats: bool,

        /// Show where each label is marked instead
        #[arg(long, conflicts_with_all = ["bytecode", "stats"])]
        labels: bool,
    },

    /// Assemble an instruction listing back into Whitespace source
    Asm {
        /// Listing file, one instruction per line
        listing: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump the token stream of a source file
    Tokens {
        /// Whitespace source file
        source: PathBuf,

        #[arg(long)]
        no_color: bool,
    },
}

#[derive(Args)]
struct Limits {
    /// Stop after this many executed instructions
    #[arg(long)]
    max_steps: Option<u64>,

    /// Maximum nesting of subroutine calls
    #[arg(long, default_value_t = VmConfig::default().max_call_depth)]
    max_call_depth: usize,
}

impl From<Limits> for VmConfig {
    fn from(limits: Limits) -> Self {
        VmConfig {
            max_steps: limits.max_steps,
            max_call_depth: limits.max_call_depth,
            ..VmConfig::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = main_real(cli.command) {
        tracing::error!("{e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main_real(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Build {
            source,
            output,
            strict_stack,
        } => {
            let bc = compile_file(&source, strict_stack)?;
            let output = output.unwrap_or_else(|| source.with_extension(ARTIFACT_EXTENSION));
            bc.write_to(&output)?;
            tracing::info!(
                "compiled {} to {} ({} ops)",
                source.display(),
                output.display(),
                bc.main.ops.len()
            );
        }
        Command::Run { artifact, limits } => {
            let bc = ProgramBc::read_from(&artifact)
                .map_err(|e| format!("cant load {}: {e}", artifact.display()))?;
            run_bc(&bc, limits.into())?;
        }
        Command::Exec {
            source,
            strict_stack,
            limits,
        } => {
            let bc = compile_file(&source, strict_stack)?;
            run_bc(&bc, limits.into())?;
        }
        Command::Disasm {
            source,
            bytecode,
            stats,
            labels,
        } => {
            if bytecode {
                print_bc(&compile_file(&source, false)?);
            } else if stats {
                print_bc_stats(&compile_file(&source, false)?);
            } else {
                let program = parse_source(&read_source(&source)?)?;
                if labels {
                    print!("{}", label_table(&program));
                } else {
                    print!("{}", disassemble(&program));
                }
            }
        }
        Command::Asm { listing, output } => {
            let text = fs::read_to_string(&listing)
                .map_err(|e| format!("cant open {}: {e}", listing.display()))?;
            let source = encode_program(&parse_listing(&text)?);
            match output {
                Some(path) => fs::write(&path, source)
                    .map_err(|e| format!("cant write {}: {e}", path.display()))?,
                None => io::Write::write_all(&mut io::stdout(), &source)?,
            }
        }
        Command::Tokens { source, no_color } => {
            let source = read_source(&source)?;
            let tokens = Tokenizer::new(&source).tokenize();

            let mut dumper = TokenDumper::new();
            if no_color {
                dumper = dumper.no_color();
            }
            dumper.dump(&tokens);
        }
    }

    Ok(())
}

fn read_source(path: &Path) -> Result<Vec<u8>, Box<dyn Error>> {
    Ok(fs::read(path).map_err(|e| format!("cant open {}: {e}", path.display()))?)
}

fn compile_file(path: &Path, strict_stack: bool) -> Result<ProgramBc, Box<dyn Error>> {
    let source = read_source(path)?;
    tracing::debug!(path = %path.display(), bytes = source.len(), "compiling");
    Ok(compile_source(&source, &CompileOptions { strict_stack })?)
}

fn run_bc(bc: &ProgramBc, config: VmConfig) -> Result<(), Box<dyn Error>> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut vm = VmBc::with_config(stdin.lock(), BufWriter::new(stdout.lock()), config);
    vm.run(bc)?;
    Ok(())
}
