//! ferroc - the ferro compiler driver.
//!
//! Reads a source file (or standard input), runs the pipeline, and either
//! JIT-executes the program or emits LLVM IR / bitcode.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ferro_lang::codegen::{self, Context, OptimizationLevel};
use ferro_lang::error::{CompileError, SourceError};
use ferro_lang::source::Source;
use ferro_lang::{parser, semantic};

#[derive(Parser, Debug)]
#[command(name = "ferroc")]
#[command(version, about = "Compiler for the ferro language", long_about = None)]
struct Args {
    /// Source file to compile (standard input when omitted)
    #[arg(short = 'i', long = "input-file")]
    input: Option<PathBuf>,

    /// Output path for `--ir` and `--bc`
    #[arg(short = 'o', long = "output-file", conflicts_with_all = ["print_ir", "jit"])]
    output: Option<PathBuf>,

    /// Write LLVM IR text to the output file
    #[arg(long, group = "mode", requires = "output")]
    ir: bool,

    /// Write LLVM bitcode to the output file
    #[arg(long, group = "mode", requires = "output")]
    bc: bool,

    /// Print LLVM IR to standard output
    #[arg(short = 'p', long = "print-ir", group = "mode")]
    print_ir: bool,

    /// JIT-compile and execute; the exit status is main's return value
    #[arg(long, group = "mode")]
    jit: bool,

    /// Optimisation level
    #[arg(short = 'O', long = "opt-level", default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=3))]
    opt_level: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut source = match load_source(&args) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("error: {}", error);
            return ExitCode::from(2);
        }
    };

    match run(&args, &mut source) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {}", error.render(&source));
            ExitCode::from(2)
        }
    }
}

fn load_source(args: &Args) -> Result<Source, SourceError> {
    match &args.input {
        Some(path) => Source::from_file(path),
        None => Source::from_stdin(),
    }
}

fn run(args: &Args, source: &mut Source) -> Result<ExitCode, CompileError> {
    let program = parser::parse(source)?;
    semantic::analyze(&program)?;

    let context = Context::create();
    let codegen = codegen::compile(&context, &program, opt_level(args.opt_level))?;
    codegen.verify()?;
    codegen.optimize()?;

    if args.jit {
        let status = codegen.execute()?;
        return Ok(ExitCode::from(status as u8));
    }
    if args.print_ir {
        print!("{}", codegen.ir_text());
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(output) = &args.output {
        if args.ir {
            codegen.save_ir(output)?;
        } else if args.bc {
            codegen.save_bitcode(output)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn opt_level(level: u8) -> OptimizationLevel {
    match level {
        0 => OptimizationLevel::None,
        1 => OptimizationLevel::Less,
        2 => OptimizationLevel::Default,
        _ => OptimizationLevel::Aggressive,
    }
}
