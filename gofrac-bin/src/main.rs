use std::{
    error::Error,
    fs,
    io,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use gofra::{
    codegen::{self, Target},
    ir::Program,
    util::fmt::ir::print_program,
    CompileOptions,
};

mod target;
mod toolchain;

/// Compiles Gofra source into native assembly.
#[derive(Parser)]
#[command(name = "gofrac", version)]
struct Args {
    /// Source file to compile.
    source: PathBuf,

    /// Output path, without extension. Defaults to the source file stem.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target architecture. Defaults to the host's.
    #[arg(long)]
    arch: Option<target::Architecture>,

    /// Target operating system. Defaults to the host's.
    #[arg(long)]
    os: Option<target::OperatingSystem>,

    /// Skip the type checker.
    #[arg(long)]
    no_typecheck: bool,

    /// Run the optimizer.
    #[arg(short = 'O')]
    optimize: bool,

    /// Print the IR of the program before generating code.
    #[arg(long)]
    ir: bool,

    /// Annotate the assembly with a header and one comment per operator.
    #[arg(long)]
    debug_comments: bool,

    /// Assemble and link the output into an executable.
    #[arg(long)]
    assemble: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let target = target::resolve(args.arch, args.os);
    let options = CompileOptions {
        target,
        typecheck: !args.no_typecheck,
        optimize: args.optimize,
        debug_comments: args.debug_comments,
    };

    let file = args.source.display().to_string();
    let src = fs::read_to_string(&args.source)
        .map_err(|error| format!("failed to read {file}: {error}"))?;
    let program = gofra::analyze(&src, &file, &options)?;

    if args.ir {
        print_program(&mut io::stdout().lock(), &program)?;
    }

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(args.source.file_stem().unwrap_or_default()));
    let assembly = output.with_extension("s");
    let codegen_options = codegen::Options {
        debug_comments: options.debug_comments,
    };
    write_assembly(&assembly, target, &program, codegen_options)?;
    log::info!("wrote {}", assembly.display());

    if args.assemble {
        let libc = program.functions.values().any(|function| function.is_external);
        let object = toolchain::assemble_and_link(target, &assembly, &output, libc)?;
        log::debug!("linked {} from {}", output.display(), object.display());
    }
    Ok(())
}

/// Generates the whole program before creating `path`, so a failed generation
/// leaves no file behind.
fn write_assembly(
    path: &Path,
    target: Target,
    program: &Program,
    options: codegen::Options,
) -> codegen::Result<()> {
    let code = codegen::generate(Vec::new(), target, program, options)?;
    fs::write(path, code)?;
    Ok(())
}
