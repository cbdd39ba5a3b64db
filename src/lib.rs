//! Compiler core of Gofra, a concatenative stack-based language.
//!
//! Source text flows through [`lexer`], [`parser`], [`type_checker`],
//! [`optimizer`] and [`codegen`]; [`compile`] runs all of them in order.

use std::io;

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, expanding macros and resolving
/// control flow into a flat operator sequence.
pub mod parser;

/// The type checker emulates the stack of every body over types, rejecting
/// programs whose stack shape or operand types don't line up.
pub mod type_checker;

/// Optional peephole passes and dead function elimination over the IR.
pub mod optimizer;

/// Lowers the IR into assembly for one of the supported targets.
pub mod codegen;

pub mod error;
pub mod intrinsic;
pub mod ir;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

pub use error::{Error, Result};

use crate::{codegen::Target, ir::Program};

/// Settings of one compilation.
#[derive(Copy, Clone, Debug)]
pub struct CompileOptions {
    pub target: Target,
    /// Skipping the type checker lets unsound programs reach code generation.
    pub typecheck: bool,
    pub optimize: bool,
    pub debug_comments: bool,
}

impl CompileOptions {
    pub fn new(target: Target) -> CompileOptions {
        CompileOptions {
            target,
            typecheck: true,
            optimize: false,
            debug_comments: false,
        }
    }
}

/// Runs the front end: parsing, type checking and optimization, as
/// configured by `options`.
pub fn analyze(src: &str, file: &str, options: &CompileOptions) -> Result<Program> {
    let program = parser::parse_program(src, file)?;
    log::debug!(
        "parsed {file}: {} entry point operators, {} functions, {} memories",
        program.operators.len(),
        program.functions.len(),
        program.memories.len()
    );

    if options.typecheck {
        type_checker::check(&program)?;
    } else {
        log::warn!("type checking of {file} is disabled");
    }

    if options.optimize {
        Ok(optimizer::optimize(program))
    } else {
        Ok(program)
    }
}

/// Compiles `src` into assembly written to `writer`, returning the writer.
pub fn compile<W>(src: &str, file: &str, writer: W, options: &CompileOptions) -> Result<W>
where
    W: io::Write,
{
    let program = analyze(src, file, options)?;
    let codegen_options = codegen::Options {
        debug_comments: options.debug_comments,
    };
    Ok(codegen::generate(writer, options.target, &program, codegen_options)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_errors_carry_their_location() {
        let options = CompileOptions::new(Target::X86_64_LINUX);
        let error = compile("1 2 +", "a.gof", Vec::new(), &options).unwrap_err();
        assert_eq!(
            error.to_string(),
            "a.gof:1:5: `main` ends with 1 unhandled value(s) on the stack: [int]"
        );
        let error = compile("\"open", "a.gof", Vec::new(), &options).unwrap_err();
        assert_eq!(error.to_string(), "a.gof:1:1: unclosed string literal");
    }

    #[test]
    fn test_demos_compile_for_every_target() {
        let demos = [
            ("show.gof", include_str!("../demos/show.gof")),
            ("countdown.gof", include_str!("../demos/countdown.gof")),
            ("hello.gof", include_str!("../demos/hello.gof")),
        ];
        for (file, src) in demos {
            for &target in Target::SUPPORTED {
                let mut options = CompileOptions::new(target);
                for optimize in [false, true] {
                    options.optimize = optimize;
                    let asm = compile(src, file, Vec::new(), &options);
                    assert!(asm.is_ok(), "{file} for {target}: {:?}", asm.err());
                }
            }
        }
    }

    #[test]
    fn test_typecheck_can_be_skipped() {
        let mut options = CompileOptions::new(Target::X86_64_LINUX);
        options.typecheck = false;
        assert!(compile("1 2 +", "a.gof", Vec::new(), &options).is_ok());
    }

    #[test]
    fn test_optimization_changes_nothing_observable() {
        let src = include_str!("../demos/show.gof");
        let mut options = CompileOptions::new(Target::X86_64_LINUX);
        let plain = analyze(src, "show.gof", &options).unwrap();
        options.optimize = true;
        let optimized = analyze(src, "show.gof", &options).unwrap();
        assert_eq!(type_checker::check(&optimized), Ok(()));
        assert_eq!(
            plain.functions.keys().collect::<Vec<_>>(),
            optimized.functions.keys().collect::<Vec<_>>()
        );
        assert!(optimized.functions["show"].source.len() < plain.functions["show"].source.len());
    }
}
