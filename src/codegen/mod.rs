//! Lowering of the IR into assembly text.
//!
//! Every supported (architecture, operating system) pair has a [`Backend`]
//! implementation driven by the shared [`Generator`]. The language stack is
//! the native stack; internal calls keep their return addresses on a separate
//! return stack so both can share the stack pointer.
//!
//! [`Backend`]: generator::Backend
//! [`Generator`]: generator::Generator

use std::{fmt, io};

use crate::ir::Program;

pub mod abi;
pub mod emit;
pub mod generator;

mod aarch64;
mod x86_64;

use abi::{Aarch64Darwin, X86_64Linux};
use generator::Generator;

/// Generates the assembly of `program` for `target` into `writer`.
pub fn generate<W>(writer: W, target: Target, program: &Program, options: Options) -> Result<W>
where
    W: io::Write,
{
    log::debug!("generating code for {target}");
    match (target.architecture, target.operating_system) {
        (Architecture::Aarch64, OperatingSystem::Darwin) => {
            Generator::<W, Aarch64Darwin>::new(writer, program, options).generate()
        }
        (Architecture::X86_64, OperatingSystem::Linux) => {
            Generator::<W, X86_64Linux>::new(writer, program, options).generate()
        }
        (architecture, operating_system) => Err(Error::UnsupportedBackendTargetPair {
            architecture,
            operating_system,
        }),
    }
}

/// Convenience wrapper over [`generate`] that collects the assembly.
pub fn generate_string(target: Target, program: &Program, options: Options) -> Result<String> {
    let bytes = generate(Vec::new(), target, program, options)?;
    Ok(String::from_utf8(bytes).expect("assembly is valid utf-8"))
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no backend for {architecture} on {operating_system}")]
    UnsupportedBackendTargetPair {
        architecture: Architecture,
        operating_system: OperatingSystem,
    },

    #[error("call to unknown function `{0}`")]
    UnknownFunction(String),

    #[error("reference to unknown memory `{0}`")]
    UnknownMemory(String),

    #[error("extern function `{name}` takes {count} arguments, at most {max} are supported")]
    TooManyExternArguments {
        name: String,
        count: usize,
        max: usize,
    },

    #[error("`{name}` can't be used as a linker symbol: {reason}")]
    InvalidLinkerSymbol { name: String, reason: &'static str },

    #[error("inline function `{0}` expands into itself")]
    RecursiveInlineFunction(String),

    #[error("failed to write assembly: {0}")]
    Io(#[from] io::Error),
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Options {
    /// Annotate the output with a generation header and one comment per
    /// operator.
    pub debug_comments: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub architecture: Architecture,
    pub operating_system: OperatingSystem,
}

impl Target {
    pub const AARCH64_DARWIN: Target = Target::new(Architecture::Aarch64, OperatingSystem::Darwin);
    pub const X86_64_LINUX: Target = Target::new(Architecture::X86_64, OperatingSystem::Linux);

    /// Pairs with a backend.
    pub const SUPPORTED: &'static [Target] = &[Target::AARCH64_DARWIN, Target::X86_64_LINUX];

    pub const fn new(architecture: Architecture, operating_system: OperatingSystem) -> Target {
        Target {
            architecture,
            operating_system,
        }
    }

    pub fn is_supported(self) -> bool {
        Target::SUPPORTED.contains(&self)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.architecture, self.operating_system)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Architecture {
    Aarch64,
    X86_64,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Architecture::Aarch64 => "aarch64",
            Architecture::X86_64 => "x86_64",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperatingSystem {
    Darwin,
    Linux,
    Windows,
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatingSystem::Darwin => "darwin",
            OperatingSystem::Linux => "linux",
            OperatingSystem::Windows => "windows",
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{optimizer, parser, type_checker, util::test_utils::TEST_FILE};

    const SHOW: &str = include_str!("../../demos/show.gof");

    fn compile(src: &str, target: Target) -> Result<String> {
        let program = parser::parse_program(src, TEST_FILE).unwrap();
        type_checker::check(&program).unwrap();
        generate_string(target, &program, Options::default())
    }

    fn lines(asm: &str) -> Vec<&str> {
        asm.lines().map(str::trim).collect()
    }

    #[test]
    fn test_generation_is_deterministic() {
        let program = parser::parse_program(SHOW, TEST_FILE).unwrap();
        for &target in Target::SUPPORTED {
            let first = generate_string(target, &program, Options::default()).unwrap();
            let second = generate_string(target, &program, Options::default()).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_debug_header_is_the_only_difference() {
        let program = parser::parse_program(SHOW, TEST_FILE).unwrap();
        let options = Options {
            debug_comments: true,
        };
        let first = generate_string(Target::X86_64_LINUX, &program, options).unwrap();
        let second = generate_string(Target::X86_64_LINUX, &program, options).unwrap();
        assert!(first.starts_with("# Generated by gofra for x86_64-linux at "));
        assert_eq!(
            first.lines().skip(1).collect::<Vec<_>>(),
            second.lines().skip(1).collect::<Vec<_>>()
        );
        assert!(first.contains("# 0: push-integer (test.gof:"));
    }

    #[test]
    fn test_show_program_x86_64() {
        let asm = compile(SHOW, Target::X86_64_LINUX).unwrap();
        let lines = lines(&asm);
        for expected in [
            "gofra_fn_show:",
            "gofra_fn_main:",
            "call gofra_fn_show",
            ".globl _start",
            "_start:",
            "leaq gofra_return_stack(%rip), %r15",
            "call gofra_fn_main",
            "movq $60, %rax",
            "gofra_mem_buffer:",
            ".zero 32",
            ".zero 65536",
        ] {
            assert!(lines.contains(&expected), "missing `{expected}` in:\n{asm}");
        }
    }

    #[test]
    fn test_show_program_aarch64() {
        let asm = compile(SHOW, Target::AARCH64_DARWIN).unwrap();
        let lines = lines(&asm);
        for expected in [
            "_gofra_fn_show:",
            "bl _gofra_fn_show",
            ".globl _start",
            "bl _gofra_fn_main",
            "svc #0x80",
            ".zerofill __DATA,__bss,_gofra_mem_buffer,32,4",
        ] {
            assert!(lines.contains(&expected), "missing `{expected}` in:\n{asm}");
        }
    }

    #[test]
    fn test_optimized_program_honours_hints() {
        let program = parser::parse_program("1 2 + drop 60 0 syscall1 drop", TEST_FILE).unwrap();
        let program = optimizer::optimize(program);
        let asm = generate_string(Target::X86_64_LINUX, &program, Options::default()).unwrap();
        let main: Vec<_> = asm
            .split("gofra_fn_main:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap()
            .lines()
            .map(str::trim)
            .collect();
        assert_eq!(
            main,
            [
                "popq %rax",
                "subq $8, %r15",
                "movq %rax, (%r15)",
                "movq $3, %rax",
                "pushq %rax",
                "addq $8, %rsp",
                "movq $60, %rax",
                "movq $0, %rdi",
                "syscall",
                "movq (%r15), %rax",
                "addq $8, %r15",
                "pushq %rax",
                "ret",
            ]
        );
    }

    #[test]
    fn test_control_flow_labels() {
        let asm = compile("1 if 2 drop else 3 drop end", Target::X86_64_LINUX).unwrap();
        let lines = lines(&asm);
        // if -> 5, else -> 8
        assert!(lines.contains(&"jz .Lmain_0_5"));
        assert!(lines.contains(&".Lmain_0_5:"));
        assert!(lines.contains(&"jmp .Lmain_0_8"));
        assert!(lines.contains(&".Lmain_0_8:"));
    }

    #[test]
    fn test_loop_labels() {
        let asm = compile("5 while copy 0 > do 1 - end drop", Target::X86_64_LINUX).unwrap();
        let lines = lines(&asm);
        assert!(lines.contains(&".Lmain_0_1:"));
        assert!(lines.contains(&"jz .Lmain_0_9"));
        assert!(lines.contains(&"jmp .Lmain_0_1"));
        assert!(lines.contains(&".Lmain_0_9:"));
    }

    #[test]
    fn test_inline_expansions_get_their_own_labels() {
        let src = "
            inline func void maybe[bool] if 1 drop end end
            func void main[] 1 1 == maybe 2 2 == maybe end
        ";
        let asm = compile(src, Target::X86_64_LINUX).unwrap();
        let lines = lines(&asm);
        assert!(!lines.contains(&"gofra_fn_maybe:"));
        assert!(lines.contains(&".Lmaybe_1_4:"));
        assert!(lines.contains(&".Lmaybe_2_4:"));
    }

    #[test]
    fn test_strings_are_deduplicated() {
        let src = r#""hi" drop drop "yo" drop drop "hi" drop drop"#;
        let asm = compile(src, Target::X86_64_LINUX).unwrap();
        assert_eq!(asm.matches(".asciz").count(), 2);
        assert!(asm.contains(".Lgofra_string_0:\n    .asciz \"hi\""));
        assert!(asm.contains(".Lgofra_string_1:\n    .asciz \"yo\""));
        assert_eq!(asm.matches("leaq .Lgofra_string_0(%rip), %rax").count(), 2);
    }

    #[test]
    fn test_global_functions_keep_their_name() {
        let src = "global func void exported[] 1 drop end 2 drop";
        let asm = compile(src, Target::AARCH64_DARWIN).unwrap();
        let lines = lines(&asm);
        assert!(lines.contains(&".globl _exported"));
        assert!(lines.contains(&"_exported:"));
    }

    /// Labels defined at the start of a line, in order.
    fn defined_labels(asm: &str) -> Vec<&str> {
        asm.lines()
            .filter(|line| !line.starts_with(' '))
            .filter_map(|line| line.strip_suffix(':'))
            .collect()
    }

    #[test]
    fn test_symbols_of_different_kinds_never_collide() {
        let src = "
            memory buf 8
            func void return_stack[] 1 drop end
            func void memory_buf[] buf ?> drop end
            func void mem_buf[] 2 drop end
            func void a-[] 3 drop end
            func void a_x2D[] 4 drop end
            func void main[] return_stack memory_buf mem_buf a- a_x2D end
        ";
        for &target in Target::SUPPORTED {
            let asm = compile(src, target).unwrap();
            let mut labels = defined_labels(&asm);
            let count = labels.len();
            labels.sort_unstable();
            labels.dedup();
            assert_eq!(labels.len(), count, "duplicate label in:\n{asm}");
        }

        let asm = compile(src, Target::X86_64_LINUX).unwrap();
        let labels = defined_labels(&asm);
        for expected in [
            "gofra_fn_return_x5Fstack",
            "gofra_fn_memory_x5Fbuf",
            "gofra_fn_a_x2D",
            "gofra_fn_a_x5Fx2D",
            "gofra_mem_buf",
            "gofra_return_stack",
        ] {
            assert!(labels.contains(&expected), "missing `{expected}` in:\n{asm}");
        }
    }

    #[test]
    fn test_invalid_linker_symbols() {
        let cases = [
            (
                Target::X86_64_LINUX,
                "global func void gofra_fn_main[] 1 drop end 2 drop",
                "`gofra_fn_main` can't be used as a linker symbol: the `gofra_` prefix is reserved",
            ),
            (
                Target::X86_64_LINUX,
                "global func void _start[] 1 drop end 2 drop",
                "`_start` can't be used as a linker symbol: it is the program entry symbol",
            ),
            (
                Target::AARCH64_DARWIN,
                "global func void start[] 1 drop end 2 drop",
                "`start` can't be used as a linker symbol: it is the program entry symbol",
            ),
            (
                Target::X86_64_LINUX,
                "extern func void put-s[] func void main[] put-s end",
                "`put-s` can't be used as a linker symbol: not a plain identifier",
            ),
        ];
        for (target, src, expected) in cases {
            let error = compile(src, target).unwrap_err();
            assert_eq!(error.to_string(), expected, "input: {src}");
        }
        // The same name is fine on a target whose symbols carry a prefix.
        assert!(compile("global func void start[] 1 drop end 2 drop", Target::X86_64_LINUX).is_ok());
    }

    #[test]
    fn test_unsupported_target_pair() {
        let program = parser::parse_program("1 drop", TEST_FILE).unwrap();
        let target = Target::new(Architecture::X86_64, OperatingSystem::Darwin);
        let error = generate_string(target, &program, Options::default()).unwrap_err();
        assert_eq!(error.to_string(), "no backend for x86_64 on darwin");
        assert!(!target.is_supported());
    }

    #[test]
    fn test_recursive_inline_function() {
        let src = "inline func void f[] f end func void main[] f end";
        let program = parser::parse_program(src, TEST_FILE).unwrap();
        let error = generate_string(Target::X86_64_LINUX, &program, Options::default()).unwrap_err();
        assert!(matches!(error, Error::RecursiveInlineFunction(name) if name == "f"));
    }

    #[test]
    fn test_too_many_extern_arguments() {
        let src = "
            extern func void f[int,int,int,int,int,int,int]
            func void main[] 1 2 3 4 5 6 7 f end
        ";
        let program = parser::parse_program(src, TEST_FILE).unwrap();
        let error = generate_string(Target::X86_64_LINUX, &program, Options::default()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "extern function `f` takes 7 arguments, at most 6 are supported"
        );
        // AArch64 has two more argument registers.
        assert!(generate_string(Target::AARCH64_DARWIN, &program, Options::default()).is_ok());
    }

    #[test]
    fn test_sink_errors_are_propagated() {
        struct Failing;

        impl io::Write for Failing {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("disk full"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let program = parser::parse_program("1 drop", TEST_FILE).unwrap();
        let result = generate(Failing, Target::X86_64_LINUX, &program, Options::default());
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
