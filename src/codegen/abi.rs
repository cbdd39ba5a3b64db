use std::{format_args as f, io};

use crate::codegen::emit::Emitter;

/// Per-target naming, section and register conventions.
pub trait Abi {
    /// Human-readable target name, used in the generated header.
    const NAME: &'static str;

    /// Symbol the program starts at.
    const ENTRY_SYMBOL: &'static str;
    /// Prepended to every global symbol.
    const SYMBOL_PREFIX: &'static str;
    /// Prefix of assembler-local labels.
    const LOCAL_LABEL_PREFIX: &'static str;
    const COMMENT: &'static str;

    const GLOBAL_PROLOGUE: &'static str;
    const SECTION_TEXT: &'static str;
    const SECTION_STRINGS: &'static str;

    const SYSCALL_NUMBER_REGISTER: &'static str;
    const SYSCALL_ARGUMENT_REGISTERS: &'static [&'static str];
    const SYSCALL_EXIT: i64;

    /// Function argument registers holding 64-bit values.
    const ARGUMENT_REGISTERS: &'static [&'static str];
    /// 32-bit views of [`Abi::ARGUMENT_REGISTERS`].
    const ARGUMENT_REGISTERS_32: &'static [&'static str];
    const RETURN_REGISTER: &'static str;

    /// Reserves `size` zero-initialised bytes at `symbol`.
    fn zero_fill<W: io::Write>(e: &mut Emitter<W>, symbol: &str, size: usize) -> io::Result<()>;
}

impl Abi for Aarch64Darwin {
    const NAME: &'static str = "aarch64-darwin";

    const ENTRY_SYMBOL: &'static str = "_start";
    const SYMBOL_PREFIX: &'static str = "_";
    const LOCAL_LABEL_PREFIX: &'static str = "L";
    const COMMENT: &'static str = "//";

    const GLOBAL_PROLOGUE: &'static str = "";
    const SECTION_TEXT: &'static str = ".section __TEXT,__text,regular,pure_instructions";
    const SECTION_STRINGS: &'static str = ".section __TEXT,__cstring,cstring_literals";

    const SYSCALL_NUMBER_REGISTER: &'static str = "x16";
    const SYSCALL_ARGUMENT_REGISTERS: &'static [&'static str] = &["x0", "x1", "x2", "x3", "x4", "x5"];
    const SYSCALL_EXIT: i64 = 1;

    const ARGUMENT_REGISTERS: &'static [&'static str] =
        &["x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7"];
    const ARGUMENT_REGISTERS_32: &'static [&'static str] =
        &["w0", "w1", "w2", "w3", "w4", "w5", "w6", "w7"];
    const RETURN_REGISTER: &'static str = "x0";

    fn zero_fill<W: io::Write>(e: &mut Emitter<W>, symbol: &str, size: usize) -> io::Result<()> {
        e.out(f!(".zerofill __DATA,__bss,{symbol},{size},4"))
    }
}

impl Abi for X86_64Linux {
    const NAME: &'static str = "x86_64-linux";

    const ENTRY_SYMBOL: &'static str = "_start";
    const SYMBOL_PREFIX: &'static str = "";
    const LOCAL_LABEL_PREFIX: &'static str = ".L";
    const COMMENT: &'static str = "#";

    const GLOBAL_PROLOGUE: &'static str = ".section .note.GNU-stack,\"\",@progbits";
    const SECTION_TEXT: &'static str = ".section .text";
    const SECTION_STRINGS: &'static str = ".section .rodata";

    const SYSCALL_NUMBER_REGISTER: &'static str = "%rax";
    const SYSCALL_ARGUMENT_REGISTERS: &'static [&'static str] =
        &["%rdi", "%rsi", "%rdx", "%r10", "%r8", "%r9"];
    const SYSCALL_EXIT: i64 = 60;

    const ARGUMENT_REGISTERS: &'static [&'static str] =
        &["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];
    const ARGUMENT_REGISTERS_32: &'static [&'static str] =
        &["%edi", "%esi", "%edx", "%ecx", "%r8d", "%r9d"];
    const RETURN_REGISTER: &'static str = "%rax";

    fn zero_fill<W: io::Write>(e: &mut Emitter<W>, symbol: &str, size: usize) -> io::Result<()> {
        e.out(".section .bss")?;
        e.out(".p2align 4")?;
        e.label(symbol)?;
        e.out(f!("    .zero {size}"))
    }
}

/// 64-bit ARM on macOS.
pub struct Aarch64Darwin;

/// x86-64 on Linux, System V ABI, AT&T syntax.
pub struct X86_64Linux;
