//! x86-64 instruction templates in AT&T syntax. Stack slots are 8 bytes, so
//! extern calls realign `%rsp` themselves.

use std::{format_args as f, io};

use crate::{
    codegen::{
        abi::{Abi, X86_64Linux},
        emit::Emitter,
        generator::{Backend, RETURN_STACK_SIZE},
    },
    intrinsic::Intrinsic,
    ir::OptimizerHints,
    types::GofraType,
};

/// Holds the top of the return stack. Callee-saved, so extern calls keep it.
const RETURN_STACK_REGISTER: &str = "%r15";

/// Keeps `%rsp` across aligned extern calls. Callee-saved as well.
const SAVED_STACK_REGISTER: &str = "%r12";

impl Backend for X86_64Linux {
    fn function_prologue<W: io::Write>(e: &mut Emitter<W>) -> io::Result<()> {
        e.out("popq %rax")?;
        e.out(f!("subq $8, {RETURN_STACK_REGISTER}"))?;
        e.out(f!("movq %rax, ({RETURN_STACK_REGISTER})"))
    }

    fn function_epilogue<W: io::Write>(e: &mut Emitter<W>) -> io::Result<()> {
        e.out(f!("movq ({RETURN_STACK_REGISTER}), %rax"))?;
        e.out(f!("addq $8, {RETURN_STACK_REGISTER}"))?;
        e.out("pushq %rax")?;
        e.out("ret")
    }

    fn entry<W: io::Write>(e: &mut Emitter<W>, main: &str, return_stack: &str) -> io::Result<()> {
        e.out(f!("leaq {return_stack}(%rip), {RETURN_STACK_REGISTER}"))?;
        e.out(f!("addq ${RETURN_STACK_SIZE}, {RETURN_STACK_REGISTER}"))?;
        e.out(f!("call {main}"))?;
        load_immediate(e, Self::SYSCALL_NUMBER_REGISTER, Self::SYSCALL_EXIT)?;
        e.out("xorq %rdi, %rdi")?;
        e.out("syscall")
    }

    fn push_integer<W: io::Write>(e: &mut Emitter<W>, value: i64) -> io::Result<()> {
        load_immediate(e, "%rax", value)?;
        e.out("pushq %rax")
    }

    fn push_address<W: io::Write>(e: &mut Emitter<W>, symbol: &str) -> io::Result<()> {
        e.out(f!("leaq {symbol}(%rip), %rax"))?;
        e.out("pushq %rax")
    }

    fn intrinsic<W: io::Write>(e: &mut Emitter<W>, intrinsic: Intrinsic) -> io::Result<()> {
        match intrinsic {
            Intrinsic::Plus => binary(e, &["addq %rbx, %rax"], "%rax"),
            Intrinsic::Minus => binary(e, &["subq %rbx, %rax"], "%rax"),
            Intrinsic::Multiply => binary(e, &["imulq %rbx, %rax"], "%rax"),
            Intrinsic::Divide => binary(e, &["cqo", "idivq %rbx"], "%rax"),
            Intrinsic::Modulus => binary(e, &["cqo", "idivq %rbx"], "%rdx"),
            Intrinsic::Equal => compare(e, "e"),
            Intrinsic::NotEqual => compare(e, "ne"),
            Intrinsic::Less => compare(e, "l"),
            Intrinsic::Greater => compare(e, "g"),
            Intrinsic::LessEqual => compare(e, "le"),
            Intrinsic::GreaterEqual => compare(e, "ge"),
            Intrinsic::Copy => {
                e.out("movq (%rsp), %rax")?;
                e.out("pushq %rax")
            }
            Intrinsic::Swap => {
                e.out("popq %rax")?;
                e.out("popq %rbx")?;
                e.out("pushq %rax")?;
                e.out("pushq %rbx")
            }
            Intrinsic::Drop => e.out("addq $8, %rsp"),
            Intrinsic::MemoryLoad => {
                e.out("popq %rax")?;
                e.out("movq (%rax), %rax")?;
                e.out("pushq %rax")
            }
            Intrinsic::MemoryStore => {
                e.out("popq %rbx")?;
                e.out("popq %rax")?;
                e.out("movq %rbx, (%rax)")
            }
            Intrinsic::Syscall(_) => unreachable!("syscalls are emitted by `Backend::syscall`"),
        }
    }

    fn syscall<W: io::Write>(
        e: &mut Emitter<W>,
        arguments: u8,
        hints: &OptimizerHints,
    ) -> io::Result<()> {
        let operands = usize::from(arguments) + 1;
        let on_stack = operands.saturating_sub(hints.syscall_injected_args.len());
        let register = |operand: usize| match operand {
            0 => Self::SYSCALL_NUMBER_REGISTER,
            n => Self::SYSCALL_ARGUMENT_REGISTERS[n - 1],
        };

        // The last argument is on top.
        for operand in (0..on_stack).rev() {
            e.out(f!("popq {}", register(operand)))?;
        }
        for (operand, &value) in (on_stack..operands).zip(&hints.syscall_injected_args) {
            load_immediate(e, register(operand), value)?;
        }
        e.out("syscall")?;
        if !hints.syscall_omit_result {
            e.out("pushq %rax")?;
        }
        Ok(())
    }

    fn branch_if_zero<W: io::Write>(e: &mut Emitter<W>, label: &str) -> io::Result<()> {
        e.out("popq %rax")?;
        e.out("testq %rax, %rax")?;
        e.out(f!("jz {label}"))
    }

    fn jump<W: io::Write>(e: &mut Emitter<W>, label: &str) -> io::Result<()> {
        e.out(f!("jmp {label}"))
    }

    fn call<W: io::Write>(e: &mut Emitter<W>, symbol: &str) -> io::Result<()> {
        e.out(f!("call {symbol}"))
    }

    fn call_extern<W: io::Write>(
        e: &mut Emitter<W>,
        symbol: &str,
        arguments: &[GofraType],
        returns: bool,
    ) -> io::Result<()> {
        for (i, ty) in arguments.iter().enumerate().rev() {
            match ty {
                GofraType::Integer | GofraType::Boolean => {
                    e.out("popq %rax")?;
                    e.out(f!("movl %eax, {}", Self::ARGUMENT_REGISTERS_32[i]))?;
                }
                _ => e.out(f!("popq {}", Self::ARGUMENT_REGISTERS[i]))?,
            }
        }
        e.out(f!("movq %rsp, {SAVED_STACK_REGISTER}"))?;
        e.out("andq $-16, %rsp")?;
        // No vector registers are used by variadic callees.
        e.out("xorl %eax, %eax")?;
        e.out(f!("call {symbol}"))?;
        e.out(f!("movq {SAVED_STACK_REGISTER}, %rsp"))?;
        if returns {
            e.out(f!("pushq {}", Self::RETURN_REGISTER))?;
        }
        Ok(())
    }
}

/// Pops the right operand into `%rbx` and the left one into `%rax`, runs
/// `body` and pushes `result`.
fn binary<W: io::Write>(e: &mut Emitter<W>, body: &[&str], result: &str) -> io::Result<()> {
    e.out("popq %rbx")?;
    e.out("popq %rax")?;
    for instruction in body {
        e.out(instruction)?;
    }
    e.out(f!("pushq {result}"))
}

fn compare<W: io::Write>(e: &mut Emitter<W>, condition: &str) -> io::Result<()> {
    e.out("popq %rbx")?;
    e.out("popq %rax")?;
    e.out("cmpq %rbx, %rax")?;
    e.out(f!("set{condition} %al"))?;
    e.out("movzbq %al, %rax")?;
    e.out("pushq %rax")
}

/// `movq` only takes sign-extended 32-bit immediates.
fn load_immediate<W: io::Write>(e: &mut Emitter<W>, register: &str, value: i64) -> io::Result<()> {
    if i32::try_from(value).is_ok() {
        e.out(f!("movq ${value}, {register}"))
    } else {
        e.out(f!("movabsq ${value}, {register}"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn emitted(f: impl FnOnce(&mut Emitter<Vec<u8>>) -> io::Result<()>) -> String {
        let mut e = Emitter::new(Vec::new());
        f(&mut e).unwrap();
        String::from_utf8(e.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_large_immediates() {
        assert_eq!(emitted(|e| X86_64Linux::push_integer(e, -5)), "movq $-5, %rax\npushq %rax\n");
        assert_eq!(
            emitted(|e| X86_64Linux::push_integer(e, 1 << 40)),
            "movabsq $1099511627776, %rax\npushq %rax\n"
        );
    }

    #[test]
    fn test_syscall_register_order() {
        assert_eq!(
            emitted(|e| X86_64Linux::syscall(e, 3, &OptimizerHints::default())),
            "popq %rdx\npopq %rsi\npopq %rdi\npopq %rax\nsyscall\npushq %rax\n"
        );
    }

    #[test]
    fn test_syscall_with_injected_arguments() {
        let hints = OptimizerHints {
            syscall_injected_args: vec![60, 0],
            syscall_omit_result: true,
            ..OptimizerHints::default()
        };
        assert_eq!(
            emitted(|e| X86_64Linux::syscall(e, 1, &hints)),
            "movq $60, %rax\nmovq $0, %rdi\nsyscall\n"
        );
    }

    #[test]
    fn test_extern_call_aligns_stack() {
        let arguments = [GofraType::Pointer, GofraType::Integer];
        assert_eq!(
            emitted(|e| X86_64Linux::call_extern(e, "f", &arguments, false)),
            indoc::indoc! {"
                popq %rax
                movl %eax, %esi
                popq %rdi
                movq %rsp, %r12
                andq $-16, %rsp
                xorl %eax, %eax
                call f
                movq %r12, %rsp
            "}
        );
    }
}
