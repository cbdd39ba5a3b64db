//! AArch64 instruction templates. Stack slots are 16 bytes wide to keep `sp`
//! aligned at all times.

use std::{format_args as f, io};

use crate::{
    codegen::{
        abi::{Abi, Aarch64Darwin},
        emit::Emitter,
        generator::{Backend, RETURN_STACK_SIZE},
    },
    intrinsic::Intrinsic,
    ir::OptimizerHints,
    types::GofraType,
};

/// Holds the top of the return stack.
const RETURN_STACK_REGISTER: &str = "x28";

impl Backend for Aarch64Darwin {
    fn function_prologue<W: io::Write>(e: &mut Emitter<W>) -> io::Result<()> {
        e.out(f!("str x30, [{RETURN_STACK_REGISTER}, #-8]!"))
    }

    fn function_epilogue<W: io::Write>(e: &mut Emitter<W>) -> io::Result<()> {
        e.out(f!("ldr x30, [{RETURN_STACK_REGISTER}], #8"))?;
        e.out("ret")
    }

    #[expect(clippy::cast_possible_wrap)]
    fn entry<W: io::Write>(e: &mut Emitter<W>, main: &str, return_stack: &str) -> io::Result<()> {
        load_address(e, RETURN_STACK_REGISTER, return_stack)?;
        load_immediate(e, "x9", RETURN_STACK_SIZE as i64)?;
        e.out(f!("add {RETURN_STACK_REGISTER}, {RETURN_STACK_REGISTER}, x9"))?;
        e.out(f!("bl {main}"))?;
        e.out("mov x0, #0")?;
        load_immediate(e, Self::SYSCALL_NUMBER_REGISTER, Self::SYSCALL_EXIT)?;
        e.out("svc #0x80")
    }

    fn push_integer<W: io::Write>(e: &mut Emitter<W>, value: i64) -> io::Result<()> {
        load_immediate(e, "x0", value)?;
        push(e, "x0")
    }

    fn push_address<W: io::Write>(e: &mut Emitter<W>, symbol: &str) -> io::Result<()> {
        load_address(e, "x0", symbol)?;
        push(e, "x0")
    }

    fn intrinsic<W: io::Write>(e: &mut Emitter<W>, intrinsic: Intrinsic) -> io::Result<()> {
        match intrinsic {
            Intrinsic::Plus => binary(e, &["add x0, x0, x1"]),
            Intrinsic::Minus => binary(e, &["sub x0, x0, x1"]),
            Intrinsic::Multiply => binary(e, &["mul x0, x0, x1"]),
            Intrinsic::Divide => binary(e, &["sdiv x0, x0, x1"]),
            Intrinsic::Modulus => binary(e, &["sdiv x2, x0, x1", "msub x0, x2, x1, x0"]),
            Intrinsic::Equal => compare(e, "eq"),
            Intrinsic::NotEqual => compare(e, "ne"),
            Intrinsic::Less => compare(e, "lt"),
            Intrinsic::Greater => compare(e, "gt"),
            Intrinsic::LessEqual => compare(e, "le"),
            Intrinsic::GreaterEqual => compare(e, "ge"),
            Intrinsic::Copy => {
                e.out("ldr x0, [sp]")?;
                push(e, "x0")
            }
            Intrinsic::Swap => {
                pop(e, "x0")?;
                pop(e, "x1")?;
                push(e, "x0")?;
                push(e, "x1")
            }
            Intrinsic::Drop => e.out("add sp, sp, #16"),
            Intrinsic::MemoryLoad => {
                pop(e, "x0")?;
                e.out("ldr x0, [x0]")?;
                push(e, "x0")
            }
            Intrinsic::MemoryStore => {
                pop(e, "x1")?;
                pop(e, "x0")?;
                e.out("str x1, [x0]")
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
            pop(e, register(operand))?;
        }
        for (operand, &value) in (on_stack..operands).zip(&hints.syscall_injected_args) {
            load_immediate(e, register(operand), value)?;
        }
        e.out("svc #0x80")?;
        if !hints.syscall_omit_result {
            push(e, "x0")?;
        }
        Ok(())
    }

    fn branch_if_zero<W: io::Write>(e: &mut Emitter<W>, label: &str) -> io::Result<()> {
        pop(e, "x0")?;
        e.out(f!("cbz x0, {label}"))
    }

    fn jump<W: io::Write>(e: &mut Emitter<W>, label: &str) -> io::Result<()> {
        e.out(f!("b {label}"))
    }

    fn call<W: io::Write>(e: &mut Emitter<W>, symbol: &str) -> io::Result<()> {
        e.out(f!("bl {symbol}"))
    }

    fn call_extern<W: io::Write>(
        e: &mut Emitter<W>,
        symbol: &str,
        arguments: &[GofraType],
        returns: bool,
    ) -> io::Result<()> {
        for (i, ty) in arguments.iter().enumerate().rev() {
            let register = match ty {
                GofraType::Integer | GofraType::Boolean => Self::ARGUMENT_REGISTERS_32[i],
                _ => Self::ARGUMENT_REGISTERS[i],
            };
            pop(e, register)?;
        }
        // Slots are 16 bytes, so `sp` is already aligned as the ABI demands.
        e.out(f!("bl {symbol}"))?;
        if returns {
            push(e, Self::RETURN_REGISTER)?;
        }
        Ok(())
    }
}

fn push<W: io::Write>(e: &mut Emitter<W>, register: &str) -> io::Result<()> {
    e.out(f!("str {register}, [sp, #-16]!"))
}

fn pop<W: io::Write>(e: &mut Emitter<W>, register: &str) -> io::Result<()> {
    e.out(f!("ldr {register}, [sp], #16"))
}

/// Pops the right operand into `x1` and the left one into `x0`, runs `body`
/// and pushes `x0`.
fn binary<W: io::Write>(e: &mut Emitter<W>, body: &[&str]) -> io::Result<()> {
    pop(e, "x1")?;
    pop(e, "x0")?;
    for instruction in body {
        e.out(instruction)?;
    }
    push(e, "x0")
}

fn compare<W: io::Write>(e: &mut Emitter<W>, condition: &str) -> io::Result<()> {
    pop(e, "x1")?;
    pop(e, "x0")?;
    e.out("cmp x0, x1")?;
    e.out(f!("cset x0, {condition}"))?;
    push(e, "x0")
}

/// Materializes `value` 16 bits at a time, skipping all-zero upper chunks.
fn load_immediate<W: io::Write>(e: &mut Emitter<W>, register: &str, value: i64) -> io::Result<()> {
    let bits = u64::from_ne_bytes(value.to_ne_bytes());
    e.out(f!("movz {register}, #{}", bits & 0xFFFF))?;
    for shift in [16, 32, 48] {
        let chunk = (bits >> shift) & 0xFFFF;
        if chunk != 0 {
            e.out(f!("movk {register}, #{chunk}, lsl #{shift}"))?;
        }
    }
    Ok(())
}

fn load_address<W: io::Write>(e: &mut Emitter<W>, register: &str, symbol: &str) -> io::Result<()> {
    e.out(f!("adrp {register}, {symbol}@PAGE"))?;
    e.out(f!("add {register}, {register}, {symbol}@PAGEOFF"))
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
    fn test_load_immediate_splits_into_chunks() {
        assert_eq!(emitted(|e| load_immediate(e, "x0", 69)), "movz x0, #69\n");
        assert_eq!(
            emitted(|e| load_immediate(e, "x0", 0x1_0000_0002)),
            "movz x0, #2\nmovk x0, #1, lsl #32\n"
        );
        assert_eq!(
            emitted(|e| load_immediate(e, "x3", -1)),
            "movz x3, #65535\nmovk x3, #65535, lsl #16\nmovk x3, #65535, lsl #32\nmovk x3, #65535, lsl #48\n"
        );
    }

    #[test]
    fn test_syscall_with_injected_arguments() {
        let hints = OptimizerHints {
            syscall_injected_args: vec![1, 0],
            syscall_omit_result: true,
            ..OptimizerHints::default()
        };
        assert_eq!(
            emitted(|e| Aarch64Darwin::syscall(e, 1, &hints)),
            "movz x16, #1\nmovz x0, #0\nsvc #0x80\n"
        );

        let hints = OptimizerHints {
            syscall_injected_args: vec![3],
            ..OptimizerHints::default()
        };
        assert_eq!(
            emitted(|e| Aarch64Darwin::syscall(e, 3, &hints)),
            "ldr x1, [sp], #16\nldr x0, [sp], #16\nldr x16, [sp], #16\nmovz x2, #3\nsvc #0x80\nstr x0, [sp, #-16]!\n"
        );
    }

    #[test]
    fn test_extern_call_uses_narrow_registers_for_integers() {
        let arguments = [GofraType::Pointer, GofraType::Integer];
        assert_eq!(
            emitted(|e| Aarch64Darwin::call_extern(e, "_f", &arguments, true)),
            "ldr w1, [sp], #16\nldr x0, [sp], #16\nbl _f\nstr x0, [sp, #-16]!\n"
        );
    }
}
