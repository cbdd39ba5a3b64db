use std::io::Write;

use crate::{
    ir::{Function, Operator, OperatorKind, OptimizerHints, Program, ENTRY_POINT},
    types::GofraType,
};

const INDENT_WIDTH: usize = 2;

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

pub fn print_program_string(program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program).expect("writing to a Vec can't fail");
    String::from_utf8(buf).expect("the dump is valid UTF-8")
}

/// Prints the memories, then every function and finally the entry point.
pub fn print_program(w: &mut impl Write, program: &Program) -> std::io::Result<()> {
    for (name, size) in &program.memories {
        writeln!(w, "memory {name} {size}")?;
    }
    for function in program.functions.values() {
        print_function(w, function)?;
    }
    writeln!(w, "{ENTRY_POINT}")?;
    print_operators(w, 1, &program.operators)
}

fn print_function(w: &mut impl Write, function: &Function) -> std::io::Result<()> {
    for (set, modifier) in [
        (function.is_global_symbol, "global"),
        (function.is_inline, "inline"),
        (function.is_external, "extern"),
    ] {
        if set {
            write!(w, "{modifier} ")?;
        }
    }
    write!(w, "func {}[", function.name)?;
    print_types(w, &function.type_contract_in)?;
    write!(w, "] -> ")?;
    if function.type_contract_out.is_empty() {
        writeln!(w, "void")?;
    } else {
        print_types(w, &function.type_contract_out)?;
        writeln!(w)?;
    }
    if !function.is_external {
        print_operators(w, 1, &function.source)?;
    }
    Ok(())
}

fn print_types(w: &mut impl Write, types: &[GofraType]) -> std::io::Result<()> {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{ty}")?;
    }
    Ok(())
}

/// Prints one operator per line, indenting block bodies relative to their
/// opener.
pub fn print_operators(w: &mut impl Write, i: usize, ops: &[Operator]) -> std::io::Result<()> {
    let mut depth = i;
    for (index, op) in ops.iter().enumerate() {
        let closes_body = matches!(
            op.kind,
            OperatorKind::Else { .. } | OperatorKind::Do { .. } | OperatorKind::End { .. }
        );
        sp(w, if closes_body { depth.saturating_sub(1) } else { depth })?;
        write!(w, "{index}: ")?;
        print_operator(w, op)?;
        writeln!(w)?;
        match op.kind {
            OperatorKind::If { .. } | OperatorKind::While { .. } => depth += 1,
            OperatorKind::End { .. } => depth = depth.saturating_sub(1),
            _ => (),
        }
    }
    Ok(())
}

fn print_operator(w: &mut impl Write, op: &Operator) -> std::io::Result<()> {
    let name = op.kind.name();
    match &op.kind {
        OperatorKind::PushInteger(value) => write!(w, "{name} {value}")?,
        OperatorKind::PushString(string) => write!(w, "{name} {string:?}")?,
        OperatorKind::PushMemoryPointer(memory) => write!(w, "{name} {memory}")?,
        OperatorKind::Intrinsic(intrinsic) => write!(w, "{name} {intrinsic}")?,
        OperatorKind::Call(function) => write!(w, "{name} {function}")?,
        OperatorKind::End { back_edge: None } => write!(w, "{name}")?,
        kind => {
            let target = kind.jump_target().unwrap_or_default();
            write!(w, "{name} -> {target}")?;
        }
    }
    print_hints(w, &op.hints)
}

fn print_hints(w: &mut impl Write, hints: &OptimizerHints) -> std::io::Result<()> {
    let mut notes = Vec::new();
    if hints.folded {
        notes.push("folded".to_owned());
    }
    if let Some(ty) = hints.inferred_type {
        notes.push(format!("as {ty}"));
    }
    if !hints.syscall_injected_args.is_empty() {
        notes.push(format!("injected {:?}", hints.syscall_injected_args));
    }
    if hints.syscall_omit_result {
        notes.push("result omitted".to_owned());
    }
    if !notes.is_empty() {
        write!(w, " ({})", notes.join(", "))?;
    }
    Ok(())
}
