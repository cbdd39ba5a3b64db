//! Peephole passes over operator sequences plus dead function elimination.
//!
//! Every pass keeps the jump indices valid: operators are only removed at
//! positions no jump lands on, and every target after a removed operator is
//! shifted back.

use std::collections::HashSet;

use crate::{
    intrinsic::Intrinsic,
    ir::{verify_jumps, Operator, OperatorKind, Program},
    types::GofraType,
};

/// Runs every pass over the program.
pub fn optimize(mut program: Program) -> Program {
    let mut folded = fold_constants(&mut program.operators);
    let mut injected = inject_syscall_arguments(&mut program.operators);
    for function in program.functions.values_mut().filter(|f| !f.is_external) {
        folded += fold_constants(&mut function.source);
        injected += inject_syscall_arguments(&mut function.source);
    }
    let removed = eliminate_dead_functions(&mut program);
    debug_assert!(
        program.bodies().all(|(_, ops)| verify_jumps(ops).is_ok()),
        "optimizer broke a jump target"
    );
    log::debug!(
        "optimizer folded {folded} operations, rewrote {injected} syscalls, removed {removed} functions"
    );
    program
}

/// Replaces `PushInteger a, PushInteger b, <binary intrinsic>` with a single
/// push of the result, until no such window is left. Returns the number of
/// folded windows.
pub fn fold_constants(ops: &mut Vec<Operator>) -> usize {
    let mut count = 0;
    while let Some((index, value, intrinsic)) = find_foldable(ops) {
        let op = &mut ops[index];
        op.kind = OperatorKind::PushInteger(value);
        op.hints.folded = true;
        op.hints.inferred_type = intrinsic.is_comparison().then_some(GofraType::Boolean);
        remove(ops, index + 2);
        remove(ops, index + 1);
        count += 1;
    }
    count
}

fn find_foldable(ops: &[Operator]) -> Option<(usize, i64, Intrinsic)> {
    let targets = jump_targets(ops);
    ops.windows(3).enumerate().find_map(|(index, window)| {
        let [lhs, rhs, op] = window else {
            return None;
        };
        let (OperatorKind::PushInteger(a), OperatorKind::PushInteger(b)) = (&lhs.kind, &rhs.kind)
        else {
            return None;
        };
        let OperatorKind::Intrinsic(intrinsic) = op.kind else {
            return None;
        };
        // Something jumps into the middle of the window.
        if targets.contains(&(index + 1)) || targets.contains(&(index + 2)) {
            return None;
        }
        // Booleans only take part in comparisons.
        let is_boolean = |op: &Operator| op.hints.inferred_type == Some(GofraType::Boolean);
        if !intrinsic.is_comparison() && (is_boolean(lhs) || is_boolean(rhs)) {
            return None;
        }
        intrinsic
            .fold(*a, *b)
            .map(|value| (index, value, intrinsic))
    })
}

/// Moves the literal operands pushed right before a syscall into the
/// syscall itself, and drops its result when it is immediately discarded.
/// Returns the number of rewritten syscalls.
pub fn inject_syscall_arguments(ops: &mut Vec<Operator>) -> usize {
    let mut count = 0;
    let mut index = 0;
    while index < ops.len() {
        let OperatorKind::Intrinsic(Intrinsic::Syscall(arguments)) = ops[index].kind else {
            index += 1;
            continue;
        };
        let targets = jump_targets(ops);
        let mut rewritten = false;

        // The syscall number and every argument are candidates.
        let operands = usize::from(arguments) + 1;
        if ops[index].hints.syscall_injected_args.is_empty() && !targets.contains(&index) {
            let mut start = index;
            while start > 0 && index - start < operands {
                let OperatorKind::PushInteger(_) = ops[start - 1].kind else {
                    break;
                };
                start -= 1;
                // Only the first push may be a jump target, the others would
                // be skipped into.
                if targets.contains(&start) {
                    break;
                }
            }
            if start < index {
                let values = ops[start..index]
                    .iter()
                    .map(|op| match op.kind {
                        OperatorKind::PushInteger(value) => value,
                        _ => unreachable!("only integer pushes are injected"),
                    })
                    .collect();
                for removed in (start..index).rev() {
                    remove(ops, removed);
                }
                index = start;
                ops[index].hints.syscall_injected_args = values;
                rewritten = true;
            }
        }

        let result_dropped = ops
            .get(index + 1)
            .is_some_and(|op| op.kind == OperatorKind::Intrinsic(Intrinsic::Drop));
        if result_dropped && !ops[index].hints.syscall_omit_result {
            let targets = jump_targets(ops);
            if !targets.contains(&(index + 1)) {
                remove(ops, index + 1);
                ops[index].hints.syscall_omit_result = true;
                rewritten = true;
            }
        }

        count += usize::from(rewritten);
        index += 1;
    }
    count
}

/// Removes functions unreachable from the entry point. Global symbols are
/// roots too since they may be called from outside. Returns the number of
/// removed functions.
pub fn eliminate_dead_functions(program: &mut Program) -> usize {
    let mut reachable = HashSet::new();
    let mut pending: Vec<&str> = called_functions(&program.operators).collect();
    pending.extend(
        program
            .functions
            .values()
            .filter(|f| f.is_global_symbol)
            .map(|f| f.name.as_str()),
    );

    while let Some(name) = pending.pop() {
        if !reachable.insert(name.to_owned()) {
            continue;
        }
        if let Some(function) = program.functions.get(name) {
            pending.extend(called_functions(&function.source));
        }
    }

    let before = program.functions.len();
    program.functions.retain(|name, _| {
        let keep = reachable.contains(name);
        if !keep {
            log::debug!("removing unused function `{name}`");
        }
        keep
    });
    before - program.functions.len()
}

fn called_functions(ops: &[Operator]) -> impl Iterator<Item = &str> {
    ops.iter().filter_map(|op| match &op.kind {
        OperatorKind::Call(name) => Some(name.as_str()),
        _ => None,
    })
}

/// Every index some operator may jump to.
fn jump_targets(ops: &[Operator]) -> HashSet<usize> {
    ops.iter().filter_map(|op| op.kind.jump_target()).collect()
}

/// Removes the operator at `index`, shifting every jump target after it.
fn remove(ops: &mut Vec<Operator>, index: usize) {
    ops.remove(index);
    for op in ops.iter_mut() {
        if let Some(target) = op.kind.jump_target_mut() {
            if *target > index {
                *target -= 1;
            }
        }
    }
}
