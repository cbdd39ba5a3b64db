use std::ops::Range;

use crate::{
    intrinsic::{Intrinsic, Output},
    ir::{Operator, OperatorKind, Program, ENTRY_POINT},
    token::{Location, Spanned},
    types::{DisplayStack, GofraType},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Maximum number of nested blocks the checker descends into.
pub const MAX_NESTING_DEPTH: usize = 512;

/// Verifies that every body of the program is stack-safe.
///
/// Non-external functions are checked starting from their input contract and
/// must end holding exactly their output contract. The entry point starts
/// and ends with an empty stack.
pub fn check(program: &Program) -> Result<()> {
    let checker = Checker { program };
    for function in program.functions.values().filter(|f| !f.is_external) {
        checker.check_body(
            &function.name,
            &function.source,
            &function.type_contract_in,
            &function.type_contract_out,
            &function.location,
        )?;
    }
    let fallback = Location::builtin();
    checker.check_body(ENTRY_POINT, &program.operators, &[], &[], &fallback)
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(
        "`{operation}` needs {needed} value(s), but the stack holds {}: {}",
        .stack.len(),
        DisplayStack(.stack)
    )]
    NotEnoughArguments {
        operation: String,
        needed: usize,
        stack: Vec<GofraType>,
    },
    #[error(
        "`{operation}` expected `{expected}`, found `{actual}` (stack: {})",
        DisplayStack(.stack)
    )]
    TypeMismatch {
        operation: String,
        expected: GofraType,
        actual: GofraType,
        stack: Vec<GofraType>,
    },
    #[error(
        "`{owner}` ends with {} unhandled value(s) on the stack: {}",
        .stack.len(),
        DisplayStack(.stack)
    )]
    NonEmptyStackAtEnd {
        owner: String,
        stack: Vec<GofraType>,
    },
    #[error(
        "stack shape differs across `{block}` block ({other}): expected {}, found {}",
        DisplayStack(.expected),
        DisplayStack(.actual)
    )]
    StackMismatch {
        block: &'static str,
        /// The partner operator of the one the error is reported at.
        other: Location,
        expected: Vec<GofraType>,
        actual: Vec<GofraType>,
    },
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("blocks are nested deeper than {} levels", MAX_NESTING_DEPTH)]
    NestingTooDeep,
}

struct Checker<'p> {
    program: &'p Program,
}

impl Checker<'_> {
    fn check_body(
        &self,
        name: &str,
        operators: &[Operator],
        contract_in: &[GofraType],
        contract_out: &[GofraType],
        fallback: &Location,
    ) -> Result<()> {
        let mut stack = contract_in.to_vec();
        self.emulate(operators, 0..operators.len(), &mut stack, 0)?;

        let end = operators.last().map_or(fallback, Operator::location);
        let operation = format!("return from {name}");
        consume(&mut stack, contract_out, &operation, end)?;
        if !stack.is_empty() {
            let error = Error::NonEmptyStackAtEnd {
                owner: name.to_owned(),
                stack,
            };
            return Err(end.clone().wrap(error));
        }

        log::debug!("type checked `{name}`");
        Ok(())
    }

    /// Emulates the operators in `range` over the symbolic `stack`.
    ///
    /// Blocks are emulated by their opener, so `range` must never start or
    /// end in the middle of one.
    fn emulate(
        &self,
        ops: &[Operator],
        range: Range<usize>,
        stack: &mut Vec<GofraType>,
        depth: usize,
    ) -> Result<()> {
        let mut index = range.start;
        while index < range.end {
            let op = &ops[index];
            index = match op.kind {
                OperatorKind::If { target } => self.emulate_if(ops, index, target, stack, depth)?,
                OperatorKind::While { exit } => {
                    self.emulate_while(ops, index, exit, stack, depth)?
                }
                OperatorKind::Else { .. } | OperatorKind::Do { .. } | OperatorKind::End { .. } => {
                    unreachable!("{} is emulated by its block opener", op.kind.name())
                }
                _ => {
                    self.emulate_operator(op, stack)?;
                    index + 1
                }
            };
        }
        Ok(())
    }

    /// Returns the index to resume at.
    fn emulate_if(
        &self,
        ops: &[Operator],
        index: usize,
        target: usize,
        stack: &mut Vec<GofraType>,
        depth: usize,
    ) -> Result<usize> {
        let op = &ops[index];
        enter_block(op, depth)?;
        pop_condition(op, stack)?;
        let before = stack.clone();

        if let OperatorKind::Else { target: after_end } = ops[target - 1].kind {
            let else_index = target - 1;
            self.emulate(ops, index + 1..else_index, stack, depth + 1)?;
            let mut else_stack = before;
            self.emulate(ops, target..after_end - 1, &mut else_stack, depth + 1)?;
            if *stack != else_stack {
                let error = Error::StackMismatch {
                    block: "if-else",
                    other: ops[else_index].location().clone(),
                    expected: stack.clone(),
                    actual: else_stack,
                };
                return Err(op.location().clone().wrap(error));
            }
            return Ok(after_end);
        }

        // Without an else, skipping the body must be indistinguishable from
        // running it.
        self.emulate(ops, index + 1..target - 1, stack, depth + 1)?;
        if *stack != before {
            let error = Error::StackMismatch {
                block: "if",
                other: ops[target - 1].location().clone(),
                expected: before,
                actual: stack.clone(),
            };
            return Err(op.location().clone().wrap(error));
        }
        Ok(target)
    }

    /// Returns the index to resume at.
    fn emulate_while(
        &self,
        ops: &[Operator],
        index: usize,
        exit: usize,
        stack: &mut Vec<GofraType>,
        depth: usize,
    ) -> Result<usize> {
        let op = &ops[index];
        enter_block(op, depth)?;
        let do_index = (index + 1..exit)
            .find(|&i| ops[i].kind == OperatorKind::Do { while_index: index })
            .expect("every while has a matching do");
        let end_index = exit - 1;

        let entry = stack.clone();
        self.emulate(ops, index + 1..do_index, stack, depth + 1)?;
        pop_condition(&ops[do_index], stack)?;
        let after_condition = stack.clone();

        // Every iteration has to restore the shape the condition ran from.
        self.emulate(ops, do_index + 1..end_index, stack, depth + 1)?;
        if *stack != entry {
            let error = Error::StackMismatch {
                block: "while",
                other: ops[end_index].location().clone(),
                expected: entry,
                actual: stack.clone(),
            };
            return Err(op.location().clone().wrap(error));
        }

        *stack = after_condition;
        Ok(exit)
    }

    fn emulate_operator(&self, op: &Operator, stack: &mut Vec<GofraType>) -> Result<()> {
        match &op.kind {
            OperatorKind::PushInteger(_) => {
                stack.push(op.hints.inferred_type.unwrap_or(GofraType::Integer));
            }
            OperatorKind::PushString(_) => stack.extend([GofraType::Pointer, GofraType::Integer]),
            OperatorKind::PushMemoryPointer(_) => stack.push(GofraType::Pointer),
            OperatorKind::Intrinsic(intrinsic) => emulate_intrinsic(op, *intrinsic, stack)?,
            OperatorKind::Call(name) => {
                let Some(callee) = self.program.function(name) else {
                    let error = Error::UnknownFunction(name.clone());
                    return Err(op.location().clone().wrap(error));
                };
                let operation = format!("call {name}");
                consume(stack, &callee.type_contract_in, &operation, op.location())?;
                stack.extend_from_slice(&callee.type_contract_out);
            }
            OperatorKind::If { .. }
            | OperatorKind::Else { .. }
            | OperatorKind::While { .. }
            | OperatorKind::Do { .. }
            | OperatorKind::End { .. } => unreachable!("control flow is emulated as blocks"),
        }
        Ok(())
    }
}

fn emulate_intrinsic(op: &Operator, intrinsic: Intrinsic, stack: &mut Vec<GofraType>) -> Result<()> {
    let mut signature = intrinsic.signature(stack);
    if let Intrinsic::Syscall(_) = intrinsic {
        // Injected operands are the topmost ones and never reach the stack.
        let kept = signature
            .inputs
            .len()
            .saturating_sub(op.hints.syscall_injected_args.len());
        signature.inputs.truncate(kept);
        if op.hints.syscall_omit_result {
            signature.outputs.clear();
        }
    }

    let inputs = consume(stack, &signature.inputs, intrinsic.name(), op.location())?;
    stack.extend(signature.outputs.iter().map(|output| match *output {
        Output::Type(ty) => ty,
        Output::Input(i) => inputs[i],
    }));
    Ok(())
}

/// Pops `expected.len()` values off the stack after checking them against
/// `expected` (bottom to top), returning the popped types.
fn consume(
    stack: &mut Vec<GofraType>,
    expected: &[GofraType],
    operation: &str,
    location: &Location,
) -> Result<Vec<GofraType>> {
    let Some(split) = stack.len().checked_sub(expected.len()) else {
        let error = Error::NotEnoughArguments {
            operation: operation.to_owned(),
            needed: expected.len(),
            stack: stack.clone(),
        };
        return Err(location.clone().wrap(error));
    };

    let mismatch = expected
        .iter()
        .zip(&stack[split..])
        .find(|(expected, actual)| !expected.accepts(**actual));
    if let Some((&expected, &actual)) = mismatch {
        let error = Error::TypeMismatch {
            operation: operation.to_owned(),
            expected,
            actual,
            stack: stack.clone(),
        };
        return Err(location.clone().wrap(error));
    }

    Ok(stack.split_off(split))
}

/// Pops the condition of an `if` or a `do`. Integers are accepted and
/// compared against zero.
fn pop_condition(op: &Operator, stack: &mut Vec<GofraType>) -> Result<()> {
    match stack.last().copied() {
        Some(GofraType::Boolean | GofraType::Integer) => {
            stack.pop();
            Ok(())
        }
        Some(actual) => {
            let error = Error::TypeMismatch {
                operation: op.kind.name().to_owned(),
                expected: GofraType::Boolean,
                actual,
                stack: stack.clone(),
            };
            Err(op.location().clone().wrap(error))
        }
        None => {
            let error = Error::NotEnoughArguments {
                operation: op.kind.name().to_owned(),
                needed: 1,
                stack: Vec::new(),
            };
            Err(op.location().clone().wrap(error))
        }
    }
}

fn enter_block(op: &Operator, depth: usize) -> Result<()> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(op.location().clone().wrap(Error::NestingTooDeep));
    }
    Ok(())
}
