// program   ::= (function | macro | memory | operator)*
// function  ::= modifier* func signature operator* end
//             | modifier* extern func signature
// signature ::= TYPE NAME '[' [TYPE (',' TYPE)*] ']'
//             | NAME '[' [TYPE (',' TYPE)*] ']' TYPE
// modifier  ::= inline | extern | global
// macro     ::= macro NAME token* end
// memory    ::= memory NAME INTEGER
// operator  ::= INTEGER | CHARACTER | STRING | WORD
//             | if operator* [else operator*] end
//             | while operator* do operator* end

use indexmap::IndexMap;

use crate::{
    intrinsic::Intrinsic,
    token::{Location, Token},
    types::GofraType,
};

/// Name of the function the program starts executing at.
pub const ENTRY_POINT: &str = "main";

/// The unit of the IR.
///
/// Control flow is encoded through indices into the operator sequence the
/// operator lives in (the entry point body or a function body).
#[derive(Clone, Debug, PartialEq)]
pub struct Operator {
    pub kind: OperatorKind,
    /// Owning token, for diagnostics.
    pub token: Token,
    pub hints: OptimizerHints,
}

impl Operator {
    pub fn new(kind: OperatorKind, token: Token) -> Operator {
        Operator {
            kind,
            token,
            hints: OptimizerHints::default(),
        }
    }

    pub fn location(&self) -> &Location {
        &self.token.location
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OperatorKind {
    PushInteger(i64),
    PushString(String),
    /// Pushes the address of the named static buffer.
    PushMemoryPointer(String),
    Intrinsic(Intrinsic),
    /// Jumps to `target` when the condition is false: the first operator of
    /// the else body, or the one after `end`.
    If { target: usize },
    /// Reached at the end of the true branch; jumps past `end`.
    Else { target: usize },
    /// Loop header. `exit` is the index after the matching `end`.
    While { exit: usize },
    /// Loop condition check. Exits the loop through the partner `while`'s
    /// `exit` when the condition is false.
    Do { while_index: usize },
    /// Closes a block. Loops carry a back-edge to their `while`.
    End { back_edge: Option<usize> },
    /// Calls a function by name.
    Call(String),
}

impl OperatorKind {
    /// The index this operator refers to, if it is a control flow operator
    /// with a jump target.
    pub fn jump_target(&self) -> Option<usize> {
        match *self {
            OperatorKind::If { target } | OperatorKind::Else { target } => Some(target),
            OperatorKind::While { exit } => Some(exit),
            OperatorKind::Do { while_index } => Some(while_index),
            OperatorKind::End { back_edge } => back_edge,
            _ => None,
        }
    }

    pub fn jump_target_mut(&mut self) -> Option<&mut usize> {
        match self {
            OperatorKind::If { target } | OperatorKind::Else { target } => Some(target),
            OperatorKind::While { exit } => Some(exit),
            OperatorKind::Do { while_index } => Some(while_index),
            OperatorKind::End { back_edge } => back_edge.as_mut(),
            _ => None,
        }
    }

    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            OperatorKind::If { .. }
                | OperatorKind::Else { .. }
                | OperatorKind::While { .. }
                | OperatorKind::Do { .. }
                | OperatorKind::End { .. }
        )
    }

    /// Short name used by diagnostics and by the IR dump.
    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::PushInteger(_) => "push-integer",
            OperatorKind::PushString(_) => "push-string",
            OperatorKind::PushMemoryPointer(_) => "push-memory-pointer",
            OperatorKind::Intrinsic(_) => "intrinsic",
            OperatorKind::If { .. } => "if",
            OperatorKind::Else { .. } => "else",
            OperatorKind::While { .. } => "while",
            OperatorKind::Do { .. } => "do",
            OperatorKind::End { .. } => "end",
            OperatorKind::Call(_) => "call",
        }
    }
}

/// Annotations left by the optimizer. Later stages must honour them as-is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimizerHints {
    /// The operator is the result of constant folding.
    pub folded: bool,
    /// Overrides the type the operator pushes (e.g. a folded comparison
    /// pushes a boolean even though it is an integer push).
    pub inferred_type: Option<GofraType>,
    /// Compile-time values for the topmost syscall operands, bottom to top.
    /// Their pushes were removed from the operator sequence.
    pub syscall_injected_args: Vec<i64>,
    /// The syscall result is never used, so it is not pushed.
    pub syscall_omit_result: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub location: Location,
    /// Empty for external functions.
    pub source: Vec<Operator>,
    pub type_contract_in: Vec<GofraType>,
    pub type_contract_out: Vec<GofraType>,
    /// Expanded at call sites instead of being emitted as a symbol.
    pub is_inline: bool,
    /// Defined outside of the program; called through the platform ABI.
    pub is_external: bool,
    pub is_global_symbol: bool,
}

/// A named, unevaluated token span.
#[derive(Clone, Debug, PartialEq)]
pub struct Macro {
    pub name: String,
    pub location: Location,
    pub inner_tokens: Vec<Token>,
}

/// The artifact passed from the parser through the type checker and the
/// optimizer to the code generator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    /// Body of the entry point.
    pub operators: Vec<Operator>,
    /// Every function except the entry point, in definition order.
    pub functions: IndexMap<String, Function>,
    /// Named static buffers and their size in bytes, in definition order.
    pub memories: IndexMap<String, usize>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Every operator sequence of the program with its owner's name.
    pub fn bodies(&self) -> impl Iterator<Item = (&str, &[Operator])> {
        std::iter::once((ENTRY_POINT, self.operators.as_slice())).chain(
            self.functions
                .values()
                .filter(|f| !f.is_external)
                .map(|f| (f.name.as_str(), f.source.as_slice())),
        )
    }
}

/// A violation of the jump index invariants.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("operator {index} ({kind}): {reason}")]
pub struct JumpError {
    pub index: usize,
    pub kind: &'static str,
    pub reason: &'static str,
}

/// Checks that every control flow operator points at its structural partner:
///
/// - `if` targets right after its `else` or its `end`;
/// - `else` targets right after its `end`;
/// - `while` exits right after an `end` whose back-edge is that `while`;
/// - `do` points back at a `while`, and the loop's `end` carries the same
///   `while` index.
pub fn verify_jumps(operators: &[Operator]) -> Result<(), JumpError> {
    let kind_at = |i: usize| operators.get(i).map(|op| &op.kind);

    for (index, op) in operators.iter().enumerate() {
        let fail = |reason| JumpError {
            index,
            kind: op.kind.name(),
            reason,
        };
        match op.kind {
            OperatorKind::If { target } => {
                if target <= index || target > operators.len() {
                    return Err(fail("target out of bounds"));
                }
                match kind_at(target - 1) {
                    Some(OperatorKind::Else { .. } | OperatorKind::End { back_edge: None }) => {}
                    _ => return Err(fail("target does not follow else or end")),
                }
            }
            OperatorKind::Else { target } => {
                if target <= index || target > operators.len() {
                    return Err(fail("target out of bounds"));
                }
                if !matches!(kind_at(target - 1), Some(OperatorKind::End { back_edge: None })) {
                    return Err(fail("target does not follow end"));
                }
            }
            OperatorKind::While { exit } => {
                if exit <= index || exit > operators.len() {
                    return Err(fail("exit out of bounds"));
                }
                if kind_at(exit - 1) != Some(&OperatorKind::End { back_edge: Some(index) }) {
                    return Err(fail("exit does not follow the loop end"));
                }
            }
            OperatorKind::Do { while_index } => {
                if while_index >= index {
                    return Err(fail("while index is not before do"));
                }
                let Some(&OperatorKind::While { exit }) = kind_at(while_index) else {
                    return Err(fail("while index does not point at while"));
                };
                if exit <= index {
                    return Err(fail("loop exit is before do"));
                }
            }
            OperatorKind::End {
                back_edge: Some(while_index),
            } => {
                if !matches!(kind_at(while_index), Some(OperatorKind::While { .. })) {
                    return Err(fail("back-edge does not point at while"));
                }
            }
            _ => {}
        }
    }
    Ok(())
}
