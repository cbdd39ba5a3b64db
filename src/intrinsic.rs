use std::fmt;

use crate::types::GofraType;

/// Highest supported syscall argument count (excluding the syscall number).
pub const MAX_SYSCALL_ARGUMENTS: u8 = 6;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulus,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    /// Duplicates the top of the stack.
    Copy,
    Swap,
    Drop,
    /// `?>`: `ptr -> int`
    MemoryLoad,
    /// `!<`: `ptr int ->`
    MemoryStore,
    /// Syscall with the given number of arguments. The syscall number sits
    /// below the arguments, the last argument is on top.
    Syscall(u8),
}

pub static INTRINSICS: phf::Map<&'static str, Intrinsic> = phf::phf_map! {
    "+" => Intrinsic::Plus,
    "-" => Intrinsic::Minus,
    "*" => Intrinsic::Multiply,
    "/" => Intrinsic::Divide,
    "%" => Intrinsic::Modulus,
    "==" => Intrinsic::Equal,
    "!=" => Intrinsic::NotEqual,
    "<" => Intrinsic::Less,
    ">" => Intrinsic::Greater,
    "<=" => Intrinsic::LessEqual,
    ">=" => Intrinsic::GreaterEqual,
    "copy" => Intrinsic::Copy,
    "dup" => Intrinsic::Copy,
    "swap" => Intrinsic::Swap,
    "drop" => Intrinsic::Drop,
    "?>" => Intrinsic::MemoryLoad,
    "!<" => Intrinsic::MemoryStore,
    "syscall0" => Intrinsic::Syscall(0),
    "syscall1" => Intrinsic::Syscall(1),
    "syscall2" => Intrinsic::Syscall(2),
    "syscall3" => Intrinsic::Syscall(3),
    "syscall4" => Intrinsic::Syscall(4),
    "syscall5" => Intrinsic::Syscall(5),
    "syscall6" => Intrinsic::Syscall(6),
};

/// One produced stack slot of a [`Signature`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Output {
    Type(GofraType),
    /// Same type as the consumed input at this position.
    Input(usize),
}

/// The stack effect of an intrinsic. Both lists are ordered bottom to top.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub inputs: Vec<GofraType>,
    pub outputs: Vec<Output>,
}

impl Signature {
    fn new(inputs: &[GofraType], outputs: &[Output]) -> Signature {
        Signature {
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
        }
    }
}

impl Intrinsic {
    pub fn lookup(name: &str) -> Option<Intrinsic> {
        INTRINSICS.get(name).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Plus => "+",
            Intrinsic::Minus => "-",
            Intrinsic::Multiply => "*",
            Intrinsic::Divide => "/",
            Intrinsic::Modulus => "%",
            Intrinsic::Equal => "==",
            Intrinsic::NotEqual => "!=",
            Intrinsic::Less => "<",
            Intrinsic::Greater => ">",
            Intrinsic::LessEqual => "<=",
            Intrinsic::GreaterEqual => ">=",
            Intrinsic::Copy => "copy",
            Intrinsic::Swap => "swap",
            Intrinsic::Drop => "drop",
            Intrinsic::MemoryLoad => "?>",
            Intrinsic::MemoryStore => "!<",
            Intrinsic::Syscall(n) => match n {
                0 => "syscall0",
                1 => "syscall1",
                2 => "syscall2",
                3 => "syscall3",
                4 => "syscall4",
                5 => "syscall5",
                _ => "syscall6",
            },
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Intrinsic::Equal
                | Intrinsic::NotEqual
                | Intrinsic::Less
                | Intrinsic::Greater
                | Intrinsic::LessEqual
                | Intrinsic::GreaterEqual
        )
    }

    /// Evaluates a binary integer intrinsic over two constants. Comparisons
    /// yield `0`/`1`. Returns `None` for anything that can't be folded
    /// (non-binary intrinsics, division by zero, overflow).
    pub fn fold(self, lhs: i64, rhs: i64) -> Option<i64> {
        let result = match self {
            Intrinsic::Plus => lhs.checked_add(rhs)?,
            Intrinsic::Minus => lhs.checked_sub(rhs)?,
            Intrinsic::Multiply => lhs.checked_mul(rhs)?,
            Intrinsic::Divide => lhs.checked_div(rhs)?,
            Intrinsic::Modulus => lhs.checked_rem(rhs)?,
            Intrinsic::Equal => i64::from(lhs == rhs),
            Intrinsic::NotEqual => i64::from(lhs != rhs),
            Intrinsic::Less => i64::from(lhs < rhs),
            Intrinsic::Greater => i64::from(lhs > rhs),
            Intrinsic::LessEqual => i64::from(lhs <= rhs),
            Intrinsic::GreaterEqual => i64::from(lhs >= rhs),
            _ => return None,
        };
        Some(result)
    }

    /// Resolves the stack effect of this intrinsic against the current
    /// symbolic stack (bottom to top).
    ///
    /// `+` and `-` are polymorphic over their left operand: when the slot
    /// below the top holds a pointer, they perform pointer arithmetic. This is
    /// the only place where that decision is made.
    pub fn signature(self, stack: &[GofraType]) -> Signature {
        use GofraType::*;

        let below_top = stack.len().checked_sub(2).map(|i| stack[i]);
        match self {
            Intrinsic::Plus | Intrinsic::Minus if below_top == Some(Pointer) => {
                Signature::new(&[Pointer, Integer], &[Output::Type(Pointer)])
            }
            Intrinsic::Plus
            | Intrinsic::Minus
            | Intrinsic::Multiply
            | Intrinsic::Divide
            | Intrinsic::Modulus => Signature::new(&[Integer, Integer], &[Output::Type(Integer)]),
            Intrinsic::Equal
            | Intrinsic::NotEqual
            | Intrinsic::Less
            | Intrinsic::Greater
            | Intrinsic::LessEqual
            | Intrinsic::GreaterEqual => Signature::new(&[Any, Any], &[Output::Type(Boolean)]),
            Intrinsic::Copy => Signature::new(&[Any], &[Output::Input(0), Output::Input(0)]),
            Intrinsic::Swap => Signature::new(&[Any, Any], &[Output::Input(1), Output::Input(0)]),
            Intrinsic::Drop => Signature::new(&[Any], &[]),
            Intrinsic::MemoryLoad => Signature::new(&[Pointer], &[Output::Type(Integer)]),
            Intrinsic::MemoryStore => Signature::new(&[Pointer, Integer], &[]),
            Intrinsic::Syscall(n) => {
                let mut inputs = vec![Integer];
                inputs.extend(std::iter::repeat_n(Any, usize::from(n)));
                Signature {
                    inputs,
                    outputs: vec![Output::Type(Integer)],
                }
            }
        }
    }
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
