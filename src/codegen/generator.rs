use std::{format_args as f, io, marker::PhantomData};

use crate::{
    codegen::{
        abi::Abi,
        emit::{escape, sanitize, Emitter, StringTable},
        Error, Options,
    },
    intrinsic::Intrinsic,
    ir::{Function, Operator, OperatorKind, OptimizerHints, Program, ENTRY_POINT},
    types::GofraType,
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Size of the buffer holding the return addresses of internal calls.
pub const RETURN_STACK_SIZE: usize = 64 * 1024;

/// Instruction templates of one backend.
///
/// The language stack is the native stack: every template pops its operands
/// off it and pushes its results back.
pub trait Backend: Abi {
    /// Moves the return address the caller pushed onto the return stack.
    fn function_prologue<W: io::Write>(e: &mut Emitter<W>) -> io::Result<()>;
    fn function_epilogue<W: io::Write>(e: &mut Emitter<W>) -> io::Result<()>;

    /// Body of the entry symbol: sets up the return stack, calls the entry
    /// point and exits with status 0.
    fn entry<W: io::Write>(e: &mut Emitter<W>, main: &str, return_stack: &str) -> io::Result<()>;

    fn push_integer<W: io::Write>(e: &mut Emitter<W>, value: i64) -> io::Result<()>;
    fn push_address<W: io::Write>(e: &mut Emitter<W>, symbol: &str) -> io::Result<()>;

    /// Every intrinsic but syscalls.
    fn intrinsic<W: io::Write>(e: &mut Emitter<W>, intrinsic: Intrinsic) -> io::Result<()>;
    fn syscall<W: io::Write>(
        e: &mut Emitter<W>,
        arguments: u8,
        hints: &OptimizerHints,
    ) -> io::Result<()>;

    /// Pops a value and jumps to `label` if it is zero.
    fn branch_if_zero<W: io::Write>(e: &mut Emitter<W>, label: &str) -> io::Result<()>;
    fn jump<W: io::Write>(e: &mut Emitter<W>, label: &str) -> io::Result<()>;

    fn call<W: io::Write>(e: &mut Emitter<W>, symbol: &str) -> io::Result<()>;
    /// Calls through the platform ABI, with `arguments` already checked to
    /// fit in [`Abi::ARGUMENT_REGISTERS`].
    fn call_extern<W: io::Write>(
        e: &mut Emitter<W>,
        symbol: &str,
        arguments: &[GofraType],
        returns: bool,
    ) -> io::Result<()>;
}

pub struct Generator<'p, W, B> {
    e: Emitter<W>,
    program: &'p Program,
    options: Options,
    strings: StringTable,
    /// Number of label scopes handed out so far.
    scopes: usize,
    /// Inline functions currently being expanded.
    inline_stack: Vec<&'p str>,
    _backend: PhantomData<B>,
}

impl<'p, W, B> Generator<'p, W, B>
where
    W: io::Write,
    B: Backend,
{
    pub fn new(writer: W, program: &'p Program, options: Options) -> Generator<'p, W, B> {
        Generator {
            e: Emitter::new(writer),
            program,
            options,
            strings: StringTable::default(),
            scopes: 0,
            inline_stack: Vec::new(),
            _backend: PhantomData,
        }
    }

    pub fn generate(mut self) -> Result<W> {
        self.g_program_prologue()?;
        self.g_functions()?;
        self.g_entry()?;
        self.g_data()?;
        Ok(self.e.finish()?)
    }

    fn g_program_prologue(&mut self) -> Result<()> {
        if self.options.debug_comments {
            let timestamp = chrono::Utc::now().to_rfc3339();
            self.e.out(f!("{} Generated by gofra for {} at {timestamp}", B::COMMENT, B::NAME))?;
            self.e.out_line()?;
        }
        if !B::GLOBAL_PROLOGUE.is_empty() {
            self.e.out(B::GLOBAL_PROLOGUE)?;
        }
        self.e.out(B::SECTION_TEXT)?;
        self.e.out_line()?;
        Ok(())
    }

    fn g_functions(&mut self) -> Result<()> {
        let program = self.program;
        let emitted = program
            .functions
            .values()
            .filter(|f| !f.is_inline && !f.is_external);
        for function in emitted {
            let symbol = Self::function_symbol(function)?;
            if function.is_global_symbol {
                self.e.out(f!(".globl {symbol}"))?;
            }
            self.g_function(&symbol, &function.name, &function.source)?;
        }
        Ok(())
    }

    fn g_entry(&mut self) -> Result<()> {
        let program = self.program;
        let main = Self::internal_symbol(ENTRY_POINT);
        self.g_function(&main, ENTRY_POINT, &program.operators)?;

        let return_stack = Self::return_stack_symbol();
        self.e.out(f!(".globl {}", B::ENTRY_SYMBOL))?;
        self.e.label(B::ENTRY_SYMBOL)?;
        self.e.indented(|e| B::entry(e, &main, &return_stack))?;
        Ok(())
    }

    fn g_function(&mut self, symbol: &str, name: &str, ops: &'p [Operator]) -> Result<()> {
        self.e.label(symbol)?;
        self.e.set_indent(true);
        B::function_prologue(&mut self.e)?;
        self.g_body(name, ops)?;
        B::function_epilogue(&mut self.e)?;
        self.e.set_indent(false);
        self.e.out_line()?;
        Ok(())
    }

    /// Emits an operator sequence under a fresh label scope.
    fn g_body(&mut self, name: &str, ops: &'p [Operator]) -> Result<()> {
        let scope = Scope::new::<B>(name, self.scopes);
        self.scopes += 1;

        let mut targets = vec![false; ops.len() + 1];
        for target in ops.iter().filter_map(|op| op.kind.jump_target()) {
            targets[target] = true;
        }
        // `do` leaves through its loop's exit.
        for op in ops {
            if let OperatorKind::Do { while_index } = op.kind {
                targets[loop_exit(ops, while_index)] = true;
            }
        }

        for (index, op) in ops.iter().enumerate() {
            if targets[index] {
                self.e.label(scope.label(index))?;
            }
            if self.options.debug_comments {
                self.e.out(f!(
                    "{} {index}: {} ({})",
                    B::COMMENT,
                    op.kind.name(),
                    op.location()
                ))?;
            }
            self.g_operator(&scope, ops, op)?;
        }
        if targets[ops.len()] {
            self.e.label(scope.label(ops.len()))?;
        }
        Ok(())
    }

    fn g_operator(&mut self, scope: &Scope, ops: &'p [Operator], op: &'p Operator) -> Result<()> {
        let e = &mut self.e;
        match &op.kind {
            OperatorKind::PushInteger(value) => B::push_integer(e, *value)?,
            OperatorKind::PushString(string) => {
                let label = Self::string_label(self.strings.intern(string));
                B::push_address(e, &label)?;
                let length = i64::try_from(string.len()).expect("string length fits in i64");
                B::push_integer(e, length)?;
            }
            OperatorKind::PushMemoryPointer(name) => {
                if !self.program.memories.contains_key(name) {
                    return Err(Error::UnknownMemory(name.clone()));
                }
                B::push_address(e, &Self::memory_symbol(name))?;
            }
            OperatorKind::Intrinsic(Intrinsic::Syscall(arguments)) => {
                B::syscall(e, *arguments, &op.hints)?;
            }
            OperatorKind::Intrinsic(intrinsic) => B::intrinsic(e, *intrinsic)?,
            OperatorKind::If { target } => B::branch_if_zero(e, &scope.label(*target))?,
            OperatorKind::Else { target } => B::jump(e, &scope.label(*target))?,
            OperatorKind::While { .. } | OperatorKind::End { back_edge: None } => {}
            OperatorKind::Do { while_index } => {
                B::branch_if_zero(e, &scope.label(loop_exit(ops, *while_index)))?;
            }
            OperatorKind::End {
                back_edge: Some(while_index),
            } => B::jump(e, &scope.label(*while_index))?,
            OperatorKind::Call(name) => self.g_call(name)?,
        }
        Ok(())
    }

    fn g_call(&mut self, name: &'p str) -> Result<()> {
        let Some(callee) = self.program.function(name) else {
            return Err(Error::UnknownFunction(name.to_owned()));
        };

        if callee.is_external {
            let count = callee.type_contract_in.len();
            if count > B::ARGUMENT_REGISTERS.len() {
                return Err(Error::TooManyExternArguments {
                    name: name.to_owned(),
                    count,
                    max: B::ARGUMENT_REGISTERS.len(),
                });
            }
            let symbol = Self::linker_symbol(name)?;
            let returns = !callee.type_contract_out.is_empty();
            B::call_extern(&mut self.e, &symbol, &callee.type_contract_in, returns)?;
        } else if callee.is_inline {
            if self.inline_stack.contains(&name) {
                return Err(Error::RecursiveInlineFunction(name.to_owned()));
            }
            if self.options.debug_comments {
                self.e.out(f!("{} inline {name}", B::COMMENT))?;
            }
            self.inline_stack.push(name);
            self.g_body(name, &callee.source)?;
            self.inline_stack.pop();
        } else {
            let symbol = Self::function_symbol(callee)?;
            B::call(&mut self.e, &symbol)?;
        }
        Ok(())
    }

    fn g_data(&mut self) -> Result<()> {
        if !self.strings.is_empty() {
            self.e.out(B::SECTION_STRINGS)?;
            for (index, string) in self.strings.iter() {
                self.e.label(Self::string_label(index))?;
                self.e.out(f!("    .asciz \"{}\"", escape(string)))?;
            }
            self.e.out_line()?;
        }

        for (name, &size) in &self.program.memories {
            B::zero_fill(&mut self.e, &Self::memory_symbol(name), size)?;
        }
        B::zero_fill(&mut self.e, &Self::return_stack_symbol(), RETURN_STACK_SIZE)?;
        Ok(())
    }
}

/// Symbol naming.
impl<W, B> Generator<'_, W, B>
where
    B: Backend,
{
    /// Global functions keep their name, everything else lives under a
    /// `gofra_` prefix of its own kind.
    fn function_symbol(function: &Function) -> Result<String> {
        if function.is_global_symbol {
            Self::linker_symbol(&function.name)
        } else {
            Ok(Self::internal_symbol(&function.name))
        }
    }

    fn internal_symbol(name: &str) -> String {
        format!("{}gofra_fn_{}", B::SYMBOL_PREFIX, sanitize(name))
    }

    fn memory_symbol(name: &str) -> String {
        format!("{}gofra_mem_{}", B::SYMBOL_PREFIX, sanitize(name))
    }

    /// Symbol of a global or extern function, which must be spelled as is.
    fn linker_symbol(name: &str) -> Result<String> {
        let invalid = |reason| {
            Err(Error::InvalidLinkerSymbol {
                name: name.to_owned(),
                reason,
            })
        };
        let mut chars = name.chars();
        let is_identifier = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !is_identifier {
            return invalid("not a plain identifier");
        }
        if name.starts_with("gofra_") {
            return invalid("the `gofra_` prefix is reserved");
        }
        let symbol = format!("{}{name}", B::SYMBOL_PREFIX);
        if symbol == B::ENTRY_SYMBOL {
            return invalid("it is the program entry symbol");
        }
        Ok(symbol)
    }

    fn return_stack_symbol() -> String {
        format!("{}gofra_return_stack", B::SYMBOL_PREFIX)
    }

    fn string_label(index: usize) -> String {
        format!("{}gofra_string_{index}", B::LOCAL_LABEL_PREFIX)
    }
}

/// Labels of one emitted operator sequence. Inline expansions get their own
/// scope so that a function expanded twice doesn't define a label twice.
struct Scope {
    prefix: String,
}

impl Scope {
    fn new<A: Abi>(name: &str, id: usize) -> Scope {
        Scope {
            prefix: format!("{}{}_{id}", A::LOCAL_LABEL_PREFIX, sanitize(name)),
        }
    }

    fn label(&self, index: usize) -> String {
        format!("{}_{index}", self.prefix)
    }
}

fn loop_exit(ops: &[Operator], while_index: usize) -> usize {
    match ops[while_index].kind {
        OperatorKind::While { exit } => exit,
        _ => unreachable!("do always refers to a while"),
    }
}
