use std::{collections::HashMap, rc::Rc};

use indexmap::IndexMap;

use crate::{
    intrinsic::Intrinsic,
    ir::{Function, Macro, Operator, OperatorKind, Program, ENTRY_POINT},
    lexer,
    token::{Keyword, Location, Spanned, Token, TokenKind, KEYWORDS},
    types::GofraType,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Maximum number of nested macro expansions before the parser assumes the
/// expansion is cyclic.
pub const MAX_MACRO_EXPANSION_DEPTH: u32 = 256;

/// Lexes and parses the provided source into a program.
pub fn parse_program(src: &str, file: &str) -> Result<Program> {
    let tokens = lexer::lex_in_new(src, file).map_err(|e| e.location.wrap(e.inner.into()))?;
    parse(tokens, file)
}

/// Parses a token sequence into a program.
///
/// The entry point is the function named `main`, if any. Otherwise the
/// top-level operators form the entry point body.
pub fn parse(tokens: Vec<Token>, file: &str) -> Result<Program> {
    if tokens.is_empty() {
        let location = Location::new(Rc::from(file), 1, 1);
        return Err(location.wrap(Error::EmptyInput));
    }

    let mut p = Parser::new(tokens);
    p.parse_top_level()?;
    p.into_program()
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lexer(#[from] lexer::Error),
    #[error("empty input")]
    EmptyInput,
    #[error("unknown word `{0}`")]
    UnknownWord(String),
    #[error("float literals are not supported")]
    UnsupportedFloat,
    #[error("`do` without preceding `while`")]
    DoWithoutWhile,
    #[error("`else` without preceding `if`")]
    ElseWithoutIf,
    #[error("`else` after `{0}` block, expected `if`")]
    ElseAfterNonIf(&'static str),
    #[error("unclosed `{0}` block")]
    UnclosedBlock(&'static str),
    #[error("`end` without an open block")]
    EndWithoutContext,
    #[error("`end` right after `while`, expected `do` first")]
    EndAfterWhile,
    #[error("expected macro name")]
    MacroWithoutName,
    #[error("macro name `{0}` is a keyword")]
    MacroNameIsKeyword(Keyword),
    #[error("macro `{name}` is already defined at {previous}")]
    MacroRedefinition { name: String, previous: Location },
    #[error("unclosed macro `{0}`")]
    UnclosedMacro(String),
    #[error("expansion of macro `{0}` is nested too deep (is it recursive?)")]
    MacroExpansionTooDeep(String),
    #[error("name `{name}` is already used by {used_by}")]
    NameCollision { name: String, used_by: &'static str },
    #[error("malformed function signature: {0}")]
    MalformedSignature(&'static str),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("`void` is not allowed as an argument type")]
    VoidArgument,
    #[error("duplicate modifier `{0}`")]
    DuplicateModifier(Keyword),
    #[error("function can't be both inline and extern")]
    InlineExtern,
    #[error("inline functions have no symbol and can't be global")]
    GlobalInline,
    #[error("expected `func` after modifiers")]
    ExpectedFunc,
    #[error("functions can't be nested")]
    NestedFunction,
    #[error("unclosed function `{0}`")]
    UnclosedFunction(String),
    #[error("function `{0}` has an empty body")]
    EmptyFunction(String),
    #[error("malformed memory declaration: {0}")]
    MalformedMemory(&'static str),
    #[error("entry point `main` must not take or return values")]
    EntryPointHasContract,
    #[error("entry point `main` can't be inline or extern")]
    EntryPointModifiers,
    #[error("top-level operators are not allowed when `main` is defined")]
    TopLevelOperatorsWithEntryPoint,
    #[error("the entry point can't be called")]
    CallToEntryPoint,
}

/// A token waiting to be parsed.
struct Pending {
    token: Token,
    /// How many macro expansions produced this token.
    expansion_depth: u32,
}

struct Parser {
    /// Remaining input, reversed so that the next token is at the end.
    tokens: Vec<Pending>,
    /// Indices of the operators that opened the currently unclosed blocks.
    context_stack: Vec<usize>,
    /// Operators of the body currently being parsed.
    operators: Vec<Operator>,
    functions: IndexMap<String, Function>,
    macros: HashMap<String, Macro>,
    memories: IndexMap<String, usize>,
    in_function: bool,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Parser {
        tokens.reverse();
        Parser {
            tokens: tokens
                .into_iter()
                .map(|token| Pending {
                    token,
                    expansion_depth: 0,
                })
                .collect(),
            context_stack: Vec::with_capacity(16),
            operators: Vec::with_capacity(256),
            functions: IndexMap::new(),
            macros: HashMap::new(),
            memories: IndexMap::new(),
            in_function: false,
        }
    }

    fn parse_top_level(&mut self) -> Result<()> {
        while let Some(pending) = self.next() {
            self.parse_token(pending)?;
        }
        self.ensure_blocks_closed()
    }

    fn parse_token(&mut self, pending: Pending) -> Result<()> {
        let Pending {
            token,
            expansion_depth,
        } = pending;
        match &token.kind {
            TokenKind::Integer(int) => self.push(OperatorKind::PushInteger(*int), token),
            TokenKind::Character(c) => self.push(OperatorKind::PushInteger(i64::from(u32::from(*c))), token),
            TokenKind::String(string) => self.push(OperatorKind::PushString(string.clone()), token),
            TokenKind::Float(_) => return Err(token.location.wrap(Error::UnsupportedFloat)),
            TokenKind::Word(word) => {
                let word = word.clone();
                self.parse_word(&word, token, expansion_depth)?;
            }
            TokenKind::Keyword(keyword) => match keyword {
                Keyword::If => self.open_block(OperatorKind::If { target: 0 }, token),
                Keyword::While => self.open_block(OperatorKind::While { exit: 0 }, token),
                Keyword::Do => self.parse_do(token)?,
                Keyword::Else => self.parse_else(token)?,
                Keyword::End => self.parse_end(token)?,
                Keyword::Macro => self.parse_macro(token)?,
                Keyword::Memory => self.parse_memory(token)?,
                Keyword::Func | Keyword::Inline | Keyword::Extern | Keyword::Global => {
                    self.parse_function(token)?;
                }
            },
        }
        Ok(())
    }

    fn parse_word(&mut self, word: &str, token: Token, expansion_depth: u32) -> Result<()> {
        if let Some(mac) = self.macros.get(word) {
            let depth = expansion_depth + 1;
            if depth > MAX_MACRO_EXPANSION_DEPTH {
                return Err(token.location.wrap(Error::MacroExpansionTooDeep(word.to_owned())));
            }
            log::trace!("expanding macro `{word}` at {}", token.location);
            // Re-inject the body so that the first body token is parsed next.
            let expansion = mac.inner_tokens.iter().rev().map(|token| Pending {
                token: token.clone(),
                expansion_depth: depth,
            });
            self.tokens.extend(expansion);
            return Ok(());
        }

        let kind = if let Some(intrinsic) = Intrinsic::lookup(word) {
            OperatorKind::Intrinsic(intrinsic)
        } else if self.memories.contains_key(word) {
            OperatorKind::PushMemoryPointer(word.to_owned())
        } else if self.functions.contains_key(word) {
            if word == ENTRY_POINT {
                return Err(token.location.wrap(Error::CallToEntryPoint));
            }
            OperatorKind::Call(word.to_owned())
        } else {
            return Err(token.location.wrap(Error::UnknownWord(word.to_owned())));
        };
        self.push(kind, token);
        Ok(())
    }

    fn parse_do(&mut self, token: Token) -> Result<()> {
        let Some(while_index) = self.context_stack.pop() else {
            return Err(token.location.wrap(Error::DoWithoutWhile));
        };
        if !matches!(self.operators[while_index].kind, OperatorKind::While { .. }) {
            return Err(token.location.wrap(Error::DoWithoutWhile));
        }
        self.open_block(OperatorKind::Do { while_index }, token);
        Ok(())
    }

    fn parse_else(&mut self, token: Token) -> Result<()> {
        let Some(if_index) = self.context_stack.pop() else {
            return Err(token.location.wrap(Error::ElseWithoutIf));
        };
        let else_index = self.operators.len();
        match &mut self.operators[if_index].kind {
            // A false condition jumps into the else body.
            OperatorKind::If { target } => *target = else_index + 1,
            other => {
                let error = Error::ElseAfterNonIf(other.name());
                return Err(token.location.wrap(error));
            }
        }
        self.open_block(OperatorKind::Else { target: 0 }, token);
        Ok(())
    }

    fn parse_end(&mut self, token: Token) -> Result<()> {
        let Some(opener) = self.context_stack.pop() else {
            return Err(token.location.wrap(Error::EndWithoutContext));
        };
        let end_index = self.operators.len();
        let back_edge = match self.operators[opener].kind {
            OperatorKind::Do { while_index } => Some(while_index),
            OperatorKind::While { .. } => return Err(token.location.wrap(Error::EndAfterWhile)),
            _ => None,
        };
        // Loops are left through their `while`, everything else through the
        // block opener itself.
        match &mut self.operators[back_edge.unwrap_or(opener)].kind {
            OperatorKind::If { target }
            | OperatorKind::Else { target }
            | OperatorKind::While { exit: target } => *target = end_index + 1,
            _ => unreachable!("only block openers are in the context stack"),
        }
        self.push(OperatorKind::End { back_edge }, token);
        Ok(())
    }

    fn parse_macro(&mut self, macro_token: Token) -> Result<()> {
        let Some(Pending { token: name_token, .. }) = self.next() else {
            return Err(macro_token.location.wrap(Error::MacroWithoutName));
        };
        let name = match &name_token.kind {
            TokenKind::Word(name) => name.clone(),
            TokenKind::Keyword(keyword) => {
                return Err(name_token.location.wrap(Error::MacroNameIsKeyword(*keyword)));
            }
            _ => return Err(name_token.location.wrap(Error::MacroWithoutName)),
        };
        if let Some(previous) = self.macros.get(&name) {
            let error = Error::MacroRedefinition {
                name,
                previous: previous.location.clone(),
            };
            return Err(name_token.location.wrap(error));
        }
        self.check_name_available(&name, &name_token.location)?;

        // Blocks inside the macro body need their own `end`, so keep count of
        // them to find the one that closes the macro.
        let mut depth = 0usize;
        let mut inner_tokens = Vec::new();
        loop {
            let Some(Pending { token, .. }) = self.next() else {
                return Err(macro_token.location.wrap(Error::UnclosedMacro(name)));
            };
            match token.kind {
                TokenKind::Keyword(Keyword::If | Keyword::Do | Keyword::Macro) => depth += 1,
                TokenKind::Keyword(Keyword::End) if depth == 0 => break,
                TokenKind::Keyword(Keyword::End) => depth -= 1,
                _ => {}
            }
            inner_tokens.push(token);
        }

        log::debug!("defined macro `{name}` with {} tokens", inner_tokens.len());
        let mac = Macro {
            name: name.clone(),
            location: name_token.location,
            inner_tokens,
        };
        self.macros.insert(name, mac);
        Ok(())
    }

    fn parse_memory(&mut self, memory_token: Token) -> Result<()> {
        let Some(Pending { token: name_token, .. }) = self.next() else {
            return Err(memory_token.location.wrap(Error::MalformedMemory("missing name")));
        };
        let Some(name) = name_token.as_word().map(str::to_owned) else {
            return Err(name_token.location.wrap(Error::MalformedMemory("expected a name")));
        };
        self.check_name_available(&name, &name_token.location)?;

        let Some(Pending { token: size_token, .. }) = self.next() else {
            return Err(memory_token.location.wrap(Error::MalformedMemory("missing size")));
        };
        let size = match size_token.kind {
            TokenKind::Integer(size) if size > 0 => usize::try_from(size)
                .map_err(|_| size_token.location.wrap(Error::MalformedMemory("size too large")))?,
            _ => {
                let error = Error::MalformedMemory("size must be a positive integer");
                return Err(size_token.location.wrap(error));
            }
        };
        self.memories.insert(name, size);
        Ok(())
    }

    fn parse_function(&mut self, first: Token) -> Result<()> {
        let start_location = first.location.clone();
        let mut is_inline = false;
        let mut is_external = false;
        let mut is_global_symbol = false;

        let mut current = first;
        loop {
            let TokenKind::Keyword(keyword) = current.kind else {
                return Err(current.location.wrap(Error::ExpectedFunc));
            };
            let flag = match keyword {
                Keyword::Func => break,
                Keyword::Inline => &mut is_inline,
                Keyword::Extern => &mut is_external,
                Keyword::Global => &mut is_global_symbol,
                _ => return Err(current.location.wrap(Error::ExpectedFunc)),
            };
            if *flag {
                return Err(current.location.wrap(Error::DuplicateModifier(keyword)));
            }
            *flag = true;
            let Some(Pending { token, .. }) = self.next() else {
                return Err(current.location.wrap(Error::ExpectedFunc));
            };
            current = token;
        }

        if self.in_function {
            return Err(start_location.wrap(Error::NestedFunction));
        }
        if is_inline && is_external {
            return Err(start_location.wrap(Error::InlineExtern));
        }
        if is_inline && is_global_symbol {
            return Err(start_location.wrap(Error::GlobalInline));
        }

        let (name, name_location, type_contract_in, type_contract_out) =
            self.parse_signature(&current)?;
        self.check_name_available(&name, &name_location)?;

        let mut function = Function {
            name: name.clone(),
            location: name_location,
            source: Vec::new(),
            type_contract_in,
            type_contract_out,
            is_inline,
            is_external,
            is_global_symbol,
        };

        if is_external {
            log::debug!("declared extern function `{name}`");
            self.functions.insert(name, function);
            return Ok(());
        }

        // Registered before its body is parsed so that it can call itself.
        self.functions.insert(name.clone(), function.clone());
        function.source = self.parse_function_body(&name, &start_location)?;
        if function.source.is_empty() {
            return Err(start_location.wrap(Error::EmptyFunction(name)));
        }
        log::debug!(
            "parsed function `{name}` with {} operators",
            function.source.len()
        );
        self.functions.insert(name, function);
        Ok(())
    }

    /// Parses operators until the `end` closing the function body.
    fn parse_function_body(&mut self, name: &str, location: &Location) -> Result<Vec<Operator>> {
        let outer_operators = std::mem::take(&mut self.operators);
        let outer_context = std::mem::take(&mut self.context_stack);
        self.in_function = true;

        loop {
            let Some(pending) = self.next() else {
                self.ensure_blocks_closed()?;
                let error = Error::UnclosedFunction(name.to_owned());
                return Err(location.clone().wrap(error));
            };
            if pending.token.is_keyword(Keyword::End) && self.context_stack.is_empty() {
                break;
            }
            self.parse_token(pending)?;
        }

        self.in_function = false;
        self.context_stack = outer_context;
        Ok(std::mem::replace(&mut self.operators, outer_operators))
    }

    /// Parses either `RET name[args]` or `name[args] RET`, where `current` is
    /// the `func` keyword.
    fn parse_signature(
        &mut self,
        current: &Token,
    ) -> Result<(String, Location, Vec<GofraType>, Vec<GofraType>)> {
        let missing = |location: &Location| {
            location
                .clone()
                .wrap(Error::MalformedSignature("expected return type and name"))
        };

        let Some(Pending { token: first, .. }) = self.next() else {
            return Err(missing(&current.location));
        };
        let Some(Pending { token: second, .. }) = self.next() else {
            return Err(missing(&first.location));
        };
        let (return_token, signature_token) = match first.as_word() {
            Some(word) if word.contains('[') => (second, first),
            _ => (first, second),
        };

        let Some(return_type) = return_token.as_word() else {
            let error = Error::MalformedSignature("expected return type");
            return Err(return_token.location.wrap(error));
        };
        let type_contract_out = match GofraType::from_name(return_type) {
            Some(GofraType::Void) => Vec::new(),
            Some(ty) => vec![ty],
            None => {
                let error = Error::UnknownType(return_type.to_owned());
                return Err(return_token.location.wrap(error));
            }
        };

        let location = signature_token.location.clone();
        let Some(signature) = signature_token.as_word() else {
            let error = Error::MalformedSignature("expected `name[arguments]`");
            return Err(location.wrap(error));
        };
        let Some((name, arguments)) = signature
            .strip_suffix(']')
            .and_then(|s| s.split_once('['))
        else {
            let error = Error::MalformedSignature("expected `name[arguments]`");
            return Err(location.wrap(error));
        };
        if name.is_empty() {
            return Err(location.wrap(Error::MalformedSignature("missing name")));
        }

        let mut type_contract_in = Vec::new();
        for argument in arguments.split(',').map(str::trim) {
            if argument.is_empty() {
                continue;
            }
            match GofraType::from_name(argument) {
                Some(GofraType::Void) => return Err(location.wrap(Error::VoidArgument)),
                Some(ty) => type_contract_in.push(ty),
                None => return Err(location.wrap(Error::UnknownType(argument.to_owned()))),
            }
        }

        Ok((name.to_owned(), location, type_contract_in, type_contract_out))
    }

    fn into_program(mut self) -> Result<Program> {
        let operators = match self.functions.shift_remove(ENTRY_POINT) {
            Some(main) => {
                if main.is_inline || main.is_external {
                    return Err(main.location.wrap(Error::EntryPointModifiers));
                }
                if !main.type_contract_in.is_empty() || !main.type_contract_out.is_empty() {
                    return Err(main.location.wrap(Error::EntryPointHasContract));
                }
                if let Some(op) = self.operators.first() {
                    let error = Error::TopLevelOperatorsWithEntryPoint;
                    return Err(op.location().clone().wrap(error));
                }
                main.source
            }
            None => self.operators,
        };

        Ok(Program {
            operators,
            functions: self.functions,
            memories: self.memories,
        })
    }
}

/// Utility functions.
impl Parser {
    /// Pops the next token off the input.
    fn next(&mut self) -> Option<Pending> {
        self.tokens.pop()
    }

    fn push(&mut self, kind: OperatorKind, token: Token) {
        self.operators.push(Operator::new(kind, token));
    }

    /// Pushes an operator whose jump target is resolved later and records it
    /// as an open block.
    fn open_block(&mut self, kind: OperatorKind, token: Token) {
        self.context_stack.push(self.operators.len());
        self.push(kind, token);
    }

    fn ensure_blocks_closed(&self) -> Result<()> {
        match self.context_stack.last() {
            Some(&index) => {
                let op = &self.operators[index];
                let error = Error::UnclosedBlock(op.kind.name());
                Err(op.location().clone().wrap(error))
            }
            None => Ok(()),
        }
    }

    /// Functions, macros, memories and intrinsics share one namespace.
    fn check_name_available(&self, name: &str, location: &Location) -> Result<()> {
        let used_by = if KEYWORDS.contains_key(name) {
            "a keyword"
        } else if Intrinsic::lookup(name).is_some() {
            "an intrinsic"
        } else if self.macros.contains_key(name) {
            "a macro"
        } else if self.functions.contains_key(name) {
            "a function"
        } else if self.memories.contains_key(name) {
            "a memory"
        } else {
            return Ok(());
        };
        let error = Error::NameCollision {
            name: name.to_owned(),
            used_by,
        };
        Err(location.clone().wrap(error))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ir::verify_jumps, util::test_utils::pipeline_tests};

    fn parse_ok(src: &str) -> Program {
        match parse_program(src, "test.gof") {
            Ok(program) => program,
            Err(error) => panic!("failed to parse: {error}"),
        }
    }

    fn kinds(ops: &[Operator]) -> Vec<OperatorKind> {
        ops.iter().map(|op| op.kind.clone()).collect()
    }

    #[test]
    fn test_if_else_jump_targets() {
        let program = parse_ok("1 if 2 else 3 end drop");
        assert_eq!(
            kinds(&program.operators),
            vec![
                OperatorKind::PushInteger(1),
                OperatorKind::If { target: 4 },
                OperatorKind::PushInteger(2),
                OperatorKind::Else { target: 6 },
                OperatorKind::PushInteger(3),
                OperatorKind::End { back_edge: None },
                OperatorKind::Intrinsic(Intrinsic::Drop),
            ]
        );
        verify_jumps(&program.operators).unwrap();
    }

    #[test]
    fn test_while_jump_targets() {
        let program = parse_ok("5 while copy 0 > do 1 - end drop");
        assert_eq!(
            kinds(&program.operators),
            vec![
                OperatorKind::PushInteger(5),
                OperatorKind::While { exit: 9 },
                OperatorKind::Intrinsic(Intrinsic::Copy),
                OperatorKind::PushInteger(0),
                OperatorKind::Intrinsic(Intrinsic::Greater),
                OperatorKind::Do { while_index: 1 },
                OperatorKind::PushInteger(1),
                OperatorKind::Intrinsic(Intrinsic::Minus),
                OperatorKind::End { back_edge: Some(1) },
                OperatorKind::Intrinsic(Intrinsic::Drop),
            ]
        );
        verify_jumps(&program.operators).unwrap();
    }

    #[test]
    fn test_nested_blocks_are_well_formed() {
        let program = parse_ok(
            "
            10 while copy 0 > do
                copy 2 % 0 == if
                    1 if 2 drop else 3 drop end
                else
                    4 while copy 0 != do 1 - end drop
                end
                1 -
            end
            drop
            ",
        );
        verify_jumps(&program.operators).unwrap();
    }

    #[test]
    fn test_macro_is_textual_substitution() {
        let expanded = parse_ok("macro sq dup * end 3 sq");
        let written = parse_ok("3 dup *");
        assert_eq!(kinds(&expanded.operators), kinds(&written.operators));
    }

    #[test]
    fn test_macro_with_blocks_in_body() {
        let expanded = parse_ok("macro abs copy 0 < if 0 swap - end end -3 abs drop");
        let written = parse_ok("-3 copy 0 < if 0 swap - end drop");
        assert_eq!(kinds(&expanded.operators), kinds(&written.operators));
        verify_jumps(&expanded.operators).unwrap();
    }

    #[test]
    fn test_functions() {
        let program = parse_ok(
            "
            extern func int puts[ptr]
            inline func int square[int] copy * end
            global func add[int, int] int + end
            func void main[] 3 square 4 add drop end
            ",
        );
        assert_eq!(
            kinds(&program.operators),
            vec![
                OperatorKind::PushInteger(3),
                OperatorKind::Call("square".into()),
                OperatorKind::PushInteger(4),
                OperatorKind::Call("add".into()),
                OperatorKind::Intrinsic(Intrinsic::Drop),
            ]
        );
        let names: Vec<_> = program.functions.keys().map(String::as_str).collect();
        assert_eq!(names, ["puts", "square", "add"]);

        let puts = &program.functions["puts"];
        assert!(puts.is_external && !puts.is_inline);
        assert!(puts.source.is_empty());
        assert_eq!(puts.type_contract_in, [GofraType::Pointer]);
        assert_eq!(puts.type_contract_out, [GofraType::Integer]);

        let square = &program.functions["square"];
        assert!(square.is_inline && !square.is_external);

        let add = &program.functions["add"];
        assert!(add.is_global_symbol);
        assert_eq!(add.type_contract_in, [GofraType::Integer, GofraType::Integer]);
    }

    #[test]
    fn test_recursive_function() {
        let program = parse_ok("func void loop[int] copy 0 > if 1 - loop else drop end end");
        let body = &program.functions["loop"].source;
        assert!(body.iter().any(|op| op.kind == OperatorKind::Call("loop".into())));
        verify_jumps(body).unwrap();
    }

    #[test]
    fn test_memory() {
        let program = parse_ok("memory buf 16 buf 1 !<");
        assert_eq!(program.memories.get("buf"), Some(&16));
        assert_eq!(
            program.operators[0].kind,
            OperatorKind::PushMemoryPointer("buf".into())
        );
    }

    #[test]
    fn test_character_literal_pushes_code_point() {
        let program = parse_ok("'A' drop");
        assert_eq!(program.operators[0].kind, OperatorKind::PushInteger(65));
    }

    pipeline_tests!(
        use parser;

        fn test_dump_if_else() {
            let source = "1 if 2 else 3 end drop";
            let ir_ok = "
                main
                  0: push-integer 1
                  1: if -> 4
                    2: push-integer 2
                  3: else -> 6
                    4: push-integer 3
                  5: end
                  6: intrinsic drop
            ";
        }

        fn test_dump_loop() {
            let source = "5 while copy 0 > do 1 - end drop";
            let ir_ok = "
                main
                  0: push-integer 5
                  1: while -> 9
                    2: intrinsic copy
                    3: push-integer 0
                    4: intrinsic >
                  5: do -> 1
                    6: push-integer 1
                    7: intrinsic -
                  8: end -> 1
                  9: intrinsic drop
            ";
        }

        fn test_dump_functions_and_memories() {
            let source = r#"
                memory buf 8
                extern func int write[int, ptr, int]
                func void main[] 1 "hi" write drop buf drop end
            "#;
            let ir_ok = r#"
                memory buf 8
                extern func write[int, ptr, int] -> int
                main
                  0: push-integer 1
                  1: push-string "hi"
                  2: call write
                  3: intrinsic drop
                  4: push-memory-pointer buf
                  5: intrinsic drop
            "#;
        }

        fn test_error_empty_input() {
            let source = "  // only a comment";
            let expected_errors = &["1:1: empty input"];
        }

        fn test_error_unknown_word() {
            let source = "1 frobnicate";
            let expected_errors = &["1:3: unknown word `frobnicate`"];
        }

        fn test_error_do_without_while() {
            let source = "1 do end";
            let expected_errors = &["1:3: `do` without preceding `while`"];
        }

        fn test_error_do_after_if() {
            let source = "1 if do end";
            let expected_errors = &["1:6: `do` without preceding `while`"];
        }

        fn test_error_else_without_if() {
            let source = "else";
            let expected_errors = &["1:1: `else` without preceding `if`"];
        }

        fn test_error_else_after_non_if() {
            let source = "while 1 do else end";
            let expected_errors = &["1:12: `else` after `do` block, expected `if`"];
        }

        fn test_error_unclosed_block() {
            let source = "1 if\n2 drop";
            let expected_errors = &["1:3: unclosed `if` block"];
        }

        fn test_error_end_without_context() {
            let source = "1 drop end";
            let expected_errors = &["1:8: `end` without an open block"];
        }

        fn test_error_end_after_while() {
            let source = "while end";
            let expected_errors = &["1:7: `end` right after `while`, expected `do` first"];
        }

        fn test_error_macro_redefinition() {
            let source = "macro a 1 end\nmacro a 2 end";
            let expected_errors = &["2:7: macro `a` is already defined at test.gof:1:7"];
        }

        fn test_error_macro_named_like_keyword() {
            let source = "macro if 1 end";
            let expected_errors = &["1:7: macro name `if` is a keyword"];
        }

        fn test_error_macro_named_like_intrinsic() {
            let source = "macro drop 1 end";
            let expected_errors = &["1:7: name `drop` is already used by an intrinsic"];
        }

        fn test_error_unclosed_macro() {
            let source = "macro m 1 if 2 end";
            let expected_errors = &["1:1: unclosed macro `m`"];
        }

        fn test_error_recursive_macro() {
            let source = "macro m m end m";
            let expected_errors = &["1:9: expansion of macro `m` is nested too deep (is it recursive?)"];
        }

        fn test_error_unknown_argument_type() {
            let source = "func void f[int, str] drop drop end";
            let expected_errors = &["1:11: unknown type `str`"];
        }

        fn test_error_unknown_return_type() {
            let source = "func string f[] 1 end";
            let expected_errors = &["1:6: unknown type `string`"];
        }

        fn test_error_signature_without_brackets() {
            let source = "func void f 1 drop end";
            let expected_errors = &["1:11: malformed function signature: expected `name[arguments]`"];
        }

        fn test_error_duplicate_modifier() {
            let source = "inline inline func void f[] 1 drop end";
            let expected_errors = &["1:8: duplicate modifier `inline`"];
        }

        fn test_error_inline_extern() {
            let source = "inline extern func void f[]";
            let expected_errors = &["1:1: function can't be both inline and extern"];
        }

        fn test_error_global_inline() {
            let source = "global inline func void f[] 1 drop end";
            let expected_errors = &["1:1: inline functions have no symbol and can't be global"];
        }

        fn test_error_modifier_without_func() {
            let source = "inline 1";
            let expected_errors = &["1:8: expected `func` after modifiers"];
        }

        fn test_error_nested_function() {
            let source = "func void f[] func void g[] end end";
            let expected_errors = &["1:15: functions can't be nested"];
        }

        fn test_error_unclosed_function() {
            let source = "func void f[] 1 drop";
            let expected_errors = &["1:1: unclosed function `f`"];
        }

        fn test_error_empty_function() {
            let source = "func void f[] end";
            let expected_errors = &["1:1: function `f` has an empty body"];
        }

        fn test_error_entry_point_contract() {
            let source = "func int main[] 0 end";
            let expected_errors = &["1:10: entry point `main` must not take or return values"];
        }

        fn test_error_top_level_with_entry_point() {
            let source = "1 drop func void main[] 2 drop end";
            let expected_errors = &["1:1: top-level operators are not allowed when `main` is defined"];
        }

        fn test_error_float() {
            let source = "1.5 drop";
            let expected_errors = &["1:1: float literals are not supported"];
        }

        fn test_error_memory_size() {
            let source = "memory buf 0";
            let expected_errors = &["1:12: malformed memory declaration: size must be a positive integer"];
        }

        fn test_error_lexer() {
            let source = "\"unclosed";
            let expected_errors = &["1:1: unclosed string literal"];
        }
    );
}
