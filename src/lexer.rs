use std::{iter::Peekable, num::IntErrorKind, rc::Rc};

use crate::token::{Location, Spanned, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Lexes the provided string, producing the tokens into the provided buffer.
pub fn lex(src: &str, file: &str, tokens: &mut Vec<Token>) -> Result<()> {
    Lexer::new(src, Rc::from(file), tokens).lex()
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str, file: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, file, &mut tokens)?;
    Ok(tokens)
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unclosed string literal")]
    UnclosedString,
    #[error("unclosed character literal")]
    UnclosedCharacter,
    #[error("character literal must contain exactly one character")]
    InvalidCharacterLength,
    #[error("unknown escape sequence `\\{0}`")]
    UnknownEscape(char),
    #[error("integer literal `{0}` is out of bounds")]
    IntegerOutOfBounds(Box<str>),
    #[error("NUL character in source")]
    NulCharacter,
}

/// The Gofra lexer
struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<std::str::CharIndices<'src>>,
    file: Rc<str>,
    line: u32,
    column: u32,
    /// Byte offset and location of the token being scanned.
    current_lo: usize,
    current_location: Location,
    tokens: &'tok mut Vec<Token>,
}

impl<'src> Lexer<'src, '_> {
    /// Scans the source string until the input is exhausted.
    ///
    /// Tokens are written into the provided tokens buffer.
    fn lex(mut self) -> Result<()> {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        // The scanner uses NUL as its end of input marker.
        if let Some(offset) = self.src.find('\0') {
            return Err(self.nul_error(offset));
        }
        loop {
            self.skip_trivia();
            if self.peek() == '\0' {
                return Ok(());
            }
            let kind = self.scan_token_kind()?;
            self.produce(kind);
        }
    }

    fn scan_token_kind(&mut self) -> Result<TokenKind> {
        match self.mark_advance() {
            '"' => self.string(),
            '\'' => self.character(),
            _ => self.word_or_literal(),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                c if c.is_whitespace() => {
                    self.advance();
                }
                '/' if self.peek_second() == '/' => {
                    while !matches!(self.peek(), '\n' | '\0') {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn string(&mut self) -> Result<TokenKind> {
        let mut buf = String::new();
        loop {
            match self.advance() {
                '\0' | '\n' => return Err(self.error(Error::UnclosedString)),
                '"' => return Ok(TokenKind::String(buf)),
                '\\' => buf.push(self.escape()?),
                c => buf.push(c),
            }
        }
    }

    fn character(&mut self) -> Result<TokenKind> {
        let mut chars = Vec::with_capacity(1);
        loop {
            match self.advance() {
                '\0' | '\n' => return Err(self.error(Error::UnclosedCharacter)),
                '\'' => break,
                '\\' => chars.push(self.escape()?),
                c => chars.push(c),
            }
        }
        match chars.as_slice() {
            &[c] => Ok(TokenKind::Character(c)),
            _ => Err(self.error(Error::InvalidCharacterLength)),
        }
    }

    /// Resolves the escape sequence whose backslash was just consumed.
    fn escape(&mut self) -> Result<char> {
        let escaped = match self.advance() {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            other => return Err(self.error(Error::UnknownEscape(other))),
        };
        Ok(escaped)
    }

    fn word_or_literal(&mut self) -> Result<TokenKind> {
        let mut bracket_depth = usize::from(self.substr() == "[");
        loop {
            let next = self.peek();
            if next == '\0' || (next.is_whitespace() && bracket_depth == 0) {
                break;
            }
            match next {
                '[' => bracket_depth += 1,
                ']' => bracket_depth = bracket_depth.saturating_sub(1),
                _ => (),
            }
            self.advance();
        }

        let text = self.substr();
        if let Some(&keyword) = KEYWORDS.get(text) {
            return Ok(TokenKind::Keyword(keyword));
        }
        if looks_numeric(text) {
            if text.contains('.') {
                if let Ok(float) = text.parse() {
                    return Ok(TokenKind::Float(float));
                }
            } else {
                match parse_integer(text) {
                    Ok(int) => return Ok(TokenKind::Integer(int)),
                    Err(IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                        return Err(self.error(Error::IntegerOutOfBounds(text.into())));
                    }
                    // Something like `2nd`, which is a perfectly valid word.
                    Err(_) => (),
                }
            }
        }
        Ok(TokenKind::Word(text.to_owned()))
    }
}

impl<'src> Lexer<'src, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'tok>(src: &'src str, file: Rc<str>, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.char_indices().peekable(),
            current_location: Location::new(file.clone(), 1, 1),
            file,
            line: 1,
            column: 1,
            current_lo: 0,
            tokens,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor();
        self.current_location = Location::new(self.file.clone(), self.line, self.column);
        self.advance()
    }

    /// Returns the next char and advances the iterator.
    fn advance(&mut self) -> char {
        let Some((_, c)) = self.iter.next() else {
            return '\0';
        };
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    /// Returns the next char without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().map_or('\0', |&(_, c)| c)
    }

    fn peek_second(&self) -> char {
        let mut iter = self.iter.clone();
        iter.next();
        iter.next().map_or('\0', |(_, c)| c)
    }

    fn cursor(&mut self) -> usize {
        self.iter.peek().map_or(self.src.len(), |&(i, _)| i)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&mut self) -> &'src str {
        let hi = self.cursor();
        &self.src[self.current_lo..hi]
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        let text = self.substr().to_owned();
        let location = self.current_location.clone();
        self.tokens.push(Token::new(kind, text, location));
    }

    fn error(&self, error: Error) -> Spanned<Error> {
        self.current_location.clone().wrap(error)
    }

    fn nul_error(&self, offset: usize) -> Spanned<Error> {
        let before = &self.src[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        let location = Location::new(
            self.file.clone(),
            u32::try_from(line).unwrap_or(u32::MAX),
            u32::try_from(column).unwrap_or(u32::MAX),
        );
        location.wrap(Error::NulCharacter)
    }
}

fn looks_numeric(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    digits.starts_with(|c: char| c.is_ascii_digit())
}

fn parse_integer(text: &str) -> Result<i64, IntErrorKind> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (radix, digits) = if let Some(hex) = digits.strip_prefix("0x") {
        (16, hex)
    } else if let Some(bin) = digits.strip_prefix("0b") {
        (2, bin)
    } else {
        (10, digits)
    };
    // Parse the magnitude as unsigned so that `i64::MIN` is representable.
    let magnitude =
        u64::from_str_radix(&digits.replace('_', ""), radix).map_err(|e| e.kind().clone())?;
    if negative {
        0i64.checked_sub_unsigned(magnitude).ok_or(IntErrorKind::NegOverflow)
    } else {
        i64::try_from(magnitude).map_err(|_| IntErrorKind::PosOverflow)
    }
}
