use std::{fmt, rc::Rc};

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The token exactly as it appears in the source.
    pub text: Box<str>,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<Box<str>>, location: Location) -> Token {
        Token {
            kind,
            text: text.into(),
            location,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    pub fn as_word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(word) => Some(word),
            _ => None,
        }
    }
}

/// Source position of a token, used only for diagnostics.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: Rc<str>,
    /// 1-based.
    pub line: u32,
    /// 1-based.
    pub column: u32,
}

impl Location {
    pub fn new(file: Rc<str>, line: u32, column: u32) -> Location {
        Location { file, line, column }
    }

    /// A location for things the compiler synthesizes itself.
    pub fn builtin() -> Location {
        Location::new(Rc::from("<builtin>"), 0, 0)
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned {
            location: self,
            inner,
        }
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({self})")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Some value (usually an error) tagged with the location it refers to.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned<T> {
    pub location: Location,
    pub inner: T,
}

impl<T> fmt::Display for Spanned<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}:{}: {}", self.location.line, self.location.column, self.inner)
        } else {
            write!(f, "{}: {}", self.location, self.inner)
        }
    }
}

impl<T> std::error::Error for Spanned<T> where T: fmt::Debug + fmt::Display {}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    Float(f64),
    Character(char),
    /// Escape sequences are already resolved.
    String(String),
    Word(String),
    Keyword(Keyword),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Keyword {
    If,
    While,
    Do,
    Else,
    End,
    Macro,
    Func,
    Inline,
    Extern,
    Global,
    Memory,
}

impl Keyword {
    pub const fn name(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::While => "while",
            Keyword::Do => "do",
            Keyword::Else => "else",
            Keyword::End => "end",
            Keyword::Macro => "macro",
            Keyword::Func => "func",
            Keyword::Inline => "inline",
            Keyword::Extern => "extern",
            Keyword::Global => "global",
            Keyword::Memory => "memory",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub static KEYWORDS: phf::Map<&'static str, Keyword> = phf::phf_map! {
    "if" => Keyword::If,
    "while" => Keyword::While,
    "do" => Keyword::Do,
    "else" => Keyword::Else,
    "end" => Keyword::End,
    "macro" => Keyword::Macro,
    "func" => Keyword::Func,
    "inline" => Keyword::Inline,
    "extern" => Keyword::Extern,
    "global" => Keyword::Global,
    "memory" => Keyword::Memory,
};
