use crate::{codegen, parser, token::Spanned, type_checker};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Any failure of the compilation pipeline. Every stage halts on its first
/// error, so there is at most one of these per compilation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parser(#[from] Spanned<parser::Error>),

    #[error(transparent)]
    TypeChecker(#[from] Spanned<type_checker::Error>),

    #[error(transparent)]
    Codegen(#[from] codegen::Error),
}
