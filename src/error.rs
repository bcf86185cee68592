use thiserror::Error;

use crate::expr::Expr;

/// One variant per error kind in the language's error-handling design:
/// every fallible core operation returns `Result<T, PolyError>`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolyError {
    #[error("Undefined var {0}")]
    Undefined(String),

    #[error("Undefined ref {0}")]
    UndefinedRef(u64),

    #[error("Can't match {0} with {1}")]
    Match(Box<Expr>, Box<Expr>),

    #[error("Can't evaluate {0}")]
    CantEval(Box<Expr>),

    #[error("Can't apply {0}")]
    CantApply(Box<Expr>),

    #[error("Improper list {0}")]
    ImproperList(Box<Expr>),

    #[error("{0} must be of type {1}")]
    InvalidType(Box<Expr>, &'static str),

    #[error("Duplicate key {0}")]
    DuplicateKey(Box<Expr>),

    #[error("Can't read '{0}'")]
    Reader(String),

    #[error("Module couldn't be loaded: {0}")]
    Module(Box<PolyError>),
}

pub type Result<T> = std::result::Result<T, PolyError>;

impl PolyError {
    pub fn match_err(pattern: Expr, value: Expr) -> Self {
        PolyError::Match(Box::new(pattern), Box::new(value))
    }

    pub fn cant_eval(expr: Expr) -> Self {
        PolyError::CantEval(Box::new(expr))
    }

    pub fn cant_apply(expr: Expr) -> Self {
        PolyError::CantApply(Box::new(expr))
    }

    pub fn improper_list(expr: Expr) -> Self {
        PolyError::ImproperList(Box::new(expr))
    }

    pub fn invalid_type(expr: Expr, expected: &'static str) -> Self {
        PolyError::InvalidType(Box::new(expr), expected)
    }

    pub fn duplicate_key(key: Expr) -> Self {
        PolyError::DuplicateKey(Box::new(key))
    }
}
