//! `poly`: an interpreter for a small homoiconic expression language with
//! first-class operatives and pattern-unification binding.

pub mod env;
pub mod error;
pub mod eval;
pub mod expr;
pub mod node;
pub mod parser;
pub mod primitives;
pub mod repl;
pub mod server;
pub mod unify;

pub mod prelude {
    pub use crate::env::Env;
    pub use crate::error::{PolyError, Result};
    pub use crate::expr::Expr;
    pub use crate::node::Node;
    pub use crate::parser::read_expr;
}
