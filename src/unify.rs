//! Structural pattern matcher: `unify(pattern, value)` produces an `Env`
//! of bindings, or fails with `PolyError::Match`.

use crate::env::Env;
use crate::error::{PolyError, Result};
use crate::expr::Expr;

/// Rules applied in order of specificity, per the unifier design:
/// `Blank` matches anything and binds nothing; `Var` matches anything and
/// binds itself; `Cons` recurses structurally; `Nil` matches only `Nil`;
/// atoms and `Quote` match by equality; everything else falls through to
/// a final equality check.
pub fn unify(pattern: &Expr, value: &Expr) -> Result<Env> {
    match pattern {
        Expr::Blank => Ok(Env::new()),
        Expr::Var(name) => {
            let mut env = Env::new();
            env.set(name.clone(), value.clone());
            Ok(env)
        }
        Expr::Cons(ph, pt) => {
            if let Expr::Cons(vh, vt) = value {
                let head_env = unify(ph, vh)?;
                let tail_env = unify(pt, vt)?;
                Ok(head_env.merge(&tail_env))
            } else {
                Err(PolyError::match_err(pattern.clone(), value.clone()))
            }
        }
        Expr::Nil => {
            if matches!(value, Expr::Nil) {
                Ok(Env::new())
            } else {
                Err(PolyError::match_err(pattern.clone(), value.clone()))
            }
        }
        Expr::Int(_) | Expr::Float(_) | Expr::Str(_) | Expr::Symbol(_) | Expr::Quote(_) => {
            if pattern == value {
                Ok(Env::new())
            } else {
                Err(PolyError::match_err(pattern.clone(), value.clone()))
            }
        }
        _ => {
            if pattern == value {
                Ok(Env::new())
            } else {
                Err(PolyError::match_err(pattern.clone(), value.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn blank_matches_anything() {
        let env = unify(&Expr::Blank, &Expr::Int(BigInt::from(42))).unwrap();
        assert!(env.names().is_empty());
    }

    #[test]
    fn var_binds() {
        let env = unify(&Expr::var("x"), &Expr::Int(BigInt::from(5))).unwrap();
        assert_eq!(env.peek("x").unwrap(), Expr::Int(BigInt::from(5)));
    }

    #[test]
    fn cons_unifies_structurally() {
        let pattern = Expr::cons(Expr::var("a"), Expr::cons(Expr::var("b"), Expr::Nil));
        let value = Expr::cons(
            Expr::Int(BigInt::from(1)),
            Expr::cons(Expr::Int(BigInt::from(2)), Expr::Nil),
        );
        let mut env = unify(&pattern, &value).unwrap();
        assert_eq!(env.get("a").unwrap(), Expr::Int(BigInt::from(1)));
        assert_eq!(env.get("b").unwrap(), Expr::Int(BigInt::from(2)));
    }

    #[test]
    fn nil_matches_only_nil() {
        assert!(unify(&Expr::Nil, &Expr::Nil).is_ok());
        assert!(unify(&Expr::Nil, &Expr::Int(BigInt::from(0))).is_err());
    }

    #[test]
    fn atom_mismatch_fails() {
        assert!(unify(&Expr::symbol("yes"), &Expr::symbol("no")).is_err());
    }

    #[test]
    fn substituting_bindings_reconstructs_value() {
        let pattern = Expr::cons(Expr::var("a"), Expr::var("b"));
        let value = Expr::cons(Expr::Int(BigInt::from(1)), Expr::Int(BigInt::from(2)));
        let mut env = unify(&pattern, &value).unwrap();
        let rebuilt = Expr::cons(env.get("a").unwrap(), env.get("b").unwrap());
        assert_eq!(rebuilt, value);
    }
}
