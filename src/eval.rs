//! The evaluator: dispatch on expression variant, and the callable
//! `apply` protocol that list-application delegates to.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::env::Env;
use crate::error::{PolyError, Result};
use crate::expr::Expr;
use crate::node::Node;
use crate::unify::unify;

/// `eval(expr, node, env) -> Expr`. Most variants self-evaluate; `Blank`
/// can never appear in evaluation position; `Var` looks up the dynamic
/// env; `Quote` returns its inner expression verbatim; `Cons` evaluates
/// its head and hands the *unevaluated* tail to the callee's `apply`.
pub fn eval(expr: &Expr, node: &Node, env: &Env) -> Result<Expr> {
    match expr {
        Expr::Blank => Err(PolyError::cant_eval(expr.clone())),
        Expr::Var(name) => env.peek(name),
        Expr::Quote(inner) => Ok((**inner).clone()),
        Expr::Cons(head, tail) => {
            let callee = eval(head, node, env)?;
            apply(&callee, node, env, tail)
        }
        Expr::Map(entries) => {
            let mut out = BTreeMap::new();
            for (k, v) in entries.iter() {
                let k1 = eval(k, node, env)?;
                let v1 = eval(v, node, env)?;
                out.insert(k1, v1);
            }
            Ok(Expr::Map(Rc::new(out)))
        }
        _ => Ok(expr.clone()),
    }
}

/// Walks a proper list, evaluating each element; fails with
/// `ImproperList` if the spine doesn't end in `Nil`.
pub fn eval_list(list: &Expr, node: &Node, env: &Env) -> Result<Expr> {
    let mut items = Vec::new();
    let mut cur = list;
    loop {
        match cur {
            Expr::Nil => return Ok(Expr::list(items, Expr::Nil)),
            Expr::Cons(head, tail) => {
                items.push(eval(head, node, env)?);
                cur = tail;
            }
            _ => return Err(PolyError::improper_list(list.clone())),
        }
    }
}

/// Every callable exposes `apply(node, env, unevaluated_args) -> Expr`.
/// Dispatched explicitly here rather than via dynamic trait dispatch, so
/// that the set of callable shapes stays a closed, exhaustively-matched
/// enum.
pub fn apply(callee: &Expr, node: &Node, env: &Env, args: &Expr) -> Result<Expr> {
    match callee {
        Expr::Operative(op) => {
            let pat_env = unify(&op.pat, args)?;
            let dyn_env_expr = Expr::Env(Rc::new(env.clone()));
            let epat_env = unify(&op.epat, &dyn_env_expr)?;
            let func_env = op.captured_env.merge(&pat_env).merge(&epat_env);
            eval(&op.body, node, &func_env)
        }
        Expr::Wrapped(inner) => {
            let evaluated_args = eval_list(args, node, env)?;
            apply(inner, node, env, &evaluated_args)
        }
        Expr::Prim(p) => (p.func)(node, env, args),
        Expr::Symbol(_) => {
            let evaluated_args = eval_list(args, node, env)?;
            Ok(Expr::cons(callee.clone(), evaluated_args))
        }
        other => Err(PolyError::cant_apply(other.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::OperativeData;
    use num_bigint::BigInt;

    fn node() -> Node {
        Node::new("test")
    }

    #[test]
    fn quote_returns_inner_unevaluated() {
        let n = node();
        let env = n.root_env();
        let inner = Expr::var("undefined-name");
        let quoted = Expr::Quote(Rc::new(inner.clone()));
        assert_eq!(eval(&quoted, &n, &env).unwrap(), inner);
    }

    #[test]
    fn atoms_self_evaluate() {
        let n = node();
        let env = n.root_env();
        for e in [
            Expr::Nil,
            Expr::Int(BigInt::from(3)),
            Expr::Float(1.5),
            Expr::string("hi"),
            Expr::symbol("tag"),
        ] {
            assert_eq!(eval(&e, &n, &env).unwrap(), e);
        }
    }

    #[test]
    fn blank_cannot_be_evaluated() {
        let n = node();
        let env = n.root_env();
        assert!(eval(&Expr::Blank, &n, &env).is_err());
    }

    #[test]
    fn var_lookup_fails_when_undefined() {
        let n = node();
        let env = n.root_env();
        assert!(eval(&Expr::var("nope"), &n, &env).is_err());
    }

    #[test]
    fn symbol_application_conses_itself_onto_evaluated_args() {
        let n = node();
        let mut env = n.root_env();
        env.set("x", Expr::Int(BigInt::from(9)));
        let call = Expr::cons(
            Expr::symbol("tag"),
            Expr::cons(Expr::var("x"), Expr::Nil),
        );
        let result = eval(&call, &n, &env).unwrap();
        let expected = Expr::cons(
            Expr::symbol("tag"),
            Expr::cons(Expr::Int(BigInt::from(9)), Expr::Nil),
        );
        assert_eq!(result, expected);
    }

    #[test]
    fn operative_receives_raw_args_and_captures_env() {
        let n = node();
        let mut captured = n.root_env();
        captured.set("captured-val", Expr::Int(BigInt::from(100)));
        let op = Expr::Operative(Rc::new(OperativeData {
            pat: Expr::var("raw"),
            epat: Expr::Blank,
            body: Expr::cons(Expr::symbol("got"), Expr::var("raw")),
            captured_env: captured,
        }));
        let call_env = n.root_env();
        // raw, unevaluated arg: (undefined-var) would fail if evaluated eagerly.
        let args = Expr::var("undefined-var");
        let result = apply(&op, &n, &call_env, &args).unwrap();
        assert_eq!(result, Expr::cons(Expr::symbol("got"), Expr::var("undefined-var")));
    }

    #[test]
    fn wrapped_evaluates_args_before_delegating() {
        let n = node();
        let mut env = n.root_env();
        env.set("y", Expr::Int(BigInt::from(4)));
        let inner_op = Expr::Operative(Rc::new(OperativeData {
            pat: Expr::cons(Expr::var("a"), Expr::Nil),
            epat: Expr::Blank,
            body: Expr::var("a"),
            captured_env: n.root_env(),
        }));
        let wrapped = Expr::Wrapped(Rc::new(inner_op));
        let args = Expr::cons(Expr::var("y"), Expr::Nil);
        let result = apply(&wrapped, &n, &env, &args).unwrap();
        assert_eq!(result, Expr::Int(BigInt::from(4)));
    }

    #[test]
    fn improper_list_in_call_position_fails() {
        let n = node();
        let env = n.root_env();
        let expr = Expr::cons(Expr::var("+"), Expr::Int(BigInt::from(2)));
        assert!(matches!(
            eval(&expr, &n, &env),
            Err(PolyError::ImproperList(_))
        ));
    }
}
