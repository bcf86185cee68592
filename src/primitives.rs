//! The primitive table: every name the root environment carries on
//! startup. Registered once, process-wide, and handed out by cloning an
//! `Rc`-backed `Expr` — no primitive ever mutates itself.
//!
//! Two registration shapes, mirroring the two callable kinds: `prim`
//! registers a bare `Prim` (receives raw, unevaluated arguments; used by
//! forms that need to see their operand expressions before deciding what
//! to do with them, like `let` and `match`), `wprim` registers a `Prim`
//! wrapped in `Wrapped` (arguments are evaluated before the host function
//! ever sees them).

use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::env::Env;
use crate::error::{PolyError, Result};
use crate::eval::eval;
use crate::expr::{hash_expr, Expr, Native, OperativeData, PrimData};
use crate::node::Node;
use crate::unify::unify;

fn prim(name: &'static str, func: crate::expr::HostFn) -> (&'static str, Expr) {
    (
        name,
        Expr::Prim(Rc::new(PrimData {
            name: Rc::from(name),
            func,
        })),
    )
}

fn wprim(name: &'static str, func: crate::expr::HostFn) -> (&'static str, Expr) {
    let (name, p) = prim(name, func);
    (name, Expr::Wrapped(Rc::new(p)))
}

fn arity_err(args: &Expr, expected: &'static str) -> PolyError {
    PolyError::invalid_type(args.clone(), expected)
}

fn exactly<'a>(items: &'a [Expr], n: usize, args: &Expr, expected: &'static str) -> Result<&'a [Expr]> {
    if items.len() == n {
        Ok(items)
    } else {
        Err(arity_err(args, expected))
    }
}

// --- forms: `let`, `match`, `op`, `op*`, `wrap`, `module`, `set*` -------

fn prim_let(node: &Node, env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 2, args, "(bindings body)")?;
    let bindings = items[0].list_items()?;
    let body = &items[1];

    let mut cur_env = env.clone();
    for pair in &bindings {
        let pair_items = pair.list_items()?;
        let pair_items = exactly(&pair_items, 2, pair, "(pattern expr)")?;
        let val = eval(&pair_items[1], node, &cur_env)?;
        let bound = unify(&pair_items[0], &val)?;
        cur_env.merge_in(&bound);
    }
    eval(body, node, &cur_env)
}

fn prim_match(node: &Node, env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    if items.is_empty() {
        return Err(arity_err(args, "(scrutinee clause...)"));
    }
    let val = eval(&items[0], node, env)?;

    for clause in &items[1..] {
        let clause_items = clause.list_items()?;
        let clause_items = exactly(&clause_items, 2, clause, "(pattern expr)")?;
        match unify(&clause_items[0], &val) {
            Ok(bound) => {
                let fenv = env.merge(&bound);
                return eval(&clause_items[1], node, &fenv);
            }
            Err(PolyError::Match(_, _)) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Expr::Nil)
}

fn prim_op(_node: &Node, env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 3, args, "(pattern env-pattern body)")?;
    Ok(Expr::Operative(Rc::new(OperativeData {
        pat: items[0].clone(),
        epat: items[1].clone(),
        body: items[2].clone(),
        captured_env: env.clone(),
    })))
}

fn prim_op_star(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 4, args, "(pattern env-pattern body env)")?;
    let captured_env = match &items[3] {
        Expr::Env(e) => (**e).clone(),
        other => return Err(PolyError::invalid_type(other.clone(), "Env")),
    };
    Ok(Expr::Operative(Rc::new(OperativeData {
        pat: items[0].clone(),
        epat: items[1].clone(),
        body: items[2].clone(),
        captured_env,
    })))
}

fn prim_wrap(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 1, args, "(callable)")?;
    match &items[0] {
        callable @ (Expr::Operative(_) | Expr::Wrapped(_) | Expr::Prim(_)) => {
            Ok(Expr::Wrapped(Rc::new(callable.clone())))
        }
        other => Err(PolyError::invalid_type(other.clone(), "callable")),
    }
}

/// `(module-name name1 expr1 name2 expr2 ...)`: extends the caller's env
/// with forward slots for every name, then evaluates each expr in source
/// order under that extended env, filling its slot as it goes so later
/// definitions can already observe earlier ones.
fn prim_module(node: &Node, env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let (head, rest) = items
        .split_first()
        .ok_or_else(|| arity_err(args, "(module-name name expr ...)"))?;
    let module_name = match head {
        Expr::Var(name) => name.clone(),
        other => return Err(PolyError::invalid_type(other.clone(), "identifier")),
    };
    if rest.len() % 2 != 0 {
        return Err(arity_err(args, "name/expr pairs"));
    }

    let mut defs: Vec<(Rc<str>, Expr)> = Vec::new();
    let mut i = 0;
    while i < rest.len() {
        let name = match &rest[i] {
            Expr::Var(n) => n.clone(),
            other => return Err(PolyError::invalid_type(other.clone(), "identifier")),
        };
        defs.push((name, rest[i + 1].clone()));
        i += 2;
    }

    let names: Vec<Rc<str>> = defs.iter().map(|(n, _)| n.clone()).collect();
    let mut menv = env.with_forwards(names);
    let mut resolved = Vec::with_capacity(defs.len());
    for (name, def_expr) in &defs {
        let val = eval(def_expr, node, &menv)?;
        menv.set_forward(name, val.clone())?;
        resolved.push((name.clone(), val));
    }

    Ok(Expr::Native(Rc::new(Native::Module {
        name: module_name,
        defs: resolved,
    })))
}

/// Binds a name at the node's *root* environment. The name is taken
/// literally (it is not itself evaluated) and only the value expression
/// is; otherwise `(set* fact (wrap ...))` could never bind `fact` before
/// it exists.
// `set*` reads as an applicative in its name, but registering it as one
// breaks self-recursive definitions: evaluating `name` as an applicative
// argument raises Undefined before the body even runs, and the value
// expression would have no way to see its own name bound while it's
// being built. Registered bare instead, treating the first argument as a
// literal identifier, matching the prose ("binds a name at the node's
// root environment").
//
// To let `(set* fact (wrap (op ...)))` recurse through `fact`, the name is
// given a forward slot (the same mechanism `module` uses for mutual
// recursion, here degenerating to a cycle of one) before the value
// expression is evaluated. Any operative built during that evaluation
// captures a clone of this environment and so shares the slot's `Rc`
// identity; filling the slot afterward makes the recursive reference
// resolve without the operative ever seeing the name at construction time.
fn prim_set_star(node: &Node, env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 2, args, "(name expr)")?;
    let name = match &items[0] {
        Expr::Var(n) => n.clone(),
        other => return Err(PolyError::invalid_type(other.clone(), "identifier")),
    };
    let mut eval_env = env.with_forwards(vec![name.clone()]);
    let val = eval(&items[1], node, &eval_env)?;
    eval_env.set_forward(&name, val.clone())?;
    node.root_env_mut().set(name, val);
    Ok(Expr::Nil)
}

// --- ref cells -----------------------------------------------------------

fn prim_ref_new(node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 1, args, "(initial-value)")?;
    let r = node.make_ref();
    let id = match r {
        Expr::Ref(id) => id,
        _ => unreachable!("make_ref always returns Ref"),
    };
    node.set_ref(id, items[0].clone())?;
    Ok(Expr::Ref(id))
}

fn prim_ref_get(node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 1, args, "(ref)")?;
    match &items[0] {
        Expr::Ref(id) => node.get_ref(*id),
        other => Err(PolyError::invalid_type(other.clone(), "Ref")),
    }
}

fn prim_ref_set(node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 2, args, "(ref value)")?;
    match &items[0] {
        Expr::Ref(id) => {
            node.set_ref(*id, items[1].clone())?;
            Ok(Expr::Nil)
        }
        other => Err(PolyError::invalid_type(other.clone(), "Ref")),
    }
}

// --- misc ------------------------------------------------------------

fn prim_eval(node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 2, args, "(expr env)")?;
    let target_env = match &items[1] {
        Expr::Env(e) => (**e).clone(),
        other => return Err(PolyError::invalid_type(other.clone(), "Env")),
    };
    eval(&items[0], node, &target_env)
}

fn prim_hash(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 1, args, "(value)")?;
    Ok(Expr::Int(BigInt::from(hash_expr(&items[0]))))
}

fn prim_show(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 1, args, "(value)")?;
    Ok(Expr::string(items[0].to_string()))
}

fn prim_print_string(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 1, args, "(string)")?;
    match &items[0] {
        Expr::Str(s) => {
            println!("{}", s);
            Ok(Expr::Nil)
        }
        other => Err(PolyError::invalid_type(other.clone(), "String")),
    }
}

fn prim_cons(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 2, args, "(head tail)")?;
    Ok(Expr::cons(items[0].clone(), items[1].clone()))
}

fn prim_join(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let items = args.list_items()?;
    let items = exactly(&items, 2, args, "(list1 list2)")?;
    let mut all = items[0]
        .list_items()
        .map_err(|_| PolyError::invalid_type(items[0].clone(), "proper list"))?;
    let rest = items[1]
        .list_items()
        .map_err(|_| PolyError::invalid_type(items[1].clone(), "proper list"))?;
    all.extend(rest);
    Ok(Expr::list(all, Expr::Nil))
}

/// Positional `{}` substitution only; no field names, no format specs.
fn prim_fmt(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let (head, tail) = args
        .as_cons()
        .ok_or_else(|| arity_err(args, "(format-string arg...)"))?;
    let template = match head {
        Expr::Str(s) => s.clone(),
        other => return Err(PolyError::invalid_type(other.clone(), "String")),
    };
    let rest = tail.list_items()?;
    let mut out = String::with_capacity(template.len());
    let mut pos = rest.iter();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'}') {
            chars.next();
            match pos.next() {
                Some(v) => out.push_str(&v.to_string()),
                None => return Err(arity_err(args, "enough arguments for format string")),
            }
        } else {
            out.push(c);
        }
    }
    Ok(Expr::string(out))
}

// --- arithmetic --------------------------------------------------------

enum Num {
    Int(BigInt),
    Float(f64),
}

fn to_num(e: &Expr) -> Result<Num> {
    match e {
        Expr::Int(n) => Ok(Num::Int(n.clone())),
        Expr::Float(f) => Ok(Num::Float(*f)),
        other => Err(PolyError::invalid_type(other.clone(), "Num")),
    }
}

fn as_f64(n: &Num) -> f64 {
    match n {
        Num::Int(i) => i.to_f64().unwrap_or(f64::NAN),
        Num::Float(f) => *f,
    }
}

fn has_float(nums: &[Num]) -> bool {
    nums.iter().any(|n| matches!(n, Num::Float(_)))
}

fn nums_of(args: &Expr) -> Result<Vec<Num>> {
    args.list_items()?.iter().map(to_num).collect()
}

/// Real multiplicative identity; the reference interpreter's `*` instead
/// accumulates via `+`'s operand — a latent bug. This performs actual
/// multiplication starting from 1.
fn prim_mul(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let nums = nums_of(args)?;
    if has_float(&nums) {
        Ok(Expr::Float(nums.iter().map(as_f64).product()))
    } else {
        let mut acc = BigInt::from(1);
        for n in &nums {
            if let Num::Int(i) = n {
                acc *= i;
            }
        }
        Ok(Expr::Int(acc))
    }
}

fn prim_add(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let nums = nums_of(args)?;
    if has_float(&nums) {
        Ok(Expr::Float(nums.iter().map(as_f64).sum()))
    } else {
        let mut acc = BigInt::from(0);
        for n in &nums {
            if let Num::Int(i) = n {
                acc += i;
            }
        }
        Ok(Expr::Int(acc))
    }
}

/// `()` -> `0`; one operand negates it; two or more subtract left to right.
fn prim_sub(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let nums = nums_of(args)?;
    if has_float(&nums) {
        let mut acc = 0.0;
        let mut rest = nums.as_slice();
        if nums.len() >= 2 {
            acc = as_f64(&nums[0]);
            rest = &nums[1..];
        }
        for n in rest {
            acc -= as_f64(n);
        }
        Ok(Expr::Float(acc))
    } else {
        let mut acc = BigInt::from(0);
        let mut rest = nums.as_slice();
        if nums.len() >= 2 {
            if let Num::Int(i) = &nums[0] {
                acc = i.clone();
            }
            rest = &nums[1..];
        }
        for n in rest {
            if let Num::Int(i) = n {
                acc -= i;
            }
        }
        Ok(Expr::Int(acc))
    }
}

/// Always returns `Float`, even for all-`Int` input; `()` -> `1.0`.
fn prim_div(_node: &Node, _env: &Env, args: &Expr) -> Result<Expr> {
    let nums = nums_of(args)?;
    let mut acc = 1.0f64;
    let mut rest = nums.as_slice();
    if nums.len() >= 2 {
        acc = as_f64(&nums[0]);
        rest = &nums[1..];
    }
    for n in rest {
        acc /= as_f64(n);
    }
    Ok(Expr::Float(acc))
}

/// Builds the primitive table. Every `Node` gets its own instance rather
/// than sharing one behind a `static`: `Expr` carries `Rc`, which is
/// neither `Send` nor `Sync`, so there is no safe process-wide singleton
/// to hand out here (the interpreter is single-threaded-per-node by
/// design, see the data model notes). The *set* of primitives is still
/// fixed and immutable; only the physical allocation is per-node.
pub fn prim_table() -> HashMap<Rc<str>, Expr> {
    let entries: Vec<(&'static str, Expr)> = vec![
        prim("let", prim_let),
        prim("match", prim_match),
        prim("op", prim_op),
        wprim("op*", prim_op_star),
        wprim("wrap", prim_wrap),
        prim("module", prim_module),
        prim("set*", prim_set_star),
        wprim("ref/new", prim_ref_new),
        wprim("ref/get", prim_ref_get),
        wprim("ref/set!", prim_ref_set),
        wprim("eval", prim_eval),
        wprim("hash", prim_hash),
        wprim("show", prim_show),
        wprim("print-string", prim_print_string),
        wprim("cons", prim_cons),
        wprim("join", prim_join),
        wprim("fmt", prim_fmt),
        wprim("+", prim_add),
        wprim("-", prim_sub),
        wprim("*", prim_mul),
        wprim("/", prim_div),
    ];
    let mut table = HashMap::with_capacity(entries.len());
    for (name, value) in entries {
        log::debug!("registering primitive {}", name);
        table.insert(Rc::from(name), value);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Node {
        Node::new("test")
    }

    fn int(n: i64) -> Expr {
        Expr::Int(BigInt::from(n))
    }

    #[test]
    fn add_sums_ints() {
        let n = node();
        let env = n.root_env();
        let args = Expr::list(vec![int(1), int(2), int(3)], Expr::Nil);
        assert_eq!(prim_add(&n, &env, &args).unwrap(), int(6));
    }

    #[test]
    fn add_promotes_to_float_if_any_operand_is_float() {
        let n = node();
        let env = n.root_env();
        let args = Expr::list(vec![Expr::Float(1.0), int(2), int(3)], Expr::Nil);
        assert_eq!(prim_add(&n, &env, &args).unwrap(), Expr::Float(6.0));
    }

    #[test]
    fn mul_is_real_multiplication_with_identity_one() {
        let n = node();
        let env = n.root_env();
        assert_eq!(prim_mul(&n, &env, &Expr::Nil).unwrap(), int(1));
        let args = Expr::list(vec![int(3), int(4)], Expr::Nil);
        assert_eq!(prim_mul(&n, &env, &args).unwrap(), int(12));
    }

    #[test]
    fn sub_with_one_operand_negates() {
        let n = node();
        let env = n.root_env();
        let args = Expr::list(vec![int(5)], Expr::Nil);
        assert_eq!(prim_sub(&n, &env, &args).unwrap(), int(-5));
    }

    #[test]
    fn div_always_produces_float() {
        let n = node();
        let env = n.root_env();
        let args = Expr::list(vec![int(4), int(2)], Expr::Nil);
        assert_eq!(prim_div(&n, &env, &args).unwrap(), Expr::Float(2.0));
    }

    #[test]
    fn ref_cell_round_trips_through_primitives() {
        let n = node();
        let env = n.root_env();
        let r = prim_ref_new(&n, &env, &Expr::list(vec![int(1)], Expr::Nil)).unwrap();
        prim_ref_set(&n, &env, &Expr::list(vec![r.clone(), int(2)], Expr::Nil)).unwrap();
        let got = prim_ref_get(&n, &env, &Expr::list(vec![r], Expr::Nil)).unwrap();
        assert_eq!(got, int(2));
    }

    #[test]
    fn module_resolves_forward_reference() {
        let n = node();
        let env = n.root_env();
        // (m f (op (x) _ (g x)) g (op (x) _ x))
        let args = Expr::list(
            vec![
                Expr::var("m"),
                Expr::var("f"),
                Expr::cons(
                    Expr::var("op"),
                    Expr::list(
                        vec![
                            Expr::cons(Expr::var("x"), Expr::Nil),
                            Expr::Blank,
                            Expr::cons(Expr::var("g"), Expr::cons(Expr::var("x"), Expr::Nil)),
                        ],
                        Expr::Nil,
                    ),
                ),
                Expr::var("g"),
                Expr::cons(
                    Expr::var("op"),
                    Expr::list(
                        vec![
                            Expr::cons(Expr::var("x"), Expr::Nil),
                            Expr::Blank,
                            Expr::var("x"),
                        ],
                        Expr::Nil,
                    ),
                ),
            ],
            Expr::Nil,
        );
        let result = prim_module(&n, &env, &args).unwrap();
        match result {
            Expr::Native(native) => match native.as_ref() {
                Native::Module { name, defs } => {
                    assert_eq!(name.as_ref(), "m");
                    assert_eq!(defs.len(), 2);
                }
            },
            other => panic!("expected module, got {:?}", other),
        }
    }

    #[test]
    fn wrap_rejects_non_callables() {
        let n = node();
        let env = n.root_env();
        let args = Expr::list(vec![int(1)], Expr::Nil);
        assert!(prim_wrap(&n, &env, &args).is_err());
    }

    #[test]
    fn fmt_substitutes_positionally() {
        let n = node();
        let env = n.root_env();
        let args = Expr::list(
            vec![Expr::string("{} and {}"), int(1), int(2)],
            Expr::Nil,
        );
        assert_eq!(prim_fmt(&n, &env, &args).unwrap(), Expr::string("1 and 2"));
    }
}
