//! The expression algebra: the closed set of tagged variants that are
//! simultaneously AST, runtime value, and data literal (homoiconic).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use num_bigint::BigInt;

use crate::env::Env;
use crate::error::{PolyError, Result};
use crate::node::Node;

/// Host-side function backing a `Prim`. Takes the unevaluated argument
/// expression (a proper or improper list) and returns the already-computed
/// result; callees that conceptually return "nothing" just build and
/// return `Expr::Nil`, since Rust has no separate "any other host value"
/// case the way a dynamically-typed host would.
pub type HostFn = fn(&Node, &Env, &Expr) -> Result<Expr>;

pub struct PrimData {
    pub name: Rc<str>,
    pub func: HostFn,
}

pub struct OperativeData {
    pub pat: Expr,
    pub epat: Expr,
    pub body: Expr,
    pub captured_env: Env,
}

/// Opaque host-side payload escorted through the evaluator unchanged.
/// The only payload the core itself produces is a `module` form's result;
/// embedders may stash their own via `Native::Opaque`.
pub enum Native {
    Module {
        name: Rc<str>,
        defs: Vec<(Rc<str>, Expr)>,
    },
}

#[derive(Clone)]
pub enum Expr {
    Nil,
    Blank,
    Var(Rc<str>),
    Int(BigInt),
    Float(f64),
    Symbol(Rc<str>),
    Str(Rc<str>),
    Quote(Rc<Expr>),
    Ref(u64),
    Env(Rc<Env>),
    Operative(Rc<OperativeData>),
    Wrapped(Rc<Expr>),
    Prim(Rc<PrimData>),
    Cons(Rc<Expr>, Rc<Expr>),
    Map(Rc<BTreeMap<Expr, Expr>>),
    Native(Rc<Native>),
}

/// Tie-breaker order across variants, top-to-bottom per the data model
/// table: it is also the order `Map` uses to print/hash its keys.
fn variant_order(e: &Expr) -> u8 {
    match e {
        Expr::Nil => 0,
        Expr::Blank => 1,
        Expr::Var(_) => 2,
        Expr::Int(_) => 3,
        Expr::Float(_) => 4,
        Expr::Symbol(_) => 5,
        Expr::Str(_) => 6,
        Expr::Quote(_) => 7,
        Expr::Ref(_) => 8,
        Expr::Env(_) => 9,
        Expr::Operative(_) => 10,
        Expr::Wrapped(_) => 11,
        Expr::Prim(_) => 12,
        Expr::Cons(_, _) => 13,
        Expr::Map(_) => 14,
        Expr::Native(_) => 15,
    }
}

fn rc_ptr_tag<T>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        use Expr::*;
        match (self, other) {
            (Nil, Nil) | (Blank, Blank) => true,
            (Var(a), Var(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Symbol(a), Symbol(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Quote(a), Quote(b)) => a == b,
            (Ref(a), Ref(b)) => a == b,
            (Env(a), Env(b)) => Rc::ptr_eq(a, b),
            (Operative(a), Operative(b)) => Rc::ptr_eq(a, b),
            (Wrapped(a), Wrapped(b)) => Rc::ptr_eq(a, b) || a == b,
            (Prim(a), Prim(b)) => Rc::ptr_eq(a, b),
            (Cons(ah, at), Cons(bh, bt)) => ah == bh && at == bt,
            (Map(a), Map(b)) => a == b,
            (Native(a), Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Expr {}

/// `h' = h*31 + hash(x)`, applied along the Cons spine; the root hash
/// starts at 0 for every collection.
fn mix(h: u64, x: &Expr) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    x.hash(&mut hasher);
    h.wrapping_mul(31).wrapping_add(hasher.finish())
}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use Expr::*;
        variant_order(self).hash(state);
        match self {
            Nil | Blank => {}
            Var(s) | Symbol(s) | Str(s) => s.hash(state),
            Int(n) => n.hash(state),
            Float(f) => f.to_bits().hash(state),
            Quote(e) => e.hash(state),
            Ref(id) => id.hash(state),
            Env(e) => rc_ptr_tag(e).hash(state),
            Operative(o) => rc_ptr_tag(o).hash(state),
            Wrapped(w) => w.hash(state),
            Prim(p) => rc_ptr_tag(p).hash(state),
            Cons(_, _) => {
                let mut h = 0u64;
                let mut cur = self;
                loop {
                    match cur {
                        Cons(head, tail) => {
                            h = mix(h, head);
                            if matches!(tail.as_ref(), Nil) {
                                break;
                            } else if matches!(tail.as_ref(), Cons(_, _)) {
                                cur = tail;
                            } else {
                                h = mix(h, tail);
                                break;
                            }
                        }
                        _ => unreachable!(),
                    }
                }
                h.hash(state);
            }
            Map(m) => {
                let mut h = 0u64;
                for (k, v) in m.iter() {
                    h = mix(h, k);
                    h = mix(h, v);
                }
                h.hash(state);
            }
            Native(n) => rc_ptr_tag(n).hash(state),
        }
    }
}

fn float_cmp(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        use Expr::*;
        let order = variant_order(self).cmp(&variant_order(other));
        if order != Ordering::Equal {
            return order;
        }
        match (self, other) {
            (Nil, Nil) | (Blank, Blank) => Ordering::Equal,
            (Var(a), Var(b)) | (Symbol(a), Symbol(b)) | (Str(a), Str(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => float_cmp(*a, *b),
            (Quote(a), Quote(b)) => a.cmp(b),
            (Ref(a), Ref(b)) => a.cmp(b),
            (Env(a), Env(b)) => rc_ptr_tag(a).cmp(&rc_ptr_tag(b)),
            (Operative(a), Operative(b)) => rc_ptr_tag(a).cmp(&rc_ptr_tag(b)),
            (Wrapped(a), Wrapped(b)) => a.cmp(b),
            (Prim(a), Prim(b)) => rc_ptr_tag(a).cmp(&rc_ptr_tag(b)),
            (Cons(ah, at), Cons(bh, bt)) => ah.cmp(bh).then_with(|| at.cmp(bt)),
            (Map(a), Map(b)) => a.iter().cmp(b.iter()),
            (Native(a), Native(b)) => rc_ptr_tag(a).cmp(&rc_ptr_tag(b)),
            _ => Ordering::Equal,
        }
    }
}

/// `[A-Za-z_+\-*/<>=!?][A-Za-z0-9_+\-*/<>=!?]*`, checked by hand so the
/// core doesn't need `regex` just for the printer.
pub fn is_safe_ident(name: &str) -> bool {
    fn is_ident_start(c: char) -> bool {
        c.is_ascii_alphabetic() || "_+-*/<>=!?".contains(c)
    }
    fn is_ident_cont(c: char) -> bool {
        c.is_ascii_alphanumeric() || "_+-*/<>=!?".contains(c)
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(is_ident_cont),
        _ => false,
    }
}

fn escape_backticks(name: &str) -> String {
    name.replace('`', "\\`")
}

fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_safe_ident(name) {
        write!(f, "{}", name)
    } else {
        write!(f, "`{}`", escape_backticks(name))
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            _ => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Nil => write!(f, "()"),
            Expr::Blank => write!(f, "_"),
            Expr::Var(name) => write_ident(f, name),
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Float(x) => write!(f, "{}", x),
            Expr::Symbol(name) => {
                write!(f, "#")?;
                write_ident(f, name)
            }
            Expr::Str(s) => write_string_literal(f, s),
            Expr::Quote(inner) => write!(f, "'{}", inner),
            Expr::Ref(id) => write!(f, "(ref {})", id),
            Expr::Env(_) => write!(f, "(env ...)"),
            Expr::Operative(op) => write!(f, "(op {} {} ...)", op.pat, op.epat),
            Expr::Wrapped(inner) => write!(f, "(wrap {})", inner),
            Expr::Prim(p) => write!(f, "(prim {})", p.name),
            Expr::Cons(_, _) => write_cons(f, self),
            Expr::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                write!(f, "}}")
            }
            Expr::Native(n) => match n.as_ref() {
                Native::Module { name, defs } => {
                    write!(f, "(native-value {}", name)?;
                    for (k, _) in defs {
                        write!(f, " {}", k)?;
                    }
                    write!(f, ")")
                }
            },
        }
    }
}

fn write_cons(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    write!(f, "(")?;
    let mut cur = expr;
    let mut first = true;
    loop {
        match cur {
            Expr::Cons(head, tail) => {
                if !first {
                    write!(f, " ")?;
                }
                first = false;
                write!(f, "{}", head)?;
                match tail.as_ref() {
                    Expr::Nil => break,
                    Expr::Cons(_, _) => cur = tail,
                    other => {
                        write!(f, " . {}", other)?;
                        break;
                    }
                }
            }
            _ => unreachable!(),
        }
    }
    write!(f, ")")
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Expr {
    pub fn nil() -> Expr {
        Expr::Nil
    }

    pub fn cons(head: Expr, tail: Expr) -> Expr {
        Expr::Cons(Rc::new(head), Rc::new(tail))
    }

    pub fn var(name: impl Into<Rc<str>>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn symbol(name: impl Into<Rc<str>>) -> Expr {
        Expr::Symbol(name.into())
    }

    pub fn string(s: impl Into<Rc<str>>) -> Expr {
        Expr::Str(s.into())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Expr::Nil)
    }

    pub fn as_cons(&self) -> Option<(&Expr, &Expr)> {
        match self {
            Expr::Cons(h, t) => Some((h, t)),
            _ => None,
        }
    }

    /// Builds a proper list from `items`, optionally with a non-Nil `tail`.
    pub fn list(items: Vec<Expr>, tail: Expr) -> Expr {
        let mut cur = tail;
        for item in items.into_iter().rev() {
            cur = Expr::cons(item, cur);
        }
        cur
    }

    /// Walks a proper list, collecting its elements. Fails with
    /// `ImproperList` if the spine doesn't end in `Nil`.
    pub fn list_items(&self) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Expr::Nil => return Ok(items),
                Expr::Cons(head, tail) => {
                    items.push((**head).clone());
                    cur = tail;
                }
                _ => return Err(PolyError::improper_list(self.clone())),
            }
        }
    }

    /// Free logical variables appearing in a pattern (`Var` leaves).
    pub fn lvars(&self, out: &mut std::collections::HashSet<Rc<str>>) {
        match self {
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Cons(h, t) => {
                h.lvars(out);
                t.lvars(out);
            }
            _ => {}
        }
    }
}

pub fn hash_expr(e: &Expr) -> i64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    e.hash(&mut hasher);
    hasher.finish() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_implies_equal_hash() {
        let a = Expr::list(
            vec![Expr::Int(BigInt::from(1)), Expr::string("x")],
            Expr::Nil,
        );
        let b = Expr::list(
            vec![Expr::Int(BigInt::from(1)), Expr::string("x")],
            Expr::Nil,
        );
        assert_eq!(a, b);
        assert_eq!(hash_expr(&a), hash_expr(&b));
    }

    #[test]
    fn map_equality_is_unordered() {
        let mut m1 = BTreeMap::new();
        m1.insert(Expr::symbol("a"), Expr::Int(BigInt::from(1)));
        m1.insert(Expr::symbol("b"), Expr::Int(BigInt::from(2)));
        let m2 = m1.clone();
        assert_eq!(Expr::Map(Rc::new(m1)), Expr::Map(Rc::new(m2)));
    }

    #[test]
    fn improper_list_detection() {
        let improper = Expr::Cons(Rc::new(Expr::Int(BigInt::from(1))), Rc::new(Expr::Int(BigInt::from(2))));
        assert!(improper.list_items().is_err());
    }

    #[test]
    fn printer_quotes_unsafe_identifiers() {
        let v = Expr::var("has space");
        assert_eq!(format!("{}", v), "`has space`");
        let v2 = Expr::var("plain-name?");
        assert_eq!(format!("{}", v2), "plain-name?");
    }

    #[test]
    fn printer_dotted_pair() {
        let improper = Expr::Cons(Rc::new(Expr::Int(BigInt::from(1))), Rc::new(Expr::Int(BigInt::from(2))));
        assert_eq!(format!("{}", improper), "(1 . 2)");
    }
}
