//! The host node: a per-interpreter container for the root environment,
//! the ref-cell table, and the primitive table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

use log::info;

use crate::env::Env;
use crate::error::{PolyError, Result};
use crate::eval::eval;
use crate::expr::{Expr, Native};
use crate::parser::read_expr;
use crate::primitives::prim_table;

pub struct Node {
    pub name: String,
    root_env: RefCell<Env>,
    refs: RefCell<HashMap<u64, Option<Expr>>>,
    next_ref_id: RefCell<u64>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            root_env: RefCell::new(Env::from_table(prim_table())),
            refs: RefCell::new(HashMap::new()),
            next_ref_id: RefCell::new(0),
        }
    }

    /// Cloned snapshot of the root environment, the dynamic env every
    /// top-level `eval` call starts from.
    pub fn root_env(&self) -> Env {
        self.root_env.borrow().clone()
    }

    pub fn root_env_mut(&self) -> std::cell::RefMut<'_, Env> {
        self.root_env.borrow_mut()
    }

    pub fn names(&self) -> Vec<Rc<str>> {
        self.root_env.borrow().names()
    }

    pub fn make_ref(&self) -> Expr {
        let mut next = self.next_ref_id.borrow_mut();
        let id = *next;
        *next += 1;
        self.refs.borrow_mut().insert(id, None);
        Expr::Ref(id)
    }

    pub fn get_ref(&self, id: u64) -> Result<Expr> {
        match self.refs.borrow().get(&id) {
            Some(Some(v)) => Ok(v.clone()),
            Some(None) => Err(PolyError::UndefinedRef(id)),
            None => Err(PolyError::UndefinedRef(id)),
        }
    }

    pub fn set_ref(&self, id: u64, val: Expr) -> Result<()> {
        let mut refs = self.refs.borrow_mut();
        if refs.contains_key(&id) {
            refs.insert(id, Some(val));
            Ok(())
        } else {
            Err(PolyError::UndefinedRef(id))
        }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Expr> {
        let env = self.root_env();
        eval(expr, self, &env)
    }

    /// Reads, evaluates (must yield a `module` native value) and imports
    /// `path` into the root environment under `prefix` (default
    /// `"<module-name>/"`). Wraps any inner failure as `PolyError::Module`.
    pub fn load_module(&self, path: &str, prefix: Option<&str>) -> Result<()> {
        let load = || -> Result<()> {
            let source = fs::read_to_string(path)
                .map_err(|e| PolyError::Reader(format!("{}: {}", path, e)))?;
            let expr = read_expr(&source)?;
            let result = self.eval(&expr)?;
            let (name, defs) = match result {
                Expr::Native(ref native) => match native.as_ref() {
                    Native::Module { name, defs } => (name.clone(), defs.clone()),
                },
                other => return Err(PolyError::invalid_type(other, "module")),
            };
            let prefix = prefix
                .map(|p| p.to_string())
                .unwrap_or_else(|| format!("{}/", name));
            info!("loading module {} ({} definitions)", name, defs.len());
            let mut root = self.root_env_mut();
            for (def_name, val) in defs {
                root.set(format!("{}{}", prefix, def_name), val);
            }
            Ok(())
        };
        load().map_err(|e| PolyError::Module(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_cycle_round_trips() {
        let node = Node::new("test");
        let r = node.make_ref();
        let id = match r {
            Expr::Ref(id) => id,
            _ => panic!("expected ref"),
        };
        assert!(node.get_ref(id).is_err());
        node.set_ref(id, Expr::Nil).unwrap();
        assert_eq!(node.get_ref(id).unwrap(), Expr::Nil);
    }

    #[test]
    fn unknown_ref_fails() {
        let node = Node::new("test");
        assert!(node.get_ref(999).is_err());
    }
}
