//! A layered name->value mapping with forward slots for mutual recursion.
//!
//! Unlike a parent-chain scope, an `Env` is a flat, cloneable value:
//! `table` holds resolved bindings, `forwards` holds not-yet-resolved
//! recursive slots. Cloning an `Env` clones the two maps but preserves
//! the `Rc<RefCell<..>>` identity of each forward slot, so a module's
//! per-definition environment and the module's own bookkeeping still see
//! the same cell once one of them fills it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{PolyError, Result};
use crate::expr::Expr;

type Slot = Rc<RefCell<Option<Expr>>>;

#[derive(Clone, Default)]
pub struct Env {
    table: HashMap<Rc<str>, Expr>,
    forwards: HashMap<Rc<str>, Slot>,
}

impl Env {
    pub fn new() -> Self {
        Env {
            table: HashMap::new(),
            forwards: HashMap::new(),
        }
    }

    pub fn from_table(table: HashMap<Rc<str>, Expr>) -> Self {
        Env {
            table,
            forwards: HashMap::new(),
        }
    }

    /// `env[name]`: consult `table`, then `forwards`. A filled forward
    /// slot is promoted into `table` on read.
    pub fn get(&mut self, name: &str) -> Result<Expr> {
        if let Some(v) = self.table.get(name) {
            return Ok(v.clone());
        }
        if let Some(slot) = self.forwards.get(name).cloned() {
            if let Some(v) = slot.borrow().clone() {
                self.table.insert(Rc::from(name), v.clone());
                self.forwards.remove(name);
                return Ok(v);
            }
        }
        Err(PolyError::Undefined(name.to_string()))
    }

    /// Non-promoting lookup, for call sites (like `eval`) that only hold
    /// a shared reference to the environment.
    pub fn peek(&self, name: &str) -> Result<Expr> {
        if let Some(v) = self.table.get(name) {
            return Ok(v.clone());
        }
        if let Some(slot) = self.forwards.get(name) {
            if let Some(v) = slot.borrow().clone() {
                return Ok(v);
            }
        }
        Err(PolyError::Undefined(name.to_string()))
    }

    /// `env[name] = val`: writes `table`, clearing any shadowing forward.
    pub fn set(&mut self, name: impl Into<Rc<str>>, val: Expr) {
        let name = name.into();
        self.forwards.remove(&name);
        self.table.insert(name, val);
    }

    pub fn set_forward(&mut self, name: &str, val: Expr) -> Result<()> {
        match self.forwards.get(name) {
            Some(slot) => {
                *slot.borrow_mut() = Some(val);
                Ok(())
            }
            None => Err(PolyError::Undefined(name.to_string())),
        }
    }

    /// Clone with fresh, empty slots for each name in `names`.
    pub fn with_forwards<I: IntoIterator<Item = Rc<str>>>(&self, names: I) -> Env {
        let mut env = self.clone();
        for name in names {
            env.forwards.insert(name, Rc::new(RefCell::new(None)));
        }
        env
    }

    /// `A + B`: a clone of `self` with every binding of `other` overwritten in.
    pub fn merge(&self, other: &Env) -> Env {
        let mut out = self.clone();
        for (k, v) in other.table.iter() {
            out.set(k.clone(), v.clone());
        }
        out
    }

    pub fn merge_in(&mut self, other: &Env) {
        for (k, v) in other.table.iter() {
            self.set(k.clone(), v.clone());
        }
    }

    pub fn names(&self) -> Vec<Rc<str>> {
        self.table.keys().cloned().collect()
    }
}
