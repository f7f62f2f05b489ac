//! Chained scope frames for the evaluator.
//!
//! Each frame owns a name→value mapping and a shared link to its enclosing
//! frame (the global frame has none).  Frames are reference-counted because
//! closures alias them: every closure over a scope keeps that frame alive and
//! observes mutations made through any other alias.

use crate::error::{FenError, Result};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub struct Environment {
    pub enclosing: Option<Rc<RefCell<Environment>>>,
    values: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Introduce a binding in this frame.  Redefinition in the same frame is
    /// last-write-wins, not an error.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup: walk outward until found or the chain is exhausted.
    /// Only used for the global frame; resolved locals go through
    /// [`Environment::get_at`].
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(FenError::runtime(
                name,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// Dynamic assignment: walk outward to the frame that holds `name`.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(FenError::runtime(
                name,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// Walk exactly `distance` enclosing links.  The resolver guarantees the
    /// chain is at least that deep.
    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Rc<RefCell<Environment>> {
        let mut frame: Rc<RefCell<Environment>> = env.clone();

        for _ in 0..distance {
            let next = frame.borrow().enclosing.clone();
            match next {
                Some(enclosing) => frame = enclosing,
                None => break,
            }
        }

        frame
    }

    /// Read `name` from the frame exactly `distance` hops out.  No name
    /// search: the resolver already picked the frame, which is what makes
    /// shadowing correct.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
    ) -> Option<Value> {
        let frame = Self::ancestor(env, distance);
        let value = frame.borrow().values.get(name).cloned();
        value
    }

    /// Write `name` in the frame exactly `distance` hops out.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
    ) {
        let frame = Self::ancestor(env, distance);
        frame.borrow_mut().values.insert(name.to_string(), value);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
