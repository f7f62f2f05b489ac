//! Runtime object model: the callable values (user functions, lambdas,
//! classes, natives) and instances.
//!
//! A function value pairs its declaration AST with the environment that was
//! active at definition time.  That captured frame is shared, not copied:
//! multiple closures over the same scope observe each other's mutations, and
//! the frame lives as long as the longest-lived closure referencing it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::{FunctionDecl, LambdaDecl};
use crate::environment::Environment;
use crate::error::{FenError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::value::Value;

/// A host-provided callable seeded into the global environment.
/// Anything with an arity and a call behaviour fits this contract.
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> std::result::Result<Value, String>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// A user-declared function or method, closed over its defining environment.
pub struct FenFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,

    /// `init` methods always yield the bound instance, whatever the body
    /// returns.
    pub is_initializer: bool,
}

impl FenFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produce a copy of this function whose closure has `this` bound to
    /// `instance`.  Method dispatch goes through here so that `this` inside
    /// the body resolves at a fixed distance.
    pub fn bind(&self, instance: Value) -> FenFunction {
        let env = Rc::new(RefCell::new(Environment::with_enclosing(
            self.closure.clone(),
        )));
        env.borrow_mut().define("this", instance);

        FenFunction::new(self.declaration.clone(), env, self.is_initializer)
    }

    /// Invoke the function: fresh environment chained to the closure,
    /// positional parameter binding, body executed as a block.  A
    /// `Flow::Return` from the body is intercepted here.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: &[Value]) -> Result<Value> {
        debug!("Calling function '{}'", self.declaration.name.lexeme);

        let env = Rc::new(RefCell::new(Environment::with_enclosing(
            self.closure.clone(),
        )));

        for (param, argument) in self.declaration.params.iter().zip(arguments.iter()) {
            env.borrow_mut().define(&param.lexeme, argument.clone());
        }

        let flow: Flow = interpreter.execute_block(&self.declaration.body, env)?;

        if self.is_initializer {
            // The instance sits at distance 0 in the bound closure; an
            // initializer yields it even for a bare `return`.
            return Environment::get_at(&self.closure, 0, "this").ok_or_else(|| {
                FenError::runtime(&self.declaration.name, "Initializer lost its instance.")
            });
        }

        match flow {
            Flow::Return(value) => Ok(value),
            // The resolver rejects `break` crossing a function boundary.
            _ => Ok(Value::Nil),
        }
    }
}

impl fmt::Debug for FenFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme)
    }
}

/// An anonymous function value.  Same calling convention as [`FenFunction`]
/// but never an initializer and never bound to an instance.
pub struct FenLambda {
    pub declaration: Rc<LambdaDecl>,
    pub closure: Rc<RefCell<Environment>>,
}

impl FenLambda {
    pub fn new(declaration: Rc<LambdaDecl>, closure: Rc<RefCell<Environment>>) -> Self {
        Self {
            declaration,
            closure,
        }
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn call(&self, interpreter: &mut Interpreter, arguments: &[Value]) -> Result<Value> {
        debug!("Calling lambda declared on line {}", self.declaration.keyword.line);

        let env = Rc::new(RefCell::new(Environment::with_enclosing(
            self.closure.clone(),
        )));

        for (param, argument) in self.declaration.params.iter().zip(arguments.iter()) {
            env.borrow_mut().define(&param.lexeme, argument.clone());
        }

        match interpreter.execute_block(&self.declaration.body, env)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }
}

impl fmt::Debug for FenLambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<lambda>")
    }
}

/// A class value: method and getter tables, a mutable static-member table,
/// and an optional superclass link.  The superclass reference is read-only —
/// classes never reference their subclasses, so the graph stays acyclic.
pub struct FenClass {
    pub name: String,
    pub superclass: Option<Rc<FenClass>>,
    methods: HashMap<String, Rc<FenFunction>>,
    getters: HashMap<String, Rc<FenFunction>>,

    /// Per-class mutable storage, distinct from any instance's fields.
    /// Seeded with the `class`-prefixed methods at declaration time;
    /// property get/set on the class value reads/writes only this table.
    statics: RefCell<HashMap<String, Value>>,
}

impl FenClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<FenClass>>,
        methods: HashMap<String, Rc<FenFunction>>,
        getters: HashMap<String, Rc<FenFunction>>,
        statics: HashMap<String, Value>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
            getters,
            statics: RefCell::new(statics),
        }
    }

    /// Look up an instance method, walking the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<FenFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Look up a getter, walking the superclass chain.
    pub fn find_getter(&self, name: &str) -> Option<Rc<FenFunction>> {
        if let Some(getter) = self.getters.get(name) {
            return Some(getter.clone());
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_getter(name))
    }

    /// Calling a class means instantiating it; the arity is the
    /// initializer's, or zero without one.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    pub fn get_static(&self, name: &str) -> Option<Value> {
        self.statics.borrow().get(name).cloned()
    }

    pub fn set_static(&self, name: &str, value: Value) {
        self.statics.borrow_mut().insert(name.to_string(), value);
    }
}

impl fmt::Debug for FenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

/// An object: a class pointer plus a mutable field table.  Created only by
/// invoking a class as a callable.
pub struct FenInstance {
    pub class: Rc<FenClass>,
    fields: RefCell<HashMap<String, Value>>,
}

impl FenInstance {
    pub fn new(class: Rc<FenClass>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    /// Set always writes directly into the field table: there are no setter
    /// methods in Fen.
    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl fmt::Debug for FenInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}
