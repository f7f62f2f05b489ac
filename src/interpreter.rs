//! The tree-walking evaluator.
//!
//! Executes statements and evaluates expressions against the runtime
//! environment chain.  Variable occurrences the resolver annotated jump
//! straight to the frame `distance` hops out ([`Environment::get_at`]);
//! everything else falls back to the global frame only.
//!
//! `return` and `break` are *not* errors here: every statement executor
//! yields a [`Flow`], and the matching construct — call boundary or nearest
//! loop — pattern-matches it away.  The error channel carries only genuine
//! runtime failures.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::callable::{FenClass, FenFunction, FenInstance, FenLambda, NativeFunction};
use crate::diagnostics::Reporter;
use crate::environment::Environment;
use crate::error::{FenError, Result};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.  Propagated by each statement executor and
/// pattern-matched at the call/loop boundary.
#[derive(Debug, Clone)]
pub enum Flow {
    /// Fell off the end normally.
    Normal,

    /// A `return` is unwinding to the nearest call boundary.
    Return(Value),

    /// A `break` is unwinding to the nearest enclosing loop.
    Break,
}

pub struct Interpreter {
    /// The root frame, seeded with native functions.
    pub globals: Rc<RefCell<Environment>>,

    /// The currently active frame.
    environment: Rc<RefCell<Environment>>,

    /// Binding-distance side-table, populated by the resolver and read-only
    /// during evaluation.  Keyed by expression-node identity.
    locals: HashMap<ExprId, usize>,

    /// Where `print` writes.  Stdout normally; tests swap in a buffer.
    out: Rc<RefCell<dyn Write>>,
}

impl Interpreter {
    /// Creates a new interpreter printing to stdout, with the native
    /// functions defined.
    pub fn new() -> Self {
        Self::with_output(Rc::new(RefCell::new(io::stdout())))
    }

    /// Creates a new interpreter printing to `out`.
    pub fn with_output(out: Rc<RefCell<dyn Write>>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));
        define_natives(&globals);

        Self {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    /// Record a resolved binding distance for an expression node.  Called by
    /// the resolver; the table is read-only afterwards.
    pub fn note_local(&mut self, id: ExprId, distance: usize) {
        self.locals.insert(id, distance);
    }

    /// Execute a program.  The first runtime error stops execution and is
    /// handed to the reporter; output printed before it is retained.
    pub fn interpret(&mut self, statements: &[Stmt], reporter: &mut Reporter) {
        debug!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            if let Err(err) = self.execute(stmt) {
                reporter.runtime_error(&err);
                return;
            }
        }

        info!("Interpretation completed");
    }

    // ───────────────────────── statement execution ─────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out.borrow_mut(), "{}", value)?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(
                    self.environment.clone(),
                )));
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Break { .. } => Ok(Flow::Break),

            Stmt::Function(declaration) => {
                // Capture the environment active at definition time.
                let function = FenFunction::new(
                    declaration.clone(),
                    self.environment.clone(),
                    false,
                );

                debug!("Defining function '{}'", declaration.name.lexeme);
                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                getters,
                statics,
            } => self.execute_class(name, superclass.as_ref(), methods, getters, statics),
        }
    }

    /// Class declaration: evaluate the superclass, pre-declare the name as
    /// `nil` (so methods may reference the class recursively), open a
    /// `super`-binding frame only if there is a superclass, build the
    /// method/getter/static tables closing over that frame, then assign the
    /// finished class over the pre-declared name.
    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<crate::ast::FunctionDecl>],
        getters: &[Rc<crate::ast::FunctionDecl>],
        statics: &[Rc<crate::ast::FunctionDecl>],
    ) -> Result<Flow> {
        let superclass_value: Option<Rc<FenClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let at: &Token = match expr {
                        Expr::Variable {
                            name: super_name, ..
                        } => super_name,
                        _ => name,
                    };
                    return Err(FenError::runtime(at, "Superclass must be a class."));
                }
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let enclosing = self.environment.clone();

        if let Some(ref class) = superclass_value {
            let super_env = Rc::new(RefCell::new(Environment::with_enclosing(
                self.environment.clone(),
            )));
            super_env
                .borrow_mut()
                .define("super", Value::Class(class.clone()));
            self.environment = super_env;
        }

        let mut method_table: HashMap<String, Rc<FenFunction>> = HashMap::new();
        for declaration in methods {
            let is_initializer: bool = declaration.name.lexeme == "init";
            method_table.insert(
                declaration.name.lexeme.clone(),
                Rc::new(FenFunction::new(
                    declaration.clone(),
                    self.environment.clone(),
                    is_initializer,
                )),
            );
        }

        let mut getter_table: HashMap<String, Rc<FenFunction>> = HashMap::new();
        for declaration in getters {
            getter_table.insert(
                declaration.name.lexeme.clone(),
                Rc::new(FenFunction::new(
                    declaration.clone(),
                    self.environment.clone(),
                    false,
                )),
            );
        }

        let mut static_table: HashMap<String, Value> = HashMap::new();
        for declaration in statics {
            static_table.insert(
                declaration.name.lexeme.clone(),
                Value::Function(Rc::new(FenFunction::new(
                    declaration.clone(),
                    self.environment.clone(),
                    false,
                ))),
            );
        }

        let class = FenClass::new(
            name.lexeme.clone(),
            superclass_value,
            method_table,
            getter_table,
            static_table,
        );

        if superclass.is_some() {
            self.environment = enclosing;
        }

        debug!("Defined class '{}'", name.lexeme);
        self.environment
            .borrow_mut()
            .assign(name, Value::Class(Rc::new(class)))?;

        Ok(Flow::Normal)
    }

    /// Execute `statements` with `env` as the active frame, restoring the
    /// previous frame afterwards — including when an error propagates.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<Flow> {
        let previous: Rc<RefCell<Environment>> = std::mem::replace(&mut self.environment, env);

        let mut flow: Flow = Flow::Normal;
        let mut failure: Option<FenError> = None;

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                Ok(other) => {
                    flow = other;
                    break;
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        self.environment = previous;

        match failure {
            Some(err) => Err(err),
            None => Ok(flow),
        }
    }

    // ───────────────────────── expression evaluation ────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(literal_value(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value = self.evaluate(left)?;

                // Short-circuit: return the deciding operand itself.
                match operator.token_type {
                    TokenType::OR if left_val.is_truthy() => Ok(left_val),
                    TokenType::AND if !left_val.is_truthy() => Ok(left_val),
                    _ => self.evaluate(right),
                }
            }

            Expr::Ternary {
                condition,
                on_true,
                on_false,
            } => {
                // Only the taken branch is evaluated.
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(on_true)
                } else {
                    self.evaluate(on_false)
                }
            }

            Expr::Variable { name, id } => self.look_up_variable(name, *id),

            Expr::Assign { name, value, id } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        &name.lexeme,
                        value.clone(),
                    ),
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val: Value = self.evaluate(callee)?;

                let mut argument_values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    argument_values.push(self.evaluate(argument)?);
                }

                self.invoke_callable(&callee_val, paren, &argument_values)
            }

            Expr::Get { object, name } => {
                let object_val: Value = self.evaluate(object)?;
                self.get_property(&object_val, name)
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object_val: Value = self.evaluate(object)?;

                match object_val {
                    Value::Instance(instance) => {
                        let value: Value = self.evaluate(value)?;
                        instance.set_field(&name.lexeme, value.clone());
                        Ok(value)
                    }

                    // A class value is instance-like for its statics.
                    Value::Class(class) => {
                        let value: Value = self.evaluate(value)?;
                        class.set_static(&name.lexeme, value.clone());
                        Ok(value)
                    }

                    _ => Err(FenError::runtime(name, "Only instances have fields.")),
                }
            }

            Expr::This { keyword, id } => self.look_up_variable(keyword, *id),

            Expr::Super {
                keyword,
                method,
                id,
            } => self.evaluate_super(keyword, method, *id),

            Expr::Lambda(declaration) => Ok(Value::Lambda(Rc::new(FenLambda::new(
                declaration.clone(),
                self.environment.clone(),
            )))),
        }
    }

    /// Distance-based lookup when the resolver annotated this occurrence,
    /// global lookup otherwise.
    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme)
                .ok_or_else(|| {
                    FenError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
                }),

            None => self.globals.borrow().get(name),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let right_val: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(FenError::runtime(
                    operator,
                    format!("Operand must be a number, got {}.", other.type_name()),
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),

            _ => Err(FenError::runtime(operator, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),

                // A string paired with a number auto-stringifies the number.
                (Value::Str(a), Value::Number(b)) => {
                    Ok(Value::Str(format!("{}{}", a, Value::Number(b))))
                }
                (Value::Number(a), Value::Str(b)) => {
                    Ok(Value::Str(format!("{}{}", Value::Number(a), b)))
                }

                _ => Err(FenError::runtime(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;

                if b == 0.0 {
                    return Err(FenError::runtime(operator, "Division by zero."));
                }

                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val.equals(&right_val))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!left_val.equals(&right_val))),

            _ => Err(FenError::runtime(operator, "Invalid binary operator.")),
        }
    }

    /// Property access: instances check getters first (invoked with zero
    /// arguments), then stored fields, then inherited methods; classes
    /// expose their static table.
    fn get_property(&mut self, object: &Value, name: &Token) -> Result<Value> {
        match object {
            Value::Instance(instance) => {
                if let Some(getter) = instance.class.find_getter(&name.lexeme) {
                    debug!("Invoking getter '{}'", name.lexeme);
                    let bound: FenFunction = getter.bind(Value::Instance(instance.clone()));
                    return bound.call(self, &[]);
                }

                if let Some(value) = instance.get_field(&name.lexeme) {
                    return Ok(value);
                }

                if let Some(method) = instance.class.find_method(&name.lexeme) {
                    return Ok(Value::Function(Rc::new(
                        method.bind(Value::Instance(instance.clone())),
                    )));
                }

                Err(FenError::runtime(
                    name,
                    format!("Undefined property '{}'.", name.lexeme),
                ))
            }

            Value::Class(class) => class.get_static(&name.lexeme).ok_or_else(|| {
                FenError::runtime(name, format!("Undefined property '{}'.", name.lexeme))
            }),

            _ => Err(FenError::runtime(name, "Only instances have properties.")),
        }
    }

    /// `super.method` starts the lookup at the superclass of the class that
    /// lexically encloses the call, then binds the method to the *current*
    /// instance (`this` sits one frame inside the `super` frame).
    fn evaluate_super(&mut self, keyword: &Token, method: &Token, id: ExprId) -> Result<Value> {
        let distance: usize = match self.locals.get(&id) {
            Some(&d) => d,
            None => return Err(FenError::runtime(keyword, "Unresolved 'super'.")),
        };

        let superclass: Rc<FenClass> =
            match Environment::get_at(&self.environment, distance, "super") {
                Some(Value::Class(class)) => class,
                _ => return Err(FenError::runtime(keyword, "Unresolved 'super'.")),
            };

        let object: Value = Environment::get_at(&self.environment, distance - 1, "this")
            .ok_or_else(|| FenError::runtime(keyword, "Unresolved 'this' around 'super'."))?;

        let found: Rc<FenFunction> =
            superclass.find_method(&method.lexeme).ok_or_else(|| {
                FenError::runtime(method, format!("Undefined property '{}'.", method.lexeme))
            })?;

        Ok(Value::Function(Rc::new(found.bind(object))))
    }

    /// Invokes a callable value: native, user function, lambda, or class.
    fn invoke_callable(
        &mut self,
        callee: &Value,
        paren: &Token,
        arguments: &[Value],
    ) -> Result<Value> {
        match callee {
            Value::Native(native) => {
                check_arity(native.arity, arguments.len(), paren)?;

                debug!("Calling native function '{}'", native.name);
                (native.func)(arguments).map_err(|message| FenError::runtime(paren, message))
            }

            Value::Function(function) => {
                check_arity(function.arity(), arguments.len(), paren)?;
                function.call(self, arguments)
            }

            Value::Lambda(lambda) => {
                check_arity(lambda.arity(), arguments.len(), paren)?;
                lambda.call(self, arguments)
            }

            Value::Class(class) => {
                check_arity(class.arity(), arguments.len(), paren)?;

                debug!("Instantiating class '{}'", class.name);
                let instance = Rc::new(FenInstance::new(class.clone()));

                // The initializer's own return value is discarded; the call
                // always yields the instance.
                if let Some(initializer) = class.find_method("init") {
                    initializer
                        .bind(Value::Instance(instance.clone()))
                        .call(self, arguments)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(FenError::runtime(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────── free helpers ─────────────────────────────

fn literal_value(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::Str(s) => Value::Str(s.clone()),
        LiteralValue::True => Value::Bool(true),
        LiteralValue::False => Value::Bool(false),
        LiteralValue::Nil => Value::Nil,
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(FenError::runtime(operator, "Operands must be numbers.")),
    }
}

fn check_arity(expected: usize, actual: usize, paren: &Token) -> Result<()> {
    if expected != actual {
        return Err(FenError::runtime(
            paren,
            format!("Expected {} arguments but got {}.", expected, actual),
        ));
    }

    Ok(())
}

/// Seed the global frame with the host-provided natives.  Anything matching
/// the `{arity, call}` contract can be added here.
fn define_natives(globals: &Rc<RefCell<Environment>>) {
    debug!("Defining native function 'clock'");

    globals.borrow_mut().define(
        "clock",
        Value::Native(Rc::new(NativeFunction {
            name: "clock".to_string(),
            arity: 0,
            func: |_args: &[Value]| {
                let now = chrono::Utc::now();
                Ok(Value::Number(now.timestamp_millis() as f64 / 1000.0))
            },
        })),
    );
}
