//! Static resolver pass for the **Fen** interpreter.
//!
//! One pre-order walk of the AST that does three things:
//! 1. Build lexical scopes — a stack of maps tracking each name through
//!    declared → defined → used.
//! 2. Report static errors (redeclaration, self-referential initializer,
//!    misplaced `return`/`break`, `this`/`super` outside their contexts),
//!    continuing after each so one pass surfaces as many as possible.
//! 3. Record, for every variable occurrence (`this` and `super` included),
//!    how many scopes sit between the use and its declaration, by calling
//!    back into [`Interpreter::note_local`].  Names found in no scope are
//!    left to global lookup at evaluation time.
//!
//! The scope structure built here must mirror the environment chain the
//! evaluator will build, frame for frame.  The one subtle spot is classes:
//! static methods are resolved *before* the `this` scope opens, because at
//! runtime they close over the class environment unbound — no `this` frame
//! ever exists for them.

use crate::ast::{Expr, FunctionDecl, LambdaDecl, Stmt};
use crate::diagnostics::Reporter;
use crate::interpreter::Interpreter;
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;

/// What kind of function body are we inside?  Drives `return`/`this` checks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Lambda,
    Method,
    StaticMethod,
    Getter,
    Initializer,
}

/// Are we inside a class body, and does it have a superclass?
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Per-name bookkeeping inside one scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum VarState {
    Declared,
    Defined,
    Used,
}

struct Local {
    state: VarState,
    line: usize,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'a> {
    interpreter: &'a mut Interpreter,
    reporter: &'a mut Reporter,
    scopes: Vec<HashMap<String, Local>>,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

impl<'a> Resolver<'a> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'a mut Interpreter, reporter: &'a mut Reporter) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            reporter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    /// Walk all top-level statements.  Static errors go to the reporter;
    /// resolution always covers the whole tree.
    pub fn resolve(&mut self, statements: &[Stmt]) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so the initializer
                // sees the name as declared-but-unreadable.
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);

                self.loop_depth += 1;
                self.resolve_stmt(body);
                self.loop_depth -= 1;
            }

            Stmt::Break { keyword } => {
                if self.loop_depth == 0 {
                    self.reporter
                        .token_error(keyword, "Can't use 'break' outside of a loop.");
                }
            }

            Stmt::Function(declaration) => {
                // The name is visible *inside* its own body (recursion).
                self.declare(&declaration.name);
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.reporter
                        .token_error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.reporter
                            .token_error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr);
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                getters,
                statics,
            } => {
                self.resolve_class(name, superclass.as_ref(), methods, getters, statics);
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[std::rc::Rc<FunctionDecl>],
        getters: &[std::rc::Rc<FunctionDecl>],
        statics: &[std::rc::Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass_expr) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass_expr
            {
                if super_name.lexeme == name.lexeme {
                    self.reporter
                        .token_error(super_name, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass_expr);

            self.begin_scope();
            self.bind_keyword("super", name.line);
        }

        // Statics first: they are never bound to an instance, so their scope
        // chain must not contain the `this` frame.
        for declaration in statics {
            self.resolve_function(declaration, FunctionType::StaticMethod);
        }

        self.begin_scope();
        self.bind_keyword("this", name.line);

        for declaration in methods {
            let function_type = if declaration.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(declaration, function_type);
        }

        for declaration in getters {
            self.resolve_function(declaration, FunctionType::Getter);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Ternary {
                condition,
                on_true,
                on_false,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(on_true);
                self.resolve_expr(on_false);
            }

            Expr::Variable { name, id } => {
                // Cannot read a local in its own initializer.
                if let Some(scope) = self.scopes.last() {
                    if let Some(local) = scope.get(&name.lexeme) {
                        if local.state == VarState::Declared {
                            self.reporter.token_error(
                                name,
                                "Can't read local variable in its own initializer.",
                            );
                        }
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { name, value, id } => {
                // First resolve RHS, then bind LHS.
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { keyword, id } => {
                if self.current_class == ClassType::None {
                    self.reporter
                        .token_error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                if self.current_function == FunctionType::StaticMethod {
                    self.reporter
                        .token_error(keyword, "Can't use 'this' in a static method.");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { keyword, id, .. } => match self.current_class {
                _ if self.current_function == FunctionType::StaticMethod => {
                    self.reporter
                        .token_error(keyword, "Can't use 'super' in a static method.");
                }
                ClassType::None => {
                    self.reporter
                        .token_error(keyword, "Can't use 'super' outside of a class.");
                }
                ClassType::Class => {
                    self.reporter
                        .token_error(keyword, "Can't use 'super' in a class with no superclass.");
                }
                ClassType::Subclass => {
                    self.resolve_local(*id, keyword);
                }
            },

            Expr::Lambda(declaration) => {
                self.resolve_lambda(declaration);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.  `break`
    /// cannot cross a call boundary, so the loop depth resets for the body.
    fn resolve_function(&mut self, declaration: &FunctionDecl, function_type: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = function_type;
        let enclosing_loops = std::mem::replace(&mut self.loop_depth, 0);

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        for stmt in &declaration.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.loop_depth = enclosing_loops;
        self.current_function = enclosing;
    }

    fn resolve_lambda(&mut self, declaration: &LambdaDecl) {
        let enclosing = self.current_function;
        self.current_function = FunctionType::Lambda;
        let enclosing_loops = std::mem::replace(&mut self.loop_depth, 0);

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        for stmt in &declaration.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.loop_depth = enclosing_loops;
        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope, flagging names that were never read.
    fn end_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            for (name, local) in &scope {
                if local.state != VarState::Used {
                    self.reporter
                        .warning(local.line, &format!("'{}' is never used.", name));
                }
            }
        }
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.reporter
                    .token_error(name, "Already a variable with this name in this scope.");
            }

            scope.insert(
                name.lexeme.clone(),
                Local {
                    state: VarState::Declared,
                    line: name.line,
                },
            );
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(local) = scope.get_mut(&name.lexeme) {
                local.state = VarState::Defined;
            }
        }
    }

    /// Bind an implicit keyword (`this`/`super`) in the current scope,
    /// pre-marked used so it never trips the unused diagnostic.
    fn bind_keyword(&mut self, name: &str, line: usize) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Local {
                    state: VarState::Used,
                    line,
                },
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at the depth of the innermost scope
    /// containing the name, or leave it for global lookup if no scope does.
    fn resolve_local(&mut self, id: crate::ast::ExprId, name: &Token) {
        // check innermost → outermost
        for (depth, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(local) = scope.get_mut(&name.lexeme) {
                local.state = VarState::Used;

                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.note_local(id, depth);
                return;
            }
        }

        // not found in any local scope ⇒ global lookup at runtime
        debug!("Resolved '{}' as global", name.lexeme);
    }
}
