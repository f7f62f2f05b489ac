/*!
Recursive-descent, precedence-climbing parser for Fen.

Grammar (EBNF — condensed)
--------------------------

```text
program        → declaration* EOF ;
declaration    → classDecl | funDecl | varDecl | statement ;
classDecl      → "class" IDENT ( "<" IDENT )? "{" member* "}" ;
member         → "class" function            // static method
               | IDENT block                 // getter (no parameter list)
               | function ;                  // instance method
funDecl        → "fun" IDENT "(" parameters? ")" block ;
varDecl        → "var" IDENT ( "=" expression )? ";" ;
statement      → exprStmt | printStmt | forStmt | whileStmt
               | ifStmt | block | returnStmt | breakStmt ;
forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
                 expression? ";" expression? ")" statement ;
breakStmt      → "break" ";" ;
parameters     → IDENT ( "," IDENT )* ;
expression     → assignment ;
assignment     → ( call "." )? IDENT "=" assignment | logic_or ;
logic_or       → logic_and ( "or" logic_and )* ;
logic_and      → ternary ( "and" ternary )* ;
ternary        → equality ( "?" ternary ":" ternary )? ;
equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term           → factor ( ( "-" | "+" ) factor )* ;
factor         → unary ( ( "/" | "*" ) unary )* ;
unary          → ( "!" | "-" ) unary | call ;
call           → primary ( "(" arguments? ")" | "." IDENT )* ;
arguments      → expression ( "," expression )* ;
primary        → NUMBER | STRING | "true" | "false" | "nil"
               | "this" | "super" "." IDENT | IDENT
               | "fun" "(" parameters? ")" block
               | "(" expression ")" ;
```

`for` has no AST node: it desugars here into an initializer block around a
`While`, so the resolver and evaluator never see it.

Error recovery
--------------

Every syntax error goes to the shared [`Reporter`]; `declaration` then calls
`synchronize()`, which discards tokens until a `;` or a token that starts a
new declaration, bounding the blast radius of one error to roughly one
statement.  Two diagnostics are deliberately non-fatal: an invalid assignment
target and the 255-entry parameter/argument cap — both report and let the
parse continue in place.

Logging policy: `info!` for lifecycle milestones (`new`, `parse`), `debug!`
when descending into grammar branches.
*/

use std::rc::Rc;

use crate::ast::{Expr, ExprId, FunctionDecl, LambdaDecl, LiteralValue, Stmt};
use crate::diagnostics::Reporter;
use crate::error::{FenError, Result};
use crate::token::{Token, TokenType};

use log::{debug, info};

/// Top-level parser over an immutable slice of tokens.
pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    next_id: ExprId,
    reporter: &'a mut Reporter,
}

impl<'a> Parser<'a> {
    /// Construct a new parser.
    pub fn new(tokens: &'a [Token], reporter: &'a mut Reporter) -> Self {
        Self::with_base_id(tokens, reporter, 0)
    }

    /// Construct a parser whose expression ids start at `base`.  The REPL
    /// uses this so ids stay unique across lines sharing one interpreter.
    pub fn with_base_id(tokens: &'a [Token], reporter: &'a mut Reporter, base: ExprId) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        Self {
            tokens,
            current: 0,
            next_id: base,
            reporter,
        }
    }

    /// The next unassigned expression id (high-water mark after a parse).
    pub fn next_id(&self) -> ExprId {
        self.next_id
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program and return its statement list.  Syntax errors
    /// are reported through the sink; the parse continues from the next
    /// statement boundary so one error does not hide the rest.
    pub fn parse(&mut self) -> Vec<Stmt> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        statements
    }

    /// Hand out a fresh identity for a resolvable expression node.
    #[inline]
    fn fresh_id(&mut self) -> ExprId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ──────────────────────── declaration rules ───────────────────

    fn declaration(&mut self) -> Option<Stmt> {
        debug!("Entering declaration");

        let result = if self.matches(TokenType::CLASS) {
            self.class_declaration()
        } else if self.check(TokenType::FUN) && self.check_next(TokenType::IDENTIFIER) {
            // `fun` followed by `(` is a lambda expression, handled by
            // `primary`; only a named `fun` is a declaration.
            self.advance();
            self.function("function").map(Stmt::Function)
        } else if self.matches(TokenType::VAR) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(err) => {
                self.reporter.emit(&err);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect class name.")?.clone();

        let superclass: Option<Expr> = if self.matches(TokenType::LESS) {
            let super_name: Token = self
                .consume(TokenType::IDENTIFIER, "Expect superclass name.")?
                .clone();

            Some(Expr::Variable {
                name: super_name,
                id: self.fresh_id(),
            })
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();
        let mut getters: Vec<Rc<FunctionDecl>> = Vec::new();
        let mut statics: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if self.matches(TokenType::CLASS) {
                statics.push(self.function("static method")?);
            } else if self.check(TokenType::IDENTIFIER) && !self.check_next(TokenType::LEFT_PAREN)
            {
                // A member name with no parameter list is a getter.
                getters.push(self.function("getter")?);
            } else {
                methods.push(self.function("method")?);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
            getters,
            statics,
        })
    }

    /// Parse a named function, method, getter, or static method.  Getters
    /// are the only kind without a parameter list.
    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>> {
        debug!("Parsing {}", kind);

        let name: Token = self
            .consume(TokenType::IDENTIFIER, &format!("Expect {} name.", kind))?
            .clone();

        let mut params: Vec<Token> = Vec::new();

        if kind != "getter" {
            self.consume(
                TokenType::LEFT_PAREN,
                &format!("Expect '(' after {} name.", kind),
            )?;

            if !self.check(TokenType::RIGHT_PAREN) {
                loop {
                    if params.len() >= 255 {
                        let at: Token = self.peek().clone();
                        self.reporter
                            .token_error(&at, "Can't have more than 255 parameters.");
                    }

                    params.push(
                        self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?
                            .clone(),
                    );

                    if !self.matches(TokenType::COMMA) {
                        break;
                    }
                }
            }

            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;
        }

        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expect '{{' before {} body.", kind),
        )?;

        let body: Vec<Stmt> = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self
            .consume(TokenType::IDENTIFIER, "Expect variable name.")?
            .clone();

        let initializer: Option<Expr> = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::BREAK) {
            self.break_statement()
        } else if self.matches(TokenType::LEFT_BRACE) {
            Ok(Stmt::Block(self.block()?))
        } else if self.matches(TokenType::PRINT) {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    /// Desugar `for (init; cond; incr) body` into
    /// `{ init; while (cond) { body; incr; } }`.
    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer: Option<Stmt> = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::VAR) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment: Option<Expr> = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body: Stmt = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition: Expr = condition.unwrap_or(Expr::Literal(LiteralValue::True));
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value: Expr = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt>> = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;
        let body: Box<Stmt> = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();
        let value: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn break_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        self.consume(TokenType::SEMICOLON, "Expect ';' after 'break'.")?;

        Ok(Stmt::Break { keyword })
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;
        Ok(statements)
    }

    // ─────────────────────── expression rules ─────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.logical_or()?;

        if self.matches(TokenType::EQUAL) {
            let equals: Token = self.previous().clone();
            let value: Expr = self.assignment()?;

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                    id: self.fresh_id(),
                }),

                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),

                // Report at the `=` token but keep the surrounding parse
                // alive — no synchronization needed.
                other => {
                    self.reporter
                        .token_error(&equals, "Invalid assignment target.");
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.logical_and()?;

        while self.matches(TokenType::OR) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.logical_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.ternary()?;

        while self.matches(TokenType::AND) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.ternary()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// `cond ? a : b`, right-associative: the else branch recurses back into
    /// this production, so `x ? a : y ? b : c` groups to the right.
    fn ternary(&mut self) -> Result<Expr> {
        let expr: Expr = self.equality()?;

        if self.matches(TokenType::QUESTION) {
            let on_true: Expr = self.ternary()?;

            self.consume(
                TokenType::COLON,
                "Expect ':' after then branch of conditional.",
            )?;

            let on_false: Expr = self.ternary()?;

            return Ok(Expr::Ternary {
                condition: Box::new(expr),
                on_true: Box::new(on_true),
                on_false: Box::new(on_false),
            });
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.comparison()?;

        while self.matches(TokenType::BANG_EQUAL) || self.matches(TokenType::EQUAL_EQUAL) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.comparison()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.term()?;

        while self.matches(TokenType::GREATER)
            || self.matches(TokenType::GREATER_EQUAL)
            || self.matches(TokenType::LESS)
            || self.matches(TokenType::LESS_EQUAL)
        {
            let operator: Token = self.previous().clone();
            let right: Expr = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.factor()?;

        while self.matches(TokenType::MINUS) || self.matches(TokenType::PLUS) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.unary()?;

        while self.matches(TokenType::STAR) || self.matches(TokenType::SLASH) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.matches(TokenType::BANG) || self.matches(TokenType::MINUS) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        // A binary operator with nothing to its left gets its own
        // diagnostic instead of a generic "Expect expression.".
        if self.matches(TokenType::PLUS)
            || self.matches(TokenType::STAR)
            || self.matches(TokenType::SLASH)
            || self.matches(TokenType::EQUAL_EQUAL)
            || self.matches(TokenType::BANG_EQUAL)
            || self.matches(TokenType::GREATER)
            || self.matches(TokenType::GREATER_EQUAL)
            || self.matches(TokenType::LESS)
            || self.matches(TokenType::LESS_EQUAL)
        {
            let operator: Token = self.previous().clone();
            return Err(FenError::parse_at(
                &operator,
                "Binary operator without left-hand operand.",
            ));
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.matches(TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenType::DOT) {
                let name: Token = self
                    .consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?
                    .clone();

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= 255 {
                    let at: Token = self.peek().clone();
                    self.reporter
                        .token_error(&at, "Can't have more than 255 arguments.");
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren: Token = self
            .consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?
            .clone();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.matches(TokenType::FALSE) {
            return Ok(Expr::Literal(LiteralValue::False));
        }
        if self.matches(TokenType::TRUE) {
            return Ok(Expr::Literal(LiteralValue::True));
        }
        if self.matches(TokenType::NIL) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }

        if self.matches(TokenType::NUMBER(0.0)) {
            if let TokenType::NUMBER(n) = &self.previous().token_type {
                return Ok(Expr::Literal(LiteralValue::Number(*n)));
            }
        }

        if let TokenType::STRING(ref s) = self.peek().token_type {
            let value: String = s.clone();
            self.advance();
            return Ok(Expr::Literal(LiteralValue::Str(value)));
        }

        if self.matches(TokenType::THIS) {
            let keyword: Token = self.previous().clone();
            let id: ExprId = self.fresh_id();
            return Ok(Expr::This { keyword, id });
        }

        if self.matches(TokenType::SUPER) {
            let keyword: Token = self.previous().clone();
            self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;
            let method: Token = self
                .consume(TokenType::IDENTIFIER, "Expect superclass method name.")?
                .clone();
            let id: ExprId = self.fresh_id();
            return Ok(Expr::Super {
                keyword,
                method,
                id,
            });
        }

        if self.matches(TokenType::IDENTIFIER) {
            let name: Token = self.previous().clone();
            let id: ExprId = self.fresh_id();
            return Ok(Expr::Variable { name, id });
        }

        if self.matches(TokenType::FUN) {
            let keyword: Token = self.previous().clone();
            return self.lambda(keyword);
        }

        if self.matches(TokenType::LEFT_PAREN) {
            let expr: Expr = self.expression()?;

            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(FenError::parse_at(self.peek(), "Expect expression."))
    }

    /// Anonymous function literal: `fun (a, b) { ... }`.  The `fun` keyword
    /// has already been consumed.
    fn lambda(&mut self, keyword: Token) -> Result<Expr> {
        debug!("Parsing lambda on line {}", keyword.line);

        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'fun'.")?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= 255 {
                    let at: Token = self.peek().clone();
                    self.reporter
                        .token_error(&at, "Can't have more than 255 parameters.");
                }

                params.push(
                    self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?
                        .clone(),
                );

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;
        self.consume(TokenType::LEFT_BRACE, "Expect '{' before lambda body.")?;

        let body: Vec<Stmt> = self.block()?;

        Ok(Expr::Lambda(Rc::new(LambdaDecl {
            keyword,
            params,
            body,
        })))
    }

    // ────────────────────── utility helpers ───────────────────────

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();

            return true;
        }

        false
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<&'a Token> {
        if self.check(ttype) {
            return Ok(self.advance());
        }

        Err(FenError::parse_at(self.peek(), message))
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    /// Two-token lookahead: the token *after* the current one.  Used to tell
    /// function declarations from lambdas and getters from methods.
    #[inline(always)]
    fn check_next(&self, ttype: TokenType) -> bool {
        match self.tokens.get(self.current + 1) {
            Some(token) => token.token_type == ttype,
            None => false,
        }
    }

    #[inline(always)]
    fn advance(&mut self) -> &'a Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &'a Token {
        &self.tokens[self.current]
    }

    #[inline(always)]
    fn previous(&self) -> &'a Token {
        &self.tokens[self.current - 1]
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        self.advance(); // skip the token that caused the error

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,
                _ => {}
            }

            self.advance();
        }
    }
}
