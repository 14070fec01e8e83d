use crate::expr;
use crate::scanner;

use log::debug;

use std::collections::HashSet;
use std::rc::Rc;

const MAX_PARAMS: usize = 255;

#[derive(Default)]
struct Parser {
    tokens: Vec<scanner::Token>,
    current: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unexpected token {:?} at line={},col={}", .0.ty, .0.line, .0.col)]
    UnexpectedToken(scanner::Token),
    #[error(
        "Expected token {:?} but found {:?} at line={},col={}: {}",
        .expected, .found.ty, .found.line, .found.col, .on_err
    )]
    TokenMismatch {
        expected: scanner::TokenType,
        found: scanner::Token,
        on_err: String,
    },
    #[error("Cannot have more than 255 parameters in a {kind:?} declaration. Line={line},col={col}")]
    MaxParamsExceeded {
        kind: FunctionKind,
        line: usize,
        col: i64,
    },
    #[error("invalid assignment target at line={line},col={col}")]
    InvalidAssignment { line: usize, col: i64 },
    #[error("Cannot have more than 255 arguments to a function call. Line={line},col={col}")]
    TooManyArguments { line: usize, col: i64 },
    #[error("Expected expression, but found token {token_type:?} at line={line},col={col}")]
    ExpectedExpression {
        token_type: scanner::TokenType,
        line: usize,
        col: i64,
    },
    #[error("invalid token in unary op {token_type:?} at line={line},col={col}")]
    InvalidTokenInUnaryOp {
        token_type: scanner::TokenType,
        line: usize,
        col: i64,
    },
    #[error("invalid token in binary op {token_type:?} at line={line},col={col}")]
    InvalidTokenInBinaryOp {
        token_type: scanner::TokenType,
        line: usize,
        col: i64,
    },
    #[error("Already a variable named '{name}' in this scope at line={line},col={col}")]
    Redeclaration { name: String, line: usize, col: i64 },
}

impl Error {
    pub fn location(&self) -> expr::SourceLocation {
        let (line, col) = match self {
            Error::UnexpectedToken(tok) => (tok.line, tok.col),
            Error::TokenMismatch { found, .. } => (found.line, found.col),
            Error::MaxParamsExceeded { line, col, .. }
            | Error::InvalidAssignment { line, col }
            | Error::TooManyArguments { line, col }
            | Error::ExpectedExpression { line, col, .. }
            | Error::InvalidTokenInUnaryOp { line, col, .. }
            | Error::InvalidTokenInBinaryOp { line, col, .. }
            | Error::Redeclaration { line, col, .. } => (*line, *col),
        };
        expr::SourceLocation { line, col }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Method,
}

pub fn parse(mut tokens: Vec<scanner::Token>) -> Result<Vec<expr::Stmt>, Error> {
    if tokens.last().map(|tok| tok.ty) != Some(scanner::TokenType::Eof) {
        let (line, col) = tokens.last().map_or((1, 0), |tok| (tok.line, tok.col));
        tokens.push(scanner::Token {
            ty: scanner::TokenType::Eof,
            lexeme: String::new(),
            literal: None,
            line,
            col,
        });
    }

    let mut p = Parser {
        tokens,
        ..Default::default()
    };
    let stmts = p.parse()?;
    debug!("parsed {} top-level statements", stmts.len());
    Ok(stmts)
}

/*
Recursive descent using the following grammar

program     → declaration* EOF ;

declaration → classDecl
            | funDecl
            | varDecl
            | statement ;

classDecl → "class" IDENTIFIER ( "<" IDENTIFIER )?
            "{" function* "}" ;

funDecl  → "fun" function ;
function → IDENTIFIER "(" parameters? ")" block ;
parameters  → IDENTIFIER ( "," IDENTIFIER )* ;

statement → exprStmt
          | forStmt
          | ifStmt
          | printStmt
          | returnStmt
          | whileStmt
          | block ;

returnStmt → "return" expression? ";" ;

forStmt   → "for" "(" ( varDecl | exprStmt | ";" )
                      expression? ";"
                      expression? ")" statement ;

whileStmt → "while" "(" expression ")" statement ;

ifStmt    → "if" "(" expression ")" statement ( "else" statement )? ;

block     → "{" declaration* "}" ;

varDecl → "var" IDENTIFIER ( "=" expression )? ";" ;

exprStmt  → expression ";" ;
printStmt → "print" expression ";" ;

expression → assignment ;
assignment → ( call "." )? IDENTIFIER "=" assignment
           | logic_or;
logic_or   → logic_and ( "or" logic_and )* ;
logic_and  → equality ( "and" equality )* ;

equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → addition ( ( ">" | ">=" | "<" | "<=" ) addition )* ;
addition       → multiplication ( ( "-" | "+" ) multiplication )* ;
multiplication → unary ( ( "/" | "*" ) unary )* ;
unary → ( "!" | "-" ) unary | call ;
call → primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
arguments → expression ( "," expression )* ;

primary → "true" | "false" | "nil" | "this"
        | NUMBER | STRING | IDENTIFIER | "(" expression ")" ;

*/
impl Parser {
    pub fn parse(&mut self) -> Result<Vec<expr::Stmt>, Error> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            let stmt = self.declaration()?;
            statements.push(stmt);
        }

        Ok(statements)
    }

    fn declaration(&mut self) -> Result<expr::Stmt, Error> {
        if self.matches(scanner::TokenType::Var) {
            return self.var_decl();
        }

        if self.matches(scanner::TokenType::Fun) {
            return Ok(expr::Stmt::FunDecl(Rc::new(
                self.fun_decl(FunctionKind::Function)?,
            )));
        }

        if self.matches(scanner::TokenType::Class) {
            return self.class_decl();
        }

        self.statement()
    }

    fn class_decl(&mut self) -> Result<expr::Stmt, Error> {
        let name_tok = self.consume(scanner::TokenType::Identifier, "Expected class name")?;
        let class_symbol = Parser::symbol(name_tok);

        let superclass_maybe = if self.matches(scanner::TokenType::Less) {
            let superclass_tok =
                self.consume(scanner::TokenType::Identifier, "Expected superclass name.")?;
            Some(Parser::symbol(superclass_tok))
        } else {
            None
        };

        self.consume(scanner::TokenType::LeftBrace, "Expected { after class name")?;

        let mut methods = Vec::new();
        while !self.check(scanner::TokenType::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.fun_decl(FunctionKind::Method)?));
        }
        let methods = methods;

        self.consume(
            scanner::TokenType::RightBrace,
            "Expected } after class body",
        )?;

        Ok(expr::Stmt::ClassDecl(expr::ClassDecl {
            name: class_symbol,
            superclass: superclass_maybe,
            methods,
        }))
    }

    fn fun_decl(&mut self, kind: FunctionKind) -> Result<expr::FunDecl, Error> {
        let name_tok = self.consume(
            scanner::TokenType::Identifier,
            format!("Expected {:?} name", kind).as_ref(),
        )?;
        let fun_symbol = Parser::symbol(name_tok);

        self.consume(
            scanner::TokenType::LeftParen,
            format!("Expected ( after {:?} name", kind).as_ref(),
        )?;

        let mut parameters = Vec::new();

        if !self.check(scanner::TokenType::RightParen) {
            loop {
                if parameters.len() >= MAX_PARAMS {
                    let peek_tok = self.peek();
                    return Err(Error::MaxParamsExceeded {
                        kind,
                        line: peek_tok.line,
                        col: peek_tok.col,
                    });
                }

                let tok = self.consume(scanner::TokenType::Identifier, "Expected parameter name")?;
                parameters.push(Parser::symbol(tok));

                if !self.matches(scanner::TokenType::Comma) {
                    break;
                }
            }
        }
        let parameters = parameters;

        self.consume(
            scanner::TokenType::RightParen,
            "Expected ) after parameter list",
        )?;
        self.consume(
            scanner::TokenType::LeftBrace,
            "Expected { before function body",
        )?;
        let body = self.block()?;

        // parameters and body-level locals share one scope
        Parser::check_unique(parameters.iter().chain(Parser::var_decls(&body)))?;

        Ok(expr::FunDecl {
            name: fun_symbol,
            params: parameters,
            body,
        })
    }

    fn var_decl(&mut self) -> Result<expr::Stmt, Error> {
        let name_tok = self.consume(scanner::TokenType::Identifier, "Expected variable name")?;
        let name = Parser::symbol(name_tok);

        let maybe_initializer = if self.matches(scanner::TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            scanner::TokenType::Semicolon,
            "Expected ; after variable declaration",
        )?;

        Ok(expr::Stmt::VarDecl(name, maybe_initializer))
    }

    fn statement(&mut self) -> Result<expr::Stmt, Error> {
        if self.matches(scanner::TokenType::Print) {
            return self.print_statement();
        }

        if self.matches(scanner::TokenType::While) {
            return self.while_statement();
        }

        if self.matches(scanner::TokenType::LeftBrace) {
            return Ok(expr::Stmt::Block(self.block()?));
        }

        if self.matches(scanner::TokenType::For) {
            return self.for_statement();
        }

        if self.matches(scanner::TokenType::If) {
            return self.if_statement();
        }

        if self.matches(scanner::TokenType::Return) {
            return self.return_statement();
        }

        self.expression_statement()
    }

    fn return_statement(&mut self) -> Result<expr::Stmt, Error> {
        let prev_tok = self.previous();
        let location = expr::SourceLocation {
            line: prev_tok.line,
            col: prev_tok.col,
        };

        let maybe_retval = if !self.matches(scanner::TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        if maybe_retval.is_some() {
            self.consume(
                scanner::TokenType::Semicolon,
                "Expected ; after return value",
            )?;
        }

        Ok(expr::Stmt::Return(location, maybe_retval))
    }

    fn for_statement(&mut self) -> Result<expr::Stmt, Error> {
        self.consume(scanner::TokenType::LeftParen, "Expected ( after for.")?;

        let mut maybe_initializer: Option<expr::Stmt> = None;
        if self.matches(scanner::TokenType::Semicolon) {
        } else if self.matches(scanner::TokenType::Var) {
            maybe_initializer = Some(self.var_decl()?)
        } else {
            maybe_initializer = Some(self.expression_statement()?)
        }
        let maybe_initializer = maybe_initializer;

        let mut maybe_condition: Option<expr::Expr> = None;
        if !self.check(scanner::TokenType::Semicolon) {
            maybe_condition = Some(self.expression()?)
        }
        let maybe_condition = maybe_condition;

        self.consume(
            scanner::TokenType::Semicolon,
            "Expected ; after loop condition",
        )?;

        let maybe_increment = if !self.check(scanner::TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            scanner::TokenType::RightParen,
            "Expected ) after for clauses",
        )?;

        let mut body = self.statement()?;

        if let Some(increment) = maybe_increment {
            body = expr::Stmt::Block(vec![body, expr::Stmt::Expr(increment)])
        }

        let condition = match maybe_condition {
            Some(cond) => cond,
            None => expr::Expr::Literal(expr::Literal::True),
        };
        body = expr::Stmt::While(condition, Box::new(body));

        if let Some(initializer) = maybe_initializer {
            body = expr::Stmt::Block(vec![initializer, body])
        }
        let body = body;

        Ok(body)
    }

    fn while_statement(&mut self) -> Result<expr::Stmt, Error> {
        self.consume(scanner::TokenType::LeftParen, "Expected ( after while")?;
        let cond = self.expression()?;
        self.consume(
            scanner::TokenType::RightParen,
            "Expected ) after while condition",
        )?;
        let body = Box::new(self.statement()?);
        Ok(expr::Stmt::While(cond, body))
    }

    fn if_statement(&mut self) -> Result<expr::Stmt, Error> {
        self.consume(scanner::TokenType::LeftParen, "Expected ( after if.")?;
        let cond = self.expression()?;
        self.consume(
            scanner::TokenType::RightParen,
            "Expected ) after if condition.",
        )?;
        let then_branch = Box::new(self.statement()?);
        let maybe_else_branch = if self.matches(scanner::TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(expr::Stmt::If(cond, then_branch, maybe_else_branch))
    }

    fn block(&mut self) -> Result<Vec<expr::Stmt>, Error> {
        let mut stmts = Vec::new();

        while !self.check(scanner::TokenType::RightBrace) && !self.is_at_end() {
            stmts.push(self.declaration()?)
        }

        self.consume(scanner::TokenType::RightBrace, "Expected } after block.")?;

        Parser::check_unique(Parser::var_decls(&stmts))?;

        Ok(stmts)
    }

    fn print_statement(&mut self) -> Result<expr::Stmt, Error> {
        let expr = self.expression()?;
        self.consume(scanner::TokenType::Semicolon, "Expected ; after value")?;
        Ok(expr::Stmt::Print(expr))
    }

    fn expression_statement(&mut self) -> Result<expr::Stmt, Error> {
        let expr = self.expression()?;
        self.consume(scanner::TokenType::Semicolon, "Expected ; after expression")?;
        Ok(expr::Stmt::Expr(expr))
    }

    fn expression(&mut self) -> Result<expr::Expr, Error> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<expr::Expr, Error> {
        let expr = self.or()?;

        if self.matches(scanner::TokenType::Equal) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                expr::Expr::Variable(sym) => Ok(expr::Expr::Assign(sym, Box::new(value))),
                expr::Expr::Get(e, attr) => Ok(expr::Expr::Set(e, attr, Box::new(value))),
                _ => Err(Error::InvalidAssignment {
                    line: equals.line,
                    col: equals.col,
                }),
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<expr::Expr, Error> {
        let mut expr = self.and()?;

        while self.matches(scanner::TokenType::Or) {
            let right = self.and()?;
            expr = expr::Expr::Logical(Box::new(expr), expr::LogicalOp::Or, Box::new(right));
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<expr::Expr, Error> {
        let mut expr = self.equality()?;

        while self.matches(scanner::TokenType::And) {
            let right = self.equality()?;
            expr = expr::Expr::Logical(Box::new(expr), expr::LogicalOp::And, Box::new(right));
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<expr::Expr, Error> {
        let mut expr = self.comparison()?;

        while self.match_one_of(&[
            scanner::TokenType::BangEqual,
            scanner::TokenType::EqualEqual,
        ]) {
            let binop = Parser::op_token_to_binop(self.previous())?;
            let right = Box::new(self.comparison()?);
            expr = expr::Expr::Binary(Box::new(expr), binop, right);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<expr::Expr, Error> {
        let mut expr = self.addition()?;

        while self.match_one_of(&[
            scanner::TokenType::Greater,
            scanner::TokenType::GreaterEqual,
            scanner::TokenType::Less,
            scanner::TokenType::LessEqual,
        ]) {
            let binop = Parser::op_token_to_binop(self.previous())?;
            let right = Box::new(self.addition()?);
            expr = expr::Expr::Binary(Box::new(expr), binop, right);
        }
        Ok(expr)
    }

    fn addition(&mut self) -> Result<expr::Expr, Error> {
        let mut expr = self.multiplication()?;

        while self.match_one_of(&[scanner::TokenType::Minus, scanner::TokenType::Plus]) {
            let binop = Parser::op_token_to_binop(self.previous())?;
            let right = Box::new(self.multiplication()?);
            expr = expr::Expr::Binary(Box::new(expr), binop, right);
        }
        Ok(expr)
    }

    fn multiplication(&mut self) -> Result<expr::Expr, Error> {
        let mut expr = self.unary()?;

        while self.match_one_of(&[scanner::TokenType::Slash, scanner::TokenType::Star]) {
            let binop = Parser::op_token_to_binop(self.previous())?;
            let right = Box::new(self.unary()?);
            expr = expr::Expr::Binary(Box::new(expr), binop, right);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<expr::Expr, Error> {
        if self.match_one_of(&[scanner::TokenType::Bang, scanner::TokenType::Minus]) {
            let unary_op = Parser::op_token_to_unary_op(self.previous())?;
            let right = Box::new(self.unary()?);
            return Ok(expr::Expr::Unary(unary_op, right));
        }
        self.call()
    }

    fn call(&mut self) -> Result<expr::Expr, Error> {
        let mut expr = self.primary()?;

        loop {
            if self.matches(scanner::TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.matches(scanner::TokenType::Dot) {
                let name_tok = self.consume(
                    scanner::TokenType::Identifier,
                    "Expected property name after '.'.",
                )?;
                expr = expr::Expr::Get(Box::new(expr), Parser::symbol(name_tok));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: expr::Expr) -> Result<expr::Expr, Error> {
        let mut arguments = Vec::new();

        if !self.check(scanner::TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_PARAMS {
                    let peek_tok = self.peek();
                    return Err(Error::TooManyArguments {
                        line: peek_tok.line,
                        col: peek_tok.col,
                    });
                }
                arguments.push(self.expression()?);
                if !self.matches(scanner::TokenType::Comma) {
                    break;
                }
            }
        }

        let token = self.consume(
            scanner::TokenType::RightParen,
            "Expected ) after arguments.",
        )?;

        Ok(expr::Expr::Call(
            Box::new(callee),
            expr::SourceLocation {
                line: token.line,
                col: token.col,
            },
            arguments,
        ))
    }

    fn primary(&mut self) -> Result<expr::Expr, Error> {
        if self.matches(scanner::TokenType::False) {
            return Ok(expr::Expr::Literal(expr::Literal::False));
        }
        if self.matches(scanner::TokenType::True) {
            return Ok(expr::Expr::Literal(expr::Literal::True));
        }
        if self.matches(scanner::TokenType::Nil) {
            return Ok(expr::Expr::Literal(expr::Literal::Nil));
        }
        if self.matches(scanner::TokenType::Number) {
            let tok = self.previous();
            return match &tok.literal {
                Some(scanner::Literal::Number(n)) => {
                    Ok(expr::Expr::Literal(expr::Literal::Number(*n)))
                }
                _ => Err(Error::UnexpectedToken(tok.clone())),
            };
        }
        if self.matches(scanner::TokenType::String) {
            let tok = self.previous();
            return match &tok.literal {
                Some(scanner::Literal::Str(s)) => {
                    Ok(expr::Expr::Literal(expr::Literal::String(s.clone())))
                }
                _ => Err(Error::UnexpectedToken(tok.clone())),
            };
        }
        if self.matches(scanner::TokenType::This) {
            let prev = self.previous();
            return Ok(expr::Expr::This(expr::SourceLocation {
                line: prev.line,
                col: prev.col,
            }));
        }
        if self.matches(scanner::TokenType::Identifier) {
            return Ok(expr::Expr::Variable(Parser::symbol(self.previous())));
        }
        if self.matches(scanner::TokenType::LeftParen) {
            let expr = Box::new(self.expression()?);
            self.consume(
                scanner::TokenType::RightParen,
                "Expected ')' after expression.",
            )?;
            return Ok(expr::Expr::Grouping(expr));
        }

        Err(Error::ExpectedExpression {
            token_type: self.peek().ty,
            line: self.peek().line,
            col: self.peek().col,
        })
    }

    fn symbol(tok: &scanner::Token) -> expr::Symbol {
        expr::Symbol {
            name: tok.lexeme.clone(),
            line: tok.line,
            col: tok.col,
        }
    }

    fn var_decls(stmts: &[expr::Stmt]) -> impl Iterator<Item = &expr::Symbol> {
        stmts.iter().filter_map(|stmt| match stmt {
            expr::Stmt::VarDecl(sym, _) => Some(sym),
            _ => None,
        })
    }

    fn check_unique<'a>(symbols: impl Iterator<Item = &'a expr::Symbol>) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for sym in symbols {
            if !seen.insert(sym.name.as_str()) {
                return Err(Error::Redeclaration {
                    name: sym.name.clone(),
                    line: sym.line,
                    col: sym.col,
                });
            }
        }
        Ok(())
    }

    fn consume(
        &mut self,
        tok: scanner::TokenType,
        on_err_str: &str,
    ) -> Result<&scanner::Token, Error> {
        if self.check(tok) {
            return Ok(self.advance());
        }
        Err(Error::TokenMismatch {
            expected: tok,
            found: self.peek().clone(),
            on_err: on_err_str.into(),
        })
    }

    fn op_token_to_unary_op(tok: &scanner::Token) -> Result<expr::UnaryOp, Error> {
        let ty = match tok.ty {
            scanner::TokenType::Minus => expr::UnaryOpTy::Minus,
            scanner::TokenType::Bang => expr::UnaryOpTy::Bang,
            _ => {
                return Err(Error::InvalidTokenInUnaryOp {
                    token_type: tok.ty,
                    line: tok.line,
                    col: tok.col,
                })
            }
        };
        Ok(expr::UnaryOp {
            ty,
            line: tok.line,
            col: tok.col,
        })
    }

    fn op_token_to_binop(tok: &scanner::Token) -> Result<expr::BinaryOp, Error> {
        let ty = match tok.ty {
            scanner::TokenType::EqualEqual => expr::BinaryOpTy::EqualEqual,
            scanner::TokenType::BangEqual => expr::BinaryOpTy::NotEqual,
            scanner::TokenType::Less => expr::BinaryOpTy::Less,
            scanner::TokenType::LessEqual => expr::BinaryOpTy::LessEqual,
            scanner::TokenType::Greater => expr::BinaryOpTy::Greater,
            scanner::TokenType::GreaterEqual => expr::BinaryOpTy::GreaterEqual,
            scanner::TokenType::Plus => expr::BinaryOpTy::Plus,
            scanner::TokenType::Minus => expr::BinaryOpTy::Minus,
            scanner::TokenType::Star => expr::BinaryOpTy::Star,
            scanner::TokenType::Slash => expr::BinaryOpTy::Slash,
            _ => {
                return Err(Error::InvalidTokenInBinaryOp {
                    token_type: tok.ty,
                    line: tok.line,
                    col: tok.col,
                })
            }
        };
        Ok(expr::BinaryOp {
            ty,
            line: tok.line,
            col: tok.col,
        })
    }

    fn match_one_of(&mut self, types: &[scanner::TokenType]) -> bool {
        for ty in types.iter() {
            if self.matches(*ty) {
                return true;
            }
        }
        false
    }

    fn matches(&mut self, ty: scanner::TokenType) -> bool {
        if self.check(ty) {
            self.advance();
            return true;
        }
        false
    }

    fn check(&self, ty: scanner::TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().ty == ty
    }

    fn advance(&mut self) -> &scanner::Token {
        if !self.is_at_end() {
            self.current += 1
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().ty == scanner::TokenType::Eof
    }

    fn peek(&self) -> &scanner::Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &scanner::Token {
        &self.tokens[self.current - 1]
    }
}
