use serde::Serialize;

use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Literal(Literal),
    This(SourceLocation),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Call(Box<Expr>, SourceLocation, Vec<Expr>),
    Get(Box<Expr>, Symbol),
    Grouping(Box<Expr>),
    Variable(Symbol),
    Assign(Symbol, Box<Expr>),
    Logical(Box<Expr>, LogicalOp, Box<Expr>),
    Set(Box<Expr>, Symbol, Box<Expr>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub col: i64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    Or,
    And,
}

#[derive(Debug, Eq, PartialEq, Hash, Clone, Serialize)]
pub struct Symbol {
    pub name: String,
    pub line: usize,
    pub col: i64,
}

impl Symbol {
    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            col: self.col,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunDecl {
    pub name: Symbol,
    pub params: Vec<Symbol>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDecl {
    pub name: Symbol,
    pub superclass: Option<Symbol>,
    pub methods: Vec<Rc<FunDecl>>,
}

/// `for` has no variant of its own: the parser lowers it to a `Block`
/// holding the initializer and a `While`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    Expr(Expr),
    FunDecl(Rc<FunDecl>),
    ClassDecl(ClassDecl),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    Print(Expr),
    VarDecl(Symbol, Option<Expr>),
    Block(Vec<Stmt>),
    Return(SourceLocation, Option<Expr>),
    While(Expr, Box<Stmt>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum UnaryOpTy {
    Minus,
    Bang,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct UnaryOp {
    pub ty: UnaryOpTy,
    pub line: usize,
    pub col: i64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum BinaryOpTy {
    EqualEqual,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
}

impl fmt::Display for BinaryOpTy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            BinaryOpTy::EqualEqual => "==",
            BinaryOpTy::NotEqual => "!=",
            BinaryOpTy::Less => "<",
            BinaryOpTy::LessEqual => "<=",
            BinaryOpTy::Greater => ">",
            BinaryOpTy::GreaterEqual => ">=",
            BinaryOpTy::Plus => "+",
            BinaryOpTy::Minus => "-",
            BinaryOpTy::Star => "*",
            BinaryOpTy::Slash => "/",
        };
        write!(f, "{}", symbol)
    }
}

impl fmt::Display for UnaryOpTy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOpTy::Minus => write!(f, "-"),
            UnaryOpTy::Bang => write!(f, "!"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryOp {
    pub ty: BinaryOpTy,
    pub line: usize,
    pub col: i64,
}

impl BinaryOp {
    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            col: self.col,
        }
    }
}

impl UnaryOp {
    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            col: self.col,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Number(f64),
    String(String),
    True,
    False,
    Nil,
}
