//! A tree-walking interpreter for Lox: a scanner, a recursive-descent parser
//! producing an AST, and an evaluator with closures, classes and single
//! inheritance.

use std::io::Write;

pub mod config;
pub mod environment;
pub mod expr;
pub mod parser;
pub mod scanner;
pub mod treewalk_interpreter;
pub mod value;

pub use config::Config;
pub use treewalk_interpreter::{Interpreter, RuntimeError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("lexical error: {0}")]
    Lexical(#[from] scanner::Error),
    #[error("parse error: {0}")]
    Parse(#[from] parser::Error),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn location(&self) -> Option<expr::SourceLocation> {
        match self {
            Error::Lexical(err) => Some(expr::SourceLocation {
                line: err.line,
                col: err.col,
            }),
            Error::Parse(err) => Some(err.location()),
            Error::Runtime(err) => err.location(),
        }
    }
}

/// Scans, parses and executes `source`, writing `print` output to `out`.
///
/// Nothing runs unless the whole program scans and parses. Output produced
/// before a runtime error stays in `out`.
pub fn run(source: &str, config: Config, out: &mut dyn Write) -> Result<(), Error> {
    let tokens = scanner::scan_tokens(source)?;
    let stmts = parser::parse(tokens)?;
    let mut interpreter = Interpreter::new(out, config);
    interpreter.interpret(&stmts)?;
    Ok(())
}
