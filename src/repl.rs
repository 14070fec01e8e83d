use crate::error_formatting;
use crate::input;
use crate::line_reader::{LineReadStatus, LineReader};

use loxi::{expr, parser, scanner, Config, Interpreter};

use std::io;
use std::sync::atomic::Ordering;

static HISTORY_FILE: &str = ".lox-history.txt";

/// The parser ran out of tokens; the user is still typing a statement.
fn is_incomplete_parse(err: &parser::Error) -> bool {
    match err {
        parser::Error::UnexpectedToken(tok) => tok.ty == scanner::TokenType::Eof,
        parser::Error::TokenMismatch { found, .. } => found.ty == scanner::TokenType::Eof,
        parser::Error::ExpectedExpression { token_type, .. } => {
            *token_type == scanner::TokenType::Eof
        }
        _ => false,
    }
}

fn is_incomplete_scan(err: &scanner::Error) -> bool {
    err.what.starts_with("Unterminated string")
}

/// Bare expression statements are echoed.
fn echo_expressions(stmts: Vec<expr::Stmt>) -> Vec<expr::Stmt> {
    stmts
        .into_iter()
        .map(|stmt| match stmt {
            expr::Stmt::Expr(expr) => expr::Stmt::Print(expr),
            _ => stmt,
        })
        .collect()
}

enum Entry {
    /// Keep reading with the continuation prompt.
    Incomplete,
    Ready(Vec<expr::Stmt>),
    Invalid(loxi::Error),
}

/// Lexes and parses everything typed since the last complete entry. An empty
/// `last_line` ends the entry, so an unfinished statement or string is
/// reported instead of waiting for more input.
fn read_entry(pending: &str, last_line: &str) -> Entry {
    let forced = last_line.trim().is_empty();

    let tokens = match scanner::scan_tokens(pending) {
        Ok(tokens) => tokens,
        Err(err) if !forced && is_incomplete_scan(&err) => return Entry::Incomplete,
        Err(err) => return Entry::Invalid(err.into()),
    };

    match parser::parse(tokens) {
        Ok(stmts) => Entry::Ready(echo_expressions(stmts)),
        Err(err) if !forced && is_incomplete_parse(&err) => Entry::Incomplete,
        Err(err) => Entry::Invalid(err.into()),
    }
}

pub fn run(config: Config) {
    let mut stdout = io::stdout();
    let mut interpreter = Interpreter::new(&mut stdout, config);
    println!(
        "============================================\n\
         Welcome to lox! using tree-walk interpreter.\n\
         ============================================\n"
    );

    {
        let interrupt_clone = interpreter.interrupted.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            interrupt_clone.store(true, Ordering::Release);
        }) {
            eprintln!("loxi: could not install Ctrl-C handler: {}", err);
        }
    }

    let mut line_reader = LineReader::new(HISTORY_FILE, ">>> ", "... ");
    let mut pending = String::new();

    loop {
        let line = match line_reader.readline(!pending.is_empty()) {
            LineReadStatus::Line(line) => line,
            LineReadStatus::Cancelled => {
                pending.clear();
                continue;
            }
            LineReadStatus::Done => break,
        };

        pending.push_str(&line);
        pending.push('\n');
        let input = input::Input::literal(pending.clone());

        match read_entry(&input.content, &line) {
            Entry::Incomplete => continue,
            Entry::Invalid(err) => match err {
                loxi::Error::Lexical(err) => error_formatting::format_lexical_error(&err, &input),
                loxi::Error::Parse(err) => error_formatting::format_parse_error(&err, &input),
                loxi::Error::Runtime(err) => error_formatting::format_runtime_error(&err, &input),
            },
            Entry::Ready(stmts) => {
                if let Err(err) = interpreter.interpret(&stmts) {
                    error_formatting::format_runtime_error(&err, &input);
                }
            }
        }
        pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::repl::{read_entry, Entry};

    use loxi::expr::Stmt;

    #[test]
    fn bare_expressions_are_echoed() {
        match read_entry("1 + 2;\nvar a = 1;\n", "var a = 1;") {
            Entry::Ready(stmts) => {
                assert!(matches!(stmts[0], Stmt::Print(_)));
                assert!(matches!(stmts[1], Stmt::VarDecl(..)));
            }
            _ => panic!("expected a complete entry"),
        }
    }

    #[test]
    fn open_block_waits_for_more() {
        assert!(matches!(read_entry("{\n", "{"), Entry::Incomplete));
        assert!(matches!(
            read_entry("{\nprint 1;\n}\n", "}"),
            Entry::Ready(_)
        ));
    }

    #[test]
    fn open_string_waits_for_more() {
        assert!(matches!(
            read_entry("print \"abc\n", "print \"abc"),
            Entry::Incomplete
        ));
    }

    #[test]
    fn empty_line_reports_unterminated_string() {
        assert!(matches!(
            read_entry("print \"abc\n\n", ""),
            Entry::Invalid(loxi::Error::Lexical(_))
        ));
    }

    #[test]
    fn empty_line_reports_unfinished_statement() {
        assert!(matches!(
            read_entry("print 1 +\n\n", ""),
            Entry::Invalid(loxi::Error::Parse(_))
        ));
    }

    #[test]
    fn real_errors_are_reported_immediately() {
        assert!(matches!(
            read_entry("print @;\n", "print @;"),
            Entry::Invalid(loxi::Error::Lexical(_))
        ));
        assert!(matches!(
            read_entry("1 = 2;\n", "1 = 2;"),
            Entry::Invalid(loxi::Error::Parse(_))
        ));
    }
}
