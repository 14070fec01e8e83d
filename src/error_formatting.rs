use crate::input;

use loxi::{parser, scanner, RuntimeError};

use colored::*;

fn format_input(input: &input::Input, line: usize, col: i64) {
    eprintln!(
        "in {}, at line {}, column {}:",
        match &input.source {
            input::Source::Literal => "<repl input>",
            input::Source::File(filename) => filename,
        },
        line,
        col
    );
    // Multi-line strings can put the location past the end of a REPL line.
    if let Some(source_line) = input.content.lines().nth(line.saturating_sub(1)) {
        eprintln!("{}", source_line);
        eprint!("{:~<1$}", "".blue().bold(), col.max(0) as usize);
        eprintln!("{}", "^".blue().bold());
    }
}

pub fn format_lexical_error(err: &scanner::Error, input: &input::Input) {
    eprintln!(
        "loxi: {}: {}",
        "lexical error".red().bold(),
        err.what.white().bold(),
    );

    format_input(input, err.line, err.col);
}

pub fn format_parse_error(err: &parser::Error, input: &input::Input) {
    let err_str = format!("{}", err);
    eprintln!(
        "loxi: {}: {}",
        "parse error".red().bold(),
        err_str.white().bold()
    );

    let loc = err.location();
    format_input(input, loc.line, loc.col);
}

pub fn format_runtime_error(err: &RuntimeError, input: &input::Input) {
    let err_str = format!("{}", err);
    eprintln!(
        "loxi: {}: {}",
        "runtime error".red().bold(),
        err_str.white().bold()
    );

    if let Some(loc) = err.location() {
        format_input(input, loc.line, loc.col);
    }
}
