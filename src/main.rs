extern crate clap;

use clap::{App, Arg};

use loxi::{parser, scanner, Config, Interpreter};

use std::io;
use std::thread;

mod error_formatting;
mod input;
mod line_reader;
mod repl;

static INPUT_STR: &str = "INPUT";
static SHOW_TOKENS_STR: &str = "tokens";
static SHOW_AST_STR: &str = "ast";
static AST_JSON_STR: &str = "ast-json";
static MAX_CALL_DEPTH_STR: &str = "max-call-depth";

// Exit codes follow sysexits(3): EX_DATAERR for bad input, EX_SOFTWARE for
// runtime failures.
const EXIT_DATAERR: i32 = 65;
const EXIT_SOFTWARE: i32 = 70;
const EXIT_NOINPUT: i32 = 66;

// Every lox call nests several evaluator frames.
const INTERPRETER_STACK_SIZE: usize = 64 * 1024 * 1024;

fn main() {
    env_logger::init();

    let interpreter_thread = thread::Builder::new()
        .name("loxi".into())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(run_loxi);
    match interpreter_thread.map(|handle| handle.join()) {
        Ok(Ok(())) => {}
        Ok(Err(_)) => std::process::exit(EXIT_SOFTWARE),
        Err(err) => {
            eprintln!("loxi: could not start interpreter thread: {}", err);
            std::process::exit(EXIT_SOFTWARE);
        }
    }
}

fn run_loxi() {
    let matches = App::new("loxi")
        .version("0.1.0")
        .about("lox language interpreter")
        .author("Thomas Peters")
        .arg(
            Arg::with_name(INPUT_STR)
                .help("sets input file to use; starts a REPL when omitted")
                .required(false)
                .index(1),
        )
        .arg(
            Arg::with_name(SHOW_TOKENS_STR)
                .long("--show-tokens")
                .takes_value(false)
                .help("show the token stream"),
        )
        .arg(
            Arg::with_name(SHOW_AST_STR)
                .long("--show-ast")
                .takes_value(false)
                .help("show the AST"),
        )
        .arg(
            Arg::with_name(AST_JSON_STR)
                .long("--ast-json")
                .takes_value(false)
                .help("show the AST as JSON"),
        )
        .arg(
            Arg::with_name(MAX_CALL_DEPTH_STR)
                .long("--max-call-depth")
                .takes_value(true)
                .value_name("N")
                .help("maximum nesting of calls before a stack overflow error (0 for unlimited)"),
        )
        .get_matches();

    let config = match matches.value_of(MAX_CALL_DEPTH_STR) {
        Some(depth) => match depth.parse::<usize>() {
            Ok(depth) => Config::with_max_call_depth(depth),
            Err(err) => {
                eprintln!("loxi: invalid --max-call-depth '{}': {}", depth, err);
                std::process::exit(EXIT_DATAERR);
            }
        },
        None => Config::default(),
    };

    let input_file = match matches.value_of(INPUT_STR) {
        Some(input_file) => input_file,
        None => {
            repl::run(config);
            return;
        }
    };

    let input = match input::Input::from_file(input_file) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("Error reading {}: {}", input_file, err);
            std::process::exit(EXIT_NOINPUT);
        }
    };

    let tokens = match scanner::scan_tokens(&input.content) {
        Ok(tokens) => tokens,
        Err(err) => {
            error_formatting::format_lexical_error(&err, &input);
            std::process::exit(EXIT_DATAERR);
        }
    };

    if matches.is_present(SHOW_TOKENS_STR) {
        println!("tokens: {:#?}", tokens);
        std::process::exit(0);
    }

    let stmts = match parser::parse(tokens) {
        Ok(stmts) => stmts,
        Err(err) => {
            error_formatting::format_parse_error(&err, &input);
            std::process::exit(EXIT_DATAERR);
        }
    };

    if matches.is_present(SHOW_AST_STR) {
        println!("AST: {:#?}", stmts);
        std::process::exit(0);
    }

    if matches.is_present(AST_JSON_STR) {
        match serde_json::to_string_pretty(&stmts) {
            Ok(json) => {
                println!("{}", json);
                std::process::exit(0);
            }
            Err(err) => {
                eprintln!("loxi: could not serialize AST: {}", err);
                std::process::exit(EXIT_SOFTWARE);
            }
        }
    }

    let mut stdout = io::stdout();
    let res = Interpreter::new(&mut stdout, config).interpret(&stmts);
    if let Err(err) = res {
        error_formatting::format_runtime_error(&err, &input);
        std::process::exit(EXIT_SOFTWARE);
    }
}
