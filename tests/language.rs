use loxi::config::DEFAULT_MAX_CALL_DEPTH;
use loxi::{parser, scanner, Config, Error, RuntimeError};

type TestResult = Result<(), Box<dyn std::error::Error>>;

// run lox code against a fresh interpreter and return everything it printed
fn run(code: &str) -> Result<String, Error> {
    let mut buffer = Vec::new();
    loxi::run(code, Config::default(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

// run lox code that is expected to fail, returning the error along with any
// output printed before the failure
fn run_failing(code: &str) -> (String, Error) {
    let mut buffer = Vec::new();
    let err = loxi::run(code, Config::default(), &mut buffer).unwrap_err();
    (String::from_utf8_lossy(&buffer).into_owned(), err)
}

#[test]
fn parsing_is_deterministic() -> TestResult {
    let code = "\
        class A < B { init(x) { this.x = x; } get() { return this.x; } }\n\
        for (var i = 0; i < 3; i = i + 1) { print A(i).get() or nil and !true; }";

    let first = parser::parse(scanner::scan_tokens(code)?)?;
    let second = parser::parse(scanner::scan_tokens(code)?)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn comments_are_elided() -> TestResult {
    let with_comment = scanner::scan_tokens("// comment\n42;")?;
    let without = scanner::scan_tokens("42;")?;

    let kinds = |tokens: &[scanner::Token]| {
        tokens
            .iter()
            .map(|tok| (tok.ty, tok.lexeme.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(kinds(&with_comment), kinds(&without));
    Ok(())
}

#[test]
fn block_shadowing_leaves_outer_binding() -> TestResult {
    let output = run("var a = 1; { var a = 2; print a; } print a;")?;
    assert_eq!(output, "2\n1\n");
    Ok(())
}

#[test]
fn closures_share_captured_state() -> TestResult {
    let output = run(
        "fun make(){ var i = 0; fun inc(){ i = i + 1; return i; } return inc; }\n\
         var c = make(); print c(); print c();",
    )?;
    assert_eq!(output, "1\n2\n");
    Ok(())
}

#[test]
fn independent_closures_do_not_share_state() -> TestResult {
    let output = run(
        "fun make(){ var i = 0; fun inc(){ i = i + 1; return i; } return inc; }\n\
         var a = make(); var b = make(); a(); a(); print a(); print b();",
    )?;
    assert_eq!(output, "3\n1\n");
    Ok(())
}

#[test]
fn equality_does_not_coerce() -> TestResult {
    let output = run("print 1 == \"1\"; print nil == nil; print nil == false; print 0 == -0;")?;
    assert_eq!(output, "false\ntrue\nfalse\ntrue\n");
    Ok(())
}

#[test]
fn method_resolution_walks_to_ancestor() -> TestResult {
    let output = run(
        "class A { greet(){ print \"A\"; } }\n\
         class B < A { greet(){ print \"B\"; } }\n\
         class C < A {}\n\
         var c = C(); c.greet();",
    )?;
    assert_eq!(output, "A\n");
    Ok(())
}

#[test]
fn arity_mismatch_has_no_partial_output() {
    let (output, err) = run_failing("print \"before\"; fun f(a) { print \"inside\"; } f(1, 2);");
    assert_eq!(output, "before\n");
    assert!(matches!(
        err,
        Error::Runtime(RuntimeError::ArityMismatch {
            expected: 1,
            found: 2,
            ..
        })
    ));
}

#[test]
fn for_loop_runs_exactly() -> TestResult {
    let output = run("for (var i = 0; i < 3; i = i + 1) print i;")?;
    assert_eq!(output, "0\n1\n2\n");
    Ok(())
}

#[test]
fn for_loop_variable_is_scoped_to_loop() {
    let (output, err) = run_failing("for (var i = 0; i < 1; i = i + 1) {} print i;");
    assert_eq!(output, "");
    assert!(matches!(
        err,
        Error::Runtime(RuntimeError::UndefinedVariable { ref name, .. }) if name == "i"
    ));
}

#[test]
fn and_short_circuits() -> TestResult {
    let output = run("false and (1/0); print \"ok\";")?;
    assert_eq!(output, "ok\n");
    Ok(())
}

#[test]
fn or_short_circuits() -> TestResult {
    let output = run("print true or (1/0);")?;
    assert_eq!(output, "true\n");
    Ok(())
}

#[test]
fn lexical_error_runs_nothing() {
    let (output, err) = run_failing("print 1;\nprint @;");
    assert_eq!(output, "");
    match err {
        Error::Lexical(err) => assert_eq!((err.line, err.col), (2, 6)),
        err => panic!("expected lexical error, got {:?}", err),
    }
}

#[test]
fn parse_error_runs_nothing() {
    let (output, err) = run_failing("print 1;\nprint 2");
    assert_eq!(output, "");
    assert!(matches!(err, Error::Parse(parser::Error::TokenMismatch { .. })));
}

#[test]
fn runtime_error_reports_location() {
    let (output, err) = run_failing("print 1;\nprint -nil;");
    assert_eq!(output, "1\n");
    let loc = err.location().unwrap();
    assert_eq!((loc.line, loc.col), (2, 6));
}

#[test]
fn redeclaration_in_block_is_a_parse_error() {
    let (_, err) = run_failing("{ var a = 1; var a = 2; }");
    assert!(matches!(
        err,
        Error::Parse(parser::Error::Redeclaration { ref name, .. }) if name == "a"
    ));
}

#[test]
fn global_redeclaration_is_allowed() -> TestResult {
    let output = run("var a = 1; var a = a + 1; print a;")?;
    assert_eq!(output, "2\n");
    Ok(())
}

#[test]
fn string_concatenation_and_display() -> TestResult {
    let output = run(
        "var greeting = \"hello\" + \" \" + \"world\";\n\
         print greeting;\n\
         print 10 / 4;\n\
         print 2 * 3;",
    )?;
    assert_eq!(output, "hello world\n2.5\n6\n");
    Ok(())
}

// an unlimited depth needs more than the default test thread stack in debug builds
fn with_large_stack<F: FnOnce() + Send + 'static>(f: F) {
    std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn unlimited_call_depth_is_configurable() {
    with_large_stack(|| {
        let mut buffer = Vec::new();
        loxi::run(
            "fun count(n) { if (n == 0) return 0; return 1 + count(n - 1); } print count(300);",
            Config::with_max_call_depth(0),
            &mut buffer,
        )
        .unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "300\n");
    });
}

fn assert_default_depth_exceeded(code: &str) {
    let (_, err) = run_failing(code);
    match err {
        Error::Runtime(RuntimeError::StackOverflow { max_depth, .. }) => {
            assert_eq!(max_depth, DEFAULT_MAX_CALL_DEPTH)
        }
        err => panic!("expected stack overflow, got {:?}", err),
    }
}

// these run on the ordinary test thread: the default limit must trip before
// the host stack does
#[test]
fn unbounded_recursion_hits_default_limit() {
    assert_default_depth_exceeded("fun f() { f(); } f();");
}

#[test]
fn deep_arithmetic_recursion_hits_default_limit() {
    assert_default_depth_exceeded(
        "fun f(n) { if (n == 0) return 0; return 1 + f(n - 1); } print f(250);",
    );
}

#[test]
fn deep_method_recursion_hits_default_limit() {
    assert_default_depth_exceeded(
        "class A { m(n) { if (n == 0) return 0; return 1 + this.m(n - 1); } }\n\
         print A().m(250);",
    );
}

#[test]
fn recursion_within_default_limit_succeeds() -> TestResult {
    let output = run("fun f(n) { if (n == 0) return 0; return 1 + f(n - 1); } print f(100);")?;
    assert_eq!(output, "100\n");
    Ok(())
}

#[test]
fn class_counter_program() -> TestResult {
    let output = run(
        "class Counter {\n\
           init(start) { this.count = start; }\n\
           tick() { this.count = this.count + 1; return this; }\n\
         }\n\
         var c = Counter(10);\n\
         c.tick().tick();\n\
         print c.count;\n\
         print c;\n\
         print Counter;\n\
         print c.tick;",
    )?;
    assert_eq!(output, "12\nCounter instance\nCounter\n<fn tick>\n");
    Ok(())
}
