//! End-to-end parser tests: lines in, values out.

use std::rc::Rc;

use insta::assert_snapshot;
use rstest::rstest;
use serde_json::json;
use stsh_kernel::{Environment, ExecContext, KernelConfig, MemoryEnv, StreamParser};
use stsh_types::{stream, Error, PrintMode, TypedValue, Value};

/// A parser that never starts processes.
fn parser() -> StreamParser {
    let ctx = ExecContext::new(Rc::new(MemoryEnv::new())).with_config(KernelConfig::isolated());
    StreamParser::with_context(ctx)
}

fn eval_with(parser: &StreamParser, line: &str) -> Result<Vec<Value>, Error> {
    stream::collect(parser.parse_line(line).stream)
}

fn eval(line: &str) -> Result<Vec<Value>, Error> {
    eval_with(&parser(), line)
}

/// Every element, errors included, rendered on one line.
fn render(line: &str) -> String {
    parser()
        .parse_line(line)
        .stream
        .map(|item| match item {
            Ok(value) => value.render(),
            Err(e) => format!("error: {}: {e}", e.kind()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn n(x: f64) -> Value {
    Value::number(x)
}

fn s(text: &str) -> Value {
    Value::string(text)
}

// =============================================================================
// Values and operators
// =============================================================================

#[rstest]
#[case::empty("", vec![])]
#[case::addition("1 + 2", vec![n(3.0)])]
#[case::fractions("1.5 - 0.75", vec![n(0.75)])]
#[case::logic("true && !false", vec![Value::bool(true)])]
#[case::or("false || false", vec![Value::bool(false)])]
#[case::inline_range("1 2..4 5", vec![n(1.0), n(2.0), n(3.0), n(4.0), n(5.0)])]
#[case::concat("'foo' + 'bar'", vec![s("foobar")])]
#[case::groups("(1 -2)(+3)", vec![n(-1.0), n(3.0)])]
#[case::mul_first("2 * 3 + 4", vec![n(10.0)])]
#[case::mul_second("2 + 3 * 4", vec![n(14.0)])]
#[case::parens_override("(2 + 3) * 4", vec![n(20.0)])]
#[case::left_assoc("10 - 3 - 2", vec![n(5.0)])]
#[case::negation("-3 * 2", vec![n(-6.0)])]
#[case::not_binds_tight("!0 && 1", vec![Value::bool(true)])]
#[case::comparison("1 + 1 == 2", vec![Value::bool(true)])]
#[case::string_compare("'a' < 'b'", vec![Value::bool(true)])]
#[case::hex("0xff + 1", vec![n(256.0)])]
#[case::double_quoted("\"json\"", vec![s("json")])]
#[case::null("null", vec![Value::null()])]
#[case::inverted_range("3..1", vec![])]
#[case::words_are_strings("hello world", vec![s("hello"), s("world")])]
#[case::zip("(1..3) + (10..20)", vec![n(11.0), n(13.0), n(15.0)])]
fn values(#[case] line: &str, #[case] expected: Vec<Value>) {
    assert_eq!(eval(line), Ok(expected), "evaluating {line:?}");
}

#[rstest]
#[case::true_branch("true ? 'yes' : 'no'", "yes")]
#[case::false_branch("0 ? 'yes' : 'no'", "no")]
#[case::comparison_condition("1 > 2 ? 'a' : 'b'", "b")]
#[case::nested_else("false ? 1 : true ? 2 : 3", "2")]
#[case::nested_then("true ? false ? 1 : 2 : 3", "2")]
#[case::coalesce_error("$missing ?: 5", "5")]
#[case::coalesce_value("7 ?: 5", "7")]
#[case::coalesce_falsy("'' ?: 5", "5")]
fn ternaries(#[case] line: &str, #[case] expected: &str) {
    assert_eq!(render(line), expected);
}

#[test]
fn operator_errors_are_elements() {
    assert_eq!(eval("1 + 'a'"), Err(Error::InvalidOp));
    assert_eq!(eval("'a' - 'b'"), Err(Error::InvalidStringOp));
    assert_eq!(eval("true * false"), Err(Error::InvalidBoolOp));
    assert_eq!(eval("1 / 0"), Err(Error::InvalidNumberOp));
}

#[test]
fn errors_after_values() {
    let out: Vec<_> = parser().parse_line("(1 2) - 'x'").stream.collect();
    assert_eq!(out, vec![Err(Error::InvalidOp), Err(Error::InvalidOp)]);
}

// =============================================================================
// Records
// =============================================================================

#[test]
fn record_literal() {
    assert_eq!(
        eval("{ name: 'Bernard' }"),
        Ok(vec![Value::Json(json!({"name": "Bernard"}))])
    );
}

#[test]
fn nested_records_and_lists() {
    assert_eq!(
        eval("{ a: { b: [1, -2] }, c: 1 + 2 }"),
        Ok(vec![Value::Json(json!({"a": {"b": [1, -2]}, "c": 3}))])
    );
}

#[test]
fn typed_records() {
    let payload = br#"{"name":"Al"}"#.to_vec();
    assert_eq!(
        eval("user.Person { name: 'Al' }"),
        Ok(vec![Value::Typed(TypedValue::new("user.Person", payload))])
    );
}

#[test]
fn records_read_closure_variables() {
    assert_snapshot!(
        render("1..3 | { i -> { n: i, sq: i * i } }"),
        @r#"{"n":1,"sq":1} {"n":2,"sq":4} {"n":3,"sq":9}"#
    );
}

#[test]
fn malformed_records() {
    assert!(matches!(eval("{ a: }"), Err(Error::Json(_))));
}

// =============================================================================
// Pipes, closures, sequencing
// =============================================================================

#[test]
fn closure_runs_per_element() {
    assert_eq!(
        eval("1..2 | { i -> i i * 2 }"),
        Ok(vec![n(1.0), n(2.0), n(2.0), n(4.0)])
    );
}

#[test]
fn closure_without_parameter_feeds_each_value() {
    assert_eq!(eval("1..3 | { add 1 }"), Ok(vec![n(2.0), n(3.0), n(4.0)]));
}

#[test]
fn bind_without_braces() {
    assert_eq!(eval("1..3 | x -> x * x"), Ok(vec![n(1.0), n(4.0), n(9.0)]));
}

#[test]
fn open_range_is_lazy() {
    let out: Vec<_> = parser()
        .parse_line("1.. | { i -> i }")
        .stream
        .take(3)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(out, vec![n(1.0), n(2.0), n(3.0)]);
}

#[test]
fn dotted_paths_project_fields() {
    assert_eq!(
        eval("{ name: 'Ada', langs: ['en'] } | p -> p.name p.langs.0"),
        Ok(vec![s("Ada"), s("en")])
    );
}

#[test]
fn pipe_replaces_the_stream() {
    assert_eq!(eval("1 | 2"), Ok(vec![n(2.0)]));
}

#[test]
fn sequence_keeps_the_last_stage() {
    assert_eq!(eval("1 2; 3"), Ok(vec![n(3.0)]));
}

#[test]
fn global_assignment_persists_across_lines() {
    let parser = parser();
    assert_eq!(eval_with(&parser, "$x = 1..3"), Ok(vec![]));
    assert_eq!(eval_with(&parser, "$x"), Ok(vec![n(1.0), n(2.0), n(3.0)]));
    // Each read is a fresh evaluation.
    assert_eq!(eval_with(&parser, "$x | add 1"), Ok(vec![n(2.0), n(3.0), n(4.0)]));
    assert_eq!(eval_with(&parser, "$x"), Ok(vec![n(1.0), n(2.0), n(3.0)]));
}

#[test]
fn stored_factories_are_independent() {
    let parser = parser();
    stream::drain(parser.parse_line("$xs = 1..2").stream);
    let factory = parser.context().env.get("xs").unwrap();
    let mut first = factory(stream::empty());
    let second = factory(stream::empty());
    assert_eq!(first.next(), Some(Ok(n(1.0))));
    assert_eq!(stream::collect(second), Ok(vec![n(1.0), n(2.0)]));
    assert_eq!(first.next(), Some(Ok(n(2.0))));
}

#[test]
fn local_assignment_shadows_for_the_rest_of_the_line() {
    let parser = parser();
    assert_eq!(eval_with(&parser, "x = 5; $x"), Ok(vec![n(5.0)]));
    assert_eq!(eval_with(&parser, "x = 1..3; $x | add 1"), Ok(vec![n(2.0), n(3.0), n(4.0)]));
    // Nothing leaked into the environment.
    assert!(parser.context().env.get("x").is_none());
}

#[test]
fn stored_closures_take_the_stage_input() {
    let parser = parser();
    stream::drain(parser.parse_line("$double = { x -> x * 2 }").stream);
    assert_eq!(
        eval_with(&parser, "1..3 | $double"),
        Ok(vec![n(2.0), n(4.0), n(6.0)])
    );
}

#[test]
fn backticks_interpolate_refs() {
    let parser = parser();
    assert_eq!(
        eval_with(&parser, "$name = 'World'; `hello $name`"),
        Ok(vec![s("hello World")])
    );
    assert_eq!(eval_with(&parser, "`no refs here`"), Ok(vec![s("no refs here")]));
}

#[test]
fn environment_streams_are_visible() {
    let parser = parser();
    parser
        .context()
        .env
        .set("PATHS", stream::constant(vec![s("/bin"), s("/usr/bin")]));
    assert_snapshot!(
        stream::collect(parser.parse_line("$PATHS | { add '/' }").stream)
            .unwrap()
            .iter()
            .map(Value::render)
            .collect::<Vec<_>>()
            .join(","),
        @"/bin/,/usr/bin/"
    );
}

// =============================================================================
// Print modes
// =============================================================================

#[rstest]
#[case::default("1..3", PrintMode::Pull { full: false })]
#[case::full("1..3 :", PrintMode::Pull { full: true })]
#[case::window("1..3 : 2", PrintMode::Slice { window: 2 })]
#[case::redirect("1..3 > out.txt", PrintMode::WriteFile { name: "out.txt".into() })]
#[case::redirect_after_pipe("1..3 | add 1 > out.txt", PrintMode::WriteFile { name: "out.txt".into() })]
#[case::window_after_pipe("1.. | add 1 : 5", PrintMode::Slice { window: 5 })]
#[case::comparison_is_not_redirect("1 > 0", PrintMode::Pull { full: false })]
fn print_modes(#[case] line: &str, #[case] expected: PrintMode) {
    assert_eq!(parser().parse_line(line).mode, expected);
}

#[test]
fn redirect_keeps_the_values() {
    assert_eq!(eval("1..3 > out.txt"), Ok(vec![n(1.0), n(2.0), n(3.0)]));
}

// =============================================================================
// Structural errors
// =============================================================================

#[rstest]
#[case::dangling_operator("1 +", Error::MissingOperand)]
#[case::leading_binary("* 2", Error::MissingOperand)]
#[case::close_without_open(")", Error::MismatchedBracket(')'))]
#[case::open_without_close("(1", Error::MismatchedBracket('('))]
#[case::unclosed_brace("{ a: 1", Error::MismatchedBracket('{'))]
#[case::crossed_brackets("( 1 }", Error::MismatchedBracket('}'))]
#[case::closure_not_last("1 | { 2 } 3", Error::ClosureNotFinal)]
#[case::ternary_without_else("true ? 1", Error::MissingTernary)]
fn structural_errors(#[case] line: &str, #[case] expected: Error) {
    let out: Vec<_> = parser().parse_line(line).stream.collect();
    assert_eq!(out, vec![Err(expected)], "parsing {line:?}");
}

#[test]
fn bind_needs_one_name() {
    let out: Vec<_> = parser().parse_line("1 2 -> 3").stream.collect();
    assert!(matches!(out.as_slice(), [Err(Error::InvalidClosureSignature(_))]));
}

#[test]
fn undefined_refs_fail_when_read() {
    assert_eq!(eval("$nope"), Err(Error::InvalidStreamRef("nope".into())));
    assert_snapshot!(render("$nope"), @"error: InvalidStreamRef: $nope is not defined");
}

// =============================================================================
// Builtins
// =============================================================================

#[test]
fn builtin_add() {
    assert_eq!(eval("1..3 | add 10"), Ok(vec![n(11.0), n(12.0), n(13.0)]));
}

#[test]
fn builtin_get() {
    assert_eq!(
        eval("{ name: 'Ada', age: 36 } | get name"),
        Ok(vec![s("Ada")])
    );
}

#[test]
fn builtin_echo() {
    assert_snapshot!(render("echo a { b: [1, 2] }"), @r#"{"@":["a"],"b":[1,2]}"#);
}

#[test]
fn builtin_args() {
    assert_eq!(
        eval("args src { r: true, depth: 2 }"),
        Ok(vec![s("src --depth=2 -r")])
    );
}

#[test]
fn builtin_prepend() {
    assert_eq!(eval("1..2 | prepend 0"), Ok(vec![n(0.0), n(1.0), n(2.0)]));
}

#[test]
fn builtin_exit() {
    assert_eq!(eval("exit 3"), Err(Error::Exit(3)));
}

#[test]
fn variables_shadow_builtins() {
    assert_eq!(eval("1..2 | add -> add * 3"), Ok(vec![n(3.0), n(6.0)]));
}

#[test]
fn zipped_uses_of_one_closure_stay_separate() {
    let parser = parser();
    stream::drain(parser.parse_line("$f = { x -> x x }").stream);
    assert_eq!(
        eval_with(&parser, "(1..2 | $f) + (10..11 | $f)"),
        Ok(vec![n(11.0), n(11.0), n(13.0), n(13.0)])
    );
}

#[test]
fn open_range_from_the_largest_integer() {
    let out: Vec<_> = parser()
        .parse_line("9223372036854775807..")
        .stream
        .take(2)
        .collect();
    assert_eq!(out, vec![Ok(Value::from(i64::MAX))]);
}

#[test]
fn huge_windows_are_clamped() {
    let mode = parser().parse_line("1 2 : 100000000000000000000").mode;
    assert_eq!(mode, PrintMode::Slice { window: PrintMode::MAX_WINDOW });
}
