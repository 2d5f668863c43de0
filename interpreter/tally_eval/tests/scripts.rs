// Test code uses unwrap/expect for clarity - panics provide good test failure messages
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end script tests.
//!
//! Each test feeds a whole multi-statement script through a session,
//! the way the CLI does, and checks the final value or the captured
//! output. Narrow operator and conversion behavior is covered by the
//! unit tests beside the code; these exercise the pieces together.

use tally_eval::{
    Displayer, MemoryHost, ModeSetting, RenderConfig, Session, Value,
};

fn session() -> Session {
    Session::new(Displayer::buffer(), Box::new(MemoryHost::new()))
}

fn eval(session: &mut Session, source: &str) -> Value {
    match session.eval(source) {
        Ok(v) => v,
        Err(e) => panic!("script failed: {e}\n{source}"),
    }
}

fn text(v: &Value) -> String {
    tally_eval::render(v, &RenderConfig::plain())
}

#[test]
fn fibonacci_script() {
    let mut s = session();
    let v = eval(
        &mut s,
        "define fib(n) {\n\
         \x20 if n < 2 { leave n }\n\
         \x20 fib(n - 1) + fib(n - 2)\n\
         }\n\
         fib(15)",
    );
    assert_eq!(text(&v), "610");
}

#[test]
fn grade_report_uses_case_and_interpolation() {
    let mut s = session();
    let v = eval(
        &mut s,
        "define grade(score) {\n\
         \x20 case score of {\n\
         \x20   90..100: 'A'\n\
         \x20   80..89: 'B'\n\
         \x20   70..79: 'C'\n\
         \x20   default: 'F'\n\
         \x20 }\n\
         }\n\
         mark = grade(84)\n\
         \"scored ${mark}\"",
    );
    assert_eq!(text(&v), "scored B");
}

#[test]
fn rational_block_is_exact_and_scoped() {
    let mut s = session();
    let inside = eval(&mut s, ":rational on { 1/3 + 1/6 }");
    assert_eq!(text(&inside), "1/2");
    // Outside the block, division is decimal again.
    let outside = eval(&mut s, "1/2");
    assert!(matches!(outside, Value::Decimal(_)));
    assert!(!s.settings().mode(ModeSetting::Rational));
}

#[test]
fn errors_do_not_poison_the_session() {
    let mut s = session();
    eval(&mut s, "x = 10");
    assert!(s.eval("x / 0").is_err());
    assert!(s.eval("nosuchname").is_err());
    // Prior state is intact and evaluation continues.
    assert_eq!(text(&eval(&mut s, "x + 1")), "11");
}

#[test]
fn collections_compose() {
    let mut s = session();
    let v = eval(
        &mut s,
        "rows = []\n\
         loop i in 1..3 {\n\
         \x20 rows += { id: i, sq: i * i }\n\
         }\n\
         rows[2].sq",
    );
    assert_eq!(text(&v), "9");
}

#[test]
fn sets_deduplicate_and_union() {
    let mut s = session();
    let v = eval(&mut s, "a = {1, 2, 3}\nb = {3, 4}\nlengthof (a + b)");
    assert_eq!(text(&v), "4");
    let v = eval(&mut s, "lengthof (a & b)");
    assert_eq!(text(&v), "1");
}

#[test]
fn reductions_agree_with_loops_on_fractional_steps() {
    let mut s = session();
    let shortcut = eval(&mut s, "sumof (1..4, 0.5)");
    let looped = eval(&mut s, "t = 0\nloop v in 1..4, 0.5 { t += v }\nt");
    assert_eq!(text(&shortcut), text(&looped));
}

#[test]
fn product_of_range_is_factorial() {
    let mut s = session();
    assert_eq!(text(&eval(&mut s, "productof 1..10")), text(&eval(&mut s, "10!")));
}

#[test]
fn quoted_rendering_modes_change_echo() {
    let mut s = session();
    s.process("greeting = 'hi'\ngreeting").unwrap();
    let plain = s.displayer().captured_output();
    assert!(plain.contains("greeting -> hi"));

    s.process(":quotestrings on\ngreeting").unwrap();
    let quoted = s.displayer().captured_output();
    assert!(quoted.contains("\"hi\""));
}

#[test]
fn results_only_mode_drops_the_source_echo() {
    let mut s = session();
    s.process(":resultsonly on\n6 * 7").unwrap();
    let shown = s.displayer().captured_output();
    assert!(shown.contains("42"));
    assert!(!shown.contains("->"));
}

#[test]
fn save_file_reloads_in_a_fresh_session_sharing_the_host() {
    let mut s = session();
    eval(&mut s, "rate = 0.08\ndefine with_tax(p) = p * (1 + rate)");
    eval(&mut s, ":save state.tally");
    eval(&mut s, ":clear");
    eval(&mut s, ":open state.tally");
    let v = eval(&mut s, "with_tax(100)");
    assert_eq!(text(&v), "108");
}

#[test]
fn labeled_leave_exits_a_search() {
    let mut s = session();
    let v = eval(
        &mut s,
        "found = null\n\
         search: loop i in 1..10 {\n\
         \x20 loop j in 1..10 {\n\
         \x20   if i * j == 42 { found = [i, j]\nleave search }\n\
         \x20 }\n\
         }\n\
         found",
    );
    assert_eq!(text(&v), "[ 6, 7 ]");
}

#[test]
fn echo_writes_to_the_output_channel() {
    let mut s = session();
    s.process(":echo 'ready'").unwrap();
    assert!(s.displayer().captured_output().contains("ready"));
}

#[test]
fn protected_names_survive_a_hostile_script() {
    let mut s = session();
    assert!(s.eval("$pi = 3").is_err());
    assert!(s.eval("pi = 3").is_err());
    assert!(s.eval("define pi() = 3").is_err());
    let v = eval(&mut s, "pi");
    assert!(text(&v).starts_with("3.14159"));
}

#[test]
fn declarations_are_single_shot_per_scope() {
    let mut s = session();
    eval(&mut s, "var total = 10");
    assert!(s.eval("var total = 20").is_err());
    eval(&mut s, "const rate = 0.08");
    assert!(s.eval("const rate = 0.09").is_err());
    assert!(s.eval("define rate() = 1").is_err());
    let v = eval(&mut s, "total * (1 + rate)");
    assert_eq!(text(&v), "10.8");
}
