//! End-to-end language tests: whole programs through the parser, compiler,
//! and virtual machine, asserting on captured output.

use std::{cell::RefCell, rc::Rc};

use pretty_assertions::assert_eq;
use sif::{CollectOutput, RunFailure, Runner, RunnerConfig, Value};

fn run(source: &str) -> (Result<Value, RunFailure>, String) {
    let output = Rc::new(RefCell::new(CollectOutput::new()));
    let mut config = RunnerConfig::default();
    config.vm.output = output.clone();
    let mut runner = Runner::new(config);
    let result = runner.run_source(source);
    let text = output.borrow().output().to_string();
    (result, text)
}

fn output_of(source: &str) -> String {
    let (result, output) = run(source);
    if let Err(failure) = &result {
        panic!("program failed: {:?}\noutput so far: {output}", failure.errors());
    }
    output
}

#[test]
fn prints_a_string() {
    assert_eq!(output_of("print \"hello\""), "hello\n");
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(output_of("set x to 1 + 2 * 3 ^ 2\nprint x"), "19\n");
}

#[test]
fn integer_division_and_modulo() {
    assert_eq!(output_of("print 7 / 2"), "3\n");
    assert_eq!(output_of("print 7 % 2"), "1\n");
    assert_eq!(output_of("print 7.0 / 2"), "3.5\n");
}

#[test]
fn sorts_a_list_in_place() {
    assert_eq!(
        output_of("set xs to [3, 1, 2]\nsort xs\nprint xs"),
        "[1, 2, 3]\n"
    );
}

#[test]
fn functions_and_string_interpolation() {
    let source = "\
function greet {who}
  return \"hi {who}\"
end function
print greet \"world\"
";
    assert_eq!(output_of(source), "hi world\n");
}

#[test]
fn try_catches_division_by_zero() {
    let source = "\
try
  set x to 1 / 0
end try
print the error
";
    assert_eq!(output_of(source), "division by zero\n");
}

#[test]
fn repeat_for_each_over_a_range() {
    let source = "\
set total to 0
repeat for each n in 1...5
  set total to total + n
end repeat
print total
";
    assert_eq!(output_of(source), "15\n");
}

#[test]
fn repeat_while_and_exit() {
    let source = "\
set n to 0
repeat while n < 10
  set n to n + 1
  if n = 5 then exit repeat
end repeat
print n
";
    assert_eq!(output_of(source), "5\n");
}

#[test]
fn repeat_next_skips_the_rest_of_the_body() {
    let source = "\
set total to 0
repeat for each n in 1...5
  if n % 2 = 0 then next repeat
  set total to total + n
end repeat
print total
";
    assert_eq!(output_of(source), "9\n");
}

#[test]
fn half_open_ranges_exclude_the_end() {
    let source = "\
set total to 0
repeat for each n in 1..<5
  set total to total + n
end repeat
print total
";
    assert_eq!(output_of(source), "10\n");
}

#[test]
fn if_else_chains() {
    let source = "\
set x to 7
if x < 5 then
  print \"small\"
else if x < 10 then
  print \"medium\"
else
  print \"large\"
end if
";
    assert_eq!(output_of(source), "medium\n");
}

#[test]
fn single_line_if() {
    assert_eq!(output_of("if 1 < 2 then print \"yes\""), "yes\n");
}

#[test]
fn it_holds_the_last_expression_value() {
    assert_eq!(output_of("2 + 3\nprint it"), "5\n");
}

#[test]
fn dictionaries_store_and_enumerate() {
    let source = "\
set d to [\"a\": 1, \"b\": 2]
print d[\"a\"]
set total to 0
repeat for each k, v in d
  set total to total + v
end repeat
print total
";
    assert_eq!(output_of(source), "1\n3\n");
}

#[test]
fn string_subscripts_support_negative_indices() {
    assert_eq!(output_of("set s to \"hello\"\nprint s[-1]"), "o\n");
    assert_eq!(output_of("set s to \"hello\"\nprint s[1...3]"), "ell\n");
}

#[test]
fn list_subscript_assignment() {
    assert_eq!(
        output_of("set xs to [1, 2, 3]\nset xs[1] to 9\nprint xs"),
        "[1, 9, 3]\n"
    );
}

#[test]
fn destructuring_assignment() {
    assert_eq!(output_of("set a, b to [1, 2]\nprint a + b"), "3\n");
}

#[test]
fn multi_word_call_forms() {
    let source = "\
set xs to [1, 2]
insert 3 at the end of xs
insert 0 at the beginning of xs
print xs
print the size of xs
";
    assert_eq!(output_of(source), "[0, 1, 2, 3]\n4\n");
}

#[test]
fn type_tests_and_casts() {
    assert_eq!(output_of("print 3 is a number"), "true\n");
    assert_eq!(output_of("print \"x\" is a number"), "false\n");
    assert_eq!(output_of("print \"42\" as an integer"), "42\n");
    assert_eq!(output_of("print 42 as a string"), "42\n");
}

#[test]
fn nested_interpolations() {
    let source = "set x to 2\nprint \"a{\"b{x}c\"}d\"";
    assert_eq!(output_of(source), "ab2cd\n");
}

#[test]
fn recursion() {
    let source = "\
function fib {n}
  if n < 2 then return n
  return (fib (n - 1)) + (fib (n - 2))
end function
print fib 10
";
    assert_eq!(output_of(source), "55\n");
}

#[test]
fn runtime_errors_carry_a_source_range() {
    let (result, _) = run("set x to 1 / 0");
    match result {
        Err(RunFailure::Runtime(error)) => {
            assert_eq!(error.what(), "division by zero");
            assert_eq!(error.range.start.line, 1);
        }
        other => panic!("expected a runtime failure, got {other:?}"),
    }
}

#[test]
fn parse_failures_report_unknown_expressions() {
    let (result, _) = run("frobnicate 3");
    match result {
        Err(RunFailure::Parse(errors)) => {
            assert!(!errors.is_empty());
            assert!(errors[0].what().contains("unknown expression"));
        }
        other => panic!("expected a parse failure, got {other:?}"),
    }
}

#[test]
fn uncaught_error_values_surface() {
    let (result, _) = run("error with \"boom\"");
    match result {
        Err(RunFailure::Runtime(error)) => assert_eq!(error.what(), "boom"),
        other => panic!("expected a runtime failure, got {other:?}"),
    }
}

#[test]
fn comments_are_ignored() {
    let source = "\
# a line comment
set x to 1 -- a trailing comment
(-- a block
   comment --) print x
";
    assert_eq!(output_of(source), "1\n");
}
