//! Pipeline-level properties: grammar resolution, scoping, closures, try
//! unwinding, module loading, and compilation determinism.

use std::{cell::RefCell, fs, rc::Rc};

use pretty_assertions::assert_eq;
use sif::{
    CollectOutput, NoModules, Parser, ParserConfig, CaptureReporter, Runner, RunnerConfig,
    StringReader, Value,
};

fn run_with_config(source: &str, mut config: RunnerConfig) -> (String, Runner) {
    let output = Rc::new(RefCell::new(CollectOutput::new()));
    config.vm.output = output.clone();
    let mut runner = Runner::new(config);
    if let Err(failure) = runner.run_source(source) {
        panic!("program failed: {:?}", failure.errors());
    }
    let text = output.borrow().output().to_string();
    (text, runner)
}

fn output_of(source: &str) -> String {
    run_with_config(source, RunnerConfig::default()).0
}

#[test]
fn longest_literal_match_wins() {
    // `answer` alone is also a complete call; the longer form must win
    // when its words are present.
    let source = "\
function answer
  return 1
end function
function answer with {x}
  return x
end function
print answer with 42
print answer
";
    assert_eq!(output_of(source), "42\n1\n");
}

#[test]
fn inner_locals_shadow_outer_ones() {
    let source = "\
set x to \"outer\"
function check {x}
  return x
end function
print check \"inner\"
print x
";
    assert_eq!(output_of(source), "inner\nouter\n");
}

#[test]
fn closures_mutate_enclosing_locals() {
    let source = "\
function tally {start}
  set count to start
  function bump
    set count to count + 1
  end function
  bump
  bump
  return count
end function
print tally 5
";
    assert_eq!(output_of(source), "7\n");
}

#[test]
fn try_restores_the_stack_depth_exactly() {
    // The error fires mid-expression with several temporaries on the
    // stack; everything after the try must still compute correctly.
    let source = "\
set x to 10
try
  set y to 1 + (2 * (3 + (1 / 0)))
end try
print x + 5
print the error
";
    assert_eq!(output_of(source), "15\ndivision by zero\n");
}

#[test]
fn nested_try_regions_unwind_to_the_innermost_handler() {
    let source = "\
try
  try
    error with \"inner\"
  end try
  print the error
  error with \"outer\"
end try
print the error
";
    assert_eq!(output_of(source), "inner\nouter\n");
}

#[test]
fn errors_unwind_through_function_calls() {
    let source = "\
function explode
  error with \"bang\"
end function
try
  explode
end try
print the error
";
    assert_eq!(output_of(source), "bang\n");
}

#[test]
fn using_scopes_signatures_to_the_block() {
    let directory = std::env::temp_dir().join("sif-test-using");
    fs::create_dir_all(&directory).unwrap();
    let path = directory.join("shout.sif");
    fs::write(
        &path,
        "function shout {x}\n  return \"{x}!\"\nend function\n",
    )
    .unwrap();

    let mut config = RunnerConfig::default();
    config.search_paths = vec![directory];
    let source = "\
using \"shout\"
  print shout \"hey\"
end using
";
    let (output, _) = run_with_config(source, config);
    assert_eq!(output, "hey!\n");
}

#[test]
fn use_binds_module_values() {
    let directory = std::env::temp_dir().join("sif-test-use");
    fs::create_dir_all(&directory).unwrap();
    fs::write(
        directory.join("doubling.sif"),
        "function double {x}\n  return x * 2\nend function\n",
    )
    .unwrap();

    let mut config = RunnerConfig::default();
    config.search_paths = vec![directory];
    let source = "\
use \"doubling\"
print double 21
";
    let (output, _) = run_with_config(source, config);
    assert_eq!(output, "42\n");
}

#[test]
fn circular_imports_are_reported() {
    let directory = std::env::temp_dir().join("sif-test-circular");
    fs::create_dir_all(&directory).unwrap();
    fs::write(directory.join("alpha.sif"), "use \"beta\"\n").unwrap();
    fs::write(directory.join("beta.sif"), "use \"alpha\"\n").unwrap();

    let output = Rc::new(RefCell::new(CollectOutput::new()));
    let mut config = RunnerConfig::default();
    config.search_paths = vec![directory];
    config.vm.output = output;
    let mut runner = Runner::new(config);
    let result = runner.run_source("use \"alpha\"\n");
    let failure = result.expect_err("circular imports must fail to parse");
    let messages: Vec<String> = failure.errors().iter().map(sif::Error::what).collect();
    assert!(
        messages.iter().any(|message| message.contains("circular")),
        "expected a circular import error, got {messages:?}"
    );
}

#[test]
fn compiling_the_same_program_twice_is_deterministic() {
    let source = "\
set x to 1
repeat for each n in 1...3
  set x to x + n
end repeat
if x > 5 then
  print \"big {x}\"
else
  print x
end if
";
    let compile = || {
        let mut reader = StringReader::new(source);
        let mut runner = Runner::new(RunnerConfig::default());
        let bytecode = runner.compile(&mut reader).expect("program compiles");
        let mut listing = String::new();
        bytecode.disassemble(&mut listing, true).unwrap();
        (bytecode.code().to_vec(), listing)
    };
    let (first_code, first_listing) = compile();
    let (second_code, second_listing) = compile();
    assert_eq!(first_code, second_code);
    assert_eq!(first_listing, second_listing);
}

#[test]
fn interactive_sessions_keep_declarations() {
    let output = Rc::new(RefCell::new(CollectOutput::new()));
    let mut config = RunnerConfig {
        interactive: true,
        ..RunnerConfig::default()
    };
    config.vm.output = output.clone();
    let mut runner = Runner::new(config);

    runner.run_source("set x to 2").unwrap();
    runner
        .run_source("function twice {n}\n  return n * 2\nend function")
        .unwrap();
    runner.run_source("print twice x").unwrap();
    assert_eq!(output.borrow().output(), "4\n");
}

#[test]
fn signatures_declared_in_inner_scopes_are_retracted() {
    // `inner` is declared inside `outer`'s body; once that scope ends the
    // grammar is rebuilt without it, so calling it outside fails to parse.
    let source = "\
function outer
  function inner
    return 1
  end function
end function
inner
";
    let mut reader = StringReader::new(source);
    let mut reporter = CaptureReporter::new();
    let provider = NoModules;
    let mut parser = Parser::new(ParserConfig::default(), &mut reader, &mut reporter, &provider);
    let statement = parser.statement();
    assert!(statement.is_some());
    assert!(parser.failed());
    assert!(
        reporter
            .errors()
            .iter()
            .any(|error| error.what().contains("unknown expression \"inner\""))
    );
}

#[test]
fn empty_value_is_distinct_from_its_lookalikes() {
    assert_ne!(Value::Empty, Value::Integer(0));
    assert_ne!(Value::Empty, Value::Bool(false));
    assert_ne!(Value::Empty, Value::string(""));
    assert_eq!(output_of("print empty is empty"), "true\n");
    assert_eq!(output_of("print 0 is empty"), "false\n");
}
