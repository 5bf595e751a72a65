//! The `system` module: program I/O and host environment.

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;

use crate::{
    error::RunResult,
    module::Module,
    modules::build_natives,
    objects::NativeCallContext,
    signature::Signature,
    value::Value,
};

pub struct System {
    signatures: Vec<Signature>,
    values: Vec<(String, Value)>,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl System {
    #[must_use]
    pub fn new() -> Self {
        let (signatures, values) = build_natives(&[
            ("print {}", print),
            ("print error {}", print_error),
            ("write {}", write),
            ("write error {}", write_error),
            ("read (a) line", read_line),
            ("read (a) word", read_word),
            ("read (a) char/character", read_character),
            ("the arguments", the_arguments),
            ("the environment", the_environment),
            ("the clock", the_clock),
            ("the system name", the_system_name),
            ("the system version", the_system_version),
        ]);
        Self { signatures, values }
    }
}

impl Module for System {
    fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    fn values(&self) -> &[(String, Value)] {
        &self.values
    }
}

fn print(context: &mut NativeCallContext) -> RunResult<Value> {
    let text = format!("{}\n", context.argument(0).to_text());
    context.vm.config().output.borrow_mut().out(&text);
    Ok(context.argument(0).clone())
}

fn print_error(context: &mut NativeCallContext) -> RunResult<Value> {
    let text = format!("{}\n", context.argument(0).to_text());
    context.vm.config().output.borrow_mut().err(&text);
    Ok(context.argument(0).clone())
}

fn write(context: &mut NativeCallContext) -> RunResult<Value> {
    let text = context.argument(0).to_text();
    context.vm.config().output.borrow_mut().out(&text);
    Ok(context.argument(0).clone())
}

fn write_error(context: &mut NativeCallContext) -> RunResult<Value> {
    let text = context.argument(0).to_text();
    context.vm.config().output.borrow_mut().err(&text);
    Ok(context.argument(0).clone())
}

fn read_line(context: &mut NativeCallContext) -> RunResult<Value> {
    let input = context.vm.config().input.clone();
    let line = input.borrow_mut().read_line();
    Ok(line.map_or(Value::Empty, Value::string))
}

fn read_word(context: &mut NativeCallContext) -> RunResult<Value> {
    let input = context.vm.config().input.clone();
    let word = input.borrow_mut().read_word();
    Ok(word.map_or(Value::Empty, Value::string))
}

fn read_character(context: &mut NativeCallContext) -> RunResult<Value> {
    let input = context.vm.config().input.clone();
    let character = input.borrow_mut().read_character();
    Ok(character.map_or(Value::Empty, |c| Value::string(c.to_string())))
}

fn the_arguments(context: &mut NativeCallContext) -> RunResult<Value> {
    let values = context
        .vm
        .config()
        .arguments
        .clone()
        .into_iter()
        .map(Value::string)
        .collect();
    Ok(context.vm.new_list(values))
}

fn the_environment(context: &mut NativeCallContext) -> RunResult<Value> {
    let mut values = IndexMap::new();
    for (name, value) in std::env::vars() {
        values.insert(Value::string(name), Value::string(value));
    }
    Ok(context.vm.new_dictionary(values))
}

/// Seconds since the Unix epoch, with sub-second precision.
fn the_clock(_context: &mut NativeCallContext) -> RunResult<Value> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Ok(Value::Float(elapsed.as_secs_f64()))
}

fn the_system_name(_context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::string(std::env::consts::OS))
}

fn the_system_version(_context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::string(std::env::consts::ARCH))
}
