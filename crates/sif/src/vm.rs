//! The stack virtual machine.
//!
//! Executes bytecode on a value stack with a call-frame stack. Each frame
//! owns its instruction pointer, its `it` and `error` registers, its closure
//! capture slots (absolute stack indices resolved through the calling
//! frame), and its try-handler stack. Containers are registered in a weak
//! tracked set; a mark pass from the roots breaks unreachable cycles so that
//! reference counting can finalize them.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use ahash::AHashMap;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::{
    bytecode::{Bytecode, Opcode},
    error::{Error, RunResult},
    io::{InputSource, OutputWriter, StdInput, StdOutput},
    location::SourceRange,
    object::Object,
    objects::{Dictionary, List, NativeCallContext, Range},
    value::Value,
};

/// Shared host facilities: where program output goes, where `read` input
/// comes from, and the program arguments.
#[derive(Clone)]
pub struct VirtualMachineConfig {
    pub output: Rc<RefCell<dyn OutputWriter>>,
    pub input: Rc<RefCell<dyn InputSource>>,
    pub arguments: Vec<String>,
}

impl Default for VirtualMachineConfig {
    fn default() -> Self {
        Self {
            output: Rc::new(RefCell::new(StdOutput)),
            input: Rc::new(RefCell::new(StdInput)),
            arguments: Vec::new(),
        }
    }
}

/// Requests a cooperative halt from another thread; the VM checks the flag
/// between instructions.
#[derive(Clone)]
pub struct HaltHandle(Arc<AtomicBool>);

impl HaltHandle {
    pub fn request_halt(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

struct CallFrame {
    bytecode: Rc<Bytecode>,
    ip: usize,
    /// Absolute stack indices for each capture slot.
    captures: Vec<usize>,
    /// Stack depth at frame entry; locals live at `sp + slot`.
    sp: usize,
    it: Value,
    error: Value,
    /// Try-handler target offsets, innermost last.
    jumps: SmallVec<[usize; 2]>,
    /// Stack depths recorded by `PushJump`, parallel to `jumps`.
    sps: SmallVec<[usize; 2]>,
}

impl CallFrame {
    fn new(bytecode: Rc<Bytecode>, captures: Vec<usize>, sp: usize) -> Self {
        Self {
            bytecode,
            ip: 0,
            captures,
            sp,
            it: Value::Empty,
            error: Value::Empty,
            jumps: SmallVec::new(),
            sps: SmallVec::new(),
        }
    }
}

pub struct VirtualMachine {
    config: VirtualMachineConfig,
    /// Host-provided bindings: natives and imported values.
    globals: AHashMap<String, Value>,
    /// Values assigned through `SetGlobal`; a module's exports.
    exports: AHashMap<String, Value>,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    it: Value,
    tracked: Vec<Weak<Object>>,
    gc_threshold: usize,
    halt: Arc<AtomicBool>,
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new(VirtualMachineConfig::default())
    }
}

impl VirtualMachine {
    #[must_use]
    pub fn new(config: VirtualMachineConfig) -> Self {
        Self {
            config,
            globals: AHashMap::new(),
            exports: AHashMap::new(),
            stack: Vec::new(),
            frames: Vec::new(),
            it: Value::Empty,
            tracked: Vec::new(),
            gc_threshold: 64,
            halt: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &VirtualMachineConfig {
        &self.config
    }

    pub fn add_global(&mut self, name: String, value: Value) {
        self.globals.insert(name, value);
    }

    pub fn add_globals(&mut self, globals: impl IntoIterator<Item = (String, Value)>) {
        self.globals.extend(globals);
    }

    #[must_use]
    pub fn globals(&self) -> &AHashMap<String, Value> {
        &self.globals
    }

    #[must_use]
    pub fn exports(&self) -> &AHashMap<String, Value> {
        &self.exports
    }

    /// The error captured by the innermost active `try` region's frame,
    /// readable via `the error`.
    #[must_use]
    pub fn frame_error(&self) -> Value {
        self.frames
            .last()
            .map_or(Value::Empty, |frame| frame.error.clone())
    }

    #[must_use]
    pub fn halt_handle(&self) -> HaltHandle {
        HaltHandle(Arc::clone(&self.halt))
    }

    pub fn request_halt(&mut self) {
        self.halt.store(true, Ordering::Relaxed);
    }

    /// Allocates a list the cycle collector knows about.
    #[must_use]
    pub fn new_list(&mut self, values: Vec<Value>) -> Value {
        let value = Value::object(Object::List(List::new(values)));
        self.track(&value);
        value
    }

    /// Allocates a dictionary the cycle collector knows about.
    #[must_use]
    pub fn new_dictionary(&mut self, values: IndexMap<Value, Value>) -> Value {
        let value = Value::object(Object::Dictionary(Dictionary::new(values)));
        self.track(&value);
        value
    }

    /// Registers a container for cycle collection. Non-containers are
    /// ignored; they cannot form cycles and plain reference counting
    /// reclaims them.
    pub fn track(&mut self, value: &Value) {
        if let Value::Object(object) = value
            && object.is_container()
        {
            self.tracked.push(Rc::downgrade(object));
            if self.tracked.len() >= self.gc_threshold {
                self.collect_garbage();
            }
        }
    }

    /// Executes a compiled program, returning its result value.
    pub fn execute(&mut self, bytecode: Rc<Bytecode>) -> RunResult<Value> {
        let base_frames = self.frames.len();
        let base_stack = self.stack.len();

        let locals = bytecode.locals().len();
        let mut frame = CallFrame::new(bytecode, Vec::new(), base_stack);
        frame.it = self.it.clone();
        self.frames.push(frame);
        for _ in 0..locals.max(1) {
            self.stack.push(Value::Empty);
        }

        let result = self.run();
        if result.is_err() {
            self.frames.truncate(base_frames);
            self.stack.truncate(base_stack);
        }
        result
    }

    fn run(&mut self) -> RunResult<Value> {
        macro_rules! frame {
            () => {
                self.frames.last_mut().expect("no active frame")
            };
        }
        macro_rules! fetch_u16 {
            () => {{
                let frame = frame!();
                let lo = frame.bytecode.code()[frame.ip];
                let hi = frame.bytecode.code()[frame.ip + 1];
                frame.ip += 2;
                u16::from_le_bytes([lo, hi])
            }};
        }

        loop {
            if self.halt.load(Ordering::Relaxed) {
                let frame = frame!();
                let range = frame.bytecode.location(frame.ip);
                return Err(Error::new(range, "program halted"));
            }

            let op_offset;
            let op = {
                let frame = frame!();
                op_offset = frame.ip;
                let byte = frame.bytecode.code()[frame.ip];
                frame.ip += 1;
                Opcode::from_repr(byte).expect("invalid opcode in bytecode stream")
            };
            let range = frame!().bytecode.location(op_offset);

            let outcome: RunResult<Option<Value>> = match op {
                Opcode::Return => {
                    let value = self.pop();
                    let frame = self.frames.pop().expect("no active frame");
                    self.stack.truncate(frame.sp);
                    self.stack.push(value.clone());
                    if self.frames.is_empty() {
                        self.it = frame.it;
                        self.stack.pop();
                        Ok(Some(value))
                    } else {
                        Ok(None)
                    }
                }
                Opcode::Jump => {
                    let offset = fetch_u16!() as usize;
                    frame!().ip += offset;
                    Ok(None)
                }
                Opcode::JumpIfFalse | Opcode::JumpIfTrue => {
                    let offset = fetch_u16!() as usize;
                    match self.peek().as_bool() {
                        Some(condition) => {
                            if condition == (op == Opcode::JumpIfTrue) {
                                frame!().ip += offset;
                            }
                            Ok(None)
                        }
                        None => Err(Error::new(range, "expected true or false")),
                    }
                }
                Opcode::JumpIfAtEnd => {
                    let offset = fetch_u16!() as usize;
                    let at_end = self
                        .peek()
                        .as_object()
                        .and_then(|object| object.as_enumerator())
                        .map(|enumerator| enumerator.is_at_end());
                    match at_end {
                        Some(true) => {
                            frame!().ip += offset;
                            Ok(None)
                        }
                        Some(false) => Ok(None),
                        None => Err(Error::new(range, "expected an enumerator")),
                    }
                }
                Opcode::PushJump => {
                    let target = fetch_u16!() as usize;
                    let depth = self.stack.len();
                    let frame = frame!();
                    frame.jumps.push(target);
                    frame.sps.push(depth);
                    frame.error = Value::Empty;
                    Ok(None)
                }
                Opcode::PopJump => {
                    let frame = frame!();
                    frame.jumps.pop();
                    frame.sps.pop();
                    Ok(None)
                }
                Opcode::Repeat => {
                    let offset = fetch_u16!() as usize;
                    frame!().ip -= offset;
                    Ok(None)
                }
                Opcode::Pop => {
                    self.pop();
                    Ok(None)
                }
                Opcode::Constant => {
                    let index = fetch_u16!() as usize;
                    let constant = frame!().bytecode.constants()[index].clone();
                    // Mutable constants load as copies so the pool stays pristine.
                    let copied = constant
                        .as_object()
                        .and_then(|object| object.as_copyable())
                        .map(crate::protocols::Copyable::copy);
                    let value = match copied {
                        Some(copy) => {
                            let copy = Value::object(copy);
                            self.track(&copy);
                            copy
                        }
                        None => constant,
                    };
                    self.stack.push(value);
                    Ok(None)
                }
                Opcode::Short => {
                    let value = i64::from(fetch_u16!());
                    self.stack.push(Value::Integer(value));
                    Ok(None)
                }
                Opcode::True => {
                    self.stack.push(Value::Bool(true));
                    Ok(None)
                }
                Opcode::False => {
                    self.stack.push(Value::Bool(false));
                    Ok(None)
                }
                Opcode::Empty => {
                    self.stack.push(Value::Empty);
                    Ok(None)
                }
                Opcode::GetEnumerator => {
                    let value = self.pop();
                    match value.as_object() {
                        Some(object) => match object.as_enumerable() {
                            Some(enumerable) => {
                                let enumerator = enumerable.enumerator(object);
                                self.stack
                                    .push(Value::object(Object::Enumerator(enumerator)));
                                Ok(None)
                            }
                            None => Err(Error::new(
                                range,
                                format!("can't iterate over a {}", value.type_name()),
                            )),
                        },
                        None => Err(Error::new(
                            range,
                            format!("can't iterate over a {}", value.type_name()),
                        )),
                    }
                }
                Opcode::Enumerate => {
                    let next = self
                        .peek()
                        .as_object()
                        .and_then(|object| object.as_enumerator())
                        .map(|enumerator| enumerator.enumerate());
                    match next {
                        Some(value) => {
                            self.stack.push(value);
                            Ok(None)
                        }
                        None => Err(Error::new(range, "expected an enumerator")),
                    }
                }
                Opcode::SetGlobal => {
                    let index = fetch_u16!() as usize;
                    let name = frame!().bytecode.constants()[index].to_text();
                    let value = self.pop();
                    self.exports.insert(name, value);
                    Ok(None)
                }
                Opcode::GetGlobal => {
                    let index = fetch_u16!() as usize;
                    let name = frame!().bytecode.constants()[index].to_text();
                    let value = self
                        .exports
                        .get(&name)
                        .or_else(|| self.globals.get(&name))
                        .cloned()
                        .unwrap_or_default();
                    self.stack.push(value);
                    Ok(None)
                }
                Opcode::SetLocal => {
                    let index = fetch_u16!() as usize;
                    let slot = frame!().sp + index;
                    let value = self.pop();
                    self.stack[slot] = value;
                    Ok(None)
                }
                Opcode::GetLocal => {
                    let index = fetch_u16!() as usize;
                    let slot = frame!().sp + index;
                    self.stack.push(self.stack[slot].clone());
                    Ok(None)
                }
                Opcode::SetCapture => {
                    let index = fetch_u16!() as usize;
                    let slot = frame!().captures[index];
                    let value = self.pop();
                    self.stack[slot] = value;
                    Ok(None)
                }
                Opcode::GetCapture => {
                    let index = fetch_u16!() as usize;
                    let slot = frame!().captures[index];
                    self.stack.push(self.stack[slot].clone());
                    Ok(None)
                }
                Opcode::OpenRange | Opcode::ClosedRange => {
                    let end = self.pop();
                    let start = self.pop();
                    self.make_range(range, &start, &end, op == Opcode::ClosedRange)
                        .map(|_| None)
                }
                Opcode::List => {
                    let count = fetch_u16!() as usize;
                    let values = self.stack.split_off(self.stack.len() - count);
                    let list = self.new_list(values);
                    self.stack.push(list);
                    Ok(None)
                }
                Opcode::Dictionary => {
                    let count = fetch_u16!() as usize;
                    let mut values = IndexMap::with_capacity(count);
                    let mut entries = Vec::with_capacity(count);
                    for _ in 0..count {
                        let value = self.pop();
                        let key = self.pop();
                        entries.push((key, value));
                    }
                    for (key, value) in entries.into_iter().rev() {
                        values.insert(key, value);
                    }
                    let dictionary = self.new_dictionary(values);
                    self.stack.push(dictionary);
                    Ok(None)
                }
                Opcode::UnpackList => {
                    let count = fetch_u16!() as usize;
                    let value = self.pop();
                    match value.as_object().and_then(|object| object.as_list()) {
                        Some(list) => {
                            if list.size() != count {
                                Err(Error::new(
                                    range,
                                    format!("expected {count} values, got {}", list.size()),
                                ))
                            } else {
                                for element in list.values() {
                                    self.stack.push(element);
                                }
                                Ok(None)
                            }
                        }
                        None => Err(Error::new(
                            range,
                            format!("expected a list, got {}", value.type_name()),
                        )),
                    }
                }
                Opcode::Negate => {
                    let value = self.pop();
                    match value {
                        Value::Integer(value) => {
                            self.stack.push(Value::Integer(value.wrapping_neg()));
                            Ok(None)
                        }
                        Value::Float(value) => {
                            self.stack.push(Value::Float(-value));
                            Ok(None)
                        }
                        _ => Err(Error::new(
                            range,
                            format!("expected a number, got {}", value.type_name()),
                        )),
                    }
                }
                Opcode::Not => {
                    let value = self.pop();
                    match value.as_bool() {
                        Some(value) => {
                            self.stack.push(Value::Bool(!value));
                            Ok(None)
                        }
                        None => Err(Error::new(range, "expected true or false")),
                    }
                }
                Opcode::Increment => {
                    let value = self.pop();
                    match value.as_integer() {
                        Some(value) => {
                            self.stack.push(Value::Integer(value.wrapping_add(1)));
                            Ok(None)
                        }
                        None => Err(Error::new(range, "expected an integer")),
                    }
                }
                Opcode::Add
                | Opcode::Subtract
                | Opcode::Multiply
                | Opcode::Divide
                | Opcode::Modulo
                | Opcode::Exponent => {
                    let rhs = self.pop();
                    let lhs = self.pop();
                    self.binary_arithmetic(range, op, &lhs, &rhs).map(|_| None)
                }
                Opcode::Equal => {
                    let rhs = self.pop();
                    let lhs = self.pop();
                    self.stack.push(Value::Bool(lhs.equals(&rhs)));
                    Ok(None)
                }
                Opcode::NotEqual => {
                    let rhs = self.pop();
                    let lhs = self.pop();
                    self.stack.push(Value::Bool(!lhs.equals(&rhs)));
                    Ok(None)
                }
                Opcode::LessThan
                | Opcode::GreaterThan
                | Opcode::LessThanOrEqual
                | Opcode::GreaterThanOrEqual => {
                    let rhs = self.pop();
                    let lhs = self.pop();
                    self.binary_comparison(range, op, &lhs, &rhs).map(|_| None)
                }
                Opcode::Subscript => {
                    let key = self.pop();
                    let target = self.pop();
                    let result = match target.as_object().and_then(|object| object.as_subscriptable()) {
                        Some(subscriptable) => subscriptable
                            .subscript(&key)
                            .map_err(|message| Error::new(range, message)),
                        None => Err(Error::new(
                            range,
                            format!("can't subscript a {}", target.type_name()),
                        )),
                    };
                    match result {
                        Ok(value) => {
                            self.track(&value);
                            self.stack.push(value);
                            Ok(None)
                        }
                        Err(error) => Err(error),
                    }
                }
                Opcode::SetSubscript => {
                    let key = self.pop();
                    let target = self.pop();
                    let value = self.pop();
                    match target.as_object().and_then(|object| object.as_subscriptable()) {
                        Some(subscriptable) => subscriptable
                            .set_subscript(&key, value)
                            .map(|()| None)
                            .map_err(|message| Error::new(range, message)),
                        None => Err(Error::new(
                            range,
                            format!("can't subscript a {}", target.type_name()),
                        )),
                    }
                }
                Opcode::SetIt => {
                    let value = self.pop();
                    frame!().it = value;
                    Ok(None)
                }
                Opcode::GetIt => {
                    let value = frame!().it.clone();
                    self.stack.push(value);
                    Ok(None)
                }
                Opcode::Call => {
                    let count = fetch_u16!() as usize;
                    let ranges = frame!().bytecode.argument_ranges(op_offset);
                    let callee = self.stack[self.stack.len() - count - 1].clone();
                    self.call(range, callee, count, ranges).map(|()| None)
                }
                Opcode::ToString => {
                    let value = self.pop();
                    self.stack.push(Value::string(value.to_text()));
                    Ok(None)
                }
                Opcode::Show => {
                    let text = format!("{}\n", self.peek().to_text());
                    self.config.output.borrow_mut().out(&text);
                    Ok(None)
                }
            };

            match outcome {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(error) => {
                    if let Some(fatal) = self.throw(error) {
                        return Err(fatal);
                    }
                }
            }
        }
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("value stack underflow")
    }

    fn peek(&self) -> &Value {
        self.stack.last().expect("value stack underflow")
    }

    /// Unwinds to the nearest try handler, or returns the error when no
    /// handler is active in any frame.
    fn throw(&mut self, error: Error) -> Option<Error> {
        while self.frames.len() > 1
            && self
                .frames
                .last()
                .is_some_and(|frame| frame.jumps.is_empty())
        {
            let sp = self.frames.last().expect("no active frame").sp;
            self.stack.truncate(sp);
            self.frames.pop();
        }
        let frame = self.frames.last_mut()?;
        if frame.jumps.is_empty() {
            return Some(error);
        }
        let target = frame.jumps.pop().expect("handler stack is non-empty");
        let depth = frame.sps.pop().expect("handler stacks are paired");
        frame.error = error.value;
        frame.ip = target;
        self.stack.truncate(depth);
        None
    }

    fn make_range(
        &mut self,
        range: SourceRange,
        start: &Value,
        end: &Value,
        closed: bool,
    ) -> RunResult<()> {
        let (Some(start), Some(end)) = (start.as_integer(), end.as_integer()) else {
            return Err(Error::new(range, "expected an integer"));
        };
        if end < start {
            return Err(Error::new(range, "range end must not be less than its start"));
        }
        self.stack
            .push(Value::object(Object::Range(Range::new(start, end, closed))));
        Ok(())
    }

    fn binary_arithmetic(
        &mut self,
        range: SourceRange,
        op: Opcode,
        lhs: &Value,
        rhs: &Value,
    ) -> RunResult<()> {
        // Strings support `+` as concatenation, nothing else.
        if op == Opcode::Add
            && let (Some(lhs), Some(rhs)) = (lhs.as_string_text(), rhs.as_string_text())
        {
            self.stack.push(Value::string(lhs + &rhs));
            return Ok(());
        }

        if let (Value::Integer(lhs), Value::Integer(rhs)) = (lhs, rhs) {
            let result = match op {
                Opcode::Add => Value::Integer(lhs.wrapping_add(*rhs)),
                Opcode::Subtract => Value::Integer(lhs.wrapping_sub(*rhs)),
                Opcode::Multiply => Value::Integer(lhs.wrapping_mul(*rhs)),
                Opcode::Divide => {
                    if *rhs == 0 {
                        return Err(Error::new(range, "division by zero"));
                    }
                    Value::Integer(lhs.wrapping_div(*rhs))
                }
                Opcode::Modulo => {
                    if *rhs == 0 {
                        return Err(Error::new(range, "division by zero"));
                    }
                    Value::Integer(lhs.wrapping_rem(*rhs))
                }
                Opcode::Exponent => match u32::try_from(*rhs) {
                    Ok(exponent) => Value::Integer(lhs.wrapping_pow(exponent)),
                    Err(_) => Value::Float((*lhs as f64).powf(*rhs as f64)),
                },
                _ => unreachable!("not an arithmetic opcode"),
            };
            self.stack.push(result);
            return Ok(());
        }

        if let (Some(lhs), Some(rhs)) = (lhs.number_as_float(), rhs.number_as_float()) {
            let result = match op {
                Opcode::Add => lhs + rhs,
                Opcode::Subtract => lhs - rhs,
                Opcode::Multiply => lhs * rhs,
                Opcode::Divide => {
                    if rhs == 0.0 {
                        return Err(Error::new(range, "division by zero"));
                    }
                    lhs / rhs
                }
                Opcode::Modulo => lhs % rhs,
                Opcode::Exponent => lhs.powf(rhs),
                _ => unreachable!("not an arithmetic opcode"),
            };
            self.stack.push(Value::Float(result));
            return Ok(());
        }

        Err(Error::new(
            range,
            format!(
                "mismatched types: {} {} {}",
                lhs.type_name(),
                arithmetic_symbol(op),
                rhs.type_name()
            ),
        ))
    }

    fn binary_comparison(
        &mut self,
        range: SourceRange,
        op: Opcode,
        lhs: &Value,
        rhs: &Value,
    ) -> RunResult<()> {
        let result = if let (Value::Integer(lhs), Value::Integer(rhs)) = (lhs, rhs) {
            match op {
                Opcode::LessThan => lhs < rhs,
                Opcode::GreaterThan => lhs > rhs,
                Opcode::LessThanOrEqual => lhs <= rhs,
                _ => lhs >= rhs,
            }
        } else if let (Some(lhs), Some(rhs)) = (lhs.number_as_float(), rhs.number_as_float()) {
            match op {
                Opcode::LessThan => lhs < rhs,
                Opcode::GreaterThan => lhs > rhs,
                Opcode::LessThanOrEqual => lhs <= rhs,
                _ => lhs >= rhs,
            }
        } else {
            return Err(Error::new(
                range,
                format!(
                    "mismatched types: {} {} {}",
                    lhs.type_name(),
                    comparison_symbol(op),
                    rhs.type_name()
                ),
            ));
        };
        self.stack.push(Value::Bool(result));
        Ok(())
    }

    /// Calls a function or native with `count` arguments already on the
    /// stack, the callee just below them.
    fn call(
        &mut self,
        range: SourceRange,
        callee: Value,
        count: usize,
        argument_ranges: SmallVec<[SourceRange; 4]>,
    ) -> RunResult<()> {
        let Some(object) = callee.as_object() else {
            return Err(Error::new(
                range,
                format!("a {} can't be called", callee.type_name()),
            ));
        };

        if let Some(function) = object.as_function() {
            let caller = self.frames.last().expect("no active frame");
            let mut captures = Vec::with_capacity(function.captures.len());
            for capture in &function.captures {
                if capture.is_local {
                    captures.push(caller.sp + capture.index as usize);
                } else {
                    captures.push(caller.captures[capture.index as usize]);
                }
            }
            let sp = self.stack.len() - count - 1;
            let locals = function.bytecode.locals().len();
            self.frames
                .push(CallFrame::new(Rc::clone(&function.bytecode), captures, sp));
            // Slot zero (the callee) and the arguments are already in place.
            for _ in (1 + count)..locals {
                self.stack.push(Value::Empty);
            }
            return Ok(());
        }

        if let Some(native) = object.as_native() {
            let arguments = self.stack[self.stack.len() - count..].to_vec();
            let callable = native.callable();
            let result = {
                let mut context = NativeCallContext {
                    vm: self,
                    range,
                    arguments,
                    argument_ranges,
                };
                callable(&mut context)
            };
            let depth = self.stack.len() - count - 1;
            self.stack.truncate(depth);
            let value = result?;
            self.stack.push(value);
            return Ok(());
        }

        Err(Error::new(
            range,
            format!("a {} can't be called", callee.type_name()),
        ))
    }

    // ---- garbage collection ----

    /// Breaks container cycles unreachable from the roots.
    ///
    /// Roots are the globals, exports, the value stack, the `it` register,
    /// and every frame's registers. Unreachable tracked containers get their
    /// outgoing references dropped; reference counting does the rest.
    pub fn collect_garbage(&mut self) {
        let mut live: Vec<Rc<Object>> = Vec::with_capacity(self.tracked.len());
        self.tracked.retain(|weak| match weak.upgrade() {
            Some(object) => {
                live.push(object);
                true
            }
            None => false,
        });
        if live.is_empty() {
            self.gc_threshold = 64;
            return;
        }

        let mut visited = ahash::AHashSet::new();
        let mut pending = self.gather_roots();
        while let Some(object) = pending.pop() {
            let key = Rc::as_ptr(&object) as usize;
            if !visited.insert(key) {
                continue;
            }
            object.trace(&mut |child| pending.push(Rc::clone(child)));
        }

        for object in &live {
            if !visited.contains(&(Rc::as_ptr(object) as usize)) {
                object.release_children();
            }
        }

        drop(live);
        self.tracked.retain(|weak| weak.strong_count() > 0);
        self.gc_threshold = (self.tracked.len() * 2).max(64);
    }

    fn gather_roots(&self) -> Vec<Rc<Object>> {
        let mut roots = Vec::new();
        let mut add = |value: &Value| {
            if let Value::Object(object) = value {
                roots.push(Rc::clone(object));
            }
        };
        for value in self.globals.values() {
            add(value);
        }
        for value in self.exports.values() {
            add(value);
        }
        for value in &self.stack {
            add(value);
        }
        add(&self.it);
        for frame in &self.frames {
            add(&frame.it);
            add(&frame.error);
        }
        roots
    }
}

fn arithmetic_symbol(op: Opcode) -> &'static str {
    match op {
        Opcode::Add => "+",
        Opcode::Subtract => "-",
        Opcode::Multiply => "*",
        Opcode::Divide => "/",
        Opcode::Modulo => "%",
        Opcode::Exponent => "^",
        _ => "?",
    }
}

fn comparison_symbol(op: Opcode) -> &'static str {
    match op {
        Opcode::LessThan => "<",
        Opcode::GreaterThan => ">",
        Opcode::LessThanOrEqual => "<=",
        Opcode::GreaterThanOrEqual => ">=",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executes_hand_assembled_bytecode() {
        let mut bytecode = Bytecode::new("test");
        bytecode.add_local("");
        bytecode.emit_with(SourceRange::default(), Opcode::Short, 2);
        bytecode.emit_with(SourceRange::default(), Opcode::Short, 3);
        bytecode.emit(SourceRange::default(), Opcode::Add);
        bytecode.emit(SourceRange::default(), Opcode::Return);

        let mut vm = VirtualMachine::default();
        let result = vm.execute(Rc::new(bytecode)).unwrap();
        assert!(result.equals(&Value::Integer(5)));
    }

    #[test]
    fn division_by_zero_without_a_handler_is_fatal() {
        let mut bytecode = Bytecode::new("test");
        bytecode.add_local("");
        bytecode.emit_with(SourceRange::default(), Opcode::Short, 1);
        bytecode.emit_with(SourceRange::default(), Opcode::Short, 0);
        bytecode.emit(SourceRange::default(), Opcode::Divide);
        bytecode.emit(SourceRange::default(), Opcode::Return);

        let mut vm = VirtualMachine::default();
        let error = vm.execute(Rc::new(bytecode)).unwrap_err();
        assert_eq!(error.what(), "division by zero");
    }

    #[test]
    fn cycle_collection_reclaims_unreachable_containers() {
        let mut vm = VirtualMachine::default();
        let a = vm.new_list(Vec::new());
        let b = vm.new_list(Vec::new());
        let a_object = Rc::clone(a.as_object().expect("a is an object"));
        let b_object = Rc::clone(b.as_object().expect("b is an object"));
        a_object.as_list().expect("a is a list").push(b.clone());
        b_object.as_list().expect("b is a list").push(a.clone());

        let weak_a = Rc::downgrade(&a_object);
        let weak_b = Rc::downgrade(&b_object);
        drop((a, b, a_object, b_object));

        // The cycle keeps both alive until the collector breaks it.
        assert!(weak_a.upgrade().is_some());
        vm.collect_garbage();
        assert!(weak_a.upgrade().is_none());
        assert!(weak_b.upgrade().is_none());
    }

    #[test]
    fn reachable_containers_survive_collection() {
        let mut vm = VirtualMachine::default();
        let a = vm.new_list(Vec::new());
        let b = vm.new_list(Vec::new());
        a.as_object()
            .expect("a is an object")
            .as_list()
            .expect("a is a list")
            .push(b.clone());
        drop(b);
        vm.add_global("keep".to_string(), a.clone());
        let weak = Rc::downgrade(a.as_object().expect("a is an object"));
        drop(a);

        vm.collect_garbage();
        let kept = weak.upgrade().expect("rooted list survives");
        assert_eq!(kept.as_list().expect("a is a list").size(), 1);
    }
}
