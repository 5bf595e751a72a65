//! Single-pass bytecode compiler.
//!
//! One visitor pass over the AST. A stack of frames mirrors nested function
//! declarations; variable reads resolve to local slots, chained captures, or
//! named globals, in that order. Control flow lowers to conditional jumps
//! patched after their targets are known.

use std::rc::Rc;

use ahash::AHashSet;
use smallvec::SmallVec;

use crate::{
    ast::{
        Assignment, AssignmentTarget, BinaryOperator, Block, Call, Expr, ExprKind, FunctionDecl,
        If, Repeat, RepeatCondition, RepeatFor, Return, Statement, Try, UnaryOperator, Use, Using,
        Variable, VariableScope,
    },
    bytecode::{Bytecode, Opcode},
    error::Error,
    location::SourceRange,
    module::{Module, ModuleProvider},
    object::Object,
    objects::{Capture, Function},
    reporter::Reporter,
    token::{Token, TokenKind},
    value::Value,
};

pub struct CompilerConfig {
    /// Interactive mode binds top-level names globally so a REPL session can
    /// see them across inputs.
    pub interactive: bool,
    /// Record per-argument source ranges at call sites.
    pub enable_debug_info: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            interactive: false,
            enable_debug_info: true,
        }
    }
}

struct Local {
    name: String,
    scope_depth: usize,
}

struct Frame {
    bytecode: Bytecode,
    locals: Vec<Local>,
    captures: Vec<Capture>,
}

impl Frame {
    fn new(name: &str) -> Self {
        Self {
            bytecode: Bytecode::new(name),
            locals: Vec::new(),
            captures: Vec::new(),
        }
    }
}

pub struct Compiler<'a> {
    config: CompilerConfig,
    reporter: &'a mut dyn Reporter,
    provider: &'a dyn ModuleProvider,

    frames: Vec<Frame>,
    scope_depth: usize,
    /// Names resolved as globals; the host injects matching natives.
    globals: AHashSet<String>,
    /// Loop start offset that `next repeat` jumps back to.
    next_repeat: usize,
    /// Pending `exit repeat` jumps per enclosing loop.
    exit_patches: Vec<Vec<usize>>,
    failed: bool,
}

impl<'a> Compiler<'a> {
    pub fn new(
        config: CompilerConfig,
        reporter: &'a mut dyn Reporter,
        provider: &'a dyn ModuleProvider,
    ) -> Self {
        Self {
            config,
            reporter,
            provider,
            frames: Vec::new(),
            scope_depth: 0,
            globals: AHashSet::new(),
            next_repeat: 0,
            exit_patches: Vec::new(),
            failed: false,
        }
    }

    /// Compiles a program to bytecode, or `None` after reporting errors.
    pub fn compile(&mut self, statement: &Statement) -> Option<Bytecode> {
        self.frames.push(Frame::new("<script>"));
        self.add_local("");

        self.visit_statement(statement);
        self.add_implicit_return();

        let frame = self.frames.pop().expect("compiler frame stack underflow");
        if self.failed { None } else { Some(frame.bytecode) }
    }

    /// Every name the compiled code reads or writes through `GetGlobal`/
    /// `SetGlobal`.
    #[must_use]
    pub fn globals(&self) -> &AHashSet<String> {
        &self.globals
    }

    fn error(&mut self, range: SourceRange, message: impl Into<String>) {
        self.failed = true;
        self.reporter.report(&Error::new(range, message));
    }

    fn bytecode(&mut self) -> &mut Bytecode {
        &mut self
            .frames
            .last_mut()
            .expect("compiler frame stack underflow")
            .bytecode
    }

    fn add_local(&mut self, name: &str) {
        let scope_depth = self.scope_depth;
        let frame = self
            .frames
            .last_mut()
            .expect("compiler frame stack underflow");
        frame.locals.push(Local {
            name: name.to_string(),
            scope_depth,
        });
        frame.bytecode.add_local(name);
    }

    fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    fn end_scope(&mut self, range: SourceRange) {
        self.scope_depth -= 1;
        loop {
            let expired = self
                .frames
                .last()
                .expect("compiler frame stack underflow")
                .locals
                .last()
                .is_some_and(|local| local.scope_depth > self.scope_depth);
            if !expired {
                break;
            }
            self.frames
                .last_mut()
                .expect("compiler frame stack underflow")
                .locals
                .pop();
            self.bytecode().emit(range, Opcode::Pop);
        }
    }

    fn add_implicit_return(&mut self) {
        if self.bytecode().last_opcode() != Some(Opcode::Return) {
            self.bytecode().emit(SourceRange::default(), Opcode::GetIt);
            self.bytecode().emit(SourceRange::default(), Opcode::Return);
        }
    }

    // ---- variable resolution ----

    fn find_local(frame: &Frame, name: &str) -> Option<usize> {
        frame
            .locals
            .iter()
            .rposition(|local| local.name == name)
    }

    fn add_capture(frame: &mut Frame, index: usize, is_local: bool) -> usize {
        let index = u16::try_from(index).expect("capture index exceeds u16 range");
        if let Some(existing) = frame
            .captures
            .iter()
            .position(|capture| capture.index == index && capture.is_local == is_local)
        {
            return existing;
        }
        frame.captures.push(Capture { index, is_local });
        frame.captures.len() - 1
    }

    /// Resolves `name` against enclosing frames, threading a capture chain
    /// through every intermediate frame. The innermost capture marks the
    /// real local; the outer ones reference the next frame's capture slot.
    fn find_capture(&mut self, name: &str) -> Option<usize> {
        if self.frames.len() < 2 {
            return None;
        }
        let mut found = None;
        for frame_index in (0..self.frames.len() - 1).rev() {
            if let Some(local_index) = Self::find_local(&self.frames[frame_index], name) {
                found = Some((frame_index, local_index));
                break;
            }
        }
        let (frame_index, local_index) = found?;
        let mut capture_index = Self::add_capture(&mut self.frames[frame_index + 1], local_index, true);
        for index in frame_index + 2..self.frames.len() {
            capture_index = Self::add_capture(&mut self.frames[index], capture_index, false);
        }
        Some(capture_index)
    }

    fn assign_local(&mut self, range: SourceRange, name: &str) {
        let frame = self.frames.last().expect("compiler frame stack underflow");
        if let Some(index) = Self::find_local(frame, name) {
            let index = index as u16;
            self.bytecode().emit_with(range, Opcode::SetLocal, index);
            return;
        }
        if let Some(index) = self.find_capture(name) {
            let index = index as u16;
            self.bytecode().emit_with(range, Opcode::SetCapture, index);
            return;
        }
        self.add_local(name);
        let count = self
            .frames
            .last()
            .expect("compiler frame stack underflow")
            .locals
            .len();
        let Ok(index) = u16::try_from(count - 1) else {
            self.error(range, "too many local variables");
            return;
        };
        self.bytecode().emit_with(range, Opcode::SetLocal, index);
    }

    fn assign_global(&mut self, range: SourceRange, name: &str) {
        self.globals.insert(name.to_string());
        let constant = self.bytecode().add_constant(Value::string(name));
        self.bytecode().emit_with(range, Opcode::SetGlobal, constant);
    }

    fn assign_variable(&mut self, range: SourceRange, name: &str, scope: Option<VariableScope>) {
        match scope {
            Some(VariableScope::Local) => self.assign_local(range, name),
            Some(VariableScope::Global) => self.assign_global(range, name),
            None => {
                if self.scope_depth > 0 {
                    self.assign_local(range, name);
                } else if self.config.interactive {
                    self.assign_global(range, name);
                } else {
                    self.assign_local(range, name);
                }
            }
        }
    }

    fn assign_function(&mut self, range: SourceRange, name: &str) {
        if self.scope_depth > 0 {
            self.assign_local(range, name);
        } else {
            self.assign_global(range, name);
        }
    }

    fn emit_global_read(&mut self, range: SourceRange, name: &str) {
        self.globals.insert(name.to_string());
        let constant = self.bytecode().add_constant(Value::string(name));
        self.bytecode().emit_with(range, Opcode::GetGlobal, constant);
    }

    /// Emits the read of a call target by its canonical signature name.
    fn resolve_call(&mut self, range: SourceRange, name: &str) {
        if !self.config.interactive || self.scope_depth > 0 {
            let frame = self.frames.last().expect("compiler frame stack underflow");
            if let Some(index) = Self::find_local(frame, name) {
                let index = index as u16;
                self.bytecode().emit_with(range, Opcode::GetLocal, index);
                return;
            }
            if let Some(index) = self.find_capture(name) {
                let index = index as u16;
                self.bytecode().emit_with(range, Opcode::GetCapture, index);
                return;
            }
        }
        self.emit_global_read(range, name);
    }

    fn resolve_variable(&mut self, variable: &Variable) {
        let name = variable.name.word();
        let range = variable.range;
        let forced_local = variable.scope == Some(VariableScope::Local);
        let forced_global = variable.scope == Some(VariableScope::Global);

        if forced_global {
            self.emit_global_read(range, &name);
            return;
        }
        if !self.config.interactive || self.scope_depth > 0 || forced_local {
            let frame = self.frames.last().expect("compiler frame stack underflow");
            if let Some(index) = Self::find_local(frame, &name) {
                let index = index as u16;
                self.bytecode().emit_with(range, Opcode::GetLocal, index);
                return;
            }
            if let Some(index) = self.find_capture(&name) {
                let index = index as u16;
                self.bytecode().emit_with(range, Opcode::GetCapture, index);
                return;
            }
            if forced_local {
                self.error(range, format!("no local variable named \"{name}\""));
                return;
            }
        }
        self.emit_global_read(range, &name);
    }

    // ---- statements ----

    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Block(block) => self.visit_block(block),
            Statement::FunctionDecl(decl) => self.visit_function_decl(decl),
            Statement::If(statement) => self.visit_if(statement),
            Statement::Try(statement) => self.visit_try(statement),
            Statement::Use(statement) => self.visit_use(statement),
            Statement::Using(statement) => self.visit_using(statement),
            Statement::Assignment(statement) => self.visit_assignment(statement),
            Statement::Expression(expression) => {
                self.visit_expr(expression);
                self.bytecode().emit(expression.range, Opcode::SetIt);
            }
            Statement::Return(statement) => self.visit_return(statement),
            Statement::Repeat(statement) => self.visit_repeat(statement),
            Statement::RepeatCondition(statement) => self.visit_repeat_condition(statement),
            Statement::RepeatFor(statement) => self.visit_repeat_for(statement),
            Statement::ExitRepeat(range) => {
                let jump = self.bytecode().emit_jump(*range, Opcode::Jump);
                self.exit_patches
                    .last_mut()
                    .expect("exit repeat outside of a loop")
                    .push(jump);
            }
            Statement::NextRepeat(range) => {
                let target = self.next_repeat;
                self.bytecode().emit_repeat(*range, target);
            }
        }
    }

    fn visit_block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.visit_statement(statement);
        }
    }

    fn visit_function_decl(&mut self, decl: &FunctionDecl) {
        self.begin_scope();
        self.frames.push(Frame::new(&decl.signature.name()));

        // Slot zero holds the function itself, so recursion resolves.
        self.add_local(&decl.signature.name());
        for target in &decl.targets {
            self.add_target_locals(target);
        }

        self.visit_statement(&decl.body);
        self.add_implicit_return();

        let frame = self.frames.pop().expect("compiler frame stack underflow");
        self.end_scope(decl.range);

        let function = Function::new(
            decl.signature.clone(),
            Rc::new(frame.bytecode),
            frame.captures,
        );
        let constant = self
            .bytecode()
            .add_constant(Value::object(Object::Function(function)));
        self.bytecode().emit_with(decl.range, Opcode::Constant, constant);
        self.assign_function(decl.range, &decl.signature.name());
    }

    fn add_target_locals(&mut self, target: &AssignmentTarget) {
        match target {
            AssignmentTarget::Variable(target) => {
                let name = target.variable.name.word();
                if name == "_" {
                    self.add_local("");
                } else {
                    self.add_local(&name);
                }
            }
            AssignmentTarget::Structured(target) => {
                for nested in &target.targets {
                    self.add_target_locals(nested);
                }
            }
        }
    }

    fn visit_if(&mut self, statement: &If) {
        self.visit_expr(&statement.condition);
        let if_jump = self.bytecode().emit_jump(statement.range, Opcode::JumpIfFalse);
        self.bytecode().emit(statement.range, Opcode::Pop);
        self.visit_statement(&statement.then_branch);

        let else_jump = self.bytecode().emit_jump(statement.range, Opcode::Jump);
        self.bytecode().patch_jump(if_jump);
        self.bytecode().emit(statement.range, Opcode::Pop);
        if let Some(else_branch) = &statement.else_branch {
            self.visit_statement(else_branch);
        }
        self.bytecode().patch_jump(else_jump);
    }

    fn visit_try(&mut self, statement: &Try) {
        let try_jump = self.bytecode().emit_jump(statement.range, Opcode::PushJump);
        self.visit_statement(&statement.body);
        self.bytecode().emit(statement.range, Opcode::PopJump);
        self.bytecode().patch_absolute_jump(try_jump);
    }

    fn visit_use(&mut self, statement: &Use) {
        let source = statement.target.string_value_or_word();
        // The parser already reported unresolvable modules.
        let Ok(module) = self.provider.module(&source) else {
            return;
        };
        self.bind_module_values(statement.range, module.as_ref());
    }

    fn visit_using(&mut self, statement: &Using) {
        let source = statement.target.string_value_or_word();
        let module = self.provider.module(&source).ok();
        self.begin_scope();
        if let Some(module) = &module {
            self.bind_module_values(statement.range, module.as_ref());
        }
        self.visit_statement(&statement.body);
        self.end_scope(statement.range);
    }

    fn bind_module_values(&mut self, range: SourceRange, module: &dyn Module) {
        for (name, value) in module.values() {
            let constant = self.bytecode().add_constant(value.clone());
            self.bytecode().emit_with(range, Opcode::Constant, constant);
            self.assign_variable(range, name, Some(VariableScope::Local));
        }
    }

    fn visit_return(&mut self, statement: &Return) {
        match &statement.expression {
            Some(expression) => self.visit_expr(expression),
            None => {
                self.bytecode().emit(statement.range, Opcode::Empty);
            }
        }
        self.bytecode().emit(statement.range, Opcode::Return);
    }

    fn visit_assignment(&mut self, statement: &Assignment) {
        self.visit_expr(&statement.expression);
        if statement.targets.len() > 1 {
            let Ok(count) = u16::try_from(statement.targets.len()) else {
                self.error(statement.range, "too many assignment targets");
                return;
            };
            self.bytecode()
                .emit_with(statement.expression.range, Opcode::UnpackList, count);
        }
        for target in statement.targets.iter().rev() {
            self.visit_target(target);
        }
    }

    fn visit_target(&mut self, target: &AssignmentTarget) {
        match target {
            AssignmentTarget::Variable(target) => {
                if !target.subscripts.is_empty() {
                    self.resolve_variable(&target.variable);
                    for subscript in &target.subscripts[..target.subscripts.len() - 1] {
                        self.visit_expr(subscript);
                        self.bytecode().emit(subscript.range, Opcode::Subscript);
                    }
                    let last = target
                        .subscripts
                        .last()
                        .expect("subscripts are non-empty");
                    self.visit_expr(last);
                    self.bytecode().emit(target.range, Opcode::SetSubscript);
                    return;
                }
                let name = target.variable.name.word();
                if name == "it" {
                    self.bytecode().emit(target.range, Opcode::SetIt);
                } else {
                    self.assign_variable(target.range, &name, target.variable.scope);
                }
            }
            AssignmentTarget::Structured(target) => {
                let Ok(count) = u16::try_from(target.targets.len()) else {
                    self.error(target.range, "too many assignment targets");
                    return;
                };
                self.bytecode().emit_with(target.range, Opcode::UnpackList, count);
                for nested in target.targets.iter().rev() {
                    self.visit_target(nested);
                }
            }
        }
    }

    fn visit_repeat(&mut self, statement: &Repeat) {
        let outer_next = self.next_repeat;
        self.exit_patches.push(Vec::new());
        self.next_repeat = self.bytecode().current_offset();

        self.visit_statement(&statement.body);
        let target = self.next_repeat;
        self.bytecode().emit_repeat(statement.range, target);

        for jump in self.exit_patches.pop().expect("exit patch stack underflow") {
            self.bytecode().patch_jump(jump);
        }
        self.next_repeat = outer_next;
    }

    fn visit_repeat_condition(&mut self, statement: &RepeatCondition) {
        let outer_next = self.next_repeat;
        self.exit_patches.push(Vec::new());
        self.next_repeat = self.bytecode().current_offset();

        self.visit_expr(&statement.condition);
        let test = if statement.until {
            Opcode::JumpIfTrue
        } else {
            Opcode::JumpIfFalse
        };
        let exit_jump = self.bytecode().emit_jump(statement.range, test);

        self.bytecode().emit(statement.range, Opcode::Pop);
        self.visit_statement(&statement.body);
        let target = self.next_repeat;
        self.bytecode().emit_repeat(statement.range, target);

        self.bytecode().patch_jump(exit_jump);
        self.bytecode().emit(statement.range, Opcode::Pop);
        for jump in self.exit_patches.pop().expect("exit patch stack underflow") {
            self.bytecode().patch_jump(jump);
        }
        self.next_repeat = outer_next;
    }

    fn visit_repeat_for(&mut self, statement: &RepeatFor) {
        let outer_next = self.next_repeat;
        self.exit_patches.push(Vec::new());

        self.visit_expr(&statement.expression);
        self.bytecode()
            .emit(statement.expression.range, Opcode::GetEnumerator);
        // `next repeat` re-tests exhaustion before advancing again.
        self.next_repeat = self
            .bytecode()
            .emit_jump(statement.expression.range, Opcode::JumpIfAtEnd);
        self.bytecode().emit(statement.expression.range, Opcode::Enumerate);
        if statement.variables.len() > 1 {
            let Ok(count) = u16::try_from(statement.variables.len()) else {
                self.error(statement.range, "too many loop variables");
                return;
            };
            self.bytecode()
                .emit_with(statement.expression.range, Opcode::UnpackList, count);
        }
        for variable in statement.variables.iter().rev() {
            let name = variable.name.word();
            self.assign_variable(statement.expression.range, &name, variable.scope);
        }

        self.visit_statement(&statement.body);

        let target = self.next_repeat;
        self.bytecode().emit_repeat(statement.range, target);
        let pop_location = self.bytecode().current_offset();
        self.bytecode().emit(statement.range, Opcode::Pop);
        let next_repeat = self.next_repeat;
        self.bytecode().patch_jump_to(next_repeat, pop_location);
        for jump in self.exit_patches.pop().expect("exit patch stack underflow") {
            self.bytecode().patch_jump_to(jump, pop_location);
        }
        self.next_repeat = outer_next;
    }

    // ---- expressions ----

    fn visit_expr(&mut self, expression: &Expr) {
        match &expression.kind {
            ExprKind::Call(call) => self.visit_call(call, expression.range),
            ExprKind::Binary { operator, lhs, rhs } => {
                self.visit_binary(*operator, lhs, rhs, expression.range);
            }
            ExprKind::Unary { operator, expr } => {
                self.visit_expr(expr);
                let op = match operator {
                    UnaryOperator::Minus => Opcode::Negate,
                    UnaryOperator::Not => Opcode::Not,
                };
                self.bytecode().emit(expression.range, op);
            }
            ExprKind::Grouping(inner) => self.visit_expr(inner),
            ExprKind::Variable(variable) => {
                if variable.name.word() == "it" {
                    self.bytecode().emit(variable.range, Opcode::GetIt);
                } else {
                    self.resolve_variable(variable);
                }
            }
            ExprKind::Literal(token) => self.visit_literal(token, expression.range),
            ExprKind::ListLiteral(expressions) => {
                for element in expressions {
                    self.visit_expr(element);
                }
                let Ok(count) = u16::try_from(expressions.len()) else {
                    self.error(expression.range, "too many list elements");
                    return;
                };
                self.bytecode().emit_with(expression.range, Opcode::List, count);
            }
            ExprKind::DictionaryLiteral(entries) => {
                for (key, value) in entries {
                    self.visit_expr(key);
                    self.visit_expr(value);
                }
                let Ok(count) = u16::try_from(entries.len()) else {
                    self.error(expression.range, "too many dictionary entries");
                    return;
                };
                self.bytecode()
                    .emit_with(expression.range, Opcode::Dictionary, count);
            }
            ExprKind::RangeLiteral { start, end, closed } => {
                self.visit_expr(start);
                self.visit_expr(end);
                let op = if *closed {
                    Opcode::ClosedRange
                } else {
                    Opcode::OpenRange
                };
                self.bytecode().emit(expression.range, op);
            }
            ExprKind::Interpolation { left, expr, right } => {
                let text = Value::string(left.string_value());
                let constant = self.bytecode().add_constant(text);
                self.bytecode().emit_with(left.range, Opcode::Constant, constant);

                self.visit_expr(expr);
                self.bytecode().emit(expr.range, Opcode::ToString);
                self.bytecode().emit(expr.range, Opcode::Add);

                self.visit_expr(right);
                self.bytecode().emit(right.range, Opcode::Add);
            }
        }
    }

    fn visit_call(&mut self, call: &Call, range: SourceRange) {
        self.resolve_call(range, &call.signature.name());

        let mut argument_ranges: SmallVec<[SourceRange; 4]> = SmallVec::new();
        if self.config.enable_debug_info {
            argument_ranges.push(range);
        }

        let arguments: Vec<_> = call.signature.arguments().collect();
        let mut total: u16 = 0;
        for (index, expression) in call.arguments.iter().enumerate() {
            if self.config.enable_debug_info {
                argument_ranges.push(expression.range);
            }
            self.visit_expr(expression);
            let count = arguments
                .get(index)
                .map_or(1, |argument| argument.targets.len());
            let Ok(count) = u16::try_from(count) else {
                self.error(expression.range, "too many argument targets");
                return;
            };
            if count > 1 {
                self.bytecode()
                    .emit_with(expression.range, Opcode::UnpackList, count);
            }
            total += count;
        }

        let call_offset = self.bytecode().emit_with(range, Opcode::Call, total);
        if self.config.enable_debug_info && !argument_ranges.is_empty() {
            self.bytecode().add_argument_ranges(call_offset, argument_ranges);
        }
    }

    fn visit_binary(&mut self, operator: BinaryOperator, lhs: &Expr, rhs: &Expr, range: SourceRange) {
        // `and`/`or` short-circuit around the right-hand side.
        if operator == BinaryOperator::And {
            self.visit_expr(lhs);
            let jump = self.bytecode().emit_jump(range, Opcode::JumpIfFalse);
            self.bytecode().emit(range, Opcode::Pop);
            self.visit_expr(rhs);
            self.bytecode().patch_jump(jump);
            return;
        }
        if operator == BinaryOperator::Or {
            self.visit_expr(lhs);
            let jump = self.bytecode().emit_jump(range, Opcode::JumpIfTrue);
            self.bytecode().emit(range, Opcode::Pop);
            self.visit_expr(rhs);
            self.bytecode().patch_jump(jump);
            return;
        }

        self.visit_expr(lhs);
        self.visit_expr(rhs);
        let op = match operator {
            BinaryOperator::Plus => Opcode::Add,
            BinaryOperator::Minus => Opcode::Subtract,
            BinaryOperator::Multiply => Opcode::Multiply,
            BinaryOperator::Divide => Opcode::Divide,
            BinaryOperator::Modulo => Opcode::Modulo,
            BinaryOperator::Exponent => Opcode::Exponent,
            BinaryOperator::Equal => Opcode::Equal,
            BinaryOperator::NotEqual => Opcode::NotEqual,
            BinaryOperator::LessThan => Opcode::LessThan,
            BinaryOperator::GreaterThan => Opcode::GreaterThan,
            BinaryOperator::LessThanOrEqual => Opcode::LessThanOrEqual,
            BinaryOperator::GreaterThanOrEqual => Opcode::GreaterThanOrEqual,
            BinaryOperator::Subscript => Opcode::Subscript,
            BinaryOperator::And | BinaryOperator::Or => unreachable!("handled above"),
        };
        self.bytecode().emit(range, op);
    }

    fn visit_literal(&mut self, token: &Token, range: SourceRange) {
        match token.kind {
            TokenKind::BoolLiteral => {
                let op = if token.word() == "true" {
                    Opcode::True
                } else {
                    Opcode::False
                };
                self.bytecode().emit(range, op);
            }
            TokenKind::Empty => {
                self.bytecode().emit(range, Opcode::Empty);
            }
            TokenKind::IntLiteral => match token.text.parse::<i64>() {
                Ok(value) => {
                    // Small integers load inline.
                    if let Ok(short) = u16::try_from(value) {
                        self.bytecode().emit_with(range, Opcode::Short, short);
                    } else {
                        let constant = self.bytecode().add_constant(Value::Integer(value));
                        self.bytecode().emit_with(range, Opcode::Constant, constant);
                    }
                }
                Err(_) => self.error(range, "integer literal out of range"),
            },
            TokenKind::FloatLiteral => match token.text.parse::<f64>() {
                Ok(value) => {
                    let constant = self.bytecode().add_constant(Value::Float(value));
                    self.bytecode().emit_with(range, Opcode::Constant, constant);
                }
                Err(_) => self.error(range, "number literal out of range"),
            },
            TokenKind::StringLiteral | TokenKind::ClosedInterpolation => {
                let constant = self
                    .bytecode()
                    .add_constant(Value::string(token.string_value()));
                self.bytecode().emit_with(range, Opcode::Constant, constant);
            }
            _ => self.error(range, format!("unexpected literal {}", token.description())),
        }
    }
}
