//! Bytecode: the instruction stream, constant pool, and debug tables.
//!
//! Instructions are a flat byte stream; every operand is a little-endian
//! u16. Jumps are relative (`Jump` adds its offset, `Repeat` subtracts it)
//! except `PushJump`, whose operand is the absolute handler offset. Forward
//! jumps are emitted with a zero placeholder and patched once the target is
//! known.

use std::fmt;

use ahash::AHashMap;
use smallvec::SmallVec;
use strum::{FromRepr, IntoStaticStr};

use crate::{location::SourceRange, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, IntoStaticStr)]
#[repr(u8)]
pub enum Opcode {
    Jump,
    JumpIfFalse,
    JumpIfTrue,
    JumpIfAtEnd,
    PushJump,
    PopJump,
    Repeat,
    Pop,
    Constant,
    Short,
    True,
    False,
    Empty,
    OpenRange,
    ClosedRange,
    List,
    Dictionary,
    UnpackList,
    Negate,
    Not,
    Increment,
    Add,
    Subtract,
    Multiply,
    Divide,
    Exponent,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Subscript,
    SetSubscript,
    GetEnumerator,
    Enumerate,
    SetGlobal,
    GetGlobal,
    SetLocal,
    GetLocal,
    SetCapture,
    GetCapture,
    SetIt,
    GetIt,
    Call,
    Return,
    ToString,
    Show,
}

impl Opcode {
    /// Whether this opcode carries a u16 operand.
    #[must_use]
    pub fn has_operand(self) -> bool {
        matches!(
            self,
            Self::Jump
                | Self::JumpIfFalse
                | Self::JumpIfTrue
                | Self::JumpIfAtEnd
                | Self::PushJump
                | Self::Repeat
                | Self::Constant
                | Self::Short
                | Self::List
                | Self::Dictionary
                | Self::UnpackList
                | Self::SetGlobal
                | Self::GetGlobal
                | Self::SetLocal
                | Self::GetLocal
                | Self::SetCapture
                | Self::GetCapture
                | Self::Call
        )
    }
}

/// A compiled instruction stream with its constants and debug tables.
#[derive(Debug, Default)]
pub struct Bytecode {
    name: String,
    code: Vec<u8>,
    constants: Vec<Value>,
    /// Instruction offset → source range, in emission order.
    locations: Vec<(u32, SourceRange)>,
    /// Call-site offset → ranges of the call and each argument.
    argument_ranges: AHashMap<u32, SmallVec<[SourceRange; 4]>>,
    /// Names of the frame's local slots, for diagnostics and disassembly.
    local_names: Vec<String>,
    /// Most recently emitted opcode, so the compiler can detect whether a
    /// body already ends in an explicit `Return`.
    last_op: Option<Opcode>,
}

impl Bytecode {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[must_use]
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    #[must_use]
    pub fn locals(&self) -> &[String] {
        &self.local_names
    }

    pub fn add_local(&mut self, name: impl Into<String>) {
        self.local_names.push(name.into());
    }

    /// Adds a constant, returning its pool index.
    ///
    /// # Panics
    /// Panics when the pool outgrows a u16 operand; that is a compiler
    /// limit, not a program error.
    pub fn add_constant(&mut self, value: Value) -> u16 {
        let index = u16::try_from(self.constants.len()).expect("constant pool exceeds u16 range");
        self.constants.push(value);
        index
    }

    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    #[must_use]
    pub fn last_opcode(&self) -> Option<Opcode> {
        self.last_op
    }

    /// Emits a no-operand instruction. Returns its offset.
    pub fn emit(&mut self, range: SourceRange, op: Opcode) -> usize {
        let offset = self.code.len();
        self.record_location(range);
        self.code.push(op as u8);
        self.last_op = Some(op);
        offset
    }

    /// Emits an instruction with a u16 operand. Returns its offset.
    pub fn emit_with(&mut self, range: SourceRange, op: Opcode, operand: u16) -> usize {
        let offset = self.emit(range, op);
        self.code.extend_from_slice(&operand.to_le_bytes());
        offset
    }

    /// Emits a forward jump with a placeholder offset; patch it later.
    pub fn emit_jump(&mut self, range: SourceRange, op: Opcode) -> usize {
        self.emit_with(range, op, 0)
    }

    /// Emits a backward `Repeat` to a known earlier offset.
    ///
    /// # Panics
    /// Panics when the loop body outgrows a u16 offset.
    pub fn emit_repeat(&mut self, range: SourceRange, target: usize) {
        let offset = self.code.len() + 3 - target;
        let offset = u16::try_from(offset).expect("loop body exceeds u16 jump range");
        self.emit_with(range, Opcode::Repeat, offset);
    }

    /// Patches a forward jump to land at the current offset.
    pub fn patch_jump(&mut self, label: usize) {
        self.patch_jump_to(label, self.code.len());
    }

    /// Patches a forward jump to land at `target`.
    ///
    /// # Panics
    /// Panics when the jump distance outgrows a u16 offset.
    pub fn patch_jump_to(&mut self, label: usize, target: usize) {
        let offset = u16::try_from(target - label - 3).expect("jump exceeds u16 range");
        let bytes = offset.to_le_bytes();
        self.code[label + 1] = bytes[0];
        self.code[label + 2] = bytes[1];
    }

    /// Patches a `PushJump` with the current offset as its absolute target.
    ///
    /// # Panics
    /// Panics when the handler offset outgrows a u16 operand.
    pub fn patch_absolute_jump(&mut self, label: usize) {
        let target = u16::try_from(self.code.len()).expect("handler offset exceeds u16 range");
        let bytes = target.to_le_bytes();
        self.code[label + 1] = bytes[0];
        self.code[label + 2] = bytes[1];
    }

    /// The source range of the instruction at `ip`.
    #[must_use]
    pub fn location(&self, ip: usize) -> SourceRange {
        let ip = ip as u32;
        match self.locations.binary_search_by_key(&ip, |entry| entry.0) {
            Ok(index) => self.locations[index].1,
            Err(0) => SourceRange::default(),
            Err(index) => self.locations[index - 1].1,
        }
    }

    pub fn add_argument_ranges(&mut self, at: usize, ranges: SmallVec<[SourceRange; 4]>) {
        self.argument_ranges.insert(at as u32, ranges);
    }

    #[must_use]
    pub fn argument_ranges(&self, at: usize) -> SmallVec<[SourceRange; 4]> {
        self.argument_ranges
            .get(&(at as u32))
            .cloned()
            .unwrap_or_default()
    }

    fn record_location(&mut self, range: SourceRange) {
        let offset = u32::try_from(self.code.len()).expect("bytecode length exceeds u32");
        if let Some(last) = self.locations.last()
            && last.1 == range
        {
            return;
        }
        self.locations.push((offset, range));
    }

    /// Writes a human-readable listing, one instruction per line, optionally
    /// prefixed with source locations. Function constants are listed
    /// recursively.
    pub fn disassemble(&self, out: &mut impl fmt::Write, with_locations: bool) -> fmt::Result {
        writeln!(out, "== {} ==", if self.name.is_empty() { "<script>" } else { &self.name })?;
        let mut ip = 0;
        while ip < self.code.len() {
            let Some(op) = Opcode::from_repr(self.code[ip]) else {
                writeln!(out, "{ip:04} ??? {}", self.code[ip])?;
                ip += 1;
                continue;
            };
            write!(out, "{ip:04} ")?;
            if with_locations {
                let location = self.location(ip).start;
                write!(out, "{:>5}:{:<3} ", location.line, location.column)?;
            }
            let name: &'static str = op.into();
            if op.has_operand() {
                let operand =
                    u16::from_le_bytes([self.code[ip + 1], self.code[ip + 2]]);
                write!(out, "{name} {operand}")?;
                match op {
                    Opcode::Constant | Opcode::GetGlobal | Opcode::SetGlobal => {
                        write!(out, " ({})", self.constants[operand as usize].description())?;
                    }
                    Opcode::GetLocal | Opcode::SetLocal => {
                        if let Some(local) = self.local_names.get(operand as usize)
                            && !local.is_empty()
                        {
                            write!(out, " ({local})")?;
                        }
                    }
                    Opcode::Jump | Opcode::JumpIfFalse | Opcode::JumpIfTrue
                    | Opcode::JumpIfAtEnd => {
                        write!(out, " (-> {})", ip + 3 + operand as usize)?;
                    }
                    Opcode::Repeat => {
                        write!(out, " (-> {})", ip + 3 - operand as usize)?;
                    }
                    _ => {}
                }
                writeln!(out)?;
                ip += 3;
            } else {
                writeln!(out, "{name}")?;
                ip += 1;
            }
        }
        for constant in &self.constants {
            if let Some(function) = constant
                .as_object()
                .and_then(|object| object.as_function())
            {
                writeln!(out)?;
                function.bytecode.disassemble(out, with_locations)?;
            }
        }
        Ok(())
    }
}

/// `Display` renders the listing without locations; use
/// [`Bytecode::disassemble`] directly for the located form.
impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.disassemble(f, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_jump_patching() {
        let mut bytecode = Bytecode::new("test");
        let jump = bytecode.emit_jump(SourceRange::default(), Opcode::Jump);
        bytecode.emit(SourceRange::default(), Opcode::True);
        bytecode.emit(SourceRange::default(), Opcode::Pop);
        bytecode.patch_jump(jump);
        // Jump lands past the two skipped one-byte instructions.
        assert_eq!(bytecode.code(), &[Opcode::Jump as u8, 2, 0, Opcode::True as u8, Opcode::Pop as u8]);
    }

    #[test]
    fn repeat_jumps_backwards() {
        let mut bytecode = Bytecode::new("test");
        let start = bytecode.current_offset();
        bytecode.emit(SourceRange::default(), Opcode::True);
        bytecode.emit(SourceRange::default(), Opcode::Pop);
        bytecode.emit_repeat(SourceRange::default(), start);
        // ip after the operand is 5; subtracting the offset returns to 0.
        assert_eq!(bytecode.code(), &[Opcode::True as u8, Opcode::Pop as u8, Opcode::Repeat as u8, 5, 0]);
    }

    #[test]
    fn locations_cover_following_instructions() {
        use crate::location::{SourceLocation, SourceRange};
        let mut bytecode = Bytecode::new("test");
        let first = SourceRange::at(SourceLocation { line: 1, column: 1, offset: 0 });
        let second = SourceRange::at(SourceLocation { line: 2, column: 1, offset: 10 });
        bytecode.emit(first, Opcode::True);
        bytecode.emit(second, Opcode::Pop);
        bytecode.emit(second, Opcode::Pop);
        assert_eq!(bytecode.location(0), first);
        assert_eq!(bytecode.location(1), second);
        assert_eq!(bytecode.location(2), second);
    }
}
