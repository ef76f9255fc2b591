// Copyright 2025 the terminfo-source developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Compiling capability strings
//!
//! A raw string-capability value is compiled into a flat list of opcodes
//! executed by the expansion machine. Source escapes (`\E`, `^G`, `\ddd`)
//! become literal bytes here; `%`-directives become stack operations, and
//! `%?`/`%t`/`%e`/`%;` conditionals are resolved into branches with
//! absolute targets. Padding directives (`$<…>`) pass through as literal
//! bytes for the post-expansion padding scanner.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Binary operators of the `%`-language
///
/// The left operand is the value pushed first (popped second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
    Equal,
    Greater,
    Less,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Complement,
}

/// Conversion selected by the final character of a format directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    Decimal,
    Octal,
    Hex,
    HexUpper,
    Str,
}

/// printf-style flags, width and precision of a format directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    pub width: u16,
    pub precision: Option<u16>,
    pub alternate: bool,
    pub left: bool,
    pub sign: bool,
    pub space: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub kind: FormatKind,
    pub flags: Flags,
}

/// One opcode of a compiled capability string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Append literal bytes to the output
    Literal(Vec<u8>),
    /// Push parameter by zero-based index (`%p1` is index 0)
    PushParam(u8),
    PushConst(i32),
    /// Pop and emit as a single byte (`%c`)
    EmitChar,
    /// Pop and emit formatted (`%d`, `%s`, …)
    EmitFmt(Format),
    /// Pop into a static variable slot (`%PA`…`%PZ`)
    StoreStatic(u8),
    /// Pop into a dynamic variable slot (`%Pa`…`%Pz`)
    StoreDynamic(u8),
    LoadStatic(u8),
    LoadDynamic(u8),
    /// Pop a string, push its length (`%l`)
    StringLength,
    Binary(BinaryOp),
    Unary(UnaryOp),
    /// Add one to the first two parameters (`%i`)
    IncrementParams,
    /// Pop; jump to the absolute target when the value is zero
    BranchIfZero(usize),
    Jump(usize),
}

/// A compiled capability string
///
/// Compilation is deterministic: equal source bytes always produce equal
/// programs, which makes programs safe to cache by their source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    ops: Vec<Op>,
    termcap_template: bool,
    string_params: u16,
}

impl Program {
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// A termcap-style template mentions no `%p` parameter but consumes
    /// the stack with conversions; the machine pre-seeds the stack for it
    pub fn is_termcap_template(&self) -> bool {
        self.termcap_template
    }

    /// Bit mask of parameter positions consumed as strings; bit 0 is the
    /// first parameter
    pub fn string_params(&self) -> u16 {
        self.string_params
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Errors reported when compiling a capability string
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("unrecognized %-directive {0:?}")]
    UnrecognizedDirective(char),
    #[error("unrecognized format option {0:?}")]
    UnrecognizedFormatOption(char),
    #[error("format specification runs off the end")]
    UnterminatedFormat,
    #[error("invalid parameter index {0:?}")]
    InvalidParameterIndex(char),
    #[error("invalid variable name {0:?}")]
    InvalidVariableName(char),
    #[error("malformed character constant")]
    MalformedCharacterConstant,
    #[error("integer constant malformed")]
    MalformedIntegerConstant,
    #[error("integer constant too large")]
    IntegerConstantOverflow,
    #[error("overflow in format width")]
    FormatWidthOverflow,
    #[error("overflow in format precision")]
    FormatPrecisionOverflow,
    #[error("'%' at end of string")]
    TrailingPercent,
}

/// Decode one source escape at the start of `bytes`
///
/// Returns the decoded byte and the number of input bytes consumed, or
/// `None` for an unrecognized escape. A decoded NUL becomes 0x80; the
/// capability format cannot carry a real NUL.
pub(crate) fn escape_byte(bytes: &[u8]) -> Option<(u8, usize)> {
    match bytes.first()? {
        b'\\' => {
            let next = *bytes.get(1)?;
            match next {
                b'E' | b'e' => Some((0x1B, 2)),
                b'n' | b'l' => Some((b'\n', 2)),
                b'r' => Some((b'\r', 2)),
                b't' => Some((b'\t', 2)),
                b'b' => Some((0x08, 2)),
                b'f' => Some((0x0C, 2)),
                b's' => Some((b' ', 2)),
                b'^' | b'\\' | b',' | b':' => Some((next, 2)),
                b'0'..=b'7' => {
                    let mut value = 0u32;
                    let mut used = 1;
                    while used < 4 {
                        match bytes.get(used) {
                            Some(digit @ b'0'..=b'7') => {
                                value = value * 8 + u32::from(digit - b'0');
                                used += 1;
                            }
                            _ => break,
                        }
                    }
                    Some((not_nul((value & 0xFF) as u8), used))
                }
                _ => None,
            }
        }
        b'^' => {
            let next = *bytes.get(1)?;
            match next {
                b'?' => Some((0x7F, 2)),
                b'@' | b'A'..=b'Z' | b'a'..=b'z' | b'[' | b'\\' | b']' | b'^' | b'_' => {
                    Some((not_nul(next & 0x1F), 2))
                }
                _ => None,
            }
        }
        byte => Some((*byte, 1)),
    }
}

fn not_nul(byte: u8) -> u8 {
    if byte == 0 { 0x80 } else { byte }
}

/// Compile a raw capability value
pub fn compile(cap: &[u8]) -> Result<Program, Error> {
    Compiler::new(cap).run()
}

#[derive(Copy, Clone)]
enum FormatState {
    Flags,
    Width,
    Precision,
}

#[derive(Default)]
struct Frame {
    /// Branch emitted for the latest `%t`, target not yet known
    pending_then: Option<usize>,
    /// Jumps emitted for each `%e`, all targeting the closing `%;`
    end_jumps: Vec<usize>,
}

struct Compiler<'a> {
    input: &'a [u8],
    pos: usize,
    ops: Vec<Op>,
    literal: Vec<u8>,
    frames: Vec<Frame>,
}

impl<'a> Compiler<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            ops: vec![],
            literal: vec![],
            frames: vec![],
        }
    }

    fn next(&mut self) -> Option<u8> {
        let byte = self.input.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            let bytes = std::mem::take(&mut self.literal);
            self.ops.push(Op::Literal(bytes));
        }
    }

    fn emit(&mut self, op: Op) -> usize {
        self.flush_literal();
        self.ops.push(op);
        self.ops.len() - 1
    }

    /// Position the next emitted opcode will occupy, usable as a branch
    /// target
    fn here(&mut self) -> usize {
        self.flush_literal();
        self.ops.len()
    }

    fn run(mut self) -> Result<Program, Error> {
        while let Some(byte) = self.next() {
            match byte {
                b'%' => self.directive()?,
                b'\\' | b'^' => {
                    self.pos -= 1;
                    self.escape();
                }
                byte => self.literal.push(byte),
            }
        }
        // End of string closes any open conditionals.
        while !self.frames.is_empty() {
            self.close_frame();
        }
        self.flush_literal();

        let (termcap_template, string_params) = analyze(&self.ops);
        Ok(Program {
            ops: self.ops,
            termcap_template,
            string_params,
        })
    }

    fn escape(&mut self) {
        match escape_byte(&self.input[self.pos..]) {
            Some((byte, used)) => {
                self.literal.push(byte);
                self.pos += used;
            }
            None => {
                let skip = (self.input.len() - self.pos).min(2);
                warn!(
                    escape = %String::from_utf8_lossy(&self.input[self.pos..self.pos + skip]),
                    "unsupported escape in capability string, dropped"
                );
                self.pos += skip;
            }
        }
    }

    fn directive(&mut self) -> Result<(), Error> {
        let Some(byte) = self.next() else {
            return Err(Error::TrailingPercent);
        };
        match byte {
            b'%' => self.literal.push(b'%'),
            b'c' => {
                self.emit(Op::EmitChar);
            }
            b'd' | b'o' | b'x' | b'X' | b's' => {
                self.emit(Op::EmitFmt(Format {
                    kind: format_kind(byte),
                    flags: Flags::default(),
                }));
            }
            b':' | b'#' | b' ' | b'.' | b'0'..=b'9' => self.format_spec(byte)?,
            b'p' => {
                let index = match self.next() {
                    Some(digit @ b'1'..=b'9') => digit - b'1',
                    other => return Err(Error::InvalidParameterIndex(to_char(other))),
                };
                self.emit(Op::PushParam(index));
            }
            b'P' => {
                let op = match self.next() {
                    Some(name @ b'A'..=b'Z') => Op::StoreStatic(name - b'A'),
                    Some(name @ b'a'..=b'z') => Op::StoreDynamic(name - b'a'),
                    other => return Err(Error::InvalidVariableName(to_char(other))),
                };
                self.emit(op);
            }
            b'g' => {
                let op = match self.next() {
                    Some(name @ b'A'..=b'Z') => Op::LoadStatic(name - b'A'),
                    Some(name @ b'a'..=b'z') => Op::LoadDynamic(name - b'a'),
                    other => return Err(Error::InvalidVariableName(to_char(other))),
                };
                self.emit(op);
            }
            b'l' => {
                self.emit(Op::StringLength);
            }
            b'\'' => self.char_constant()?,
            b'{' => self.int_constant()?,
            b'+' => {
                self.emit(Op::Binary(BinaryOp::Add));
            }
            b'-' => {
                self.emit(Op::Binary(BinaryOp::Subtract));
            }
            b'*' => {
                self.emit(Op::Binary(BinaryOp::Multiply));
            }
            b'/' => {
                self.emit(Op::Binary(BinaryOp::Divide));
            }
            b'm' => {
                self.emit(Op::Binary(BinaryOp::Modulo));
            }
            b'&' => {
                self.emit(Op::Binary(BinaryOp::BitAnd));
            }
            b'|' => {
                self.emit(Op::Binary(BinaryOp::BitOr));
            }
            b'^' => {
                self.emit(Op::Binary(BinaryOp::BitXor));
            }
            b'=' => {
                self.emit(Op::Binary(BinaryOp::Equal));
            }
            b'>' => {
                self.emit(Op::Binary(BinaryOp::Greater));
            }
            b'<' => {
                self.emit(Op::Binary(BinaryOp::Less));
            }
            b'A' => {
                self.emit(Op::Binary(BinaryOp::And));
            }
            b'O' => {
                self.emit(Op::Binary(BinaryOp::Or));
            }
            b'!' => {
                self.emit(Op::Unary(UnaryOp::Not));
            }
            b'~' => {
                self.emit(Op::Unary(UnaryOp::Complement));
            }
            b'i' => {
                self.emit(Op::IncrementParams);
            }
            b'?' => self.frames.push(Frame::default()),
            b't' => {
                let branch = self.emit(Op::BranchIfZero(usize::MAX));
                self.frame().pending_then = Some(branch);
            }
            b'e' => {
                let jump = self.emit(Op::Jump(usize::MAX));
                let target = self.here();
                let frame = self.frame();
                frame.end_jumps.push(jump);
                let pending = frame.pending_then.take();
                if let Some(branch) = pending {
                    self.ops[branch] = Op::BranchIfZero(target);
                }
            }
            b';' => self.close_frame(),
            other => return Err(Error::UnrecognizedDirective(other as char)),
        }
        Ok(())
    }

    /// The innermost conditional frame; a `%t` or `%e` with no opening
    /// `%?` gets an implicit one
    fn frame(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::default());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn close_frame(&mut self) {
        // A stray %; with no open %? is ignored.
        let Some(mut frame) = self.frames.pop() else {
            return;
        };
        let target = self.here();
        if let Some(branch) = frame.pending_then.take() {
            self.ops[branch] = Op::BranchIfZero(target);
        }
        for jump in frame.end_jumps {
            self.ops[jump] = Op::Jump(target);
        }
    }

    fn format_spec(&mut self, first: u8) -> Result<(), Error> {
        let mut flags = Flags::default();
        let mut state = FormatState::Flags;
        match first {
            b':' => {}
            b'#' => flags.alternate = true,
            b' ' => flags.space = true,
            b'.' => state = FormatState::Precision,
            b'0'..=b'9' => {
                flags.width = u16::from(first - b'0');
                state = FormatState::Width;
            }
            _ => unreachable!("format introducer"),
        }
        loop {
            let Some(byte) = self.next() else {
                return Err(Error::UnterminatedFormat);
            };
            match (state, byte) {
                (_, b'd' | b'o' | b'x' | b'X' | b's') => {
                    self.emit(Op::EmitFmt(Format {
                        kind: format_kind(byte),
                        flags,
                    }));
                    return Ok(());
                }
                (FormatState::Flags, b'#') => flags.alternate = true,
                (FormatState::Flags, b'-') => flags.left = true,
                (FormatState::Flags, b'+') => flags.sign = true,
                (FormatState::Flags, b' ') => flags.space = true,
                (FormatState::Flags, b'0'..=b'9') => {
                    flags.width = u16::from(byte - b'0');
                    state = FormatState::Width;
                }
                (FormatState::Width, b'0'..=b'9') => {
                    flags.width = flags
                        .width
                        .checked_mul(10)
                        .and_then(|width| width.checked_add(u16::from(byte - b'0')))
                        .ok_or(Error::FormatWidthOverflow)?;
                }
                (FormatState::Flags | FormatState::Width, b'.') => {
                    state = FormatState::Precision;
                }
                (FormatState::Precision, b'0'..=b'9') => {
                    flags.precision = Some(
                        flags
                            .precision
                            .unwrap_or(0)
                            .checked_mul(10)
                            .and_then(|precision| precision.checked_add(u16::from(byte - b'0')))
                            .ok_or(Error::FormatPrecisionOverflow)?,
                    );
                }
                (_, other) => return Err(Error::UnrecognizedFormatOption(other as char)),
            }
        }
    }

    fn char_constant(&mut self) -> Result<(), Error> {
        let (value, used) =
            escape_byte(&self.input[self.pos..]).ok_or(Error::MalformedCharacterConstant)?;
        self.pos += used;
        if self.next() != Some(b'\'') {
            return Err(Error::MalformedCharacterConstant);
        }
        self.emit(Op::PushConst(i32::from(value)));
        Ok(())
    }

    fn int_constant(&mut self) -> Result<(), Error> {
        let mut value: i32 = 0;
        loop {
            match self.next() {
                Some(b'}') => break,
                Some(digit @ b'0'..=b'9') => {
                    value = value
                        .checked_mul(10)
                        .and_then(|value| value.checked_add(i32::from(digit - b'0')))
                        .ok_or(Error::IntegerConstantOverflow)?;
                }
                _ => return Err(Error::MalformedIntegerConstant),
            }
        }
        self.emit(Op::PushConst(value));
        Ok(())
    }
}

fn format_kind(byte: u8) -> FormatKind {
    match byte {
        b'd' => FormatKind::Decimal,
        b'o' => FormatKind::Octal,
        b'x' => FormatKind::Hex,
        b'X' => FormatKind::HexUpper,
        b's' => FormatKind::Str,
        _ => unreachable!("conversion character"),
    }
}

fn to_char(byte: Option<u8>) -> char {
    byte.map_or('\0', char::from)
}

/// Scan the finished program for the termcap-template property and for
/// parameter positions consumed as strings
fn analyze(ops: &[Op]) -> (bool, u16) {
    let mut has_param = false;
    let mut has_conversion = false;
    let mut string_params = 0u16;
    // Track which parameter, if any, sits on top of the stack. Branches
    // are ignored; the scan is linear and conservative.
    let mut stack: Vec<Option<u8>> = vec![];
    for op in ops {
        match op {
            Op::PushParam(index) => {
                has_param = true;
                stack.push(Some(*index));
            }
            Op::PushConst(_) | Op::LoadStatic(_) | Op::LoadDynamic(_) => stack.push(None),
            Op::EmitChar => {
                has_conversion = true;
                stack.pop();
            }
            Op::EmitFmt(format) => {
                has_conversion = true;
                if let Some(Some(index)) = stack.pop()
                    && format.kind == FormatKind::Str
                {
                    string_params |= 1 << index;
                }
            }
            Op::StringLength => {
                if let Some(Some(index)) = stack.pop() {
                    string_params |= 1 << index;
                }
                stack.push(None);
            }
            Op::Binary(_) => {
                stack.pop();
                stack.pop();
                stack.push(None);
            }
            Op::Unary(_) => {
                stack.pop();
                stack.push(None);
            }
            Op::StoreStatic(_) | Op::StoreDynamic(_) | Op::BranchIfZero(_) => {
                stack.pop();
            }
            Op::Literal(_) | Op::Jump(_) | Op::IncrementParams => {}
        }
    }
    (!has_param && has_conversion, string_params)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_value_is_a_no_op() {
        let program = compile(b"").unwrap();
        assert!(program.is_empty());
        assert!(!program.is_termcap_template());
    }

    #[test]
    fn literal_escapes() {
        let program = compile(b"\\E[H\\n^G\\s\\,\\072").unwrap();
        assert_eq!(
            program.ops(),
            [Op::Literal(b"\x1B[H\n\x07 ,\x3A".to_vec())]
        );
    }

    #[test]
    fn octal_zero_becomes_0x80() {
        let program = compile(b"\\000").unwrap();
        assert_eq!(program.ops(), [Op::Literal(vec![0x80])]);
        let program = compile(b"\\0").unwrap();
        assert_eq!(program.ops(), [Op::Literal(vec![0x80])]);
    }

    #[test]
    fn control_notation() {
        let program = compile(b"^@^A^Z^[^\\^]^^^_^?").unwrap();
        assert_eq!(
            program.ops(),
            [Op::Literal(vec![0x80, 0x01, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E, 0x1F, 0x7F])]
        );
    }

    #[test]
    fn unsupported_escape_dropped() {
        let program = compile(b"a\\zb").unwrap();
        assert_eq!(program.ops(), [Op::Literal(b"ab".to_vec())]);
    }

    #[test]
    fn padding_text_passes_through() {
        let program = compile(b"abc$<50/>").unwrap();
        assert_eq!(program.ops(), [Op::Literal(b"abc$<50/>".to_vec())]);
    }

    #[test]
    fn percent_escape() {
        let program = compile(b"50%%").unwrap();
        assert_eq!(program.ops(), [Op::Literal(b"50%".to_vec())]);
    }

    #[test]
    fn cursor_address_shape() {
        let program = compile(b"\\E[%i%p1%d;%p2%dH").unwrap();
        let decimal = Format {
            kind: FormatKind::Decimal,
            flags: Flags::default(),
        };
        assert_eq!(
            program.ops(),
            [
                Op::Literal(b"\x1B[".to_vec()),
                Op::IncrementParams,
                Op::PushParam(0),
                Op::EmitFmt(decimal),
                Op::Literal(b";".to_vec()),
                Op::PushParam(1),
                Op::EmitFmt(decimal),
                Op::Literal(b"H".to_vec()),
            ]
        );
        assert!(!program.is_termcap_template());
    }

    #[test]
    fn conditional_targets() {
        // %?%p1%t T %e E %;
        let program = compile(b"%?%p1%tT%eE%;X").unwrap();
        assert_eq!(
            program.ops(),
            [
                Op::PushParam(0),
                Op::BranchIfZero(4), // to the else arm
                Op::Literal(b"T".to_vec()),
                Op::Jump(5), // past the else arm
                Op::Literal(b"E".to_vec()),
                Op::Literal(b"X".to_vec()),
            ]
        );
    }

    #[test]
    fn missing_semicolon_closes_at_end() {
        let program = compile(b"%?%p1%tT").unwrap();
        assert_eq!(
            program.ops(),
            [
                Op::PushParam(0),
                Op::BranchIfZero(3),
                Op::Literal(b"T".to_vec()),
            ]
        );
    }

    #[test]
    fn elsif_chain_targets() {
        // %? c1 %t t1 %e c2 %t t2 %e e %;
        let program = compile(b"%?%p1%tA%e%p2%tB%eC%;").unwrap();
        assert_eq!(
            program.ops(),
            [
                Op::PushParam(0),
                Op::BranchIfZero(4),
                Op::Literal(b"A".to_vec()),
                Op::Jump(9),
                Op::PushParam(1),
                Op::BranchIfZero(8),
                Op::Literal(b"B".to_vec()),
                Op::Jump(9),
                Op::Literal(b"C".to_vec()),
            ]
        );
    }

    #[test]
    fn constants() {
        let program = compile(b"%{456}%'A'%'^G'%'\\E'").unwrap();
        assert_eq!(
            program.ops(),
            [
                Op::PushConst(456),
                Op::PushConst(65),
                Op::PushConst(7),
                Op::PushConst(27),
            ]
        );
    }

    #[test]
    fn variables() {
        let program = compile(b"%p1%PA%p2%Pz%gA%gz").unwrap();
        assert_eq!(
            program.ops(),
            [
                Op::PushParam(0),
                Op::StoreStatic(0),
                Op::PushParam(1),
                Op::StoreDynamic(25),
                Op::LoadStatic(0),
                Op::LoadDynamic(25),
            ]
        );
    }

    #[test]
    fn termcap_template_detected() {
        assert!(compile(b"\\E=%d;%d").unwrap().is_termcap_template());
        assert!(compile(b"%c").unwrap().is_termcap_template());
        // %p makes it a terminfo-style program
        assert!(!compile(b"%p1%d").unwrap().is_termcap_template());
        // no conversions at all
        assert!(!compile(b"plain").unwrap().is_termcap_template());
    }

    #[test]
    fn string_parameter_positions() {
        let program = compile(b"%p1%s%p2%d%p3%l%d").unwrap();
        assert_eq!(program.string_params(), 0b101);
    }

    #[test]
    fn deterministic() {
        let cap = b"\\E[%i%p1%d;%p2%dH$<5>";
        assert_eq!(compile(cap).unwrap(), compile(cap).unwrap());
    }

    #[test]
    fn format_width_overflow() {
        assert_eq!(compile(b"%{1}%65536d"), Err(Error::FormatWidthOverflow));
    }

    #[test]
    fn format_precision_overflow() {
        assert_eq!(compile(b"%{1}%.65536d"), Err(Error::FormatPrecisionOverflow));
    }

    #[test]
    fn format_bad_flag() {
        assert_eq!(compile(b"%:^x"), Err(Error::UnrecognizedFormatOption('^')));
    }

    #[test]
    fn bad_directive() {
        assert_eq!(compile(b"%Y"), Err(Error::UnrecognizedDirective('Y')));
    }

    #[test]
    fn bad_parameter_index() {
        assert_eq!(compile(b"%p0"), Err(Error::InvalidParameterIndex('0')));
    }

    #[test]
    fn bad_variable_name() {
        assert_eq!(compile(b"%P7"), Err(Error::InvalidVariableName('7')));
        assert_eq!(compile(b"%g8"), Err(Error::InvalidVariableName('8')));
    }

    #[test]
    fn bad_char_constant() {
        assert_eq!(compile(b"%'ab'"), Err(Error::MalformedCharacterConstant));
    }

    #[test]
    fn bad_integer_constant() {
        assert_eq!(compile(b"%{2b}"), Err(Error::MalformedIntegerConstant));
    }

    #[test]
    fn integer_constant_overflow() {
        assert_eq!(compile(b"%{2147483648}"), Err(Error::IntegerConstantOverflow));
    }

    #[test]
    fn trailing_percent() {
        assert_eq!(compile(b"abc%"), Err(Error::TrailingPercent));
    }
}
