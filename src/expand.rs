// Copyright 2025 the terminfo-source developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Parameterized string expansion
//!
//! A linear interpreter over compiled capability programs. The stack
//! holds numbers and byte strings; coercions follow printf conventions,
//! so a string used as a number counts as 0 and a number used as a
//! string is formatted in decimal.

use std::{array::from_fn, iter::repeat_n};

use crate::compile::{BinaryOp, Flags, Format, FormatKind, Op, Program, UnaryOp};

/// Types of parameters a capability can use
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parameter {
    Number(i32),
    String(Vec<u8>),
}

impl From<i32> for Parameter {
    fn from(value: i32) -> Parameter {
        Parameter::Number(value)
    }
}

impl From<&[u8]> for Parameter {
    fn from(value: &[u8]) -> Parameter {
        Parameter::String(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Parameter {
    fn from(value: &[u8; N]) -> Parameter {
        Parameter::String(value.to_vec())
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Parameter {
        Parameter::String(value.as_bytes().to_vec())
    }
}

impl Parameter {
    fn as_number(&self) -> i32 {
        match self {
            Parameter::Number(value) => *value,
            Parameter::String(_) => 0,
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        match self {
            Parameter::Number(value) => value.to_string().into_bytes(),
            Parameter::String(bytes) => bytes,
        }
    }
}

/// Errors reported when expanding a string
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("not enough stack elements for {0}")]
    StackUnderflow(&'static str),
}

/// Context for variable expansion
///
/// The static variables A-Z persist across expansions; the context must
/// stay the same for the same terminal to be compatible with ncurses.
/// The dynamic variables a-z are only meaningful within one expansion
/// and are cleared when the terminal changes.
#[derive(Debug)]
pub struct ExpandContext {
    static_variables: [Parameter; 26],
    dynamic_variables: [Parameter; 26],
}

impl ExpandContext {
    /// Return a newly initialized ExpandContext
    pub fn new() -> Self {
        Self {
            static_variables: from_fn(|_| Parameter::from(0)),
            dynamic_variables: from_fn(|_| Parameter::from(0)),
        }
    }

    /// Clear both variable banks
    pub fn reset(&mut self) {
        self.static_variables = from_fn(|_| Parameter::from(0));
        self.dynamic_variables = from_fn(|_| Parameter::from(0));
    }

    /// Expand a compiled capability
    ///
    /// # Arguments
    /// * `program` - compiled capability string
    /// * `params`  - parameters for %p1 etc
    pub fn expand(&mut self, program: &Program, params: &[Parameter]) -> Result<Vec<u8>, Error> {
        let mut output = Vec::with_capacity(64);
        let mut stack: Vec<Parameter> = Vec::new();

        // Copy parameters into a local vector; %i mutates them. There
        // are always at least 9 so that %p9 cannot fail.
        let mut mparams = params.to_vec();
        while mparams.len() < 9 {
            mparams.push(Parameter::from(0));
        }

        // A termcap-style template expects its parameters pre-pushed in
        // reverse order so naked pops consume them left-to-right.
        if program.is_termcap_template() {
            for param in params.iter().rev() {
                stack.push(param.clone());
            }
        }

        let ops = program.ops();
        let mut pc = 0;
        while pc < ops.len() {
            match &ops[pc] {
                Op::Literal(bytes) => output.extend_from_slice(bytes),
                Op::PushParam(index) => stack.push(mparams[usize::from(*index)].clone()),
                Op::PushConst(value) => stack.push(Parameter::Number(*value)),
                Op::EmitChar => {
                    match pop(&mut stack, "%c")?.as_number() {
                        // if the byte is 0, use 0200 for ncurses compatibility
                        0 => output.push(0x80),
                        // No bounds check; ncurses just casts and truncates.
                        value => output.push(value as u8),
                    }
                }
                Op::EmitFmt(format) => {
                    let value = pop(&mut stack, conversion_name(format.kind))?;
                    output.extend(format_value(value, format));
                }
                Op::StoreStatic(index) => {
                    self.static_variables[usize::from(*index)] = pop(&mut stack, "%P")?;
                }
                Op::StoreDynamic(index) => {
                    self.dynamic_variables[usize::from(*index)] = pop(&mut stack, "%P")?;
                }
                Op::LoadStatic(index) => {
                    stack.push(self.static_variables[usize::from(*index)].clone());
                }
                Op::LoadDynamic(index) => {
                    stack.push(self.dynamic_variables[usize::from(*index)].clone());
                }
                Op::StringLength => {
                    let length = pop(&mut stack, "%l")?.into_bytes().len();
                    stack.push(Parameter::Number(length as i32));
                }
                Op::Binary(op) => {
                    let y = pop(&mut stack, "binary operator")?.as_number();
                    let x = pop(&mut stack, "binary operator")?.as_number();
                    stack.push(Parameter::Number(binary(*op, x, y)));
                }
                Op::Unary(op) => {
                    let x = pop(&mut stack, "unary operator")?.as_number();
                    let result = match op {
                        UnaryOp::Not => i32::from(x == 0),
                        UnaryOp::Complement => !x,
                    };
                    stack.push(Parameter::Number(result));
                }
                Op::IncrementParams => {
                    for param in mparams.iter_mut().take(2) {
                        if let Parameter::Number(value) = param {
                            *value += 1;
                        }
                    }
                }
                Op::BranchIfZero(target) => {
                    if pop(&mut stack, "%t")?.as_number() == 0 {
                        pc = *target;
                        continue;
                    }
                }
                Op::Jump(target) => {
                    pc = *target;
                    continue;
                }
            }
            pc += 1;
        }
        Ok(output)
    }
}

impl Default for ExpandContext {
    fn default() -> Self {
        Self::new()
    }
}

fn pop(stack: &mut Vec<Parameter>, op: &'static str) -> Result<Parameter, Error> {
    stack.pop().ok_or(Error::StackUnderflow(op))
}

fn binary(op: BinaryOp, x: i32, y: i32) -> i32 {
    match op {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Subtract => x.wrapping_sub(y),
        BinaryOp::Multiply => x.wrapping_mul(y),
        // Division by zero yields 0 rather than failing.
        BinaryOp::Divide => x.checked_div(y).unwrap_or(0),
        BinaryOp::Modulo => x.checked_rem(y).unwrap_or(0),
        BinaryOp::BitAnd => x & y,
        BinaryOp::BitOr => x | y,
        BinaryOp::BitXor => x ^ y,
        BinaryOp::Equal => i32::from(x == y),
        BinaryOp::Greater => i32::from(x > y),
        BinaryOp::Less => i32::from(x < y),
        BinaryOp::And => i32::from(x != 0 && y != 0),
        BinaryOp::Or => i32::from(x != 0 || y != 0),
    }
}

fn conversion_name(kind: FormatKind) -> &'static str {
    match kind {
        FormatKind::Decimal => "%d",
        FormatKind::Octal => "%o",
        FormatKind::Hex => "%x",
        FormatKind::HexUpper => "%X",
        FormatKind::Str => "%s",
    }
}

fn format_value(value: Parameter, format: &Format) -> Vec<u8> {
    let flags = format.flags;
    let mut s = match format.kind {
        FormatKind::Str => {
            let mut s = value.into_bytes();
            if let Some(precision) = flags.precision
                && usize::from(precision) < s.len()
            {
                s.truncate(usize::from(precision));
            }
            s
        }
        kind => format_number(value.as_number(), kind, flags).into_bytes(),
    };
    if usize::from(flags.width) > s.len() {
        let n = usize::from(flags.width) - s.len();
        if flags.left {
            s.extend(repeat_n(b' ', n));
        } else {
            let mut s_ = Vec::with_capacity(usize::from(flags.width));
            s_.extend(repeat_n(b' ', n));
            s_.extend(s);
            s = s_;
        }
    }
    s
}

fn format_number(d: i32, kind: FormatKind, flags: Flags) -> String {
    match kind {
        FormatKind::Decimal => match flags.precision {
            Some(precision) => {
                if flags.sign {
                    format!("{d:+0prec$}", prec = usize::from(precision + 1))
                } else if d < 0 {
                    format!("{d:0prec$}", prec = usize::from(precision + 1))
                } else if flags.space {
                    format!(" {d:0prec$}", prec = precision.into())
                } else {
                    format!("{d:0prec$}", prec = precision.into())
                }
            }
            None => {
                if flags.sign {
                    format!("{d:+}")
                } else if d < 0 {
                    format!("{d}")
                } else if flags.space {
                    format!(" {d}")
                } else {
                    format!("{d}")
                }
            }
        },
        FormatKind::Octal => match flags.precision {
            Some(precision) => {
                if flags.alternate {
                    // Leading octal zero counts against precision.
                    format!("0{d:0prec$o}", prec = precision.saturating_sub(1).into())
                } else {
                    format!("{d:0prec$o}", prec = precision.into())
                }
            }
            None => {
                if flags.alternate {
                    format!("0{d:o}")
                } else {
                    format!("{d:o}")
                }
            }
        },
        FormatKind::Hex => match flags.precision {
            Some(precision) => {
                if flags.alternate && d != 0 {
                    format!("0x{d:0prec$x}", prec = precision.into())
                } else {
                    format!("{d:0prec$x}", prec = precision.into())
                }
            }
            None => {
                if flags.alternate && d != 0 {
                    format!("0x{d:x}")
                } else {
                    format!("{d:x}")
                }
            }
        },
        FormatKind::HexUpper => match flags.precision {
            Some(precision) => {
                if flags.alternate && d != 0 {
                    format!("0X{d:0prec$X}", prec = precision.into())
                } else {
                    format!("{d:0prec$X}", prec = precision.into())
                }
            }
            None => {
                if flags.alternate && d != 0 {
                    format!("0X{d:X}")
                } else {
                    format!("{d:X}")
                }
            }
        },
        FormatKind::Str => unreachable!("handled by the caller"),
    }
}
