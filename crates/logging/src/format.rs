// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message formatting and the specifier-count check.
//!
//! Formats arrive in the C notation the rest of the server ecosystem
//! uses (`"accepted %d jobs from %s"`). Arguments are owned
//! [`LogValue`]s substituted positionally; the count of conversion
//! specifiers against the count of supplied arguments is a first-class
//! correctness check, but a mismatch never aborts logging.

use std::fmt::Write as _;

/// Formatted messages are truncated to this many bytes.
pub const DEFAULT_LOG_ENTRY_SIZE: usize = 1024;

/// Final conversion characters recognized in a specifier.
const CONVERSIONS: &str = "diouxXeEfFgGaAcspn";

/// Flag, width, precision, and length-modifier characters skipped while
/// scanning for the conversion character.
const MODIFIERS: &str = "-+ #0123456789.*hlLqjzt";

/// An owned log argument.
#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Char(char),
    Bool(bool),
}

impl From<i32> for LogValue {
    fn from(v: i32) -> Self {
        LogValue::Int(v.into())
    }
}

impl From<i64> for LogValue {
    fn from(v: i64) -> Self {
        LogValue::Int(v)
    }
}

impl From<u32> for LogValue {
    fn from(v: u32) -> Self {
        LogValue::Uint(v.into())
    }
}

impl From<u64> for LogValue {
    fn from(v: u64) -> Self {
        LogValue::Uint(v)
    }
}

impl From<usize> for LogValue {
    fn from(v: usize) -> Self {
        LogValue::Uint(v as u64)
    }
}

impl From<f64> for LogValue {
    fn from(v: f64) -> Self {
        LogValue::Float(v)
    }
}

impl From<&str> for LogValue {
    fn from(v: &str) -> Self {
        LogValue::Str(v.to_string())
    }
}

impl From<String> for LogValue {
    fn from(v: String) -> Self {
        LogValue::Str(v)
    }
}

impl From<char> for LogValue {
    fn from(v: char) -> Self {
        LogValue::Char(v)
    }
}

impl From<bool> for LogValue {
    fn from(v: bool) -> Self {
        LogValue::Bool(v)
    }
}

impl LogValue {
    /// Render for a given conversion character.
    fn render(&self, conversion: char) -> String {
        match conversion {
            'x' => format!("{:x}", self.as_u64()),
            'X' => format!("{:X}", self.as_u64()),
            'o' => format!("{:o}", self.as_u64()),
            'p' => format!("{:#x}", self.as_u64()),
            'e' | 'E' | 'f' | 'F' | 'g' | 'G' | 'a' | 'A' => match self {
                LogValue::Float(v) => format!("{v}"),
                other => format!("{}", other.as_i64()),
            },
            'c' => match self {
                LogValue::Char(c) => c.to_string(),
                other => other.display(),
            },
            // %n writes nothing in this reimplementation.
            'n' => String::new(),
            _ => self.display(),
        }
    }

    fn display(&self) -> String {
        match self {
            LogValue::Int(v) => v.to_string(),
            LogValue::Uint(v) => v.to_string(),
            LogValue::Float(v) => v.to_string(),
            LogValue::Str(v) => v.clone(),
            LogValue::Char(v) => v.to_string(),
            LogValue::Bool(v) => v.to_string(),
        }
    }

    fn as_u64(&self) -> u64 {
        match self {
            LogValue::Int(v) => *v as u64,
            LogValue::Uint(v) => *v,
            LogValue::Float(v) => *v as u64,
            LogValue::Char(v) => u64::from(u32::from(*v)),
            LogValue::Bool(v) => u64::from(*v),
            LogValue::Str(_) => 0,
        }
    }

    fn as_i64(&self) -> i64 {
        match self {
            LogValue::Int(v) => *v,
            LogValue::Uint(v) => *v as i64,
            LogValue::Float(v) => *v as i64,
            LogValue::Char(v) => i64::from(u32::from(*v)),
            LogValue::Bool(v) => i64::from(*v),
            LogValue::Str(_) => 0,
        }
    }
}

/// Count the conversion specifiers in a format string.
///
/// `%%` escapes are skipped; flag, width, precision, and length
/// modifiers are scanned past; only a final conversion character from
/// the recognized set counts. A `%` that runs into the end of the
/// string or an unrecognized character counts as nothing.
pub fn count_specifiers(format: &str) -> usize {
    let mut count = 0;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            continue;
        }
        while let Some(&next) = chars.peek() {
            if MODIFIERS.contains(next) {
                chars.next();
            } else {
                break;
            }
        }
        if let Some(&next) = chars.peek() {
            if CONVERSIONS.contains(next) {
                chars.next();
                count += 1;
            }
        }
    }

    count
}

/// Substitute arguments into a format string.
///
/// Arguments are consumed positionally. Surplus specifiers are emitted
/// verbatim; surplus arguments are ignored. The result is truncated on a
/// char boundary to [`DEFAULT_LOG_ENTRY_SIZE`] bytes, silently.
pub fn render(format: &str, args: &[LogValue]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut next_arg = 0;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut spec = String::from('%');
        while let Some(&next) = chars.peek() {
            if MODIFIERS.contains(next) {
                spec.push(next);
                chars.next();
            } else {
                break;
            }
        }

        match chars.peek() {
            Some(&conversion) if CONVERSIONS.contains(conversion) => {
                chars.next();
                match args.get(next_arg) {
                    Some(value) => {
                        next_arg += 1;
                        let _ = out.write_str(&value.render(conversion));
                    }
                    None => {
                        // Surplus specifier: keep it visible in the output.
                        spec.push(conversion);
                        out.push_str(&spec);
                    }
                }
            }
            _ => out.push_str(&spec),
        }
    }

    truncate_to(&mut out, DEFAULT_LOG_ENTRY_SIZE);
    out
}

/// Truncate a string to at most `max` bytes on a char boundary.
pub fn truncate_to(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
