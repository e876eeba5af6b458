//! Read values and the printf-style templates that turn them into mark
//! descriptions.
//!
//! Supported conversions: `%d %i %u %x %X %o %c %s %%`, with the flags
//! `- 0 + space #`, a field width and a precision.  Extra arguments are
//! ignored, missing ones are an error.

use std::fmt;

use serde::Serialize;

use crate::cursor::DecodeError;

// ── Value ────────────────────────────────────────────────────────────────────

/// A value produced by a cursor read or by a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Integer view; unsigned values above `i64::MAX` wrap.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v)  => Some(v),
            Value::UInt(v) => Some(v as i64),
            _              => None,
        }
    }

    /// Integer view; negative values wrap to their two's-complement bits.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Int(v)  => Some(v as u64),
            Value::UInt(v) => Some(v),
            _              => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Str(s)   => Some(s.as_bytes()),
            _               => None,
        }
    }

    fn as_integer(&self) -> Option<i128> {
        match *self {
            Value::Int(v)  => Some(v as i128),
            Value::UInt(v) => Some(v as i128),
            _              => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v)   => write!(f, "{v}"),
            Value::UInt(v)  => write!(f, "{v}"),
            Value::Str(s)   => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

macro_rules! value_from {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self { Value::$variant(v as $target) }
        })*
    };
}

value_from!(Int as i64: i8, i16, i32, i64);
value_from!(UInt as u64: u8, u16, u32, u64);

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Str(s.to_owned()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::Str(s) }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self { Value::Bytes(b.to_vec()) }
}

// ── Templates ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
struct Conversion {
    left:      bool,
    zero:      bool,
    plus:      bool,
    space:     bool,
    alternate: bool,
    width:     usize,
    precision: Option<usize>,
}

/// Upper bound on field width and precision.
pub const MAX_WIDTH: usize = 1 << 12;

/// Render `template` with `args` consumed left to right.
pub fn format(template: &str, args: &[Value]) -> Result<String, DecodeError> {
    let fail = |reason: &str| DecodeError::Format {
        template: template.to_owned(),
        reason:   reason.to_owned(),
    };

    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut conv = Conversion::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => conv.left = true,
                '0' => conv.zero = true,
                '+' => conv.plus = true,
                ' ' => conv.space = true,
                '#' => conv.alternate = true,
                _ => break,
            }
            chars.next();
        }
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            conv.width = accumulate(conv.width, d).ok_or_else(|| fail("width too large"))?;
            chars.next();
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut precision = 0;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                precision = accumulate(precision, d).ok_or_else(|| fail("precision too large"))?;
                chars.next();
            }
            conv.precision = Some(precision);
        }

        let conversion = chars.next().ok_or_else(|| fail("incomplete conversion"))?;
        if conversion == '%' {
            out.push('%');
            continue;
        }

        let arg = args.next().ok_or_else(|| fail("missing argument"))?;
        let integer = || arg.as_integer().ok_or_else(|| fail("number expected"));
        match conversion {
            'd' | 'i' | 'u' => {
                let v = integer()?;
                let sign = if v < 0 {
                    "-"
                } else if conv.plus {
                    "+"
                } else if conv.space {
                    " "
                } else {
                    ""
                };
                pad_number(&mut out, &conv, sign, &v.unsigned_abs().to_string());
            }
            'x' | 'X' | 'o' => {
                // Negative values print as their 64-bit two's complement.
                let bits = integer()? as u64;
                let (digits, prefix) = match conversion {
                    'x' => (format!("{bits:x}"), "0x"),
                    'X' => (format!("{bits:X}"), "0X"),
                    _   => (format!("{bits:o}"), "0"),
                };
                let prefix = if conv.alternate && bits != 0 { prefix } else { "" };
                pad_number(&mut out, &conv, prefix, &digits);
            }
            'c' => {
                let ch = integer()?
                    .try_into()
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| fail("invalid character code"))?;
                pad(&mut out, &conv, &ch.to_string());
            }
            's' => {
                let text = arg.to_string();
                let text = match conv.precision {
                    Some(p) => text.chars().take(p).collect(),
                    None    => text,
                };
                pad(&mut out, &conv, &text);
            }
            other => return Err(fail(&format!("invalid conversion '%{other}'"))),
        }
    }
    Ok(out)
}

/// Append decimal digit `d` to `n`, refusing anything above [`MAX_WIDTH`].
fn accumulate(n: usize, d: u32) -> Option<usize> {
    n.checked_mul(10)
        .and_then(|n| n.checked_add(d as usize))
        .filter(|&n| n <= MAX_WIDTH)
}

fn pad(out: &mut String, conv: &Conversion, text: &str) {
    let fill = conv.width.saturating_sub(text.chars().count());
    if conv.left {
        out.push_str(text);
        out.extend(std::iter::repeat(' ').take(fill));
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(text);
    }
}

fn pad_number(out: &mut String, conv: &Conversion, prefix: &str, digits: &str) {
    let mut body = String::new();
    if let Some(p) = conv.precision {
        body.extend(std::iter::repeat('0').take(p.saturating_sub(digits.len())));
    }
    body.push_str(digits);

    let used = prefix.len() + body.len();
    if conv.zero && !conv.left && conv.precision.is_none() && conv.width > used {
        out.push_str(prefix);
        out.extend(std::iter::repeat('0').take(conv.width - used));
        out.push_str(&body);
    } else {
        pad(out, conv, &format!("{prefix}{body}"));
    }
}
