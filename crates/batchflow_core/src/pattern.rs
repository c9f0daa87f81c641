//! printf-style render patterns.
//!
//! A pattern holds at most one conversion (`%[flags][width][.precision]conv`)
//! surrounded by literal text. Supported flags are `-` (left-justify), `+`
//! (always print the sign), `0` and space (padding character) and `'c`
//! (custom padding character). Supported conversions are `d u f F s x X o b`
//! plus the `%%` escape.
//!
//! The argument is coerced to the conversion the way printf-style renderers
//! coerce loosely typed input: strings used with numeric conversions
//! contribute their leading numeric prefix, and anything without one renders
//! as zero.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Largest precision representable by [`Decimal`].
const MAX_DECIMAL_PRECISION: usize = 28;
const DEFAULT_FLOAT_PRECISION: usize = 6;

/// The single argument rendered through a pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatArg<'a> {
    Int(i64),
    Decimal(Decimal),
    Bool(bool),
    Str(&'a str),
}

impl FormatArg<'_> {
    fn to_decimal(self) -> Decimal {
        match self {
            FormatArg::Int(n) => Decimal::from(n),
            FormatArg::Decimal(d) => d,
            FormatArg::Bool(b) => Decimal::from(u8::from(b)),
            FormatArg::Str(s) => leading_number(s),
        }
    }

    fn to_i64(self) -> i64 {
        match self {
            FormatArg::Int(n) => n,
            FormatArg::Bool(b) => i64::from(b),
            other => other.to_decimal().trunc().to_i64().unwrap_or(0),
        }
    }

    fn to_text(self) -> String {
        match self {
            FormatArg::Int(n) => n.to_string(),
            FormatArg::Decimal(d) => d.normalize().to_string(),
            FormatArg::Bool(true) => "1".to_string(),
            FormatArg::Bool(false) => String::new(),
            FormatArg::Str(s) => s.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Signed,
    Unsigned,
    Float,
    Text,
    HexLower,
    HexUpper,
    Octal,
    Binary,
}

impl Conversion {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'd' => Conversion::Signed,
            'u' => Conversion::Unsigned,
            'f' | 'F' => Conversion::Float,
            's' => Conversion::Text,
            'x' => Conversion::HexLower,
            'X' => Conversion::HexUpper,
            'o' => Conversion::Octal,
            'b' => Conversion::Binary,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Spec {
    left: bool,
    plus: bool,
    pad: char,
    width: usize,
    precision: Option<usize>,
    conversion: Conversion,
}

impl Spec {
    fn render(&self, arg: FormatArg<'_>, out: &mut String) {
        match self.conversion {
            Conversion::Text => {
                let mut text = arg.to_text();
                if let Some(precision) = self.precision {
                    text = text.chars().take(precision).collect();
                }
                self.pad_text(&text, out);
            }
            Conversion::Signed => {
                let n = arg.to_i64();
                self.pad_number(n < 0, &n.unsigned_abs().to_string(), out);
            }
            Conversion::Float => {
                let (negative, body) = fixed_point(arg.to_decimal(), self.precision);
                self.pad_number(negative, &body, out);
            }
            Conversion::Unsigned => self.pad_number(false, &(arg.to_i64() as u64).to_string(), out),
            Conversion::HexLower => self.pad_number(false, &format!("{:x}", arg.to_i64()), out),
            Conversion::HexUpper => self.pad_number(false, &format!("{:X}", arg.to_i64()), out),
            Conversion::Octal => self.pad_number(false, &format!("{:o}", arg.to_i64()), out),
            Conversion::Binary => self.pad_number(false, &format!("{:b}", arg.to_i64()), out),
        }
    }

    fn pad_text(&self, text: &str, out: &mut String) {
        let fill = self.width.saturating_sub(text.chars().count());
        if self.left {
            out.push_str(text);
            out.extend(std::iter::repeat(self.pad).take(fill));
        } else {
            out.extend(std::iter::repeat(self.pad).take(fill));
            out.push_str(text);
        }
    }

    fn pad_number(&self, negative: bool, digits: &str, out: &mut String) {
        let sign = if negative {
            "-"
        } else if self.plus {
            "+"
        } else {
            ""
        };
        let len = sign.len() + digits.chars().count();
        let fill = self.width.saturating_sub(len);
        if self.pad == '0' && !self.left {
            // Zeros go between the sign and the digits.
            out.push_str(sign);
            out.extend(std::iter::repeat('0').take(fill));
            out.push_str(digits);
        } else {
            let mut body = String::with_capacity(len);
            body.push_str(sign);
            body.push_str(digits);
            self.pad_text(&body, out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Spec(Spec),
}

/// A parsed printf-style pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPattern {
    source: String,
    pieces: Vec<Piece>,
}

impl RenderPattern {
    /// Parse a pattern, failing with a configuration error on malformed or
    /// multi-argument patterns.
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            Error::configuration(format!("Invalid render pattern '{}': {}", pattern, reason))
        };

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut specs = 0usize;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                literal.push('%');
                continue;
            }

            let mut spec = Spec {
                left: false,
                plus: false,
                pad: ' ',
                width: 0,
                precision: None,
                conversion: Conversion::Text,
            };

            while let Some(&flag) = chars.peek() {
                match flag {
                    '-' => spec.left = true,
                    '+' => spec.plus = true,
                    '0' => spec.pad = '0',
                    ' ' => spec.pad = ' ',
                    '\'' => {
                        chars.next();
                        spec.pad = chars
                            .peek()
                            .copied()
                            .ok_or_else(|| invalid("missing padding character"))?;
                    }
                    _ => break,
                }
                chars.next();
            }

            spec.width = take_number(&mut chars).unwrap_or(0);
            if chars.peek() == Some(&'.') {
                chars.next();
                spec.precision = Some(take_number(&mut chars).unwrap_or(0));
            }

            let conv = chars.next().ok_or_else(|| invalid("missing conversion"))?;
            spec.conversion = Conversion::from_char(conv)
                .ok_or_else(|| invalid(&format!("unsupported conversion '{}'", conv)))?;

            specs += 1;
            if specs > 1 {
                return Err(invalid("only one conversion is allowed"));
            }
            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Spec(spec));
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            source: pattern.to_string(),
            pieces,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render `arg` through the pattern.
    pub fn render(&self, arg: FormatArg<'_>) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Spec(spec) => spec.render(arg, &mut out),
            }
        }
        out
    }
}

impl fmt::Display for RenderPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for RenderPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        chars.next();
        value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit as usize));
    }
    value
}

/// Round half away from zero to `precision` places and print exactly that many.
fn fixed_point(value: Decimal, precision: Option<usize>) -> (bool, String) {
    let places = precision
        .unwrap_or(DEFAULT_FLOAT_PRECISION)
        .min(MAX_DECIMAL_PRECISION) as u32;
    let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(places);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    (negative, rounded.abs().to_string())
}

/// The leading numeric prefix of `text`, or zero when there is none.
fn leading_number(text: &str) -> Decimal {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let int_digits = &text[int_start..end];

    let mut frac_digits = "";
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        frac_digits = &text[frac_start..frac_end];
        end = frac_end;
    }
    if int_digits.is_empty() && frac_digits.is_empty() {
        return Decimal::ZERO;
    }

    let mut exponent: Option<i32> = None;
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'-' || bytes[exp_end] == b'+') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            exponent = text[end + 1..exp_end].parse().ok();
        }
    }

    let negative = text.starts_with('-');
    compose_decimal(negative, int_digits, frac_digits, exponent).unwrap_or(Decimal::ZERO)
}

/// Build a decimal from already validated digit groups.
pub(crate) fn compose_decimal(
    negative: bool,
    int_digits: &str,
    frac_digits: &str,
    exponent: Option<i32>,
) -> Option<Decimal> {
    let mut text = String::with_capacity(int_digits.len() + frac_digits.len() + 8);
    if negative {
        text.push('-');
    }
    text.push_str(if int_digits.is_empty() { "0" } else { int_digits });
    if !frac_digits.is_empty() {
        text.push('.');
        text.push_str(frac_digits);
    }
    match exponent {
        Some(exp) => Decimal::from_scientific(&format!("{}e{}", text, exp)).ok(),
        None => Decimal::from_str(&text).ok(),
    }
}
