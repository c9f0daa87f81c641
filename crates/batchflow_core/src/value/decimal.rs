use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pattern::{compose_decimal, FormatArg, RenderPattern};
use crate::types::DeclaredType;
use crate::value::ScalarValue;

/// How raw decimal strings are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalNotation {
    /// `1,234.56`: `.` separates decimals, `,` groups thousands.
    #[default]
    Plain,
    /// `1.234,56` or `1 234,56`: `,` separates decimals.
    International,
}

impl DecimalNotation {
    fn validator(&self) -> &'static str {
        match self {
            DecimalNotation::Plain => "decimal filter",
            DecimalNotation::International => "international decimal filter",
        }
    }
}

/// An exact decimal number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecimalValue {
    value: Option<Decimal>,
    format: Option<RenderPattern>,
    notation: DecimalNotation,
}

impl DecimalValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn international() -> Self {
        Self::new().with_notation(DecimalNotation::International)
    }

    pub fn with_notation(mut self, notation: DecimalNotation) -> Self {
        self.notation = notation;
        self
    }

    pub fn notation(&self) -> DecimalNotation {
        self.notation
    }
}

impl ScalarValue for DecimalValue {
    type Native = Decimal;

    const DECLARED: DeclaredType = DeclaredType::Decimal;

    fn slot(&self) -> &Option<Decimal> {
        &self.value
    }

    fn slot_mut(&mut self) -> &mut Option<Decimal> {
        &mut self.value
    }

    fn parse(&self, raw: &str) -> Result<Decimal> {
        let parsed = match self.notation {
            DecimalNotation::Plain => parse_plain(raw),
            DecimalNotation::International => parse_plain(&to_plain_notation(raw)),
        };
        parsed.ok_or_else(|| {
            Error::misformatted(raw, self.notation.validator(), DeclaredType::Decimal)
        })
    }

    fn raw_value(&self) -> String {
        match (&self.value, &self.format) {
            (Some(v), Some(pattern)) => pattern.render(FormatArg::Decimal(*v)),
            (Some(v), None) => v.normalize().to_string(),
            (None, Some(pattern)) => pattern.render(FormatArg::Str("")),
            (None, None) => String::new(),
        }
    }

    fn set_format(&mut self, pattern: Option<&str>) -> Result<&mut Self> {
        self.format = pattern.map(RenderPattern::parse).transpose()?;
        Ok(self)
    }

    fn format(&self) -> Option<&str> {
        self.format.as_ref().map(RenderPattern::as_str)
    }
}

/// Rewrite international notation into plain notation.
///
/// `,` becomes the decimal point. Thousands are grouped by spaces when any
/// are present, otherwise by dots.
fn to_plain_notation(raw: &str) -> String {
    let parts: Vec<&str> = raw.trim().split(',').collect();
    let grouping = if parts.iter().any(|part| part.contains(' ')) {
        ' '
    } else {
        '.'
    };
    parts
        .iter()
        .map(|part| part.replace(grouping, ","))
        .collect::<Vec<_>>()
        .join(".")
}

/// Sign, digits with optional `,` thousands groups, optional fraction and
/// optional exponent.
fn parse_plain(raw: &str) -> Option<Decimal> {
    let text = raw.trim();
    let (negative, text) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(at) => {
            let exp = &text[at + 1..];
            let digits = exp.strip_prefix(['-', '+']).unwrap_or(exp);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (&text[..at], Some(exp.parse::<i32>().ok()?))
        }
        None => (text, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa, ""),
    };
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let int_digits = ungroup(int_part)?;
    if int_digits.is_empty() && frac_part.is_empty() {
        return None;
    }

    compose_decimal(negative, &int_digits, frac_part, exponent)
}

/// Strip `,` thousands separators, requiring groups of three after the first.
fn ungroup(int_part: &str) -> Option<String> {
    if !int_part.contains(',') {
        return int_part
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| int_part.to_string());
    }

    let mut groups = int_part.split(',');
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut digits = first.to_string();
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}
