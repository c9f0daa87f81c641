use crate::error::{Error, Result};
use crate::pattern::{FormatArg, RenderPattern};
use crate::types::DeclaredType;
use crate::value::ScalarValue;

const VALIDATOR: &str = "integer filter";

/// A 64-bit signed integer with an optional inclusive range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegerValue {
    value: Option<i64>,
    format: Option<RenderPattern>,
    min: Option<i64>,
    max: Option<i64>,
}

impl IntegerValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict parsed values to `min..=max`; either bound may be open.
    pub fn with_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn min(&self) -> Option<i64> {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }

    fn validator(&self) -> String {
        match (self.min, self.max) {
            (None, None) => VALIDATOR.to_string(),
            (min, max) => format!(
                "{} [{}, {}]",
                VALIDATOR,
                min.map_or_else(|| "-inf".to_string(), |v| v.to_string()),
                max.map_or_else(|| "+inf".to_string(), |v| v.to_string())
            ),
        }
    }
}

impl ScalarValue for IntegerValue {
    type Native = i64;

    const DECLARED: DeclaredType = DeclaredType::Integer;

    fn slot(&self) -> &Option<i64> {
        &self.value
    }

    fn slot_mut(&mut self) -> &mut Option<i64> {
        &mut self.value
    }

    fn parse(&self, raw: &str) -> Result<i64> {
        let fail = || Error::misformatted(raw, self.validator(), DeclaredType::Integer);

        let trimmed = raw.trim();
        let (sign, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => ("-", &trimmed[1..]),
            Some(b'+') => ("", &trimmed[1..]),
            _ => ("", trimmed),
        };
        // A sign must be followed by digits.
        if digits.is_empty() && digits.len() != trimmed.len() {
            return Err(fail());
        }
        let digits = digits.trim_start_matches('0');
        let digits = if digits.is_empty() { "0" } else { digits };
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail());
        }

        let value: i64 = format!("{}{}", sign, digits).parse().map_err(|_| fail())?;
        if self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max) {
            return Err(fail());
        }
        Ok(value)
    }

    fn raw_value(&self) -> String {
        match (&self.value, &self.format) {
            (Some(v), Some(pattern)) => pattern.render(FormatArg::Int(*v)),
            (Some(v), None) => v.to_string(),
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
