use chrono::NaiveDateTime;

use crate::date_pattern::DatePattern;
use crate::error::{Error, Result};
use crate::types::DeclaredType;
use crate::value::ScalarValue;

/// A date and time without zone.
///
/// Raw strings are parsed with the input pattern and rendered with the
/// output pattern, which falls back to the input pattern when unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateTimeValue {
    value: Option<NaiveDateTime>,
    input: DatePattern,
    output: Option<DatePattern>,
}

impl DateTimeValue {
    pub fn new(input_format: &str) -> Self {
        Self {
            value: None,
            input: DatePattern::new(input_format),
            output: None,
        }
    }

    pub fn with_output_format(mut self, output_format: &str) -> Self {
        self.output = Some(DatePattern::new(output_format));
        self
    }

    pub fn input_format(&self) -> &str {
        self.input.as_str()
    }

    pub fn set_input_format(&mut self, input_format: &str) -> &mut Self {
        self.input = DatePattern::new(input_format);
        self
    }

    fn output(&self) -> &DatePattern {
        self.output.as_ref().unwrap_or(&self.input)
    }
}

impl ScalarValue for DateTimeValue {
    type Native = NaiveDateTime;

    const DECLARED: DeclaredType = DeclaredType::DateTime;

    fn slot(&self) -> &Option<NaiveDateTime> {
        &self.value
    }

    fn slot_mut(&mut self) -> &mut Option<NaiveDateTime> {
        &mut self.value
    }

    fn parse(&self, raw: &str) -> Result<NaiveDateTime> {
        self.input.parse(raw.trim()).map_err(|reason| {
            tracing::trace!(raw, pattern = self.input.as_str(), %reason, "date parse failed");
            Error::misformatted(
                raw,
                format!("date format '{}'", self.input.as_str()),
                DeclaredType::DateTime,
            )
        })
    }

    fn raw_value(&self) -> String {
        self.value
            .as_ref()
            .map(|value| self.output().render(value))
            .unwrap_or_default()
    }

    /// Sets the output date pattern; `None` falls back to the input pattern.
    fn set_format(&mut self, pattern: Option<&str>) -> Result<&mut Self> {
        self.output = pattern.map(DatePattern::new);
        Ok(self)
    }

    fn format(&self) -> Option<&str> {
        self.output.as_ref().map(DatePattern::as_str)
    }
}
