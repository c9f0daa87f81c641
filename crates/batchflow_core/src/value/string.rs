use crate::error::Result;
use crate::pattern::{FormatArg, RenderPattern};
use crate::types::DeclaredType;
use crate::value::ScalarValue;

/// Text, trimmed on every write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringValue {
    value: Option<String>,
    format: Option<RenderPattern>,
}

impl StringValue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScalarValue for StringValue {
    type Native = String;

    const DECLARED: DeclaredType = DeclaredType::String;

    fn slot(&self) -> &Option<String> {
        &self.value
    }

    fn slot_mut(&mut self) -> &mut Option<String> {
        &mut self.value
    }

    fn parse(&self, raw: &str) -> Result<String> {
        Ok(raw.trim().to_string())
    }

    fn normalize(&self, value: String) -> String {
        let trimmed = value.trim();
        if trimmed.len() == value.len() {
            return value;
        }
        trimmed.to_string()
    }

    fn raw_value(&self) -> String {
        let text = self.value.as_deref().unwrap_or("");
        match &self.format {
            Some(pattern) => pattern.render(FormatArg::Str(text)),
            None => text.to_string(),
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
