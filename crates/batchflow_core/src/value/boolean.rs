use crate::error::{Error, Result};
use crate::pattern::{FormatArg, RenderPattern};
use crate::types::DeclaredType;
use crate::value::ScalarValue;

const TRUE_TOKENS: [&str; 4] = ["true", "1", "yes", "on"];
const FALSE_TOKENS: [&str; 4] = ["false", "0", "no", "off"];

/// Raw form of a null boolean in fixed-width layouts. It is not a token:
/// readers map blank cells to null before parsing.
pub const NULL_BOOLEAN_RAW: &str = " ";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanValue {
    value: Option<bool>,
    format: Option<RenderPattern>,
}

impl BooleanValue {
    pub fn new() -> Self {
        Self::default()
    }

    fn base_raw(&self) -> &'static str {
        match self.value {
            Some(true) => "1",
            Some(false) => "0",
            None => NULL_BOOLEAN_RAW,
        }
    }
}

impl ScalarValue for BooleanValue {
    type Native = bool;

    const DECLARED: DeclaredType = DeclaredType::Boolean;

    fn slot(&self) -> &Option<bool> {
        &self.value
    }

    fn slot_mut(&mut self) -> &mut Option<bool> {
        &mut self.value
    }

    fn parse(&self, raw: &str) -> Result<bool> {
        let token = raw.trim().to_ascii_lowercase();
        if TRUE_TOKENS.contains(&token.as_str()) {
            Ok(true)
        } else if FALSE_TOKENS.contains(&token.as_str()) {
            Ok(false)
        } else {
            Err(Error::misformatted(raw, "boolean filter", DeclaredType::Boolean))
        }
    }

    fn raw_value(&self) -> String {
        match &self.format {
            Some(pattern) => pattern.render(FormatArg::Str(self.base_raw())),
            None => self.base_raw().to_string(),
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
