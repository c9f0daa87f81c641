//! Declarative schema definitions, deserialisable from job files.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::field::Field;
use crate::schema::Schema;
use crate::types::{DeclaredType, InputType};
use crate::value::{
    BooleanValue, DateTimeValue, DecimalNotation, DecimalValue, IntegerValue, StringValue,
    TypedValue,
};

/// One field of a [`SchemaDef`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,

    #[serde(rename = "type")]
    pub declared: DeclaredType,

    /// Inclusive lower bound (integer only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,

    /// Inclusive upper bound (integer only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,

    /// Decimal notation (decimal only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notation: Option<DecimalNotation>,

    /// Parse pattern (datetime only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,

    /// Render pattern; the output date pattern for datetimes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Upstream field name, defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,

    /// Constant raw value; implies the manual policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, declared: DeclaredType) -> Self {
        Self {
            name: name.into(),
            declared,
            min: None,
            max: None,
            notation: None,
            date_format: None,
            format: None,
            input: None,
            input_type: None,
            value: None,
        }
    }

    pub fn effective_input_type(&self) -> InputType {
        match (self.input_type, &self.value) {
            (Some(input_type), _) => input_type,
            (None, Some(_)) => InputType::Manual,
            (None, None) => InputType::default(),
        }
    }

    /// Build the value this definition describes, constant included.
    pub fn build_value(&self) -> Result<TypedValue> {
        self.check_options()?;

        let mut value: TypedValue = match self.declared {
            DeclaredType::Integer => IntegerValue::new().with_range(self.min, self.max).into(),
            DeclaredType::Decimal => DecimalValue::new()
                .with_notation(self.notation.unwrap_or_default())
                .into(),
            DeclaredType::Boolean => BooleanValue::new().into(),
            DeclaredType::String => StringValue::new().into(),
            DeclaredType::DateTime => match &self.date_format {
                Some(pattern) => DateTimeValue::new(pattern).into(),
                None => DateTimeValue::default().into(),
            },
        };
        value.set_format(self.format.as_deref())?;
        if let Some(raw) = &self.value {
            value.set_raw(Some(raw))?;
        }
        Ok(value)
    }

    pub fn to_field(&self) -> Field {
        let field = Field::new(&self.name).with_input_type(self.effective_input_type());
        match &self.input {
            Some(input) => field.with_input_name(input),
            None => field,
        }
    }

    fn check_options(&self) -> Result<()> {
        let misplaced = |option: &str, wanted: DeclaredType| {
            Error::configuration(format!(
                "Field '{}': option '{}' only applies to {} fields, not {}",
                self.name, option, wanted, self.declared
            ))
        };
        if self.declared != DeclaredType::Integer {
            if self.min.is_some() {
                return Err(misplaced("min", DeclaredType::Integer));
            }
            if self.max.is_some() {
                return Err(misplaced("max", DeclaredType::Integer));
            }
        }
        if self.declared != DeclaredType::Decimal && self.notation.is_some() {
            return Err(misplaced("notation", DeclaredType::Decimal));
        }
        if self.declared != DeclaredType::DateTime && self.date_format.is_some() {
            return Err(misplaced("date_format", DeclaredType::DateTime));
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(Error::configuration(format!(
                    "Field '{}': min {} is greater than max {}",
                    self.name, min, max
                )));
            }
        }
        Ok(())
    }
}

/// An ordered list of field definitions acting as a schema factory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDef {
    pub fields: Vec<FieldDef>,
}

impl SchemaDef {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }

    /// Fields an upstream source populates, skipping manual ones.
    pub fn input_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|field| field.effective_input_type() != InputType::Manual)
            .map(|field| field.name.clone())
            .collect()
    }

    pub fn build(&self) -> Result<Schema> {
        let mut schema = Schema::new();
        for field in &self.fields {
            schema.add(field.name.clone(), field.build_value()?)?;
        }
        Ok(schema)
    }

    /// One unbound [`Field`] per definition.
    pub fn to_fields(&self) -> Vec<Field> {
        self.fields.iter().map(FieldDef::to_field).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialises_type_options() {
        let json = r#"[
            {"name": "id", "type": "integer", "min": 1},
            {"name": "amount", "type": "decimal", "notation": "international", "format": "%.2f"},
            {"name": "when", "type": "datetime", "date_format": "d/m/Y", "format": "Y-m-d"},
            {"name": "source", "type": "string", "value": "batch"}
        ]"#;
        let def: SchemaDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.names(), vec!["id", "amount", "when", "source"]);
        assert_eq!(def.input_names(), vec!["id", "amount", "when"]);

        let schema = def.build().unwrap();
        assert_eq!(schema.value("source").unwrap().raw(), "batch");

        let amount = schema.value("amount").unwrap();
        amount.set_raw(Some("1.234,5")).unwrap();
        assert_eq!(amount.raw(), "1234.50");

        let when = schema.value("when").unwrap();
        when.set_raw(Some("05/03/2024")).unwrap();
        assert_eq!(when.raw(), "2024-03-05");

        let id = schema.value("id").unwrap();
        assert!(id.set_raw(Some("0")).is_err());
    }

    #[test]
    fn test_misplaced_options_are_rejected() {
        let mut def = FieldDef::new("name", DeclaredType::String);
        def.min = Some(1);
        assert!(matches!(def.build_value(), Err(Error::Configuration(_))));

        let mut def = FieldDef::new("n", DeclaredType::Integer);
        def.min = Some(5);
        def.max = Some(1);
        assert!(def.build_value().is_err());
    }

    #[test]
    fn test_invalid_constant_fails_at_build() {
        let mut def = FieldDef::new("flag", DeclaredType::Boolean);
        def.value = Some("perhaps".to_string());
        assert!(matches!(def.build_value(), Err(Error::MisFormatted { .. })));
    }

    #[test]
    fn test_fields_carry_input_mapping() {
        let mut def = FieldDef::new("total", DeclaredType::Decimal);
        def.input = Some("amount".to_string());
        def.input_type = Some(InputType::Cast);
        let field = def.to_field();
        assert_eq!(field.name(), "total");
        assert_eq!(field.input_name(), "amount");
        assert_eq!(field.input_type(), InputType::Cast);
        assert!(!field.is_ready());
    }
}
