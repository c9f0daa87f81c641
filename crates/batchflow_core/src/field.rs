//! Named value bindings and the input transfer policies.

use crate::error::{Error, Result};
use crate::types::{DeclaredType, InputType};
use crate::value::{SharedValue, TypedValue};

/// A named binding of one value to an [`InputType`] policy.
///
/// Several fields may hold the same [`SharedValue`]; that is what
/// [`InputType::Auto`] relies on.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    input_name: Option<String>,
    input_type: InputType,
    value: Option<SharedValue>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_name: None,
            input_type: InputType::default(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: SharedValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_input_name(mut self, input_name: impl Into<String>) -> Self {
        self.input_name = Some(input_name.into());
        self
    }

    pub fn with_input_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upstream lookup key; defaults to the field name.
    pub fn input_name(&self) -> &str {
        self.input_name.as_deref().unwrap_or(&self.name)
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    /// Bind or replace the value.
    pub fn bind(&mut self, value: SharedValue) -> &mut Self {
        self.value = Some(value);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Result<&SharedValue> {
        self.value.as_ref().ok_or_else(|| {
            Error::configuration(format!("Field '{}' is not configured", self.name))
        })
    }

    pub fn reset(&mut self) -> &mut Self {
        if let Some(value) = &self.value {
            value.reset();
        }
        self
    }

    /// Transfer `input` into the bound value according to the input policy.
    pub fn set_value(&mut self, input: &SharedValue) -> Result<&mut Self> {
        match self.input_type {
            InputType::Manual => {}
            InputType::Auto => self.transfer(input, auto)?,
            InputType::Cast => self.transfer(input, cast)?,
            InputType::Raw => self.transfer(input, raw)?,
            InputType::Value => self.transfer(input, value)?,
        }
        Ok(self)
    }

    fn transfer(
        &self,
        input: &SharedValue,
        policy: fn(&Field, &SharedValue, &SharedValue) -> Result<()>,
    ) -> Result<()> {
        policy(self, input, self.value()?)
    }

    fn unsupported(&self) -> Error {
        Error::UnsupportedInputType {
            input_type: self.input_type,
            field: self.name.clone(),
        }
    }
}

/// The input must be the bound instance itself.
fn auto(field: &Field, input: &SharedValue, bound: &SharedValue) -> Result<()> {
    if input.ptr_eq(bound) {
        Ok(())
    } else {
        Err(field.unsupported())
    }
}

/// Null propagates; anything else goes through the canonical raw string.
fn cast(_field: &Field, input: &SharedValue, bound: &SharedValue) -> Result<()> {
    let input = input.snapshot();
    if input.is_null() {
        bound.borrow_mut().set_null();
        return Ok(());
    }
    bound.set_raw(Some(&input.raw()))
}

/// The raw string is copied verbatim, null or not.
fn raw(_field: &Field, input: &SharedValue, bound: &SharedValue) -> Result<()> {
    let raw = input.raw();
    bound.set_raw(Some(&raw))
}

/// Null propagates; anything else goes through the typed accessor pair of the
/// bound value's declared type.
fn value(_field: &Field, input: &SharedValue, bound: &SharedValue) -> Result<()> {
    let input = input.snapshot();
    if input.is_null() {
        bound.borrow_mut().set_null();
        return Ok(());
    }
    let mut bound = bound.borrow_mut();
    copy_native(&input, &mut bound)
}

fn copy_native(input: &TypedValue, bound: &mut TypedValue) -> Result<()> {
    match bound.declared_type() {
        DeclaredType::Integer => bound.set_as_integer(input.get_as_integer()?)?,
        DeclaredType::Decimal => bound.set_as_decimal(input.get_as_decimal()?)?,
        DeclaredType::Boolean => bound.set_as_boolean(input.get_as_boolean()?)?,
        DeclaredType::String => bound.set_as_string(input.get_as_string()?)?,
        DeclaredType::DateTime => bound.set_as_datetime(input.get_as_datetime()?)?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{DateTimeValue, DecimalValue, IntegerValue, StringValue};

    fn shared_string(raw: &str) -> SharedValue {
        let value = SharedValue::new(StringValue::new());
        value.set_raw(Some(raw)).unwrap();
        value
    }

    #[test]
    fn test_defaults() {
        let field = Field::new("amount");
        assert_eq!(field.input_name(), "amount");
        assert_eq!(field.input_type(), InputType::Auto);
        assert!(!field.is_ready());
        assert!(matches!(field.value(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_raw_policy_reparses_the_input_string() {
        let bound = SharedValue::new(DecimalValue::new());
        let mut field = Field::new("amount")
            .with_value(bound.clone())
            .with_input_type(InputType::Raw);

        field.set_value(&shared_string("123.10")).unwrap();
        assert_eq!(bound.raw(), "123.1");
    }

    #[test]
    fn test_raw_policy_copies_null_raw_form() {
        let bound = SharedValue::new(IntegerValue::new());
        bound.set_raw(Some("5")).unwrap();
        let mut field = Field::new("n")
            .with_value(bound.clone())
            .with_input_type(InputType::Raw);

        // A null integer renders "", which parses as zero.
        field
            .set_value(&SharedValue::new(IntegerValue::new()))
            .unwrap();
        assert_eq!(bound.borrow().get_as_integer().unwrap(), 0);
    }

    #[test]
    fn test_value_policy_keeps_each_side_format() {
        let input = SharedValue::new(DateTimeValue::new("Y-m"));
        input.set_raw(Some("2025-01")).unwrap();
        let bound = SharedValue::new(DateTimeValue::new("Y/m"));
        let mut field = Field::new("period")
            .with_value(bound.clone())
            .with_input_type(InputType::Value);

        field.set_value(&input).unwrap();
        assert_eq!(bound.raw(), "2025/01");
        assert_eq!(input.raw(), "2025-01");
    }

    #[test]
    fn test_value_policy_rejects_other_types() {
        let bound = SharedValue::new(IntegerValue::new());
        let mut field = Field::new("n")
            .with_value(bound)
            .with_input_type(InputType::Value);
        let err = field.set_value(&shared_string("12")).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_cast_and_value_propagate_null() {
        for policy in [InputType::Cast, InputType::Value] {
            let bound = SharedValue::new(IntegerValue::new());
            bound.set_raw(Some("3")).unwrap();
            let mut field = Field::new("n")
                .with_value(bound.clone())
                .with_input_type(policy);
            field
                .set_value(&SharedValue::new(IntegerValue::new()))
                .unwrap();
            assert!(bound.is_null(), "{} should propagate null", policy);
        }
    }

    #[test]
    fn test_cast_converts_across_types() {
        let bound = SharedValue::new(IntegerValue::new());
        let mut field = Field::new("n")
            .with_value(bound.clone())
            .with_input_type(InputType::Cast);
        field.set_value(&shared_string("0042")).unwrap();
        assert_eq!(bound.borrow().get_as_integer().unwrap(), 42);

        let err = field.set_value(&shared_string("forty")).unwrap_err();
        assert!(err.is_data_error());
        assert_eq!(bound.borrow().get_as_integer().unwrap(), 42);
    }

    #[test]
    fn test_auto_requires_the_same_instance() {
        let bound = SharedValue::new(StringValue::new());
        let mut field = Field::new("name").with_value(bound.clone());
        field.set_value(&bound).unwrap();

        let err = field.set_value(&shared_string("other")).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedInputType {
                input_type: InputType::Auto,
                ..
            }
        ));
    }

    #[test]
    fn test_same_instance_under_copying_policies() {
        let bound = shared_string("  same ");
        for policy in [InputType::Raw, InputType::Cast, InputType::Value] {
            let mut field = Field::new("s")
                .with_value(bound.clone())
                .with_input_type(policy);
            field.set_value(&bound).unwrap();
            assert_eq!(bound.raw(), "same");
        }
    }

    #[test]
    fn test_manual_leaves_the_value_alone() {
        let bound = SharedValue::new(IntegerValue::new());
        bound.borrow_mut().set_as_integer(1).unwrap();
        let mut field = Field::new("n")
            .with_value(bound.clone())
            .with_input_type(InputType::Manual);
        field.set_value(&shared_string("99")).unwrap();
        assert_eq!(bound.borrow().get_as_integer().unwrap(), 1);

        field.reset();
        assert!(bound.is_null());
    }

    #[test]
    fn test_unbound_field_is_a_configuration_error() {
        let mut field = Field::new("n").with_input_type(InputType::Raw);
        let err = field.set_value(&shared_string("1")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
