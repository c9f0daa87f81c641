//! Null-aware typed values.
//!
//! Each declared type has a concrete value struct implementing
//! [`ScalarValue`]; code that knows the static type uses those directly and
//! cannot call an accessor of another type. [`TypedValue`] is the sum over
//! all of them for heterogeneous schemas: its typed accessors check the
//! variant at runtime and fail with [`Error::TypeMismatch`].

mod boolean;
mod datetime;
mod decimal;
mod integer;
mod string;

pub use boolean::BooleanValue;
pub use datetime::DateTimeValue;
pub use decimal::{DecimalNotation, DecimalValue};
pub use integer::IntegerValue;
pub use string::StringValue;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::types::DeclaredType;

/// Storage and raw-string contract shared by every concrete value type.
///
/// A value is either null or holds exactly one native value; there is no
/// third state. Parsing failures leave the previous state untouched.
pub trait ScalarValue: Clone + fmt::Debug {
    type Native: Clone + fmt::Debug + PartialEq;

    const DECLARED: DeclaredType;

    fn slot(&self) -> &Option<Self::Native>;

    fn slot_mut(&mut self) -> &mut Option<Self::Native>;

    /// Clean and validate a raw string into a native value.
    fn parse(&self, raw: &str) -> Result<Self::Native>;

    /// Canonical raw string, with the render pattern applied when one is set.
    fn raw_value(&self) -> String;

    /// Set or clear the render pattern.
    fn set_format(&mut self, pattern: Option<&str>) -> Result<&mut Self>;

    fn format(&self) -> Option<&str>;

    /// Hook applied to natively set values.
    fn normalize(&self, value: Self::Native) -> Self::Native {
        value
    }

    fn is_null(&self) -> bool {
        self.slot().is_none()
    }

    fn set_null(&mut self) -> &mut Self {
        *self.slot_mut() = None;
        self
    }

    fn reset(&mut self) -> &mut Self {
        self.set_null()
    }

    fn get(&self) -> Result<Self::Native> {
        self.slot().clone().ok_or(Error::ValueIsNull {
            type_name: Self::DECLARED,
        })
    }

    fn get_or_null(&self) -> Option<Self::Native> {
        self.slot().clone()
    }

    fn set(&mut self, value: Self::Native) -> &mut Self {
        let value = self.normalize(value);
        *self.slot_mut() = Some(value);
        self
    }

    fn set_or_null(&mut self, value: Option<Self::Native>) -> &mut Self {
        match value {
            Some(value) => self.set(value),
            None => self.set_null(),
        }
    }

    /// `None` clears the value; anything else is parsed.
    fn set_raw(&mut self, raw: Option<&str>) -> Result<&mut Self> {
        match raw {
            None => Ok(self.set_null()),
            Some(raw) => {
                let value = self.parse(raw)?;
                *self.slot_mut() = Some(value);
                Ok(self)
            }
        }
    }
}

/// A value of any declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Integer(IntegerValue),
    Decimal(DecimalValue),
    Boolean(BooleanValue),
    String(StringValue),
    DateTime(DateTimeValue),
}

macro_rules! dispatch {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            TypedValue::Integer($inner) => $body,
            TypedValue::Decimal($inner) => $body,
            TypedValue::Boolean($inner) => $body,
            TypedValue::String($inner) => $body,
            TypedValue::DateTime($inner) => $body,
        }
    };
}

macro_rules! typed_accessors {
    ($variant:ident, $native:ty, $get:ident, $get_or_null:ident, $set:ident, $set_or_null:ident) => {
        pub fn $get(&self) -> Result<$native> {
            match self {
                TypedValue::$variant(value) => value.get(),
                other => Err(other.mismatch(stringify!($get), DeclaredType::$variant)),
            }
        }

        /// Never fails on null; fails only on a declared-type mismatch.
        pub fn $get_or_null(&self) -> Result<Option<$native>> {
            match self {
                TypedValue::$variant(value) => Ok(value.get_or_null()),
                other => Err(other.mismatch(stringify!($get_or_null), DeclaredType::$variant)),
            }
        }

        pub fn $set(&mut self, native: $native) -> Result<&mut Self> {
            match self {
                TypedValue::$variant(value) => {
                    value.set(native);
                }
                other => return Err(other.mismatch(stringify!($set), DeclaredType::$variant)),
            }
            Ok(self)
        }

        pub fn $set_or_null(&mut self, native: Option<$native>) -> Result<&mut Self> {
            match self {
                TypedValue::$variant(value) => {
                    value.set_or_null(native);
                }
                other => {
                    return Err(other.mismatch(stringify!($set_or_null), DeclaredType::$variant))
                }
            }
            Ok(self)
        }
    };
}

impl TypedValue {
    /// A null value of `declared` with default options.
    pub fn new(declared: DeclaredType) -> Self {
        match declared {
            DeclaredType::Integer => TypedValue::Integer(IntegerValue::new()),
            DeclaredType::Decimal => TypedValue::Decimal(DecimalValue::new()),
            DeclaredType::Boolean => TypedValue::Boolean(BooleanValue::new()),
            DeclaredType::String => TypedValue::String(StringValue::new()),
            DeclaredType::DateTime => TypedValue::DateTime(DateTimeValue::default()),
        }
    }

    pub fn declared_type(&self) -> DeclaredType {
        match self {
            TypedValue::Integer(_) => DeclaredType::Integer,
            TypedValue::Decimal(_) => DeclaredType::Decimal,
            TypedValue::Boolean(_) => DeclaredType::Boolean,
            TypedValue::String(_) => DeclaredType::String,
            TypedValue::DateTime(_) => DeclaredType::DateTime,
        }
    }

    pub fn is_null(&self) -> bool {
        dispatch!(self, value => value.is_null())
    }

    pub fn set_null(&mut self) -> &mut Self {
        dispatch!(&mut *self, value => {
            value.set_null();
        });
        self
    }

    pub fn reset(&mut self) -> &mut Self {
        self.set_null()
    }

    /// Canonical raw string form.
    pub fn raw(&self) -> String {
        dispatch!(self, value => value.raw_value())
    }

    pub fn set_raw(&mut self, raw: Option<&str>) -> Result<&mut Self> {
        dispatch!(&mut *self, value => {
            value.set_raw(raw)?;
        });
        Ok(self)
    }

    /// Set or clear the render pattern; it only affects [`TypedValue::raw`].
    pub fn set_format(&mut self, pattern: Option<&str>) -> Result<&mut Self> {
        dispatch!(&mut *self, value => {
            value.set_format(pattern)?;
        });
        Ok(self)
    }

    pub fn format(&self) -> Option<&str> {
        dispatch!(self, value => value.format())
    }

    fn mismatch(&self, method: &'static str, expected: DeclaredType) -> Error {
        Error::type_mismatch(self.declared_type(), method, expected)
    }

    typed_accessors!(
        Integer,
        i64,
        get_as_integer,
        get_as_integer_or_null,
        set_as_integer,
        set_as_integer_or_null
    );

    typed_accessors!(
        Decimal,
        Decimal,
        get_as_decimal,
        get_as_decimal_or_null,
        set_as_decimal,
        set_as_decimal_or_null
    );

    typed_accessors!(
        Boolean,
        bool,
        get_as_boolean,
        get_as_boolean_or_null,
        set_as_boolean,
        set_as_boolean_or_null
    );

    typed_accessors!(
        String,
        String,
        get_as_string,
        get_as_string_or_null,
        set_as_string,
        set_as_string_or_null
    );

    typed_accessors!(
        DateTime,
        NaiveDateTime,
        get_as_datetime,
        get_as_datetime_or_null,
        set_as_datetime,
        set_as_datetime_or_null
    );
}

impl From<IntegerValue> for TypedValue {
    fn from(value: IntegerValue) -> Self {
        TypedValue::Integer(value)
    }
}

impl From<DecimalValue> for TypedValue {
    fn from(value: DecimalValue) -> Self {
        TypedValue::Decimal(value)
    }
}

impl From<BooleanValue> for TypedValue {
    fn from(value: BooleanValue) -> Self {
        TypedValue::Boolean(value)
    }
}

impl From<StringValue> for TypedValue {
    fn from(value: StringValue) -> Self {
        TypedValue::String(value)
    }
}

impl From<DateTimeValue> for TypedValue {
    fn from(value: DateTimeValue) -> Self {
        TypedValue::DateTime(value)
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw())
    }
}

/// A handle to a value living in a [`Schema`](crate::Schema).
///
/// Cloning the handle shares the instance; [`SharedValue::snapshot`] copies it.
/// Handles are single-threaded: one pipeline owns a schema at a time.
#[derive(Debug, Clone)]
pub struct SharedValue(Rc<RefCell<TypedValue>>);

impl SharedValue {
    pub fn new(value: impl Into<TypedValue>) -> Self {
        Self(Rc::new(RefCell::new(value.into())))
    }

    pub fn borrow(&self) -> Ref<'_, TypedValue> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, TypedValue> {
        self.0.borrow_mut()
    }

    /// An independent copy of the current state.
    pub fn snapshot(&self) -> TypedValue {
        self.0.borrow().clone()
    }

    /// True when both handles point at the same instance.
    pub fn ptr_eq(&self, other: &SharedValue) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn declared_type(&self) -> DeclaredType {
        self.0.borrow().declared_type()
    }

    pub fn is_null(&self) -> bool {
        self.0.borrow().is_null()
    }

    pub fn raw(&self) -> String {
        self.0.borrow().raw()
    }

    pub fn set_raw(&self, raw: Option<&str>) -> Result<()> {
        self.0.borrow_mut().set_raw(raw)?;
        Ok(())
    }

    pub fn reset(&self) {
        self.0.borrow_mut().reset();
    }
}

impl From<TypedValue> for SharedValue {
    fn from(value: TypedValue) -> Self {
        SharedValue::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_new_values_are_null() {
        for declared in DeclaredType::all() {
            let value = TypedValue::new(declared);
            assert!(value.is_null(), "{} should start null", declared);
            assert_eq!(value.declared_type(), declared);
        }
    }

    #[test]
    fn test_reset_nulls_every_accessor() {
        let mut value = TypedValue::new(DeclaredType::Integer);
        value.set_as_integer(5).unwrap();
        value.reset();
        assert!(value.is_null());
        assert_eq!(value.get_as_integer_or_null().unwrap(), None);
        assert!(matches!(
            value.get_as_integer(),
            Err(Error::ValueIsNull {
                type_name: DeclaredType::Integer
            })
        ));
    }

    #[test]
    fn test_cross_type_accessors_fail_with_type_mismatch() {
        for declared in DeclaredType::all() {
            let mut value = TypedValue::new(declared);
            let calls: Vec<(DeclaredType, Result<()>)> = vec![
                (DeclaredType::Integer, value.get_as_integer().map(drop)),
                (DeclaredType::Decimal, value.get_as_decimal().map(drop)),
                (DeclaredType::Boolean, value.get_as_boolean_or_null().map(drop)),
                (DeclaredType::String, value.get_as_string_or_null().map(drop)),
                (DeclaredType::DateTime, value.get_as_datetime_or_null().map(drop)),
            ];
            for (expected, outcome) in calls {
                if expected == declared {
                    continue;
                }
                match outcome {
                    Err(Error::TypeMismatch {
                        current,
                        expected: wanted,
                        method,
                    }) => {
                        assert_eq!(current, declared);
                        assert_eq!(wanted, expected);
                        assert!(method.starts_with("get_as_"));
                    }
                    other => panic!("expected type mismatch, got {:?}", other),
                }
            }

            if declared != DeclaredType::Boolean {
                let err = value.set_as_boolean(true).unwrap_err();
                assert!(err.to_string().contains("set_as_boolean"));
            }
        }
    }

    #[test]
    fn test_typed_setters_clear_null() {
        let mut value = TypedValue::new(DeclaredType::Decimal);
        value
            .set_as_decimal(Decimal::from_str("3.14").unwrap())
            .unwrap();
        assert!(!value.is_null());
        assert_eq!(value.raw(), "3.14");
        value.set_as_decimal_or_null(None).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_failed_parse_keeps_previous_state() {
        let mut value = TypedValue::new(DeclaredType::Integer);
        value.set_raw(Some("12")).unwrap();
        assert!(value.set_raw(Some("twelve")).is_err());
        assert_eq!(value.get_as_integer().unwrap(), 12);
    }

    #[test]
    fn test_shared_value_identity_and_snapshot() {
        let shared = SharedValue::new(StringValue::new());
        let alias = shared.clone();
        assert!(shared.ptr_eq(&alias));

        shared.set_raw(Some("first")).unwrap();
        let snapshot = shared.snapshot();
        alias.set_raw(Some("second")).unwrap();

        assert_eq!(snapshot.get_as_string().unwrap(), "first");
        assert_eq!(shared.raw(), "second");
        assert!(!shared.ptr_eq(&SharedValue::new(snapshot)));
    }
}
