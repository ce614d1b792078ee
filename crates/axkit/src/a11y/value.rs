/*!
Host-side attribute values.

A [`Value`] is what the codec produces from a wire value: dynamically
typed, with element references already wrapped. Callers usually never see
it directly; typed reads go through [`FromValue`], a checked cast that
fails loudly with `TypeMismatch` instead of coercing.
*/

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use ts_rs::TS;

use crate::types::{AxError, AxResult, ErrorCode, Point, Range, Rect, Size};

/// Discriminant of a [`Value`], used in type mismatch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ValueType {
  Null,
  Boolean,
  Number,
  String,
  Element,
  Point,
  Size,
  Rect,
  Range,
  Error,
  Array,
  Dictionary,
  Opaque,
}

/// Decoded attribute value.
///
/// `E` is the element type (`UIElement<B>` for values read through the
/// client). Numbers are unified as `f64`; integer reads check that the
/// number is whole.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<E> {
  /// Explicit null.
  Null,
  Boolean(bool),
  Number(f64),
  String(String),
  /// Reference to another element.
  Element(E),
  Point(Point),
  Size(Size),
  Rect(Rect),
  Range(Range),
  /// Status code embedded in a value (e.g. a failed item of a batch read).
  Error(ErrorCode),
  Array(Vec<Value<E>>),
  Dictionary(BTreeMap<String, Value<E>>),
  /// A foreign object with no host model, by type name.
  Opaque(String),
}

impl<E> Value<E> {
  /// Get the `ValueType` for this value.
  pub const fn value_type(&self) -> ValueType {
    match self {
      Self::Null => ValueType::Null,
      Self::Boolean(_) => ValueType::Boolean,
      Self::Number(_) => ValueType::Number,
      Self::String(_) => ValueType::String,
      Self::Element(_) => ValueType::Element,
      Self::Point(_) => ValueType::Point,
      Self::Size(_) => ValueType::Size,
      Self::Rect(_) => ValueType::Rect,
      Self::Range(_) => ValueType::Range,
      Self::Error(_) => ValueType::Error,
      Self::Array(_) => ValueType::Array,
      Self::Dictionary(_) => ValueType::Dictionary,
      Self::Opaque(_) => ValueType::Opaque,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    if let Self::String(s) = self {
      Some(s)
    } else {
      None
    }
  }

  pub const fn as_f64(&self) -> Option<f64> {
    if let Self::Number(n) = self {
      Some(*n)
    } else {
      None
    }
  }

  /// Get as i64 if this is a whole Number.
  #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
  pub fn as_i64(&self) -> Option<i64> {
    let n = self.as_f64()?;
    let whole = n.is_finite() && n.fract() == 0.0;
    // i64::MAX rounds up to 2^63 as f64, which no i64 can hold.
    if whole && n >= i64::MIN as f64 && n < i64::MAX as f64 {
      Some(n as i64)
    } else {
      None
    }
  }

  pub const fn as_bool(&self) -> Option<bool> {
    if let Self::Boolean(b) = self {
      Some(*b)
    } else {
      None
    }
  }

  pub const fn as_element(&self) -> Option<&E> {
    if let Self::Element(e) = self {
      Some(e)
    } else {
      None
    }
  }

  pub fn as_array(&self) -> Option<&[Value<E>]> {
    if let Self::Array(items) = self {
      Some(items)
    } else {
      None
    }
  }

  pub const fn as_error(&self) -> Option<ErrorCode> {
    if let Self::Error(code) = self {
      Some(*code)
    } else {
      None
    }
  }

  pub const fn is_null(&self) -> bool {
    matches!(self, Self::Null)
  }

  /// Convert element references, keeping the shape of the value.
  pub fn map_elements<F>(self, f: &impl Fn(E) -> F) -> Value<F> {
    match self {
      Self::Null => Value::Null,
      Self::Boolean(b) => Value::Boolean(b),
      Self::Number(n) => Value::Number(n),
      Self::String(s) => Value::String(s),
      Self::Element(e) => Value::Element(f(e)),
      Self::Point(p) => Value::Point(p),
      Self::Size(s) => Value::Size(s),
      Self::Rect(r) => Value::Rect(r),
      Self::Range(r) => Value::Range(r),
      Self::Error(code) => Value::Error(code),
      Self::Array(items) => Value::Array(items.into_iter().map(|v| v.map_elements(f)).collect()),
      Self::Dictionary(map) => {
        Value::Dictionary(map.into_iter().map(|(k, v)| (k, v.map_elements(f))).collect())
      }
      Self::Opaque(name) => Value::Opaque(name),
    }
  }
}

impl<E: Display> Value<E> {
  /// Render as JSON for debugging output. Elements render via `Display`.
  pub fn to_json(&self) -> serde_json::Value {
    use serde_json::{json, Value as Json};

    match self {
      Self::Null => Json::Null,
      Self::Boolean(b) => json!(b),
      Self::Number(n) => json!(n),
      Self::String(s) => json!(s),
      Self::Element(e) => json!(e.to_string()),
      Self::Point(p) => json!(p),
      Self::Size(s) => json!(s),
      Self::Rect(r) => json!(r),
      Self::Range(r) => json!(r),
      Self::Error(code) => json!({ "error": code }),
      Self::Array(items) => Json::Array(items.iter().map(Self::to_json).collect()),
      Self::Dictionary(map) => {
        Json::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
      }
      Self::Opaque(name) => json!({ "opaque": name }),
    }
  }
}

impl<E> From<String> for Value<E> {
  fn from(s: String) -> Self {
    Self::String(s)
  }
}

impl<E> From<&str> for Value<E> {
  fn from(s: &str) -> Self {
    Self::String(s.to_owned())
  }
}

impl<E> From<f64> for Value<E> {
  fn from(n: f64) -> Self {
    Self::Number(n)
  }
}

impl<E> From<i64> for Value<E> {
  #[allow(clippy::cast_precision_loss)] // Acceptable: AX numbers are CFNumber doubles
  fn from(n: i64) -> Self {
    Self::Number(n as f64)
  }
}

impl<E> From<i32> for Value<E> {
  fn from(n: i32) -> Self {
    Self::Number(f64::from(n))
  }
}

impl<E> From<bool> for Value<E> {
  fn from(b: bool) -> Self {
    Self::Boolean(b)
  }
}

impl<E> From<Point> for Value<E> {
  fn from(p: Point) -> Self {
    Self::Point(p)
  }
}

impl<E> From<Size> for Value<E> {
  fn from(s: Size) -> Self {
    Self::Size(s)
  }
}

impl<E> From<Rect> for Value<E> {
  fn from(r: Rect) -> Self {
    Self::Rect(r)
  }
}

impl<E> From<Range> for Value<E> {
  fn from(r: Range) -> Self {
    Self::Range(r)
  }
}

impl<E> From<Vec<Value<E>>> for Value<E> {
  fn from(items: Vec<Value<E>>) -> Self {
    Self::Array(items)
  }
}

/// Checked cast from a decoded [`Value`].
///
/// A mismatch is a defect in the caller (asking for the wrong type), so it
/// is reported as `AxError::TypeMismatch` and logged at error level rather
/// than collapsed into "no value".
pub trait FromValue<E>: Sized {
  fn from_value(value: Value<E>) -> AxResult<Self>;
}

pub(crate) fn mismatch<T, E>(expected: ValueType, got: &Value<E>) -> AxResult<T> {
  let got = got.value_type();
  log::error!("Type mismatch decoding attribute: expected {expected:?}, got {got:?}");
  Err(AxError::TypeMismatch { expected, got })
}

impl<E> FromValue<E> for Value<E> {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    Ok(value)
  }
}

impl<E> FromValue<E> for bool {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value {
      Value::Boolean(b) => Ok(b),
      other => mismatch(ValueType::Boolean, &other),
    }
  }
}

impl<E> FromValue<E> for f64 {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value {
      Value::Number(n) => Ok(n),
      other => mismatch(ValueType::Number, &other),
    }
  }
}

impl<E> FromValue<E> for i64 {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value.as_i64() {
      Some(n) => Ok(n),
      None => mismatch(ValueType::Number, &value),
    }
  }
}

impl<E> FromValue<E> for usize {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value.as_i64().and_then(|n| usize::try_from(n).ok()) {
      Some(n) => Ok(n),
      None => mismatch(ValueType::Number, &value),
    }
  }
}

impl<E> FromValue<E> for String {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value {
      Value::String(s) => Ok(s),
      other => mismatch(ValueType::String, &other),
    }
  }
}

impl<E> FromValue<E> for Point {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value {
      Value::Point(p) => Ok(p),
      other => mismatch(ValueType::Point, &other),
    }
  }
}

impl<E> FromValue<E> for Size {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value {
      Value::Size(s) => Ok(s),
      other => mismatch(ValueType::Size, &other),
    }
  }
}

impl<E> FromValue<E> for Rect {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value {
      Value::Rect(r) => Ok(r),
      other => mismatch(ValueType::Rect, &other),
    }
  }
}

impl<E> FromValue<E> for Range {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value {
      Value::Range(r) => Ok(r),
      other => mismatch(ValueType::Range, &other),
    }
  }
}

impl<E> FromValue<E> for ErrorCode {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value {
      Value::Error(code) => Ok(code),
      other => mismatch(ValueType::Error, &other),
    }
  }
}

impl<E, T: FromValue<E>> FromValue<E> for Vec<T> {
  fn from_value(value: Value<E>) -> AxResult<Self> {
    match value {
      Value::Array(items) => items.into_iter().map(T::from_value).collect(),
      other => mismatch(ValueType::Array, &other),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  type V = Value<u32>;

  #[test]
  fn string_accessors() {
    let v = V::from("hello");
    assert_eq!(v.as_str(), Some("hello"));
    assert_eq!(v.as_f64(), None);
    assert_eq!(v.value_type(), ValueType::String);
  }

  #[test]
  fn integers_must_be_whole() {
    assert_eq!(V::Number(42.0).as_i64(), Some(42));
    assert_eq!(V::Number(-5.0).as_i64(), Some(-5));
    assert_eq!(V::Number(3.5).as_i64(), None);
    assert_eq!(V::Number(f64::NAN).as_i64(), None);
    assert_eq!(V::Number(f64::INFINITY).as_i64(), None);
  }

  #[test]
  fn integers_out_of_range_are_rejected() {
    assert_eq!(V::Number(9_223_372_036_854_775_808.0).as_i64(), None);
    assert_eq!(V::Number(-9_223_372_036_854_775_808.0).as_i64(), Some(i64::MIN));
    assert!(i64::from_value(V::Number(1e19)).is_err());
  }

  #[test]
  fn checked_cast_succeeds_on_matching_type() {
    assert_eq!(String::from_value(V::from("x")).unwrap(), "x");
    assert!(bool::from_value(V::from(true)).unwrap());
    assert_eq!(i64::from_value(V::from(7i64)).unwrap(), 7);
    assert_eq!(usize::from_value(V::from(7i32)).unwrap(), 7);
    assert_eq!(Point::from_value(V::from(Point::new(1.0, 2.0))).unwrap(), Point::new(1.0, 2.0));
  }

  #[test]
  fn checked_cast_reports_mismatch() {
    let err = String::from_value(V::Number(1.0)).unwrap_err();
    assert_eq!(
      err,
      AxError::TypeMismatch {
        expected: ValueType::String,
        got: ValueType::Number,
      }
    );
    assert!(err.is_defect());
  }

  #[test]
  fn numbers_are_not_coerced_to_bools() {
    assert!(bool::from_value(V::Number(1.0)).is_err());
  }

  #[test]
  fn negative_number_is_not_a_usize() {
    assert!(usize::from_value(V::Number(-1.0)).is_err());
  }

  #[test]
  fn vec_cast_checks_every_item() {
    let ok = V::Array(vec![V::from("a"), V::from("b")]);
    assert_eq!(Vec::<String>::from_value(ok).unwrap(), vec!["a", "b"]);

    let mixed = V::Array(vec![V::from("a"), V::Number(1.0)]);
    assert!(Vec::<String>::from_value(mixed).is_err());

    let not_array = V::from("a");
    assert_eq!(
      Vec::<String>::from_value(not_array).unwrap_err(),
      AxError::TypeMismatch {
        expected: ValueType::Array,
        got: ValueType::String,
      }
    );
  }

  #[test]
  fn map_elements_preserves_shape() {
    let v = V::Array(vec![V::Element(1), V::from("x"), V::Element(2)]);
    let mapped = v.map_elements(&|id| format!("el{id}"));
    assert_eq!(
      mapped,
      Value::Array(vec![
        Value::Element("el1".to_string()),
        Value::from("x"),
        Value::Element("el2".to_string()),
      ])
    );
  }

  #[test]
  fn to_json_renders_elements_with_display() {
    let v = V::Array(vec![V::Element(3), V::from(Range::new(1, 2)), V::Error(ErrorCode::NoValue)]);
    assert_eq!(
      v.to_json(),
      serde_json::json!(["3", { "location": 1, "length": 2 }, { "error": "noValue" }])
    );
  }
}

#[cfg(test)]
mod proptests {
  use super::*;
  use proptest::prelude::*;

  type V = Value<u32>;

  proptest! {
    /// String values roundtrip through the checked cast
    #[test]
    fn string_roundtrip(s in ".*") {
      prop_assert_eq!(String::from_value(V::from(s.clone())).unwrap(), s);
    }

    /// Whole numbers in the exact f64 range roundtrip as integers
    #[test]
    fn i32_roundtrip(n in any::<i32>()) {
      prop_assert_eq!(i64::from_value(V::from(n)).unwrap(), i64::from(n));
    }

    /// Strings are never accepted as any other type
    #[test]
    fn string_type_exclusivity(s in ".*") {
      prop_assert!(bool::from_value(V::from(s.clone())).is_err());
      prop_assert!(f64::from_value(V::from(s.clone())).is_err());
      prop_assert!(Point::from_value(V::from(s)).is_err());
    }
  }
}
