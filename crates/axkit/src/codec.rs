/*!
Conversion between wire values and host values.

Decoding checks element handles first, then packed structs, then scalars;
arrays and dictionaries recurse. Packed payloads are native-endian byte
images of the platform structs (`CGPoint`, `CGSize`, `CGRect`, `CFRange`,
`AXError`), so a payload whose length disagrees with its sub-tag is an
`IllegalArgument`, never a guess.
*/

use crate::a11y::Value;
use crate::platform::{PackedKind, PackedValue, WireValue};
use crate::types::{AxError, AxResult, ErrorCode, Point, Range, Rect, Size};

/// Decode a wire value, wrapping each element handle with `wrap`.
pub(crate) fn decode<H, E>(wire: WireValue<H>, wrap: &impl Fn(H) -> E) -> AxResult<Value<E>> {
  Ok(match wire {
    WireValue::Element(handle) => Value::Element(wrap(handle)),
    WireValue::Packed(packed) => unpack(&packed)?,
    WireValue::Null => Value::Null,
    WireValue::Boolean(b) => Value::Boolean(b),
    WireValue::Number(n) => Value::Number(n),
    WireValue::String(s) => Value::String(s),
    WireValue::Array(items) => Value::Array(
      items
        .into_iter()
        .map(|item| decode(item, wrap))
        .collect::<AxResult<_>>()?,
    ),
    WireValue::Dictionary(map) => Value::Dictionary(
      map
        .into_iter()
        .map(|(key, item)| Ok((key, decode(item, wrap)?)))
        .collect::<AxResult<_>>()?,
    ),
    WireValue::Opaque(name) => Value::Opaque(name),
  })
}

/// Encode a host value for a write, unwrapping elements with `unwrap`.
///
/// Error codes and opaque objects have no writable form.
pub(crate) fn encode<H, E>(value: Value<E>, unwrap: &impl Fn(E) -> H) -> AxResult<WireValue<H>> {
  Ok(match value {
    Value::Element(element) => WireValue::Element(unwrap(element)),
    Value::Point(p) => WireValue::Packed(pack_point(p)),
    Value::Size(s) => WireValue::Packed(pack_size(s)),
    Value::Rect(r) => WireValue::Packed(pack_rect(r)),
    Value::Range(r) => WireValue::Packed(pack_range(r)),
    Value::Null => WireValue::Null,
    Value::Boolean(b) => WireValue::Boolean(b),
    Value::Number(n) => WireValue::Number(n),
    Value::String(s) => WireValue::String(s),
    Value::Array(items) => WireValue::Array(
      items
        .into_iter()
        .map(|item| encode(item, unwrap))
        .collect::<AxResult<_>>()?,
    ),
    Value::Dictionary(map) => WireValue::Dictionary(
      map
        .into_iter()
        .map(|(key, item)| Ok((key, encode(item, unwrap)?)))
        .collect::<AxResult<_>>()?,
    ),
    Value::Error(code) => {
      log::error!("Cannot encode an embedded error value ({code:?})");
      return Err(AxError::IllegalArgument);
    }
    Value::Opaque(name) => {
      log::error!("Cannot encode opaque value of type {name}");
      return Err(AxError::IllegalArgument);
    }
  })
}

// ============================================================================
// Packed payloads
// ============================================================================

fn unpack<E>(packed: &PackedValue) -> AxResult<Value<E>> {
  let kind = packed.kind();
  let bytes = packed.bytes();
  if let Some(expected) = kind.payload_len() {
    if bytes.len() != expected {
      log::error!(
        "Packed {kind:?} payload is {} bytes, expected {expected}",
        bytes.len()
      );
      return Err(AxError::IllegalArgument);
    }
  }

  Ok(match kind {
    PackedKind::Point => Value::Point(Point::new(f64_at(bytes, 0), f64_at(bytes, 1))),
    PackedKind::Size => Value::Size(Size::new(f64_at(bytes, 0), f64_at(bytes, 1))),
    PackedKind::Rect => Value::Rect(Rect::new(
      f64_at(bytes, 0),
      f64_at(bytes, 1),
      f64_at(bytes, 2),
      f64_at(bytes, 3),
    )),
    PackedKind::Range => Value::Range(Range::new(i64_at(bytes, 0), i64_at(bytes, 1))),
    PackedKind::Error => Value::Error(ErrorCode::from_code(i32_at(bytes))),
    PackedKind::Illegal => Value::Opaque("AXValue".to_owned()),
  })
}

/// Word `index` of a length-checked payload.
fn word(bytes: &[u8], index: usize) -> [u8; 8] {
  let mut out = [0u8; 8];
  if let Some(src) = bytes.get(index * 8..index * 8 + 8) {
    out.copy_from_slice(src);
  }
  out
}

fn f64_at(bytes: &[u8], index: usize) -> f64 {
  f64::from_ne_bytes(word(bytes, index))
}

fn i64_at(bytes: &[u8], index: usize) -> i64 {
  i64::from_ne_bytes(word(bytes, index))
}

fn i32_at(bytes: &[u8]) -> i32 {
  let mut out = [0u8; 4];
  if let Some(src) = bytes.get(..4) {
    out.copy_from_slice(src);
  }
  i32::from_ne_bytes(out)
}

fn packed_f64s(kind: PackedKind, words: &[f64]) -> PackedValue {
  PackedValue::new(kind, words.iter().flat_map(|w| w.to_ne_bytes()).collect())
}

pub(crate) fn pack_point(p: Point) -> PackedValue {
  packed_f64s(PackedKind::Point, &[p.x, p.y])
}

pub(crate) fn pack_size(s: Size) -> PackedValue {
  packed_f64s(PackedKind::Size, &[s.width, s.height])
}

pub(crate) fn pack_rect(r: Rect) -> PackedValue {
  packed_f64s(
    PackedKind::Rect,
    &[r.origin.x, r.origin.y, r.size.width, r.size.height],
  )
}

pub(crate) fn pack_range(r: Range) -> PackedValue {
  let bytes = [r.location, r.length]
    .iter()
    .flat_map(|w| w.to_ne_bytes())
    .collect();
  PackedValue::new(PackedKind::Range, bytes)
}

pub(crate) fn pack_error(code: ErrorCode) -> PackedValue {
  PackedValue::new(PackedKind::Error, code.code().to_ne_bytes().to_vec())
}


#[cfg(test)]
mod proptests {
  use super::*;
  use proptest::prelude::*;

  fn roundtrip(value: Value<u64>) -> Value<u64> {
    let wire = encode(value, &|e| e).unwrap();
    decode(wire, &|h| h).unwrap()
  }

  fn finite() -> impl Strategy<Value = f64> {
    -1.0e9..1.0e9f64
  }

  proptest! {
    #[test]
    fn point_roundtrip(x in finite(), y in finite()) {
      let v = Value::Point(Point::new(x, y));
      prop_assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn size_roundtrip(w in finite(), h in finite()) {
      let v = Value::Size(Size::new(w, h));
      prop_assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn rect_roundtrip(x in finite(), y in finite(), w in finite(), h in finite()) {
      let v = Value::Rect(Rect::new(x, y, w, h));
      prop_assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn range_roundtrip(location in any::<i64>(), length in any::<i64>()) {
      let v = Value::Range(Range::new(location, length));
      prop_assert_eq!(roundtrip(v.clone()), v);
    }
  }
}
