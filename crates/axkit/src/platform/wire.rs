/*!
Wire-level values exchanged with the accessibility service.

`WireValue` mirrors what the service actually hands back: loosely typed
scalars, element handles, and packed structs (`AXValue` on macOS) that
carry a sub-tag plus a byte payload laid out like the native struct.
Only the backend produces these; host code builds them only when encoding
a write. See `crate::codec` for conversion to and from [`crate::a11y::Value`].
*/

#![allow(missing_docs)]

use std::collections::BTreeMap;

/// Sub-tag of a packed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackedKind {
  /// Two `f64`: x, y.
  Point,
  /// Two `f64`: width, height.
  Size,
  /// Four `f64`: x, y, width, height.
  Rect,
  /// Two `i64`: location, length.
  Range,
  /// One `i32`: a native status code.
  Error,
  /// The service could not describe the payload.
  Illegal,
}

impl PackedKind {
  /// Payload length in bytes, if fixed.
  pub const fn payload_len(self) -> Option<usize> {
    match self {
      Self::Point | Self::Size | Self::Range => Some(16),
      Self::Rect => Some(32),
      Self::Error => Some(4),
      Self::Illegal => None,
    }
  }
}

/// A tagged struct with a native-endian byte payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackedValue {
  kind: PackedKind,
  bytes: Vec<u8>,
}

impl PackedValue {
  pub fn new(kind: PackedKind, bytes: Vec<u8>) -> Self {
    Self { kind, bytes }
  }

  pub const fn kind(&self) -> PackedKind {
    self.kind
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }
}

/// Untyped value as produced by the accessibility service.
///
/// `H` is the backend's element handle type.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue<H> {
  Null,
  Boolean(bool),
  Number(f64),
  String(String),
  Element(H),
  Packed(PackedValue),
  Array(Vec<WireValue<H>>),
  Dictionary(BTreeMap<String, WireValue<H>>),
  /// A foreign object the client has no model for, by type name.
  Opaque(String),
}

impl<H> WireValue<H> {
  /// True for the explicit null placeholder (used in batch results).
  pub const fn is_null(&self) -> bool {
    matches!(self, Self::Null)
  }
}
