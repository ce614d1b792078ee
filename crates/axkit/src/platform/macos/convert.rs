/*!
Core Foundation values to and from `WireValue`.

`AXValue` structs are read into their native types and repacked through
the codec helpers, so the byte layout matches what the sim backend
produces.
*/

#![allow(unsafe_code)]
#![allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]

use objc2_application_services::{AXError, AXUIElement, AXValue as AXValueRef, AXValueType};
use objc2_core_foundation::{
  kCFNull, CFArray, CFBoolean, CFCopyTypeIDDescription, CFDictionary, CFGetTypeID, CFIndex,
  CFNumber, CFRange, CFRetained, CFString, CFType, CGPoint, CGRect, CGSize, Type,
};
use std::collections::BTreeMap;
use std::ffi::c_void;
use std::ptr::NonNull;

use super::handles::MacHandle;
use crate::codec::{pack_error, pack_point, pack_range, pack_rect, pack_size};
use crate::platform::{PackedKind, PackedValue, RawResult, WireValue};
use crate::types::{ErrorCode, Point, Range, Rect, Size};

type Wire = WireValue<MacHandle>;

/// Map an `AXError` to a raw result.
pub(super) fn check(status: AXError) -> RawResult<()> {
  if status == AXError::Success {
    Ok(())
  } else {
    Err(ErrorCode::from_code(status.0))
  }
}

/// Forget the concrete type. Every CF object is a `CFType`.
pub(super) fn erase<T: Type>(value: CFRetained<T>) -> CFRetained<CFType> {
  unsafe { CFRetained::cast_unchecked(value) }
}

fn is_null(value: &CFType) -> bool {
  let Some(null) = (unsafe { kCFNull }) else {
    return false;
  };
  let null_ptr: *const CFType = (null as *const objc2_core_foundation::CFNull).cast();
  std::ptr::eq(value as *const CFType, null_ptr)
}

pub(super) fn to_wire(value: &CFType) -> Wire {
  if is_null(value) {
    return Wire::Null;
  }
  if let Some(b) = value.downcast_ref::<CFBoolean>() {
    return Wire::Boolean(b.as_bool());
  }
  if let Some(n) = value.downcast_ref::<CFNumber>() {
    return n.as_f64().map_or(Wire::Null, Wire::Number);
  }
  if let Some(s) = value.downcast_ref::<CFString>() {
    return Wire::String(s.to_string());
  }
  if let Some(e) = value.downcast_ref::<AXUIElement>() {
    let retained = unsafe { CFRetained::retain(NonNull::from(e)) };
    return Wire::Element(MacHandle::new(retained));
  }
  if let Some(v) = value.downcast_ref::<AXValueRef>() {
    return Wire::Packed(unpack(v));
  }
  if let Some(array) = value.downcast_ref::<CFArray>() {
    return Wire::Array(array_items(array).iter().map(|item| to_wire(item)).collect());
  }
  if let Some(dict) = value.downcast_ref::<CFDictionary>() {
    return Wire::Dictionary(dictionary_to_wire(dict));
  }
  Wire::Opaque(type_name(value))
}

fn type_name(value: &CFType) -> String {
  let id = CFGetTypeID(Some(value));
  CFCopyTypeIDDescription(id).map_or_else(|| format!("CFType#{id}"), |s| s.to_string())
}

/// Copy out the items of an untyped array.
pub(super) fn array_items(array: &CFArray) -> Vec<CFRetained<CFType>> {
  let typed: &CFArray<CFType> = unsafe { array.cast_unchecked() };
  (0..typed.len()).filter_map(|i| typed.get(i)).collect()
}

/// String-keyed entries of a dictionary. Other keys are skipped.
pub(super) fn dictionary_to_wire(dict: &CFDictionary) -> BTreeMap<String, Wire> {
  let count = usize::try_from(dict.count()).unwrap_or(0);
  let mut keys: Vec<*const c_void> = vec![std::ptr::null(); count];
  let mut values: Vec<*const c_void> = vec![std::ptr::null(); count];
  unsafe { dict.keys_and_values(keys.as_mut_ptr(), values.as_mut_ptr()) };

  let mut map = BTreeMap::new();
  for (key, value) in keys.into_iter().zip(values) {
    if key.is_null() || value.is_null() {
      continue;
    }
    // Borrowed for the lifetime of `dict`.
    let key = unsafe { &*key.cast::<CFType>() };
    let value = unsafe { &*value.cast::<CFType>() };
    let Some(name) = key.downcast_ref::<CFString>() else {
      log::trace!("Skipping non-string dictionary key");
      continue;
    };
    map.insert(name.to_string(), to_wire(value));
  }
  map
}

fn unpack(value: &AXValueRef) -> PackedValue {
  let kind = unsafe { value.r#type() };
  let read = |out: NonNull<c_void>| unsafe { value.value(kind, out) };

  match kind {
    AXValueType::CGPoint => {
      let mut p = CGPoint { x: 0.0, y: 0.0 };
      if read(NonNull::from(&mut p).cast()) {
        return pack_point(Point::new(p.x, p.y));
      }
    }
    AXValueType::CGSize => {
      let mut s = CGSize {
        width: 0.0,
        height: 0.0,
      };
      if read(NonNull::from(&mut s).cast()) {
        return pack_size(Size::new(s.width, s.height));
      }
    }
    AXValueType::CGRect => {
      let mut r = CGRect::default();
      if read(NonNull::from(&mut r).cast()) {
        return pack_rect(Rect::new(r.origin.x, r.origin.y, r.size.width, r.size.height));
      }
    }
    AXValueType::CFRange => {
      let mut r = CFRange {
        location: 0,
        length: 0,
      };
      if read(NonNull::from(&mut r).cast()) {
        return pack_range(Range::new(r.location as i64, r.length as i64));
      }
    }
    AXValueType::AXError => {
      let mut e = AXError(0);
      if read(NonNull::from(&mut e).cast()) {
        return pack_error(ErrorCode::from_code(e.0));
      }
    }
    _ => {}
  }
  PackedValue::new(PackedKind::Illegal, Vec::new())
}

fn ax_value_type(kind: PackedKind) -> Option<AXValueType> {
  match kind {
    PackedKind::Point => Some(AXValueType::CGPoint),
    PackedKind::Size => Some(AXValueType::CGSize),
    PackedKind::Rect => Some(AXValueType::CGRect),
    PackedKind::Range => Some(AXValueType::CFRange),
    PackedKind::Error => Some(AXValueType::AXError),
    PackedKind::Illegal => None,
  }
}

fn pack(packed: &PackedValue) -> RawResult<CFRetained<CFType>> {
  let kind = ax_value_type(packed.kind()).ok_or(ErrorCode::IllegalArgument)?;
  let bytes = packed.bytes();
  if Some(bytes.len()) != packed.kind().payload_len() {
    return Err(ErrorCode::IllegalArgument);
  }
  // Word-aligned copy of the payload; the largest layout is four f64.
  let mut buffer = [0u64; 4];
  for (word, chunk) in buffer.iter_mut().zip(bytes.chunks(8)) {
    let mut raw = [0u8; 8];
    for (dst, src) in raw.iter_mut().zip(chunk) {
      *dst = *src;
    }
    *word = u64::from_ne_bytes(raw);
  }
  let value = unsafe { AXValueRef::new(kind, NonNull::from(&mut buffer).cast()) }
    .ok_or(ErrorCode::Failure)?;
  Ok(erase(value))
}

pub(super) fn from_wire(value: &Wire) -> RawResult<CFRetained<CFType>> {
  Ok(match value {
    Wire::Null => {
      let null = unsafe { kCFNull }.ok_or(ErrorCode::Failure)?;
      erase(unsafe { CFRetained::retain(NonNull::from(null)) })
    }
    Wire::Boolean(b) => {
      let b = CFBoolean::new(*b);
      erase(unsafe { CFRetained::retain(NonNull::from(b)) })
    }
    Wire::Number(n) => erase(CFNumber::new_f64(*n)),
    Wire::String(s) => erase(CFString::from_str(s)),
    Wire::Element(handle) => erase(handle.retained()),
    Wire::Packed(packed) => pack(packed)?,
    Wire::Array(items) => {
      let items = items.iter().map(from_wire).collect::<RawResult<Vec<_>>>()?;
      let refs: Vec<&CFType> = items.iter().map(|i| &**i).collect();
      erase(CFArray::from_objects(&refs))
    }
    Wire::Dictionary(map) => {
      let keys: Vec<_> = map.keys().map(|k| CFString::from_str(k)).collect();
      let values = map.values().map(from_wire).collect::<RawResult<Vec<_>>>()?;
      let key_refs: Vec<&CFString> = keys.iter().map(|k| &**k).collect();
      let value_refs: Vec<&CFType> = values.iter().map(|v| &**v).collect();
      erase(CFDictionary::from_slices(&key_refs, &value_refs))
    }
    Wire::Opaque(_) => return Err(ErrorCode::IllegalArgument),
  })
}

/// Attribute/action names out of a `CFArray<CFString>`.
pub(super) fn string_items(array: &CFArray) -> Vec<String> {
  array_items(array)
    .iter()
    .filter_map(|item| item.downcast_ref::<CFString>().map(ToString::to_string))
    .collect()
}

/// `CFIndex` for a count or offset.
pub(super) fn index(n: usize) -> CFIndex {
  CFIndex::try_from(n).unwrap_or(CFIndex::MAX)
}
