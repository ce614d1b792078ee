/*! Opaque platform handles.

Element identity follows the service: two handles obtained separately for
the same remote element are `CFEqual` and hash alike.
*/

#![allow(unsafe_code)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use objc2_application_services::{AXObserver, AXUIElement};
use objc2_core_foundation::{CFHash, CFRetained, CFRunLoopSource};
use std::ffi::c_void;
use std::fmt;
use std::hash::{Hash, Hasher};

// FFI binding for CFEqual (not exposed by objc2-core-foundation)
extern "C" {
  fn CFEqual(cf1: *const c_void, cf2: *const c_void) -> u8;
}

/// Retained `AXUIElementRef`. Clone is cheap (reference counted).
#[derive(Clone)]
pub struct MacHandle {
  inner: CFRetained<AXUIElement>,
  /// `CFHash`, computed once.
  cached_hash: u64,
}

impl MacHandle {
  pub(super) fn new(element: CFRetained<AXUIElement>) -> Self {
    let cached_hash = CFHash(Some(&*element)) as u64;
    Self {
      inner: element,
      cached_hash,
    }
  }

  pub(super) fn inner(&self) -> &AXUIElement {
    &self.inner
  }

  pub(super) fn retained(&self) -> CFRetained<AXUIElement> {
    self.inner.clone()
  }
}

impl Hash for MacHandle {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.cached_hash.hash(state);
  }
}

impl PartialEq for MacHandle {
  fn eq(&self, other: &Self) -> bool {
    if self.cached_hash != other.cached_hash {
      return false;
    }
    // as_ptr() is the CF object, not the wrapper.
    let a = CFRetained::as_ptr(&self.inner).as_ptr().cast::<c_void>();
    let b = CFRetained::as_ptr(&other.inner).as_ptr().cast::<c_void>();
    unsafe { CFEqual(a, b) != 0 }
  }
}

impl Eq for MacHandle {}

impl fmt::Debug for MacHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "AXUIElement({:#x})", self.cached_hash)
  }
}

// AXUIElementRef is an immutable, thread-safe remote reference.
unsafe impl Send for MacHandle {}
unsafe impl Sync for MacHandle {}

/// Retained `AXObserverRef` plus the bookkeeping that routes its
/// callbacks. Unregisters its context and invalidates its run-loop source
/// when dropped.
pub struct MacObserver {
  raw: CFRetained<AXObserver>,
  source: CFRetained<CFRunLoopSource>,
  pub(super) context: u64,
}

impl MacObserver {
  pub(super) const fn new(
    raw: CFRetained<AXObserver>,
    source: CFRetained<CFRunLoopSource>,
    context: u64,
  ) -> Self {
    Self {
      raw,
      source,
      context,
    }
  }

  pub(super) fn inner(&self) -> &AXObserver {
    &self.raw
  }
}

impl Drop for MacObserver {
  fn drop(&mut self) {
    super::observer::unregister_context(self.context);
    self.source.invalidate();
  }
}

impl fmt::Debug for MacObserver {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MacObserver")
      .field("context", &self.context)
      .finish_non_exhaustive()
  }
}

unsafe impl Send for MacObserver {}
unsafe impl Sync for MacObserver {}

/// Run-loop source that can be kept in the context registry.
pub(super) struct SourceHandle(pub(super) CFRetained<CFRunLoopSource>);

unsafe impl Send for SourceHandle {}
unsafe impl Sync for SourceHandle {}
