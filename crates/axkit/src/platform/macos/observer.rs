/*!
`AXObserver` plumbing.

macOS hands observer callbacks a raw `refcon` pointer; we cannot pass Rust
closures through it. Each observer instead gets a stable id, registered
here alongside its delivery sink and run-loop source, and the id travels
as the `refcon`. The callback looks the id up, releases the lock, and
forwards the notification to the sink.
*/

#![allow(unsafe_code)]
#![allow(clippy::expect_used)] // NonNull::new on stack pointers - never null

use objc2_application_services::{AXObserver, AXUIElement};
use objc2_core_foundation::{
  kCFRunLoopDefaultMode, CFDictionary, CFRetained, CFRunLoop, CFRunLoopRunResult, CFString,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;
use std::time::Duration;

use super::convert::{check, dictionary_to_wire};
use super::handles::{MacHandle, MacObserver, SourceHandle};
use crate::platform::{Delivery, DeliverySink, RawResult};
use crate::types::{ErrorCode, Notification, ProcessId};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

struct ObserverContext {
  sink: DeliverySink<MacHandle>,
  source: SourceHandle,
}

/// Context id → observer context.
static CONTEXTS: LazyLock<Mutex<HashMap<u64, ObserverContext>>> =
  LazyLock::new(|| Mutex::new(HashMap::new()));

pub(super) fn unregister_context(id: u64) {
  CONTEXTS.lock().remove(&id);
}

fn lookup_sink(refcon: *mut c_void) -> Option<DeliverySink<MacHandle>> {
  let id = refcon as u64;
  CONTEXTS.lock().get(&id).map(|ctx| ctx.sink.clone())
}

/// The `refcon` to pass when registering notifications on `observer`.
pub(super) fn refcon(observer: &MacObserver) -> *mut c_void {
  observer.context as *mut c_void
}

/// Create an `AXObserver` for `pid` whose notifications go to `sink`.
pub(super) fn create(pid: ProcessId, sink: DeliverySink<MacHandle>) -> RawResult<MacObserver> {
  let raw = unsafe {
    let mut observer_ptr: *mut AXObserver = std::ptr::null_mut();
    #[allow(clippy::cast_possible_wrap)] // PIDs are always positive and < i32::MAX
    let status = AXObserver::create_with_info_callback(
      pid.0 as i32,
      Some(observer_callback),
      NonNull::new(&raw mut observer_ptr).expect("stack pointer is never null"),
    );
    check(status)?;
    CFRetained::from_raw(NonNull::new(observer_ptr).ok_or(ErrorCode::Failure)?)
  };

  let source = unsafe { raw.run_loop_source() };
  let context = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
  CONTEXTS.lock().insert(
    context,
    ObserverContext {
      sink,
      source: SourceHandle(source.clone()),
    },
  );

  log::debug!("Created AXObserver for pid {pid} (context {context})");
  Ok(MacObserver::new(raw, source, context))
}

/// Run the current thread's run loop for at most `wait`, after making sure
/// every live observer's source is scheduled on it.
pub(super) fn pump(wait: Duration) {
  let Some(run_loop) = CFRunLoop::current() else {
    std::thread::sleep(wait);
    return;
  };

  let live = {
    let contexts = CONTEXTS.lock();
    for ctx in contexts.values() {
      // No-op if the source is already scheduled here.
      unsafe { run_loop.add_source(Some(&ctx.source.0), kCFRunLoopDefaultMode) };
    }
    contexts.len()
  };

  let result = unsafe { CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, wait.as_secs_f64(), true) };
  // Nothing scheduled: the run loop returns at once, so wait here instead.
  if result == CFRunLoopRunResult::Finished && live == 0 {
    std::thread::sleep(wait);
    return;
  }

  // Each run handles one source message. Drain the rest of the burst so
  // continuations posted by its callbacks run after all of it.
  if result != CFRunLoopRunResult::HandledSource {
    return;
  }
  let mut handled = 1usize;
  while unsafe { CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, 0.0, true) }
    == CFRunLoopRunResult::HandledSource
  {
    handled += 1;
  }
  log::trace!("Pump handled {handled} source messages");
}

unsafe extern "C-unwind" fn observer_callback(
  _observer: NonNull<AXObserver>,
  element: NonNull<AXUIElement>,
  notification: NonNull<CFString>,
  info: NonNull<CFDictionary>,
  refcon: *mut c_void,
) {
  use std::panic::AssertUnwindSafe;

  let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
    // Look up context (releases lock immediately after clone)
    let Some(sink) = lookup_sink(refcon) else {
      return;
    };

    let element = MacHandle::new(CFRetained::retain(element));
    let notification = Notification::from(notification.as_ref().to_string());
    let info = dictionary_to_wire(info.as_ref());

    sink(Delivery {
      element,
      notification,
      info: (!info.is_empty()).then_some(info),
    });
  }));

  if result.is_err() {
    log::warn!("Accessibility notification handler panicked (possibly invalid element)");
  }
}
