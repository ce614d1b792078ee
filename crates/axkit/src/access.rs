/*!
Entry point.

[`Accessibility`] binds a [`Backend`] and the process-wide messaging
timeout. Every element and observer created from it shares the same
backend through an `Arc`, so clones are cheap and can move across threads.

```ignore
let ax = Accessibility::connect(MacBackend::new(), true)?;
let app = ax.application(ProcessId(pid));
for window in app.windows()? {
  println!("{window}");
}
```
*/

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::element::UIElement;
use crate::messaging::{self, Failure};
use crate::observer::{Callback, NotificationInfo, Observer, ObserverConfig};
use crate::platform::Backend;
use crate::runloop::{EventSource, RunLoop};
use crate::types::{AxError, AxResult, ErrorCode, Notification, ProcessId};

/// State shared by an [`Accessibility`] and everything created from it.
pub(crate) struct Shared<B: Backend> {
  pub(crate) backend: B,
  global_timeout: AtomicU32,
}

impl<B: Backend> Shared<B> {
  pub(crate) fn global_timeout(&self) -> f32 {
    f32::from_bits(self.global_timeout.load(Ordering::Acquire))
  }
}

impl<B: Backend> EventSource for Shared<B> {
  fn pump(&self, wait: Duration) {
    self.backend.pump(wait);
  }
}

/// Apply a timeout through the backend. Only `InvalidElement` is tolerated:
/// it only matters once a message is actually sent.
pub(crate) fn configure_timeout<B: Backend>(
  backend: &B,
  handle: &B::Handle,
  seconds: f32,
) -> AxResult<()> {
  match backend.set_messaging_timeout(handle, seconds) {
    Ok(()) | Err(ErrorCode::InvalidElement) => Ok(()),
    Err(code) => {
      log::error!("Unexpected error setting messaging timeout to {seconds}s: {code:?}");
      Err(AxError::from(Failure::immediate(code)))
    }
  }
}

/// Handle to an accessibility service.
pub struct Accessibility<B: Backend> {
  shared: Arc<Shared<B>>,
}

impl<B: Backend> Clone for Accessibility<B> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<B: Backend + fmt::Debug> fmt::Debug for Accessibility<B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Accessibility")
      .field("backend", &self.shared.backend)
      .field("global_messaging_timeout", &self.shared.global_timeout())
      .finish()
  }
}

impl<B: Backend> Accessibility<B> {
  /// Wrap a backend without checking permission. Calls made without
  /// permission fail with `ApiDisabled`.
  pub fn new(backend: B) -> Self {
    Self {
      shared: Arc::new(Shared {
        backend,
        global_timeout: AtomicU32::new(0f32.to_bits()),
      }),
    }
  }

  /// Wrap a backend, failing with `ApiDisabled` unless this process is
  /// trusted. With `prompt`, the user is asked to grant permission; the
  /// prompt does not change the result of this call.
  pub fn connect(backend: B, prompt: bool) -> AxResult<Self> {
    let ax = Self::new(backend);
    if ax.is_process_trusted(prompt) {
      Ok(ax)
    } else {
      log::warn!("Accessibility permission not granted");
      Err(AxError::ApiDisabled)
    }
  }

  pub fn is_process_trusted(&self, prompt: bool) -> bool {
    self.shared.backend.is_process_trusted(prompt)
  }

  pub fn backend(&self) -> &B {
    &self.shared.backend
  }

  /// The system-wide element.
  pub fn system_wide(&self) -> UIElement<B> {
    self.wrap(self.shared.backend.system_wide())
  }

  /// Root element of the application with the given pid. Never fails; an
  /// unknown pid shows up on the first call.
  pub fn application(&self, pid: ProcessId) -> UIElement<B> {
    self.wrap(self.shared.backend.application(pid))
  }

  /// Wrap a raw backend handle.
  pub fn wrap(&self, handle: B::Handle) -> UIElement<B> {
    UIElement::new(Arc::clone(&self.shared), handle)
  }

  /// Process-wide messaging timeout in seconds. `0` means the platform
  /// default.
  pub fn global_messaging_timeout(&self) -> f32 {
    self.shared.global_timeout()
  }

  /// Set the process-wide messaging timeout. Negative values are clamped
  /// to `0`. Applies to every element whose own timeout is `0`.
  pub fn set_global_messaging_timeout(&self, seconds: f32) -> AxResult<()> {
    let seconds = messaging::clamp_seconds(seconds);
    let system_wide = self.shared.backend.system_wide();
    configure_timeout(&self.shared.backend, &system_wide, seconds)?;
    self
      .shared
      .global_timeout
      .store(seconds.to_bits(), Ordering::Release);
    Ok(())
  }

  /// Create an observer for `pid` attached to `run_loop`. `callback` is
  /// used by [`Observer::add_notification`].
  pub fn create_observer(
    &self,
    pid: ProcessId,
    run_loop: &RunLoop,
    callback: impl Fn(&Observer<B>, &UIElement<B>, &Notification, Option<&NotificationInfo<B>>)
      + Send
      + Sync
      + 'static,
  ) -> AxResult<Observer<B>> {
    self.create_observer_with_config(pid, run_loop, ObserverConfig::default(), callback)
  }

  pub fn create_observer_with_config(
    &self,
    pid: ProcessId,
    run_loop: &RunLoop,
    config: ObserverConfig,
    callback: impl Fn(&Observer<B>, &UIElement<B>, &Notification, Option<&NotificationInfo<B>>)
      + Send
      + Sync
      + 'static,
  ) -> AxResult<Observer<B>> {
    let callback: Callback<B> = Arc::new(callback);
    let observer = Observer::create(Arc::clone(&self.shared), pid, run_loop, config, callback)?;
    run_loop.attach(Arc::clone(&self.shared) as Arc<dyn EventSource>);
    Ok(observer)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::sim::SimBackend;

  #[test]
  fn connect_requires_trust() {
    let sim = SimBackend::new();
    sim.set_trusted(false);
    let err = Accessibility::connect(sim, true).unwrap_err();
    assert_eq!(err, AxError::ApiDisabled);
  }

  #[test]
  fn connect_prompts_when_asked() {
    let ax = Accessibility::connect(SimBackend::new(), true).unwrap();
    assert_eq!(ax.backend().prompt_count(), 1);
  }

  #[test]
  fn global_timeout_is_clamped_and_applied() {
    let ax = Accessibility::new(SimBackend::new());
    ax.set_global_messaging_timeout(-2.0).unwrap();
    assert_eq!(ax.global_messaging_timeout(), 0.0);

    ax.set_global_messaging_timeout(1.5).unwrap();
    assert_eq!(ax.global_messaging_timeout(), 1.5);
    assert_eq!(ax.backend().global_messaging_timeout(), 1.5);
  }

  #[test]
  fn global_timeout_configuration_error_is_reported() {
    let ax = Accessibility::new(SimBackend::new());
    ax.backend().fail_messaging_timeout(Some(ErrorCode::Failure));
    assert_eq!(
      ax.set_global_messaging_timeout(1.0).unwrap_err(),
      AxError::Failure {
        code: ErrorCode::Failure
      }
    );
    assert_eq!(ax.global_messaging_timeout(), 0.0);
  }

  #[test]
  fn unknown_application_fails_lazily() {
    let ax = Accessibility::new(SimBackend::new());
    let app = ax.application(ProcessId(999));
    assert_eq!(app.pid().unwrap_err(), AxError::InvalidElement);
  }
}
