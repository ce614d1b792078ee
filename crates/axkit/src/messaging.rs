/*!
Messaging timeouts and status mapping.

Every round trip to the service is wrapped in [`timed`], which records how
long the call took. A `CannotComplete` status that arrives at or after the
effective timeout is reported as [`AxError::Timeout`]: the remote side may
still act on the request, so nothing here ever retries.
*/

use std::time::{Duration, Instant};

use crate::platform::RawResult;
use crate::types::{AxError, ErrorCode};

/// Timeout the service applies when neither the element nor the process
/// overrides it.
pub const PLATFORM_DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

/// Clamp a requested timeout: negative and NaN values mean "use default".
pub(crate) fn clamp_seconds(seconds: f32) -> f32 {
  if seconds.is_nan() {
    0.0
  } else {
    seconds.max(0.0)
  }
}

/// Timeout that actually bounds a call on an element.
///
/// `0` at either level defers to the next one out.
pub(crate) fn effective_limit(element: f32, global: f32) -> Duration {
  [element, global]
    .into_iter()
    .find(|s| *s > 0.0)
    .and_then(|s| Duration::try_from_secs_f32(s).ok())
    .unwrap_or(PLATFORM_DEFAULT_TIMEOUT)
}

/// A failed round trip, with enough context to tell a timeout apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Failure {
  pub code: ErrorCode,
  pub elapsed: Duration,
  pub limit: Duration,
}

impl Failure {
  /// An error that did not go through a timed round trip.
  pub const fn immediate(code: ErrorCode) -> Self {
    Self {
      code,
      elapsed: Duration::ZERO,
      limit: PLATFORM_DEFAULT_TIMEOUT,
    }
  }

  pub const fn is_benign(&self) -> bool {
    self.code.is_benign()
  }

  pub fn timed_out(&self) -> bool {
    self.code == ErrorCode::CannotComplete && self.elapsed >= self.limit
  }
}

impl From<Failure> for AxError {
  fn from(failure: Failure) -> Self {
    if failure.timed_out() {
      Self::Timeout {
        after: failure.limit,
      }
    } else {
      Self::from(failure.code)
    }
  }
}

/// Run one backend round trip under `limit`.
pub(crate) fn timed<T>(limit: Duration, call: impl FnOnce() -> RawResult<T>) -> Result<T, Failure> {
  let started = Instant::now();
  call().map_err(|code| {
    let elapsed = started.elapsed();
    log::trace!("AX call failed with {code:?} after {elapsed:?}");
    Failure {
      code,
      elapsed,
      limit,
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn element_timeout_wins_over_global() {
    assert_eq!(effective_limit(0.5, 2.0), Duration::from_millis(500));
  }

  #[test]
  fn zero_defers_outward() {
    assert_eq!(effective_limit(0.0, 2.0), Duration::from_secs(2));
    assert_eq!(effective_limit(0.0, 0.0), PLATFORM_DEFAULT_TIMEOUT);
  }

  #[test]
  fn negative_and_nan_clamp_to_zero() {
    assert_eq!(clamp_seconds(-3.0), 0.0);
    assert_eq!(clamp_seconds(f32::NAN), 0.0);
    assert_eq!(clamp_seconds(1.5), 1.5);
  }

  #[test]
  fn slow_cannot_complete_is_a_timeout() {
    let failure = Failure {
      code: ErrorCode::CannotComplete,
      elapsed: Duration::from_millis(60),
      limit: Duration::from_millis(50),
    };
    let err = AxError::from(failure);
    assert_eq!(
      err,
      AxError::Timeout {
        after: Duration::from_millis(50)
      }
    );
    assert!(err.is_cannot_complete());
  }

  #[test]
  fn fast_cannot_complete_stays_cannot_complete() {
    let failure = Failure {
      code: ErrorCode::CannotComplete,
      elapsed: Duration::from_millis(1),
      limit: Duration::from_millis(50),
    };
    assert_eq!(AxError::from(failure), AxError::CannotComplete);
  }

  #[test]
  fn timed_passes_success_through() {
    assert_eq!(timed(PLATFORM_DEFAULT_TIMEOUT, || Ok::<_, ErrorCode>(3)), Ok(3));
  }

  #[test]
  fn timed_records_the_code() {
    let failure = timed::<()>(PLATFORM_DEFAULT_TIMEOUT, || Err(ErrorCode::InvalidElement))
      .unwrap_err();
    assert_eq!(failure.code, ErrorCode::InvalidElement);
    assert!(!failure.timed_out());
  }
}
