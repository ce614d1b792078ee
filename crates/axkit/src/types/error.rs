/*! Error types for accessibility operations.

Two layers:
- [`ErrorCode`] is the raw status reported by the accessibility service,
  with the service's numeric codes. It can also travel *inside* values
  (batch fetches report per-item status as packed error values).
- [`AxError`] is the closed taxonomy surfaced to callers.
*/

use serde::{Deserialize, Serialize};
use std::time::Duration;
use ts_rs::TS;

use crate::a11y::ValueType;

/// Raw status reported by the accessibility service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ErrorCode {
  Success,
  Failure,
  IllegalArgument,
  InvalidElement,
  InvalidObserver,
  CannotComplete,
  AttributeUnsupported,
  ActionUnsupported,
  NotificationUnsupported,
  NotImplemented,
  NotificationAlreadyRegistered,
  NotificationNotRegistered,
  ApiDisabled,
  NoValue,
  ParameterizedAttributeUnsupported,
  NotEnoughPrecision,
}

impl ErrorCode {
  const ALL: [Self; 16] = [
    Self::Success,
    Self::Failure,
    Self::IllegalArgument,
    Self::InvalidElement,
    Self::InvalidObserver,
    Self::CannotComplete,
    Self::AttributeUnsupported,
    Self::ActionUnsupported,
    Self::NotificationUnsupported,
    Self::NotImplemented,
    Self::NotificationAlreadyRegistered,
    Self::NotificationNotRegistered,
    Self::ApiDisabled,
    Self::NoValue,
    Self::ParameterizedAttributeUnsupported,
    Self::NotEnoughPrecision,
  ];

  /// Native numeric code (`kAXError*`).
  pub const fn code(self) -> i32 {
    match self {
      Self::Success => 0,
      Self::Failure => -25200,
      Self::IllegalArgument => -25201,
      Self::InvalidElement => -25202,
      Self::InvalidObserver => -25203,
      Self::CannotComplete => -25204,
      Self::AttributeUnsupported => -25205,
      Self::ActionUnsupported => -25206,
      Self::NotificationUnsupported => -25207,
      Self::NotImplemented => -25208,
      Self::NotificationAlreadyRegistered => -25209,
      Self::NotificationNotRegistered => -25210,
      Self::ApiDisabled => -25211,
      Self::NoValue => -25212,
      Self::ParameterizedAttributeUnsupported => -25213,
      Self::NotEnoughPrecision => -25214,
    }
  }

  /// Map a native numeric code. Unknown codes are reported as `Failure`.
  pub fn from_code(code: i32) -> Self {
    Self::ALL
      .into_iter()
      .find(|c| c.code() == code)
      .unwrap_or(Self::Failure)
  }

  /// "Nothing there" statuses that reads fold into absence.
  pub const fn is_benign(self) -> bool {
    matches!(self, Self::NoValue | Self::AttributeUnsupported)
  }
}

/// Errors surfaced by accessibility operations.
///
/// Reads fold `AttributeUnsupported` and "no value" into absence; every
/// other operation propagates failures uncaught. Nothing is retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AxError {
  /// The process is not trusted to use the accessibility API. Persists
  /// until the user grants permission.
  #[error("Accessibility API disabled: permission not granted")]
  ApiDisabled,

  /// The element no longer exists. Drop the handle.
  #[error("Invalid element: the remote object is gone")]
  InvalidElement,

  /// Messaging failed or the target is unresponsive.
  #[error("Cannot complete: messaging failed or target unresponsive")]
  CannotComplete,

  /// The messaging timeout elapsed. A sub-case of `CannotComplete`: the
  /// outcome is unknown, the remote side may still perform the operation.
  #[error("Timed out after {after:?} (outcome unknown)")]
  Timeout { after: Duration },

  /// The target does not support the accessibility API.
  #[error("Target does not implement the accessibility API")]
  NotImplemented,

  #[error("Attribute unsupported")]
  AttributeUnsupported,

  #[error("Action unsupported")]
  ActionUnsupported,

  #[error("Notification unsupported")]
  NotificationUnsupported,

  /// Wrong parameter shape. A defect in the caller, not a remote condition.
  #[error("Illegal argument")]
  IllegalArgument,

  /// A value did not have the type the caller asked for. A defect in the
  /// caller, not a remote condition.
  #[error("Type mismatch: expected {expected:?}, got {got:?}")]
  TypeMismatch { expected: ValueType, got: ValueType },

  /// Any other status reported by the service.
  #[error("Accessibility call failed: {code:?}")]
  Failure { code: ErrorCode },
}

impl AxError {
  /// True for `CannotComplete` and its `Timeout` sub-case.
  pub const fn is_cannot_complete(&self) -> bool {
    matches!(self, Self::CannotComplete | Self::Timeout { .. })
  }

  /// True for programmer-error classes that retrying cannot fix.
  pub const fn is_defect(&self) -> bool {
    matches!(self, Self::IllegalArgument | Self::TypeMismatch { .. })
  }
}

impl From<ErrorCode> for AxError {
  fn from(code: ErrorCode) -> Self {
    match code {
      ErrorCode::ApiDisabled => Self::ApiDisabled,
      ErrorCode::InvalidElement => Self::InvalidElement,
      ErrorCode::CannotComplete => Self::CannotComplete,
      ErrorCode::NotImplemented => Self::NotImplemented,
      ErrorCode::AttributeUnsupported | ErrorCode::ParameterizedAttributeUnsupported => {
        Self::AttributeUnsupported
      }
      ErrorCode::ActionUnsupported => Self::ActionUnsupported,
      ErrorCode::NotificationUnsupported => Self::NotificationUnsupported,
      ErrorCode::IllegalArgument => Self::IllegalArgument,
      ErrorCode::Success
      | ErrorCode::Failure
      | ErrorCode::InvalidObserver
      | ErrorCode::NotificationAlreadyRegistered
      | ErrorCode::NotificationNotRegistered
      | ErrorCode::NoValue
      | ErrorCode::NotEnoughPrecision => Self::Failure { code },
    }
  }
}

/// Result type for accessibility operations.
pub type AxResult<T> = Result<T, AxError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn numeric_codes_roundtrip() {
    for code in ErrorCode::ALL {
      assert_eq!(ErrorCode::from_code(code.code()), code);
    }
  }

  #[test]
  fn unknown_numeric_code_is_failure() {
    assert_eq!(ErrorCode::from_code(-1), ErrorCode::Failure);
  }

  #[test]
  fn only_no_value_and_unsupported_are_benign() {
    let benign: Vec<_> = ErrorCode::ALL.into_iter().filter(|c| c.is_benign()).collect();
    assert_eq!(benign, vec![ErrorCode::AttributeUnsupported, ErrorCode::NoValue]);
  }

  #[test]
  fn timeout_is_a_cannot_complete() {
    let err = AxError::Timeout {
      after: Duration::from_secs(1),
    };
    assert!(err.is_cannot_complete());
    assert!(AxError::CannotComplete.is_cannot_complete());
    assert!(!AxError::InvalidElement.is_cannot_complete());
  }

  #[test]
  fn action_unsupported_is_distinct_from_cannot_complete() {
    let err = AxError::from(ErrorCode::ActionUnsupported);
    assert_eq!(err, AxError::ActionUnsupported);
    assert!(!err.is_cannot_complete());
  }
}
