/*! Notification events published to subscribers. */

use super::{Notification, ProcessId};
use serde::Serialize;
use ts_rs::TS;

/// Owned record of one dispatched notification.
///
/// Callbacks get live elements; subscribers get this, which can cross
/// threads and be serialized.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct NotificationEvent {
  /// Process the observer watches.
  pub pid: ProcessId,
  pub notification: Notification,
  /// Debug rendering of the element handle that fired.
  pub element: String,
  /// Side-channel payload, if any.
  #[ts(type = "unknown")]
  pub info: Option<serde_json::Value>,
}
