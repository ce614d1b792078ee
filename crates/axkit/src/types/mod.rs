/*! Core types for axkit.

Regenerate TypeScript types: `cargo test export_bindings`
*/

#![allow(missing_docs)]

mod error;
mod event;
mod geometry;
mod ids;
mod keys;

pub use error::{AxError, AxResult, ErrorCode};
pub use event::NotificationEvent;
pub use geometry::{Point, Range, Rect, Size};
pub use ids::ProcessId;
pub use keys::{Action, Attribute, Notification, Role, Subrole};
