/*!
The foreign boundary.

`traits` defines what a service must provide, `wire` the values it speaks.
`macos` is the production service; `sim` is an in-memory stand-in.
*/

mod traits;
mod wire;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use traits::{Backend, Delivery, DeliverySink, RawResult};
pub use wire::{PackedKind, PackedValue, WireValue};
