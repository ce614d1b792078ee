/*!
Accessibility vocabulary: decoded values and well-known names.
*/

mod names;
mod value;

pub(crate) use value::mismatch;
pub use value::{FromValue, Value, ValueType};
