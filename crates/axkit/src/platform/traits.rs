/*!
Backend abstraction.

`Backend` is the contract between the client and an accessibility service.
Every method is a synchronous round trip that reports the service's raw
status; interpreting statuses (benign absence, timeouts, the error
taxonomy) is the client's job, never the backend's.
*/

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use super::wire::WireValue;
use crate::types::{Action, Attribute, ErrorCode, Notification, Point, ProcessId};

/// Raw outcome of a backend call.
pub type RawResult<T> = Result<T, ErrorCode>;

/// One notification as handed over by the service's event source.
#[derive(Debug, Clone)]
pub struct Delivery<H> {
  /// Element the notification fired on.
  pub element: H,
  /// Notification name.
  pub notification: Notification,
  /// Optional side-channel payload.
  pub info: Option<BTreeMap<String, WireValue<H>>>,
}

/// Where a backend observer hands its deliveries. Called from inside
/// [`Backend::pump`].
pub type DeliverySink<H> = Arc<dyn Fn(Delivery<H>) + Send + Sync>;

/// An accessibility service.
///
/// Element handles compare by the service's notion of identity: two handles
/// obtained separately for the same remote element are equal and hash alike.
pub trait Backend: Send + Sync + 'static {
  /// Opaque reference to a remote element. Clone is cheap.
  type Handle: Clone + Send + Sync + Hash + Eq + fmt::Debug + 'static;
  /// Per-process notification observer.
  type Observer: Send + Sync + 'static;

  /// Check whether this process may use the service, optionally asking the
  /// user. The prompt is asynchronous and does not affect the result.
  fn is_process_trusted(&self, prompt: bool) -> bool;

  /// The system-wide element.
  fn system_wide(&self) -> Self::Handle;

  /// The root element of an application.
  fn application(&self, pid: ProcessId) -> Self::Handle;

  /// Names of all non-parameterized attributes.
  fn attribute_names(&self, element: &Self::Handle) -> RawResult<Vec<Attribute>>;

  /// Value of a single attribute.
  fn attribute_value(
    &self,
    element: &Self::Handle,
    attribute: &Attribute,
  ) -> RawResult<WireValue<Self::Handle>>;

  /// Up to `max` items of an array attribute starting at `start`.
  fn attribute_values(
    &self,
    element: &Self::Handle,
    attribute: &Attribute,
    start: usize,
    max: usize,
  ) -> RawResult<Vec<WireValue<Self::Handle>>>;

  /// Item count of an array attribute.
  fn attribute_value_count(&self, element: &Self::Handle, attribute: &Attribute)
    -> RawResult<usize>;

  /// Whether an attribute accepts writes.
  fn is_attribute_settable(&self, element: &Self::Handle, attribute: &Attribute) -> RawResult<bool>;

  /// Write an attribute.
  fn set_attribute_value(
    &self,
    element: &Self::Handle,
    attribute: &Attribute,
    value: WireValue<Self::Handle>,
  ) -> RawResult<()>;

  /// Fetch several attributes in one round trip. The result has one entry
  /// per requested attribute, in order; failed items are `Null` or a packed
  /// error value.
  fn multiple_attribute_values(
    &self,
    element: &Self::Handle,
    attributes: &[Attribute],
  ) -> RawResult<Vec<WireValue<Self::Handle>>>;

  /// Names of all parameterized attributes.
  fn parameterized_attribute_names(&self, element: &Self::Handle) -> RawResult<Vec<Attribute>>;

  /// Value of a parameterized attribute for `parameter`.
  fn parameterized_attribute_value(
    &self,
    element: &Self::Handle,
    attribute: &Attribute,
    parameter: WireValue<Self::Handle>,
  ) -> RawResult<WireValue<Self::Handle>>;

  /// Names of the actions the element supports.
  fn action_names(&self, element: &Self::Handle) -> RawResult<Vec<Action>>;

  /// Human-readable description of an action.
  fn action_description(&self, element: &Self::Handle, action: &Action) -> RawResult<String>;

  /// Ask the target to perform an action. Success means the request was
  /// accepted, not that the target finished acting on it.
  fn perform_action(&self, element: &Self::Handle, action: &Action) -> RawResult<()>;

  /// Process that owns the element.
  fn pid(&self, element: &Self::Handle) -> RawResult<ProcessId>;

  /// Set the messaging timeout for this handle instance. `0.0` restores the
  /// default.
  fn set_messaging_timeout(&self, element: &Self::Handle, seconds: f32) -> RawResult<()>;

  /// Hit-test. Only valid on application and system-wide elements.
  fn element_at_position(&self, element: &Self::Handle, point: Point) -> RawResult<Self::Handle>;

  /// Create an observer for a process. Deliveries go to `sink` while the
  /// event source is pumped.
  fn create_observer(
    &self,
    pid: ProcessId,
    sink: DeliverySink<Self::Handle>,
  ) -> RawResult<Self::Observer>;

  /// Start delivering `notification` for `element` to the observer.
  fn add_notification(
    &self,
    observer: &Self::Observer,
    element: &Self::Handle,
    notification: &Notification,
  ) -> RawResult<()>;

  /// Stop delivering `notification` for `element`.
  fn remove_notification(
    &self,
    observer: &Self::Observer,
    element: &Self::Handle,
    notification: &Notification,
  ) -> RawResult<()>;

  /// Run the event source for at most `wait`, handing pending deliveries to
  /// observer sinks. Returns early once something was delivered, but only
  /// after every delivery already ready has been handed over: a burst is
  /// never split across pumps.
  fn pump(&self, wait: Duration);
}
