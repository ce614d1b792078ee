/*!
Per-element operations.

A [`UIElement`] is a handle to one node of a remote element tree plus the
client that talks to it. Reads follow one convention throughout: the
benign statuses (no value, attribute unsupported) become absence, any
other status is an error. Writes and actions never fold anything.

```ignore
let window: UIElement<_> = app.attribute(&Attribute::FOCUSED_WINDOW)?.unwrap();
let title: Option<String> = window.attribute(&Attribute::TITLE)?;
window.set_attribute(&Attribute::POSITION, Point::new(0.0, 0.0))?;
```
*/

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::a11y::{mismatch, FromValue, Value, ValueType};
use crate::access::{configure_timeout, Shared};
use crate::codec;
use crate::messaging::{self, effective_limit, timed, Failure};
use crate::platform::{Backend, RawResult, WireValue};
use crate::types::{
  Action, Attribute, AxError, AxResult, ErrorCode, Point, ProcessId, Role, Subrole,
};
use crate::window::Window;

/// A remote accessibility element.
///
/// Equality and hashing follow the service's notion of identity, so two
/// elements obtained separately for the same node are equal. The messaging
/// timeout belongs to this handle instance and is shared by its clones.
pub struct UIElement<B: Backend> {
  shared: Arc<Shared<B>>,
  handle: B::Handle,
  timeout: Arc<AtomicU32>,
}

impl<B: Backend> UIElement<B> {
  pub(crate) fn new(shared: Arc<Shared<B>>, handle: B::Handle) -> Self {
    Self {
      shared,
      handle,
      timeout: Arc::new(AtomicU32::new(0f32.to_bits())),
    }
  }

  /// The raw backend handle.
  pub const fn handle(&self) -> &B::Handle {
    &self.handle
  }

  // ==========================================================================
  // Messaging
  // ==========================================================================

  /// Timeout in seconds for messages sent through this handle. `0` means
  /// the process-wide default.
  pub fn messaging_timeout(&self) -> f32 {
    f32::from_bits(self.timeout.load(Ordering::Acquire))
  }

  /// Set the timeout for this handle instance (other handles to the same
  /// element are unaffected). Negative values are clamped to `0`.
  ///
  /// A dead element is not an error here; any other failure is.
  pub fn set_messaging_timeout(&self, seconds: f32) -> AxResult<()> {
    let seconds = messaging::clamp_seconds(seconds);
    configure_timeout(&self.shared.backend, &self.handle, seconds)?;
    self.timeout.store(seconds.to_bits(), Ordering::Release);
    Ok(())
  }

  /// Timeout that bounds calls on this element right now.
  pub fn effective_timeout(&self) -> Duration {
    effective_limit(self.messaging_timeout(), self.shared.global_timeout())
  }

  fn call<T>(&self, f: impl FnOnce(&B, &B::Handle) -> RawResult<T>) -> Result<T, Failure> {
    timed(self.effective_timeout(), || f(&self.shared.backend, &self.handle))
  }

  /// A call whose benign failures mean "absent".
  fn read<T>(&self, f: impl FnOnce(&B, &B::Handle) -> RawResult<T>) -> AxResult<Option<T>> {
    match self.call(f) {
      Ok(value) => Ok(Some(value)),
      Err(failure) if failure.is_benign() => Ok(None),
      Err(failure) => Err(failure.into()),
    }
  }

  fn wrap(&self, handle: B::Handle) -> Self {
    Self::new(Arc::clone(&self.shared), handle)
  }

  fn decode(&self, wire: WireValue<B::Handle>) -> AxResult<Value<Self>> {
    codec::decode(wire, &|h| self.wrap(h))
  }

  fn encode(value: Value<Self>) -> AxResult<WireValue<B::Handle>> {
    codec::encode(value, &|e: Self| e.handle)
  }

  // ==========================================================================
  // Attributes
  // ==========================================================================

  /// Names of all attributes, excluding parameterized ones.
  pub fn attributes(&self) -> AxResult<Vec<Attribute>> {
    Ok(self.read(|b, h| b.attribute_names(h))?.unwrap_or_default())
  }

  /// Whether the element has `attribute` at all, with or without a value.
  pub fn is_attribute_supported(&self, attribute: &Attribute) -> AxResult<bool> {
    // Asking for zero values only probes the status.
    match self.call(|b, h| b.attribute_values(h, attribute, 0, 0)) {
      Ok(_) => Ok(true),
      Err(f) if f.code == ErrorCode::AttributeUnsupported => Ok(false),
      Err(f) if f.code == ErrorCode::NoValue => Ok(true),
      Err(f) => Err(f.into()),
    }
  }

  pub fn is_attribute_settable(&self, attribute: &Attribute) -> AxResult<bool> {
    Ok(self.read(|b, h| b.is_attribute_settable(h, attribute))?.unwrap_or(false))
  }

  /// Decoded value of an attribute, untyped.
  pub fn raw_attribute(&self, attribute: &Attribute) -> AxResult<Option<Value<Self>>> {
    self
      .read(|b, h| b.attribute_value(h, attribute))?
      .map(|wire| self.decode(wire))
      .transpose()
  }

  /// Value of an attribute as `T`.
  ///
  /// `Ok(None)` when the attribute is unsupported or has no value. A value
  /// of another type is `TypeMismatch`.
  pub fn attribute<T: FromValue<Self>>(&self, attribute: &Attribute) -> AxResult<Option<T>> {
    self.raw_attribute(attribute)?.map(T::from_value).transpose()
  }

  /// A boolean attribute, `false` when absent.
  pub fn attribute_bool(&self, attribute: &Attribute) -> AxResult<bool> {
    Ok(self.attribute::<bool>(attribute)?.unwrap_or(false))
  }

  /// Write an attribute. Every failure is reported, including an attribute
  /// the element does not have.
  pub fn set_attribute(&self, attribute: &Attribute, value: impl Into<Value<Self>>) -> AxResult<()> {
    let wire = Self::encode(value.into())?;
    self
      .call(|b, h| b.set_attribute_value(h, attribute, wire))
      .map_err(|f| {
        log::debug!("Setting {attribute} failed: {:?}", f.code);
        AxError::from(f)
      })
  }

  /// Fetch several attributes in one round trip.
  ///
  /// Attributes that are unsupported or have no value are left out of the
  /// result. Any other per-item failure fails the whole call and no partial
  /// result is returned.
  pub fn multiple_attributes(
    &self,
    attributes: &[Attribute],
  ) -> AxResult<HashMap<Attribute, Value<Self>>> {
    let items = self
      .call(|b, h| b.multiple_attribute_values(h, attributes))
      .map_err(AxError::from)?;

    if items.len() != attributes.len() {
      log::error!(
        "Batch fetch returned {} items for {} attributes",
        items.len(),
        attributes.len()
      );
      return Err(AxError::IllegalArgument);
    }

    let mut values = HashMap::with_capacity(items.len());
    for (attribute, wire) in attributes.iter().zip(items) {
      match self.decode(wire)? {
        Value::Null => {}
        Value::Error(code) if code.is_benign() => {}
        Value::Error(code) => {
          log::debug!("Batch fetch aborted at {attribute}: {code:?}");
          return Err(AxError::from(code));
        }
        value => {
          values.insert(attribute.clone(), value);
        }
      }
    }
    Ok(values)
  }

  /// All items of an array attribute as `T`.
  ///
  /// Unlike [`attribute`](Self::attribute), a present value that is not an
  /// array is a `TypeMismatch`.
  pub fn array_attribute<T: FromValue<Self>>(&self, attribute: &Attribute) -> AxResult<Option<Vec<T>>> {
    match self.raw_attribute(attribute)? {
      None => Ok(None),
      Some(Value::Array(items)) => items
        .into_iter()
        .map(T::from_value)
        .collect::<AxResult<Vec<T>>>()
        .map(Some),
      Some(other) => mismatch(ValueType::Array, &other),
    }
  }

  /// Up to `max` items of an array attribute starting at `start`.
  ///
  /// A `start` past the end yields an empty page. `Ok(None)` means the
  /// attribute does not exist or has no value.
  pub fn values_for_attribute<T: FromValue<Self>>(
    &self,
    attribute: &Attribute,
    start: usize,
    max: usize,
  ) -> AxResult<Option<Vec<T>>> {
    let Some(items) = self.read(|b, h| b.attribute_values(h, attribute, start, max))? else {
      return Ok(None);
    };
    items
      .into_iter()
      .map(|wire| T::from_value(self.decode(wire)?))
      .collect::<AxResult<Vec<T>>>()
      .map(Some)
  }

  /// Item count of an array attribute without fetching the items.
  ///
  /// `Ok(None)` when the attribute is unsupported or is not an array.
  pub fn value_count(&self, attribute: &Attribute) -> AxResult<Option<usize>> {
    match self.call(|b, h| b.attribute_value_count(h, attribute)) {
      Ok(count) => Ok(Some(count)),
      Err(f)
        if matches!(
          f.code,
          ErrorCode::AttributeUnsupported | ErrorCode::IllegalArgument
        ) =>
      {
        Ok(None)
      }
      Err(f) => Err(f.into()),
    }
  }

  // ==========================================================================
  // Parameterized attributes
  // ==========================================================================

  pub fn parameterized_attributes(&self) -> AxResult<Vec<Attribute>> {
    Ok(
      self
        .read(|b, h| b.parameterized_attribute_names(h))?
        .unwrap_or_default(),
    )
  }

  /// Value of a parameterized attribute for `parameter`, as `T`. Same
  /// absence rules as [`attribute`](Self::attribute).
  pub fn parameterized_attribute<T: FromValue<Self>>(
    &self,
    attribute: &Attribute,
    parameter: impl Into<Value<Self>>,
  ) -> AxResult<Option<T>> {
    let parameter = Self::encode(parameter.into())?;
    let wire = match self.call(|b, h| b.parameterized_attribute_value(h, attribute, parameter)) {
      Ok(wire) => wire,
      Err(f) if f.is_benign() || f.code == ErrorCode::ParameterizedAttributeUnsupported => {
        return Ok(None)
      }
      Err(f) => return Err(f.into()),
    };
    T::from_value(self.decode(wire)?).map(Some)
  }

  // ==========================================================================
  // Actions
  // ==========================================================================

  pub fn actions(&self) -> AxResult<Vec<Action>> {
    Ok(self.read(|b, h| b.action_names(h))?.unwrap_or_default())
  }

  pub fn action_description(&self, action: &Action) -> AxResult<Option<String>> {
    self.read(|b, h| b.action_description(h, action))
  }

  /// Ask the element to perform an action.
  ///
  /// Success means the request was accepted. A `Timeout` may still mean the
  /// application is busy performing it.
  pub fn perform_action(&self, action: &Action) -> AxResult<()> {
    log::trace!("Performing {action}");
    self
      .call(|b, h| b.perform_action(h, action))
      .map_err(AxError::from)
  }

  // ==========================================================================
  // Convenience
  // ==========================================================================

  /// Owning process. Fails only if the element is gone.
  pub fn pid(&self) -> AxResult<ProcessId> {
    self.call(|b, h| b.pid(h)).map_err(AxError::from)
  }

  pub fn role(&self) -> AxResult<Option<Role>> {
    Ok(self.attribute::<String>(&Attribute::ROLE)?.map(Role::new))
  }

  pub fn subrole(&self) -> AxResult<Option<Subrole>> {
    Ok(self.attribute::<String>(&Attribute::SUBROLE)?.map(Subrole::new))
  }

  pub fn title(&self) -> AxResult<Option<String>> {
    self.attribute(&Attribute::TITLE)
  }

  pub fn parent(&self) -> AxResult<Option<Self>> {
    self.attribute(&Attribute::PARENT)
  }

  pub fn children(&self) -> AxResult<Vec<Self>> {
    Ok(self.array_attribute(&Attribute::CHILDREN)?.unwrap_or_default())
  }

  /// Windows of an application element.
  pub fn windows(&self) -> AxResult<Vec<Window<B>>> {
    Ok(
      self
        .array_attribute::<Self>(&Attribute::WINDOWS)?
        .unwrap_or_default()
        .into_iter()
        .map(Window::new)
        .collect(),
    )
  }

  /// Element at a screen position. Only valid on application and
  /// system-wide elements.
  pub fn element_at_position(&self, x: f32, y: f32) -> AxResult<Option<Self>> {
    let point = Point::new(f64::from(x), f64::from(y));
    match self.call(|b, h| b.element_at_position(h, point)) {
      Ok(handle) => Ok(Some(self.wrap(handle))),
      Err(f) if f.code == ErrorCode::NoValue => Ok(None),
      Err(f) => Err(f.into()),
    }
  }

  /// Every attribute fetched in one batch, as JSON, for debugging.
  /// Failed items show up as `{"error": ...}`.
  pub fn inspect(&self) -> AxResult<serde_json::Value> {
    let names = self.attributes()?;
    let items = self
      .call(|b, h| b.multiple_attribute_values(h, &names))
      .map_err(AxError::from)?;

    let mut map = serde_json::Map::new();
    for (name, wire) in names.iter().zip(items) {
      let value = self.decode(wire)?;
      let benign = value.as_error().is_some_and(ErrorCode::is_benign);
      if !value.is_null() && !benign {
        map.insert(name.to_string(), value.to_json());
      }
    }
    Ok(serde_json::Value::Object(map))
  }
}

impl<B: Backend> Clone for UIElement<B> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
      handle: self.handle.clone(),
      timeout: Arc::clone(&self.timeout),
    }
  }
}

impl<B: Backend> PartialEq for UIElement<B> {
  fn eq(&self, other: &Self) -> bool {
    self.handle == other.handle
  }
}

impl<B: Backend> Eq for UIElement<B> {}

impl<B: Backend> Hash for UIElement<B> {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.handle.hash(state);
  }
}

impl<B: Backend> fmt::Debug for UIElement<B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("UIElement")
      .field("handle", &self.handle)
      .finish_non_exhaustive()
  }
}

/// `<AXWindow "Untitled" (pid=42)>`. Makes remote calls; failures render
/// as placeholders.
impl<B: Backend> fmt::Display for UIElement<B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let role = self.role().ok().flatten().unwrap_or(Role::UNKNOWN);
    write!(f, "<{role}")?;
    if let Ok(Some(title)) = self.title() {
      if !title.is_empty() {
        write!(f, " {title:?}")?;
      }
    }
    match self.pid() {
      Ok(pid) => write!(f, " (pid={pid})>"),
      Err(_) => write!(f, " (pid=?)>"),
    }
  }
}

impl<B: Backend> From<UIElement<B>> for Value<UIElement<B>> {
  fn from(element: UIElement<B>) -> Self {
    Self::Element(element)
  }
}

impl<B: Backend> FromValue<UIElement<B>> for UIElement<B> {
  fn from_value(value: Value<Self>) -> AxResult<Self> {
    match value {
      Value::Element(element) => Ok(element),
      other => mismatch(ValueType::Element, &other),
    }
  }
}
