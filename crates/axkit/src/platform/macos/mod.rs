/*!
macOS backend over `AXUIElement` and `AXObserver`.

All platform-specific unsafe code is encapsulated here. Every method is one
synchronous call into the accessibility framework; statuses come back
unchanged as [`ErrorCode`]s.
*/

#![allow(unsafe_code)]
#![allow(clippy::expect_used)] // NonNull::new on stack pointers - never null

mod convert;
mod handles;
mod observer;

pub use handles::{MacHandle, MacObserver};

use objc2_application_services::{
  kAXTrustedCheckOptionPrompt, AXCopyMultipleAttributeOptions, AXError,
  AXIsProcessTrustedWithOptions, AXUIElement,
};
use objc2_core_foundation::{
  CFArray, CFBoolean, CFDictionary, CFIndex, CFRetained, CFString, CFType, Type,
};
use std::ptr::NonNull;
use std::time::Duration;

use self::convert::{array_items, check, from_wire, index, string_items, to_wire};
use super::{Backend, DeliverySink, RawResult, WireValue};
use crate::types::{Action, Attribute, ErrorCode, Notification, Point, ProcessId};

type Wire = WireValue<MacHandle>;

/// The system accessibility service.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacBackend;

impl MacBackend {
  pub const fn new() -> Self {
    Self
  }
}

fn cf_name(name: &str) -> CFRetained<CFString> {
  CFString::from_str(name)
}

/// Run a copying getter and take ownership of its result.
fn copy_out<T: Type>(call: impl FnOnce(NonNull<*const T>) -> AXError) -> RawResult<CFRetained<T>> {
  let mut out: *const T = std::ptr::null();
  check(call(NonNull::new(&raw mut out).expect("out ptr")))?;
  let out = NonNull::new(out.cast_mut()).ok_or(ErrorCode::NoValue)?;
  Ok(unsafe { CFRetained::from_raw(out) })
}

fn copy_array(call: impl FnOnce(NonNull<*const CFArray>) -> AXError) -> RawResult<CFRetained<CFArray>> {
  copy_out(call)
}

impl Backend for MacBackend {
  type Handle = MacHandle;
  type Observer = MacObserver;

  fn is_process_trusted(&self, prompt: bool) -> bool {
    unsafe {
      let key: &CFString = kAXTrustedCheckOptionPrompt;
      let value: &CFBoolean = CFBoolean::new(prompt);
      let options = CFDictionary::<CFString, CFBoolean>::from_slices(&[key], &[value]);
      AXIsProcessTrustedWithOptions(Some(options.as_opaque()))
    }
  }

  fn system_wide(&self) -> MacHandle {
    MacHandle::new(unsafe { AXUIElement::new_system_wide() })
  }

  fn application(&self, pid: ProcessId) -> MacHandle {
    #[allow(clippy::cast_possible_wrap)] // PIDs are always positive and < i32::MAX
    MacHandle::new(unsafe { AXUIElement::new_application(pid.0 as i32) })
  }

  fn attribute_names(&self, element: &MacHandle) -> RawResult<Vec<Attribute>> {
    let names = copy_array(|out| unsafe { element.inner().copy_attribute_names(out) })?;
    Ok(string_items(&names).into_iter().map(Attribute::from).collect())
  }

  fn attribute_value(&self, element: &MacHandle, attribute: &Attribute) -> RawResult<Wire> {
    let name = cf_name(attribute.as_str());
    let value =
      copy_out::<CFType>(|out| unsafe { element.inner().copy_attribute_value(&name, out) })?;
    Ok(to_wire(&value))
  }

  fn attribute_values(
    &self,
    element: &MacHandle,
    attribute: &Attribute,
    start: usize,
    max: usize,
  ) -> RawResult<Vec<Wire>> {
    let name = cf_name(attribute.as_str());
    let values = copy_array(|out| unsafe {
      element
        .inner()
        .copy_attribute_values(&name, index(start), index(max), out)
    })?;
    Ok(array_items(&values).iter().map(|v| to_wire(v)).collect())
  }

  fn attribute_value_count(&self, element: &MacHandle, attribute: &Attribute) -> RawResult<usize> {
    let name = cf_name(attribute.as_str());
    let mut count: CFIndex = 0;
    check(unsafe {
      element
        .inner()
        .get_attribute_value_count(&name, NonNull::new(&raw mut count).expect("count ptr"))
    })?;
    Ok(usize::try_from(count).unwrap_or(0))
  }

  fn is_attribute_settable(&self, element: &MacHandle, attribute: &Attribute) -> RawResult<bool> {
    let name = cf_name(attribute.as_str());
    let mut settable: u8 = 0;
    check(unsafe {
      element
        .inner()
        .is_attribute_settable(&name, NonNull::new(&raw mut settable).expect("settable ptr"))
    })?;
    Ok(settable != 0)
  }

  fn set_attribute_value(
    &self,
    element: &MacHandle,
    attribute: &Attribute,
    value: Wire,
  ) -> RawResult<()> {
    let name = cf_name(attribute.as_str());
    let value = from_wire(&value)?;
    check(unsafe { element.inner().set_attribute_value(&name, &value) })
  }

  fn multiple_attribute_values(
    &self,
    element: &MacHandle,
    attributes: &[Attribute],
  ) -> RawResult<Vec<Wire>> {
    let names: Vec<_> = attributes.iter().map(|a| cf_name(a.as_str())).collect();
    let refs: Vec<&CFString> = names.iter().map(|n| &**n).collect();
    let names = CFArray::from_objects(&refs);
    let values = copy_array(|out| unsafe {
      element.inner().copy_multiple_attribute_values(
        names.as_opaque(),
        AXCopyMultipleAttributeOptions::empty(),
        out,
      )
    })?;
    Ok(array_items(&values).iter().map(|v| to_wire(v)).collect())
  }

  fn parameterized_attribute_names(&self, element: &MacHandle) -> RawResult<Vec<Attribute>> {
    let names =
      copy_array(|out| unsafe { element.inner().copy_parameterized_attribute_names(out) })?;
    Ok(string_items(&names).into_iter().map(Attribute::from).collect())
  }

  fn parameterized_attribute_value(
    &self,
    element: &MacHandle,
    attribute: &Attribute,
    parameter: Wire,
  ) -> RawResult<Wire> {
    let name = cf_name(attribute.as_str());
    let parameter = from_wire(&parameter)?;
    let value = copy_out::<CFType>(|out| unsafe {
      element
        .inner()
        .copy_parameterized_attribute_value(&name, &parameter, out)
    })?;
    Ok(to_wire(&value))
  }

  fn action_names(&self, element: &MacHandle) -> RawResult<Vec<Action>> {
    let names = copy_array(|out| unsafe { element.inner().copy_action_names(out) })?;
    Ok(string_items(&names).into_iter().map(Action::from).collect())
  }

  fn action_description(&self, element: &MacHandle, action: &Action) -> RawResult<String> {
    let name = cf_name(action.as_str());
    let description =
      copy_out::<CFString>(|out| unsafe { element.inner().copy_action_description(&name, out) })?;
    Ok(description.to_string())
  }

  fn perform_action(&self, element: &MacHandle, action: &Action) -> RawResult<()> {
    let name = cf_name(action.as_str());
    check(unsafe { element.inner().perform_action(&name) })
  }

  #[allow(clippy::cast_sign_loss)]
  fn pid(&self, element: &MacHandle) -> RawResult<ProcessId> {
    let mut pid: i32 = 0;
    check(unsafe { element.inner().pid(NonNull::new(&raw mut pid).expect("pid ptr")) })?;
    Ok(ProcessId(pid as u32))
  }

  fn set_messaging_timeout(&self, element: &MacHandle, seconds: f32) -> RawResult<()> {
    check(unsafe { element.inner().set_messaging_timeout(seconds) })
  }

  #[allow(clippy::cast_possible_truncation)]
  fn element_at_position(&self, element: &MacHandle, point: Point) -> RawResult<MacHandle> {
    let hit = copy_out::<AXUIElement>(|out| unsafe {
      element
        .inner()
        .copy_element_at_position(point.x as f32, point.y as f32, out)
    })?;
    Ok(MacHandle::new(hit))
  }

  fn create_observer(
    &self,
    pid: ProcessId,
    sink: DeliverySink<MacHandle>,
  ) -> RawResult<MacObserver> {
    observer::create(pid, sink)
  }

  fn add_notification(
    &self,
    observer: &MacObserver,
    element: &MacHandle,
    notification: &Notification,
  ) -> RawResult<()> {
    let name = cf_name(notification.as_str());
    check(unsafe {
      observer
        .inner()
        .add_notification(element.inner(), &name, observer::refcon(observer))
    })
  }

  fn remove_notification(
    &self,
    observer: &MacObserver,
    element: &MacHandle,
    notification: &Notification,
  ) -> RawResult<()> {
    let name = cf_name(notification.as_str());
    check(unsafe { observer.inner().remove_notification(element.inner(), &name) })
  }

  fn pump(&self, wait: Duration) {
    observer::pump(wait);
  }
}
