/*!
Delivery dispatch.

The backend's sink only posts; all work happens in a run-loop task. Each
task snapshots the callbacks of its tuple under the table lock, releases
it, and invokes them in order. Registrations made or removed by a callback
therefore affect later deliveries only, never the one being dispatched.
*/

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};

use super::{Inner, NotificationInfo, Observer};
use crate::codec;
use crate::element::UIElement;
use crate::platform::{Backend, Delivery, WireValue};
use crate::types::{Notification, NotificationEvent};

/// Sink side: hand the delivery to the observer's run loop. Deliveries for
/// an observer that is gone are dropped here.
pub(super) fn enqueue<B: Backend>(slot: &OnceLock<Weak<Inner<B>>>, delivery: Delivery<B::Handle>) {
  let Some(inner) = slot.get().and_then(Weak::upgrade) else {
    log::trace!("Dropping {} for a released observer", delivery.notification);
    return;
  };
  let run_loop = inner.run_loop.clone();
  run_loop.post(move || dispatch(&inner, delivery));
}

fn dispatch<B: Backend>(inner: &Arc<Inner<B>>, delivery: Delivery<B::Handle>) {
  let Delivery {
    element,
    notification,
    info,
  } = delivery;

  let key = (element, notification);
  let callbacks = inner.table.lock().get(&key).cloned().unwrap_or_default();
  let (handle, notification) = key;

  if callbacks.is_empty() {
    log::trace!("No callbacks for {notification}, dropped");
    return;
  }

  let element = UIElement::new(Arc::clone(&inner.shared), handle);
  let info = info.and_then(|map| decode_info(inner, map));
  let observer = Observer {
    inner: Arc::clone(inner),
  };

  for callback in &callbacks {
    let call = || callback(&observer, &element, &notification, info.as_ref());
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
      log::warn!("Callback for {notification} panicked");
    }
  }

  publish(inner, &element, notification, info.as_ref());
}

fn decode_info<B: Backend>(
  inner: &Arc<Inner<B>>,
  map: BTreeMap<String, WireValue<B::Handle>>,
) -> Option<NotificationInfo<B>> {
  let wrap = |h| UIElement::new(Arc::clone(&inner.shared), h);
  let mut decoded = BTreeMap::new();
  for (key, wire) in map {
    match codec::decode(wire, &wrap) {
      Ok(value) => {
        decoded.insert(key, value);
      }
      Err(e) => {
        log::warn!("Undecodable notification info under {key}: {e}");
        return None;
      }
    }
  }
  Some(decoded)
}

fn publish<B: Backend>(
  inner: &Inner<B>,
  element: &UIElement<B>,
  notification: Notification,
  info: Option<&NotificationInfo<B>>,
) {
  if inner.events_tx.receiver_count() == 0 {
    return;
  }

  // Elements are rendered by handle; Display would message the service.
  let render = |e: UIElement<B>| format!("{:?}", e.handle());
  let info = info.map(|map| {
    serde_json::Value::Object(
      map
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().map_elements(&render).to_json()))
        .collect(),
    )
  });

  let event = NotificationEvent {
    pid: inner.pid,
    notification,
    element: format!("{:?}", element.handle()),
    info,
  };
  if let Err(e) = inner.events_tx.try_broadcast(event) {
    if e.is_full() {
      log::error!("Notification event channel full - events being dropped!");
    }
  }
}
