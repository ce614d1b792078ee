/*!
Notification observers.

An [`Observer`] watches one process. It keeps a table from
`(element, notification)` to an ordered list of callbacks and registers
each tuple with the service the first time it is added. Deliveries from
the service's event source are posted onto the observer's [`RunLoop`] and
dispatched there (see `dispatch`).

Adding and removing are serialized per observer by a reentrant
registration lock held across the service call, so the table and the
service agree on which tuples are registered even when several threads
mutate the same observer. The table lock itself is never held across a
service call or a callback, and dispatch takes neither lock while
callbacks run, so callbacks are free to add and remove subscriptions on
the same observer.

```ignore
let run_loop = RunLoop::new();
let observer = ax.create_observer(pid, &run_loop, |observer, element, notification, _info| {
  println!("{notification} on {element}");
})?;
observer.add_notification(&Notification::WINDOW_CREATED, &ax.application(pid))?;
run_loop.run();
```
*/

mod coalesce;
mod dispatch;

pub use coalesce::Coalescer;

use async_broadcast::{InactiveReceiver, Receiver, Sender};
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::a11y::Value;
use crate::access::Shared;
use crate::element::UIElement;
use crate::messaging::{timed, Failure};
use crate::platform::{Backend, DeliverySink};
use crate::runloop::RunLoop;
use crate::types::{AxError, AxResult, ErrorCode, Notification, NotificationEvent, ProcessId};

/// Side-channel payload of a notification, decoded.
pub type NotificationInfo<B> = BTreeMap<String, Value<UIElement<B>>>;

/// Notification callback: `(observer, element, notification, info)`.
pub type Callback<B> = Arc<
  dyn Fn(&Observer<B>, &UIElement<B>, &Notification, Option<&NotificationInfo<B>>) + Send + Sync,
>;

type Table<B> = HashMap<(<B as Backend>::Handle, Notification), Vec<Callback<B>>>;

/// Default capacity of the event stream returned by [`Observer::subscribe`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Observer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverConfig {
  channel_capacity: usize,
}

impl Default for ObserverConfig {
  fn default() -> Self {
    Self::new()
  }
}

impl ObserverConfig {
  pub const fn new() -> Self {
    Self {
      channel_capacity: DEFAULT_CHANNEL_CAPACITY,
    }
  }

  /// Events buffered per subscriber before the oldest are dropped.
  pub const fn channel_capacity(mut self, capacity: usize) -> Self {
    self.channel_capacity = if capacity == 0 { 1 } else { capacity };
    self
  }
}

pub(crate) struct Inner<B: Backend> {
  shared: Arc<Shared<B>>,
  pid: ProcessId,
  raw: B::Observer,
  run_loop: RunLoop,
  callback: Callback<B>,
  registration: ReentrantMutex<()>,
  table: Mutex<Table<B>>,
  events_tx: Sender<NotificationEvent>,
  events_keepalive: InactiveReceiver<NotificationEvent>,
}

impl<B: Backend> Drop for Inner<B> {
  fn drop(&mut self) {
    let keys: Vec<_> = self.table.get_mut().drain().map(|(key, _)| key).collect();
    for (handle, notification) in keys {
      if let Err(code) = self
        .shared
        .backend
        .remove_notification(&self.raw, &handle, &notification)
      {
        log::trace!("Unregistering {notification} on drop: {code:?}");
      }
    }
  }
}

/// Per-process notification observer. Clone is cheap; registrations live
/// as long as any clone does.
pub struct Observer<B: Backend> {
  inner: Arc<Inner<B>>,
}

impl<B: Backend> Clone for Observer<B> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<B: Backend> fmt::Debug for Observer<B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Observer")
      .field("pid", &self.inner.pid)
      .field("subscriptions", &self.inner.table.lock().len())
      .finish_non_exhaustive()
  }
}

impl<B: Backend> Observer<B> {
  pub(crate) fn create(
    shared: Arc<Shared<B>>,
    pid: ProcessId,
    run_loop: &RunLoop,
    config: ObserverConfig,
    callback: Callback<B>,
  ) -> AxResult<Self> {
    // The sink exists before the observer it feeds; it finds it through
    // this slot once construction is done.
    let slot = Arc::new(OnceLock::new());
    let sink: DeliverySink<B::Handle> = {
      let slot = Arc::clone(&slot);
      Arc::new(move |delivery| dispatch::enqueue(&slot, delivery))
    };

    let raw = shared.backend.create_observer(pid, sink).map_err(|code| {
      log::warn!("Failed to create observer for pid {pid}: {code:?}");
      AxError::from(Failure::immediate(code))
    })?;

    let (mut events_tx, events_rx) = async_broadcast::broadcast(config.channel_capacity);
    events_tx.set_overflow(true);

    let inner = Arc::new(Inner {
      shared,
      pid,
      raw,
      run_loop: run_loop.clone(),
      callback,
      registration: ReentrantMutex::new(()),
      table: Mutex::new(HashMap::new()),
      events_tx,
      events_keepalive: events_rx.deactivate(),
    });
    if slot.set(Arc::downgrade(&inner)).is_err() {
      log::error!("Observer sink for pid {pid} bound twice");
    }

    log::debug!("Created observer for pid {pid}");
    Ok(Self { inner })
  }

  /// Process this observer watches.
  pub fn pid(&self) -> ProcessId {
    self.inner.pid
  }

  /// Run loop deliveries are dispatched on.
  pub fn run_loop(&self) -> &RunLoop {
    &self.inner.run_loop
  }

  /// Deliver `notification` for `element` to the observer's callback.
  ///
  /// The first registration of a tuple registers it with the service;
  /// later ones append another call of the callback.
  pub fn add_notification(&self, notification: &Notification, element: &UIElement<B>) -> AxResult<()> {
    self.register(notification, element, Arc::clone(&self.inner.callback))
  }

  /// Like [`add_notification`](Self::add_notification) with a callback of
  /// its own. Callbacks of a tuple run in registration order.
  pub fn add_notification_with(
    &self,
    notification: &Notification,
    element: &UIElement<B>,
    callback: impl Fn(&Self, &UIElement<B>, &Notification, Option<&NotificationInfo<B>>)
      + Send
      + Sync
      + 'static,
  ) -> AxResult<()> {
    self.register(notification, element, Arc::new(callback))
  }

  fn register(
    &self,
    notification: &Notification,
    element: &UIElement<B>,
    callback: Callback<B>,
  ) -> AxResult<()> {
    let key = (element.handle().clone(), notification.clone());
    let _registration = self.inner.registration.lock();

    // Step 1: already registered, append (quick lock)
    {
      let mut table = self.inner.table.lock();
      if let Some(callbacks) = table.get_mut(&key) {
        callbacks.push(callback);
        log::debug!("Appended callback #{} for {notification}", callbacks.len());
        return Ok(());
      }
    }

    // Step 2: register with the service (table unlocked)
    let backend = &self.inner.shared.backend;
    match timed(element.effective_timeout(), || {
      backend.add_notification(&self.inner.raw, element.handle(), notification)
    }) {
      Ok(()) => {}
      // The service kept a registration the table had lost track of.
      Err(f) if f.code == ErrorCode::NotificationAlreadyRegistered => {
        log::debug!("{notification} already registered with the service");
      }
      Err(f) => {
        log::debug!("Registering {notification} failed: {:?}", f.code);
        return Err(f.into());
      }
    }

    // Step 3: record (quick lock)
    self.inner.table.lock().entry(key).or_default().push(callback);
    log::debug!("Registered {notification} for pid {}", self.inner.pid);
    Ok(())
  }

  /// Stop delivering `notification` for `element`. Removes every callback
  /// of the tuple.
  ///
  /// A tuple that was never added fails with `NotificationNotRegistered`
  /// and leaves everything else untouched. If the service refuses the
  /// removal, the tuple keeps its callbacks.
  pub fn remove_notification(
    &self,
    notification: &Notification,
    element: &UIElement<B>,
  ) -> AxResult<()> {
    let key = (element.handle().clone(), notification.clone());
    let _registration = self.inner.registration.lock();

    let Some(callbacks) = self.inner.table.lock().remove(&key) else {
      log::debug!("Removing {notification}: not registered");
      return Err(AxError::from(ErrorCode::NotificationNotRegistered));
    };

    let backend = &self.inner.shared.backend;
    match timed(element.effective_timeout(), || {
      backend.remove_notification(&self.inner.raw, element.handle(), notification)
    }) {
      Ok(()) => {}
      Err(f) if f.code == ErrorCode::NotificationNotRegistered => {
        log::debug!("{notification} was already gone from the service");
      }
      Err(f) => {
        // Still registered with the service: keep delivering to the callbacks.
        log::debug!("Unregistering {notification} failed: {:?}", f.code);
        let mut table = self.inner.table.lock();
        let entry = table.entry(key).or_default();
        let added_since = std::mem::replace(entry, callbacks);
        entry.extend(added_since);
        return Err(f.into());
      }
    }

    log::debug!("Removed {notification} ({} callbacks)", callbacks.len());
    Ok(())
  }

  /// Whether the tuple currently has callbacks.
  pub fn is_registered(&self, notification: &Notification, element: &UIElement<B>) -> bool {
    self.callback_count(notification, element) > 0
  }

  pub fn callback_count(&self, notification: &Notification, element: &UIElement<B>) -> usize {
    let key = (element.handle().clone(), notification.clone());
    self.inner.table.lock().get(&key).map_or(0, Vec::len)
  }

  /// Stream of dispatched notifications, published after callbacks ran.
  /// Slow subscribers lose the oldest events.
  pub fn subscribe(&self) -> Receiver<NotificationEvent> {
    self.inner.events_keepalive.activate_cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::access::Accessibility;
  use crate::platform::sim::{NodeId, SimBackend, SimValue};
  use crate::types::{Attribute, Role};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  type Sim = SimBackend;
  type Log = Arc<Mutex<Vec<String>>>;

  const PID: ProcessId = ProcessId(42);

  struct Fixture {
    ax: Accessibility<Sim>,
    run_loop: RunLoop,
    log: Log,
    nodes: Vec<NodeId>,
  }

  impl Fixture {
    fn new(n: usize) -> Self {
      let ax = Accessibility::new(SimBackend::new());
      ax.backend().add_application(PID);
      let nodes = (0..n)
        .map(|i| {
          let id = ax.backend().add_node(PID, Role::BUTTON);
          ax.backend()
            .set_attribute(id, Attribute::TITLE, SimValue::String(format!("b{i}")));
          id
        })
        .collect();
      Self {
        ax,
        run_loop: RunLoop::new(),
        log: Arc::new(Mutex::new(Vec::new())),
        nodes,
      }
    }

    fn sim(&self) -> &Sim {
      self.ax.backend()
    }

    fn el(&self, i: usize) -> UIElement<Sim> {
      self.ax.wrap(self.sim().handle(self.nodes[i]))
    }

    /// Observer whose callback logs `title:notification`.
    fn observer(&self) -> Observer<Sim> {
      let log = Arc::clone(&self.log);
      self
        .ax
        .create_observer(PID, &self.run_loop, move |_, element, notification, _| {
          let title = element.title().ok().flatten().unwrap_or_default();
          log.lock().push(format!("{title}:{notification}"));
        })
        .unwrap()
    }

    fn post(&self, i: usize, notification: &Notification) -> usize {
      self.sim().post_notification(self.nodes[i], notification.clone(), None)
    }

    fn logged(&self) -> Vec<String> {
      self.log.lock().clone()
    }
  }

  mod registration {
    use super::*;

    #[test]
    fn first_add_registers_with_the_service() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      observer.add_notification(&Notification::VALUE_CHANGED, &fx.el(0)).unwrap();
      assert!(fx.sim().is_registered(fx.nodes[0], &Notification::VALUE_CHANGED));
      assert!(observer.is_registered(&Notification::VALUE_CHANGED, &fx.el(0)));
    }

    #[test]
    fn second_add_appends_instead_of_replacing() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      observer.add_notification(&Notification::VALUE_CHANGED, &fx.el(0)).unwrap();
      observer.add_notification(&Notification::VALUE_CHANGED, &fx.el(0)).unwrap();
      assert_eq!(observer.callback_count(&Notification::VALUE_CHANGED, &fx.el(0)), 2);
    }

    #[test]
    fn unsupported_notification_is_reported() {
      let fx = Fixture::new(1);
      fx.sim().restrict_notifications(fx.nodes[0], &[Notification::MOVED]);
      let err = fx
        .observer()
        .add_notification(&Notification::VALUE_CHANGED, &fx.el(0))
        .unwrap_err();
      assert_eq!(err, AxError::NotificationUnsupported);
    }

    #[test]
    fn dead_element_cannot_be_observed() {
      let fx = Fixture::new(1);
      let el = fx.el(0);
      fx.sim().destroy(fx.nodes[0]);
      let err = fx.observer().add_notification(&Notification::MOVED, &el).unwrap_err();
      assert_eq!(err, AxError::InvalidElement);
    }

    #[test]
    fn removing_an_unknown_tuple_fails_without_side_effects() {
      let fx = Fixture::new(2);
      let observer = fx.observer();
      observer.add_notification(&Notification::MOVED, &fx.el(0)).unwrap();

      let err = observer
        .remove_notification(&Notification::MOVED, &fx.el(1))
        .unwrap_err();
      assert_eq!(
        err,
        AxError::Failure {
          code: ErrorCode::NotificationNotRegistered
        }
      );
      assert!(observer.is_registered(&Notification::MOVED, &fx.el(0)));
      assert!(fx.sim().is_registered(fx.nodes[0], &Notification::MOVED));
    }

    #[test]
    fn remove_drops_every_callback_of_the_tuple() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      observer.add_notification(&Notification::MOVED, &fx.el(0)).unwrap();
      observer.add_notification(&Notification::MOVED, &fx.el(0)).unwrap();
      observer.remove_notification(&Notification::MOVED, &fx.el(0)).unwrap();

      assert!(!observer.is_registered(&Notification::MOVED, &fx.el(0)));
      assert!(!fx.sim().is_registered(fx.nodes[0], &Notification::MOVED));
      assert_eq!(fx.post(0, &Notification::MOVED), 0);
    }

    #[test]
    fn dropping_the_observer_unregisters() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      observer.add_notification(&Notification::MOVED, &fx.el(0)).unwrap();
      drop(observer);
      assert!(!fx.sim().is_registered(fx.nodes[0], &Notification::MOVED));
    }

    #[test]
    fn failed_removal_keeps_delivering() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      observer.add_notification(&Notification::MOVED, &fx.el(0)).unwrap();
      fx.sim().fail_unregister(Some(ErrorCode::Failure));

      let err = observer
        .remove_notification(&Notification::MOVED, &fx.el(0))
        .unwrap_err();
      assert_eq!(err, AxError::Failure { code: ErrorCode::Failure });
      assert!(observer.is_registered(&Notification::MOVED, &fx.el(0)));
      assert!(fx.sim().is_registered(fx.nodes[0], &Notification::MOVED));

      fx.post(0, &Notification::MOVED);
      fx.run_loop.run_until_idle();
      assert_eq!(fx.logged(), vec!["b0:AXMoved"]);

      fx.sim().fail_unregister(None);
      observer.remove_notification(&Notification::MOVED, &fx.el(0)).unwrap();
      assert!(!fx.sim().is_registered(fx.nodes[0], &Notification::MOVED));
    }

    /// An add that lands while another thread is still unregistering the
    /// same tuple must end up registered on both sides.
    #[test]
    fn add_during_a_slow_remove_waits_for_it() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      let el = fx.el(0);
      observer.add_notification(&Notification::MOVED, &el).unwrap();
      fx.sim().set_unregister_latency(Duration::from_millis(200));

      let (removed, added) = std::thread::scope(|s| {
        let remover = s.spawn(|| observer.remove_notification(&Notification::MOVED, &el));
        std::thread::sleep(Duration::from_millis(50));
        let adder = s.spawn(|| observer.add_notification(&Notification::MOVED, &el));
        (remover.join().unwrap(), adder.join().unwrap())
      });

      assert_eq!(removed, Ok(()));
      assert_eq!(added, Ok(()));
      assert!(observer.is_registered(&Notification::MOVED, &el));
      assert!(fx.sim().is_registered(fx.nodes[0], &Notification::MOVED));

      assert_eq!(fx.post(0, &Notification::MOVED), 1);
      fx.run_loop.run_until_idle();
      assert_eq!(fx.logged(), vec!["b0:AXMoved"]);
    }

    #[test]
    fn threads_racing_on_one_tuple_agree_with_the_service() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      let el = fx.el(0);

      std::thread::scope(|s| {
        for t in 0..4 {
          let (observer, el) = (&observer, &el);
          s.spawn(move || {
            for i in 0..50 {
              if (i + t) % 2 == 0 {
                observer.add_notification(&Notification::MOVED, el).ok();
              } else {
                observer.remove_notification(&Notification::MOVED, el).ok();
              }
            }
          });
        }
      });

      let host = observer.is_registered(&Notification::MOVED, &el);
      let service = fx.sim().is_registered(fx.nodes[0], &Notification::MOVED);
      assert_eq!(host, service);
      assert_eq!(fx.post(0, &Notification::MOVED), usize::from(service));
    }

    #[test]
    fn channel_capacity_is_at_least_one() {
      assert_eq!(ObserverConfig::new().channel_capacity(0).channel_capacity, 1);
      assert_eq!(ObserverConfig::default().channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }
  }

  mod delivery {
    use super::*;

    #[test]
    fn callback_receives_element_and_notification() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      observer.add_notification(&Notification::TITLE_CHANGED, &fx.el(0)).unwrap();

      fx.post(0, &Notification::TITLE_CHANGED);
      fx.run_loop.run_until_idle();

      assert_eq!(fx.logged(), vec!["b0:AXTitleChanged"]);
    }

    #[test]
    fn info_payload_is_decoded() {
      let fx = Fixture::new(2);
      let seen = Arc::new(Mutex::new(None));
      let observer = fx.observer();
      {
        let seen = Arc::clone(&seen);
        observer
          .add_notification_with(&Notification::CREATED, &fx.el(0), move |_, _, _, info| {
            *seen.lock() = info.cloned();
          })
          .unwrap();
      }

      let mut info = BTreeMap::new();
      info.insert("AXUIElementsKey".to_string(), SimValue::Element(fx.nodes[1]));
      fx.sim()
        .post_notification(fx.nodes[0], Notification::CREATED, Some(info));
      fx.run_loop.run_until_idle();

      let info = seen.lock().clone().unwrap();
      assert_eq!(info["AXUIElementsKey"], Value::Element(fx.el(1)));
    }

    #[test]
    fn callbacks_of_a_tuple_run_in_registration_order() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      observer.add_notification(&Notification::MOVED, &fx.el(0)).unwrap();
      let log = Arc::clone(&fx.log);
      observer
        .add_notification_with(&Notification::MOVED, &fx.el(0), move |_, _, _, _| {
          log.lock().push("second".into());
        })
        .unwrap();

      fx.post(0, &Notification::MOVED);
      fx.run_loop.run_until_idle();

      assert_eq!(fx.logged(), vec!["b0:AXMoved", "second"]);
    }

    #[test]
    fn panicking_callback_does_not_stop_the_others() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      observer
        .add_notification_with(&Notification::MOVED, &fx.el(0), |_, _, _, _| panic!("boom"))
        .unwrap();
      observer.add_notification(&Notification::MOVED, &fx.el(0)).unwrap();

      fx.post(0, &Notification::MOVED);
      fx.run_loop.run_until_idle();

      assert_eq!(fx.logged(), vec!["b0:AXMoved"]);
    }

    #[test]
    fn deliveries_keep_their_order() {
      let fx = Fixture::new(3);
      let observer = fx.observer();
      for i in 0..3 {
        observer.add_notification(&Notification::MOVED, &fx.el(i)).unwrap();
      }
      for i in [2, 0, 1] {
        fx.post(i, &Notification::MOVED);
      }
      fx.run_loop.run_until_idle();

      assert_eq!(fx.logged(), vec!["b2:AXMoved", "b0:AXMoved", "b1:AXMoved"]);
    }

    #[test]
    fn released_observer_gets_nothing() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      observer.add_notification(&Notification::MOVED, &fx.el(0)).unwrap();
      fx.post(0, &Notification::MOVED);
      drop(observer);
      fx.run_loop.run_until_idle();

      assert!(fx.logged().is_empty());
    }

    #[test]
    fn subscribers_receive_owned_events() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      let mut events = observer.subscribe();
      observer.add_notification(&Notification::MOVED, &fx.el(0)).unwrap();

      fx.post(0, &Notification::MOVED);
      fx.run_loop.run_until_idle();

      let event = events.try_recv().unwrap();
      assert_eq!(event.pid, PID);
      assert_eq!(event.notification, Notification::MOVED);
      assert_eq!(event.info, None);
    }

    #[test]
    fn run_loop_on_another_thread_delivers() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      let (tx, rx) = std::sync::mpsc::channel();
      let tx = Mutex::new(tx);
      observer
        .add_notification_with(&Notification::MOVED, &fx.el(0), move |_, _, n, _| {
          tx.lock().send(n.clone()).unwrap();
        })
        .unwrap();

      let run_loop = fx.run_loop.clone();
      let worker = std::thread::spawn(move || run_loop.run());

      fx.post(0, &Notification::MOVED);
      let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
      fx.run_loop.stop();
      worker.join().unwrap();

      assert_eq!(got, Notification::MOVED);
    }
  }

  mod reentrancy {
    use super::*;

    /// A callback that reshapes the table mid-burst must not cause skipped
    /// or repeated deliveries for the rest of the burst.
    #[test]
    fn mutation_during_a_burst_is_safe() {
      let fx = Fixture::new(5);
      let observer = fx.observer();
      let first = fx.el(0);

      // Element 0: removes itself and adds a new tuple.
      {
        let log = Arc::clone(&fx.log);
        let target = first.clone();
        observer
          .add_notification_with(&Notification::MOVED, &first, move |obs, el, n, _| {
            log.lock().push(format!("mutating:{n}"));
            obs.remove_notification(n, el).unwrap();
            obs.add_notification(&Notification::TITLE_CHANGED, &target).unwrap();
          })
          .unwrap();
      }
      for i in 1..5 {
        observer.add_notification(&Notification::MOVED, &fx.el(i)).unwrap();
      }

      for i in 0..5 {
        assert_eq!(fx.post(i, &Notification::MOVED), 1);
      }
      fx.run_loop.run_until_idle();

      assert_eq!(
        fx.logged(),
        vec![
          "mutating:AXMoved",
          "b1:AXMoved",
          "b2:AXMoved",
          "b3:AXMoved",
          "b4:AXMoved",
        ]
      );
      assert!(!observer.is_registered(&Notification::MOVED, &first));
      assert!(observer.is_registered(&Notification::TITLE_CHANGED, &first));
    }

    #[test]
    fn additions_apply_to_later_deliveries_only() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      let count = Arc::new(AtomicUsize::new(0));
      {
        let count = Arc::clone(&count);
        observer
          .add_notification_with(&Notification::MOVED, &fx.el(0), move |obs, el, n, _| {
            count.fetch_add(1, Ordering::SeqCst);
            obs.add_notification(n, el).unwrap();
          })
          .unwrap();
      }

      fx.post(0, &Notification::MOVED);
      fx.run_loop.run_until_idle();
      // The snapshot taken for the delivery had one callback.
      assert_eq!(count.load(Ordering::SeqCst), 1);
      assert_eq!(fx.logged().len(), 0);

      fx.post(0, &Notification::MOVED);
      fx.run_loop.run_until_idle();
      assert_eq!(count.load(Ordering::SeqCst), 2);
      assert_eq!(fx.logged().len(), 1);
    }

    #[test]
    fn coalescer_fires_once_after_each_burst() {
      let fx = Fixture::new(3);
      let settled = Arc::new(AtomicUsize::new(0));
      let coalescer = {
        let (settled, log) = (Arc::clone(&settled), Arc::clone(&fx.log));
        Coalescer::new(&fx.run_loop, move || {
          settled.fetch_add(1, Ordering::SeqCst);
          log.lock().push("settled".into());
        })
      };

      let observer = {
        let coalescer = coalescer.clone();
        fx.ax
          .create_observer(PID, &fx.run_loop, move |_, _, _, _| {
            coalescer.schedule();
          })
          .unwrap()
      };
      for i in 0..3 {
        observer.add_notification(&Notification::MOVED, &fx.el(i)).unwrap();
      }

      for i in 0..3 {
        fx.post(i, &Notification::MOVED);
      }
      assert_eq!(fx.run_loop.run_once(Duration::ZERO), 3);
      assert_eq!(settled.load(Ordering::SeqCst), 0);
      assert!(coalescer.is_pending());

      fx.run_loop.run_until_idle();
      assert_eq!(settled.load(Ordering::SeqCst), 1);

      fx.post(1, &Notification::MOVED);
      fx.run_loop.run_until_idle();
      assert_eq!(settled.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn callbacks_may_call_back_into_the_service() {
      let fx = Fixture::new(1);
      let observer = fx.observer();
      observer.add_notification(&Notification::MOVED, &fx.el(0)).unwrap();
      fx.post(0, &Notification::MOVED);
      fx.run_loop.run_until_idle();
      // The logging callback read the title through the service.
      assert_eq!(fx.logged(), vec!["b0:AXMoved"]);
    }
  }
}
