/*!
In-memory accessibility service.

`SimBackend` keeps a table of nodes grouped by process. Each node has an
ordered attribute list (with optional per-attribute failures), actions,
parameterized attributes and an artificial latency. Notifications are
queued with [`SimBackend::post_notification`] and handed to observer sinks
when the event source is pumped, the same way the platform run loop
source does it.

Handles behave like the platform's: two handles for the same node are
equal, but each handle obtained from the service is its own instance with
its own messaging timeout.
*/

use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use super::{Backend, Delivery, DeliverySink, RawResult, WireValue};
use crate::codec;
use crate::messaging::effective_limit;
use crate::types::{Action, Attribute, ErrorCode, Notification, Point, ProcessId, Rect, Role};

/// Identifier of a simulated node.
pub type NodeId = u64;

/// A stored value. Elements are referenced by node id.
pub type SimValue = WireValue<NodeId>;

/// Backing function for a parameterized attribute.
pub type ParameterizedFn = Arc<dyn Fn(SimValue) -> RawResult<SimValue> + Send + Sync>;

/// Node id that is never allocated; handles to it are always invalid.
const DANGLING: NodeId = NodeId::MAX;

/// Handle to a simulated node.
#[derive(Debug, Clone)]
pub struct SimHandle {
  node: NodeId,
  instance: u64,
}

impl SimHandle {
  pub const fn node(&self) -> NodeId {
    self.node
  }
}

impl PartialEq for SimHandle {
  fn eq(&self, other: &Self) -> bool {
    self.node == other.node
  }
}

impl Eq for SimHandle {}

impl Hash for SimHandle {
  fn hash<S: Hasher>(&self, state: &mut S) {
    self.node.hash(state);
  }
}

/// Observer created by [`SimBackend`].
#[derive(Debug)]
pub struct SimObserver {
  id: u64,
}

#[derive(Default)]
struct Slot {
  value: Option<SimValue>,
  settable: bool,
  failure: Option<ErrorCode>,
}

struct SimAction {
  name: Action,
  description: String,
  failure: Option<ErrorCode>,
}

struct Node {
  pid: ProcessId,
  alive: bool,
  attribute_order: Vec<Attribute>,
  slots: HashMap<Attribute, Slot>,
  parameterized: Vec<(Attribute, ParameterizedFn)>,
  actions: Vec<SimAction>,
  performed: Vec<Action>,
  frame: Option<Rect>,
  latency: Duration,
  notifications: Option<HashSet<Notification>>,
  batch_override: Option<Vec<SimValue>>,
}

impl Node {
  fn new(pid: ProcessId) -> Self {
    Self {
      pid,
      alive: true,
      attribute_order: Vec::new(),
      slots: HashMap::new(),
      parameterized: Vec::new(),
      actions: Vec::new(),
      performed: Vec::new(),
      frame: None,
      latency: Duration::ZERO,
      notifications: None,
      batch_override: None,
    }
  }

  fn slot(&self, attribute: &Attribute) -> Option<&Slot> {
    self.slots.get(attribute)
  }

  fn slot_mut(&mut self, attribute: &Attribute) -> &mut Slot {
    self.slots.entry(attribute.clone()).or_insert_with(|| {
      self.attribute_order.push(attribute.clone());
      Slot::default()
    })
  }

  /// Read a plain attribute with the service's status conventions.
  fn read(&self, attribute: &Attribute) -> RawResult<SimValue> {
    let slot = self.slot(attribute).ok_or(ErrorCode::AttributeUnsupported)?;
    if let Some(code) = slot.failure {
      return Err(code);
    }
    slot.value.clone().ok_or(ErrorCode::NoValue)
  }

  fn action(&self, action: &Action) -> RawResult<&SimAction> {
    self
      .actions
      .iter()
      .find(|a| &a.name == action)
      .ok_or(ErrorCode::ActionUnsupported)
  }

  fn is_root(&self, role: &Role) -> bool {
    matches!(self.read(&Attribute::ROLE), Ok(WireValue::String(ref r)) if r == role.as_str())
  }
}

struct ObserverEntry {
  registered: HashSet<(NodeId, Notification)>,
  sink: DeliverySink<SimHandle>,
}

struct Pending {
  observer: u64,
  node: NodeId,
  notification: Notification,
  info: Option<BTreeMap<String, SimValue>>,
}

struct State {
  trusted: bool,
  prompts: usize,
  next_node: NodeId,
  next_instance: u64,
  next_observer: u64,
  nodes: HashMap<NodeId, Node>,
  system_wide: NodeId,
  applications: HashMap<ProcessId, NodeId>,
  timeouts: HashMap<u64, f32>,
  global_timeout: f32,
  timeout_failure: Option<ErrorCode>,
  unregister_latency: Duration,
  unregister_failure: Option<ErrorCode>,
  observers: HashMap<u64, ObserverEntry>,
  pending: VecDeque<Pending>,
}

impl State {
  fn alloc(&mut self, pid: ProcessId, role: &Role) -> NodeId {
    let id = self.next_node;
    self.next_node += 1;
    let mut node = Node::new(pid);
    node.slot_mut(&Attribute::ROLE).value = Some(WireValue::String(role.as_str().to_owned()));
    self.nodes.insert(id, node);
    id
  }

  fn handle(&mut self, node: NodeId) -> SimHandle {
    self.next_instance += 1;
    SimHandle {
      node,
      instance: self.next_instance,
    }
  }

  fn to_wire(&mut self, value: SimValue) -> WireValue<SimHandle> {
    map_wire(value, &mut |id| self.handle(id))
  }

  fn check(&self, element: &SimHandle) -> RawResult<&Node> {
    if !self.trusted {
      return Err(ErrorCode::ApiDisabled);
    }
    self
      .nodes
      .get(&element.node)
      .filter(|n| n.alive)
      .ok_or(ErrorCode::InvalidElement)
  }

  fn check_mut(&mut self, element: &SimHandle) -> RawResult<&mut Node> {
    if !self.trusted {
      return Err(ErrorCode::ApiDisabled);
    }
    self
      .nodes
      .get_mut(&element.node)
      .filter(|n| n.alive)
      .ok_or(ErrorCode::InvalidElement)
  }

  fn limit_for(&self, element: &SimHandle) -> Duration {
    let own = self.timeouts.get(&element.instance).copied().unwrap_or(0.0);
    effective_limit(own, self.global_timeout)
  }
}

fn map_wire<A, B, F: FnMut(A) -> B>(value: WireValue<A>, f: &mut F) -> WireValue<B> {
  match value {
    WireValue::Null => WireValue::Null,
    WireValue::Boolean(b) => WireValue::Boolean(b),
    WireValue::Number(n) => WireValue::Number(n),
    WireValue::String(s) => WireValue::String(s),
    WireValue::Element(h) => WireValue::Element(f(h)),
    WireValue::Packed(p) => WireValue::Packed(p),
    WireValue::Array(items) => WireValue::Array(items.into_iter().map(|v| map_wire(v, f)).collect()),
    WireValue::Dictionary(map) => {
      WireValue::Dictionary(map.into_iter().map(|(k, v)| (k, map_wire(v, f))).collect())
    }
    WireValue::Opaque(name) => WireValue::Opaque(name),
  }
}

/// In-memory accessibility service.
pub struct SimBackend {
  state: Mutex<State>,
  ready: Condvar,
}

impl fmt::Debug for SimBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("SimBackend")
      .field("trusted", &state.trusted)
      .field("nodes", &state.nodes.len())
      .field("observers", &state.observers.len())
      .finish_non_exhaustive()
  }
}

impl Default for SimBackend {
  fn default() -> Self {
    Self::new()
  }
}

impl SimBackend {
  /// A trusted service with only the system-wide element.
  pub fn new() -> Self {
    let mut state = State {
      trusted: true,
      prompts: 0,
      next_node: 1,
      next_instance: 0,
      next_observer: 1,
      nodes: HashMap::new(),
      system_wide: 0,
      applications: HashMap::new(),
      timeouts: HashMap::new(),
      global_timeout: 0.0,
      timeout_failure: None,
      unregister_latency: Duration::ZERO,
      unregister_failure: None,
      observers: HashMap::new(),
      pending: VecDeque::new(),
    };
    state.system_wide = state.alloc(ProcessId(0), &Role::SYSTEM_WIDE);
    Self {
      state: Mutex::new(state),
      ready: Condvar::new(),
    }
  }

  // ==========================================================================
  // Scenario setup
  // ==========================================================================

  /// Grant or revoke permission. Untrusted callers get `ApiDisabled`.
  pub fn set_trusted(&self, trusted: bool) {
    self.state.lock().trusted = trusted;
  }

  /// How many times a trust check asked to prompt the user.
  pub fn prompt_count(&self) -> usize {
    self.state.lock().prompts
  }

  /// Add an application root for `pid`.
  pub fn add_application(&self, pid: ProcessId) -> NodeId {
    let mut state = self.state.lock();
    let id = state.alloc(pid, &Role::APPLICATION);
    state.applications.insert(pid, id);
    id
  }

  /// Add a node owned by `pid` with the given role.
  pub fn add_node(&self, pid: ProcessId, role: Role) -> NodeId {
    self.state.lock().alloc(pid, &role)
  }

  fn with_node(&self, id: NodeId, f: impl FnOnce(&mut Node)) {
    let mut state = self.state.lock();
    if let Some(node) = state.nodes.get_mut(&id) {
      f(node);
    } else {
      log::warn!("SimBackend: no node {id}");
    }
  }

  /// Store a value for an attribute, creating it if needed.
  pub fn set_attribute(&self, id: NodeId, attribute: impl Into<Attribute>, value: SimValue) {
    let attribute = attribute.into();
    self.with_node(id, |node| node.slot_mut(&attribute).value = Some(value));
  }

  /// Declare an attribute that exists but currently has no value.
  pub fn set_no_value(&self, id: NodeId, attribute: impl Into<Attribute>) {
    let attribute = attribute.into();
    self.with_node(id, |node| node.slot_mut(&attribute).value = None);
  }

  pub fn set_settable(&self, id: NodeId, attribute: impl Into<Attribute>, settable: bool) {
    let attribute = attribute.into();
    self.with_node(id, |node| node.slot_mut(&attribute).settable = settable);
  }

  /// Make every access to an attribute fail with `code`.
  pub fn fail_attribute(&self, id: NodeId, attribute: impl Into<Attribute>, code: ErrorCode) {
    let attribute = attribute.into();
    self.with_node(id, |node| node.slot_mut(&attribute).failure = Some(code));
  }

  /// Set the frame, keeping `AXFrame`, `AXPosition` and `AXSize` in sync.
  pub fn set_frame(&self, id: NodeId, frame: Rect) {
    self.with_node(id, |node| {
      node.frame = Some(frame);
      node.slot_mut(&Attribute::FRAME).value = Some(WireValue::Packed(codec::pack_rect(frame)));
      node.slot_mut(&Attribute::POSITION).value =
        Some(WireValue::Packed(codec::pack_point(frame.origin)));
      node.slot_mut(&Attribute::SIZE).value = Some(WireValue::Packed(codec::pack_size(frame.size)));
    });
  }

  /// Link `children` under `parent` via `AXChildren` / `AXParent`.
  pub fn set_children(&self, parent: NodeId, children: &[NodeId]) {
    let items = children.iter().map(|c| WireValue::Element(*c)).collect();
    self.set_attribute(parent, Attribute::CHILDREN, WireValue::Array(items));
    for child in children {
      self.set_attribute(*child, Attribute::PARENT, WireValue::Element(parent));
    }
  }

  pub fn add_action(&self, id: NodeId, action: impl Into<Action>, description: &str) {
    let name = action.into();
    let description = description.to_owned();
    self.with_node(id, |node| {
      node.actions.push(SimAction {
        name,
        description,
        failure: None,
      });
    });
  }

  /// Make performing an existing action fail with `code`.
  pub fn fail_action(&self, id: NodeId, action: &Action, code: ErrorCode) {
    self.with_node(id, |node| {
      if let Some(a) = node.actions.iter_mut().find(|a| &a.name == action) {
        a.failure = Some(code);
      }
    });
  }

  /// Actions performed on a node so far, in order.
  pub fn performed_actions(&self, id: NodeId) -> Vec<Action> {
    let state = self.state.lock();
    state
      .nodes
      .get(&id)
      .map(|n| n.performed.clone())
      .unwrap_or_default()
  }

  /// Back a parameterized attribute with a function. The function runs
  /// while the service is locked and must not call back into it.
  pub fn set_parameterized(
    &self,
    id: NodeId,
    attribute: impl Into<Attribute>,
    f: impl Fn(SimValue) -> RawResult<SimValue> + Send + Sync + 'static,
  ) {
    let attribute = attribute.into();
    let f: ParameterizedFn = Arc::new(f);
    self.with_node(id, |node| node.parameterized.push((attribute, f)));
  }

  /// Delay every call on the node.
  pub fn set_latency(&self, id: NodeId, latency: Duration) {
    self.with_node(id, |node| node.latency = latency);
  }

  /// Limit which notifications the node can emit. Unrestricted by default.
  pub fn restrict_notifications(&self, id: NodeId, names: &[Notification]) {
    let names = names.iter().cloned().collect();
    self.with_node(id, |node| node.notifications = Some(names));
  }

  /// Answer batch fetches on the node with exactly `items`, regardless of
  /// what was requested.
  pub fn override_batch(&self, id: NodeId, items: Vec<SimValue>) {
    self.with_node(id, |node| node.batch_override = Some(items));
  }

  /// Destroy a node. Existing handles become invalid.
  pub fn destroy(&self, id: NodeId) {
    self.with_node(id, |node| node.alive = false);
  }

  /// Make every timeout configuration call fail with `code`.
  pub fn fail_messaging_timeout(&self, code: Option<ErrorCode>) {
    self.state.lock().timeout_failure = code;
  }

  /// Delay every notification removal by `latency` before it takes effect.
  pub fn set_unregister_latency(&self, latency: Duration) {
    self.state.lock().unregister_latency = latency;
  }

  /// Make every notification removal fail with `code`.
  pub fn fail_unregister(&self, code: Option<ErrorCode>) {
    self.state.lock().unregister_failure = code;
  }

  /// Timeout configured on this handle instance.
  pub fn messaging_timeout(&self, handle: &SimHandle) -> f32 {
    let state = self.state.lock();
    state.timeouts.get(&handle.instance).copied().unwrap_or(0.0)
  }

  pub fn global_messaging_timeout(&self) -> f32 {
    self.state.lock().global_timeout
  }

  /// A fresh handle instance for a node.
  pub fn handle(&self, id: NodeId) -> SimHandle {
    self.state.lock().handle(id)
  }

  /// Whether any observer is registered for the tuple.
  pub fn is_registered(&self, id: NodeId, notification: &Notification) -> bool {
    let key = (id, notification.clone());
    let state = self.state.lock();
    state.observers.values().any(|o| o.registered.contains(&key))
  }

  /// Queue a notification. Only observers registered for the tuple receive
  /// it. Returns the number of deliveries queued.
  pub fn post_notification(
    &self,
    id: NodeId,
    notification: impl Into<Notification>,
    info: Option<BTreeMap<String, SimValue>>,
  ) -> usize {
    let notification = notification.into();
    let key = (id, notification.clone());
    let mut state = self.state.lock();

    let mut targets: Vec<u64> = state
      .observers
      .iter()
      .filter(|(_, o)| o.registered.contains(&key))
      .map(|(id, _)| *id)
      .collect();
    targets.sort_unstable();

    for observer in &targets {
      state.pending.push_back(Pending {
        observer: *observer,
        node: id,
        notification: notification.clone(),
        info: info.clone(),
      });
    }
    drop(state);

    if !targets.is_empty() {
      self.ready.notify_all();
    }
    targets.len()
  }

  // ==========================================================================
  // Internals
  // ==========================================================================

  /// One round trip: permission and liveness checks, latency, then `op`
  /// under the lock. Latency beyond the effective timeout sleeps for the
  /// timeout and fails with `CannotComplete`.
  fn round_trip<T>(
    &self,
    element: &SimHandle,
    op: impl FnOnce(&mut State) -> RawResult<T>,
  ) -> RawResult<T> {
    let (latency, limit) = {
      let state = self.state.lock();
      let node = state.check(element)?;
      (node.latency, state.limit_for(element))
    };

    if latency > limit {
      std::thread::sleep(limit);
      return Err(ErrorCode::CannotComplete);
    }
    if !latency.is_zero() {
      std::thread::sleep(latency);
    }

    let mut state = self.state.lock();
    state.check(element)?;
    op(&mut state)
  }

  fn read_with<T>(
    &self,
    element: &SimHandle,
    op: impl FnOnce(&Node) -> RawResult<T>,
  ) -> RawResult<T> {
    self.round_trip(element, |state| op(state.check(element)?))
  }
}

impl Backend for SimBackend {
  type Handle = SimHandle;
  type Observer = SimObserver;

  fn is_process_trusted(&self, prompt: bool) -> bool {
    let mut state = self.state.lock();
    if prompt {
      state.prompts += 1;
    }
    state.trusted
  }

  fn system_wide(&self) -> SimHandle {
    let mut state = self.state.lock();
    let id = state.system_wide;
    state.handle(id)
  }

  fn application(&self, pid: ProcessId) -> SimHandle {
    let mut state = self.state.lock();
    let id = state.applications.get(&pid).copied().unwrap_or(DANGLING);
    state.handle(id)
  }

  fn attribute_names(&self, element: &SimHandle) -> RawResult<Vec<Attribute>> {
    self.read_with(element, |node| {
      Ok(node.attribute_order.clone())
    })
  }

  fn attribute_value(
    &self,
    element: &SimHandle,
    attribute: &Attribute,
  ) -> RawResult<WireValue<SimHandle>> {
    self.round_trip(element, |state| {
      let value = state.check(element)?.read(attribute)?;
      Ok(state.to_wire(value))
    })
  }

  fn attribute_values(
    &self,
    element: &SimHandle,
    attribute: &Attribute,
    start: usize,
    max: usize,
  ) -> RawResult<Vec<WireValue<SimHandle>>> {
    self.round_trip(element, |state| {
      let items = match state.check(element)?.read(attribute)? {
        WireValue::Array(items) => items,
        // Probing with zero items works on any attribute.
        _ if max == 0 => Vec::new(),
        _ => return Err(ErrorCode::IllegalArgument),
      };
      Ok(
        items
          .into_iter()
          .skip(start)
          .take(max)
          .map(|v| state.to_wire(v))
          .collect(),
      )
    })
  }

  fn attribute_value_count(&self, element: &SimHandle, attribute: &Attribute) -> RawResult<usize> {
    self.read_with(element, |node| match node.read(attribute)? {
      WireValue::Array(items) => Ok(items.len()),
      _ => Err(ErrorCode::IllegalArgument),
    })
  }

  fn is_attribute_settable(&self, element: &SimHandle, attribute: &Attribute) -> RawResult<bool> {
    self.read_with(element, |node| {
      let slot = node.slot(attribute).ok_or(ErrorCode::AttributeUnsupported)?;
      match slot.failure {
        Some(code) => Err(code),
        None => Ok(slot.settable),
      }
    })
  }

  fn set_attribute_value(
    &self,
    element: &SimHandle,
    attribute: &Attribute,
    value: WireValue<SimHandle>,
  ) -> RawResult<()> {
    self.round_trip(element, |state| {
      let node = state.check_mut(element)?;
      if node.slot(attribute).is_none() {
        return Err(ErrorCode::AttributeUnsupported);
      }
      let slot = node.slot_mut(attribute);
      if let Some(code) = slot.failure {
        return Err(code);
      }
      if !slot.settable {
        return Err(ErrorCode::AttributeUnsupported);
      }
      slot.value = Some(map_wire(value, &mut |h: SimHandle| h.node));
      Ok(())
    })
  }

  fn multiple_attribute_values(
    &self,
    element: &SimHandle,
    attributes: &[Attribute],
  ) -> RawResult<Vec<WireValue<SimHandle>>> {
    self.round_trip(element, |state| {
      let node = state.check(element)?;
      let items: Vec<SimValue> = match &node.batch_override {
        Some(items) => items.clone(),
        None => attributes
          .iter()
          .map(|attribute| {
            node
              .read(attribute)
              .unwrap_or_else(|code| WireValue::Packed(codec::pack_error(code)))
          })
          .collect(),
      };
      Ok(items.into_iter().map(|v| state.to_wire(v)).collect())
    })
  }

  fn parameterized_attribute_names(&self, element: &SimHandle) -> RawResult<Vec<Attribute>> {
    self.read_with(element, |node| {
      Ok(node.parameterized.iter().map(|(name, _)| name.clone()).collect())
    })
  }

  fn parameterized_attribute_value(
    &self,
    element: &SimHandle,
    attribute: &Attribute,
    parameter: WireValue<SimHandle>,
  ) -> RawResult<WireValue<SimHandle>> {
    self.round_trip(element, |state| {
      let f = state
        .check(element)?
        .parameterized
        .iter()
        .find(|(name, _)| name == attribute)
        .map(|(_, f)| Arc::clone(f))
        .ok_or(ErrorCode::AttributeUnsupported)?;
      let value = f(map_wire(parameter, &mut |h: SimHandle| h.node))?;
      Ok(state.to_wire(value))
    })
  }

  fn action_names(&self, element: &SimHandle) -> RawResult<Vec<Action>> {
    self.read_with(element, |node| Ok(node.actions.iter().map(|a| a.name.clone()).collect()))
  }

  fn action_description(&self, element: &SimHandle, action: &Action) -> RawResult<String> {
    self.read_with(element, |node| Ok(node.action(action)?.description.clone()))
  }

  fn perform_action(&self, element: &SimHandle, action: &Action) -> RawResult<()> {
    self.round_trip(element, |state| {
      let node = state.check_mut(element)?;
      if let Some(code) = node.action(action)?.failure {
        return Err(code);
      }
      node.performed.push(action.clone());
      Ok(())
    })
  }

  fn pid(&self, element: &SimHandle) -> RawResult<ProcessId> {
    self.read_with(element, |node| Ok(node.pid))
  }

  fn set_messaging_timeout(&self, element: &SimHandle, seconds: f32) -> RawResult<()> {
    let mut state = self.state.lock();
    if let Some(code) = state.timeout_failure {
      return Err(code);
    }
    if !state.nodes.get(&element.node).is_some_and(|n| n.alive) {
      return Err(ErrorCode::InvalidElement);
    }
    if element.node == state.system_wide {
      state.global_timeout = seconds;
    } else {
      state.timeouts.insert(element.instance, seconds);
    }
    Ok(())
  }

  fn element_at_position(&self, element: &SimHandle, point: Point) -> RawResult<SimHandle> {
    self.round_trip(element, |state| {
      let root = state.check(element)?;
      let system_wide = element.node == state.system_wide;
      if !system_wide && !root.is_root(&Role::APPLICATION) {
        return Err(ErrorCode::IllegalArgument);
      }
      let pid = root.pid;

      // Later nodes sit on top of earlier ones.
      let hit = state
        .nodes
        .iter()
        .filter(|(_, n)| n.alive && (system_wide || n.pid == pid))
        .filter(|(_, n)| n.frame.is_some_and(|f| f.contains(point)))
        .map(|(id, _)| *id)
        .max()
        .ok_or(ErrorCode::NoValue)?;
      Ok(state.handle(hit))
    })
  }

  fn create_observer(
    &self,
    _pid: ProcessId,
    sink: DeliverySink<SimHandle>,
  ) -> RawResult<SimObserver> {
    let mut state = self.state.lock();
    if !state.trusted {
      return Err(ErrorCode::ApiDisabled);
    }
    let id = state.next_observer;
    state.next_observer += 1;
    state.observers.insert(
      id,
      ObserverEntry {
        registered: HashSet::new(),
        sink,
      },
    );
    Ok(SimObserver { id })
  }

  fn add_notification(
    &self,
    observer: &SimObserver,
    element: &SimHandle,
    notification: &Notification,
  ) -> RawResult<()> {
    let mut state = self.state.lock();
    let node = state.check(element)?;
    if node
      .notifications
      .as_ref()
      .is_some_and(|names| !names.contains(notification))
    {
      return Err(ErrorCode::NotificationUnsupported);
    }
    let entry = state
      .observers
      .get_mut(&observer.id)
      .ok_or(ErrorCode::InvalidObserver)?;
    if entry.registered.insert((element.node, notification.clone())) {
      Ok(())
    } else {
      Err(ErrorCode::NotificationAlreadyRegistered)
    }
  }

  fn remove_notification(
    &self,
    observer: &SimObserver,
    element: &SimHandle,
    notification: &Notification,
  ) -> RawResult<()> {
    let latency = self.state.lock().unregister_latency;
    if !latency.is_zero() {
      std::thread::sleep(latency);
    }

    let mut state = self.state.lock();
    if !state.trusted {
      return Err(ErrorCode::ApiDisabled);
    }
    if let Some(code) = state.unregister_failure {
      return Err(code);
    }
    let entry = state
      .observers
      .get_mut(&observer.id)
      .ok_or(ErrorCode::InvalidObserver)?;
    if entry.registered.remove(&(element.node, notification.clone())) {
      Ok(())
    } else {
      Err(ErrorCode::NotificationNotRegistered)
    }
  }

  fn pump(&self, wait: Duration) {
    let mut state = self.state.lock();
    if state.pending.is_empty() && !wait.is_zero() {
      let _timed_out = self.ready.wait_for(&mut state, wait);
    }

    let queued: Vec<Pending> = state.pending.drain(..).collect();
    let mut deliveries = Vec::with_capacity(queued.len());
    for pending in queued {
      let Some(sink) = state.observers.get(&pending.observer).map(|o| Arc::clone(&o.sink)) else {
        continue;
      };
      let element = state.handle(pending.node);
      let info = pending
        .info
        .map(|map| map.into_iter().map(|(k, v)| (k, state.to_wire(v))).collect());
      deliveries.push((
        sink,
        Delivery {
          element,
          notification: pending.notification,
          info,
        },
      ));
    }
    drop(state);

    // Sinks run unlocked so they may call back into the service.
    for (sink, delivery) in deliveries {
      sink(delivery);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn app(sim: &SimBackend) -> (NodeId, SimHandle) {
    let id = sim.add_application(ProcessId(42));
    (id, sim.handle(id))
  }

  #[test]
  fn handles_compare_by_node() {
    let sim = SimBackend::new();
    let (id, a) = app(&sim);
    let b = sim.handle(id);
    assert_eq!(a, b);
    assert_ne!(a.instance, b.instance);
  }

  #[test]
  fn untrusted_calls_are_api_disabled() {
    let sim = SimBackend::new();
    let (_, h) = app(&sim);
    sim.set_trusted(false);
    assert_eq!(sim.attribute_names(&h), Err(ErrorCode::ApiDisabled));
    assert!(!sim.is_process_trusted(true));
    assert_eq!(sim.prompt_count(), 1);
  }

  #[test]
  fn destroyed_nodes_are_invalid() {
    let sim = SimBackend::new();
    let (id, h) = app(&sim);
    sim.destroy(id);
    assert_eq!(sim.pid(&h), Err(ErrorCode::InvalidElement));
  }

  #[test]
  fn unknown_application_is_invalid() {
    let sim = SimBackend::new();
    let h = sim.application(ProcessId(7));
    assert_eq!(sim.pid(&h), Err(ErrorCode::InvalidElement));
  }

  #[test]
  fn batch_reports_failures_inline() {
    let sim = SimBackend::new();
    let (id, h) = app(&sim);
    sim.set_no_value(id, "AXTitle");
    let items = sim
      .multiple_attribute_values(&h, &[Attribute::ROLE, Attribute::TITLE])
      .unwrap();
    assert_eq!(items[0], WireValue::String("AXApplication".into()));
    assert_eq!(
      items[1],
      WireValue::Packed(codec::pack_error(ErrorCode::NoValue))
    );
  }

  #[test]
  fn notifications_reach_only_registered_observers() {
    let sim = SimBackend::new();
    let (id, h) = app(&sim);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink: DeliverySink<SimHandle> = {
      let seen = Arc::clone(&seen);
      Arc::new(move |d: Delivery<SimHandle>| seen.lock().push(d.notification))
    };
    let observer = sim.create_observer(ProcessId(42), sink).unwrap();

    assert_eq!(sim.post_notification(id, Notification::MOVED, None), 0);
    sim.add_notification(&observer, &h, &Notification::MOVED).unwrap();
    assert_eq!(sim.post_notification(id, Notification::MOVED, None), 1);
    sim.pump(Duration::ZERO);

    assert_eq!(*seen.lock(), vec![Notification::MOVED]);
  }

  #[test]
  fn one_pump_hands_over_the_whole_burst() {
    let sim = SimBackend::new();
    let (id, h) = app(&sim);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink: DeliverySink<SimHandle> = {
      let seen = Arc::clone(&seen);
      Arc::new(move |d: Delivery<SimHandle>| seen.lock().push(d.notification))
    };
    let observer = sim.create_observer(ProcessId(42), sink).unwrap();
    sim.add_notification(&observer, &h, &Notification::MOVED).unwrap();
    sim.add_notification(&observer, &h, &Notification::RESIZED).unwrap();

    sim.post_notification(id, Notification::MOVED, None);
    sim.post_notification(id, Notification::RESIZED, None);
    sim.post_notification(id, Notification::MOVED, None);
    sim.pump(Duration::from_millis(10));

    assert_eq!(
      *seen.lock(),
      vec![Notification::MOVED, Notification::RESIZED, Notification::MOVED]
    );
    sim.pump(Duration::ZERO);
    assert_eq!(seen.lock().len(), 3);
  }

  #[test]
  fn unregistering_honours_latency_and_failure() {
    let sim = SimBackend::new();
    let (_, h) = app(&sim);
    let observer = sim.create_observer(ProcessId(42), Arc::new(|_| {})).unwrap();
    sim.add_notification(&observer, &h, &Notification::MOVED).unwrap();

    sim.fail_unregister(Some(ErrorCode::CannotComplete));
    assert_eq!(
      sim.remove_notification(&observer, &h, &Notification::MOVED),
      Err(ErrorCode::CannotComplete)
    );
    sim.fail_unregister(None);

    sim.set_unregister_latency(Duration::from_millis(30));
    let started = std::time::Instant::now();
    sim.remove_notification(&observer, &h, &Notification::MOVED).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(30));
  }

  #[test]
  fn double_registration_is_reported() {
    let sim = SimBackend::new();
    let (_, h) = app(&sim);
    let observer = sim.create_observer(ProcessId(42), Arc::new(|_| {})).unwrap();
    sim.add_notification(&observer, &h, &Notification::MOVED).unwrap();
    assert_eq!(
      sim.add_notification(&observer, &h, &Notification::MOVED),
      Err(ErrorCode::NotificationAlreadyRegistered)
    );
    assert_eq!(
      sim.remove_notification(&observer, &h, &Notification::RESIZED),
      Err(ErrorCode::NotificationNotRegistered)
    );
  }

  #[test]
  fn slow_node_times_out_at_instance_limit() {
    let sim = SimBackend::new();
    let (id, h) = app(&sim);
    sim.set_latency(id, Duration::from_millis(200));
    sim.set_messaging_timeout(&h, 0.02).unwrap();
    assert_eq!(sim.pid(&h), Err(ErrorCode::CannotComplete));
  }
}
