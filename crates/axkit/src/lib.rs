/*!
axkit - typed client for the macOS accessibility service

```ignore
use axkit::{Accessibility, Notification, ProcessId, RunLoop};
use axkit::platform::macos::MacBackend;

// Fails with ApiDisabled until the user grants permission
let ax = Accessibility::connect(MacBackend::new(), true)?;
ax.set_global_messaging_timeout(1.0)?;

// Reads fold "no value" into None
let app = ax.application(ProcessId(pid));
for window in app.windows()? {
  println!("{window} at {:?}", window.frame()?);
}

// Notifications are dispatched on the run loop that pumps them
let run_loop = RunLoop::new();
let observer = ax.create_observer(ProcessId(pid), &run_loop, |_, element, notification, _| {
  println!("{notification}: {element}");
})?;
observer.add_notification(&Notification::WINDOW_CREATED, &app)?;
run_loop.run();
```
*/

mod access;
mod codec;
mod element;
mod messaging;
mod observer;
mod runloop;
mod window;

pub mod a11y;
pub mod platform;

mod types;
pub use types::*;

pub use crate::a11y::{FromValue, Value, ValueType};
pub use crate::access::Accessibility;
pub use crate::element::UIElement;
pub use crate::messaging::PLATFORM_DEFAULT_TIMEOUT;
pub use crate::observer::{
  Callback, Coalescer, NotificationInfo, Observer, ObserverConfig, DEFAULT_CHANNEL_CAPACITY,
};
pub use crate::platform::{Backend, WireValue};
pub use crate::runloop::{EventSource, RunLoop, Task};
pub use crate::window::Window;
