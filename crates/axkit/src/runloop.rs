/*!
Event-processing context.

A [`RunLoop`] owns a queue of continuations and the event sources attached
to it. Each turn pumps the sources (which post deliveries), then runs
exactly the tasks that were queued when the turn started. Anything posted
during a turn runs in the next one, which is what makes "after the current
burst" continuations possible.

Turns are serialized. Running a turn from inside a task on the same thread
is allowed and simply nests.
*/

use parking_lot::{Mutex, ReentrantMutex};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A unit of work posted to a [`RunLoop`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Something that produces work for a run loop when pumped.
pub trait EventSource: Send + Sync {
  /// Run for at most `wait`, posting whatever arrived.
  fn pump(&self, wait: Duration);
}

/// How long [`RunLoop::run`] blocks in a source per turn when idle.
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Turn limit for [`RunLoop::run_until_idle`], guarding against tasks that
/// keep re-posting themselves.
const MAX_IDLE_TURNS: usize = 1024;

struct Inner {
  queue: Mutex<VecDeque<Task>>,
  sources: Mutex<Vec<Arc<dyn EventSource>>>,
  turn: ReentrantMutex<()>,
  stopped: AtomicBool,
}

/// Single logical event-processing context. Clone is cheap and shares the
/// same loop.
#[derive(Clone)]
pub struct RunLoop {
  inner: Arc<Inner>,
}

impl fmt::Debug for RunLoop {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RunLoop")
      .field("queued", &self.inner.queue.lock().len())
      .field("sources", &self.inner.sources.lock().len())
      .finish()
  }
}

impl Default for RunLoop {
  fn default() -> Self {
    Self::new()
  }
}

impl RunLoop {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Inner {
        queue: Mutex::new(VecDeque::new()),
        sources: Mutex::new(Vec::new()),
        turn: ReentrantMutex::new(()),
        stopped: AtomicBool::new(false),
      }),
    }
  }

  /// Enqueue a continuation for a later turn.
  pub fn post(&self, task: impl FnOnce() + Send + 'static) {
    self.inner.queue.lock().push_back(Box::new(task));
  }

  /// Attach an event source. Attaching the same source twice is a no-op.
  pub fn attach(&self, source: Arc<dyn EventSource>) {
    let mut sources = self.inner.sources.lock();
    let ptr = Arc::as_ptr(&source).cast::<()>();
    if !sources.iter().any(|s| Arc::as_ptr(s).cast::<()>() == ptr) {
      sources.push(source);
    }
  }

  /// Number of tasks waiting for a turn.
  pub fn pending(&self) -> usize {
    self.inner.queue.lock().len()
  }

  /// One turn: pump sources for up to `wait`, then run the tasks queued at
  /// that point. Returns how many tasks ran.
  ///
  /// With several sources only the first one may block; the rest are
  /// polled.
  pub fn run_once(&self, wait: Duration) -> usize {
    let _turn = self.inner.turn.lock();

    // Never block when work is already waiting.
    let mut wait = if self.pending() > 0 { Duration::ZERO } else { wait };
    let sources: Vec<_> = self.inner.sources.lock().clone();
    for source in sources {
      source.pump(wait);
      wait = Duration::ZERO;
    }

    let batch: Vec<Task> = self.inner.queue.lock().drain(..).collect();
    let ran = batch.len();
    for task in batch {
      if catch_unwind(AssertUnwindSafe(task)).is_err() {
        log::warn!("RunLoop task panicked");
      }
    }
    ran
  }

  /// Run turns without blocking until a turn finds nothing to do. Returns
  /// the total number of tasks run.
  pub fn run_until_idle(&self) -> usize {
    let mut total = 0;
    for _ in 0..MAX_IDLE_TURNS {
      let ran = self.run_once(Duration::ZERO);
      if ran == 0 {
        return total;
      }
      total += ran;
    }
    log::warn!("RunLoop still busy after {MAX_IDLE_TURNS} turns");
    total
  }

  /// Run turns until [`stop`](Self::stop) is called.
  pub fn run(&self) {
    self.inner.stopped.store(false, Ordering::SeqCst);
    while !self.inner.stopped.load(Ordering::SeqCst) {
      self.run_once(IDLE_WAIT);
    }
  }

  /// Make [`run`](Self::run) return after the current turn. Safe to call
  /// from a task or from another thread.
  pub fn stop(&self) {
    self.inner.stopped.store(true, Ordering::SeqCst);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;

  #[test]
  fn tasks_posted_during_a_turn_run_next_turn() {
    let rl = RunLoop::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let (rl2, log2) = (rl.clone(), Arc::clone(&log));
    rl.post(move || {
      log2.lock().push("first");
      let log3 = Arc::clone(&log2);
      rl2.post(move || log3.lock().push("later"));
    });

    assert_eq!(rl.run_once(Duration::ZERO), 1);
    assert_eq!(*log.lock(), vec!["first"]);
    assert_eq!(rl.run_once(Duration::ZERO), 1);
    assert_eq!(*log.lock(), vec!["first", "later"]);
  }

  #[test]
  fn panicking_task_does_not_stop_the_turn() {
    let rl = RunLoop::new();
    let count = Arc::new(AtomicUsize::new(0));
    rl.post(|| panic!("boom"));
    let c = Arc::clone(&count);
    rl.post(move || {
      c.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(rl.run_once(Duration::ZERO), 2);
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn run_returns_after_stop() {
    let rl = RunLoop::new();
    let rl2 = rl.clone();
    rl.post(move || rl2.stop());
    rl.run();
    assert_eq!(rl.pending(), 0);
  }

  #[test]
  fn sources_are_attached_once() {
    struct Counting(AtomicUsize);
    impl EventSource for Counting {
      fn pump(&self, _wait: Duration) {
        self.0.fetch_add(1, Ordering::SeqCst);
      }
    }

    let rl = RunLoop::new();
    let source = Arc::new(Counting(AtomicUsize::new(0)));
    rl.attach(source.clone());
    rl.attach(source.clone());
    rl.run_once(Duration::ZERO);
    assert_eq!(source.0.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn nested_turns_on_the_same_thread_do_not_deadlock() {
    let rl = RunLoop::new();
    let rl2 = rl.clone();
    let inner_ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&inner_ran);
    rl.post(move || {
      let flag = Arc::clone(&flag);
      rl2.post(move || flag.store(true, Ordering::SeqCst));
      rl2.run_once(Duration::ZERO);
    });
    rl.run_once(Duration::ZERO);
    assert!(inner_ran.load(Ordering::SeqCst));
  }

  #[test]
  fn run_until_idle_drains_chains() {
    let rl = RunLoop::new();
    let rl2 = rl.clone();
    rl.post(move || {
      let rl3 = rl2.clone();
      rl2.post(move || rl3.post(|| {}));
    });
    assert_eq!(rl.run_until_idle(), 3);
  }
}
