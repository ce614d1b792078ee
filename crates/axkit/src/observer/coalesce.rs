/*!
After-burst coalescing.

Notifications tend to arrive in bursts: a window move produces a string of
`AXMoved` and `AXResized` deliveries within one turn. A [`Coalescer`] turns
such a burst into a single "settled" call: scheduling while a continuation
is already pending does nothing, and the continuation runs on the next turn
of the same run loop, after every delivery queued in the current one.
*/

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::runloop::RunLoop;

/// Single-shot deferred continuation, re-armed after each run.
#[derive(Clone)]
pub struct Coalescer {
  run_loop: RunLoop,
  pending: Arc<AtomicBool>,
  action: Arc<dyn Fn() + Send + Sync>,
}

impl fmt::Debug for Coalescer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Coalescer")
      .field("pending", &self.is_pending())
      .finish_non_exhaustive()
  }
}

impl Coalescer {
  pub fn new(run_loop: &RunLoop, action: impl Fn() + Send + Sync + 'static) -> Self {
    Self {
      run_loop: run_loop.clone(),
      pending: Arc::new(AtomicBool::new(false)),
      action: Arc::new(action),
    }
  }

  /// Arrange for the action to run after the current burst. Returns `false`
  /// if a run was already pending.
  pub fn schedule(&self) -> bool {
    if self.pending.swap(true, Ordering::AcqRel) {
      return false;
    }
    let pending = Arc::clone(&self.pending);
    let action = Arc::clone(&self.action);
    self.run_loop.post(move || {
      // Cleared first so the action itself may schedule the next run.
      pending.store(false, Ordering::Release);
      action();
    });
    true
  }

  pub fn is_pending(&self) -> bool {
    self.pending.load(Ordering::Acquire)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use std::time::Duration;

  fn counter(rl: &RunLoop) -> (Coalescer, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let coalescer = Coalescer::new(rl, move || {
      c.fetch_add(1, Ordering::SeqCst);
    });
    (coalescer, count)
  }

  #[test]
  fn repeated_schedules_run_once() {
    let rl = RunLoop::new();
    let (coalescer, count) = counter(&rl);

    assert!(coalescer.schedule());
    assert!(!coalescer.schedule());
    assert!(!coalescer.schedule());
    assert!(coalescer.is_pending());

    rl.run_until_idle();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!coalescer.is_pending());
  }

  #[test]
  fn runs_after_the_burst_that_scheduled_it() {
    let rl = RunLoop::new();
    let (coalescer, count) = counter(&rl);
    let seen_before = Arc::new(AtomicUsize::new(usize::MAX));

    // Three deliveries in one turn, each scheduling.
    for _ in 0..3 {
      let (coalescer, count, seen) = (coalescer.clone(), Arc::clone(&count), Arc::clone(&seen_before));
      rl.post(move || {
        seen.store(count.load(Ordering::SeqCst), Ordering::SeqCst);
        coalescer.schedule();
      });
    }

    assert_eq!(rl.run_once(Duration::ZERO), 3);
    assert_eq!(seen_before.load(Ordering::SeqCst), 0);
    assert_eq!(count.load(Ordering::SeqCst), 0);

    assert_eq!(rl.run_once(Duration::ZERO), 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn rearms_for_the_next_burst() {
    let rl = RunLoop::new();
    let (coalescer, count) = counter(&rl);

    coalescer.schedule();
    rl.run_until_idle();
    coalescer.schedule();
    rl.run_until_idle();

    assert_eq!(count.load(Ordering::SeqCst), 2);
  }
}
