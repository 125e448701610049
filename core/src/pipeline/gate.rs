use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::prelude::{DetectError, DetectResult};

/// Serializes channel pushes into plane-index order.
///
/// Workers filter in parallel and finish in arbitrary order; the gate holds
/// each one back until every earlier plane has been pushed. Only the push is
/// inside the critical section, never the filtering itself. A single
/// next-to-push counter stands in for a per-boundary lock chain, so reusing
/// a worker for a later plane cannot wedge the hand-off.
pub struct OrderingGate {
    state: Mutex<GateState>,
    turn: Condvar,
}

struct GateState {
    next: u64,
    aborted: bool,
}

impl OrderingGate {
    pub fn new(first_index: u64) -> Self {
        Self {
            state: Mutex::new(GateState {
                next: first_index,
                aborted: false,
            }),
            turn: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // A poisoned lock means a holder panicked; the counter itself is
        // still coherent, so waiters may proceed.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Blocks until it is `plane_index`'s turn to push. The first plane never
    /// waits.
    pub fn await_turn(&self, plane_index: u64, timeout: Duration) -> DetectResult<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.aborted {
                return Err(DetectError::Aborted("ordering gate closed".to_string()));
            }
            if state.next == plane_index {
                return Ok(());
            }
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) => remaining,
                None => {
                    return Err(DetectError::Stalled(format!(
                        "plane {} waited past the stall timeout for its push turn",
                        plane_index
                    )));
                }
            };
            state = match self.turn.wait_timeout(state, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Hands the push turn to `plane_index + 1`. Releasing twice is a no-op.
    pub fn advance(&self, plane_index: u64) {
        let mut state = self.lock();
        if state.next == plane_index {
            state.next = plane_index + 1;
            self.turn.notify_all();
        }
    }

    /// Wakes every waiter and fails all further turns.
    pub fn abort(&self) {
        let mut state = self.lock();
        state.aborted = true;
        self.turn.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    /// Next plane index allowed to push.
    pub fn position(&self) -> u64 {
        self.lock().next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn first_plane_never_waits() {
        let gate = OrderingGate::new(0);
        gate.await_turn(0, Duration::from_millis(10)).unwrap();
        gate.advance(0);
        assert_eq!(gate.position(), 1);
    }

    #[test]
    fn out_of_order_arrivals_release_in_index_order() {
        let gate = Arc::new(OrderingGate::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for plane_index in [2_u64, 1, 0] {
            let gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                gate.await_turn(plane_index, TIMEOUT).unwrap();
                order.lock().unwrap().push(plane_index);
                gate.advance(plane_index);
            }));
            // Stagger starts so the highest index is waiting first.
            thread::sleep(Duration::from_millis(20));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn waiting_past_the_timeout_is_a_stall() {
        let gate = OrderingGate::new(0);
        let result = gate.await_turn(5, Duration::from_millis(50));
        assert!(matches!(result, Err(DetectError::Stalled(_))));
    }

    #[test]
    fn abort_wakes_blocked_waiters() {
        let gate = Arc::new(OrderingGate::new(0));
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.await_turn(3, TIMEOUT))
        };
        thread::sleep(Duration::from_millis(50));
        gate.abort();
        assert!(matches!(
            waiter.join().unwrap(),
            Err(DetectError::Aborted(_))
        ));
    }

    #[test]
    fn double_release_does_not_skip_a_turn() {
        let gate = OrderingGate::new(0);
        gate.advance(0);
        gate.advance(0);
        assert_eq!(gate.position(), 1);
    }
}
