//! One-shot readiness signal
//!
//! Armed once by the receive worker when the handshake completes; observed
//! by any number of listeners, whether they arrive before or after arming.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use crate::handler::panic_message;

type Listener = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct SignalState {
    armed: bool,
    listeners: Vec<Listener>,
    subscribers: Vec<Sender<()>>,
}

/// One-shot, multi-listener notification.
///
/// ## Listener styles:
/// - `listen(f)`: callback, run on the arming thread (or immediately)
/// - `subscribe()`: channel that yields exactly one `()`
/// - `wait()` / `wait_timeout()`: block the calling thread
#[derive(Default)]
pub struct ReadySignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the signal. Returns false if it was already armed.
    pub fn arm(&self) -> bool {
        let (listeners, subscribers) = {
            let mut state = self.state.lock();
            if state.armed {
                return false;
            }
            state.armed = true;
            (
                std::mem::take(&mut state.listeners),
                std::mem::take(&mut state.subscribers),
            )
        };
        self.cond.notify_all();

        for tx in subscribers {
            // A dropped receiver is not an error.
            let _ = tx.send(());
        }
        for listener in listeners {
            run_listener(listener);
        }
        true
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    /// Run `f` once the signal is armed; immediately if it already is
    pub fn listen(&self, f: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.state.lock();
            if !state.armed {
                state.listeners.push(Box::new(f));
                return;
            }
        }
        run_listener(Box::new(f));
    }

    /// A receiver that yields once the signal is armed
    pub fn subscribe(&self) -> Receiver<()> {
        let (tx, rx) = channel::bounded(1);
        let mut state = self.state.lock();
        if state.armed {
            let _ = tx.send(());
        } else {
            state.subscribers.push(tx);
        }
        rx
    }

    /// Block until armed
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while !state.armed {
            self.cond.wait(&mut state);
        }
    }

    /// Block until armed or `timeout` elapses. Returns whether it is armed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.armed {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.armed;
            }
        }
        true
    }
}

/// A panicking listener is logged; the arming thread carries on.
fn run_listener(listener: Listener) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(listener)) {
        tracing::error!("Readiness listener panicked: {}", panic_message(payload.as_ref()));
    }
}

impl std::fmt::Debug for ReadySignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadySignal")
            .field("armed", &self.is_armed())
            .finish()
    }
}
