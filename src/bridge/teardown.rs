//! Ordered, run-once teardown of held resources.

use std::sync::Mutex;

use crate::error::LockResultExt;

type ReleaseAction = Box<dyn FnOnce() + Send>;

/// An explicit ordered list of release actions invoked on teardown.
///
/// Actions run in registration order, exactly once. Running is idempotent
/// and safe to trigger concurrently or from a failure path; actions
/// registered after the teardown has run are executed immediately.
pub(crate) struct Teardown {
    actions: Mutex<TeardownState>,
}

struct TeardownState {
    pending: Vec<ReleaseAction>,
    ran: bool,
}

impl Teardown {
    pub(crate) fn new() -> Self {
        Self {
            actions: Mutex::new(TeardownState {
                pending: Vec::new(),
                ran: false,
            }),
        }
    }

    /// Register a release action.
    pub(crate) fn defer(&self, action: impl FnOnce() + Send + 'static) {
        let mut state = self.actions.lock().recover_poison("teardown defer");
        if state.ran {
            drop(state);
            action();
        } else {
            state.pending.push(Box::new(action));
        }
    }

    /// Run all registered actions in order. Subsequent calls are no-ops.
    pub(crate) fn run(&self) {
        let pending = {
            let mut state = self.actions.lock().recover_poison("teardown run");
            state.ran = true;
            std::mem::take(&mut state.pending)
        };
        for action in pending {
            action();
        }
    }

    /// Whether teardown has already run.
    pub(crate) fn has_run(&self) -> bool {
        self.actions.lock().recover_poison("teardown state").ran
    }
}
