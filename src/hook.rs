//! Hook registry for circuit breaker events.

use crate::error::Rejection;
use crate::state::State;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::Arc;

type HookFn = Arc<dyn Fn() + Send + Sync + 'static>;
type RejectionHookFn = Arc<dyn Fn(&Rejection) + Send + Sync + 'static>;

// Most registries carry one or two callbacks per event.
type Hooks<F> = RwLock<SmallVec<[F; 2]>>;

/// A registry for circuit breaker event hooks.
///
/// Any number of callbacks can be registered per event; they run in
/// registration order, on the calling thread, after the breaker has released
/// its lock. A hook may register further hooks.
#[derive(Default)]
pub struct HookRegistry {
    on_open: Hooks<HookFn>,
    on_close: Hooks<HookFn>,
    on_half_open: Hooks<HookFn>,
    on_success: Hooks<HookFn>,
    on_failure: Hooks<HookFn>,
    on_rejected: Hooks<RejectionHookFn>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("on_open", &self.on_open.read().len())
            .field("on_close", &self.on_close.read().len())
            .field("on_half_open", &self.on_half_open.read().len())
            .field("on_success", &self.on_success.read().len())
            .field("on_failure", &self.on_failure.read().len())
            .field("on_rejected", &self.on_rejected.read().len())
            .finish()
    }
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hook called when the circuit breaker opens.
    pub fn on_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_open.write().push(Arc::new(f));
    }

    /// Adds a hook called when the circuit breaker closes.
    pub fn on_close<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_close.write().push(Arc::new(f));
    }

    /// Adds a hook called when the circuit breaker half-opens.
    pub fn on_half_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_half_open.write().push(Arc::new(f));
    }

    /// Adds a hook called when a call succeeds.
    pub fn on_success<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_success.write().push(Arc::new(f));
    }

    /// Adds a hook called when a call fails or aborts.
    pub fn on_failure<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_failure.write().push(Arc::new(f));
    }

    /// Adds a hook called when a call is refused without running.
    pub fn on_rejected<F>(&self, f: F)
    where
        F: Fn(&Rejection) + Send + Sync + 'static,
    {
        self.on_rejected.write().push(Arc::new(f));
    }

    /// Executes the hooks for entering `to`.
    pub(crate) fn execute_state_transition_hook(&self, to: State) {
        let hooks = match to {
            State::Open => &self.on_open,
            State::Closed => &self.on_close,
            State::HalfOpen => &self.on_half_open,
        };
        run(hooks);
    }

    pub(crate) fn execute_success_hook(&self) {
        run(&self.on_success);
    }

    pub(crate) fn execute_failure_hook(&self) {
        run(&self.on_failure);
    }

    pub(crate) fn execute_rejection_hook(&self, rejection: &Rejection) {
        // Snapshot so a hook can register more hooks without deadlocking.
        let hooks = self.on_rejected.read().clone();
        for hook in hooks {
            hook(rejection);
        }
    }
}

fn run(hooks: &Hooks<HookFn>) {
    let hooks = hooks.read().clone();
    for hook in hooks {
        hook();
    }
}
