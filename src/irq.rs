//! # interrupt lines
//!
//! Every periodic or edge interrupt of the board is an `IrqLine`. The line
//! owns whatever state its handler mutates, so the only ways to reach that
//! state are:
//!
//!  * the handler itself, run by the hardware through `raise()`
//!  * the main loop, through the `Masked` guard returned by `mask()`
//!
//! Holding a `Masked` guard is the equivalent of clearing the interrupt
//! enable bit of *that one source*: a request arriving in the meantime stays
//! pending and is serviced as soon as the guard drops. Other sources keep
//! running, so the display multiplexer never waits on a clock read.
//!
//! Single-byte fields that are written on one side and read on the other
//! don't belong in here; they live next to the line as atomics.
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct IrqLine<T> {
    name: &'static str,
    enabled: AtomicBool,
    state: Mutex<T>,
}

impl<T> IrqLine<T> {
    /// a new line starts disabled
    pub const fn new(name: &'static str, state: T) -> Self {
        IrqLine {
            name,
            enabled: AtomicBool::new(false),
            state: Mutex::new(state),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// let the source request interrupts
    pub fn enable(&self) {
        log::trace!("{} enabled", self.name);
        self.enabled.store(true, Ordering::Release);
    }

    /// stop the source; requests are dropped, not held pending
    pub fn disable(&self) {
        log::trace!("{} disabled", self.name);
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// enter a critical section against this source only
    pub fn mask(&self) -> Masked<'_, T> {
        Masked {
            guard: self.lock(),
        }
    }

    /// hardware side: service one interrupt request. returns false when the
    /// source is disabled and the handler didn't run
    pub fn raise(&self, handler: impl FnOnce(&mut T)) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut state = self.lock();
        handler(&mut state);
        true
    }

    // a handler that panicked leaves the state as it was when it stopped;
    // that's no worse than an ISR cut short by a reset, so carry on with it
    fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::warn!("{}: handler panicked, carrying on with its state", self.name);
            self.state.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }
}

/// scoped critical section; the source is restored when this drops
pub struct Masked<'a, T> {
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for Masked<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for Masked<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
