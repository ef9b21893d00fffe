//! # input
//!
//! The key is debounced with its own edge interrupt rather than by sampling:
//!
//!  1. idle: the edge opposite to the debounced state is armed
//!  2. edge fires: the new state is latched from *which* edge fired, the edge
//!     interrupt is disarmed, `changed` is raised and the current tick is
//!     recorded as the start of the debounce window
//!  3. main loop (`run()`): once `DEBOUNCE_TICKS` have gone by since the edge,
//!     the opposite edge is armed again
//!
//! A bouncing contact can't produce more than one change per window, since
//! nothing is listening while the window is open.
use crate::clock::Clock;
use crate::irq::IrqLine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// ticks the key must be left alone after a change
pub const DEBOUNCE_TICKS: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyState {
    Released,
    Pressed,
}

impl From<bool> for KeyState {
    fn from(level: bool) -> Self {
        if level {
            KeyState::Pressed
        } else {
            KeyState::Released
        }
    }
}

/// which pin transition the edge interrupt listens for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sense {
    Rising,
    Falling,
}

impl Sense {
    /// the edge that would take the key out of `pressed`
    fn leaving(pressed: bool) -> Self {
        if pressed {
            Sense::Falling
        } else {
            Sense::Rising
        }
    }

    fn matches(self, level: bool) -> bool {
        match self {
            Sense::Rising => level,
            Sense::Falling => !level,
        }
    }
}

/// owned by the edge interrupt
struct Edge {
    sense: Sense,
    changed: bool,
    window_start: u8,
}

pub struct Key {
    clock: Arc<Clock>,
    inited: AtomicBool,
    pressed: AtomicBool,
    // armed/disarmed is the line's enable bit
    edge_irq: IrqLine<Edge>,
}

impl Key {
    pub fn new(clock: Arc<Clock>) -> Self {
        Key {
            clock,
            inited: AtomicBool::new(false),
            pressed: AtomicBool::new(false),
            edge_irq: IrqLine::new(
                "key-edge",
                Edge {
                    sense: Sense::Rising,
                    changed: false,
                    window_start: 0,
                },
            ),
        }
    }

    /// start watching the key. `level` is the pin as it reads right now and
    /// is assumed stable. later calls do nothing
    pub fn init(&self, level: bool) {
        if self.inited.swap(true, Ordering::AcqRel) {
            return;
        }
        self.pressed.store(level, Ordering::Relaxed);
        {
            let mut edge = self.edge_irq.mask();
            edge.sense = Sense::leaving(level);
            edge.changed = false;
            edge.window_start = self.clock.ticks();
        }
        self.edge_irq.enable();
        log::debug!("key watching, initially {:?}", KeyState::from(level));
    }

    /// true if the key changed state since the last call
    pub fn changed(&self) -> bool {
        let mut edge = self.edge_irq.mask();
        std::mem::replace(&mut edge.changed, false)
    }

    pub fn state(&self) -> KeyState {
        KeyState::from(self.pressed.load(Ordering::Relaxed))
    }

    /// true if the key went down since the last call
    pub fn pressed(&self) -> bool {
        self.changed() && self.state() == KeyState::Pressed
    }

    /// debounce bookkeeping; call on every pass of the main loop
    pub fn run(&self) {
        if self.edge_irq.is_enabled() {
            return;
        }
        let mut edge = self.edge_irq.mask();
        let elapsed = self.clock.ticks().wrapping_sub(edge.window_start);
        if elapsed < DEBOUNCE_TICKS {
            return;
        }
        edge.sense = Sense::leaving(self.pressed.load(Ordering::Relaxed));
        self.edge_irq.enable();
    }

    /// the pin's edge detector: called by the hardware whenever the level
    /// on the key pin changes
    pub fn pin_changed(&self, level: bool) {
        self.edge_irq.raise(|edge| {
            if !edge.sense.matches(level) {
                return;
            }
            self.pressed.store(edge.sense == Sense::Rising, Ordering::Relaxed);
            self.edge_irq.disable();
            edge.changed = true;
            edge.window_start = self.clock.ticks();
        });
    }

    /// true while the debounce window is open
    pub fn debouncing(&self) -> bool {
        self.inited.load(Ordering::Relaxed) && !self.edge_irq.is_enabled()
    }
}
