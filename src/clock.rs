//! # clock
//!
//! Two periodic sources drive this service, the same way a microcontroller
//! RTC does:
//!
//!  * the tick source at `TICKS_PER_SEC` (overflow interrupt)
//!  * the seconds source at 1 Hz (periodic interrupt)
//!
//! The tick counter is a single byte and wraps often; it's read without any
//! masking. The seconds counter is two bytes wide so reads mask the seconds
//! source. On top of the ticks sits a one-shot deadline which the tick
//! handler triggers when the counter reaches the armed target.
use crate::irq::IrqLine;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// number of ticks in one second
pub const TICKS_PER_SEC: u8 = 50;

pub struct Clock {
    inited: AtomicBool,
    ticks: AtomicU8,
    armed: AtomicBool,
    triggered: AtomicBool,
    // tick source; owns the deadline target
    tick_irq: IrqLine<u8>,
    // seconds source; owns the seconds counter
    secs_irq: IrqLine<u16>,
}

impl Clock {
    pub const fn new() -> Self {
        Clock {
            inited: AtomicBool::new(false),
            ticks: AtomicU8::new(0),
            armed: AtomicBool::new(false),
            triggered: AtomicBool::new(false),
            tick_irq: IrqLine::new("rtc-ovf", 0),
            secs_irq: IrqLine::new("rtc-pit", 0),
        }
    }

    /// start counting ticks and seconds. later calls do nothing
    pub fn init(&self) {
        if self.inited.swap(true, Ordering::AcqRel) {
            return;
        }
        self.tick_irq.enable();
        self.secs_irq.enable();
        log::debug!("clock running at {} ticks/s", TICKS_PER_SEC);
    }

    /// zero both counters and cancel the deadline
    pub fn reset(&self) {
        self.armed.store(false, Ordering::Relaxed);
        self.ticks.store(0, Ordering::Relaxed);
        *self.secs_irq.mask() = 0;
    }

    /// elapsed ticks, modulo 256
    pub fn ticks(&self) -> u8 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// elapsed seconds
    pub fn seconds(&self) -> u16 {
        *self.secs_irq.mask()
    }

    /// arm the deadline `ticks` ticks from now, replacing any previous one
    pub fn enable(&self, ticks: u8) {
        self.armed.store(true, Ordering::Relaxed);
        let mut target = self.tick_irq.mask();
        *target = ticks.wrapping_add(self.ticks());
        self.triggered.store(false, Ordering::Relaxed);
    }

    /// disarm the deadline. a disarmed deadline never elapses
    pub fn disable(&self) {
        self.armed.store(false, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> bool {
        self.armed.load(Ordering::Relaxed) && self.triggered.load(Ordering::Relaxed)
    }

    /// ticks left before the deadline; 0 once elapsed or when disarmed
    pub fn remaining_ticks(&self) -> u8 {
        if !self.armed.load(Ordering::Relaxed) || self.triggered.load(Ordering::Relaxed) {
            return 0;
        }
        let target = *self.tick_irq.mask();
        target.wrapping_sub(self.ticks())
    }

    /// tick interrupt handler
    pub fn on_tick(&self) {
        self.tick_irq.raise(|target| {
            let now = self.ticks.load(Ordering::Relaxed).wrapping_add(1);
            self.ticks.store(now, Ordering::Relaxed);
            if now == *target {
                self.triggered.store(true, Ordering::Relaxed);
            }
        });
    }

    /// seconds interrupt handler
    pub fn on_second(&self) {
        self.secs_irq.raise(|secs| *secs = secs.wrapping_add(1));
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::new()
    }
}
