//! # ui
//!
//! Small animations built on the public side of the clock, key and display.
//! They all share the clock's single deadline, so none of them can run while
//! a round is timing its steps.
use crate::clock::{Clock, TICKS_PER_SEC};
use crate::cpu::{Cpu, PowerOff};
use crate::display::Display;
use crate::input::{Key, KeyState};

/// half period of a flashing digit, in ticks
pub const FLASH_SPEED: u8 = 5;

/// flashes of `display_flashing_digit()` before it gives up on the player
const FLASHES: u8 = 20;

#[derive(Clone, Copy)]
pub struct Ui<'a> {
    pub clock: &'a Clock,
    pub key: &'a Key,
    pub display: &'a Display,
    pub cpu: &'a dyn Cpu,
}

fn digit(value: u8) -> u8 {
    b'0' + value.min(9)
}

impl<'a> Ui<'a> {
    /// loop until the key is up. doesn't clear the key's changed flag
    pub fn wait_key_released(&self) -> Result<(), PowerOff> {
        while self.key.state() == KeyState::Pressed {
            self.key.run();
            self.cpu.idle()?;
        }
        Ok(())
    }

    /// true if the key went down, false if the deadline elapsed first
    pub fn wait_key_pressed_or_timer_elapsed(&self) -> Result<bool, PowerOff> {
        loop {
            self.key.run();
            if self.key.pressed() {
                return Ok(true);
            }
            if self.clock.elapsed() {
                return Ok(false);
            }
            self.cpu.idle()?;
        }
    }

    /// count down a second per digit from `count` (at most 9), then flash
    /// the last digit for a second. the key is ignored
    pub fn display_countdown(&self, count: u8) -> Result<(), PowerOff> {
        let mut count = count.min(9);
        let mut flashes = TICKS_PER_SEC / FLASH_SPEED;

        self.display.show_char(if count > 0 { digit(count) } else { b' ' });
        self.clock.enable(if count > 0 { TICKS_PER_SEC } else { FLASH_SPEED });
        loop {
            self.key.run();
            if self.clock.elapsed() {
                if count > 1 {
                    count -= 1;
                    self.clock.enable(TICKS_PER_SEC);
                    self.display.show_char(digit(count));
                } else {
                    count = 0;
                    self.clock.enable(FLASH_SPEED);
                    self.display
                        .show_char(if flashes & 1 != 0 { digit(count) } else { b' ' });
                    flashes -= 1;
                    if flashes == 0 {
                        return Ok(());
                    }
                }
            }
            self.cpu.idle()?;
        }
    }

    /// flash `value` (at most 9) until the key goes down or it's flashed
    /// long enough; the display is off afterwards
    pub fn display_flashing_digit(&self, value: u8) -> Result<(), PowerOff> {
        self.wait_key_released()?;

        let mut flash = 0;
        self.clock.enable(FLASH_SPEED);
        self.display.show_char(digit(value));
        loop {
            self.key.run();
            if self.key.pressed() {
                break;
            }
            if self.clock.elapsed() {
                self.clock.enable(FLASH_SPEED);
                self.display
                    .show_char(if flash & 1 != 0 { digit(value) } else { b' ' });
                flash += 1;
                if flash == FLASHES {
                    break;
                }
            }
            self.cpu.idle()?;
        }
        self.display.off();
        Ok(())
    }

    /// show a character for half a second, then a tick of blank so repeated
    /// letters stay apart. true if the key went down meanwhile
    pub fn display_char(&self, code: u8) -> Result<bool, PowerOff> {
        self.display.show_char(code);
        self.clock.enable(TICKS_PER_SEC / 2);
        if self.wait_key_pressed_or_timer_elapsed()? {
            return Ok(true);
        }
        self.display.off();
        self.clock.enable(1);
        self.wait_key_pressed_or_timer_elapsed()
    }

    /// show `text` a character at a time. true if the key went down
    pub fn display_string(&self, text: &str) -> Result<bool, PowerOff> {
        for code in text.bytes() {
            if self.display_char(code)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{char_to_segs, Latch};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::sync::Arc;

    /// ticks the clock once per idle and records what the display shows
    struct Bench {
        clock: Arc<Clock>,
        key: Key,
        display: Display,
        idles: Cell<u32>,
        shown: RefCell<Vec<u8>>,
        presses: HashMap<u32, bool>,
        limit: u32,
    }

    impl Bench {
        fn new(presses: &[(u32, bool)], limit: u32) -> Bench {
            let clock = Arc::new(Clock::new());
            clock.init();
            let key = Key::new(Arc::clone(&clock));
            key.init(false);
            let display = Display::new(Latch::new());
            display.init();
            Bench {
                clock,
                key,
                display,
                idles: Cell::new(0),
                shown: RefCell::new(Vec::new()),
                presses: presses.iter().copied().collect(),
                limit,
            }
        }

        fn ui(&self) -> Ui<'_> {
            Ui {
                clock: &self.clock,
                key: &self.key,
                display: &self.display,
                cpu: self,
            }
        }
    }

    impl Cpu for Bench {
        fn idle(&self) -> Result<(), PowerOff> {
            let n = self.idles.get() + 1;
            self.idles.set(n);
            if n > self.limit {
                return Err(PowerOff);
            }
            let segs = self.display.segments();
            let mut shown = self.shown.borrow_mut();
            if shown.last() != Some(&segs) {
                shown.push(segs);
            }
            self.clock.on_tick();
            if let Some(level) = self.presses.get(&n) {
                self.key.pin_changed(*level);
            }
            Ok(())
        }
    }

    #[test]
    fn test_digit_clamps() {
        assert_eq!(digit(3), b'3');
        assert_eq!(digit(42), b'9');
    }

    #[test]
    fn test_countdown() -> Result<(), PowerOff> {
        let bench = Bench::new(&[(10, true)], 1000);
        bench.ui().display_countdown(3)?;
        // three seconds of digits, then ten flashes of 5 ticks; the last
        // one ends the countdown as soon as it's shown
        assert_eq!(bench.idles.get(), 3 * 50 + 9 * 5);
        let shown = bench.shown.borrow();
        assert_eq!(
            shown[..4],
            [
                char_to_segs(b'3'),
                char_to_segs(b'2'),
                char_to_segs(b'1'),
                0
            ]
        );
        assert!(shown.contains(&char_to_segs(b'0')));
        Ok(())
    }

    #[test]
    fn test_display_string_runs_to_the_end() -> Result<(), PowerOff> {
        let bench = Bench::new(&[], 1000);
        assert!(!bench.ui().display_string("Hi")?);
        let shown = bench.shown.borrow();
        assert_eq!(
            *shown,
            vec![char_to_segs(b'H'), 0, char_to_segs(b'i'), 0]
        );
        Ok(())
    }

    #[test]
    fn test_display_string_stops_on_press() -> Result<(), PowerOff> {
        let bench = Bench::new(&[(30, true)], 1000);
        assert!(bench.ui().display_string("Press to play")?);
        assert!(bench.idles.get() < 40);
        Ok(())
    }

    #[test]
    fn test_flashing_digit_gives_up() -> Result<(), PowerOff> {
        let bench = Bench::new(&[], 1000);
        bench.ui().display_flashing_digit(2)?;
        assert_eq!(bench.idles.get(), u32::from(FLASHES) * u32::from(FLASH_SPEED));
        assert_eq!(bench.display.segments(), 0);
        assert!(!bench.display.is_multiplexing());
        Ok(())
    }

    #[test]
    fn test_flashing_digit_waits_for_release_first() -> Result<(), PowerOff> {
        // still pressed from the crash
        let bench = Bench::new(&[(1, true), (8, false), (20, true)], 1000);
        bench.key.pin_changed(true);
        bench.ui().display_flashing_digit(1)?;
        // released at 8, pressed again at 20
        assert!(bench.idles.get() >= 20 && bench.idles.get() < 25);
        Ok(())
    }

    #[test]
    fn test_power_off_unwinds() {
        let bench = Bench::new(&[], 10);
        assert_eq!(bench.ui().display_string("Score 10"), Err(PowerOff));
    }
}
