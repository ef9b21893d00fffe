//! The host board: threads stand in for the hardware that raises the
//! interrupts, and the terminal stands in for the digit.
//!
//!  * rtc: 50 Hz, calls the clock's tick handler, and its second handler
//!    every 50 ticks
//!  * mux: 100 Hz, calls the display's multiplexer handler
//!  * keyboard: crossterm key events become levels on the key's pin
//!
//! The game itself runs on the thread that powered the board on, and sees
//! the board only through `Cpu::idle()`.
use crate::clock::{Clock, TICKS_PER_SEC};
use crate::cpu::{Cpu, PowerOff};
use crate::display::{Display, Latch, MUX_INTERVAL};
use crate::input::Key;
use crate::panel::Panel;
use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use spin_sleep::LoopHelper;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// time between two panel frames
const FRAME: Duration = Duration::from_millis(33);

/// how long the game dozes per idle
const DOZE: Duration = Duration::from_millis(1);

/// a terminal only reports key presses, so a held key is one that was
/// pressed (or auto-repeated) this recently. it's shorter than the usual
/// auto-repeat delay to keep quick taps apart: holding the key down gives
/// one release and a second press when the terminal starts repeating
const HOLD: Duration = Duration::from_millis(150);

const KEY_POLL: Duration = Duration::from_millis(5);

/// contact bounces per transition when bounce emulation is on
const BOUNCES: u8 = 3;
const BOUNCE_GAP: Duration = Duration::from_micros(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Steer,
    PowerOff,
}

const KEYMAP: [(char, Action); 4] = [
    (' ', Action::Steer),
    ('q', Action::PowerOff),
    ('Q', Action::PowerOff),
    ('\n', Action::Steer),
];

fn map_key(
    keymap: &HashMap<char, Action>,
    code: KeyCode,
    modifiers: KeyModifiers,
) -> Option<Action> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Action::PowerOff),
        KeyCode::Char(c) => keymap.get(&c).copied(),
        KeyCode::Enter => keymap.get(&'\n').copied(),
        KeyCode::Esc => Some(Action::PowerOff),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BoardOptions {
    /// toggle the key's pin a few times on every transition
    pub bounce: bool,
}

pub struct Board {
    clock: Arc<Clock>,
    key: Arc<Key>,
    display: Arc<Display>,
    latch: Latch,
    power: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    panel: RefCell<Panel>,
    next_frame: Cell<Instant>,
}

impl Board {
    /// bring up the services in order (clock, key, display) and start the
    /// interrupt sources
    pub fn power_on(options: BoardOptions) -> Result<Board, io::Error> {
        let clock = Arc::new(Clock::new());
        let key = Arc::new(Key::new(Arc::clone(&clock)));
        let latch = Latch::new();
        let display = Arc::new(Display::new(latch.clone()));
        clock.init();
        key.init(false);
        display.init();

        let panel = Panel::new()?;
        let power = Arc::new(AtomicBool::new(true));
        let mut board = Board {
            clock,
            key,
            display,
            latch,
            power,
            workers: Vec::new(),
            panel: RefCell::new(panel),
            next_frame: Cell::new(Instant::now()),
        };

        let (clock, power) = (Arc::clone(&board.clock), Arc::clone(&board.power));
        board.spawn("rtc", move || rtc(&clock, &power))?;
        let (display, power) = (Arc::clone(&board.display), Arc::clone(&board.power));
        board.spawn("mux", move || mux(&display, &power))?;
        let (key, power) = (Arc::clone(&board.key), Arc::clone(&board.power));
        board.spawn("keyboard", move || keyboard(&key, &power, options.bounce))?;
        log::info!("powered on");
        Ok(board)
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn is_powered(&self) -> bool {
        self.power.load(Ordering::Relaxed)
    }

    fn spawn(
        &mut self,
        name: &str,
        work: impl FnOnce() + Send + 'static,
    ) -> Result<(), io::Error> {
        let handle = thread::Builder::new().name(name.to_string()).spawn(work)?;
        self.workers.push(handle);
        Ok(())
    }

    fn refresh(&self) {
        let now = Instant::now();
        if now < self.next_frame.get() {
            return;
        }
        self.next_frame.set(now + FRAME);
        let status = format!(
            "up {}s   space: steer   esc: power off",
            self.clock.seconds()
        );
        let drawn = self
            .panel
            .borrow_mut()
            .draw(self.latch.take_seen(), &status);
        if let Err(e) = drawn {
            log::error!("panel: {}", e);
            self.power.store(false, Ordering::Relaxed);
        }
    }
}

impl Cpu for Board {
    fn idle(&self) -> Result<(), PowerOff> {
        if !self.is_powered() {
            return Err(PowerOff);
        }
        self.refresh();
        spin_sleep::sleep(DOZE);
        Ok(())
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        self.power.store(false, Ordering::Relaxed);
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("a board thread panicked");
            }
        }
        log::info!("powered off");
    }
}

/// turns the press reports of a terminal into pin levels
#[derive(Debug, Default)]
struct Hold {
    since: Option<Instant>,
}

impl Hold {
    /// a press was reported; true if the pin has to go down
    fn press(&mut self, now: Instant) -> bool {
        self.since.replace(now).is_none()
    }

    /// true if the pin has to go up: nothing was reported for `HOLD`
    fn expire(&mut self, now: Instant) -> bool {
        match self.since {
            Some(at) if now.saturating_duration_since(at) > HOLD => {
                self.since = None;
                true
            }
            _ => false,
        }
    }
}

fn rtc(clock: &Clock, power: &AtomicBool) {
    let mut pacer = LoopHelper::builder().build_with_target_rate(f64::from(TICKS_PER_SEC));
    let mut ticks = 0;
    while power.load(Ordering::Relaxed) {
        pacer.loop_start();
        clock.on_tick();
        ticks += 1;
        if ticks == TICKS_PER_SEC {
            ticks = 0;
            clock.on_second();
        }
        pacer.loop_sleep();
    }
}

fn mux(display: &Display, power: &AtomicBool) {
    let rate = 1.0 / MUX_INTERVAL.as_secs_f64();
    let mut pacer = LoopHelper::builder().build_with_target_rate(rate);
    while power.load(Ordering::Relaxed) {
        pacer.loop_start();
        display.on_mux();
        pacer.loop_sleep();
    }
}

fn keyboard(key: &Key, power: &AtomicBool, bounce: bool) {
    let keymap = HashMap::from(KEYMAP);
    let mut hold = Hold::default();
    while power.load(Ordering::Relaxed) {
        match read_key(&keymap) {
            Ok(Some(Action::Steer)) => {
                if hold.press(Instant::now()) {
                    drive_pin(key, true, bounce);
                }
            }
            Ok(Some(Action::PowerOff)) => power.store(false, Ordering::Relaxed),
            Ok(None) => {}
            Err(e) => {
                log::error!("keyboard: {}", e);
                power.store(false, Ordering::Relaxed);
            }
        }
        if hold.expire(Instant::now()) {
            drive_pin(key, false, bounce);
        }
    }
}

fn read_key(keymap: &HashMap<char, Action>) -> Result<Option<Action>, io::Error> {
    if !poll(KEY_POLL)? {
        return Ok(None);
    }
    match read()? {
        Event::Key(evt) => {
            let action = map_key(keymap, evt.code, evt.modifiers);
            if action.is_none() {
                log::debug!("unmapped key {:?}", evt.code);
            }
            Ok(action)
        }
        _ => Ok(None),
    }
}

/// set the key's pin to `level`, rattling it first if asked to
fn drive_pin(key: &Key, level: bool, bounce: bool) {
    if bounce {
        for _ in 0..BOUNCES {
            key.pin_changed(level);
            spin_sleep::sleep(BOUNCE_GAP);
            key.pin_changed(!level);
            spin_sleep::sleep(BOUNCE_GAP);
        }
    }
    key.pin_changed(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keymap() {
        let keymap = HashMap::from(KEYMAP);
        let none = KeyModifiers::NONE;
        assert_eq!(map_key(&keymap, KeyCode::Char(' '), none), Some(Action::Steer));
        assert_eq!(map_key(&keymap, KeyCode::Enter, none), Some(Action::Steer));
        assert_eq!(map_key(&keymap, KeyCode::Esc, none), Some(Action::PowerOff));
        assert_eq!(map_key(&keymap, KeyCode::Char('q'), none), Some(Action::PowerOff));
        assert_eq!(
            map_key(&keymap, KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(Action::PowerOff)
        );
        assert_eq!(map_key(&keymap, KeyCode::Char('c'), none), None);
        assert_eq!(map_key(&keymap, KeyCode::Up, none), None);
    }

    #[test]
    fn test_hold_follows_press_reports() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut hold = Hold::default();
        assert!(!hold.expire(t0));

        assert!(hold.press(t0));
        assert!(!hold.expire(t0 + HOLD));
        // quick taps and auto-repeats keep the pin down
        assert!(!hold.press(t0 + ms(100)));
        assert!(!hold.expire(t0 + ms(100) + HOLD));
        assert!(hold.expire(t0 + ms(101) + HOLD));
        assert!(!hold.expire(t0 + ms(500)));

        // a held key that only starts repeating after the hold timeout
        // comes back as a fresh press
        assert!(hold.press(t0 + ms(500)));
    }

    #[test]
    fn test_bouncing_pin_gives_one_press() {
        let clock = Arc::new(Clock::new());
        clock.init();
        let key = Key::new(Arc::clone(&clock));
        key.init(false);

        drive_pin(&key, true, true);
        key.run();
        assert!(key.pressed());
        assert!(!key.pressed());

        // the release bounces too, but only counts once the line re-arms
        for _ in 0..crate::input::DEBOUNCE_TICKS {
            clock.on_tick();
        }
        key.run();
        drive_pin(&key, false, true);
        key.run();
        assert!(key.changed());
        assert!(!key.pressed());
    }

    #[test]
    fn test_rtc_and_mux_stop_with_power() {
        let clock = Clock::new();
        clock.init();
        let display = Display::new(Latch::new());
        display.init();
        let power = AtomicBool::new(false);
        // both return straight away when the power's already off
        rtc(&clock, &power);
        mux(&display, &power);
        assert_eq!(clock.ticks(), 0);
    }
}
