//! # game
//!
//! Wires the clock and the key to the VM:
//!
//!  * every debounced press is a steer event
//!  * every elapsed deadline is a tick event, after which the deadline is
//!    armed again with the VM's step time
//!
//! Around the rounds sit the attract mode (the demo drives itself and
//! never crashes), the countdown, the flashing car counter between rounds
//! and the score.
use crate::clock::Clock;
use crate::cpu::{Cpu, PowerOff};
use crate::display::Display;
use crate::input::Key;
use crate::track::Track;
use crate::ui::Ui;
use crate::vm::{Vm, VmFault};
use thiserror::Error;

const START_TEXT: &str = "Press to play ";

/// demo speed; quick enough to look like someone's playing
const DEMO_SPEED: u8 = 50;

/// successful steers before the demo goes back to the start text
const DEMO_STEERS: u8 = 20;

/// the demo only steers this close to the next step
const DEMO_STEER_TICKS: u8 = 5;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameError {
    #[error(transparent)]
    PowerOff(#[from] PowerOff),
    #[error("vm fault: {0}")]
    Fault(#[from] VmFault),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    /// speed at the start of every game
    pub start_speed: u8,
    /// go straight to the first game
    pub skip_demo: bool,
}

pub struct Game<'a> {
    ui: Ui<'a>,
    vm: Vm<'a>,
    options: Options,
}

impl<'a> Game<'a> {
    pub fn new(
        clock: &'a Clock,
        key: &'a Key,
        display: &'a Display,
        cpu: &'a dyn Cpu,
        track: Track,
        options: Options,
    ) -> Game<'a> {
        Game {
            ui: Ui {
                clock,
                key,
                display,
                cpu,
            },
            vm: Vm::new(display, track),
            options,
        }
    }

    pub fn vm(&self) -> &Vm<'a> {
        &self.vm
    }

    /// play forever; only returns on power off or a broken track
    pub fn run(&mut self) -> Result<(), GameError> {
        if !self.options.skip_demo {
            self.demo_loop()?;
        }
        self.ui.wait_key_released()?;
        loop {
            self.game_loop()?;
            self.ui.wait_key_released()?;
            self.score_loop()?;
            self.ui.wait_key_released()?;
        }
    }

    /// show a fault for good: an 'E' with its dot, until the power goes
    pub fn halt(&self, fault: VmFault) -> PowerOff {
        log::error!("halted: {}", fault);
        self.ui.display.show_char(b'E' | 0x80);
        self.ui.clock.disable();
        loop {
            if let Err(off) = self.ui.cpu.idle() {
                return off;
            }
        }
    }

    /// attract mode; returns when the key goes down
    pub fn demo_loop(&mut self) -> Result<(), GameError> {
        let Ui {
            clock, key, cpu, ..
        } = self.ui;
        log::info!("demo");
        loop {
            if self.ui.display_string(START_TEXT)? {
                return Ok(());
            }
            let mut steers = DEMO_STEERS;

            self.vm.reset(DEMO_SPEED);
            self.vm.tick_event()?;
            clock.enable(self.vm.wait_ticks());
            while steers > 0 {
                key.run();
                if key.pressed() {
                    return Ok(());
                }

                // the low bits of the tick counter make a cheap dice
                if clock.remaining_ticks() < DEMO_STEER_TICKS
                    && self.vm.may_steer_safely()
                    && (clock.ticks() & 0x0f) < 4
                {
                    if !self.vm.steer_event()? {
                        break;
                    }
                    clock.enable(self.vm.wait_ticks());
                    steers -= 1;
                }

                if clock.elapsed() {
                    self.vm.tick_event()?;
                    clock.enable(self.vm.wait_ticks());
                }
                cpu.idle()?;
            }
        }
    }

    /// one round, until the car crashes
    pub fn play_round(&mut self) -> Result<(), GameError> {
        let Ui {
            clock, key, cpu, ..
        } = self.ui;
        self.vm.tick_event()?;
        clock.enable(self.vm.wait_ticks());
        loop {
            key.run();
            if key.pressed() && !self.vm.steer_event()? {
                return Ok(());
            }
            if clock.elapsed() {
                self.vm.tick_event()?;
                clock.enable(self.vm.wait_ticks());
            }
            cpu.idle()?;
        }
    }

    /// one game, until the last car crashes
    pub fn game_loop(&mut self) -> Result<(), GameError> {
        self.vm.reset(self.options.start_speed);
        log::info!("new game at speed {}", self.options.start_speed);
        self.ui.display_countdown(3)?;
        loop {
            self.play_round()?;
            log::info!(
                "crash: score {}, {} cars left",
                self.vm.score(),
                self.vm.remaining_cars()
            );
            self.ui.display_flashing_digit(self.vm.remaining_cars())?;
            if self.vm.game_over() {
                return Ok(());
            }
        }
    }

    /// scroll the score until the key goes down
    pub fn score_loop(&mut self) -> Result<(), GameError> {
        let text = format!("Score {} Press to play again ", self.vm.score());
        log::info!("game over, score {}", self.vm.score());
        while !self.ui.display_string(&text)? {}
        Ok(())
    }
}
