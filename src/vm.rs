//! # game vm
//!
//! The race track is a program. The VM has:
//!  * a program counter into the `Track`
//!  * the instruction last fetched, which decides what a steer does
//!  * score: one point per successful steer
//!  * cars: lives left, 3 to start with
//!  * speed: 0..=255, up by one per successful steer, back to 0 on a crash
//!  * step ticks: how long each segment stays on, derived from speed
//!
//! Two events drive it. `tick_event()` runs until the next segment is lit.
//! `steer_event()` either follows the branch of the lit segment (and runs on
//! straight away) or crashes the car.
//!
//! Nothing in here loops forever. A broken track comes back as a `VmFault`
//! and it's up to the caller to halt.
use crate::display::Display;
use crate::track::{Instruction, Track};
use thiserror::Error;

/// cars at the start of a game
pub const CARS: u8 = 3;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmFault {
    #[error("illegal instruction at {pc}")]
    IllegalInstruction { pc: u8 },
    #[error("runaway jumps from {pc}")]
    RunawayJumps { pc: u8 },
}

/// ticks between two steps at `speed`; never goes up with speed, never below 2
pub fn step_ticks(speed: u8) -> u8 {
    if speed < 80 {
        25 - (speed >> 2) // 25..6
    } else if speed < 128 {
        10 - (speed >> 4) // 5..3
    } else {
        2
    }
}

pub struct Vm<'a> {
    display: &'a Display,
    track: Track,
    score: u32,
    cars: u8,
    speed: u8,
    ticks: u8,
    pc: u8,
    fetched_at: u8,
    instruction: Instruction,
}

impl<'a> Vm<'a> {
    pub fn new(display: &'a Display, track: Track) -> Vm<'a> {
        let mut vm = Vm {
            display,
            track,
            score: 0,
            cars: CARS,
            speed: 0,
            ticks: 0,
            pc: 0,
            fetched_at: 0,
            instruction: Instruction::default(),
        };
        vm.update_ticks();
        vm
    }

    /// start a new game; doesn't fetch anything
    pub fn reset(&mut self, start_speed: u8) {
        self.score = 0;
        self.cars = CARS;
        self.speed = start_speed;
        self.update_ticks();
        self.pc = 0;
    }

    /// ticks to wait before the next tick event
    pub fn wait_ticks(&self) -> u8 {
        self.ticks
    }

    /// step the car along until the next segment is lit
    pub fn tick_event(&mut self) -> Result<(), VmFault> {
        self.fetch()?;
        let mut jumps = 0;
        loop {
            match self.instruction {
                Instruction::Jump { target } => {
                    jumps += 1;
                    if jumps > self.track.len() {
                        return Err(VmFault::RunawayJumps { pc: self.fetched_at });
                    }
                    self.pc = target;
                    self.fetch()?;
                }
                Instruction::Light { segment, .. } => {
                    self.display.show_segments(segment.mask());
                    self.pc += 1;
                    log::trace!("pc {:2} {}", self.fetched_at, self.instruction);
                    return Ok(());
                }
            }
        }
    }

    /// the player steers. `Ok(false)` means the car crashed and the VM has
    /// stopped until the next round
    pub fn steer_event(&mut self) -> Result<bool, VmFault> {
        self.pc = self.instruction.next_pc();
        if self.pc != 0 {
            self.score = self.score.saturating_add(1);
            if self.speed < u8::MAX {
                self.speed += 1;
                self.update_ticks();
            }
            log::debug!(
                "steered {} -> {}, score {}, speed {}",
                self.fetched_at,
                self.pc,
                self.score,
                self.speed
            );
            self.tick_event()?;
            Ok(true)
        } else {
            self.cars = self.cars.saturating_sub(1);
            self.speed = 0;
            self.update_ticks();
            log::debug!("crashed at {}, {} cars left", self.fetched_at, self.cars);
            Ok(false)
        }
    }

    pub fn game_over(&self) -> bool {
        self.cars == 0
    }

    pub fn remaining_cars(&self) -> u8 {
        self.cars
    }

    /// successful steers so far
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// where the next tick event fetches from
    pub fn pc(&self) -> u8 {
        self.pc
    }

    /// where the current instruction came from
    pub fn fetched_at(&self) -> u8 {
        self.fetched_at
    }

    /// true if steering now leads somewhere; used by the demo to fake a
    /// player who never crashes
    pub fn may_steer_safely(&self) -> bool {
        self.instruction.next_pc() != 0
    }

    fn update_ticks(&mut self) {
        self.ticks = step_ticks(self.speed);
    }

    fn fetch(&mut self) -> Result<(), VmFault> {
        self.instruction = self
            .track
            .fetch(self.pc)
            .ok_or(VmFault::IllegalInstruction { pc: self.pc })?;
        self.fetched_at = self.pc;
        Ok(())
    }
}
