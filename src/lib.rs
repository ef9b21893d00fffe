//! # segracer
//!
//! A reaction game for a single seven-segment digit. A lit segment runs
//! round the digit like a car on a track; press the key at the right moment
//! to steer onto the next stretch, or crash.
//!
//! ## Design
//!
//! * written like firmware: a handful of interrupt-driven services and one
//!   cooperative main loop that polls them
//! * each interrupt source owns the state its handler touches; the main
//!   loop masks just that source to read or update it
//! * no allocation in the services; state that's a single byte is an atomic
//! * the track is a program for a tiny VM, one byte per instruction
//! * the host board emulates the peripherals: threads raise the periodic
//!   interrupts, the terminal provides the key and shows the digit
//!
//! Model
//!
//! Board
//!  |-- rtc thread ------> clock (ticks, seconds, deadline)
//!  |-- keyboard thread -> key (debounced, uses the clock's ticks)
//!  |-- mux thread ------> display (segment bitmap -> segment lines)
//!  |-- panel <---------- latch (lines driven since the last frame)
//!  `-- cpu: idle()
//!       `-- game
//!            |-- ui: countdown, flashing digit, scrolling text
//!            `-- vm(track): tick_event(), steer_event()
//!
//! Main loop (one round)
//!
//!  |-- key.run(); if key.pressed() { vm.steer_event() } // false: crashed
//!  |-- if clock.elapsed() { vm.tick_event(); clock.enable(vm.wait_ticks()) }
//!  `-- cpu.idle()
pub mod board;
pub mod cli;
pub mod clock;
pub mod cpu;
pub mod display;
pub mod game;
pub mod input;
pub mod irq;
pub mod panel;
pub mod track;
pub mod ui;
pub mod vm;
