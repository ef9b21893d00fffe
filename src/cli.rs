use crate::game::Options;
use crate::track::{Track, TrackError};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;

/// A reaction game for a single seven-segment digit
#[derive(Parser, Debug)]
#[command(name = "segracer", version)]
pub struct Cli {
    /// Binary track image to race on instead of the built-in track
    #[arg(short, long, value_name = "FILE")]
    pub track: Option<PathBuf>,

    /// Speed at the start of every game (0 is slowest, 128 and up is fastest)
    #[arg(short, long, default_value_t = 0, value_name = "N")]
    pub start_speed: u8,

    /// Go straight to the first game instead of the attract mode
    #[arg(long)]
    pub skip_demo: bool,

    /// Emulate a bouncing key contact
    #[arg(long)]
    pub bounce: bool,

    /// Write the log here; the terminal is busy showing the digit
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn options(&self) -> Options {
        Options {
            start_speed: self.start_speed,
            skip_demo: self.skip_demo,
        }
    }

    /// the track named on the command line, checked, or the built-in one
    pub fn load_track(&self) -> Result<Track, TrackError> {
        match &self.track {
            Some(path) => {
                let track = Track::load(&mut File::open(path)?)?;
                log::info!("loaded {} instructions from {}", track.len(), path.display());
                Ok(track)
            }
            None => Ok(Track::builtin()),
        }
    }
}
