use std::error::Error;
use std::fs::File;

use clap::Parser;
use env_logger::{Builder, Env, Target};
use log::LevelFilter;

use segracer::board::{Board, BoardOptions};
use segracer::cli::Cli;
use segracer::game::{Game, GameError};

fn init_logging(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    match &cli.log_file {
        Some(path) => {
            builder.target(Target::Pipe(Box::new(File::create(path)?)));
        }
        // stderr shares the terminal with the digit; only log there on request
        None if std::env::var_os("RUST_LOG").is_none() => {
            builder.filter_level(LevelFilter::Off);
        }
        None => {}
    }
    builder.init();
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    let track = cli.load_track()?;

    let board = Board::power_on(BoardOptions { bounce: cli.bounce })?;
    let mut game = Game::new(
        board.clock(),
        board.key(),
        board.display(),
        &board,
        track,
        cli.options(),
    );
    match game.run() {
        Err(GameError::Fault(fault)) => {
            game.halt(fault);
        }
        Err(GameError::PowerOff(_)) | Ok(()) => {}
    }
    log::info!(
        "switched off after {}s, last score {}",
        board.clock().seconds(),
        game.vm().score()
    );
    Ok(())
}
