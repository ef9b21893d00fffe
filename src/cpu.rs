use thiserror::Error;

/// the board is being switched off; every loop unwinds on this
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("powered off")]
pub struct PowerOff;

/// The processor the game runs on.
///
/// Every busy wait in the game calls `idle()` once per pass. A board can doze
/// in there until the next interrupt, refresh whatever needs refreshing, or
/// refuse to carry on because it's being switched off.
pub trait Cpu {
    fn idle(&self) -> Result<(), PowerOff>;
}
