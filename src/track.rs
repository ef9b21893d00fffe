use crate::display::Segment;
use std::fmt;
use std::io::{self, Read};
use thiserror::Error;

// NB. program counters are u8 as per the 5-bit next_pc field; lengths are
// usize to stop endless casting

/// a track can't be longer than a 5-bit program counter can address
pub const MAX_TRACK_LEN: usize = 32;

/// opcodes, as found in the top 3 bits of an instruction byte
pub const OP_JUMP: u8 = 0;
pub const OP_A: u8 = 1;
pub const OP_B: u8 = 2;
pub const OP_C: u8 = 3;
pub const OP_D: u8 = 4;
pub const OP_E: u8 = 5;
pub const OP_F: u8 = 6;
pub const OP_G: u8 = 7;

const NEXT_PC_MASK: u8 = 0x1f;

/// pack an opcode and a next_pc into one instruction byte
pub const fn encode(op: u8, next_pc: u8) -> u8 {
    ((op & 0x07) << 5) | (next_pc & NEXT_PC_MASK)
}

/// One decoded instruction.
///
/// `Jump` moves to `target` and carries on executing without waiting for a
/// tick. `Light` shows `segment`, moves to the next instruction and waits for
/// the next tick; while it's on screen a steer goes to `branch`, or crashes if
/// `branch` is 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    Jump { target: u8 },
    Light { segment: Segment, branch: u8 },
}

impl Instruction {
    pub fn decode(byte: u8) -> Instruction {
        let next_pc = byte & NEXT_PC_MASK;
        match byte >> 5 {
            OP_JUMP => Instruction::Jump { target: next_pc },
            op => Instruction::Light {
                segment: Segment::from_slot(op - OP_A),
                branch: next_pc,
            },
        }
    }

    /// the decimal point isn't a lane; `Light` on it doesn't survive encoding
    pub fn encode(self) -> u8 {
        match self {
            Instruction::Jump { target } => encode(OP_JUMP, target),
            Instruction::Light { segment, branch } => encode(segment as u8 + OP_A, branch),
        }
    }

    /// the 5-bit operand, whatever the opcode
    pub fn next_pc(self) -> u8 {
        match self {
            Instruction::Jump { target } => target,
            Instruction::Light { branch, .. } => branch,
        }
    }

    // pc values execution may continue at, ignoring where steering leads
    fn straight(self, pc: u8) -> u8 {
        match self {
            Instruction::Jump { target } => target,
            Instruction::Light { .. } => pc + 1,
        }
    }
}

impl Default for Instruction {
    fn default() -> Self {
        Instruction::Jump { target: 0 }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::Jump { target } => write!(f, "jump {}", target),
            Instruction::Light { segment, branch: 0 } => write!(f, "{:?}", segment),
            Instruction::Light { segment, branch } => write!(f, "{:?} ~> {}", segment, branch),
        }
    }
}

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("track is empty")]
    Empty,
    #[error("track has {len} instructions, at most {MAX_TRACK_LEN} fit")]
    TooLong { len: usize },
    #[error("instruction {pc} points at {target}, past the end of the track")]
    TargetOutOfRange { pc: u8, target: u8 },
    #[error("instruction {pc} runs off the end of the track")]
    FallsOffEnd { pc: u8 },
    #[error("instruction {pc} starts a loop of jumps that never lights a segment")]
    JumpCycle { pc: u8 },
    #[error("instruction {pc} can be reached but never leads back to the start")]
    OpenCycle { pc: u8 },
    #[error("can't read track: {0}")]
    Io(#[from] io::Error),
}

/// A race track: the read-only program of the game VM.
///
/// Instructions are decoded once, when the track is built, so the VM never
/// touches the packed bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    code: [Instruction; MAX_TRACK_LEN],
    len: u8,
}

#[rustfmt::skip]
const BUILTIN_TRACK: [u8; 27] = [
    encode(OP_B,     7), //  0 steer to 7
    encode(OP_C,     0), //  1
    encode(OP_D,     0), //  2
    encode(OP_E,    21), //  3 steer to 21
    encode(OP_F,     0), //  4
    encode(OP_A,     0), //  5
    encode(OP_JUMP,  0), //  6
    encode(OP_G,     0), //  7
    encode(OP_E,     0), //  8
    encode(OP_D,     0), //  9
    encode(OP_C,    17), // 10 steer to 17
    encode(OP_B,     0), // 11
    encode(OP_A,     0), // 12
    encode(OP_F,    25), // 13 steer to 25
    encode(OP_E,     0), // 14
    encode(OP_D,     0), // 15
    encode(OP_JUMP, 10), // 16
    encode(OP_G,     0), // 17
    encode(OP_F,     0), // 18
    encode(OP_A,     0), // 19
    encode(OP_JUMP,  0), // 20
    encode(OP_G,     0), // 21
    encode(OP_B,     0), // 22
    encode(OP_A,     0), // 23
    encode(OP_JUMP, 13), // 24
    encode(OP_G,     0), // 25
    encode(OP_JUMP,  1), // 26
];

impl Track {
    /// the track the game ships with
    pub fn builtin() -> Track {
        Track::from_bytes(&BUILTIN_TRACK)
    }

    /// decode a track image without checking where it leads
    pub fn decode(image: &[u8]) -> Result<Track, TrackError> {
        if image.is_empty() {
            return Err(TrackError::Empty);
        }
        if image.len() > MAX_TRACK_LEN {
            return Err(TrackError::TooLong { len: image.len() });
        }
        Ok(Track::from_bytes(image))
    }

    // caller checks 1..=MAX_TRACK_LEN bytes
    fn from_bytes(image: &[u8]) -> Track {
        let mut code = [Instruction::default(); MAX_TRACK_LEN];
        for (slot, byte) in code.iter_mut().zip(image) {
            *slot = Instruction::decode(*byte);
        }
        Track {
            code,
            len: image.len() as u8,
        }
    }

    /// decode and validate a track image
    pub fn from_image(image: &[u8]) -> Result<Track, TrackError> {
        let track = Track::decode(image)?;
        track.validate()?;
        Ok(track)
    }

    /// read a binary track image, e.g. from a file
    pub fn load(reader: &mut impl io::Read) -> Result<Track, TrackError> {
        // there's no point reading more than one byte past the limit
        let mut image = Vec::with_capacity(MAX_TRACK_LEN + 1);
        reader
            .take(MAX_TRACK_LEN as u64 + 1)
            .read_to_end(&mut image)?;
        Track::from_image(&image)
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// the instruction at `pc`, if there is one
    pub fn fetch(&self, pc: u8) -> Option<Instruction> {
        self.code[..self.len()].get(pc as usize).copied()
    }

    /// the packed image of this track
    pub fn image(&self) -> impl Iterator<Item = u8> + '_ {
        self.code[..self.len()].iter().map(|i| i.encode())
    }

    /// Check the track can be driven forever:
    ///
    /// * every operand points inside the track
    /// * no segment instruction is last (it would fall off the end)
    /// * every chain of jumps ends at a segment
    /// * wherever the car can get to from the start, it can get back to the
    ///   start (by driving straight, jumping or steering)
    pub fn validate(&self) -> Result<(), TrackError> {
        let len = self.len();
        let code = &self.code[..len];

        for (pc, instr) in code.iter().enumerate() {
            let pc = pc as u8;
            if instr.next_pc() as usize >= len {
                return Err(TrackError::TargetOutOfRange {
                    pc,
                    target: instr.next_pc(),
                });
            }
            if let Instruction::Light { .. } = instr {
                if pc as usize + 1 == len {
                    return Err(TrackError::FallsOffEnd { pc });
                }
            }
        }

        for start in 0..len {
            let mut pc = start;
            let mut hops = 0;
            while let Instruction::Jump { target } = code[pc] {
                hops += 1;
                if hops > len {
                    return Err(TrackError::JumpCycle { pc: start as u8 });
                }
                pc = target as usize;
            }
        }

        // forward from the start...
        let mut reachable = [false; MAX_TRACK_LEN];
        reachable[0] = true;
        let mut grew = true;
        while grew {
            grew = false;
            for pc in 0..len {
                if !reachable[pc] {
                    continue;
                }
                for next in successors(code[pc], pc as u8).into_iter().flatten() {
                    if !reachable[next as usize] {
                        reachable[next as usize] = true;
                        grew = true;
                    }
                }
            }
        }

        // ...and backward to it
        let mut returns = [false; MAX_TRACK_LEN];
        returns[0] = true;
        grew = true;
        while grew {
            grew = false;
            for pc in 0..len {
                if returns[pc] {
                    continue;
                }
                let back = successors(code[pc], pc as u8)
                    .into_iter()
                    .flatten()
                    .any(|next| returns[next as usize]);
                if back {
                    returns[pc] = true;
                    grew = true;
                }
            }
        }

        match (0..len).find(|pc| reachable[*pc] && !returns[*pc]) {
            Some(pc) => Err(TrackError::OpenCycle { pc: pc as u8 }),
            None => Ok(()),
        }
    }
}

impl Default for Track {
    fn default() -> Self {
        Track::builtin()
    }
}

// where the car can go from `pc`: straight on, and along the branch if any
fn successors(instr: Instruction, pc: u8) -> [Option<u8>; 2] {
    let branch = match instr {
        Instruction::Light { branch, .. } if branch != 0 => Some(branch),
        _ => None,
    };
    [Some(instr.straight(pc)), branch]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_packed_fields() {
        assert_eq!(
            Instruction::decode(0b010_00111),
            Instruction::Light {
                segment: Segment::B,
                branch: 7
            }
        );
        assert_eq!(
            Instruction::decode(0b000_01010),
            Instruction::Jump { target: 10 }
        );
        assert_eq!(
            Instruction::decode(0b111_00000),
            Instruction::Light {
                segment: Segment::G,
                branch: 0
            }
        );
    }

    #[test]
    fn test_every_byte_decodes_to_itself() {
        for byte in 0..=255u8 {
            assert_eq!(Instruction::decode(byte).encode(), byte);
        }
    }

    #[test]
    fn test_light_never_decodes_dp() {
        for byte in 0..=255u8 {
            if let Instruction::Light { segment, .. } = Instruction::decode(byte) {
                assert_ne!(segment, Segment::Dp);
            }
        }
    }

    #[test]
    fn test_disassembly() {
        assert_eq!(Instruction::decode(encode(OP_JUMP, 13)).to_string(), "jump 13");
        assert_eq!(Instruction::decode(encode(OP_F, 25)).to_string(), "F ~> 25");
        assert_eq!(Instruction::decode(encode(OP_D, 0)).to_string(), "D");
    }

    #[test]
    fn test_builtin_track() -> Result<(), TrackError> {
        let t = Track::builtin();
        assert_eq!(t.len(), 27);
        t.validate()?;
        assert_eq!(
            t.fetch(0),
            Some(Instruction::Light {
                segment: Segment::B,
                branch: 7
            })
        );
        assert_eq!(t.fetch(26), Some(Instruction::Jump { target: 1 }));
        assert_eq!(t.fetch(27), None);
        assert_eq!(t.image().collect::<Vec<_>>(), BUILTIN_TRACK.to_vec());
        Ok(())
    }

    #[test]
    fn test_load_from_reader() -> Result<(), TrackError> {
        let mut src: &[u8] = &BUILTIN_TRACK;
        let t = Track::load(&mut src)?;
        assert_eq!(t, Track::builtin());
        Ok(())
    }

    #[test]
    fn test_load_rejects_oversized_image() {
        let mut src: &[u8] = &[encode(OP_JUMP, 0); 40];
        assert!(matches!(
            Track::load(&mut src),
            Err(TrackError::TooLong { len: 33 })
        ));
    }

    #[test]
    fn test_empty_track() {
        assert!(matches!(Track::decode(&[]), Err(TrackError::Empty)));
    }

    #[test]
    fn test_target_out_of_range() {
        let image = [encode(OP_A, 5), encode(OP_JUMP, 0)];
        assert!(matches!(
            Track::from_image(&image),
            Err(TrackError::TargetOutOfRange { pc: 0, target: 5 })
        ));
    }

    #[test]
    fn test_falls_off_end() {
        let image = [encode(OP_A, 0), encode(OP_B, 0)];
        assert!(matches!(
            Track::from_image(&image),
            Err(TrackError::FallsOffEnd { pc: 1 })
        ));
        // decoding alone doesn't care
        assert!(Track::decode(&image).is_ok());
    }

    #[test]
    fn test_jump_cycle() {
        let image = [encode(OP_A, 0), encode(OP_JUMP, 2), encode(OP_JUMP, 1)];
        assert!(matches!(
            Track::from_image(&image),
            Err(TrackError::JumpCycle { pc: 1 })
        ));
    }

    #[test]
    fn test_open_cycle() {
        // steering at 0 leads into a loop that never comes back
        let image = [
            encode(OP_A, 2),
            encode(OP_JUMP, 0),
            encode(OP_B, 0),
            encode(OP_C, 0),
            encode(OP_JUMP, 2),
        ];
        assert!(matches!(
            Track::from_image(&image),
            Err(TrackError::OpenCycle { pc: 2 })
        ));
    }

    #[test]
    fn test_loop_closed_by_steering() {
        // 2..4 loops forever unless the player steers out at 3
        let image = [
            encode(OP_A, 2),
            encode(OP_JUMP, 0),
            encode(OP_B, 0),
            encode(OP_C, 1),
            encode(OP_JUMP, 2),
        ];
        assert!(Track::from_image(&image).is_ok());
    }
}
