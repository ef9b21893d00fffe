//! # display
//!
//! A single seven-segment digit plus decimal point. The segments share their
//! drive lines so only one can be lit at any instant; the multiplexer
//! interrupt walks the eight slots every `MUX_INTERVAL` and lights the slot's
//! segment if it's in the current map. Persistence of vision does the rest.
//!
//! Ownership is strictly one-way:
//!  * only `show_segments()` (and `off()`) writes the segment map
//!  * only the multiplexer interrupt reads it and drives the output lines
use crate::irq::IrqLine;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// how long each slot stays lit
pub const MUX_INTERVAL: Duration = Duration::from_millis(10);

/// number of multiplexer slots: seven segments and the decimal point
pub const SLOTS: u8 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    Dp,
}

impl Segment {
    pub const ALL: [Segment; SLOTS as usize] = [
        Segment::A,
        Segment::B,
        Segment::C,
        Segment::D,
        Segment::E,
        Segment::F,
        Segment::G,
        Segment::Dp,
    ];

    /// bit of this segment in a segment map
    pub const fn mask(self) -> u8 {
        1 << self as u8
    }

    /// segment driven by a multiplexer slot
    pub fn from_slot(slot: u8) -> Segment {
        Segment::ALL[(slot % SLOTS) as usize]
    }
}

/// the segment output lines of the board
pub trait SegmentLines {
    /// drive the line of `segment` and turn every other line off; `None`
    /// turns all lines off
    fn drive(&mut self, segment: Option<Segment>);
}

/// owned by the multiplexer interrupt
struct Mux {
    slot: u8,
    lines: Box<dyn SegmentLines + Send>,
}

pub struct Display {
    inited: AtomicBool,
    segs: AtomicU8,
    // the multiplexer timer; running == enabled
    mux_irq: IrqLine<Mux>,
}

impl Display {
    pub fn new(lines: impl SegmentLines + Send + 'static) -> Self {
        Display {
            inited: AtomicBool::new(false),
            segs: AtomicU8::new(0),
            mux_irq: IrqLine::new(
                "mux-timer",
                Mux {
                    slot: 0,
                    lines: Box::new(lines),
                },
            ),
        }
    }

    /// turn every segment off and get the multiplexer ready. later calls do
    /// nothing
    pub fn init(&self) {
        if self.inited.swap(true, Ordering::AcqRel) {
            return;
        }
        self.segs.store(0, Ordering::Relaxed);
        self.mux_irq.mask().lines.drive(None);
        log::debug!("display ready, mux every {:?}", MUX_INTERVAL);
    }

    /// turn the whole display off
    pub fn off(&self) {
        self.segs.store(0, Ordering::Relaxed);
        self.stop();
    }

    /// display an ASCII character; bit 7 set lights the decimal point too
    pub fn show_char(&self, code: u8) {
        self.show_segments(char_to_segs(code));
    }

    /// display an arbitrary set of segments, one bit per `Segment`
    pub fn show_segments(&self, segs: u8) {
        self.segs.store(segs, Ordering::Relaxed);
        if segs != 0 {
            if !self.mux_irq.is_enabled() {
                self.mux_irq.mask().slot = 0;
                self.mux_irq.enable();
            }
        } else if self.mux_irq.is_enabled() {
            self.stop();
        }
    }

    /// the segment map being displayed
    pub fn segments(&self) -> u8 {
        self.segs.load(Ordering::Relaxed)
    }

    pub fn is_multiplexing(&self) -> bool {
        self.mux_irq.is_enabled()
    }

    /// multiplexer interrupt handler
    pub fn on_mux(&self) {
        self.mux_irq.raise(|mux| {
            if self.segs.load(Ordering::Relaxed) & (1 << mux.slot) != 0 {
                mux.lines.drive(Some(Segment::from_slot(mux.slot)));
            } else {
                mux.lines.drive(None);
            }
            mux.slot = (mux.slot + 1) % SLOTS;
        });
    }

    fn stop(&self) {
        self.mux_irq.disable();
        self.mux_irq.mask().lines.drive(None);
    }
}

const A: u8 = Segment::A.mask();
const B: u8 = Segment::B.mask();
const C: u8 = Segment::C.mask();
const D: u8 = Segment::D.mask();
const E: u8 = Segment::E.mask();
const F: u8 = Segment::F.mask();
const G: u8 = Segment::G.mask();
const DP: u8 = Segment::Dp.mask();

#[rustfmt::skip]
const DIGITS: [u8; 10] = [
    A | B | C | D | E | F,      // 0
    B | C,                      // 1
    A | B | D | E | G,          // 2
    A | B | C | D | G,          // 3
    B | C | F | G,              // 4
    A | C | D | F | G,          // 5
    A | C | D | E | F | G,      // 6
    A | B | C,                  // 7
    A | B | C | D | E | F | G,  // 8
    A | B | C | D | F | G,      // 9
];

// letters that have no decent lower case shape borrow the upper case one
#[rustfmt::skip]
const LOWER: [u8; 26] = [
    A | B | C | E | F | G,  // A
    C | D | E | F | G,      // b
    D | E | G,              // c
    B | C | D | E | G,      // d
    A | D | E | F | G,      // E
    A | E | F | G,          // F
    A | C | D | E | F,      // G
    C | E | F | G,          // h
    E,                      // i
    B | C | D | E,          // J
    0,                      // k
    D | E | F,              // L
    A | B | C | E | F,      // M
    C | E | G,              // n
    C | D | E | G,          // o
    A | B | E | F | G,      // P
    A | B | C | F | G,      // q
    E | G,                  // r
    A | C | D | F | G,      // S
    D | E | F | G,          // t
    C | D | E,              // u
    0,                      // v
    0,                      // w
    0,                      // x
    B | C | D | F | G,      // y
    0,                      // z
];

#[rustfmt::skip]
const UPPER: [u8; 26] = [
    A | B | C | E | F | G,  // A
    C | D | E | F | G,      // b
    A | D | E | F,          // C
    B | C | D | E | G,      // d
    A | D | E | F | G,      // E
    A | E | F | G,          // F
    A | C | D | E | F,      // G
    B | C | E | F | G,      // H
    E | F,                  // I
    B | C | D | E,          // J
    0,                      // k
    D | E | F,              // L
    A | B | C | E | F,      // M
    C | E | G,              // n
    A | B | C | D | E | F,  // O
    A | B | E | F | G,      // P
    A | B | C | F | G,      // q
    E | G,                  // r
    A | C | D | F | G,      // S
    D | E | F | G,          // t
    B | C | D | E | F,      // U
    0,                      // v
    0,                      // w
    0,                      // x
    B | C | D | F | G,      // y
    0,                      // z
];

/// map an ASCII code to a segment map. bit 7 of `code` lights the decimal
/// point; anything that can't be shown comes out blank
pub fn char_to_segs(code: u8) -> u8 {
    let dp = if code & 0x80 != 0 { DP } else { 0 };
    let segs = match code & 0x7f {
        c @ b'0'..=b'9' => DIGITS[(c - b'0') as usize],
        c @ b'A'..=b'Z' => UPPER[(c - b'A') as usize],
        c @ b'a'..=b'z' => LOWER[(c - b'a') as usize],
        b'-' => G,
        b'_' => D,
        b'.' => DP,
        _ => 0,
    };
    segs | dp
}

/// `SegmentLines` that just remember what they were told. `driven()` is the
/// line that's on right now; `take_seen()` is every line driven since the
/// previous call, which is what an eye (or a renderer) integrates over.
/// Clones share the same latch
#[derive(Clone, Default)]
pub struct Latch {
    driven: Arc<AtomicU8>,
    seen: Arc<AtomicU8>,
}

impl Latch {
    pub fn new() -> Self {
        Latch::default()
    }

    pub fn driven(&self) -> u8 {
        self.driven.load(Ordering::Relaxed)
    }

    pub fn take_seen(&self) -> u8 {
        self.seen.swap(self.driven(), Ordering::Relaxed)
    }
}

impl SegmentLines for Latch {
    fn drive(&mut self, segment: Option<Segment>) {
        let bits = segment.map_or(0, Segment::mask);
        self.driven.store(bits, Ordering::Relaxed);
        self.seen.fetch_or(bits, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Latch, Display) {
        let latch = Latch::new();
        let display = Display::new(latch.clone());
        display.init();
        (latch, display)
    }

    #[test]
    fn test_segment_masks() {
        for (i, s) in Segment::ALL.iter().enumerate() {
            assert_eq!(s.mask(), 1 << i);
            assert_eq!(Segment::from_slot(i as u8), *s);
        }
    }

    #[test]
    fn test_digits() {
        assert_eq!(char_to_segs(b'0'), 0x3f);
        assert_eq!(char_to_segs(b'1'), B | C);
        assert_eq!(char_to_segs(b'8'), 0x7f);
        for c in b'0'..=b'9' {
            assert_eq!(char_to_segs(c), DIGITS[(c - b'0') as usize]);
        }
    }

    #[test]
    fn test_letters_follow_tables() {
        for c in b'A'..=b'Z' {
            assert_eq!(char_to_segs(c), UPPER[(c - b'A') as usize]);
        }
        for c in b'a'..=b'z' {
            assert_eq!(char_to_segs(c), LOWER[(c - b'a') as usize]);
        }
    }

    #[test]
    fn test_decimal_point_flag() {
        let printable = (b'0'..=b'9').chain(b'A'..=b'Z').chain(b'a'..=b'z');
        for c in printable {
            assert_eq!(char_to_segs(c | 0x80), char_to_segs(c) | DP);
        }
        assert_eq!(char_to_segs(b'E' | 0x80), A | D | E | F | G | DP);
        assert_eq!(char_to_segs(b' ' | 0x80), DP);
    }

    #[test]
    fn test_blank_letters() {
        for c in b"kvwxzKVWXZ" {
            assert_eq!(char_to_segs(*c), 0, "{} should be blank", *c as char);
            assert_eq!(char_to_segs(*c | 0x80), DP);
        }
        let blank = (b'A'..=b'Z')
            .chain(b'a'..=b'z')
            .filter(|c| char_to_segs(*c) == 0)
            .count();
        assert_eq!(blank, 10);
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(char_to_segs(b'-'), G);
        assert_eq!(char_to_segs(b'_'), D);
        assert_eq!(char_to_segs(b'.'), DP);
        assert_eq!(char_to_segs(b' '), 0);
        assert_eq!(char_to_segs(b'?'), 0);
        assert_eq!(char_to_segs(0), 0);
    }

    #[test]
    fn test_show_starts_mux_from_slot_zero() {
        let (latch, d) = setup();
        assert!(!d.is_multiplexing());
        d.show_segments(A | C);
        assert!(d.is_multiplexing());
        d.on_mux();
        assert_eq!(latch.driven(), A);
        d.on_mux();
        assert_eq!(latch.driven(), 0);
        d.on_mux();
        assert_eq!(latch.driven(), C);
    }

    #[test]
    fn test_mux_cycles_all_slots() {
        let (latch, d) = setup();
        d.show_char(b'8' | 0x80);
        latch.take_seen();
        for _ in 0..SLOTS {
            d.on_mux();
        }
        assert_eq!(latch.take_seen(), 0xff);
        // back at slot a
        d.on_mux();
        assert_eq!(latch.driven(), A);
    }

    #[test]
    fn test_show_keeps_running_mux() {
        let (latch, d) = setup();
        d.show_segments(0xff);
        d.on_mux();
        d.on_mux();
        d.show_segments(0xff);
        d.on_mux();
        assert_eq!(latch.driven(), C);
    }

    #[test]
    fn test_show_zero_stops_mux() {
        let (latch, d) = setup();
        d.show_segments(B);
        d.on_mux();
        d.on_mux();
        assert_eq!(latch.driven(), B);
        d.show_segments(0);
        assert!(!d.is_multiplexing());
        assert_eq!(latch.driven(), 0);
        // stopped timer, no more interrupts
        d.on_mux();
        assert_eq!(latch.driven(), 0);
    }

    #[test]
    fn test_restart_begins_at_slot_zero() {
        let (latch, d) = setup();
        d.show_segments(0xff);
        d.on_mux();
        d.on_mux();
        d.on_mux();
        d.show_segments(0);
        d.show_segments(0xff);
        d.on_mux();
        assert_eq!(latch.driven(), A);
    }

    #[test]
    fn test_off() {
        let (latch, d) = setup();
        d.show_char(b'H');
        d.on_mux();
        d.on_mux();
        d.off();
        assert_eq!(d.segments(), 0);
        assert!(!d.is_multiplexing());
        assert_eq!(latch.driven(), 0);
        // off on an idle display is harmless
        d.off();
        assert_eq!(latch.driven(), 0);
    }

    #[test]
    fn test_init_is_idempotent() {
        let (latch, d) = setup();
        d.show_segments(A);
        d.on_mux();
        d.init();
        assert_eq!(d.segments(), A);
        assert_eq!(latch.driven(), A);
    }
}
