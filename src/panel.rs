//! The digit, drawn in the terminal.
//!
//! The board's segment lines only ever light one segment at a time, so the
//! panel fakes the eye's persistence of vision: a segment keeps glowing for
//! a few frames after it was last driven.
use crate::display::{Segment, SLOTS};
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::{Constraint, Direction, Layout};
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Line, Points};
use tui::widgets::{Block, Borders, Paragraph};
use tui::Terminal;

/// frames a segment glows for after it was last driven; has to outlast a
/// whole multiplexer sweep at the board's frame rate
pub const PERSISTENCE_FRAMES: u8 = 4;

const LIT: Color = Color::Red;
const UNLIT: Color = Color::DarkGray;

/// per-segment afterglow
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Glow([u8; SLOTS as usize]);

impl Glow {
    /// take in the segments driven since the last frame
    pub fn absorb(&mut self, seen: u8) {
        for (slot, glow) in self.0.iter_mut().enumerate() {
            if seen & (1 << slot) != 0 {
                *glow = PERSISTENCE_FRAMES;
            } else {
                *glow = glow.saturating_sub(1);
            }
        }
    }

    /// segments that look lit
    pub fn lit(&self) -> u8 {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, glow)| **glow > 0)
            .fold(0, |segs, (slot, _)| segs | 1 << slot)
    }
}

// canvas is 10 wide and 20 high; the digit sits in the middle
#[rustfmt::skip]
fn stroke(segment: Segment) -> (f64, f64, f64, f64) {
    match segment {
        Segment::A  => (2.0, 18.0, 8.0, 18.0),
        Segment::B  => (8.0, 18.0, 8.0, 10.0),
        Segment::C  => (8.0, 10.0, 8.0,  2.0),
        Segment::D  => (2.0,  2.0, 8.0,  2.0),
        Segment::E  => (2.0,  2.0, 2.0, 10.0),
        Segment::F  => (2.0, 10.0, 2.0, 18.0),
        Segment::G  => (2.0, 10.0, 8.0, 10.0),
        Segment::Dp => (9.5,  1.0, 9.5,  1.0),
    }
}

pub struct Panel {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    glow: Glow,
}

impl Panel {
    pub fn new() -> Result<Panel, io::Error> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.clear()?;
        Ok(Panel {
            terminal,
            glow: Glow::default(),
        })
    }

    /// draw one frame; `seen` is every segment driven since the last one
    pub fn draw(&mut self, seen: u8, status: &str) -> Result<(), io::Error> {
        self.glow.absorb(seen);
        let lit = self.glow.lit();

        self.terminal.draw(|f| {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(14), Constraint::Length(1)].as_ref())
                .split(f.size());
            let mut digit = rows[0];
            digit.width = digit.width.min(16);

            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title("SEG RACER")
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds([0.0, 10.0])
                .y_bounds([0.0, 20.0])
                .marker(Marker::Block)
                .paint(|ctx| {
                    for segment in Segment::ALL {
                        let color = if lit & segment.mask() != 0 { LIT } else { UNLIT };
                        let (x1, y1, x2, y2) = stroke(segment);
                        if segment == Segment::Dp {
                            ctx.draw(&Points {
                                coords: &[(x1, y1)],
                                color,
                            });
                        } else {
                            ctx.draw(&Line {
                                x1,
                                y1,
                                x2,
                                y2,
                                color,
                            });
                        }
                    }
                });
            f.render_widget(canvas, digit);
            f.render_widget(Paragraph::new(status), rows[1]);
        })?;
        Ok(())
    }
}

impl Drop for Panel {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}
