//! Incremental command decoder.
//!
//! Reassembles complete protocol commands from a byte stream delivered in
//! arbitrary chunks. Between calls the decoder stages at most one partial
//! command; feeding the same bytes in one call or split at any boundary
//! yields the same command sequence.

use super::state::{Coordinate, MemoryPlane, Mode, Rgb};
use super::wire::{cmd, Command, OPERAND_BASE, OPERAND_MAX};

/// A non-fatal decode problem. The decoder recovers on its own; diagnostics
/// exist so the session can log them and tests can observe them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Lead byte not recognized, or an operand violated the command's
    /// declared shape. One byte was skipped.
    MalformedCommand { byte: u8, offset: u64 },
    /// A coordinate operand exceeded the logical space and was clamped.
    CoordinateOutOfRange { x: u16, y: u16 },
}

/// Outcome of attempting to decode one command from the front of a buffer.
enum Step {
    Complete {
        command: Command,
        len: usize,
        clamped: Option<(u16, u16)>,
    },
    /// The buffer holds a prefix of a longer command; wait for more bytes.
    NeedMore,
    /// The byte at the front cannot start or continue a valid command.
    Malformed,
}

/// Resumable decoder state: a staging buffer for one in-progress command
/// plus the absolute stream offset, used only for diagnostics.
pub struct Decoder {
    staged: Vec<u8>,
    offset: u64,
    diagnostics: Vec<Diagnostic>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            staged: Vec::new(),
            offset: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Append bytes and extract every command that is now complete, in
    /// arrival order. A trailing partial command is retained for the next
    /// call; no partial command is ever emitted.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Command> {
        self.staged.extend_from_slice(bytes);

        let mut commands = Vec::new();
        let mut pos = 0;
        while pos < self.staged.len() {
            match decode_one(&self.staged[pos..]) {
                Step::Complete {
                    command,
                    len,
                    clamped,
                } => {
                    if let Some((x, y)) = clamped {
                        self.diagnostics.push(Diagnostic::CoordinateOutOfRange { x, y });
                    }
                    commands.push(command);
                    pos += len;
                }
                Step::NeedMore => break,
                Step::Malformed => {
                    self.diagnostics.push(Diagnostic::MalformedCommand {
                        byte: self.staged[pos],
                        offset: self.offset + pos as u64,
                    });
                    pos += 1;
                }
            }
        }
        self.staged.drain(..pos);
        self.offset += pos as u64;
        commands
    }

    /// Drain accumulated diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Bytes of the staged partial command.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }
}

fn decode_one(buf: &[u8]) -> Step {
    match buf[0] {
        cmd::BEEP => complete(Command::Beep, 1),
        cmd::CLEAR => complete(Command::ClearScreen, 1),
        cmd::POINT => complete(Command::PlotPoint, 1),
        cmd::MODE => decode_selector(buf, |n| Mode::from_selector(n).map(Command::SetMode)),
        cmd::MEM => decode_selector(buf, |n| {
            MemoryPlane::from_selector(n).map(Command::SetMemoryPlane)
        }),
        cmd::COORD => decode_coordinate(buf, Command::LoadCoordinate),
        cmd::LINE => decode_coordinate(buf, Command::DrawLineTo),
        cmd::BLOCK => decode_coordinate(buf, Command::FillBlockTo),
        cmd::TEXT => decode_text(buf),
        cmd::FG => decode_color(buf, Command::SetForeground),
        cmd::BG => decode_color(buf, Command::SetBackground),
        _ => Step::Malformed,
    }
}

fn complete(command: Command, len: usize) -> Step {
    Step::Complete {
        command,
        len,
        clamped: None,
    }
}

fn decode_selector(buf: &[u8], build: impl Fn(u8) -> Option<Command>) -> Step {
    if buf.len() < 2 {
        return Step::NeedMore;
    }
    let operand = buf[1];
    if operand < OPERAND_BASE {
        return Step::Malformed;
    }
    match build(operand - OPERAND_BASE) {
        Some(command) => complete(command, 2),
        None => Step::Malformed,
    }
}

fn decode_coordinate(buf: &[u8], build: impl Fn(Coordinate) -> Command) -> Step {
    if buf.len() < 5 {
        return Step::NeedMore;
    }
    let x = match decode_axis(buf[1], buf[2]) {
        Some(v) => v,
        None => return Step::Malformed,
    };
    let y = match decode_axis(buf[3], buf[4]) {
        Some(v) => v,
        None => return Step::Malformed,
    };
    let clamped = if x > Coordinate::MAX || y > Coordinate::MAX {
        Some((x, y))
    } else {
        None
    };
    Step::Complete {
        command: build(Coordinate::new(x, y).clamped()),
        len: 5,
        clamped,
    }
}

/// Two bytes per axis, five payload bits each.
fn decode_axis(hi: u8, lo: u8) -> Option<u16> {
    let axis_max = OPERAND_BASE + 0x1F;
    if !(OPERAND_BASE..=axis_max).contains(&hi) || !(OPERAND_BASE..=axis_max).contains(&lo) {
        return None;
    }
    Some((((hi - OPERAND_BASE) as u16) << 5) | (lo - OPERAND_BASE) as u16)
}

fn decode_text(buf: &[u8]) -> Step {
    if buf.len() < 2 {
        return Step::NeedMore;
    }
    let count = buf[1];
    if !(OPERAND_BASE..=OPERAND_MAX).contains(&count) {
        return Step::Malformed;
    }
    let n = (count - OPERAND_BASE) as usize;
    if buf.len() < 2 + n {
        return Step::NeedMore;
    }
    let chars = &buf[2..2 + n];
    if chars
        .iter()
        .any(|b| !(OPERAND_BASE..=OPERAND_MAX).contains(b))
    {
        return Step::Malformed;
    }
    complete(Command::PlotCharacters(chars.to_vec()), 2 + n)
}

fn decode_color(buf: &[u8], build: impl Fn(Rgb) -> Command) -> Step {
    if buf.len() < 4 {
        return Step::NeedMore;
    }
    let channel_max = OPERAND_BASE + 0x3F;
    let mut channels = [0u8; 3];
    for (slot, &b) in channels.iter_mut().zip(&buf[1..4]) {
        if !(OPERAND_BASE..=channel_max).contains(&b) {
            return Step::Malformed;
        }
        *slot = (b - OPERAND_BASE) << 2;
    }
    complete(
        build(Rgb::new(channels[0], channels[1], channels[2])),
        4,
    )
}
