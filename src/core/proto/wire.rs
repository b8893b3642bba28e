//! PLATO wire command alphabet and encoder.
//!
//! Every command starts with a lead byte in the C0 control range that fixes
//! its class and total length. Operand bytes are offset into the printable
//! 7-bit range, so the flow-control bytes XON (0x11) and XOFF (0x13) can
//! never appear inside a command and stay reserved for the transport.

use super::state::{Coordinate, MemoryPlane, Mode, Rgb};

/// Command lead bytes (shared by the decoder).
pub mod cmd {
    pub const BEEP: u8 = 0x07;
    pub const CLEAR: u8 = 0x0C;
    pub const MODE: u8 = 0x14;
    pub const MEM: u8 = 0x15;
    pub const COORD: u8 = 0x18;
    pub const POINT: u8 = 0x19;
    pub const LINE: u8 = 0x1A;
    pub const BLOCK: u8 = 0x1B;
    pub const TEXT: u8 = 0x1C;
    pub const FG: u8 = 0x1D;
    pub const BG: u8 = 0x1E;
}

/// Lowest legal operand byte; operands live in `0x20..=0x7E`.
pub const OPERAND_BASE: u8 = 0x20;
pub const OPERAND_MAX: u8 = 0x7E;

/// Longest character run a single plot command can carry.
pub const MAX_TEXT_RUN: usize = (OPERAND_MAX - OPERAND_BASE) as usize;

/// Longest encoded command: a full character run plus lead and count bytes.
pub const MAX_COMMAND_LEN: usize = MAX_TEXT_RUN + 2;

/// A decoded terminal command. Constructed by the decoder, consumed
/// immediately by the state machine, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetMode(Mode),
    SetMemoryPlane(MemoryPlane),
    LoadCoordinate(Coordinate),
    PlotPoint,
    DrawLineTo(Coordinate),
    FillBlockTo(Coordinate),
    PlotCharacters(Vec<u8>),
    SetForeground(Rgb),
    SetBackground(Rgb),
    Beep,
    ClearScreen,
}

/// Encode a command into its wire bytes.
///
/// Color channels are carried at the protocol's 6-bit resolution, so the
/// low two bits of each channel are not preserved; character runs are
/// truncated at [`MAX_TEXT_RUN`].
pub fn encode(command: &Command) -> Vec<u8> {
    let mut out = Vec::new();
    match command {
        Command::SetMode(mode) => {
            out.push(cmd::MODE);
            out.push(OPERAND_BASE + mode.selector());
        }
        Command::SetMemoryPlane(plane) => {
            out.push(cmd::MEM);
            out.push(OPERAND_BASE + plane.selector());
        }
        Command::LoadCoordinate(c) => {
            out.push(cmd::COORD);
            push_coordinate(&mut out, *c);
        }
        Command::PlotPoint => out.push(cmd::POINT),
        Command::DrawLineTo(c) => {
            out.push(cmd::LINE);
            push_coordinate(&mut out, *c);
        }
        Command::FillBlockTo(c) => {
            out.push(cmd::BLOCK);
            push_coordinate(&mut out, *c);
        }
        Command::PlotCharacters(chars) => {
            let run = &chars[..chars.len().min(MAX_TEXT_RUN)];
            out.push(cmd::TEXT);
            out.push(OPERAND_BASE + run.len() as u8);
            out.extend_from_slice(run);
        }
        Command::SetForeground(rgb) => {
            out.push(cmd::FG);
            push_color(&mut out, *rgb);
        }
        Command::SetBackground(rgb) => {
            out.push(cmd::BG);
            push_color(&mut out, *rgb);
        }
        Command::Beep => out.push(cmd::BEEP),
        Command::ClearScreen => out.push(cmd::CLEAR),
    }
    out
}

/// Two bytes per axis, five bits each, x before y.
fn push_coordinate(out: &mut Vec<u8>, c: Coordinate) {
    push_axis(out, c.x);
    push_axis(out, c.y);
}

fn push_axis(out: &mut Vec<u8>, v: u16) {
    out.push(OPERAND_BASE + ((v >> 5) & 0x1F) as u8);
    out.push(OPERAND_BASE + (v & 0x1F) as u8);
}

fn push_color(out: &mut Vec<u8>, rgb: Rgb) {
    out.push(OPERAND_BASE + (rgb.r >> 2));
    out.push(OPERAND_BASE + (rgb.g >> 2));
    out.push(OPERAND_BASE + (rgb.b >> 2));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{XOFF, XON};

    fn all_variants() -> Vec<Command> {
        vec![
            Command::SetMode(Mode::Inverse),
            Command::SetMemoryPlane(MemoryPlane::M2),
            Command::LoadCoordinate(Coordinate::new(511, 0)),
            Command::PlotPoint,
            Command::DrawLineTo(Coordinate::new(256, 384)),
            Command::FillBlockTo(Coordinate::new(31, 480)),
            Command::PlotCharacters(b"PRESS NEXT".to_vec()),
            Command::SetForeground(Rgb::new(252, 152, 0)),
            Command::SetBackground(Rgb::new(0, 0, 80)),
            Command::Beep,
            Command::ClearScreen,
        ]
    }

    #[test]
    fn test_operands_never_alias_flow_control() {
        for command in all_variants() {
            let bytes = encode(&command);
            for &b in &bytes[1..] {
                assert_ne!(b, XON, "XON inside {:?}", command);
                assert_ne!(b, XOFF, "XOFF inside {:?}", command);
                assert!(
                    (OPERAND_BASE..=OPERAND_MAX).contains(&b),
                    "operand 0x{:02X} outside printable range in {:?}",
                    b,
                    command
                );
            }
        }
    }

    #[test]
    fn test_command_lengths() {
        assert_eq!(encode(&Command::Beep).len(), 1);
        assert_eq!(encode(&Command::ClearScreen).len(), 1);
        assert_eq!(encode(&Command::PlotPoint).len(), 1);
        assert_eq!(encode(&Command::SetMode(Mode::Write)).len(), 2);
        assert_eq!(
            encode(&Command::LoadCoordinate(Coordinate::ORIGIN)).len(),
            5
        );
        assert_eq!(encode(&Command::SetForeground(Rgb::WHITE)).len(), 4);
        assert_eq!(
            encode(&Command::PlotCharacters(b"HI".to_vec())).len(),
            4
        );
    }

    #[test]
    fn test_long_text_run_is_truncated() {
        let chars = vec![b'A'; MAX_TEXT_RUN + 20];
        let bytes = encode(&Command::PlotCharacters(chars));
        assert_eq!(bytes.len(), MAX_COMMAND_LEN);
    }
}
