//! Terminal state and command application.
//!
//! A single [`TerminalState`] exists per session, owned by the session and
//! mutated only through [`TerminalState::apply`]. Drawing goes through the
//! [`Render`] seam; nothing here knows about physical pixels.

use crate::core::render::Render;

use super::wire::Command;

/// Glyph advance per plotted character, in logical units.
pub const GLYPH_WIDTH: u16 = 8;

/// Drawing mode. Erase and Inverse paint in the background color, which is
/// how the protocol erases or inverts previously drawn content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Write,
    Rewrite,
    Erase,
    Inverse,
}

impl Mode {
    /// Wire selector index.
    pub fn selector(self) -> u8 {
        match self {
            Mode::Write => 0,
            Mode::Rewrite => 1,
            Mode::Erase => 2,
            Mode::Inverse => 3,
        }
    }

    pub fn from_selector(n: u8) -> Option<Self> {
        match n {
            0 => Some(Mode::Write),
            1 => Some(Mode::Rewrite),
            2 => Some(Mode::Erase),
            3 => Some(Mode::Inverse),
            _ => None,
        }
    }
}

/// Character memory plane, selecting glyph table and code offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPlane {
    M0,
    M1,
    M2,
    M3,
}

impl MemoryPlane {
    pub fn selector(self) -> u8 {
        match self {
            MemoryPlane::M0 => 0,
            MemoryPlane::M1 => 1,
            MemoryPlane::M2 => 2,
            MemoryPlane::M3 => 3,
        }
    }

    pub fn from_selector(n: u8) -> Option<Self> {
        match n {
            0 => Some(MemoryPlane::M0),
            1 => Some(MemoryPlane::M1),
            2 => Some(MemoryPlane::M2),
            3 => Some(MemoryPlane::M3),
            _ => None,
        }
    }
}

/// A position in the protocol's 512x512 logical space. y grows upward, with
/// the origin at the bottom-left of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    pub x: u16,
    pub y: u16,
}

impl Coordinate {
    /// Highest addressable value on either axis.
    pub const MAX: u16 = 511;

    pub const ORIGIN: Coordinate = Coordinate { x: 0, y: 0 };

    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Clamp both axes into the addressable space.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.min(Self::MAX),
            y: self.y.min(Self::MAX),
        }
    }
}

/// Color definition (RGB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
}

/// A pen role: a palette slot plus its currently resolved color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenColor {
    pub index: u8,
    pub rgb: Rgb,
}

/// Default 16-entry palette: the classic RGBI ramp, with index 0 reserved
/// for the background and index 1 for the foreground.
pub const DEFAULT_PALETTE: [Rgb; 16] = [
    Rgb::BLACK,
    Rgb::WHITE,
    Rgb::new(170, 0, 0),
    Rgb::new(0, 170, 0),
    Rgb::new(0, 0, 170),
    Rgb::new(0, 170, 170),
    Rgb::new(170, 0, 170),
    Rgb::new(170, 85, 0),
    Rgb::new(170, 170, 170),
    Rgb::new(85, 85, 85),
    Rgb::new(255, 85, 85),
    Rgb::new(85, 255, 85),
    Rgb::new(85, 85, 255),
    Rgb::new(85, 255, 255),
    Rgb::new(255, 85, 255),
    Rgb::new(255, 255, 85),
];

/// Terminal state holding the pen, mode, plane, and colors.
pub struct TerminalState {
    pub position: Coordinate,
    pub mode: Mode,
    pub plane: MemoryPlane,
    pub foreground: PenColor,
    pub background: PenColor,
    pub palette: [Rgb; 16],
    /// Palette changed since it was last handed to the renderer.
    palette_dirty: bool,
}

impl Default for TerminalState {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalState {
    pub fn new() -> Self {
        Self {
            position: Coordinate::ORIGIN,
            mode: Mode::Write,
            plane: MemoryPlane::M0,
            foreground: PenColor {
                index: 1,
                rgb: Rgb::WHITE,
            },
            background: PenColor {
                index: 0,
                rgb: Rgb::BLACK,
            },
            palette: DEFAULT_PALETTE,
            palette_dirty: true,
        }
    }

    /// Apply one decoded command. Each command's effects land atomically:
    /// state mutation and renderer calls happen before this returns, and a
    /// command never leaves the state half-updated.
    pub fn apply(&mut self, command: Command, out: &mut impl Render) {
        match command {
            Command::SetMode(mode) => self.mode = mode,
            Command::SetMemoryPlane(plane) => self.plane = plane,
            Command::LoadCoordinate(c) => self.position = c,
            Command::PlotPoint => {
                let pen = self.pen_color();
                self.flush_palette(out);
                out.draw_point(self.position, pen);
            }
            Command::DrawLineTo(c) => {
                let pen = self.pen_color();
                self.flush_palette(out);
                out.draw_line(self.position, c, pen);
                self.position = c;
            }
            Command::FillBlockTo(c) => {
                let pen = self.pen_color();
                self.flush_palette(out);
                out.fill_block(self.position, c, pen);
                self.position = c;
            }
            Command::PlotCharacters(chars) => {
                self.flush_palette(out);
                out.draw_text(self.position, &chars, self.plane);
                let advance = chars
                    .len()
                    .saturating_mul(GLYPH_WIDTH as usize)
                    .min(Coordinate::MAX as usize) as u16;
                self.position.x = self.position.x.saturating_add(advance).min(Coordinate::MAX);
            }
            Command::SetForeground(rgb) => {
                self.foreground.rgb = rgb;
                self.palette[self.foreground.index as usize] = rgb;
                self.palette_dirty = true;
            }
            Command::SetBackground(rgb) => {
                self.background.rgb = rgb;
                self.palette[self.background.index as usize] = rgb;
                self.palette_dirty = true;
            }
            Command::Beep => out.beep(),
            Command::ClearScreen => {
                self.position = Coordinate::ORIGIN;
                self.palette[self.background.index as usize] = self.background.rgb;
                if self.foreground.rgb != self.background.rgb {
                    self.palette[self.foreground.index as usize] = self.foreground.rgb;
                }
                self.palette_dirty = true;
                self.flush_palette(out);
                out.clear(self.background.rgb);
            }
        }
    }

    /// Resolve the drawing color for the current mode.
    pub fn pen_color(&self) -> Rgb {
        match self.mode {
            Mode::Erase | Mode::Inverse => self.background.rgb,
            Mode::Write | Mode::Rewrite => self.foreground.rgb,
        }
    }

    /// Hand the palette to the renderer if it changed. Palette updates are
    /// batched: consecutive color commands produce a single apply call at
    /// the next draw.
    fn flush_palette(&mut self, out: &mut impl Render) {
        if self.palette_dirty {
            out.apply_palette(&self.palette);
            self.palette_dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Point(Coordinate, Rgb),
        Line(Coordinate, Coordinate, Rgb),
        Block(Coordinate, Coordinate, Rgb),
        Text(Coordinate, Vec<u8>, MemoryPlane),
        Palette,
        Clear(Rgb),
        Beep,
    }

    #[derive(Default)]
    struct Recording {
        calls: Vec<Call>,
    }

    impl Render for Recording {
        fn draw_point(&mut self, at: Coordinate, color: Rgb) {
            self.calls.push(Call::Point(at, color));
        }
        fn draw_line(&mut self, from: Coordinate, to: Coordinate, color: Rgb) {
            self.calls.push(Call::Line(from, to, color));
        }
        fn fill_block(&mut self, a: Coordinate, b: Coordinate, color: Rgb) {
            self.calls.push(Call::Block(a, b, color));
        }
        fn draw_text(&mut self, at: Coordinate, chars: &[u8], plane: MemoryPlane) {
            self.calls.push(Call::Text(at, chars.to_vec(), plane));
        }
        fn apply_palette(&mut self, _palette: &[Rgb; 16]) {
            self.calls.push(Call::Palette);
        }
        fn clear(&mut self, background: Rgb) {
            self.calls.push(Call::Clear(background));
        }
        fn beep(&mut self) {
            self.calls.push(Call::Beep);
        }
    }

    fn draws(recording: &Recording) -> Vec<&Call> {
        recording
            .calls
            .iter()
            .filter(|c| !matches!(c, Call::Palette))
            .collect()
    }

    #[test]
    fn test_point_uses_foreground_in_write_mode() {
        let mut state = TerminalState::new();
        let mut out = Recording::default();
        let orange = Rgb::new(252, 152, 0);

        state.apply(Command::SetForeground(orange), &mut out);
        state.apply(Command::PlotPoint, &mut out);

        assert_eq!(
            draws(&out),
            vec![&Call::Point(Coordinate::ORIGIN, orange)]
        );
    }

    #[test]
    fn test_point_uses_background_in_erase_mode() {
        let mut state = TerminalState::new();
        let mut out = Recording::default();
        let orange = Rgb::new(252, 152, 0);

        state.apply(Command::SetForeground(orange), &mut out);
        state.apply(Command::SetMode(Mode::Erase), &mut out);
        state.apply(Command::PlotPoint, &mut out);

        assert_eq!(
            draws(&out),
            vec![&Call::Point(Coordinate::ORIGIN, Rgb::BLACK)]
        );
    }

    #[test]
    fn test_line_moves_position() {
        let mut state = TerminalState::new();
        let mut out = Recording::default();

        state.apply(Command::LoadCoordinate(Coordinate::new(10, 10)), &mut out);
        state.apply(Command::SetMode(Mode::Write), &mut out);
        state.apply(Command::DrawLineTo(Coordinate::new(20, 10)), &mut out);

        assert_eq!(state.position, Coordinate::new(20, 10));
        assert_eq!(state.mode, Mode::Write);
        assert_eq!(
            draws(&out),
            vec![&Call::Line(
                Coordinate::new(10, 10),
                Coordinate::new(20, 10),
                Rgb::WHITE
            )]
        );
    }

    #[test]
    fn test_clear_screen_resets_position() {
        let mut state = TerminalState::new();
        let mut out = Recording::default();

        state.apply(Command::LoadCoordinate(Coordinate::new(300, 200)), &mut out);
        state.apply(Command::ClearScreen, &mut out);

        assert_eq!(state.position, Coordinate::ORIGIN);
        let clears: Vec<_> = out
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Clear(_)))
            .collect();
        assert_eq!(clears, vec![&Call::Clear(Rgb::BLACK)]);
    }

    #[test]
    fn test_clear_screen_rebinds_palette_slot_zero() {
        let mut state = TerminalState::new();
        let mut out = Recording::default();
        let navy = Rgb::new(0, 0, 80);

        state.apply(Command::SetBackground(navy), &mut out);
        state.apply(Command::ClearScreen, &mut out);

        assert_eq!(state.palette[0], navy);
        assert_eq!(state.palette[1], Rgb::WHITE);
    }

    #[test]
    fn test_palette_application_is_batched() {
        let mut state = TerminalState::new();
        let mut out = Recording::default();

        state.apply(Command::SetForeground(Rgb::new(252, 0, 0)), &mut out);
        state.apply(Command::SetBackground(Rgb::new(0, 0, 80)), &mut out);
        state.apply(Command::PlotPoint, &mut out);
        state.apply(Command::PlotPoint, &mut out);

        let palettes = out
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Palette))
            .count();
        assert_eq!(palettes, 1);
    }

    #[test]
    fn test_characters_advance_pen() {
        let mut state = TerminalState::new();
        let mut out = Recording::default();

        state.apply(Command::LoadCoordinate(Coordinate::new(100, 256)), &mut out);
        state.apply(Command::PlotCharacters(b"HELLO".to_vec()), &mut out);

        assert_eq!(state.position, Coordinate::new(140, 256));
        assert_eq!(
            draws(&out),
            vec![&Call::Text(
                Coordinate::new(100, 256),
                b"HELLO".to_vec(),
                MemoryPlane::M0
            )]
        );
    }

    #[test]
    fn test_character_advance_clamps_at_edge() {
        let mut state = TerminalState::new();
        let mut out = Recording::default();

        state.apply(Command::LoadCoordinate(Coordinate::new(504, 0)), &mut out);
        state.apply(Command::PlotCharacters(b"ABC".to_vec()), &mut out);

        assert_eq!(state.position.x, Coordinate::MAX);
    }

    #[test]
    fn test_beep_passes_through() {
        let mut state = TerminalState::new();
        let mut out = Recording::default();

        state.apply(Command::Beep, &mut out);

        assert_eq!(out.calls, vec![Call::Beep]);
        assert_eq!(state.position, Coordinate::ORIGIN);
    }
}
