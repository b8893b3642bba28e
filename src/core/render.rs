//! Drawing contract between the interpreter and a display.
//!
//! The state machine talks to the screen exclusively through this trait.
//! All coordinates are in the protocol's 512x512 logical space; an
//! implementation owns the scaling to whatever surface it draws on, along
//! with glyph bitmaps and palette application.

use super::proto::{Coordinate, MemoryPlane, Rgb};

/// Primitive drawing operations consumed by the terminal state machine.
pub trait Render {
    /// Plot a single point in the given pen color.
    fn draw_point(&mut self, at: Coordinate, color: Rgb);

    /// Draw a line between two logical coordinates.
    fn draw_line(&mut self, from: Coordinate, to: Coordinate, color: Rgb);

    /// Fill the rectangle spanned by two corner coordinates.
    fn fill_block(&mut self, a: Coordinate, b: Coordinate, color: Rgb);

    /// Plot a run of character codes starting at `at`, using the glyph
    /// table selected by `plane`.
    fn draw_text(&mut self, at: Coordinate, chars: &[u8], plane: MemoryPlane);

    /// Apply the 16-entry palette. Called lazily, before the next draw
    /// after any palette mutation.
    fn apply_palette(&mut self, palette: &[Rgb; 16]);

    /// Clear the whole surface to the background color.
    fn clear(&mut self, background: Rgb);

    /// Audible alert.
    fn beep(&mut self);
}
