//! Terminal renderer using crossterm.
//!
//! Implements the [`Render`] contract on the local terminal: the 512x512
//! logical grid is mapped onto the available character cells through
//! precomputed scale tables, and drawing uses block glyphs with true-color
//! attributes. The protocol's origin is bottom-left, so the y table is
//! inverted.

use std::io::{self, Stdout, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};

use crate::core::proto::{Coordinate, MemoryPlane, Rgb};
use crate::core::render::Render;

/// Extent of the logical coordinate space on each axis.
const LOGICAL_SPAN: u32 = 512;

const BLOCK: char = '█';
/// Stand-in for glyphs from the loadable M2/M3 planes, which have no
/// bitmap source on this surface.
const SHADE: char = '▒';

/// Map logical positions on one axis to cells, optionally inverted.
fn scale_table(cells: u16, invert: bool) -> Vec<u16> {
    (0..LOGICAL_SPAN)
        .map(|v| {
            let v = if invert { LOGICAL_SPAN - 1 - v } else { v };
            ((v * cells as u32) / LOGICAL_SPAN) as u16
        })
        .collect()
}

/// Crossterm-backed renderer.
pub struct TextRenderer {
    out: Stdout,
    scale_x: Vec<u16>,
    scale_y: Vec<u16>,
    palette: [Rgb; 16],
    initialized: bool,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRenderer {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            scale_x: scale_table(1, false),
            scale_y: scale_table(1, true),
            palette: [Rgb::BLACK; 16],
            initialized: false,
        }
    }

    /// Current terminal size.
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }

    /// Enter raw mode and the alternate screen, and size the scale tables.
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(self.out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        let (cols, rows) = terminal::size()?;
        self.resize(cols, rows);
        self.initialized = true;
        Ok(())
    }

    /// Rebuild the scale tables for a new cell grid.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.scale_x = scale_table(cols.max(1), false);
        self.scale_y = scale_table(rows.max(1), true);
    }

    /// Leave the alternate screen and restore the cursor.
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        execute!(self.out, ResetColor, Show, LeaveAlternateScreen)?;
        terminal::disable_raw_mode()?;
        self.initialized = false;
        Ok(())
    }

    fn cell(&self, c: Coordinate) -> (u16, u16) {
        let x = (c.x as usize).min(self.scale_x.len() - 1);
        let y = (c.y as usize).min(self.scale_y.len() - 1);
        (self.scale_x[x], self.scale_y[y])
    }

    fn to_color(rgb: Rgb) -> Color {
        Color::Rgb {
            r: rgb.r,
            g: rgb.g,
            b: rgb.b,
        }
    }
}

impl Render for TextRenderer {
    fn draw_point(&mut self, at: Coordinate, color: Rgb) {
        let (col, row) = self.cell(at);
        let _ = queue!(
            self.out,
            MoveTo(col, row),
            SetForegroundColor(Self::to_color(color)),
            Print(BLOCK)
        );
        let _ = self.out.flush();
    }

    fn draw_line(&mut self, from: Coordinate, to: Coordinate, color: Rgb) {
        let (x0, y0) = self.cell(from);
        let (x1, y1) = self.cell(to);
        let _ = queue!(self.out, SetForegroundColor(Self::to_color(color)));

        // Bresenham over the cell grid.
        let (mut x, mut y) = (x0 as i32, y0 as i32);
        let (x1, y1) = (x1 as i32, y1 as i32);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            let _ = queue!(self.out, MoveTo(x as u16, y as u16), Print(BLOCK));
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
        let _ = self.out.flush();
    }

    fn fill_block(&mut self, a: Coordinate, b: Coordinate, color: Rgb) {
        let (ax, ay) = self.cell(a);
        let (bx, by) = self.cell(b);
        let (left, right) = (ax.min(bx), ax.max(bx));
        let (top, bottom) = (ay.min(by), ay.max(by));

        let run: String = std::iter::repeat(BLOCK)
            .take((right - left + 1) as usize)
            .collect();
        let _ = queue!(self.out, SetForegroundColor(Self::to_color(color)));
        for row in top..=bottom {
            let _ = queue!(self.out, MoveTo(left, row), Print(&run));
        }
        let _ = self.out.flush();
    }

    fn draw_text(&mut self, at: Coordinate, chars: &[u8], plane: MemoryPlane) {
        let (col, row) = self.cell(at);
        // Text draws in the foreground slot of the applied palette.
        let _ = queue!(
            self.out,
            MoveTo(col, row),
            SetForegroundColor(Self::to_color(self.palette[1]))
        );
        for &ch in chars {
            let glyph = match plane {
                MemoryPlane::M0 | MemoryPlane::M1 => ch as char,
                MemoryPlane::M2 | MemoryPlane::M3 => SHADE,
            };
            let _ = queue!(self.out, Print(glyph));
        }
        let _ = self.out.flush();
    }

    fn apply_palette(&mut self, palette: &[Rgb; 16]) {
        self.palette = *palette;
    }

    fn clear(&mut self, background: Rgb) {
        let _ = queue!(
            self.out,
            SetBackgroundColor(Self::to_color(background)),
            Clear(ClearType::All)
        );
        let _ = self.out.flush();
    }

    fn beep(&mut self) {
        let _ = queue!(self.out, Print('\x07'));
        let _ = self.out.flush();
    }
}
