//! PLATO protocol interpretation.
//!
//! Three layers, each pure and synchronous:
//!
//! - **wire**: the command alphabet and an encoder for outbound/test use
//! - **decoder**: reassembles complete commands from arbitrary byte chunks
//! - **state**: applies decoded commands to the terminal state, emitting
//!   drawing calls through the [`Render`](crate::core::render::Render) seam

pub mod decoder;
pub mod state;
pub mod wire;

pub use decoder::{Decoder, Diagnostic};
pub use state::{Coordinate, MemoryPlane, Mode, PenColor, Rgb, TerminalState, GLYPH_WIDTH};
pub use wire::{encode, Command};
