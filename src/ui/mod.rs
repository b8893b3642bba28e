//! User interface: local rendering and keyboard input.
//!
//! - **renderer**: crossterm implementation of the core drawing contract
//! - **keymapper**: keyboard input to upstream byte sequence mapping

pub mod keymapper;
pub mod renderer;

pub use keymapper::KeyMapper;
pub use renderer::TextRenderer;
