//! Core protocol interpretation components.
//!
//! This module contains the low-level PLATO client logic:
//!
//! - **transport**: flow-controlled byte channels over a network link
//! - **proto**: wire format, command decoder, and terminal state machine
//! - **render**: the drawing contract the interpreter requires from a display
//! - **session**: high-level session combining link + transport + interpreter
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Transport (XON/XOFF-gated inbound/outbound buffers)
//! ├── Decoder (byte stream -> Command values)
//! └── TerminalState
//!     ├── pen position, mode, memory plane
//!     └── foreground/background colors + palette
//! ```

pub mod proto;
pub mod render;
pub mod session;
pub mod transport;
