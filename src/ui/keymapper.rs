//! Key mapping for upstream input.
//!
//! Converts key events to the 7-bit byte alphabet relayed to the host.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::core::transport::{XOFF, XON};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Key mapper for converting key events to upstream bytes.
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent to bytes for the host. Returns None for
    /// keys with no upstream meaning (those stay local to the UI).
    pub fn map(event: &KeyEvent) -> Option<Vec<u8>> {
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            KeyCode::Char(ch) => Self::map_char(ch, mods),
            KeyCode::Enter => Some(vec![0x0D]),
            KeyCode::Backspace => Some(vec![0x08]),
            KeyCode::Tab => Some(vec![0x09]),
            _ => None,
        }
    }

    fn map_char(ch: char, mods: Modifiers) -> Option<Vec<u8>> {
        if !ch.is_ascii() {
            return None;
        }
        if mods.contains(Modifiers::CTRL) {
            let upper = ch.to_ascii_uppercase() as u8;
            if !(b'@'..=b'_').contains(&upper) {
                return None;
            }
            let byte = upper & 0x1F;
            // XON/XOFF are reserved for the transport and must never be
            // produced as input.
            if byte == XON || byte == XOFF {
                return None;
            }
            return Some(vec![byte]);
        }
        let byte = ch as u8;
        (0x20..=0x7E).contains(&byte).then(|| vec![byte])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        let mut event = KeyEvent::new(code, modifiers);
        event.kind = KeyEventKind::Press;
        event
    }

    #[test]
    fn test_printable_chars_pass_through() {
        let event = key(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(vec![b'a']));
    }

    #[test]
    fn test_enter_is_next_key() {
        let event = key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(vec![0x0D]));
    }

    #[test]
    fn test_control_chars() {
        let event = key(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(vec![0x03]));
    }

    #[test]
    fn test_flow_control_bytes_are_never_produced() {
        let q = key(KeyCode::Char('q'), KeyModifiers::CONTROL);
        let s = key(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&q), None);
        assert_eq!(KeyMapper::map(&s), None);
    }

    #[test]
    fn test_non_ascii_is_dropped() {
        let event = key(KeyCode::Char('é'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), None);
    }
}
