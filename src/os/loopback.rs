//! In-memory keyboard backend
//!
//! Synthetic presses are fed straight back into the listening callback, the
//! same way a real hook reports injected input. Every event the callback
//! allows is appended to an output log that stands in for "the rest of the
//! system".

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use tracing::{debug, warn};

use super::{EventCallback, OsKeyboard, ScanCodeEntry};
use crate::error::{KeyboardError, Result};
use crate::events::{KeyboardEvent, ScanCode, Verdict};

/// Keyboard backend that loops synthetic input back to its listener
pub struct LoopbackKeyboard {
    table: HashMap<String, Vec<ScanCodeEntry>>,
    callback: OnceLock<EventCallback>,
    output: Mutex<Vec<KeyboardEvent>>,
}

impl LoopbackKeyboard {
    /// Create a backend over an explicit name → scan code table
    pub fn new<I, S>(table: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<ScanCodeEntry>)>,
        S: Into<String>,
    {
        Self {
            table: table.into_iter().map(|(name, entries)| (name.into(), entries)).collect(),
            callback: OnceLock::new(),
            output: Mutex::new(Vec::new()),
        }
    }

    /// Backend with a US layout using Linux evdev key codes
    pub fn us_layout() -> Self {
        let mut table: Vec<(String, Vec<ScanCodeEntry>)> = Vec::new();
        let mut plain = |name: &str, code: u32| {
            table.push((name.to_string(), vec![ScanCodeEntry::new(ScanCode::primary(code), &[])]));
        };

        for (offset, name) in ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0"].iter().enumerate() {
            plain(name, 2 + offset as u32);
        }
        for (row, first) in [("qwertyuiop", 16u32), ("asdfghjkl", 30), ("zxcvbnm", 44)] {
            for (offset, letter) in row.chars().enumerate() {
                plain(&letter.to_string(), first + offset as u32);
            }
        }
        for (name, code) in [
            ("esc", 1),
            ("-", 12),
            ("=", 13),
            ("backspace", 14),
            ("tab", 15),
            ("[", 26),
            ("]", 27),
            ("enter", 28),
            ("left ctrl", 29),
            (";", 39),
            ("'", 40),
            ("`", 41),
            ("left shift", 42),
            ("\\", 43),
            (",", 51),
            (".", 52),
            ("/", 53),
            ("right shift", 54),
            ("left alt", 56),
            ("space", 57),
            ("caps lock", 58),
            ("right ctrl", 97),
            ("right alt", 100),
            ("alt gr", 100),
            ("home", 102),
            ("up", 103),
            ("page up", 104),
            ("left", 105),
            ("right", 106),
            ("end", 107),
            ("down", 108),
            ("page down", 109),
            ("insert", 110),
            ("delete", 111),
            ("left windows", 125),
            ("right windows", 126),
        ] {
            plain(name, code);
        }
        for (offset, code) in (59u32..=68).enumerate() {
            plain(&format!("f{}", offset + 1), code);
        }

        for (name, code) in [
            ("!", 2),
            ("@", 3),
            ("#", 4),
            ("$", 5),
            ("%", 6),
            ("^", 7),
            ("&", 8),
            ("*", 9),
            ("(", 10),
            (")", 11),
            ("_", 12),
            ("+", 13),
            ("{", 26),
            ("}", 27),
            (":", 39),
            ("\"", 40),
            ("~", 41),
            ("|", 43),
            ("<", 51),
            (">", 52),
            ("?", 53),
        ] {
            table.push((
                name.to_string(),
                vec![ScanCodeEntry::new(ScanCode::primary(code), &["shift"])],
            ));
        }

        Self::new(table)
    }

    /// Simulate a physical key transition
    pub fn inject(&self, event: KeyboardEvent) -> Verdict {
        self.emit(event)
    }

    /// Drain every event that reached the rest of the system
    pub fn take_output(&self) -> Vec<KeyboardEvent> {
        std::mem::take(&mut *self.output.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn emit(&self, event: KeyboardEvent) -> Verdict {
        let verdict = match self.callback.get() {
            Some(callback) => callback(&event),
            None => Verdict::Allow,
        };
        if verdict.is_allow() {
            self.output
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
        }
        verdict
    }
}

impl OsKeyboard for LoopbackKeyboard {
    fn init(&self) -> Result<()> {
        debug!(keys = self.table.len(), "loopback keyboard initialized");
        Ok(())
    }

    fn listen(&self, callback: EventCallback) -> Result<()> {
        self.callback
            .set(callback)
            .map_err(|_| KeyboardError::Backend("loopback keyboard already has a listener".to_string()))
    }

    fn map_name(&self, name: &str) -> Vec<ScanCodeEntry> {
        self.table.get(name).cloned().unwrap_or_default()
    }

    fn press(&self, scan_code: ScanCode) {
        if scan_code.is_reserved() {
            warn!("refusing to press the reserved unicode scan code");
            return;
        }
        self.emit(KeyboardEvent::down(scan_code, None));
    }

    fn release(&self, scan_code: ScanCode) {
        if scan_code.is_reserved() {
            return;
        }
        self.emit(KeyboardEvent::up(scan_code, None));
    }

    fn type_unicode(&self, character: char) {
        self.emit(KeyboardEvent::down(ScanCode::UNICODE, Some(character.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_us_layout_lookup() {
        let keyboard = LoopbackKeyboard::us_layout();
        assert_eq!(keyboard.map_name("a")[0].scan_code, ScanCode::primary(30));
        assert_eq!(keyboard.map_name("space")[0].scan_code, ScanCode::primary(57));
        assert!(keyboard.map_name("!")[0].requires("shift"));
        assert!(keyboard.map_name("A").is_empty());
        assert!(keyboard.map_name("no such key").is_empty());
    }

    #[test]
    fn test_events_without_listener_pass_through() {
        let keyboard = LoopbackKeyboard::us_layout();
        keyboard.press(ScanCode::primary(30));
        keyboard.release(ScanCode::primary(30));
        let output = keyboard.take_output();
        assert_eq!(output.len(), 2);
        assert!(output[0].is_down());
        assert!(keyboard.take_output().is_empty());
    }

    #[test]
    fn test_listener_verdict_filters_output() {
        let keyboard = LoopbackKeyboard::us_layout();
        keyboard
            .listen(Box::new(|event| {
                if event.scan_code == ScanCode::primary(30) {
                    Verdict::Suppress
                } else {
                    Verdict::Allow
                }
            }))
            .unwrap();
        assert!(keyboard.listen(Box::new(|_| Verdict::Allow)).is_err());

        keyboard.press(ScanCode::primary(30));
        keyboard.press(ScanCode::primary(48));
        let output = keyboard.take_output();
        assert_eq!(output, vec![KeyboardEvent::down(ScanCode::primary(48), None)]);
    }
}
