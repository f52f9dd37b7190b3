//! Synthetic key presses and text typing
//!
//! Everything here goes through the OS backend, so injected events run
//! through the listener pipeline like physical ones.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;
use crate::events::ScanCode;
use crate::hotkey::{Key, Listener};
use crate::state::restore_plan;

impl Listener {
    /// Press and release every step of a hotkey
    ///
    /// Within a step the keys go down in order and come up in reverse.
    pub fn send(&self, hotkey: impl Into<Key>) -> Result<()> {
        self.send_with(hotkey.into(), true, true)
    }

    pub fn press_and_release(&self, hotkey: impl Into<Key>) -> Result<()> {
        self.send(hotkey)
    }

    pub fn press(&self, hotkey: impl Into<Key>) -> Result<()> {
        self.send_with(hotkey.into(), true, false)
    }

    pub fn release(&self, hotkey: impl Into<Key>) -> Result<()> {
        self.send_with(hotkey.into(), false, true)
    }

    fn send_with(&self, hotkey: Key, press: bool, release: bool) -> Result<()> {
        let spec = self.resolver().parse_hotkey(&hotkey)?;
        for step in &spec.steps {
            let codes: Vec<ScanCode> = step
                .keys
                .iter()
                .filter_map(|alternatives| alternatives.first().copied())
                .collect();
            if press {
                for code in &codes {
                    self.os().press(*code);
                }
            }
            if release {
                for code in codes.iter().rev() {
                    self.os().release(*code);
                }
            }
        }
        Ok(())
    }

    /// Release every pressed key, returning what was down (ascending)
    pub fn stash_state(&self) -> Vec<ScanCode> {
        let state = self.pressed_codes();
        for code in &state {
            self.os().release(*code);
        }
        state
    }

    /// Press and release keys until exactly `target` is down
    pub fn restore_state(&self, target: &[ScanCode]) {
        let (releases, presses) = restore_plan(&self.pressed_codes(), target);
        for code in releases {
            self.os().release(code);
        }
        for code in presses {
            self.os().press(code);
        }
    }

    /// Like [`restore_state`](Self::restore_state), keeping only the
    /// modifiers of `target`
    pub fn restore_modifiers(&self, target: &[ScanCode]) {
        let modifiers: Vec<ScanCode> = target
            .iter()
            .copied()
            .filter(|code| self.resolver().is_modifier_code(*code))
            .collect();
        self.restore_state(&modifiers);
    }

    /// Type `text`, pausing `delay` after each character
    ///
    /// Held keys are released first and held modifiers pressed again after.
    /// With `exact`, or for characters no key produces, the backend types
    /// the character directly.
    pub fn write(&self, text: &str, delay: Duration, exact: bool) -> Result<()> {
        debug!(chars = text.chars().count(), exact, "writing text");
        let state = self.stash_state();
        let result = self.type_text(text, delay, exact);
        self.restore_modifiers(&state);
        result
    }

    fn type_text(&self, text: &str, delay: Duration, exact: bool) -> Result<()> {
        for character in text.chars() {
            if exact {
                match character {
                    '\n' | '\u{8}' => self.send(character.to_string())?,
                    _ => self.os().type_unicode(character),
                }
            } else {
                match self.resolver().resolve_char(character) {
                    Some(entry) => {
                        for modifier in &entry.modifiers {
                            self.press(modifier.as_str())?;
                        }
                        self.os().press(entry.scan_code);
                        self.os().release(entry.scan_code);
                        for modifier in entry.modifiers.iter().rev() {
                            self.release(modifier.as_str())?;
                        }
                    }
                    None => self.os().type_unicode(character),
                }
            }
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
        Ok(())
    }
}
