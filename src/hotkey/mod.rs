//! Hotkey parsing, matching and the listener that drives them
//!
//! Key names resolve to scan codes through the OS backend; hotkeys are
//! matched by one automaton per registration inside the listener pipeline.

mod engine;
mod keys;
mod listener;
mod resolver;

pub use engine::{HotkeyCallback, HotkeyEngine, HotkeyHandle};
pub use keys::{get_hotkey_name, is_modifier_name, normalize_name, Modifier, MODIFIER_NAMES};
pub use listener::{HotkeyOptions, Listener};
pub use resolver::{HotkeySpec, HotkeyStep, Key, KeyAlternatives, KeyResolver};
