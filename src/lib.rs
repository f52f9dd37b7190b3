//! keytap: system-wide keyboard event pipeline
//!
//! Every event reported by an [`OsKeyboard`] backend passes through one
//! [`Listener`]: pressed-key tracking, block and remap rules, hotkey
//! matching with suppression, and finally user hooks. The same listener
//! injects synthetic input, records and replays event streams.

pub mod config;
pub mod error;
pub mod events;
pub mod hooks;
pub mod hotkey;
pub mod lifecycle;
pub mod os;
pub mod state;
pub mod typed;

mod inject;
mod recorder;
mod worker;

pub use config::Config;
pub use error::{KeyboardError, Result};
pub use events::{EventType, KeyboardEvent, ScanCode, ScanCodeOrigin, Verdict};
pub use hooks::{Hook, HookHandle};
pub use hotkey::{get_hotkey_name, HotkeyHandle, HotkeyOptions, Key, Listener};
pub use os::{LoopbackKeyboard, OsKeyboard, ScanCodeEntry};
pub use typed::{get_typed_strings, TypedStrings};
pub use worker::call_later;
