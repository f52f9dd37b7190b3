//! Shared fixtures for pipeline tests: a small scan-code table and helpers
//! for pumping events through a loopback listener.

use std::sync::Arc;

use super::{LoopbackKeyboard, ScanCodeEntry};
use crate::config::Config;
use crate::events::{EventType, KeyboardEvent, ScanCode};
use crate::hotkey::Listener;

pub(crate) const TRIGGERED: ScanCode = ScanCode::primary(999);

pub(crate) fn dummy_table() -> Vec<(&'static str, Vec<ScanCodeEntry>)> {
    let plain = |code| vec![ScanCodeEntry::new(ScanCode::primary(code), &[])];
    let shifted = |code| {
        vec![
            ScanCodeEntry::new(ScanCode::primary(code), &["shift"]),
            ScanCodeEntry::new(ScanCode::shifted_alias(code), &[]),
        ]
    };
    vec![
        ("space", plain(0)),
        ("a", plain(1)),
        ("b", plain(2)),
        ("c", plain(3)),
        ("A", shifted(1)),
        ("B", shifted(2)),
        ("C", shifted(3)),
        ("alt", plain(4)),
        ("left alt", plain(4)),
        ("left shift", plain(5)),
        ("right shift", plain(6)),
        ("left ctrl", plain(7)),
        ("backspace", plain(8)),
        ("caps lock", plain(9)),
        ("+", plain(10)),
        (",", plain(11)),
        ("_", plain(12)),
    ]
}

pub(crate) fn code_of(name: &str) -> ScanCode {
    dummy_table()
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, entries)| entries[0].scan_code)
        .unwrap_or_else(|| panic!("no dummy key named {name}"))
}

pub(crate) fn setup() -> (Listener, Arc<LoopbackKeyboard>) {
    let keyboard = Arc::new(LoopbackKeyboard::new(dummy_table()));
    let listener = Listener::new(keyboard.clone(), &Config::default()).unwrap();
    (listener, keyboard)
}

pub(crate) fn make_event(event_type: EventType, name: &str) -> KeyboardEvent {
    KeyboardEvent::new(event_type, code_of(name), Some(name.to_string()), 0.0)
}

pub(crate) fn d(name: &str) -> Vec<KeyboardEvent> {
    vec![make_event(EventType::Down, name)]
}

pub(crate) fn u(name: &str) -> Vec<KeyboardEvent> {
    vec![make_event(EventType::Up, name)]
}

pub(crate) fn du(name: &str) -> Vec<KeyboardEvent> {
    [d(name), u(name)].concat()
}

pub(crate) fn alias_down(code: u32) -> Vec<KeyboardEvent> {
    vec![KeyboardEvent::new(
        EventType::Down,
        ScanCode::shifted_alias(code),
        None,
        0.0,
    )]
}

pub(crate) fn triggered() -> Vec<KeyboardEvent> {
    vec![KeyboardEvent::new(EventType::Down, TRIGGERED, None, 0.0)]
}

/// Inject events as physical input, wait for queued callbacks, and return
/// everything that reached the rest of the system
pub(crate) fn run(
    listener: &Listener,
    keyboard: &LoopbackKeyboard,
    events: Vec<KeyboardEvent>,
) -> Vec<KeyboardEvent> {
    for event in events {
        keyboard.inject(event);
    }
    listener.flush_callbacks();
    keyboard.take_output()
}
