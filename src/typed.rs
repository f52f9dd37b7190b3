//! Text reconstruction from key events
//!
//! Replays Down/Up events against a shift and caps-lock model and yields
//! what would have been typed, split at every non-printing key.

use std::borrow::Borrow;

use crate::events::{EventType, KeyboardEvent};

/// Lazy iterator over typed strings; clone it to start over
#[derive(Debug, Clone)]
pub struct TypedStrings<I> {
    events: I,
    allow_backspace: bool,
    shift: bool,
    caps_lock: bool,
    buffer: String,
    done: bool,
}

/// Strings typed by `events`
///
/// Printable keys append to the current string; backspace deletes from it;
/// any other key press completes it. The last string is yielded even when
/// empty.
pub fn get_typed_strings<I>(events: I) -> TypedStrings<I::IntoIter>
where
    I: IntoIterator,
    I::Item: Borrow<KeyboardEvent>,
{
    TypedStrings {
        events: events.into_iter(),
        allow_backspace: true,
        shift: false,
        caps_lock: false,
        buffer: String::new(),
        done: false,
    }
}

impl<I> TypedStrings<I> {
    /// Treat backspace as an ordinary non-printing key
    pub fn without_backspace(mut self) -> Self {
        self.allow_backspace = false;
        self
    }
}

impl<I> Iterator for TypedStrings<I>
where
    I: Iterator,
    I::Item: Borrow<KeyboardEvent>,
{
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }

        for event in self.events.by_ref() {
            let event = event.borrow();
            let Some(name) = event.name.as_deref() else {
                continue;
            };
            let down = event.event_type == EventType::Down;

            if name.contains("shift") {
                self.shift = down;
            } else if name == "caps lock" {
                if down {
                    self.caps_lock = !self.caps_lock;
                }
            } else if !down {
                continue;
            } else if self.allow_backspace && name == "backspace" {
                self.buffer.pop();
            } else {
                let printed = if name == "space" { " " } else { name };
                let mut chars = printed.chars();
                match (chars.next(), chars.next()) {
                    (Some(character), None) => {
                        if self.shift ^ self.caps_lock {
                            self.buffer.extend(character.to_uppercase());
                        } else {
                            self.buffer.push(character);
                        }
                    }
                    _ => return Some(std::mem::take(&mut self.buffer)),
                }
            }
        }

        self.done = true;
        Some(std::mem::take(&mut self.buffer))
    }
}
