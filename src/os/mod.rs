//! OS keyboard collaborator interface
//!
//! The platform hook itself lives outside this crate. Anything that can
//! report key transitions and inject synthetic ones implements
//! [`OsKeyboard`]; [`LoopbackKeyboard`] is the in-memory implementation.

mod loopback;

#[cfg(test)]
pub(crate) mod testing;

pub use loopback::LoopbackKeyboard;

use crate::error::Result;
use crate::events::{KeyboardEvent, ScanCode, Verdict};

/// One way of producing a named key: a scan code plus the modifiers that
/// must be held for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCodeEntry {
    pub scan_code: ScanCode,
    pub modifiers: Vec<String>,
}

impl ScanCodeEntry {
    pub fn new(scan_code: ScanCode, modifiers: &[&str]) -> Self {
        Self {
            scan_code,
            modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn requires(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

/// Callback invoked synchronously for every raw event
pub type EventCallback = Box<dyn Fn(&KeyboardEvent) -> Verdict + Send + Sync>;

/// Platform keyboard backend consumed by the listener
pub trait OsKeyboard: Send + Sync {
    /// Prepare the backend; called once before `listen`
    fn init(&self) -> Result<()>;

    /// Start delivering events to `callback`
    ///
    /// The callback's verdict decides whether the event propagates.
    fn listen(&self, callback: EventCallback) -> Result<()>;

    /// Ordered alternatives for a normalized key name; empty if unknown
    fn map_name(&self, name: &str) -> Vec<ScanCodeEntry>;

    fn press(&self, scan_code: ScanCode);

    fn release(&self, scan_code: ScanCode);

    /// Type a character that has no key in the current layout
    fn type_unicode(&self, character: char);
}
