//! Canonical keyboard event model
//!
//! Every physical or synthetic key transition is normalized into a
//! [`KeyboardEvent`] before it enters the pipeline.

use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Which hardware encoding reported a scan code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanCodeOrigin {
    /// The key's own physical code
    Primary,
    /// An alternate report of a shifted character from an unidentified key
    ShiftedAlias,
}

/// Numeric identifier of a physical key position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScanCode {
    pub value: u32,
    pub origin: ScanCodeOrigin,
}

impl ScanCode {
    /// Reserved code carried by unicode-typed synthetic events
    pub const UNICODE: ScanCode = ScanCode {
        value: u32::MAX,
        origin: ScanCodeOrigin::Primary,
    };

    pub const fn primary(value: u32) -> Self {
        Self {
            value,
            origin: ScanCodeOrigin::Primary,
        }
    }

    pub const fn shifted_alias(value: u32) -> Self {
        Self {
            value,
            origin: ScanCodeOrigin::ShiftedAlias,
        }
    }

    /// True for codes that never match physical-key rules
    pub fn is_reserved(&self) -> bool {
        *self == Self::UNICODE
    }
}

impl fmt::Display for ScanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_reserved() {
            return write!(f, "unicode");
        }
        match self.origin {
            ScanCodeOrigin::Primary => write!(f, "{}", self.value),
            ScanCodeOrigin::ShiftedAlias => write!(f, "~{}", self.value),
        }
    }
}

/// Direction of a key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Down,
    Up,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Down => write!(f, "down"),
            EventType::Up => write!(f, "up"),
        }
    }
}

/// Decision returned upstream for a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward the event to the rest of the system
    Allow,
    /// Swallow the event
    Suppress,
}

impl Verdict {
    pub fn is_allow(self) -> bool {
        self == Verdict::Allow
    }
}

/// A single key transition
///
/// Equality ignores `time`, and a missing `name` on either side matches any
/// name, so synthetic events (which carry no name) compare equal to the
/// physical events they reproduce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyboardEvent {
    pub event_type: EventType,
    pub scan_code: ScanCode,
    #[serde(default)]
    pub name: Option<String>,
    /// Seconds on a process-local monotonic clock
    #[serde(default)]
    pub time: f64,
}

impl KeyboardEvent {
    pub fn new(event_type: EventType, scan_code: ScanCode, name: Option<String>, time: f64) -> Self {
        Self {
            event_type,
            scan_code,
            name,
            time,
        }
    }

    /// Down event stamped with the current monotonic time
    pub fn down(scan_code: ScanCode, name: Option<String>) -> Self {
        Self::new(EventType::Down, scan_code, name, monotonic_time())
    }

    /// Up event stamped with the current monotonic time
    pub fn up(scan_code: ScanCode, name: Option<String>) -> Self {
        Self::new(EventType::Up, scan_code, name, monotonic_time())
    }

    pub fn is_down(&self) -> bool {
        self.event_type == EventType::Down
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl PartialEq for KeyboardEvent {
    fn eq(&self, other: &Self) -> bool {
        let names_match = match (&self.name, &other.name) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        self.event_type == other.event_type && self.scan_code == other.scan_code && names_match
    }
}

impl fmt::Display for KeyboardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "KeyboardEvent({} {})", name, self.event_type),
            None => write!(f, "KeyboardEvent({} {})", self.scan_code, self.event_type),
        }
    }
}

/// Seconds elapsed since the first call in this process
pub fn monotonic_time() -> f64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64()
}
