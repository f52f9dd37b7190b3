//! Key name normalization and modifier definitions
//!
//! Names are compared after normalization, so `"Left_Control"`,
//! `"left ctrl"` and `"LEFT CTRL"` all refer to the same key.

use crate::error::{KeyboardError, Result};

/// Modifier key families, in canonical hotkey-name order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Windows,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Windows];

    /// Canonical family name
    pub fn name(self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Windows => "windows",
        }
    }

    /// Family of a normalized, unsided name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// Every name that denotes a modifier, sided or not
pub const MODIFIER_NAMES: &[&str] = &[
    "ctrl",
    "left ctrl",
    "right ctrl",
    "alt",
    "left alt",
    "right alt",
    "alt gr",
    "shift",
    "left shift",
    "right shift",
    "windows",
    "left windows",
    "right windows",
];

const SYNONYMS: &[(&str, &str)] = &[
    ("control", "ctrl"),
    ("left control", "left ctrl"),
    ("right control", "right ctrl"),
    ("option", "alt"),
    ("left option", "left alt"),
    ("right option", "right alt"),
    ("altgr", "alt gr"),
    ("win", "windows"),
    ("meta", "windows"),
    ("super", "windows"),
    ("cmd", "windows"),
    ("command", "windows"),
    ("left win", "left windows"),
    ("right win", "right windows"),
    ("left meta", "left windows"),
    ("right meta", "right windows"),
    ("left cmd", "left windows"),
    ("right cmd", "right windows"),
    ("plus", "+"),
    ("comma", ","),
    ("minus", "-"),
    ("spacebar", "space"),
    (" ", "space"),
    ("\n", "enter"),
    ("\t", "tab"),
    ("\u{8}", "backspace"),
    ("return", "enter"),
    ("escape", "esc"),
    ("del", "delete"),
    ("ins", "insert"),
    ("pgup", "page up"),
    ("pgdn", "page down"),
    ("capslock", "caps lock"),
    ("back space", "backspace"),
];

/// Normalize a key name to its canonical spelling
///
/// Single characters keep their case (so `"A"` stays distinct from `"a"`);
/// longer names are lowercased with `_` read as a space.
pub fn normalize_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(KeyboardError::InvalidKey("empty key name".to_string()));
    }

    let normalized = if name.chars().count() == 1 {
        name.to_string()
    } else {
        let cleaned = name.replace('_', " ").to_lowercase();
        let trimmed = cleaned.trim();
        if trimmed.is_empty() {
            return Err(KeyboardError::InvalidKey(format!("{name:?}")));
        }
        trimmed.to_string()
    };

    Ok(SYNONYMS
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(normalized))
}

/// True if a normalized name denotes a modifier
pub fn is_modifier_name(name: &str) -> bool {
    MODIFIER_NAMES.contains(&name)
}

/// Family whose left/right variants a bare name stands for
pub fn sided_family(name: &str) -> Option<Modifier> {
    Modifier::from_name(name)
}

/// Strip a `left `/`right ` prefix
fn unsided(name: &str) -> &str {
    name.strip_prefix("left ")
        .or_else(|| name.strip_prefix("right "))
        .unwrap_or(name)
}

/// Canonical `mod+mod+...+key` name for a set of key names
///
/// Modifiers come first in (ctrl, alt, shift, windows) order, the remaining
/// keys follow lexicographically. Sides and synonyms collapse, `+` is spelled
/// `plus`, and unresolvable names are skipped.
pub fn get_hotkey_name<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut clean: Vec<String> = names
        .into_iter()
        .filter_map(|name| normalize_name(name.as_ref()).ok())
        .map(|name| {
            let base = unsided(&name);
            if base == "+" {
                "plus".to_string()
            } else {
                base.to_string()
            }
        })
        .collect();

    clean.sort_by(|a, b| {
        let rank = |k: &str| Modifier::from_name(k).map(|m| m as usize).unwrap_or(Modifier::ALL.len());
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });
    clean.dedup();
    clean.join("+")
}
