//! Translation between key names, scan codes and hotkey specs

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use super::keys::{self, normalize_name, MODIFIER_NAMES};
use crate::error::{KeyboardError, Result};
use crate::events::ScanCode;
use crate::os::{OsKeyboard, ScanCodeEntry};

/// Anything that can name one or more keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Name(String),
    Code(ScanCode),
    Many(Vec<Key>),
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Name(name.clone())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<ScanCode> for Key {
    fn from(code: ScanCode) -> Self {
        Key::Code(code)
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Key::Code(ScanCode::primary(value))
    }
}

impl<T: Into<Key>> From<Vec<T>> for Key {
    fn from(keys: Vec<T>) -> Self {
        Key::Many(keys.into_iter().map(Into::into).collect())
    }
}

/// Scan codes that all stand for one logical key
pub type KeyAlternatives = Vec<ScanCode>;

/// Keys held together; the last one is the trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyStep {
    pub keys: Vec<KeyAlternatives>,
}

impl HotkeyStep {
    pub fn new(keys: Vec<KeyAlternatives>) -> Self {
        Self { keys }
    }

    pub fn trigger(&self) -> &KeyAlternatives {
        // parse_hotkey never produces an empty step
        &self.keys[self.keys.len() - 1]
    }

    pub fn modifiers(&self) -> &[KeyAlternatives] {
        &self.keys[..self.keys.len() - 1]
    }

    /// True if `code` is an alternative of any key in this step
    pub fn contains(&self, code: ScanCode) -> bool {
        self.keys.iter().any(|alternatives| alternatives.contains(&code))
    }
}

/// Sequence of steps that must complete in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeySpec {
    pub steps: Vec<HotkeyStep>,
}

impl HotkeySpec {
    pub fn new(steps: Vec<HotkeyStep>) -> Self {
        Self { steps }
    }
}

/// Resolves key names against the OS scan-code table
pub struct KeyResolver {
    os: Arc<dyn OsKeyboard>,
    modifier_codes: OnceLock<BTreeSet<ScanCode>>,
}

impl KeyResolver {
    pub fn new(os: Arc<dyn OsKeyboard>) -> Self {
        Self {
            os,
            modifier_codes: OnceLock::new(),
        }
    }

    /// Scan codes for a key, in table order
    pub fn key_to_scan_codes(&self, key: &Key) -> Result<Vec<ScanCode>> {
        match key {
            Key::Code(code) => Ok(vec![*code]),
            Key::Name(name) => self.resolve_name(name),
            Key::Many(keys) => {
                if keys.is_empty() {
                    return Err(KeyboardError::InvalidKey("empty key list".to_string()));
                }
                let mut codes = Vec::new();
                for key in keys {
                    codes.extend(self.key_to_scan_codes(key)?);
                }
                Ok(codes)
            }
        }
    }

    fn resolve_name(&self, raw: &str) -> Result<Vec<ScanCode>> {
        let name = normalize_name(raw)?;

        if keys::sided_family(&name).is_some() {
            let mut codes = self.lookup(&format!("left {name}"));
            for code in self.lookup(&format!("right {name}")) {
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
            if !codes.is_empty() {
                return Ok(codes);
            }
        }

        let codes = self.lookup(&name);
        if !codes.is_empty() {
            return Ok(codes);
        }

        // An uppercase letter missing from the table is its lowercase key
        // with shift held, or a shifted report from an unidentified key.
        let mut chars = name.chars();
        if let (Some(letter), None) = (chars.next(), chars.next()) {
            if letter.is_uppercase() {
                let lower: String = letter.to_lowercase().collect();
                let base = self.lookup(&lower);
                if !base.is_empty() {
                    let mut codes = base.clone();
                    codes.extend(base.iter().map(|code| ScanCode::shifted_alias(code.value)));
                    return Ok(codes);
                }
            }
        }

        Err(KeyboardError::InvalidKey(raw.to_string()))
    }

    fn lookup(&self, name: &str) -> Vec<ScanCode> {
        let mut codes = Vec::new();
        for entry in self.os.map_name(name) {
            if !codes.contains(&entry.scan_code) {
                codes.push(entry.scan_code);
            }
        }
        codes
    }

    /// First table entry for a single character, for typing it
    ///
    /// Uppercase letters missing from the table fall back to the lowercase
    /// entry with shift added.
    pub fn resolve_char(&self, character: char) -> Option<ScanCodeEntry> {
        let name = normalize_name(&character.to_string()).ok()?;
        if let Some(entry) = self.os.map_name(&name).into_iter().next() {
            return Some(entry);
        }
        if character.is_uppercase() {
            let lower: String = character.to_lowercase().collect();
            let mut entry = self.os.map_name(&lower).into_iter().next()?;
            if !entry.requires("shift") {
                entry.modifiers.push("shift".to_string());
            }
            return Some(entry);
        }
        None
    }

    /// Every scan code produced by any modifier name
    pub fn modifier_codes(&self) -> &BTreeSet<ScanCode> {
        self.modifier_codes.get_or_init(|| {
            let codes: BTreeSet<ScanCode> = MODIFIER_NAMES
                .iter()
                .filter_map(|name| self.resolve_name(name).ok())
                .flatten()
                .collect();
            debug!(count = codes.len(), "modifier scan codes resolved");
            codes
        })
    }

    pub fn is_modifier_code(&self, code: ScanCode) -> bool {
        self.modifier_codes().contains(&code)
    }

    /// True if every code the key resolves to is a modifier
    pub fn is_modifier(&self, key: &Key) -> bool {
        match key {
            Key::Code(code) => self.is_modifier_code(*code),
            Key::Name(name) => match normalize_name(name) {
                Ok(normalized) if keys::is_modifier_name(&normalized) => true,
                Ok(_) => self
                    .resolve_name(name)
                    .map(|codes| codes.iter().all(|code| self.is_modifier_code(*code)))
                    .unwrap_or(false),
                Err(_) => false,
            },
            Key::Many(keys) => !keys.is_empty() && keys.iter().all(|key| self.is_modifier(key)),
        }
    }

    pub fn is_modifier_alternatives(&self, alternatives: &[ScanCode]) -> bool {
        !alternatives.is_empty() && alternatives.iter().all(|code| self.is_modifier_code(*code))
    }

    /// Parse `"ctrl+shift+a, b"` style hotkeys into steps of key alternatives
    pub fn parse_hotkey(&self, hotkey: &Key) -> Result<HotkeySpec> {
        let steps = match hotkey {
            Key::Code(_) => vec![HotkeyStep::new(vec![self.key_to_scan_codes(hotkey)?])],
            Key::Many(keys) => {
                if keys.is_empty() {
                    return Err(KeyboardError::InvalidKey("empty hotkey".to_string()));
                }
                let resolved = keys
                    .iter()
                    .map(|key| self.key_to_scan_codes(key))
                    .collect::<Result<Vec<_>>>()?;
                vec![HotkeyStep::new(resolved)]
            }
            Key::Name(text) if text.chars().count() == 1 => {
                vec![HotkeyStep::new(vec![self.resolve_name(text)?])]
            }
            Key::Name(text) => text
                .split(',')
                .map(|step| {
                    step.split('+')
                        .map(|key| self.resolve_name(key.trim()))
                        .collect::<Result<Vec<_>>>()
                        .map(HotkeyStep::new)
                })
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(HotkeySpec::new(steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::testing::dummy_table;
    use crate::os::LoopbackKeyboard;

    fn resolver() -> KeyResolver {
        KeyResolver::new(Arc::new(LoopbackKeyboard::new(dummy_table())))
    }

    fn p(value: u32) -> ScanCode {
        ScanCode::primary(value)
    }

    fn codes(resolver: &KeyResolver, key: impl Into<Key>) -> Vec<ScanCode> {
        resolver.key_to_scan_codes(&key.into()).unwrap()
    }

    #[test]
    fn test_every_table_name_resolves_in_order() {
        let resolver = resolver();
        for (name, entries) in dummy_table() {
            let expected: Vec<ScanCode> = entries.iter().map(|e| e.scan_code).collect();
            assert_eq!(codes(&resolver, name), expected, "key {name}");
        }
    }

    #[test]
    fn test_scan_code_is_singleton() {
        let resolver = resolver();
        for value in 0..10 {
            assert_eq!(codes(&resolver, value), vec![p(value)]);
        }
    }

    #[test]
    fn test_letters() {
        let resolver = resolver();
        assert_eq!(codes(&resolver, "a"), vec![p(1)]);
        assert_eq!(codes(&resolver, "A"), vec![p(1), ScanCode::shifted_alias(1)]);
    }

    #[test]
    fn test_uppercase_fallback_from_lowercase() {
        let resolver = KeyResolver::new(Arc::new(LoopbackKeyboard::us_layout()));
        assert_eq!(codes(&resolver, "Q"), vec![p(16), ScanCode::shifted_alias(16)]);
        let entry = resolver.resolve_char('Q').unwrap();
        assert_eq!(entry.scan_code, p(16));
        assert!(entry.requires("shift"));
    }

    #[test]
    fn test_sided_modifiers() {
        let resolver = resolver();
        assert_eq!(codes(&resolver, "shift"), vec![p(5), p(6)]);
        assert_eq!(codes(&resolver, "SHIFT"), vec![p(5), p(6)]);
        assert_eq!(codes(&resolver, "ctrl"), codes(&resolver, "CONTROL"));
        assert_eq!(codes(&resolver, "left shift"), vec![p(5)]);
        assert_eq!(codes(&resolver, "right shift"), vec![p(6)]);
        assert_eq!(codes(&resolver, "right_shift"), vec![p(6)]);
        assert_eq!(codes(&resolver, "_"), vec![p(12)]);
    }

    #[test]
    fn test_list_is_flattened() {
        let resolver = resolver();
        let key = Key::Many(vec![Key::from(10u32), Key::from(5u32), Key::from("a")]);
        assert_eq!(resolver.key_to_scan_codes(&key).unwrap(), vec![p(10), p(5), p(1)]);
    }

    #[test]
    fn test_invalid_keys() {
        let resolver = resolver();
        for key in [Key::from(""), Key::Many(vec![]), Key::from("invalid")] {
            assert!(matches!(
                resolver.key_to_scan_codes(&key),
                Err(KeyboardError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn test_is_modifier() {
        let resolver = resolver();
        for name in MODIFIER_NAMES {
            assert!(resolver.is_modifier(&Key::from(*name)), "{name}");
        }
        for value in 0..10u32 {
            assert_eq!(
                resolver.is_modifier(&Key::from(value)),
                [4, 5, 6, 7].contains(&value),
                "scan code {value}"
            );
        }
        assert!(!resolver.is_modifier(&Key::from("a")));
    }

    #[test]
    fn test_parse_hotkey_simple() {
        let resolver = resolver();
        let spec = |keys: Vec<Vec<Vec<ScanCode>>>| {
            HotkeySpec::new(keys.into_iter().map(HotkeyStep::new).collect())
        };
        let parse = |text: &str| resolver.parse_hotkey(&Key::from(text)).unwrap();

        assert_eq!(parse("a"), spec(vec![vec![vec![p(1)]]]));
        assert_eq!(parse("A"), spec(vec![vec![vec![p(1), ScanCode::shifted_alias(1)]]]));
        assert_eq!(parse("left shift + a"), spec(vec![vec![vec![p(5)], vec![p(1)]]]));
        assert_eq!(parse("left shift+a"), spec(vec![vec![vec![p(5)], vec![p(1)]]]));
        assert_eq!(parse("a,b"), spec(vec![vec![vec![p(1)]], vec![vec![p(2)]]]));
        assert_eq!(parse("a, b"), spec(vec![vec![vec![p(1)]], vec![vec![p(2)]]]));
        assert_eq!(
            parse("a+b, b+c"),
            spec(vec![vec![vec![p(1)], vec![p(2)]], vec![vec![p(2)], vec![p(3)]]])
        );
    }

    #[test]
    fn test_parse_hotkey_separator_synonyms() {
        let resolver = resolver();
        let parse = |text: &str| resolver.parse_hotkey(&Key::from(text)).unwrap();
        assert_eq!(parse("+"), parse("plus"));
        assert_eq!(parse(","), parse("comma"));
    }

    #[test]
    fn test_parse_hotkey_dangling_separator() {
        let resolver = resolver();
        assert!(resolver.parse_hotkey(&Key::from("ctrl+")).is_err());
    }
}
