//! Tracking of currently pressed keys

use std::collections::BTreeMap;

use crate::events::{EventType, KeyboardEvent, ScanCode};

/// Set of scan codes whose latest event was a Down
///
/// The name reported with each Down is remembered so the current
/// combination can be named.
#[derive(Debug, Default, Clone)]
pub struct PressedState {
    pressed: BTreeMap<ScanCode, Option<String>>,
}

impl PressedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a key transition
    pub fn mutate(&mut self, event: &KeyboardEvent) {
        if event.scan_code.is_reserved() {
            return;
        }
        match event.event_type {
            EventType::Down => {
                let entry = self.pressed.entry(event.scan_code).or_insert(None);
                if event.name.is_some() {
                    *entry = event.name.clone();
                }
            }
            EventType::Up => {
                self.pressed.remove(&event.scan_code);
            }
        }
    }

    pub fn contains(&self, code: ScanCode) -> bool {
        self.pressed.contains_key(&code)
    }

    /// True if any alternative is down
    pub fn any_of(&self, alternatives: &[ScanCode]) -> bool {
        alternatives.iter().any(|code| self.contains(*code))
    }

    /// Pressed codes in ascending order
    pub fn codes(&self) -> Vec<ScanCode> {
        self.pressed.keys().copied().collect()
    }

    /// Names reported for the pressed keys, where known
    pub fn names(&self) -> Vec<String> {
        self.pressed.values().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pressed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty()
    }
}

/// Synthetic transitions that move `current` to exactly `target`
///
/// Releases come first, then presses, each in ascending order.
pub fn restore_plan(current: &[ScanCode], target: &[ScanCode]) -> (Vec<ScanCode>, Vec<ScanCode>) {
    let mut releases: Vec<ScanCode> = current.iter().filter(|c| !target.contains(c)).copied().collect();
    let mut presses: Vec<ScanCode> = target
        .iter()
        .filter(|c| !current.contains(c) && !c.is_reserved())
        .copied()
        .collect();
    releases.sort();
    releases.dedup();
    presses.sort();
    presses.dedup();
    (releases, presses)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(value: u32) -> ScanCode {
        ScanCode::primary(value)
    }

    #[test]
    fn test_down_then_up() {
        let mut state = PressedState::new();
        state.mutate(&KeyboardEvent::down(p(1), Some("a".into())));
        assert!(state.contains(p(1)));
        assert!(!state.contains(ScanCode::shifted_alias(1)));
        assert_eq!(state.names(), vec!["a".to_string()]);

        state.mutate(&KeyboardEvent::up(p(1), None));
        assert!(state.is_empty());
    }

    #[test]
    fn test_repeat_keeps_known_name() {
        let mut state = PressedState::new();
        state.mutate(&KeyboardEvent::down(p(7), Some("left ctrl".into())));
        state.mutate(&KeyboardEvent::down(p(7), None));
        assert_eq!(state.len(), 1);
        assert_eq!(state.names(), vec!["left ctrl".to_string()]);
    }

    #[test]
    fn test_reserved_code_is_ignored() {
        let mut state = PressedState::new();
        state.mutate(&KeyboardEvent::down(ScanCode::UNICODE, Some("é".into())));
        assert!(state.is_empty());
    }

    #[test]
    fn test_codes_are_ascending() {
        let mut state = PressedState::new();
        for value in [5, 1, 3] {
            state.mutate(&KeyboardEvent::down(p(value), None));
        }
        assert_eq!(state.codes(), vec![p(1), p(3), p(5)]);
    }

    #[test]
    fn test_restore_plan() {
        let (releases, presses) = restore_plan(&[p(2)], &[p(5), p(1)]);
        assert_eq!(releases, vec![p(2)]);
        assert_eq!(presses, vec![p(1), p(5)]);

        let (releases, presses) = restore_plan(&[p(1), p(5)], &[p(1), p(5)]);
        assert!(releases.is_empty());
        assert!(presses.is_empty());
    }
}
