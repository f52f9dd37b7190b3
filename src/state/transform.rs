//! Block and remap rules applied before dispatch
//!
//! Rules are keyed on scan code rather than name: at dispatch time there is
//! no modifier history to tell `a` from `A`. Blocking `A` therefore also
//! blocks plain `a` wherever both share a physical code.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::pressed::PressedState;
use crate::events::{EventType, KeyboardEvent, ScanCode};

/// Synthetic key transition to inject through the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synthetic {
    Press(ScanCode),
    Release(ScanCode),
}

/// What the transform stage decided for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Dispatch the event unchanged
    Pass,
    /// Drop the event silently
    Drop,
    /// Suppress the event and inject these instead
    Replace(Vec<Synthetic>),
}

/// Block set, remap table and outstanding remapped presses
#[derive(Debug, Default)]
pub struct TransformStage {
    blocked: BTreeSet<ScanCode>,
    remaps: BTreeMap<ScanCode, Vec<ScanCode>>,
    /// Targets actually pressed for each source that is currently down
    outstanding: BTreeMap<ScanCode, Vec<ScanCode>>,
}

impl TransformStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&mut self, codes: &[ScanCode]) {
        self.blocked.extend(codes.iter().copied());
    }

    /// Returns false if none of the codes was blocked
    pub fn unblock(&mut self, codes: &[ScanCode]) -> bool {
        let mut removed = false;
        for code in codes {
            removed |= self.blocked.remove(code);
        }
        removed
    }

    pub fn remap(&mut self, sources: &[ScanCode], chain: Vec<ScanCode>) {
        for source in sources {
            self.remaps.insert(*source, chain.clone());
        }
    }

    /// Returns false if none of the codes was remapped
    pub fn unremap(&mut self, sources: &[ScanCode]) -> bool {
        let mut removed = false;
        for source in sources {
            removed |= self.remaps.remove(source).is_some();
        }
        removed
    }

    pub fn clear_blocks(&mut self) {
        self.blocked.clear();
    }

    pub fn clear_remaps(&mut self) {
        self.remaps.clear();
    }

    /// Decide how `event` reaches the rest of the pipeline
    ///
    /// `pressed` must already include `event`. Remap targets that are
    /// modifiers the user already holds are neither pressed nor released.
    pub fn apply(
        &mut self,
        event: &KeyboardEvent,
        pressed: &PressedState,
        modifier_codes: &BTreeSet<ScanCode>,
    ) -> Rewrite {
        let code = event.scan_code;
        if code.is_reserved() {
            return Rewrite::Pass;
        }
        if self.blocked.contains(&code) {
            debug!(%code, "blocked key event dropped");
            return Rewrite::Drop;
        }

        match event.event_type {
            EventType::Down => {
                if let Some(held) = self.outstanding.get(&code) {
                    // Key repeat re-sends only the final target key.
                    return match held.last() {
                        Some(last) => Rewrite::Replace(vec![Synthetic::Press(*last)]),
                        None => Rewrite::Drop,
                    };
                }
                let Some(chain) = self.remaps.get(&code) else {
                    return Rewrite::Pass;
                };
                let held: Vec<ScanCode> = chain
                    .iter()
                    .filter(|target| !(modifier_codes.contains(target) && pressed.contains(**target)))
                    .copied()
                    .collect();
                debug!(source = %code, targets = held.len(), "remapped key pressed");
                let presses = held.iter().map(|target| Synthetic::Press(*target)).collect();
                self.outstanding.insert(code, held);
                Rewrite::Replace(presses)
            }
            EventType::Up => match self.outstanding.remove(&code) {
                Some(held) => {
                    debug!(source = %code, "remapped key released");
                    Rewrite::Replace(held.iter().rev().map(|target| Synthetic::Release(*target)).collect())
                }
                None => Rewrite::Pass,
            },
        }
    }
}
