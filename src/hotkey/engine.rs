//! Hotkey combination matching
//!
//! Every registered hotkey owns one automaton that sees every event
//! independently of the others. Observing hotkeys only watch; suppressing
//! hotkeys hold back modifier presses until they know whether the
//! combination completes.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::resolver::{HotkeySpec, HotkeyStep, KeyAlternatives};
use crate::error::{KeyboardError, Result};
use crate::events::{EventType, KeyboardEvent, ScanCode, Verdict};
use crate::state::PressedState;

pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

/// Identifies one hotkey registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyHandle(pub(crate) u64);

/// Progress of one modifier of a suppressing combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Idle,
    /// Down swallowed, not yet forwarded
    Buffered(ScanCode),
    /// Down forwarded downstream
    Held,
    /// Down swallowed for good by a completed combination
    Consumed,
}

#[derive(Debug, Default)]
struct Reaction {
    verdict: Option<Verdict>,
    flushes: Vec<ScanCode>,
    fire: Option<Vec<ScanCode>>,
}

impl Reaction {
    fn pass() -> Self {
        Self::default()
    }

    fn suppress() -> Self {
        Self {
            verdict: Some(Verdict::Suppress),
            ..Self::default()
        }
    }

    fn flush(flushes: Vec<ScanCode>) -> Self {
        Self {
            flushes,
            ..Self::default()
        }
    }
}

/// Single-step combination whose trigger press is swallowed
#[derive(Debug)]
struct SuppressingCombo {
    modifiers: Vec<KeyAlternatives>,
    trigger: KeyAlternatives,
    slots: Vec<Slot>,
    /// Modifier indexes in the order their Downs were buffered
    buffer_order: Vec<usize>,
    /// Trigger code whose Down was swallowed, so its Up is too
    fired: Option<ScanCode>,
}

impl SuppressingCombo {
    fn new(step: &HotkeyStep) -> Self {
        let modifiers = step.modifiers().to_vec();
        Self {
            slots: vec![Slot::Idle; modifiers.len()],
            modifiers,
            trigger: step.trigger().clone(),
            buffer_order: Vec::new(),
            fired: None,
        }
    }

    fn on_event(&mut self, event: &KeyboardEvent) -> Reaction {
        let code = event.scan_code;
        let modifier = self.modifiers.iter().position(|alternatives| alternatives.contains(&code));

        match (event.event_type, modifier) {
            (EventType::Down, Some(index)) => match self.slots[index] {
                Slot::Idle => {
                    self.slots[index] = Slot::Buffered(code);
                    self.buffer_order.push(index);
                    Reaction::suppress()
                }
                Slot::Buffered(_) | Slot::Consumed => Reaction::suppress(),
                Slot::Held => Reaction::pass(),
            },
            (EventType::Up, Some(index)) => {
                // Releasing a modifier early abandons the combination; its
                // held-back Down goes out just before this Up.
                match mem::replace(&mut self.slots[index], Slot::Idle) {
                    Slot::Buffered(down) => {
                        self.buffer_order.retain(|&i| i != index);
                        Reaction::flush(vec![down])
                    }
                    _ => Reaction::pass(),
                }
            }
            (EventType::Down, None) if self.trigger.contains(&code) => {
                if self.slots.iter().all(|slot| *slot != Slot::Idle) {
                    let consumed = self
                        .buffer_order
                        .drain(..)
                        .filter_map(|i| match self.slots[i] {
                            Slot::Buffered(down) => Some(down),
                            _ => None,
                        })
                        .collect::<Vec<_>>();
                    for slot in &mut self.slots {
                        if let Slot::Buffered(_) = slot {
                            *slot = Slot::Consumed;
                        }
                    }
                    self.fired = Some(code);
                    Reaction {
                        verdict: Some(Verdict::Suppress),
                        flushes: Vec::new(),
                        fire: Some(consumed),
                    }
                } else {
                    Reaction::flush(self.flush_all())
                }
            }
            (EventType::Up, None) if self.fired == Some(code) => {
                self.fired = None;
                Reaction::suppress()
            }
            (EventType::Down, None) => Reaction::flush(self.flush_all()),
            (EventType::Up, None) => Reaction::pass(),
        }
    }

    /// Release every held-back Down, most recently buffered first
    fn flush_all(&mut self) -> Vec<ScanCode> {
        let mut flushed = Vec::new();
        for index in self.buffer_order.drain(..).rev() {
            if let Slot::Buffered(down) = self.slots[index] {
                self.slots[index] = Slot::Held;
                flushed.push(down);
            }
        }
        flushed
    }

    /// Treat `codes` as swallowed by another hotkey's match
    ///
    /// Slots holding one of them stop being candidates for flushing; the
    /// later modifier Up passes as usual.
    fn absorb(&mut self, codes: &[ScanCode]) {
        for (index, alternatives) in self.modifiers.iter().enumerate() {
            if !alternatives.iter().any(|code| codes.contains(code)) {
                continue;
            }
            if matches!(self.slots[index], Slot::Buffered(_) | Slot::Held) {
                self.slots[index] = Slot::Consumed;
                self.buffer_order.retain(|&i| i != index);
            }
        }
    }

    /// Note that `codes` went downstream through some other path
    fn forwarded(&mut self, codes: &[ScanCode]) {
        for (index, alternatives) in self.modifiers.iter().enumerate() {
            let sent = match self.slots[index] {
                Slot::Buffered(down) => codes.contains(&down),
                Slot::Consumed => alternatives.iter().any(|code| codes.contains(code)),
                Slot::Idle | Slot::Held => false,
            };
            if sent {
                self.slots[index] = Slot::Held;
                self.buffer_order.retain(|&i| i != index);
            }
        }
    }

    /// Undo a completed match whose callback failed
    fn fail_open(&mut self) {
        for slot in &mut self.slots {
            if *slot == Slot::Consumed {
                *slot = Slot::Held;
            }
        }
        self.fired = None;
    }
}

/// Possibly multi-step combination that never affects delivery
#[derive(Debug)]
struct ObservingCombo {
    steps: Vec<HotkeyStep>,
    index: usize,
    last_step_at: Option<f64>,
    timeout: Duration,
}

impl ObservingCombo {
    fn new(spec: &HotkeySpec, timeout: Duration) -> Self {
        Self {
            steps: spec.steps.clone(),
            index: 0,
            last_step_at: None,
            timeout,
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_step_at = None;
    }

    /// Returns true when the final step completes
    fn on_event(&mut self, event: &KeyboardEvent, pressed: &PressedState) -> bool {
        if event.event_type != EventType::Down {
            return false;
        }
        let code = event.scan_code;

        if self.index > 0 {
            let expired = !self.timeout.is_zero()
                && self
                    .last_step_at
                    .is_some_and(|at| event.time - at > self.timeout.as_secs_f64());
            if expired || !self.steps[self.index].contains(code) {
                self.reset();
            }
        }

        let step = &self.steps[self.index];
        if !step.trigger().contains(&code) || !step_is_held(step, pressed) {
            return false;
        }

        if self.index + 1 == self.steps.len() {
            self.reset();
            true
        } else {
            self.index += 1;
            self.last_step_at = Some(event.time);
            false
        }
    }
}

/// Exactly the keys of `step` are down: each key has a pressed alternative
/// and nothing else is pressed
fn step_is_held(step: &HotkeyStep, pressed: &PressedState) -> bool {
    step.keys.iter().all(|alternatives| pressed.any_of(alternatives))
        && pressed.codes().iter().all(|code| step.contains(*code))
}

#[derive(Debug)]
enum Matcher {
    Suppressing(SuppressingCombo),
    Observing(ObservingCombo),
}

struct Entry {
    handle: HotkeyHandle,
    matcher: Matcher,
    callback: HotkeyCallback,
}

/// Callback to run inline for a suppressing match
pub(crate) struct InlineFire {
    pub handle: HotkeyHandle,
    pub callback: HotkeyCallback,
    /// Modifier Downs swallowed by the match, to replay if the callback fails
    pub consumed: Vec<ScanCode>,
}

/// A hotkey's verdict on the current event
pub(crate) struct Claim {
    pub verdict: Verdict,
    pub fire: Option<InlineFire>,
}

/// Everything the engine wants done for one event
#[derive(Default)]
pub(crate) struct EngineOutcome {
    /// Held-back Downs to press before the event is forwarded
    pub flushes: Vec<ScanCode>,
    /// Claims in registration order; the first one wins
    pub claims: Vec<Claim>,
    /// Observing callbacks for the worker queue
    pub queued: Vec<HotkeyCallback>,
}

/// All registered hotkey automata
#[derive(Default)]
pub struct HotkeyEngine {
    next_id: u64,
    entries: Vec<Entry>,
}

impl HotkeyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&mut self) -> HotkeyHandle {
        self.next_id += 1;
        HotkeyHandle(self.next_id)
    }

    /// Register a hotkey whose trigger is swallowed and whose callback runs
    /// inline
    ///
    /// Only single-step specs whose non-trigger keys are all modifiers can
    /// be suppressed.
    pub fn add_suppressing(
        &mut self,
        spec: &HotkeySpec,
        callback: HotkeyCallback,
        is_modifier: impl Fn(&[ScanCode]) -> bool,
    ) -> Result<HotkeyHandle> {
        let [step] = spec.steps.as_slice() else {
            return Err(KeyboardError::UnsupportedHotkey(
                "multi-step hotkeys cannot be suppressed".to_string(),
            ));
        };
        if let Some(key) = step.modifiers().iter().find(|alternatives| !is_modifier(alternatives.as_slice())) {
            return Err(KeyboardError::UnsupportedHotkey(format!(
                "suppressed combination needs modifiers before the trigger, found {key:?}"
            )));
        }

        let handle = self.next_handle();
        debug!(?handle, keys = step.keys.len(), "suppressing hotkey added");
        self.entries.push(Entry {
            handle,
            matcher: Matcher::Suppressing(SuppressingCombo::new(step)),
            callback,
        });
        Ok(handle)
    }

    /// Register a hotkey whose callback runs on the worker queue
    pub fn add_observing(&mut self, spec: &HotkeySpec, timeout: Duration, callback: HotkeyCallback) -> HotkeyHandle {
        let handle = self.next_handle();
        debug!(?handle, steps = spec.steps.len(), "observing hotkey added");
        self.entries.push(Entry {
            handle,
            matcher: Matcher::Observing(ObservingCombo::new(spec, timeout)),
            callback,
        });
        handle
    }

    /// Remove a hotkey, returning any modifier Downs it was still holding back
    pub fn remove(&mut self, handle: HotkeyHandle) -> Result<Vec<ScanCode>> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.handle == handle)
            .ok_or(KeyboardError::UnknownHandle(handle.0))?;
        let mut entry = self.entries.remove(position);
        let pending = Self::pending(&mut entry);
        self.forwarded(&pending);
        Ok(pending)
    }

    /// Remove every hotkey, returning held-back modifier Downs
    pub fn clear(&mut self) -> Vec<ScanCode> {
        let mut pending = Vec::new();
        for mut entry in self.entries.drain(..) {
            pending.extend(Self::pending(&mut entry));
        }
        pending
    }

    fn pending(entry: &mut Entry) -> Vec<ScanCode> {
        match &mut entry.matcher {
            Matcher::Suppressing(combo) => combo.flush_all(),
            Matcher::Observing(_) => Vec::new(),
        }
    }

    /// Tell every suppressing automaton that `codes` were pressed downstream
    fn forwarded(&mut self, codes: &[ScanCode]) {
        if codes.is_empty() {
            return;
        }
        for entry in &mut self.entries {
            if let Matcher::Suppressing(combo) = &mut entry.matcher {
                combo.forwarded(codes);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feed one event to every automaton
    ///
    /// When several suppressing hotkeys complete on the same event the
    /// first registered one claims it. Modifier Downs consumed by that
    /// match are never flushed by other hotkeys, and each held-back Down is
    /// flushed at most once.
    pub(crate) fn process(&mut self, event: &KeyboardEvent, pressed: &PressedState) -> EngineOutcome {
        let mut outcome = EngineOutcome::default();
        if event.scan_code.is_reserved() {
            return outcome;
        }

        let mut winner: Option<(HotkeyHandle, Vec<ScanCode>)> = None;
        for entry in &mut self.entries {
            match &mut entry.matcher {
                Matcher::Suppressing(combo) => {
                    let reaction = combo.on_event(event);
                    outcome.flushes.extend(reaction.flushes);
                    let Some(verdict) = reaction.verdict else {
                        continue;
                    };
                    let earlier = winner.as_ref().map(|(handle, _)| *handle);
                    let fire = match (reaction.fire, earlier) {
                        (Some(consumed), None) => {
                            debug!(handle = ?entry.handle, "suppressing hotkey matched");
                            winner = Some((entry.handle, consumed.clone()));
                            Some(InlineFire {
                                handle: entry.handle,
                                callback: Arc::clone(&entry.callback),
                                consumed,
                            })
                        }
                        (Some(consumed), Some(first)) => {
                            // Lost the tie: no claim, and whatever it held back goes out
                            debug!(handle = ?entry.handle, winner = ?first, "suppressing hotkey shadowed by earlier registration");
                            combo.fail_open();
                            outcome.flushes.extend(consumed);
                            continue;
                        }
                        (None, _) => None,
                    };
                    outcome.claims.push(Claim { verdict, fire });
                }
                Matcher::Observing(combo) => {
                    if combo.on_event(event, pressed) {
                        debug!(handle = ?entry.handle, "hotkey matched");
                        outcome.queued.push(Arc::clone(&entry.callback));
                    }
                }
            }
        }

        if let Some((handle, consumed)) = winner.filter(|(_, consumed)| !consumed.is_empty()) {
            outcome.flushes.retain(|code| !consumed.contains(code));
            for entry in &mut self.entries {
                if entry.handle == handle {
                    continue;
                }
                if let Matcher::Suppressing(combo) = &mut entry.matcher {
                    combo.absorb(&consumed);
                }
            }
        }

        let mut seen = Vec::with_capacity(outcome.flushes.len());
        outcome.flushes.retain(|code| {
            let first = !seen.contains(code);
            if first {
                seen.push(*code);
            }
            first
        });
        self.forwarded(&outcome.flushes);
        outcome
    }

    /// Treat a failed inline callback as if the match never happened
    ///
    /// `consumed` are the modifier Downs the match swallowed; the caller
    /// re-sends them.
    pub(crate) fn fail_open(&mut self, handle: HotkeyHandle, consumed: &[ScanCode]) {
        for entry in &mut self.entries {
            if let Matcher::Suppressing(combo) = &mut entry.matcher {
                if entry.handle == handle {
                    combo.fail_open();
                } else {
                    combo.forwarded(consumed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn p(value: u32) -> ScanCode {
        ScanCode::primary(value)
    }

    const CTRL: u32 = 7;
    const SHIFT: u32 = 5;
    const A: u32 = 1;
    const B: u32 = 2;

    fn spec(steps: &[&[u32]]) -> HotkeySpec {
        HotkeySpec::new(
            steps
                .iter()
                .map(|keys| HotkeyStep::new(keys.iter().map(|code| vec![p(*code)]).collect()))
                .collect(),
        )
    }

    fn is_modifier(codes: &[ScanCode]) -> bool {
        codes.iter().all(|c| [p(CTRL), p(SHIFT)].contains(c))
    }

    struct Harness {
        engine: HotkeyEngine,
        pressed: PressedState,
        fired: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                engine: HotkeyEngine::new(),
                pressed: PressedState::new(),
                fired: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn callback(&self) -> HotkeyCallback {
            let fired = Arc::clone(&self.fired);
            Arc::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
        }

        fn feed(&mut self, event_type: EventType, code: u32) -> EngineOutcome {
            let event = KeyboardEvent::new(event_type, p(code), None, 0.0);
            self.pressed.mutate(&event);
            self.engine.process(&event, &self.pressed)
        }

        fn feed_at(&mut self, event_type: EventType, code: u32, time: f64) -> EngineOutcome {
            let event = KeyboardEvent::new(event_type, p(code), None, time);
            self.pressed.mutate(&event);
            self.engine.process(&event, &self.pressed)
        }
    }

    fn suppressed(outcome: &EngineOutcome) -> bool {
        outcome.claims.first().map(|c| c.verdict) == Some(Verdict::Suppress)
    }

    fn fires(outcome: &EngineOutcome) -> bool {
        outcome.claims.iter().any(|c| c.fire.is_some())
    }

    #[test]
    fn test_suppressing_rejects_multi_step_and_non_modifiers() {
        let mut engine = HotkeyEngine::new();
        let callback: HotkeyCallback = Arc::new(|| {});
        assert!(matches!(
            engine.add_suppressing(&spec(&[&[A], &[B]]), Arc::clone(&callback), is_modifier),
            Err(KeyboardError::UnsupportedHotkey(_))
        ));
        assert!(matches!(
            engine.add_suppressing(&spec(&[&[A, B]]), callback, is_modifier),
            Err(KeyboardError::UnsupportedHotkey(_))
        ));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_suppressing_fires_in_any_modifier_order() {
        for order in [[CTRL, SHIFT], [SHIFT, CTRL]] {
            let mut h = Harness::new();
            let callback = h.callback();
            h.engine
                .add_suppressing(&spec(&[&[CTRL, SHIFT, A]]), callback, is_modifier)
                .unwrap();

            assert!(suppressed(&h.feed(EventType::Down, order[0])));
            assert!(suppressed(&h.feed(EventType::Down, order[1])));
            let outcome = h.feed(EventType::Down, A);
            assert!(suppressed(&outcome));
            let fire = outcome.claims[0].fire.as_ref().unwrap();
            assert_eq!(fire.consumed, vec![p(order[0]), p(order[1])]);

            // Trigger Up is swallowed, modifier Ups pass.
            assert!(suppressed(&h.feed(EventType::Up, A)));
            assert!(h.feed(EventType::Up, CTRL).claims.is_empty());
            assert!(h.feed(EventType::Up, SHIFT).claims.is_empty());
        }
    }

    #[test]
    fn test_early_release_flushes_only_that_modifier() {
        let mut h = Harness::new();
        let callback = h.callback();
        h.engine
            .add_suppressing(&spec(&[&[CTRL, SHIFT, A]]), callback, is_modifier)
            .unwrap();

        h.feed(EventType::Down, CTRL);
        h.feed(EventType::Down, SHIFT);
        let release = h.feed(EventType::Up, SHIFT);
        assert!(release.claims.is_empty());
        assert_eq!(release.flushes, vec![p(SHIFT)]);

        let trigger = h.feed(EventType::Down, A);
        assert!(trigger.claims.is_empty());
        assert_eq!(trigger.flushes, vec![p(CTRL)]);
    }

    #[test]
    fn test_unrelated_key_flushes_then_combo_still_completes() {
        let mut h = Harness::new();
        let callback = h.callback();
        h.engine
            .add_suppressing(&spec(&[&[CTRL, SHIFT, A]]), callback, is_modifier)
            .unwrap();

        h.feed(EventType::Down, CTRL);
        h.feed(EventType::Down, SHIFT);
        let unrelated = h.feed(EventType::Down, B);
        assert!(unrelated.claims.is_empty());
        assert_eq!(unrelated.flushes, vec![p(SHIFT), p(CTRL)]);
        assert!(h.feed(EventType::Up, B).claims.is_empty());

        let trigger = h.feed(EventType::Down, A);
        assert!(fires(&trigger));
        assert!(trigger.claims[0].fire.as_ref().unwrap().consumed.is_empty());
    }

    #[test]
    fn test_fail_open_lets_modifiers_through() {
        let mut h = Harness::new();
        let callback = h.callback();
        let handle = h
            .engine
            .add_suppressing(&spec(&[&[CTRL, A]]), callback, is_modifier)
            .unwrap();

        h.feed(EventType::Down, CTRL);
        assert!(fires(&h.feed(EventType::Down, A)));
        h.engine.fail_open(handle, &[p(CTRL)]);
        assert!(h.feed(EventType::Down, CTRL).claims.is_empty());
        assert!(h.feed(EventType::Up, A).claims.is_empty());
    }

    #[test]
    fn test_remove_returns_buffered_downs() {
        let mut h = Harness::new();
        let callback = h.callback();
        let handle = h
            .engine
            .add_suppressing(&spec(&[&[CTRL, A]]), callback, is_modifier)
            .unwrap();
        h.feed(EventType::Down, CTRL);
        assert_eq!(h.engine.remove(handle).unwrap(), vec![p(CTRL)]);
        assert!(matches!(h.engine.remove(handle), Err(KeyboardError::UnknownHandle(_))));
    }

    #[test]
    fn test_shared_modifier_flushes_once() {
        let mut h = Harness::new();
        for trigger in [A, B] {
            let callback = h.callback();
            h.engine
                .add_suppressing(&spec(&[&[CTRL, trigger]]), callback, is_modifier)
                .unwrap();
        }

        assert!(suppressed(&h.feed(EventType::Down, CTRL)));
        let release = h.feed(EventType::Up, CTRL);
        assert!(release.claims.is_empty());
        assert_eq!(release.flushes, vec![p(CTRL)]);

        h.feed(EventType::Down, CTRL);
        let unrelated = h.feed(EventType::Down, SHIFT);
        assert_eq!(unrelated.flushes, vec![p(CTRL)]);
    }

    #[test]
    fn test_match_keeps_siblings_from_flushing_consumed_modifier() {
        let mut h = Harness::new();
        for trigger in [B, A] {
            let callback = h.callback();
            h.engine
                .add_suppressing(&spec(&[&[CTRL, trigger]]), callback, is_modifier)
                .unwrap();
        }

        h.feed(EventType::Down, CTRL);
        let trigger = h.feed(EventType::Down, A);
        assert!(trigger.flushes.is_empty());
        assert!(suppressed(&trigger));
        assert!(fires(&trigger));

        // Neither hotkey re-sends ctrl on release.
        assert!(suppressed(&h.feed(EventType::Up, A)));
        let release = h.feed(EventType::Up, CTRL);
        assert!(release.claims.is_empty());
        assert!(release.flushes.is_empty());
    }

    #[test]
    fn test_modifier_flushed_by_sibling_is_not_consumed() {
        let mut h = Harness::new();
        let callback = h.callback();
        h.engine
            .add_suppressing(&spec(&[&[CTRL, A]]), callback, is_modifier)
            .unwrap();
        let callback = h.callback();
        h.engine
            .add_suppressing(&spec(&[&[CTRL, SHIFT, B]]), callback, is_modifier)
            .unwrap();

        h.feed(EventType::Down, CTRL);
        let shift = h.feed(EventType::Down, SHIFT);
        assert_eq!(shift.flushes, vec![p(CTRL)]);
        assert!(suppressed(&shift));

        let trigger = h.feed(EventType::Down, B);
        assert!(trigger.flushes.is_empty());
        let consumed = trigger
            .claims
            .iter()
            .find_map(|claim| claim.fire.as_ref())
            .map(|fire| fire.consumed.clone());
        assert_eq!(consumed, Some(vec![p(SHIFT)]));

        let release = h.feed(EventType::Up, CTRL);
        assert!(release.flushes.is_empty());
    }

    #[test]
    fn test_first_registered_hotkey_wins_tie() {
        let mut h = Harness::new();
        let first = h
            .engine
            .add_suppressing(&spec(&[&[CTRL, A]]), h.callback(), is_modifier)
            .unwrap();
        h.engine
            .add_suppressing(&spec(&[&[CTRL, A]]), h.callback(), is_modifier)
            .unwrap();

        h.feed(EventType::Down, CTRL);
        let trigger = h.feed(EventType::Down, A);
        let fires: Vec<HotkeyHandle> = trigger
            .claims
            .iter()
            .filter_map(|claim| claim.fire.as_ref().map(|fire| fire.handle))
            .collect();
        assert_eq!(fires, vec![first]);
        assert_eq!(trigger.claims.len(), 1);
        assert!(trigger.flushes.is_empty());

        // Only the winner swallows the trigger Up
        let release = h.feed(EventType::Up, A);
        assert_eq!(release.claims.len(), 1);
        assert!(h.feed(EventType::Up, CTRL).flushes.is_empty());
    }

    #[test]
    fn test_observing_requires_exact_combination() {
        let mut h = Harness::new();
        let callback = h.callback();
        h.engine.add_observing(&spec(&[&[CTRL, A]]), Duration::ZERO, callback);

        h.feed(EventType::Down, CTRL);
        assert_eq!(h.feed(EventType::Down, A).queued.len(), 1);
        h.feed(EventType::Up, A);

        h.feed(EventType::Down, SHIFT);
        assert!(h.feed(EventType::Down, A).queued.is_empty());
    }

    #[test]
    fn test_observing_multi_step() {
        let mut h = Harness::new();
        let callback = h.callback();
        h.engine.add_observing(&spec(&[&[A], &[B]]), Duration::ZERO, callback);

        assert!(h.feed(EventType::Down, A).queued.is_empty());
        h.feed(EventType::Up, A);
        assert_eq!(h.feed(EventType::Down, B).queued.len(), 1);
        h.feed(EventType::Up, B);

        // Out of order does not fire.
        assert!(h.feed(EventType::Down, B).queued.is_empty());
        h.feed(EventType::Up, B);
        h.feed(EventType::Down, A);
        h.feed(EventType::Up, A);
        h.feed(EventType::Down, CTRL);
        h.feed(EventType::Up, CTRL);
        assert!(h.feed(EventType::Down, B).queued.is_empty());
    }

    #[test]
    fn test_observing_step_timeout() {
        let mut h = Harness::new();
        let callback = h.callback();
        h.engine
            .add_observing(&spec(&[&[A], &[B]]), Duration::from_millis(100), callback);

        h.feed_at(EventType::Down, A, 10.0);
        h.feed_at(EventType::Up, A, 10.01);
        assert!(h.feed_at(EventType::Down, B, 10.5).queued.is_empty());
        h.feed_at(EventType::Up, B, 10.51);

        h.feed_at(EventType::Down, A, 11.0);
        h.feed_at(EventType::Up, A, 11.01);
        assert_eq!(h.feed_at(EventType::Down, B, 11.05).queued.len(), 1);
    }
}
