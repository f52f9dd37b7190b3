//! System-wide keyboard listener
//!
//! Every event reported by the OS backend runs through one pipeline:
//! pressed-state update, block/remap rules, hotkey automata and finally
//! hooks. The pipeline lock is never held while user callbacks run or while
//! the backend is asked to press a key, since a press re-enters dispatch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::engine::{HotkeyCallback, HotkeyEngine, HotkeyHandle, InlineFire};
use super::keys::get_hotkey_name;
use super::resolver::{HotkeySpec, Key, KeyResolver};
use crate::config::Config;
use crate::error::{KeyboardError, Result};
use crate::events::{EventType, KeyboardEvent, ScanCode, Verdict};
use crate::hooks::{Hook, HookHandle, HookRegistry};
use crate::lifecycle::Signal;
use crate::os::OsKeyboard;
use crate::recorder::ActiveRecording;
use crate::state::{PressedState, Rewrite, Synthetic, TransformStage};
use crate::worker::Worker;

/// How a hotkey reacts when it matches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HotkeyOptions {
    /// Swallow the trigger and run the callback inline
    pub suppress: bool,
    /// Longest gap between steps of a multi-step hotkey; `None` uses the
    /// listener default and zero disables the limit
    pub timeout: Option<Duration>,
}

impl HotkeyOptions {
    pub fn suppressing() -> Self {
        Self {
            suppress: true,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Mutable dispatch state, guarded by one lock
#[derive(Default)]
pub(crate) struct Pipeline {
    pub pressed: PressedState,
    pub transform: TransformStage,
    pub engine: HotkeyEngine,
    pub hooks: HookRegistry,
    pub recording: Option<ActiveRecording>,
    /// Held-back Downs sent back through the backend; when they come round
    /// again they only visit the hooks
    pub replays: Vec<ScanCode>,
}

impl Pipeline {
    /// Remember re-sent Downs, at most one outstanding replay per code
    pub fn expect_replays(&mut self, codes: &[ScanCode]) {
        for code in codes {
            if !self.replays.contains(code) {
                self.replays.push(*code);
            }
        }
    }
}

pub(crate) struct Shared {
    pub os: Arc<dyn OsKeyboard>,
    pub resolver: KeyResolver,
    pub pipeline: Mutex<Pipeline>,
    pub worker: Worker,
    pub shutdown: Signal,
    /// Signals of pending `wait(Some(..))` calls, woken by `shutdown`
    pub waiters: Mutex<Vec<Arc<Signal>>>,
    pub hotkey_timeout: Duration,
}

/// Handle to the keyboard pipeline; clones share the same state
#[derive(Clone)]
pub struct Listener {
    pub(crate) inner: Arc<Shared>,
}

impl Listener {
    /// Initialize the backend and start receiving its events
    pub fn new(os: Arc<dyn OsKeyboard>, config: &Config) -> Result<Self> {
        os.init()?;
        let worker = Worker::spawn(config.queue_capacity)?;

        let inner = Arc::new(Shared {
            os: Arc::clone(&os),
            resolver: KeyResolver::new(Arc::clone(&os)),
            pipeline: Mutex::new(Pipeline::default()),
            worker,
            shutdown: Signal::new(),
            waiters: Mutex::new(Vec::new()),
            hotkey_timeout: config.hotkey_timeout,
        });

        let weak = Arc::downgrade(&inner);
        os.listen(Box::new(move |event: &KeyboardEvent| match weak.upgrade() {
            Some(inner) => Listener { inner }.dispatch(event),
            None => Verdict::Allow,
        }))?;

        info!(
            queue_capacity = config.queue_capacity,
            hotkey_timeout_ms = config.hotkey_timeout.as_millis() as u64,
            "keyboard listener started"
        );
        Ok(Self { inner })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Pipeline> {
        self.inner.pipeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn os(&self) -> &dyn OsKeyboard {
        self.inner.os.as_ref()
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.inner.resolver
    }

    /// Run one event through the pipeline and decide its delivery
    pub fn dispatch(&self, event: &KeyboardEvent) -> Verdict {
        trace!(%event, "dispatching key event");
        let modifier_codes = self.inner.resolver.modifier_codes();

        let outcome = {
            let mut guard = self.lock();
            let pipeline = &mut *guard;

            if event.is_down() {
                if let Some(position) = pipeline.replays.iter().position(|code| *code == event.scan_code) {
                    pipeline.replays.remove(position);
                    drop(guard);
                    return self.run_hooks(event);
                }
            }

            pipeline.pressed.mutate(event);
            match pipeline.transform.apply(event, &pipeline.pressed, modifier_codes) {
                Rewrite::Pass => {}
                Rewrite::Drop => return Verdict::Suppress,
                Rewrite::Replace(synthetic) => {
                    drop(guard);
                    self.emit(&synthetic);
                    return Verdict::Suppress;
                }
            }

            let outcome = pipeline.engine.process(event, &pipeline.pressed);
            pipeline.expect_replays(&outcome.flushes);
            outcome
        };

        for code in &outcome.flushes {
            self.inner.os.press(*code);
        }
        for callback in outcome.queued {
            self.inner.worker.submit(move || callback());
        }

        let mut claimed = None;
        for claim in outcome.claims {
            let verdict = match claim.fire {
                Some(fire) => self.fire_inline(fire, claim.verdict),
                None => Some(claim.verdict),
            };
            if claimed.is_none() {
                claimed = verdict;
            }
        }
        if let Some(verdict) = claimed {
            return verdict;
        }

        self.run_hooks(event)
    }

    /// Run a suppressing hotkey callback; a panic undoes the match
    fn fire_inline(&self, fire: InlineFire, verdict: Verdict) -> Option<Verdict> {
        let callback = Arc::clone(&fire.callback);
        if catch_unwind(AssertUnwindSafe(|| callback())).is_ok() {
            return Some(verdict);
        }

        error!(handle = ?fire.handle, "suppressing hotkey callback panicked, releasing held keys");
        {
            let mut pipeline = self.lock();
            pipeline.engine.fail_open(fire.handle, &fire.consumed);
            pipeline.expect_replays(&fire.consumed);
        }
        for code in &fire.consumed {
            self.inner.os.press(*code);
        }
        None
    }

    fn run_hooks(&self, event: &KeyboardEvent) -> Verdict {
        let matched = self.lock().hooks.matching(event);

        let mut verdict = Verdict::Allow;
        for filter in &matched.filters {
            match catch_unwind(AssertUnwindSafe(|| filter(event))) {
                Ok(Verdict::Suppress) => {
                    verdict = Verdict::Suppress;
                    break;
                }
                Ok(Verdict::Allow) => {}
                Err(_) => error!(%event, "suppressing hook panicked, allowing event"),
            }
        }

        if verdict.is_allow() {
            for observer in matched.observers {
                let event = event.clone();
                self.inner.worker.submit(move || observer(&event));
            }
        }
        verdict
    }

    fn emit(&self, synthetic: &[Synthetic]) {
        for step in synthetic {
            match step {
                Synthetic::Press(code) => self.inner.os.press(*code),
                Synthetic::Release(code) => self.inner.os.release(*code),
            }
        }
    }

    /// Scan codes a key resolves to
    pub fn key_to_scan_codes(&self, key: impl Into<Key>) -> Result<Vec<ScanCode>> {
        self.inner.resolver.key_to_scan_codes(&key.into())
    }

    pub fn parse_hotkey(&self, hotkey: impl Into<Key>) -> Result<HotkeySpec> {
        self.inner.resolver.parse_hotkey(&hotkey.into())
    }

    pub fn is_modifier(&self, key: impl Into<Key>) -> bool {
        self.inner.resolver.is_modifier(&key.into())
    }

    // Hooks

    /// Subscribe to every event
    pub fn hook(&self, hook: Hook) -> HookHandle {
        let handle = self.lock().hooks.add(hook);
        debug!(?handle, "hook added");
        handle
    }

    pub fn unhook(&self, handle: HookHandle) -> Result<()> {
        self.lock().hooks.remove(handle)
    }

    /// Subscribe to events of one key
    pub fn hook_key(&self, key: impl Into<Key>, hook: Hook) -> Result<HookHandle> {
        let codes = self.key_to_scan_codes(key)?;
        let handle = self.lock().hooks.add_key(codes, hook);
        debug!(?handle, "key hook added");
        Ok(handle)
    }

    pub fn unhook_key(&self, handle: HookHandle) -> Result<()> {
        self.lock().hooks.remove_key(handle)
    }

    pub fn on_press(&self, hook: Hook) -> HookHandle {
        self.hook(hook.only(EventType::Down))
    }

    pub fn on_release(&self, hook: Hook) -> HookHandle {
        self.hook(hook.only(EventType::Up))
    }

    pub fn on_press_key(&self, key: impl Into<Key>, hook: Hook) -> Result<HookHandle> {
        self.hook_key(key, hook.only(EventType::Down))
    }

    pub fn on_release_key(&self, key: impl Into<Key>, hook: Hook) -> Result<HookHandle> {
        self.hook_key(key, hook.only(EventType::Up))
    }

    /// Remove every hook and hotkey
    pub fn unhook_all(&self) {
        let pending = {
            let mut pipeline = self.lock();
            pipeline.hooks.clear();
            let pending = pipeline.engine.clear();
            pipeline.expect_replays(&pending);
            pending
        };
        for code in pending {
            self.inner.os.press(code);
        }
        info!("all hooks and hotkeys removed");
    }

    // Block and remap rules

    /// Drop every event of a key
    pub fn block_key(&self, key: impl Into<Key>) -> Result<()> {
        let codes = self.key_to_scan_codes(key)?;
        debug!(?codes, "blocking key");
        self.lock().transform.block(&codes);
        Ok(())
    }

    pub fn unblock_key(&self, key: impl Into<Key>) -> Result<()> {
        let key = key.into();
        let codes = self.inner.resolver.key_to_scan_codes(&key)?;
        if self.lock().transform.unblock(&codes) {
            Ok(())
        } else {
            Err(KeyboardError::NotRegistered(format!("{key:?} is not blocked")))
        }
    }

    pub fn unblock_all(&self) {
        self.lock().transform.clear_blocks();
    }

    /// Replace a key with another key or combination
    ///
    /// Pressing `source` presses the first scan code of every key in `target`
    /// in order; releasing it releases them in reverse.
    pub fn remap_key(&self, source: impl Into<Key>, target: impl Into<Key>) -> Result<()> {
        let sources = self.key_to_scan_codes(source)?;
        let spec = self.parse_hotkey(target)?;
        let chain: Vec<ScanCode> = spec
            .steps
            .iter()
            .flat_map(|step| step.keys.iter().filter_map(|alternatives| alternatives.first().copied()))
            .collect();
        debug!(?sources, ?chain, "remapping key");
        self.lock().transform.remap(&sources, chain);
        Ok(())
    }

    pub fn unremap_key(&self, source: impl Into<Key>) -> Result<()> {
        let key = source.into();
        let codes = self.inner.resolver.key_to_scan_codes(&key)?;
        if self.lock().transform.unremap(&codes) {
            Ok(())
        } else {
            Err(KeyboardError::NotRegistered(format!("{key:?} is not remapped")))
        }
    }

    pub fn unremap_all(&self) {
        self.lock().transform.clear_remaps();
    }

    // Hotkeys

    /// Run `callback` whenever `hotkey` is completed
    pub fn add_hotkey(
        &self,
        hotkey: impl Into<Key>,
        options: HotkeyOptions,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<HotkeyHandle> {
        let spec = self.parse_hotkey(hotkey)?;
        let callback: HotkeyCallback = Arc::new(callback);
        let resolver = &self.inner.resolver;
        resolver.modifier_codes();

        let mut pipeline = self.lock();
        if options.suppress {
            pipeline
                .engine
                .add_suppressing(&spec, callback, |alternatives| resolver.is_modifier_alternatives(alternatives))
        } else {
            let timeout = options.timeout.unwrap_or(self.inner.hotkey_timeout);
            Ok(pipeline.engine.add_observing(&spec, timeout, callback))
        }
    }

    /// Remove a hotkey; modifier presses it was holding back are sent
    pub fn remove_hotkey(&self, handle: HotkeyHandle) -> Result<()> {
        let pending = {
            let mut pipeline = self.lock();
            let pending = pipeline.engine.remove(handle)?;
            pipeline.expect_replays(&pending);
            pending
        };
        for code in pending {
            self.inner.os.press(code);
        }
        debug!(?handle, "hotkey removed");
        Ok(())
    }

    pub fn remove_all_hotkeys(&self) {
        let pending = {
            let mut pipeline = self.lock();
            let pending = pipeline.engine.clear();
            pipeline.expect_replays(&pending);
            pending
        };
        for code in pending {
            self.inner.os.press(code);
        }
    }

    // State queries

    /// True if the key, or every key of a single-step combination, is down
    pub fn is_pressed(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        if let Key::Code(code) = key {
            return Ok(self.lock().pressed.contains(code));
        }

        let spec = self.inner.resolver.parse_hotkey(&key)?;
        let [step] = spec.steps.as_slice() else {
            return Err(KeyboardError::UnsupportedQuery(format!(
                "{key:?} has more than one step"
            )));
        };
        let pipeline = self.lock();
        Ok(step.keys.iter().all(|alternatives| pipeline.pressed.any_of(alternatives)))
    }

    /// Currently pressed scan codes, ascending
    pub fn pressed_codes(&self) -> Vec<ScanCode> {
        self.lock().pressed.codes()
    }

    /// Canonical name of the keys currently down
    pub fn hotkey_name_of_pressed(&self) -> String {
        get_hotkey_name(self.lock().pressed.names())
    }

    /// Block until every queued callback so far has run
    ///
    /// # Panics
    ///
    /// Panics if called from inside a tokio runtime, since it blocks on a
    /// channel.
    pub fn flush_callbacks(&self) {
        self.inner.worker.join();
    }

    // Blocking helpers

    /// Block until `hotkey` is pressed, or until `shutdown` when `None`
    ///
    /// `shutdown` also ends a wait for a hotkey.
    pub fn wait(&self, hotkey: Option<Key>) -> Result<()> {
        let Some(hotkey) = hotkey else {
            self.inner.shutdown.wait();
            return Ok(());
        };

        let signal = Arc::new(Signal::new());
        let remote = Arc::clone(&signal);
        let handle = self.add_hotkey(hotkey, HotkeyOptions::default(), move || remote.trigger())?;

        self.waiters().push(Arc::clone(&signal));
        if self.is_shut_down() {
            signal.trigger();
        }
        signal.wait();
        self.waiters().retain(|waiter| !Arc::ptr_eq(waiter, &signal));
        self.remove_hotkey(handle)
    }

    fn waiters(&self) -> MutexGuard<'_, Vec<Arc<Signal>>> {
        self.inner.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a key is released and name the combination held until then
    ///
    /// # Panics
    ///
    /// Panics if called from inside a tokio runtime, since it blocks on a
    /// channel.
    pub fn read_hotkey(&self, suppress: bool) -> Result<String> {
        let (tx, mut rx) = mpsc::unbounded_channel::<KeyboardEvent>();
        let hook = if suppress {
            Hook::filter(move |event| {
                let _ = tx.send(event.clone());
                Verdict::Suppress
            })
        } else {
            Hook::observe(move |event| {
                let _ = tx.send(event.clone());
            })
        };
        let handle = self.hook(hook);

        let mut names = Vec::new();
        let result = loop {
            let Some(event) = rx.blocking_recv() else {
                break Err(KeyboardError::Backend("listener stopped while reading a hotkey".to_string()));
            };
            let name = event.name.clone().unwrap_or_else(|| event.scan_code.to_string());
            if !names.contains(&name) {
                names.push(name);
            }
            if event.event_type == EventType::Up {
                break Ok(get_hotkey_name(&names));
            }
        };

        if let Err(e) = self.unhook(handle) {
            warn!(error = %e, "read_hotkey hook already removed");
        }
        result
    }

    /// Release everything blocked in `wait(None)`
    pub fn shutdown(&self) {
        info!("keyboard listener shutting down");
        self.inner.shutdown.trigger();
        for waiter in self.waiters().iter() {
            waiter.trigger();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_triggered()
    }
}
