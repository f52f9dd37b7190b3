//! Recording and playback of key events

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{KeyboardError, Result};
use crate::events::{EventType, KeyboardEvent};
use crate::hooks::{Hook, HookHandle};
use crate::hotkey::{Key, Listener};

/// Recording in progress
pub(crate) struct ActiveRecording {
    hook: HookHandle,
    events: Arc<Mutex<Vec<KeyboardEvent>>>,
}

impl Listener {
    /// Start capturing every event that reaches the rest of the system
    pub fn start_recording(&self) -> Result<()> {
        let mut pipeline = self.lock();
        if pipeline.recording.is_some() {
            return Err(KeyboardError::AlreadyRecording);
        }

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let hook = pipeline.hooks.add(Hook::observe(move |event| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }));
        pipeline.recording = Some(ActiveRecording { hook, events });
        info!("recording started");
        Ok(())
    }

    /// Stop capturing and return the events in arrival order
    ///
    /// # Panics
    ///
    /// Panics if called from inside a tokio runtime, since it blocks on a
    /// channel.
    pub fn stop_recording(&self) -> Result<Vec<KeyboardEvent>> {
        let recording = {
            let mut pipeline = self.lock();
            let recording = pipeline.recording.take().ok_or(KeyboardError::NoActiveRecording)?;
            if pipeline.hooks.remove(recording.hook).is_err() {
                warn!("recording hook was already removed");
            }
            recording
        };

        // Events accepted before the hook went away may still be queued.
        self.flush_callbacks();
        let events = mem::take(&mut *recording.events.lock().unwrap_or_else(PoisonError::into_inner));
        info!(count = events.len(), "recording stopped");
        Ok(events)
    }

    /// Record until `until` is pressed
    ///
    /// # Panics
    ///
    /// Panics if called from inside a tokio runtime, since it blocks on a
    /// channel.
    pub fn record(&self, until: impl Into<Key>) -> Result<Vec<KeyboardEvent>> {
        self.start_recording()?;
        if let Err(e) = self.wait(Some(until.into())) {
            let _ = self.stop_recording();
            return Err(e);
        }
        self.stop_recording()
    }

    /// Replay events through the backend
    ///
    /// Gaps between timestamps are divided by `speed_factor`; zero or less
    /// plays everything at once. Held keys are released for the duration
    /// and held modifiers pressed again afterwards.
    pub fn play(&self, events: &[KeyboardEvent], speed_factor: f64) {
        debug!(count = events.len(), speed_factor, "playing events");
        let state = self.stash_state();

        let mut last_time = None;
        for event in events {
            if speed_factor > 0.0 {
                if let Some(last) = last_time {
                    let gap = (event.time - last) / speed_factor;
                    if gap > 0.0 {
                        thread::sleep(Duration::from_secs_f64(gap));
                    }
                }
            }
            last_time = Some(event.time);

            if event.scan_code.is_reserved() {
                let typed = event.name.as_deref().and_then(|name| name.chars().next());
                if let (EventType::Down, Some(character)) = (event.event_type, typed) {
                    self.os().type_unicode(character);
                }
                continue;
            }
            match event.event_type {
                EventType::Down => self.os().press(event.scan_code),
                EventType::Up => self.os().release(event.scan_code),
            }
        }

        self.restore_modifiers(&state);
    }
}
