//! Hook registrations: general and key-specific subscriptions

use std::fmt;
use std::sync::Arc;

use crate::error::{KeyboardError, Result};
use crate::events::{EventType, KeyboardEvent, ScanCode, Verdict};

pub type ObserveFn = Arc<dyn Fn(&KeyboardEvent) + Send + Sync>;
pub type FilterFn = Arc<dyn Fn(&KeyboardEvent) -> Verdict + Send + Sync>;

/// A keyboard event callback
///
/// Observers run on the callback worker and cannot affect delivery.
/// Filters run inline on the input thread and decide whether the event is
/// forwarded.
#[derive(Clone)]
pub enum Hook {
    Observe(ObserveFn),
    Filter(FilterFn),
}

impl Hook {
    pub fn observe(callback: impl Fn(&KeyboardEvent) + Send + Sync + 'static) -> Self {
        Hook::Observe(Arc::new(callback))
    }

    pub fn filter(callback: impl Fn(&KeyboardEvent) -> Verdict + Send + Sync + 'static) -> Self {
        Hook::Filter(Arc::new(callback))
    }

    /// Only react to one event type; filters let the other type through
    pub(crate) fn only(self, wanted: EventType) -> Self {
        match self {
            Hook::Observe(callback) => Hook::observe(move |event| {
                if event.event_type == wanted {
                    callback(event);
                }
            }),
            Hook::Filter(callback) => Hook::filter(move |event| {
                if event.event_type == wanted {
                    callback(event)
                } else {
                    Verdict::Allow
                }
            }),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Observe(_) => write!(f, "Hook::Observe"),
            Hook::Filter(_) => write!(f, "Hook::Filter"),
        }
    }
}

/// Identifies one hook registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(pub(crate) u64);

struct Registration {
    handle: HookHandle,
    codes: Vec<ScanCode>,
    hook: Hook,
}

/// Callbacks applicable to one event
#[derive(Default)]
pub(crate) struct Matched {
    pub filters: Vec<FilterFn>,
    pub observers: Vec<ObserveFn>,
}

/// Ordered hook subscriptions
#[derive(Default)]
pub struct HookRegistry {
    next_id: u64,
    general: Vec<Registration>,
    keyed: Vec<Registration>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&mut self) -> HookHandle {
        self.next_id += 1;
        HookHandle(self.next_id)
    }

    /// Subscribe to every event
    pub fn add(&mut self, hook: Hook) -> HookHandle {
        let handle = self.next_handle();
        self.general.push(Registration {
            handle,
            codes: Vec::new(),
            hook,
        });
        handle
    }

    /// Subscribe to events carrying any of `codes`
    pub fn add_key(&mut self, codes: Vec<ScanCode>, hook: Hook) -> HookHandle {
        let handle = self.next_handle();
        self.keyed.push(Registration { handle, codes, hook });
        handle
    }

    /// Remove a general or key-specific hook
    pub fn remove(&mut self, handle: HookHandle) -> Result<()> {
        if Self::take(&mut self.general, handle) || Self::take(&mut self.keyed, handle) {
            Ok(())
        } else {
            Err(KeyboardError::UnknownHandle(handle.0))
        }
    }

    /// Remove a key-specific hook
    pub fn remove_key(&mut self, handle: HookHandle) -> Result<()> {
        if Self::take(&mut self.keyed, handle) {
            Ok(())
        } else {
            Err(KeyboardError::UnknownHandle(handle.0))
        }
    }

    fn take(registrations: &mut Vec<Registration>, handle: HookHandle) -> bool {
        let before = registrations.len();
        registrations.retain(|r| r.handle != handle);
        registrations.len() != before
    }

    pub fn clear(&mut self) {
        self.general.clear();
        self.keyed.clear();
    }

    pub fn len(&self) -> usize {
        self.general.len() + self.keyed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hooks for `event`: key-specific ones first, then general, each in
    /// registration order
    pub(crate) fn matching(&self, event: &KeyboardEvent) -> Matched {
        let mut matched = Matched::default();
        let keyed = self
            .keyed
            .iter()
            .filter(|r| r.codes.contains(&event.scan_code));
        for registration in keyed.chain(self.general.iter()) {
            match &registration.hook {
                Hook::Filter(callback) => matched.filters.push(Arc::clone(callback)),
                Hook::Observe(callback) => matched.observers.push(Arc::clone(callback)),
            }
        }
        matched
    }
}
