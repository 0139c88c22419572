#![forbid(unsafe_code)]

//! Bounded ring of debug entries.
//!
//! # Invariants
//!
//! 1. The ring never holds more than `capacity` entries; pushing into a full
//!    ring evicts the oldest entry.
//! 2. While disabled, every push is ignored and `dump_to_log` logs nothing.
//! 3. `dump()` returns entries oldest first.
//!
//! # Failure Modes
//!
//! - **Dump callback re-enters the stack**: allowed. The predicate and
//!   callback run with no interior borrow held.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use rill_core::{NodeKind, Recorder, Value};

use crate::entry::Entry;

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 20;

/// Runtime configuration for a [`Stack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackConfig {
    /// Maximum number of retained entries.
    pub capacity: usize,
    /// Whether pushes are recorded at all.
    pub enabled: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            enabled: false,
        }
    }
}

impl StackConfig {
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

type Predicate = Box<dyn Fn(Option<&Value>) -> bool>;
type DumpCallback = Box<dyn Fn(Vec<Entry>)>;

struct DumpTrigger {
    predicate: Predicate,
    callback: DumpCallback,
}

struct StackInner {
    entries: VecDeque<Entry>,
    config: StackConfig,
    trigger: Option<Rc<DumpTrigger>>,
}

/// A bounded debug recorder.
///
/// Attach it to nodes through [`Recorder`] (share it as `Rc<Stack>`), and
/// push actions, transformers and log lines alongside.
pub struct Stack {
    inner: RefCell<StackInner>,
}

impl Stack {
    #[must_use]
    pub fn new(config: StackConfig) -> Self {
        Self {
            inner: RefCell::new(StackInner {
                entries: VecDeque::with_capacity(config.capacity),
                config,
                trigger: None,
            }),
        }
    }

    fn push(&self, entry: Entry) {
        let mut inner = self.inner.borrow_mut();
        if !inner.config.enabled || inner.config.capacity == 0 {
            return;
        }
        if inner.entries.len() == inner.config.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
    }

    pub fn push_action(&self, name: impl Into<String>, args: Value) {
        self.push(Entry::Action {
            name: name.into(),
            args,
        });
    }

    pub fn push_transformer(&self, name: impl Into<String>, args: Value) {
        self.push(Entry::Transformer {
            name: name.into(),
            args,
        });
    }

    pub fn push_log(&self, text: impl Into<String>) {
        self.push(Entry::Log { text: text.into() });
    }

    /// Record a node state, then fire the dump trigger if it matches.
    pub fn push_state(&self, name: impl Into<String>, state: Option<&Value>, kind: NodeKind) {
        self.push(Entry::State {
            name: name.into(),
            state: state.cloned(),
            kind,
        });

        let trigger = {
            let inner = self.inner.borrow();
            if !inner.config.enabled {
                return;
            }
            inner.trigger.clone()
        };
        if let Some(trigger) = trigger {
            if (trigger.predicate)(state) {
                tracing::debug!(message = "stack.dump_triggered", kind = %kind);
                (trigger.callback)(self.dump());
            }
        }
    }

    /// Retained entries, oldest first.
    #[must_use]
    pub fn dump(&self) -> Vec<Entry> {
        self.inner.borrow().entries.iter().cloned().collect()
    }

    /// After each recorded state accepted by `predicate`, hand a dump to
    /// `callback`. Replaces any earlier trigger.
    pub fn dump_when(
        &self,
        predicate: impl Fn(Option<&Value>) -> bool + 'static,
        callback: impl Fn(Vec<Entry>) + 'static,
    ) {
        self.inner.borrow_mut().trigger = Some(Rc::new(DumpTrigger {
            predicate: Box::new(predicate),
            callback: Box::new(callback),
        }));
    }

    pub fn clear_dump_trigger(&self) {
        self.inner.borrow_mut().trigger = None;
    }

    /// Log every retained entry as a structured event.
    ///
    /// State entries are narrowed to the value at `accessor`; pass `&[]` for
    /// the whole state.
    pub fn dump_to_log(&self, accessor: &[&str]) {
        let entries = {
            let inner = self.inner.borrow();
            if !inner.config.enabled {
                return;
            }
            inner.entries.iter().cloned().collect::<Vec<_>>()
        };
        for entry in &entries {
            entry.log(accessor);
        }
    }

    /// Resize the ring, dropping the oldest entries when shrinking.
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.config.capacity = capacity;
        let excess = inner.entries.len().saturating_sub(capacity);
        inner.entries.drain(..excess);
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.borrow().config.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.borrow().config.enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.borrow_mut().config.enabled = enabled;
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new(StackConfig::default())
    }
}

impl Recorder for Stack {
    fn record(&self, name: &str, value: Option<&Value>, kind: NodeKind) {
        self.push_state(name, value, kind);
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Stack")
            .field("config", &inner.config)
            .field("len", &inner.entries.len())
            .field("trigger", &inner.trigger.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
