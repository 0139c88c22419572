#![forbid(unsafe_code)]

//! The propagation node and its equality-gated dispatch.
//!
//! # Design
//!
//! There is one concrete node type. A [`Node`] is a cheap, clonable handle to
//! shared interior state; what distinguishes a source stream, a view and a
//! funnel is the [`Link`] fixed at construction, which decides how the node
//! is fed and whether its dispatch passes through the funnel priming gate.
//! Subscription bookkeeping is identical for all three.
//!
//! Ownership runs upstream: a view or funnel holds strong handles to the
//! nodes it reads from, while the observer closures it registers upstream
//! only hold `Weak` handles back to it. A node dropped without `destroy()`
//! leaves an inert observer behind on its upstream.
//!
//! # Invariants
//!
//! 1. `set` dispatches only when the new value is structurally different
//!    from the current one (absent → present and present → absent count as
//!    different).
//! 2. Observers are notified in subscription order, synchronously, before
//!    `set` returns.
//! 3. Observers registered or released while a dispatch is running do not
//!    affect that dispatch: it notifies the list as it was when it started.
//! 4. No interior borrow is held while user code (observers, transforms,
//!    recorders) runs, so observers may freely re-enter the graph.
//!
//! # Failure Modes
//!
//! - **Observer panics**: the panic unwinds to the caller of `set`; observers
//!   later in the list are not notified. Delivery is attempted, not
//!   transactional. The node's value has already been replaced.
//! - **Cycles**: an observer that sets an upstream node recurses
//!   synchronously. A cyclic graph recurses without bound.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::recorder::Recorder;
use crate::subscriber::Subscriber;
use crate::value::Value;
use crate::{funnel, view};

pub(crate) type ObserverFn = Rc<dyn Fn(Option<&Value>)>;

/// Which role a node plays in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Leaf node, only changed by external `set` calls.
    Source,
    /// Pure transform of one upstream node.
    View,
    /// Keyed join of several upstream nodes, gated by priming.
    Funnel,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::View => "view",
            Self::Funnel => "funnel",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a node is connected upstream. Fixed at construction.
pub(crate) enum Link {
    Source,
    View { source: Node },
    Funnel { sources: Vec<(String, Node)> },
}

impl Link {
    fn kind(&self) -> NodeKind {
        match self {
            Self::Source => NodeKind::Source,
            Self::View { .. } => NodeKind::View,
            Self::Funnel { .. } => NodeKind::Funnel,
        }
    }
}

struct Observer {
    token: u64,
    callback: ObserverFn,
}

struct AttachedRecorder {
    name: Rc<str>,
    recorder: Rc<dyn Recorder>,
}

/// Mutable interior of a node.
pub(crate) struct NodeState {
    pub(crate) value: Option<Value>,
    observers: Vec<Observer>,
    next_token: u64,
    /// Funnel priming latch. Never reset once set.
    pub(crate) primed: bool,
    /// Handles this node owns on its upstream nodes, in source order.
    pub(crate) upstream: Vec<Subscriber>,
    recorder: Option<AttachedRecorder>,
}

impl NodeState {
    /// Remove the observer registered under `token`. Returns whether it was
    /// present.
    pub(crate) fn remove_observer(&mut self, token: u64) -> bool {
        match self.observers.iter().position(|o| o.token == token) {
            Some(idx) => {
                self.observers.remove(idx);
                true
            }
            None => false,
        }
    }

    pub(crate) fn has_observer(&self, token: u64) -> bool {
        self.observers.iter().any(|o| o.token == token)
    }
}

pub(crate) struct NodeInner {
    pub(crate) link: Link,
    pub(crate) state: RefCell<NodeState>,
}

/// A stateful node in the propagation graph.
///
/// Cloning a `Node` creates a new handle to the **same** node.
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Rc<NodeInner>,
}

impl Node {
    /// Create a source stream, optionally holding an initial value.
    #[must_use]
    pub fn new(initial: impl Into<Option<Value>>) -> Self {
        Self::with_link(Link::Source, initial.into())
    }

    /// Create a source stream that has never emitted.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_link(Link::Source, None)
    }

    pub(crate) fn with_link(link: Link, value: Option<Value>) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                link,
                state: RefCell::new(NodeState {
                    value,
                    observers: Vec::new(),
                    next_token: 0,
                    primed: false,
                    upstream: Vec::new(),
                    recorder: None,
                }),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<NodeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Rc<NodeInner>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.inner.link.kind()
    }

    /// Current value, or `None` if the node has never emitted.
    #[must_use]
    pub fn get(&self) -> Option<Value> {
        self.inner.state.borrow().value.clone()
    }

    /// Access the current value by reference.
    ///
    /// # Panics
    ///
    /// Panics if the closure calls `set` on the same node (re-entrant
    /// borrow).
    pub fn with<R>(&self, f: impl FnOnce(Option<&Value>) -> R) -> R {
        f(self.inner.state.borrow().value.as_ref())
    }

    #[must_use]
    pub fn has_value(&self) -> bool {
        self.inner.state.borrow().value.is_some()
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.state.borrow().observers.len()
    }

    /// Whether the node forwards dispatches to observers.
    ///
    /// Only funnels start unprimed; sources and views are always primed.
    #[must_use]
    pub fn is_primed(&self) -> bool {
        match self.inner.link {
            Link::Funnel { .. } => self.inner.state.borrow().primed,
            Link::Source | Link::View { .. } => true,
        }
    }

    /// Whether two handles refer to the same node.
    #[must_use]
    pub fn same_node(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register `observer`, returning the handle that releases it.
    ///
    /// If the node already holds a value (and, for a funnel, is primed) the
    /// observer is called once with it before this returns.
    pub fn subscribe(&self, observer: impl Fn(Option<&Value>) + 'static) -> Subscriber {
        let callback: ObserverFn = Rc::new(observer);
        let (token, replay) = {
            let mut state = self.inner.state.borrow_mut();
            let token = state.next_token;
            state.next_token += 1;
            state.observers.push(Observer {
                token,
                callback: Rc::clone(&callback),
            });
            let gated = matches!(self.inner.link, Link::Funnel { .. }) && !state.primed;
            let replay = if gated { None } else { state.value.clone() };
            (token, replay)
        };
        if let Some(value) = replay {
            callback(Some(&value));
        }
        Subscriber::new(self.downgrade(), token)
    }

    /// Replace the value, notifying observers only if it changed.
    pub fn set(&self, value: impl Into<Option<Value>>) {
        let value = value.into();
        let unchanged = self.inner.state.borrow().value == value;
        if unchanged {
            tracing::trace!(message = "node.set.unchanged", kind = %self.kind());
            return;
        }
        self.dispatch(value);
    }

    /// Store `value` and propagate it, subject to the funnel priming gate.
    fn dispatch(&self, value: Option<Value>) {
        let (observers, recorder) = {
            let mut state = self.inner.state.borrow_mut();
            let open = match &self.inner.link {
                Link::Funnel { sources } => {
                    funnel::priming_gate(sources, &mut state.primed, value.as_ref())
                }
                Link::Source | Link::View { .. } => true,
            };
            if !open {
                tracing::trace!(message = "node.dispatch.gated", kind = %self.kind());
                state.value = value;
                return;
            }
            state.value = value.clone();
            let observers: Vec<ObserverFn> = state
                .observers
                .iter()
                .map(|o| Rc::clone(&o.callback))
                .collect();
            let recorder = state
                .recorder
                .as_ref()
                .map(|r| (Rc::clone(&r.name), Rc::clone(&r.recorder)));
            (observers, recorder)
        };

        tracing::trace!(
            message = "node.dispatch",
            kind = %self.kind(),
            observers = observers.len(),
            present = value.is_some()
        );
        if let Some((name, recorder)) = recorder {
            recorder.record(&name, value.as_ref(), self.kind());
        }
        for observer in &observers {
            observer(value.as_ref());
        }
    }

    /// Overwrite state silently, for hydrating a graph from persisted state.
    ///
    /// Sources take the value as-is. Funnels hand each source the slice of
    /// `value` under its key, recursively. Views reject hydration with
    /// [`Error::ForceStateOnView`]. No observer is notified anywhere.
    pub fn force_state(&self, value: impl Into<Option<Value>>) -> Result<()> {
        let value = value.into();
        match &self.inner.link {
            Link::Source => {
                self.inner.state.borrow_mut().value = value;
                Ok(())
            }
            Link::View { .. } => Err(Error::ForceStateOnView),
            Link::Funnel { sources } => funnel::hydrate(self, sources, value),
        }
    }

    /// Release the upstream subscriptions this node owns.
    ///
    /// A source owns none, so this is a no-op for it. A view also tears down
    /// an upstream view chain. Calling `destroy()` twice on a view or funnel
    /// fails with [`Error::NotSubscribed`].
    pub fn destroy(&self) -> Result<()> {
        match &self.inner.link {
            Link::Source => Ok(()),
            Link::View { source } => view::teardown(self, source),
            Link::Funnel { sources } => funnel::release(self, sources),
        }
    }

    /// Report every propagated state to `recorder` under `name`.
    ///
    /// Replaces any recorder attached earlier.
    pub fn attach_recorder(&self, name: impl Into<String>, recorder: Rc<dyn Recorder>) {
        let name: String = name.into();
        self.inner.state.borrow_mut().recorder = Some(AttachedRecorder {
            name: Rc::from(name),
            recorder,
        });
    }

    pub fn detach_recorder(&self) {
        self.inner.state.borrow_mut().recorder = None;
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Node")
            .field("kind", &self.kind())
            .field("value", &state.value)
            .field("observers", &state.observers.len())
            .field("primed", &state.primed)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
