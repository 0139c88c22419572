#![forbid(unsafe_code)]

//! Synchronous reactive state graph.
//!
//! This crate provides the propagation primitives:
//!
//! - [`Node`]: a stateful node holding an optional immutable [`Value`] and an
//!   ordered list of observers. A node is a *source stream* (set by external
//!   code), a *view* (see [`Node::view`]) or a *funnel* (see
//!   [`Node::funnel`]).
//! - [`Subscriber`]: handle returned by [`Node::subscribe`], released
//!   explicitly with [`Subscriber::unsubscribe`].
//! - [`Recorder`]: optional sink told about every propagated state.
//!
//! # Architecture
//!
//! `Node` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Downstream nodes hold their upstream strongly; observer closures registered
//! upstream hold `Weak` handles back. All propagation is synchronous: a `set`
//! and its entire downstream fan-out complete before `set` returns. Hosts that
//! embed the graph in a multi-threaded program must serialize access to it.
//!
//! # Invariants
//!
//! 1. Values are replaced wholesale, never mutated in place.
//! 2. Setting a value structurally equal to the current one is a no-op.
//! 3. Observers are notified in subscription order.
//! 4. A funnel notifies nobody until every key holds a truthy value at once,
//!    then always propagates.
//! 5. Hydration via [`Node::force_state`] never notifies an observer.

pub mod error;
pub mod funnel;
pub mod node;
pub mod recorder;
pub mod subscriber;
pub mod value;
pub mod view;

pub use error::{Error, Result};
pub use funnel::FunnelBuilder;
pub use node::{Node, NodeKind};
pub use recorder::Recorder;
pub use subscriber::Subscriber;
pub use value::Value;
pub use view::ViewBuilder;

pub use im;
