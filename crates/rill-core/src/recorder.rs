#![forbid(unsafe_code)]

//! Optional sink for dispatched states.
//!
//! A [`Recorder`] is attached to a node with
//! [`Node::attach_recorder`](crate::Node::attach_recorder). Every dispatch that
//! reaches observers is reported to it first. Gated dispatches (an unprimed
//! funnel) and suppressed sets are not reported.
//!
//! Recorders are explicit instances owned by whoever builds the graph; there
//! is no global recorder.

use crate::node::NodeKind;
use crate::value::Value;

/// Receives one call per propagated state.
pub trait Recorder {
    /// Record that the node registered under `name` propagated `value`.
    fn record(&self, name: &str, value: Option<&Value>, kind: NodeKind);
}
