#![forbid(unsafe_code)]

//! Views: memoized 1:1 transforms of an upstream node.
//!
//! A view subscribes to its source and, on every upstream emission, calls its
//! own equality-gated `set` with the transformed value. When the transform
//! maps two different upstream values to the same output, the view's
//! observers are not notified a second time.
//!
//! # Invariants
//!
//! 1. A view's value is always `transform(source value)` as of the last
//!    upstream emission. An absent upstream value makes the view absent; the
//!    transform is never called without a value.
//! 2. A view cannot be hydrated. State is restored at the source or funnel
//!    layer and flows through the transform.
//! 3. Destroying a view releases its upstream subscription and, if the
//!    upstream is itself a view, destroys that view too, unwinding the whole
//!    chain back to its source stream or funnel.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::node::{Link, Node, NodeKind};
use crate::value::Value;

pub(crate) type TransformFn = Rc<dyn Fn(&Value) -> Value>;

impl Node {
    /// Derive a view of this node through `transform`.
    pub fn view(&self, transform: impl Fn(&Value) -> Value + 'static) -> Node {
        attach(self, Rc::new(transform))
    }
}

fn attach(source: &Node, transform: TransformFn) -> Node {
    let view = Node::with_link(
        Link::View {
            source: source.clone(),
        },
        None,
    );
    let weak = view.downgrade();
    let subscriber = source.subscribe(move |value| {
        if let Some(inner) = weak.upgrade() {
            Node::from_inner(inner).set(value.map(|v| transform(v)));
        }
    });
    view.inner.state.borrow_mut().upstream.push(subscriber);
    tracing::debug!(message = "node.view.created", source = %source.kind());
    view
}

/// Release a view's upstream subscription, cascading into view sources.
pub(crate) fn teardown(view: &Node, source: &Node) -> Result<()> {
    {
        let state = view.inner.state.borrow();
        for subscriber in &state.upstream {
            subscriber.unsubscribe()?;
        }
    }
    tracing::debug!(message = "node.view.destroyed", source = %source.kind());
    if source.kind() == NodeKind::View {
        source.destroy()?;
    }
    Ok(())
}

/// Fallible construction of a view from parts that may be missing.
///
/// [`Node::view`] is the infallible form when both parts are at hand.
#[derive(Default)]
pub struct ViewBuilder {
    source: Option<Node>,
    transform: Option<TransformFn>,
}

impl ViewBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn source(mut self, source: &Node) -> Self {
        self.source = Some(source.clone());
        self
    }

    #[must_use]
    pub fn transform(mut self, transform: impl Fn(&Value) -> Value + 'static) -> Self {
        self.transform = Some(Rc::new(transform));
        self
    }

    /// Subscribe the view to its source.
    ///
    /// Fails with [`Error::MissingSource`] or [`Error::MissingTransform`].
    pub fn build(self) -> Result<Node> {
        let source = self.source.ok_or(Error::MissingSource)?;
        let transform = self.transform.ok_or(Error::MissingTransform)?;
        Ok(attach(&source, transform))
    }
}

impl std::fmt::Debug for ViewBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewBuilder")
            .field("source", &self.source)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
