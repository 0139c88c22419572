#![forbid(unsafe_code)]

//! Funnels: keyed N:1 joins with a one-way priming latch.
//!
//! A funnel subscribes to a fixed, ordered set of named upstream nodes and
//! keeps a keyed map of their latest values as its own value. Each upstream
//! emission is merged into that map through the funnel's equality-gated
//! `set`, so an upstream change that leaves the aggregate unchanged is not
//! re-emitted.
//!
//! # Priming
//!
//! Until every key has reported a truthy value (see [`Value::is_truthy`]),
//! the funnel stores the partial aggregate but notifies nobody, and new
//! subscribers get no replay. The first aggregate with every key truthy opens
//! the gate for good: later aggregates are propagated even if a key has since
//! gone absent or falsy.
//!
//! # Hydration
//!
//! [`Node::force_state`] on a funnel walks its sources top-down, handing each
//! the slice of the supplied value under its key. Nested funnels recurse and
//! sources store their slice. Nothing is propagated at any level.

use im::OrdMap;

use crate::error::{Error, Result};
use crate::node::{Link, Node, NodeKind};
use crate::value::Value;

impl Node {
    /// Join the given `(key, node)` pairs into a funnel.
    ///
    /// Fails if no source is given, a key repeats, or a source is a view.
    pub fn funnel<'a, K: Into<String>>(
        sources: impl IntoIterator<Item = (K, &'a Node)>,
    ) -> Result<Node> {
        build(
            sources
                .into_iter()
                .map(|(key, node)| (key.into(), node.clone()))
                .collect(),
        )
    }
}

fn build(sources: Vec<(String, Node)>) -> Result<Node> {
    if sources.is_empty() {
        return Err(Error::MissingSources);
    }
    for (idx, (key, node)) in sources.iter().enumerate() {
        if sources[..idx].iter().any(|(seen, _)| seen == key) {
            return Err(Error::DuplicateKey { key: key.clone() });
        }
        if node.kind() == NodeKind::View {
            return Err(Error::ViewSource { key: key.clone() });
        }
    }

    let keyed = sources.clone();
    let funnel = Node::with_link(Link::Funnel { sources }, Some(Value::empty_map()));

    let mut subscribers = Vec::with_capacity(keyed.len());
    for (key, source) in &keyed {
        let weak = funnel.downgrade();
        let key = key.clone();
        subscribers.push(source.subscribe(move |value| {
            if let Some(inner) = weak.upgrade() {
                let node = Node::from_inner(inner);
                let merged = merge(node.get(), &key, value);
                node.set(merged);
            }
        }));
    }
    funnel.inner.state.borrow_mut().upstream = subscribers;

    tracing::debug!(
        message = "node.funnel.created",
        keys = keyed.len(),
        primed = funnel.is_primed()
    );
    Ok(funnel)
}

/// Fold one upstream emission into the aggregate.
fn merge(aggregate: Option<Value>, key: &str, value: Option<&Value>) -> Value {
    let aggregate = aggregate.unwrap_or_else(Value::empty_map);
    match value {
        Some(v) => aggregate.insert(key, v.clone()),
        None => aggregate.remove(key),
    }
}

/// Decide whether a funnel dispatch reaches observers, latching `primed`
/// the first time every key holds a truthy value.
pub(crate) fn priming_gate(
    sources: &[(String, Node)],
    primed: &mut bool,
    value: Option<&Value>,
) -> bool {
    if *primed {
        return true;
    }
    let complete = value.is_some_and(|aggregate| {
        sources
            .iter()
            .all(|(key, _)| aggregate.get(key).is_some_and(Value::is_truthy))
    });
    if complete {
        *primed = true;
        tracing::debug!(message = "node.funnel.primed", keys = sources.len());
    }
    complete
}

/// Hydrate every source from its keyed slice of `state`, then refresh the
/// funnel's own aggregate to match. Silent at every level.
pub(crate) fn hydrate(funnel: &Node, sources: &[(String, Node)], state: Option<Value>) -> Result<()> {
    let mut aggregate = OrdMap::new();
    for (key, source) in sources {
        let slice = state.as_ref().and_then(|s| s.get(key)).cloned();
        source.force_state(slice)?;
        if let Some(value) = source.get() {
            aggregate.insert(key.clone(), value);
        }
    }
    funnel.inner.state.borrow_mut().value = Some(Value::Map(aggregate));
    tracing::debug!(message = "node.funnel.hydrated", keys = sources.len());
    Ok(())
}

/// Release every upstream subscription, reporting the first failure.
pub(crate) fn release(funnel: &Node, sources: &[(String, Node)]) -> Result<()> {
    let state = funnel.inner.state.borrow();
    let mut first_err = None;
    for ((key, _), subscriber) in sources.iter().zip(&state.upstream) {
        if let Err(err) = subscriber.unsubscribe() {
            tracing::warn!(message = "node.funnel.release_failed", key = %key, error = %err);
            first_err.get_or_insert(err);
        }
    }
    tracing::debug!(message = "node.funnel.destroyed", keys = sources.len());
    first_err.map_or(Ok(()), Err)
}

/// Fallible, incremental construction of a funnel.
#[derive(Debug, Default)]
pub struct FunnelBuilder {
    sources: Vec<(String, Node)>,
}

impl FunnelBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source under `key`. Order of calls fixes source order.
    #[must_use]
    pub fn source(mut self, key: impl Into<String>, node: &Node) -> Self {
        self.sources.push((key.into(), node.clone()));
        self
    }

    /// Validate the sources and subscribe to each of them.
    pub fn build(self) -> Result<Node> {
        build(self.sources)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn foo() -> Value {
        Value::map([("foo", Value::from("bar"))])
    }

    fn name() -> Value {
        Value::map([("name", Value::from("finn"))])
    }

    fn counting(node: &Node) -> (Rc<Cell<u32>>, crate::Subscriber) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = node.subscribe(move |_| c.set(c.get() + 1));
        (count, sub)
    }

    #[test]
    fn requires_sources() {
        let none: [(&str, &Node); 0] = [];
        assert_eq!(Node::funnel(none).expect_err("empty"), Error::MissingSources);
        assert_eq!(
            FunnelBuilder::new().build().expect_err("empty"),
            Error::MissingSources
        );
    }

    #[test]
    fn rejects_duplicate_keys() {
        let a = Node::empty();
        let b = Node::empty();
        let err = Node::funnel([("k", &a), ("k", &b)]).expect_err("duplicate");
        assert_eq!(err, Error::DuplicateKey { key: "k".into() });
        assert_eq!(a.observer_count(), 0);
    }

    #[test]
    fn rejects_views() {
        let source = Node::empty();
        let view = source.view(|v| v.clone());
        let err = FunnelBuilder::new()
            .source("view", &view)
            .build()
            .expect_err("view source");
        assert_eq!(err, Error::ViewSource { key: "view".into() });
    }

    #[test]
    fn subscribes_to_each_source() {
        let source = Node::empty();
        let _funnel = Node::funnel([("source", &source)]).expect("valid");
        assert_eq!(source.observer_count(), 1);
    }

    #[test]
    fn funnels_can_feed_funnels() {
        let s1 = Node::empty();
        let s2 = Node::empty();
        let inner = Node::funnel([("source", &s1)]).expect("valid");
        let _outer = Node::funnel([("source", &s2), ("funnel", &inner)]).expect("valid");
        assert_eq!(inner.observer_count(), 1);
    }

    #[test]
    fn receives_state_from_sources() {
        let foo_stream = Node::new(foo());
        let funnel = Node::funnel([("FooStream", &foo_stream)]).expect("valid");
        let agg = funnel.get().expect("aggregate");
        assert_eq!(agg.get_in(&["FooStream", "foo"]), Some(&Value::from("bar")));
    }

    #[test]
    fn receives_state_changes_and_forwards_them() {
        let foo_stream = Node::new(foo());
        let funnel = Node::funnel([("FooStream", &foo_stream)]).expect("valid");
        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        let _sub = funnel.subscribe(move |v| *s.borrow_mut() = v.cloned());

        foo_stream.set(foo().insert("foo", Value::from("baz")));
        let agg = seen.borrow().clone().expect("notified");
        assert_eq!(agg.get_in(&["FooStream", "foo"]), Some(&Value::from("baz")));
    }

    #[test]
    fn holds_back_until_all_sources_report() {
        let pending = Node::empty();
        let funnel = Node::funnel([("foo", &pending)]).expect("valid");
        let (count, _sub) = counting(&funnel);
        assert_eq!(count.get(), 0);
        assert!(!funnel.is_primed());

        pending.set(foo());
        assert_eq!(count.get(), 1);
        assert!(funnel.is_primed());
    }

    #[test]
    fn priming_latch_over_two_keys() {
        let a = Node::empty();
        let b = Node::empty();
        let funnel = Node::funnel([("A", &a), ("B", &b)]).expect("valid");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = funnel.subscribe(move |v| s.borrow_mut().push(v.cloned()));

        a.set(Value::from(1));
        assert!(seen.borrow().is_empty());
        assert_eq!(funnel.get(), Some(Value::map([("A", Value::from(1))])));

        b.set(Value::from(2));
        assert_eq!(
            *seen.borrow(),
            vec![Some(Value::map([("A", Value::from(1)), ("B", Value::from(2))]))]
        );

        a.set(Value::from(3));
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(
            seen.borrow()[1],
            Some(Value::map([("A", Value::from(3)), ("B", Value::from(2))]))
        );
    }

    #[test]
    fn falsy_source_value_keeps_funnel_unprimed() {
        let a = Node::empty();
        let b = Node::empty();
        let funnel = Node::funnel([("A", &a), ("B", &b)]).expect("valid");
        let (count, _sub) = counting(&funnel);

        a.set(Value::from(1));
        b.set(Value::from(false));
        assert!(!funnel.is_primed());
        assert_eq!(count.get(), 0);
        assert_eq!(
            funnel.get(),
            Some(Value::map([("A", Value::from(1)), ("B", Value::from(false))]))
        );

        b.set(Value::from(""));
        b.set(Value::from(0));
        assert_eq!(count.get(), 0);

        b.set(Value::from(true));
        assert!(funnel.is_primed());
        assert_eq!(count.get(), 1);

        b.set(Value::from(false));
        assert!(funnel.is_primed());
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn primed_funnel_propagates_absent_keys() {
        let a = Node::new(Value::from(1));
        let b = Node::new(Value::from(2));
        let funnel = Node::funnel([("A", &a), ("B", &b)]).expect("valid");
        let (count, _sub) = counting(&funnel);
        assert_eq!(count.get(), 1);

        b.set(None);
        assert_eq!(count.get(), 2);
        assert!(funnel.is_primed());
        assert_eq!(funnel.get(), Some(Value::map([("A", Value::from(1))])));
    }

    #[test]
    fn unprimed_funnel_does_not_replay() {
        let a = Node::new(Value::from(1));
        let b = Node::empty();
        let funnel = Node::funnel([("A", &a), ("B", &b)]).expect("valid");
        assert!(funnel.has_value());
        let (count, _sub) = counting(&funnel);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn unchanged_aggregate_is_suppressed() {
        let a = Node::new(Value::from(1));
        let funnel = Node::funnel([("A", &a)]).expect("valid");
        let (count, _sub) = counting(&funnel);
        assert_eq!(count.get(), 1);

        // Re-emitting an equal value upstream is already stopped at `a`;
        // force a raw upstream emission instead.
        a.force_state(Value::from(0)).expect("source hydration");
        a.set(Value::from(1));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn destroy_unsubscribes_all_sources() {
        let foo_stream = Node::new(foo());
        let name_stream = Node::new(name());
        let funnel =
            Node::funnel([("FooStream", &foo_stream), ("NameStream", &name_stream)]).expect("valid");
        funnel.destroy().expect("first destroy");
        assert_eq!(foo_stream.observer_count(), 0);
        assert_eq!(name_stream.observer_count(), 0);
        assert_eq!(funnel.destroy(), Err(Error::NotSubscribed));
    }

    #[test]
    fn hydration_reaches_nested_sources() {
        let foo_stream = Node::new(foo());
        let name_stream = Node::new(name());
        let inner =
            Node::funnel([("FooStream", &foo_stream), ("NameStream", &name_stream)]).expect("valid");
        let outer = Node::funnel([("fun", &inner)]).expect("valid");
        let (count, _sub) = counting(&outer);
        let (source_count, _source_sub) = counting(&foo_stream);

        let state = Value::map([(
            "fun",
            Value::map([
                ("FooStream", Value::map([("foo", Value::from("baz"))])),
                ("NameStream", name()),
            ]),
        )]);
        outer.force_state(state.clone()).expect("no views in tree");

        assert_eq!(
            foo_stream.get().and_then(|v| v.get("foo").cloned()),
            Some(Value::from("baz"))
        );
        assert_eq!(name_stream.get(), Some(name()));
        assert_eq!(outer.get(), Some(state));
        assert_eq!(count.get(), 1);
        assert_eq!(source_count.get(), 1);
    }

    #[test]
    fn hydration_with_missing_slice_clears_source() {
        let a = Node::new(Value::from(1));
        let b = Node::new(Value::from(2));
        let funnel = Node::funnel([("A", &a), ("B", &b)]).expect("valid");
        funnel
            .force_state(Value::map([("A", Value::from(7))]))
            .expect("hydrate");
        assert_eq!(a.get(), Some(Value::from(7)));
        assert_eq!(b.get(), None);
        assert_eq!(funnel.get(), Some(Value::map([("A", Value::from(7))])));
    }

    #[test]
    fn view_reading_a_funnel() {
        let a = Node::new(Value::from(2));
        let b = Node::new(Value::from(3));
        let funnel = Node::funnel([("a", &a), ("b", &b)]).expect("valid");
        let sum = funnel.view(|agg| {
            let get = |k: &str| agg.get(k).and_then(Value::as_i64).unwrap_or_default();
            Value::from(get("a") + get("b"))
        });
        assert_eq!(sum.get(), Some(Value::from(5)));
        a.set(Value::from(10));
        assert_eq!(sum.get(), Some(Value::from(13)));
    }
}
