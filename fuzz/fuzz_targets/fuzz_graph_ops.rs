#![no_main]

use std::cell::Cell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rill_core::{Node, Value};

const SOURCES: usize = 3;

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Set { source: u8, value: i8 },
    Clear { source: u8 },
    Hydrate { values: [Option<i8>; SOURCES] },
    Subscribe,
    Unsubscribe { idx: u8 },
    DestroyView,
}

fn slot(raw: u8) -> usize {
    raw as usize % SOURCES
}

fuzz_target!(|ops: Vec<FuzzOp>| {
    let sources: Vec<Node> = (0..SOURCES).map(|_| Node::empty()).collect();
    let names = ["a", "b", "c"];
    let funnel = Node::funnel(names.iter().copied().zip(&sources)).expect("valid sources");
    let view = funnel.view(|agg| Value::from(agg.len() as i64));

    let notified = Rc::new(Cell::new(0usize));
    let n = Rc::clone(&notified);
    let _watch = funnel.subscribe(move |_| n.set(n.get() + 1));

    let mut subs = Vec::new();
    let mut view_destroyed = false;

    for op in ops.into_iter().take(256) {
        match op {
            FuzzOp::Set { source, value } => {
                sources[slot(source)].set(Value::from(i64::from(value)));
            }
            FuzzOp::Clear { source } => sources[slot(source)].set(None),
            FuzzOp::Hydrate { values } => {
                let state = Value::map(
                    names
                        .iter()
                        .zip(values)
                        .filter_map(|(k, v)| v.map(|v| (*k, Value::from(i64::from(v))))),
                );
                funnel.force_state(state).expect("funnel hydration");
            }
            FuzzOp::Subscribe => subs.push(view.subscribe(|_| {})),
            FuzzOp::Unsubscribe { idx } => {
                if !subs.is_empty() {
                    let sub = subs.remove(idx as usize % subs.len());
                    sub.unsubscribe().expect("first release");
                    assert!(sub.unsubscribe().is_err());
                }
            }
            FuzzOp::DestroyView => {
                let result = view.destroy();
                assert_eq!(result.is_ok(), !view_destroyed);
                view_destroyed = true;
            }
        }

        // Nothing is delivered before every key has been seen.
        if !funnel.is_primed() {
            assert_eq!(notified.get(), 0);
        }
    }
});
