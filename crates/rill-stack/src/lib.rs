#![forbid(unsafe_code)]

//! Debug recorder for rill graphs.
//!
//! A [`Stack`] keeps the most recent actions, transformer calls, log lines and
//! node states in a bounded ring. It plugs into a graph as a
//! [`rill_core::Recorder`]:
//!
//! ```
//! use std::rc::Rc;
//! use rill_core::{Node, Value};
//! use rill_stack::{Stack, StackConfig};
//!
//! let stack = Rc::new(Stack::new(StackConfig::default().enabled(true)));
//! let counter = Node::new(Value::from(0));
//! counter.attach_recorder("counter", stack.clone());
//!
//! stack.push_action("increment", Value::from(1));
//! counter.set(Value::from(1));
//!
//! assert_eq!(stack.len(), 2);
//! stack.dump_to_log(&[]);
//! ```
//!
//! The stack is an explicit instance owned by whoever builds the graph; there
//! is no process-wide recorder.

pub mod entry;
pub mod stack;

pub use entry::Entry;
pub use stack::{DEFAULT_CAPACITY, Stack, StackConfig};
