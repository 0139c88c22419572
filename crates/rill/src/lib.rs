#![forbid(unsafe_code)]

//! Rill public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub mod prelude {
    pub use rill_core as core;
    #[cfg(feature = "stack")]
    pub use rill_stack as stack;

    pub use rill_core::{
        Error, FunnelBuilder, Node, NodeKind, Recorder, Result, Subscriber, Value, ViewBuilder,
    };
    #[cfg(feature = "stack")]
    pub use rill_stack::{Entry, Stack, StackConfig};
}
