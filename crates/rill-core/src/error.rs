use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Precondition failures raised synchronously by graph operations.
///
/// Propagation itself never produces an error; every variant here is raised
/// by the call that violated the precondition, before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("a funnel requires at least one keyed source")]
    MissingSources,

    #[error("funnel source key is not unique: {key}")]
    DuplicateKey { key: String },

    #[error("funnels cannot subscribe to views (at key {key})")]
    ViewSource { key: String },

    #[error("views require a source node")]
    MissingSource,

    #[error("views require a transform function")]
    MissingTransform,

    #[error("observer is not subscribed to this node")]
    NotSubscribed,

    #[error("cannot force state on a view")]
    ForceStateOnView,
}

impl Error {
    /// Whether the error reports a released (or never valid) subscription.
    #[must_use]
    pub fn is_not_subscribed(&self) -> bool {
        matches!(self, Self::NotSubscribed)
    }
}
