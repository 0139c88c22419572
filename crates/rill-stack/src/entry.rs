#![forbid(unsafe_code)]

//! Recorded debug entries.

use std::fmt;

use rill_core::{NodeKind, Value};

/// One recorded event.
///
/// The set of kinds is closed; every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// An action was invoked with `args`.
    Action { name: String, args: Value },
    /// A transformer was applied with `args`.
    Transformer { name: String, args: Value },
    /// Free-form text.
    Log { text: String },
    /// A node propagated `state`.
    State {
        name: String,
        state: Option<Value>,
        kind: NodeKind,
    },
}

impl Entry {
    /// Short upper-case label for the entry kind.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Action { .. } => "ACTION",
            Self::Transformer { .. } => "TRANSFORMER",
            Self::Log { .. } => "LOG",
            Self::State { .. } => "STATE",
        }
    }

    /// Emit the entry as a structured `INFO` event.
    ///
    /// `State` entries are narrowed to `state.get_in(accessor)`.
    pub(crate) fn log(&self, accessor: &[&str]) {
        match self {
            Self::Action { name, args } => {
                tracing::info!(message = "stack.action", name = %name, args = ?args);
            }
            Self::Transformer { name, args } => {
                tracing::info!(message = "stack.transformer", name = %name, args = ?args);
            }
            Self::Log { text } => {
                tracing::info!(message = "stack.log", text = %text);
            }
            Self::State { name, state, kind } => {
                let shown = state.as_ref().and_then(|s| s.get_in(accessor));
                tracing::info!(message = "stack.state", name = %name, kind = %kind, state = ?shown);
            }
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action { name, args } | Self::Transformer { name, args } => {
                write!(f, "{} {name} {args:?}", self.label())
            }
            Self::Log { text } => write!(f, "{} {text}", self.label()),
            Self::State { name, state, kind } => {
                write!(f, "{} ({kind}) {name} {state:?}", self.label())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        let action = Entry::Action {
            name: "add".into(),
            args: Value::from(1),
        };
        let log = Entry::Log { text: "hi".into() };
        assert_eq!(action.label(), "ACTION");
        assert_eq!(log.label(), "LOG");
    }

    #[test]
    fn display_includes_kind_and_name() {
        let entry = Entry::State {
            name: "todos".into(),
            state: Some(Value::from(3)),
            kind: NodeKind::Funnel,
        };
        let shown = entry.to_string();
        assert!(shown.starts_with("STATE (funnel) todos"));
        assert!(shown.contains('3'));
    }

    #[test]
    fn display_log() {
        let entry = Entry::Log {
            text: "booted".into(),
        };
        assert_eq!(entry.to_string(), "LOG booted");
    }
}
