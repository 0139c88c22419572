#![forbid(unsafe_code)]

//! Subscription handles.
//!
//! A [`Subscriber`] identifies one observer registration by an opaque token,
//! never by the callback itself, so the same closure may be registered any
//! number of times and each registration is released independently.
//!
//! Release is explicit. Dropping a handle does not unsubscribe; releasing it
//! twice is reported as [`Error::NotSubscribed`] so double-release bugs
//! surface instead of passing silently.

use std::fmt;
use std::rc::Weak;

use crate::error::{Error, Result};
use crate::node::NodeInner;

/// Capability to release one observer registration.
pub struct Subscriber {
    node: Weak<NodeInner>,
    token: u64,
}

impl Subscriber {
    pub(crate) fn new(node: Weak<NodeInner>, token: u64) -> Self {
        Self { node, token }
    }

    /// Remove the observer from the node it was registered on.
    ///
    /// Fails with [`Error::NotSubscribed`] if the registration was already
    /// released or the node no longer exists.
    pub fn unsubscribe(&self) -> Result<()> {
        let node = self.node.upgrade().ok_or(Error::NotSubscribed)?;
        let removed = node.state.borrow_mut().remove_observer(self.token);
        if removed {
            Ok(())
        } else {
            Err(Error::NotSubscribed)
        }
    }

    /// Whether the registration is still present on a live node.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.node
            .upgrade()
            .is_some_and(|node| node.state.borrow().has_observer(self.token))
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("token", &self.token)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::node::Node;
    use crate::value::Value;

    #[test]
    fn active_until_released() {
        let node = Node::empty();
        let sub = node.subscribe(|_| {});
        assert!(sub.is_active());
        sub.unsubscribe().expect("release");
        assert!(!sub.is_active());
    }

    #[test]
    fn handle_outliving_node_reports_not_subscribed() {
        let sub = {
            let node = Node::new(Value::from(1));
            node.subscribe(|_| {})
        };
        assert!(!sub.is_active());
        assert_eq!(sub.unsubscribe(), Err(Error::NotSubscribed));
    }

    #[test]
    fn dropping_handle_keeps_observer() {
        let node = Node::empty();
        drop(node.subscribe(|_| {}));
        assert_eq!(node.observer_count(), 1);
    }

    #[test]
    fn handles_are_independent() {
        let node = Node::empty();
        let a = node.subscribe(|_| {});
        let b = node.subscribe(|_| {});
        a.unsubscribe().expect("release a");
        assert!(b.is_active());
        assert_eq!(a.unsubscribe(), Err(Error::NotSubscribed));
        b.unsubscribe().expect("release b");
        assert_eq!(node.observer_count(), 0);
    }

    #[test]
    fn debug_shows_state() {
        let node = Node::empty();
        let sub = node.subscribe(|_| {});
        assert!(format!("{sub:?}").contains("active: true"));
    }
}
