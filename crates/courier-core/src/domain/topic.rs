use serde::{Deserialize, Serialize};
use std::fmt;

/// A named queue. One topic owns exactly two store keys:
/// the ready list and the delay set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<prefix><topic>.queue`
    pub fn ready_key(&self, prefix: &str) -> String {
        format!("{prefix}{}.queue", self.0)
    }

    /// `<prefix><topic>.queue.delay`
    pub fn delay_key(&self, prefix: &str) -> String {
        format!("{prefix}{}.queue.delay", self.0)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_store_keys() {
        let topic = Topic::new("orders");
        assert_eq!(topic.ready_key(""), "orders.queue");
        assert_eq!(topic.delay_key(""), "orders.queue.delay");
        assert_eq!(topic.ready_key("app:"), "app:orders.queue");
        assert_eq!(topic.delay_key("app:"), "app:orders.queue.delay");
    }
}
