//! Domain model (topic, message, delay-set member, method envelope).

pub mod message;
pub mod method_call;
pub mod topic;

pub use message::{DelayedMember, Message, TAG_MARKER};
pub use method_call::MethodCall;
pub use topic::Topic;
