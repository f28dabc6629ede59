//! Connected-user sessions and the outbound event boundary

pub mod registry;
pub mod sink;

pub use registry::{Session, SessionRegistry};
pub use sink::EventSink;
