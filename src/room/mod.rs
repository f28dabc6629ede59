//! Room registry, lifecycle, and partner relay

pub mod lifecycle;
pub mod relay;

pub use lifecycle::RoomLifecycle;
pub use relay::RelayService;
