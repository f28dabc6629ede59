//! Configuration loading and validation

pub mod app;

pub use app::{
    AppConfig, ChatSettings, CoordinationBackend, DispatchMode, MatchmakingSettings, RatePolicy,
    RateSettings, ServiceSettings,
};
