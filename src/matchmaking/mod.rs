//! Matchmaking: the pairing engine, attempt dispatch, and the expiry sweep

pub mod dispatcher;
pub mod engine;
pub mod sweeper;

pub use dispatcher::{DirectDispatcher, MatchDispatcher, PooledDispatcher};
pub use engine::{EnqueueOutcome, MatchmakingEngine};
pub use sweeper::ExpirySweeper;
