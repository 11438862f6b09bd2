//! Feel Good Runtime - Session orchestration
//!
//! This crate wires the pieces of a play session together:
//! - Cloud reconciliation with a single in-flight round per record
//! - Sync status publishing
//! - Achievement and leaderboard reporting
//! - Timed target spawning with bonus draws
//! - Session configuration and log initialisation

pub mod achievements;
pub mod config;
pub mod session;
pub mod slot;
pub mod spawn;
pub mod sync;
pub mod telemetry;

pub use achievements::*;
pub use config::*;
pub use session::*;
pub use slot::*;
pub use spawn::*;
pub use sync::*;
