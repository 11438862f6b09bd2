//! Feel Good Core - Fundamental types shared by every crate
//!
//! This crate defines:
//! - The synchronized progress record and its interval bounds
//! - Wall-clock timestamps and the clock abstraction
//! - The flat field codec used by remote records
//! - The error taxonomy for local and remote persistence

pub mod codec;
pub mod error;
pub mod record;
pub mod time;

pub use codec::*;
pub use error::*;
pub use record::*;
pub use time::*;
