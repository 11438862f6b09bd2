//! Feel Good Test Harness - Doubles, chaos and convergence
//!
//! This crate provides:
//! - Recording achievement reporter and failing local store
//! - A remote store with seeded failures and latency
//! - A multi-device convergence harness

pub mod chaos;
pub mod doubles;
pub mod integration;

pub use chaos::*;
pub use doubles::*;
pub use integration::*;
