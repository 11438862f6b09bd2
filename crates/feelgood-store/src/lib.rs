//! Feel Good Storage - Local and remote persistence of progress
//!
//! This crate provides:
//! - Synchronous primitive key-value stores (memory, JSON file)
//! - The fixed local key layout of a progress record
//! - The asynchronous remote record store contract
//! - A gateway that adds account checks, query fallback and deadlines
//! - An in-process remote store

pub mod gateway;
pub mod local;
pub mod memory;
pub mod remote;

pub use gateway::*;
pub use local::*;
pub use memory::*;
pub use remote::*;
