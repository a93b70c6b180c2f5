//! LoopGrab Common Library
//!
//! Shared status types and IPC protocol for communication between the
//! LoopGrab client and the capture service.

pub mod ipc;
pub mod logging;
pub mod types;

pub use types::*;
