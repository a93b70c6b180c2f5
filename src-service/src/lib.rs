//! LoopGrab capture service.
//!
//! Captures exactly one full iteration of a looping video's audio, starting at
//! its loop boundary, and delivers it as a WAV file. The media runtime is
//! supplied by the embedding host through the traits in [`capture`] and the
//! service is started with [`service::run`].

pub mod capture;
pub mod config;
pub mod delivery;
pub mod encoder;
pub mod ipc;
pub mod logging;
pub mod service;
pub mod state;
pub mod transcode;

pub use state::{CaptureEvent, CaptureManager, CAPTURE_STARTED_MESSAGE};
