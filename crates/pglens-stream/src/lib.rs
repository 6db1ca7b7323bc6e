//! Streaming orchestration for pglens
//!
//! Drives the poll loop that turns the server's growing, rotating log file
//! into the bounded in-memory event feed.

pub mod streamer;

pub use streamer::{POLL_INTERVAL, StreamHandle, WatchState, start};
