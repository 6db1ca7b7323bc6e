//! pglens Core Types
//!
//! This crate provides the fundamental types used throughout pglens:
//! - Structured query events and the bounded event log
//! - The log-line parser (statement reconstruction)
//! - Core error types

pub mod error;
pub mod event;
pub mod parser;

pub use error::{Error, Result};
pub use event::{EventLog, FilterCriteria, MAX_EVENTS, QueryEvent};
pub use parser::{INTERNAL_MARKERS, LogParser};
