//! pitchctl library - session runtime, persistence and CLI plumbing
//!
//! Exposed for integration tests.

pub mod cli;
pub mod coalescer;
pub mod commands;
pub mod config;
pub mod display;
pub mod logging;
pub mod session;

pub use coalescer::{CoalescerSettings, FlushReport, WriteCoalescer};
pub use config::PitchConfig;
pub use session::{
    spawn_countdown, PracticeSession, SessionInput, SessionReport, SessionRunner, SessionSetup,
    SessionSummary, StepOutcome,
};
