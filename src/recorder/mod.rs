//! Recording system module
//!
//! - `RecordingSession` owns one recording from setup to shutdown
//! - `state`: session state machine, stop policies, summaries
//! - `manifest`: the `metadata.json` snapshot
//! - `save_dir`: per-session directory allocation

pub mod manifest;
pub mod save_dir;
pub mod session;
pub mod state;

pub use manifest::Manifest;
pub use save_dir::allocate_session_dir;
pub use session::RecordingSession;
pub use state::{
    MetadataTiming, SessionOptions, SessionState, SessionSummary, StopCondition, StopHandle,
};
