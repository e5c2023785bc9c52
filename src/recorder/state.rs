//! Recording state management
//!
//! Defines the session state machine, stop policies and session reporting.

use crate::stream::StreamRequest;
use crate::device::SensorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Current state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Constructed, nothing touched yet
    Created,
    /// Allocating the session directory and enabling streams
    Configuring,
    /// Discarding the first framesets
    WarmingUp,
    /// Dispatching framesets to stream managers
    Capturing,
    /// Closing managers and stopping the device
    Stopping,
    /// Every handle released
    Closed,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Created
    }
}

/// When the capture loop ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopCondition {
    /// Fixed wall-clock length, warm-up included
    Duration(Duration),
    /// Until the [`StopHandle`] is triggered
    External,
}

impl StopCondition {
    /// Seconds as configured; a negative length means externally stopped.
    /// Lengths too large for a `Duration` saturate.
    pub fn from_video_length(seconds: f64) -> Self {
        if seconds < 0.0 {
            StopCondition::External
        } else {
            StopCondition::Duration(Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX))
        }
    }

    /// Seconds for the manifest, -1 when externally stopped
    pub fn video_length(&self) -> f64 {
        match self {
            StopCondition::Duration(d) => d.as_secs_f64(),
            StopCondition::External => -1.0,
        }
    }
}

/// When `metadata.json` is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataTiming {
    /// Start for externally stopped sessions, end for fixed-duration ones
    #[default]
    Auto,
    /// Right after configuration
    Start,
    /// After every stream is closed
    End,
}

impl MetadataTiming {
    pub fn resolve(&self, stop: StopCondition) -> MetadataTiming {
        match (self, stop) {
            (MetadataTiming::Auto, StopCondition::External) => MetadataTiming::Start,
            (MetadataTiming::Auto, StopCondition::Duration(_)) => MetadataTiming::End,
            (timing, _) => *timing,
        }
    }
}

/// Shared stop request flag
///
/// Cloned into the trigger controller and signal handlers; the capture loop
/// checks it once per iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The raw flag, for async-signal-safe handlers
    pub fn flag(&self) -> &Arc<AtomicBool> {
        &self.0
    }
}

/// Configuration for one recording session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Sessions go to `<save_root>/data/<N>_<timestamp>`
    pub save_root: PathBuf,
    pub stop: StopCondition,
    pub warmup_frames: u32,
    /// Bound on one frameset wait
    pub wait_timeout: Duration,
    pub metadata_timing: MetadataTiming,
    /// Index of this session in a triggered run
    pub record_count: u32,
    /// Streams in registration order
    pub streams: Vec<StreamRequest>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            save_root: PathBuf::from("."),
            stop: StopCondition::Duration(Duration::from_secs(3)),
            warmup_frames: 10,
            wait_timeout: Duration::from_millis(100),
            metadata_timing: MetadataTiming::Auto,
            record_count: 0,
            streams: SensorKind::ALL.into_iter().map(StreamRequest::new).collect(),
        }
    }
}

/// Outcome of one stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSummary {
    pub name: String,
    pub kind: SensorKind,
    pub enabled: bool,
    pub frames_written: u64,
}

/// Result of a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub record_count: u32,
    pub state: SessionState,
    /// Session directory, once allocated
    pub dir: Option<PathBuf>,
    /// Capture loop wall-clock time
    pub elapsed_ms: u64,
    pub framesets_polled: u64,
    pub warmup_discarded: u64,
    pub framesets_dispatched: u64,
    /// Frameset waits that came back empty
    pub timeouts: u64,
    pub streams: Vec<StreamSummary>,
}

impl SessionSummary {
    pub fn stream(&self, name: &str) -> Option<&StreamSummary> {
        self.streams.iter().find(|s| s.name == name)
    }
}
