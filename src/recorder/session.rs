//! Recording session
//!
//! Owns setup, the capture loop and orderly shutdown of one recording:
//!
//! ```text
//! Created -> Configuring -> WarmingUp -> Capturing -> Stopping -> Closed
//! ```
//!
//! The capture loop is single-threaded: one bounded frameset wait per
//! iteration, then synchronous dispatch to every manager in registration
//! order. Event streams write from device callback threads meanwhile.

use super::manifest::{Manifest, ManifestHeader};
use super::save_dir::allocate_session_dir;
use super::state::{
    MetadataTiming, SessionOptions, SessionState, SessionSummary, StopCondition, StopHandle,
    StreamSummary,
};
use crate::codec::VideoEncoderFactory;
use crate::device::{open_first_device, Device, DeviceContext, SensorKind, VideoProfile};
use crate::stream::{EventStreamManager, FrameStreamManager, StreamManager};
use crate::utils::{RecorderError, RecorderResult};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy)]
struct LoopCounters {
    polled: u64,
    warmup_discarded: u64,
    dispatched: u64,
    timeouts: u64,
}

/// One recording, from directory allocation to the last flushed file
pub struct RecordingSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    options: SessionOptions,
    device: Arc<dyn Device>,
    encoders: Arc<dyn VideoEncoderFactory>,
    state: Arc<RwLock<SessionState>>,
    stop: StopHandle,
    dir: Option<PathBuf>,
    managers: Vec<Box<dyn StreamManager>>,
    device_active: bool,
    manifest_written: bool,
    counters: LoopCounters,
    elapsed: Duration,
}

impl RecordingSession {
    pub fn new(
        device: Arc<dyn Device>,
        encoders: Arc<dyn VideoEncoderFactory>,
        options: SessionOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            options,
            device,
            encoders,
            state: Arc::new(RwLock::new(SessionState::Created)),
            stop: StopHandle::new(),
            dir: None,
            managers: Vec::new(),
            device_active: false,
            manifest_written: false,
            counters: LoopCounters::default(),
            elapsed: Duration::ZERO,
        }
    }

    /// Open the first attached device and build a session on it
    pub fn from_context(
        context: &dyn DeviceContext,
        encoders: Arc<dyn VideoEncoderFactory>,
        options: SessionOptions,
    ) -> RecorderResult<Self> {
        let device = open_first_device(context).ok_or(RecorderError::DeviceNotFound)?;
        Ok(Self::new(device, encoders, options))
    }

    /// Use an externally owned stop flag
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Session directory, once allocated
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            tracing::debug!("[Record #{}] {:?} -> {:?}", self.options.record_count, previous, state);
        }
    }

    /// Allocate the session directory, enable every configured stream and
    /// start the device pipeline.
    ///
    /// Stream failures only disable that stream. An uncreatable directory
    /// is setup-fatal.
    pub fn configure(&mut self) -> RecorderResult<()> {
        let state = self.state();
        if state != SessionState::Created {
            return Err(RecorderError::Session(format!(
                "cannot configure a session in state {state:?}"
            )));
        }
        self.set_state(SessionState::Configuring);

        let dir = allocate_session_dir(&self.options.save_root)?;
        self.dir = Some(dir.clone());
        self.device_active = true;

        let color = self.color_reference();
        for request in self.options.streams.clone() {
            let manager: Box<dyn StreamManager> = if request.kind.is_frame_stream() {
                Box::new(FrameStreamManager::enable(
                    self.device.as_ref(),
                    request,
                    &dir,
                    color.as_ref(),
                    self.encoders.as_ref(),
                ))
            } else {
                Box::new(EventStreamManager::enable(self.device.as_ref(), request, &dir))
            };
            self.managers.push(manager);
        }

        let enabled = self.managers.iter().filter(|m| m.is_enabled()).count();
        tracing::info!(
            "[Record #{}] {} of {} streams enabled in {:?}",
            self.options.record_count,
            enabled,
            self.managers.len(),
            dir
        );

        if self.options.metadata_timing.resolve(self.options.stop) == MetadataTiming::Start {
            self.write_manifest()?;
        }

        self.device.start_pipeline()?;
        Ok(())
    }

    /// Profile the frame streams are posed against
    fn color_reference(&self) -> Option<VideoProfile> {
        let index = self
            .options
            .streams
            .iter()
            .find(|r| r.kind == SensorKind::Color)
            .map(|r| r.profile_index)
            .unwrap_or(0);
        let sensor = self.device.sensor(SensorKind::Color)?;
        sensor
            .profile(index)
            .or_else(|| sensor.profile(0))
            .and_then(|p| p.as_video())
            .cloned()
    }

    /// Run the capture loop until the stop condition holds, then shut down.
    pub fn run(&mut self) -> RecorderResult<SessionSummary> {
        let state = self.state();
        if state != SessionState::Configuring {
            return Err(RecorderError::Session(format!(
                "cannot run a session in state {state:?}"
            )));
        }

        self.capture_loop();
        self.shutdown()?;
        Ok(self.summary())
    }

    /// Configure then run
    pub fn record(&mut self) -> RecorderResult<SessionSummary> {
        self.configure()?;
        self.run()
    }

    fn capture_loop(&mut self) {
        let record = self.options.record_count;
        if self.options.warmup_frames > 0 {
            self.set_state(SessionState::WarmingUp);
        } else {
            self.set_state(SessionState::Capturing);
        }

        let start = Instant::now();
        let mut last_report = 0;
        let mut iterations: u64 = 0;

        loop {
            self.poll_once();
            iterations += 1;

            let elapsed = start.elapsed();
            let seconds = elapsed.as_secs();
            if seconds != last_report {
                last_report = seconds;
                tracing::info!(
                    "[Record #{}] Elapsed time: {} ms (avg frequency: {:.1} Hz)",
                    record,
                    elapsed.as_millis(),
                    iterations as f64 / elapsed.as_secs_f64()
                );
            }

            let done = match self.options.stop {
                StopCondition::Duration(length) => elapsed > length,
                StopCondition::External => false,
            };
            if done || self.stop.is_stop_requested() {
                self.elapsed = elapsed;
                tracing::info!("[Record #{}] Record finished", record);
                break;
            }
        }
    }

    fn poll_once(&mut self) {
        let Some(frameset) = self.device.wait_for_frameset(self.options.wait_timeout) else {
            self.counters.timeouts += 1;
            tracing::debug!("The frameset is null!");
            return;
        };
        self.counters.polled += 1;

        if self.counters.warmup_discarded < self.options.warmup_frames as u64 {
            self.counters.warmup_discarded += 1;
            if self.counters.warmup_discarded == self.options.warmup_frames as u64 {
                self.set_state(SessionState::Capturing);
            }
            return;
        }

        for manager in &mut self.managers {
            manager.process_frameset(&frameset);
        }
        self.counters.dispatched += 1;
    }

    /// Release everything in order: frame streams, the device (which halts
    /// callback delivery), then event streams. Safe to call more than once.
    fn shutdown(&mut self) -> RecorderResult<()> {
        if self.state() == SessionState::Closed {
            return Ok(());
        }
        self.set_state(SessionState::Stopping);

        for manager in self.managers.iter_mut().filter(|m| m.kind().is_frame_stream()) {
            manager.close();
        }
        if self.device_active {
            self.device.stop_pipeline();
            self.device_active = false;
        }
        for manager in self.managers.iter_mut().filter(|m| !m.kind().is_frame_stream()) {
            manager.close();
        }

        let manifest = if self.manifest_written || self.dir.is_none() {
            Ok(())
        } else {
            self.write_manifest()
        };

        self.set_state(SessionState::Closed);
        manifest
    }

    fn write_manifest(&mut self) -> RecorderResult<()> {
        let Some(dir) = self.dir.as_deref() else {
            return Err(RecorderError::Session("no session directory".into()));
        };
        let manifest = Manifest::collect(
            ManifestHeader {
                session_id: self.id,
                created_at: self.created_at,
                video_length: self.options.stop.video_length(),
                dir,
                warmup_frames: self.options.warmup_frames,
                record_count: self.options.record_count,
            },
            &self.managers,
        )?;
        manifest.write(dir)?;
        self.manifest_written = true;
        Ok(())
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            record_count: self.options.record_count,
            state: self.state(),
            dir: self.dir.clone(),
            elapsed_ms: self.elapsed.as_millis() as u64,
            framesets_polled: self.counters.polled,
            warmup_discarded: self.counters.warmup_discarded,
            framesets_dispatched: self.counters.dispatched,
            timeouts: self.counters.timeouts,
            streams: self
                .managers
                .iter()
                .map(|m| StreamSummary {
                    name: m.name().to_string(),
                    kind: m.kind(),
                    enabled: m.is_enabled(),
                    frames_written: m.frames_written(),
                })
                .collect(),
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Session shutdown failed: {}", e);
        }
    }
}
