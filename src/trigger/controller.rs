//! Continuous recording controller
//!
//! Polls the trigger input. Each stable high period gets its own recording
//! session on a dedicated thread; the output line is high while it runs.
//! While the input is low nothing touches the device.

use super::{Debouncer, TriggerIo};
use crate::recorder::{RecordingSession, SessionSummary, StopHandle};
use crate::utils::{RecorderError, RecorderResult};
use std::thread::JoinHandle;
use std::time::Duration;

struct ActiveRecording {
    record_count: u32,
    stop: StopHandle,
    thread: JoinHandle<RecorderResult<SessionSummary>>,
}

pub struct TriggerController<T: TriggerIo> {
    io: T,
    debouncer: Debouncer,
    poll_interval: Duration,
    record_count: u32,
}

impl<T: TriggerIo> TriggerController<T> {
    pub fn new(io: T, debounce_reads: u32, poll_interval: Duration) -> Self {
        Self {
            io,
            debouncer: Debouncer::new(debounce_reads),
            poll_interval,
            record_count: 0,
        }
    }

    /// Sessions launched so far
    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    /// Run until `shutdown` is requested.
    ///
    /// `launch` builds the session for a new high period from the record
    /// count; it is only called on a rising edge. The session is configured
    /// before its thread starts, so a setup-fatal error from either step
    /// ends the controller.
    pub fn run<F>(&mut self, shutdown: &StopHandle, mut launch: F) -> RecorderResult<u32>
    where
        F: FnMut(u32) -> RecorderResult<RecordingSession>,
    {
        self.set_output(false);
        let mut active: Option<ActiveRecording> = None;
        // Set after a failed or self-terminated session until the input drops
        let mut wait_for_low = false;

        tracing::info!("Waiting for trigger");
        while !shutdown.is_stop_requested() {
            let raw = self.io.read_trigger_level().unwrap_or_else(|e| {
                tracing::warn!("Read trigger failed: {}", e);
                false
            });
            let level = self.debouncer.update(raw);

            if !level {
                wait_for_low = false;
            }

            if let Some(recording) = active.take() {
                if !level || recording.thread.is_finished() {
                    if level {
                        wait_for_low = true;
                    }
                    self.finish(recording);
                } else {
                    active = Some(recording);
                }
            } else if level && !wait_for_low {
                match self.start(&mut launch) {
                    Ok(recording) => active = Some(recording),
                    Err(e) if e.is_setup_fatal() => {
                        self.set_output(false);
                        return Err(e);
                    }
                    Err(e) => {
                        tracing::error!("Failed to start record #{}: {}", self.record_count, e);
                        wait_for_low = true;
                    }
                }
            }

            std::thread::sleep(self.poll_interval);
        }

        if let Some(recording) = active.take() {
            self.finish(recording);
        }
        self.set_output(false);
        tracing::info!("Trigger controller stopped after {} records", self.record_count);
        Ok(self.record_count)
    }

    fn start<F>(&mut self, launch: &mut F) -> RecorderResult<ActiveRecording>
    where
        F: FnMut(u32) -> RecorderResult<RecordingSession>,
    {
        let record_count = self.record_count;
        tracing::info!("Trigger high, starting record #{}", record_count);

        let mut session = launch(record_count)?;
        // Setup errors surface here, where a fatal one can end the controller
        session.configure()?;
        let stop = session.stop_handle();
        let thread = std::thread::Builder::new()
            .name(format!("depthcam-record-{record_count}"))
            .spawn(move || session.run())
            .map_err(|e| RecorderError::Session(format!("Failed to spawn record thread: {e}")))?;

        self.record_count += 1;
        self.set_output(true);
        Ok(ActiveRecording {
            record_count,
            stop,
            thread,
        })
    }

    /// Stop the session and wait until every file is closed
    fn finish(&mut self, recording: ActiveRecording) {
        tracing::info!("Stopping record #{}", recording.record_count);
        recording.stop.request_stop();
        match recording.thread.join() {
            Ok(Ok(summary)) => tracing::info!(
                "Record #{} finished: {} framesets in {} ms",
                recording.record_count,
                summary.framesets_dispatched,
                summary.elapsed_ms
            ),
            Ok(Err(e)) => tracing::error!("Record #{} failed: {}", recording.record_count, e),
            Err(_) => tracing::error!("Record #{} thread panicked", recording.record_count),
        }
        self.set_output(false);
    }

    fn set_output(&mut self, high: bool) {
        if let Err(e) = self.io.write_output_level(high) {
            tracing::warn!("Set output line failed: {}", e);
        }
    }
}
