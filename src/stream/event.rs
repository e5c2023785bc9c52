//! Event stream manager (gyro, accelerometer)
//!
//! Samples arrive on a device-owned thread. The CSV sink is shared with
//! that callback behind a mutex; `close` takes the sink out, so a callback
//! that still fires afterwards finds nothing to write to.

use super::{
    file_name, StreamError, StreamManager, StreamMetadata, StreamRequest, StreamStatus,
};
use crate::device::{Device, FrameSet, ImuEvent, ImuProfile, SensorKind};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const GYRO_HEADER: &str =
    "timestamp [ms],temperature [C],gyro.x [rad/s],gyro.y [rad/s],gyro.z [rad/s]";
const ACCEL_HEADER: &str =
    "timestamp [ms],temperature [C],accel.x [m/s^2],accel.y [m/s^2],accel.z [m/s^2]";

struct CsvSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl CsvSink {
    fn create(path: PathBuf, header: &str) -> Result<Self, StreamError> {
        let file = File::create(&path).map_err(|e| StreamError::filesystem(&path, e))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{header}").map_err(|e| StreamError::filesystem(&path, e))?;
        Ok(Self { writer, path })
    }

    fn write_event(&mut self, event: &ImuEvent) -> std::io::Result<()> {
        let [x, y, z] = event.value;
        writeln!(
            self.writer,
            "{},{},{},{},{}",
            event.timestamp_ms, event.temperature, x, y, z
        )
    }
}

/// State touched by both the callback thread and the session thread
struct Shared {
    sink: Option<CsvSink>,
    status: StreamStatus,
    rows: u64,
}

/// Records one callback-driven inertial stream to CSV
pub struct EventStreamManager {
    request: StreamRequest,
    shared: Arc<Mutex<Shared>>,
    profile: Option<ImuProfile>,
    csv_path: Option<PathBuf>,
    closed: bool,
}

impl EventStreamManager {
    /// Look up the sensor, open `<name>.csv` under `dir` and start the
    /// sensor with a callback appending one row per sample.
    ///
    /// Always returns a manager; on failure it is disabled with the reason.
    pub fn enable(device: &dyn Device, request: StreamRequest, dir: &Path) -> Self {
        let mut manager = Self {
            request,
            shared: Arc::new(Mutex::new(Shared {
                sink: None,
                status: StreamStatus::default(),
                rows: 0,
            })),
            profile: None,
            csv_path: None,
            closed: false,
        };

        match manager.open(device, dir) {
            Ok(()) => {
                manager.shared.lock().status.enable();
                tracing::info!(
                    "Enabled {} stream '{}' at {} Hz",
                    manager.request.kind,
                    manager.request.name,
                    manager.profile.as_ref().map(|p| p.rate_hz).unwrap_or_default()
                );
            }
            Err(e) => {
                tracing::warn!("Stream '{}' disabled: {}", manager.request.name, e);
                {
                    let mut shared = manager.shared.lock();
                    shared.sink = None;
                    shared.status.disable(&e);
                }
                // A disabled stream leaves no CSV behind
                if let Some(path) = manager.csv_path.take() {
                    if let Err(e) = std::fs::remove_file(&path) {
                        tracing::warn!("Remove {:?} failed: {}", path, e);
                    }
                }
            }
        }
        manager
    }

    fn open(&mut self, device: &dyn Device, dir: &Path) -> Result<(), StreamError> {
        let kind = self.request.kind;
        let header = match kind {
            SensorKind::Gyro => GYRO_HEADER,
            SensorKind::Accel => ACCEL_HEADER,
            _ => {
                return Err(StreamError::WrongSensorKind {
                    kind,
                    expected: "event",
                })
            }
        };

        let sensor = device.sensor(kind).ok_or(StreamError::SensorNotFound(kind))?;
        let index = self.request.profile_index;
        let profile = sensor
            .profile(index)
            .and_then(|p| p.as_imu())
            .cloned()
            .ok_or(StreamError::ProfileUnsupported {
                kind,
                index,
                available: sensor.profiles.len(),
            })?;

        let csv_path = dir.join(format!("{}.csv", self.request.name));
        self.shared.lock().sink = Some(CsvSink::create(csv_path.clone(), header)?);
        self.csv_path = Some(csv_path);

        let shared = self.shared.clone();
        let name = self.request.name.clone();
        device.start_sensor(
            &profile,
            Box::new(move |event: ImuEvent| record_event(&shared, &name, &event)),
        )?;

        self.profile = Some(profile);
        Ok(())
    }
}

fn record_event(shared: &Mutex<Shared>, name: &str, event: &ImuEvent) {
    let mut shared = shared.lock();
    let result = match shared.sink.as_mut() {
        Some(sink) => sink.write_event(event).map_err(|e| (sink.path.clone(), e)),
        None => return,
    };

    match result {
        Ok(()) => shared.rows += 1,
        Err((path, source)) => {
            let error = StreamError::filesystem(path, source);
            tracing::error!("Stream '{}' disabled: {}", name, error);
            shared.sink = None;
            shared.status.disable(&error);
        }
    }
}

impl StreamManager for EventStreamManager {
    fn name(&self) -> &str {
        &self.request.name
    }

    fn kind(&self) -> SensorKind {
        self.request.kind
    }

    fn is_enabled(&self) -> bool {
        self.shared.lock().status.is_enabled()
    }

    /// Samples arrive through the sensor callback, never through framesets
    fn process_frameset(&mut self, _frameset: &FrameSet) {}

    fn metadata(&self) -> StreamMetadata {
        let shared = self.shared.lock();
        let mut metadata = StreamMetadata::new(&self.request, &shared.status, shared.rows);
        metadata.imu_name = self.csv_path.as_deref().map(file_name);
        metadata.sample_rate_hz = self.profile.as_ref().map(|p| p.rate_hz);
        metadata
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut shared = self.shared.lock();
        if let Some(mut sink) = shared.sink.take() {
            if let Err(e) = sink.writer.flush() {
                let error = StreamError::filesystem(&sink.path, e);
                tracing::warn!("Stream '{}' CSV flush failed: {}", self.request.name, error);
                shared.status.note(&error);
            }
            tracing::info!(
                "Closed stream '{}': {} samples written",
                self.request.name,
                shared.rows
            );
        }
    }

    fn frames_written(&self) -> u64 {
        self.shared.lock().rows
    }
}

impl Drop for EventStreamManager {
    fn drop(&mut self) {
        self.close();
    }
}
