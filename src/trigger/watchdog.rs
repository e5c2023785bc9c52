//! OS watchdog heartbeat
//!
//! Toggles an output line once per period so an external watchdog knows
//! the recorder is alive. The line may not be exported yet at boot, so
//! opening it is retried.

use super::{SysfsLine, TriggerError};
use crate::recorder::StopHandle;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    pub enabled: bool,
    /// Sysfs value file of the heartbeat line
    pub path: PathBuf,
    pub period_ms: u64,
    pub open_retries: u32,
    pub retry_interval_ms: u64,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("/sys/class/gpio/gpio112/value"),
            period_ms: 1000,
            open_retries: 12,
            retry_interval_ms: 5000,
        }
    }
}

impl WatchdogSettings {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Start the heartbeat thread. It ends when `shutdown` is requested, when
/// the line never becomes available, or when a write fails.
pub fn spawn_watchdog(
    settings: WatchdogSettings,
    shutdown: StopHandle,
) -> std::io::Result<JoinHandle<Result<(), TriggerError>>> {
    std::thread::Builder::new()
        .name("depthcam-watchdog".into())
        .spawn(move || {
            let result = heartbeat(&settings, &shutdown);
            if let Err(e) = &result {
                tracing::error!("Watchdog stopped: {}", e);
            }
            result
        })
}

fn heartbeat(settings: &WatchdogSettings, shutdown: &StopHandle) -> Result<(), TriggerError> {
    let Some(line) = open_with_retry(settings, shutdown)? else {
        return Ok(());
    };
    tracing::info!("Watchdog toggling {:?} every {:?}", line.path(), settings.period());

    let mut level = false;
    while !shutdown.is_stop_requested() {
        level = !level;
        line.write(level)?;
        sleep_unless_stopped(settings.period(), shutdown);
    }
    Ok(())
}

/// `Ok(None)` when shutdown arrives before the line opens
fn open_with_retry(
    settings: &WatchdogSettings,
    shutdown: &StopHandle,
) -> Result<Option<SysfsLine>, TriggerError> {
    let attempts = settings.open_retries.max(1);
    for attempt in 1..=attempts {
        match SysfsLine::open_output(&settings.path) {
            Ok(line) => return Ok(Some(line)),
            Err(e) => {
                tracing::warn!("Open watchdog line failed ({}/{}): {}", attempt, attempts, e);
            }
        }
        if attempt < attempts && !sleep_unless_stopped(settings.retry_interval(), shutdown) {
            return Ok(None);
        }
    }
    Err(TriggerError::Unavailable {
        path: settings.path.clone(),
        attempts,
    })
}

/// Sleep for `duration`; false if shutdown was requested meanwhile
fn sleep_unless_stopped(duration: Duration, shutdown: &StopHandle) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if shutdown.is_stop_requested() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn settings(path: PathBuf) -> WatchdogSettings {
        WatchdogSettings {
            enabled: true,
            path,
            period_ms: 10,
            open_retries: 5,
            retry_interval_ms: 20,
        }
    }

    #[test]
    fn test_toggles_until_shutdown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("value");
        fs::write(&path, "0").unwrap();
        let shutdown = StopHandle::new();

        let handle = spawn_watchdog(settings(path.clone()), shutdown.clone()).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        shutdown.request_stop();

        assert!(handle.join().unwrap().is_ok());
        let value = fs::read_to_string(&path).unwrap();
        assert!(value == "0" || value == "1");
    }

    #[test]
    fn test_waits_for_line_to_appear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("value");
        let shutdown = StopHandle::new();

        let handle = spawn_watchdog(settings(path.clone()), shutdown.clone()).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        fs::write(&path, "0").unwrap();
        std::thread::sleep(Duration::from_millis(80));
        shutdown.request_stop();

        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_gives_up_after_retries() {
        let dir = tempdir().unwrap();
        let result = spawn_watchdog(
            settings(dir.path().join("missing")),
            StopHandle::new(),
        )
        .unwrap()
        .join()
        .unwrap();

        assert!(matches!(
            result,
            Err(TriggerError::Unavailable { attempts: 5, .. })
        ));
    }

    #[test]
    fn test_settings_from_toml() {
        let parsed: WatchdogSettings =
            toml::from_str("enabled = true\nperiod_ms = 500\n").unwrap();
        assert!(parsed.enabled);
        assert_eq!(parsed.period(), Duration::from_millis(500));
        assert_eq!(parsed.open_retries, 12);
    }
}
