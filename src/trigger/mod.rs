//! Digital trigger collaborator
//!
//! - [`TriggerIo`]: read the trigger input level, drive the "recording"
//!   output level
//! - [`Debouncer`]: a level must repeat for N consecutive reads to count
//! - [`controller::TriggerController`]: one recording session per stable
//!   high period
//! - [`watchdog`]: OS watchdog heartbeat line
//!
//! Lines are reached through sysfs `value` files ([`sysfs`]).

pub mod controller;
pub mod sysfs;
pub mod watchdog;

pub use controller::TriggerController;
pub use sysfs::{SysfsLine, SysfsTrigger};
pub use watchdog::{spawn_watchdog, WatchdogSettings};

use std::path::PathBuf;
use thiserror::Error;

/// Trigger line errors
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("GPIO line {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GPIO line {path:?} reads {value:?}, expected 0 or 1")]
    InvalidValue { path: PathBuf, value: String },

    #[error("GPIO line {path:?} unavailable after {attempts} attempts")]
    Unavailable { path: PathBuf, attempts: u32 },
}

/// Boolean trigger input plus boolean status output
pub trait TriggerIo: Send {
    fn read_trigger_level(&mut self) -> Result<bool, TriggerError>;

    fn write_output_level(&mut self, high: bool) -> Result<(), TriggerError>;
}

/// Consecutive-read debouncer
#[derive(Debug, Clone)]
pub struct Debouncer {
    threshold: u32,
    stable: bool,
    candidate: bool,
    count: u32,
}

impl Debouncer {
    /// Starts low; `threshold` of 0 behaves like 1
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            stable: false,
            candidate: false,
            count: 0,
        }
    }

    /// Feed one raw read and return the stable level
    pub fn update(&mut self, raw: bool) -> bool {
        if raw == self.candidate {
            self.count = self.count.saturating_add(1);
        } else {
            self.candidate = raw;
            self.count = 1;
        }
        if self.count >= self.threshold {
            self.stable = self.candidate;
        }
        self.stable
    }

    pub fn level(&self) -> bool {
        self.stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_needs_consecutive_reads() {
        let mut debouncer = Debouncer::new(3);
        assert!(!debouncer.update(true));
        assert!(!debouncer.update(true));
        assert!(debouncer.update(true));

        // A glitch shorter than the threshold is ignored
        assert!(debouncer.update(false));
        assert!(debouncer.update(true));
        assert!(debouncer.update(false));
        assert!(debouncer.update(false));
        assert!(!debouncer.update(false));
        assert!(!debouncer.level());
    }

    #[test]
    fn test_threshold_one_follows_input() {
        let mut debouncer = Debouncer::new(0);
        assert!(debouncer.update(true));
        assert!(!debouncer.update(false));
    }
}
