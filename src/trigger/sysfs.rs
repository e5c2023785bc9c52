//! Sysfs GPIO lines (`/sys/class/gpio/gpioN/value`)

use super::{TriggerError, TriggerIo};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// One exported GPIO line
#[derive(Debug, Clone)]
pub struct SysfsLine {
    path: PathBuf,
}

impl SysfsLine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open for output, failing when the value file is not writable
    pub fn open_output(path: impl Into<PathBuf>) -> Result<Self, TriggerError> {
        let line = Self::new(path);
        OpenOptions::new()
            .write(true)
            .open(&line.path)
            .map_err(|source| line.io_error(source))?;
        Ok(line)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<bool, TriggerError> {
        let content = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        match content.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(TriggerError::InvalidValue {
                path: self.path.clone(),
                value: other.to_string(),
            }),
        }
    }

    pub fn write(&self, high: bool) -> Result<(), TriggerError> {
        fs::write(&self.path, if high { "1" } else { "0" }).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> TriggerError {
        TriggerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Trigger input and optional status output on sysfs lines
pub struct SysfsTrigger {
    input: SysfsLine,
    output: Option<SysfsLine>,
}

impl SysfsTrigger {
    pub fn new(input: impl Into<PathBuf>, output: Option<PathBuf>) -> Self {
        Self {
            input: SysfsLine::new(input),
            output: output.map(SysfsLine::new),
        }
    }
}

impl TriggerIo for SysfsTrigger {
    fn read_trigger_level(&mut self) -> Result<bool, TriggerError> {
        self.input.read()
    }

    fn write_output_level(&mut self, high: bool) -> Result<(), TriggerError> {
        match &self.output {
            Some(line) => line.write(high),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_levels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("value");

        fs::write(&path, "1\n").unwrap();
        assert!(SysfsLine::new(&path).read().unwrap());
        fs::write(&path, "0\n").unwrap();
        assert!(!SysfsLine::new(&path).read().unwrap());

        fs::write(&path, "high").unwrap();
        assert!(matches!(
            SysfsLine::new(&path).read(),
            Err(TriggerError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_output_line() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::write(&input, "1").unwrap();
        fs::write(&output, "0").unwrap();

        let mut trigger = SysfsTrigger::new(&input, Some(output.clone()));
        assert!(trigger.read_trigger_level().unwrap());
        trigger.write_output_level(true).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "1");
    }

    #[test]
    fn test_missing_output_line_fails_open() {
        let dir = tempdir().unwrap();
        let result = SysfsLine::open_output(dir.path().join("gpio99").join("value"));
        assert!(matches!(result, Err(TriggerError::Io { .. })));
    }
}
