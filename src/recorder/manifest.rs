//! Session metadata manifest
//!
//! `metadata.json` in the session directory: session-level fields first,
//! then one object per stream keyed by stream name, in registration order.

use crate::stream::{StreamManager, StreamMetadata};
use crate::utils::RecorderResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "metadata.json";

/// Session-level keys; a stream may not be named after one of them
pub const RESERVED_KEYS: [&str; 6] = [
    "sessionId",
    "createdAt",
    "videoLength",
    "currentDir",
    "warmupFrames",
    "recordCount",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Seconds; -1 when the session is stopped externally
    pub video_length: f64,
    pub current_dir: String,
    pub warmup_frames: u32,
    pub record_count: u32,
    #[serde(flatten)]
    pub streams: serde_json::Map<String, serde_json::Value>,
}

/// Session-level fields of a manifest
pub struct ManifestHeader<'a> {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub video_length: f64,
    pub dir: &'a Path,
    pub warmup_frames: u32,
    pub record_count: u32,
}

impl Manifest {
    /// Snapshot every manager's metadata
    pub fn collect(
        header: ManifestHeader<'_>,
        managers: &[Box<dyn StreamManager>],
    ) -> RecorderResult<Self> {
        let mut streams = serde_json::Map::new();
        for manager in managers {
            streams.insert(
                manager.name().to_string(),
                serde_json::to_value(manager.metadata())?,
            );
        }

        Ok(Self {
            session_id: header.session_id,
            created_at: header.created_at,
            video_length: header.video_length,
            current_dir: header.dir.to_string_lossy().to_string(),
            warmup_frames: header.warmup_frames,
            record_count: header.record_count,
            streams,
        })
    }

    /// Write `metadata.json` into `dir`
    pub fn write(&self, dir: &Path) -> RecorderResult<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        fs::write(&path, json)?;
        tracing::info!("Saved metadata: {:?}", path);
        Ok(path)
    }

    pub fn read(dir: &Path) -> RecorderResult<Self> {
        let content = fs::read_to_string(dir.join(MANIFEST_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Typed view of one stream entry
    pub fn stream(&self, name: &str) -> Option<StreamMetadata> {
        self.streams
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
