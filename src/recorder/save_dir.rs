//! Session directory allocation

use crate::utils::{RecorderError, RecorderResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const MAX_ATTEMPTS: usize = 1000;

/// Create a fresh `<root>/data/<N>_<YYYY-mm-dd_HH-MM-SS>` directory.
///
/// N starts at the number of existing session directories and is bumped
/// until the name is unused. The directory is created exclusively, so two
/// sessions never share one.
pub fn allocate_session_dir(root: &Path) -> RecorderResult<PathBuf> {
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).map_err(|source| RecorderError::SessionDir {
        path: data_dir.clone(),
        source,
    })?;

    let existing = fs::read_dir(&data_dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
                .count()
        })
        .unwrap_or(0);

    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    for n in existing..existing + MAX_ATTEMPTS {
        let dir = data_dir.join(format!("{n}_{stamp}"));
        match fs::create_dir(&dir) {
            Ok(()) => {
                tracing::info!("Session directory created: {:?}", dir);
                return Ok(dir);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(RecorderError::SessionDir { path: dir, source }),
        }
    }

    Err(RecorderError::SessionDir {
        path: data_dir,
        source: std::io::Error::new(ErrorKind::AlreadyExists, "no unused session directory name"),
    })
}
