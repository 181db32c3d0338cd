//! Persistence file: the opaque byte stream produced by
//! [`gptp_core::port::PersistentState`], written on `SIGHUP` and restored
//! at the next start so a restart doesn't re-cross `seqIdAsCapableThresh`
//! from zero.
//!
//! The original writes a raw `fwrite` of its C struct; we do the same with
//! `PersistentState::to_bytes`/`from_bytes`, so the file format is a fixed
//! number of bytes with no framing or versioning (matching "byte-for-byte"
//! restore.

use std::{
    io::{Read, Write},
    path::Path,
};

use gptp_core::port::{PersistentState, PERSISTENT_STATE_LEN};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to read persistence file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write persistence file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("persistence file {path} has {found} bytes, expected {expected}")]
    Truncated {
        path: String,
        found: usize,
        expected: usize,
    },
}

/// Load a previously persisted state, if the file exists and has the
/// expected length. A missing file is not an error: cold start is a normal
/// outcome.
pub fn load(path: &Path) -> Result<Option<PersistentState>, PersistError> {
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|source| PersistError::Read {
            path: path.display().to_string(),
            source,
        })?;

    if buf.len() != PERSISTENT_STATE_LEN {
        return Err(PersistError::Truncated {
            path: path.display().to_string(),
            found: buf.len(),
            expected: PERSISTENT_STATE_LEN,
        });
    }

    let bytes: [u8; PERSISTENT_STATE_LEN] = buf.try_into().unwrap();
    Ok(Some(PersistentState::from_bytes(&bytes)))
}

/// Write `state` to `path`, replacing any previous contents. Writes to a
/// sibling temp file and renames into place so a `SIGHUP` racing a crash
/// never leaves a half-written file behind.
pub fn save(path: &Path, state: PersistentState) -> Result<(), PersistError> {
    let tmp_path = path.with_extension("tmp");
    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(&state.to_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    };
    write().map_err(|source| PersistError::Write {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gptp_core::time::Duration;

    #[test]
    fn missing_file_is_not_an_error() {
        let path = Path::new("/nonexistent/gptp-test-persist-does-not-exist");
        assert!(load(path).unwrap().is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("gptp-persist-test-{}.bin", std::process::id()));

        let state = PersistentState {
            as_capable: true,
            port_state_kind: 8,
            one_way_delay: Duration::from_nanos(512),
            neighbor_rate_ratio: 1.000_01,
        };
        save(&path, state).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded, state);

        std::fs::remove_file(&path).ok();
    }
}
