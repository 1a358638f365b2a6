use super::CacheEngine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct Envelope {
    expires_at: Option<DateTime<Utc>>,
    data: String,
}

/// Cache engine storing one JSON file per key under a root directory.
///
/// I/O failures never propagate: reads degrade to "absent" and writes to
/// `false`, each logged at `warn`.
#[derive(Debug, Clone)]
pub struct FileCacheEngine {
    root: PathBuf,
}

impl FileCacheEngine {
    /// Create an engine rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        let mut name = String::with_capacity(id.len() + 6);
        for byte in id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(char::from(byte));
            } else {
                let _ = write!(name, "%{byte:02X}");
            }
        }
        name.push_str(".cache");
        self.root.join(name)
    }

    fn read_live(&self, id: &str) -> Option<Envelope> {
        let path = self.path_for(id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read cache file");
                return None;
            }
        };

        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt cache file");
                return None;
            }
        };

        if envelope.expires_at.is_some_and(|expires_at| Utc::now() >= expires_at) {
            let _ = fs::remove_file(&path);
            return None;
        }
        Some(envelope)
    }
}

impl CacheEngine for FileCacheEngine {
    fn contains(&self, id: &str) -> bool {
        self.read_live(id).is_some()
    }

    fn fetch(&self, id: &str) -> Option<String> {
        self.read_live(id).map(|envelope| envelope.data)
    }

    fn save(&self, id: &str, data: &str, lifetime: Duration) -> bool {
        let expires_at = if lifetime.is_zero() {
            None
        } else {
            chrono::Duration::from_std(lifetime)
                .ok()
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        };
        let envelope = Envelope {
            expires_at,
            data: data.to_string(),
        };

        let serialized = match serde_json::to_string(&envelope) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize cache entry");
                return false;
            }
        };

        let path = self.path_for(id);
        // Unique per save so concurrent writers of one key never share a file.
        let staging = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let written = fs::create_dir_all(&self.root)
            .and_then(|()| fs::write(&staging, serialized))
            .and_then(|()| fs::rename(&staging, &path));

        match written {
            Ok(()) => true,
            Err(e) => {
                let _ = fs::remove_file(&staging);
                tracing::warn!(path = %path.display(), error = %e, "Failed to write cache file");
                false
            }
        }
    }

    fn delete(&self, id: &str) -> bool {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete cache file");
                false
            }
        }
    }
}
