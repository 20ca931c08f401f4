//! Persistent record of downloaded editions.
//!
//! The registry is a small pretty-printed JSON file:
//!
//! ```json
//! {
//!   "last_check": "2023-01-10 09:00:02",
//!   "last_edition": 3851,
//!   "downloaded_files": [
//!     { "id": "3851_10_01_2023", "numero": "3851", "data": "10/01/2023",
//!       "filename": "PR_diario_3851_10_01_2023.pdf",
//!       "download_date": "2023-01-10 09:00:01" }
//!   ]
//! }
//! ```

use super::listing::Edition;
use crate::error::DiarioError;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One downloaded edition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub id: String,
    pub numero: String,
    pub data: String,
    pub filename: String,
    pub download_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub last_check: Option<String>,
    #[serde(default)]
    pub last_edition: u32,
    #[serde(default)]
    pub downloaded_files: Vec<DownloadEntry>,
}

pub(crate) fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

impl Registry {
    /// Empty registry whose `last_edition` starts at `seed`.
    pub fn seeded(seed: u32) -> Self {
        Self {
            last_edition: seed,
            ..Default::default()
        }
    }

    /// Load the registry at `path`.
    ///
    /// A missing file yields a seeded registry. An unparsable file is copied to
    /// `<path>.bak` and replaced by a fresh one, so a corrupt registry never
    /// blocks downloads. A stored `last_edition` of 0 is replaced by `seed`.
    pub fn load(path: &Path, seed: u32) -> Result<Self, DiarioError> {
        if !path.exists() {
            info!("No registry at {}, starting fresh", path.display());
            return Ok(Self::seeded(seed));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| DiarioError::RegistryFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut registry = match serde_json::from_str::<Registry>(&raw) {
            Ok(r) => r,
            Err(e) => {
                let backup = path.with_extension("json.bak");
                warn!(
                    "Registry {} is corrupt ({}), backing up to {}",
                    path.display(),
                    e,
                    backup.display()
                );
                std::fs::copy(path, &backup).map_err(|e| DiarioError::RegistryFailed {
                    path: backup.clone(),
                    reason: e.to_string(),
                })?;
                return Ok(Self::seeded(seed));
            }
        };
        if registry.last_edition == 0 {
            registry.last_edition = seed;
        }
        Ok(registry)
    }

    /// Write the registry through a temporary file and a rename.
    pub fn save(&self, path: &Path) -> Result<(), DiarioError> {
        let failed = |reason: String| DiarioError::RegistryFailed {
            path: path.to_path_buf(),
            reason,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| failed(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| failed(e.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.downloaded_files.iter().any(|f| f.id == id)
    }

    /// Record a successful download. Recording the same id twice is a no-op.
    pub fn record(&mut self, edition: &Edition) {
        if self.contains(&edition.id) {
            return;
        }
        self.downloaded_files.push(DownloadEntry {
            id: edition.id.clone(),
            numero: edition.numero.clone(),
            data: edition.data.clone(),
            filename: edition.filename.clone(),
            download_date: now_timestamp(),
        });
    }

    /// Raise `last_edition` to `number` if it is newer.
    pub fn bump_last_edition(&mut self, number: u32) -> bool {
        if number > self.last_edition {
            info!("New latest edition: {} (was {})", number, self.last_edition);
            self.last_edition = number;
            true
        } else {
            false
        }
    }

    pub fn touch(&mut self) {
        self.last_check = Some(now_timestamp());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn edition(numero: &str, data: &str) -> Edition {
        Edition::new(numero, data, "/baixar.do?id=1", "https://portal.tjpr.jus.br").unwrap()
    }

    #[test]
    fn missing_file_is_seeded() {
        let dir = TempDir::new().unwrap();
        let r = Registry::load(&dir.path().join("registry.json"), 3850).unwrap();
        assert_eq!(r.last_edition, 3850);
        assert!(r.downloaded_files.is_empty());
        assert!(r.last_check.is_none());
    }

    #[test]
    fn save_then_load_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        let mut r = Registry::seeded(3850);
        r.record(&edition("3851", "10/01/2023"));
        r.record(&edition("3851", "10/01/2023"));
        r.bump_last_edition(3851);
        r.touch();
        r.save(&path).unwrap();

        let loaded = Registry::load(&path, 3850).unwrap();
        assert_eq!(loaded, r);
        assert_eq!(loaded.downloaded_files.len(), 1);
        assert!(loaded.contains("3851_10_01_2023"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "{ not json").unwrap();

        let r = Registry::load(&path, 4000).unwrap();
        assert_eq!(r.last_edition, 4000);
        let backup = std::fs::read_to_string(path.with_extension("json.bak")).unwrap();
        assert_eq!(backup, "{ not json");
    }

    #[test]
    fn zero_last_edition_takes_seed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, r#"{"last_check": null, "last_edition": 0, "downloaded_files": []}"#)
            .unwrap();
        assert_eq!(Registry::load(&path, 3850).unwrap().last_edition, 3850);
    }

    #[test]
    fn bump_only_moves_forward() {
        let mut r = Registry::seeded(3850);
        assert!(!r.bump_last_edition(3849));
        assert!(r.bump_last_edition(3860));
        assert_eq!(r.last_edition, 3860);
    }
}
