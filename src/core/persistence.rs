// Copyright (c) 2026 Bitmesh
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persisted state (spec §6): a read-receipts ledger, a geohash-bookmarks
//! list, and the atomic-write-then-rename discipline both are built on.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Underlying filesystem operation failed.
    #[error("io error")]
    Io(#[from] std::io::Error),
    /// Stored content was not valid JSON for the expected shape.
    #[error("decode error")]
    Decode(#[from] serde_json::Error),
}

/// Write `data` to `path` atomically: write to a sibling temp file, fsync,
/// set owner-only permissions, then rename over the destination. Avoids
/// ever leaving a partially-written file at `path`.
pub fn atomic_write_private(path: &Path, data: &[u8]) -> Result<(), PersistenceError> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        std::io::Write::write_all(&mut file, data)?;
        file.sync_all()?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[derive(Serialize, Deserialize, Default)]
struct ReadReceiptLedgerFile {
    message_ids: Vec<String>,
}

/// JSON-backed ledger of message ids that already have a read receipt
/// recorded, so a restart doesn't re-emit one.
pub struct ReadReceiptLedger;

impl ReadReceiptLedger {
    /// Load the ledger from `path`, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Vec<String>, PersistenceError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str::<ReadReceiptLedgerFile>(&raw)?.message_ids),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist `message_ids` to `path` atomically.
    pub fn save(path: &Path, message_ids: &[String]) -> Result<(), PersistenceError> {
        let file = ReadReceiptLedgerFile {
            message_ids: message_ids.to_vec(),
        };
        let json = serde_json::to_vec(&file)?;
        atomic_write_private(path, &json)?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Default)]
struct GeohashBookmarksFile {
    geohashes: Vec<String>,
}

/// JSON-backed list of bookmarked geohash channels, normalized lowercase.
pub struct GeohashBookmarks;

impl GeohashBookmarks {
    /// Load bookmarks from `path`, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Vec<String>, PersistenceError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str::<GeohashBookmarksFile>(&raw)?.geohashes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist `geohashes` to `path` atomically, lowercased and deduplicated.
    pub fn save(path: &Path, geohashes: &[String]) -> Result<(), PersistenceError> {
        let mut normalized: Vec<String> = geohashes.iter().map(|g| g.to_ascii_lowercase()).collect();
        normalized.dedup();
        let file = GeohashBookmarksFile { geohashes: normalized };
        let json = serde_json::to_vec(&file)?;
        atomic_write_private(path, &json)?;
        Ok(())
    }
}
