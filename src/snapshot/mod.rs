use crate::event::{Domain, DomainRecord};
use crate::session::User;
use crate::store::LiveStore;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;


/// Current on-disk format
pub const SNAPSHOT_VERSION: &str = "1";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode or decode snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0:?}")]
    UnsupportedVersion(String),

    #[error("snapshot has a {0} record with an empty id")]
    EmptyId(Domain),

    #[error("snapshot has duplicate {domain} id {id:?}")]
    DuplicateId { domain: Domain, id: String },
}

impl SnapshotError {
    fn io(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| SnapshotError::Io { context, source }
    }
}

/// Persisted copy of every domain collection, plus the signed-in user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub snapshot_version: String,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    /// Records per domain, newest first
    pub collections: BTreeMap<Domain, Vec<DomainRecord>>,
}

impl StoreSnapshot {
    /// Capture the current store contents
    pub fn from_store(store: &LiveStore, user: Option<User>) -> Self {
        Self {
            snapshot_version: SNAPSHOT_VERSION.to_string(),
            created_at: Utc::now(),
            user,
            collections: store.export(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Check the invariants the store relies on before anything is replaced.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.snapshot_version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.snapshot_version.clone()));
        }

        for (domain, records) in &self.collections {
            let mut seen = HashSet::with_capacity(records.len());
            for record in records {
                if record.id.is_empty() {
                    return Err(SnapshotError::EmptyId(*domain));
                }
                if !seen.insert(record.id.as_str()) {
                    return Err(SnapshotError::DuplicateId {
                        domain: *domain,
                        id: record.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Replace the store's collections with this snapshot's.
    ///
    /// Domains absent from the snapshot are left untouched. Each restored
    /// domain is announced with one `Resync`, never per record.
    pub fn apply(self, store: &LiveStore) {
        let count = self.record_count();
        store.load_collections(self.collections);
        info!(records = count, created_at = %self.created_at, "Snapshot restored");
    }

    /// Save as gzip-compressed JSON.
    ///
    /// Writes to a `.tmp` sibling, fsyncs, then renames over `path`.
    pub fn save_to_file(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec(self)?;
        let tmp_path = path.with_extension("tmp");

        {
            let tmp_file = File::create(&tmp_path)
                .map_err(SnapshotError::io("Failed to create temporary snapshot file"))?;

            let mut encoder = GzEncoder::new(tmp_file, Compression::default());
            encoder
                .write_all(&json)
                .map_err(SnapshotError::io("Failed to write compressed snapshot data"))?;

            let file = encoder
                .finish()
                .map_err(SnapshotError::io("Failed to finish compression"))?;
            file.sync_all()
                .map_err(SnapshotError::io("Failed to sync snapshot file to disk"))?;
        }

        fs::rename(&tmp_path, path)
            .map_err(SnapshotError::io("Failed to rename temporary snapshot file"))?;

        info!(path = %path.display(), records = self.record_count(), "Snapshot saved");
        Ok(())
    }

    /// Load and validate a snapshot.
    ///
    /// Files without a `.gz` extension are read as plain JSON.
    pub fn load_from_file(path: &Path) -> Result<Self, SnapshotError> {
        let file =
            File::open(path).map_err(SnapshotError::io("Failed to open snapshot file"))?;

        let is_compressed = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "gz")
            .unwrap_or(false);

        let mut json = String::new();
        if is_compressed {
            GzDecoder::new(file)
                .read_to_string(&mut json)
                .map_err(SnapshotError::io("Failed to decompress snapshot file"))?;
        } else {
            let mut file = file;
            file.read_to_string(&mut json)
                .map_err(SnapshotError::io("Failed to read snapshot file"))?;
        }

        let snapshot: StoreSnapshot = serde_json::from_str(&json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}
