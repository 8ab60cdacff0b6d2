//! File-backed reference backend
//!
//! Layout per tenant, under the configured root: `{tenant}.graph` and
//! `{tenant}.loops`, each framed as a 4-byte magic, a 4-byte little-endian
//! schema version, and a JSON payload. Writes go to a `.tmp` sibling file
//! first and are then renamed into place, so a crash mid-write never
//! leaves a corrupt file at the real path.

use std::fs;
use std::path::{Path, PathBuf};

use tl_common::TenantId;

use crate::backend::{PersistenceBackend, PersistenceError};
use crate::record::{GraphRecord, LoopCacheRecord};

const MAGIC: &[u8; 4] = b"TLE1";
const SCHEMA_VERSION: u32 = 1;

/// Persists tenant records as framed JSON files under a root directory
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Use `root` as the storage directory, creating it if absent
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| PersistenceError::Io {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    fn graph_path(&self, tenant: &TenantId) -> PathBuf {
        self.root.join(format!("{}.graph", tenant.0))
    }

    fn loops_path(&self, tenant: &TenantId) -> PathBuf {
        self.root.join(format!("{}.loops", tenant.0))
    }

    fn write_framed(path: &Path, payload: &[u8]) -> Result<(), PersistenceError> {
        let mut buf = Vec::with_capacity(8 + payload.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
        buf.extend_from_slice(payload);

        let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
        fs::write(&tmp_path, &buf).map_err(|source| PersistenceError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| PersistenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    fn read_framed(path: &Path, tenant: &TenantId) -> Result<Option<Vec<u8>>, PersistenceError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Io { path: path.display().to_string(), source })
            }
        };

        if bytes.len() < 8 {
            return Err(PersistenceError::Corrupt {
                tenant: tenant.clone(),
                reason: "file shorter than the 8-byte magic+version header".to_string(),
            });
        }
        if &bytes[0..4] != MAGIC {
            return Err(PersistenceError::Corrupt {
                tenant: tenant.clone(),
                reason: "bad magic".to_string(),
            });
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into().expect("checked length above"));
        if version != SCHEMA_VERSION {
            return Err(PersistenceError::Corrupt {
                tenant: tenant.clone(),
                reason: format!("unsupported schema version {version}"),
            });
        }

        Ok(Some(bytes[8..].to_vec()))
    }
}

impl PersistenceBackend for FileBackend {
    fn save_graph(&self, tenant: &TenantId, record: &GraphRecord) -> Result<(), PersistenceError> {
        let payload = serde_json::to_vec(record).expect("GraphRecord always serializes");
        Self::write_framed(&self.graph_path(tenant), &payload)
    }

    fn load_graph(&self, tenant: &TenantId) -> Result<Option<GraphRecord>, PersistenceError> {
        let Some(bytes) = Self::read_framed(&self.graph_path(tenant), tenant)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupt { tenant: tenant.clone(), reason: e.to_string() })
    }

    fn save_loops(
        &self,
        tenant: &TenantId,
        record: &LoopCacheRecord,
    ) -> Result<(), PersistenceError> {
        let payload = serde_json::to_vec(record).expect("LoopCacheRecord always serializes");
        Self::write_framed(&self.loops_path(tenant), &payload)
    }

    fn load_loops(&self, tenant: &TenantId) -> Result<Option<LoopCacheRecord>, PersistenceError> {
        let Some(bytes) = Self::read_framed(&self.loops_path(tenant), tenant)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupt { tenant: tenant.clone(), reason: e.to_string() })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::WalletRecord;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tl-persistence-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn round_trips_a_graph_record_through_disk() {
        let dir = scratch_dir("graph");
        let backend = FileBackend::new(&dir).unwrap();
        let tenant = TenantId::from("t1");
        let record = GraphRecord {
            wallets: vec![WalletRecord {
                id: "A".into(),
                owned: vec!["item1".into()],
                wanted: vec![],
                rejected_items: vec![],
                rejected_peers: vec![],
            }],
        };

        backend.save_graph(&tenant, &record).unwrap();
        assert_eq!(backend.load_graph(&tenant).unwrap(), Some(record));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_tenant_loads_as_none() {
        let dir = scratch_dir("missing");
        let backend = FileBackend::new(&dir).unwrap();
        assert_eq!(backend.load_graph(&TenantId::from("ghost")).unwrap(), None);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn bad_magic_is_reported_as_corrupt() {
        let dir = scratch_dir("corrupt");
        let backend = FileBackend::new(&dir).unwrap();
        let tenant = TenantId::from("t1");
        fs::write(backend.graph_path(&tenant), b"not a real file at all").unwrap();

        let err = backend.load_graph(&tenant).unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { .. }));

        fs::remove_dir_all(&dir).ok();
    }
}
