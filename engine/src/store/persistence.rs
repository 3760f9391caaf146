//! Store persistence - save/load of the full property store.
//!
//! A dump preserves exact (table, timestamp, entity) → value triples and
//! round-trips losslessly. Every dump embeds a SHA-256 digest of its payload
//! so that a truncated or hand-edited file is rejected at load instead of
//! producing a silently different run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::store::{PropertyStore, StoreError};

/// On-disk envelope: payload plus integrity digest.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDump {
    /// SHA-256 hex digest of the serialized store payload
    digest: String,
    store: PropertyStore,
}

/// Compute the hex SHA-256 digest of a store's canonical JSON form.
///
/// All maps in the store are ordered maps, so serialization is already
/// canonical: same triples, same bytes, same digest.
pub fn compute_store_digest(store: &PropertyStore) -> Result<String, StoreError> {
    let json = serde_json::to_string(store).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

impl PropertyStore {
    /// Write the store to `{dir}/{name}.json`, creating `dir` if needed.
    /// Returns the written path.
    pub fn dump(&self, dir: &Path) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(dir).map_err(|e| StoreError::Io(e.to_string()))?;

        let dump = StoreDump {
            digest: compute_store_digest(self)?,
            store: self.clone(),
        };
        let json = serde_json::to_string_pretty(&dump)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = dir.join(format!("{}.json", self.name()));
        fs::write(&path, json).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(path)
    }

    /// Load a store previously written by [`PropertyStore::dump`].
    ///
    /// Fails with `ConsistencyViolation` when the embedded digest does not
    /// match the payload.
    pub fn load_from_file(path: &Path) -> Result<PropertyStore, StoreError> {
        let json = fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        let dump: StoreDump =
            serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let expected = compute_store_digest(&dump.store)?;
        if expected != dump.digest {
            return Err(StoreError::ConsistencyViolation(format!(
                "store dump digest mismatch for '{}': file says {}, payload hashes to {}",
                dump.store.name(),
                dump.digest,
                expected
            )));
        }

        Ok(dump.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        use crate::core::time::year_start;
        use crate::store::TableKind;

        let mut a = PropertyStore::new("d");
        a.register_table("t", TableKind::Endogenous);
        a.set("t", year_start(2000), "X", 1.0).unwrap();

        let mut b = PropertyStore::new("d");
        b.register_table("t", TableKind::Endogenous);
        b.set("t", year_start(2000), "X", 1.0).unwrap();

        assert_eq!(
            compute_store_digest(&a).unwrap(),
            compute_store_digest(&b).unwrap()
        );

        b.set("t", year_start(2000), "X", 2.0).unwrap();
        assert_ne!(
            compute_store_digest(&a).unwrap(),
            compute_store_digest(&b).unwrap()
        );
    }
}
