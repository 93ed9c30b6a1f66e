//! Backend handle
//!
//! Bundles the three collaborators (document store, auth, blob storage) and
//! persists their state to a JSON snapshot so separate invocations see the
//! same users, messages and images.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::auth::accounts::{Account, MemoryAuth};
use crate::auth::{session, AuthProvider};
use crate::config::Config;
use crate::models::ChatUser;
use crate::store::blob::MemoryBlobStore;
use crate::store::memory::{Collections, MemoryStore};
use crate::store::DocumentStore;

/// On-disk form of the backend.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Snapshot {
    collections: Collections,
    accounts: BTreeMap<String, Account>,
    /// Blob bytes, base64-encoded
    blobs: BTreeMap<String, String>,
}

/// Shared handles to the backend collaborators.
pub struct Backend {
    pub store: Arc<MemoryStore>,
    pub auth: Arc<MemoryAuth>,
    pub blobs: Arc<MemoryBlobStore>,
    path: PathBuf,
}

impl Backend {
    /// Load the backend snapshot named by `config`, restoring its signed-in user.
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.snapshot_path()?;
        Self::load_from(&path, config.uid.clone())
    }

    pub fn load_from(path: &Path, current_uid: Option<String>) -> Result<Self> {
        let snapshot: Snapshot = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read backend snapshot {}", path.display()))?;
            serde_json::from_str(&content).context("Failed to parse backend snapshot")?
        } else {
            tracing::debug!("No backend snapshot at {}, starting empty", path.display());
            Snapshot::default()
        };

        let engine = base64::engine::general_purpose::STANDARD;
        let mut blobs = BTreeMap::new();
        for (blob_path, encoded) in snapshot.blobs {
            let bytes = engine
                .decode(&encoded)
                .with_context(|| format!("Corrupt blob '{}' in snapshot", blob_path))?;
            blobs.insert(blob_path, bytes);
        }

        Ok(Self {
            store: Arc::new(MemoryStore::from_collections(snapshot.collections)),
            auth: Arc::new(MemoryAuth::from_accounts(snapshot.accounts, current_uid)),
            blobs: Arc::new(MemoryBlobStore::from_blobs(blobs)),
            path: path.to_path_buf(),
        })
    }

    /// Write the current state back to the snapshot file.
    pub fn save(&self) -> Result<()> {
        let engine = base64::engine::general_purpose::STANDARD;
        let snapshot = Snapshot {
            collections: self.store.collections(),
            accounts: self.auth.accounts(),
            blobs: self
                .blobs
                .blobs()
                .into_iter()
                .map(|(path, bytes)| (path, engine.encode(bytes)))
                .collect(),
        };

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create data directory")?;
        }
        let content =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize backend")?;
        fs::write(&self.path, content).context("Failed to write backend snapshot")?;

        // Holds password digests
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms)
                .context("Failed to set backend snapshot permissions")?;
        }

        tracing::debug!("Saved backend snapshot to {}", self.path.display());
        Ok(())
    }

    /// The document store as the trait object components take.
    pub fn documents(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// Profile of the signed-in user.
    pub async fn current_user(&self) -> Result<ChatUser> {
        if self.auth.current_user_id().is_none() {
            anyhow::bail!("Not signed in. Run 'messenger login' first.");
        }
        session::current_user(self.auth.as_ref(), self.store.as_ref())
            .await
            .context("Failed to load the signed-in user")
    }
}
