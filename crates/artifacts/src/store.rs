//! Directory-backed artifact store
//!
//! A commit stages all nine files inside `<root>/.staging`, syncs them, and
//! only then renames them over the published files. A failure before the
//! rename step removes the staging directory and leaves the previous
//! generation untouched. After the renames, `manifest.json` records a BLAKE3
//! digest per artifact so a reader can check which generation it sees.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::{ArtifactError, Result};
use crate::manifest::{ArtifactBundle, ArtifactKey};
use crate::serialization::{digest_hex, stable_json_bytes};

const STAGING_DIR: &str = ".staging";
pub const MANIFEST_FILE: &str = "manifest.json";

/// One published artifact and its content digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub key: String,
    pub file: String,
    pub blake3: String,
}

/// Digest manifest written after a successful commit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreManifest {
    pub artifacts: Vec<ManifestEntry>,
}

impl StoreManifest {
    pub fn digest_for(&self, key: ArtifactKey) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|entry| entry.key == key.name())
            .map(|entry| entry.blake3.as_str())
    }
}

/// Results directory holding at most one generation per artifact key
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: ArtifactKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Publish a complete bundle, overwriting any previous generation.
    pub fn commit(&self, bundle: &ArtifactBundle) -> Result<StoreManifest> {
        self.commit_with(bundle, |bundle, staging| self.stage(bundle, staging))
    }

    /// Commit with a caller-supplied staging step that fills `staging`.
    fn commit_with<F>(&self, bundle: &ArtifactBundle, stage: F) -> Result<StoreManifest>
    where
        F: FnOnce(&ArtifactBundle, &Path) -> Result<StoreManifest>,
    {
        if !bundle.is_complete() {
            return Err(ArtifactError::IncompleteBundle(bundle.missing()));
        }

        fs::create_dir_all(&self.root)?;
        let staging = self.root.join(STAGING_DIR);
        if staging.exists() {
            warn!("Removing stale staging directory: {}", staging.display());
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let manifest = match stage(bundle, &staging) {
            Ok(manifest) => manifest,
            Err(err) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!("Failed to remove staging directory: {}", cleanup);
                }
                return Err(err);
            }
        };

        for key in ArtifactKey::ALL {
            fs::rename(staging.join(key.file_name()), self.path_for(key))?;
        }
        fs::remove_dir_all(&staging)?;

        self.write_manifest(&manifest)?;
        info!(
            "Committed {} artifacts to {}",
            manifest.artifacts.len(),
            self.root.display()
        );
        Ok(manifest)
    }

    fn stage(&self, bundle: &ArtifactBundle, staging: &Path) -> Result<StoreManifest> {
        let mut manifest = StoreManifest::default();

        for (key, artifact) in bundle.iter() {
            let bytes = stable_json_bytes(artifact)?;
            let path = staging.join(key.file_name());
            let mut file = File::create(&path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            debug!("Staged {} ({} bytes)", path.display(), bytes.len());

            manifest.artifacts.push(ManifestEntry {
                key: key.name().to_string(),
                file: key.file_name(),
                blake3: digest_hex(&bytes),
            });
        }

        Ok(manifest)
    }

    fn write_manifest(&self, manifest: &StoreManifest) -> Result<()> {
        let bytes = stable_json_bytes(manifest)?;
        let path = self.root.join(MANIFEST_FILE);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    /// Read the digest manifest of the last successful commit.
    pub fn read_manifest(&self) -> Result<StoreManifest> {
        let path = self.root.join(MANIFEST_FILE);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::ArtifactMissing {
                    name: MANIFEST_FILE.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&content).map_err(|err| ArtifactError::ArtifactMalformed {
            name: MANIFEST_FILE.to_string(),
            reason: err.to_string(),
        })
    }

    /// Recompute artifact digests and return the keys whose files are absent
    /// or differ from the manifest.
    pub fn verify(&self) -> Result<Vec<ArtifactKey>> {
        let manifest = self.read_manifest()?;
        let mut mismatched = Vec::new();

        for key in ArtifactKey::ALL {
            let actual = match fs::read(self.path_for(key)) {
                Ok(bytes) => Some(digest_hex(&bytes)),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
                Err(err) => return Err(err.into()),
            };

            if actual.as_deref() != manifest.digest_for(key) {
                warn!("Artifact {} does not match the stored digest", key);
                mismatched.push(key);
            }
        }

        Ok(mismatched)
    }
}
