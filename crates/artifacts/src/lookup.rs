//! Read side of the results directory
//!
//! Unions the nine manifest files into a single JSON object keyed by logical
//! name, or fails on the first absent or undecodable file. Partial responses
//! are never produced.

use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

use crate::errors::{ArtifactError, Result};
use crate::manifest::ArtifactKey;

/// Read every artifact of the manifest from `dir`.
pub fn read_all(dir: &Path) -> Result<Map<String, Value>> {
    let mut response = Map::with_capacity(ArtifactKey::ALL.len());

    for key in ArtifactKey::ALL {
        response.insert(key.name().to_string(), read_one(dir, key)?);
    }

    Ok(response)
}

/// Read a single artifact file as JSON.
pub fn read_one(dir: &Path, key: ArtifactKey) -> Result<Value> {
    let file_name = key.file_name();
    let content = match fs::read(dir.join(&file_name)) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArtifactError::ArtifactMissing { name: file_name })
        }
        Err(err) => return Err(err.into()),
    };

    serde_json::from_slice(&content).map_err(|err| ArtifactError::ArtifactMalformed {
        name: file_name,
        reason: err.to_string(),
    })
}

/// Failure body published by the lookup surface.
pub fn error_body(err: &ArtifactError) -> Value {
    json!({ "error": err.to_string() })
}
