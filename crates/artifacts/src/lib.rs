//! flowscope artifacts
//!
//! Shapes, manifest, storage and lookup for the precomputed analysis results.
//!
//! Modules:
//! - `shape`: the table / keyed-scalar / plain tagged union
//! - `manifest`: the fixed nine-key manifest and per-run bundle
//! - `serialization`: stable JSON output and digests
//! - `store`: staged, all-or-nothing directory commits
//! - `lookup`: all-or-nothing read of the published results

pub mod errors;
pub mod lookup;
pub mod manifest;
pub mod serialization;
pub mod shape;
pub mod store;

pub use errors::{ArtifactError, Result};
pub use lookup::{error_body, read_all, read_one};
pub use manifest::{ArtifactBundle, ArtifactKey};
pub use serialization::{digest_hex, stable_json_bytes, write_stable_json};
pub use shape::{Artifact, IndexLabel, KeyedScalar, Plain, Scalar, Shape, Table, ToArtifact};
pub use store::{ArtifactStore, ManifestEntry, StoreManifest, MANIFEST_FILE};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
