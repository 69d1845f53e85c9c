//! Stable JSON serialization helpers.
//!
//! Artifacts are written pretty-printed with a two-space indent and a
//! trailing newline. Key order is never touched: it is whatever order the
//! computing stage produced, so identical inputs give byte-identical files.

use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Serializer};
use std::io::Write;

/// Serialize a value as stable JSON and write it to the provided writer.
pub fn write_stable_json<T, W>(mut writer: W, value: &T) -> Result<(), serde_json::Error>
where
    T: Serialize,
    W: Write,
{
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut writer, formatter);
    value.serialize(&mut serializer)?;
    writer.write_all(b"\n").map_err(serde_json::Error::io)?;
    Ok(())
}

/// Serialize a value as stable JSON into a byte buffer.
pub fn stable_json_bytes<T>(value: &T) -> Result<Vec<u8>, serde_json::Error>
where
    T: Serialize,
{
    let mut buffer = Vec::new();
    write_stable_json(&mut buffer, value)?;
    Ok(buffer)
}

/// BLAKE3 digest of a byte slice as lowercase hex.
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}
