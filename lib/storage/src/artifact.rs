//! Single-file artifact store
//!
//! An artifact is a bincode envelope (header + payload bytes), gzip
//! compressed and written with an atomic replace. The header carries a
//! SHA-256 checksum of the payload which is verified on every load.

use anyhow::{anyhow, bail, Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use uuid::Uuid;

const MAGIC: [u8; 4] = *b"IDMA";
pub const FORMAT_VERSION: u32 = 1;

/// Metadata stored in front of every payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    magic: [u8; 4],
    pub format_version: u32,
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Free-form payload label, e.g. the classifier kind
    pub kind: String,
    /// Hex SHA-256 of the uncompressed payload bytes
    pub checksum: String,
    pub payload_len: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    header: ArtifactHeader,
    payload: Vec<u8>,
}

/// A decoded artifact
#[derive(Debug, Clone)]
pub struct Artifact<T> {
    pub header: ArtifactHeader,
    pub payload: T,
}

/// Serialize `payload` and atomically write it to `path`
///
/// Missing parent directories are created. An existing file is replaced
/// only once the new one is fully written.
pub fn save_artifact<T: Serialize>(
    path: impl AsRef<Path>,
    kind: &str,
    payload: &T,
) -> Result<ArtifactHeader> {
    let path = path.as_ref();
    let payload = bincode::serialize(payload).map_err(|e| anyhow!("Serialization error: {}", e))?;

    let header = ArtifactHeader {
        magic: MAGIC,
        format_version: FORMAT_VERSION,
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        kind: kind.to_string(),
        checksum: checksum(&payload),
        payload_len: payload.len() as u64,
    };
    let envelope = Envelope {
        header: header.clone(),
        payload,
    };

    let bytes = encode(&envelope)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating artifact directory {:?}", parent))?;
    }

    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|file| file.write_all(&bytes))
        .map_err(|e| anyhow!("Failed to write artifact {:?}: {}", path, e))?;

    tracing::info!(
        "Saved artifact {} ({}, {} bytes) to {:?}",
        header.id,
        header.kind,
        bytes.len(),
        path
    );
    Ok(header)
}

/// Read, verify and decode the artifact at `path`
pub fn load_artifact<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Artifact<T>> {
    let path = path.as_ref();
    let envelope = read_envelope(path)?;

    let actual = checksum(&envelope.payload);
    if actual != envelope.header.checksum {
        bail!(
            "Checksum mismatch for {:?}: expected {}, got {}",
            path,
            envelope.header.checksum,
            actual
        );
    }

    let payload = bincode::deserialize(&envelope.payload)
        .map_err(|e| anyhow!("Deserialization error: {}", e))?;

    tracing::debug!("Loaded artifact {} from {:?}", envelope.header.id, path);
    Ok(Artifact {
        header: envelope.header,
        payload,
    })
}

/// Read only the header of the artifact at `path`
pub fn inspect_artifact(path: impl AsRef<Path>) -> Result<ArtifactHeader> {
    read_envelope(path.as_ref()).map(|envelope| envelope.header)
}

fn read_envelope(path: &Path) -> Result<Envelope> {
    let compressed =
        fs::read(path).with_context(|| format!("reading artifact {:?}", path))?;

    let mut bytes = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut bytes)
        .with_context(|| format!("decompressing artifact {:?}", path))?;

    let envelope: Envelope =
        bincode::deserialize(&bytes).map_err(|e| anyhow!("Corrupt artifact {:?}: {}", path, e))?;

    if envelope.header.magic != MAGIC {
        bail!("{:?} is not a model artifact", path);
    }
    if envelope.header.format_version != FORMAT_VERSION {
        bail!(
            "Unsupported artifact format version {} (expected {})",
            envelope.header.format_version,
            FORMAT_VERSION
        );
    }
    Ok(envelope)
}

fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    let raw = bincode::serialize(envelope).map_err(|e| anyhow!("Serialization error: {}", e))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
