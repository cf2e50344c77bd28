// Catalog files on disk: JSON, gzipped JSON or bincode
use anyhow::{anyhow, bail, Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pawprint_core::{Catalog, CatalogArrays};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk encoding of a catalog, chosen by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    /// `*.json`
    Json,
    /// `*.json.gz`
    JsonGz,
    /// `*.bin`
    Bincode,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("Catalog path '{}' has no file name", path.display()))?
            .to_ascii_lowercase();

        if name.ends_with(".json.gz") {
            Ok(Self::JsonGz)
        } else if name.ends_with(".json") {
            Ok(Self::Json)
        } else if name.ends_with(".bin") {
            Ok(Self::Bincode)
        } else {
            Err(anyhow!(
                "Unsupported catalog file '{}': expected .json, .json.gz or .bin",
                path.display()
            ))
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<CatalogArrays> {
        let arrays = match self {
            Self::Json => serde_json::from_slice(bytes)?,
            Self::JsonGz => {
                let mut json = Vec::new();
                GzDecoder::new(bytes).read_to_end(&mut json)?;
                serde_json::from_slice(&json)?
            }
            Self::Bincode => bincode::deserialize(bytes)
                .map_err(|e| anyhow!("Deserialization error: {}", e))?,
        };
        Ok(arrays)
    }

    fn encode(self, arrays: &CatalogArrays) -> Result<Vec<u8>> {
        match self {
            Self::Json => Ok(serde_json::to_vec(arrays)?),
            Self::JsonGz => {
                let json = serde_json::to_vec(arrays)?;
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&json)?;
                Ok(encoder.finish()?)
            }
            Self::Bincode => {
                bincode::serialize(arrays).map_err(|e| anyhow!("Serialization error: {}", e))
            }
        }
    }
}

/// Description of a catalog file that was read or written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshotInfo {
    pub path: PathBuf,
    pub format: SnapshotFormat,
    pub rows: usize,
    /// File size in bytes
    pub size: u64,
    /// Hex SHA-256 of the file bytes
    pub checksum: String,
    pub loaded_at: DateTime<Utc>,
}

/// Hex SHA-256 of a byte slice
pub fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Read catalog arrays from `path`, verifying the file checksum if one is given.
/// Structure is not validated here; [`Catalog::load`] does that.
pub fn read_arrays<P: AsRef<Path>>(
    path: P,
    expected_checksum: Option<&str>,
) -> Result<(CatalogArrays, CatalogSnapshotInfo)> {
    let path = path.as_ref();
    let format = SnapshotFormat::from_path(path)?;
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read catalog file '{}'", path.display()))?;

    let actual = checksum(&bytes);
    if let Some(expected) = expected_checksum {
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            bail!("Checksum mismatch: expected {}, got {}", expected, actual);
        }
        debug!(path = %path.display(), "catalog checksum verified");
    }

    let arrays = format
        .decode(&bytes)
        .with_context(|| format!("Failed to decode catalog file '{}'", path.display()))?;

    let info = CatalogSnapshotInfo {
        path: path.to_path_buf(),
        format,
        rows: arrays.len(),
        size: bytes.len() as u64,
        checksum: actual,
        loaded_at: Utc::now(),
    };
    Ok((arrays, info))
}

/// Read and validate a catalog in one step
pub fn load_catalog<P: AsRef<Path>>(
    path: P,
    expected_checksum: Option<&str>,
) -> Result<(Catalog, CatalogSnapshotInfo)> {
    let (arrays, info) = read_arrays(path, expected_checksum)?;
    let catalog = Catalog::load(arrays)
        .with_context(|| format!("Catalog '{}' failed validation", info.path.display()))?;
    info!(
        path = %info.path.display(),
        format = ?info.format,
        rows = catalog.len(),
        dim = catalog.dim(),
        "catalog file loaded"
    );
    Ok((catalog, info))
}

/// Write catalog arrays to `path`. The file is replaced atomically, so
/// readers see either the old or the new catalog, never a partial one.
pub fn save_arrays<P: AsRef<Path>>(path: P, arrays: &CatalogArrays) -> Result<CatalogSnapshotInfo> {
    let path = path.as_ref();
    let format = SnapshotFormat::from_path(path)?;
    let data = format.encode(arrays)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(&data))
        .map_err(|e| anyhow!("Failed to write catalog file '{}': {}", path.display(), e))?;

    debug!(path = %path.display(), rows = arrays.len(), bytes = data.len(), "catalog saved");
    Ok(CatalogSnapshotInfo {
        path: path.to_path_buf(),
        format,
        rows: arrays.len(),
        size: data.len() as u64,
        checksum: checksum(&data),
        loaded_at: Utc::now(),
    })
}
