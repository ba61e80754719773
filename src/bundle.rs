//! Persisted search bundle and build report
//!
//! Bundle file format:
//! - Magic bytes: "PFSB" (4 bytes)
//! - Version: u32 (4 bytes)
//! - Length: u32 (4 bytes) - length of the payload
//! - Payload: serialized SearchEngineBundle (msgpack)
//! - CRC32: u32 (4 bytes) - checksum of length + payload

use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog::{Catalog, SkippedFile};
use crate::index::{resolve_features, FeatureScaler, KdTree};
use crate::{Error, Result};

const BUNDLE_MAGIC: &[u8; 4] = b"PFSB";
const BUNDLE_VERSION: u32 = 1;

/// Index, catalog and scaling parameters, built once and loaded read-only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchEngineBundle {
    pub index: KdTree,
    pub catalog: Catalog,
    pub feature_min: Vec<f64>,
    pub feature_range: Vec<f64>,
    /// Canonical column names, in index dimension order
    pub feature_names: Vec<String>,
    pub built_at: DateTime<Utc>,
}

impl SearchEngineBundle {
    pub fn scaler(&self) -> FeatureScaler {
        FeatureScaler {
            min: self.feature_min.clone(),
            range: self.feature_range.clone(),
        }
    }

    /// Encode into the framed bundle format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = rmp_serde::to_vec(self)?;
        let length = u32::try_from(payload.len())
            .map_err(|_| Error::internal("bundle payload exceeds 4 GiB"))?;

        let mut buffer = BytesMut::with_capacity(16 + payload.len());
        buffer.put_slice(BUNDLE_MAGIC);
        buffer.put_u32(BUNDLE_VERSION);
        buffer.put_u32(length);
        buffer.put_slice(&payload);

        let crc = crc32fast::hash(&buffer[8..]);
        buffer.put_u32(crc);

        Ok(buffer.to_vec())
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 16 {
            return Err(Error::CorruptBundle("file too short".to_string()));
        }

        let mut buf = data;
        if &buf[..4] != BUNDLE_MAGIC {
            return Err(Error::CorruptBundle("bad magic bytes".to_string()));
        }
        buf.advance(4);

        let version = buf.get_u32();
        if version != BUNDLE_VERSION {
            return Err(Error::CorruptBundle(format!(
                "unsupported version {}",
                version
            )));
        }

        let checked = buf;
        let length = buf.get_u32() as usize;
        if buf.remaining() != length + 4 {
            return Err(Error::CorruptBundle(format!(
                "payload length {} does not match file size",
                length
            )));
        }

        let payload = &buf[..length];
        buf.advance(length);
        let stored_crc = buf.get_u32();
        let computed_crc = crc32fast::hash(&checked[..4 + length]);
        if stored_crc != computed_crc {
            return Err(Error::CorruptBundle(format!(
                "checksum mismatch: expected {:08x}, got {:08x}",
                stored_crc, computed_crc
            )));
        }

        let bundle: Self = rmp_serde::from_slice(payload)?;
        if bundle.feature_names.len() != bundle.index.dimension()
            || bundle.feature_min.len() != bundle.feature_names.len()
            || bundle.feature_range.len() != bundle.feature_names.len()
            || bundle.index.len() != bundle.catalog.len()
        {
            return Err(Error::CorruptBundle(
                "index, catalog and scaling parameters disagree".to_string(),
            ));
        }
        resolve_features(&bundle.feature_names)
            .map_err(|e| Error::CorruptBundle(format!("feature names: {}", e)))?;
        if bundle
            .feature_min
            .iter()
            .chain(bundle.feature_range.iter())
            .any(|v| !v.is_finite())
            || bundle.feature_range.iter().any(|&r| r <= 0.0)
        {
            return Err(Error::CorruptBundle(
                "scaling parameters must be finite with positive ranges".to_string(),
            ));
        }
        bundle.index.validate()?;
        Ok(bundle)
    }

    /// Write the bundle to `path` via a temporary sibling file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, &data)?;
        std::fs::rename(&tmp, path)?;

        tracing::info!(
            path = %path.display(),
            rows = self.catalog.len(),
            bytes = data.len(),
            "Bundle saved"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let bundle = Self::from_bytes(&data)?;
        tracing::debug!(
            path = %path.display(),
            rows = bundle.catalog.len(),
            built_at = %bundle.built_at,
            "Bundle loaded"
        );
        Ok(bundle)
    }
}

/// Summary of one catalog build, written as pretty JSON
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildReport {
    pub built_at: DateTime<Utc>,
    pub files_indexed: usize,
    pub rows: usize,
    #[serde(default)]
    pub skipped: Vec<SkippedFile>,
}

impl BuildReport {
    pub fn new(files_indexed: usize, rows: usize, skipped: Vec<SkippedFile>) -> Self {
        Self {
            built_at: Utc::now(),
            files_indexed,
            rows,
            skipped,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
