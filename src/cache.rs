//! Content-addressed store for expensive fitted models.
//!
//! An entry is keyed by the model kind, a digest of its configuration and
//! the fingerprint of the training data. Any change to either digest is a
//! different key, so a stale model is never returned for new data. Storing
//! a fresh entry removes older entries of the same kind and configuration
//! that were fitted on other data.

use ring::digest;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Bumped whenever the envelope or a cached payload changes shape.
pub const FORMAT_VERSION: u32 = 1;

/// Bytes of each digest spelled out in entry file names.
const PREFIX_BYTES: usize = 8;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut ctx = digest::Context::new(&digest::SHA256);
    for part in parts {
        ctx.update(&(part.len() as u64).to_le_bytes());
        ctx.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(ctx.finish().as_ref());
    out
}

/// Identity of a cached model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    kind: String,
    config: [u8; 32],
    data: [u8; 32],
}

impl CacheKey {
    /// `kind` names the model family; `config` is hashed through its
    /// bincode encoding; `fingerprint` identifies the training data
    /// (see [`TimeSeries::fingerprint`](crate::core::TimeSeries::fingerprint)).
    pub fn new<C: Serialize>(kind: &str, config: &C, fingerprint: [u8; 32]) -> Result<Self, CacheError> {
        let encoded = bincode::serialize(config)?;
        Ok(Self {
            kind: slug(kind),
            config: sha256(&[kind.as_bytes(), &encoded]),
            data: fingerprint,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// SHA-256 over kind, configuration digest and data fingerprint.
    pub fn digest(&self) -> [u8; 32] {
        sha256(&[self.kind.as_bytes(), &self.config, &self.data])
    }

    /// `<kind>-<config prefix>-<data prefix>.bin`
    pub fn file_name(&self) -> String {
        format!("{}{}.bin", self.family_prefix(), hex(&self.data[..PREFIX_BYTES]))
    }

    /// File-name prefix shared by every entry of this kind and configuration.
    fn family_prefix(&self) -> String {
        format!("{}-{}-", self.kind, hex(&self.config[..PREFIX_BYTES]))
    }
}

/// Lower-case ASCII alphanumerics, everything else collapsed to `_`.
pub fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut gap = false;
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            if gap && !out.is_empty() {
                out.push('_');
            }
            gap = false;
            out.push(c.to_ascii_lowercase());
        } else {
            gap = true;
        }
    }
    out
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    format_version: u32,
    key: CacheKey,
    payload: Vec<u8>,
}

/// Directory of cached models.
#[derive(Debug, Clone)]
pub struct ModelCache {
    dir: PathBuf,
}

impl ModelCache {
    /// Open (creating if needed) the cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Cached value for `key`. A miss, an entry from another format
    /// version or a corrupt entry is `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path)(e)),
        };
        let envelope: CacheEnvelope = match bincode::deserialize(&bytes) {
            Ok(env) => env,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt cache entry ignored");
                return Ok(None);
            }
        };
        if envelope.format_version != FORMAT_VERSION || envelope.key != *key {
            warn!(
                path = %path.display(),
                version = envelope.format_version,
                "cache entry does not match its key, ignored"
            );
            return Ok(None);
        }
        match bincode::deserialize(&envelope.payload) {
            Ok(value) => {
                debug!(path = %path.display(), "cache hit");
                Ok(Some(value))
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "undecodable cache payload ignored");
                Ok(None)
            }
        }
    }

    /// Write `value` under `key` through a temporary file and a rename,
    /// then drop entries of the same kind and configuration fitted on
    /// other data.
    pub fn store<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<PathBuf, CacheError> {
        let envelope = CacheEnvelope {
            format_version: FORMAT_VERSION,
            key: key.clone(),
            payload: bincode::serialize(value)?,
        };
        let bytes = bincode::serialize(&envelope)?;

        let path = self.path_for(key);
        let tmp = path.with_extension("bin.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(io_err(&tmp))?;
            file.write_all(&bytes).map_err(io_err(&tmp))?;
            file.sync_all().map_err(io_err(&tmp))?;
        }
        fs::rename(&tmp, &path).map_err(io_err(&path))?;

        let removed = self.invalidate_stale(key)?;
        info!(path = %path.display(), removed, "model cached");
        Ok(path)
    }

    /// Remove entries sharing `key`'s kind and configuration but not its
    /// data fingerprint. Returns how many were removed.
    pub fn invalidate_stale(&self, key: &CacheKey) -> Result<usize, CacheError> {
        let prefix = key.family_prefix();
        let keep = key.file_name();
        let mut removed = 0;
        let entries = fs::read_dir(&self.dir).map_err(io_err(&self.dir))?;
        for entry in entries {
            let entry = entry.map_err(io_err(&self.dir))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(&prefix) && name.ends_with(".bin") && name != keep {
                let path = entry.path();
                fs::remove_file(&path).map_err(io_err(&path))?;
                debug!(path = %path.display(), "stale cache entry removed");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Cached value for `key`, or the result of `fit` (stored on success).
    pub fn get_or_fit<T, E, F>(&self, key: &CacheKey, fit: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.load(key)? {
            return Ok(value);
        }
        let value = fit()?;
        self.store(key, &value)?;
        Ok(value)
    }
}
