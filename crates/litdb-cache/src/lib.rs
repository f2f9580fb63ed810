//! Content-addressed answer cache with time-based expiry.
//!
//! Each entry lives in its own `<key>.json` file, so reads and writes of
//! different keys never contend. Entries are replaced with a temp-file rename.
//! Every storage failure is logged and swallowed: a broken cache behaves like
//! an empty one.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use litdb_core::{Error, Result};

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

pub const CACHE_EXPIRY_HOURS: i64 = 24;
const KEY_SEPARATOR: u8 = 0x1f;
const ENTRY_EXT: &str = "json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub query: String,
    pub result: Value,
    pub timestamp: DateTime<Utc>,
    pub filters: Value,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Trim and collapse internal whitespace runs to a single space.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, canonicalize(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Digest of the normalized query and the canonical JSON form of `filters`.
pub fn cache_key<F: Serialize + ?Sized>(query: &str, filters: &F) -> Result<String> {
    let filters = canonicalize(serde_json::to_value(filters)?);
    let mut hasher = blake3::Hasher::new();
    hasher.update(normalize_query(query).as_bytes());
    hasher.update(&[KEY_SEPARATOR]);
    hasher.update(serde_json::to_string(&filters)?.as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

pub struct AnswerCache {
    dir: Option<PathBuf>,
    expiry: Duration,
    clock: Arc<dyn Clock>,
}

impl AnswerCache {
    /// Open a cache rooted at `dir`; `enabled == false` yields a pass-through.
    pub fn open(dir: impl Into<PathBuf>, enabled: bool) -> Result<Self> {
        if !enabled {
            info!("answer cache disabled");
            return Ok(Self::disabled());
        }
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| cache_io(&dir, e))?;
        Ok(Self { dir: Some(dir), expiry: Duration::hours(CACHE_EXPIRY_HOURS), clock: Arc::new(SystemClock) })
    }

    pub fn disabled() -> Self {
        Self { dir: None, expiry: Duration::hours(CACHE_EXPIRY_HOURS), clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_enabled(&self) -> bool { self.dir.is_some() }

    pub fn dir(&self) -> Option<&Path> { self.dir.as_deref() }

    fn entry_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{key}.{ENTRY_EXT}"))
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.clock.now() - entry.timestamp >= self.expiry
    }

    /// Cached result for `(query, filters)`, removing the entry if it has expired.
    pub fn get<T, F>(&self, query: &str, filters: &F) -> Option<T>
    where
        T: DeserializeOwned,
        F: Serialize + ?Sized,
    {
        let dir = self.dir.as_deref()?;
        let key = match cache_key(query, filters) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "cannot derive cache key");
                return None;
            }
        };
        let path = Self::entry_path(dir, &key);
        if !path.exists() {
            return None;
        }
        let entry = match read_entry(&path) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache entry");
                return None;
            }
        };
        if self.is_expired(&entry) {
            debug!(%key, "cache entry expired");
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove expired cache entry");
            }
            return None;
        }
        match serde_json::from_value(entry.result) {
            Ok(result) => {
                debug!(%key, "cache hit");
                Some(result)
            }
            Err(e) => {
                warn!(%key, error = %e, "cached result has unexpected shape");
                None
            }
        }
    }

    /// Store `result`, logging instead of failing when storage is unavailable.
    pub fn set<T, F>(&self, query: &str, result: &T, filters: &F)
    where
        T: Serialize + ?Sized,
        F: Serialize + ?Sized,
    {
        if let Err(e) = self.try_set(query, result, filters) {
            warn!(error = %e, "failed to write cache entry");
        }
    }

    pub fn try_set<T, F>(&self, query: &str, result: &T, filters: &F) -> Result<()>
    where
        T: Serialize + ?Sized,
        F: Serialize + ?Sized,
    {
        let Some(dir) = self.dir.as_deref() else { return Ok(()) };
        let key = cache_key(query, filters)?;
        let entry = CacheEntry {
            key: key.clone(),
            query: query.to_string(),
            result: serde_json::to_value(result)?,
            timestamp: self.clock.now(),
            filters: serde_json::to_value(filters)?,
        };
        let bytes = serde_json::to_vec(&entry)?;
        let path = Self::entry_path(dir, &key);
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| cache_io(dir, e))?;
        tmp.write_all(&bytes).map_err(|e| cache_io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| cache_io(&path, e.error))?;
        debug!(%key, "cache entry stored");
        Ok(())
    }

    /// Delete every expired entry; per-entry failures are counted, not fatal.
    pub fn clear_expired(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let Some(dir) = self.dir.as_deref() else { return report };
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot scan cache directory");
                report.failed += 1;
                return report;
            }
        };
        for dirent in entries {
            let path = match dirent {
                Ok(d) => d.path(),
                Err(e) => {
                    warn!(error = %e, "cannot read cache directory entry");
                    report.failed += 1;
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            report.scanned += 1;
            match read_entry(&path) {
                Ok(entry) if self.is_expired(&entry) => match fs::remove_file(&path) {
                    Ok(()) => report.removed += 1,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to remove expired cache entry");
                        report.failed += 1;
                    }
                },
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable cache entry");
                    report.failed += 1;
                }
            }
        }
        info!(scanned = report.scanned, removed = report.removed, failed = report.failed, "cache sweep finished");
        report
    }
}

fn read_entry(path: &Path) -> Result<CacheEntry> {
    let raw = fs::read(path).map_err(|e| cache_io(path, e))?;
    Ok(serde_json::from_slice(&raw)?)
}

fn cache_io(path: &Path, e: std::io::Error) -> Error {
    Error::CacheIo(format!("{}: {e}", path.display()))
}
