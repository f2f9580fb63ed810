//! Generation-swapped snapshot persistence.
//!
//! ```text
//! <root>/ACTIVE                     name of the live generation
//! <root>/gen-00000007/vectors.bin   FlatIpIndex blob
//! <root>/gen-00000007/documents.json
//! ```
//! A build fills a fresh generation directory and only then replaces
//! `ACTIVE` by rename, so readers see the old snapshot or the new one.
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use litdb_core::types::{DocId, DocumentRecord};
use litdb_core::{Error, Result};
use litdb_vector::FlatIpIndex;

use crate::snapshot::{mapping_is_consistent, Snapshot};

pub const BUNDLE_VERSION: u32 = 1;
const ACTIVE_FILE: &str = "ACTIVE";
const GENERATION_PREFIX: &str = "gen-";
const VECTORS_FILE: &str = "vectors.bin";
const DOCUMENTS_FILE: &str = "documents.json";

#[derive(Serialize)]
struct BundleRef<'a> {
    version: u32,
    documents: &'a [DocumentRecord],
    doc_id_to_index: &'a BTreeMap<String, DocId>,
    vector_rows: usize,
    vector_checksum: String,
}

#[derive(Deserialize)]
struct Bundle {
    version: u32,
    documents: Vec<DocumentRecord>,
    doc_id_to_index: BTreeMap<String, DocId>,
    vector_rows: usize,
    vector_checksum: String,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

fn generation_name(generation: u64) -> String {
    format!("{GENERATION_PREFIX}{generation:08}")
}

fn parse_generation(name: &str) -> Option<u64> {
    name.strip_prefix(GENERATION_PREFIX)?.parse().ok()
}

/// Replace `dir/name` with `bytes` via a synced temp file and rename.
fn write_durable(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| e.error)?;
    Ok(())
}

/// Flush directory entries so renames inside `dir` survive a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

fn corrupt(msg: impl Into<String>) -> Error {
    Error::SnapshotCorrupt(msg.into())
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn generations(&self) -> Result<Vec<u64>> {
        if !self.root.is_dir() { return Ok(vec![]); }
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(generation) = entry.file_name().to_str().and_then(parse_generation) {
                out.push(generation);
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    /// Generation named by `ACTIVE`, if any snapshot has been published.
    pub fn active_generation(&self) -> Result<Option<u64>> {
        let path = self.root.join(ACTIVE_FILE);
        if !path.exists() { return Ok(None); }
        let name = fs::read_to_string(&path)?;
        parse_generation(name.trim())
            .map(Some)
            .ok_or_else(|| corrupt(format!("ACTIVE names '{}'", name.trim())))
    }

    /// Write a new generation and make it the live one. Returns its number.
    pub fn persist(
        &self,
        documents: &[DocumentRecord],
        doc_id_to_index: &BTreeMap<String, DocId>,
        vectors: &FlatIpIndex,
    ) -> Result<u64> {
        fs::create_dir_all(&self.root)?;
        let generation = self.generations()?.last().map_or(1, |g| g + 1);
        let dir = self.root.join(generation_name(generation));
        if dir.exists() { fs::remove_dir_all(&dir)?; }
        fs::create_dir(&dir)?;

        let blob = vectors.to_bytes();
        write_durable(&dir, VECTORS_FILE, &blob)?;
        let bundle = BundleRef {
            version: BUNDLE_VERSION,
            documents,
            doc_id_to_index,
            vector_rows: vectors.len(),
            vector_checksum: blake3::hash(&blob).to_hex().to_string(),
        };
        write_durable(&dir, DOCUMENTS_FILE, &serde_json::to_vec(&bundle)?)?;
        sync_dir(&dir)?;
        sync_dir(&self.root)?;

        write_durable(&self.root, ACTIVE_FILE, generation_name(generation).as_bytes())?;
        sync_dir(&self.root)?;
        info!(generation, docs = documents.len(), root = %self.root.display(), "snapshot published");

        self.prune(generation);
        Ok(generation)
    }

    fn prune(&self, keep: u64) {
        let generations = match self.generations() {
            Ok(g) => g,
            Err(e) => {
                warn!(error = %e, "cannot list snapshot generations");
                return;
            }
        };
        for generation in generations.into_iter().filter(|g| *g != keep) {
            let dir = self.root.join(generation_name(generation));
            match fs::remove_dir_all(&dir) {
                Ok(()) => debug!(generation, "pruned old snapshot"),
                Err(e) => warn!(dir = %dir.display(), error = %e, "failed to prune old snapshot"),
            }
        }
    }

    /// Read and validate the live snapshot; `Ok(None)` when nothing was published.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let Some(generation) = self.active_generation()? else { return Ok(None) };
        let dir = self.root.join(generation_name(generation));
        let blob = fs::read(dir.join(VECTORS_FILE))
            .map_err(|e| corrupt(format!("{}: {e}", dir.join(VECTORS_FILE).display())))?;
        let raw = fs::read(dir.join(DOCUMENTS_FILE))
            .map_err(|e| corrupt(format!("{}: {e}", dir.join(DOCUMENTS_FILE).display())))?;
        let bundle: Bundle = serde_json::from_slice(&raw).map_err(|e| corrupt(format!("documents bundle: {e}")))?;

        if bundle.version != BUNDLE_VERSION {
            return Err(corrupt(format!("bundle version {} is not {BUNDLE_VERSION}", bundle.version)));
        }
        if blake3::hash(&blob).to_hex().as_str() != bundle.vector_checksum {
            return Err(corrupt("vector blob does not match the bundle checksum"));
        }
        let vectors = FlatIpIndex::from_bytes(&blob)?;
        if vectors.len() != bundle.documents.len() || bundle.vector_rows != vectors.len() {
            return Err(corrupt(format!(
                "{} vector rows for {} documents", vectors.len(), bundle.documents.len()
            )));
        }
        if !mapping_is_consistent(&bundle.documents, &bundle.doc_id_to_index) {
            return Err(corrupt("doc_id_to_index is not a bijection onto the documents"));
        }
        debug!(generation, docs = bundle.documents.len(), "snapshot read");
        Snapshot::assemble(generation, bundle.documents, bundle.doc_id_to_index, vectors).map(Some)
    }
}
