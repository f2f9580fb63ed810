//! Exact inner-product nearest-neighbour index over a fixed dimension.
//!
//! Vectors are stored row-major in one contiguous buffer. Search is a full
//! scan; ties are broken by ascending row id so results are reproducible.
//!
//! The binary form is `LDBFIP01 | u32 dim | u64 rows | rows*dim f32 | blake3(prefix)`,
//! all little-endian, and round-trips bit-exactly.
use std::fs;
use std::path::Path;

use tracing::debug;

use litdb_core::types::DocId;
use litdb_core::{Error, Result};

pub const MAGIC: &[u8; 8] = b"LDBFIP01";
const HEADER_LEN: usize = 8 + 4 + 8;
const CHECKSUM_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    /// Build from one vector per document; row `i` is document `i`.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let first = vectors.first().ok_or(Error::EmptyCorpus)?;
        let dim = first.len();
        if dim == 0 {
            return Err(Error::InvalidArgument("vectors must have at least one component".into()));
        }
        let mut data = Vec::with_capacity(dim * vectors.len());
        for v in vectors {
            if v.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, actual: v.len() });
            }
            data.extend_from_slice(v);
        }
        debug!(rows = vectors.len(), dim, "built flat inner-product index");
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn len(&self) -> usize { self.data.len() / self.dim }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    pub fn row(&self, id: DocId) -> Option<&[f32]> {
        self.data.chunks_exact(self.dim).nth(id)
    }

    /// Top `k` rows by inner product with `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(DocId, f32)>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        let mut hits: Vec<(DocId, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(id, row)| (id, row.iter().zip(query).map(|(a, b)| a * b).sum()))
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4 + CHECKSUM_LEN);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.dim as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for x in &self.data {
            out.extend_from_slice(&x.to_le_bytes());
        }
        let checksum = blake3::hash(&out);
        out.extend_from_slice(checksum.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(corrupt("vector blob is truncated"));
        }
        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if blake3::hash(body).as_bytes() != checksum {
            return Err(corrupt("vector blob checksum mismatch"));
        }
        if &body[..8] != MAGIC {
            return Err(corrupt("vector blob has unknown magic"));
        }
        let dim = u32::from_le_bytes(fixed(&body[8..12])?) as usize;
        let rows = u64::from_le_bytes(fixed(&body[12..20])?) as usize;
        let payload = &body[HEADER_LEN..];
        let expected = rows.checked_mul(dim).and_then(|n| n.checked_mul(4));
        if dim == 0 || rows == 0 || expected != Some(payload.len()) {
            return Err(corrupt(format!("vector blob declares {rows}x{dim} but carries {} bytes", payload.len())));
        }
        let data = payload
            .chunks_exact(4)
            .map(|c| fixed(c).map(f32::from_le_bytes))
            .collect::<Result<Vec<f32>>>()?;
        Ok(Self { dim, data })
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes())?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| corrupt(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&bytes)
    }
}

fn fixed<const N: usize>(slice: &[u8]) -> Result<[u8; N]> {
    slice.try_into().map_err(|_| corrupt("vector blob field has wrong width"))
}

fn corrupt(msg: impl Into<String>) -> Error {
    Error::SnapshotCorrupt(msg.into())
}
