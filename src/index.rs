//! Exact nearest-neighbour index over comment embeddings.
//!
//! A flat, brute-force index: vectors are stored contiguously and every
//! search scans all of them, ranking by squared Euclidean distance. Ids are
//! insertion positions, so entry `i` of the index lines up with entry `i` of
//! the comment lookup written next to it.
//!
//! # File format
//!
//! ```text
//! magic   "RVHIDX01"      8 bytes
//! dims    u32 LE
//! count   u64 LE
//! data    count * dims f32 LE
//! ```

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::embedding::{blob_to_vec, vec_to_blob};

const MAGIC: &[u8; 8] = b"RVHIDX01";
const HEADER_LEN: usize = 8 + 4 + 8;

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Insertion position of the matched vector.
    pub id: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dims: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            data: Vec::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.data.len() / self.dims
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors; ids continue from the current length.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if self.dims == 0 {
            bail!("Cannot add vectors to a zero-dimensional index");
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dims) {
            bail!(
                "Vector has {} dimensions, index expects {}",
                bad.len(),
                self.dims
            );
        }
        self.data.reserve(vectors.len() * self.dims);
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    fn vector(&self, id: usize) -> &[f32] {
        &self.data[id * self.dims..(id + 1) * self.dims]
    }

    /// The `k` nearest vectors, closest first.
    ///
    /// Equal distances keep insertion order. Asking for more than
    /// [`len`](Self::len) returns everything.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dims {
            bail!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dims
            );
        }

        let mut hits: Vec<Neighbor> = (0..self.len())
            .map(|id| Neighbor {
                id,
                distance: squared_l2(query, self.vector(id)),
            })
            .collect();

        // sort_by is stable, so ties stay in id order.
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&(self.dims as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&vec_to_blob(&self.data));

        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write index {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read index {}", path.display()))?;

        if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
            bail!("{} is not a comment index file", path.display());
        }
        let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[12..20]);
        let count = u64::from_le_bytes(count_bytes) as usize;

        let expected = count
            .checked_mul(dims)
            .and_then(|n| n.checked_mul(4))
            .context("Index header is corrupt")?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != expected {
            bail!(
                "Index {} is truncated: expected {} bytes of vectors, found {}",
                path.display(),
                expected,
                payload.len()
            );
        }

        Ok(Self {
            dims,
            data: blob_to_vec(payload),
        })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
