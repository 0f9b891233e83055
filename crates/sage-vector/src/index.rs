//! Flat vector index with exact cosine search.
//!
//! Entries live in a single table guarded by a `parking_lot::RwLock`; ids
//! come from an atomic counter so concurrent inserts from multiple
//! conversations never collide.

use crate::distance::cosine_similarity;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Monotonically increasing handle assigned to each embedding on insertion.
pub type VectorId = u64;

/// How many entries the scan visits between cancellation checks.
const CANCEL_CHECK_STRIDE: usize = 256;

/// A single nearest-neighbor match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Id of the matched vector.
    pub id: VectorId,
    /// Cosine similarity to the query (higher = more similar).
    pub score: f32,
}

/// Shared flag used to abort an in-flight scan.
///
/// Clone one side into the blocking task running the scan and keep the other
/// with the request; calling [`CancelFlag::cancel`] (typically from a drop
/// guard) makes the scan return [`Error::Cancelled`] within one stride.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of any scan holding a clone of this flag.
    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

struct Entry {
    id: VectorId,
    vector: Vec<f32>,
}

/// Thread-safe flat index over fixed-dimension vectors.
///
/// The dimension is fixed per instance; inserts and queries of any other
/// length are rejected with [`Error::DimensionMismatch`].
pub struct FlatIndex {
    entries: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
    dimension: usize,
}

impl FlatIndex {
    /// Create an empty index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidVector("Dimension must be > 0".to_string()));
        }
        Ok(Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            dimension,
        })
    }

    /// Rebuild an index from durable rows.
    ///
    /// Rows whose stored dimension differs from `dimension` are skipped with
    /// a logged warning instead of failing the whole load, but their ids stay
    /// consumed: the counter resumes at `max(all ids) + 1` so a later re-save
    /// cannot collide with a skipped row.
    pub fn restore<I>(dimension: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (VectorId, Vec<f32>)>,
    {
        let index = Self::new(dimension)?;
        let mut max_id: Option<VectorId> = None;
        let mut loaded = 0usize;

        {
            let mut entries = index.entries.write();
            for (id, vector) in rows {
                max_id = Some(max_id.map_or(id, |m| m.max(id)));
                if vector.len() != dimension {
                    warn!(
                        id,
                        expected = dimension,
                        actual = vector.len(),
                        "Skipping stored vector with mismatched dimension"
                    );
                    continue;
                }
                entries.push(Entry { id, vector });
                loaded += 1;
            }
        }

        if let Some(max) = max_id {
            index.next_id.store(max + 1, AtomicOrdering::SeqCst);
        }

        trace!(loaded, next_id = index.next_id.load(AtomicOrdering::SeqCst), "Restored index");
        Ok(index)
    }

    /// The fixed vector dimension of this index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Insert a vector, returning its assigned id.
    ///
    /// Ids are sequential across the index's lifetime, including after
    /// [`FlatIndex::restore`].
    pub fn add(&self, vector: &[f32]) -> Result<VectorId> {
        self.validate(vector)?;
        if vector.iter().any(|v| v.is_nan() || v.is_infinite()) {
            return Err(Error::InvalidVector(
                "Vector contains NaN or Inf".to_string(),
            ));
        }

        let mut entries = self.entries.write();
        let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        entries.push(Entry {
            id,
            vector: vector.to_vec(),
        });
        trace!(id, "Inserted vector");
        Ok(id)
    }

    /// Search for the `top_k` nearest entries by cosine similarity.
    ///
    /// Returns fewer than `top_k` hits if the index holds fewer entries, and
    /// an empty vec on an empty index. Ties are broken by insertion order
    /// (lower id first) for determinism.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Hit>> {
        self.scan(query, top_k, None)
    }

    /// Like [`FlatIndex::search`], aborting promptly once `cancel` is set.
    pub fn search_with_cancel(
        &self,
        query: &[f32],
        top_k: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<Hit>> {
        self.scan(query, top_k, Some(cancel))
    }

    /// Remove all entries and reset the id counter to zero.
    ///
    /// Durable storage is unaffected unless the caller persists the reset.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.next_id.store(0, AtomicOrdering::SeqCst);
    }

    fn scan(&self, query: &[f32], top_k: usize, cancel: Option<&CancelFlag>) -> Result<Vec<Hit>> {
        self.validate(query)?;

        let entries = self.entries.read();
        let mut hits = Vec::with_capacity(entries.len());
        for (visited, entry) in entries.iter().enumerate() {
            if visited % CANCEL_CHECK_STRIDE == 0 {
                if let Some(flag) = cancel {
                    if flag.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                }
            }
            hits.push(Hit {
                id: entry.id,
                score: cosine_similarity(query, &entry.vector),
            });
        }
        drop(entries);

        hits.sort_unstable_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    fn validate(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}
