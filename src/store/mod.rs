use crate::domain::CanonicalRecord;
use crate::error::Result;
use serde::Deserialize;

mod sqlite;

pub use sqlite::SqliteStore;

/// How a finalized batch is applied to the durable store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Insert all records; a duplicate-key violation fails the batch.
    Append,
    /// Irreversibly clear the store, then append.
    Truncate,
    /// Stage the batch and update-if-matched-else-insert by natural key.
    #[default]
    Merge,
}

/// Seam between the pipeline and durable storage. One batch per run; the
/// whole batch applies atomically or not at all.
pub trait PersistenceGateway {
    /// Applies the batch under the given load mode and returns the number
    /// of rows handed to the store. Any failure rolls the batch back
    /// entirely before surfacing.
    fn persist(&mut self, batch: &[CanonicalRecord], mode: LoadMode) -> Result<usize>;

    /// Reads back every persisted canonical record in natural-key order.
    fn fetch_all(&self) -> Result<Vec<CanonicalRecord>>;
}
