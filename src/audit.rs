use rust_decimal::Decimal;
use serde::Serialize;

use crate::pipeline::normalize::NormalizeCounts;

/// Mutable run-scoped counter accumulator. Owned by the orchestrator and
/// threaded explicitly through the stages; each stage returns its counts
/// and the caller absorbs them here.
#[derive(Debug, Default, Clone)]
pub struct Audit {
    pub files_read: usize,
    pub rows_imported: usize,
    pub rows_after_filter: usize,
    pub invalid_dates_dropped: usize,
    pub negative_quantity_fixed: usize,
    pub negative_price_fixed: usize,
    pub duplicates_removed: usize,
    pub p90_revenue: Decimal,
    pub rows_persisted: usize,
}

impl Audit {
    pub fn absorb_normalize(&mut self, counts: &NormalizeCounts) {
        self.invalid_dates_dropped += counts.invalid_dates_dropped;
        self.negative_quantity_fixed += counts.negative_quantity_fixed;
        self.negative_price_fixed += counts.negative_price_fixed;
    }

    pub fn snapshot(&self) -> AuditSnapshot {
        AuditSnapshot {
            files_read: self.files_read,
            rows_imported: self.rows_imported,
            rows_after_filter: self.rows_after_filter,
            invalid_dates_dropped: self.invalid_dates_dropped,
            negative_quantity_fixed: self.negative_quantity_fixed,
            negative_price_fixed: self.negative_price_fixed,
            duplicates_removed: self.duplicates_removed,
            p90_revenue: self.p90_revenue,
            rows_persisted: self.rows_persisted,
        }
    }

    pub fn finalize(self) -> AuditSnapshot {
        self.snapshot()
    }
}

/// Immutable audit record for one completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditSnapshot {
    pub files_read: usize,
    pub rows_imported: usize,
    pub rows_after_filter: usize,
    pub invalid_dates_dropped: usize,
    pub negative_quantity_fixed: usize,
    pub negative_price_fixed: usize,
    pub duplicates_removed: usize,
    pub p90_revenue: Decimal,
    pub rows_persisted: usize,
}
