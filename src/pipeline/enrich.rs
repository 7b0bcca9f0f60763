use crate::domain::{CanonicalRecord, DimensionEntry, EnrichedRecord};
use crate::error::Result;
use crate::ingest;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Loads the customer→segment dimension file through the same reader
/// machinery as the fact sources. A missing file yields an empty
/// dimension, not an error.
pub fn load_dimension(path: &Path) -> Result<Vec<DimensionEntry>> {
    if !path.exists() {
        warn!(file = %path.display(), "Dimension file missing; records will carry no segment");
        return Ok(Vec::new());
    }
    let (rows, file_info) = ingest::read_file(path)?;
    info!(rows = file_info.rows, "Loaded customer dimension");

    let entries = rows
        .iter()
        .filter_map(|row| {
            let customer_id = row.get("customer_id")?.trim().to_string();
            if customer_id.is_empty() {
                return None;
            }
            let segment = row.get("segment").unwrap_or("").trim().to_string();
            Some(DimensionEntry { customer_id, segment })
        })
        .collect();
    Ok(entries)
}

/// Left-joins canonical records with the dimension on trimmed customer id.
/// Unmatched customers keep `segment = None` and are never dropped. When
/// the dimension carries the same customer id more than once, the first
/// occurrence in file order wins.
pub fn join(records: Vec<CanonicalRecord>, dimension: &[DimensionEntry]) -> Vec<EnrichedRecord> {
    let mut segments: HashMap<&str, &str> = HashMap::new();
    for entry in dimension {
        segments
            .entry(entry.customer_id.trim())
            .or_insert(entry.segment.as_str());
    }

    records
        .into_iter()
        .map(|record| {
            let segment = segments
                .get(record.customer_id.trim())
                .map(|s| s.to_string());
            EnrichedRecord {
                record,
                segment,
                outlier: false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::fs;

    fn record(customer: &str) -> CanonicalRecord {
        CanonicalRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            customer_id: customer.to_string(),
            provider: "P".to_string(),
            procedure: "Proc".to_string(),
            category: "AMB".to_string(),
            region: None,
            quantity: 1,
            unit_price: Decimal::from(10),
            revenue: Decimal::from(10),
        }
    }

    fn dim(customer: &str, segment: &str) -> DimensionEntry {
        DimensionEntry {
            customer_id: customer.to_string(),
            segment: segment.to_string(),
        }
    }

    #[test]
    fn test_left_join_keeps_unmatched() {
        let enriched = join(
            vec![record("C1"), record("C2")],
            &[dim("C1", "Premium")],
        );
        assert_eq!(enriched[0].segment.as_deref(), Some("Premium"));
        assert_eq!(enriched[1].segment, None);
        assert_eq!(enriched.len(), 2);
    }

    #[test]
    fn test_join_trims_both_sides() {
        let enriched = join(vec![record(" C1 ")], &[dim("C1 ", "Premium")]);
        assert_eq!(enriched[0].segment.as_deref(), Some("Premium"));
    }

    #[test]
    fn test_duplicate_dimension_key_first_match_wins() {
        let enriched = join(
            vec![record("C1")],
            &[dim("C1", "First"), dim("C1", "Second")],
        );
        assert_eq!(enriched[0].segment.as_deref(), Some("First"));
    }

    #[test]
    fn test_load_dimension_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = load_dimension(&dir.path().join("nope.csv")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_load_dimension_skips_blank_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dim.csv");
        fs::write(&path, "customer_id,segment\nC1,Premium\n  ,Orphan\nC2,Basic\n").unwrap();
        let entries = load_dimension(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].customer_id, "C1");
        assert_eq!(entries[1].segment, "Basic");
    }
}
