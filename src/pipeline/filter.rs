use crate::config::FilterConfig;
use crate::domain::CanonicalRecord;

/// Applies the inclusive period bounds and the region/category inclusion
/// sets. An empty inclusion set means no restriction. Runs after
/// normalization and before dedup.
pub fn apply(records: Vec<CanonicalRecord>, filter: &FilterConfig) -> Vec<CanonicalRecord> {
    records
        .into_iter()
        .filter(|record| {
            if let Some(start) = filter.period_start {
                if record.date < start {
                    return false;
                }
            }
            if let Some(end) = filter.period_end {
                if record.date > end {
                    return false;
                }
            }
            if !filter.region_include.is_empty() {
                match &record.region {
                    Some(region) if filter.region_include.iter().any(|r| r == region) => {}
                    _ => return false,
                }
            }
            if !filter.category_include.is_empty()
                && !filter.category_include.iter().any(|c| c == &record.category)
            {
                return false;
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn record(date: &str, region: Option<&str>, category: &str) -> CanonicalRecord {
        CanonicalRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            customer_id: "C1".to_string(),
            provider: "P".to_string(),
            procedure: "Proc".to_string(),
            category: category.to_string(),
            region: region.map(|r| r.to_string()),
            quantity: 1,
            unit_price: Decimal::from(10),
            revenue: Decimal::from(10),
        }
    }

    #[test]
    fn test_period_bounds_are_inclusive() {
        let filter = FilterConfig {
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1),
            period_end: NaiveDate::from_ymd_opt(2024, 1, 31),
            ..Default::default()
        };
        let records = vec![
            record("2023-12-31", None, "AMB"),
            record("2024-01-01", None, "AMB"),
            record("2024-01-31", None, "AMB"),
            record("2024-02-01", None, "AMB"),
        ];
        let kept = apply(records, &filter);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_empty_sets_mean_no_restriction() {
        let kept = apply(
            vec![record("2024-01-05", Some("SP"), "AMB")],
            &FilterConfig::default(),
        );
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_region_inclusion_excludes_absent_region() {
        let filter = FilterConfig {
            region_include: vec!["SP".to_string()],
            ..Default::default()
        };
        let records = vec![
            record("2024-01-05", Some("SP"), "AMB"),
            record("2024-01-05", Some("RJ"), "AMB"),
            record("2024-01-05", None, "AMB"),
        ];
        assert_eq!(apply(records, &filter).len(), 1);
    }

    #[test]
    fn test_category_inclusion() {
        let filter = FilterConfig {
            category_include: vec!["LAB".to_string()],
            ..Default::default()
        };
        let records = vec![
            record("2024-01-05", None, "AMB"),
            record("2024-01-05", None, "LAB"),
        ];
        let kept = apply(records, &filter);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].category, "LAB");
    }
}
