use crate::domain::{CanonicalRecord, RawRow};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

/// Date formats tried in order when parsing the `date` column.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Counts emitted by one normalization pass, absorbed into the run audit
/// by the caller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeCounts {
    pub invalid_dates_dropped: usize,
    pub negative_quantity_fixed: usize,
    pub negative_price_fixed: usize,
}

/// Coerces raw rows into canonical records. Rows whose date fails every
/// tried format are dropped and counted; negative quantity/unit price are
/// clamped to zero and counted; revenue is derived as quantity × unit
/// price whenever the source cell was absent or non-numeric.
pub fn normalize(rows: Vec<RawRow>) -> (Vec<CanonicalRecord>, NormalizeCounts) {
    let mut counts = NormalizeCounts::default();
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        let date = match row.get("date").and_then(parse_date) {
            Some(date) => date,
            None => {
                counts.invalid_dates_dropped += 1;
                debug!(date = ?row.get("date"), "Dropping row with unparseable date");
                continue;
            }
        };

        let mut quantity = row.get("quantity").and_then(parse_quantity);
        let mut unit_price = row.get("unit_price").and_then(parse_decimal);
        let source_revenue = row.get("revenue").and_then(parse_decimal);

        // Clamping only applies to rows that survived the date check.
        if matches!(quantity, Some(q) if q < 0) {
            quantity = Some(0);
            counts.negative_quantity_fixed += 1;
        }
        if matches!(unit_price, Some(p) if p < Decimal::ZERO) {
            unit_price = Some(Decimal::ZERO);
            counts.negative_price_fixed += 1;
        }

        let quantity = quantity.unwrap_or(0);
        let unit_price = unit_price.unwrap_or(Decimal::ZERO);
        let revenue =
            source_revenue.unwrap_or_else(|| Decimal::from(quantity) * unit_price);

        records.push(CanonicalRecord {
            date,
            customer_id: trimmed(row.get("customer_id")),
            provider: trimmed(row.get("provider")),
            procedure: trimmed(row.get("procedure")),
            category: trimmed(row.get("category")),
            region: row
                .get("region")
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            quantity,
            unit_price,
            revenue,
        });
    }

    (records, counts)
}

fn trimmed(value: Option<&str>) -> String {
    value.unwrap_or("").trim().to_string()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Numeric parse tolerating a decimal comma; anything else is absent.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan") {
        return None;
    }
    Decimal::from_str(&raw.replace(',', ".")).ok()
}

/// Quantities may arrive as decimals ("3.0"); truncate toward zero.
fn parse_quantity(raw: &str) -> Option<i64> {
    parse_decimal(raw).and_then(|d| d.trunc().to_i64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, &str)]) -> RawRow {
        RawRow::new(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn full_row(date: &str, quantity: &str, price: &str, revenue: &str) -> RawRow {
        row(&[
            ("date", date),
            ("customer_id", "C1"),
            ("provider", "Clinic A"),
            ("procedure", "ProcA"),
            ("category", "AMB"),
            ("region", "SP"),
            ("quantity", quantity),
            ("unit_price", price),
            ("revenue", revenue),
        ])
    }

    #[test]
    fn test_invalid_calendar_date_dropped() {
        let (records, counts) = normalize(vec![full_row("31/02/2024", "1", "10", "")]);
        assert!(records.is_empty());
        assert_eq!(counts.invalid_dates_dropped, 1);
    }

    #[test]
    fn test_unparseable_date_dropped_once_per_row() {
        let (records, counts) = normalize(vec![
            full_row("not-a-date", "1", "10", ""),
            full_row("", "1", "10", ""),
            full_row("2024-01-05", "1", "10", ""),
        ]);
        assert_eq!(records.len(), 1);
        assert_eq!(counts.invalid_dates_dropped, 2);
    }

    #[test]
    fn test_alternate_date_formats() {
        let (records, _) = normalize(vec![
            full_row("05/01/2024", "1", "10", ""),
            full_row("2024/01/05", "1", "10", ""),
        ]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, records[1].date);
    }

    #[test]
    fn test_negative_quantity_clamped_and_counted() {
        let (records, counts) = normalize(vec![full_row("2024-01-05", "-5", "10", "")]);
        assert_eq!(records[0].quantity, 0);
        assert_eq!(counts.negative_quantity_fixed, 1);
        assert_eq!(counts.negative_price_fixed, 0);
    }

    #[test]
    fn test_negative_price_clamped_and_counted() {
        let (records, counts) = normalize(vec![full_row("2024-01-05", "2", "-3.50", "")]);
        assert_eq!(records[0].unit_price, Decimal::ZERO);
        assert_eq!(counts.negative_price_fixed, 1);
    }

    #[test]
    fn test_clamp_not_counted_for_dropped_rows() {
        let (_, counts) = normalize(vec![full_row("bogus", "-5", "-1", "")]);
        assert_eq!(counts.invalid_dates_dropped, 1);
        assert_eq!(counts.negative_quantity_fixed, 0);
        assert_eq!(counts.negative_price_fixed, 0);
    }

    #[test]
    fn test_revenue_derived_when_absent() {
        let (records, _) = normalize(vec![full_row("2024-01-05", "3", "10", "")]);
        assert_eq!(records[0].revenue, Decimal::from(30));
    }

    #[test]
    fn test_source_revenue_preserved() {
        let (records, _) = normalize(vec![full_row("2024-01-05", "3", "10", "99.90")]);
        assert_eq!(records[0].revenue, Decimal::from_str("99.90").unwrap());
    }

    #[test]
    fn test_decimal_comma_tolerated() {
        let (records, _) = normalize(vec![full_row("2024-01-05", "2", "10,50", "")]);
        assert_eq!(records[0].unit_price, Decimal::from_str("10.50").unwrap());
        assert_eq!(records[0].revenue, Decimal::from_str("21.00").unwrap());
    }

    #[test]
    fn test_non_numeric_fields_become_zero() {
        let (records, counts) = normalize(vec![full_row("2024-01-05", "abc", "xyz", "")]);
        assert_eq!(records[0].quantity, 0);
        assert_eq!(records[0].unit_price, Decimal::ZERO);
        assert_eq!(records[0].revenue, Decimal::ZERO);
        assert_eq!(counts.negative_quantity_fixed, 0);
    }

    #[test]
    fn test_missing_columns_materialized_as_absent() {
        let (records, _) = normalize(vec![row(&[("date", "2024-01-05")])]);
        let record = &records[0];
        assert_eq!(record.customer_id, "");
        assert_eq!(record.provider, "");
        assert_eq!(record.region, None);
        assert_eq!(record.quantity, 0);
        assert_eq!(record.revenue, Decimal::ZERO);
    }

    #[test]
    fn test_string_fields_trimmed() {
        let (records, _) = normalize(vec![row(&[
            ("date", "2024-01-05"),
            (" provider ", "  Clinic A  "),
            ("region", "   "),
        ])]);
        assert_eq!(records[0].provider, "Clinic A");
        assert_eq!(records[0].region, None);
    }

    #[test]
    fn test_outputs_never_negative() {
        let rows = vec![
            full_row("2024-01-05", "-5", "-1", ""),
            full_row("2024-01-06", "2", "3", "-4"),
            full_row("2024-01-07", "0", "0", ""),
        ];
        let (records, _) = normalize(rows);
        for record in &records {
            assert!(record.quantity >= 0);
            assert!(record.unit_price >= Decimal::ZERO);
        }
    }
}
