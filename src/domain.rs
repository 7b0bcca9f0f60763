use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One input line as read from a delimited source file, before any cleaning.
/// Header names are kept verbatim; lookups trim them so that ragged source
/// headers still resolve.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Look up a cell by canonical column name, trimming the stored header.
    /// Returns `None` when the column is absent entirely.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(header, _)| header.trim() == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Cleaned, typed representation of a single service event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub date: NaiveDate,
    pub customer_id: String,
    pub provider: String,
    pub procedure: String,
    pub category: String,
    pub region: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub revenue: Decimal,
}

impl CanonicalRecord {
    /// Uniqueness key identifying one service event, used for dedup and as
    /// the durable-store primary key.
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            date: self.date,
            customer_id: self.customer_id.clone(),
            procedure: self.procedure.clone(),
        }
    }

    /// Month bucket in `YYYY-MM` form, used by pivot and support tables.
    pub fn month(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub date: NaiveDate,
    pub customer_id: String,
    pub procedure: String,
}

/// Reference mapping of a customer identifier to its business segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionEntry {
    pub customer_id: String,
    pub segment: String,
}

/// Canonical record plus the dimension attribute and the outlier flag
/// computed over the analyzed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: CanonicalRecord,
    pub segment: Option<String>,
    pub outlier: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_row_lookup_trims_headers() {
        let row = RawRow::new(vec![
            ("  date ".to_string(), "2024-01-05".to_string()),
            ("customer_id".to_string(), " C1 ".to_string()),
        ]);
        assert_eq!(row.get("date"), Some("2024-01-05"));
        assert_eq!(row.get("customer_id"), Some(" C1 "));
        assert_eq!(row.get("provider"), None);
    }

    #[test]
    fn test_month_bucket() {
        let record = CanonicalRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            customer_id: "C1".to_string(),
            provider: "P".to_string(),
            procedure: "Proc".to_string(),
            category: "A".to_string(),
            region: None,
            quantity: 1,
            unit_price: Decimal::from(10),
            revenue: Decimal::from(10),
        };
        assert_eq!(record.month(), "2024-03");
    }
}
