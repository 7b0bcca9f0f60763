use crate::domain::EnrichedRecord;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// How many providers/procedures the rankings keep.
pub const TOP_RANKED: usize = 20;

/// Flags every record whose revenue reaches the 90th percentile of the
/// analyzed set and returns that percentile. Empty input yields zero and
/// flags nothing.
pub fn apply_outlier_flag(records: &mut [EnrichedRecord]) -> Decimal {
    if records.is_empty() {
        return Decimal::ZERO;
    }
    let mut revenues: Vec<Decimal> = records.iter().map(|r| r.record.revenue).collect();
    revenues.sort();
    let p90 = interpolated_percentile(&revenues, 9);
    for record in records.iter_mut() {
        record.outlier = record.record.revenue >= p90;
    }
    p90
}

/// Linear-interpolation quantile over sorted values, at `tenths`/10.
/// Position is (n-1)·q; the fractional part interpolates between the two
/// neighboring order statistics.
fn interpolated_percentile(sorted: &[Decimal], tenths: u32) -> Decimal {
    let pos = (sorted.len() - 1) * tenths as usize;
    let lower = pos / 10;
    let rem = (pos % 10) as i64;
    let base = sorted[lower];
    if rem == 0 {
        base
    } else {
        base + (sorted[lower + 1] - base) * Decimal::new(rem, 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotColumn {
    pub category: String,
    pub provider: String,
}

/// Revenue summed by (month, category, provider), zero-filled so every
/// observed month carries every observed column.
#[derive(Debug, Clone)]
pub struct MonthlyPivot {
    pub months: Vec<String>,
    pub columns: Vec<PivotColumn>,
    pub cells: Vec<Vec<Decimal>>,
}

pub fn monthly_pivot(records: &[EnrichedRecord]) -> MonthlyPivot {
    let mut months: BTreeSet<String> = BTreeSet::new();
    let mut columns: BTreeSet<(String, String)> = BTreeSet::new();
    let mut sums: HashMap<(String, String, String), Decimal> = HashMap::new();

    for enriched in records {
        let record = &enriched.record;
        let month = record.month();
        months.insert(month.clone());
        columns.insert((record.category.clone(), record.provider.clone()));
        *sums
            .entry((month, record.category.clone(), record.provider.clone()))
            .or_insert(Decimal::ZERO) += record.revenue;
    }

    let months: Vec<String> = months.into_iter().collect();
    let columns: Vec<PivotColumn> = columns
        .into_iter()
        .map(|(category, provider)| PivotColumn { category, provider })
        .collect();

    let cells = months
        .iter()
        .map(|month| {
            columns
                .iter()
                .map(|col| {
                    sums.get(&(month.clone(), col.category.clone(), col.provider.clone()))
                        .copied()
                        .unwrap_or(Decimal::ZERO)
                })
                .collect()
        })
        .collect();

    MonthlyPivot { months, columns, cells }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingEntry {
    pub name: String,
    pub revenue: Decimal,
}

/// Top providers by total revenue, descending; ties keep first-encounter
/// order.
pub fn top_providers(records: &[EnrichedRecord], limit: usize) -> Vec<RankingEntry> {
    top_by(records, limit, |r| r.record.provider.as_str())
}

/// Top procedures by total revenue, descending; ties keep first-encounter
/// order.
pub fn top_procedures(records: &[EnrichedRecord], limit: usize) -> Vec<RankingEntry> {
    top_by(records, limit, |r| r.record.procedure.as_str())
}

fn top_by<'a, F>(records: &'a [EnrichedRecord], limit: usize, key: F) -> Vec<RankingEntry>
where
    F: Fn(&'a EnrichedRecord) -> &'a str,
{
    let mut entries: Vec<RankingEntry> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let name = key(record);
        match index.get(name) {
            Some(&i) => entries[i].revenue += record.record.revenue,
            None => {
                index.insert(name, entries.len());
                entries.push(RankingEntry {
                    name: name.to_string(),
                    revenue: record.record.revenue,
                });
            }
        }
    }

    // Stable sort keeps first-encounter order among revenue ties.
    entries.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    entries.truncate(limit);
    entries
}

#[derive(Debug, Clone)]
pub struct SupportRow {
    pub month: String,
    pub total: Decimal,
    pub customers: Vec<Decimal>,
}

/// Per-month totals plus the top-N customer–segment combinations by total
/// revenue. Feeds the report collaborator only; never persisted.
#[derive(Debug, Clone)]
pub struct SupportTable {
    pub customer_columns: Vec<String>,
    pub rows: Vec<SupportRow>,
}

pub fn support_table(records: &[EnrichedRecord], top_n: usize) -> SupportTable {
    let mut month_totals: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut combo_totals: Vec<(String, Decimal)> = Vec::new();
    let mut combo_index: HashMap<String, usize> = HashMap::new();
    let mut cell_sums: HashMap<(String, String), Decimal> = HashMap::new();

    for enriched in records {
        let record = &enriched.record;
        let month = record.month();
        let combo = format!(
            "{} – {}",
            record.customer_id,
            enriched.segment.as_deref().unwrap_or("N/A")
        );

        *month_totals.entry(month.clone()).or_insert(Decimal::ZERO) += record.revenue;
        match combo_index.get(&combo) {
            Some(&i) => combo_totals[i].1 += record.revenue,
            None => {
                combo_index.insert(combo.clone(), combo_totals.len());
                combo_totals.push((combo.clone(), record.revenue));
            }
        }
        *cell_sums.entry((month, combo)).or_insert(Decimal::ZERO) += record.revenue;
    }

    combo_totals.sort_by(|a, b| b.1.cmp(&a.1));
    combo_totals.truncate(top_n);
    let customer_columns: Vec<String> = combo_totals.into_iter().map(|(name, _)| name).collect();

    let rows = month_totals
        .into_iter()
        .map(|(month, total)| {
            let customers = customer_columns
                .iter()
                .map(|combo| {
                    cell_sums
                        .get(&(month.clone(), combo.clone()))
                        .copied()
                        .unwrap_or(Decimal::ZERO)
                })
                .collect();
            SupportRow { month, total, customers }
        })
        .collect();

    SupportTable { customer_columns, rows }
}
