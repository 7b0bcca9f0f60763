use crate::audit::AuditSnapshot;
use crate::domain::{DimensionEntry, EnrichedRecord};
use crate::error::Result;
use crate::pipeline::analytics::{MonthlyPivot, RankingEntry, SupportTable};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Structured tabular data handed to the external report collaborator.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Everything one run hands off for report rendering.
#[derive(Debug, Clone)]
pub struct ReportBundle {
    pub records: Table,
    pub dimension: Table,
    pub monthly_pivot: Table,
    pub top_providers: Table,
    pub top_procedures: Table,
    pub support: Table,
    pub audit: AuditSnapshot,
}

/// Seam to the external report collaborator. The pipeline only depends on
/// this trait, never on the sink's resource lifetime.
pub trait ReportSink {
    fn write_table(&mut self, table: &Table) -> Result<()>;
    fn write_audit(&mut self, audit: &AuditSnapshot) -> Result<()>;
    /// Called exactly once per delivery, on every exit path.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Delivers a bundle as one scoped operation; `finish` runs whether or not
/// the writes succeeded.
pub fn deliver<S: ReportSink>(sink: &mut S, bundle: &ReportBundle) -> Result<()> {
    let written = write_bundle(sink, bundle);
    let finished = sink.finish();
    written.and(finished)
}

fn write_bundle<S: ReportSink>(sink: &mut S, bundle: &ReportBundle) -> Result<()> {
    sink.write_table(&bundle.records)?;
    sink.write_table(&bundle.dimension)?;
    sink.write_table(&bundle.monthly_pivot)?;
    sink.write_table(&bundle.top_providers)?;
    sink.write_table(&bundle.top_procedures)?;
    sink.write_table(&bundle.support)?;
    sink.write_audit(&bundle.audit)
}

/// File-based sink writing one CSV artifact per table plus a JSON audit
/// snapshot under the output directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf() })
    }
}

impl ReportSink for DirectorySink {
    fn write_table(&mut self, table: &Table) -> Result<()> {
        let path = self.dir.join(format!("{}.csv", table.name));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(&table.columns)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_audit(&mut self, audit: &AuditSnapshot) -> Result<()> {
        let path = self.dir.join("audit.json");
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, audit)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!(dir = %self.dir.display(), "Report artifacts delivered");
        Ok(())
    }
}

pub fn records_table(records: &[EnrichedRecord]) -> Table {
    Table {
        name: "records".to_string(),
        columns: [
            "date",
            "customer_id",
            "provider",
            "procedure",
            "category",
            "region",
            "quantity",
            "unit_price",
            "revenue",
            "segment",
            "outlier",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
        rows: records
            .iter()
            .map(|e| {
                let r = &e.record;
                vec![
                    r.date.format("%Y-%m-%d").to_string(),
                    r.customer_id.clone(),
                    r.provider.clone(),
                    r.procedure.clone(),
                    r.category.clone(),
                    r.region.clone().unwrap_or_default(),
                    r.quantity.to_string(),
                    r.unit_price.to_string(),
                    r.revenue.to_string(),
                    e.segment.clone().unwrap_or_default(),
                    e.outlier.to_string(),
                ]
            })
            .collect(),
    }
}

pub fn dimension_table(dimension: &[DimensionEntry]) -> Table {
    Table {
        name: "dimension".to_string(),
        columns: vec!["customer_id".to_string(), "segment".to_string()],
        rows: dimension
            .iter()
            .map(|d| vec![d.customer_id.clone(), d.segment.clone()])
            .collect(),
    }
}

pub fn pivot_table(pivot: &MonthlyPivot) -> Table {
    let mut columns = vec!["month".to_string()];
    columns.extend(
        pivot
            .columns
            .iter()
            .map(|c| format!("{} / {}", c.category, c.provider)),
    );
    let rows = pivot
        .months
        .iter()
        .zip(&pivot.cells)
        .map(|(month, cells)| {
            let mut row = vec![month.clone()];
            row.extend(cells.iter().map(|v| v.to_string()));
            row
        })
        .collect();
    Table {
        name: "monthly_pivot".to_string(),
        columns,
        rows,
    }
}

pub fn ranking_table(name: &str, label: &str, entries: &[RankingEntry]) -> Table {
    Table {
        name: name.to_string(),
        columns: vec!["rank".to_string(), label.to_string(), "revenue".to_string()],
        rows: entries
            .iter()
            .enumerate()
            .map(|(i, e)| vec![(i + 1).to_string(), e.name.clone(), e.revenue.to_string()])
            .collect(),
    }
}

pub fn support_to_table(support: &SupportTable) -> Table {
    let mut columns = vec!["month".to_string(), "total_revenue".to_string()];
    columns.extend(support.customer_columns.iter().cloned());
    let rows = support
        .rows
        .iter()
        .map(|row| {
            let mut out = vec![row.month.clone(), row.total.to_string()];
            out.extend(row.customers.iter().map(|v| v.to_string()));
            out
        })
        .collect();
    Table {
        name: "support".to_string(),
        columns,
        rows,
    }
}
