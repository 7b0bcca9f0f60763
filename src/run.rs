use crate::audit::{Audit, AuditSnapshot};
use crate::config::Config;
use crate::domain::EnrichedRecord;
use crate::error::Result;
use crate::pipeline::{analytics, dedup, enrich, filter, normalize};
use crate::report::{self, DirectorySink, ReportBundle, ReportSink};
use crate::store::{PersistenceGateway, SqliteStore};
use crate::ingest;
use tracing::info;

/// Outcome of one full refresh, returned to the CLI.
#[derive(Debug)]
pub struct RunSummary {
    pub audit: AuditSnapshot,
}

/// Full refresh: ingest → clean → filter → dedup → enrich → analyze →
/// report handoff → persist. Counters from every stage are composed here;
/// no stage touches shared state.
///
/// Report artifacts are delivered before persistence, so an aborted
/// persistence step leaves the computed analytics valid. Persistence
/// failures still surface to the caller.
pub fn run_full_refresh(config: &Config) -> Result<RunSummary> {
    info!("Starting full refresh");
    let mut audit = Audit::default();

    let scan = ingest::read_input_dirs(&config.input.data_dirs)?;
    audit.files_read = scan.files.len();
    audit.rows_imported = scan.rows.len();

    let (records, counts) = normalize::normalize(scan.rows);
    audit.absorb_normalize(&counts);

    let records = filter::apply(records, &config.filter);
    audit.rows_after_filter = records.len();

    let (records, duplicates_removed) = dedup::dedup(records);
    audit.duplicates_removed = duplicates_removed;

    let dimension = enrich::load_dimension(&config.input.dimension_file)?;
    let mut enriched = enrich::join(records, &dimension);

    audit.p90_revenue = analytics::apply_outlier_flag(&mut enriched);
    info!(
        rows = enriched.len(),
        p90 = %audit.p90_revenue,
        "Analytics computed"
    );

    let mut sink = DirectorySink::new(&config.report.output_dir)?;
    let bundle = build_bundle(&enriched, &dimension, config.report.top_customers, audit.snapshot());
    report::deliver(&mut sink, &bundle)?;

    if config.persistence.enable {
        let batch: Vec<_> = enriched.iter().map(|e| e.record.clone()).collect();
        let mut gateway = SqliteStore::open(&config.persistence.connection.database)?;
        audit.rows_persisted = gateway.persist(&batch, config.persistence.load_mode)?;
        // Refresh the audit artifact now that the persisted count is known.
        sink.write_audit(&audit.snapshot())?;
    } else {
        info!("Persistence disabled; skipping durable store load");
    }

    info!("Full refresh finished");
    Ok(RunSummary {
        audit: audit.finalize(),
    })
}

/// Rebuilds the report support-table artifact from already-persisted
/// canonical data, re-joining the dimension for segment labels.
pub fn rebuild_support_artifact(config: &Config) -> Result<()> {
    let enriched = match load_persisted_enriched(config)? {
        Some(enriched) => enriched,
        None => return Ok(()),
    };
    let support = analytics::support_table(&enriched, config.report.top_customers);

    let mut sink = DirectorySink::new(&config.report.output_dir)?;
    sink.write_table(&report::support_to_table(&support))?;
    sink.finish()?;
    info!("Support table rebuilt from persisted data");
    Ok(())
}

/// Rebuilds only the rankings artifacts from already-persisted canonical
/// data.
pub fn rebuild_rankings_artifact(config: &Config) -> Result<()> {
    let enriched = match load_persisted_enriched(config)? {
        Some(enriched) => enriched,
        None => return Ok(()),
    };
    let top_providers = analytics::top_providers(&enriched, analytics::TOP_RANKED);
    let top_procedures = analytics::top_procedures(&enriched, analytics::TOP_RANKED);

    let mut sink = DirectorySink::new(&config.report.output_dir)?;
    sink.write_table(&report::ranking_table("top_providers", "provider", &top_providers))?;
    sink.write_table(&report::ranking_table("top_procedures", "procedure", &top_procedures))?;
    sink.finish()?;
    info!("Rankings rebuilt from persisted data");
    Ok(())
}

fn load_persisted_enriched(config: &Config) -> Result<Option<Vec<EnrichedRecord>>> {
    let gateway = SqliteStore::open(&config.persistence.connection.database)?;
    let records = gateway.fetch_all()?;
    if records.is_empty() {
        info!("Durable store holds no canonical records; nothing to rebuild");
        return Ok(None);
    }
    let dimension = enrich::load_dimension(&config.input.dimension_file)?;
    Ok(Some(enrich::join(records, &dimension)))
}

fn build_bundle(
    enriched: &[EnrichedRecord],
    dimension: &[crate::domain::DimensionEntry],
    top_customers: usize,
    audit: AuditSnapshot,
) -> ReportBundle {
    let pivot = analytics::monthly_pivot(enriched);
    let top_providers = analytics::top_providers(enriched, analytics::TOP_RANKED);
    let top_procedures = analytics::top_procedures(enriched, analytics::TOP_RANKED);
    let support = analytics::support_table(enriched, top_customers);

    ReportBundle {
        records: report::records_table(enriched),
        dimension: report::dimension_table(dimension),
        monthly_pivot: report::pivot_table(&pivot),
        top_providers: report::ranking_table("top_providers", "provider", &top_providers),
        top_procedures: report::ranking_table("top_procedures", "procedure", &top_procedures),
        support: report::support_to_table(&support),
        audit,
    }
}
