use crate::domain::CanonicalRecord;
use crate::error::{EtlError, Result};
use crate::store::{LoadMode, PersistenceGateway};
use chrono::NaiveDate;
use rusqlite::{Connection, Transaction};
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS service_records (
    date           TEXT NOT NULL,
    customer_id    TEXT NOT NULL,
    provider       TEXT NOT NULL,
    procedure      TEXT NOT NULL,
    category       TEXT NOT NULL,
    quantity       INTEGER NOT NULL,
    unit_price     TEXT NOT NULL,
    revenue        TEXT NOT NULL,
    last_loaded_at TEXT NOT NULL,
    PRIMARY KEY (date, customer_id, procedure)
);
";

const STAGING_SQL: &str = "
DROP TABLE IF EXISTS staging_batch;
CREATE TEMP TABLE staging_batch (
    date        TEXT NOT NULL,
    customer_id TEXT NOT NULL,
    provider    TEXT NOT NULL,
    procedure   TEXT NOT NULL,
    category    TEXT NOT NULL,
    quantity    INTEGER NOT NULL,
    unit_price  TEXT NOT NULL,
    revenue     TEXT NOT NULL
);
";

/// Engine-native upsert from the staging table. The `WHERE true` keeps the
/// upsert clause unambiguous after a SELECT source.
const NATIVE_UPSERT_SQL: &str = "
INSERT INTO service_records
    (date, customer_id, provider, procedure, category, quantity, unit_price, revenue, last_loaded_at)
SELECT date, customer_id, provider, procedure, category, quantity, unit_price, revenue, datetime('now')
FROM staging_batch
WHERE true
ON CONFLICT(date, customer_id, procedure) DO UPDATE SET
    provider       = excluded.provider,
    category       = excluded.category,
    quantity       = excluded.quantity,
    unit_price     = excluded.unit_price,
    revenue        = excluded.revenue,
    last_loaded_at = excluded.last_loaded_at;
";

const INLINE_UPDATE_SQL: &str = "
UPDATE service_records SET
    provider = (SELECT s.provider FROM staging_batch s
                WHERE s.date = service_records.date
                  AND s.customer_id = service_records.customer_id
                  AND s.procedure = service_records.procedure),
    category = (SELECT s.category FROM staging_batch s
                WHERE s.date = service_records.date
                  AND s.customer_id = service_records.customer_id
                  AND s.procedure = service_records.procedure),
    quantity = (SELECT s.quantity FROM staging_batch s
                WHERE s.date = service_records.date
                  AND s.customer_id = service_records.customer_id
                  AND s.procedure = service_records.procedure),
    unit_price = (SELECT s.unit_price FROM staging_batch s
                  WHERE s.date = service_records.date
                    AND s.customer_id = service_records.customer_id
                    AND s.procedure = service_records.procedure),
    revenue = (SELECT s.revenue FROM staging_batch s
               WHERE s.date = service_records.date
                 AND s.customer_id = service_records.customer_id
                 AND s.procedure = service_records.procedure),
    last_loaded_at = datetime('now')
WHERE EXISTS (SELECT 1 FROM staging_batch s
              WHERE s.date = service_records.date
                AND s.customer_id = service_records.customer_id
                AND s.procedure = service_records.procedure);
";

const INLINE_INSERT_SQL: &str = "
INSERT INTO service_records
    (date, customer_id, provider, procedure, category, quantity, unit_price, revenue, last_loaded_at)
SELECT s.date, s.customer_id, s.provider, s.procedure, s.category, s.quantity, s.unit_price, s.revenue, datetime('now')
FROM staging_batch s
WHERE NOT EXISTS (SELECT 1 FROM service_records t
                  WHERE t.date = s.date
                    AND t.customer_id = s.customer_id
                    AND t.procedure = s.procedure);
";

/// One merge protocol, two interchangeable implementations. Which one runs
/// is decided per batch by a capability probe against the live connection.
trait MergeStrategy {
    fn name(&self) -> &'static str;
    fn merge(&self, tx: &Transaction) -> rusqlite::Result<()>;
}

/// Delegates to the engine's registered upsert support.
struct NativeUpsert;

impl MergeStrategy for NativeUpsert {
    fn name(&self) -> &'static str {
        "native-upsert"
    }

    fn merge(&self, tx: &Transaction) -> rusqlite::Result<()> {
        tx.execute(NATIVE_UPSERT_SQL, [])?;
        Ok(())
    }
}

/// Equivalent inline match/update/insert for engines without upsert
/// support; produces the identical resulting state.
struct InlineMerge;

impl MergeStrategy for InlineMerge {
    fn name(&self) -> &'static str {
        "inline-merge"
    }

    fn merge(&self, tx: &Transaction) -> rusqlite::Result<()> {
        tx.execute(INLINE_UPDATE_SQL, [])?;
        tx.execute(INLINE_INSERT_SQL, [])?;
        Ok(())
    }
}

/// Probes whether the engine accepts the native upsert statement; falls
/// back to the inline implementation when it does not.
fn select_strategy(tx: &Transaction) -> &'static dyn MergeStrategy {
    match tx.prepare(NATIVE_UPSERT_SQL) {
        Ok(_) => &NativeUpsert,
        Err(e) => {
            debug!(error = %e, "Native upsert unavailable; using inline merge");
            &InlineMerge
        }
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(persistence_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(persistence_err)?;
        info!(database = %path.display(), "Opened durable store");
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(persistence_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(persistence_err)?;
        Ok(Self { conn })
    }

    fn append_rows(tx: &Transaction, batch: &[CanonicalRecord]) -> rusqlite::Result<usize> {
        let mut stmt = tx.prepare(
            "INSERT INTO service_records
                 (date, customer_id, provider, procedure, category, quantity, unit_price, revenue, last_loaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))",
        )?;
        for record in batch {
            stmt.execute(rusqlite::params![
                record.date.format("%Y-%m-%d").to_string(),
                record.customer_id,
                record.provider,
                record.procedure,
                record.category,
                record.quantity,
                record.unit_price.to_string(),
                record.revenue.to_string(),
            ])?;
        }
        Ok(batch.len())
    }

    fn stage_rows(tx: &Transaction, batch: &[CanonicalRecord]) -> rusqlite::Result<()> {
        tx.execute_batch(STAGING_SQL)?;
        let mut stmt = tx.prepare(
            "INSERT INTO staging_batch
                 (date, customer_id, provider, procedure, category, quantity, unit_price, revenue)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for record in batch {
            stmt.execute(rusqlite::params![
                record.date.format("%Y-%m-%d").to_string(),
                record.customer_id,
                record.provider,
                record.procedure,
                record.category,
                record.quantity,
                record.unit_price.to_string(),
                record.revenue.to_string(),
            ])?;
        }
        Ok(())
    }

    fn merge_rows(tx: &Transaction, batch: &[CanonicalRecord]) -> rusqlite::Result<usize> {
        Self::stage_rows(tx, batch)?;
        let strategy = select_strategy(tx);
        debug!(strategy = strategy.name(), rows = batch.len(), "Merging staged batch");
        strategy.merge(tx)?;
        // The staging area is transaction-scoped; drop it before commit so
        // it never outlives the batch.
        tx.execute("DROP TABLE staging_batch", [])?;
        Ok(batch.len())
    }

    #[cfg(test)]
    fn merge_inline_only(&mut self, batch: &[CanonicalRecord]) -> Result<usize> {
        let tx = self.conn.transaction().map_err(persistence_err)?;
        Self::stage_rows(&tx, batch).map_err(persistence_err)?;
        InlineMerge.merge(&tx).map_err(persistence_err)?;
        tx.execute("DROP TABLE staging_batch", [])
            .map_err(persistence_err)?;
        tx.commit().map_err(persistence_err)?;
        Ok(batch.len())
    }
}

impl PersistenceGateway for SqliteStore {
    fn persist(&mut self, batch: &[CanonicalRecord], mode: LoadMode) -> Result<usize> {
        // One transaction per batch; dropping the transaction on any error
        // path rolls back staging and merge together.
        let tx = self.conn.transaction().map_err(persistence_err)?;
        let count = match mode {
            LoadMode::Append => Self::append_rows(&tx, batch),
            LoadMode::Truncate => {
                tx.execute("DELETE FROM service_records", [])
                    .and_then(|_| Self::append_rows(&tx, batch))
            }
            LoadMode::Merge => Self::merge_rows(&tx, batch),
        }
        .map_err(persistence_err)?;
        tx.commit().map_err(persistence_err)?;
        info!(rows = count, mode = ?mode, "Batch persisted");
        Ok(count)
    }

    fn fetch_all(&self) -> Result<Vec<CanonicalRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT date, customer_id, provider, procedure, category, quantity, unit_price, revenue
                 FROM service_records
                 ORDER BY date, customer_id, procedure",
            )
            .map_err(persistence_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(persistence_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (date, customer_id, provider, procedure, category, quantity, unit_price, revenue) =
                row.map_err(persistence_err)?;
            records.push(CanonicalRecord {
                date: parse_stored_date(&date)?,
                customer_id,
                provider,
                procedure,
                category,
                region: None,
                quantity,
                unit_price: parse_stored_decimal(&unit_price)?,
                revenue: parse_stored_decimal(&revenue)?,
            });
        }
        Ok(records)
    }
}

fn persistence_err(e: rusqlite::Error) -> EtlError {
    EtlError::Persistence {
        message: e.to_string(),
    }
}

fn parse_stored_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| EtlError::Persistence {
        message: format!("stored date '{raw}' unreadable: {e}"),
    })
}

fn parse_stored_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| EtlError::Persistence {
        message: format!("stored decimal '{raw}' unreadable: {e}"),
    })
}
