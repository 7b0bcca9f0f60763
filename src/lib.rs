pub mod audit;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod run;
pub mod store;

pub use audit::{Audit, AuditSnapshot};
pub use config::Config;
pub use domain::{CanonicalRecord, DimensionEntry, EnrichedRecord, NaturalKey, RawRow};
pub use error::{EtlError, Result};
pub use run::{run_full_refresh, RunSummary};
pub use store::{LoadMode, PersistenceGateway, SqliteStore};
