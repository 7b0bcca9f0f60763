pub mod analytics;
pub mod dedup;
pub mod enrich;
pub mod filter;
pub mod normalize;
