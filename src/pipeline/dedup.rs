use crate::domain::{CanonicalRecord, NaturalKey};
use std::collections::HashMap;

/// Removes redundant rows by natural key (date, customer_id, procedure),
/// keeping the record occurring last in input order. Survivors preserve
/// their original relative order. Idempotent: running it on its own
/// output is a no-op.
pub fn dedup(records: Vec<CanonicalRecord>) -> (Vec<CanonicalRecord>, usize) {
    let input_count = records.len();

    let mut last_index: HashMap<NaturalKey, usize> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        last_index.insert(record.natural_key(), i);
    }

    let survivors: Vec<CanonicalRecord> = records
        .into_iter()
        .enumerate()
        .filter(|(i, record)| last_index[&record.natural_key()] == *i)
        .map(|(_, record)| record)
        .collect();

    let removed = input_count - survivors.len();
    (survivors, removed)
}
