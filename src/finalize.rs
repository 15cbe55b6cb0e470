use crate::builder::RecordMap;
use crate::models::Record;
use tracing::debug;

/// Output of [`finalize`]: the ordered records plus how many were dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub records: Vec<Record>,
    pub dropped: usize,
}

/// Keeps records that ended up with a file and orders them by
/// lower-cased author then title. Equal keys keep collection order.
pub fn finalize(records: RecordMap) -> Finalized {
    let total = records.len();
    let mut kept: Vec<Record> = records
        .into_values()
        .filter(|record| record.filename.is_some())
        .collect();
    let dropped = total - kept.len();

    // sort_by_cached_key is stable
    kept.sort_by_cached_key(Record::sort_key);

    debug!(kept = kept.len(), dropped, "Catalog finalized");
    Finalized {
        records: kept,
        dropped,
    }
}
