use crate::types::InstanceStatRecord;
use std::cmp::Ordering;

/// Keep the records whose host is exactly `host`, in their original order
pub fn on_host(records: &[InstanceStatRecord], host: &str) -> Vec<InstanceStatRecord> {
    records
        .iter()
        .filter(|record| record.host == host)
        .cloned()
        .collect()
}

/// Order records by memory ratio, highest first.
///
/// The sort is stable, records with equal ratios keep their input order.
pub fn by_mem_ratio_desc(records: &[InstanceStatRecord]) -> Vec<InstanceStatRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| descending(a.mem_ratio(), b.mem_ratio()));
    sorted
}

// Ratios are never NaN, zero quotas map to zero
fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
