use tracing::info;

/// Counters collected over one catalog run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub bytes_read: u64,
    pub bytes_decompressed: u64,
    pub elements: u64,
    pub records_committed: u64,
    pub records_replaced: u64,
    pub records_redirected: u64,
    pub file_descriptors: u64,
    pub variants_applied: u64,
    pub orphans_skipped: u64,
    pub records_dropped: u64,
    pub records_retained: u64,
}

impl ParseStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_read == 0 {
            return 0.0;
        }
        self.bytes_decompressed as f64 / self.bytes_read as f64
    }

    pub fn log_summary(&self) {
        info!(
            bytes_read = self.bytes_read,
            bytes_decompressed = self.bytes_decompressed,
            elements = self.elements,
            records = self.records_committed,
            replaced = self.records_replaced,
            redirected = self.records_redirected,
            file_descriptors = self.file_descriptors,
            variants = self.variants_applied,
            orphans = self.orphans_skipped,
            dropped = self.records_dropped,
            retained = self.records_retained,
            "Catalog parse summary"
        );
    }
}
