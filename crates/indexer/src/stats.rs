use std::time::Duration;

/// Counters accumulated over one indexing run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_errored: usize,
    pub declarations: usize,
    pub references: usize,
    /// Occurrences the resolver could not match; informational only.
    pub resolution_misses: usize,
    pub duration: Duration,
}

impl RunStats {
    pub fn total_files(&self) -> usize {
        self.files_indexed + self.files_skipped + self.files_errored
    }
}

pub fn format_stats(stats: &RunStats) -> String {
    format!(
        "indexed {} files ({} skipped, {} errored) in {:.2?}: {} declarations, {} references, {} unresolved",
        stats.files_indexed,
        stats.files_skipped,
        stats.files_errored,
        stats.duration,
        stats.declarations,
        stats.references,
        stats.resolution_misses,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_includes_counts() {
        let stats = RunStats {
            files_indexed: 3,
            files_skipped: 1,
            files_errored: 0,
            declarations: 12,
            references: 7,
            resolution_misses: 2,
            duration: Duration::from_millis(42),
        };
        let line = format_stats(&stats);
        assert!(line.contains("3 files"));
        assert!(line.contains("12 declarations"));
        assert!(line.contains("7 references"));
        assert_eq!(stats.total_files(), 4);
    }
}
