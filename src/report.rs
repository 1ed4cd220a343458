use std::fmt;

use crate::builder::SyncStats;
use crate::mt::TranslationStats;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub fragments: usize,
    pub failed_fragments: usize,
    pub extracted_keys: usize,
    pub duplicate_keys: usize,
    pub synced_keys: usize,
    pub pruned_keys: usize,
    pub translation_requests: usize,
    pub translated: usize,
    pub failed_translations: usize,
    pub unresolved_placeholders: usize,
    pub trees_written: usize,
}

impl RunReport {
    pub fn add_translation(&mut self, stats: &TranslationStats) {
        self.translation_requests += stats.requested;
        self.translated += stats.translated;
        self.failed_translations += stats.failed;
        self.unresolved_placeholders += stats.unresolved;
    }

    pub fn add_sync(&mut self, stats: &SyncStats) {
        self.synced_keys += stats.added;
        self.pruned_keys += stats.pruned;
    }

    /// Fold the counters of a later stage into this report.
    pub fn merge(&mut self, other: &RunReport) {
        self.fragments += other.fragments;
        self.failed_fragments += other.failed_fragments;
        self.extracted_keys += other.extracted_keys;
        self.duplicate_keys += other.duplicate_keys;
        self.synced_keys += other.synced_keys;
        self.pruned_keys += other.pruned_keys;
        self.translation_requests += other.translation_requests;
        self.translated += other.translated;
        self.failed_translations += other.failed_translations;
        self.unresolved_placeholders += other.unresolved_placeholders;
        self.trees_written += other.trees_written;
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Fragments:     {} processed, {} skipped",
            self.fragments, self.failed_fragments
        )?;
        writeln!(
            f,
            "Keys:          {} extracted, {} duplicate",
            self.extracted_keys, self.duplicate_keys
        )?;
        if self.synced_keys > 0 || self.pruned_keys > 0 {
            writeln!(
                f,
                "Sync:          {} added, {} pruned",
                self.synced_keys, self.pruned_keys
            )?;
        }
        writeln!(
            f,
            "Translations:  {} requested, {} written, {} failed, {} unresolved",
            self.translation_requests,
            self.translated,
            self.failed_translations,
            self.unresolved_placeholders
        )?;
        write!(f, "Trees written: {}", self.trees_written)
    }
}
