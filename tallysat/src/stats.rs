//! Search statistics.
use log::info;

/// Monotonic counters collected during the search.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    pub decisions: u64,
    pub conflicts: u64,
    /// Learned clauses of any length, units included.
    pub learned_clauses: u64,
    pub learned_units: u64,
    /// Literals asserted because probing their complement failed.
    pub failed_literals: u64,
    /// Second branches of existential decisions stopped early.
    pub dominated_branches: u64,
    /// Components created by decomposition, singletons excluded.
    pub components: u64,
    pub cache_lookups: u64,
    pub cache_hits: u64,
    /// Cache entries dropped by eviction.
    pub cache_evicted: u64,
    /// Cache entries dropped because their branch turned out unsatisfiable.
    pub cache_polluted: u64,
    pub cache_entries: usize,
    pub cache_bytes: usize,
    pub clause_reductions: u64,
    pub compactions: u64,
    pub max_decision_level: usize,
}

impl Statistics {
    /// Log a one line progress report.
    pub fn log_progress(&self) {
        info!(
            "decisions: {} conflicts: {} learned: {} cache entries: {} ({} MB) hits: {}/{}",
            self.decisions,
            self.conflicts,
            self.learned_clauses,
            self.cache_entries,
            self.cache_bytes >> 20,
            self.cache_hits,
            self.cache_lookups,
        );
    }

    /// Log the final statistics.
    pub fn log_summary(&self) {
        info!("decisions: {}", self.decisions);
        info!("conflicts: {}", self.conflicts);
        info!(
            "learned clauses: {} (units: {})",
            self.learned_clauses, self.learned_units
        );
        info!("failed literals: {}", self.failed_literals);
        info!("dominated branches: {}", self.dominated_branches);
        info!("max decision level: {}", self.max_decision_level);
        info!("components: {}", self.components);
        info!(
            "cache: {} hits in {} lookups, {} entries, {} bytes",
            self.cache_hits, self.cache_lookups, self.cache_entries, self.cache_bytes
        );
        info!(
            "cache cleanup: {} evicted, {} polluted",
            self.cache_evicted, self.cache_polluted
        );
        info!(
            "clause database: {} reductions, {} compactions",
            self.clause_reductions, self.compactions
        );
    }
}
