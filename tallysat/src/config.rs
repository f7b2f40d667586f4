//! Solver configuration.
use tallysat_internal_macros::{ConfigUpdate, DocDefault};

/// Configurable parameters used during solving.
#[derive(DocDefault, ConfigUpdate, Clone, Debug)]
pub struct SolverConfig {
    /// Memoize the value of solved components. (Default: true)
    pub component_caching: bool,

    /// Memory ceiling for the component cache in bytes. Half of the evictable entries are dropped
    /// whenever a new entry would exceed it. (Default: 1 << 30)
    pub cache_max_bytes: usize,

    /// Learn a clause from each conflict on a first branch. (Default: true)
    pub clause_learning: bool,

    /// Drop pure existential literals from components before caching them. Only used when solving
    /// quantified formulas. (Default: true)
    pub pure_literals: bool,

    /// Probe literals of clauses touched by propagation and assert the complement of failed ones.
    /// Only used for model counting. (Default: true)
    pub failed_literal_probing: bool,

    /// Abort with a timeout after this many seconds. (Default: None)
    pub time_limit_secs: Option<u64>,

    /// Number of learned clauses between learned clause database reductions. The interval grows by
    /// 10 after every reduction. (Default: 10000)
    pub clause_deletion_interval: u64,

    /// Number of learned clauses between compactions of the clause storage. (Default: 100000)
    pub compaction_interval: u64,

    /// Number of decisions between halving all literal and clause activities. (Default: 128)
    pub activity_decay_interval: u64,

    /// Record a trace DAG of decisions and implications. (Default: false)
    pub record_trace: bool,

    /// Seconds between progress reports in the log. (Default: 10)
    pub stats_interval_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_docs() {
        let config = SolverConfig::default();
        assert!(config.component_caching);
        assert_eq!(config.cache_max_bytes, 1 << 30);
        assert_eq!(config.time_limit_secs, None);
        assert_eq!(config.clause_deletion_interval, 10000);
        assert_eq!(config.activity_decay_interval, 128);
        assert!(!config.record_trace);
    }

    #[test]
    fn update_overrides_set_values_only() {
        let mut config = SolverConfig::default();
        let mut update = SolverConfigUpdate::new();
        update.component_caching = Some(false);

        let mut later = SolverConfigUpdate::new();
        later.time_limit_secs = Some(Some(5));
        update.merge(later);
        update.apply(&mut config);

        assert!(!config.component_caching);
        assert_eq!(config.time_limit_secs, Some(5));
        assert!(config.clause_learning);
        assert!(SolverConfig::help().contains("cache_max_bytes"));
    }
}
