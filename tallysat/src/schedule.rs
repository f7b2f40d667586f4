//! Scheduling of maintenance steps during the search.
use std::time::{Duration, Instant};

use log::debug;

use partial_ref::{partial, PartialRef};

use crate::clause::gc::compact_clauses;
use crate::clause::reduce::reduce_learned;
use crate::context::{
    AssignmentP, CacheP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, ScheduleP, SolverConfigP,
    StatisticsP, TrailP, WatchlistsP,
};

/// Timing and clause database maintenance state.
#[derive(Default)]
pub struct Schedule {
    start: Option<Instant>,
    last_report: Option<Instant>,
    /// Learned clause count at the last reduction.
    last_reduction: u64,
    /// Learned clause count at the last compaction.
    last_compaction: u64,
    reductions: u64,
}

impl Schedule {
    /// Start the clock for the time limit and progress reports.
    pub fn start(&mut self) {
        let now = Instant::now();
        self.start = Some(now);
        self.last_report = Some(now);
    }

    /// Time since [`start`](Schedule::start) was called.
    pub fn elapsed(&self) -> Duration {
        self.start.map_or(Duration::default(), |start| start.elapsed())
    }
}

/// Check the time limit and report progress when due.
///
/// Returns true when the time limit is exceeded.
pub fn check_time(mut ctx: partial!(Context, mut ScheduleP, CacheP, SolverConfigP, StatisticsP)) -> bool {
    let (schedule, ctx) = ctx.split_part_mut(ScheduleP);
    let config = ctx.part(SolverConfigP);

    let now = Instant::now();

    if config.stats_interval_secs > 0 {
        let interval = Duration::from_secs(config.stats_interval_secs);
        let due = schedule
            .last_report
            .map_or(false, |last| now.duration_since(last) >= interval);
        if due {
            schedule.last_report = Some(now);
            let mut statistics = ctx.part(StatisticsP).clone();
            let cache_stats = ctx.part(CacheP).stats();
            statistics.cache_entries = cache_stats.entries;
            statistics.cache_bytes = cache_stats.bytes;
            statistics.log_progress();
        }
    }

    match (config.time_limit_secs, schedule.start) {
        (Some(limit), Some(start)) => now.duration_since(start) >= Duration::from_secs(limit),
        _ => false,
    }
}

/// Reduce or compact the learned clauses when due.
///
/// Called after a clause was learned. The reduction interval grows by 10 clauses after each
/// reduction.
pub fn maintain_clauses(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ScheduleP,
        mut StatisticsP,
        mut WatchlistsP,
        AssignmentP,
        SolverConfigP,
        TrailP,
    ),
) {
    let learned = ctx.part(StatisticsP).learned_clauses;
    let config = ctx.part(SolverConfigP);
    let deletion_interval = config.clause_deletion_interval;
    let compaction_interval = config.compaction_interval;

    let schedule = ctx.part(ScheduleP);
    let reduction_due =
        learned - schedule.last_reduction > deletion_interval + 10 * schedule.reductions;
    let compaction_due = learned - schedule.last_compaction >= compaction_interval;

    if reduction_due {
        reduce_learned(ctx.borrow());
        let schedule = ctx.part_mut(ScheduleP);
        schedule.last_reduction = learned;
        schedule.reductions += 1;
        ctx.part_mut(StatisticsP).clause_reductions += 1;
    }

    if compaction_due {
        debug!("compacting clause storage after {} learned clauses", learned);
        compact_clauses(ctx.borrow());
        ctx.part_mut(ScheduleP).last_compaction = learned;
        ctx.part_mut(StatisticsP).compactions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use tallysat_formula::cnf_formula;

    use crate::clause::{db, ClauseHeader};
    use crate::context::set_var_count;

    #[test]
    fn zero_time_limit_expires() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        assert!(!check_time(ctx.borrow()));

        ctx.part_mut(SolverConfigP).time_limit_secs = Some(0);
        assert!(!check_time(ctx.borrow()));

        ctx.part_mut(ScheduleP).start();
        assert!(check_time(ctx.borrow()));
    }

    #[test]
    fn reductions_space_out() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 6);

        ctx.part_mut(SolverConfigP).clause_deletion_interval = 2;
        ctx.part_mut(SolverConfigP).compaction_interval = 1000;

        let clauses = cnf_formula![
            1, 2, 3;
            -1, 2, 4;
            1, -2, 5;
            -3, -4, 6;
        ];

        let mut reductions = vec![];
        for lits in clauses.iter() {
            let mut header = ClauseHeader::new();
            header.set_learned(true);
            db::add_clause(ctx.borrow(), header, lits);
            ctx.part_mut(StatisticsP).learned_clauses += 1;
            maintain_clauses(ctx.borrow());
            reductions.push(ctx.part(StatisticsP).clause_reductions);
        }

        assert_eq!(reductions, vec![0, 0, 1, 1]);
        assert_eq!(ctx.part(StatisticsP).compactions, 0);
    }
}
