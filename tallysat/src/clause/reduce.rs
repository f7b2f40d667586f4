//! Learned clause database reduction.
use std::cmp::max;
use std::mem::replace;

use log::debug;
use ordered_float::OrderedFloat;
use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, StatisticsP, WatchlistsP,
};

use super::db::try_delete_clause;
use super::ClauseRef;

/// Usefulness score of a learned clause.
///
/// Activity per conflict since the clause was learned, per literal. Longer and older clauses
/// need more activity to survive.
fn usefulness(activity: f32, creation_time: u32, conflicts: u64, len: usize) -> f64 {
    let lifetime = max(conflicts.saturating_sub(creation_time as u64), 1);
    activity as f64 / lifetime as f64 / len as f64
}

/// Delete the learned clauses scoring below the median usefulness.
///
/// Clauses currently asserting a literal are kept. Deleted clauses are left in the watchlists,
/// which are disabled here and rebuilt before the next propagation.
pub fn reduce_learned(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut WatchlistsP,
        AssignmentP,
        ImplGraphP,
        StatisticsP,
    ),
) {
    let conflicts = ctx.part(StatisticsP).conflicts;

    let mut learned = replace(&mut ctx.part_mut(ClauseDbP).learned, vec![]);

    let alloc = ctx.part(ClauseAllocP);
    learned.retain(|&cref| !alloc.header(cref).deleted());

    let score = |cref: ClauseRef| {
        let header = alloc.header(cref);
        OrderedFloat(usefulness(
            header.activity(),
            header.creation_time(),
            conflicts,
            header.len(),
        ))
    };

    let scores: Vec<_> = learned.iter().map(|&cref| score(cref)).collect();

    if scores.is_empty() {
        return;
    }

    let mut sorted = scores.clone();
    sorted.sort_unstable();
    let cutoff = sorted[sorted.len() / 2];

    let before = learned.len();
    let mut kept = Vec::with_capacity(before);

    for (&cref, &clause_score) in learned.iter().zip(scores.iter()) {
        if clause_score >= cutoff || !try_delete_clause(ctx.borrow(), cref) {
            kept.push(cref);
        }
    }

    debug!("reduced learned clauses from {} to {}", before, kept.len());

    if kept.len() != before {
        ctx.part_mut(WatchlistsP).disable();
    }

    ctx.part_mut(ClauseDbP).learned = kept;
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use tallysat_formula::{cnf_formula, lit};

    use crate::clause::{db, ClauseHeader};
    use crate::context::set_var_count;
    use crate::prop::{enqueue_assignment, Reason};

    #[test]
    fn deletes_inactive_half_but_keeps_asserting() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);
        ctx.part_mut(StatisticsP).conflicts = 100;

        let clauses = cnf_formula![
            1, 2, 3;
            4, 5, 6;
            7, 8, 9;
            -1, -2, 10;
        ];

        let mut crefs = vec![];
        for (index, lits) in clauses.iter().enumerate() {
            let mut header = ClauseHeader::new();
            header.set_learned(true);
            header.set_activity(index as f32);
            crefs.push(db::add_clause(ctx.borrow(), header, lits));
        }

        // The least active clause asserts its first literal
        enqueue_assignment(ctx.borrow(), lit!(1), Reason::Long(crefs[0]));

        reduce_learned(ctx.borrow());

        assert_eq!(ctx.part(ClauseDbP).learned_count(), 3);
        assert!(!ctx.part(ClauseAllocP).header(crefs[0]).deleted());
        assert!(ctx.part(ClauseAllocP).header(crefs[1]).deleted());
        assert!(!ctx.part(ClauseAllocP).header(crefs[2]).deleted());
        assert!(!ctx.part(WatchlistsP).enabled());
    }
}
