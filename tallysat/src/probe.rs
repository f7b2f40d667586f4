//! Failed literal probing during the search.
//!
//! Clauses shortened by the assignments of a decision level are likely to become unit. For each
//! unassigned literal of such a clause the negation is assigned tentatively. If that leads to a
//! conflict the literal itself is implied and the learned clause serves as its reason.
use std::mem::take;

use partial_ref::{partial, PartialRef};

use crate::analyze_conflict::analyze_conflict;
use crate::context::{parts::*, Context};
use crate::count::learn_clause;
use crate::lit::Lit;
use crate::prop::{backtrack, enqueue_assignment, propagate, Conflict, Reason};

/// Probe the literals of clauses shortened by trail assignments from `start` on.
///
/// Repeats on the assignments made by failed literals until nothing new is assigned. Returns a
/// conflict if propagating a failed literal fails.
pub fn implicit_bcp(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut StatisticsP,
        mut TmpDataP,
        mut TrailP,
        mut VsadsP,
        mut WatchlistsP,
        ComponentsP,
        DecisionStackP,
    ),
    start: usize,
) -> Result<(), Conflict> {
    let mut batch_start = start;

    loop {
        let batch_end = ctx.part(TrailP).trail().len();
        if batch_start >= batch_end {
            return Ok(());
        }

        let mut test_lits = take(&mut ctx.part_mut(TmpDataP).lits);
        collect_test_lits(ctx.borrow(), batch_start, &mut test_lits);
        batch_start = batch_end;

        let result = probe_lits(ctx.borrow(), &test_lits);

        test_lits.clear();
        ctx.part_mut(TmpDataP).lits = test_lits;

        result?;
    }
}

/// Negations of the unassigned literals in unsatisfied clauses that contain the negation of an
/// assignment in `trail[start..]`.
///
/// Only literals of the decided component are collected.
fn collect_test_lits(
    mut ctx: partial!(Context, mut TmpDataP, AssignmentP, ComponentsP, DecisionStackP, TrailP),
    start: usize,
    test_lits: &mut Vec<Lit>,
) {
    let (tmp, ctx) = ctx.split_part_mut(TmpDataP);
    let assignment = ctx.part(AssignmentP);
    let analyzer = ctx.part(ComponentsP);
    let stack = ctx.part(DecisionStackP);

    for &assigned in ctx.part(TrailP).trail()[start..].iter() {
        for &clause in analyzer.occurrences(!assigned) {
            let lits = analyzer.clause_lits(clause);
            if lits.iter().any(|&lit| assignment.lit_is_true(lit)) {
                continue;
            }
            for &lit in lits {
                let test_lit = !lit;
                if assignment.lit_is_unk(lit)
                    && !tmp.flags[test_lit.code()]
                    && stack.in_scope(lit.var())
                {
                    tmp.flags[test_lit.code()] = true;
                    test_lits.push(test_lit);
                }
            }
        }
    }

    for &lit in test_lits.iter() {
        tmp.flags[lit.code()] = false;
    }
}

/// Assign and propagate each still unassigned test literal on a temporary level.
fn probe_lits(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut StatisticsP,
        mut TrailP,
        mut VsadsP,
        mut WatchlistsP,
    ),
    test_lits: &[Lit],
) -> Result<(), Conflict> {
    let level = ctx.part(TrailP).current_level();

    for &test_lit in test_lits {
        if !ctx.part(AssignmentP).lit_is_unk(test_lit) {
            continue;
        }

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), test_lit, Reason::Decision);

        let conflict = match propagate(ctx.borrow()) {
            Ok(()) => {
                backtrack(ctx.borrow(), level);
                continue;
            }
            Err(conflict) => conflict,
        };

        analyze_conflict(ctx.borrow(), conflict);
        backtrack(ctx.borrow(), level);

        ctx.part_mut(StatisticsP).failed_literals += 1;
        let reason = learn_clause(ctx.borrow());
        enqueue_assignment(ctx.borrow(), !test_lit, reason);

        propagate(ctx.borrow())?;
    }

    Ok(())
}
