//! Learns a new clause by analyzing a conflict.
//!
//! The learned clause always asserts the complement of the literal that opened the current
//! decision level, either a branching decision or a probed literal. All other literals of the
//! clause are assigned false on lower levels.
use std::mem::swap;

use partial_ref::{partial, split_borrow, PartialRef};

use crate::clause::ClauseRef;
use crate::context::{AnalyzeConflictP, ClauseAllocP, Context, ImplGraphP, TrailP, VsadsP};
use crate::lit::{Lit, Var};
use crate::prop::{Conflict, ImplGraph, Reason};

/// Temporaries for conflict analysis
#[derive(Default)]
pub struct AnalyzeConflict {
    /// This is the learned clause after analysis finishes.
    clause: Vec<Lit>,
    /// Number of literals in the current clause at the current level, excluding the level's first
    /// literal.
    current_level_count: usize,
    /// Variables in the current clause.
    var_flags: Vec<bool>,
    /// Entries to clean in `var_flags`.
    to_clean: Vec<Var>,
    /// Long clauses used in the derivation of the learned clause.
    involved: Vec<ClauseRef>,
}

impl AnalyzeConflict {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_flags.resize(count, false);
    }

    /// The learned clause.
    pub fn clause(&self) -> &[Lit] {
        &self.clause
    }

    /// Long clauses used to derive the learned clause.
    pub fn involved(&self) -> &[ClauseRef] {
        &self.involved
    }
}

/// Learns a new clause by analyzing a conflict.
///
/// Has to be called above level 0. The literals of all clauses taking part in the conflict get
/// their activity bumped.
pub fn analyze_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut VsadsP,
        ClauseAllocP,
        ImplGraphP,
        TrailP,
    ),
    conflict: Conflict,
) {
    split_borrow!(lit_ctx = &(ClauseAllocP) ctx);

    let analyze = ctx.part_mut(AnalyzeConflictP);
    analyze.clause.clear();
    analyze.involved.clear();
    analyze.current_level_count = 0;

    if let Conflict::Long(cref) = conflict {
        analyze.involved.push(cref);
    }

    let level_start = ctx.part(TrailP).current_level_start();
    debug_assert!(ctx.part(TrailP).current_level() > 0);

    for &lit in conflict.lits(&lit_ctx) {
        ctx.part_mut(VsadsP).bump(lit);
        add_literal(ctx.borrow(), lit, level_start);
    }

    // Resolve away every literal of the current level except the first one, in reverse
    // chronological order.
    let mut pos = ctx.part(TrailP).trail().len();
    while ctx.part(AnalyzeConflictP).current_level_count > 0 && pos > level_start + 1 {
        pos -= 1;
        let lit = ctx.part(TrailP).trail()[pos];

        let analyze = ctx.part_mut(AnalyzeConflictP);
        if !analyze.var_flags[lit.index()] {
            continue;
        }
        analyze.var_flags[lit.index()] = false;
        analyze.current_level_count -= 1;

        let reason = *ctx.part(ImplGraphP).reason(lit.var());
        if let Reason::Long(cref) = reason {
            ctx.part_mut(AnalyzeConflictP).involved.push(cref);
        }
        ctx.part_mut(VsadsP).bump(lit);
        for &reason_lit in reason.lits(&lit_ctx) {
            ctx.part_mut(VsadsP).bump(reason_lit);
            add_literal(ctx.borrow(), reason_lit, level_start);
        }
    }

    let first = ctx.part(TrailP).trail()[level_start];

    minimize_clause(ctx.borrow());

    let (analyze, ctx) = ctx.split_part_mut(AnalyzeConflictP);

    analyze.clause.push(!first);
    let end = analyze.clause.len() - 1;
    analyze.clause.swap(0, end);

    for var in analyze.to_clean.drain(..) {
        analyze.var_flags[var.index()] = false;
    }
    analyze.var_flags[first.index()] = false;

    // The highest level literal besides the asserted one goes into position 1, keeping the
    // watchlist invariant when the clause is added.
    if analyze.clause.len() > 2 {
        let (prefix, rest) = analyze.clause.split_at_mut(2);
        let lit_1 = &mut prefix[1];
        let mut max_level = ctx.part(ImplGraphP).level(lit_1.var());
        for lit in rest.iter_mut() {
            let lit_level = ctx.part(ImplGraphP).level(lit.var());
            if lit_level > max_level {
                max_level = lit_level;
                swap(lit_1, lit);
            }
        }
    }
}

/// Whether an assigned literal holds in every model.
fn is_fixed(graph: &ImplGraph, var: Var) -> bool {
    graph.level(var) == 0 || *graph.reason(var) == Reason::Unit
}

/// Add a literal to the current clause.
fn add_literal(
    mut ctx: partial!(Context, mut AnalyzeConflictP, ImplGraphP, TrailP),
    lit: Lit,
    level_start: usize,
) {
    let (analyze, ctx) = ctx.split_part_mut(AnalyzeConflictP);
    // Literals set by unit clauses and literals already present are skipped
    let graph = ctx.part(ImplGraphP);
    if is_fixed(graph, lit.var()) || analyze.var_flags[lit.index()] {
        return;
    }
    analyze.var_flags[lit.index()] = true;

    if graph.level(lit.var()) == ctx.part(TrailP).current_level() {
        // The first literal of the level is added as asserting literal at the end
        if graph.depth(lit.var()) > level_start {
            analyze.current_level_count += 1;
        }
    } else {
        analyze.clause.push(lit);
        analyze.to_clean.push(lit.var());
    }
}

/// Remove literals implied by other literals of the clause.
///
/// A literal is dropped when every literal of its reason is in the clause or fixed.
fn minimize_clause(mut ctx: partial!(Context, mut AnalyzeConflictP, ClauseAllocP, ImplGraphP)) {
    split_borrow!(lit_ctx = &(ClauseAllocP) ctx);
    let (analyze, ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let graph = ctx.part(ImplGraphP);

    let var_flags = &analyze.var_flags;
    analyze.clause.retain(|&lit| {
        let reason = graph.reason(lit.var());
        match reason {
            Reason::Binary(_) | Reason::Long(_) => !reason
                .lits(&lit_ctx)
                .iter()
                .all(|&reason_lit| {
                    var_flags[reason_lit.index()] || is_fixed(graph, reason_lit.var())
                }),
            Reason::Unit | Reason::Decision => true,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use tallysat_formula::{cnf_formula, lit, CnfFormula};

    use crate::context::{set_var_count, AssignmentP};
    use crate::load::load_clause;
    use crate::prop::{enqueue_assignment, propagate};

    fn conflict_after(formula: &CnfFormula, decisions: &[Lit]) -> (Context, Conflict) {
        let mut ctx = Context::default();
        let conflict = {
            let mut ctx = ctx.into_partial_ref_mut();
            set_var_count(ctx.borrow(), formula.var_count());
            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause);
            }
            assert!(propagate(ctx.borrow()).is_ok());

            let mut conflict = None;
            for &decision in decisions {
                ctx.part_mut(TrailP).new_decision_level();
                enqueue_assignment(ctx.borrow(), decision, Reason::Decision);
                if let Err(found) = propagate(ctx.borrow()) {
                    conflict = Some(found);
                    break;
                }
            }
            conflict
        };
        match conflict {
            Some(conflict) => (ctx, conflict),
            None => panic!("no conflict"),
        }
    }

    #[test]
    fn learned_clause_asserts_negated_decision() {
        let (mut ctx, conflict) = conflict_after(
            &cnf_formula![
                -1, 2;
                -2, -3, 4;
                -4, 5;
                -4, -5, 6;
                -6, -2;
            ],
            &[lit!(3), lit!(1)],
        );
        let mut ctx = ctx.into_partial_ref_mut();

        analyze_conflict(ctx.borrow(), conflict);

        let clause = ctx.part(AnalyzeConflictP).clause().to_vec();
        assert_eq!(clause[0], lit!(-1));
        assert_eq!(clause[1..], [lit!(-3)]);
        assert!(clause[1..]
            .iter()
            .all(|&lit| ctx.part(AssignmentP).lit_is_false(lit)));
        assert!(ctx.part(VsadsP).activity(lit!(4)) > 0.0);
    }

    #[test]
    fn unit_clauses_are_left_out() {
        let (mut ctx, conflict) = conflict_after(
            &cnf_formula![
                7;
                -1, -7, 2;
                -2, 3;
                -2, -3;
            ],
            &[lit!(1)],
        );
        let mut ctx = ctx.into_partial_ref_mut();

        analyze_conflict(ctx.borrow(), conflict);

        assert_eq!(ctx.part(AnalyzeConflictP).clause(), &[lit!(-1)]);
    }

    #[test]
    fn highest_level_literal_is_watched() {
        let (mut ctx, conflict) = conflict_after(
            &cnf_formula![
                -4, -1, -2, 5;
                -5, -3, 6;
                -5, -6;
            ],
            &[lit!(1), lit!(2), lit!(3), lit!(4)],
        );
        let mut ctx = ctx.into_partial_ref_mut();

        analyze_conflict(ctx.borrow(), conflict);

        let clause = ctx.part(AnalyzeConflictP).clause().to_vec();
        assert_eq!(clause[0], lit!(-4));
        assert_eq!(clause[1], lit!(-3));
        assert_eq!(clause.len(), 4);
    }
}
