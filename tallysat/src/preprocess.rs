//! Simplification of the formula before the search.
use log::info;

use partial_ref::{partial, PartialRef};

use crate::binary::simplify_binary;
use crate::clause::{db, ClauseRef};
use crate::context::{parts::*, Context};
use crate::lit::Var;
use crate::prop::{backtrack, enqueue_assignment, propagate, Reason};

/// Propagate unit clauses, assert failed literals and remove assigned literals from the formula.
///
/// Returns false if the formula is unsatisfiable. Has to be called at level 0 before the search is
/// initialized.
pub fn preprocess(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut StatisticsP,
        mut TrailP,
        mut WatchlistsP,
        QuantifiersP,
        SolverConfigP,
        SolverStateP,
    ),
) -> bool {
    if ctx.part(SolverStateP).formula_is_unsat {
        return false;
    }

    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    if propagate(ctx.borrow()).is_err() {
        return false;
    }

    let probing = ctx.part(SolverConfigP).failed_literal_probing;
    if probing && !ctx.part(QuantifiersP).is_quantified() && !failed_literal_test(ctx.borrow()) {
        return false;
    }

    simplify(ctx.borrow());

    info!(
        "preprocessing fixed {} variables, {} failed literals",
        ctx.part(TrailP).trail().len(),
        ctx.part(StatisticsP).failed_literals
    );

    true
}

/// Assign both literals of each free variable in turn and assert the complement of those that
/// lead to a conflict.
///
/// Repeats until no more failed literals are found. Returns false if asserting a complement leads
/// to a conflict.
fn failed_literal_test(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut StatisticsP,
        mut TrailP,
        mut WatchlistsP,
        BinaryClausesP,
        ClauseDbP,
    ),
) -> bool {
    let var_count = ctx.part(AssignmentP).assignment().len();

    let mut changed = true;
    while changed {
        changed = false;
        for index in 0..var_count {
            let var = Var::from_index(index);
            for &lit in [var.positive(), var.negative()].iter() {
                if !ctx.part(AssignmentP).lit_is_unk(lit) {
                    continue;
                }

                ctx.part_mut(TrailP).new_decision_level();
                enqueue_assignment(ctx.borrow(), lit, Reason::Decision);
                let failed = propagate(ctx.borrow()).is_err();
                backtrack(ctx.borrow(), 0);

                if failed {
                    ctx.part_mut(StatisticsP).failed_literals += 1;
                    enqueue_assignment(ctx.borrow(), !lit, Reason::Unit);
                    if propagate(ctx.borrow()).is_err() {
                        return false;
                    }
                    changed = true;
                }
            }
        }
    }
    true
}

/// Remove satisfied clauses and false literals.
///
/// Long clauses shrinking to two literals move to the binary clauses. The watchlists are rebuilt
/// on the next propagation.
fn simplify(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        AssignmentP,
        TrailP,
    ),
) {
    let (impl_graph, mut ctx) = ctx.split_part_mut(ImplGraphP);
    for &lit in ctx.part(TrailP).trail().iter() {
        impl_graph.update_reason(lit.var(), Reason::Unit)
    }

    simplify_binary(ctx.borrow());

    let crefs: Vec<ClauseRef> = db::clauses_iter(&ctx.borrow()).collect();
    let mut new_lits = vec![];

    for cref in crefs {
        new_lits.clear();
        let mut satisfied = false;
        let assignment = ctx.part(AssignmentP);
        for &lit in ctx.part(ClauseAllocP).clause(cref).lits() {
            match assignment.lit_value(lit) {
                None => new_lits.push(lit),
                Some(true) => {
                    satisfied = true;
                    break;
                }
                Some(false) => (),
            }
        }

        if satisfied {
            db::delete_clause(ctx.borrow(), cref);
            continue;
        }

        match new_lits[..] {
            // After full propagation an unsatisfied clause has at least two unassigned literals.
            [] | [_] => unreachable!(),
            [lit_0, lit_1] => {
                db::delete_clause(ctx.borrow(), cref);
                ctx.part_mut(BinaryClausesP)
                    .add_binary_clause([lit_0, lit_1], false);
            }
            ref lits => {
                let clause = ctx.part_mut(ClauseAllocP).clause_mut(cref);
                if lits.len() < clause.lits().len() {
                    clause.lits_mut()[..lits.len()].copy_from_slice(lits);
                    clause.header_mut().set_len(lits.len());
                }
            }
        }
    }

    ctx.part_mut(WatchlistsP).disable();
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use tallysat_formula::{cnf_formula, lit, CnfFormula};

    use crate::context::set_var_count;
    use crate::load::load_clause;

    fn load(ctx: &mut Context, formula: &CnfFormula) {
        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }
    }

    #[test]
    fn units_simplify_clauses() {
        let mut ctx = Context::default();
        load(
            &mut ctx,
            &cnf_formula![
                1;
                -1, 2, 3;
                -2, 3;
                1, 4, 5;
                -3, 4, 5, 6;
            ],
        );
        let mut ctx = ctx.into_partial_ref_mut();
        ctx.part_mut(SolverConfigP).failed_literal_probing = false;

        assert!(preprocess(ctx.borrow()));

        assert_eq!(ctx.part(TrailP).trail(), &[lit!(1)]);
        assert_eq!(ctx.part(ClauseDbP).irred_count(), 1);
        assert_eq!(ctx.part(BinaryClausesP).count(), 2);
        assert_eq!(ctx.part(ImplGraphP).reason(lit!(1).var()), &Reason::Unit);
    }

    #[test]
    fn failed_literal_is_fixed() {
        let mut ctx = Context::default();
        load(
            &mut ctx,
            &cnf_formula![
                1, 2;
                1, -2;
                -1, 3, 4;
            ],
        );
        let mut ctx = ctx.into_partial_ref_mut();

        assert!(preprocess(ctx.borrow()));

        assert!(ctx.part(AssignmentP).lit_is_true(lit!(1)));
        assert!(ctx.part(AssignmentP).lit_is_unk(lit!(3)));
        assert_eq!(ctx.part(StatisticsP).failed_literals, 1);
        assert_eq!(ctx.part(TrailP).current_level(), 0);
        assert_eq!(ctx.part(BinaryClausesP).count(), 1);
    }

    #[test]
    fn failed_literals_prove_unsat() {
        let mut ctx = Context::default();
        load(
            &mut ctx,
            &cnf_formula![
                1, 2;
                1, -2;
                -1, 3;
                -1, -3;
            ],
        );
        let mut ctx = ctx.into_partial_ref_mut();

        assert!(!preprocess(ctx.borrow()));
    }

    #[test]
    fn conflicting_units() {
        let mut ctx = Context::default();
        load(
            &mut ctx,
            &cnf_formula![
                1, 2;
                -2;
                -1, 3, 4;
                -1, -3;
                -1, 3, -4;
            ],
        );
        let mut ctx = ctx.into_partial_ref_mut();
        ctx.part_mut(SolverConfigP).failed_literal_probing = false;

        assert!(!preprocess(ctx.borrow()));
    }
}
