//! Loading a formula into the solver.
use partial_ref::{partial, PartialRef};

use crate::clause::{db, ClauseHeader};
use crate::context::{parts::*, Context};
use crate::lit::Lit;
use crate::prop::{enqueue_assignment, Reason};

/// Adds a clause to the formula.
///
/// Removes duplicated literals, ignores tautological clauses (eg. x v -x v y), handles empty
/// clauses and dispatches among unit, binary and long clauses.
///
/// Unit clauses are enqueued at level 0 without propagating. All watched literals of long clauses
/// are therefore either unassigned or still in the propagation queue.
pub fn load_clause(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut WatchlistsP,
    ),
    clause: &[Lit],
) {
    if ctx.part(SolverStateP).formula_is_unsat {
        return;
    }

    let (tmp_data, mut ctx) = ctx.split_part_mut(TmpDataP);

    let lits = &mut tmp_data.lits;
    lits.clear();
    lits.extend_from_slice(clause);

    lits.sort_unstable();
    lits.dedup();

    // Detect tautological clauses
    let mut last = None;

    for &lit in lits.iter() {
        if last == Some(!lit) {
            return;
        }
        last = Some(lit);
    }

    match lits[..] {
        [] => ctx.part_mut(SolverStateP).formula_is_unsat = true,
        [lit] => match ctx.part(AssignmentP).lit_value(lit) {
            Some(true) => (),
            Some(false) => ctx.part_mut(SolverStateP).formula_is_unsat = true,
            None => enqueue_assignment(ctx.borrow(), lit, Reason::Unit),
        },
        [lit_0, lit_1] => {
            ctx.part_mut(BinaryClausesP)
                .add_binary_clause([lit_0, lit_1], false);
        }
        _ => {
            db::add_clause(ctx.borrow(), ClauseHeader::new(), lits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use tallysat_formula::lits;

    use crate::context::set_var_count;

    #[test]
    fn unsat_on_empty_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        load_clause(ctx.borrow(), &[]);

        assert!(ctx.part(SolverStateP).formula_is_unsat);
    }

    #[test]
    fn unit_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 3);

        load_clause(ctx.borrow(), &lits![1]);
        load_clause(ctx.borrow(), &lits![3, -3]);
        load_clause(ctx.borrow(), &lits![1, 1]);

        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        load_clause(ctx.borrow(), &lits![-2]);

        assert_eq!(ctx.part(TrailP).trail().len(), 2);
        assert!(!ctx.part(SolverStateP).formula_is_unsat);

        load_clause(ctx.borrow(), &lits![2]);

        assert!(ctx.part(SolverStateP).formula_is_unsat);
    }

    #[test]
    fn binary_and_long_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 5);

        load_clause(ctx.borrow(), &lits![1, 2]);
        load_clause(ctx.borrow(), &lits![-1, 3, 3]);
        load_clause(ctx.borrow(), &lits![4, -4]);

        assert_eq!(ctx.part(BinaryClausesP).count(), 2);

        load_clause(ctx.borrow(), &lits![1, 2, 3]);
        load_clause(ctx.borrow(), &lits![-2, 3, 3, 4]);
        load_clause(ctx.borrow(), &lits![4, -5, 5, 2]);

        assert_eq!(ctx.part(ClauseDbP).irred_count(), 2);
        assert!(!ctx.part(SolverStateP).formula_is_unsat);
    }
}
