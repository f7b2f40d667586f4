//! Clause activity.
use partial_ref::{partial, PartialRef};

use crate::context::{parts::*, Context};

use super::ClauseRef;

/// Increase the activity of a learned clause used in a conflict.
pub fn bump_clause(mut ctx: partial!(Context, mut ClauseAllocP), cref: ClauseRef) {
    let header = ctx.part_mut(ClauseAllocP).header_mut(cref);
    if header.learned() {
        header.set_activity(header.activity() + 1.0);
    }
}

/// Halve the activity of every learned clause.
///
/// Activities are bumped by a fixed amount, so periodic halving keeps recent activity dominant.
pub fn decay_clause_activities(mut ctx: partial!(Context, mut ClauseAllocP, ClauseDbP)) {
    let (alloc, ctx) = ctx.split_part_mut(ClauseAllocP);
    for &cref in ctx.part(ClauseDbP).learned.iter() {
        let header = alloc.header_mut(cref);
        header.set_activity(header.activity() * 0.5);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use tallysat_formula::lits;

    use crate::clause::{db, ClauseHeader};
    use crate::context::set_var_count;

    #[test]
    fn only_learned_clauses_gain_activity() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 4);

        let irred = db::add_clause(ctx.borrow(), ClauseHeader::new(), &lits![1, 2, 3]);
        let mut header = ClauseHeader::new();
        header.set_learned(true);
        let learned = db::add_clause(ctx.borrow(), header, &lits![-1, 2, 4]);

        bump_clause(ctx.borrow(), irred);
        bump_clause(ctx.borrow(), learned);
        bump_clause(ctx.borrow(), learned);
        decay_clause_activities(ctx.borrow());

        assert_eq!(ctx.part(ClauseAllocP).header(irred).activity(), 0.0);
        assert_eq!(ctx.part(ClauseAllocP).header(learned).activity(), 1.0);
    }
}
