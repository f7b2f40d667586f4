//! Database for long clauses.
use partial_ref::{partial, PartialRef};

use super::{header::HEADER_LEN, ClauseHeader, ClauseRef};

use crate::context::{AssignmentP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, WatchlistsP};
use crate::lit::Lit;
use crate::prop::Reason;

/// Database for long clauses.
///
/// Removal of clauses from the `clauses` and `learned` lists is delayed until the next reduction
/// or compaction, so the header's deleted flag needs to be checked when iterating over them.
#[derive(Default)]
pub struct ClauseDb {
    /// May contain deleted clauses, see above
    pub(super) clauses: Vec<ClauseRef>,
    /// Learned clauses only, may contain deleted clauses
    pub(super) learned: Vec<ClauseRef>,
    /// Number of non-deleted irredundant long clauses
    irred_count: usize,
    /// Number of non-deleted learned long clauses
    learned_count: usize,
    /// Size of deleted but not collected clauses
    pub(super) garbage_size: usize,
    /// Learned unit clauses, reasserted on every propagation
    learned_units: Vec<Lit>,
}

impl ClauseDb {
    /// The number of irredundant long clauses.
    pub fn irred_count(&self) -> usize {
        self.irred_count
    }

    /// The number of learned long clauses.
    pub fn learned_count(&self) -> usize {
        self.learned_count
    }

    /// Words occupied by deleted clauses not yet compacted away.
    pub fn garbage_size(&self) -> usize {
        self.garbage_size
    }

    pub fn add_learned_unit(&mut self, lit: Lit) {
        self.learned_units.push(lit);
    }

    pub fn learned_units(&self) -> &[Lit] {
        &self.learned_units
    }
}

/// Add a long clause to the database.
pub fn add_clause(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP, mut WatchlistsP),
    header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    let learned = header.learned();

    let cref = ctx.part_mut(ClauseAllocP).add_clause(header, lits);

    ctx.part_mut(WatchlistsP)
        .watch_clause(cref, [lits[0], lits[1]]);

    let db = ctx.part_mut(ClauseDbP);

    db.clauses.push(cref);
    if learned {
        db.learned.push(cref);
        db.learned_count += 1;
    } else {
        db.irred_count += 1;
    }

    cref
}

/// Delete a long clause from the database.
///
/// The clause stays in the watchlists, callers have to disable them before propagating again.
pub fn delete_clause(mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP), cref: ClauseRef) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let header = alloc.header_mut(cref);

    debug_assert!(
        !header.deleted(),
        "delete_clause for already deleted clause"
    );

    header.set_deleted(true);

    if header.learned() {
        db.learned_count -= 1;
    } else {
        db.irred_count -= 1;
    }

    db.garbage_size += header.len() + HEADER_LEN;
}

/// Delete a long clause from the database unless it is asserting.
///
/// Returns true if the clause was deleted.
pub fn try_delete_clause(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        AssignmentP,
        ImplGraphP,
    ),
    cref: ClauseRef,
) -> bool {
    let initial_lit = ctx.part(ClauseAllocP).clause(cref).lits()[0];
    let asserting = ctx.part(AssignmentP).lit_is_true(initial_lit)
        && ctx.part(ImplGraphP).reason(initial_lit.var()) == &Reason::Long(cref);

    if !asserting {
        delete_clause(ctx.borrow(), cref);
    }
    !asserting
}

/// Iterator over all long clauses.
///
/// This filters deleted (but uncollected) clauses on the fly.
pub fn clauses_iter<'a>(
    ctx: &'a partial!('a Context, ClauseAllocP, ClauseDbP),
) -> impl Iterator<Item = ClauseRef> + 'a {
    let alloc = ctx.part(ClauseAllocP);
    ctx.part(ClauseDbP)
        .clauses
        .iter()
        .cloned()
        .filter(move |&cref| !alloc.header(cref).deleted())
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use tallysat_formula::cnf_formula;

    use crate::context::set_var_count;

    #[test]
    fn counts_and_deletes() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 7);

        let clauses = cnf_formula![
            1, 2, 3;
            4, -5, 6;
            -2, 3, -4;
            -3, 5, 2, 7;
        ];

        let mut crefs = vec![];

        for (index, clause) in clauses.iter().enumerate() {
            let mut header = ClauseHeader::new();
            header.set_learned(index >= 2);
            crefs.push(add_clause(ctx.borrow(), header, clause));
        }

        assert_eq!(ctx.part(ClauseDbP).irred_count(), 2);
        assert_eq!(ctx.part(ClauseDbP).learned_count(), 2);

        delete_clause(ctx.borrow(), crefs[1]);
        delete_clause(ctx.borrow(), crefs[3]);

        assert_eq!(ctx.part(ClauseDbP).irred_count(), 1);
        assert_eq!(ctx.part(ClauseDbP).learned_count(), 1);
        assert_eq!(ctx.part(ClauseDbP).garbage_size(), 3 + 4 + 2 * HEADER_LEN);

        let remaining: Vec<_> = clauses_iter(&ctx.borrow()).collect();
        assert_eq!(remaining, vec![crefs[0], crefs[2]]);
    }
}
