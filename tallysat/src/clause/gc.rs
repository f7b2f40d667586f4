//! Compaction of the long clause storage.
use log::debug;
use partial_ref::{partial, PartialRef};

use crate::context::{ClauseAllocP, ClauseDbP, Context, ImplGraphP, TrailP, WatchlistsP};
use crate::prop::Reason;

use super::ClauseAlloc;

/// Copy all live clauses into a fresh allocator.
///
/// Clause references change, so the reasons of assigned literals are remapped and the watchlists
/// are disabled to be rebuilt on the next propagation.
pub fn compact_clauses(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    ctx.part_mut(WatchlistsP).disable();

    mark_asserting_clauses(ctx.borrow());

    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let (impl_graph, mut ctx) = ctx.split_part_mut(ImplGraphP);
    let alloc = ctx.part_mut(ClauseAllocP);

    assert!(
        db.garbage_size <= alloc.buffer_size(),
        "Inconsistent garbage tracking in ClauseDb"
    );
    let current_size = alloc.buffer_size() - db.garbage_size;

    // Leave room for the clauses learned until the next compaction.
    let mut new_alloc = ClauseAlloc::with_capacity(current_size * 2);

    let mut new_clauses = vec![];
    let mut new_learned = vec![];

    for &cref in db.clauses.iter() {
        let clause = alloc.clause(cref);
        let mut header = *clause.header();
        if header.deleted() {
            continue;
        }

        let clause_is_asserting = header.mark();
        header.set_mark(false);

        let new_cref = new_alloc.add_clause(header, clause.lits());

        new_clauses.push(new_cref);
        if header.learned() {
            new_learned.push(new_cref);
        }

        if clause_is_asserting {
            let asserted_lit = clause.lits()[0];

            debug_assert_eq!(impl_graph.reason(asserted_lit.var()), &Reason::Long(cref));
            impl_graph.update_reason(asserted_lit.var(), Reason::Long(new_cref));
        }
    }

    debug!(
        "compacted clause storage from {} to {} words",
        alloc.buffer_size(),
        new_alloc.buffer_size()
    );

    *ctx.part_mut(ClauseAllocP) = new_alloc;
    db.clauses = new_clauses;
    db.learned = new_learned;
    db.garbage_size = 0;
}

/// Mark asserting clauses to track them through compaction.
fn mark_asserting_clauses(mut ctx: partial!(Context, mut ClauseAllocP, ImplGraphP, TrailP)) {
    let (trail, mut ctx) = ctx.split_part(TrailP);
    let (alloc, ctx) = ctx.split_part_mut(ClauseAllocP);
    let impl_graph = ctx.part(ImplGraphP);

    for &lit in trail.trail().iter() {
        if let &Reason::Long(cref) = impl_graph.reason(lit.var()) {
            alloc.header_mut(cref).set_mark(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cmp::max;

    use partial_ref::IntoPartialRefMut;
    use proptest::*;

    use tallysat_formula::{cnf::strategy::*, Lit};

    use crate::clause::{db, ClauseHeader};
    use crate::context::{set_var_count, AssignmentP};
    use crate::prop::enqueue_assignment;

    proptest! {
        #[test]
        fn compaction_keeps_live_clauses_and_reasons(
            input_a in cnf_formula(2..100usize, 100..500, 3..30),
            input_b in cnf_formula(2..100usize, 10..300, 4..20),
        ) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), max(input_a.var_count(), input_b.var_count()));

            let mut crefs_a = vec![];

            for lits in input_a.iter() {
                let mut header = ClauseHeader::new();
                header.set_learned(true);
                crefs_a.push(db::add_clause(ctx.borrow(), header, lits));
            }

            for lits in input_b.iter() {
                let cref = db::add_clause(ctx.borrow(), ClauseHeader::new(), lits);

                if ctx.part(AssignmentP).lit_value(lits[0]) == None {
                    // Not actually propagating, but compaction doesn't check that
                    enqueue_assignment(ctx.borrow(), lits[0], Reason::Long(cref));
                }
            }

            for cref in crefs_a {
                db::delete_clause(ctx.borrow(), cref);
            }

            let old_buffer_size = ctx.part(ClauseAllocP).buffer_size();

            compact_clauses(ctx.borrow());

            prop_assert_eq!(ctx.part(ClauseDbP).garbage_size(), 0);
            prop_assert!(old_buffer_size > ctx.part(ClauseAllocP).buffer_size());
            prop_assert!(!ctx.part(WatchlistsP).enabled());
            prop_assert!(ctx.part(ClauseDbP).learned.is_empty());

            let mut output_clauses: Vec<Vec<Lit>> = vec![];

            for &cref in ctx.part(ClauseDbP).clauses.iter() {
                let clause = ctx.part(ClauseAllocP).clause(cref);
                prop_assert!(!clause.header().mark());
                output_clauses.push(clause.lits().to_vec());
            }

            let mut input_clauses: Vec<Vec<Lit>> = input_b.iter().map(|c| c.to_vec()).collect();

            output_clauses.sort();
            input_clauses.sort();

            prop_assert_eq!(input_clauses, output_clauses);

            for &lit in ctx.part(TrailP).trail() {
                if let &Reason::Long(cref) = ctx.part(ImplGraphP).reason(lit.var()) {
                    prop_assert_eq!(ctx.part(ClauseAllocP).clause(cref).lits()[0], lit)
                }
            }
        }
    }
}
