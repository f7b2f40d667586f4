//! Clause allocator.
use std::mem::transmute;
use std::slice;

use crate::lit::{Lit, LitIdx};

use super::{Clause, ClauseHeader, HEADER_LEN};

/// Integer type used to store offsets into [`ClauseAlloc`]'s memory.
type ClauseOffset = u32;

/// Bump allocator for long clauses.
///
/// All clauses live in one continuous buffer of [`LitIdx`] words, each clause being its header
/// followed by its literals. Clauses are never freed individually, they are only flagged as
/// deleted. Compaction copies the surviving clauses into a fresh `ClauseAlloc`.
///
/// A [`ClauseRef`] is a word offset into the buffer and stays valid when the buffer grows.
///
/// **Safety**: The safe methods are memory safe even when given a `ClauseRef` of a different
/// allocator, as bounds are checked before the unchecked accessors are used.
#[derive(Default)]
pub struct ClauseAlloc {
    buffer: Vec<LitIdx>,
}

impl ClauseAlloc {
    /// Create a clause allocator with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> ClauseAlloc {
        ClauseAlloc {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Allocate space for and add a new clause.
    ///
    /// Unit and binary clauses are stored elsewhere, so clauses have at least 3 literals. This
    /// allows the propagation code to access the two watched literals without bound checks.
    ///
    /// The length stored in the header is overwritten by the length of `lits`.
    pub fn add_clause(&mut self, mut header: ClauseHeader, lits: &[Lit]) -> ClauseRef {
        let offset = self.buffer.len();

        assert!(
            lits.len() >= 3,
            "ClauseAlloc can only store ternary and larger clauses"
        );

        assert!(
            offset <= (ClauseOffset::max_value() as usize),
            "Exceeded ClauseAlloc's maximal buffer size"
        );

        header.set_len(lits.len());

        self.buffer.extend_from_slice(&header.data);

        let lit_idx_slice = unsafe {
            // Lit is a transparent wrapper of LitIdx
            slice::from_raw_parts(lits.as_ptr() as *const LitIdx, lits.len())
        };

        self.buffer.extend_from_slice(lit_idx_slice);

        ClauseRef {
            offset: offset as ClauseOffset,
        }
    }

    fn check_header_bounds(&self, cref: ClauseRef) {
        assert!(
            cref.offset as usize + HEADER_LEN <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
    }

    /// Access the header of a clause.
    pub fn header(&self, cref: ClauseRef) -> &ClauseHeader {
        self.check_header_bounds(cref);
        unsafe {
            let header_pointer =
                self.buffer.as_ptr().add(cref.offset as usize) as *const ClauseHeader;
            &*header_pointer
        }
    }

    /// Mutate the header of a clause.
    pub fn header_mut(&mut self, cref: ClauseRef) -> &mut ClauseHeader {
        self.check_header_bounds(cref);
        unsafe {
            let header_pointer =
                self.buffer.as_mut_ptr().add(cref.offset as usize) as *mut ClauseHeader;
            &mut *header_pointer
        }
    }

    /// Number of words covered by the clause, checked against the buffer.
    fn clause_words(&self, cref: ClauseRef) -> usize {
        let words = self.header(cref).len() + HEADER_LEN;
        assert!(
            cref.offset as usize + words <= self.buffer.len(),
            "ClauseRef out of bounds"
        );
        words
    }

    /// Access a clause.
    pub fn clause(&self, cref: ClauseRef) -> &Clause {
        let words = self.clause_words(cref);
        unsafe {
            transmute::<&[LitIdx], &Clause>(slice::from_raw_parts(
                self.buffer.as_ptr().add(cref.offset as usize),
                words,
            ))
        }
    }

    /// Mutate a clause.
    pub fn clause_mut(&mut self, cref: ClauseRef) -> &mut Clause {
        let words = self.clause_words(cref);
        unsafe {
            transmute::<&mut [LitIdx], &mut Clause>(slice::from_raw_parts_mut(
                self.buffer.as_mut_ptr().add(cref.offset as usize),
                words,
            ))
        }
    }

    /// Current buffer size in multiples of [`LitIdx`].
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

/// Compact reference to a long clause.
///
/// Used with [`ClauseAlloc`] to access the clause. Invalidated by compaction.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ClauseRef {
    offset: ClauseOffset,
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cnf::strategy::*;

    use proptest::*;

    proptest! {
        #[test]
        fn stored_clauses_keep_lits_and_headers(input in cnf_formula(1..100usize, 0..500, 3..30)) {
            let mut clause_alloc = ClauseAlloc::default();
            let mut clause_refs = vec![];

            for (index, clause_lits) in input.iter().enumerate() {
                let mut header = ClauseHeader::new();
                header.set_learned(index % 2 == 1);
                header.set_creation_time(index as u32);
                clause_refs.push(clause_alloc.add_clause(header, clause_lits));
            }

            for &cref in clause_refs.iter() {
                clause_alloc.clause_mut(cref).lits_mut().swap(0, 2);
                clause_alloc.header_mut(cref).set_activity(1.5);
            }

            for (index, (&cref, lits)) in clause_refs.iter().zip(input.iter()).enumerate() {
                let clause = clause_alloc.clause(cref);
                let mut expected = lits.to_vec();
                expected.swap(0, 2);

                prop_assert_eq!(clause.lits(), &expected[..]);
                prop_assert_eq!(clause.header().len(), lits.len());
                prop_assert_eq!(clause.header().learned(), index % 2 == 1);
                prop_assert_eq!(clause.header().creation_time(), index as u32);
                prop_assert_eq!(clause.header().activity(), 1.5);
            }
        }
    }
}
