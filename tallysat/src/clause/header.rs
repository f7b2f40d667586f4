//! Metadata stored in the header of each long clause.
use crate::lit::{LitIdx, Var};

/// Length of a [`ClauseHeader`] in multiples of [`LitIdx`]
pub(super) const HEADER_LEN: usize = 4;

const FLAGS_WORD: usize = 0;
const ACTIVITY_WORD: usize = 1;
const CREATION_WORD: usize = 2;
const LEN_WORD: usize = 3;

const DELETED_OFFSET: usize = 0;
const MARK_OFFSET: usize = 1;
const LEARNED_OFFSET: usize = 2;

/// Metadata for a clause.
///
/// This is stored in a [`ClauseAlloc`](super::ClauseAlloc) and thus must have a representation
/// compatible with slice of [`LitIdx`] values.
#[repr(transparent)]
#[derive(Copy, Clone, Default)]
pub struct ClauseHeader {
    pub(super) data: [LitIdx; HEADER_LEN],
}

impl ClauseHeader {
    /// Create a new clause header with default entries.
    pub fn new() -> ClauseHeader {
        Self::default()
    }

    /// Length of the clause.
    pub fn len(&self) -> usize {
        self.data[LEN_WORD] as usize
    }

    /// Set the length of the clause.
    ///
    /// Must be `<= Var::max_count()` as each variable may only be present once per clause.
    pub fn set_len(&mut self, length: usize) {
        debug_assert!(length <= Var::max_count());

        self.data[LEN_WORD] = length as LitIdx;
    }

    fn flag(&self, offset: usize) -> bool {
        (self.data[FLAGS_WORD] >> offset) & 1 != 0
    }

    fn set_flag(&mut self, offset: usize, value: bool) {
        let word = &mut self.data[FLAGS_WORD];
        *word = (*word & !(1 << offset)) | ((value as LitIdx) << offset);
    }

    /// Whether the clause is marked as deleted.
    pub fn deleted(&self) -> bool {
        self.flag(DELETED_OFFSET)
    }

    /// Mark the clause as deleted.
    pub fn set_deleted(&mut self, deleted: bool) {
        self.set_flag(DELETED_OFFSET, deleted)
    }

    /// Mark bit used to temporarily mark clauses.
    ///
    /// Has to be false outside of the function using it.
    pub fn mark(&self) -> bool {
        self.flag(MARK_OFFSET)
    }

    pub fn set_mark(&mut self, mark: bool) {
        self.set_flag(MARK_OFFSET, mark)
    }

    /// Whether the clause was learned from a conflict.
    ///
    /// Only learned clauses are ever deleted.
    pub fn learned(&self) -> bool {
        self.flag(LEARNED_OFFSET)
    }

    pub fn set_learned(&mut self, learned: bool) {
        self.set_flag(LEARNED_OFFSET, learned)
    }

    /// Clause activity, bumped whenever the clause propagates or conflicts.
    pub fn activity(&self) -> f32 {
        f32::from_bits(self.data[ACTIVITY_WORD])
    }

    pub fn set_activity(&mut self, activity: f32) {
        self.data[ACTIVITY_WORD] = activity.to_bits()
    }

    /// Number of conflicts seen when the clause was learned.
    pub fn creation_time(&self) -> u32 {
        self.data[CREATION_WORD]
    }

    pub fn set_creation_time(&mut self, time: u32) {
        self.data[CREATION_WORD] = time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_independent() {
        let mut header = ClauseHeader::new();
        assert_eq!(header.activity(), 0.0);

        header.set_learned(true);
        header.set_activity(2.5);
        header.set_creation_time(17);
        header.set_len(5);
        header.set_mark(true);

        assert!(header.learned());
        assert!(!header.deleted());
        assert!(header.mark());

        header.set_mark(false);
        header.set_deleted(true);

        assert!(header.learned());
        assert!(header.deleted());
        assert!(!header.mark());
        assert_eq!(header.activity(), 2.5);
        assert_eq!(header.creation_time(), 17);
        assert_eq!(header.len(), 5);
    }
}
