//! Scratch buffers shared between solver parts.
use crate::lit::Lit;

/// Reusable buffers, kept to avoid allocations in the search loop.
///
/// Each user leaves the buffers in the state documented here.
#[derive(Default)]
pub struct TmpData {
    /// Literal buffer. Taken by clause loading and failed literal probing, contents are arbitrary.
    pub lits: Vec<Lit>,
    /// Marks for literals, indexed by literal code.
    ///
    /// All false between uses.
    pub flags: Vec<bool>,
}

impl TmpData {
    pub fn set_var_count(&mut self, count: usize) {
        self.flags.resize(count * 2, false);
    }
}
