//! Miscellaneous solver state.
use crate::solver::Answer;

/// Progress of the search.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SearchState {
    /// Clauses may still be added.
    Loading,
    /// Preprocessing found the formula unsatisfiable.
    Unsat,
    /// The search loop was entered.
    Searching,
    /// The search ran to completion.
    Finished,
    /// The time limit was hit.
    TimedOut,
}

impl Default for SearchState {
    fn default() -> SearchState {
        SearchState::Loading
    }
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be moved into a separate
/// part of [`Context`](crate::context::Context).
#[derive(Default)]
pub struct SolverState {
    pub search_state: SearchState,
    /// An empty clause was loaded.
    pub formula_is_unsat: bool,
    pub answer: Option<Answer>,
}
