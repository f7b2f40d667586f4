//! Central solver data structure.
use partial_ref::{part, partial, PartialRef, PartialRefTarget};

use crate::analyze_conflict::AnalyzeConflict;
use crate::binary::BinaryClauses;
use crate::cache::ComponentCache;
use crate::clause::{ClauseAlloc, ClauseDb};
use crate::component::ComponentAnalyzer;
use crate::config::SolverConfig;
use crate::decision::vsads::Vsads;
use crate::prop::{Assignment, ImplGraph, Trail, Watchlists};
use crate::quantifiers::Quantifiers;
use crate::schedule::Schedule;
use crate::stack::DecisionStack;
use crate::state::SolverState;
use crate::stats::Statistics;
use crate::tmp::TmpData;
use crate::trace::Trace;

/// Part declarations for the [`Context`] struct.
pub mod parts {
    use super::*;

    part!(pub AnalyzeConflictP: AnalyzeConflict);
    part!(pub AssignmentP: Assignment);
    part!(pub BinaryClausesP: BinaryClauses);
    part!(pub CacheP: ComponentCache);
    part!(pub ClauseAllocP: ClauseAlloc);
    part!(pub ClauseDbP: ClauseDb);
    part!(pub ComponentsP: ComponentAnalyzer);
    part!(pub DecisionStackP: DecisionStack);
    part!(pub ImplGraphP: ImplGraph);
    part!(pub QuantifiersP: Quantifiers);
    part!(pub ScheduleP: Schedule);
    part!(pub SolverConfigP: SolverConfig);
    part!(pub SolverStateP: SolverState);
    part!(pub StatisticsP: Statistics);
    part!(pub TmpDataP: TmpData);
    part!(pub TraceP: Trace);
    part!(pub TrailP: Trail);
    part!(pub VsadsP: Vsads);
    part!(pub WatchlistsP: Watchlists);
}

pub use parts::*;

/// Central solver data structure.
///
/// This struct contains all data kept by the solver. Most functions operating on multiple fields of
/// the context use partial references provided by the `partial_ref` crate. This documents the data
/// dependencies and makes the borrow checker happy without the overhead of passing individual
/// references.
#[derive(PartialRefTarget, Default)]
pub struct Context {
    #[part = "AnalyzeConflictP"]
    pub analyze_conflict: AnalyzeConflict,
    #[part = "AssignmentP"]
    pub assignment: Assignment,
    #[part = "BinaryClausesP"]
    pub binary_clauses: BinaryClauses,
    #[part = "CacheP"]
    pub cache: ComponentCache,
    #[part = "ClauseAllocP"]
    pub clause_alloc: ClauseAlloc,
    #[part = "ClauseDbP"]
    pub clause_db: ClauseDb,
    #[part = "ComponentsP"]
    pub components: ComponentAnalyzer,
    #[part = "DecisionStackP"]
    pub decision_stack: DecisionStack,
    #[part = "ImplGraphP"]
    pub impl_graph: ImplGraph,
    #[part = "QuantifiersP"]
    pub quantifiers: Quantifiers,
    #[part = "ScheduleP"]
    pub schedule: Schedule,
    #[part = "SolverConfigP"]
    pub solver_config: SolverConfig,
    #[part = "SolverStateP"]
    pub solver_state: SolverState,
    #[part = "StatisticsP"]
    pub statistics: Statistics,
    #[part = "TmpDataP"]
    pub tmp_data: TmpData,
    #[part = "TraceP"]
    pub trace: Trace,
    #[part = "TrailP"]
    pub trail: Trail,
    #[part = "VsadsP"]
    pub vsads: Vsads,
    #[part = "WatchlistsP"]
    pub watchlists: Watchlists,
}

/// Update structures for a new variable count.
pub fn set_var_count(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut DecisionStackP,
        mut ImplGraphP,
        mut QuantifiersP,
        mut TmpDataP,
        mut VsadsP,
        mut WatchlistsP,
    ),
    count: usize,
) {
    ctx.part_mut(AnalyzeConflictP).set_var_count(count);
    ctx.part_mut(AssignmentP).set_var_count(count);
    ctx.part_mut(BinaryClausesP).set_var_count(count);
    ctx.part_mut(DecisionStackP).set_var_count(count);
    ctx.part_mut(ImplGraphP).set_var_count(count);
    ctx.part_mut(QuantifiersP).set_var_count(count);
    ctx.part_mut(TmpDataP).set_var_count(count);
    ctx.part_mut(VsadsP).set_var_count(count);
    ctx.part_mut(WatchlistsP).set_var_count(count);
}

/// Increases the variable count to at least the given value.
pub fn ensure_var_count(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut DecisionStackP,
        mut ImplGraphP,
        mut QuantifiersP,
        mut TmpDataP,
        mut VsadsP,
        mut WatchlistsP,
    ),
    count: usize,
) {
    if count > ctx.part(AssignmentP).assignment().len() {
        set_var_count(ctx.borrow(), count)
    }
}
