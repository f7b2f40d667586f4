//! The component based search.
//!
//! The search is a depth first traversal of the decision stack. Each level decides a variable of
//! the component it was created for. After propagating the decision, the component is split into
//! independent sub components, each of which is searched by a deeper level in turn. When all sub
//! components of a branch are done, the level switches to its second branch or combines both
//! branches and hands the result to the level below, caching it for the decided component.
//!
//! A conflict makes the active branch worthless. On a first branch the conflict is analyzed and
//! the learned clause asserts the negated decision, so the second branch starts with a propagation.
use partial_ref::{partial, PartialRef};

use crate::analyze_conflict::analyze_conflict;
use crate::cache::{CacheEntryId, PackConfig};
use crate::clause::activity::bump_clause;
use crate::clause::{db, ClauseHeader};
use crate::component::{
    clean_remaining_components, find_next_remaining_component, initialize,
    remove_all_cache_pollutions, ROOT_COMPONENT,
};
use crate::context::{parts::*, Context};
use crate::decision::{decide, initialize_activities};
use crate::prefix::QuantifierKind;
use crate::probe::implicit_bcp;
use crate::prop::assignment::truncate_trail;
use crate::prop::{backtrack as backtrack_trail, enqueue_assignment, propagate, Conflict, Reason};
use crate::schedule::{check_time, maintain_clauses};
use crate::solver::SolverError;
use crate::trace::{NodeId, FALSE_NODE, TRUE_NODE};
use crate::value::Value;

/// What to do after resolving a conflict or finishing a branch.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Step {
    /// Continue with the next component of the top level.
    ProcessComponent,
    /// The top level switched to its second branch, which needs propagation.
    Resolved,
    /// The active branch of the top level is done.
    Backtrack,
    /// The root level is done.
    Exit,
}

/// Prepare the component stack, cache and decision stack for a search of the whole formula.
///
/// Has to be called after preprocessing.
pub fn init_search(
    mut ctx: partial!(
        Context,
        mut CacheP,
        mut ComponentsP,
        mut DecisionStackP,
        mut VsadsP,
        AssignmentP,
        BinaryClausesP,
        ClauseAllocP,
        ClauseDbP,
        QuantifiersP,
        SolverConfigP,
        TraceP,
    ),
) {
    initialize(ctx.borrow());
    initialize_activities(ctx.borrow());

    let (analyzer, mut ctx) = ctx.split_part_mut(ComponentsP);
    let config = ctx.part(SolverConfigP);

    let pack_config = PackConfig::new(analyzer.var_count() as u32, analyzer.clause_count() as u32);
    let cache_max_bytes = config.cache_max_bytes;
    let caching = config.component_caching;

    let root_id = ctx.part_mut(CacheP).init(
        pack_config,
        cache_max_bytes,
        caching,
        analyzer.component(ROOT_COMPONENT),
    );
    analyzer.component_mut(ROOT_COMPONENT).set_cache_id(root_id);

    let quantified = ctx.part(QuantifiersP).is_quantified();
    let root_node = ctx.part(TraceP).root();
    ctx.part_mut(DecisionStackP)
        .init(ROOT_COMPONENT, ROOT_COMPONENT + 1, quantified, root_node);
}

/// Search the whole formula.
///
/// Returns the model count or satisfaction probability of the formula, not including the literals
/// assigned before the search.
pub fn search(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut CacheP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ComponentsP,
        mut DecisionStackP,
        mut ImplGraphP,
        mut ScheduleP,
        mut StatisticsP,
        mut TmpDataP,
        mut TraceP,
        mut TrailP,
        mut VsadsP,
        mut WatchlistsP,
        QuantifiersP,
        SolverConfigP,
    ),
) -> Result<Value, SolverError> {
    loop {
        let mut step = Step::ProcessComponent;

        while find_next_remaining_component(ctx.borrow()) {
            decide(ctx.borrow());

            if check_time(ctx.borrow()) {
                return Err(SolverError::Timeout);
            }

            while let Err(conflict) = bcp(ctx.borrow()) {
                step = resolve_conflict(ctx.borrow(), conflict);
                if step == Step::Backtrack {
                    break;
                }
            }
            if step == Step::Backtrack {
                break;
            }
        }

        if step != Step::Backtrack {
            mark_satisfied_leaf(ctx.borrow());
        }

        step = backtrack(ctx.borrow());
        if step == Step::Exit {
            return Ok(ctx.part(DecisionStackP).top().total_value());
        }

        while step != Step::ProcessComponent {
            let conflict = match bcp(ctx.borrow()) {
                Ok(()) => break,
                Err(conflict) => conflict,
            };
            step = resolve_conflict(ctx.borrow(), conflict);
            if step == Step::Backtrack {
                step = backtrack(ctx.borrow());
                if step == Step::Exit {
                    return Ok(ctx.part(DecisionStackP).top().total_value());
                }
            }
        }
    }
}

/// Record a branch without any sub component in the trace.
fn mark_satisfied_leaf(mut ctx: partial!(Context, mut TraceP, DecisionStackP)) {
    let top = ctx.part(DecisionStackP).top();
    if top.active_branch_unsat() {
        return;
    }
    let node = top.node();
    let trace = ctx.part_mut(TraceP);
    if let (Some(node), true) = (node, trace.enabled()) {
        if trace.active_branch_is_empty(node) {
            trace.add_child(node, TRUE_NODE);
        }
    }
}

/// Propagate the assignments of the top level.
///
/// Learned unit clauses over variables of the decided component are asserted first. On success
/// the probabilities of literals forced within the decided component are folded into the active
/// branch.
fn bcp(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut DecisionStackP,
        mut ImplGraphP,
        mut StatisticsP,
        mut TmpDataP,
        mut TraceP,
        mut TrailP,
        mut VsadsP,
        mut WatchlistsP,
        ComponentsP,
        QuantifiersP,
        SolverConfigP,
    ),
) -> Result<(), Conflict> {
    let level_start = ctx.part(TrailP).current_level_start();

    reassert_learned_units(ctx.borrow());

    propagate(ctx.borrow())?;

    let probing = ctx.part(SolverConfigP).failed_literal_probing;
    if probing && !ctx.part(QuantifiersP).is_quantified() {
        implicit_bcp(ctx.borrow(), level_start)?;
    }

    record_forced_literals(ctx.borrow(), level_start + 1);

    Ok(())
}

/// Assert learned unit clauses over variables of the decided component.
fn reassert_learned_units(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        ClauseDbP,
        DecisionStackP,
    ),
) {
    let (db, mut ctx) = ctx.split_part(ClauseDbP);
    for &lit in db.learned_units() {
        let free = ctx.part(AssignmentP).lit_is_unk(lit);
        if free && ctx.part(DecisionStackP).in_scope(lit.var()) {
            enqueue_assignment(ctx.borrow(), lit, Reason::Unit);
        }
    }
}

/// Fold the literals forced on the top level into its active branch.
///
/// Covers the trail from `start` on.
pub fn record_forced_literals(
    mut ctx: partial!(
        Context,
        mut DecisionStackP,
        mut TraceP,
        QuantifiersP,
        TrailP,
    ),
    start: usize,
) {
    let (stack, mut ctx) = ctx.split_part_mut(DecisionStackP);
    let (trace, ctx) = ctx.split_part_mut(TraceP);
    let quantifiers = ctx.part(QuantifiersP);
    let forced = &ctx.part(TrailP).trail()[start..];

    let quantified = quantifiers.is_quantified();
    let node = stack.top().node().filter(|_| trace.enabled());

    let mut exist_implied = vec![];
    let mut random_implied = vec![];

    for &lit in forced {
        if !stack.in_scope(lit.var()) {
            continue;
        }
        if quantified {
            stack.top_mut().include_path_prob(quantifiers.forced_factor(lit));
        }
        if node.is_some() {
            match quantifiers.kind(lit.var()) {
                QuantifierKind::Exists => exist_implied.push(lit),
                QuantifierKind::Random => random_implied.push(lit),
                QuantifierKind::Forall => (),
            }
        }
    }

    if let Some(node) = node {
        trace.record_implied(node, &exist_implied, &random_implied);
    }
}

/// Add the clause found by conflict analysis to the formula.
///
/// Returns the reason for asserting the first literal of the clause.
pub fn learn_clause(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut StatisticsP,
        mut WatchlistsP,
        AnalyzeConflictP,
    ),
) -> Reason {
    let (analyze, mut ctx) = ctx.split_part(AnalyzeConflictP);

    for &cref in analyze.involved() {
        bump_clause(ctx.borrow(), cref);
    }

    let statistics = ctx.part_mut(StatisticsP);
    statistics.learned_clauses += 1;
    let conflicts = statistics.conflicts;

    let clause = analyze.clause();
    match *clause {
        [lit] => {
            ctx.part_mut(StatisticsP).learned_units += 1;
            ctx.part_mut(ClauseDbP).add_learned_unit(lit);
            Reason::Unit
        }
        [lit_0, lit_1] => {
            ctx.part_mut(BinaryClausesP)
                .add_binary_clause([lit_0, lit_1], true);
            Reason::Binary([lit_1])
        }
        _ => {
            let mut header = ClauseHeader::new();
            header.set_learned(true);
            header.set_creation_time(conflicts as u32);
            Reason::Long(db::add_clause(ctx.borrow(), header, clause))
        }
    }
}

/// Handle a conflict found while propagating the top level.
fn resolve_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut CacheP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ComponentsP,
        mut DecisionStackP,
        mut ImplGraphP,
        mut ScheduleP,
        mut StatisticsP,
        mut TraceP,
        mut TrailP,
        mut VsadsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    conflict: Conflict,
) -> Step {
    ctx.part_mut(StatisticsP).conflicts += 1;

    let first_branch = !ctx.part(DecisionStackP).top().is_second_branch();
    let learning = first_branch && ctx.part(SolverConfigP).clause_learning;

    if learning {
        analyze_conflict(ctx.borrow(), conflict);
    }

    let top = ctx.part_mut(DecisionStackP).top_mut();
    top.mark_branch_unsat();
    let flip = first_branch && top.need_second_branch();
    let decision = top.decision();
    let node = top.node();

    let trace = ctx.part_mut(TraceP);
    if let (Some(node), true) = (node, trace.enabled()) {
        trace.add_child(node, FALSE_NODE);
    }

    let decision = match (flip, decision) {
        (true, Some(decision)) => decision,
        _ => {
            if learning {
                learn_clause(ctx.borrow());
                maintain_clauses(ctx.borrow());
            }
            return Step::Backtrack;
        }
    };

    ctx.part_mut(DecisionStackP).top_mut().change_branch();
    if let (Some(node), true) = (node, ctx.part(TraceP).enabled()) {
        ctx.part_mut(TraceP).change_branch(node);
    }
    reactivate_top(ctx.borrow());

    let reason = if learning {
        learn_clause(ctx.borrow())
    } else {
        Reason::Decision
    };
    debug_assert!(!learning || ctx.part(AnalyzeConflictP).clause()[0] == !decision.lit);

    enqueue_assignment(ctx.borrow(), !decision.lit, reason);

    if learning {
        maintain_clauses(ctx.borrow());
    }

    Step::Resolved
}

/// Undo all assignments of the top level, including its decision.
///
/// Unsolved components recorded on the level are dropped, so the level starts over on its active
/// branch. The level stays open on the trail.
fn reactivate_top(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut CacheP,
        mut ComponentsP,
        mut DecisionStackP,
        mut TrailP,
    ),
) {
    let level_start = ctx.part(TrailP).current_level_start();
    truncate_trail(ctx.borrow(), level_start);
    clean_remaining_components(ctx.borrow());
    ctx.part_mut(DecisionStackP)
        .top_mut()
        .reset_remaining_components();
}

/// Finish the active branch of the top level.
///
/// Switches to the second branch when needed. Otherwise combines both branches, caches the result
/// for the decided component and hands it to the level below, repeating there.
fn backtrack(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut CacheP,
        mut ComponentsP,
        mut DecisionStackP,
        mut StatisticsP,
        mut TraceP,
        mut TrailP,
        mut ImplGraphP,
    ),
) -> Step {
    loop {
        let top = ctx.part(DecisionStackP).top();
        let node = top.node().filter(|_| ctx.part(TraceP).enabled());

        if top.active_branch_unsat() {
            remove_all_cache_pollutions(ctx.borrow());
            if let Some(node) = node {
                ctx.part_mut(TraceP).clear_branch(node);
            }
        } else if top.another_component_processible() {
            return Step::ProcessComponent;
        } else if top.second_branch_dominated() {
            prune_dominated_branch(ctx.borrow(), node);
        }

        let top = ctx.part_mut(DecisionStackP).top_mut();
        if let (false, Some(decision)) = (top.is_second_branch(), top.decision()) {
            if top.need_second_branch() {
                top.change_branch();
                if let Some(node) = node {
                    ctx.part_mut(TraceP).change_branch(node);
                }
                reactivate_top(ctx.borrow());
                enqueue_assignment(ctx.borrow(), !decision.lit, Reason::Decision);
                return Step::Resolved;
            }
            top.change_branch();
            if let Some(node) = node {
                ctx.part_mut(TraceP).skip_second_branch(node);
            }
        }

        let top = ctx.part(DecisionStackP).top();
        let total = top.total_value();
        let existential = top
            .decision()
            .map_or(false, |decision| decision.quantifier == QuantifierKind::Exists);
        let max_branch = Some(top.max_branch()).filter(|_| existential && top.quantified());
        let super_component = top.super_component();

        if let (Some(node), Some(max_branch)) = (node, max_branch) {
            ctx.part_mut(TraceP).set_max_branch(node, max_branch);
        }

        let cache_id = ctx
            .part(ComponentsP)
            .component(super_component)
            .cache_id();
        store_value(ctx.borrow(), cache_id, &total, node);

        if ctx.part(DecisionStackP).decision_level() == 0 {
            return Step::Exit;
        }

        reactivate_top(ctx.borrow());
        let level = ctx.part(TrailP).current_level();
        backtrack_trail(ctx.borrow(), level - 1);

        let stack = ctx.part_mut(DecisionStackP);
        stack.pop();
        let parent = stack.top_mut();
        parent.include_value(&total);
        parent.next_unprocessed_component();
        let parent_node = parent.node();

        if let (Some(parent_node), Some(node)) = (parent_node, node) {
            ctx.part_mut(TraceP).add_child(parent_node, node);
        }
    }
}

/// Stop the second branch of the top level once it cannot beat the first one.
///
/// The unsolved components of the branch are dropped. Their value cannot change the maximum of
/// the level.
fn prune_dominated_branch(
    mut ctx: partial!(
        Context,
        mut CacheP,
        mut ComponentsP,
        mut StatisticsP,
        mut TraceP,
        DecisionStackP,
    ),
    node: Option<NodeId>,
) {
    clean_remaining_components(ctx.borrow());
    ctx.part_mut(StatisticsP).dominated_branches += 1;
    if let Some(node) = node {
        ctx.part_mut(TraceP).prune_active_branch(node);
    }
}

/// Cache the value of a solved component.
fn store_value(
    mut ctx: partial!(Context, mut CacheP, mut TraceP),
    cache_id: CacheEntryId,
    value: &Value,
    node: Option<NodeId>,
) {
    let cache = ctx.part_mut(CacheP);
    if !cache.has_entry(cache_id) {
        return;
    }
    if cache.store_value_of(cache_id, value.clone(), node) {
        if let Some(node) = node {
            ctx.part_mut(TraceP).retain(node);
        }
    }
    for node in ctx.part_mut(CacheP).take_released_nodes() {
        ctx.part_mut(TraceP).release(node);
    }
}
