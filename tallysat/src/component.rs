//! Decomposition of the residual formula into independent components.
//!
//! A component is a set of unassigned variables together with the unsatisfied long clauses over
//! them, closed under sharing clauses. Components of the same residual formula have no variables
//! in common, so their values multiply.
//!
//! The analyzer keeps a snapshot of the irredundant formula taken before the search starts. Learned
//! clauses are implied by that formula and never connect components.
use partial_ref::{partial, PartialRef};

use crate::cache::{CacheEntryId, NIL_ENTRY};
use crate::clause::db;
use crate::context::{parts::*, Context};
use crate::lit::{Lit, Var};
use crate::prefix::QuantifierKind;
use crate::quantifiers::Quantifiers;
use crate::value::Value;

/// 1-based index of an irredundant long clause in the analyzer's snapshot.
pub type ClauseId = u32;

/// Position of the whole formula on the component stack.
pub const ROOT_COMPONENT: usize = 1;

/// A set of variables and long clauses, both sorted.
#[derive(Clone, Debug, Default)]
pub struct Component {
    vars: Vec<Var>,
    clauses: Vec<ClauseId>,
    cache_id: CacheEntryId,
}

impl Component {
    pub fn new(mut vars: Vec<Var>, mut clauses: Vec<ClauseId>) -> Component {
        vars.sort_unstable();
        clauses.sort_unstable();
        Component {
            vars,
            clauses,
            cache_id: NIL_ENTRY,
        }
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn clauses(&self) -> &[ClauseId] {
        &self.clauses
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Cache entry created for this component, [`NIL_ENTRY`] if none.
    pub fn cache_id(&self) -> CacheEntryId {
        self.cache_id
    }

    pub fn set_cache_id(&mut self, id: CacheEntryId) {
        self.cache_id = id;
    }
}

/// Search state of a variable or clause during a decomposition pass.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Mark {
    /// Not part of the super component, assigned or satisfied.
    Outside,
    /// Part of the super component, not reached yet.
    InSuperComponent,
    /// Reached by the search for the current component.
    Seen,
    /// Part of a component already recorded in this pass.
    Done,
}

impl Default for Mark {
    fn default() -> Mark {
        Mark::Outside
    }
}

/// Finds the components of a super component and owns the component stack.
#[derive(Default)]
pub struct ComponentAnalyzer {
    /// Indexed by literal code, the other literals of binary clauses containing the literal.
    binary_partners: Vec<Vec<Lit>>,
    /// Indexed by literal code, the long clauses containing the literal.
    occurrences: Vec<Vec<ClauseId>>,
    /// Literals of all long clauses, back to back.
    clause_lits: Vec<Lit>,
    /// Start of each clause in `clause_lits`, indexed by clause id, with a final end marker.
    clause_starts: Vec<usize>,

    var_marks: Vec<Mark>,
    clause_marks: Vec<Mark>,
    /// Number of clause occurrences within the current super component.
    freq: Vec<u32>,
    /// Occurrences of each polarity within the current component, used for pure literals.
    polarity_counts: Vec<[u32; 2]>,
    search_stack: Vec<Var>,
    pure_stack: Vec<Var>,

    /// Index 0 holds an empty sentinel, index 1 the whole formula.
    stack: Vec<Component>,
}

impl ComponentAnalyzer {
    pub fn var_count(&self) -> usize {
        self.var_marks.len()
    }

    /// Number of long clauses in the snapshot.
    pub fn clause_count(&self) -> usize {
        self.clause_starts.len().saturating_sub(2)
    }

    /// Frequency of a variable within the super component of the last decomposition pass.
    pub fn freq(&self, var: Var) -> u32 {
        self.freq[var.index()]
    }

    /// Irredundant long clauses containing a literal.
    pub fn occurrences(&self, lit: Lit) -> &[ClauseId] {
        &self.occurrences[lit.code()]
    }

    /// Literals of an irredundant long clause.
    pub fn clause_lits(&self, clause: ClauseId) -> &[Lit] {
        let index = clause as usize;
        &self.clause_lits[self.clause_starts[index]..self.clause_starts[index + 1]]
    }

    /// Number of irredundant clauses of any length containing a literal.
    pub fn occurrence_count(&self, lit: Lit) -> usize {
        self.binary_partners[lit.code()].len() + self.occurrences[lit.code()].len()
    }

    pub fn component(&self, index: usize) -> &Component {
        &self.stack[index]
    }

    pub fn component_mut(&mut self, index: usize) -> &mut Component {
        &mut self.stack[index]
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    fn push_component(&mut self, component: Component) {
        self.stack.push(component);
    }

    /// Reset marks and frequencies for the vars and clauses of a super component.
    fn set_super_component(&mut self, index: usize, assignment: &[Option<bool>]) {
        let super_component = &self.stack[index];
        for &var in super_component.vars.iter() {
            if assignment[var.index()].is_none() {
                self.var_marks[var.index()] = Mark::InSuperComponent;
                self.freq[var.index()] = 0;
            }
        }
        for &clause in super_component.clauses.iter() {
            self.clause_marks[clause as usize] = Mark::InSuperComponent;
        }
    }

    /// Reset all marks touched by a pass over the given super component.
    fn clear_super_component(&mut self, index: usize) {
        let super_component = &self.stack[index];
        for &var in super_component.vars.iter() {
            self.var_marks[var.index()] = Mark::Outside;
        }
        for &clause in super_component.clauses.iter() {
            self.clause_marks[clause as usize] = Mark::Outside;
        }
    }

    /// Search the component containing `var`.
    ///
    /// On return the vars and clauses of the component are marked as seen and the search stack
    /// holds all vars reached.
    fn search_component_of(&mut self, var: Var, assignment: &[Option<bool>]) {
        self.search_stack.clear();
        self.search_stack.push(var);
        self.var_marks[var.index()] = Mark::Seen;

        let mut pos = 0;
        while pos < self.search_stack.len() {
            let var = self.search_stack[pos];
            pos += 1;

            for &lit in [var.positive(), var.negative()].iter() {
                for index in 0..self.binary_partners[lit.code()].len() {
                    let partner = self.binary_partners[lit.code()][index].var();
                    if self.var_marks[partner.index()] == Mark::InSuperComponent {
                        self.var_marks[partner.index()] = Mark::Seen;
                        self.search_stack.push(partner);
                        self.freq[partner.index()] += 1;
                        self.freq[var.index()] += 1;
                    }
                }
            }

            for &lit in [var.positive(), var.negative()].iter() {
                for index in 0..self.occurrences[lit.code()].len() {
                    let clause = self.occurrences[lit.code()][index];
                    if self.clause_marks[clause as usize] == Mark::InSuperComponent {
                        self.search_clause(clause, assignment);
                    }
                }
            }
        }
    }

    /// Add the vars of an unvisited clause to the current search.
    ///
    /// A clause with a literal outside of the super component that is not false is satisfied. In
    /// that case everything the clause added is rolled back and the clause is marked as outside.
    fn search_clause(&mut self, clause: ClauseId, assignment: &[Option<bool>]) {
        let rollback_len = self.search_stack.len();
        let start = self.clause_starts[clause as usize];
        let end = self.clause_starts[clause as usize + 1];

        for pos in start..end {
            let lit = self.clause_lits[pos];
            let var = lit.var();
            match self.var_marks[var.index()] {
                Mark::Outside => {
                    let is_false = assignment[var.index()] == Some(lit.is_negative());
                    if is_false {
                        continue;
                    }
                    for &var in self.search_stack[rollback_len..].iter() {
                        self.var_marks[var.index()] = Mark::InSuperComponent;
                    }
                    self.search_stack.truncate(rollback_len);
                    for &lit in self.clause_lits[start..pos].iter() {
                        let freq = &mut self.freq[lit.index()];
                        *freq = freq.saturating_sub(1);
                    }
                    self.clause_marks[clause as usize] = Mark::Outside;
                    return;
                }
                mark => {
                    self.freq[var.index()] += 1;
                    if mark == Mark::InSuperComponent {
                        self.var_marks[var.index()] = Mark::Seen;
                        self.search_stack.push(var);
                    }
                }
            }
        }

        self.clause_marks[clause as usize] = Mark::Seen;
    }

    /// Drop existential variables occurring in one polarity only from the current component.
    ///
    /// The clauses satisfied by such a literal are dropped with it, which can make further
    /// variables pure. Returns the pure literals found.
    fn eliminate_pure_literals(&mut self, quantifiers: &Quantifiers) -> Vec<Lit> {
        let mut pure_lits = vec![];
        self.pure_stack.clear();

        for index in 0..self.search_stack.len() {
            let var = self.search_stack[index];
            let mut counts = [0; 2];
            for (polarity, &lit) in [var.positive(), var.negative()].iter().enumerate() {
                counts[polarity] = self.binary_partners[lit.code()]
                    .iter()
                    .filter(|partner| self.var_marks[partner.index()] == Mark::Seen)
                    .count() as u32
                    + self.occurrences[lit.code()]
                        .iter()
                        .filter(|&&clause| self.clause_marks[clause as usize] == Mark::Seen)
                        .count() as u32;
            }
            self.polarity_counts[var.index()] = counts;
            if quantifiers.kind(var) == QuantifierKind::Exists
                && (counts[0] == 0) != (counts[1] == 0)
            {
                self.pure_stack.push(var);
            }
        }

        while let Some(var) = self.pure_stack.pop() {
            if self.var_marks[var.index()] != Mark::Seen {
                continue;
            }
            let counts = self.polarity_counts[var.index()];
            if (counts[0] == 0) == (counts[1] == 0) {
                continue;
            }

            let pure_lit = var.lit(counts[0] != 0);
            self.var_marks[var.index()] = Mark::Outside;
            pure_lits.push(pure_lit);

            for index in 0..self.binary_partners[pure_lit.code()].len() {
                let partner = self.binary_partners[pure_lit.code()][index];
                self.remove_occurrence(partner, quantifiers);
            }

            for index in 0..self.occurrences[pure_lit.code()].len() {
                let clause = self.occurrences[pure_lit.code()][index];
                if self.clause_marks[clause as usize] != Mark::Seen {
                    continue;
                }
                self.clause_marks[clause as usize] = Mark::Outside;
                let start = self.clause_starts[clause as usize];
                let end = self.clause_starts[clause as usize + 1];
                for pos in start..end {
                    let lit = self.clause_lits[pos];
                    self.remove_occurrence(lit, quantifiers);
                }
            }
        }

        pure_lits
    }

    /// Account for a satisfied clause containing `lit`.
    fn remove_occurrence(&mut self, lit: Lit, quantifiers: &Quantifiers) {
        let var = lit.var();
        if self.var_marks[var.index()] != Mark::Seen || quantifiers.kind(var) != QuantifierKind::Exists {
            return;
        }
        let counts = &mut self.polarity_counts[var.index()];
        let polarity = lit.is_negative() as usize;
        counts[polarity] = counts[polarity].saturating_sub(1);
        if counts[polarity] == 0 && counts[polarity ^ 1] != 0 {
            self.pure_stack.push(var);
        }
    }

    /// Collect the seen vars and clauses of the super component into a new component.
    fn collect_component(&mut self, super_index: usize) -> Component {
        let super_component = &self.stack[super_index];
        let mut component = Component::default();

        for &var in super_component.vars.iter() {
            if self.var_marks[var.index()] == Mark::Seen {
                component.vars.push(var);
                self.var_marks[var.index()] = Mark::Done;
            }
        }
        for &clause in super_component.clauses.iter() {
            if self.clause_marks[clause as usize] == Mark::Seen {
                component.clauses.push(clause);
                self.clause_marks[clause as usize] = Mark::Done;
            }
        }

        component
    }

    /// Unsolved components from `start` on, topmost first.
    pub fn components_from(&self, start: usize) -> &[Component] {
        &self.stack[start.min(self.stack.len())..]
    }
}

/// Snapshot the loaded formula and push the component of the whole formula.
///
/// Has to be called after preprocessing, before any clause is learned.
pub fn initialize(
    mut ctx: partial!(
        Context,
        mut ComponentsP,
        AssignmentP,
        BinaryClausesP,
        ClauseAllocP,
        ClauseDbP,
    ),
) {
    let (analyzer, mut ctx) = ctx.split_part_mut(ComponentsP);
    let (assignment, mut ctx) = ctx.split_part(AssignmentP);
    let (binary_clauses, mut ctx) = ctx.split_part(BinaryClausesP);
    let assignment = assignment.assignment();
    let var_count = assignment.len();

    *analyzer = ComponentAnalyzer::default();
    analyzer.binary_partners = vec![vec![]; var_count * 2];
    analyzer.occurrences = vec![vec![]; var_count * 2];
    analyzer.var_marks = vec![Mark::Outside; var_count];
    analyzer.freq = vec![0; var_count];
    analyzer.polarity_counts = vec![[0; 2]; var_count];

    for [a, b] in binary_clauses.clauses() {
        analyzer.binary_partners[a.code()].push(b);
        analyzer.binary_partners[b.code()].push(a);
    }

    analyzer.clause_starts.push(0);
    analyzer.clause_starts.push(0);

    let crefs: Vec<_> = db::clauses_iter(&ctx.borrow()).collect();
    let alloc = ctx.part(ClauseAllocP);
    for cref in crefs {
        let clause = alloc.clause(cref);
        if clause.header().learned() {
            continue;
        }
        let id = (analyzer.clause_starts.len() - 1) as ClauseId;
        for &lit in clause.lits() {
            analyzer.occurrences[lit.code()].push(id);
        }
        analyzer.clause_lits.extend_from_slice(clause.lits());
        analyzer.clause_starts.push(analyzer.clause_lits.len());
    }

    let clause_count = analyzer.clause_count();
    analyzer.clause_marks = vec![Mark::Outside; clause_count + 1];

    let root_vars = (0..var_count)
        .filter(|&index| assignment[index].is_none())
        .map(Var::from_index)
        .collect();
    let root_clauses = (1..=clause_count as ClauseId).collect();

    analyzer.stack = vec![Component::default(), Component::new(root_vars, root_clauses)];
    debug_assert_eq!(analyzer.stack.len(), ROOT_COMPONENT + 1);
}

/// Split the super component of the top decision level into components.
///
/// Singleton components and components found in the cache are folded into the value of the
/// active branch right away, all other components are pushed on the component stack, largest
/// first so the smallest is processed first.
pub fn record_remaining_components(
    mut ctx: partial!(
        Context,
        mut CacheP,
        mut ComponentsP,
        mut DecisionStackP,
        mut StatisticsP,
        mut TraceP,
        AssignmentP,
        QuantifiersP,
        SolverConfigP,
    ),
) {
    let (analyzer, mut ctx) = ctx.split_part_mut(ComponentsP);
    let (stack, mut ctx) = ctx.split_part_mut(DecisionStackP);
    let (cache, mut ctx) = ctx.split_part_mut(CacheP);
    let (trace, mut ctx) = ctx.split_part_mut(TraceP);
    let (statistics, mut ctx) = ctx.split_part_mut(StatisticsP);
    let (assignment, mut ctx) = ctx.split_part(AssignmentP);
    let (quantifiers, ctx) = ctx.split_part(QuantifiersP);
    let assignment = assignment.assignment();
    let quantified = quantifiers.is_quantified();
    let pure_literals = quantified && ctx.part(SolverConfigP).pure_literals;

    let top = stack.top_mut();
    let super_index = top.super_component();
    let super_cache_id = analyzer.stack[super_index].cache_id;
    let node = top.node();
    let start = analyzer.stack.len();

    analyzer.set_super_component(super_index, assignment);

    for index in 0..analyzer.stack[super_index].vars.len() {
        let var = analyzer.stack[super_index].vars[index];
        if analyzer.var_marks[var.index()] != Mark::InSuperComponent {
            continue;
        }

        analyzer.search_component_of(var, assignment);

        if analyzer.search_stack.len() == 1 {
            analyzer.var_marks[var.index()] = Mark::Done;
            top.include_value(&Value::free_var(quantified));
            if let (Some(node), true) = (node, trace.enabled()) {
                trace.add_free_var(node, var);
            }
            continue;
        }

        if pure_literals {
            let pure_lits = analyzer.eliminate_pure_literals(quantifiers);
            if let (Some(node), true) = (node, trace.enabled()) {
                for lit in pure_lits {
                    trace.add_pure(node, lit);
                }
            }
        }

        let mut component = analyzer.collect_component(super_index);

        match component.var_count() {
            0 => continue,
            1 => {
                top.include_value(&Value::free_var(quantified));
                if let (Some(node), true) = (node, trace.enabled()) {
                    trace.add_free_var(node, component.vars()[0]);
                }
                continue;
            }
            _ => (),
        }

        statistics.components += 1;

        let cached = if quantified {
            cache
                .request_prob_of(&component)
                .map(|(prob, node)| (Value::Probability(prob), node))
        } else {
            cache.request_value_of(&component)
        };

        if let Some((value, cached_node)) = cached {
            top.include_value(&value);
            if let (Some(node), Some(cached_node), true) = (node, cached_node, trace.enabled()) {
                trace.add_child(node, cached_node);
            }
            continue;
        }

        let id = cache.create_entry_for(&component, super_cache_id);
        component.set_cache_id(id);
        analyzer.push_component(component);
    }

    analyzer.clear_super_component(super_index);

    analyzer.stack[start..].sort_by(|a, b| b.var_count().cmp(&a.var_count()));
    top.set_unprocessed_end(analyzer.stack.len());
}

/// Whether the top decision level has a component left to process.
///
/// Decomposes the super component first if that did not happen yet. When nothing is left the
/// active branch is satisfied by the current assignment alone.
pub fn find_next_remaining_component(
    mut ctx: partial!(
        Context,
        mut CacheP,
        mut ComponentsP,
        mut DecisionStackP,
        mut StatisticsP,
        mut TraceP,
        AssignmentP,
        QuantifiersP,
        SolverConfigP,
    ),
) -> bool {
    let stack_len = ctx.part(ComponentsP).stack_len();
    if stack_len <= ctx.part(DecisionStackP).top().remaining_ofs() {
        record_remaining_components(ctx.borrow());
    }

    let quantified = ctx.part(QuantifiersP).is_quantified();
    let top = ctx.part_mut(DecisionStackP).top_mut();
    debug_assert!(!top.active_branch_unsat());

    if top.another_component_processible() {
        return true;
    }

    top.include_value(&Value::one(quantified));
    false
}

/// Pop all unsolved components above the remaining offset of the top decision level.
///
/// Their cache entries are no longer anchored by the component stack.
pub fn clean_remaining_components(
    mut ctx: partial!(Context, mut CacheP, mut ComponentsP, DecisionStackP),
) {
    let remaining_ofs = ctx.part(DecisionStackP).top().remaining_ofs();
    let (analyzer, mut ctx) = ctx.split_part_mut(ComponentsP);
    let cache = ctx.part_mut(CacheP);

    while analyzer.stack.len() > remaining_ofs.max(2) {
        if let Some(component) = analyzer.stack.pop() {
            if cache.has_entry(component.cache_id) {
                cache.make_deletable(component.cache_id);
            }
        }
    }
}

/// Drop cache entries computed below a branch that turned out unsatisfiable.
///
/// All components recorded for the top decision level lose their cache entries together with
/// everything cached below them.
pub fn remove_all_cache_pollutions(
    mut ctx: partial!(Context, mut CacheP, mut ComponentsP, mut StatisticsP, DecisionStackP),
) {
    let remaining_ofs = ctx.part(DecisionStackP).top().remaining_ofs();
    let (analyzer, mut ctx) = ctx.split_part_mut(ComponentsP);
    let cache = ctx.part_mut(CacheP);

    for index in remaining_ofs..analyzer.stack.len() {
        let component = &mut analyzer.stack[index];
        if cache.has_entry(component.cache_id) {
            cache.clean_pollutions_involving(component.cache_id);
        }
        component.cache_id = NIL_ENTRY;
    }

    let polluted = cache.stats().polluted;
    ctx.part_mut(StatisticsP).cache_polluted = polluted;
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use tallysat_formula::{cnf_formula, lit, var, vars, CnfFormula};

    use crate::cache::{PackConfig, ROOT_ENTRY};
    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::prefix::{Prefix, Quantifier};
    use crate::prop::{enqueue_assignment, propagate, Reason};

    fn load(ctx: &mut Context, formula: &CnfFormula) {
        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }
    }

    fn start(ctx: &mut Context) {
        let mut ctx = ctx.into_partial_ref_mut();
        initialize(ctx.borrow());
        let analyzer = ctx.part(ComponentsP);
        let pack_config = PackConfig::new(analyzer.var_count() as u32, analyzer.clause_count() as u32);
        let root = analyzer.component(1).clone();
        let id = ctx
            .part_mut(CacheP)
            .init(pack_config, usize::max_value(), true, &root);
        ctx.part_mut(ComponentsP).component_mut(1).set_cache_id(id);
        let quantified = ctx.part(QuantifiersP).is_quantified();
        ctx.part_mut(DecisionStackP)
            .init(ROOT_COMPONENT, ROOT_COMPONENT + 1, quantified, None);
    }

    fn assign(ctx: &mut Context, lit: Lit) {
        let mut ctx = ctx.into_partial_ref_mut();
        enqueue_assignment(ctx.borrow(), lit, Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());
    }

    #[test]
    fn independent_parts_become_components() {
        let mut ctx = Context::default();
        load(
            &mut ctx,
            &cnf_formula![
                1, 2, 3;
                -3, 4;
                5, 6, 7;
                -7, -8, 6;
            ],
        );
        ctx.solver_config.pure_literals = false;
        start(&mut ctx);

        let mut ctx = ctx.into_partial_ref_mut();
        assert!(find_next_remaining_component(ctx.borrow()));

        let analyzer = ctx.part(ComponentsP);
        let components = analyzer.components_from(2);
        assert_eq!(components.len(), 2);
        // Equal sizes keep the discovery order
        assert_eq!(components[0].vars(), &vars![1, 2, 3, 4]);
        assert_eq!(components[1].vars(), &vars![5, 6, 7, 8]);
        assert_eq!(components[0].clauses().len(), 1);
        assert_eq!(components[1].clauses().len(), 2);
        assert!(components.iter().all(|c| c.cache_id() > ROOT_ENTRY));

        assert_eq!(analyzer.freq(var!(3)), 2);
        assert_eq!(ctx.part(StatisticsP).components, 2);
    }

    #[test]
    fn satisfied_clauses_split_components() {
        let mut ctx = Context::default();
        load(
            &mut ctx,
            &cnf_formula![
                1, 2, 3;
                3, 4, 5;
                -6, 7;
            ],
        );
        ctx.solver_config.pure_literals = false;
        start(&mut ctx);

        // Prefill the super component with an assignment of 3 at a decision level
        ctx.trail.new_decision_level();
        assign(&mut ctx, lit!(3));

        let mut ctx = ctx.into_partial_ref_mut();
        assert!(find_next_remaining_component(ctx.borrow()));

        let analyzer = ctx.part(ComponentsP);
        let components = analyzer.components_from(2);

        // 1, 2, 4, 5 are free singletons, 6 and 7 share a binary clause
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].vars(), &vars![6, 7]);
        assert!(components[0].clauses().is_empty());

        let top = ctx.part(DecisionStackP).top();
        assert_eq!(
            top.branch_value(1),
            Some(&Value::Count(num_bigint::BigUint::from(16u32)))
        );
    }

    #[test]
    fn free_singletons_are_traced() {
        let mut ctx = Context::default();
        load(
            &mut ctx,
            &cnf_formula![
                1, 2, 3;
                3, 4, 5;
                -6, 7;
            ],
        );
        ctx.solver_config.pure_literals = false;
        start(&mut ctx);

        ctx.trail.new_decision_level();
        assign(&mut ctx, lit!(3));

        let mut ctx = ctx.into_partial_ref_mut();
        let trace = ctx.part_mut(TraceP);
        trace.enable();
        let root = trace.new_root();
        ctx.part_mut(DecisionStackP)
            .init(ROOT_COMPONENT, ROOT_COMPONENT + 1, false, Some(root));

        assert!(find_next_remaining_component(ctx.borrow()));

        let branch = &ctx.part(TraceP).node(root).unwrap().branches[1];
        assert_eq!(branch.free, vars![1, 2, 4, 5]);
        assert!(branch.children.is_empty());
    }

    #[test]
    fn cached_components_are_not_pushed() {
        let mut ctx = Context::default();
        load(&mut ctx, &cnf_formula![1, 2, 3;]);
        ctx.solver_config.pure_literals = false;
        start(&mut ctx);

        let mut ctx = ctx.into_partial_ref_mut();
        let component = ctx.part(ComponentsP).component(1).clone();
        let id = ctx.part_mut(CacheP).create_entry_for(&component, ROOT_ENTRY);
        ctx.part_mut(CacheP)
            .store_value_of(id, Value::Count(num_bigint::BigUint::from(7u32)), None);

        assert!(!find_next_remaining_component(ctx.borrow()));
        assert_eq!(ctx.part(ComponentsP).stack_len(), 2);
        assert_eq!(
            ctx.part(DecisionStackP).top().branch_value(1),
            Some(&Value::Count(num_bigint::BigUint::from(7u32)))
        );
    }

    #[test]
    fn pure_existentials_are_dropped() {
        let mut ctx = Context::default();
        let formula = cnf_formula![
            1, 2, 3;
            1, -2, 4;
            -3, -4, 2;
        ];
        load(&mut ctx, &formula);

        let mut prefix = Prefix::new();
        prefix.add_block(Quantifier::Random(0.5), vars![2, 3, 4]);
        prefix.add_block(Quantifier::Exists, vars![1]);
        ctx.quantifiers.load_prefix(&prefix);

        start(&mut ctx);

        let mut ctx = ctx.into_partial_ref_mut();
        assert!(find_next_remaining_component(ctx.borrow()));

        let components = ctx.part(ComponentsP).components_from(2);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].vars(), &vars![2, 3, 4]);
        assert_eq!(components[0].clauses(), &[3]);
    }

    #[test]
    fn cleaning_releases_anchors() {
        let mut ctx = Context::default();
        load(&mut ctx, &cnf_formula![1, 2, 3; 4, 5, 6;]);
        ctx.solver_config.pure_literals = false;
        start(&mut ctx);

        let mut ctx = ctx.into_partial_ref_mut();
        assert!(find_next_remaining_component(ctx.borrow()));
        let ids: Vec<_> = ctx
            .part(ComponentsP)
            .components_from(2)
            .iter()
            .map(|c| c.cache_id())
            .collect();
        assert_eq!(ids.len(), 2);

        clean_remaining_components(ctx.borrow());
        assert_eq!(ctx.part(ComponentsP).stack_len(), 2);
        assert!(ids
            .iter()
            .all(|&id| ctx.part(CacheP).entry(id).is_deletable()));
    }
}
