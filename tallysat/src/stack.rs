//! The decision stack.
//!
//! Each decision level splits the component it decided in into two branches, one per value of the
//! decided variable. A level accumulates the value of each branch as the product of the values of
//! the components found on it, and combines both branches according to the quantifier of the
//! decided variable once they are done.
use crate::lit::{Lit, Var};
use crate::prefix::QuantifierKind;
use crate::trace::NodeId;
use crate::value::Value;

/// The branching decision of a level.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Decision {
    /// Literal assigned on the first branch.
    pub lit: Lit,
    pub quantifier: QuantifierKind,
    /// Probability of `lit` for random variables, 1 otherwise.
    pub probability: f64,
}

/// One level of the decision stack.
#[derive(Clone, Debug)]
pub struct StackLevel {
    /// Component stack index of the component this level decided in.
    super_component: usize,
    /// Component stack length when the level was created, components recorded by this level live
    /// above.
    remaining_ofs: usize,
    /// Components in `remaining_ofs..unprocessed_end` are still to be processed.
    unprocessed_end: usize,
    /// `None` for the root level, which only uses its second branch.
    decision: Option<Decision>,
    active_branch: usize,
    branch_unsat: [bool; 2],
    branch_value: [Option<Value>; 2],
    /// Product of the probabilities of literals forced on each branch.
    path_prob: [f64; 2],
    node: Option<NodeId>,
    stamp: u64,
    quantified: bool,
}

impl StackLevel {
    fn new(
        super_component: usize,
        remaining_ofs: usize,
        decision: Option<Decision>,
        node: Option<NodeId>,
        stamp: u64,
        quantified: bool,
    ) -> StackLevel {
        debug_assert!(super_component < remaining_ofs);
        StackLevel {
            super_component,
            remaining_ofs,
            unprocessed_end: remaining_ofs,
            decision,
            active_branch: if decision.is_some() { 0 } else { 1 },
            branch_unsat: [false; 2],
            branch_value: [None, None],
            path_prob: [1.0; 2],
            node,
            stamp,
            quantified,
        }
    }

    pub fn super_component(&self) -> usize {
        self.super_component
    }

    pub fn remaining_ofs(&self) -> usize {
        self.remaining_ofs
    }

    pub fn decision(&self) -> Option<Decision> {
        self.decision
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Whether values are probabilities rather than model counts.
    pub fn quantified(&self) -> bool {
        self.quantified
    }

    pub fn set_unprocessed_end(&mut self, end: usize) {
        debug_assert!(self.remaining_ofs <= end);
        self.unprocessed_end = end;
    }

    pub fn has_unprocessed_components(&self) -> bool {
        self.unprocessed_end > self.remaining_ofs
    }

    /// Component stack index of the component to process next.
    pub fn current_remaining_component(&self) -> usize {
        debug_assert!(self.has_unprocessed_components());
        self.unprocessed_end - 1
    }

    pub fn next_unprocessed_component(&mut self) {
        debug_assert!(self.has_unprocessed_components());
        self.unprocessed_end -= 1;
    }

    pub fn reset_remaining_components(&mut self) {
        self.unprocessed_end = self.remaining_ofs;
    }

    /// Whether processing should continue with the next component of this level.
    pub fn another_component_processible(&self) -> bool {
        !self.active_branch_unsat()
            && self.has_unprocessed_components()
            && !self.second_branch_dominated()
    }

    pub fn is_second_branch(&self) -> bool {
        self.active_branch == 1
    }

    pub fn change_branch(&mut self) {
        debug_assert!(!self.is_second_branch());
        self.active_branch = 1;
    }

    pub fn active_branch_unsat(&self) -> bool {
        self.branch_unsat[self.active_branch]
    }

    pub fn mark_branch_unsat(&mut self) {
        self.branch_unsat[self.active_branch] = true;
        self.branch_value[self.active_branch] = None;
    }

    /// Multiply the value of an independent component into the active branch.
    pub fn include_value(&mut self, value: &Value) {
        let branch = self.active_branch;
        if self.branch_unsat[branch] {
            return;
        }
        if value.is_zero() {
            self.mark_branch_unsat();
            return;
        }
        match &mut self.branch_value[branch] {
            Some(current) => current.mul_assign(value),
            slot => *slot = Some(value.clone()),
        }
    }

    /// Multiply the probability of a forced literal into the path probability of the active branch.
    pub fn include_path_prob(&mut self, prob: f64) {
        self.path_prob[self.active_branch] *= prob;
    }

    /// Value accumulated on a branch, `None` if the branch is unsatisfiable or was not explored.
    pub fn branch_value(&self, branch: usize) -> Option<&Value> {
        if self.branch_unsat[branch] {
            None
        } else {
            self.branch_value[branch].as_ref()
        }
    }

    /// Satisfaction probability of a branch including its forced literals.
    fn weighted_prob(&self, branch: usize) -> f64 {
        self.branch_value(branch)
            .map_or(0.0, |value| value.probability() * self.path_prob[branch])
    }

    /// Whether the value of the level can still change by exploring the second branch.
    pub fn need_second_branch(&self) -> bool {
        let decision = match self.decision {
            Some(decision) => decision,
            None => return false,
        };
        if !self.quantified || self.is_second_branch() {
            return !self.is_second_branch();
        }
        match decision.quantifier {
            QuantifierKind::Random => true,
            QuantifierKind::Forall => self.weighted_prob(0) != 0.0,
            QuantifierKind::Exists => self.weighted_prob(0) != 1.0,
        }
    }

    /// Whether the second branch of an existential decision can no longer beat the first one.
    ///
    /// Component values are at most 1, so the value accumulated on a branch only shrinks as more
    /// components are included.
    pub fn second_branch_dominated(&self) -> bool {
        match self.decision {
            Some(decision)
                if self.quantified
                    && self.is_second_branch()
                    && decision.quantifier == QuantifierKind::Exists =>
            {
                self.branch_value(1).is_some() && self.weighted_prob(1) <= self.weighted_prob(0)
            }
            _ => false,
        }
    }

    /// Value of the decided component, combining both branches.
    pub fn total_value(&self) -> Value {
        if !self.quantified {
            let mut total = Value::zero(false);
            for branch in 0..2 {
                if let (Value::Count(total), Some(Value::Count(count))) =
                    (&mut total, self.branch_value(branch))
                {
                    *total += count;
                }
            }
            return total;
        }

        let w0 = self.weighted_prob(0);
        let w1 = self.weighted_prob(1);
        let prob = match self.decision {
            None => w1,
            Some(decision) => match decision.quantifier {
                QuantifierKind::Exists => w0.max(w1),
                QuantifierKind::Forall => w0.min(w1),
                QuantifierKind::Random => {
                    decision.probability * w0 + (1.0 - decision.probability) * w1
                }
            },
        };
        Value::Probability(prob)
    }

    /// Branch with the larger probability, the first one on ties.
    pub fn max_branch(&self) -> usize {
        (self.weighted_prob(0) < self.weighted_prob(1)) as usize
    }
}

/// Stack of decision levels.
///
/// Also assigns each level a stamp and stamps the variables of the component it decides in. Levels
/// are stamped in increasing order, so a variable belongs to the component of the top level iff
/// its stamp is at least the stamp of that level.
#[derive(Default)]
pub struct DecisionStack {
    levels: Vec<StackLevel>,
    var_stamps: Vec<u64>,
    next_stamp: u64,
}

impl DecisionStack {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_stamps.resize(count, 0);
    }

    /// Reset to a single root level.
    pub fn init(
        &mut self,
        super_component: usize,
        remaining_ofs: usize,
        quantified: bool,
        node: Option<NodeId>,
    ) {
        self.levels.clear();
        for stamp in self.var_stamps.iter_mut() {
            *stamp = 0;
        }
        self.next_stamp = 1;
        self.levels.push(StackLevel::new(
            super_component,
            remaining_ofs,
            None,
            node,
            0,
            quantified,
        ));
    }

    /// Push a level deciding within the given component.
    pub fn push(
        &mut self,
        super_component: usize,
        remaining_ofs: usize,
        decision: Decision,
        node: Option<NodeId>,
        vars: &[Var],
    ) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        for &var in vars {
            self.var_stamps[var.index()] = stamp;
        }
        let quantified = self.top().quantified;
        self.levels.push(StackLevel::new(
            super_component,
            remaining_ofs,
            Some(decision),
            node,
            stamp,
            quantified,
        ));
    }

    /// Remove the top level, never the root level.
    pub fn pop(&mut self) -> Option<StackLevel> {
        if self.levels.len() > 1 {
            self.levels.pop()
        } else {
            None
        }
    }

    pub fn top(&self) -> &StackLevel {
        match self.levels.last() {
            Some(level) => level,
            None => panic!("decision stack not initialized"),
        }
    }

    pub fn top_mut(&mut self) -> &mut StackLevel {
        match self.levels.last_mut() {
            Some(level) => level,
            None => panic!("decision stack not initialized"),
        }
    }

    /// Number of decisions on the stack, 0 for just the root level.
    pub fn decision_level(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Whether `var` belongs to the component decided in by the top level.
    pub fn in_scope(&self, var: Var) -> bool {
        self.var_stamps[var.index()] >= self.top().stamp
    }
}
