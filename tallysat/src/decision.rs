//! Decision heuristics.
use partial_ref::{partial, PartialRef};

use crate::clause::activity::decay_clause_activities;
use crate::context::{parts::*, Context};
use crate::lit::Var;
use crate::prop::{enqueue_assignment, Reason};
use crate::stack::Decision;

pub mod vsads;

/// Start every literal activity at the number of clauses containing the literal.
pub fn initialize_activities(mut ctx: partial!(Context, mut VsadsP, ComponentsP)) {
    let (vsads, ctx) = ctx.split_part_mut(VsadsP);
    let analyzer = ctx.part(ComponentsP);
    for index in 0..analyzer.var_count() {
        let var = Var::from_index(index);
        for &lit in [var.positive(), var.negative()].iter() {
            vsads.set_activity(lit, analyzer.occurrence_count(lit) as f64);
        }
    }
}

/// Branch on a variable of the component to process next.
///
/// Pushes a new level on the decision stack and on the trail and enqueues the decision. In a
/// quantified formula only variables of the outermost quantifier block present in the component
/// are eligible.
pub fn decide(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut DecisionStackP,
        mut ImplGraphP,
        mut StatisticsP,
        mut TraceP,
        mut TrailP,
        mut VsadsP,
        ClauseDbP,
        ComponentsP,
        QuantifiersP,
        SolverConfigP,
    ),
) {
    let (stack, mut ctx) = ctx.split_part_mut(DecisionStackP);
    let (analyzer, mut ctx) = ctx.split_part(ComponentsP);

    let component_index = stack.top().current_remaining_component();
    let remaining_ofs = analyzer.stack_len();
    let component = analyzer.component(component_index);

    let decision = {
        let assignment = ctx.part(AssignmentP);
        let quantifiers = ctx.part(QuantifiersP);
        let vsads = ctx.part(VsadsP);

        let candidates = || {
            component
                .vars()
                .iter()
                .cloned()
                .filter(|&var| assignment.var_is_unassigned(var))
        };

        let outermost = if quantifiers.is_quantified() {
            candidates().map(|var| quantifiers.level(var)).min()
        } else {
            None
        };

        let mut best: Option<(Var, f64)> = None;
        for var in candidates() {
            if outermost.map_or(false, |level| quantifiers.level(var) != level) {
                continue;
            }
            let score = vsads.score(var, analyzer.freq(var));
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((var, score));
            }
        }

        let var = match best {
            Some((var, _)) => var,
            None => panic!("decision in a component without unassigned variables"),
        };
        let lit = var.lit(vsads.polarity(var));

        Decision {
            lit,
            quantifier: quantifiers.kind(var),
            probability: quantifiers.lit_probability(lit),
        }
    };

    let trace = ctx.part_mut(TraceP);
    let node = if trace.enabled() {
        Some(trace.new_decision(decision.lit, decision.quantifier))
    } else {
        None
    };

    stack.push(
        component_index,
        remaining_ofs,
        decision,
        node,
        component.vars(),
    );

    let statistics = ctx.part_mut(StatisticsP);
    statistics.decisions += 1;
    statistics.max_decision_level = statistics.max_decision_level.max(stack.decision_level());
    let decisions = statistics.decisions;

    let decay_interval = ctx.part(SolverConfigP).activity_decay_interval;
    if decay_interval > 0 && decisions % decay_interval == 0 {
        ctx.part_mut(VsadsP).decay();
        decay_clause_activities(ctx.borrow());
    }

    ctx.part_mut(TrailP).new_decision_level();
    enqueue_assignment(ctx.borrow(), decision.lit, Reason::Decision);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use tallysat_formula::{cnf_formula, lit, var, vars, CnfFormula};

    use crate::component::find_next_remaining_component;
    use crate::context::set_var_count;
    use crate::count::init_search;
    use crate::load::load_clause;
    use crate::prefix::{Prefix, Quantifier};

    fn setup(ctx: &mut Context, formula: &CnfFormula, prefix: Option<Prefix>) {
        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), formula.var_count());
        if let Some(prefix) = prefix {
            ctx.part_mut(QuantifiersP).load_prefix(&prefix);
        }
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }
        init_search(ctx.borrow());
        assert!(find_next_remaining_component(ctx.borrow()));
    }

    #[test]
    fn most_frequent_variable_is_decided() {
        let mut ctx = Context::default();
        setup(
            &mut ctx,
            &cnf_formula![
                1, -2, 3;
                -2, 3, 4;
                -2, -3, 5;
                1, 4, 5;
                -2, -4, -5;
            ],
            None,
        );
        let mut ctx = ctx.into_partial_ref_mut();

        decide(ctx.borrow());

        let top = ctx.part(DecisionStackP).top();
        assert_eq!(top.decision().map(|decision| decision.lit), Some(lit!(-2)));
        assert_eq!(ctx.part(TrailP).current_level(), 1);
        assert_eq!(ctx.part(DecisionStackP).decision_level(), 1);
        assert_eq!(ctx.part(StatisticsP).decisions, 1);
        assert!(ctx.part(DecisionStackP).in_scope(var!(5)));
    }

    #[test]
    fn outermost_block_goes_first() {
        let mut prefix = Prefix::new();
        prefix.add_block(Quantifier::Random(0.5), vars![4]);
        prefix.add_block(Quantifier::Exists, vars![1, 2, 3]);

        let mut ctx = Context::default();
        setup(
            &mut ctx,
            &cnf_formula![
                1, -2, 3;
                -2, 3, 4;
                -2, -3, 1;
                1, 2, -4;
            ],
            Some(prefix),
        );
        let mut ctx = ctx.into_partial_ref_mut();

        decide(ctx.borrow());

        let decision = ctx.part(DecisionStackP).top().decision();
        assert_eq!(decision.map(|decision| decision.lit.var()), Some(var!(4)));
        assert_eq!(decision.map(|decision| decision.probability), Some(0.5));
    }
}
