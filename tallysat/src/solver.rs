//! Model counter and stochastic SAT solver.
use std::io;

use log::info;
use num_bigint::BigUint;
use partial_ref::{partial, IntoPartialRefMut, PartialRef};
use thiserror::Error;

use crate::cnf::CnfFormula;
use crate::config::SolverConfigUpdate;
use crate::context::{ensure_var_count, parts::*, Context};
use crate::count::{init_search, record_forced_literals, search};
use crate::dimacs::DimacsParser;
use crate::load::load_clause;
use crate::prefix::{Prefix, QuantifiedFormula};
use crate::preprocess::preprocess;
use crate::state::SearchState;
use crate::stats::Statistics;
use crate::trace::{Trace, FALSE_NODE};
use crate::value::Value;

/// Possible errors while solving a formula.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SolverError {
    #[error("The time limit was exceeded")]
    Timeout,
    #[error("The formula was already solved")]
    AlreadySolved,
}

/// Result of solving a formula.
#[derive(Clone, Debug, PartialEq)]
pub enum Answer {
    /// Number of satisfying assignments of a formula without quantifier prefix.
    Count(BigUint),
    /// Maximal satisfaction probability of a quantified formula.
    Probability(f64),
}

impl From<Value> for Answer {
    fn from(value: Value) -> Answer {
        match value {
            Value::Count(count) => Answer::Count(count),
            Value::Probability(prob) => Answer::Probability(prob),
        }
    }
}

/// An exact model counter and stochastic SAT solver.
///
/// A formula without quantifier prefix is model counted. Once a prefix is added, variables not
/// bound by it are outermost existentials and the solver computes the maximal satisfaction
/// probability instead.
#[derive(Default)]
pub struct Solver {
    ctx: Box<Context>,
}

impl Solver {
    /// Create a new solver.
    pub fn new() -> Solver {
        Solver::default()
    }

    /// Change the solver configuration.
    pub fn config(&mut self, config_update: &SolverConfigUpdate) -> Result<(), SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        if ctx.part(SolverStateP).search_state != SearchState::Loading {
            return Err(SolverError::AlreadySolved);
        }
        config_update.apply(ctx.part_mut(SolverConfigP));
        Ok(())
    }

    /// Add a formula to the solver.
    pub fn add_formula(&mut self, formula: &CnfFormula) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ensure_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }
    }

    /// Bind variables to quantifiers.
    pub fn add_prefix(&mut self, prefix: &Prefix) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ensure_var_count(ctx.borrow(), prefix.var_count());
        ctx.part_mut(QuantifiersP).load_prefix(prefix);
    }

    /// Add a formula with quantifier prefix to the solver.
    pub fn add_quantified_formula(&mut self, formula: &QuantifiedFormula) {
        self.add_prefix(&formula.prefix);
        self.add_formula(&formula.matrix);
    }

    /// Reads and adds a formula in DIMACS CNF or SDIMACS format.
    ///
    /// Using this avoids creating a temporary [`CnfFormula`].
    pub fn add_dimacs(&mut self, input: impl io::Read) -> Result<(), anyhow::Error> {
        let mut parser = DimacsParser::parse_incremental(input, |parser| {
            self.add_formula(&parser.take_formula());
            Ok(())
        })?;

        if parser.is_quantified() {
            self.add_prefix(&parser.take_prefix());
        }

        info!(
            "Parsed {} formula with {} variables and {} clauses",
            if parser.is_quantified() {
                "quantified"
            } else {
                "CNF"
            },
            parser.var_count(),
            parser.clause_count()
        );

        Ok(())
    }

    /// Count the models or compute the satisfaction probability of the current formula.
    ///
    /// Can only be called once.
    pub fn solve(&mut self) -> Result<Answer, SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();

        if ctx.part(SolverStateP).search_state != SearchState::Loading {
            return Err(SolverError::AlreadySolved);
        }
        ctx.part_mut(SolverStateP).search_state = SearchState::Searching;

        let quantified = ctx.part(QuantifiersP).is_quantified();

        if ctx.part(SolverConfigP).record_trace {
            let trace = ctx.part_mut(TraceP);
            trace.enable();
            trace.new_root();
        }

        info!(
            "{} over {} variables",
            if quantified {
                "Computing the satisfaction probability"
            } else {
                "Counting models"
            },
            ctx.part(AssignmentP).assignment().len()
        );

        if !preprocess(ctx.borrow()) {
            info!("Formula is unsatisfiable");
            if let Some(root) = ctx.part(TraceP).root() {
                ctx.part_mut(TraceP).add_child(root, FALSE_NODE);
            }
            let answer = Answer::from(Value::zero(quantified));
            let state = ctx.part_mut(SolverStateP);
            state.search_state = SearchState::Unsat;
            state.answer = Some(answer.clone());
            return Ok(answer);
        }

        init_search(ctx.borrow());
        record_forced_literals(ctx.borrow(), 0);

        ctx.part_mut(ScheduleP).start();
        let result = search(ctx.borrow());

        sync_cache_stats(ctx.borrow());
        ctx.part(StatisticsP).log_summary();
        info!(
            "Search took {:.3}s",
            ctx.part(ScheduleP).elapsed().as_secs_f64()
        );

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                ctx.part_mut(SolverStateP).search_state = SearchState::TimedOut;
                return Err(err);
            }
        };

        if quantified && ctx.part(TraceP).enabled() {
            ctx.part_mut(TraceP).prune_non_maximal();
        }

        let answer = Answer::from(value);
        let state = ctx.part_mut(SolverStateP);
        state.search_state = SearchState::Finished;
        state.answer = Some(answer.clone());
        Ok(answer)
    }

    /// The answer of the last successful [`solve`](Solver::solve) call.
    pub fn answer(&self) -> Option<&Answer> {
        self.ctx.solver_state.answer.as_ref()
    }

    /// Counters collected while solving.
    pub fn stats(&self) -> &Statistics {
        &self.ctx.statistics
    }

    /// The recorded trace DAG, if enabled with `record_trace`.
    pub fn trace(&self) -> Option<&Trace> {
        let trace = &self.ctx.trace;
        if trace.enabled() {
            Some(trace)
        } else {
            None
        }
    }
}

/// Copy the counters of the component cache into the statistics.
fn sync_cache_stats(mut ctx: partial!(Context, mut StatisticsP, CacheP)) {
    let cache_stats = ctx.part(CacheP).stats().clone();
    let statistics = ctx.part_mut(StatisticsP);
    statistics.cache_entries = cache_stats.entries;
    statistics.cache_bytes = cache_stats.bytes;
    statistics.cache_lookups = cache_stats.lookups;
    statistics.cache_hits = cache_stats.hits;
    statistics.cache_evicted = cache_stats.evicted;
    statistics.cache_polluted = cache_stats.polluted;
}
