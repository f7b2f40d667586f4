//! Tallysat is an exact model counter and stochastic SAT solver written in rust.
//!
//! Given a boolean formula in [conjunctive normal form][cnf] it computes the exact number of
//! satisfying assignments. Given a formula with a quantifier prefix of existential, randomized and
//! universal variables (an SSAT instance) it computes the maximal satisfaction probability
//! instead.
//!
//! The search is a depth-first branch and bound that decomposes the residual formula into
//! independent components after each decision, memoizes the value of solved components and learns
//! clauses from conflicts.
//!
//! [cnf]: https://en.wikipedia.org/wiki/Conjunctive_normal_form

pub mod config;
pub mod solver;
pub mod stats;
pub mod trace;

mod analyze_conflict;
mod binary;
mod cache;
mod clause;
mod component;
mod context;
mod count;
mod decision;
mod load;
mod preprocess;
mod probe;
mod prop;
mod quantifiers;
mod schedule;
mod stack;
mod state;
mod tmp;
mod value;

#[cfg(test)]
mod test;

pub use tallysat_formula::{cnf, lit, prefix, CnfFormula, Lit, Var};
pub use tallysat_formula::{QuantifiedFormula, Quantifier, QuantifierKind};

pub use solver::{Answer, Solver, SolverError};

pub mod dimacs {
    //! DIMACS CNF and SDIMACS parser and writer.
    pub use tallysat_dimacs::*;
}
