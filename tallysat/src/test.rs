//! Reference implementations and formula generators for tests.
use num_bigint::BigUint;
use proptest::{prelude::*, *};

use rand::seq::SliceRandom;

use tallysat_formula::cnf::strategy::cnf_formula;
use tallysat_formula::prefix::strategy;
use tallysat_formula::test::chunked_formula;

use crate::cnf::CnfFormula;
use crate::lit::{Lit, Var};
use crate::prefix::{QuantifiedFormula, Quantifier};

/// Whether a full assignment, indexed by variable, satisfies every clause.
fn satisfies(formula: &CnfFormula, assignment: &[bool]) -> bool {
    formula.iter().all(|clause| {
        clause
            .iter()
            .any(|&lit| assignment[lit.index()] == lit.is_positive())
    })
}

/// Count models by enumerating all assignments.
pub fn brute_force_count(formula: &CnfFormula) -> BigUint {
    let var_count = formula.var_count();
    assert!(var_count < 24, "too many variables for enumeration");

    let mut assignment = vec![false; var_count];
    let mut count = 0u64;
    for bits in 0..1u64 << var_count {
        for (index, value) in assignment.iter_mut().enumerate() {
            *value = bits & (1 << index) != 0;
        }
        if satisfies(formula, &assignment) {
            count += 1;
        }
    }
    BigUint::from(count)
}

/// Evaluate the quantifier prefix over all assignments, outermost block first.
pub fn brute_force_probability(formula: &QuantifiedFormula) -> f64 {
    let var_count = formula.var_count();
    let mut order: Vec<Var> = (0..var_count).map(Var::from_index).collect();
    order.sort_by_key(|&var| formula.prefix.level(var));

    let mut assignment = vec![false; var_count];
    evaluate(formula, &order, &mut assignment)
}

fn evaluate(formula: &QuantifiedFormula, order: &[Var], assignment: &mut [bool]) -> f64 {
    let (&var, rest) = match order.split_first() {
        Some(split) => split,
        None => return satisfies(&formula.matrix, assignment) as u8 as f64,
    };

    let mut values = [0.0; 2];
    for &value in [false, true].iter() {
        assignment[var.index()] = value;
        values[value as usize] = evaluate(formula, rest, assignment);
    }

    match formula.prefix.quantifier(var) {
        Quantifier::Exists => values[0].max(values[1]),
        Quantifier::Forall => values[0].min(values[1]),
        Quantifier::Random(p) => p * values[1] + (1.0 - p) * values[0],
    }
}

/// Compare probabilities up to rounding.
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "{} differs from {}",
        actual,
        expected
    );
}

/// Small random formula over at most 10 variables.
pub fn small_formula() -> impl Strategy<Value = CnfFormula> {
    cnf_formula(1..10usize, 0..30, 1..4)
}

/// Formula made of independent chunks, decomposing into several components.
pub fn count_formula() -> impl Strategy<Value = CnfFormula> {
    chunked_formula(1..4usize, 5, 6)
}

/// Small random formula binding every variable to a quantifier.
pub fn quantified_formula() -> impl Strategy<Value = QuantifiedFormula> {
    strategy::quantified_formula(1..8usize, 0..16, 1..4)
}

/// Generate small hard unsat instances.
///
/// Implementation of http://www.cs.qub.ac.uk/~i.spence/sgen/ but with random partitions
pub fn sgen_unsat_formula(
    blocks: impl Strategy<Value = usize>,
) -> impl Strategy<Value = CnfFormula> {
    blocks.prop_flat_map(|blocks| {
        collection::vec(bool::ANY, blocks * 4 + 1).prop_perturb(|polarity, mut rng| {
            let mut clauses: Vec<Vec<Lit>> = vec![];
            let mut lits = polarity
                .into_iter()
                .enumerate()
                .map(|(index, polarity)| Lit::from_index(index, polarity))
                .collect::<Vec<_>>();

            for &invert in [false, true].iter() {
                lits.shuffle(&mut rng);
                for block in lits.chunks_exact(4) {
                    for a in 0..4 {
                        for b in 0..a {
                            for c in 0..b {
                                let mut clause =
                                    vec![block[a] ^ invert, block[b] ^ invert, block[c] ^ invert];
                                clause.shuffle(&mut rng);
                                clauses.push(clause);
                            }
                        }
                    }
                }
                let &lit_a = lits.last().unwrap();
                for b in 0..4 {
                    for c in 0..b {
                        let mut clause = vec![lit_a ^ invert, lits[b] ^ invert, lits[c] ^ invert];
                        clause.shuffle(&mut rng);
                        clauses.push(clause);
                    }
                }
            }

            clauses.shuffle(&mut rng);
            CnfFormula::from(clauses)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use tallysat_formula::{cnf_formula, vars};

    use crate::prefix::Prefix;

    #[test]
    fn brute_force_references() {
        let formula = cnf_formula![
            1, 2;
            -1, 3;
        ];
        assert_eq!(brute_force_count(&formula), BigUint::from(4u32));

        let mut prefix = Prefix::new();
        prefix.add_block(Quantifier::Random(0.5), vars![1]);
        prefix.add_block(Quantifier::Exists, vars![2, 3]);
        let quantified = QuantifiedFormula::new(prefix, formula);
        assert_close(brute_force_probability(&quantified), 1.0);

        let mut prefix = Prefix::new();
        prefix.add_block(Quantifier::Forall, vars![3]);
        prefix.add_block(Quantifier::Random(0.25), vars![1, 2]);
        let quantified = QuantifiedFormula::new(prefix, quantified.matrix);
        assert_close(brute_force_probability(&quantified), 0.75 * 0.25);
    }
}
