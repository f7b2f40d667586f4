//! Formula generators for tests.
use proptest::{prelude::*, *};

use rand::distributions::Bernoulli;
use rand::seq::SliceRandom;

use crate::cnf::CnfFormula;
use crate::lit::Lit;

/// Generate a satisfiable formula.
///
/// A hidden full assignment is drawn first, every generated clause contains at least one literal
/// it satisfies.
pub fn sat_formula(
    vars: impl Strategy<Value = usize>,
    clause_count: impl Strategy<Value = usize>,
    density: impl Strategy<Value = f64>,
    polarity_dist: impl Strategy<Value = f64>,
) -> impl Strategy<Value = CnfFormula> {
    (vars, clause_count, density, polarity_dist).prop_flat_map(
        |(vars, clause_count, density, polarity_dist)| {
            let density = Bernoulli::new(density).unwrap();
            let polarity_dist = Bernoulli::new(polarity_dist).unwrap();

            collection::vec(bool::ANY, vars).prop_perturb(move |polarity, mut rng| {
                let lits = polarity
                    .into_iter()
                    .enumerate()
                    .map(|(index, polarity)| Lit::from_index(index, polarity))
                    .collect::<Vec<_>>();

                let mut clauses: Vec<Vec<Lit>> = vec![];
                for _ in 0..clause_count {
                    let &fixed_lit = lits.choose(&mut rng).unwrap();
                    let mut clause = vec![fixed_lit];
                    for &lit in lits.iter() {
                        if lit != fixed_lit && rng.sample(density) {
                            clause.push(lit ^ rng.sample(polarity_dist));
                        }
                    }
                    clause.shuffle(&mut rng);
                    clauses.push(clause);
                }

                let mut formula = CnfFormula::from(clauses);
                formula.set_var_count(lits.len());
                formula
            })
        },
    )
}

/// Generate a formula made of independent chunks over disjoint variable ranges.
///
/// Useful to exercise component decomposition, as every chunk forms at least one component.
pub fn chunked_formula(
    chunks: impl Strategy<Value = usize>,
    chunk_vars: usize,
    chunk_clauses: usize,
) -> impl Strategy<Value = CnfFormula> {
    chunks.prop_flat_map(move |chunks| {
        collection::vec(
            collection::vec(
                collection::vec((0..chunk_vars, bool::ANY), 1..4),
                chunk_clauses,
            ),
            chunks,
        )
        .prop_map(move |chunk_list| {
            let mut formula = CnfFormula::new();
            for (chunk, clauses) in chunk_list.into_iter().enumerate() {
                for clause in clauses {
                    formula.add_clause(clause.into_iter().map(|(index, polarity)| {
                        Lit::from_index(chunk * chunk_vars + index, polarity)
                    }));
                }
            }
            formula.set_var_count(chunks * chunk_vars);
            formula
        })
    })
}
