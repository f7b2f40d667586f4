//! Binary clauses.

use partial_ref::{partial, PartialRef};

use crate::context::{AssignmentP, BinaryClausesP, Context};

use crate::lit::Lit;

/// Binary clauses.
///
/// Irredundant and learned binary clauses share the implication lists, only the counts keep them
/// apart.
#[derive(Default)]
pub struct BinaryClauses {
    by_lit: Vec<Vec<Lit>>,
    count: usize,
    learned_count: usize,
}

impl BinaryClauses {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.by_lit.resize(count * 2, vec![]);
    }

    /// Add a binary clause.
    pub fn add_binary_clause(&mut self, lits: [Lit; 2], learned: bool) {
        for i in 0..2 {
            self.by_lit[(!lits[i]).code()].push(lits[i ^ 1]);
        }
        if learned {
            self.learned_count += 1;
        } else {
            self.count += 1;
        }
    }

    /// Implications of a given literal
    pub fn implied(&self, lit: Lit) -> &[Lit] {
        &self.by_lit[lit.code()]
    }

    /// Number of irredundant binary clauses.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of learned binary clauses.
    pub fn learned_count(&self) -> usize {
        self.learned_count
    }

    /// All binary clauses, each reported once with its smaller literal first.
    pub fn clauses<'a>(&'a self) -> impl Iterator<Item = [Lit; 2]> + 'a {
        self.by_lit
            .iter()
            .enumerate()
            .flat_map(|(code, implied)| {
                let lit = !Lit::from_code(code);
                implied
                    .iter()
                    .filter(move |&&other| lit < other)
                    .map(move |&other| [lit, other])
            })
    }
}

/// Remove binary clauses that have an assigned literal.
///
/// Only used at level 0, before any binary clause was learned.
pub fn simplify_binary(mut ctx: partial!(Context, mut BinaryClausesP, AssignmentP)) {
    let (binary_clauses, mut ctx) = ctx.split_part_mut(BinaryClausesP);
    let assignment = ctx.part(AssignmentP);

    debug_assert_eq!(binary_clauses.learned_count, 0);

    let mut double_count = 0;

    for (code, implied) in binary_clauses.by_lit.iter_mut().enumerate() {
        let lit = Lit::from_code(code);

        if !assignment.lit_is_unk(lit) {
            implied.clear();
        } else {
            implied.retain(|&other_lit| assignment.lit_is_unk(other_lit));

            double_count += implied.len();
        }
    }

    binary_clauses.count = double_count / 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    use tallysat_formula::lits;

    #[test]
    fn clauses_are_reported_once() {
        let mut binary_clauses = BinaryClauses::default();
        binary_clauses.set_var_count(4);

        binary_clauses.add_binary_clause(lits![1, -2], false);
        binary_clauses.add_binary_clause(lits![-4, 3], false);
        binary_clauses.add_binary_clause(lits![2, 4], true);

        assert_eq!(binary_clauses.count(), 2);
        assert_eq!(binary_clauses.learned_count(), 1);
        assert_eq!(binary_clauses.implied(lits![-1][0]), &lits![-2]);

        let mut clauses: Vec<_> = binary_clauses.clauses().collect();
        clauses.sort();

        let mut expected = vec![lits![1, -2], lits![3, -4], lits![2, 4]];
        for clause in expected.iter_mut() {
            clause.sort();
        }
        expected.sort();

        assert_eq!(clauses, expected);
    }
}
