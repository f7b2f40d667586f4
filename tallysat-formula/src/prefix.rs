//! Quantifier prefixes for stochastic satisfiability.
use std::fmt;

use crate::cnf::CnfFormula;
use crate::lit::Var;

/// How a variable is bound.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Quantifier {
    /// Chosen to maximize the satisfaction probability.
    Exists,
    /// True with the given probability.
    Random(f64),
    /// Chosen to minimize the satisfaction probability.
    Forall,
}

/// [`Quantifier`] without the probability of random variables.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum QuantifierKind {
    Exists,
    Random,
    Forall,
}

impl Quantifier {
    pub fn kind(self) -> QuantifierKind {
        match self {
            Quantifier::Exists => QuantifierKind::Exists,
            Quantifier::Random(_) => QuantifierKind::Random,
            Quantifier::Forall => QuantifierKind::Forall,
        }
    }
}

/// A maximal run of variables bound by quantifiers of the same kind.
#[derive(Clone, PartialEq, Debug)]
pub struct QuantifierBlock {
    pub kind: QuantifierKind,
    pub vars: Vec<Var>,
}

#[derive(Copy, Clone, PartialEq, Debug)]
struct Binding {
    quantifier: Quantifier,
    level: usize,
}

/// An ordered quantifier prefix.
///
/// Adjacent blocks of the same kind are merged, so block levels alternate in kind. Level 0 is
/// reserved for variables not bound by the prefix, these are existential and outermost.
#[derive(Default, Clone, PartialEq)]
pub struct Prefix {
    blocks: Vec<QuantifierBlock>,
    bindings: Vec<Option<Binding>>,
}

impl Prefix {
    pub fn new() -> Prefix {
        Prefix::default()
    }

    /// Bind variables with the given quantifier as the innermost block.
    ///
    /// Rebinding an already bound variable replaces its binding.
    pub fn add_block(&mut self, quantifier: Quantifier, vars: impl IntoIterator<Item = Var>) {
        let kind = quantifier.kind();
        let merge = self.blocks.last().map(|block| block.kind) == Some(kind);
        if !merge {
            self.blocks.push(QuantifierBlock { kind, vars: vec![] });
        }
        let level = self.blocks.len();
        let block_vars = &mut self.blocks[level - 1].vars;

        for var in vars {
            if var.index() >= self.bindings.len() {
                self.bindings.resize(var.index() + 1, None);
            }
            self.bindings[var.index()] = Some(Binding { quantifier, level });
            block_vars.push(var);
        }
    }

    /// Whether no variable is bound.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// One more than the largest bound variable index.
    pub fn var_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[QuantifierBlock] {
        &self.blocks
    }

    pub fn is_bound(&self, var: Var) -> bool {
        self.binding(var).is_some()
    }

    /// Quantifier of a variable, unbound variables are existential.
    pub fn quantifier(&self, var: Var) -> Quantifier {
        self.binding(var)
            .map_or(Quantifier::Exists, |binding| binding.quantifier)
    }

    /// 1-based block level of a variable or 0 when unbound.
    pub fn level(&self, var: Var) -> usize {
        self.binding(var).map_or(0, |binding| binding.level)
    }

    fn binding(&self, var: Var) -> Option<Binding> {
        self.bindings.get(var.index()).cloned().flatten()
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.blocks.iter().map(|block| (block.kind, &block.vars)))
            .finish()
    }
}

/// A CNF matrix under a quantifier prefix.
#[derive(Default, Clone, PartialEq, Debug)]
pub struct QuantifiedFormula {
    pub prefix: Prefix,
    pub matrix: CnfFormula,
}

impl QuantifiedFormula {
    pub fn new(prefix: Prefix, matrix: CnfFormula) -> QuantifiedFormula {
        QuantifiedFormula { prefix, matrix }
    }

    /// Number of variables of the matrix or the prefix, whichever is larger.
    pub fn var_count(&self) -> usize {
        self.matrix.var_count().max(self.prefix.var_count())
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;

    use proptest::{collection::SizeRange, prelude::*, *};

    use crate::cnf::strategy::cnf_formula;

    fn quantifier() -> impl Strategy<Value = Quantifier> {
        prop_oneof![
            Just(Quantifier::Exists),
            Just(Quantifier::Forall),
            (1..10u32).prop_map(|tenths| Quantifier::Random(tenths as f64 / 10.0)),
        ]
    }

    /// Random quantified formula binding every variable.
    pub fn quantified_formula(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = QuantifiedFormula> {
        let clauses = clauses.into();
        let clause_len = clause_len.into();
        vars.prop_flat_map(move |vars| {
            (
                cnf_formula(Just(vars), clauses.clone(), clause_len.clone()),
                collection::vec(quantifier(), vars),
            )
                .prop_map(|(matrix, quantifiers)| {
                    let mut prefix = Prefix::new();
                    for (index, quantifier) in quantifiers.into_iter().enumerate() {
                        prefix.add_block(quantifier, Some(Var::from_index(index)));
                    }
                    QuantifiedFormula::new(prefix, matrix)
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_blocks_merge() {
        let mut prefix = Prefix::new();
        prefix.add_block(Quantifier::Random(0.5), vars![1, 2]);
        prefix.add_block(Quantifier::Random(0.25), vars![3]);
        prefix.add_block(Quantifier::Exists, vars![5]);
        prefix.add_block(Quantifier::Forall, vars![4]);

        assert_eq!(prefix.block_count(), 3);
        assert_eq!(prefix.level(var!(3)), 1);
        assert_eq!(prefix.quantifier(var!(3)), Quantifier::Random(0.25));
        assert_eq!(prefix.level(var!(5)), 2);
        assert_eq!(prefix.level(var!(4)), 3);
        assert_eq!(prefix.var_count(), 5);
    }

    #[test]
    fn unbound_vars_are_outermost_existentials() {
        let mut prefix = Prefix::new();
        prefix.add_block(Quantifier::Forall, vars![2]);

        assert!(!prefix.is_bound(var!(1)));
        assert_eq!(prefix.quantifier(var!(1)), Quantifier::Exists);
        assert_eq!(prefix.level(var!(1)), 0);
        assert_eq!(prefix.quantifier(var!(9)), Quantifier::Exists);
    }
}
