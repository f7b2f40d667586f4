//! Per variable quantifier data.
use crate::lit::{Lit, Var};
use crate::prefix::{Prefix, Quantifier, QuantifierKind};

/// Quantifier and block level of every variable.
///
/// Without a prefix every variable is an outermost existential and the solver counts models.
#[derive(Default)]
pub struct Quantifiers {
    quantifiers: Vec<Quantifier>,
    levels: Vec<u32>,
    /// Whether a prefix was loaded, switching from counting to probability computation.
    quantified: bool,
    /// Number of distinct block levels, level 0 included.
    level_count: usize,
}

impl Quantifiers {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.quantifiers.resize(count, Quantifier::Exists);
        self.levels.resize(count, 0);
        self.level_count = self.level_count.max(1);
    }

    /// Bind the variables of a prefix.
    ///
    /// The variable count has to cover all variables of the prefix.
    pub fn load_prefix(&mut self, prefix: &Prefix) {
        self.quantified = true;
        for block in prefix.blocks() {
            for &var in block.vars.iter() {
                self.quantifiers[var.index()] = prefix.quantifier(var);
                self.levels[var.index()] = prefix.level(var) as u32;
            }
        }
        self.level_count = self.level_count.max(prefix.block_count() + 1);
    }

    /// Whether the solver computes probabilities instead of model counts.
    pub fn is_quantified(&self) -> bool {
        self.quantified
    }

    pub fn quantifier(&self, var: Var) -> Quantifier {
        self.quantifiers[var.index()]
    }

    pub fn kind(&self, var: Var) -> QuantifierKind {
        self.quantifiers[var.index()].kind()
    }

    /// Block level of a variable, lower levels are bound further out.
    pub fn level(&self, var: Var) -> usize {
        self.levels[var.index()] as usize
    }

    pub fn level_count(&self) -> usize {
        self.level_count
    }

    /// Factor applied to the path probability when `lit` is forced.
    ///
    /// Forcing an existential costs nothing, forcing a random literal costs the probability of
    /// that literal and forcing a universal makes the branch worthless.
    pub fn forced_factor(&self, lit: Lit) -> f64 {
        match self.quantifiers[lit.index()] {
            Quantifier::Exists => 1.0,
            Quantifier::Random(p) => {
                if lit.is_positive() {
                    p
                } else {
                    1.0 - p
                }
            }
            Quantifier::Forall => 0.0,
        }
    }

    /// Probability of `lit` when its variable is random, 1 for all other variables.
    pub fn lit_probability(&self, lit: Lit) -> f64 {
        match self.quantifiers[lit.index()] {
            Quantifier::Random(p) if lit.is_positive() => p,
            Quantifier::Random(p) => 1.0 - p,
            _ => 1.0,
        }
    }
}
