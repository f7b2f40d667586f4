//! The VSADS branching heuristic.
//!
//! VSADS (Variable State Aware Decaying Sum) combines a literal activity in the spirit of VSIDS
//! with the number of occurrences of a variable in the component that is about to be split. The
//! occurrence count favors variables that break the component apart, the activity favors variables
//! involved in recent conflicts.
//!
//! Literal activities start at the number of clauses containing the literal and are bumped by one
//! for each literal of a clause taking part in a conflict. Instead of decaying on every conflict
//! all activities are halved periodically.
use crate::lit::{Lit, Var};

/// Weight of the literal activities relative to the occurrence count.
const ACTIVITY_WEIGHT: f64 = 10.0;

/// Literal activities of the VSADS heuristic.
#[derive(Default)]
pub struct Vsads {
    /// Indexed by literal code.
    activity: Vec<f64>,
}

impl Vsads {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.activity.resize(count * 2, 0.0);
    }

    pub fn activity(&self, lit: Lit) -> f64 {
        self.activity[lit.code()]
    }

    /// Overwrite the activity of a literal.
    pub fn set_activity(&mut self, lit: Lit, activity: f64) {
        self.activity[lit.code()] = activity;
    }

    pub fn bump(&mut self, lit: Lit) {
        self.activity[lit.code()] += 1.0;
    }

    /// Halve all activities.
    pub fn decay(&mut self) {
        for activity in self.activity.iter_mut() {
            *activity *= 0.5;
        }
    }

    /// Score of a variable occurring `freq` times in the current component.
    pub fn score(&self, var: Var, freq: u32) -> f64 {
        freq as f64
            + ACTIVITY_WEIGHT * (self.activity(var.positive()) + self.activity(var.negative()))
    }

    /// The polarity to try first, negative unless the positive literal is more active.
    pub fn polarity(&self, var: Var) -> bool {
        self.activity(var.positive()) > self.activity(var.negative())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tallysat_formula::{lit, var};

    #[test]
    fn activity_dominates_after_conflicts() {
        let mut vsads = Vsads::default();
        vsads.set_var_count(3);

        vsads.set_activity(lit!(1), 2.0);
        vsads.bump(lit!(-2));

        assert!(vsads.score(var!(1), 0) > vsads.score(var!(2), 5));
        assert!(vsads.score(var!(2), 5) > vsads.score(var!(3), 14));
        assert!(!vsads.polarity(var!(2)));
        assert!(!vsads.polarity(var!(3)));
        assert!(vsads.polarity(var!(1)));

        vsads.decay();
        assert_eq!(vsads.activity(lit!(1)), 1.0);
        assert_eq!(vsads.activity(lit!(-2)), 0.5);
    }
}
