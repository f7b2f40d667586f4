//! Canonical packed encoding of components.
use crate::lit::Var;

use crate::component::ClauseId;

/// Bits needed to store values up to `max`, at least 1.
fn bits_for(max: u32) -> u32 {
    32 - max.max(1).leading_zeros()
}

/// Bits needed to store all deltas up to `max`, 0 if all deltas are 0.
fn delta_bits(max: u32) -> u32 {
    32 - max.leading_zeros()
}

/// Bit widths used to pack components of one formula.
///
/// Computed once after loading and passed to every pack operation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PackConfig {
    pub bits_per_variable: u32,
    pub bits_per_clause: u32,
    pub bits_of_data_size: u32,
}

impl PackConfig {
    /// Widths for a formula with the given largest (1-based) variable and clause ids.
    pub fn new(max_var_id: u32, max_clause_id: u32) -> PackConfig {
        PackConfig {
            bits_per_variable: bits_for(max_var_id),
            bits_per_clause: bits_for(max_clause_id),
            bits_of_data_size: bits_for(max_var_id.saturating_add(max_clause_id)),
        }
    }
}

/// Width of the field storing the width of the deltas.
const DELTA_WIDTH_BITS: u32 = 5;

/// Appends bit fields to a word buffer, least significant bits first.
struct BitStuffer {
    data: Vec<u32>,
    bit_pos: usize,
}

impl BitStuffer {
    fn with_words(words: usize) -> BitStuffer {
        BitStuffer {
            data: vec![0; words],
            bit_pos: 0,
        }
    }

    fn stuff(&mut self, value: u32, bits: u32) {
        if bits == 0 {
            return;
        }
        debug_assert!(bits == 32 || value >> bits == 0);

        let word = self.bit_pos / 32;
        let shift = self.bit_pos % 32;
        let wide = (value as u64) << shift;

        self.data[word] |= wide as u32;
        if shift + bits as usize > 32 {
            self.data[word + 1] |= (wide >> 32) as u32;
        }
        self.bit_pos += bits as usize;
    }
}

/// Delta encoded id sequence.
///
/// Each id after the first is stored as the distance to its predecessor minus one, using the
/// smallest width that fits all deltas.
struct Deltas {
    width: u32,
    count: usize,
}

impl Deltas {
    fn of(ids: impl Iterator<Item = u32> + Clone) -> Deltas {
        let mut max_delta = 0;
        let mut count = 0;
        let mut last = None;
        for id in ids {
            if let Some(last) = last {
                debug_assert!(id > last, "ids must be sorted and unique");
                max_delta = max_delta.max(id - last - 1);
            }
            last = Some(id);
            count += 1;
        }
        Deltas {
            width: delta_bits(max_delta),
            count,
        }
    }

    /// Bits used by the width field, the first id and the deltas.
    fn bits(&self, first_bits: u32) -> usize {
        DELTA_WIDTH_BITS as usize
            + first_bits as usize
            + self.count.saturating_sub(1) * self.width as usize
    }

    fn stuff(&self, stuffer: &mut BitStuffer, first_bits: u32, ids: impl Iterator<Item = u32>) {
        stuffer.stuff(self.width, DELTA_WIDTH_BITS);
        let mut last = None;
        for id in ids {
            match last {
                None => stuffer.stuff(id, first_bits),
                Some(last) => stuffer.stuff(id - last - 1, self.width),
            }
            last = Some(id);
        }
    }
}

/// Polynomial rolling hash of an id sequence, 0 for an empty sequence.
fn fold_ids(mut ids: impl Iterator<Item = u32>) -> u32 {
    let first = ids.next().unwrap_or(0);
    ids.fold(first, |hash, id| hash.wrapping_mul(3).wrapping_add(id))
}

/// Canonical encoding of a component with its hash.
///
/// Components with the same variables and clauses always have bit-identical data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedComponent {
    data: Vec<u32>,
    hash: u32,
    var_count: u32,
}

impl PackedComponent {
    /// Pack sorted variables and sorted clause ids.
    pub fn new(config: &PackConfig, vars: &[Var], clauses: &[ClauseId]) -> PackedComponent {
        let var_ids = vars.iter().map(|var| var.index() as u32 + 1);
        let clause_ids = clauses.iter().cloned();

        let var_deltas = Deltas::of(var_ids.clone());
        let clause_deltas = Deltas::of(clause_ids.clone());

        let mut bits = config.bits_of_data_size as usize
            + config.bits_per_variable as usize
            + var_deltas.bits(config.bits_per_variable)
            + config.bits_per_clause as usize;
        if !clauses.is_empty() {
            bits += clause_deltas.bits(config.bits_per_clause);
        }
        let words = (bits + 31) / 32;

        debug_assert!((vars.len() as u64) < 1u64 << config.bits_per_variable);
        debug_assert!((clauses.len() as u64) < 1u64 << config.bits_per_clause);

        // The size field only disambiguates, wrapping it keeps the encoding canonical.
        let size_mask = (1u64 << config.bits_of_data_size) - 1;

        let mut stuffer = BitStuffer::with_words(words);
        stuffer.stuff((words as u64 & size_mask) as u32, config.bits_of_data_size);
        stuffer.stuff(vars.len() as u32, config.bits_per_variable);
        var_deltas.stuff(&mut stuffer, config.bits_per_variable, var_ids.clone());
        // Runs of consecutive ids have all deltas 0, only the counts tell their lengths apart.
        stuffer.stuff(clauses.len() as u32, config.bits_per_clause);
        if !clauses.is_empty() {
            clause_deltas.stuff(&mut stuffer, config.bits_per_clause, clause_ids.clone());
        }

        PackedComponent {
            data: stuffer.data,
            hash: Self::hash_of(var_ids, clause_ids),
            var_count: vars.len() as u32,
        }
    }

    fn hash_of(var_ids: impl Iterator<Item = u32>, clause_ids: impl Iterator<Item = u32>) -> u32 {
        let hv = fold_ids(var_ids);
        let hc = fold_ids(clause_ids);
        hv.wrapping_add(hc << 11).wrapping_add(hc >> 23)
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn var_count(&self) -> usize {
        self.var_count as usize
    }

    /// Number of `u32` words of packed data.
    pub fn words(&self) -> usize {
        self.data.len()
    }
}
