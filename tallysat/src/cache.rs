//! Memoization of component values.
//!
//! Every component pushed on the component stack gets an entry. Once the component is solved its
//! value is stored in the entry and the entry is inserted into the hash table, where later
//! decompositions look up equal components.
//!
//! Entries form a forest: each entry points to the entry of the component it was split off from.
//! This allows dropping everything computed below a component when the branch containing it turns
//! out to be unsatisfiable, and keeps the forest connected when entries are evicted.
use std::mem::{size_of, take};

use log::debug;
use rustc_hash::FxHashMap;

use crate::component::Component;
use crate::trace::NodeId;
use crate::value::Value;

mod pack;

pub use pack::{PackConfig, PackedComponent};

/// Handle of a cache entry.
pub type CacheEntryId = u32;

/// Never a valid entry.
pub const NIL_ENTRY: CacheEntryId = 0;
/// Entry of the whole formula, never evicted.
pub const ROOT_ENTRY: CacheEntryId = 1;

/// A cached component.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    packed: PackedComponent,
    value: Option<Value>,
    node: Option<NodeId>,
    father: CacheEntryId,
    first_descendant: CacheEntryId,
    next_sibling: CacheEntryId,
    creation_time: u64,
    /// Cleared while the component is on the component stack.
    deletable: bool,
}

impl CacheEntry {
    pub fn packed(&self) -> &PackedComponent {
        &self.packed
    }

    /// The value, once the component is solved.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Trace node recorded for the component.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn father(&self) -> CacheEntryId {
        self.father
    }

    pub fn first_descendant(&self) -> CacheEntryId {
        self.first_descendant
    }

    pub fn next_sibling(&self) -> CacheEntryId {
        self.next_sibling
    }

    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    pub fn is_deletable(&self) -> bool {
        self.deletable
    }

    fn byte_size(&self) -> usize {
        size_of::<CacheEntry>()
            + self.packed.words() * size_of::<u32>()
            + self.value.as_ref().map_or(0, |value| value.byte_size())
    }
}

/// Counters of the cache.
#[derive(Clone, Debug, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub lookups: u64,
    pub hits: u64,
    pub evicted: u64,
    pub polluted: u64,
}

/// Component cache with descendant forest.
pub struct ComponentCache {
    /// Indexed by entry id, index 0 is never used.
    entries: Vec<Option<CacheEntry>>,
    free_ids: Vec<CacheEntryId>,
    /// Solved entries by hash.
    buckets: FxHashMap<u32, Vec<CacheEntryId>>,
    pack_config: PackConfig,
    max_bytes: usize,
    /// Whether lookups and stores happen at all.
    enabled: bool,
    clock: u64,
    stats: CacheStats,
    /// Trace nodes of erased entries, to be released by the owner of the trace.
    released_nodes: Vec<NodeId>,
}

impl Default for ComponentCache {
    fn default() -> ComponentCache {
        ComponentCache {
            entries: vec![None],
            free_ids: vec![],
            buckets: FxHashMap::default(),
            pack_config: PackConfig::default(),
            max_bytes: usize::max_value(),
            enabled: true,
            clock: 0,
            stats: CacheStats::default(),
            released_nodes: vec![],
        }
    }
}

impl ComponentCache {
    /// Reset the cache and create the entry of the whole formula.
    pub fn init(
        &mut self,
        pack_config: PackConfig,
        max_bytes: usize,
        enabled: bool,
        root: &Component,
    ) -> CacheEntryId {
        *self = ComponentCache {
            pack_config,
            max_bytes,
            enabled,
            ..ComponentCache::default()
        };
        let id = self.create_entry_for(root, NIL_ENTRY);
        debug_assert_eq!(id, ROOT_ENTRY);
        id
    }

    pub fn pack_config(&self) -> &PackConfig {
        &self.pack_config
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn has_entry(&self, id: CacheEntryId) -> bool {
        id != NIL_ENTRY && self.entries.get(id as usize).map_or(false, |entry| entry.is_some())
    }

    pub fn entry(&self, id: CacheEntryId) -> &CacheEntry {
        match self.entries.get(id as usize).and_then(|entry| entry.as_ref()) {
            Some(entry) => entry,
            None => panic!("invalid cache entry {}", id),
        }
    }

    fn entry_mut(&mut self, id: CacheEntryId) -> &mut CacheEntry {
        match self.entries.get_mut(id as usize).and_then(|entry| entry.as_mut()) {
            Some(entry) => entry,
            None => panic!("invalid cache entry {}", id),
        }
    }

    /// Add an entry for a component split off from the component of `father`.
    ///
    /// Evicts old entries first when the memory limit is reached.
    pub fn create_entry_for(&mut self, component: &Component, father: CacheEntryId) -> CacheEntryId {
        if self.stats.bytes >= self.max_bytes {
            self.delete_entries();
        }

        let entry = CacheEntry {
            packed: PackedComponent::new(&self.pack_config, component.vars(), component.clauses()),
            value: None,
            node: None,
            father: NIL_ENTRY,
            first_descendant: NIL_ENTRY,
            next_sibling: NIL_ENTRY,
            creation_time: self.clock,
            deletable: false,
        };
        self.clock += 1;

        self.stats.entries += 1;
        self.stats.bytes += entry.byte_size();

        let id = match self.free_ids.pop() {
            Some(id) => {
                self.entries[id as usize] = Some(entry);
                id
            }
            None => {
                self.entries.push(Some(entry));
                (self.entries.len() - 1) as CacheEntryId
            }
        };

        if father != NIL_ENTRY {
            self.include_descendant(father, id);
        }

        id
    }

    /// Look up the value of a component equal to the given one.
    pub fn request_value_of(&mut self, component: &Component) -> Option<(Value, Option<NodeId>)> {
        if !self.enabled {
            return None;
        }
        self.stats.lookups += 1;

        let packed =
            PackedComponent::new(&self.pack_config, component.vars(), component.clauses());

        let bucket = self.buckets.get(&packed.hash())?;
        for &id in bucket.iter() {
            let entry = self.entry(id);
            if entry.packed == packed {
                if let Some(value) = &entry.value {
                    let result = (value.clone(), entry.node);
                    self.stats.hits += 1;
                    return Some(result);
                }
            }
        }
        None
    }

    /// Look up the probability of a component equal to the given one.
    pub fn request_prob_of(&mut self, component: &Component) -> Option<(f64, Option<NodeId>)> {
        self.request_value_of(component)
            .map(|(value, node)| (value.probability(), node))
    }

    /// Store the value of a solved component.
    ///
    /// Returns false if nothing was stored, because caching is disabled or the entry already has
    /// a value. The entry takes over a reference to `node` only when true is returned.
    pub fn store_value_of(&mut self, id: CacheEntryId, value: Value, node: Option<NodeId>) -> bool {
        if !self.enabled || self.entry(id).value.is_some() {
            return false;
        }
        let bytes = value.byte_size();
        let entry = self.entry_mut(id);
        entry.value = Some(value);
        entry.node = node;
        let hash = entry.packed.hash();

        self.stats.bytes += bytes;
        self.buckets.entry(hash).or_default().push(id);
        true
    }

    /// Mark the entry as no longer anchored by the component stack.
    pub fn make_deletable(&mut self, id: CacheEntryId) {
        self.entry_mut(id).deletable = true;
    }

    /// Free an entry.
    ///
    /// The entry has to be unlinked from the descendant forest already.
    pub fn erase_entry(&mut self, id: CacheEntryId) {
        debug_assert_ne!(id, ROOT_ENTRY);
        let entry = match self.entries[id as usize].take() {
            Some(entry) => entry,
            None => panic!("erasing invalid cache entry {}", id),
        };

        if entry.value.is_some() {
            if let Some(bucket) = self.buckets.get_mut(&entry.packed.hash()) {
                bucket.retain(|&other| other != id);
            }
        }
        if let Some(node) = entry.node {
            self.released_nodes.push(node);
        }

        self.stats.entries -= 1;
        self.stats.bytes -= entry.byte_size();
        self.free_ids.push(id);
    }

    /// Make `child` the first descendant of `father`.
    pub fn include_descendant(&mut self, father: CacheEntryId, child: CacheEntryId) {
        let first = self.entry(father).first_descendant;
        let entry = self.entry_mut(child);
        entry.father = father;
        entry.next_sibling = first;
        self.entry_mut(father).first_descendant = child;
    }

    /// Remove an entry from the child list of its father.
    fn unlink_from_father(&mut self, id: CacheEntryId) {
        let father = self.entry(id).father;
        if father == NIL_ENTRY {
            return;
        }
        let next = self.entry(id).next_sibling;

        if self.entry(father).first_descendant == id {
            self.entry_mut(father).first_descendant = next;
        } else {
            let mut sibling = self.entry(father).first_descendant;
            while sibling != NIL_ENTRY {
                let after = self.entry(sibling).next_sibling;
                if after == id {
                    self.entry_mut(sibling).next_sibling = next;
                    break;
                }
                sibling = after;
            }
        }

        let entry = self.entry_mut(id);
        entry.father = NIL_ENTRY;
        entry.next_sibling = NIL_ENTRY;
    }

    fn children_of(&self, id: CacheEntryId) -> Vec<CacheEntryId> {
        let mut children = vec![];
        let mut child = self.entry(id).first_descendant;
        while child != NIL_ENTRY {
            children.push(child);
            child = self.entry(child).next_sibling;
        }
        children
    }

    /// Unlink an entry from the forest, moving its children to its father.
    pub fn remove_from_descendants_tree(&mut self, id: CacheEntryId) {
        let father = self.entry(id).father;
        let children = self.children_of(id);

        self.unlink_from_father(id);
        self.entry_mut(id).first_descendant = NIL_ENTRY;

        for child in children {
            if father == NIL_ENTRY {
                let entry = self.entry_mut(child);
                entry.father = NIL_ENTRY;
                entry.next_sibling = NIL_ENTRY;
            } else {
                self.include_descendant(father, child);
            }
        }
    }

    /// Erase an entry together with all of its descendants.
    ///
    /// Used when the branch the component was created on turned out unsatisfiable. Values computed
    /// below it are discarded. All descendants are already off the component stack.
    pub fn clean_pollutions_involving(&mut self, id: CacheEntryId) {
        self.unlink_from_father(id);

        let mut worklist = vec![id];
        while let Some(id) = worklist.pop() {
            let mut child = self.entry(id).first_descendant;
            while child != NIL_ENTRY {
                debug_assert!(self.entry(child).deletable);
                worklist.push(child);
                child = self.entry(child).next_sibling;
            }
            self.erase_entry(id);
            self.stats.polluted += 1;
        }
    }

    /// Evict the older half of all deletable entries.
    pub fn delete_entries(&mut self) {
        let mut times: Vec<u64> = self
            .entries
            .iter()
            .skip(ROOT_ENTRY as usize + 1)
            .filter_map(|entry| entry.as_ref())
            .filter(|entry| entry.deletable)
            .map(|entry| entry.creation_time)
            .collect();

        if times.is_empty() {
            return;
        }

        times.sort_unstable();
        let cutoff = times[(times.len() - 1) / 2];

        let before = self.stats.entries;

        for id in (ROOT_ENTRY + 1)..(self.entries.len() as CacheEntryId) {
            let evict = match &self.entries[id as usize] {
                Some(entry) => entry.deletable && entry.creation_time <= cutoff,
                None => false,
            };
            if evict {
                self.remove_from_descendants_tree(id);
                self.erase_entry(id);
                self.stats.evicted += 1;
            }
        }

        self.buckets.retain(|_, bucket| !bucket.is_empty());
        self.recompute_bytes();

        debug!(
            "evicted cache entries from {} to {} ({} bytes)",
            before, self.stats.entries, self.stats.bytes
        );
    }

    /// Recompute memory usage and entry count from scratch.
    pub fn recompute_bytes(&mut self) -> usize {
        let (entries, bytes) = self
            .entries
            .iter()
            .filter_map(|entry| entry.as_ref())
            .fold((0, 0), |(entries, bytes), entry| {
                (entries + 1, bytes + entry.byte_size())
            });
        self.stats.entries = entries;
        self.stats.bytes = bytes;
        bytes
    }

    /// Trace nodes that lost their cache reference since the last call.
    pub fn take_released_nodes(&mut self) -> Vec<NodeId> {
        take(&mut self.released_nodes)
    }

    /// Check all structural invariants.
    pub fn check_consistency(&self) -> Result<(), String> {
        let live = self.entries.iter().filter(|entry| entry.is_some()).count();
        if live != self.stats.entries {
            return Err(format!("{} live entries, {} counted", live, self.stats.entries));
        }

        for (index, entry) in self.entries.iter().enumerate() {
            let id = index as CacheEntryId;
            let entry = match entry {
                Some(entry) => entry,
                None => continue,
            };

            if entry.father != NIL_ENTRY {
                if !self.has_entry(entry.father) {
                    return Err(format!("entry {} has erased father {}", id, entry.father));
                }
                let count = self
                    .children_of(entry.father)
                    .iter()
                    .filter(|&&child| child == id)
                    .count();
                if count != 1 {
                    return Err(format!("entry {} listed {} times by its father", id, count));
                }
            }

            for child in self.children_of(id) {
                if self.entry(child).father != id {
                    return Err(format!("child {} of {} has another father", child, id));
                }
            }

            let mut ancestor = entry.father;
            let mut steps = 0;
            while ancestor != NIL_ENTRY {
                if ancestor == id || steps > live {
                    return Err(format!("cycle through entry {}", id));
                }
                ancestor = self.entry(ancestor).father;
                steps += 1;
            }

            let in_bucket = self
                .buckets
                .get(&entry.packed.hash())
                .map_or(false, |bucket| bucket.contains(&id));
            if in_bucket != entry.value.is_some() {
                return Err(format!("entry {} hashed {}, solved {}", id, in_bucket, entry.value.is_some()));
            }
        }

        for bucket in self.buckets.values() {
            for &id in bucket.iter() {
                if !self.has_entry(id) {
                    return Err(format!("bucket refers to erased entry {}", id));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use num_bigint::BigUint;

    use tallysat_formula::vars;

    fn component(vars: &[crate::lit::Var], clauses: &[u32]) -> Component {
        Component::new(vars.to_vec(), clauses.to_vec())
    }

    fn cache_with_root(max_bytes: usize) -> ComponentCache {
        let mut cache = ComponentCache::default();
        let root = component(&vars![1, 2, 3, 4, 5, 6], &[1, 2, 3, 4]);
        cache.init(PackConfig::new(6, 4), max_bytes, true, &root);
        cache
    }

    fn count(value: u32) -> Value {
        Value::Count(BigUint::from(value))
    }

    #[test]
    fn lookup_after_store() {
        let mut cache = cache_with_root(usize::max_value());

        let comp = component(&vars![1, 3], &[2]);
        let id = cache.create_entry_for(&comp, ROOT_ENTRY);

        assert_eq!(cache.request_value_of(&comp), None);

        assert!(cache.store_value_of(id, count(3), None));
        assert!(!cache.store_value_of(id, count(4), None));

        let equal = component(&vars![1, 3], &[2]);
        assert_eq!(cache.request_value_of(&equal), Some((count(3), None)));

        let other = component(&vars![1, 3], &[]);
        assert_eq!(cache.request_value_of(&other), None);

        assert_eq!(cache.stats().lookups, 3);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.check_consistency(), Ok(()));
    }

    #[test]
    fn disabled_cache_never_hits() {
        let mut cache = ComponentCache::default();
        let root = component(&vars![1, 2], &[]);
        cache.init(PackConfig::new(2, 1), usize::max_value(), false, &root);

        let comp = component(&vars![1], &[]);
        let id = cache.create_entry_for(&comp, ROOT_ENTRY);
        assert!(!cache.store_value_of(id, count(2), Some(7)));
        assert_eq!(cache.request_value_of(&comp), None);
        assert!(cache.take_released_nodes().is_empty());
    }

    #[test]
    fn erased_ids_are_reused() {
        let mut cache = cache_with_root(usize::max_value());
        let a = cache.create_entry_for(&component(&vars![1], &[]), ROOT_ENTRY);
        let b = cache.create_entry_for(&component(&vars![2], &[]), ROOT_ENTRY);

        cache.remove_from_descendants_tree(a);
        cache.erase_entry(a);
        assert!(!cache.has_entry(a));

        let c = cache.create_entry_for(&component(&vars![3], &[]), b);
        assert_eq!(c, a);
        assert_eq!(cache.entry(c).father(), b);
        assert!(cache.entry(c).creation_time() > cache.entry(b).creation_time());
        assert_eq!(cache.check_consistency(), Ok(()));
    }

    #[test]
    fn removing_from_tree_reparents_children() {
        let mut cache = cache_with_root(usize::max_value());
        let a = cache.create_entry_for(&component(&vars![1, 2, 3], &[1]), ROOT_ENTRY);
        let b = cache.create_entry_for(&component(&vars![1], &[]), a);
        let c = cache.create_entry_for(&component(&vars![2, 3], &[1]), a);

        cache.remove_from_descendants_tree(a);
        cache.erase_entry(a);

        assert_eq!(cache.entry(b).father(), ROOT_ENTRY);
        assert_eq!(cache.entry(c).father(), ROOT_ENTRY);
        assert_eq!(cache.children_of(ROOT_ENTRY).len(), 2);
        assert_eq!(cache.check_consistency(), Ok(()));
    }

    #[test]
    fn pollution_cleanup_erases_subtree() {
        let mut cache = cache_with_root(usize::max_value());
        let keep = cache.create_entry_for(&component(&vars![5, 6], &[4]), ROOT_ENTRY);
        let a = cache.create_entry_for(&component(&vars![1, 2, 3], &[1]), ROOT_ENTRY);
        let b = cache.create_entry_for(&component(&vars![1, 2], &[1]), a);
        let c = cache.create_entry_for(&component(&vars![1], &[]), b);

        cache.store_value_of(c, count(2), Some(9));
        cache.make_deletable(c);
        cache.store_value_of(b, count(3), None);
        cache.make_deletable(b);

        cache.clean_pollutions_involving(a);

        assert!(!cache.has_entry(a));
        assert!(!cache.has_entry(b));
        assert!(!cache.has_entry(c));
        assert!(cache.has_entry(keep));
        assert_eq!(cache.take_released_nodes(), vec![9]);
        assert_eq!(cache.stats().polluted, 3);
        assert_eq!(
            cache.request_value_of(&component(&vars![1, 2], &[1])),
            None
        );
        assert_eq!(cache.check_consistency(), Ok(()));
    }

    #[test]
    fn pollution_cleanup_spares_entries_outside_the_subtree() {
        let mut cache = cache_with_root(usize::max_value());
        let father = cache.create_entry_for(&component(&vars![1, 2, 3, 4, 5], &[1, 2]), ROOT_ENTRY);
        let sibling = cache.create_entry_for(&component(&vars![4, 5], &[2]), father);
        let nephew = cache.create_entry_for(&component(&vars![4], &[]), sibling);
        let polluted = cache.create_entry_for(&component(&vars![1, 2, 3], &[1]), father);
        let below = cache.create_entry_for(&component(&vars![2, 3], &[1]), polluted);

        cache.store_value_of(nephew, count(2), Some(4));
        cache.make_deletable(nephew);
        cache.store_value_of(sibling, count(3), None);
        cache.make_deletable(sibling);
        cache.store_value_of(below, count(3), Some(5));
        cache.make_deletable(below);

        cache.clean_pollutions_involving(polluted);

        assert!(!cache.has_entry(polluted));
        assert!(!cache.has_entry(below));
        assert!(cache.has_entry(father));
        assert!(cache.has_entry(sibling));
        assert!(cache.has_entry(nephew));
        assert_eq!(cache.children_of(father), vec![sibling]);
        assert_eq!(cache.entry(nephew).father(), sibling);
        assert_eq!(cache.take_released_nodes(), vec![5]);
        assert_eq!(cache.stats().polluted, 2);
        assert_eq!(
            cache.request_value_of(&component(&vars![4, 5], &[2])),
            Some((count(3), None))
        );
        assert_eq!(
            cache.request_value_of(&component(&vars![4], &[])),
            Some((count(2), Some(4)))
        );
        assert_eq!(cache.check_consistency(), Ok(()));
    }

    #[test]
    fn probabilities_are_looked_up() {
        let mut cache = cache_with_root(usize::max_value());
        let comp = component(&vars![2, 6], &[3]);
        let id = cache.create_entry_for(&comp, ROOT_ENTRY);

        assert_eq!(cache.request_prob_of(&comp), None);
        assert!(cache.store_value_of(id, Value::Probability(0.375), Some(3)));
        assert_eq!(cache.request_prob_of(&comp), Some((0.375, Some(3))));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn eviction_spares_root_and_anchored_entries() {
        let mut cache = cache_with_root(usize::max_value());

        let mut ids = vec![];
        for index in 0..6 {
            let comp = component(&[crate::lit::Var::from_index(index)], &[]);
            let id = cache.create_entry_for(&comp, ROOT_ENTRY);
            cache.store_value_of(id, count(2), None);
            ids.push(id);
        }

        // The first entry stays anchored
        for &id in ids[1..].iter() {
            cache.make_deletable(id);
        }

        let before = cache.stats().entries;
        cache.delete_entries();
        let evicted = before - cache.stats().entries;

        assert_eq!(evicted, 3);
        assert!(cache.has_entry(ROOT_ENTRY));
        assert!(cache.has_entry(ids[0]));
        assert!(!cache.has_entry(ids[1]));
        assert!(cache.has_entry(ids[5]));
        assert_eq!(cache.check_consistency(), Ok(()));

        let bytes = cache.stats().bytes;
        assert_eq!(cache.recompute_bytes(), bytes);
    }

    #[test]
    fn memory_limit_triggers_eviction() {
        let mut cache = cache_with_root(0);

        let first = cache.create_entry_for(&component(&vars![1], &[]), ROOT_ENTRY);
        cache.store_value_of(first, count(2), None);
        cache.make_deletable(first);

        let second = cache.create_entry_for(&component(&vars![2], &[]), ROOT_ENTRY);

        assert!(!cache.has_entry(first) || first == second);
        assert_eq!(cache.stats().evicted, 1);
        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.check_consistency(), Ok(()));
    }
}
