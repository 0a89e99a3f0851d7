use crate::config::{SKIP_LIST_BRANCHING_FACTOR, SKIP_LIST_MAX_HEIGHT};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

pub type KeyComparator<K> = fn(&K, &K) -> Ordering;

pub fn default_comparator<K: Ord>(a: &K, b: &K) -> Ordering {
    a.cmp(b)
}

const NIL: usize = usize::MAX;

/// One tower in the list. `links[i]` is the arena index of the next node at
/// level i; the vector length is the node's height.
#[derive(Debug)]
struct SkipNode<K> {
    key: Option<K>,
    links: Vec<usize>,
}

impl<K> SkipNode<K> {
    fn new(key: Option<K>, height: usize) -> Self {
        Self {
            key,
            links: vec![NIL; height],
        }
    }

    fn next(&self, level: usize) -> usize {
        self.links[level]
    }

    fn set_next(&mut self, level: usize, node: usize) {
        self.links[level] = node;
    }
}

#[derive(Debug)]
struct SkipListCore<K> {
    /// Node arena; slot 0 is the headless sentinel tower. Links address
    /// nodes by arena index, never by pointer.
    nodes: Vec<SkipNode<K>>,
    free_slots: Vec<usize>,
    height: usize,
    size: usize,
    rng: StdRng,
}

/// A sorted set with probabilistic balancing. Mutators take the container
/// lock exclusively, queries take it shared. Keys are equivalent when
/// neither orders below the other.
#[derive(Debug)]
pub struct SkipList<K> {
    core: RwLock<SkipListCore<K>>,
    compare: KeyComparator<K>,
    max_height: usize,
}

impl<K: Ord> SkipList<K> {
    pub fn new() -> Self {
        Self::with_comparator(default_comparator::<K>)
    }
}

impl<K: Ord> Default for SkipList<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> SkipList<K> {
    pub fn with_comparator(compare: KeyComparator<K>) -> Self {
        Self::with_comparator_and_height(compare, SKIP_LIST_MAX_HEIGHT)
    }

    pub fn with_comparator_and_height(compare: KeyComparator<K>, max_height: usize) -> Self {
        assert!(max_height >= 1, "skip list needs at least one level");
        Self {
            core: RwLock::new(SkipListCore {
                nodes: vec![SkipNode::new(None, max_height)],
                free_slots: vec![],
                height: 1,
                size: 0,
                rng: StdRng::from_os_rng(),
            }),
            compare,
            max_height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.core.read().size == 0
    }

    pub fn len(&self) -> usize {
        self.core.read().size
    }

    fn less(&self, a: &K, b: &K) -> bool {
        (self.compare)(a, b) == Ordering::Less
    }

    /// Geometric height draw with the classic branching factor.
    fn random_height(core: &mut SkipListCore<K>, max_height: usize) -> usize {
        let mut height = 1;
        while height < max_height && core.rng.random_range(0..SKIP_LIST_BRANCHING_FACTOR) == 0 {
            height += 1;
        }
        height
    }

    /// Walk down the levels collecting the per-level predecessor of `key`.
    fn find_predecessors(&self, core: &SkipListCore<K>, key: &K) -> Vec<usize> {
        let mut update = vec![0usize; self.max_height];
        let mut current = 0;
        for level in (0..core.height).rev() {
            loop {
                let next = core.nodes[current].next(level);
                if next == NIL {
                    break;
                }
                let next_key = core.nodes[next].key.as_ref().expect("non-head node has key");
                if !self.less(next_key, key) {
                    break;
                }
                current = next;
            }
            update[level] = current;
        }
        update
    }

    /// Insert a key; refuses duplicates.
    pub fn insert(&self, key: K) -> bool {
        let mut core = self.core.write();
        let update = self.find_predecessors(&core, &key);

        let candidate = core.nodes[update[0]].next(0);
        if candidate != NIL {
            let candidate_key = core.nodes[candidate].key.as_ref().expect("node has key");
            if !self.less(&key, candidate_key) && !self.less(candidate_key, &key) {
                return false;
            }
        }

        let new_height = Self::random_height(&mut core, self.max_height);
        let mut update = update;
        if new_height > core.height {
            for slot in update.iter_mut().take(new_height).skip(core.height) {
                *slot = 0;
            }
            core.height = new_height;
        }

        let new_index = match core.free_slots.pop() {
            Some(slot) => {
                core.nodes[slot] = SkipNode::new(Some(key), new_height);
                slot
            }
            None => {
                core.nodes.push(SkipNode::new(Some(key), new_height));
                core.nodes.len() - 1
            }
        };

        for (level, &pred) in update.iter().enumerate().take(new_height) {
            let pred_next = core.nodes[pred].next(level);
            core.nodes[new_index].set_next(level, pred_next);
            core.nodes[pred].set_next(level, new_index);
        }
        core.size += 1;
        true
    }

    /// Remove a key; returns false when absent.
    pub fn erase(&self, key: &K) -> bool {
        let mut core = self.core.write();
        let update = self.find_predecessors(&core, key);

        let target = core.nodes[update[0]].next(0);
        if target == NIL {
            return false;
        }
        {
            let target_key = core.nodes[target].key.as_ref().expect("node has key");
            if self.less(key, target_key) || self.less(target_key, key) {
                return false;
            }
        }

        for (level, &pred) in update.iter().enumerate().take(core.height) {
            if core.nodes[pred].next(level) != target {
                break;
            }
            let target_next = core.nodes[target].next(level);
            core.nodes[pred].set_next(level, target_next);
        }

        // Shrink while the top level carries no nodes.
        while core.height > 1 && core.nodes[0].next(core.height - 1) == NIL {
            core.height -= 1;
        }

        core.nodes[target] = SkipNode::new(None, 0);
        core.free_slots.push(target);
        core.size -= 1;
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        let core = self.core.read();
        let mut current = 0;
        for level in (0..core.height).rev() {
            loop {
                let next = core.nodes[current].next(level);
                if next == NIL {
                    break;
                }
                let next_key = core.nodes[next].key.as_ref().expect("node has key");
                if !self.less(next_key, key) {
                    break;
                }
                current = next;
            }
        }
        let candidate = core.nodes[current].next(0);
        if candidate == NIL {
            return false;
        }
        let candidate_key = core.nodes[candidate].key.as_ref().expect("node has key");
        !self.less(key, candidate_key) && !self.less(candidate_key, key)
    }

    /// Drop every element. The arena is torn down level-free and iteratively,
    /// so deep lists cannot overflow the stack in a destructor chain.
    pub fn clear(&self) {
        let mut core = self.core.write();
        let max_height = core.nodes[0].links.len();
        core.nodes.clear();
        core.nodes.push(SkipNode::new(None, max_height));
        core.free_slots.clear();
        core.height = 1;
        core.size = 0;
    }
}

impl<K: Clone> SkipList<K> {
    /// Snapshot of the keys in order, walking level 0.
    pub fn keys(&self) -> Vec<K> {
        let core = self.core.read();
        let mut keys = Vec::with_capacity(core.size);
        let mut current = core.nodes[0].next(0);
        while current != NIL {
            keys.push(
                core.nodes[current]
                    .key
                    .as_ref()
                    .expect("node has key")
                    .clone(),
            );
            current = core.nodes[current].next(0);
        }
        keys
    }
}
