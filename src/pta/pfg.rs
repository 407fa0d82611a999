use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::pta::pts::PointsToSet;

/// Index into the pointer arena of one `PointerFlowGraph`.
pub type PointerId = usize;

/// The pointer-flow graph: nodes are interned pointer keys, each owning a
/// points-to set; an edge `s → t` is the subset constraint
/// `pts(s) ⊆ pts(t)`.
///
/// Generic over the pointer key so the context-insensitive and
/// context-sensitive solvers share the arena, edge bookkeeping and
/// propagation plumbing.
#[derive(Debug)]
pub struct PointerFlowGraph<K: Eq + Hash + Clone> {
    ids: HashMap<K, PointerId>,
    keys: Vec<K>,
    pts: Vec<PointsToSet>,
    succs: Vec<Vec<PointerId>>,
    edges: HashSet<(PointerId, PointerId)>,
}

impl<K: Eq + Hash + Clone> Default for PointerFlowGraph<K> {
    fn default() -> Self {
        Self {
            ids: HashMap::new(),
            keys: Vec::new(),
            pts: Vec::new(),
            succs: Vec::new(),
            edges: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> PointerFlowGraph<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a pointer key, creating its (empty) points-to set on first use.
    pub fn intern(&mut self, key: K) -> PointerId {
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.keys.len();
        self.ids.insert(key.clone(), id);
        self.keys.push(key);
        self.pts.push(PointsToSet::new());
        self.succs.push(Vec::new());
        id
    }

    /// Insert the edge `source → target`; returns true when it is new.
    pub fn add_edge(&mut self, source: PointerId, target: PointerId) -> bool {
        if self.edges.insert((source, target)) {
            self.succs[source].push(target);
            true
        } else {
            false
        }
    }

    pub fn succs_of(&self, p: PointerId) -> &[PointerId] {
        &self.succs[p]
    }

    pub fn pts(&self, p: PointerId) -> &PointsToSet {
        &self.pts[p]
    }

    pub fn pts_mut(&mut self, p: PointerId) -> &mut PointsToSet {
        &mut self.pts[p]
    }

    pub fn key(&self, p: PointerId) -> &K {
        &self.keys[p]
    }

    pub fn num_pointers(&self) -> usize {
        self.keys.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn pointers(&self) -> impl Iterator<Item = (PointerId, &K)> {
        self.keys.iter().enumerate()
    }

    pub fn edges(&self) -> impl Iterator<Item = (PointerId, PointerId)> + '_ {
        self.edges.iter().copied()
    }
}
