use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use log::warn;

use crate::ir::hierarchy::ClassHierarchy;
use crate::ir::program::Program;
use crate::ir::stmt::{CallKind, InvokeExp, MethodIdx, Stmt, StmtIdx};

/// One resolved call: a call site, its dispatch kind, and a callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge<CS, M> {
    pub kind: CallKind,
    pub call_site: CS,
    pub callee: M,
}

/// Call graph generic over the method and call-site keys, so the same
/// container backs both the plain graphs (method indices) and the
/// context-sensitive ones (interned context/method pairs).
///
/// The reachable set and the edge set only grow; `add_reachable_method` and
/// `add_edge` are idempotent and report whether they inserted anything.
#[derive(Debug)]
pub struct CallGraph<CS, M>
where
    CS: Copy + Eq + Hash,
    M: Copy + Eq + Hash,
{
    entry_methods: Vec<M>,
    reachable: Vec<M>,
    reachable_set: HashSet<M>,
    edges: Vec<Edge<CS, M>>,
    edge_set: HashSet<Edge<CS, M>>,
    callees_of: HashMap<CS, Vec<M>>,
}

impl<CS, M> Default for CallGraph<CS, M>
where
    CS: Copy + Eq + Hash,
    M: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self {
            entry_methods: Vec::new(),
            reachable: Vec::new(),
            reachable_set: HashSet::new(),
            edges: Vec::new(),
            edge_set: HashSet::new(),
            callees_of: HashMap::new(),
        }
    }
}

impl<CS, M> CallGraph<CS, M>
where
    CS: Copy + Eq + Hash,
    M: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry_method(&mut self, m: M) {
        self.entry_methods.push(m);
    }

    pub fn entry_methods(&self) -> &[M] {
        &self.entry_methods
    }

    /// Returns true when the method was not reachable before.
    pub fn add_reachable_method(&mut self, m: M) -> bool {
        if self.reachable_set.insert(m) {
            self.reachable.push(m);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, m: M) -> bool {
        self.reachable_set.contains(&m)
    }

    /// Insert an edge; returns true when it is new.
    pub fn add_edge(&mut self, edge: Edge<CS, M>) -> bool {
        if self.edge_set.insert(edge) {
            self.callees_of
                .entry(edge.call_site)
                .or_default()
                .push(edge.callee);
            self.edges.push(edge);
            true
        } else {
            false
        }
    }

    pub fn edges(&self) -> &[Edge<CS, M>] {
        &self.edges
    }

    pub fn callees_of_site(&self, cs: CS) -> &[M] {
        self.callees_of.get(&cs).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reachable methods in discovery order.
    pub fn reachable_methods(&self) -> &[M] {
        &self.reachable
    }

    pub fn num_reachable(&self) -> usize {
        self.reachable.len()
    }
}

// ── Class-hierarchy analysis ────────────────────────────────────────────────

/// Build a call graph from `entry` using class-hierarchy analysis: call
/// targets are every concrete override below the declared type, with no
/// pointer information.
pub fn build_cha(
    program: &Program,
    hierarchy: &ClassHierarchy,
    entry: MethodIdx,
) -> CallGraph<StmtIdx, MethodIdx> {
    let mut cg = CallGraph::new();
    cg.add_entry_method(entry);

    let mut worklist = vec![entry];
    while let Some(caller) = worklist.pop() {
        if cg.contains(caller) {
            continue;
        }
        cg.add_reachable_method(caller);

        for (site, stmt) in program.method_stmts(caller) {
            let call = match stmt {
                Stmt::Invoke { call, .. } => call,
                _ => continue,
            };
            for callee in resolve(hierarchy, call) {
                worklist.push(callee);
                cg.add_edge(Edge {
                    kind: call.kind,
                    call_site: site,
                    callee,
                });
            }
        }
    }
    cg
}

/// Resolve a call site's possible targets under CHA. Results are sorted by
/// method index for deterministic edge order.
pub fn resolve(hierarchy: &ClassHierarchy, call: &InvokeExp) -> Vec<MethodIdx> {
    let declared = call.method_ref.class;
    let subsig = &call.method_ref.subsig;
    let mut targets = BTreeSet::new();

    match call.kind {
        CallKind::Static => match hierarchy.declared_method(declared, subsig) {
            Some(m) => {
                targets.insert(m);
            }
            None => warn!("static call to undeclared method {subsig}"),
        },
        CallKind::Special => {
            if let Some(m) = hierarchy.dispatch(declared, subsig) {
                targets.insert(m);
            }
        }
        CallKind::Virtual | CallKind::Interface => {
            // descend the hierarchy from the declared type, dispatching at
            // every class on the way down
            let mut stack = vec![declared];
            let mut seen = HashSet::new();
            while let Some(class) = stack.pop() {
                if !seen.insert(class) {
                    continue;
                }
                if let Some(m) = hierarchy.dispatch(class, subsig) {
                    targets.insert(m);
                }
                if hierarchy.is_interface(class) {
                    stack.extend(hierarchy.direct_implementors_of(class));
                    stack.extend(hierarchy.direct_subinterfaces_of(class));
                } else {
                    stack.extend(hierarchy.direct_subclasses_of(class));
                }
            }
        }
        // lambda-style and exotic call sites are never resolved here
        CallKind::Dynamic | CallKind::Other => {}
    }

    targets.into_iter().collect()
}
