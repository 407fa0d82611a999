use std::collections::{HashMap, VecDeque};

use log::{debug, warn};

use crate::graph::callgraph::{CallGraph, Edge};
use crate::ir::hierarchy::ClassHierarchy;
use crate::ir::program::Program;
use crate::ir::stmt::{Exp, MethodIdx, Stmt, StmtIdx, VarIdx};
use crate::pta::heap::{HeapModel, ObjId};
use crate::pta::pfg::{PointerFlowGraph, PointerId};
use crate::pta::pts::PointsToSet;
use crate::pta::result::PointerAnalysisResult;

/// Pointer keys of the context-insensitive analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pointer {
    Var(VarIdx),
    StaticField(usize),
    InstanceField(ObjId, usize),
    ArrayIndex(ObjId),
}

/// Context-insensitive Andersen-style points-to analysis, constructing the
/// call graph on the fly: every object newly discovered at a receiver
/// variable can resolve new callees, whose statements in turn grow the
/// pointer-flow graph.
pub struct CiSolver<'p> {
    program: &'p Program,
    hierarchy: &'p ClassHierarchy,
    heap: HeapModel,
    pfg: PointerFlowGraph<Pointer>,
    call_graph: CallGraph<StmtIdx, MethodIdx>,
    worklist: VecDeque<(PointerId, PointsToSet)>,
    // per-receiver-variable statement indices, filled in as their containing
    // methods become reachable
    field_loads: HashMap<VarIdx, Vec<StmtIdx>>,
    field_stores: HashMap<VarIdx, Vec<StmtIdx>>,
    array_loads: HashMap<VarIdx, Vec<StmtIdx>>,
    array_stores: HashMap<VarIdx, Vec<StmtIdx>>,
    invokes: HashMap<VarIdx, Vec<StmtIdx>>,
}

/// Run the context-insensitive analysis from `entry`.
pub fn solve_ci(
    program: &Program,
    hierarchy: &ClassHierarchy,
    entry: MethodIdx,
) -> CiSolution {
    let mut solver = CiSolver {
        program,
        hierarchy,
        heap: HeapModel::new(),
        pfg: PointerFlowGraph::new(),
        call_graph: CallGraph::new(),
        worklist: VecDeque::new(),
        field_loads: HashMap::new(),
        field_stores: HashMap::new(),
        array_loads: HashMap::new(),
        array_stores: HashMap::new(),
        invokes: HashMap::new(),
    };
    solver.call_graph.add_entry_method(entry);
    solver.add_reachable(entry);
    solver.analyze();
    debug!(
        "ci points-to fixpoint: {} pointers, {} pfg edges, {} reachable methods",
        solver.pfg.num_pointers(),
        solver.pfg.num_edges(),
        solver.call_graph.num_reachable()
    );
    CiSolution {
        pfg: solver.pfg,
        call_graph: solver.call_graph,
        heap: solver.heap,
    }
}

impl CiSolver<'_> {
    fn var_ptr(&mut self, v: VarIdx) -> PointerId {
        self.pfg.intern(Pointer::Var(v))
    }

    /// Make `method` reachable and seed constraints from its statements.
    /// Idempotent; abstract methods contribute nothing.
    fn add_reachable(&mut self, method: MethodIdx) {
        if !self.call_graph.add_reachable_method(method) {
            return;
        }
        if self.program.method(method).is_abstract {
            return;
        }

        let range = {
            let m = self.program.method(method);
            m.stmt_start..m.stmt_end
        };
        for site in range {
            match self.program.stmt(site).clone() {
                Stmt::New { lhs, ty } => {
                    let obj = self.heap.obj_at(site, ty);
                    let ptr = self.var_ptr(lhs);
                    self.worklist.push_back((ptr, PointsToSet::singleton(obj)));
                }
                Stmt::Assign {
                    lhs,
                    rhs: Exp::Var(rhs),
                } => {
                    if self.program.var(lhs).ty.is_reference() {
                        let src = self.var_ptr(rhs);
                        let tgt = self.var_ptr(lhs);
                        self.add_pfg_edge(src, tgt);
                    }
                }
                Stmt::LoadField {
                    lhs,
                    base: None,
                    field,
                } => {
                    let src = self.pfg.intern(Pointer::StaticField(field));
                    let tgt = self.var_ptr(lhs);
                    self.add_pfg_edge(src, tgt);
                }
                Stmt::LoadField {
                    base: Some(base), ..
                } => self.field_loads.entry(base).or_default().push(site),
                Stmt::StoreField {
                    base: None,
                    field,
                    rhs,
                } => {
                    let src = self.var_ptr(rhs);
                    let tgt = self.pfg.intern(Pointer::StaticField(field));
                    self.add_pfg_edge(src, tgt);
                }
                Stmt::StoreField {
                    base: Some(base), ..
                } => self.field_stores.entry(base).or_default().push(site),
                Stmt::LoadArray { base, .. } => {
                    self.array_loads.entry(base).or_default().push(site)
                }
                Stmt::StoreArray { base, .. } => {
                    self.array_stores.entry(base).or_default().push(site)
                }
                Stmt::Invoke { result, call } => {
                    if let Some(base) = call.base {
                        self.invokes.entry(base).or_default().push(site);
                    } else {
                        // static call: resolved on the declared class
                        let callee = match self
                            .hierarchy
                            .declared_method(call.method_ref.class, &call.method_ref.subsig)
                        {
                            Some(m) => m,
                            None => {
                                warn!(
                                    "static call to undeclared method {}",
                                    call.method_ref.subsig
                                );
                                continue;
                            }
                        };
                        let edge = Edge {
                            kind: call.kind,
                            call_site: site,
                            callee,
                        };
                        if self.call_graph.add_edge(edge) {
                            self.link_call(site, &call.args, result, callee);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Parameter-passing and return edges for a newly discovered call edge.
    fn link_call(
        &mut self,
        _site: StmtIdx,
        args: &[VarIdx],
        result: Option<VarIdx>,
        callee: MethodIdx,
    ) {
        self.add_reachable(callee);
        let (params, return_vars) = {
            let m = self.program.method(callee);
            (m.params.clone(), m.return_vars.clone())
        };
        for (arg, param) in args.iter().zip(params.iter()) {
            let src = self.var_ptr(*arg);
            let tgt = self.var_ptr(*param);
            self.add_pfg_edge(src, tgt);
        }
        if let Some(result) = result {
            for ret in return_vars {
                let src = self.var_ptr(ret);
                let tgt = self.var_ptr(result);
                self.add_pfg_edge(src, tgt);
            }
        }
    }

    fn add_pfg_edge(&mut self, source: PointerId, target: PointerId) {
        if !self.pfg.add_edge(source, target) {
            return;
        }
        let pts = self.pfg.pts(source);
        if !pts.is_empty() {
            let pts = pts.clone();
            self.worklist.push_back((target, pts));
        }
    }

    /// Drain the worklist to fixpoint.
    fn analyze(&mut self) {
        while let Some((ptr, pts)) = self.worklist.pop_front() {
            let delta = self.propagate(ptr, &pts);
            if delta.is_empty() {
                continue;
            }
            let var = match self.pfg.key(ptr) {
                Pointer::Var(v) => *v,
                _ => continue,
            };
            for obj in delta.iter() {
                for site in self.field_loads.get(&var).cloned().unwrap_or_default() {
                    if let Stmt::LoadField { lhs, field, .. } = self.program.stmt(site) {
                        let src = self.pfg.intern(Pointer::InstanceField(obj, *field));
                        let tgt = self.var_ptr(*lhs);
                        self.add_pfg_edge(src, tgt);
                    }
                }
                for site in self.field_stores.get(&var).cloned().unwrap_or_default() {
                    if let Stmt::StoreField { field, rhs, .. } = self.program.stmt(site) {
                        let src = self.var_ptr(*rhs);
                        let tgt = self.pfg.intern(Pointer::InstanceField(obj, *field));
                        self.add_pfg_edge(src, tgt);
                    }
                }
                for site in self.array_loads.get(&var).cloned().unwrap_or_default() {
                    if let Stmt::LoadArray { lhs, .. } = self.program.stmt(site) {
                        let src = self.pfg.intern(Pointer::ArrayIndex(obj));
                        let tgt = self.var_ptr(*lhs);
                        self.add_pfg_edge(src, tgt);
                    }
                }
                for site in self.array_stores.get(&var).cloned().unwrap_or_default() {
                    if let Stmt::StoreArray { rhs, .. } = self.program.stmt(site) {
                        let src = self.var_ptr(*rhs);
                        let tgt = self.pfg.intern(Pointer::ArrayIndex(obj));
                        self.add_pfg_edge(src, tgt);
                    }
                }
                self.process_call(var, obj);
            }
        }
    }

    /// Union `pts` into `pts(ptr)` and forward the growth along PFG
    /// successors. Returns the newly added objects.
    fn propagate(&mut self, ptr: PointerId, pts: &PointsToSet) -> PointsToSet {
        let current = self.pfg.pts(ptr);
        let delta: PointsToSet = pts.iter().filter(|o| !current.contains(*o)).collect();
        if delta.is_empty() {
            return delta;
        }
        self.pfg.pts_mut(ptr).union_from(&delta);
        for succ in self.pfg.succs_of(ptr).to_vec() {
            self.worklist.push_back((succ, delta.clone()));
        }
        delta
    }

    /// Resolve the instance calls on `var` against a newly discovered
    /// receiver object.
    fn process_call(&mut self, var: VarIdx, recv: ObjId) {
        for site in self.invokes.get(&var).cloned().unwrap_or_default() {
            let (call, result) = match self.program.stmt(site) {
                Stmt::Invoke { result, call } => (call.clone(), *result),
                _ => continue,
            };
            // dispatch the receiver's runtime type; unresolved or abstract
            // targets are skipped, not errors
            let recv_class = match self.heap.obj(recv).ty.class() {
                Some(c) => c,
                None => continue,
            };
            let callee = match self.hierarchy.dispatch(recv_class, &call.method_ref.subsig) {
                Some(m) => m,
                None => continue,
            };

            if let Some(this) = self.program.method(callee).this {
                let this_ptr = self.var_ptr(this);
                self.worklist
                    .push_back((this_ptr, PointsToSet::singleton(recv)));
            }

            let edge = Edge {
                kind: call.kind,
                call_site: site,
                callee,
            };
            if self.call_graph.add_edge(edge) {
                self.link_call(site, &call.args, result, callee);
            }
        }
    }
}

/// Everything the context-insensitive run produced, PFG included (the PFG
/// backs the subset-invariant checks in the test suite).
#[derive(Debug)]
pub struct CiSolution {
    pub pfg: PointerFlowGraph<Pointer>,
    pub call_graph: CallGraph<StmtIdx, MethodIdx>,
    pub heap: HeapModel,
}

impl CiSolution {
    pub fn pts_of_var(&self, v: VarIdx) -> Option<&PointsToSet> {
        // read-only lookup: absent pointer means the empty set
        self.pfg
            .pointers()
            .find(|(_, k)| matches!(k, Pointer::Var(var) if *var == v))
            .map(|(id, _)| self.pfg.pts(id))
    }

    pub fn into_result(self) -> PointerAnalysisResult {
        let mut var_pts = HashMap::new();
        for (id, key) in self.pfg.pointers() {
            if let Pointer::Var(v) = key {
                var_pts.insert(*v, self.pfg.pts(id).clone());
            }
        }
        PointerAnalysisResult::new(self.call_graph, self.heap, var_pts)
    }
}
