use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

use log::debug;

use crate::graph::callgraph::{CallGraph, Edge};
use crate::ir::hierarchy::ClassHierarchy;
use crate::ir::program::Program;
use crate::ir::stmt::{Exp, FieldIdx, MethodIdx, Stmt, StmtIdx, VarIdx};
use crate::pta::context::{ContextSelector, ContextTable, CtxId};
use crate::pta::heap::{HeapModel, ObjId};
use crate::pta::pfg::{PointerFlowGraph, PointerId};
use crate::pta::pts::PointsToSet;
use crate::pta::result::PointerAnalysisResult;
use crate::taint::{TaintAnalysis, TaintFlow};

/// Interned (context, variable) pair.
pub type CsVarId = usize;
/// Interned (heap context, object) pair. Points-to sets of the CS analysis
/// hold these ids.
pub type CsObjId = usize;
/// Interned (context, method) pair.
pub type CsMethodId = usize;
/// Interned (context, call site) pair.
pub type CsCallSiteId = usize;

#[derive(Debug)]
struct Interner<T: Eq + Hash + Copy> {
    ids: HashMap<T, usize>,
    items: Vec<T>,
}

impl<T: Eq + Hash + Copy> Default for Interner<T> {
    fn default() -> Self {
        Self {
            ids: HashMap::new(),
            items: Vec::new(),
        }
    }
}

impl<T: Eq + Hash + Copy> Interner<T> {
    fn intern(&mut self, item: T) -> usize {
        if let Some(&id) = self.ids.get(&item) {
            return id;
        }
        let id = self.items.len();
        self.ids.insert(item, id);
        self.items.push(item);
        id
    }

    fn get(&self, id: usize) -> T {
        self.items[id]
    }
}

/// Guarantees at most one interned instance per (context, entity) pair, so
/// id equality is pair equality everywhere in the solver.
#[derive(Debug, Default)]
pub struct CsManager {
    pub ctxs: ContextTable,
    vars: Interner<(CtxId, VarIdx)>,
    objs: Interner<(CtxId, ObjId)>,
    methods: Interner<(CtxId, MethodIdx)>,
    call_sites: Interner<(CtxId, StmtIdx)>,
}

impl CsManager {
    pub fn cs_var(&mut self, ctx: CtxId, v: VarIdx) -> CsVarId {
        self.vars.intern((ctx, v))
    }

    pub fn var_of(&self, id: CsVarId) -> (CtxId, VarIdx) {
        self.vars.get(id)
    }

    pub fn cs_obj(&mut self, ctx: CtxId, obj: ObjId) -> CsObjId {
        self.objs.intern((ctx, obj))
    }

    pub fn obj_of(&self, id: CsObjId) -> (CtxId, ObjId) {
        self.objs.get(id)
    }

    pub fn cs_method(&mut self, ctx: CtxId, m: MethodIdx) -> CsMethodId {
        self.methods.intern((ctx, m))
    }

    pub fn method_of(&self, id: CsMethodId) -> (CtxId, MethodIdx) {
        self.methods.get(id)
    }

    pub fn cs_call_site(&mut self, ctx: CtxId, site: StmtIdx) -> CsCallSiteId {
        self.call_sites.intern((ctx, site))
    }

    pub fn call_site_of(&self, id: CsCallSiteId) -> (CtxId, StmtIdx) {
        self.call_sites.get(id)
    }
}

/// Pointer keys of the context-sensitive analysis. Static fields and array
/// cells stay context-free and are shared across all contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsPointer {
    Var(CsVarId),
    StaticField(FieldIdx),
    InstanceField(CsObjId, FieldIdx),
    ArrayIndex(CsObjId),
}

/// Solver state shared with the taint layer. The taint analysis receives
/// `&mut CsCore` in its hooks so it can intern pointers, synthesize taint
/// objects and enqueue deltas without owning any of the machinery.
pub struct CsCore<'p> {
    pub program: &'p Program,
    pub hierarchy: &'p ClassHierarchy,
    pub heap: HeapModel,
    pub csm: CsManager,
    pub pfg: PointerFlowGraph<CsPointer>,
    pub call_graph: CallGraph<CsCallSiteId, CsMethodId>,
    worklist: VecDeque<(PointerId, PointsToSet)>,
    // context-free per-variable statement indexes, recorded once per method
    indexed_methods: HashSet<MethodIdx>,
    field_loads: HashMap<VarIdx, Vec<StmtIdx>>,
    field_stores: HashMap<VarIdx, Vec<StmtIdx>>,
    array_loads: HashMap<VarIdx, Vec<StmtIdx>>,
    array_stores: HashMap<VarIdx, Vec<StmtIdx>>,
    invokes: HashMap<VarIdx, Vec<StmtIdx>>,
}

impl CsCore<'_> {
    pub fn cs_var_ptr(&mut self, ctx: CtxId, v: VarIdx) -> PointerId {
        let cs = self.csm.cs_var(ctx, v);
        self.pfg.intern(CsPointer::Var(cs))
    }

    /// Schedule `pts` for propagation into `ptr`. Also the taint layer's way
    /// of injecting objects.
    pub fn enqueue(&mut self, ptr: PointerId, pts: PointsToSet) {
        self.worklist.push_back((ptr, pts));
    }

    /// True if the set element is a taint pseudo-object.
    pub fn is_taint(&self, cs_obj: CsObjId) -> bool {
        let (_, obj) = self.csm.obj_of(cs_obj);
        self.heap.is_taint(obj)
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

    /// Record the per-variable use lists of a method the first time any
    /// context reaches it.
    fn index_method(&mut self, method: MethodIdx) {
        if !self.indexed_methods.insert(method) {
            return;
        }
        let m = self.program.method(method);
        for site in m.stmt_start..m.stmt_end {
            match self.program.stmt(site) {
                Stmt::LoadField {
                    base: Some(base), ..
                } => self.field_loads.entry(*base).or_default().push(site),
                Stmt::StoreField {
                    base: Some(base), ..
                } => self.field_stores.entry(*base).or_default().push(site),
                Stmt::LoadArray { base, .. } => {
                    self.array_loads.entry(*base).or_default().push(site)
                }
                Stmt::StoreArray { base, .. } => {
                    self.array_stores.entry(*base).or_default().push(site)
                }
                Stmt::Invoke { call, .. } => {
                    if let Some(base) = call.base {
                        self.invokes.entry(base).or_default().push(site);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Context-sensitive Andersen-style points-to analysis: the same state
/// machine as the CI solver, but every variable, method and heap object is
/// paired with a context chosen by the selector. Notifies the taint layer
/// after every propagation and on every new call edge.
pub struct CsSolver<'p> {
    core: CsCore<'p>,
    selector: &'p dyn ContextSelector,
    taint: Option<TaintAnalysis>,
}

/// Run the context-sensitive analysis from `entry` under `selector`,
/// optionally with a taint analysis attached.
pub fn solve_cs<'p>(
    program: &'p Program,
    hierarchy: &'p ClassHierarchy,
    entry: MethodIdx,
    selector: &'p dyn ContextSelector,
    taint: Option<TaintAnalysis>,
) -> CsSolution {
    let mut solver = CsSolver {
        core: CsCore {
            program,
            hierarchy,
            heap: HeapModel::new(),
            csm: CsManager::default(),
            pfg: PointerFlowGraph::new(),
            call_graph: CallGraph::new(),
            worklist: VecDeque::new(),
            indexed_methods: HashSet::new(),
            field_loads: HashMap::new(),
            field_stores: HashMap::new(),
            array_loads: HashMap::new(),
            array_stores: HashMap::new(),
            invokes: HashMap::new(),
        },
        selector,
        taint,
    };

    let empty = solver.core.csm.ctxs.empty();
    let cs_entry = solver.core.csm.cs_method(empty, entry);
    solver.core.call_graph.add_entry_method(cs_entry);
    solver.add_reachable(cs_entry);
    solver.analyze();

    let taint_flows = solver
        .taint
        .take()
        .map(|taint| taint.on_finish(&mut solver.core));

    debug!(
        "cs points-to fixpoint: {} pointers, {} pfg edges, {} reachable cs-methods",
        solver.core.pfg.num_pointers(),
        solver.core.pfg.num_edges(),
        solver.core.call_graph.num_reachable()
    );

    CsSolution {
        heap: solver.core.heap,
        csm: solver.core.csm,
        pfg: solver.core.pfg,
        call_graph: solver.core.call_graph,
        taint_flows,
    }
}

impl CsSolver<'_> {
    fn add_reachable(&mut self, cs_method: CsMethodId) {
        if !self.core.call_graph.add_reachable_method(cs_method) {
            return;
        }
        let (ctx, method) = self.core.csm.method_of(cs_method);
        if self.core.program.method(method).is_abstract {
            return;
        }
        self.core.index_method(method);

        let range = {
            let m = self.core.program.method(method);
            m.stmt_start..m.stmt_end
        };
        for site in range {
            match self.core.program.stmt(site).clone() {
                Stmt::New { lhs, ty } => {
                    let obj = self.core.heap.obj_at(site, ty);
                    let heap_ctx = self.selector.select_heap(&mut self.core.csm.ctxs, ctx, obj);
                    let cs_obj = self.core.csm.cs_obj(heap_ctx, obj);
                    let ptr = self.core.cs_var_ptr(ctx, lhs);
                    self.core.enqueue(ptr, PointsToSet::singleton(cs_obj));
                }
                Stmt::Assign {
                    lhs,
                    rhs: Exp::Var(rhs),
                } => {
                    if self.core.program.var(lhs).ty.is_reference() {
                        let src = self.core.cs_var_ptr(ctx, rhs);
                        let tgt = self.core.cs_var_ptr(ctx, lhs);
                        self.core.add_pfg_edge(src, tgt);
                    }
                }
                Stmt::LoadField {
                    lhs,
                    base: None,
                    field,
                } => {
                    let src = self.core.pfg.intern(CsPointer::StaticField(field));
                    let tgt = self.core.cs_var_ptr(ctx, lhs);
                    self.core.add_pfg_edge(src, tgt);
                }
                Stmt::StoreField {
                    base: None,
                    field,
                    rhs,
                } => {
                    let src = self.core.cs_var_ptr(ctx, rhs);
                    let tgt = self.core.pfg.intern(CsPointer::StaticField(field));
                    self.core.add_pfg_edge(src, tgt);
                }
                Stmt::Invoke { result, call } if call.base.is_none() => {
                    let callee = match self
                        .core
                        .hierarchy
                        .declared_method(call.method_ref.class, &call.method_ref.subsig)
                    {
                        Some(m) => m,
                        None => continue,
                    };
                    let cs_call = self.core.csm.cs_call_site(ctx, site);
                    let callee_ctx =
                        self.selector
                            .select_static(&mut self.core.csm.ctxs, ctx, site, callee);
                    let cs_callee = self.core.csm.cs_method(callee_ctx, callee);
                    let edge = Edge {
                        kind: call.kind,
                        call_site: cs_call,
                        callee: cs_callee,
                    };
                    if self.core.call_graph.add_edge(edge) {
                        self.link_call(ctx, callee_ctx, &call.args, result, cs_callee);
                        if let Some(taint) = self.taint.as_mut() {
                            taint.process_call(&mut self.core, callee, site, ctx, None);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Parameter-passing and return edges across a new call edge; the
    /// caller side uses the caller context, the callee side the callee
    /// context.
    fn link_call(
        &mut self,
        caller_ctx: CtxId,
        callee_ctx: CtxId,
        args: &[VarIdx],
        result: Option<VarIdx>,
        cs_callee: CsMethodId,
    ) {
        self.add_reachable(cs_callee);
        let (_, callee) = self.core.csm.method_of(cs_callee);
        let (params, return_vars) = {
            let m = self.core.program.method(callee);
            (m.params.clone(), m.return_vars.clone())
        };
        for (arg, param) in args.iter().zip(params.iter()) {
            let src = self.core.cs_var_ptr(caller_ctx, *arg);
            let tgt = self.core.cs_var_ptr(callee_ctx, *param);
            self.core.add_pfg_edge(src, tgt);
        }
        if let Some(result) = result {
            for ret in return_vars {
                let src = self.core.cs_var_ptr(callee_ctx, ret);
                let tgt = self.core.cs_var_ptr(caller_ctx, result);
                self.core.add_pfg_edge(src, tgt);
            }
        }
    }

    fn analyze(&mut self) {
        while let Some((ptr, pts)) = self.core.worklist.pop_front() {
            let delta = self.core.propagate(ptr, &pts);
            if delta.is_empty() {
                continue;
            }
            if let Some(taint) = self.taint.as_mut() {
                taint.on_propagate(&mut self.core, ptr, &delta);
            }
            let cs_var = match self.core.pfg.key(ptr) {
                CsPointer::Var(cv) => *cv,
                _ => continue,
            };
            let (ctx, var) = self.core.csm.var_of(cs_var);
            for cs_obj in delta.iter() {
                for site in self.core.field_loads.get(&var).cloned().unwrap_or_default() {
                    if let Stmt::LoadField { lhs, field, .. } = self.core.program.stmt(site) {
                        let src = self
                            .core
                            .pfg
                            .intern(CsPointer::InstanceField(cs_obj, *field));
                        let tgt = self.core.cs_var_ptr(ctx, *lhs);
                        self.core.add_pfg_edge(src, tgt);
                    }
                }
                for site in self.core.field_stores.get(&var).cloned().unwrap_or_default() {
                    if let Stmt::StoreField { field, rhs, .. } = self.core.program.stmt(site) {
                        let src = self.core.cs_var_ptr(ctx, *rhs);
                        let tgt = self
                            .core
                            .pfg
                            .intern(CsPointer::InstanceField(cs_obj, *field));
                        self.core.add_pfg_edge(src, tgt);
                    }
                }
                for site in self.core.array_loads.get(&var).cloned().unwrap_or_default() {
                    if let Stmt::LoadArray { lhs, .. } = self.core.program.stmt(site) {
                        let src = self.core.pfg.intern(CsPointer::ArrayIndex(cs_obj));
                        let tgt = self.core.cs_var_ptr(ctx, *lhs);
                        self.core.add_pfg_edge(src, tgt);
                    }
                }
                for site in self.core.array_stores.get(&var).cloned().unwrap_or_default() {
                    if let Stmt::StoreArray { rhs, .. } = self.core.program.stmt(site) {
                        let src = self.core.cs_var_ptr(ctx, *rhs);
                        let tgt = self.core.pfg.intern(CsPointer::ArrayIndex(cs_obj));
                        self.core.add_pfg_edge(src, tgt);
                    }
                }
                self.process_call(ctx, var, cs_obj);
            }
        }
    }

    /// Resolve the instance calls on `(ctx, var)` against a newly discovered
    /// contextualized receiver.
    fn process_call(&mut self, ctx: CtxId, var: VarIdx, recv: CsObjId) {
        for site in self.core.invokes.get(&var).cloned().unwrap_or_default() {
            let (call, result) = match self.core.program.stmt(site) {
                Stmt::Invoke { result, call } => (call.clone(), *result),
                _ => continue,
            };
            let (recv_ctx, recv_obj) = self.core.csm.obj_of(recv);
            let recv_class = match self.core.heap.obj(recv_obj).ty.class() {
                Some(c) => c,
                None => continue,
            };
            let callee = match self
                .core
                .hierarchy
                .dispatch(recv_class, &call.method_ref.subsig)
            {
                Some(m) => m,
                None => continue,
            };

            let cs_call = self.core.csm.cs_call_site(ctx, site);
            let callee_ctx = self.selector.select_instance(
                &mut self.core.csm.ctxs,
                ctx,
                site,
                recv_ctx,
                recv_obj,
                callee,
            );
            let cs_callee = self.core.csm.cs_method(callee_ctx, callee);

            if let Some(this) = self.core.program.method(callee).this {
                let this_ptr = self.core.cs_var_ptr(callee_ctx, this);
                self.core.enqueue(this_ptr, PointsToSet::singleton(recv));
            }

            let edge = Edge {
                kind: call.kind,
                call_site: cs_call,
                callee: cs_callee,
            };
            if self.core.call_graph.add_edge(edge) {
                self.link_call(ctx, callee_ctx, &call.args, result, cs_callee);
                if let Some(taint) = self.taint.as_mut() {
                    let recv_ptr = call.base.map(|b| self.core.cs_var_ptr(ctx, b));
                    taint.process_call(&mut self.core, callee, site, ctx, recv_ptr);
                }
            }
        }
    }
}

/// Everything the context-sensitive run produced.
pub struct CsSolution {
    pub heap: HeapModel,
    pub csm: CsManager,
    pub pfg: PointerFlowGraph<CsPointer>,
    pub call_graph: CallGraph<CsCallSiteId, CsMethodId>,
    pub taint_flows: Option<BTreeSet<TaintFlow>>,
}

impl CsSolution {
    /// Collapse contexts into the consumer-facing result: per-variable
    /// points-to sets over base objects and a method-level call graph.
    pub fn collapse(&self) -> PointerAnalysisResult {
        let mut var_pts: HashMap<VarIdx, PointsToSet> = HashMap::new();
        for (id, key) in self.pfg.pointers() {
            if let CsPointer::Var(cv) = key {
                let (_, var) = self.csm.var_of(*cv);
                let entry = var_pts.entry(var).or_default();
                for cs_obj in self.pfg.pts(id).iter() {
                    let (_, obj) = self.csm.obj_of(cs_obj);
                    entry.add(obj);
                }
            }
        }

        let mut cg: CallGraph<StmtIdx, MethodIdx> = CallGraph::new();
        for &cs_entry in self.call_graph.entry_methods() {
            let (_, m) = self.csm.method_of(cs_entry);
            cg.add_entry_method(m);
        }
        for &cs_method in self.call_graph.reachable_methods() {
            let (_, m) = self.csm.method_of(cs_method);
            cg.add_reachable_method(m);
        }
        for edge in self.call_graph.edges() {
            let (_, site) = self.csm.call_site_of(edge.call_site);
            let (_, callee) = self.csm.method_of(edge.callee);
            cg.add_edge(Edge {
                kind: edge.kind,
                call_site: site,
                callee,
            });
        }

        PointerAnalysisResult::new(cg, self.heap.clone(), var_pts)
    }
}
