use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::dataflow::constprop::transfer_stmt;
use crate::dataflow::fact::CpFact;
use crate::dataflow::value::Value;
use crate::graph::icfg::{Icfg, IcfgEdge, IcfgEdgeKind, IcfgNode, IcfgNodeIdx};
use crate::ir::program::Program;
use crate::ir::stmt::{FieldIdx, Stmt, StmtIdx, VarIdx};
use crate::pta::result::PointerAnalysisResult;

/// Result of the inter-procedural run, addressable by statement.
#[derive(Debug)]
pub struct InterResult {
    in_facts: Vec<CpFact>,
    out_facts: Vec<CpFact>,
    stmt_node: HashMap<StmtIdx, IcfgNodeIdx>,
}

impl InterResult {
    pub fn in_fact(&self, s: StmtIdx) -> Option<&CpFact> {
        self.stmt_node.get(&s).map(|&n| &self.in_facts[n])
    }

    pub fn out_fact(&self, s: StmtIdx) -> Option<&CpFact> {
        self.stmt_node.get(&s).map(|&n| &self.out_facts[n])
    }
}

/// Inter-procedural constant propagation over the ICFG, resolving heap
/// accesses through the alias information of a completed points-to result.
///
/// Heap state is carried outside the facts: static fields keep a meet cell
/// per field, instance fields and array cells are read by meeting over the
/// aliased stores' facts; stores re-enqueue the loads they may feed.
pub fn solve_inter(program: &Program, icfg: &Icfg, pta: &PointerAnalysisResult) -> InterResult {
    let mut solver = InterSolver::new(program, icfg, pta);
    solver.run();
    debug!("inter constprop fixpoint over {} icfg nodes", icfg.num_nodes());
    InterResult {
        in_facts: solver.in_facts,
        out_facts: solver.out_facts,
        stmt_node: icfg.stmt_nodes().map(|(s, n)| (s, n)).collect(),
    }
}

struct InterSolver<'p> {
    program: &'p Program,
    icfg: &'p Icfg,
    // ── alias pre-pass results ──
    /// v → vars sharing at least one points-to element with v.
    alias_groups: HashMap<VarIdx, Vec<VarIdx>>,
    /// field → every load of that field (static loads for static fields).
    loads_of_field: HashMap<FieldIdx, Vec<StmtIdx>>,
    /// base var → its instance field stores / loads.
    field_stores_of_var: HashMap<VarIdx, Vec<StmtIdx>>,
    field_loads_of_var: HashMap<VarIdx, Vec<StmtIdx>>,
    /// base var → its array stores / loads.
    array_stores_of_var: HashMap<VarIdx, Vec<StmtIdx>>,
    array_loads_of_var: HashMap<VarIdx, Vec<StmtIdx>>,
    /// static field meet cells, updated by static stores.
    static_values: HashMap<FieldIdx, Value>,
    in_facts: Vec<CpFact>,
    out_facts: Vec<CpFact>,
    worklist: VecDeque<IcfgNodeIdx>,
}

impl<'p> InterSolver<'p> {
    fn new(program: &'p Program, icfg: &'p Icfg, pta: &'p PointerAnalysisResult) -> Self {
        let mut loads_of_field: HashMap<FieldIdx, Vec<StmtIdx>> = HashMap::new();
        let mut field_stores_of_var: HashMap<VarIdx, Vec<StmtIdx>> = HashMap::new();
        let mut field_loads_of_var: HashMap<VarIdx, Vec<StmtIdx>> = HashMap::new();
        let mut array_stores_of_var: HashMap<VarIdx, Vec<StmtIdx>> = HashMap::new();
        let mut array_loads_of_var: HashMap<VarIdx, Vec<StmtIdx>> = HashMap::new();

        for (site, _) in icfg.stmt_nodes() {
            match program.stmt(site) {
                Stmt::LoadField { base, field, .. } => {
                    loads_of_field.entry(*field).or_default().push(site);
                    if let Some(base) = base {
                        field_loads_of_var.entry(*base).or_default().push(site);
                    }
                }
                Stmt::StoreField {
                    base: Some(base), ..
                } => field_stores_of_var.entry(*base).or_default().push(site),
                Stmt::LoadArray { base, .. } => {
                    array_loads_of_var.entry(*base).or_default().push(site)
                }
                Stmt::StoreArray { base, .. } => {
                    array_stores_of_var.entry(*base).or_default().push(site)
                }
                _ => {}
            }
        }

        // may-alias groups: any shared points-to element
        let vars = pta.vars();
        let mut alias_groups: HashMap<VarIdx, Vec<VarIdx>> = HashMap::new();
        for &v1 in &vars {
            let pts1 = pta.pts_of(v1);
            let group: Vec<VarIdx> = vars
                .iter()
                .copied()
                .filter(|&v2| pta.pts_of(v2).iter().any(|o| pts1.contains(o)))
                .collect();
            alias_groups.insert(v1, group);
        }

        let n = icfg.num_nodes();
        let mut solver = Self {
            program,
            icfg,
            alias_groups,
            loads_of_field,
            field_stores_of_var,
            field_loads_of_var,
            array_stores_of_var,
            array_loads_of_var,
            static_values: HashMap::new(),
            in_facts: vec![CpFact::new(); n],
            out_facts: vec![CpFact::new(); n],
            worklist: (0..n).collect(),
        };

        // boundary facts at the entry methods
        for &entry in icfg.entry_methods() {
            if let Some(node) = icfg.entry_node_of(entry) {
                let boundary = solver.boundary_fact(entry);
                solver.in_facts[node] = boundary.clone();
                solver.out_facts[node] = boundary;
            }
        }
        solver
    }

    fn boundary_fact(&self, method: crate::ir::stmt::MethodIdx) -> CpFact {
        let mut fact = CpFact::new();
        for &param in &self.program.method(method).params {
            if self.program.can_hold_int(param) {
                fact.update(param, Value::Nac);
            }
        }
        fact
    }

    fn run(&mut self) {
        while let Some(node) = self.worklist.pop_front() {
            for i in 0..self.icfg.in_edges_of(node).len() {
                let edge = self.icfg.in_edges_of(node)[i].clone();
                let fact = self.transfer_edge(&edge, &self.out_facts[edge.source]);
                self.in_facts[node].meet_from(&fact);
            }
            let changed = self.transfer_node(node);
            if changed {
                for edge in self.icfg.out_edges_of(node) {
                    self.worklist.push_back(edge.target);
                }
            }
        }
    }

    // ── edge transfers ──────────────────────────────────────────────────────

    fn transfer_edge(&self, edge: &IcfgEdge, out_src: &CpFact) -> CpFact {
        match &edge.kind {
            IcfgEdgeKind::Normal => out_src.clone(),
            IcfgEdgeKind::CallToReturn => {
                // the call's own def comes back through the return edge, so
                // its stale binding must not bypass the callee
                let mut fact = out_src.clone();
                if let IcfgNode::Stmt(s) = self.icfg.node(edge.source) {
                    if let Some(def) = self.program.stmt(s).def() {
                        fact.remove(def);
                    }
                }
                fact
            }
            IcfgEdgeKind::Call { callee } => {
                let mut fact = CpFact::new();
                let IcfgNode::Stmt(s) = self.icfg.node(edge.source) else {
                    return fact;
                };
                let Stmt::Invoke { call, .. } = self.program.stmt(s) else {
                    return fact;
                };
                for (arg, param) in call
                    .args
                    .iter()
                    .zip(self.program.method(*callee).params.iter())
                {
                    fact.update(*param, out_src.get(*arg));
                }
                fact
            }
            IcfgEdgeKind::Return { callee, call_site } => {
                let mut fact = CpFact::new();
                let Stmt::Invoke { result: Some(result), .. } = self.program.stmt(*call_site)
                else {
                    return fact;
                };
                let mut value = Value::Undef;
                for &ret in &self.program.method(*callee).return_vars {
                    value = value.meet(out_src.get(ret));
                }
                fact.update(*result, value);
                fact
            }
        }
    }

    // ── node transfers ──────────────────────────────────────────────────────

    fn transfer_node(&mut self, node: IcfgNodeIdx) -> bool {
        match self.icfg.node(node) {
            // virtual nodes and call nodes pass their fact through; the
            // call's effect travels along call/return edges instead
            IcfgNode::Entry(_) | IcfgNode::Exit(_) => self.identity(node),
            IcfgNode::Stmt(s) if self.program.stmt(s).is_call() => self.identity(node),
            IcfgNode::Stmt(s) => self.transfer_non_call(node, s),
        }
    }

    fn identity(&mut self, node: IcfgNodeIdx) -> bool {
        let input = self.in_facts[node].clone();
        self.out_facts[node].copy_from(&input)
    }

    fn transfer_non_call(&mut self, node: IcfgNodeIdx, site: StmtIdx) -> bool {
        match self.program.stmt(site).clone() {
            Stmt::LoadField {
                lhs,
                base: None,
                field,
            } if self.program.can_hold_int(lhs) => {
                let known = self
                    .static_values
                    .get(&field)
                    .copied()
                    .unwrap_or(Value::Undef);
                let mut result = self.in_facts[node].clone();
                result.update(lhs, known);
                self.out_facts[node].copy_from(&result)
            }
            Stmt::StoreField {
                base: None,
                field,
                rhs,
            } if self.program.can_hold_int(rhs) => {
                let prev = self
                    .static_values
                    .get(&field)
                    .copied()
                    .unwrap_or(Value::Undef);
                let met = prev.meet(self.in_facts[node].get(rhs));
                if met != prev {
                    self.static_values.insert(field, met);
                    // every load of this field must observe the new value
                    for site in self.loads_of_field.get(&field).cloned().unwrap_or_default() {
                        if let Some(n) = self.icfg.node_of_stmt(site) {
                            self.worklist.push_back(n);
                        }
                    }
                }
                self.generic_transfer(node, site)
            }
            Stmt::LoadField {
                lhs,
                base: Some(base),
                field,
            } if self.program.can_hold_int(lhs) => {
                // meet the stored values over every aliased store of the
                // same field
                let mut value = Value::Undef;
                for alias in self.alias_groups.get(&base).cloned().unwrap_or_default() {
                    for store in self
                        .field_stores_of_var
                        .get(&alias)
                        .cloned()
                        .unwrap_or_default()
                    {
                        let Stmt::StoreField {
                            field: store_field,
                            rhs,
                            ..
                        } = self.program.stmt(store)
                        else {
                            continue;
                        };
                        if *store_field != field {
                            continue;
                        }
                        if let Some(n) = self.icfg.node_of_stmt(store) {
                            value = value.meet(self.in_facts[n].get(*rhs));
                        }
                    }
                }
                let mut result = self.in_facts[node].clone();
                result.update(lhs, value);
                self.out_facts[node].copy_from(&result)
            }
            Stmt::StoreField {
                base: Some(base),
                field,
                rhs,
            } if self.program.can_hold_int(rhs) => {
                for alias in self.alias_groups.get(&base).cloned().unwrap_or_default() {
                    for load in self
                        .field_loads_of_var
                        .get(&alias)
                        .cloned()
                        .unwrap_or_default()
                    {
                        let same_field = matches!(
                            self.program.stmt(load),
                            Stmt::LoadField { field: f, .. } if *f == field
                        );
                        if same_field {
                            if let Some(n) = self.icfg.node_of_stmt(load) {
                                self.worklist.push_back(n);
                            }
                        }
                    }
                }
                self.generic_transfer(node, site)
            }
            Stmt::LoadArray { lhs, base, index } if self.program.can_hold_int(lhs) => {
                let index_load = self.in_facts[node].get(index);
                let mut value = Value::Undef;
                for alias in self.alias_groups.get(&base).cloned().unwrap_or_default() {
                    for store in self
                        .array_stores_of_var
                        .get(&alias)
                        .cloned()
                        .unwrap_or_default()
                    {
                        let Stmt::StoreArray {
                            index: store_index,
                            rhs,
                            ..
                        } = self.program.stmt(store)
                        else {
                            continue;
                        };
                        let Some(n) = self.icfg.node_of_stmt(store) else {
                            continue;
                        };
                        let index_store = self.in_facts[n].get(*store_index);
                        if indices_may_alias(index_load, index_store) {
                            value = value.meet(self.out_facts[n].get(*rhs));
                        }
                    }
                }
                let mut result = self.in_facts[node].clone();
                result.update(lhs, value);
                self.out_facts[node].copy_from(&result)
            }
            Stmt::StoreArray { base, rhs, .. } if self.program.can_hold_int(rhs) => {
                // indices are compared on the load side; re-enqueue them all
                for alias in self.alias_groups.get(&base).cloned().unwrap_or_default() {
                    for load in self
                        .array_loads_of_var
                        .get(&alias)
                        .cloned()
                        .unwrap_or_default()
                    {
                        if let Some(n) = self.icfg.node_of_stmt(load) {
                            self.worklist.push_back(n);
                        }
                    }
                }
                self.generic_transfer(node, site)
            }
            _ => self.generic_transfer(node, site),
        }
    }

    fn generic_transfer(&mut self, node: IcfgNodeIdx, site: StmtIdx) -> bool {
        let input = self.in_facts[node].clone();
        transfer_stmt(
            self.program,
            self.program.stmt(site),
            &input,
            &mut self.out_facts[node],
        )
    }
}

/// The constant-index alias predicate: undefined indices cannot alias,
/// unknown indices may, constant indices alias exactly when equal.
fn indices_may_alias(a: Value, b: Value) -> bool {
    if a.is_undef() || b.is_undef() {
        return false;
    }
    if a.is_nac() || b.is_nac() {
        return true;
    }
    a.constant() == b.constant()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_alias_predicate() {
        assert!(!indices_may_alias(Value::Undef, Value::Nac));
        assert!(indices_may_alias(Value::Nac, Value::Const(3)));
        assert!(indices_may_alias(Value::Const(2), Value::Const(2)));
        assert!(!indices_may_alias(Value::Const(2), Value::Const(3)));
    }
}
