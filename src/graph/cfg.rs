use std::collections::HashMap;

use crate::ir::program::Program;
use crate::ir::stmt::{MethodIdx, Stmt, StmtIdx};

/// Index into `Cfg::nodes`.
pub type NodeIdx = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfgNode {
    Entry,
    Exit,
    Stmt(StmtIdx),
}

/// Why control flows along an edge. Dead-code detection prunes `IfTrue` /
/// `IfFalse` / switch edges against constant-propagation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    FallThrough,
    Goto,
    IfTrue,
    IfFalse,
    SwitchCase(i32),
    SwitchDefault,
    Return,
}

#[derive(Debug, Clone, Copy)]
pub struct CfgEdge {
    pub kind: EdgeKind,
    pub source: NodeIdx,
    pub target: NodeIdx,
}

/// Statement-level control-flow graph of one method body, with virtual
/// entry and exit nodes.
#[derive(Debug)]
pub struct Cfg {
    pub method: MethodIdx,
    nodes: Vec<CfgNode>,
    out_edges: Vec<Vec<CfgEdge>>,
    in_edges: Vec<Vec<CfgEdge>>,
    node_of: HashMap<StmtIdx, NodeIdx>,
}

pub const ENTRY: NodeIdx = 0;
pub const EXIT: NodeIdx = 1;

impl Cfg {
    pub fn build(program: &Program, method: MethodIdx) -> Self {
        let m = program.method(method);
        let mut nodes = vec![CfgNode::Entry, CfgNode::Exit];
        let mut node_of = HashMap::new();
        for s in m.stmt_start..m.stmt_end {
            node_of.insert(s, nodes.len());
            nodes.push(CfgNode::Stmt(s));
        }

        let mut cfg = Self {
            method,
            out_edges: vec![Vec::new(); nodes.len()],
            in_edges: vec![Vec::new(); nodes.len()],
            nodes,
            node_of,
        };

        if m.stmt_start == m.stmt_end {
            cfg.add_edge(EdgeKind::FallThrough, ENTRY, EXIT);
            return cfg;
        }
        cfg.add_edge(EdgeKind::FallThrough, ENTRY, cfg.node_of[&m.stmt_start]);

        for s in m.stmt_start..m.stmt_end {
            let node = cfg.node_of[&s];
            // Successor when control falls through; Exit if the body ends.
            let next = cfg.node_of.get(&(s + 1)).copied().unwrap_or(EXIT);
            match program.stmt(s) {
                Stmt::Return { .. } => cfg.add_edge(EdgeKind::Return, node, EXIT),
                Stmt::Goto { target } => {
                    let t = cfg.node_of[target];
                    cfg.add_edge(EdgeKind::Goto, node, t);
                }
                Stmt::If { target, .. } => {
                    let t = cfg.node_of[target];
                    cfg.add_edge(EdgeKind::IfTrue, node, t);
                    cfg.add_edge(EdgeKind::IfFalse, node, next);
                }
                Stmt::Switch {
                    cases, default, ..
                } => {
                    for (value, target) in cases {
                        let t = cfg.node_of[target];
                        cfg.add_edge(EdgeKind::SwitchCase(*value), node, t);
                    }
                    let d = cfg.node_of[default];
                    cfg.add_edge(EdgeKind::SwitchDefault, node, d);
                }
                _ => cfg.add_edge(EdgeKind::FallThrough, node, next),
            }
        }
        cfg
    }

    fn add_edge(&mut self, kind: EdgeKind, source: NodeIdx, target: NodeIdx) {
        let edge = CfgEdge {
            kind,
            source,
            target,
        };
        self.out_edges[source].push(edge);
        self.in_edges[target].push(edge);
    }

    pub fn entry(&self) -> NodeIdx {
        ENTRY
    }

    pub fn exit(&self) -> NodeIdx {
        EXIT
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, n: NodeIdx) -> CfgNode {
        self.nodes[n]
    }

    pub fn stmt_of(&self, n: NodeIdx) -> Option<StmtIdx> {
        match self.nodes[n] {
            CfgNode::Stmt(s) => Some(s),
            _ => None,
        }
    }

    pub fn node_of_stmt(&self, s: StmtIdx) -> NodeIdx {
        self.node_of[&s]
    }

    pub fn out_edges_of(&self, n: NodeIdx) -> &[CfgEdge] {
        &self.out_edges[n]
    }

    pub fn succs_of(&self, n: NodeIdx) -> impl Iterator<Item = NodeIdx> + '_ {
        self.out_edges[n].iter().map(|e| e.target)
    }

    pub fn preds_of(&self, n: NodeIdx) -> impl Iterator<Item = NodeIdx> + '_ {
        self.in_edges[n].iter().map(|e| e.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::ProgramBuilder;
    use crate::ir::stmt::{BinaryOp, SubSig};
    use crate::ir::types::Ty;

    fn void_sig(name: &str) -> SubSig {
        SubSig {
            name: name.into(),
            params: vec![],
            ret: Ty::Void,
        }
    }

    #[test]
    fn empty_body_connects_entry_to_exit() {
        let mut b = ProgramBuilder::new();
        let c = b.add_class("A", None);
        let m = b.declare_method(c, void_sig("m"), true);
        b.method_body(m, |_| {});
        let p = b.finish();
        let cfg = Cfg::build(&p, m);
        assert_eq!(cfg.succs_of(cfg.entry()).collect::<Vec<_>>(), vec![EXIT]);
    }

    #[test]
    fn if_statement_has_true_and_false_edges() {
        let mut b = ProgramBuilder::new();
        let c = b.add_class("A", None);
        let m = b.declare_method(c, void_sig("m"), true);
        b.method_body(m, |body| {
            let x = body.var("x", Ty::Int);
            let t = body.label();
            body.assign_int(x, 1);
            body.if_(x, BinaryOp::Lt, x, t);
            body.nop(); // false branch
            body.bind(t);
            body.ret(None);
        });
        let p = b.finish();
        let cfg = Cfg::build(&p, m);

        let if_node = cfg.node_of_stmt(p.methods[m].stmt_start + 1);
        let kinds: Vec<EdgeKind> = cfg.out_edges_of(if_node).iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EdgeKind::IfTrue));
        assert!(kinds.contains(&EdgeKind::IfFalse));
        // both branches eventually reach the return
        assert_eq!(cfg.preds_of(EXIT).count(), 1);
    }

    #[test]
    fn switch_emits_one_edge_per_case_plus_default() {
        let mut b = ProgramBuilder::new();
        let c = b.add_class("A", None);
        let m = b.declare_method(c, void_sig("m"), true);
        b.method_body(m, |body| {
            let x = body.var("x", Ty::Int);
            let c1 = body.label();
            let c2 = body.label();
            let d = body.label();
            body.assign_int(x, 2);
            body.switch(x, vec![(1, c1), (2, c2)], d);
            body.bind(c1);
            body.nop();
            body.bind(c2);
            body.nop();
            body.bind(d);
            body.ret(None);
        });
        let p = b.finish();
        let cfg = Cfg::build(&p, m);
        let sw = cfg.node_of_stmt(p.methods[m].stmt_start + 1);
        assert_eq!(cfg.out_edges_of(sw).len(), 3);
    }
}
