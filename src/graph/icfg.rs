use std::collections::HashMap;

use crate::graph::callgraph::CallGraph;
use crate::graph::cfg::{Cfg, CfgNode, EdgeKind};
use crate::ir::program::Program;
use crate::ir::stmt::{MethodIdx, Stmt, StmtIdx};

/// Index into `Icfg::nodes`.
pub type IcfgNodeIdx = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcfgNode {
    Entry(MethodIdx),
    Exit(MethodIdx),
    Stmt(StmtIdx),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcfgEdgeKind {
    /// Intra-procedural edge that does not leave a call site.
    Normal,
    /// Call site → callee entry.
    Call { callee: MethodIdx },
    /// Callee exit → return site of the call.
    Return {
        callee: MethodIdx,
        call_site: StmtIdx,
    },
    /// Call site → its return site, bypassing the callee.
    CallToReturn,
}

#[derive(Debug, Clone)]
pub struct IcfgEdge {
    pub kind: IcfgEdgeKind,
    pub source: IcfgNodeIdx,
    pub target: IcfgNodeIdx,
}

/// Inter-procedural CFG over the reachable methods of a call graph: each
/// method contributes its statement-level CFG (with virtual entry/exit
/// nodes); call edges, return edges and call-to-return edges stitch the
/// pieces together.
#[derive(Debug)]
pub struct Icfg {
    nodes: Vec<IcfgNode>,
    in_edges: Vec<Vec<IcfgEdge>>,
    out_edges: Vec<Vec<IcfgEdge>>,
    stmt_node: HashMap<StmtIdx, IcfgNodeIdx>,
    entry_node: HashMap<MethodIdx, IcfgNodeIdx>,
    exit_node: HashMap<MethodIdx, IcfgNodeIdx>,
    entry_methods: Vec<MethodIdx>,
}

pub fn build_icfg(program: &Program, call_graph: &CallGraph<StmtIdx, MethodIdx>) -> Icfg {
    let mut icfg = Icfg {
        nodes: Vec::new(),
        in_edges: Vec::new(),
        out_edges: Vec::new(),
        stmt_node: HashMap::new(),
        entry_node: HashMap::new(),
        exit_node: HashMap::new(),
        entry_methods: call_graph.entry_methods().to_vec(),
    };

    // one CFG per reachable method
    for &method in call_graph.reachable_methods() {
        let entry = icfg.push_node(IcfgNode::Entry(method));
        icfg.entry_node.insert(method, entry);
        let exit = icfg.push_node(IcfgNode::Exit(method));
        icfg.exit_node.insert(method, exit);
        for (site, _) in program.method_stmts(method) {
            let node = icfg.push_node(IcfgNode::Stmt(site));
            icfg.stmt_node.insert(site, node);
        }

        let cfg = Cfg::build(program, method);
        for n in 0..cfg.num_nodes() {
            for edge in cfg.out_edges_of(n) {
                let source = icfg.translate(&cfg, method, edge.source);
                let target = icfg.translate(&cfg, method, edge.target);
                // the fall-through of a call site becomes a call-to-return
                // edge; the callee's effect re-enters via its return edge
                let is_call_site = cfg
                    .stmt_of(edge.source)
                    .map(|s| program.stmt(s).is_call())
                    .unwrap_or(false);
                let kind = if is_call_site && edge.kind == EdgeKind::FallThrough {
                    IcfgEdgeKind::CallToReturn
                } else {
                    IcfgEdgeKind::Normal
                };
                icfg.push_edge(IcfgEdge {
                    kind,
                    source,
                    target,
                });
            }
        }
    }

    // stitch calls: call edge into the callee, return edges back to every
    // return site of the call
    for edge in call_graph.edges() {
        let site = edge.call_site;
        let callee = edge.callee;
        let (Some(&call_node), Some(&callee_entry), Some(&callee_exit)) = (
            icfg.stmt_node.get(&site),
            icfg.entry_node.get(&callee),
            icfg.exit_node.get(&callee),
        ) else {
            continue;
        };
        icfg.push_edge(IcfgEdge {
            kind: IcfgEdgeKind::Call { callee },
            source: call_node,
            target: callee_entry,
        });
        let return_sites: Vec<IcfgNodeIdx> = icfg.out_edges[call_node]
            .iter()
            .filter(|e| e.kind == IcfgEdgeKind::CallToReturn)
            .map(|e| e.target)
            .collect();
        for return_site in return_sites {
            icfg.push_edge(IcfgEdge {
                kind: IcfgEdgeKind::Return {
                    callee,
                    call_site: site,
                },
                source: callee_exit,
                target: return_site,
            });
        }
    }

    icfg
}

impl Icfg {
    fn push_node(&mut self, node: IcfgNode) -> IcfgNodeIdx {
        self.nodes.push(node);
        self.in_edges.push(Vec::new());
        self.out_edges.push(Vec::new());
        self.nodes.len() - 1
    }

    fn push_edge(&mut self, edge: IcfgEdge) {
        self.out_edges[edge.source].push(edge.clone());
        self.in_edges[edge.target].push(edge);
    }

    fn translate(&self, cfg: &Cfg, method: MethodIdx, n: usize) -> IcfgNodeIdx {
        match cfg.node(n) {
            CfgNode::Entry => self.entry_node[&method],
            CfgNode::Exit => self.exit_node[&method],
            CfgNode::Stmt(s) => self.stmt_node[&s],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, n: IcfgNodeIdx) -> IcfgNode {
        self.nodes[n]
    }

    pub fn in_edges_of(&self, n: IcfgNodeIdx) -> &[IcfgEdge] {
        &self.in_edges[n]
    }

    pub fn out_edges_of(&self, n: IcfgNodeIdx) -> &[IcfgEdge] {
        &self.out_edges[n]
    }

    pub fn node_of_stmt(&self, s: StmtIdx) -> Option<IcfgNodeIdx> {
        self.stmt_node.get(&s).copied()
    }

    pub fn entry_node_of(&self, m: MethodIdx) -> Option<IcfgNodeIdx> {
        self.entry_node.get(&m).copied()
    }

    pub fn entry_methods(&self) -> &[MethodIdx] {
        &self.entry_methods
    }

    /// Whether the node is an `Invoke` statement.
    pub fn is_call_node(&self, program: &Program, n: IcfgNodeIdx) -> bool {
        matches!(self.nodes[n], IcfgNode::Stmt(s) if matches!(program.stmt(s), Stmt::Invoke { .. }))
    }

    /// Statement nodes in ascending statement order.
    pub fn stmt_nodes(&self) -> impl Iterator<Item = (StmtIdx, IcfgNodeIdx)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(n, node)| match node {
            IcfgNode::Stmt(s) => Some((*s, n)),
            _ => None,
        })
    }
}
