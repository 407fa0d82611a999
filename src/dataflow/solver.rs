use crate::dataflow::fact::DataflowResult;
use crate::graph::cfg::{Cfg, CfgNode, NodeIdx};

/// Capability set of an iterative dataflow analysis.
///
/// The solver below is the only fixpoint routine; analyses differ in their
/// facts, meet, transfer and direction. For forward analyses `input` in
/// `transfer_node` is the IN fact and `output` the OUT fact; backward
/// analyses see the roles swapped.
pub trait DataflowAnalysis {
    type Fact: Clone + PartialEq;

    fn is_forward(&self) -> bool;

    /// Fact at the boundary node (entry for forward, exit for backward).
    fn boundary_fact(&self, cfg: &Cfg) -> Self::Fact;

    fn initial_fact(&self) -> Self::Fact;

    /// Meet `fact` into `target`; returns whether `target` changed.
    fn meet_into(&self, fact: &Self::Fact, target: &mut Self::Fact) -> bool;

    /// Returns whether `output` changed.
    fn transfer_node(&self, node: CfgNode, input: &Self::Fact, output: &mut Self::Fact) -> bool;
}

/// Run `analysis` to fixpoint over `cfg`.
///
/// LIFO worklist; the monotone lattice makes the fixpoint independent of
/// visitation order.
pub fn solve<A: DataflowAnalysis>(analysis: &A, cfg: &Cfg) -> DataflowResult<A::Fact> {
    if analysis.is_forward() {
        solve_forward(analysis, cfg)
    } else {
        solve_backward(analysis, cfg)
    }
}

fn solve_forward<A: DataflowAnalysis>(analysis: &A, cfg: &Cfg) -> DataflowResult<A::Fact> {
    let n = cfg.num_nodes();
    let mut in_facts: Vec<A::Fact> = (0..n).map(|_| analysis.initial_fact()).collect();
    let mut out_facts: Vec<A::Fact> = (0..n).map(|_| analysis.initial_fact()).collect();
    out_facts[cfg.entry()] = analysis.boundary_fact(cfg);

    let mut worklist: Vec<NodeIdx> = (0..n).filter(|&i| i != cfg.entry()).collect();
    while let Some(node) = worklist.pop() {
        let preds: Vec<NodeIdx> = cfg.preds_of(node).collect();
        for pred in preds {
            // facts only descend, so accumulating meets is sound
            analysis.meet_into(&out_facts[pred], &mut in_facts[node]);
        }
        if analysis.transfer_node(cfg.node(node), &in_facts[node], &mut out_facts[node]) {
            worklist.extend(cfg.succs_of(node));
        }
    }

    DataflowResult {
        in_facts,
        out_facts,
    }
}

fn solve_backward<A: DataflowAnalysis>(analysis: &A, cfg: &Cfg) -> DataflowResult<A::Fact> {
    let n = cfg.num_nodes();
    let mut in_facts: Vec<A::Fact> = (0..n).map(|_| analysis.initial_fact()).collect();
    let mut out_facts: Vec<A::Fact> = (0..n).map(|_| analysis.initial_fact()).collect();
    in_facts[cfg.exit()] = analysis.boundary_fact(cfg);

    let mut worklist: Vec<NodeIdx> = (0..n).filter(|&i| i != cfg.exit()).collect();
    while let Some(node) = worklist.pop() {
        let succs: Vec<NodeIdx> = cfg.succs_of(node).collect();
        for succ in succs {
            analysis.meet_into(&in_facts[succ], &mut out_facts[node]);
        }
        if analysis.transfer_node(cfg.node(node), &out_facts[node], &mut in_facts[node]) {
            worklist.extend(cfg.preds_of(node));
        }
    }

    DataflowResult {
        in_facts,
        out_facts,
    }
}
