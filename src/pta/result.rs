use std::collections::HashMap;

use crate::graph::callgraph::CallGraph;
use crate::ir::stmt::{MethodIdx, StmtIdx, VarIdx};
use crate::pta::heap::HeapModel;
use crate::pta::pts::PointsToSet;

/// The consumer-facing view of a finished pointer analysis: a method-level
/// call graph plus per-variable points-to sets, with contexts (if any)
/// already collapsed. Inter-procedural constant propagation and reporting
/// read this; they never see the solver internals.
#[derive(Debug)]
pub struct PointerAnalysisResult {
    pub call_graph: CallGraph<StmtIdx, MethodIdx>,
    pub heap: HeapModel,
    var_pts: HashMap<VarIdx, PointsToSet>,
    empty: PointsToSet,
}

impl PointerAnalysisResult {
    pub fn new(
        call_graph: CallGraph<StmtIdx, MethodIdx>,
        heap: HeapModel,
        var_pts: HashMap<VarIdx, PointsToSet>,
    ) -> Self {
        Self {
            call_graph,
            heap,
            var_pts,
            empty: PointsToSet::new(),
        }
    }

    /// Points-to set of a variable; empty if the analysis never reached it.
    pub fn pts_of(&self, v: VarIdx) -> &PointsToSet {
        self.var_pts.get(&v).unwrap_or(&self.empty)
    }

    /// Variables with a recorded (possibly empty) points-to set, in
    /// ascending index order.
    pub fn vars(&self) -> Vec<VarIdx> {
        let mut vars: Vec<VarIdx> = self.var_pts.keys().copied().collect();
        vars.sort_unstable();
        vars
    }
}
