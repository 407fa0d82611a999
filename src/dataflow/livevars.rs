use crate::dataflow::fact::LiveSet;
use crate::dataflow::solver::DataflowAnalysis;
use crate::graph::cfg::{Cfg, CfgNode};
use crate::ir::program::Program;

/// Backward liveness analysis. Dead-code detection uses it to find
/// assignments whose value is never read.
pub struct LiveVariables<'p> {
    pub program: &'p Program,
}

impl<'p> LiveVariables<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self { program }
    }
}

impl DataflowAnalysis for LiveVariables<'_> {
    type Fact = LiveSet;

    fn is_forward(&self) -> bool {
        false
    }

    fn boundary_fact(&self, _cfg: &Cfg) -> LiveSet {
        LiveSet::new()
    }

    fn initial_fact(&self) -> LiveSet {
        LiveSet::new()
    }

    fn meet_into(&self, fact: &LiveSet, target: &mut LiveSet) -> bool {
        let before = target.len();
        target.extend(fact.iter().copied());
        target.len() != before
    }

    /// Backward: `input` is the OUT set, `output` the IN set.
    /// IN = uses ∪ (OUT − def).
    fn transfer_node(&self, node: CfgNode, input: &LiveSet, output: &mut LiveSet) -> bool {
        let stmt = match node {
            CfgNode::Stmt(s) => self.program.stmt(s),
            // virtual nodes pass the fact through
            _ => {
                let before = output.len();
                output.extend(input.iter().copied());
                return output.len() != before;
            }
        };

        let before = output.len();
        let def = stmt.def();
        output.extend(input.iter().copied().filter(|v| Some(*v) != def));
        output.extend(stmt.uses());
        output.len() != before
    }
}
