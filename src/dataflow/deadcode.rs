use std::collections::{BTreeSet, HashSet};

use crate::dataflow::constprop::{evaluate_cond, ConstantPropagation};
use crate::dataflow::livevars::LiveVariables;
use crate::dataflow::solver::solve;
use crate::graph::cfg::{Cfg, CfgNode, EdgeKind};
use crate::ir::program::Program;
use crate::ir::stmt::{Exp, MethodIdx, Stmt, StmtIdx};

/// Detect dead code in one method: statements unreachable from the entry
/// once constant conditions prune infeasible branches, plus assignments
/// whose value is never read and whose RHS cannot fault.
///
/// The result is ordered by statement index.
pub fn find_dead_code(program: &Program, method: MethodIdx) -> BTreeSet<StmtIdx> {
    let cfg = Cfg::build(program, method);
    let constants = solve(&ConstantPropagation::new(program), &cfg);
    let live = solve(&LiveVariables::new(program), &cfg);

    let mut dead = BTreeSet::new();
    let mut visited: HashSet<usize> = HashSet::new();
    let mut stack = vec![cfg.entry()];

    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        let stmt = match cfg.node(node) {
            CfgNode::Stmt(s) => s,
            _ => {
                stack.extend(cfg.succs_of(node));
                continue;
            }
        };
        match program.stmt(stmt) {
            Stmt::Assign { lhs, rhs } => {
                if side_effect_free(rhs) && !live.out_fact(node).contains(lhs) {
                    dead.insert(stmt);
                }
                stack.extend(cfg.succs_of(node));
            }
            Stmt::If { cond, .. } => {
                let value = evaluate_cond(cond, constants.in_fact(node));
                for edge in cfg.out_edges_of(node) {
                    let feasible = match value.constant() {
                        None => true,
                        Some(c) => {
                            (c != 0 && edge.kind == EdgeKind::IfTrue)
                                || (c == 0 && edge.kind == EdgeKind::IfFalse)
                        }
                    };
                    if feasible {
                        stack.push(edge.target);
                    }
                }
            }
            Stmt::Switch { var, cases, .. } => {
                let value = constants.in_fact(node).get(*var);
                for edge in cfg.out_edges_of(node) {
                    let feasible = match value.constant() {
                        None => true,
                        Some(c) => match edge.kind {
                            EdgeKind::SwitchCase(v) => v == c,
                            EdgeKind::SwitchDefault => {
                                !cases.iter().any(|&(v, _)| v == c)
                            }
                            _ => true,
                        },
                    };
                    if feasible {
                        stack.push(edge.target);
                    }
                }
            }
            _ => stack.extend(cfg.succs_of(node)),
        }
    }

    // everything the pruned walk never reached is unreachable code
    for n in 0..cfg.num_nodes() {
        if let CfgNode::Stmt(s) = cfg.node(n) {
            if !visited.contains(&n) {
                dead.insert(s);
            }
        }
    }

    dead
}

/// RValues that cannot fault or touch the heap. Allocation, loads, stores
/// and calls are separate statement kinds and never qualify; division and
/// remainder can raise.
fn side_effect_free(exp: &Exp) -> bool {
    match exp {
        Exp::Literal(_) | Exp::Var(_) => true,
        Exp::Binary { op, .. } => !op.may_fault(),
    }
}
