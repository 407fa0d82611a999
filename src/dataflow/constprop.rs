use crate::dataflow::fact::CpFact;
use crate::dataflow::solver::DataflowAnalysis;
use crate::dataflow::value::Value;
use crate::graph::cfg::{Cfg, CfgNode};
use crate::ir::program::Program;
use crate::ir::stmt::{BinaryOp, CondExp, Exp, Stmt};

/// Intra-procedural constant propagation over integer-typed variables.
pub struct ConstantPropagation<'p> {
    pub program: &'p Program,
}

impl<'p> ConstantPropagation<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self { program }
    }
}

impl DataflowAnalysis for ConstantPropagation<'_> {
    type Fact = CpFact;

    fn is_forward(&self) -> bool {
        true
    }

    /// Parameters hold unknown integers at entry; locals start absent
    /// (Undef).
    fn boundary_fact(&self, cfg: &Cfg) -> CpFact {
        let mut fact = CpFact::new();
        for &param in &self.program.method(cfg.method).params {
            if self.program.can_hold_int(param) {
                fact.update(param, Value::Nac);
            }
        }
        fact
    }

    fn initial_fact(&self) -> CpFact {
        CpFact::new()
    }

    fn meet_into(&self, fact: &CpFact, target: &mut CpFact) -> bool {
        target.meet_from(fact)
    }

    fn transfer_node(&self, node: CfgNode, input: &CpFact, output: &mut CpFact) -> bool {
        match node {
            CfgNode::Entry | CfgNode::Exit => output.copy_from(input),
            CfgNode::Stmt(s) => transfer_stmt(self.program, self.program.stmt(s), input, output),
        }
    }
}

/// The statement transfer shared by the intra- and inter-procedural
/// analyses: copy IN to OUT, then re-bind an integer-typed definition to the
/// value of its right-hand side. Definitions whose RHS is not an evaluable
/// expression (loads, calls, allocations) conservatively become Nac here;
/// the inter-procedural layer overrides those cases with alias information.
pub fn transfer_stmt(program: &Program, stmt: &Stmt, input: &CpFact, output: &mut CpFact) -> bool {
    let mut changed = output.copy_from(input);
    if let Some(def) = stmt.def() {
        if program.can_hold_int(def) {
            let value = match stmt {
                Stmt::Assign { rhs, .. } => evaluate(program, rhs, input),
                _ => Value::Nac,
            };
            changed |= output.update(def, value);
        }
    }
    changed
}

/// Evaluate an assignment RHS under the given fact.
pub fn evaluate(program: &Program, exp: &Exp, fact: &CpFact) -> Value {
    match exp {
        Exp::Literal(lit) => Value::Const(lit.as_i32()),
        Exp::Var(v) => {
            if program.can_hold_int(*v) {
                fact.get(*v)
            } else {
                Value::Nac
            }
        }
        Exp::Binary { op, lhs, rhs } => evaluate_binary(*op, fact.get(*lhs), fact.get(*rhs)),
    }
}

/// Evaluate an `If` condition; used by dead-code detection to prune
/// infeasible branches.
pub fn evaluate_cond(cond: &CondExp, fact: &CpFact) -> Value {
    evaluate_binary(cond.op, fact.get(cond.lhs), fact.get(cond.rhs))
}

/// The arithmetic kernel, in 32-bit two's-complement.
///
/// The Undef gate runs first: an undefined operand yields Undef even for the
/// multiplication-by-zero short circuit. Division and remainder by a constant
/// zero yield Undef, which suppresses propagation without aborting the
/// analysis.
pub fn evaluate_binary(op: BinaryOp, l: Value, r: Value) -> Value {
    if l.is_undef() || r.is_undef() {
        return Value::Undef;
    }
    let both = l.constant().zip(r.constant());
    match op {
        BinaryOp::Add => both.map_or(Value::Nac, |(a, b)| Value::Const(a.wrapping_add(b))),
        BinaryOp::Sub => both.map_or(Value::Nac, |(a, b)| Value::Const(a.wrapping_sub(b))),
        BinaryOp::Mul => {
            if l.constant() == Some(0) || r.constant() == Some(0) {
                return Value::Const(0);
            }
            both.map_or(Value::Nac, |(a, b)| Value::Const(a.wrapping_mul(b)))
        }
        BinaryOp::Div => {
            if r.constant() == Some(0) {
                return Value::Undef;
            }
            both.map_or(Value::Nac, |(a, b)| Value::Const(a.wrapping_div(b)))
        }
        BinaryOp::Rem => {
            if r.constant() == Some(0) {
                return Value::Undef;
            }
            both.map_or(Value::Nac, |(a, b)| Value::Const(a.wrapping_rem(b)))
        }
        BinaryOp::Eq => both.map_or(Value::Nac, |(a, b)| Value::Const((a == b) as i32)),
        BinaryOp::Ne => both.map_or(Value::Nac, |(a, b)| Value::Const((a != b) as i32)),
        BinaryOp::Lt => both.map_or(Value::Nac, |(a, b)| Value::Const((a < b) as i32)),
        BinaryOp::Gt => both.map_or(Value::Nac, |(a, b)| Value::Const((a > b) as i32)),
        BinaryOp::Le => both.map_or(Value::Nac, |(a, b)| Value::Const((a <= b) as i32)),
        BinaryOp::Ge => both.map_or(Value::Nac, |(a, b)| Value::Const((a >= b) as i32)),
        BinaryOp::Shl => both.map_or(Value::Nac, |(a, b)| Value::Const(a.wrapping_shl(b as u32))),
        BinaryOp::Shr => both.map_or(Value::Nac, |(a, b)| Value::Const(a.wrapping_shr(b as u32))),
        BinaryOp::Ushr => both.map_or(Value::Nac, |(a, b)| {
            Value::Const(((a as u32).wrapping_shr(b as u32)) as i32)
        }),
        BinaryOp::And => both.map_or(Value::Nac, |(a, b)| Value::Const(a & b)),
        BinaryOp::Or => both.map_or(Value::Nac, |(a, b)| Value::Const(a | b)),
        BinaryOp::Xor => both.map_or(Value::Nac, |(a, b)| Value::Const(a ^ b)),
    }
}
