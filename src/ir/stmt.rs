use crate::ir::types::{ClassIdx, Ty};

/// Index into `Program::stmts`.
pub type StmtIdx = usize;
/// Index into `Program::vars`.
pub type VarIdx = usize;
/// Index into `Program::methods`.
pub type MethodIdx = usize;
/// Index into `Program::fields`.
pub type FieldIdx = usize;

/// How a call site dispatches. Carried on call-graph edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallKind {
    /// Class method, no dispatch.
    Static,
    /// Constructor / private / super call: resolved on the declared class.
    Special,
    /// Receiver-dispatched call on a class type.
    Virtual,
    /// Receiver-dispatched call on an interface type.
    Interface,
    /// Bootstrap-driven call site; never resolved here.
    Dynamic,
    Other,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Special => write!(f, "special"),
            Self::Virtual => write!(f, "virtual"),
            Self::Interface => write!(f, "interface"),
            Self::Dynamic => write!(f, "dynamic"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Binary operators over 32-bit signed integers.
///
/// Comparison operators produce 0/1. Shift counts are masked to the low five
/// bits, matching the source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    /// Division and remainder can raise at runtime; everything else is pure.
    pub fn may_fault(&self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Rem)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Int(i32),
    Bool(bool),
    Char(char),
}

impl Literal {
    /// Every literal collapses to a 32-bit integer in the constant lattice.
    pub fn as_i32(&self) -> i32 {
        match self {
            Literal::Int(v) => *v,
            Literal::Bool(b) => *b as i32,
            Literal::Char(c) => *c as i32,
        }
    }
}

/// Right-hand sides of plain assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exp {
    Literal(Literal),
    Var(VarIdx),
    Binary { op: BinaryOp, lhs: VarIdx, rhs: VarIdx },
}

/// A method reference as it appears at a call site: the declared class plus
/// the subsignature used for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class: ClassIdx,
    pub subsig: SubSig,
}

/// Method name, parameter types and return type — everything except the
/// declaring class. Dispatch matches on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubSig {
    pub name: String,
    pub params: Vec<Ty>,
    pub ret: Ty,
}

impl std::fmt::Display for SubSig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}(", self.ret, self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")")
    }
}

/// One invocation expression: dispatch kind, optional receiver, the declared
/// target and the argument variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeExp {
    pub kind: CallKind,
    /// Receiver variable; `None` for static calls.
    pub base: Option<VarIdx>,
    pub method_ref: MethodRef,
    pub args: Vec<VarIdx>,
}

impl InvokeExp {
    pub fn is_static(&self) -> bool {
        self.base.is_none()
    }
}

/// Condition of an `If` statement: `lhs op rhs` with a comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CondExp {
    pub op: BinaryOp,
    pub lhs: VarIdx,
    pub rhs: VarIdx,
}

/// The closed statement vocabulary.
///
/// Branch targets are absolute indices into the program's flat statement
/// table; the builder guarantees they stay inside the owning method's range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Nop,
    /// `lhs = exp` where exp is a literal, a variable, or a binary expression.
    Assign { lhs: VarIdx, rhs: Exp },
    /// Allocation site: `lhs = new T`. Object identity is this statement.
    New { lhs: VarIdx, ty: Ty },
    /// `lhs = base.field`, or a static load when `base` is `None`.
    LoadField {
        lhs: VarIdx,
        base: Option<VarIdx>,
        field: FieldIdx,
    },
    /// `base.field = rhs`, or a static store when `base` is `None`.
    StoreField {
        base: Option<VarIdx>,
        field: FieldIdx,
        rhs: VarIdx,
    },
    /// `lhs = base[index]`.
    LoadArray {
        lhs: VarIdx,
        base: VarIdx,
        index: VarIdx,
    },
    /// `base[index] = rhs`.
    StoreArray {
        base: VarIdx,
        index: VarIdx,
        rhs: VarIdx,
    },
    /// Call site; `result` receives the return value if bound.
    Invoke {
        result: Option<VarIdx>,
        call: InvokeExp,
    },
    /// Conditional branch to `target` when the condition holds, otherwise
    /// fall through.
    If { cond: CondExp, target: StmtIdx },
    Goto { target: StmtIdx },
    /// Table/lookup switch: each case pairs a constant with its target.
    Switch {
        var: VarIdx,
        cases: Vec<(i32, StmtIdx)>,
        default: StmtIdx,
    },
    Return { value: Option<VarIdx> },
}

impl Stmt {
    /// The variable this statement defines, if any.
    pub fn def(&self) -> Option<VarIdx> {
        match self {
            Stmt::Assign { lhs, .. }
            | Stmt::New { lhs, .. }
            | Stmt::LoadField { lhs, .. }
            | Stmt::LoadArray { lhs, .. } => Some(*lhs),
            Stmt::Invoke { result, .. } => *result,
            _ => None,
        }
    }

    /// All variables this statement reads.
    pub fn uses(&self) -> Vec<VarIdx> {
        match self {
            Stmt::Nop | Stmt::New { .. } | Stmt::Goto { .. } => Vec::new(),
            Stmt::Assign { rhs, .. } => match rhs {
                Exp::Literal(_) => Vec::new(),
                Exp::Var(v) => vec![*v],
                Exp::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            },
            Stmt::LoadField { base, .. } => base.iter().copied().collect(),
            Stmt::StoreField { base, rhs, .. } => {
                base.iter().copied().chain([*rhs]).collect()
            }
            Stmt::LoadArray { base, index, .. } => vec![*base, *index],
            Stmt::StoreArray { base, index, rhs } => vec![*base, *index, *rhs],
            Stmt::Invoke { call, .. } => call
                .base
                .iter()
                .copied()
                .chain(call.args.iter().copied())
                .collect(),
            Stmt::If { cond, .. } => vec![cond.lhs, cond.rhs],
            Stmt::Switch { var, .. } => vec![*var],
            Stmt::Return { value } => value.iter().copied().collect(),
        }
    }

    pub fn as_invoke(&self) -> Option<(&InvokeExp, Option<VarIdx>)> {
        match self {
            Stmt::Invoke { result, call } => Some((call, *result)),
            _ => None,
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Stmt::Invoke { .. })
    }
}
