pub mod builder;
pub mod hierarchy;
pub mod program;
pub mod stmt;
pub mod types;

pub use hierarchy::ClassHierarchy;
pub use program::{Class, Field, Method, Program, Var};
pub use stmt::{
    BinaryOp, CallKind, CondExp, Exp, FieldIdx, InvokeExp, Literal, MethodIdx, MethodRef, Stmt,
    StmtIdx, SubSig, VarIdx,
};
pub use types::{ClassIdx, Ty};
