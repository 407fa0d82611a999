use crate::ir::stmt::{FieldIdx, MethodIdx, Stmt, StmtIdx, SubSig, VarIdx};
use crate::ir::types::{ClassIdx, Ty};

/// A class or interface declaration.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub superclass: Option<ClassIdx>,
    pub interfaces: Vec<ClassIdx>,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub methods: Vec<MethodIdx>,
    pub fields: Vec<FieldIdx>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub class: ClassIdx,
    pub ty: Ty,
    pub is_static: bool,
}

/// A method declaration plus its body range in the flat statement table.
/// Abstract methods have an empty range.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub class: ClassIdx,
    pub subsig: SubSig,
    pub is_static: bool,
    pub is_abstract: bool,
    /// Parameter variables, in declaration order.
    pub params: Vec<VarIdx>,
    /// The receiver variable; `None` for static methods.
    pub this: Option<VarIdx>,
    /// Variables returned by some `Return` statement in the body.
    pub return_vars: Vec<VarIdx>,
    /// `[stmt_start, stmt_end)` into `Program::stmts`.
    pub stmt_start: StmtIdx,
    pub stmt_end: StmtIdx,
}

impl Method {
    pub fn has_body(&self) -> bool {
        self.stmt_end > self.stmt_start
    }
}

#[derive(Debug, Clone)]
pub struct Var {
    pub name: String,
    pub ty: Ty,
    pub method: MethodIdx,
}

/// The whole-program IR consumed by every analysis.
///
/// Everything lives in arenas addressed by plain indices: classes, fields,
/// methods, variables, and a single flat statement table partitioned into
/// per-method ranges. Cyclic structures (call graph, pointer flow graph,
/// ICFG) reference these indices instead of owning nodes.
#[derive(Debug, Default, Clone)]
pub struct Program {
    pub classes: Vec<Class>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub vars: Vec<Var>,
    pub stmts: Vec<Stmt>,
    /// Containing method of each statement, parallel to `stmts`.
    pub stmt_method: Vec<MethodIdx>,
    /// The program entry method, if one was designated.
    pub entry: Option<MethodIdx>,
}

impl Program {
    pub fn class(&self, c: ClassIdx) -> &Class {
        &self.classes[c]
    }

    pub fn field(&self, f: FieldIdx) -> &Field {
        &self.fields[f]
    }

    pub fn method(&self, m: MethodIdx) -> &Method {
        &self.methods[m]
    }

    pub fn var(&self, v: VarIdx) -> &Var {
        &self.vars[v]
    }

    pub fn stmt(&self, s: StmtIdx) -> &Stmt {
        &self.stmts[s]
    }

    pub fn containing_method_of(&self, s: StmtIdx) -> MethodIdx {
        self.stmt_method[s]
    }

    /// Statements of a method body, with their absolute indices.
    pub fn method_stmts(&self, m: MethodIdx) -> impl Iterator<Item = (StmtIdx, &Stmt)> {
        let method = &self.methods[m];
        self.stmts[method.stmt_start..method.stmt_end]
            .iter()
            .enumerate()
            .map(move |(i, stmt)| (method.stmt_start + i, stmt))
    }

    /// True if the variable's declared type is tracked by constant
    /// propagation.
    pub fn can_hold_int(&self, v: VarIdx) -> bool {
        self.vars[v].ty.can_hold_int()
    }

    /// Qualified `Class.method` name for diagnostics and reports.
    pub fn method_name(&self, m: MethodIdx) -> String {
        let method = &self.methods[m];
        format!("{}.{}", self.classes[method.class].name, method.name)
    }

    pub fn lookup_class(&self, name: &str) -> Option<ClassIdx> {
        self.classes.iter().position(|c| c.name == name)
    }

    /// Resolve `Class.method`, the form used by CLI flags and configs.
    /// When several overloads share the name, the first declared wins.
    pub fn lookup_method(&self, qualified: &str) -> Option<MethodIdx> {
        let (class_name, method_name) = qualified.rsplit_once('.')?;
        let class = self.lookup_class(class_name)?;
        self.classes[class]
            .methods
            .iter()
            .copied()
            .find(|&m| self.methods[m].name == method_name)
    }
}
