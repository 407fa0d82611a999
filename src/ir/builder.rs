use crate::ir::program::{Class, Field, Method, Program, Var};
use crate::ir::stmt::{
    BinaryOp, CallKind, CondExp, Exp, FieldIdx, InvokeExp, Literal, MethodIdx, MethodRef, Stmt,
    StmtIdx, SubSig, VarIdx,
};
use crate::ir::types::{ClassIdx, Ty};

/// Programmatic construction of a `Program` arena.
///
/// Both the JSON loader and the test suites go through this builder, which
/// keeps index bookkeeping (statement rebasing, return-variable collection,
/// parameter variables) in one place.
#[derive(Default)]
pub struct ProgramBuilder {
    program: Program,
}

/// Forward-referencing branch target inside one method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Clone, Copy)]
enum Target {
    /// Method-local statement index, already known.
    Local(usize),
    /// Unresolved label, bound later via `BodyBuilder::bind`.
    Label(usize),
}

enum Pending {
    Plain(Stmt),
    If { cond: CondExp, target: Target },
    Goto { target: Target },
    Switch {
        var: VarIdx,
        cases: Vec<(i32, Target)>,
        default: Target,
    },
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, name: &str, superclass: Option<ClassIdx>) -> ClassIdx {
        self.program.classes.push(Class {
            name: name.to_string(),
            superclass,
            interfaces: Vec::new(),
            is_interface: false,
            is_abstract: false,
            methods: Vec::new(),
            fields: Vec::new(),
        });
        self.program.classes.len() - 1
    }

    pub fn add_interface(&mut self, name: &str) -> ClassIdx {
        let c = self.add_class(name, None);
        self.program.classes[c].is_interface = true;
        self.program.classes[c].is_abstract = true;
        c
    }

    /// Record that `class` implements (or, for interfaces, extends) `iface`.
    pub fn implement(&mut self, class: ClassIdx, iface: ClassIdx) {
        self.program.classes[class].interfaces.push(iface);
    }

    /// Set the superclass after the fact; the loader needs this because
    /// classes may reference each other in any order.
    pub fn set_superclass(&mut self, class: ClassIdx, superclass: ClassIdx) {
        self.program.classes[class].superclass = Some(superclass);
    }

    pub fn set_abstract(&mut self, class: ClassIdx) {
        self.program.classes[class].is_abstract = true;
    }

    pub fn add_field(&mut self, class: ClassIdx, name: &str, ty: Ty, is_static: bool) -> FieldIdx {
        self.program.fields.push(Field {
            name: name.to_string(),
            class,
            ty,
            is_static,
        });
        let f = self.program.fields.len() - 1;
        self.program.classes[class].fields.push(f);
        f
    }

    /// Declare a concrete method. Parameter variables (and the receiver for
    /// instance methods) are created here; the body comes separately through
    /// `method_body`.
    pub fn declare_method(&mut self, class: ClassIdx, subsig: SubSig, is_static: bool) -> MethodIdx {
        let m = self.program.methods.len();
        let this = if is_static {
            None
        } else {
            Some(self.fresh_var("this", Ty::Class(class), m))
        };
        let params: Vec<VarIdx> = subsig
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| self.fresh_var(&format!("p{i}"), ty.clone(), m))
            .collect();
        self.program.methods.push(Method {
            name: subsig.name.clone(),
            class,
            subsig,
            is_static,
            is_abstract: false,
            params,
            this,
            return_vars: Vec::new(),
            stmt_start: 0,
            stmt_end: 0,
        });
        self.program.classes[class].methods.push(m);
        m
    }

    pub fn declare_abstract_method(&mut self, class: ClassIdx, subsig: SubSig) -> MethodIdx {
        let m = self.declare_method(class, subsig, false);
        self.program.methods[m].is_abstract = true;
        m
    }

    pub fn set_entry(&mut self, m: MethodIdx) {
        self.program.entry = Some(m);
    }

    pub fn param(&self, m: MethodIdx, i: usize) -> VarIdx {
        self.program.methods[m].params[i]
    }

    pub fn this_var(&self, m: MethodIdx) -> VarIdx {
        self.program.methods[m]
            .this
            .expect("static method has no receiver")
    }

    /// Append a body to a previously declared method. Branch targets inside
    /// the closure are method-local; they are rebased onto the flat statement
    /// table here.
    pub fn method_body(&mut self, m: MethodIdx, f: impl FnOnce(&mut BodyBuilder)) {
        assert!(
            !self.program.methods[m].is_abstract,
            "abstract method cannot have a body"
        );
        let mut body = BodyBuilder {
            builder: self,
            method: m,
            pending: Vec::new(),
            labels: Vec::new(),
        };
        f(&mut body);
        let pending = std::mem::take(&mut body.pending);
        let labels = std::mem::take(&mut body.labels);

        let start = self.program.stmts.len();
        let body_len = pending.len();
        let resolve = move |t: Target| -> StmtIdx {
            let local = match t {
                Target::Local(i) => i,
                Target::Label(l) => labels[l].expect("unbound label in method body"),
            };
            assert!(local <= body_len, "branch target out of body range");
            start + local
        };

        let mut return_vars = Vec::new();
        for p in pending {
            let stmt = match p {
                Pending::Plain(s) => {
                    if let Stmt::Return { value: Some(v) } = &s {
                        if !return_vars.contains(v) {
                            return_vars.push(*v);
                        }
                    }
                    s
                }
                Pending::If { cond, target } => Stmt::If {
                    cond,
                    target: resolve(target),
                },
                Pending::Goto { target } => Stmt::Goto {
                    target: resolve(target),
                },
                Pending::Switch {
                    var,
                    cases,
                    default,
                } => Stmt::Switch {
                    var,
                    cases: cases.into_iter().map(|(v, t)| (v, resolve(t))).collect(),
                    default: resolve(default),
                },
            };
            self.program.stmts.push(stmt);
            self.program.stmt_method.push(m);
        }

        let method = &mut self.program.methods[m];
        method.stmt_start = start;
        method.stmt_end = self.program.stmts.len();
        method.return_vars = return_vars;
    }

    pub fn finish(self) -> Program {
        self.program
    }

    fn fresh_var(&mut self, name: &str, ty: Ty, method: MethodIdx) -> VarIdx {
        self.program.vars.push(Var {
            name: name.to_string(),
            ty,
            method,
        });
        self.program.vars.len() - 1
    }
}

/// Emits the statements of one method body.
pub struct BodyBuilder<'a> {
    builder: &'a mut ProgramBuilder,
    method: MethodIdx,
    pending: Vec<Pending>,
    labels: Vec<Option<usize>>,
}

impl BodyBuilder<'_> {
    /// Declare a local variable of this method.
    pub fn var(&mut self, name: &str, ty: Ty) -> VarIdx {
        self.builder.fresh_var(name, ty, self.method)
    }

    /// A fresh label; bind it at the position it should jump to.
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the next emitted statement.
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.pending.len());
    }

    pub fn nop(&mut self) {
        self.pending.push(Pending::Plain(Stmt::Nop));
    }

    pub fn assign_int(&mut self, lhs: VarIdx, value: i32) {
        self.assign(lhs, Exp::Literal(Literal::Int(value)));
    }

    pub fn assign(&mut self, lhs: VarIdx, rhs: Exp) {
        self.pending.push(Pending::Plain(Stmt::Assign { lhs, rhs }));
    }

    pub fn copy(&mut self, lhs: VarIdx, rhs: VarIdx) {
        self.assign(lhs, Exp::Var(rhs));
    }

    pub fn binary(&mut self, lhs: VarIdx, op: BinaryOp, a: VarIdx, b: VarIdx) {
        self.assign(lhs, Exp::Binary { op, lhs: a, rhs: b });
    }

    pub fn new_obj(&mut self, lhs: VarIdx, ty: Ty) {
        self.pending.push(Pending::Plain(Stmt::New { lhs, ty }));
    }

    pub fn load_field(&mut self, lhs: VarIdx, base: Option<VarIdx>, field: FieldIdx) {
        self.pending
            .push(Pending::Plain(Stmt::LoadField { lhs, base, field }));
    }

    pub fn store_field(&mut self, base: Option<VarIdx>, field: FieldIdx, rhs: VarIdx) {
        self.pending
            .push(Pending::Plain(Stmt::StoreField { base, field, rhs }));
    }

    pub fn load_array(&mut self, lhs: VarIdx, base: VarIdx, index: VarIdx) {
        self.pending
            .push(Pending::Plain(Stmt::LoadArray { lhs, base, index }));
    }

    pub fn store_array(&mut self, base: VarIdx, index: VarIdx, rhs: VarIdx) {
        self.pending
            .push(Pending::Plain(Stmt::StoreArray { base, index, rhs }));
    }

    /// Emit a call. The declared target is `(class, subsig)`; `base` must be
    /// `None` exactly for `CallKind::Static`.
    pub fn invoke(
        &mut self,
        kind: CallKind,
        result: Option<VarIdx>,
        base: Option<VarIdx>,
        class: ClassIdx,
        subsig: SubSig,
        args: Vec<VarIdx>,
    ) {
        debug_assert_eq!(kind == CallKind::Static, base.is_none());
        self.pending.push(Pending::Plain(Stmt::Invoke {
            result,
            call: InvokeExp {
                kind,
                base,
                method_ref: MethodRef { class, subsig },
                args,
            },
        }));
    }

    pub fn if_(&mut self, lhs: VarIdx, op: BinaryOp, rhs: VarIdx, target: Label) {
        self.pending.push(Pending::If {
            cond: CondExp { op, lhs, rhs },
            target: Target::Label(target.0),
        });
    }

    pub fn goto(&mut self, target: Label) {
        self.pending.push(Pending::Goto {
            target: Target::Label(target.0),
        });
    }

    pub fn switch(&mut self, var: VarIdx, cases: Vec<(i32, Label)>, default: Label) {
        self.pending.push(Pending::Switch {
            var,
            cases: cases
                .into_iter()
                .map(|(v, l)| (v, Target::Label(l.0)))
                .collect(),
            default: Target::Label(default.0),
        });
    }

    pub fn ret(&mut self, value: Option<VarIdx>) {
        self.pending.push(Pending::Plain(Stmt::Return { value }));
    }

    /// Raw emission for frontends that computed method-local branch targets
    /// themselves (the JSON loader). Targets are rebased like everything
    /// else.
    pub fn emit_raw(&mut self, stmt: Stmt) {
        let pending = match stmt {
            Stmt::If { cond, target } => Pending::If {
                cond,
                target: Target::Local(target),
            },
            Stmt::Goto { target } => Pending::Goto {
                target: Target::Local(target),
            },
            Stmt::Switch {
                var,
                cases,
                default,
            } => Pending::Switch {
                var,
                cases: cases
                    .into_iter()
                    .map(|(v, t)| (v, Target::Local(t)))
                    .collect(),
                default: Target::Local(default),
            },
            other => Pending::Plain(other),
        };
        self.pending.push(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_are_rebased_onto_the_flat_table() {
        let mut b = ProgramBuilder::new();
        let c = b.add_class("Main", None);
        let sig = SubSig {
            name: "main".into(),
            params: vec![],
            ret: Ty::Void,
        };
        let sig2 = SubSig {
            name: "other".into(),
            params: vec![],
            ret: Ty::Void,
        };
        let m1 = b.declare_method(c, sig, true);
        let m2 = b.declare_method(c, sig2, true);
        b.method_body(m1, |body| {
            body.nop();
            body.ret(None);
        });
        b.method_body(m2, |body| {
            let end = body.label();
            body.goto(end);
            body.nop();
            body.bind(end);
            body.ret(None);
        });
        let p = b.finish();

        assert_eq!(p.methods[m1].stmt_start, 0);
        assert_eq!(p.methods[m1].stmt_end, 2);
        assert_eq!(p.methods[m2].stmt_start, 2);
        // goto in m2 must point at the absolute index of its return
        assert_eq!(p.stmts[2], Stmt::Goto { target: 4 });
        assert_eq!(p.containing_method_of(3), m2);
    }

    #[test]
    fn return_vars_are_collected_once() {
        let mut b = ProgramBuilder::new();
        let c = b.add_class("Main", None);
        let sig = SubSig {
            name: "f".into(),
            params: vec![],
            ret: Ty::Int,
        };
        let m = b.declare_method(c, sig, true);
        b.method_body(m, |body| {
            let x = body.var("x", Ty::Int);
            let skip = body.label();
            body.assign_int(x, 1);
            body.if_(x, BinaryOp::Gt, x, skip);
            body.ret(Some(x));
            body.bind(skip);
            body.ret(Some(x));
        });
        let p = b.finish();
        assert_eq!(p.methods[m].return_vars.len(), 1);
    }
}
