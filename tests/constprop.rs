use basalt::dataflow::constprop::{transfer_stmt, ConstantPropagation};
use basalt::dataflow::fact::CpFact;
use basalt::dataflow::solver::solve;
use basalt::dataflow::value::Value;
use basalt::graph::cfg::Cfg;
use basalt::ir::builder::ProgramBuilder;
use basalt::ir::program::Program;
use basalt::ir::stmt::{BinaryOp, MethodIdx, SubSig, VarIdx};
use basalt::ir::types::Ty;

fn int_sig(name: &str, params: usize) -> SubSig {
    SubSig {
        name: name.into(),
        params: vec![Ty::Int; params],
        ret: Ty::Void,
    }
}

/// Build a single static method and hand its body to `f`.
fn single_method(
    params: usize,
    f: impl FnOnce(&mut basalt::ir::builder::BodyBuilder, Vec<VarIdx>),
) -> (Program, MethodIdx) {
    let mut b = ProgramBuilder::new();
    let c = b.add_class("Main", None);
    let m = b.declare_method(c, int_sig("main", params), true);
    let param_vars: Vec<VarIdx> = (0..params).map(|i| b.param(m, i)).collect();
    b.method_body(m, |body| f(body, param_vars));
    (b.finish(), m)
}

fn out_at(program: &Program, m: MethodIdx, offset: usize) -> CpFact {
    let cfg = Cfg::build(program, m);
    let result = solve(&ConstantPropagation::new(program), &cfg);
    let node = cfg.node_of_stmt(program.method(m).stmt_start + offset);
    result.out_fact(node).clone()
}

// ── Straight-line arithmetic ─────────────────────────────────────────────────

#[test]
fn straight_line_addition_is_folded() {
    let mut vars = (0, 0, 0);
    let (program, m) = single_method(0, |body, _| {
        let x = body.var("x", Ty::Int);
        let y = body.var("y", Ty::Int);
        let z = body.var("z", Ty::Int);
        vars = (x, y, z);
        body.assign_int(x, 1);
        body.assign_int(y, 2);
        body.binary(z, BinaryOp::Add, x, y);
        body.ret(None);
    });
    let (x, y, z) = vars;

    let out = out_at(&program, m, 2);
    assert_eq!(out.get(z), Value::Const(3));
    assert_eq!(out.get(x), Value::Const(1));
    assert_eq!(out.get(y), Value::Const(2));
}

// ── Confluence ───────────────────────────────────────────────────────────────

#[test]
fn branch_join_loses_the_constant() {
    // if (c > 0) x = 1 else x = 2; z = x  =>  z is NAC
    let mut vars = (0, 0);
    let (program, m) = single_method(1, |body, params| {
        let c = params[0];
        let zero = body.var("zero", Ty::Int);
        let x = body.var("x", Ty::Int);
        let z = body.var("z", Ty::Int);
        vars = (x, z);
        let then_branch = body.label();
        let join = body.label();
        body.assign_int(zero, 0); // 0
        body.if_(c, BinaryOp::Gt, zero, then_branch); // 1
        body.assign_int(x, 2); // 2
        body.goto(join); // 3
        body.bind(then_branch);
        body.assign_int(x, 1); // 4
        body.bind(join);
        body.copy(z, x); // 5
        body.ret(None); // 6
    });
    let (x, z) = vars;

    let out = out_at(&program, m, 5);
    assert_eq!(out.get(z), Value::Nac);
    assert_eq!(out.get(x), Value::Nac);
}

// ── Multiplication short circuit ─────────────────────────────────────────────

#[test]
fn zero_times_unknown_is_zero() {
    let mut z_var = 0;
    let (program, m) = single_method(1, |body, params| {
        let y = params[0]; // NAC at entry
        let x = body.var("x", Ty::Int);
        let z = body.var("z", Ty::Int);
        z_var = z;
        body.assign_int(x, 0);
        body.binary(z, BinaryOp::Mul, x, y);
        body.ret(None);
    });

    let out = out_at(&program, m, 1);
    assert_eq!(out.get(z_var), Value::Const(0));
}

// ── Division by zero ─────────────────────────────────────────────────────────

#[test]
fn division_by_constant_zero_suppresses_propagation() {
    let mut x_var = 0;
    let (program, m) = single_method(0, |body, _| {
        let five = body.var("five", Ty::Int);
        let zero = body.var("zero", Ty::Int);
        let x = body.var("x", Ty::Int);
        x_var = x;
        body.assign_int(five, 5);
        body.assign_int(zero, 0);
        body.binary(x, BinaryOp::Div, five, zero);
        body.ret(None);
    });

    let out = out_at(&program, m, 2);
    assert!(out.get(x_var).is_undef());
}

// ── Monotonicity ─────────────────────────────────────────────────────────────

#[test]
fn transfer_is_idempotent_on_unchanged_input() {
    let (program, m) = single_method(0, |body, _| {
        let x = body.var("x", Ty::Int);
        let y = body.var("y", Ty::Int);
        body.assign_int(x, 4);
        body.binary(y, BinaryOp::Shl, x, x);
        body.ret(None);
    });

    let start = program.method(m).stmt_start;
    let mut input = CpFact::new();
    input.update(0, Value::Const(4));
    let mut output = CpFact::new();

    let stmt = program.stmt(start + 1);
    assert!(transfer_stmt(&program, stmt, &input, &mut output));
    // re-running with the same input must report no change
    assert!(!transfer_stmt(&program, stmt, &input, &mut output));
}

// ── Non-integer definitions ──────────────────────────────────────────────────

#[test]
fn reference_typed_defs_are_ignored() {
    let mut vars = (0, 0);
    let (program, m) = single_method(0, |body, _| {
        let obj = body.var("obj", Ty::Class(0));
        let x = body.var("x", Ty::Int);
        vars = (obj, x);
        body.new_obj(obj, Ty::Class(0));
        body.assign_int(x, 8);
        body.ret(None);
    });
    let (obj, x) = vars;

    let out = out_at(&program, m, 1);
    assert_eq!(out.get(obj), Value::Undef);
    assert_eq!(out.get(x), Value::Const(8));
}
