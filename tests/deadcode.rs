use std::collections::BTreeSet;

use basalt::dataflow::deadcode::find_dead_code;
use basalt::ir::builder::ProgramBuilder;
use basalt::ir::program::Program;
use basalt::ir::stmt::{BinaryOp, MethodIdx, StmtIdx, SubSig};
use basalt::ir::types::Ty;

fn single_method(
    f: impl FnOnce(&mut basalt::ir::builder::BodyBuilder),
) -> (Program, MethodIdx) {
    let mut b = ProgramBuilder::new();
    let c = b.add_class("Main", None);
    let m = b.declare_method(
        c,
        SubSig {
            name: "main".into(),
            params: vec![],
            ret: Ty::Void,
        },
        true,
    );
    b.method_body(m, f);
    (b.finish(), m)
}

fn dead(program: &Program, m: MethodIdx) -> BTreeSet<StmtIdx> {
    find_dead_code(program, m)
}

// ── Constant conditions prune branches ───────────────────────────────────────

#[test]
fn always_true_branch_kills_the_else_arm() {
    // one = 1; if (one == one) { z = 2; return z } else { y = 9; ... }
    let (program, m) = single_method(|body| {
        let one = body.var("one", Ty::Int);
        let y = body.var("y", Ty::Int);
        let z = body.var("z", Ty::Int);
        let then_branch = body.label();
        let end = body.label();
        body.assign_int(one, 1); // 0
        body.if_(one, BinaryOp::Eq, one, then_branch); // 1
        body.assign_int(y, 9); // 2  unreachable
        body.goto(end); // 3  unreachable
        body.bind(then_branch);
        body.assign_int(z, 2); // 4  S1
        body.bind(end);
        body.ret(Some(z)); // 5  S3
    });
    let start = program.method(m).stmt_start;

    let dead_set = dead(&program, m);
    assert!(dead_set.contains(&(start + 2)), "else arm is unreachable");
    assert!(dead_set.contains(&(start + 3)));
    assert!(!dead_set.contains(&(start + 1)));
    assert!(!dead_set.contains(&(start + 4)), "taken branch is live");
    assert!(!dead_set.contains(&(start + 5)));
}

#[test]
fn switch_on_a_constant_keeps_only_the_matching_case() {
    let (program, m) = single_method(|body| {
        let x = body.var("x", Ty::Int);
        let a = body.var("a", Ty::Int);
        let b_var = body.var("b", Ty::Int);
        let d = body.var("d", Ty::Int);
        let case1 = body.label();
        let case2 = body.label();
        let default = body.label();
        let end = body.label();
        body.assign_int(x, 2); // 0
        body.switch(x, vec![(1, case1), (2, case2)], default); // 1
        body.bind(case1);
        body.assign_int(a, 1); // 2  dead: case 1 never taken
        body.goto(end); // 3
        body.bind(case2);
        body.assign_int(b_var, 2); // 4  live
        body.goto(end); // 5
        body.bind(default);
        body.assign_int(d, 3); // 6  dead: a case matches
        body.bind(end);
        body.ret(Some(b_var)); // 7 — keeps b live; a, d dead assignments anyway
    });
    let start = program.method(m).stmt_start;

    let dead_set = dead(&program, m);
    assert!(dead_set.contains(&(start + 2)));
    assert!(dead_set.contains(&(start + 6)));
    assert!(!dead_set.contains(&(start + 4)));
}

// ── Dead assignments ─────────────────────────────────────────────────────────

#[test]
fn unread_assignment_is_dead() {
    let (program, m) = single_method(|body| {
        let x = body.var("x", Ty::Int);
        let y = body.var("y", Ty::Int);
        body.assign_int(x, 1); // 0 live (returned)
        body.assign_int(y, 2); // 1 dead
        body.ret(Some(x)); // 2
    });
    let start = program.method(m).stmt_start;

    let dead_set = dead(&program, m);
    assert_eq!(dead_set, BTreeSet::from([start + 1]));
}

#[test]
fn division_keeps_an_unread_assignment_alive() {
    // x = five / zero: unread, but division can fault
    let (program, m) = single_method(|body| {
        let five = body.var("five", Ty::Int);
        let zero = body.var("zero", Ty::Int);
        let x = body.var("x", Ty::Int);
        body.assign_int(five, 5);
        body.assign_int(zero, 0);
        body.binary(x, BinaryOp::Div, five, zero);
        body.ret(None);
    });
    let start = program.method(m).stmt_start;

    let dead_set = dead(&program, m);
    assert!(
        !dead_set.contains(&(start + 2)),
        "division has side effects"
    );
}

#[test]
fn loads_and_calls_are_never_dead_assignments() {
    let mut b = ProgramBuilder::new();
    let holder = b.add_class("Holder", None);
    let f = b.add_field(holder, "f", Ty::Int, true);
    let main_class = b.add_class("Main", None);
    let m = b.declare_method(
        main_class,
        SubSig {
            name: "main".into(),
            params: vec![],
            ret: Ty::Void,
        },
        true,
    );
    b.method_body(m, |body| {
        let x = body.var("x", Ty::Int);
        body.load_field(x, None, f); // unread, but loads can fault/initialize
        body.ret(None);
    });
    let program = b.finish();
    let start = program.method(m).stmt_start;

    let dead_set = dead(&program, m);
    assert!(!dead_set.contains(&start));
}

// ── Result ordering ──────────────────────────────────────────────────────────

#[test]
fn dead_set_is_ordered_by_statement_index() {
    let (program, m) = single_method(|body| {
        let a = body.var("a", Ty::Int);
        let b_var = body.var("b", Ty::Int);
        let c = body.var("c", Ty::Int);
        body.assign_int(a, 1); // dead
        body.assign_int(b_var, 2); // dead
        body.assign_int(c, 3); // dead
        body.ret(None);
    });
    let start = program.method(m).stmt_start;

    let dead_set: Vec<StmtIdx> = dead(&program, m).into_iter().collect();
    assert_eq!(dead_set, vec![start, start + 1, start + 2]);
}
