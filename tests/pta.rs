use std::collections::HashSet;

use basalt::ir::builder::ProgramBuilder;
use basalt::ir::hierarchy::ClassHierarchy;
use basalt::ir::stmt::{CallKind, StmtIdx, SubSig};
use basalt::ir::types::Ty;
use basalt::pta::context::{selector_for, KCallSite, KObject};
use basalt::pta::cs::solve_cs;
use basalt::pta::heap::ObjKind;
use basalt::pta::solve_ci;

fn void_sig(name: &str) -> SubSig {
    SubSig {
        name: name.into(),
        params: vec![],
        ret: Ty::Void,
    }
}

// ── Copy chains ──────────────────────────────────────────────────────────────

#[test]
fn copies_accumulate_objects() {
    // a = new X(); b = a; c = new Y(); b = c;
    let mut b = ProgramBuilder::new();
    let x = b.add_class("X", None);
    let y = b.add_class("Y", None);
    let main_class = b.add_class("Main", None);
    let main = b.declare_method(main_class, void_sig("main"), true);
    let mut vars = (0, 0, 0);
    b.method_body(main, |body| {
        let va = body.var("a", Ty::Class(x));
        let vb = body.var("b", Ty::Class(x));
        let vc = body.var("c", Ty::Class(y));
        vars = (va, vb, vc);
        body.new_obj(va, Ty::Class(x)); // site start+0
        body.copy(vb, va);
        body.new_obj(vc, Ty::Class(y)); // site start+2
        body.copy(vb, vc);
        body.ret(None);
    });
    b.set_entry(main);
    let program = b.finish();
    let hierarchy = ClassHierarchy::build(&program);
    let (va, vb, vc) = vars;
    let start = program.method(main).stmt_start;

    let solution = solve_ci(&program, &hierarchy, main);
    let sites = |v| -> HashSet<StmtIdx> {
        solution
            .pts_of_var(v)
            .map(|pts| {
                pts.iter()
                    .filter_map(|o| match solution.heap.obj(o).kind {
                        ObjKind::Alloc { site } => Some(site),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    assert_eq!(sites(va), HashSet::from([start]));
    assert_eq!(sites(vb), HashSet::from([start, start + 2]));
    assert_eq!(sites(vc), HashSet::from([start + 2]));
}

// ── PFG subset invariant ─────────────────────────────────────────────────────

#[test]
fn pfg_edges_respect_the_subset_constraint() {
    let mut b = ProgramBuilder::new();
    let x = b.add_class("X", None);
    let holder = b.add_class("Holder", None);
    let f = b.add_field(holder, "f", Ty::Class(x), false);
    let main_class = b.add_class("Main", None);
    let main = b.declare_method(main_class, void_sig("main"), true);
    let mut vars = (0, 0);
    b.method_body(main, |body| {
        let h = body.var("h", Ty::Class(holder));
        let v = body.var("v", Ty::Class(x));
        let w = body.var("w", Ty::Class(x));
        vars = (v, w);
        body.new_obj(h, Ty::Class(holder));
        body.new_obj(v, Ty::Class(x));
        body.store_field(Some(h), f, v);
        body.load_field(w, Some(h), f);
        body.ret(None);
    });
    b.set_entry(main);
    let program = b.finish();
    let hierarchy = ClassHierarchy::build(&program);
    let (v, w) = vars;

    let solution = solve_ci(&program, &hierarchy, main);
    for (s, t) in solution.pfg.edges() {
        assert!(
            solution.pfg.pts(s).is_subset_of(solution.pfg.pts(t)),
            "pts(source) must be a subset of pts(target) at fixpoint"
        );
    }
    // and the load actually observed the stored object
    assert_eq!(solution.pts_of_var(w), solution.pts_of_var(v));
}

// ── On-the-fly call graph vs CHA ─────────────────────────────────────────────

#[test]
fn receiver_objects_drive_dispatch() {
    // i = new A(); i.m()  — only A.m is called, B.m stays unreachable
    let mut b = ProgramBuilder::new();
    let iface = b.add_interface("I");
    let a = b.add_class("A", None);
    let bb = b.add_class("B", None);
    b.implement(a, iface);
    b.implement(bb, iface);
    b.declare_abstract_method(iface, void_sig("m"));
    let am = b.declare_method(a, void_sig("m"), false);
    b.method_body(am, |body| body.ret(None));
    let bm = b.declare_method(bb, void_sig("m"), false);
    b.method_body(bm, |body| body.ret(None));
    let main_class = b.add_class("Main", None);
    let main = b.declare_method(main_class, void_sig("main"), true);
    b.method_body(main, |body| {
        let recv = body.var("i", Ty::Class(iface));
        body.new_obj(recv, Ty::Class(a));
        body.invoke(CallKind::Interface, None, Some(recv), iface, void_sig("m"), vec![]);
        body.ret(None);
    });
    b.set_entry(main);
    let program = b.finish();
    let hierarchy = ClassHierarchy::build(&program);

    let solution = solve_ci(&program, &hierarchy, main);
    let callees: Vec<_> = solution.call_graph.edges().iter().map(|e| e.callee).collect();
    assert!(callees.contains(&am));
    assert!(!callees.contains(&bm), "B.m has no receiver object");
    assert!(!solution.call_graph.contains(bm));

    // soundness: every receiver object's dispatch target is a callee
    for edge in solution.call_graph.edges() {
        assert!(solution.call_graph.contains(edge.callee));
    }
}

// ── this-parameter and returns ───────────────────────────────────────────────

#[test]
fn this_receives_the_receiver_object() {
    // class C { C self() { return this; } }  main: c = new C(); r = c.self();
    let mut b = ProgramBuilder::new();
    let c = b.add_class("C", None);
    let self_sig = SubSig {
        name: "self".into(),
        params: vec![],
        ret: Ty::Class(c),
    };
    let self_m = b.declare_method(c, self_sig.clone(), false);
    let this = b.this_var(self_m);
    b.method_body(self_m, |body| body.ret(Some(this)));

    let main_class = b.add_class("Main", None);
    let main = b.declare_method(main_class, void_sig("main"), true);
    let mut vars = (0, 0);
    b.method_body(main, |body| {
        let cv = body.var("c", Ty::Class(c));
        let rv = body.var("r", Ty::Class(c));
        vars = (cv, rv);
        body.new_obj(cv, Ty::Class(c));
        body.invoke(CallKind::Virtual, Some(rv), Some(cv), c, self_sig, vec![]);
        body.ret(None);
    });
    b.set_entry(main);
    let program = b.finish();
    let hierarchy = ClassHierarchy::build(&program);
    let (cv, rv) = vars;

    let solution = solve_ci(&program, &hierarchy, main);
    let pts_c = solution.pts_of_var(cv).cloned().unwrap_or_default();
    let pts_this = solution.pts_of_var(this).cloned().unwrap_or_default();
    let pts_r = solution.pts_of_var(rv).cloned().unwrap_or_default();
    assert_eq!(pts_c, pts_this, "this aliases the receiver");
    assert_eq!(pts_c, pts_r, "returning this flows back to the result");
}

// ── Context sensitivity ──────────────────────────────────────────────────────

/// class Id { X id(X p) { return p; } }
/// main: one = new X(); two = new X(); r1 = i.id(one); r2 = i.id(two);
/// Call-site contexts keep r1 and r2 apart; the collapsed CI view merges
/// them.
#[test]
fn call_site_contexts_separate_call_sites() {
    let mut b = ProgramBuilder::new();
    let x = b.add_class("X", None);
    let id_class = b.add_class("Id", None);
    let id_sig = SubSig {
        name: "id".into(),
        params: vec![Ty::Class(x)],
        ret: Ty::Class(x),
    };
    let id_m = b.declare_method(id_class, id_sig.clone(), false);
    let p = b.param(id_m, 0);
    b.method_body(id_m, |body| body.ret(Some(p)));

    let main_class = b.add_class("Main", None);
    let main = b.declare_method(main_class, void_sig("main"), true);
    let mut vars = (0, 0);
    b.method_body(main, |body| {
        let i = body.var("i", Ty::Class(id_class));
        let one = body.var("one", Ty::Class(x));
        let two = body.var("two", Ty::Class(x));
        let r1 = body.var("r1", Ty::Class(x));
        let r2 = body.var("r2", Ty::Class(x));
        vars = (r1, r2);
        body.new_obj(i, Ty::Class(id_class));
        body.new_obj(one, Ty::Class(x));
        body.new_obj(two, Ty::Class(x));
        body.invoke(
            CallKind::Virtual,
            Some(r1),
            Some(i),
            id_class,
            id_sig.clone(),
            vec![one],
        );
        body.invoke(
            CallKind::Virtual,
            Some(r2),
            Some(i),
            id_class,
            id_sig.clone(),
            vec![two],
        );
        body.ret(None);
    });
    b.set_entry(main);
    let program = b.finish();
    let hierarchy = ClassHierarchy::build(&program);
    let (r1, r2) = vars;

    // context-sensitive: one object each
    let selector = KCallSite { k: 2 };
    let solution = solve_cs(&program, &hierarchy, main, &selector, None);
    let collapsed = solution.collapse();
    assert_eq!(collapsed.pts_of(r1).len(), 1);
    assert_eq!(collapsed.pts_of(r2).len(), 1);
    assert_ne!(
        collapsed.pts_of(r1).sorted(),
        collapsed.pts_of(r2).sorted(),
        "distinct allocation sites stay apart under 2-call"
    );

    // context-insensitive: the identity method merges both
    let ci = solve_ci(&program, &hierarchy, main);
    assert_eq!(ci.pts_of_var(r1).map(|p| p.len()), Some(2));
    assert_eq!(ci.pts_of_var(r2).map(|p| p.len()), Some(2));
}

/// Same identity method, but the two calls go through *different receiver
/// objects*; object sensitivity separates them even though the call sites
/// could share a stack.
#[test]
fn object_contexts_separate_receivers() {
    let mut b = ProgramBuilder::new();
    let x = b.add_class("X", None);
    let id_class = b.add_class("Id", None);
    let id_sig = SubSig {
        name: "id".into(),
        params: vec![Ty::Class(x)],
        ret: Ty::Class(x),
    };
    let id_m = b.declare_method(id_class, id_sig.clone(), false);
    let p = b.param(id_m, 0);
    b.method_body(id_m, |body| body.ret(Some(p)));

    let main_class = b.add_class("Main", None);
    let main = b.declare_method(main_class, void_sig("main"), true);
    let mut vars = (0, 0);
    b.method_body(main, |body| {
        let i1 = body.var("i1", Ty::Class(id_class));
        let i2 = body.var("i2", Ty::Class(id_class));
        let one = body.var("one", Ty::Class(x));
        let two = body.var("two", Ty::Class(x));
        let r1 = body.var("r1", Ty::Class(x));
        let r2 = body.var("r2", Ty::Class(x));
        vars = (r1, r2);
        body.new_obj(i1, Ty::Class(id_class));
        body.new_obj(i2, Ty::Class(id_class));
        body.new_obj(one, Ty::Class(x));
        body.new_obj(two, Ty::Class(x));
        body.invoke(
            CallKind::Virtual,
            Some(r1),
            Some(i1),
            id_class,
            id_sig.clone(),
            vec![one],
        );
        body.invoke(
            CallKind::Virtual,
            Some(r2),
            Some(i2),
            id_class,
            id_sig.clone(),
            vec![two],
        );
        body.ret(None);
    });
    b.set_entry(main);
    let program = b.finish();
    let hierarchy = ClassHierarchy::build(&program);
    let (r1, r2) = vars;

    let selector = KObject { k: 1 };
    let solution = solve_cs(&program, &hierarchy, main, &selector, None);
    let collapsed = solution.collapse();
    assert_eq!(collapsed.pts_of(r1).len(), 1);
    assert_eq!(collapsed.pts_of(r2).len(), 1);
    assert_ne!(collapsed.pts_of(r1).sorted(), collapsed.pts_of(r2).sorted());
}

#[test]
fn selector_names_resolve() {
    for name in ["ci", "1-call", "2-call", "1-obj", "2-obj"] {
        assert!(selector_for(name).is_some(), "selector '{name}' missing");
    }
    assert!(selector_for("3-call-site").is_none());
}
