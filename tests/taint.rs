use basalt::ir::builder::ProgramBuilder;
use basalt::ir::hierarchy::ClassHierarchy;
use basalt::ir::program::Program;
use basalt::ir::stmt::{CallKind, MethodIdx, SubSig};
use basalt::ir::types::Ty;
use basalt::pta::context::KCallSite;
use basalt::pta::cs::solve_cs;
use basalt::taint::{TaintAnalysis, TaintConfig, TaintFlow};

/// class S {
///   static X src() { x = new X(); return x; }
///   static void sink(X v) {}
///   static X id(X v) { x = new X(); return x; }   // does NOT forward v
/// }
fn library(b: &mut ProgramBuilder) -> (usize, SubSig, SubSig, SubSig) {
    let x = b.add_class("X", None);
    let s = b.add_class("S", None);

    let src_sig = SubSig {
        name: "src".into(),
        params: vec![],
        ret: Ty::Class(x),
    };
    let src = b.declare_method(s, src_sig.clone(), true);
    b.method_body(src, |body| {
        let v = body.var("x", Ty::Class(x));
        body.new_obj(v, Ty::Class(x));
        body.ret(Some(v));
    });

    let sink_sig = SubSig {
        name: "sink".into(),
        params: vec![Ty::Class(x)],
        ret: Ty::Void,
    };
    let sink = b.declare_method(s, sink_sig.clone(), true);
    b.method_body(sink, |body| body.ret(None));

    let id_sig = SubSig {
        name: "id".into(),
        params: vec![Ty::Class(x)],
        ret: Ty::Class(x),
    };
    let id = b.declare_method(s, id_sig.clone(), true);
    b.method_body(id, |body| {
        let v = body.var("x", Ty::Class(x));
        body.new_obj(v, Ty::Class(x));
        body.ret(Some(v));
    });

    let _ = (src, sink, id);
    (s, src_sig, sink_sig, id_sig)
}

fn run_taint(program: &Program, entry: MethodIdx, config_toml: &str) -> Vec<TaintFlow> {
    let hierarchy = ClassHierarchy::build(program);
    let (taint_config, warnings) = TaintConfig::parse(config_toml, program).expect("valid config");
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    let selector = KCallSite { k: 2 };
    let solution = solve_cs(
        program,
        &hierarchy,
        entry,
        &selector,
        Some(TaintAnalysis::new(taint_config)),
    );
    solution
        .taint_flows
        .expect("taint was attached")
        .into_iter()
        .collect()
}

const SOURCE_SINK_CONFIG: &str = r#"
[[sources]]
method = "S.src"

[[sinks]]
method = "S.sink"
index = 0
"#;

// ── Direct source-to-sink ────────────────────────────────────────────────────

#[test]
fn direct_flow_is_reported_once() {
    let mut b = ProgramBuilder::new();
    let (s, src_sig, sink_sig, _) = library(&mut b);
    let x_class = 0; // first class added by library()
    let main_class = b.add_class("Main", None);
    let main = b.declare_method(
        main_class,
        SubSig {
            name: "main".into(),
            params: vec![],
            ret: Ty::Void,
        },
        true,
    );
    b.method_body(main, |body| {
        let v = body.var("v", Ty::Class(x_class));
        body.invoke(CallKind::Static, Some(v), None, s, src_sig, vec![]); // start+0
        body.invoke(CallKind::Static, None, None, s, sink_sig, vec![v]); // start+1
        body.ret(None);
    });
    b.set_entry(main);
    let program = b.finish();
    let start = program.method(main).stmt_start;

    let flows = run_taint(&program, main, SOURCE_SINK_CONFIG);
    assert_eq!(
        flows,
        vec![TaintFlow {
            source_call: start,
            sink_call: start + 1,
            index: 0,
        }]
    );
}

// ── Flow interrupted without a transfer ──────────────────────────────────────

#[test]
fn opaque_callee_blocks_the_flow() {
    let mut b = ProgramBuilder::new();
    let (s, src_sig, sink_sig, id_sig) = library(&mut b);
    let x_class = 0;
    let main_class = b.add_class("Main", None);
    let main = b.declare_method(
        main_class,
        SubSig {
            name: "main".into(),
            params: vec![],
            ret: Ty::Void,
        },
        true,
    );
    b.method_body(main, |body| {
        let v = body.var("v", Ty::Class(x_class));
        let w = body.var("w", Ty::Class(x_class));
        body.invoke(CallKind::Static, Some(v), None, s, src_sig, vec![]);
        body.invoke(CallKind::Static, Some(w), None, s, id_sig, vec![v]);
        body.invoke(CallKind::Static, None, None, s, sink_sig, vec![w]);
        body.ret(None);
    });
    b.set_entry(main);
    let program = b.finish();

    // S.id returns a fresh object, so without a transfer the taint stops
    let flows = run_taint(&program, main, SOURCE_SINK_CONFIG);
    assert!(flows.is_empty(), "no transfer registered, got {flows:?}");
}

// ── Arg-to-result transfer ───────────────────────────────────────────────────

const TRANSFER_CONFIG: &str = r#"
[[sources]]
method = "S.src"

[[sinks]]
method = "S.sink"
index = 0

[[transfers]]
method = "S.id"
from = "0"
to = "result"
"#;

#[test]
fn transfer_carries_taint_through_the_callee() {
    let mut b = ProgramBuilder::new();
    let (s, src_sig, sink_sig, id_sig) = library(&mut b);
    let x_class = 0;
    let main_class = b.add_class("Main", None);
    let main = b.declare_method(
        main_class,
        SubSig {
            name: "main".into(),
            params: vec![],
            ret: Ty::Void,
        },
        true,
    );
    b.method_body(main, |body| {
        let v = body.var("v", Ty::Class(x_class));
        let w = body.var("w", Ty::Class(x_class));
        body.invoke(CallKind::Static, Some(v), None, s, src_sig, vec![]); // start+0
        body.invoke(CallKind::Static, Some(w), None, s, id_sig, vec![v]); // start+1
        body.invoke(CallKind::Static, None, None, s, sink_sig, vec![w]); // start+2
        body.ret(None);
    });
    b.set_entry(main);
    let program = b.finish();
    let start = program.method(main).stmt_start;

    let flows = run_taint(&program, main, TRANSFER_CONFIG);
    assert_eq!(
        flows,
        vec![TaintFlow {
            source_call: start,
            sink_call: start + 2,
            index: 0,
        }]
    );
}

// ── Determinism ──────────────────────────────────────────────────────────────

#[test]
fn flow_sets_are_deterministic() {
    let build = || {
        let mut b = ProgramBuilder::new();
        let (s, src_sig, sink_sig, _) = library(&mut b);
        let x_class = 0;
        let main_class = b.add_class("Main", None);
        let main = b.declare_method(
            main_class,
            SubSig {
                name: "main".into(),
                params: vec![],
                ret: Ty::Void,
            },
            true,
        );
        b.method_body(main, |body| {
            let v = body.var("v", Ty::Class(x_class));
            let w = body.var("w", Ty::Class(x_class));
            body.invoke(CallKind::Static, Some(v), None, s, src_sig.clone(), vec![]);
            body.invoke(CallKind::Static, Some(w), None, s, src_sig, vec![]);
            body.invoke(CallKind::Static, None, None, s, sink_sig.clone(), vec![v]);
            body.invoke(CallKind::Static, None, None, s, sink_sig, vec![w]);
            body.ret(None);
        });
        b.set_entry(main);
        (b.finish(), main)
    };

    let (p1, m1) = build();
    let (p2, m2) = build();
    let flows1 = run_taint(&p1, m1, SOURCE_SINK_CONFIG);
    let flows2 = run_taint(&p2, m2, SOURCE_SINK_CONFIG);
    assert_eq!(flows1, flows2);
    assert_eq!(flows1.len(), 2);
}

// ── Config validation ────────────────────────────────────────────────────────

#[test]
fn unknown_methods_warn_but_do_not_fail() {
    let mut b = ProgramBuilder::new();
    let _ = library(&mut b);
    let program = b.finish();

    let config = r#"
[[sources]]
method = "Nowhere.nothing"
"#;
    let (_, warnings) = TaintConfig::parse(config, &program).expect("parses");
    assert_eq!(warnings.len(), 1);
}

#[test]
fn malformed_config_fails_fast() {
    let mut b = ProgramBuilder::new();
    let _ = library(&mut b);
    let program = b.finish();

    assert!(TaintConfig::parse("sources = 3", &program).is_err());
    let bad_endpoint = r#"
[[transfers]]
method = "S.id"
from = "sideways"
to = "result"
"#;
    assert!(TaintConfig::parse(bad_endpoint, &program).is_err());
}
