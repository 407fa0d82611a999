pub mod config;
pub mod dataflow;
pub mod error;
pub mod graph;
pub mod ir;
pub mod loader;
pub mod output;
pub mod pta;
pub mod taint;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::{AnalyzerConfig, PassId};
use crate::dataflow::constprop::ConstantPropagation;
use crate::dataflow::deadcode::find_dead_code;
use crate::dataflow::inter::{solve_inter, InterResult};
use crate::dataflow::solver::solve;
use crate::error::{AnalyzerError, AnalyzerWarning};
use crate::graph::callgraph::{build_cha, CallGraph};
use crate::graph::cfg::{Cfg, CfgNode};
use crate::graph::icfg::build_icfg;
use crate::ir::hierarchy::ClassHierarchy;
use crate::ir::program::Program;
use crate::ir::stmt::{MethodIdx, StmtIdx};
use crate::output::report::{
    CallEdgeReport, CallGraphReport, ConstantReport, ConstantsReport, DeadCodeReport,
    DeadStmtReport, PointsToReport, TaintFlowReport, TaintReport, VarPtsReport,
};
use crate::output::JsonReport;
use crate::pta::context::selector_for;
use crate::pta::cs::solve_cs;
use crate::pta::result::PointerAnalysisResult;
use crate::pta::solve_ci;
use crate::taint::{TaintAnalysis, TaintConfig};

/// Output format for analysis results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Result of analysing one program: per-pass report sections plus warnings.
#[derive(Debug, Default)]
pub struct AnalysisResult {
    pub sources: Vec<String>,
    pub warnings: Vec<AnalyzerWarning>,
    pub call_graph: Option<CallGraphReport>,
    pub points_to: Vec<PointsToReport>,
    pub constants: Option<ConstantsReport>,
    pub dead_code: Option<DeadCodeReport>,
    pub taint: Option<TaintReport>,
}

/// Load a program document and run the configured passes over it.
pub fn analyze_path(
    path: &Path,
    config: &AnalyzerConfig,
) -> Result<AnalysisResult, AnalyzerError> {
    let program = loader::load_program(path)?;
    let mut result = analyze(&program, config)?;
    result.sources = vec![path.display().to_string()];
    Ok(result)
}

/// Run the configured passes over an in-memory program.
pub fn analyze(program: &Program, config: &AnalyzerConfig) -> Result<AnalysisResult, AnalyzerError> {
    let hierarchy = ClassHierarchy::build(program);
    let mut result = AnalysisResult {
        sources: vec!["<program>".to_string()],
        ..Default::default()
    };

    let needs_entry = [
        PassId::Cha,
        PassId::PtaCi,
        PassId::PtaCs,
        PassId::InterConstProp,
        PassId::Taint,
    ]
    .iter()
    .any(|&p| config.wants(p));
    let entry = match (needs_entry, program.entry) {
        (true, Some(entry)) => Some(entry),
        (true, None) => return Err(AnalyzerError::MissingEntry),
        (false, _) => None,
    };

    if config.wants(PassId::Cha) {
        let entry = entry.expect("entry checked above");
        let cg = build_cha(program, &hierarchy, entry);
        info!(
            "cha: {} reachable methods, {} edges",
            cg.num_reachable(),
            cg.edges().len()
        );
        result.call_graph = Some(call_graph_report(program, &cg));
    }

    // completed points-to results, keyed by variant name, reused by the
    // inter-procedural pass
    let mut pta_cache: BTreeMap<String, PointerAnalysisResult> = BTreeMap::new();

    if config.wants(PassId::PtaCi) {
        let entry = entry.expect("entry checked above");
        let solution = solve_ci(program, &hierarchy, entry).into_result();
        result
            .points_to
            .push(points_to_report(program, "ci", &solution));
        pta_cache.insert("ci".to_string(), solution);
    }

    // the CS run is shared between the pta-cs and taint passes
    if config.wants(PassId::PtaCs) || config.wants(PassId::Taint) {
        let entry = entry.expect("entry checked above");
        let variant = config.cs_variant().to_string();
        let selector = selector_for(&variant).ok_or_else(|| {
            AnalyzerError::Config(format!("unknown context selector '{variant}'"))
        })?;

        let taint = if config.wants(PassId::Taint) {
            let path = config.option("taint-config").ok_or_else(|| {
                AnalyzerError::Config("taint pass requires the 'taint-config' option".to_string())
            })?;
            let (taint_config, warnings) = TaintConfig::load(Path::new(path), program)?;
            result.warnings.extend(warnings);
            Some(TaintAnalysis::new(taint_config))
        } else {
            None
        };

        let solution = solve_cs(program, &hierarchy, entry, selector.as_ref(), taint);
        if let Some(flows) = &solution.taint_flows {
            result.taint = Some(taint_report(program, flows.iter()));
        }
        let collapsed = solution.collapse();
        if config.wants(PassId::PtaCs) {
            result
                .points_to
                .push(points_to_report(program, &variant, &collapsed));
        }
        pta_cache.insert(variant, collapsed);
    }

    if config.wants(PassId::InterConstProp) {
        let entry = entry.expect("entry checked above");
        let variant = config.pta_variant().to_string();
        if !pta_cache.contains_key(&variant) {
            let solution = if variant == "ci" {
                solve_ci(program, &hierarchy, entry).into_result()
            } else {
                let selector = selector_for(&variant).ok_or_else(|| {
                    AnalyzerError::Config(format!("unknown points-to variant '{variant}'"))
                })?;
                solve_cs(program, &hierarchy, entry, selector.as_ref(), None).collapse()
            };
            pta_cache.insert(variant.clone(), solution);
        }
        let pta = &pta_cache[&variant];
        let icfg = build_icfg(program, &pta.call_graph);
        let inter = solve_inter(program, &icfg, pta);
        result.constants = Some(inter_constants_report(program, &inter, &variant));
    } else if config.wants(PassId::ConstProp) {
        result.constants = Some(intra_constants_report(program));
    }

    if config.wants(PassId::DeadCode) {
        result.dead_code = Some(dead_code_report(program));
    }

    Ok(result)
}

/// Render analysis results in the requested format.
pub fn render_output(
    result: &AnalysisResult,
    format: OutputFormat,
) -> Result<String, AnalyzerError> {
    match format {
        OutputFormat::Human => {
            let mut buf = Vec::new();
            output::human::print_report(&mut buf, result).map_err(|e| AnalyzerError::Io {
                path: PathBuf::from("<stdout>"),
                source: e,
            })?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
        OutputFormat::Json => JsonReport::build(result)
            .to_json_string()
            .map_err(|e| AnalyzerError::Config(format!("JSON serialisation failed: {e}"))),
    }
}

// ── Report builders ─────────────────────────────────────────────────────────

fn call_graph_report(program: &Program, cg: &CallGraph<StmtIdx, MethodIdx>) -> CallGraphReport {
    let mut reachable: Vec<String> = cg
        .reachable_methods()
        .iter()
        .map(|&m| program.method_name(m))
        .collect();
    reachable.sort();

    let mut edges: Vec<CallEdgeReport> = cg
        .edges()
        .iter()
        .map(|e| CallEdgeReport {
            caller: program.method_name(program.containing_method_of(e.call_site)),
            site: e.call_site,
            kind: e.kind.to_string(),
            callee: program.method_name(e.callee),
        })
        .collect();
    edges.sort_by(|a, b| {
        (&a.caller, a.site, &a.callee)
            .cmp(&(&b.caller, b.site, &b.callee))
    });
    CallGraphReport {
        reachable_methods: reachable,
        edges,
    }
}

fn points_to_report(
    program: &Program,
    variant: &str,
    pta: &PointerAnalysisResult,
) -> PointsToReport {
    let vars = pta
        .vars()
        .into_iter()
        .map(|v| VarPtsReport {
            var: format!(
                "{}/{}",
                program.method_name(program.var(v).method),
                program.var(v).name
            ),
            objects: pta.pts_of(v).len(),
        })
        .collect();
    PointsToReport {
        variant: variant.to_string(),
        reachable_methods: pta.call_graph.num_reachable(),
        call_edges: pta.call_graph.edges().len(),
        vars,
    }
}

fn intra_constants_report(program: &Program) -> ConstantsReport {
    let mut constants = Vec::new();
    for m in 0..program.methods.len() {
        if !program.method(m).has_body() {
            continue;
        }
        let cfg = Cfg::build(program, m);
        let facts = solve(&ConstantPropagation::new(program), &cfg);
        for n in 0..cfg.num_nodes() {
            let CfgNode::Stmt(s) = cfg.node(n) else {
                continue;
            };
            push_constant(program, s, facts.out_fact(n), &mut constants);
        }
    }
    constants.sort_by(|a, b| (&a.method, a.stmt).cmp(&(&b.method, b.stmt)));
    ConstantsReport {
        variant: "intra".to_string(),
        constants,
    }
}

fn inter_constants_report(
    program: &Program,
    inter: &InterResult,
    pta_variant: &str,
) -> ConstantsReport {
    let mut constants = Vec::new();
    for s in 0..program.stmts.len() {
        if let Some(out) = inter.out_fact(s) {
            push_constant(program, s, out, &mut constants);
        }
    }
    constants.sort_by(|a, b| (&a.method, a.stmt).cmp(&(&b.method, b.stmt)));
    ConstantsReport {
        variant: format!("inter ({pta_variant})"),
        constants,
    }
}

fn push_constant(
    program: &Program,
    s: StmtIdx,
    out: &crate::dataflow::fact::CpFact,
    constants: &mut Vec<ConstantReport>,
) {
    let Some(def) = program.stmt(s).def() else {
        return;
    };
    if !program.can_hold_int(def) {
        return;
    }
    if let Some(value) = out.get(def).constant() {
        constants.push(ConstantReport {
            method: program.method_name(program.containing_method_of(s)),
            stmt: s,
            var: program.var(def).name.clone(),
            value: value.to_string(),
        });
    }
}

fn dead_code_report(program: &Program) -> DeadCodeReport {
    let mut statements = Vec::new();
    for m in 0..program.methods.len() {
        if !program.method(m).has_body() {
            continue;
        }
        let method_name = program.method_name(m);
        for s in find_dead_code(program, m) {
            statements.push(DeadStmtReport {
                fingerprint: output::report::fingerprint(&[
                    "deadcode",
                    &method_name,
                    &s.to_string(),
                ]),
                method: method_name.clone(),
                stmt: s,
            });
        }
    }
    statements.sort_by(|a, b| (&a.method, a.stmt).cmp(&(&b.method, b.stmt)));
    DeadCodeReport { statements }
}

fn taint_report<'a>(
    program: &Program,
    flows: impl Iterator<Item = &'a crate::taint::TaintFlow>,
) -> TaintReport {
    let flows = flows
        .map(|flow| {
            let source = format!(
                "{} @{}",
                program.method_name(program.containing_method_of(flow.source_call)),
                flow.source_call
            );
            let sink = format!(
                "{} @{}",
                program.method_name(program.containing_method_of(flow.sink_call)),
                flow.sink_call
            );
            TaintFlowReport {
                fingerprint: output::report::fingerprint(&[
                    "taint",
                    &source,
                    &sink,
                    &flow.index.to_string(),
                ]),
                source,
                sink,
                index: flow.index,
            }
        })
        .collect();
    TaintReport { flows }
}
