use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::{AnalyzerError, AnalyzerWarning};
use crate::ir::program::Program;
use crate::ir::stmt::{MethodIdx, Stmt, StmtIdx};
use crate::pta::context::CtxId;
use crate::pta::cs::{CsCallSiteId, CsCore};
use crate::pta::pfg::PointerId;
use crate::pta::pts::PointsToSet;

/// One reported taint flow: a source call site whose tainted result reaches
/// the given argument of a sink call site. `Ord` gives the deterministic
/// (source, sink, index) report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaintFlow {
    pub source_call: StmtIdx,
    pub sink_call: StmtIdx,
    pub index: usize,
}

/// Endpoint of a taint transfer through a method call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaintEndpoint {
    /// The receiver object.
    Base,
    /// The call result.
    Result,
    /// The i-th argument.
    Arg(usize),
}

// ── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawTaintConfig {
    #[serde(default)]
    sources: Vec<RawSource>,
    #[serde(default)]
    sinks: Vec<RawSink>,
    #[serde(default)]
    transfers: Vec<RawTransfer>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    /// Qualified `Class.method`.
    method: String,
}

#[derive(Debug, Deserialize)]
struct RawSink {
    method: String,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct RawTransfer {
    method: String,
    /// "base", "result", or an argument index.
    from: String,
    to: String,
}

/// Sources, sinks and transfers with method references resolved against the
/// program. Entries naming unknown methods are dropped with a warning;
/// a document that does not parse is a fail-fast error.
#[derive(Debug, Default)]
pub struct TaintConfig {
    sources: HashSet<MethodIdx>,
    sinks: Vec<(MethodIdx, usize)>,
    transfers: Vec<(MethodIdx, TaintEndpoint, TaintEndpoint)>,
}

impl TaintConfig {
    pub fn load(
        path: &Path,
        program: &Program,
    ) -> Result<(Self, Vec<AnalyzerWarning>), AnalyzerError> {
        let content = std::fs::read_to_string(path).map_err(|e| AnalyzerError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, program)
    }

    pub fn parse(
        content: &str,
        program: &Program,
    ) -> Result<(Self, Vec<AnalyzerWarning>), AnalyzerError> {
        let raw: RawTaintConfig = toml::from_str(content)
            .map_err(|e| AnalyzerError::Config(format!("invalid taint config: {e}")))?;

        let mut config = TaintConfig::default();
        let mut warnings = Vec::new();
        let mut resolve = |name: &str, warnings: &mut Vec<AnalyzerWarning>| {
            let m = program.lookup_method(name);
            if m.is_none() {
                warnings.push(AnalyzerWarning::unmatched_config_method(name));
            }
            m
        };

        for source in &raw.sources {
            if let Some(m) = resolve(&source.method, &mut warnings) {
                config.sources.insert(m);
            }
        }
        for sink in &raw.sinks {
            if let Some(m) = resolve(&sink.method, &mut warnings) {
                config.sinks.push((m, sink.index));
            }
        }
        for transfer in &raw.transfers {
            let from = parse_endpoint(&transfer.from)?;
            let to = parse_endpoint(&transfer.to)?;
            if let Some(m) = resolve(&transfer.method, &mut warnings) {
                config.transfers.push((m, from, to));
            }
        }
        info!(
            "taint config: {} sources, {} sinks, {} transfers",
            config.sources.len(),
            config.sinks.len(),
            config.transfers.len()
        );
        Ok((config, warnings))
    }
}

fn parse_endpoint(s: &str) -> Result<TaintEndpoint, AnalyzerError> {
    match s {
        "base" => Ok(TaintEndpoint::Base),
        "result" => Ok(TaintEndpoint::Result),
        other => other
            .parse::<usize>()
            .map(TaintEndpoint::Arg)
            .map_err(|_| {
                AnalyzerError::Config(format!(
                    "invalid taint endpoint '{other}' (expected base, result, or an index)"
                ))
            }),
    }
}

// ── Analysis ────────────────────────────────────────────────────────────────

/// Observer on the context-sensitive points-to solver.
///
/// Taint objects are pseudo-heap-objects that ride the ordinary points-to
/// lattice; taint *edges* form a side graph that carries only the taint
/// subset of each delta, so ordinary objects never cross a transfer.
pub struct TaintAnalysis {
    config: TaintConfig,
    /// Registered taint edges; insertion is idempotent.
    transfer_edges: HashMap<PointerId, Vec<PointerId>>,
    edge_set: HashSet<(PointerId, PointerId)>,
    /// Sink argument indices recorded per reachable contextualized call.
    reachable_sinks: BTreeMap<CsCallSiteId, BTreeSet<usize>>,
}

impl TaintAnalysis {
    pub fn new(config: TaintConfig) -> Self {
        Self {
            config,
            transfer_edges: HashMap::new(),
            edge_set: HashSet::new(),
            reachable_sinks: BTreeMap::new(),
        }
    }

    /// Register a taint edge; returns false when it already existed.
    fn register_edge(&mut self, from: PointerId, to: PointerId) -> bool {
        if !self.edge_set.insert((from, to)) {
            return false;
        }
        self.transfer_edges.entry(from).or_default().push(to);
        true
    }

    /// Push a (taint-only) delta along every taint edge out of `from`.
    fn forward(&self, core: &mut CsCore, from: PointerId, delta: &PointsToSet) {
        if let Some(succs) = self.transfer_edges.get(&from) {
            for &succ in succs {
                core.enqueue(succ, delta.clone());
            }
        }
    }

    /// Solver hook: a pointer's set grew by `delta`. Re-filter to taint
    /// objects and forward those along registered taint edges.
    pub fn on_propagate(&mut self, core: &mut CsCore, ptr: PointerId, delta: &PointsToSet) {
        let taints: PointsToSet = delta.iter().filter(|&o| core.is_taint(o)).collect();
        if taints.is_empty() {
            return;
        }
        self.forward(core, ptr, &taints);
    }

    /// Solver hook: a call edge to `callee` was resolved at `site` under
    /// `caller_ctx`; `recv` is the receiver pointer for instance calls.
    pub fn process_call(
        &mut self,
        core: &mut CsCore,
        callee: MethodIdx,
        site: StmtIdx,
        caller_ctx: CtxId,
        recv: Option<PointerId>,
    ) {
        let (call, result) = match core.program.stmt(site) {
            Stmt::Invoke { result, call } => (call.clone(), *result),
            _ => return,
        };
        let result_ptr = result.map(|r| core.cs_var_ptr(caller_ctx, r));
        let ret_ty = core.program.method(callee).subsig.ret.clone();

        // sources inject a fresh taint object into the call result
        if self.config.sources.contains(&callee) {
            if let Some(result_ptr) = result_ptr {
                let obj = core.heap.taint_obj(site, ret_ty.clone());
                let empty = core.csm.ctxs.empty();
                let cs_obj = core.csm.cs_obj(empty, obj);
                core.enqueue(result_ptr, PointsToSet::singleton(cs_obj));
            }
        }

        // sinks are only recorded here; flows are collected at the end
        for &(method, index) in &self.config.sinks {
            if method == callee {
                let cs_call = core.csm.cs_call_site(caller_ctx, site);
                self.reachable_sinks.entry(cs_call).or_default().insert(index);
            }
        }

        let transfers: Vec<(TaintEndpoint, TaintEndpoint)> = self
            .config
            .transfers
            .iter()
            .filter(|(m, _, _)| *m == callee)
            .map(|(_, from, to)| (*from, *to))
            .collect();
        for (from, to) in transfers {
            let from_ptr = match from {
                TaintEndpoint::Base => recv,
                TaintEndpoint::Arg(i) => call
                    .args
                    .get(i)
                    .map(|&arg| core.cs_var_ptr(caller_ctx, arg)),
                TaintEndpoint::Result => None, // results are never transfer origins
            };
            let (to_ptr, to_ty) = match to {
                TaintEndpoint::Base => {
                    let ty = call.base.map(|b| core.program.var(b).ty.clone());
                    (recv, ty)
                }
                TaintEndpoint::Result => (result_ptr, Some(ret_ty.clone())),
                TaintEndpoint::Arg(_) => (None, None), // arguments are never targets
            };
            let (Some(from_ptr), Some(to_ptr), Some(to_ty)) = (from_ptr, to_ptr, to_ty) else {
                continue;
            };
            if !self.register_edge(from_ptr, to_ptr) {
                continue;
            }
            // the origin may already hold taints: retype them for the
            // destination and push immediately
            let existing: Vec<StmtIdx> = core
                .pfg
                .pts(from_ptr)
                .iter()
                .filter_map(|cs_obj| {
                    let (_, obj) = core.csm.obj_of(cs_obj);
                    core.heap.source_call_of(obj)
                })
                .collect();
            let mut delta = PointsToSet::new();
            for source_call in existing {
                let obj = core.heap.taint_obj(source_call, to_ty.clone());
                let empty = core.csm.ctxs.empty();
                delta.add(core.csm.cs_obj(empty, obj));
            }
            if !delta.is_empty() {
                self.forward(core, from_ptr, &delta);
            }
        }
    }

    /// Walk all recorded sinks against the final points-to state and emit
    /// the flow set.
    pub fn on_finish(&self, core: &mut CsCore) -> BTreeSet<TaintFlow> {
        let mut flows = BTreeSet::new();
        for (&cs_call, indices) in &self.reachable_sinks {
            let (ctx, site) = core.csm.call_site_of(cs_call);
            let args = match core.program.stmt(site) {
                Stmt::Invoke { call, .. } => call.args.clone(),
                _ => continue,
            };
            for &index in indices {
                let Some(&arg) = args.get(index) else {
                    continue;
                };
                let arg_ptr = core.cs_var_ptr(ctx, arg);
                for cs_obj in core.pfg.pts(arg_ptr).clone().iter() {
                    let (_, obj) = core.csm.obj_of(cs_obj);
                    if let Some(source_call) = core.heap.source_call_of(obj) {
                        flows.insert(TaintFlow {
                            source_call,
                            sink_call: site,
                            index,
                        });
                    }
                }
            }
        }
        flows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_parse() {
        assert_eq!(parse_endpoint("base").unwrap(), TaintEndpoint::Base);
        assert_eq!(parse_endpoint("result").unwrap(), TaintEndpoint::Result);
        assert_eq!(parse_endpoint("2").unwrap(), TaintEndpoint::Arg(2));
        assert!(parse_endpoint("banana").is_err());
    }
}
