use serde::{Deserialize, Serialize};

use crate::error::AnalyzerWarning;
use crate::AnalysisResult;

/// Versioned JSON report schema. Bumped on any breaking change.
pub const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub schema_version: String,
    pub analyzer_version: String,
    pub sources: Vec<String>,
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_graph: Option<CallGraphReport>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub points_to: Vec<PointsToReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constants: Option<ConstantsReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_code: Option<DeadCodeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taint: Option<TaintReport>,
    pub warnings: Vec<JsonWarning>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Summary {
    pub reachable_methods: usize,
    pub call_edges: usize,
    pub dead_statements: usize,
    pub taint_flows: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonWarning {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphReport {
    pub reachable_methods: Vec<String>,
    pub edges: Vec<CallEdgeReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEdgeReport {
    pub caller: String,
    pub site: usize,
    pub kind: String,
    pub callee: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsToReport {
    /// "ci", "1-call", "2-obj", …
    pub variant: String,
    pub reachable_methods: usize,
    pub call_edges: usize,
    pub vars: Vec<VarPtsReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarPtsReport {
    pub var: String,
    pub objects: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantsReport {
    /// "intra" or "inter (<pta variant>)".
    pub variant: String,
    pub constants: Vec<ConstantReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantReport {
    pub method: String,
    pub stmt: usize,
    pub var: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadCodeReport {
    pub statements: Vec<DeadStmtReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadStmtReport {
    pub method: String,
    pub stmt: usize,
    /// Stable identity for suppression and cross-run comparison.
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintReport {
    pub flows: Vec<TaintFlowReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintFlowReport {
    pub source: String,
    pub sink: String,
    pub index: usize,
    pub fingerprint: String,
}

/// Short stable fingerprint over a finding's identifying parts.
pub fn fingerprint(parts: &[&str]) -> String {
    use sha2::{Digest, Sha256};
    let input = parts.join(":");
    let hash = Sha256::digest(input.as_bytes());
    hex::encode(&hash[..8])
}

impl JsonReport {
    pub fn build(result: &AnalysisResult) -> Self {
        let summary = Summary {
            reachable_methods: result
                .call_graph
                .as_ref()
                .map(|cg| cg.reachable_methods.len())
                .unwrap_or(0),
            call_edges: result
                .call_graph
                .as_ref()
                .map(|cg| cg.edges.len())
                .unwrap_or(0),
            dead_statements: result
                .dead_code
                .as_ref()
                .map(|d| d.statements.len())
                .unwrap_or(0),
            taint_flows: result.taint.as_ref().map(|t| t.flows.len()).unwrap_or(0),
        };
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            analyzer_version: env!("CARGO_PKG_VERSION").to_string(),
            sources: result.sources.clone(),
            summary,
            call_graph: result.call_graph.clone(),
            points_to: result.points_to.clone(),
            constants: result.constants.clone(),
            dead_code: result.dead_code.clone(),
            taint: result.taint.clone(),
            warnings: result.warnings.iter().map(JsonWarning::from).collect(),
        }
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&AnalyzerWarning> for JsonWarning {
    fn from(w: &AnalyzerWarning) -> Self {
        Self {
            kind: format!("{:?}", w.kind),
            message: w.message.clone(),
        }
    }
}
