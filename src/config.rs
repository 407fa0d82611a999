use std::collections::BTreeMap;

use crate::error::AnalyzerError;

/// The analysis passes the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassId {
    /// Class-hierarchy call-graph construction.
    Cha,
    /// Context-insensitive points-to analysis.
    PtaCi,
    /// Context-sensitive points-to analysis (selector from the `cs` option).
    PtaCs,
    /// Intra-procedural constant propagation.
    ConstProp,
    /// Inter-procedural constant propagation (consumes the points-to result
    /// named by the `pta` option).
    InterConstProp,
    /// Dead-code detection.
    DeadCode,
    /// Taint analysis on the context-sensitive solver (requires the
    /// `taint-config` option).
    Taint,
}

impl PassId {
    pub const ALL: [PassId; 7] = [
        PassId::Cha,
        PassId::PtaCi,
        PassId::PtaCs,
        PassId::ConstProp,
        PassId::InterConstProp,
        PassId::DeadCode,
        PassId::Taint,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            PassId::Cha => "cha",
            PassId::PtaCi => "pta-ci",
            PassId::PtaCs => "pta-cs",
            PassId::ConstProp => "constprop",
            PassId::InterConstProp => "inter-constprop",
            PassId::DeadCode => "deadcode",
            PassId::Taint => "taint",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            PassId::Cha => "call graph via class-hierarchy analysis",
            PassId::PtaCi => "context-insensitive Andersen points-to analysis",
            PassId::PtaCs => "context-sensitive points-to analysis",
            PassId::ConstProp => "intra-procedural constant propagation",
            PassId::InterConstProp => "inter-procedural constant propagation",
            PassId::DeadCode => "unreachable and dead-assignment detection",
            PassId::Taint => "taint flows from sources to sinks",
        }
    }

    /// Unknown pass ids are precondition violations, reported before any
    /// analysis starts.
    pub fn parse(s: &str) -> Result<PassId, AnalyzerError> {
        PassId::ALL
            .into_iter()
            .find(|p| p.id() == s)
            .ok_or_else(|| AnalyzerError::UnknownPass { id: s.to_string() })
    }
}

/// Which passes run, plus their string options (`pta`, `cs`, `taint-config`).
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub passes: Vec<PassId>,
    options: BTreeMap<String, String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            // taint is opt-in: it needs a source/sink configuration
            passes: vec![
                PassId::Cha,
                PassId::PtaCi,
                PassId::PtaCs,
                PassId::ConstProp,
                PassId::InterConstProp,
                PassId::DeadCode,
            ],
            options: BTreeMap::new(),
        }
    }
}

impl AnalyzerConfig {
    pub fn with_passes(passes: Vec<PassId>) -> Self {
        Self {
            passes,
            options: BTreeMap::new(),
        }
    }

    pub fn parse_pass_list(list: &str) -> Result<Vec<PassId>, AnalyzerError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PassId::parse)
            .collect()
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn set_option(&mut self, key: &str, value: &str) {
        self.options.insert(key.to_string(), value.to_string());
    }

    pub fn wants(&self, pass: PassId) -> bool {
        self.passes.contains(&pass)
    }

    /// The points-to variant feeding inter-procedural constant propagation.
    pub fn pta_variant(&self) -> &str {
        self.option("pta").unwrap_or("ci")
    }

    /// The context selector of the context-sensitive passes.
    pub fn cs_variant(&self) -> &str {
        self.option("cs").unwrap_or("2-call")
    }
}
