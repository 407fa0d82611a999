use std::io::{self, Write};

use crate::AnalysisResult;

/// Terminal rendering of an analysis result.
pub fn print_report(out: &mut impl Write, result: &AnalysisResult) -> io::Result<()> {
    writeln!(out, "Analyzed: {}", result.sources.join(", "))?;

    if let Some(cg) = &result.call_graph {
        writeln!(out)?;
        writeln!(
            out,
            "Call graph: {} reachable methods, {} edges",
            cg.reachable_methods.len(),
            cg.edges.len()
        )?;
        for edge in &cg.edges {
            writeln!(
                out,
                "  {} @{} --[{}]--> {}",
                edge.caller, edge.site, edge.kind, edge.callee
            )?;
        }
    }

    for pta in &result.points_to {
        writeln!(out)?;
        writeln!(
            out,
            "Points-to ({}): {} reachable methods, {} call edges",
            pta.variant, pta.reachable_methods, pta.call_edges
        )?;
        for var in &pta.vars {
            writeln!(out, "  {} -> {} object(s)", var.var, var.objects)?;
        }
    }

    if let Some(constants) = &result.constants {
        writeln!(out)?;
        writeln!(
            out,
            "Constants ({}): {} constant definition(s)",
            constants.variant,
            constants.constants.len()
        )?;
        for c in &constants.constants {
            writeln!(out, "  {} @{}: {} = {}", c.method, c.stmt, c.var, c.value)?;
        }
    }

    if let Some(dead) = &result.dead_code {
        writeln!(out)?;
        if dead.statements.is_empty() {
            writeln!(out, "Dead code: none")?;
        } else {
            writeln!(out, "Dead code: {} statement(s)", dead.statements.len())?;
            for stmt in &dead.statements {
                writeln!(
                    out,
                    "  {} @{} [{}]",
                    stmt.method, stmt.stmt, stmt.fingerprint
                )?;
            }
        }
    }

    if let Some(taint) = &result.taint {
        writeln!(out)?;
        if taint.flows.is_empty() {
            writeln!(out, "Taint flows: none")?;
        } else {
            writeln!(out, "Taint flows: {}", taint.flows.len())?;
            for flow in &taint.flows {
                writeln!(
                    out,
                    "  {} ==> {} (arg {}) [{}]",
                    flow.source, flow.sink, flow.index, flow.fingerprint
                )?;
            }
        }
    }

    if !result.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings:")?;
        for warning in &result.warnings {
            writeln!(out, "  {}", warning.message)?;
        }
    }

    Ok(())
}
