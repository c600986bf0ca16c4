use std::fmt::Write;

use serde_json::{json, Value};

use crate::engine::MetricsResult;

/// Bumped whenever the rendered Markdown could change for the same input.
pub const REPORT_RENDERER_VERSION: &str = "1";

/// Generation inputs identifying a rendered report, used as cache key material.
pub fn report_inputs(result: &MetricsResult) -> Value {
    json!({
        "renderer": "markdown",
        "version": REPORT_RENDERER_VERSION,
        "metrics": result,
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Renders a deterministic Markdown robustness report.
pub fn render_markdown(result: &MetricsResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Robustness report\n");
    let _ = writeln!(
        out,
        "Baseline: `{}` (answer: `{}`)\n",
        result.baseline.run_dir, result.baseline.answer
    );
    let _ = writeln!(
        out,
        "Runs: {} | ESI: {:.8} | Drift: {:.8}\n",
        result.overall.runs, result.overall.esi, result.overall.drift
    );

    for axis in &result.surface {
        let _ = writeln!(out, "## {}\n", axis.axis);
        let _ = writeln!(out, "| value | runs | ESI | drift |");
        let _ = writeln!(out, "|---|---|---|---|");
        for cell in &axis.cells {
            let _ = writeln!(
                out,
                "| {} | {} | {:.8} | {:.8} |",
                display_value(&cell.value),
                cell.runs,
                cell.esi,
                cell.drift
            );
        }
        out.push('\n');
    }

    for pair in &result.pairwise {
        let _ = writeln!(out, "## {} x {}\n", pair.first_axis, pair.second_axis);
        let _ = writeln!(
            out,
            "| {} | {} | runs | ESI | drift |",
            pair.first_axis, pair.second_axis
        );
        let _ = writeln!(out, "|---|---|---|---|---|");
        for cell in &pair.cells {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {:.8} | {:.8} |",
                display_value(&cell.first),
                display_value(&cell.second),
                cell.runs,
                cell.esi,
                cell.drift
            );
        }
        out.push('\n');
    }

    let _ = writeln!(out, "## Runs\n");
    let _ = writeln!(out, "| # | run | answer | ESI | drift | trace steps |");
    let _ = writeln!(out, "|---|---|---|---|---|---|");
    for run in &result.per_run {
        let steps = run
            .trace_steps
            .map_or_else(|| "-".to_string(), |steps| steps.to_string());
        let _ = writeln!(
            out,
            "| {} | `{}` | {} | {:.8} | {:.8} | {} |",
            run.index,
            run.run_dir,
            run.answer.replace('|', "\\|"),
            run.esi,
            run.drift,
            steps
        );
    }
    out
}
