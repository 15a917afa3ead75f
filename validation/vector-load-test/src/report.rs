//! Results reporting and formatting.

use crate::metrics::{RunSummary, SeriesSummary};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

/// Formats run results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as a console table.
    pub fn format_table(summary: &RunSummary) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Load Run Results: {}", summary.scenario_name)]);

        table.add_row(vec!["Backend:", summary.backend_address.as_str()]);
        table.add_row(vec!["Duration:", &format!("{:.1}s", summary.duration_secs)]);
        table.add_row(vec![
            "Rounds:",
            &format!(
                "{} / {} ({} units each)",
                summary.rounds_completed, summary.total_rounds, summary.units_per_round
            ),
        ]);
        table.add_row(vec![
            "Invocations:",
            &format!("{}", summary.invocations_issued),
        ]);
        table.add_row(vec![
            "Iterations used:",
            &format!("{}", summary.iterations_consumed),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "count / min / mean / max"]);
        for series in [&summary.writes, &summary.queries] {
            table.add_row(vec![
                format!("  {}", series.class),
                Self::format_series(series),
            ]);
        }

        if let Some(reason) = &summary.aborted {
            table.add_row(vec!["", ""]);
            table.add_row(vec!["Aborted:", reason.as_str()]);
        }

        table.to_string()
    }

    fn format_series(series: &SeriesSummary) -> String {
        match (series.min_ms, series.mean_ms, series.max_ms) {
            (Some(min), Some(mean), Some(max)) => {
                format!("{} / {} / {:.1} / {}", series.count, min, mean, max)
            }
            _ => format!("{} / - / - / -", series.count),
        }
    }

    /// Format results as JSON.
    pub fn format_json(summary: &RunSummary) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(summary)?)
    }
}
