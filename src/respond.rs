// src/respond.rs
// Chat-style rendering of a run report (Telegram-flavoured Markdown).

use crate::catalog::SourceId;
use crate::pipeline::RunReport;

/// Telegram's hard message limit.
pub const MAX_MESSAGE_CHARS: usize = 4096;

pub fn render_chat(report: &RunReport) -> String {
    let label = report
        .source_used
        .as_ref()
        .or(report.trail.last())
        .map(|s| s.as_str().to_uppercase())
        .unwrap_or_else(|| "SEARCH".to_string());

    let model_tag = report
        .model_used
        .as_deref()
        .map(|m| format!(" `[{m}]`"))
        .unwrap_or_default();
    let mut out = format!("🔍 *{label}* — {}{model_tag}\n", report.search_query);

    // Exhausted runs already list every source in the narrative.
    if let (Some(_), Some((last, earlier))) = (&report.source_used, report.trail.split_last()) {
        if !earlier.is_empty() {
            let earlier: Vec<&str> = earlier.iter().map(SourceId::as_str).collect();
            out.push_str(&format!("_Tried {} first, used {last}._\n", earlier.join(", ")));
        }
    }
    out.push('\n');
    out.push_str(&report.text);

    truncate_message(out)
}

fn truncate_message(s: String) -> String {
    if s.chars().count() <= MAX_MESSAGE_CHARS {
        return s;
    }
    let mut cut: String = s.chars().take(MAX_MESSAGE_CHARS - 6).collect();
    cut.push_str("\n...");
    cut
}
