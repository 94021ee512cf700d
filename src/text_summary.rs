//! Text summary builder for CLI output.
//!
//! Formats the final store state and what the host was asked to do as
//! human-readable lines for text mode.

use crate::host::LoggingHost;
use crate::model::{MODULES, REQUESTS, SOURCES, WORKING_DOCS};
use crate::store::DemoState;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from the final snapshot and the headless host's record.
pub(crate) fn build_text_summary(state: &DemoState, host: &LoggingHost) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!(
        "Steps: {}/{} completed",
        state.completed_count(),
        state.steps.len()
    ));
    for (i, step) in state.steps.iter().enumerate() {
        let mark = if step.completed { "x" } else { " " };
        lines.push(format!("  [{mark}] {:>2}. {}", i + 1, step.headline()));
    }

    let counts: Vec<String> = [REQUESTS, WORKING_DOCS, SOURCES, MODULES]
        .iter()
        .map(|name| format!("{name} {}", state.collection(name).len()))
        .collect();
    lines.push(format!("Records: {}", counts.join(", ")));

    if let Some(status) = state
        .collection(REQUESTS)
        .iter()
        .rev()
        .find_map(|r| r.get("status").and_then(|s| s.as_str()))
    {
        lines.push(format!("Request status: {status}"));
    }

    let navigations = host.navigations();
    if navigations.is_empty() {
        lines.push("Navigations: -".into());
    } else {
        lines.push(format!("Navigations: {}", navigations.join(" -> ")));
    }

    let content = host.content_updates();
    lines.push(format!("Content updates: {}", content.len()));
    if let Some(last) = content.last() {
        lines.push(format!("  {}", preview(last, 72)));
    }

    let modules = host.module_updates();
    if let Some(last) = modules.last() {
        let names: Vec<&str> = last.iter().map(|m| m.name.as_str()).collect();
        lines.push(format!("Modules: {}", names.join(", ")));
    }

    TextSummary { lines }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}
