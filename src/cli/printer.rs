//! Console rendering of events
//!
//! Plugged into the scheduler as an observer, so each event is printed the
//! moment it is appended to the history.

use serde_json::Value;

use crate::agent::{RunReport, TerminationReason};
use crate::core::{Event, Part};

/// Render an event as one line per part
pub fn render(event: &Event) -> Vec<String> {
    event
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::Text { content } => {
                let content = content.trim();
                if content.is_empty() {
                    None
                } else {
                    Some(format!("[{}] {}", event.author, content))
                }
            }
            Part::ToolCall {
                tool_name,
                arguments,
            } => Some(format!(
                "[{}]Function call: ({}, {})",
                event.author, tool_name, arguments
            )),
            Part::ToolResult { tool_name, payload } => Some(format!(
                "[{}]Function response: ({}, {})",
                event.author,
                tool_name,
                compact(payload)
            )),
        })
        .collect()
}

/// Print an event to stdout
pub fn print_event(event: &Event) {
    for line in render(event) {
        println!("{}", line);
    }
}

/// One-line summary of a finished run
pub fn summary(report: &RunReport) -> String {
    match report.reason {
        TerminationReason::TaskComplete => format!(
            "Task complete after {} turn(s), {} event(s).",
            report.turns,
            report.session.len()
        ),
        TerminationReason::BudgetExhausted => format!(
            "Stopped: iteration budget of {} turn(s) exhausted, {} event(s).",
            report.turns,
            report.session.len()
        ),
    }
}

fn compact(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
