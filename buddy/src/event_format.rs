//! Rendering helpers for events and session summaries.

use buddy_core::{PetEvent, StatsSummary, TimedEvent};
use std::io::Write;

/// Human-readable one-liner for an event.
pub fn describe(event: &PetEvent) -> String {
    match event {
        PetEvent::StateChanged { from, to } => format!("state   {} -> {}", from, to),
        PetEvent::ConnectivityChanged { connected: true } => "connected".to_string(),
        PetEvent::ConnectivityChanged { connected: false } => "disconnected".to_string(),
        PetEvent::MoodChanged { mood: Some(mood) } => format!("mood    {}", mood),
        PetEvent::MoodChanged { mood: None } => "mood    (none)".to_string(),
        PetEvent::FlowChanged { flowing: true } => "flow    on".to_string(),
        PetEvent::FlowChanged { flowing: false } => "flow    off".to_string(),
        PetEvent::Eureka => "eureka!".to_string(),
        PetEvent::Flinch => "flinch".to_string(),
    }
}

/// Write a live event as a JSON line, or as a one-liner when `compact`.
pub fn write_event(out: &mut impl Write, event: &PetEvent, compact: bool) -> std::io::Result<()> {
    if compact {
        writeln!(out, "{}", describe(event))?;
    } else {
        writeln!(out, "{}", serde_json::to_string(event)?)?;
    }
    out.flush()
}

/// Write a replayed event, prefixed with its offset when `compact`.
pub fn write_timed_event(
    out: &mut impl Write,
    event: &TimedEvent,
    compact: bool,
) -> std::io::Result<()> {
    if compact {
        writeln!(
            out,
            "+{:>8.3}s  {}",
            event.offset_ms as f64 / 1000.0,
            describe(&event.event)
        )
    } else {
        writeln!(out, "{}", serde_json::to_string(event)?)
    }
}

/// Multi-line session summary for the terminal.
pub fn summary_lines(summary: &StatsSummary) -> Vec<String> {
    let mut lines = vec![
        format!("Session: {}", summary.duration_display()),
        format!("Tool calls: {}", summary.tool_calls),
    ];

    let mut tools: Vec<(&String, &u64)> = summary.tool_breakdown.iter().collect();
    tools.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (name, count) in tools.into_iter().take(3) {
        lines.push(format!("  {:<14} {}", name, count));
    }

    let mut states: Vec<_> = summary
        .state_time_ms
        .iter()
        .filter(|(_, ms)| **ms > 0)
        .collect();
    states.sort_by(|a, b| b.1.cmp(a.1));
    if !states.is_empty() {
        lines.push("Time by state:".to_string());
        for (state, ms) in states {
            lines.push(format!("  {:<14} {:.1}s", state.as_str(), *ms as f64 / 1000.0));
        }
    }

    lines.push(format!(
        "Flow: {:.1}s",
        summary.flow_duration_ms as f64 / 1000.0
    ));
    lines
}
