//! Session statistics
//!
//! Running totals for one watch session: tool calls, time spent per activity
//! state and time spent in flow. Durations are measured on the same
//! monotonic clock the detectors use.

use crate::types::ActivityState;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Accumulates per-session counters.
#[derive(Debug, Clone)]
pub struct SessionStats {
    started: Instant,
    tool_calls: u64,
    tool_breakdown: HashMap<String, u64>,
    state_time: HashMap<ActivityState, Duration>,
    current_state: ActivityState,
    state_since: Instant,
    flow_time: Duration,
    flow_since: Option<Instant>,
}

/// Point-in-time snapshot of [`SessionStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    /// Time since the session started (milliseconds)
    pub session_duration_ms: u64,
    /// Total tool invocations
    pub tool_calls: u64,
    /// Invocations per tool name
    pub tool_breakdown: BTreeMap<String, u64>,
    /// Time spent per state, including the current one (milliseconds)
    pub state_time_ms: BTreeMap<ActivityState, u64>,
    /// Time spent in flow, including an ongoing flow (milliseconds)
    pub flow_duration_ms: u64,
}

impl StatsSummary {
    /// Format the session duration for display (e.g., "1h 5m").
    pub fn duration_display(&self) -> String {
        let secs = self.session_duration_ms / 1000;
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if hours > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}m", mins)
        }
    }
}

impl SessionStats {
    pub fn new(now: Instant) -> Self {
        Self {
            started: now,
            tool_calls: 0,
            tool_breakdown: HashMap::new(),
            state_time: HashMap::new(),
            current_state: ActivityState::Idle,
            state_since: now,
            flow_time: Duration::ZERO,
            flow_since: None,
        }
    }

    pub fn record_tool_call(&mut self, tool_name: &str) {
        self.tool_calls += 1;
        *self.tool_breakdown.entry(tool_name.to_string()).or_insert(0) += 1;
    }

    /// Close the span of the current state and open one for `state`.
    pub fn record_state_change(&mut self, state: ActivityState, now: Instant) {
        let elapsed = now.saturating_duration_since(self.state_since);
        *self.state_time.entry(self.current_state).or_default() += elapsed;
        self.current_state = state;
        self.state_since = now;
    }

    pub fn record_flow_change(&mut self, flowing: bool, now: Instant) {
        if flowing {
            self.flow_since.get_or_insert(now);
        } else if let Some(since) = self.flow_since.take() {
            self.flow_time += now.saturating_duration_since(since);
        }
    }

    pub fn tool_calls(&self) -> u64 {
        self.tool_calls
    }

    /// The `n` most used tools, most used first; ties sort by name.
    pub fn top_tools(&self, n: usize) -> Vec<(String, u64)> {
        let mut tools: Vec<(String, u64)> = self
            .tool_breakdown
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        tools.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tools.truncate(n);
        tools
    }

    pub fn summary(&self, now: Instant) -> StatsSummary {
        let mut state_time: BTreeMap<ActivityState, u64> = self
            .state_time
            .iter()
            .map(|(state, spent)| (*state, millis(*spent)))
            .collect();
        *state_time.entry(self.current_state).or_insert(0) +=
            millis(now.saturating_duration_since(self.state_since));

        let ongoing_flow = self
            .flow_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();

        StatsSummary {
            session_duration_ms: millis(now.saturating_duration_since(self.started)),
            tool_calls: self.tool_calls,
            tool_breakdown: self.tool_breakdown.clone().into_iter().collect(),
            state_time_ms: state_time,
            flow_duration_ms: millis(self.flow_time + ongoing_flow),
        }
    }

    /// One-line status such as `"42 tools | 17m session"`.
    pub fn tooltip_line(&self, now: Instant) -> String {
        let mins = now.saturating_duration_since(self.started).as_secs() / 60;
        format!("{} tools | {}m session", self.tool_calls, mins)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
