//! Activity state machine
//!
//! Owns the single current [`ActivityState`] plus the idle and connectivity
//! timeouts. Timeouts are plain deadlines; whoever drives the machine calls
//! [`ActivityStateMachine::tick`] once a deadline returned by
//! [`ActivityStateMachine::next_deadline`] has passed.

use crate::config::ActivityConfig;
use crate::ingest::{ContentBlock, EntryKind, TranscriptEntry};
use crate::types::{ActivityState, PetEvent};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Built-in tool name -> state table.
pub const DEFAULT_TOOL_STATES: &[(&str, ActivityState)] = &[
    ("Read", ActivityState::Researching),
    ("Grep", ActivityState::Researching),
    ("Glob", ActivityState::Researching),
    ("LS", ActivityState::Researching),
    ("WebFetch", ActivityState::Browsing),
    ("WebSearch", ActivityState::Browsing),
    ("Edit", ActivityState::Coding),
    ("MultiEdit", ActivityState::Coding),
    ("Write", ActivityState::Coding),
    ("NotebookEdit", ActivityState::Coding),
    ("Bash", ActivityState::Bash),
    ("BashOutput", ActivityState::Bash),
    ("Task", ActivityState::Delegating),
    ("TodoWrite", ActivityState::Thinking),
    ("AskUserQuestion", ActivityState::Listening),
    ("ExitPlanMode", ActivityState::Listening),
];

/// Maps tool names to activity states.
#[derive(Debug, Clone)]
pub struct ToolStateTable {
    states: HashMap<String, ActivityState>,
}

impl ToolStateTable {
    /// The built-in table with `overrides` merged on top.
    pub fn with_overrides(overrides: &HashMap<String, ActivityState>) -> Self {
        let mut states: HashMap<String, ActivityState> = DEFAULT_TOOL_STATES
            .iter()
            .map(|(name, state)| (name.to_string(), *state))
            .collect();
        states.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        Self { states }
    }

    pub fn get(&self, tool: &str) -> Option<ActivityState> {
        self.states.get(tool).copied()
    }
}

impl Default for ToolStateTable {
    fn default() -> Self {
        Self::with_overrides(&HashMap::new())
    }
}

/// Decide which state an entry implies, if any.
///
/// Blocks are inspected in order and the first one that yields a state wins.
pub fn classify(entry: &TranscriptEntry, table: &ToolStateTable) -> Option<ActivityState> {
    match &entry.kind {
        EntryKind::UserSpoke => Some(ActivityState::Listening),
        EntryKind::Blocks(blocks) => blocks.iter().find_map(|block| match block {
            ContentBlock::ToolUse { name } => table.get(name),
            ContentBlock::Text { text } if !text.is_empty() => Some(ActivityState::Thinking),
            _ => None,
        }),
    }
}

/// Current activity state with idle and connectivity timeouts.
#[derive(Debug)]
pub struct ActivityStateMachine {
    table: ToolStateTable,
    idle_timeout: Duration,
    connectivity_timeout: Duration,
    state: ActivityState,
    connected: bool,
    idle_deadline: Option<Instant>,
    connectivity_deadline: Option<Instant>,
    stopped: bool,
}

impl ActivityStateMachine {
    pub fn new(config: &ActivityConfig) -> Self {
        Self {
            table: ToolStateTable::with_overrides(&config.tool_states),
            idle_timeout: config.idle_timeout(),
            connectivity_timeout: config.connectivity_timeout(),
            state: ActivityState::Idle,
            connected: false,
            idle_deadline: None,
            connectivity_deadline: None,
            stopped: false,
        }
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Arm both timers without observing activity.
    pub fn start(&mut self, now: Instant) {
        if self.stopped {
            return;
        }
        self.idle_deadline = Some(now + self.idle_timeout);
        self.connectivity_deadline = Some(now + self.connectivity_timeout);
    }

    /// Feed one entry.
    ///
    /// Returns the state entered if the entry was classified as activity,
    /// even when that state equals the current one.
    pub fn observe(
        &mut self,
        entry: &TranscriptEntry,
        now: Instant,
        events: &mut Vec<PetEvent>,
    ) -> Option<ActivityState> {
        if self.stopped {
            return None;
        }
        let next = classify(entry, &self.table)?;

        self.idle_deadline = Some(now + self.idle_timeout);
        self.connectivity_deadline = Some(now + self.connectivity_timeout);

        if !self.connected {
            self.connected = true;
            events.push(PetEvent::ConnectivityChanged { connected: true });
        }
        self.transition(next, events);
        Some(next)
    }

    /// Fire whichever timeouts have elapsed.
    ///
    /// Returns `Some(Idle)` when the idle timeout fired.
    pub fn tick(&mut self, now: Instant, events: &mut Vec<PetEvent>) -> Option<ActivityState> {
        if self.stopped {
            return None;
        }

        let mut entered = None;
        if self.idle_deadline.is_some_and(|d| d <= now) {
            self.idle_deadline = None;
            tracing::debug!(from = %self.state, "Idle timeout elapsed");
            self.transition(ActivityState::Idle, events);
            entered = Some(ActivityState::Idle);
        }

        if self.connectivity_deadline.is_some_and(|d| d <= now) {
            self.connectivity_deadline = None;
            if self.connected {
                self.connected = false;
                tracing::debug!("Connectivity timeout elapsed");
                events.push(PetEvent::ConnectivityChanged { connected: false });
            }
        }

        entered
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.idle_deadline, self.connectivity_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Cancel both timers; later input is ignored.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.idle_deadline = None;
        self.connectivity_deadline = None;
    }

    fn transition(&mut self, next: ActivityState, events: &mut Vec<PetEvent>) {
        if next != self.state {
            let from = self.state;
            self.state = next;
            events.push(PetEvent::StateChanged { from, to: next });
        }
    }
}
