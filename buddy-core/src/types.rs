//! Core domain types for buddy
//!
//! | Term | Definition |
//! |------|------------|
//! | **Activity state** | What the assistant is doing right now (coding, researching, ...) |
//! | **Mood** | A decaying emotional coloring derived from text and tool results |
//! | **Flow** | Sustained high-frequency tool usage |
//! | **Eureka** | A run of research states immediately followed by an action state |
//! | **Flinch** | An immediate reaction to an observed tool error |
//!
//! Everything the detection pipeline reports downstream is a [`PetEvent`].

use serde::{Deserialize, Serialize};

// ============================================
// Activity
// ============================================

/// Discrete classification of what the assistant is currently doing.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    #[default]
    Idle,
    Thinking,
    Listening,
    Coding,
    Researching,
    Browsing,
    Bash,
    Building,
    Delegating,
}

impl ActivityState {
    pub const ALL: [ActivityState; 9] = [
        ActivityState::Idle,
        ActivityState::Thinking,
        ActivityState::Listening,
        ActivityState::Coding,
        ActivityState::Researching,
        ActivityState::Browsing,
        ActivityState::Bash,
        ActivityState::Building,
        ActivityState::Delegating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityState::Idle => "idle",
            ActivityState::Thinking => "thinking",
            ActivityState::Listening => "listening",
            ActivityState::Coding => "coding",
            ActivityState::Researching => "researching",
            ActivityState::Browsing => "browsing",
            ActivityState::Bash => "bash",
            ActivityState::Building => "building",
            ActivityState::Delegating => "delegating",
        }
    }

    /// States that count as "doing something" for breakthrough detection.
    pub fn is_action(&self) -> bool {
        matches!(
            self,
            ActivityState::Coding | ActivityState::Building | ActivityState::Bash
        )
    }

    /// States that count as "looking around" for breakthrough detection.
    pub fn is_research(&self) -> bool {
        matches!(self, ActivityState::Researching | ActivityState::Browsing)
    }
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown activity state: {}", s))
    }
}

// ============================================
// Mood
// ============================================

/// Mood categories tracked by the scoreboard.
///
/// Declaration order doubles as tie-break priority: when two moods hold
/// the same winning score, the one listed first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Frustrated,
    Celebrating,
    Confused,
    Excited,
    Sleepy,
}

impl Mood {
    /// All moods in tie-break priority order.
    pub const ALL: [Mood; 5] = [
        Mood::Frustrated,
        Mood::Celebrating,
        Mood::Confused,
        Mood::Excited,
        Mood::Sleepy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Frustrated => "frustrated",
            Mood::Celebrating => "celebrating",
            Mood::Confused => "confused",
            Mood::Excited => "excited",
            Mood::Sleepy => "sleepy",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Events
// ============================================

/// Events emitted by the detection pipeline for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PetEvent {
    /// The current activity state changed.
    StateChanged {
        from: ActivityState,
        to: ActivityState,
    },
    /// The assistant started or stopped producing activity.
    ConnectivityChanged { connected: bool },
    /// The winning mood changed (`None` means no mood is active).
    MoodChanged { mood: Option<Mood> },
    /// Flow state was entered or left.
    FlowChanged { flowing: bool },
    /// Research run followed by action.
    Eureka,
    /// A tool result reported an error.
    Flinch,
}

impl PetEvent {
    /// Short event name, matching the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            PetEvent::StateChanged { .. } => "state_changed",
            PetEvent::ConnectivityChanged { .. } => "connectivity_changed",
            PetEvent::MoodChanged { .. } => "mood_changed",
            PetEvent::FlowChanged { .. } => "flow_changed",
            PetEvent::Eureka => "eureka",
            PetEvent::Flinch => "flinch",
        }
    }
}
