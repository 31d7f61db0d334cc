//! Eureka: research that turns into action.

use crate::config::EurekaConfig;
use crate::types::{ActivityState, PetEvent};
use std::collections::VecDeque;

/// Number of states that must precede an action state.
const RESEARCH_RUN: usize = 3;

/// Bounded history of entered states.
#[derive(Debug)]
pub struct EurekaDetector {
    history: VecDeque<ActivityState>,
    capacity: usize,
    stopped: bool,
}

impl EurekaDetector {
    pub fn new(config: &EurekaConfig) -> Self {
        let capacity = config.history_len.max(RESEARCH_RUN + 1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            stopped: false,
        }
    }

    /// States entered so far, oldest first.
    pub fn history(&self) -> impl Iterator<Item = ActivityState> + '_ {
        self.history.iter().copied()
    }

    /// Record an entered state and fire if it ends a research run.
    pub fn push(&mut self, state: ActivityState, events: &mut Vec<PetEvent>) {
        if self.stopped {
            return;
        }

        self.history.push_back(state);
        if self.history.len() > self.capacity {
            self.history.pop_front();
        }

        if !state.is_action() || self.history.len() < RESEARCH_RUN + 1 {
            return;
        }

        let preceding_research = self
            .history
            .iter()
            .rev()
            .skip(1)
            .take(RESEARCH_RUN)
            .all(|s| s.is_research());

        if preceding_research {
            tracing::debug!(state = %state, "Eureka");
            events.push(PetEvent::Eureka);
        }
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }
}
