//! Flow detection: a sustained burst of activity.

use crate::config::FlowConfig;
use crate::types::PetEvent;
use std::collections::VecDeque;
use std::time::Instant;

/// Minimum number of timestamps kept regardless of threshold.
const MIN_WINDOW_CAPACITY: usize = 64;

/// Sliding-window activity counter with hysteresis.
///
/// Flow starts once `threshold` activities fall inside the window and ends
/// only after `decay` passes with no activity at all.
#[derive(Debug)]
pub struct FlowDetector {
    config: FlowConfig,
    window: VecDeque<Instant>,
    capacity: usize,
    flowing: bool,
    decay_at: Option<Instant>,
    stopped: bool,
}

impl FlowDetector {
    pub fn new(config: &FlowConfig) -> Self {
        let capacity = config.threshold.max(MIN_WINDOW_CAPACITY);
        Self {
            config: config.clone(),
            window: VecDeque::with_capacity(capacity),
            capacity,
            flowing: false,
            decay_at: None,
            stopped: false,
        }
    }

    pub fn is_flowing(&self) -> bool {
        self.flowing
    }

    /// Record one activity.
    pub fn record(&mut self, now: Instant, events: &mut Vec<PetEvent>) {
        if self.stopped {
            return;
        }

        self.window.push_back(now);
        let horizon = self.config.window();
        while let Some(oldest) = self.window.front() {
            if now.saturating_duration_since(*oldest) > horizon || self.window.len() > self.capacity {
                self.window.pop_front();
            } else {
                break;
            }
        }

        if !self.flowing && self.window.len() >= self.config.threshold {
            tracing::debug!(activities = self.window.len(), "Flow started");
            self.flowing = true;
            events.push(PetEvent::FlowChanged { flowing: true });
        }

        self.decay_at = Some(now + self.config.decay());
    }

    /// End flow if the decay deadline passed.
    pub fn tick(&mut self, now: Instant, events: &mut Vec<PetEvent>) {
        if self.stopped {
            return;
        }
        if self.decay_at.is_some_and(|at| at <= now) {
            self.decay_at = None;
            if self.flowing {
                tracing::debug!("Flow ended");
                self.flowing = false;
                events.push(PetEvent::FlowChanged { flowing: false });
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.decay_at
    }

    pub fn stop(&mut self) {
        self.stopped = true;
        self.decay_at = None;
    }
}
