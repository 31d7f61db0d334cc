//! Detection pipeline
//!
//! ```text
//!                      ┌──────────────────────┐
//!                 ┌──► │ ActivityStateMachine │ ──┬──► FlowDetector
//!                 │    └──────────────────────┘   └──► EurekaDetector
//! TranscriptEntry ┼──► MoodDetector
//!                 ├──► flinch
//!                 └──► SessionStats
//! ```
//!
//! Every detector is a plain value driven by an injected clock. Nothing in
//! here sleeps or spawns; the caller feeds entries, asks for
//! [`Detector::next_deadline`] and calls [`Detector::tick`] once it passes.
//! Emitted [`PetEvent`]s are buffered until [`Detector::drain_events`].

pub mod activity;
pub mod eureka;
pub mod flow;
pub mod mood;

pub use activity::{classify, ActivityStateMachine, ToolStateTable, DEFAULT_TOOL_STATES};
pub use eureka::EurekaDetector;
pub use flow::FlowDetector;
pub use mood::MoodDetector;

use crate::config::Config;
use crate::ingest::{parse_line, TranscriptEntry};
use crate::stats::{SessionStats, StatsSummary};
use crate::types::{ActivityState, Mood, PetEvent};
use chrono::Timelike;
use std::time::Instant;

/// All detectors for one session, plus its statistics.
#[derive(Debug)]
pub struct Detector {
    activity: ActivityStateMachine,
    mood: MoodDetector,
    flow: FlowDetector,
    eureka: EurekaDetector,
    stats: SessionStats,
    events: Vec<PetEvent>,
    stopped: bool,
}

impl Detector {
    pub fn new(config: &Config, now: Instant) -> Self {
        Self {
            activity: ActivityStateMachine::new(&config.activity),
            mood: MoodDetector::new(&config.mood),
            flow: FlowDetector::new(&config.flow),
            eureka: EurekaDetector::new(&config.eureka),
            stats: SessionStats::new(now),
            events: Vec::new(),
            stopped: false,
        }
    }

    /// Arm the idle, connectivity and mood decay timers.
    pub fn start(&mut self, now: Instant) {
        if self.stopped {
            return;
        }
        self.activity.start(now);
        self.mood.start(now);
    }

    /// Parse and process one transcript line, using the local wall-clock hour.
    ///
    /// Returns false if the line carried nothing the detectors understand.
    pub fn process_line(&mut self, line: &str, now: Instant) -> bool {
        match parse_line(line) {
            Some(entry) => {
                let hour = chrono::Local::now().hour();
                self.process_entry(&entry, now, hour);
                true
            }
            None => false,
        }
    }

    /// Process one parsed entry.
    pub fn process_entry(&mut self, entry: &TranscriptEntry, now: Instant, local_hour: u32) {
        if self.stopped {
            return;
        }
        let mark = self.events.len();

        for _ in 0..entry.error_count() {
            self.events.push(PetEvent::Flinch);
        }
        for name in entry.tool_names() {
            self.stats.record_tool_call(name);
        }

        self.mood.analyze_entry(entry, now, local_hour, &mut self.events);

        if let Some(state) = self.activity.observe(entry, now, &mut self.events) {
            self.flow.record(now, &mut self.events);
            self.eureka.push(state, &mut self.events);
        }

        self.update_stats(mark, now);
    }

    /// Fire every deadline at or before `now`.
    pub fn tick(&mut self, now: Instant) {
        if self.stopped {
            return;
        }
        let mark = self.events.len();

        if let Some(state) = self.activity.tick(now, &mut self.events) {
            self.eureka.push(state, &mut self.events);
        }
        self.mood.tick(now, &mut self.events);
        self.flow.tick(now, &mut self.events);

        self.update_stats(mark, now);
    }

    /// Earliest pending deadline across all detectors.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.stopped {
            return None;
        }
        [
            self.activity.next_deadline(),
            self.mood.next_deadline(),
            self.flow.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Take every buffered event, oldest first.
    pub fn drain_events(&mut self) -> Vec<PetEvent> {
        std::mem::take(&mut self.events)
    }

    /// Cancel all timers. Later calls do nothing.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.activity.stop();
        self.mood.stop();
        self.flow.stop();
        self.eureka.stop();
        tracing::debug!(tool_calls = self.stats.tool_calls(), "Detector stopped");
    }

    /// True when no timer could still change anything: the activity and
    /// flow timers are idle and every mood score is zero.
    pub fn is_settled(&self) -> bool {
        self.stopped
            || (self.activity.next_deadline().is_none()
                && self.flow.next_deadline().is_none()
                && self.mood.is_calm())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn state(&self) -> ActivityState {
        self.activity.state()
    }

    pub fn is_connected(&self) -> bool {
        self.activity.is_connected()
    }

    pub fn mood(&self) -> Option<Mood> {
        self.mood.current()
    }

    pub fn is_flowing(&self) -> bool {
        self.flow.is_flowing()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn summary(&self, now: Instant) -> StatsSummary {
        self.stats.summary(now)
    }

    fn update_stats(&mut self, mark: usize, now: Instant) {
        for event in &self.events[mark..] {
            match event {
                PetEvent::StateChanged { to, .. } => self.stats.record_state_change(*to, now),
                PetEvent::FlowChanged { flowing } => self.stats.record_flow_change(*flowing, now),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const NOON: u32 = 12;

    fn tool_line(name: &str) -> String {
        serde_json::json!({
            "type": "assistant",
            "message": {"role": "assistant", "content": [{"type": "tool_use", "name": name}]}
        })
        .to_string()
    }

    fn detector(start: Instant) -> Detector {
        let mut detector = Detector::new(&Config::default(), start);
        detector.start(start);
        detector
    }

    fn feed(detector: &mut Detector, line: &str, now: Instant) {
        let entry = parse_line(line).expect("line should parse");
        detector.process_entry(&entry, now, NOON);
    }

    #[test]
    fn test_first_tool_use_connects_and_changes_state() {
        let start = Instant::now();
        let mut detector = detector(start);
        feed(&mut detector, &tool_line("Edit"), start);

        assert_eq!(
            detector.drain_events(),
            vec![
                PetEvent::ConnectivityChanged { connected: true },
                PetEvent::StateChanged {
                    from: ActivityState::Idle,
                    to: ActivityState::Coding
                },
            ]
        );
        assert!(detector.drain_events().is_empty());
    }

    #[test]
    fn test_error_result_flinches_before_other_events() {
        let start = Instant::now();
        let mut detector = detector(start);
        let line = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","content":"boom","is_error":true},{"type":"tool_result","content":"Error: again"}]}}"#;
        feed(&mut detector, line, start);

        let events = detector.drain_events();
        assert_eq!(&events[..2], &[PetEvent::Flinch, PetEvent::Flinch]);
        // Two errors: 2 * (error bonus) + keyword bonus for "Error:"
        assert_eq!(detector.mood(), Some(Mood::Frustrated));
        assert!(events.contains(&PetEvent::MoodChanged {
            mood: Some(Mood::Frustrated)
        }));
    }

    #[test]
    fn test_every_tool_use_block_is_counted() {
        let start = Instant::now();
        let mut detector = detector(start);
        let line = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"tool_use","name":"Read"},{"type":"text","text":"and"},{"type":"tool_use","name":"Read"},{"type":"tool_use","name":"Edit"}]}}"#;
        feed(&mut detector, line, start);

        assert_eq!(detector.stats().tool_calls(), 3);
        let summary = detector.summary(start);
        assert_eq!(summary.tool_breakdown.get("Read"), Some(&2));
        assert_eq!(summary.tool_breakdown.get("Edit"), Some(&1));
        assert!(!detector.drain_events().contains(&PetEvent::Flinch));
    }

    #[test]
    fn test_unrecognised_lines_do_nothing() {
        let start = Instant::now();
        let mut detector = detector(start);
        assert!(!detector.process_line("garbage", start));
        assert!(!detector.process_line(r#"{"type":"summary"}"#, start));
        assert!(detector.drain_events().is_empty());
        assert_eq!(detector.state(), ActivityState::Idle);
    }

    #[test]
    fn test_tick_fires_idle_and_feeds_stats() {
        let start = Instant::now();
        let mut detector = detector(start);
        feed(&mut detector, &tool_line("Read"), start);
        detector.drain_events();

        detector.tick(start + Duration::from_secs(10));
        assert_eq!(
            detector.drain_events(),
            vec![PetEvent::StateChanged {
                from: ActivityState::Researching,
                to: ActivityState::Idle
            }]
        );

        let summary = detector.summary(start + Duration::from_secs(12));
        assert_eq!(summary.state_time_ms.get(&ActivityState::Researching), Some(&10_000));
        assert_eq!(summary.state_time_ms.get(&ActivityState::Idle), Some(&2_000));
        assert_eq!(summary.tool_calls, 1);
    }

    #[test]
    fn test_research_run_then_edit_is_eureka() {
        let start = Instant::now();
        let mut detector = detector(start);
        for (i, tool) in ["Read", "Grep", "WebSearch", "Edit"].iter().enumerate() {
            feed(&mut detector, &tool_line(tool), start + Duration::from_secs(i as u64));
        }
        let events = detector.drain_events();
        assert_eq!(events.last(), Some(&PetEvent::Eureka));
        assert_eq!(events.iter().filter(|e| **e == PetEvent::Eureka).count(), 1);
    }

    #[test]
    fn test_burst_enters_flow_then_decays() {
        let start = Instant::now();
        let mut detector = detector(start);
        for i in 0..5 {
            feed(&mut detector, &tool_line("Edit"), start + Duration::from_secs(i));
        }
        assert!(detector.is_flowing());
        assert!(detector
            .drain_events()
            .contains(&PetEvent::FlowChanged { flowing: true }));

        detector.tick(start + Duration::from_secs(14));
        assert!(!detector.is_flowing());
        let events = detector.drain_events();
        assert!(events.contains(&PetEvent::FlowChanged { flowing: false }));
        assert_eq!(detector.summary(start + Duration::from_secs(20)).flow_duration_ms, 10_000);
    }

    #[test]
    fn test_next_deadline_is_earliest() {
        let start = Instant::now();
        let mut detector = detector(start);
        // Mood decay is due first
        assert_eq!(detector.next_deadline(), Some(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_stop_is_final() {
        let start = Instant::now();
        let mut detector = detector(start);
        detector.stop();
        detector.stop();

        assert_eq!(detector.next_deadline(), None);
        feed(&mut detector, &tool_line("Edit"), start);
        detector.tick(start + Duration::from_secs(60));
        assert!(detector.drain_events().is_empty());
        assert!(detector.is_stopped());
    }
}
