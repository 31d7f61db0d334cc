//! Offline replay of an existing transcript
//!
//! Runs the [`Detector`] over recorded lines on a virtual clock taken from
//! the entries' own timestamps, so idle timeouts, mood decay and flow decay
//! happen where they would have happened live. Lines without a timestamp are
//! processed at the current virtual time.

use crate::config::Config;
use crate::detect::Detector;
use crate::ingest::parse_line;
use crate::types::PetEvent;
use chrono::{DateTime, Local, Timelike, Utc};
use serde::Serialize;
use std::time::Instant;

/// An event together with when it happened during the replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedEvent {
    /// Milliseconds since the first timestamped entry
    pub offset_ms: u64,
    /// Wall-clock time, when the transcript carried timestamps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub event: PetEvent,
}

struct Replay {
    detector: Detector,
    origin: Instant,
    clock: Instant,
    first_timestamp: Option<DateTime<Utc>>,
    events: Vec<TimedEvent>,
}

impl Replay {
    fn new(config: &Config) -> Self {
        let origin = Instant::now();
        let mut detector = Detector::new(config, origin);
        detector.start(origin);
        Self {
            detector,
            origin,
            clock: origin,
            first_timestamp: None,
            events: Vec::new(),
        }
    }

    /// Fire every deadline up to `target`, stamping events with the deadline.
    fn advance_to(&mut self, target: Instant) {
        while let Some(deadline) = self.detector.next_deadline().filter(|d| *d <= target) {
            self.clock = self.clock.max(deadline);
            self.detector.tick(self.clock);
            self.collect();
        }
        self.clock = self.clock.max(target);
    }

    fn line(&mut self, line: &str) {
        let Some(entry) = parse_line(line) else {
            return;
        };

        if let Some(ts) = entry.timestamp {
            let first = *self.first_timestamp.get_or_insert(ts);
            // Out-of-order timestamps never move the clock backwards
            let offset = (ts - first).to_std().unwrap_or_default();
            self.advance_to(self.origin + offset);
        }

        let hour = entry
            .timestamp
            .map(|ts| ts.with_timezone(&Local).hour())
            .unwrap_or_else(|| Local::now().hour());
        self.detector.process_entry(&entry, self.clock, hour);
        self.collect();
    }

    fn finish(mut self) -> Vec<TimedEvent> {
        while !self.detector.is_settled() {
            let Some(deadline) = self.detector.next_deadline() else {
                break;
            };
            self.advance_to(deadline);
        }
        self.detector.stop();
        self.events
    }

    fn collect(&mut self) {
        let offset = self.clock.saturating_duration_since(self.origin);
        let timestamp = self
            .first_timestamp
            .and_then(|first| chrono::Duration::from_std(offset).ok().map(|d| first + d));
        let offset_ms = u64::try_from(offset.as_millis()).unwrap_or(u64::MAX);

        for event in self.detector.drain_events() {
            self.events.push(TimedEvent {
                offset_ms,
                timestamp,
                event,
            });
        }
    }
}

/// Replay transcript lines and return every event they produce, including
/// those from timers that expire after the last line.
pub fn replay<I, S>(lines: I, config: &Config) -> Vec<TimedEvent>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut replay = Replay::new(config);
    let mut count = 0usize;
    for line in lines {
        replay.line(line.as_ref());
        count += 1;
    }
    let events = replay.finish();
    tracing::debug!(lines = count, events = events.len(), "Replay finished");
    events
}
