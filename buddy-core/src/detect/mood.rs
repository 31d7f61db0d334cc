//! Mood scoreboard
//!
//! Text and tool results add evidence to a per-mood score. Scores decay on a
//! fixed tick so moods fade unless fresh evidence keeps them up. The active
//! mood is the highest score strictly above the threshold; ties go to the
//! mood listed first in [`Mood::ALL`].

use crate::config::MoodConfig;
use crate::ingest::{ContentBlock, TranscriptEntry};
use crate::types::{Mood, PetEvent};
use regex_lite::Regex;
use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

const TOOL_HISTORY_LIMIT: usize = 20;
const PACE_WINDOW: Duration = Duration::from_secs(10);
const SLEEPY_GAP_LATE: Duration = Duration::from_secs(30);
const SLEEPY_GAP: Duration = Duration::from_secs(60);

const RESULT_FAILURE_BONUS: f64 = 1.0;
const RESULT_SUCCESS_BONUS: f64 = 1.5;
const PACE_BONUS: f64 = 0.5;

/// Keyword patterns per mood, matched case-insensitively against assistant text.
const MOOD_PATTERNS: &[(Mood, &[&str])] = &[
    (
        Mood::Frustrated,
        &[
            "let me try",
            "try again",
            "failed",
            "doesn't work",
            "not working",
            "unable to",
            "still not",
            "can't seem",
            "unfortunately",
            "issue persist",
        ],
    ),
    (
        Mood::Celebrating,
        &[
            "success",
            "working!",
            "done!",
            "complete",
            "passed",
            "fixed",
            "solved",
            "works!",
            "excellent",
            "perfect",
            "all tests pass",
            "looks good",
        ],
    ),
    (
        Mood::Confused,
        &[
            "unexpected",
            "hmm",
            "not sure",
            "strange",
            "odd",
            "unclear",
            "doesn't make sense",
            "puzzling",
            "curious",
        ],
    ),
    (
        Mood::Excited,
        &[
            "great!",
            "awesome",
            "fantastic",
            "found it",
            "exactly",
            "brilliant",
            "wonderful",
            "impressive",
            "amazing",
            "eureka",
        ],
    ),
];

fn result_failure() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)FAIL|Error:|error:|failed|exception").expect("static regex is valid")
    })
}

fn result_success() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)PASS|success|passed|All \d+ tests").expect("static regex is valid")
    })
}

/// Returns true for local hours treated as late night.
pub fn is_late_night(hour: u32) -> bool {
    hour >= 23 || hour < 5
}

/// Decaying per-mood scores and the currently active mood.
#[derive(Debug)]
pub struct MoodDetector {
    config: MoodConfig,
    scores: [f64; Mood::ALL.len()],
    current: Option<Mood>,
    tool_history: VecDeque<(Instant, String)>,
    next_decay: Option<Instant>,
    stopped: bool,
}

impl MoodDetector {
    pub fn new(config: &MoodConfig) -> Self {
        Self {
            config: config.clone(),
            scores: [0.0; Mood::ALL.len()],
            current: None,
            tool_history: VecDeque::with_capacity(TOOL_HISTORY_LIMIT),
            next_decay: None,
            stopped: false,
        }
    }

    pub fn current(&self) -> Option<Mood> {
        self.current
    }

    pub fn score(&self, mood: Mood) -> f64 {
        self.scores[mood.index()]
    }

    /// True once every score has decayed to zero.
    pub fn is_calm(&self) -> bool {
        self.scores.iter().all(|s| *s == 0.0)
    }

    /// Start the decay tick.
    pub fn start(&mut self, now: Instant) {
        if !self.stopped {
            self.next_decay = Some(now + self.config.decay_interval());
        }
    }

    /// Score one entry and re-evaluate the active mood.
    ///
    /// `local_hour` is the wall-clock hour (0-23) used by the sleepy heuristic.
    pub fn analyze_entry(
        &mut self,
        entry: &TranscriptEntry,
        now: Instant,
        local_hour: u32,
        events: &mut Vec<PetEvent>,
    ) {
        if self.stopped {
            return;
        }
        let blocks = entry.blocks();
        if blocks.is_empty() {
            return;
        }

        for block in blocks {
            match block {
                ContentBlock::Text { text } if !text.is_empty() => self.score_text(text),
                ContentBlock::ToolResult { is_error, text } => {
                    if *is_error {
                        self.add(Mood::Frustrated, self.config.error_bonus);
                    }
                    if result_failure().is_match(text) {
                        self.add(Mood::Frustrated, RESULT_FAILURE_BONUS);
                    }
                    if result_success().is_match(text) {
                        self.add(Mood::Celebrating, RESULT_SUCCESS_BONUS);
                    }
                }
                ContentBlock::ToolUse { name } => {
                    self.tool_history.push_back((now, name.clone()));
                    if self.tool_history.len() > TOOL_HISTORY_LIMIT {
                        self.tool_history.pop_front();
                    }
                }
                ContentBlock::Text { .. } => {}
            }
        }

        self.analyze_pace(now);
        self.analyze_sleepy(now, local_hour);
        self.evaluate(events);
    }

    /// Apply every decay tick that is due.
    pub fn tick(&mut self, now: Instant, events: &mut Vec<PetEvent>) {
        if self.stopped {
            return;
        }
        let interval = self.config.decay_interval();
        while let Some(due) = self.next_decay.filter(|d| *d <= now) {
            for score in self.scores.iter_mut().filter(|s| **s > 0.0) {
                *score = (*score - self.config.decay_rate).max(0.0);
            }
            self.evaluate(events);
            self.next_decay = Some(due + interval);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_decay
    }

    /// Cancel the decay tick; later input is ignored.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.next_decay = None;
    }

    fn add(&mut self, mood: Mood, amount: f64) {
        self.scores[mood.index()] += amount;
    }

    fn score_text(&mut self, text: &str) {
        let lowered = text.to_lowercase();
        for (mood, patterns) in MOOD_PATTERNS {
            let hits = patterns.iter().filter(|p| lowered.contains(*p)).count();
            if hits > 0 {
                self.add(*mood, hits as f64 * self.config.text_weight);
            }
        }
    }

    fn analyze_pace(&mut self, now: Instant) {
        let (recent, kinds) = {
            let recent: Vec<&str> = self
                .tool_history
                .iter()
                .filter(|(at, _)| now.saturating_duration_since(*at) < PACE_WINDOW)
                .map(|(_, name)| name.as_str())
                .collect();
            let distinct: HashSet<&str> = recent.iter().copied().collect();
            (recent.len(), distinct.len())
        };
        if recent < 5 {
            return;
        }

        if kinds >= 4 {
            self.add(Mood::Confused, PACE_BONUS);
        }
        if recent >= 8 && kinds <= 2 {
            self.add(Mood::Excited, PACE_BONUS);
        }
    }

    fn analyze_sleepy(&mut self, now: Instant, local_hour: u32) {
        let Some((last, _)) = self.tool_history.back() else {
            return;
        };
        let gap = now.saturating_duration_since(*last);
        if gap > SLEEPY_GAP_LATE && is_late_night(local_hour) {
            self.add(Mood::Sleepy, 1.0);
        } else if gap > SLEEPY_GAP {
            self.add(Mood::Sleepy, 0.5);
        }
    }

    fn evaluate(&mut self, events: &mut Vec<PetEvent>) {
        let mut best: Option<Mood> = None;
        let mut best_score = self.config.threshold;
        for mood in Mood::ALL {
            let score = self.scores[mood.index()];
            if score > best_score {
                best = Some(mood);
                best_score = score;
            }
        }

        if best != self.current {
            tracing::debug!(from = ?self.current, to = ?best, "Mood changed");
            self.current = best;
            events.push(PetEvent::MoodChanged { mood: best });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_line;

    const NOON: u32 = 12;

    fn detector() -> MoodDetector {
        MoodDetector::new(&MoodConfig::default())
    }

    fn text(body: &str) -> TranscriptEntry {
        let line = serde_json::json!({
            "message": {"content": [{"type": "text", "text": body}]}
        });
        parse_line(&line.to_string()).unwrap()
    }

    fn tool_result(body: &str, is_error: bool) -> TranscriptEntry {
        let line = serde_json::json!({
            "message": {"content": [{"type": "tool_result", "content": body, "is_error": is_error}]}
        });
        parse_line(&line.to_string()).unwrap()
    }

    fn tool(name: &str) -> TranscriptEntry {
        let line = serde_json::json!({
            "message": {"content": [{"type": "tool_use", "name": name}]}
        });
        parse_line(&line.to_string()).unwrap()
    }

    #[test]
    fn test_each_distinct_pattern_adds_weight() {
        let mut mood = detector();
        let mut events = Vec::new();
        mood.analyze_entry(
            &text("Unfortunately it failed. Let me try again."),
            Instant::now(),
            NOON,
            &mut events,
        );
        // unfortunately, failed, let me try, try again
        assert_eq!(mood.score(Mood::Frustrated), 4.0);
        assert_eq!(events, vec![PetEvent::MoodChanged { mood: Some(Mood::Frustrated) }]);
    }

    #[test]
    fn test_below_threshold_reports_nothing() {
        let mut mood = detector();
        let mut events = Vec::new();
        mood.analyze_entry(&text("Hmm, that is odd."), Instant::now(), NOON, &mut events);
        assert_eq!(mood.score(Mood::Confused), 2.0);
        assert!(events.is_empty());
        assert_eq!(mood.current(), None);
    }

    #[test]
    fn test_error_tool_result_adds_error_bonus() {
        let mut mood = detector();
        let mut events = Vec::new();
        mood.analyze_entry(&tool_result("exit code 2", true), Instant::now(), NOON, &mut events);
        assert_eq!(mood.score(Mood::Frustrated), 2.0);
        // 2.0 is not strictly above the threshold
        assert_eq!(mood.current(), None);
    }

    #[test]
    fn test_tool_result_keyword_bonuses() {
        let mut mood = detector();
        let mut events = Vec::new();
        let now = Instant::now();

        mood.analyze_entry(&tool_result("test result: All 12 tests passed", false), now, NOON, &mut events);
        assert_eq!(mood.score(Mood::Celebrating), 1.5);

        mood.analyze_entry(&tool_result("Error: cannot find module", false), now, NOON, &mut events);
        // Parser flags the text as an error, plus the keyword bonus
        assert_eq!(mood.score(Mood::Frustrated), 3.0);
        assert_eq!(mood.current(), Some(Mood::Frustrated));
    }

    #[test]
    fn test_tie_goes_to_first_mood_in_priority_order() {
        let mut mood = detector();
        let mut events = Vec::new();
        // frustrated: failed, unable to, unfortunately (3)
        // celebrating: success, fixed, perfect (3)
        mood.analyze_entry(
            &text("Unfortunately failed and unable to; then success, fixed, perfect"),
            Instant::now(),
            NOON,
            &mut events,
        );
        assert_eq!(mood.score(Mood::Frustrated), mood.score(Mood::Celebrating));
        assert_eq!(mood.current(), Some(Mood::Frustrated));
    }

    #[test]
    fn test_decay_converges_to_no_mood() {
        let mut mood = detector();
        let mut events = Vec::new();
        let start = Instant::now();
        mood.start(start);
        mood.analyze_entry(&text("Awesome, fantastic, brilliant!"), start, NOON, &mut events);
        assert_eq!(mood.current(), Some(Mood::Excited));
        events.clear();

        // 3.0 -> 2.7 -> ... crosses the threshold on the 4th tick
        mood.tick(start + Duration::from_secs(3), &mut events);
        assert_eq!(mood.current(), Some(Mood::Excited));
        mood.tick(start + Duration::from_secs(4), &mut events);
        assert_eq!(events, vec![PetEvent::MoodChanged { mood: None }]);

        mood.tick(start + Duration::from_secs(30), &mut events);
        for m in Mood::ALL {
            assert_eq!(mood.score(m), 0.0);
        }
        assert_eq!(events.len(), 1);
        assert_eq!(mood.next_deadline(), Some(start + Duration::from_secs(31)));
    }

    #[test]
    fn test_rapid_varied_tools_raise_confusion() {
        let mut mood = detector();
        let mut events = Vec::new();
        let start = Instant::now();
        for (i, name) in ["Read", "Grep", "Edit", "Bash", "Glob"].iter().enumerate() {
            mood.analyze_entry(&tool(name), start + Duration::from_secs(i as u64), NOON, &mut events);
        }
        assert_eq!(mood.score(Mood::Confused), 0.5);
        assert_eq!(mood.score(Mood::Excited), 0.0);
    }

    #[test]
    fn test_rapid_repetitive_tools_raise_excitement() {
        let mut mood = detector();
        let mut events = Vec::new();
        let start = Instant::now();
        for i in 0..8 {
            let name = if i % 2 == 0 { "Edit" } else { "Bash" };
            mood.analyze_entry(&tool(name), start + Duration::from_millis(i * 500), NOON, &mut events);
        }
        assert_eq!(mood.score(Mood::Excited), 0.5);
        assert_eq!(mood.score(Mood::Confused), 0.0);
    }

    #[test]
    fn test_sleepy_after_long_gap() {
        let start = Instant::now();

        let mut mood = detector();
        let mut events = Vec::new();
        mood.analyze_entry(&tool("Read"), start, NOON, &mut events);
        mood.analyze_entry(&text("..."), start + Duration::from_secs(45), NOON, &mut events);
        assert_eq!(mood.score(Mood::Sleepy), 0.0);
        mood.analyze_entry(&text("..."), start + Duration::from_secs(61), NOON, &mut events);
        assert_eq!(mood.score(Mood::Sleepy), 0.5);

        let mut mood = detector();
        mood.analyze_entry(&tool("Read"), start, 2, &mut events);
        mood.analyze_entry(&text("..."), start + Duration::from_secs(45), 2, &mut events);
        assert_eq!(mood.score(Mood::Sleepy), 1.0);
    }

    #[test]
    fn test_late_night_hours() {
        assert!(is_late_night(23));
        assert!(is_late_night(0));
        assert!(is_late_night(4));
        assert!(!is_late_night(5));
        assert!(!is_late_night(22));
    }

    #[test]
    fn test_user_turns_are_not_scored() {
        let mut mood = detector();
        let mut events = Vec::new();
        let entry = parse_line(r#"{"type":"user","message":{"role":"user","content":"this failed, unfortunately"}}"#).unwrap();
        mood.analyze_entry(&entry, Instant::now(), NOON, &mut events);
        assert_eq!(mood.score(Mood::Frustrated), 0.0);
    }

    #[test]
    fn test_stop_cancels_decay() {
        let mut mood = detector();
        let mut events = Vec::new();
        let start = Instant::now();
        mood.start(start);
        mood.analyze_entry(&text("awesome amazing wonderful"), start, NOON, &mut events);
        mood.stop();
        events.clear();

        assert_eq!(mood.next_deadline(), None);
        mood.tick(start + Duration::from_secs(60), &mut events);
        assert!(events.is_empty());
        assert_eq!(mood.current(), Some(Mood::Excited));
    }
}
