use crate::engine::ScoreCounters;
use std::time::Duration;

/// Characters per word for WPM purposes
const CHARS_PER_WORD: f64 = 5.0;

/// Percentage of correct keystrokes, rounded to one decimal. 0.0 before any keystroke.
pub fn accuracy(correct: u32, mistakes: u32) -> f64 {
    let total = correct as f64 + mistakes as f64;
    if total == 0.0 {
        return 0.0;
    }
    ((correct as f64 / total) * 1000.0).round() / 10.0
}

/// Words per minute over `elapsed`. 0 when no time has passed.
pub fn wpm(correct: u32, elapsed: Duration) -> u32 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    ((correct as f64 / CHARS_PER_WORD) / (secs / 60.0)).round() as u32
}

/// `m:ss`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum MetricsSource {
    #[strum(serialize = "estimated")]
    Estimated,
    #[strum(serialize = "confirmed")]
    Confirmed,
}

/// WPM and accuracy as shown to the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub wpm: f64,
    pub accuracy: f64,
    pub source: MetricsSource,
}

impl Metrics {
    /// Optimistic local estimate from raw counters
    pub fn estimate(counters: &ScoreCounters, elapsed: Duration) -> Self {
        Self {
            wpm: wpm(counters.correct_keystrokes, elapsed) as f64,
            accuracy: accuracy(counters.correct_keystrokes, counters.mistake_keystrokes),
            source: MetricsSource::Estimated,
        }
    }

    /// Server-computed values, which supersede any local estimate
    pub fn confirmed(wpm: f64, accuracy: f64) -> Self {
        Self {
            wpm,
            accuracy,
            source: MetricsSource::Confirmed,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.source == MetricsSource::Confirmed
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::estimate(&ScoreCounters::default(), Duration::ZERO)
    }
}
