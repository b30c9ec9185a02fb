//! Filter chain evaluated by every appender before writing

use super::log_level::LogLevel;
use super::logging_event::LoggingEvent;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Verdict of a single filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Write the event without consulting further filters
    Accept,
    /// Drop the event
    Deny,
    /// No opinion, ask the next filter
    Neutral,
}

pub trait Filter: Send + Sync + fmt::Debug {
    fn decide(&self, event: &LoggingEvent) -> Decision;
}

/// Ordered list of filters; the first non-neutral verdict wins
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run the chain; reaching the end without a verdict accepts
    pub fn decide(&self, event: &LoggingEvent) -> Decision {
        self.filters
            .iter()
            .map(|filter| filter.decide(event))
            .find(|decision| *decision != Decision::Neutral)
            .unwrap_or(Decision::Accept)
    }

    pub fn accepts(&self, event: &LoggingEvent) -> bool {
        self.decide(event) != Decision::Deny
    }
}

/// Denies everything; usually placed last in a chain
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllFilter;

impl Filter for DenyAllFilter {
    fn decide(&self, _event: &LoggingEvent) -> Decision {
        Decision::Deny
    }
}

/// Matches one exact level
#[derive(Debug, Clone, Copy)]
pub struct LevelMatchFilter {
    pub level: LogLevel,
    pub accept_on_match: bool,
}

impl LevelMatchFilter {
    pub fn new(level: LogLevel, accept_on_match: bool) -> Self {
        Self {
            level,
            accept_on_match,
        }
    }
}

impl Filter for LevelMatchFilter {
    fn decide(&self, event: &LoggingEvent) -> Decision {
        if event.level() != self.level {
            Decision::Neutral
        } else if self.accept_on_match {
            Decision::Accept
        } else {
            Decision::Deny
        }
    }
}

/// Denies events outside `[min, max]`
///
/// Inside the range the filter accepts when `accept_on_match` is set and
/// stays neutral otherwise.
#[derive(Debug, Clone, Copy)]
pub struct LevelRangeFilter {
    pub min: LogLevel,
    pub max: LogLevel,
    pub accept_on_match: bool,
}

impl LevelRangeFilter {
    pub fn new(min: LogLevel, max: LogLevel, accept_on_match: bool) -> Self {
        Self {
            min,
            max,
            accept_on_match,
        }
    }
}

impl Filter for LevelRangeFilter {
    fn decide(&self, event: &LoggingEvent) -> Decision {
        let level = event.level();
        if level < self.min || level > self.max {
            Decision::Deny
        } else if self.accept_on_match {
            Decision::Accept
        } else {
            Decision::Neutral
        }
    }
}

/// Matches a substring of the event message
#[derive(Debug, Clone)]
pub struct StringMatchFilter {
    pub pattern: String,
    pub accept_on_match: bool,
}

impl StringMatchFilter {
    pub fn new(pattern: impl Into<String>, accept_on_match: bool) -> Self {
        Self {
            pattern: pattern.into(),
            accept_on_match,
        }
    }
}

impl Filter for StringMatchFilter {
    fn decide(&self, event: &LoggingEvent) -> Decision {
        if self.pattern.is_empty() || !event.message().contains(self.pattern.as_str()) {
            Decision::Neutral
        } else if self.accept_on_match {
            Decision::Accept
        } else {
            Decision::Deny
        }
    }
}

/// Randomly drops a share of events, never those at an always-sampled level
///
/// Kept events stay neutral so later filters still get a say.
#[derive(Debug, Clone)]
pub struct SamplingFilter {
    rate: f64,
    always_sample: Vec<LogLevel>,
}

impl SamplingFilter {
    /// Keep roughly `rate` of the events (clamped to `0.0..=1.0`); errors and
    /// fatals are always kept
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
            always_sample: vec![LogLevel::Error, LogLevel::Fatal],
        }
    }

    #[must_use]
    pub fn with_always_sample(mut self, levels: Vec<LogLevel>) -> Self {
        self.always_sample = levels;
        self
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Filter for SamplingFilter {
    fn decide(&self, event: &LoggingEvent) -> Decision {
        if self.always_sample.contains(&event.level()) || self.rate >= 1.0 {
            return Decision::Neutral;
        }
        if self.rate <= 0.0 || rand::thread_rng().gen::<f64>() >= self.rate {
            return Decision::Deny;
        }
        Decision::Neutral
    }
}
