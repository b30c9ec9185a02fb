//! Property-based tests for rust_logger_dispatch using proptest

use proptest::prelude::*;
use rust_logger_dispatch::appenders::{
    AsyncAppender, ListAppender, RollingFileAppender, RollingPolicy,
};
use rust_logger_dispatch::core::{
    set_default_error_handler, FilterChain, LevelRangeFilter, RecordingErrorHandler,
};
use rust_logger_dispatch::prelude::*;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
        Just(LogLevel::Fatal),
    ]
}

fn any_decision() -> impl Strategy<Value = Decision> {
    prop_oneof![
        Just(Decision::Accept),
        Just(Decision::Deny),
        Just(Decision::Neutral),
    ]
}

/// Filter that always answers the same
#[derive(Debug)]
struct Fixed(Decision);

impl Filter for Fixed {
    fn decide(&self, _event: &LoggingEvent) -> Decision {
        self.0
    }
}

fn active_list(name: &str) -> Arc<ListAppender> {
    let list = Arc::new(ListAppender::new(name));
    list.activate().unwrap();
    list
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// Test that LogLevel string conversions roundtrip correctly
    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        let parsed: LogLevel = level.to_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
    }

    /// Test that the appender threshold lets through exactly the levels at or above it
    #[test]
    fn test_threshold_admits_levels_at_or_above(threshold in any_level(), level in any_level()) {
        let list = active_list("threshold");
        list.core().set_threshold(threshold);

        list.append(&LoggingEvent::new(level, "prop", "x")).unwrap();

        prop_assert_eq!(list.len() == 1, level >= threshold);
    }
}

// ============================================================================
// Filter Chain Tests
// ============================================================================

proptest! {
    /// The first non-neutral decision wins; an all-neutral chain accepts
    #[test]
    fn test_first_non_neutral_decision_wins(decisions in prop::collection::vec(any_decision(), 0..8)) {
        let mut chain = FilterChain::new();
        for decision in &decisions {
            chain.push(Arc::new(Fixed(*decision)));
        }

        let expected = decisions
            .iter()
            .copied()
            .find(|d| *d != Decision::Neutral)
            .unwrap_or(Decision::Accept);
        let event = LoggingEvent::new(LogLevel::Info, "prop", "x");

        prop_assert_eq!(chain.decide(&event), expected);
        prop_assert_eq!(chain.accepts(&event), expected != Decision::Deny);
    }

    /// A range filter never lets an out-of-range level through
    #[test]
    fn test_level_range_filter(min in any_level(), max in any_level(), level in any_level()) {
        let appender = active_list("range");
        appender.core().add_filter(Arc::new(LevelRangeFilter::new(min, max, true)));

        appender.append(&LoggingEvent::new(level, "prop", "x")).unwrap();

        prop_assert_eq!(appender.len() == 1, level >= min && level <= max);
    }
}

// ============================================================================
// Dispatch Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Each producer's events reach the nested appender in the order it posted them
    #[test]
    fn test_async_preserves_per_producer_order(
        counts in prop::collection::vec(1usize..40, 1..5)
    ) {
        let list = active_list("fifo");
        let appender = Arc::new(AsyncAppender::new("fifo").with_appender(list.clone()));
        appender.activate().unwrap();

        let producers: Vec<_> = counts
            .iter()
            .enumerate()
            .map(|(producer, &count)| {
                let appender = Arc::clone(&appender);
                thread::spawn(move || {
                    for i in 0..count {
                        let event = LoggingEvent::new(LogLevel::Info, "prop", format!("{}:{}", producer, i));
                        appender.append(&event).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        appender.close().unwrap();

        let messages = list.messages();
        prop_assert_eq!(messages.len(), counts.iter().sum::<usize>());
        for (producer, &count) in counts.iter().enumerate() {
            let prefix = format!("{}:", producer);
            let seen: Vec<usize> = messages
                .iter()
                .filter_map(|m| m.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            prop_assert_eq!(seen, (0..count).collect::<Vec<_>>());
        }
    }

    /// Size rollover never splits an event, never loses bytes and keeps every
    /// file within the limit
    #[test]
    fn test_size_rollover_keeps_files_within_limit(
        sizes in prop::collection::vec(1usize..=32, 1..40)
    ) {
        const MAX_BYTES: u64 = 32;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.log");
        let appender = RollingFileAppender::new(path.to_str().unwrap()).with_policy(
            RollingPolicy::new().with_max_size(MAX_BYTES).with_max_backup_index(100),
        );
        appender.activate().unwrap();

        let mut written = String::new();
        for (i, size) in sizes.iter().enumerate() {
            let letter = char::from(b'a' + (i % 26) as u8);
            let chunk: String = std::iter::repeat(letter).take(*size).collect();
            appender.append(&LoggingEvent::new(LogLevel::Info, "prop", chunk.clone())).unwrap();
            written.push_str(&chunk);
        }
        appender.close().unwrap();

        let mut backups: Vec<(usize, String)> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                let index = name.strip_prefix("p.log.")?.parse().ok()?;
                Some((index, fs::read_to_string(e.path()).unwrap()))
            })
            .collect();
        backups.sort_by(|a, b| b.0.cmp(&a.0));

        let mut reassembled = String::new();
        for (_, content) in &backups {
            prop_assert!(content.len() as u64 <= MAX_BYTES);
            prop_assert!(!content.is_empty());
            reassembled.push_str(content);
        }
        let live = fs::read_to_string(&path).unwrap();
        prop_assert!(live.len() as u64 <= MAX_BYTES);
        reassembled.push_str(&live);

        prop_assert_eq!(reassembled, written);
    }
}

// ============================================================================
// Registry Tests
// ============================================================================

proptest! {
    /// Attaching any sequence of appenders, duplicates included, keeps each at most once
    #[test]
    fn test_registry_never_holds_duplicates(picks in prop::collection::vec(0usize..4, 0..20)) {
        let pool: Vec<Arc<dyn Appender>> = (0..4)
            .map(|i| Arc::new(ListAppender::new(format!("l{}", i))) as Arc<dyn Appender>)
            .collect();
        let registry = AppenderAttachable::new();
        // duplicate attaches are reported; keep them off stderr
        set_default_error_handler(Arc::new(RecordingErrorHandler::new()));

        let mut distinct = Vec::new();
        for pick in picks {
            let added = registry.add_appender(Arc::clone(&pool[pick]));
            prop_assert_eq!(added, !distinct.contains(&pick));
            if added {
                distinct.push(pick);
            }
        }

        let names: Vec<String> = registry.appenders().iter().map(|a| a.name()).collect();
        let expected: Vec<String> = distinct.iter().map(|i| format!("l{}", i)).collect();
        prop_assert_eq!(names, expected);
    }
}
