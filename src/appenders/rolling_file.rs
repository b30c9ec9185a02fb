//! Rolling file appender
//!
//! Rolls the live file over by size, by calendar period, or both. Size
//! rollover keeps numbered backups (`app.log.1`, `app.log.2`, ...); date
//! rollover names the backup after the period that just ended
//! (`app.log.2024-03-05`).

use super::file::{expand_path, open_file, FileConfig};
use super::writer::WriterState;
use crate::core::layout::render;
use crate::core::{Appender, AppenderCore, Layout, LoggerError, LoggingEvent, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Calendar period for date-based rollover, evaluated in local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatePattern {
    Minutely,
    Hourly,
    /// Midnight and noon
    HalfDaily,
    Daily,
    /// Weeks start on Monday
    Weekly,
    Monthly,
}

impl DatePattern {
    /// Start of the period containing `now`
    pub fn period_start(self, now: NaiveDateTime) -> NaiveDateTime {
        let date = now.date();
        let start = match self {
            DatePattern::Minutely => date.and_hms_opt(now.hour(), now.minute(), 0),
            DatePattern::Hourly => date.and_hms_opt(now.hour(), 0, 0),
            DatePattern::HalfDaily => date.and_hms_opt(if now.hour() < 12 { 0 } else { 12 }, 0, 0),
            DatePattern::Daily => date.and_hms_opt(0, 0, 0),
            DatePattern::Weekly => {
                let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                monday.and_hms_opt(0, 0, 0)
            }
            DatePattern::Monthly => date.with_day(1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        };
        start.unwrap_or(now)
    }

    /// First instant of the period after the one containing `now`
    pub fn next_boundary(self, now: NaiveDateTime) -> NaiveDateTime {
        let start = self.period_start(now);
        match self {
            DatePattern::Minutely => start + Duration::minutes(1),
            DatePattern::Hourly => start + Duration::hours(1),
            DatePattern::HalfDaily => start + Duration::hours(12),
            DatePattern::Daily => start + Duration::days(1),
            DatePattern::Weekly => start + Duration::days(7),
            DatePattern::Monthly => {
                let (year, month) = if start.month() == 12 {
                    (start.year() + 1, 1)
                } else {
                    (start.year(), start.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .unwrap_or(start + Duration::days(31))
            }
        }
    }

    /// strftime pattern of the backup suffix
    pub fn suffix_format(self) -> &'static str {
        match self {
            DatePattern::Minutely => ".%Y-%m-%d-%H-%M",
            DatePattern::Hourly => ".%Y-%m-%d-%H",
            DatePattern::HalfDaily => ".%Y-%m-%d-%p",
            DatePattern::Daily => ".%Y-%m-%d",
            DatePattern::Weekly => ".%Y-W%W",
            DatePattern::Monthly => ".%Y-%m",
        }
    }

    /// Backup suffix for the period starting at `period_start`
    pub fn suffix(self, period_start: NaiveDateTime) -> String {
        period_start.format(self.suffix_format()).to_string()
    }
}

impl FromStr for DatePattern {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minutely" => Ok(DatePattern::Minutely),
            "hourly" => Ok(DatePattern::Hourly),
            "half-daily" | "halfdaily" => Ok(DatePattern::HalfDaily),
            "daily" => Ok(DatePattern::Daily),
            "weekly" => Ok(DatePattern::Weekly),
            "monthly" => Ok(DatePattern::Monthly),
            other => Err(LoggerError::config(
                "DatePattern",
                format!("unknown date pattern '{}'", other),
            )),
        }
    }
}

/// When to roll the live file over
///
/// # Examples
///
/// ```
/// use rust_logger_dispatch::appenders::{DatePattern, RotationStrategy};
///
/// // Roll over before the file would exceed 100 MB
/// let by_size = RotationStrategy::size(100 * 1024 * 1024);
///
/// // Roll over at midnight
/// let by_date = RotationStrategy::date(DatePattern::Daily);
///
/// // Numbered backups on size, dated backups at each new hour
/// let both = RotationStrategy::hybrid(50 * 1024 * 1024, DatePattern::Hourly);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RotationStrategy {
    /// Roll over before a write would take the file past `max_bytes`
    Size { max_bytes: u64 },

    /// Roll over when a new calendar period starts
    Date { pattern: DatePattern },

    /// Size and date, whichever comes first
    Hybrid { max_bytes: u64, pattern: DatePattern },

    /// No rollover (useful for testing or when external rotation is used)
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::Size {
            max_bytes: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl RotationStrategy {
    #[must_use]
    pub fn size(max_bytes: u64) -> Self {
        RotationStrategy::Size { max_bytes }
    }

    #[must_use]
    pub fn date(pattern: DatePattern) -> Self {
        RotationStrategy::Date { pattern }
    }

    #[must_use]
    pub fn hybrid(max_bytes: u64, pattern: DatePattern) -> Self {
        RotationStrategy::Hybrid { max_bytes, pattern }
    }

    #[must_use]
    pub fn never() -> Self {
        RotationStrategy::Never
    }

    pub fn max_bytes(&self) -> Option<u64> {
        match self {
            RotationStrategy::Size { max_bytes } | RotationStrategy::Hybrid { max_bytes, .. } => {
                Some(*max_bytes)
            }
            _ => None,
        }
    }

    pub fn date_pattern(&self) -> Option<DatePattern> {
        match self {
            RotationStrategy::Date { pattern } | RotationStrategy::Hybrid { pattern, .. } => {
                Some(*pattern)
            }
            _ => None,
        }
    }
}

/// Rollover configuration
///
/// # Examples
///
/// ```
/// use rust_logger_dispatch::appenders::RollingPolicy;
///
/// // 50 MB files, seven numbered backups, gzip-compressed
/// let policy = RollingPolicy::new()
///     .with_max_size(50 * 1024 * 1024)
///     .with_max_backup_index(7)
///     .with_compression(true);
/// assert_eq!(policy.strategy.max_bytes(), Some(50 * 1024 * 1024));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingPolicy {
    pub strategy: RotationStrategy,
    /// Highest numbered backup kept by size rollover; 0 keeps none
    pub max_backup_index: usize,
    /// Gzip rolled backups to `<backup>.gz`
    pub compress: bool,
}

impl Default for RollingPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            max_backup_index: 1,
            compress: false,
        }
    }
}

impl RollingPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for `with_strategy(RotationStrategy::Size { max_bytes })`
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, max_bytes: u64) -> Self {
        self.strategy = RotationStrategy::Size { max_bytes };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backup_index(mut self, index: usize) -> Self {
        self.max_backup_index = index;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Size,
    Date,
}

/// Everything captured at activation; property changes wait for the next one
struct RollingState {
    stream: WriterState,
    path: Option<PathBuf>,
    config: FileConfig,
    policy: RollingPolicy,
    period_start: Option<NaiveDateTime>,
    next_rollover: Option<NaiveDateTime>,
}

impl RollingState {
    fn reschedule(&mut self, now: NaiveDateTime) {
        match self.policy.strategy.date_pattern() {
            Some(pattern) => {
                self.period_start = Some(pattern.period_start(now));
                self.next_rollover = Some(pattern.next_boundary(now));
            }
            None => {
                self.period_start = None;
                self.next_rollover = None;
            }
        }
    }

    fn due(&self, incoming: usize, now: NaiveDateTime) -> Option<Trigger> {
        if self.next_rollover.is_some_and(|next| now >= next) {
            return Some(Trigger::Date);
        }

        let max_bytes = self.policy.strategy.max_bytes()?;
        let would_be = self.stream.bytes_written() + incoming as u64;
        (self.stream.has_content() && would_be > max_bytes).then_some(Trigger::Size)
    }
}

/// File appender with size and date rollover
///
/// # Examples
///
/// ```no_run
/// use rust_logger_dispatch::appenders::{DatePattern, RollingFileAppender, RollingPolicy, RotationStrategy};
/// use rust_logger_dispatch::core::Appender;
///
/// let appender = RollingFileAppender::new("/var/log/app.log").with_policy(
///     RollingPolicy::new()
///         .with_strategy(RotationStrategy::date(DatePattern::Daily))
///         .with_compression(true),
/// );
/// appender.activate().unwrap();
/// ```
pub struct RollingFileAppender {
    core: AppenderCore,
    config: RwLock<FileConfig>,
    policy: RwLock<RollingPolicy>,
    state: Mutex<RollingState>,
}

impl RollingFileAppender {
    pub fn new(file: impl Into<String>) -> Self {
        Self::from_config("rolling_file", FileConfig::new(file), RollingPolicy::default())
    }

    pub fn from_config(name: impl Into<String>, config: FileConfig, policy: RollingPolicy) -> Self {
        Self {
            core: AppenderCore::new(name),
            state: Mutex::new(RollingState {
                stream: WriterState::default(),
                path: None,
                config: config.clone(),
                policy: policy.clone(),
                period_start: None,
                next_rollover: None,
            }),
            config: RwLock::new(config),
            policy: RwLock::new(policy),
        }
    }

    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.core.set_name(name);
        self
    }

    #[must_use]
    pub fn with_layout(self, layout: impl Layout + 'static) -> Self {
        self.core.set_layout(Arc::new(layout));
        self
    }

    #[must_use]
    pub fn with_policy(self, policy: RollingPolicy) -> Self {
        self.set_policy(policy);
        self
    }

    #[must_use]
    pub fn with_append(self, append: bool) -> Self {
        self.config.write().append = append;
        self
    }

    #[must_use]
    pub fn with_buffered(self, buffered: bool) -> Self {
        self.config.write().buffered = buffered;
        self
    }

    #[must_use]
    pub fn with_immediate_flush(self, immediate_flush: bool) -> Self {
        self.config.write().immediate_flush = immediate_flush;
        self
    }

    pub fn set_file(&self, file: impl Into<String>) {
        self.config.write().file = file.into();
    }

    pub fn set_append(&self, append: bool) {
        self.config.write().append = append;
    }

    pub fn set_buffered(&self, buffered: bool) {
        self.config.write().buffered = buffered;
    }

    pub fn set_immediate_flush(&self, immediate_flush: bool) {
        self.config.write().immediate_flush = immediate_flush;
    }

    pub fn set_policy(&self, policy: RollingPolicy) {
        *self.policy.write() = policy;
    }

    pub fn set_strategy(&self, strategy: RotationStrategy) {
        self.policy.write().strategy = strategy;
    }

    pub fn set_max_backup_index(&self, index: usize) {
        self.policy.write().max_backup_index = index;
    }

    pub fn set_compress(&self, compress: bool) {
        self.policy.write().compress = compress;
    }

    pub fn config(&self) -> FileConfig {
        self.config.read().clone()
    }

    pub fn policy(&self) -> RollingPolicy {
        self.policy.read().clone()
    }

    /// Bytes in the live file, header included
    pub fn current_size(&self) -> u64 {
        self.state.lock().stream.bytes_written()
    }

    /// Scheduled date rollover, if the strategy has one
    pub fn next_rollover(&self) -> Option<NaiveDateTime> {
        self.state.lock().next_rollover
    }

    /// Suffix the live file will get at the next date rollover
    pub fn period_suffix(&self) -> Option<String> {
        let state = self.state.lock();
        let pattern = state.policy.strategy.date_pattern()?;
        state.period_start.map(|start| pattern.suffix(start))
    }

    /// Expanded path of the live file
    pub fn path(&self) -> Option<PathBuf> {
        self.state.lock().path.clone()
    }

    /// Recompute the date schedule as if the current period contained `now`
    pub(crate) fn schedule_from(&self, now: NaiveDateTime) {
        self.state.lock().reschedule(now);
    }

    pub(crate) fn write_at(&self, event: &LoggingEvent, now: NaiveDateTime) -> Result<()> {
        let layout = self.core.layout();
        let bytes = render(layout.as_deref(), event);

        let mut state = self.state.lock();

        if !state.stream.is_open() {
            // a previous rollover could not reopen the file
            self.reopen(&mut state, layout.as_deref())?;
        }

        if let Some(trigger) = state.due(bytes.len(), now) {
            if let Err(err) = self.roll_over(&mut state, layout.as_deref(), trigger, now) {
                self.core.defer_report(err);
            }
        }

        let flush = state.config.immediate_flush;
        let RollingState { stream, path, .. } = &mut *state;
        stream.write_bytes(&bytes, flush).map_err(|e| {
            LoggerError::file_appender(display(path.as_deref()), "Failed to write log entry", e)
        })
    }

    fn reopen(&self, state: &mut RollingState, layout: Option<&dyn Layout>) -> Result<()> {
        let path = state
            .path
            .clone()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        let (writer, _) = open_file(&path, true, state.config.buffered)?;
        // restart the size count so a failed rollover is only retried at the next threshold
        state
            .stream
            .open(writer, 0, layout)
            .map_err(|e| LoggerError::file_appender(display(Some(&path)), "Failed to write header", e))
    }

    /// Close the live file, move it aside and open a fresh one
    ///
    /// Whatever happens, a live file is reopened and the schedule reset; the
    /// first failure is returned for reporting.
    fn roll_over(
        &self,
        state: &mut RollingState,
        layout: Option<&dyn Layout>,
        trigger: Trigger,
        now: NaiveDateTime,
    ) -> Result<()> {
        let Some(path) = state.path.clone() else {
            return Ok(());
        };
        let mut first_error: Option<LoggerError> = None;
        let mut keep = |result: Result<()>| {
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        };

        let (_, closed) = state.stream.close(layout);
        keep(closed.map_err(|e| {
            LoggerError::file_rotation(display(Some(&path)), "Failed to flush before rollover", Some(e))
        }));

        let backup = match trigger {
            Trigger::Size => {
                let max_index = state.policy.max_backup_index;
                let shifted = shift_backups(&path, max_index);
                let failed = shifted.is_err();
                keep(shifted);
                if max_index == 0 || failed {
                    None
                } else {
                    Some(backup_path(&path, 1, max_index))
                }
            }
            Trigger::Date => state
                .policy
                .strategy
                .date_pattern()
                .zip(state.period_start)
                .map(|(pattern, start)| with_suffix(&path, &pattern.suffix(start))),
        };

        match backup {
            Some(backup) => {
                let moved = replace_backup(&path, &backup);
                let ok = moved.is_ok();
                keep(moved);
                if ok && state.policy.compress {
                    keep(compress_file(&backup));
                }
            }
            None if trigger == Trigger::Size && state.policy.max_backup_index == 0 => {
                // no backups kept: start over in the same file
                keep(truncate(&path));
            }
            None => {}
        }

        keep(self.reopen(state, layout));
        state.reschedule(now);

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Appender for RollingFileAppender {
    fn core(&self) -> &AppenderCore {
        &self.core
    }

    fn open(&self) -> Result<()> {
        let config = self.config();
        let policy = self.policy();
        let path = expand_path(&config.file)?;
        let layout = self.core.layout();

        let now = Local::now().naive_local();
        // an appended file belongs to the period it was last written in
        let reference = if config.append {
            fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(|modified| DateTime::<Local>::from(modified).naive_local())
                .unwrap_or(now)
        } else {
            now
        };

        let (writer, existing) = open_file(&path, config.append, config.buffered)?;

        let mut state = self.state.lock();
        state.config = config;
        state.policy = policy;
        state
            .stream
            .open(writer, existing, layout.as_deref())
            .map_err(|e| LoggerError::file_appender(display(Some(&path)), "Failed to write header", e))?;
        state.path = Some(path);
        state.reschedule(reference.min(now));
        Ok(())
    }

    fn release(&self) -> Result<()> {
        let layout = self.core.layout();
        let mut state = self.state.lock();
        let (_, result) = state.stream.close(layout.as_deref());
        let path = state.path.take();
        state.next_rollover = None;
        state.period_start = None;
        result.map_err(|e| LoggerError::file_appender(display(path.as_deref()), "Failed to close", e))
    }

    fn write(&self, event: &LoggingEvent) -> Result<()> {
        self.write_at(event, Local::now().naive_local())
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        let RollingState { stream, path, .. } = &mut *state;
        stream
            .flush()
            .map_err(|e| LoggerError::file_appender(display(path.as_deref()), "Failed to flush", e))
    }
}

impl Drop for RollingFileAppender {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn display(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// `<file>.<index>`, the index zero-padded to the width of `max_index`
fn backup_path(path: &Path, index: usize, max_index: usize) -> PathBuf {
    let width = max_index.to_string().len();
    with_suffix(path, &format!(".{:0width$}", index, width = width))
}

fn gz_path(path: &Path) -> PathBuf {
    with_suffix(path, ".gz")
}

fn remove_if_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_file(path).map_err(|e| {
        LoggerError::file_rotation(display(Some(path)), "Failed to remove old backup", Some(e))
    })
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| {
        LoggerError::file_rotation(
            display(Some(from)),
            format!("Failed to rename to {}", to.display()),
            Some(e),
        )
    })
}

/// Drop the highest backup and move every other one up by one
fn shift_backups(path: &Path, max_index: usize) -> Result<()> {
    if max_index == 0 {
        return Ok(());
    }

    let oldest = backup_path(path, max_index, max_index);
    remove_if_exists(&gz_path(&oldest))?;
    remove_if_exists(&oldest)?;

    for index in (1..max_index).rev() {
        let from = backup_path(path, index, max_index);
        let to = backup_path(path, index + 1, max_index);
        if gz_path(&from).exists() {
            rename(&gz_path(&from), &gz_path(&to))?;
        }
        if from.exists() {
            rename(&from, &to)?;
        }
    }
    Ok(())
}

/// Move the live file to `backup`, replacing an older backup of the same name
fn replace_backup(path: &Path, backup: &Path) -> Result<()> {
    remove_if_exists(&gz_path(backup))?;
    remove_if_exists(backup)?;
    if path.exists() {
        rename(path, backup)?;
    }
    Ok(())
}

fn truncate(path: &Path) -> Result<()> {
    File::create(path).map(drop).map_err(|e| {
        LoggerError::file_rotation(display(Some(path)), "Failed to truncate log file", Some(e))
    })
}

/// Gzip `path` into `<path>.gz`
///
/// The archive is written to a temporary file and renamed into place; the
/// original is only removed once compression fully succeeded.
fn compress_file(path: &Path) -> Result<()> {
    let gz = gz_path(path);
    let temp = with_suffix(path, ".gz.tmp");

    let compressed = (|| -> io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let output = BufWriter::with_capacity(64 * 1024, File::create(&temp)?);
        let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
        fs::rename(&temp, &gz)
    })();

    if let Err(e) = compressed {
        let _ = fs::remove_file(&temp);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::remove_file(path).map_err(|e| {
        LoggerError::file_rotation(
            display(Some(path)),
            "Compressed but failed to remove the original",
            Some(e),
        )
    })
}
