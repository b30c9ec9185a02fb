//! Thread-safe ordered registry of appenders
//!
//! Fan-out only ever takes the shared lock; attach and detach check under the
//! shared lock first and take the exclusive lock only to mutate.

use super::appender::{same_appender, Appender};
use super::error::LoggerError;
use super::error_handler;
use super::logging_event::LoggingEvent;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[derive(Default)]
pub struct AppenderAttachable {
    appenders: RwLock<Vec<Arc<dyn Appender>>>,
}

impl AppenderAttachable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `appender`; attaching an already attached instance is a no-op
    ///
    /// Returns `true` if the appender was added.
    pub fn add_appender(&self, appender: Arc<dyn Appender>) -> bool {
        if self.is_attached(&appender) {
            Self::warn_duplicate(&appender);
            return false;
        }

        let mut appenders = self.appenders.write();
        // another thread may have attached it between the two locks
        if appenders.iter().any(|a| same_appender(a, &appender)) {
            drop(appenders);
            Self::warn_duplicate(&appender);
            return false;
        }
        appenders.push(appender);
        true
    }

    fn warn_duplicate(appender: &Arc<dyn Appender>) {
        let name = appender.name();
        error_handler::report_default("AppenderAttachable", &LoggerError::duplicate(name));
    }

    /// Detach `appender`; detaching an absent appender is a silent no-op
    pub fn remove_appender(&self, appender: &Arc<dyn Appender>) -> bool {
        if !self.is_attached(appender) {
            return false;
        }

        let mut appenders = self.appenders.write();
        match appenders.iter().position(|a| same_appender(a, appender)) {
            Some(index) => {
                appenders.remove(index);
                true
            }
            None => false,
        }
    }

    /// Detach the first appender called `name`, handing back the registry's handle
    pub fn remove_appender_by_name(&self, name: &str) -> Option<Arc<dyn Appender>> {
        self.appender(name)?;

        let mut appenders = self.appenders.write();
        let index = appenders.iter().position(|a| a.name() == name)?;
        Some(appenders.remove(index))
    }

    /// Detach everything except configuration collectors
    pub fn remove_all_appenders(&self) {
        self.appenders
            .write()
            .retain(|a| a.core().is_configuration_collector());
    }

    /// Snapshot of the attached appenders in attachment order
    pub fn appenders(&self) -> Vec<Arc<dyn Appender>> {
        self.appenders.read().clone()
    }

    pub fn appender(&self, name: &str) -> Option<Arc<dyn Appender>> {
        self.appenders
            .read()
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    pub fn is_attached(&self, appender: &Arc<dyn Appender>) -> bool {
        self.appenders
            .read()
            .iter()
            .any(|a| same_appender(a, appender))
    }

    pub fn len(&self) -> usize {
        self.appenders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.appenders.read().is_empty()
    }

    /// Deliver `event` to every attached appender on the caller's stack
    ///
    /// The appender list is snapshotted under the shared lock, so an appender
    /// detached mid-dispatch stays alive until this call finishes with it.
    /// Returns how many appenders wrote the event without error.
    pub fn call_appenders(&self, event: &LoggingEvent) -> usize {
        let appenders = self.appenders();

        appenders
            .iter()
            .filter(|appender| {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    appender.append(event)
                }));
                match outcome {
                    Ok(result) => result.is_ok(),
                    Err(panic_info) => {
                        appender.core().report(&LoggerError::other(format!(
                            "appender panicked: {}. Other appenders continue to function.",
                            panic_message(panic_info.as_ref())
                        )));
                        false
                    }
                }
            })
            .count()
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

impl fmt::Debug for AppenderAttachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.appenders.read().iter().map(|a| a.name()).collect();
        f.debug_struct("AppenderAttachable")
            .field("appenders", &names)
            .finish()
    }
}

/// Owners of an appender registry
///
/// Implemented by [`Logger`](crate::core::Logger) and the dispatching
/// appenders so that all of them expose the same attach/detach surface.
pub trait Attachable {
    fn attachable(&self) -> &AppenderAttachable;

    fn add_appender(&self, appender: Arc<dyn Appender>) -> bool {
        self.attachable().add_appender(appender)
    }

    fn remove_appender(&self, appender: &Arc<dyn Appender>) -> bool {
        self.attachable().remove_appender(appender)
    }

    fn remove_appender_by_name(&self, name: &str) -> Option<Arc<dyn Appender>> {
        self.attachable().remove_appender_by_name(name)
    }

    fn remove_all_appenders(&self) {
        self.attachable().remove_all_appenders()
    }

    fn appenders(&self) -> Vec<Arc<dyn Appender>> {
        self.attachable().appenders()
    }

    fn appender(&self, name: &str) -> Option<Arc<dyn Appender>> {
        self.attachable().appender(name)
    }

    fn is_attached(&self, appender: &Arc<dyn Appender>) -> bool {
        self.attachable().is_attached(appender)
    }
}
