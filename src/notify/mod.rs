//! Run notifications
//!
//! A [`NotifierHolder`] fans every message out to the console notifier plus
//! whichever notifiers the settings file enables. Delivery problems are
//! logged by the notifier and never reach the caller.

mod console;
mod gotify;

pub use console::Console;
pub use gotify::{Gotify, GotifyMessage, GotifySettings};

use serde_yaml::Value;

use crate::error::{BackupError, Result};

/// A destination for run notifications.
pub trait Notifier: Send + Sync {
    /// Name used in the settings file
    fn name(&self) -> &str;

    /// Progress information
    fn info(&self, msg: &str);

    /// The run completed
    fn success(&self, msg: &str);

    /// The run failed
    fn failure(&self, msg: &str);
}

/// Build the configurable notifier called `name` from its settings.
fn build(name: &str, settings: &Value) -> Result<Box<dyn Notifier>> {
    match name {
        "gotify" => Ok(Box::new(Gotify::from_settings(settings)?)),
        _ => Err(BackupError::notifier(format!("unknown notifier: {}", name))),
    }
}

/// Every active notifier, in the order they were added
#[derive(Default)]
pub struct NotifierHolder {
    active: Vec<Box<dyn Notifier>>,
}

impl NotifierHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `settings` and activate the notifier called `name`.
    ///
    /// # Errors
    ///
    /// `unknown notifier: <name>` for an unregistered name, or the notifier's
    /// own validation message.
    pub fn add(&mut self, name: &str, settings: &Value) -> Result<()> {
        let notifier = build(name, settings)?;
        tracing::debug!("notifier enabled: {}", notifier.name());
        self.active.push(notifier);
        Ok(())
    }

    /// Activate the console notifier
    pub fn add_console(&mut self) {
        self.active.push(Box::new(Console));
    }

    /// Activate an already built notifier
    pub fn push(&mut self, notifier: Box<dyn Notifier>) {
        self.active.push(notifier);
    }

    /// Names of the active notifiers
    pub fn names(&self) -> Vec<&str> {
        self.active.iter().map(|n| n.name()).collect()
    }

    pub fn info(&self, msg: &str) {
        for notifier in &self.active {
            notifier.info(msg);
        }
    }

    pub fn success(&self, msg: &str) {
        for notifier in &self.active {
            notifier.success(msg);
        }
    }

    pub fn failure(&self, msg: &str) {
        for notifier in &self.active {
            notifier.failure(msg);
        }
    }
}

impl std::fmt::Debug for NotifierHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_notifier() {
        let mut holder = NotifierHolder::new();
        let err = holder.add("pager", &Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "Notifier error: unknown notifier: pager");
        assert!(holder.names().is_empty());
    }

    #[test]
    fn test_console_is_added() {
        let mut holder = NotifierHolder::new();
        holder.add_console();
        assert_eq!(holder.names(), vec!["console"]);
        holder.info("hello");
        holder.success("done");
        holder.failure("broken");
    }
}
