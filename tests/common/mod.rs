//! Shared test doubles

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use backup_orchestrator::{
    Notifier, OperationConfig, PathContext, Plugin, PluginFactory, PluginRegistry, RunOutcome,
    ValidationError,
};

/// Call log shared between a factory, its plugins and the test
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn entries(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Plugin that records each run and fails when configured to
pub struct Recording {
    label: String,
    fail: bool,
    log: CallLog,
}

impl Plugin for Recording {
    fn run(&mut self) -> RunOutcome {
        self.log.lock().unwrap().push(format!("run:{}", self.label));
        if self.fail {
            RunOutcome::failure(format!("{} failed", self.label))
        } else {
            RunOutcome::Success
        }
    }
}

/// Factory named `record`; payload `{label, fail?}`
pub struct RecordingFactory {
    pub log: CallLog,
}

impl PluginFactory for RecordingFactory {
    fn name(&self) -> &str {
        "record"
    }

    fn description(&self) -> &str {
        "records setup and run calls"
    }

    fn setup(
        &self,
        _paths: &PathContext,
        project: &str,
        config: &OperationConfig,
    ) -> Result<Box<dyn Plugin>, ValidationError> {
        let label = format!("{}/{}", project, config.required_str("label")?);
        self.log.lock().unwrap().push(format!("setup:{}", label));
        Ok(Box::new(Recording {
            label,
            fail: config.optional_bool("fail")?.unwrap_or(false),
            log: Arc::clone(&self.log),
        }))
    }
}

/// Registry holding only the recording factory
pub fn recording_registry() -> (PluginRegistry, CallLog) {
    let log = CallLog::default();
    let mut registry = PluginRegistry::new();
    registry
        .register(RecordingFactory {
            log: Arc::clone(&log),
        })
        .unwrap();
    (registry, log)
}

/// Notifier that records every message with its kind
pub struct RecordingNotifier {
    pub log: CallLog,
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn info(&self, msg: &str) {
        self.log.lock().unwrap().push(format!("info:{}", msg));
    }

    fn success(&self, msg: &str) {
        self.log.lock().unwrap().push(format!("success:{}", msg));
    }

    fn failure(&self, msg: &str) {
        self.log.lock().unwrap().push(format!("failure:{}", msg));
    }
}
