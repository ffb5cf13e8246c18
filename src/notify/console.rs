use super::Notifier;

/// Notifier writing to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl Notifier for Console {
    fn name(&self) -> &str {
        "console"
    }

    fn info(&self, msg: &str) {
        tracing::info!("{}", msg);
    }

    fn success(&self, msg: &str) {
        tracing::info!("{}", msg);
    }

    fn failure(&self, msg: &str) {
        tracing::error!("{}", msg);
    }
}
