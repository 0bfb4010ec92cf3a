use tracing::{info, warn};

/// Leveled progress output for a migration run.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);

    /// A step or the whole run finished successfully.
    fn success(&self, message: &str);

    fn warn(&self, message: &str);
}

/// Forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn success(&self, message: &str) {
        info!(outcome = "success", "{message}");
    }

    fn warn(&self, message: &str) {
        warn!("{message}");
    }
}
