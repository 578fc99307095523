use std::sync::Arc;

use crate::error::{BatchError, Result};
use crate::scheduler::SchedulerClient;

/// A scheduler client plus the application name used to open sessions.
///
/// Every operation opens its own session first; nothing is cached here.
#[derive(Clone)]
pub struct Session {
    client: Arc<dyn SchedulerClient>,
    app_name: Arc<str>,
}

impl Session {
    pub fn new(client: Arc<dyn SchedulerClient>, app_name: &str) -> Self {
        Self {
            client,
            app_name: Arc::from(app_name),
        }
    }

    pub fn client(&self) -> &dyn SchedulerClient {
        self.client.as_ref()
    }

    pub async fn open(&self) -> Result<()> {
        self.client.open_session(&self.app_name).await.map_err(|fault| {
            let message = self.diagnostic("session open failed");
            tracing::error!(app_name = %self.app_name, ?fault, %message, "Scheduler session unavailable");
            BatchError::Connection(message)
        })
    }

    /// `context` followed by the scheduler's last error text, when it has one.
    pub fn diagnostic(&self, context: &str) -> String {
        match self.client.last_error() {
            Some(text) if !text.trim().is_empty() => format!("{}: {}", context, text.trim()),
            _ => context.to_string(),
        }
    }
}
