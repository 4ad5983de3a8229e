use async_trait::async_trait;
use tracing::{debug, info};

use crate::auth::reset::build_reset_url;

/// Out-of-band delivery of password-reset tokens.
#[async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_reset(&self, email: &str, raw_token: &str) -> anyhow::Result<()>;
}

/// Writes the reset link to the log instead of sending mail.
pub struct TracingMailer {
    frontend_url: String,
}

impl TracingMailer {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into(),
        }
    }
}

#[async_trait]
impl ResetMailer for TracingMailer {
    async fn send_reset(&self, email: &str, raw_token: &str) -> anyhow::Result<()> {
        info!(%email, "password reset mail queued");
        debug!(url = %build_reset_url(&self.frontend_url, raw_token), "password reset link");
        Ok(())
    }
}
