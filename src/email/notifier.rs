//! Background Notification Dispatch
//! Mission: Fire-and-forget emails that can never fail or stall a request
//!
//! Handlers enqueue a job and return immediately. A single worker task drains
//! the queue, renders the message, and sends it under a timeout. Failures are
//! logged and counted, never propagated back.

use crate::email::mailer::Mailer;
use crate::email::templates;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum EmailJob {
    PasswordReset { to: String, token: String },
    Welcome { to: String, first_name: String },
}

impl EmailJob {
    fn kind(&self) -> &'static str {
        match self {
            EmailJob::PasswordReset { .. } => "password_reset",
            EmailJob::Welcome { .. } => "welcome",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub frontend_url: String,
    pub reset_ttl_minutes: i64,
    pub send_timeout: Duration,
}

/// Handle for submitting notification jobs. Cheap to clone.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<EmailJob>,
}

impl Notifier {
    /// Spawn the delivery worker on the current tokio runtime
    pub fn spawn(mailer: Arc<dyn Mailer>, config: NotifierConfig) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        info!(transport = mailer.kind(), "📧 Notification worker started");
        tokio::spawn(delivery_worker(rx, mailer, config));
        Self { tx }
    }

    pub fn send_password_reset_email(&self, to: &str, token: &str) {
        self.submit(EmailJob::PasswordReset {
            to: to.to_string(),
            token: token.to_string(),
        });
    }

    pub fn send_welcome_email(&self, to: &str, first_name: &str) {
        self.submit(EmailJob::Welcome {
            to: to.to_string(),
            first_name: first_name.to_string(),
        });
    }

    fn submit(&self, job: EmailJob) {
        let kind = job.kind();
        match self.tx.try_send(job) {
            Ok(()) => debug!(kind, "Email job queued"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind, "⚠️ Email queue full, dropping message");
                metrics::increment_counter!("auth_email_send_total", "kind" => kind, "outcome" => "dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(kind, "⚠️ Email worker stopped, dropping message");
                metrics::increment_counter!("auth_email_send_total", "kind" => kind, "outcome" => "dropped");
            }
        }
    }
}

async fn delivery_worker(
    mut rx: mpsc::Receiver<EmailJob>,
    mailer: Arc<dyn Mailer>,
    config: NotifierConfig,
) {
    while let Some(job) = rx.recv().await {
        let kind = job.kind();
        let (to, subject, html) = render(&job, &config);

        if mailer.is_preview() {
            if let EmailJob::PasswordReset { token, .. } = &job {
                // Development preview: without a transport the link only exists here.
                info!(
                    to = %to,
                    link = %templates::reset_link(&config.frontend_url, token),
                    "📧 Password reset email (console preview)"
                );
            }
        }

        match tokio::time::timeout(config.send_timeout, mailer.send(&to, subject, &html)).await {
            Ok(Ok(())) => {
                debug!(kind, transport = mailer.kind(), "Email sent");
                metrics::increment_counter!("auth_email_send_total", "kind" => kind, "outcome" => "ok");
            }
            Ok(Err(e)) => {
                warn!(kind, transport = mailer.kind(), "Failed to send email: {:#}", e);
                metrics::increment_counter!("auth_email_send_total", "kind" => kind, "outcome" => "error");
            }
            Err(_) => {
                warn!(
                    kind,
                    transport = mailer.kind(),
                    timeout_secs = config.send_timeout.as_secs(),
                    "Email send timed out"
                );
                metrics::increment_counter!("auth_email_send_total", "kind" => kind, "outcome" => "timeout");
            }
        }
    }

    debug!("Notification worker exiting");
}

fn render(job: &EmailJob, config: &NotifierConfig) -> (String, &'static str, String) {
    match job {
        EmailJob::PasswordReset { to, token } => {
            let link = templates::reset_link(&config.frontend_url, token);
            (
                to.clone(),
                templates::RESET_SUBJECT,
                templates::password_reset_html(&link, config.reset_ttl_minutes),
            )
        }
        EmailJob::Welcome { to, first_name } => (
            to.clone(),
            templates::WELCOME_SUBJECT,
            templates::welcome_html(&config.frontend_url, first_name),
        ),
    }
}
