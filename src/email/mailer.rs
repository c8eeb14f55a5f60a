//! Mail Transports
//! Mission: Deliver `send(to, subject, html)` through whatever is configured

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Outbound transactional mail capability
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;

    /// Short name for logs
    fn kind(&self) -> &'static str;

    /// True when messages are only logged, never delivered
    fn is_preview(&self) -> bool {
        false
    }
}

/// Fallback when nothing is configured: the message is logged, not delivered
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        info!(
            to,
            subject,
            html_bytes = html.len(),
            "📧 Email not delivered (no transport configured)"
        );
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "console"
    }

    fn is_preview(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Keeps every message in memory. Used by tests and local tooling that need
/// to read back what would have been sent.
#[derive(Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<SentEmail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox.lock().clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        self.outbox.lock().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

/// SMTP relay with STARTTLS and credentials
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Invalid SMTP relay {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();

        let from: Mailbox = format!("Helyx <{}>", config.from)
            .parse()
            .with_context(|| format!("Invalid SMTP_FROM address {}", config.from))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .with_context(|| format!("Invalid recipient address {}", to))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .context("Failed to build email message")?;

        self.transport
            .send(message)
            .await
            .context("SMTP send failed")?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "smtp"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoEmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoSendEmailBody {
    sender: BrevoEmailAddress,
    to: Vec<BrevoEmailAddress>,
    subject: String,
    html_content: String,
}

/// Brevo transactional email over HTTPS
pub struct BrevoMailer {
    http: reqwest::Client,
    api_key: String,
    sender_email: String,
    sender_name: Option<String>,
}

impl BrevoMailer {
    pub fn new(http: reqwest::Client, config: &BrevoConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            sender_email: config.sender_email.clone(),
            sender_name: config.sender_name.clone(),
        }
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let body = BrevoSendEmailBody {
            sender: BrevoEmailAddress {
                email: self.sender_email.clone(),
                name: self.sender_name.clone(),
            },
            to: vec![BrevoEmailAddress {
                email: to.to_string(),
                name: None,
            }],
            subject: subject.to_string(),
            html_content: html.to_string(),
        };

        let resp = self
            .http
            .post(BREVO_SEND_URL)
            .header("api-key", &self.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .context("Brevo request failed")?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        bail!("Brevo send failed (status={}): {}", status, text)
    }

    fn kind(&self) -> &'static str {
        "brevo"
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct BrevoConfig {
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
}

/// Which transport the environment asks for
#[derive(Debug, Clone)]
pub enum MailConfig {
    Smtp(SmtpConfig),
    Brevo(BrevoConfig),
    Console,
}

impl MailConfig {
    /// SMTP wins when fully configured, then Brevo, then the console fallback
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

        if let (Some(host), Some(user), Some(password)) = (
            non_empty("SMTP_HOST"),
            non_empty("SMTP_USER"),
            non_empty("SMTP_PASS"),
        ) {
            let port = non_empty("SMTP_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587);
            let from = non_empty("SMTP_FROM").unwrap_or_else(|| "noreply@helyx.us".to_string());
            return MailConfig::Smtp(SmtpConfig {
                host,
                port,
                user,
                password,
                from,
            });
        }

        if let (Some(api_key), Some(sender_email)) =
            (non_empty("BREVO_API_KEY"), non_empty("BREVO_SENDER_EMAIL"))
        {
            return MailConfig::Brevo(BrevoConfig {
                api_key,
                sender_email,
                sender_name: non_empty("BREVO_SENDER_NAME"),
            });
        }

        MailConfig::Console
    }

    /// Build the transport. A broken SMTP setup degrades to the console
    /// mailer instead of refusing to start.
    pub fn build(&self, http: reqwest::Client) -> Arc<dyn Mailer> {
        match self {
            MailConfig::Smtp(smtp) => match SmtpMailer::new(smtp) {
                Ok(mailer) => Arc::new(mailer),
                Err(e) => {
                    warn!("⚠️ SMTP misconfigured, emails will be logged only: {:#}", e);
                    Arc::new(ConsoleMailer)
                }
            },
            MailConfig::Brevo(brevo) => Arc::new(BrevoMailer::new(http, brevo)),
            MailConfig::Console => {
                warn!("⚠️ No mail transport configured, emails will be logged only");
                Arc::new(ConsoleMailer)
            }
        }
    }
}
