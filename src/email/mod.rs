//! Outbound email: transports, templates, and the background dispatcher

pub mod mailer;
pub mod notifier;
pub mod templates;

pub use mailer::{
    BrevoMailer, ConsoleMailer, MailConfig, Mailer, MemoryMailer, SentEmail, SmtpMailer,
};
pub use notifier::{Notifier, NotifierConfig};
