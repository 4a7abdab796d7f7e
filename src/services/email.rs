//! Account lifecycle email notifications

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use crate::config::EmailConfig;
use crate::models::User;

/// A rendered plain-text email
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to_address: String,
    pub to_name: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;
}

/// SMTP delivery via lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        }
        .with_context(|| format!("Invalid SMTP host: {}", config.smtp_host))?;

        let mut builder = builder
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let address: Address = config
            .from_address
            .parse()
            .with_context(|| format!("Invalid from address: {}", config.from_address))?;

        Ok(Self {
            transport: builder.build(),
            from: Mailbox::new(Some(config.from_name.clone()), address),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<()> {
        let to_address: Address = email
            .to_address
            .parse()
            .with_context(|| format!("Invalid recipient address: {}", email.to_address))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(Some(email.to_name.clone()), to_address))
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .context("Failed to build email message")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        info!(to = %email.to_address, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Used when `email.enabled` is false; every send reports failure
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, email: Email) -> Result<()> {
        debug!(to = %email.to_address, subject = %email.subject, "Email delivery disabled");
        anyhow::bail!("Email delivery is disabled")
    }
}

pub fn build_mailer(config: &EmailConfig) -> Result<Arc<dyn Mailer>> {
    if config.enabled {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        Ok(Arc::new(DisabledMailer))
    }
}

pub mod templates {
    use super::Email;
    use crate::models::User;

    /// Lifecycle events that notify the account holder
    #[derive(Debug, Clone, PartialEq)]
    pub enum AccountNotice {
        AccountCreated,
        AccountBanned { reason: Option<String> },
        AccountUnbanned,
        AccountDeleted,
        AccountRestored,
        AccountPurged,
    }

    impl AccountNotice {
        pub fn subject(&self) -> &'static str {
            match self {
                AccountNotice::AccountCreated => "Your LMS account has been created",
                AccountNotice::AccountBanned { .. } => "Your LMS account has been suspended",
                AccountNotice::AccountUnbanned => "Your LMS account has been reinstated",
                AccountNotice::AccountDeleted => "Your LMS account has been deleted",
                AccountNotice::AccountRestored => "Your LMS account has been restored",
                AccountNotice::AccountPurged => "Your LMS account data has been removed",
            }
        }

        fn paragraph(&self, user: &User, public_url: &str) -> String {
            match self {
                AccountNotice::AccountCreated => format!(
                    "An account with the username \"{}\" and role {} has been created for you.\n\
                     You can sign in at {}.",
                    user.username, user.role, public_url
                ),
                AccountNotice::AccountBanned { reason } => {
                    let mut text = String::from(
                        "Your account has been suspended and you can no longer sign in.",
                    );
                    if let Some(reason) = reason.as_deref().filter(|r| !r.trim().is_empty()) {
                        text.push_str(&format!("\nReason: {}", reason.trim()));
                    }
                    text.push_str("\nContact an administrator if you believe this is a mistake.");
                    text
                }
                AccountNotice::AccountUnbanned => format!(
                    "Your account suspension has been lifted. You can sign in again at {}.",
                    public_url
                ),
                AccountNotice::AccountDeleted => String::from(
                    "Your account has been deleted. An administrator can still restore it \
                     for a limited time.",
                ),
                AccountNotice::AccountRestored => format!(
                    "Your account has been restored. You can sign in again at {}.",
                    public_url
                ),
                AccountNotice::AccountPurged => String::from(
                    "Your account and its activity history have been permanently removed.",
                ),
            }
        }

        pub fn render(&self, user: &User, public_url: &str) -> Email {
            let body = format!(
                "Hello {},\n\n{}\n\n-- LMS Administration\n",
                user.full_name,
                self.paragraph(user, public_url)
            );
            Email {
                to_address: user.email.clone(),
                to_name: user.full_name.clone(),
                subject: self.subject().to_string(),
                body,
            }
        }
    }
}

/// Render and send `notice` to `user`, returning whether it went out
pub async fn notify(
    mailer: &dyn Mailer,
    notice: &templates::AccountNotice,
    user: &User,
    public_url: &str,
) -> bool {
    match mailer.send(notice.render(user, public_url)).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                user_id = %user.id,
                subject = notice.subject(),
                error = %e,
                "Notification email not sent"
            );
            false
        }
    }
}
