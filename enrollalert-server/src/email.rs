//! Outgoing mail
//!
//! Only the welcome message is sent from the API; seat alerts go out from
//! the watcher. Without an SMTP host configured the [`LogMailer`] records
//! what would have been sent.

use async_trait::async_trait;
use enrollalert_core::config::EmailSection;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("invalid address '{0}'")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("smtp: {0}")]
    Transport(String),
}

/// A rendered message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// The one-time welcome message.
pub fn welcome_email(to: &str) -> OutgoingEmail {
    let text = "Welcome to EnrollAlert!\n\n\
        You're all set. Save the sections you want and we'll email you as \
        soon as a seat opens up.\n\n\
        You can manage your alerts any time from the My Courses page.\n\n\
        Good luck with enrollment!\n\
        The EnrollAlert team\n";

    let html = "<!DOCTYPE html>\
        <html><body style=\"font-family: Arial, sans-serif; color: #1f2937;\">\
        <h2>Welcome to EnrollAlert!</h2>\
        <p>You're all set. Save the sections you want and we'll email you \
        as soon as a seat opens up.</p>\
        <p>You can manage your alerts any time from the <strong>My Courses</strong> page.</p>\
        <p>Good luck with enrollment!<br>The EnrollAlert team</p>\
        </body></html>";

    OutgoingEmail {
        to: to.to_owned(),
        subject: "Welcome to EnrollAlert".to_owned(),
        text: text.to_owned(),
        html: html.to_owned(),
    }
}

/// SMTP delivery via STARTTLS relay
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &EmailSection, host: &str) -> Result<Self, EmailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| EmailError::Address(config.from.clone()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| EmailError::Transport(e.to_string()))?
            .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            from,
            transport: builder.build(),
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, EmailError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|_| EmailError::Address(email.to.clone()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )
            .map_err(|e| EmailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let message = self.build_message(&email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        tracing::info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Logs instead of sending
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "smtp not configured, email not sent"
        );
        Ok(())
    }
}

/// SMTP when a host is configured, otherwise log only.
pub fn mailer_from_config(config: &EmailSection) -> Result<Box<dyn Mailer>, EmailError> {
    match config.smtp_host.as_deref().filter(|h| !h.is_empty()) {
        Some(host) => Ok(Box::new(SmtpMailer::new(config, host)?)),
        None => {
            tracing::warn!("EMAIL: no smtp_host configured, mail will only be logged");
            Ok(Box::new(LogMailer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config() -> EmailSection {
        EmailSection {
            smtp_host: Some("smtp.example.com".into()),
            ..EmailSection::default()
        }
    }

    #[test]
    fn welcome_has_both_bodies() {
        let email = welcome_email("bucky@wisc.edu");
        assert_eq!(email.to, "bucky@wisc.edu");
        assert!(email.subject.contains("Welcome"));
        assert!(email.text.contains("seat opens up"));
        assert!(email.html.starts_with("<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn builds_multipart_message() {
        let mailer = SmtpMailer::new(&smtp_config(), "smtp.example.com").unwrap();
        let message = mailer
            .build_message(&welcome_email("bucky@wisc.edu"))
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("To: bucky@wisc.edu"));
    }

    #[tokio::test]
    async fn rejects_bad_recipient() {
        let mailer = SmtpMailer::new(&smtp_config(), "smtp.example.com").unwrap();
        let err = mailer.send(welcome_email("not an address")).await.unwrap_err();
        assert!(matches!(err, EmailError::Address(_)));
    }

    #[test]
    fn rejects_bad_sender() {
        let config = EmailSection {
            from: "nobody".into(),
            ..smtp_config()
        };
        assert!(matches!(
            SmtpMailer::new(&config, "smtp.example.com"),
            Err(EmailError::Address(_))
        ));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        LogMailer.send(welcome_email("a@b.edu")).await.unwrap();
    }
}
