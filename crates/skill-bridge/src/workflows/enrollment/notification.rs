use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::domain::{AttemptId, DispatchOutcome};
use crate::config::SmtpConfig;

/// Payload for the quiz-link email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizNotification {
    pub email: String,
    pub quiz_id: AttemptId,
    pub quiz_url: String,
}

/// Best-effort email delivery. Implementations report problems through
/// [`DispatchOutcome`] instead of failing.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: QuizNotification) -> DispatchOutcome;
}

/// Dispatcher used when no mail transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledDispatcher;

#[async_trait]
impl NotificationDispatcher for DisabledDispatcher {
    async fn dispatch(&self, notification: QuizNotification) -> DispatchOutcome {
        debug!(quiz_id = %notification.quiz_id, "smtp not configured; skipping quiz link email");
        DispatchOutcome::NotConfigured
    }
}

const SUBJECT: &str = "Your Skill Bridge quiz link";

/// SMTP dispatcher over a STARTTLS relay.
pub struct SmtpDispatcher {
    sender: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpDispatcher {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, SmtpSetupError> {
        let sender: Mailbox = config
            .from
            .parse()
            .map_err(|err: lettre::address::AddressError| SmtpSetupError::Sender(err.to_string()))?;
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|err| SmtpSetupError::Relay(err.to_string()))?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self { sender, transport })
    }

    fn compose(&self, notification: &QuizNotification) -> Result<Message, String> {
        let recipient: Mailbox = notification
            .email
            .parse()
            .map_err(|err: lettre::address::AddressError| format!("invalid recipient: {err}"))?;

        Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(SUBJECT)
            .body(quiz_email_body(&notification.quiz_url))
            .map_err(|err| format!("failed to build message: {err}"))
    }
}

#[async_trait]
impl NotificationDispatcher for SmtpDispatcher {
    async fn dispatch(&self, notification: QuizNotification) -> DispatchOutcome {
        let message = match self.compose(&notification) {
            Ok(message) => message,
            Err(reason) => return DispatchOutcome::Failed(reason),
        };

        match self.transport.send(message).await {
            Ok(_) => DispatchOutcome::Delivered,
            Err(err) => DispatchOutcome::Failed(err.to_string()),
        }
    }
}

pub fn quiz_email_body(quiz_url: &str) -> String {
    format!(
        "Your quiz is ready. Open this link to start: {quiz_url}\n\n\
         The timer starts when you first open the quiz. Good luck!\n"
    )
}

#[derive(Debug, thiserror::Error)]
pub enum SmtpSetupError {
    #[error("invalid SMTP_FROM address: {0}")]
    Sender(String),
    #[error("invalid SMTP relay: {0}")]
    Relay(String),
}
