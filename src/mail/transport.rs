//! Mail transport seam — the single `send` contract the pipeline depends on,
//! plus the production SMTP implementation on lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;

use crate::config::IntakeConfig;
use crate::error::{ConfigError, DeliveryError};
use crate::mail::compose::ComposedMessage;

/// Tagged delivery result for one submission. Never silently dropped — it
/// either shapes the HTTP response or lands in a terminal log record.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Sent,
    Failed(DeliveryError),
}

/// The external mail transport, narrowed to one suspend-capable call.
///
/// Implementations must be safe for concurrent use by in-flight submissions.
/// Retry, if ever wanted, belongs in a caller-supplied wrapper around this
/// trait, not in the pipeline.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &ComposedMessage) -> Result<(), DeliveryError>;
}

/// SMTP transport on lettre, constructed once at startup and shared across
/// submissions (lettre's async transport pools connections internally).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the relay from configuration. Fails fast on an unusable host so
    /// a bad deployment dies at startup, not on the first submission.
    pub fn from_config(config: &IntakeConfig) -> Result<Self, ConfigError> {
        let creds = Credentials::new(
            config.mail_user.clone(),
            config.mail_pass.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| ConfigError::InvalidValue {
                key: "SMTP_HOST".into(),
                message: e.to_string(),
            })?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: &ComposedMessage) -> Result<(), DeliveryError> {
        let email = build_outbound(message).await?;

        self.transport.send(email).await.map_err(|e| {
            if e.is_permanent() {
                DeliveryError::TransportRejected(e.to_string())
            } else {
                DeliveryError::NetworkFailure(e.to_string())
            }
        })?;

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Build the wire-level message: HTML body, plus the staged résumé as a
/// `multipart/mixed` attachment under its original file name.
pub(crate) async fn build_outbound(message: &ComposedMessage) -> Result<Message, DeliveryError> {
    let from: Mailbox = message
        .from
        .parse()
        .map_err(|_| DeliveryError::InvalidAddress(message.from.clone()))?;
    let to: Mailbox = message
        .to
        .parse()
        .map_err(|_| DeliveryError::InvalidAddress(message.to.clone()))?;

    let builder = Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.clone());

    let html = SinglePart::html(message.html_body.clone());

    let built = match &message.attachment {
        None => builder
            .singlepart(html)
            .map_err(|e| DeliveryError::Build(e.to_string()))?,
        Some(staged) => {
            let bytes = staged
                .contents()
                .await
                .map_err(|e| DeliveryError::Build(format!("attachment read: {e}")))?;
            let content_type = ContentType::parse(&staged.media_type)
                .map_err(|e| DeliveryError::Build(e.to_string()))?;
            let part = Attachment::new(staged.file_name.clone()).body(bytes, content_type);

            builder
                .multipart(MultiPart::mixed().singlepart(html).singlepart(part))
                .map_err(|e| DeliveryError::Build(e.to_string()))?
        }
    };

    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::attachment::{StagedAttachment, StorageHandle};
    use crate::submission::fields::FieldMap;

    fn message_without_attachment() -> ComposedMessage {
        let fields = FieldMap::from_iter([("fullName", "Jane Doe")]);
        crate::mail::compose::compose(&fields, None, "hr@example.com", "talent@example.com")
    }

    fn message_with_attachment() -> ComposedMessage {
        let fields = FieldMap::from_iter([("fullName", "Jane Doe")]);
        let staged = StagedAttachment {
            file_name: "resume.pdf".into(),
            media_type: "application/pdf".into(),
            size: 5,
            handle: StorageHandle::Memory(b"%PDF-".to_vec()),
        };
        crate::mail::compose::compose(&fields, Some(staged), "hr@example.com", "talent@example.com")
    }

    #[tokio::test]
    async fn plain_message_carries_subject_and_html() {
        let built = build_outbound(&message_without_attachment()).await.unwrap();
        let wire = String::from_utf8_lossy(&built.formatted()).to_string();

        assert!(wire.contains("Subject: New Candidate: Jane Doe"));
        assert!(wire.contains("text/html"));
        assert!(!wire.contains("multipart/mixed"));
    }

    #[tokio::test]
    async fn attachment_message_is_multipart_mixed_with_original_name() {
        let built = build_outbound(&message_with_attachment()).await.unwrap();
        let wire = String::from_utf8_lossy(&built.formatted()).to_string();

        assert!(wire.contains("multipart/mixed"));
        assert!(wire.contains("resume.pdf"));
        assert!(wire.contains("application/pdf"));
    }

    #[tokio::test]
    async fn invalid_recipient_address_rejected() {
        let mut message = message_without_attachment();
        message.to = "not an address".into();
        let err = build_outbound(&message).await.unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress(a) if a == "not an address"));
    }

    #[tokio::test]
    async fn unreadable_staged_file_fails_the_build() {
        let mut message = message_without_attachment();
        message.attachment = Some(StagedAttachment {
            file_name: "resume.pdf".into(),
            media_type: "application/pdf".into(),
            size: 1,
            handle: StorageHandle::TempFile("/nonexistent/staged/resume.pdf".into()),
        });
        let err = build_outbound(&message).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Build(reason) if reason.contains("attachment read")));
    }

    #[test]
    fn smtp_mailer_builds_from_config() {
        let vars = std::collections::HashMap::from([
            ("EMAIL_USER".to_string(), "hr@example.com".to_string()),
            ("EMAIL_PASS".to_string(), "app-password".to_string()),
        ]);
        let config = IntakeConfig::from_vars(&vars).unwrap();
        assert!(SmtpMailer::from_config(&config).is_ok());
    }
}
