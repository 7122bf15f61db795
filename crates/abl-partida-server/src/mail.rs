//! Notification delivery over SMTP.

use crate::config::SmtpConfig;
use abl_partida::ComposedMessage;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

/// Display name on outgoing mail.
pub const SENDER_NAME: &str = "Consultas ABL";

#[derive(thiserror::Error, Debug)]
pub enum MailError {
    #[error("invalid email address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build email: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// Delivers a composed notification to one recipient. Single attempt.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, message: &ComposedMessage) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    bcc: Option<Mailbox>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let tls = TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| MailError::Build(format!("TLS configuration error: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(Tls::Wrapper(tls))
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .build();

        let from_address: Address = config.from.parse().map_err(|e| MailError::Address {
            address: config.from.clone(),
            reason: format!("{e}"),
        })?;
        let bcc = config.bcc.as_deref().map(parse_mailbox).transpose()?;

        Ok(Self {
            transport,
            from: Mailbox::new(Some(SENDER_NAME.to_string()), from_address),
            bcc,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, recipient: &str, message: &ComposedMessage) -> Result<(), MailError> {
        let email = build_message(&self.from, self.bcc.as_ref(), recipient, message)?;

        match self.transport.send(email).await {
            Ok(response) => {
                info!(recipient, code = %response.code(), "email sent");
                Ok(())
            }
            Err(e) => {
                error!(recipient, "error sending email: {e}");
                Err(MailError::Transport(e.to_string()))
            }
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e| MailError::Address {
        address: address.to_string(),
        reason: format!("{e}"),
    })
}

/// `multipart/alternative` message carrying both renderings.
pub fn build_message(
    from: &Mailbox,
    bcc: Option<&Mailbox>,
    recipient: &str,
    message: &ComposedMessage,
) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(from.clone())
        .to(parse_mailbox(recipient)?)
        .subject(message.subject.clone());
    if let Some(bcc) = bcc {
        builder = builder.bcc(bcc.clone());
    }

    builder
        .multipart(MultiPart::alternative_plain_html(
            message.text.clone(),
            message.html.clone(),
        ))
        .map_err(|e| MailError::Build(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> ComposedMessage {
        ComposedMessage {
            subject: "Consulta de ABL".into(),
            text: "El número de partida es:\n456".into(),
            html: "<p><b>456</b></p>".into(),
        }
    }

    fn sender() -> Mailbox {
        Mailbox::new(
            Some(SENDER_NAME.to_string()),
            "abl@consultas.test".parse().unwrap(),
        )
    }

    #[test]
    fn test_build_message_headers() {
        let bcc = parse_mailbox("archivo@consultas.test").unwrap();
        let email = build_message(&sender(), Some(&bcc), "vecino@mail.test", &message()).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("Consultas ABL"));
        assert!(raw.contains("<abl@consultas.test>"));
        assert!(raw.contains("vecino@mail.test"));
        assert!(raw.contains("Subject: Consulta de ABL"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_bcc_is_an_envelope_recipient() {
        let bcc = parse_mailbox("archivo@consultas.test").unwrap();
        let email = build_message(&sender(), Some(&bcc), "vecino@mail.test", &message()).unwrap();
        let recipients: Vec<String> = email.envelope().to().iter().map(|a| a.to_string()).collect();
        assert_eq!(recipients.len(), 2);
        assert!(recipients.contains(&"vecino@mail.test".to_string()));
        assert!(recipients.contains(&"archivo@consultas.test".to_string()));
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let err = build_message(&sender(), None, "not-an-address", &message()).unwrap_err();
        assert!(matches!(err, MailError::Address { .. }));
    }

    #[tokio::test]
    async fn test_smtp_mailer_rejects_bad_sender() {
        let config = SmtpConfig {
            host: "smtp.test".into(),
            port: 465,
            user: "bot".into(),
            pass: "secret".into(),
            from: "nope".into(),
            bcc: None,
            accept_invalid_certs: false,
        };
        assert!(matches!(
            SmtpMailer::new(&config),
            Err(MailError::Address { .. })
        ));
    }
}
