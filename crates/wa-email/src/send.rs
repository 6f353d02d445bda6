//! Email sending via SMTP

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};
use wa_core::EmailConfig;

use crate::error::{EmailError, Result};

/// File attached to an outgoing mail
#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A single plain-text mail, optionally with one attachment
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<MailAttachment>,
}

/// Anything that can deliver an [`OutgoingMail`]
#[async_trait]
pub trait MailRelay: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// SMTP sender backed by lettre
#[derive(Clone)]
pub struct EmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    smtp_host: String,
}

impl EmailSender {
    /// Create a new email sender authenticating as `config.user`
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let credentials = Credentials::new(config.user.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| EmailError::SmtpConfig(format!("{}: {}", config.smtp_host, e)))?
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            smtp_host: config.smtp_host.clone(),
        })
    }
}

/// Build the MIME message for `mail`
fn build_message(mail: OutgoingMail) -> Result<Message> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|e| EmailError::InvalidAddress(format!("{}: {}", mail.from, e)))?;
    let to: Mailbox = mail
        .to
        .parse()
        .map_err(|e| EmailError::InvalidAddress(format!("{}: {}", mail.to, e)))?;

    let builder = Message::builder().from(from).to(to).subject(mail.subject);

    let message = match mail.attachment {
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| EmailError::SmtpSend(format!("bad content type: {}", e)))?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(mail.body))
                    .singlepart(Attachment::new(attachment.filename).body(attachment.data, content_type)),
            )
        }
        None => builder.body(mail.body),
    };

    message.map_err(|e| EmailError::SmtpSend(e.to_string()))
}

#[async_trait]
impl MailRelay for EmailSender {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        info!("Sending email to {} via {}", mail.to, self.smtp_host);

        let message = build_message(mail)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| EmailError::SmtpSend(e.to_string()))?;

        debug!("SMTP response: {:?}", response.code());
        Ok(())
    }
}
