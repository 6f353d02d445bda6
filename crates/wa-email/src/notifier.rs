//! Credential notifier: mails each login QR code to the operator

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info};
use wa_core::CredentialSink;

use crate::error::Result;
use crate::qr::{self, QrArtifact};
use crate::send::{MailAttachment, MailRelay, OutgoingMail};

const SUBJECT: &str = "New WhatsApp QR Code";
const BODY: &str = "Scan the attached QR code to log in.";
const ATTACHMENT_NAME: &str = "qrcode.png";

pub struct CredentialNotifier {
    relay: Arc<dyn MailRelay>,
    from: String,
    to: String,
    qr_path: PathBuf,
    /// The artifact path is reused, so one notification at a time
    lock: Mutex<()>,
}

impl CredentialNotifier {
    pub fn new(
        relay: Arc<dyn MailRelay>,
        from: impl Into<String>,
        to: impl Into<String>,
        qr_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            relay,
            from: from.into(),
            to: to.into(),
            qr_path: qr_path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Render, send and clean up one QR code
    ///
    /// The image file is gone when this returns, whatever the outcome.
    pub async fn notify(&self, payload: &str) -> Result<()> {
        let _guard = self.lock.lock().await;

        let png = qr::render_png(payload)?;
        let artifact = QrArtifact::create(&self.qr_path, &png).await?;
        let data = tokio::fs::read(artifact.path()).await?;

        let mail = OutgoingMail {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: SUBJECT.to_string(),
            body: BODY.to_string(),
            attachment: Some(MailAttachment {
                filename: ATTACHMENT_NAME.to_string(),
                content_type: "image/png".to_string(),
                data,
            }),
        };

        self.relay.send(mail).await?;
        info!("QR code sent via email to {}", self.to);
        Ok(())
    }
}

#[async_trait]
impl CredentialSink for CredentialNotifier {
    async fn on_challenge(&self, payload: String) {
        if let Err(e) = self.notify(&payload).await {
            error!("Email send failed: {}", wa_core::Error::from(e));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::error::EmailError;

    #[derive(Default)]
    struct MockRelay {
        sent: StdMutex<Vec<OutgoingMail>>,
        fail: bool,
    }

    #[async_trait]
    impl MailRelay for MockRelay {
        async fn send(&self, mail: OutgoingMail) -> Result<()> {
            self.sent.lock().unwrap().push(mail);
            if self.fail {
                return Err(EmailError::SmtpSend("535 authentication failed".to_string()));
            }
            Ok(())
        }
    }

    fn notifier(relay: Arc<MockRelay>, qr_path: PathBuf) -> CredentialNotifier {
        CredentialNotifier::new(relay, "bot@example.com", "ops@example.com", qr_path)
    }

    #[tokio::test]
    async fn test_notify_sends_once_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let qr_path = dir.path().join("qrcode.png");
        let relay = Arc::new(MockRelay::default());

        notifier(Arc::clone(&relay), qr_path.clone())
            .notify("2@qr-payload")
            .await
            .unwrap();

        let sent = relay.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New WhatsApp QR Code");
        assert_eq!(sent[0].to, "ops@example.com");
        let attachment = sent[0].attachment.as_ref().unwrap();
        assert_eq!(attachment.filename, "qrcode.png");
        assert!(attachment.data.starts_with(b"\x89PNG"));
        assert!(!qr_path.exists());
    }

    #[tokio::test]
    async fn test_failed_email_still_removes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let qr_path = dir.path().join("qrcode.png");
        let relay = Arc::new(MockRelay {
            fail: true,
            ..Default::default()
        });

        let err = notifier(Arc::clone(&relay), qr_path.clone())
            .notify("2@qr-payload")
            .await
            .unwrap_err();
        assert!(matches!(err, EmailError::SmtpSend(_)));
        assert_eq!(relay.sent.lock().unwrap().len(), 1);
        assert!(!qr_path.exists());
    }

    #[tokio::test]
    async fn test_on_challenge_swallows_errors() {
        let dir = tempfile::tempdir().unwrap();
        let qr_path = dir.path().join("qrcode.png");
        let relay = Arc::new(MockRelay {
            fail: true,
            ..Default::default()
        });
        let notifier = notifier(Arc::clone(&relay), qr_path.clone());

        notifier.on_challenge("first".to_string()).await;
        notifier.on_challenge("second".to_string()).await;

        // No retry; each challenge is one attempt
        assert_eq!(relay.sent.lock().unwrap().len(), 2);
        assert!(!qr_path.exists());
    }
}
