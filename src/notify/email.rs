// src/notify/email.rs
use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{NotificationMessage, Notifier};

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} missing"))
}

impl EmailSender {
    /// Reads `SMTP_HOST`, `SMTP_USER`, `SMTP_PASS`, `NOTIFY_EMAIL_FROM`, `NOTIFY_EMAIL_TO`.
    pub fn from_env() -> Result<Self> {
        let host = required("SMTP_HOST")?;
        let creds = Credentials::new(required("SMTP_USER")?, required("SMTP_PASS")?);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from = required("NOTIFY_EMAIL_FROM")?
            .parse()
            .context("invalid NOTIFY_EMAIL_FROM")?;
        let to = required("NOTIFY_EMAIL_TO")?
            .parse()
            .context("invalid NOTIFY_EMAIL_TO")?;

        Ok(Self { mailer, from, to })
    }
}

fn email_body(msg: &NotificationMessage) -> String {
    match &msg.link {
        Some(link) => format!("{}\n\n{}\n", msg.message, link),
        None => format!("{}\n", msg.message),
    }
}

#[async_trait::async_trait]
impl Notifier for EmailSender {
    async fn send(&self, msg: &NotificationMessage) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(msg.title.clone())
            .header(header::ContentType::TEXT_PLAIN)
            .body(email_body(msg))
            .context("build email")?;

        self.mailer.send(email).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_appends_link_when_present() {
        let mut msg = NotificationMessage::halted(3);
        assert!(!email_body(&msg).contains("http"));
        msg.link = Some("https://x/p/1".into());
        assert!(email_body(&msg).ends_with("https://x/p/1\n"));
    }
}
