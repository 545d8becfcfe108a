// src/notify/mod.rs
pub mod discord;
pub mod email;
pub mod slack;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::fetch::types::ContentItem;
use crate::text::excerpt;

/// Characters of summary used when a post has no title.
const SUMMARY_TITLE_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl NotificationMessage {
    /// Alert for a newly discovered post.
    pub fn new_post(identity: &str, item: &ContentItem, link: String) -> Self {
        let author = item
            .author_name
            .clone()
            .unwrap_or_else(|| format!("UID {identity}"));
        let headline = item
            .title
            .as_deref()
            .map(|t| excerpt(t, usize::MAX))
            .filter(|t| !t.is_empty())
            .or_else(|| {
                item.summary
                    .as_deref()
                    .map(|s| excerpt(s, SUMMARY_TITLE_CHARS))
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_else(|| "Untitled Post".to_string());

        Self {
            title: format!("New Binance Square post from {author}"),
            message: headline,
            link: Some(link),
        }
    }

    pub fn started(identities: &[String]) -> Self {
        Self {
            title: "Binance Square monitor started".to_string(),
            message: format!("Monitoring users: {}", identities.join(", ")),
            link: None,
        }
    }

    pub fn halted(consecutive_errors: u32) -> Self {
        Self {
            title: "Binance Square monitor error".to_string(),
            message: format!(
                "Monitor stopped after {consecutive_errors} consecutive errors. Check logs."
            ),
            link: None,
        }
    }
}

/// A delivery channel. Errors are reported, never retried by the caller.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, msg: &NotificationMessage) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Writes every notification to the log. Always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, msg: &NotificationMessage) -> Result<()> {
        tracing::info!(
            target: "notify",
            title = %msg.title,
            link = msg.link.as_deref().unwrap_or("-"),
            "{}",
            msg.message
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Writes every notification to the log, then fans it out to the delivery
/// sinks. Succeeds when no delivery sink is configured or at least one of
/// them delivered; the log line alone never counts as a delivery.
#[derive(Default)]
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn with(mut self, sink: impl Notifier + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Delivery sinks the environment enables:
    /// `DISCORD_WEBHOOK_URL`, `SLACK_WEBHOOK_URL`, `SMTP_HOST` (+ credentials).
    pub fn from_env() -> Self {
        let mut mux = Self::default();

        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                mux = mux.with(discord::DiscordNotifier::new(url));
            }
        }
        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                mux = mux.with(slack::SlackNotifier::new(url));
            }
        }
        if std::env::var("SMTP_HOST").is_ok() {
            match email::EmailSender::from_env() {
                Ok(sender) => mux = mux.with(sender),
                Err(e) => tracing::warn!(error = %e, "email notifications disabled"),
            }
        }

        tracing::info!(sinks = ?mux.sink_names(), "notification sinks configured");
        mux
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

#[async_trait::async_trait]
impl Notifier for NotifierMux {
    async fn send(&self, msg: &NotificationMessage) -> Result<()> {
        LogNotifier.send(msg).await?;
        if self.sinks.is_empty() {
            return Ok(());
        }
        let mut delivered = 0usize;
        for sink in &self.sinks {
            match sink.send(msg).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(sink = sink.name(), error = %e, "notification sink failed"),
            }
        }
        if delivered == 0 {
            return Err(anyhow!("all {} notification sinks failed", self.sinks.len()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: Option<&str>, summary: Option<&str>, author: Option<&str>) -> ContentItem {
        ContentItem {
            id: "1".into(),
            secondary_id: "c1".into(),
            title: title.map(str::to_string),
            summary: summary.map(str::to_string),
            created_at_ms: 0,
            updated_at_ms: 0,
            author_name: author.map(str::to_string),
        }
    }

    #[test]
    fn title_falls_back_to_summary_then_placeholder() {
        let long = "x".repeat(250);
        let m = NotificationMessage::new_post("u1", &item(None, Some(&long), None), "l".into());
        assert_eq!(m.message.chars().count(), 100);
        assert_eq!(m.title, "New Binance Square post from UID u1");

        let m = NotificationMessage::new_post("u1", &item(Some("  "), None, Some("Ann")), "l".into());
        assert_eq!(m.message, "Untitled Post");
        assert_eq!(m.title, "New Binance Square post from Ann");

        let m = NotificationMessage::new_post("u1", &item(Some("Hi"), Some("s"), None), "l".into());
        assert_eq!(m.message, "Hi");
        assert_eq!(m.link.as_deref(), Some("l"));
    }

    struct Failing;

    #[async_trait::async_trait]
    impl Notifier for Failing {
        async fn send(&self, _msg: &NotificationMessage) -> Result<()> {
            Err(anyhow!("down"))
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct Delivering;

    #[async_trait::async_trait]
    impl Notifier for Delivering {
        async fn send(&self, _msg: &NotificationMessage) -> Result<()> {
            Ok(())
        }
        fn name(&self) -> &'static str {
            "delivering"
        }
    }

    #[tokio::test]
    async fn mux_succeeds_if_any_sink_delivers() {
        let msg = NotificationMessage::halted(5);
        let mux = NotifierMux::default().with(Failing).with(Delivering);
        assert!(mux.send(&msg).await.is_ok());
    }

    #[tokio::test]
    async fn log_line_does_not_mask_failed_delivery() {
        let msg = NotificationMessage::halted(5);
        let mux = NotifierMux::default().with(Failing).with(Failing);
        assert!(mux.send(&msg).await.is_err());
    }

    #[tokio::test]
    async fn log_only_mux_succeeds() {
        let mux = NotifierMux::default();
        assert!(mux.sink_names().is_empty());
        assert!(mux.send(&NotificationMessage::halted(1)).await.is_ok());
    }
}
