// src/notify/slack.rs
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::{NotificationMessage, Notifier};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

fn slack_text(msg: &NotificationMessage) -> String {
    match &msg.link {
        Some(link) => format!("*{}*\n{}\n<{}|Open post>", msg.title, msg.message, link),
        None => format!("*{}*\n{}", msg.title, msg.message),
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, msg: &NotificationMessage) -> Result<()> {
        let body = serde_json::json!({ "text": slack_text(msg) });

        self.client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_is_rendered_as_slack_anchor() {
        let msg = NotificationMessage {
            title: "New post".into(),
            message: "hello".into(),
            link: Some("https://x/p/9".into()),
        };
        assert_eq!(slack_text(&msg), "*New post*\nhello\n<https://x/p/9|Open post>");
    }
}
