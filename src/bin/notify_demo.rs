//! Sends one sample new-post notification through the sinks enabled in the
//! environment (log only when no webhook/SMTP is configured).

use square_monitor::{ContentItem, NotificationMessage, Notifier, NotifierMux};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();
    let mux = NotifierMux::from_env();

    let item = ContentItem {
        id: "0".into(),
        secondary_id: "0".into(),
        title: Some("Demo post".into()),
        summary: Some("This is what a new-post alert looks like.".into()),
        created_at_ms: chrono::Utc::now().timestamp_millis(),
        updated_at_ms: chrono::Utc::now().timestamp_millis(),
        author_name: Some("notify-demo".into()),
    };
    let msg = NotificationMessage::new_post(
        "demo",
        &item,
        "https://www.binance.com/en/square/post/0".into(),
    );
    mux.send(&msg).await?;

    println!("notify-demo done");
    Ok(())
}
