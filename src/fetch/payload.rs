// src/fetch/payload.rs
//! Upstream response envelope. Two incompatible item lists exist in the wild;
//! both are resolved here into `ContentItem`s and nothing downstream sees them.

use serde::{Deserialize, Deserializer};

use super::types::ContentItem;

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Data>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub(crate) struct Data {
    #[serde(default)]
    contents: Option<Vec<CurrentItem>>,
    #[serde(default, rename = "userProfileDataDTOS")]
    legacy: Option<Vec<LegacyItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentItem {
    #[serde(deserialize_with = "id_string")]
    id: String,
    title: Option<String>,
    body_text_only: Option<String>,
    create_time: i64,
    #[serde(default)]
    update_time: i64,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyItem {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(deserialize_with = "id_string")]
    content_id: String,
    title: Option<String>,
    summary: Option<String>,
    create_time: i64,
    #[serde(default)]
    update_time: i64,
    author: Option<LegacyAuthor>,
}

#[derive(Debug, Deserialize)]
struct LegacyAuthor {
    nickname: Option<String>,
}

/// Which list a response carried.
#[derive(Debug)]
enum FeedShape {
    Current(Vec<CurrentItem>),
    Legacy(Vec<LegacyItem>),
    Empty,
}

impl From<Data> for FeedShape {
    fn from(d: Data) -> Self {
        match (d.contents, d.legacy) {
            (Some(c), _) if !c.is_empty() => FeedShape::Current(c),
            (_, Some(l)) if !l.is_empty() => FeedShape::Legacy(l),
            _ => FeedShape::Empty,
        }
    }
}

impl FeedShape {
    fn into_items(self) -> Vec<ContentItem> {
        match self {
            FeedShape::Current(v) => v
                .into_iter()
                .map(|it| ContentItem {
                    secondary_id: it.id.clone(),
                    id: it.id,
                    title: non_empty(it.title),
                    summary: non_empty(it.body_text_only),
                    created_at_ms: it.create_time,
                    updated_at_ms: it.update_time,
                    author_name: non_empty(it.display_name),
                })
                .collect(),
            FeedShape::Legacy(v) => v
                .into_iter()
                .map(|it| ContentItem {
                    id: it.id,
                    secondary_id: it.content_id,
                    title: non_empty(it.title),
                    summary: non_empty(it.summary),
                    created_at_ms: it.create_time,
                    updated_at_ms: it.update_time,
                    author_name: it.author.and_then(|a| non_empty(a.nickname)),
                })
                .collect(),
            FeedShape::Empty => Vec::new(),
        }
    }
}

impl Envelope {
    pub(crate) fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub(crate) fn into_items(self) -> Vec<ContentItem> {
        self.data
            .map(FeedShape::from)
            .unwrap_or(FeedShape::Empty)
            .into_items()
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Upstream ids arrive as JSON numbers in one shape and strings in the other.
fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AnyId {
        Num(u64),
        Signed(i64),
        Text(String),
    }
    Ok(match AnyId::deserialize(d)? {
        AnyId::Num(n) => n.to_string(),
        AnyId::Signed(n) => n.to_string(),
        AnyId::Text(s) => s,
    })
}
