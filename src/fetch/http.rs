// src/fetch/http.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE,
    RETRY_AFTER, USER_AGENT,
};
use reqwest::Client;
use std::time::Duration;

use super::types::{RawResponse, Transport};
use crate::config::{MonitorConfig, UpstreamHeaders};
use crate::error::TransportError;

const PROFILE_CONTENTS_PATH: &str =
    "/bapi/composite/v1/friendly/pgc/content/queryUserProfilePageContentsWithFilter";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36";

/// reqwest-backed transport for the public profile feed.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, headers: &UpstreamHeaders) -> Result<Self> {
        let client = Client::builder()
            .default_headers(build_headers(headers)?)
            .build()
            .context("building upstream http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), PROFILE_CONTENTS_PATH),
        })
    }

    pub fn from_config(cfg: &MonitorConfig) -> Result<Self> {
        Self::new(&cfg.base_url, &cfg.headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, identity: &str, timeout: Duration) -> Result<RawResponse, TransportError> {
        let rsp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("targetSquareUid", identity),
                ("timeOffset", "-1"),
                ("filterType", "ALL"),
            ])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError(format!("upstream request failed: {e}")))?;

        let status = rsp.status().as_u16();
        let retry_after = rsp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = rsp
            .text()
            .await
            .map_err(|e| TransportError(format!("reading upstream body: {e}")))?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// `retry-after` in delta-seconds form. HTTP-date values are ignored.
pub fn parse_retry_after(v: &str) -> Option<Duration> {
    v.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn build_headers(h: &UpstreamHeaders) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    let ua = h.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    map.insert(USER_AGENT, HeaderValue::from_str(ua).context("invalid USER_AGENT")?);
    map.insert(ACCEPT, HeaderValue::from_static("*/*"));
    map.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    map.insert("clienttype", HeaderValue::from_static("web"));
    map.insert("lang", HeaderValue::from_static("en"));

    let optional = [
        (COOKIE, h.cookies.as_deref()),
        (HeaderName::from_static("csrftoken"), h.csrf_token.as_deref()),
        (HeaderName::from_static("device-info"), h.device_info.as_deref()),
        (HeaderName::from_static("fvideo-id"), h.fvideo_id.as_deref()),
        (HeaderName::from_static("fvideo-token"), h.fvideo_token.as_deref()),
        (HeaderName::from_static("bnc-uuid"), h.bnc_uuid.as_deref()),
    ];
    for (name, value) in optional {
        if let Some(v) = value {
            let hv = HeaderValue::from_str(v)
                .with_context(|| format!("invalid header value for {name}"))?;
            map.insert(name, hv);
        }
    }
    Ok(map)
}
