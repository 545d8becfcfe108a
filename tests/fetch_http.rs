// tests/fetch_http.rs
use serde_json::json;
use square_monitor::config::UpstreamHeaders;
use square_monitor::error::FetchError;
use square_monitor::fetch::backoff::RetryPolicy;
use square_monitor::fetch::http::HttpTransport;
use square_monitor::FetchClient;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED_PATH: &str =
    "/bapi/composite/v1/friendly/pgc/content/queryUserProfilePageContentsWithFilter";

fn client(server: &MockServer, headers: UpstreamHeaders, max_retries: u32) -> FetchClient {
    let transport = HttpTransport::new(&server.uri(), &headers).expect("transport");
    FetchClient::new(
        Arc::new(transport),
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(20),
        },
    )
    .with_timeout(Duration::from_secs(2))
    .with_base_url(server.uri())
}

#[tokio::test]
async fn sends_profile_query_with_configured_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(query_param("targetSquareUid", "uid-42"))
        .and(query_param("timeOffset", "-1"))
        .and(query_param("filterType", "ALL"))
        .and(header("csrftoken", "tok"))
        .and(header("clienttype", "web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "000000",
            "success": true,
            "data": {"contents": [
                {"id": 11, "title": "gm", "createTime": 100, "updateTime": 100, "displayName": "Kay"},
                {"id": 12, "bodyTextOnly": "<b>later</b>", "createTime": 200, "updateTime": 201}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let headers = UpstreamHeaders {
        csrf_token: Some("tok".into()),
        ..Default::default()
    };
    let c = client(&server, headers, 0);
    let items = c.fetch("uid-42").await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].id, "12");
    assert_eq!(items[1].updated_at_ms, 201);
    assert_eq!(
        c.item_url(&items[0]),
        format!("{}/en/square/post/11", server.uri())
    );
}

#[tokio::test]
async fn rate_limit_then_success_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"userProfileDataDTOS": [
                {"id": "L1", "contentId": "C1", "title": "old api", "createTime": 5, "updateTime": 5}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = client(&server, UpstreamHeaders::default(), 2)
        .fetch("u1")
        .await
        .unwrap();
    assert_eq!(items[0].secondary_id, "C1");
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, UpstreamHeaders::default(), 3)
        .fetch("u1")
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::ClientRejection { status: 404 });
}

#[tokio::test]
async fn server_errors_exhaust_all_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, UpstreamHeaders::default(), 2)
        .fetch("u1")
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::ServerError { status: 500 });
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_error() {
    // bind then release a port so nothing is listening on it
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let uri = format!("http://127.0.0.1:{port}");

    let transport = HttpTransport::new(&uri, &UpstreamHeaders::default()).unwrap();
    let c = FetchClient::new(
        Arc::new(transport),
        RetryPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        },
    );
    assert!(matches!(c.fetch("u1").await, Err(FetchError::Network(_))));
}
