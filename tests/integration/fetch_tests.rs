//! HTTP fetching against a wiremock server

use std::sync::Arc;
use std::time::Duration;
use webscour::config::UserAgentConfig;
use webscour::crawler::{
    build_http_client, FetchError, Fetcher, HttpSource, PageSource, RetryPolicy,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_source(user_agent: &UserAgentConfig) -> Arc<HttpSource> {
    let timeout = Duration::from_secs(2);
    let client = build_http_client(user_agent, timeout).expect("Failed to build client");
    Arc::new(HttpSource::new(client, timeout))
}

fn quick_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        timeout: Duration::from_secs(2),
        backoff: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_fetch_returns_page_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(http_source(&UserAgentConfig::default()), quick_policy(3));
    let body = fetcher
        .fetch(&format!("{}/", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(body, "<html>home</html>");
}

#[tokio::test]
async fn test_fetch_sends_configured_user_agent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header(
            "user-agent",
            "TestBot/2.0 (+https://example.com/bot)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "2.0".to_string(),
        contact_url: Some("https://example.com/bot".to_string()),
    };
    let fetcher = Fetcher::new(http_source(&user_agent), quick_policy(1));

    assert!(fetcher.fetch(&mock_server.uri()).await.is_ok());
}

#[tokio::test]
async fn test_server_error_is_retried_until_exhausted() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(http_source(&UserAgentConfig::default()), quick_policy(3));
    let failure = fetcher
        .fetch(&format!("{}/broken", mock_server.uri()))
        .await
        .unwrap_err();

    assert_eq!(failure.attempts, 3);
    assert_eq!(failure.last_error, FetchError::Status(500));
}

#[tokio::test]
async fn test_whitespace_body_is_a_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n\t "))
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(http_source(&UserAgentConfig::default()), quick_policy(2));
    let failure = fetcher.fetch(&mock_server.uri()).await.unwrap_err();

    assert_eq!(failure.attempts, 2);
    assert_eq!(failure.last_error, FetchError::EmptyBody);
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let policy = RetryPolicy {
        max_attempts: 1,
        timeout: Duration::from_millis(100),
        backoff: Duration::ZERO,
    };
    let fetcher = Fetcher::new(http_source(&UserAgentConfig::default()), policy);
    let failure = fetcher.fetch(&mock_server.uri()).await.unwrap_err();

    assert!(matches!(failure.last_error, FetchError::Timeout(_)));
}

#[tokio::test]
async fn test_http_source_reports_raw_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&mock_server)
        .await;

    let source = http_source(&UserAgentConfig::default());
    let response = source.get(&mock_server.uri()).await.unwrap();

    assert_eq!(response.status, 404);
    assert_eq!(response.body, "not here");
}
