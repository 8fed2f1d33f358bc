//! Integration tests for the feed client

use electricsheep::{Error, FeedClient};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn list_xml(server: &MockServer, retry: u64) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<list gen="247" retry="{retry}">
  <sheep id="1" type="0" state="done" time="1316548742" size="3" rating="0"
         first="10" last="10" url="{uri}/247/00247=00001=00010=00010.avi"/>
  <sheep id="2" type="0" state="done" time="1316548800" size="3" rating="2"
         first="10" last="20" url="{uri}/247/00247=00002=00010=00020.avi"/>
</list>"#,
        uri = server.uri()
    )
}

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

async fn mount_redirect(server: &MockServer, times: u64) {
    let body = format!(r#"<query><redir host="{}"/></query>"#, server.uri());
    Mock::given(method("GET"))
        .and(path("/query.php"))
        .and(query_param("q", "redir"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(times)
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> FeedClient {
    FeedClient::builder()
        .redirect_url(format!("{}/query.php?q=redir", server.uri()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_poll_resolves_server_once() {
    let server = MockServer::start().await;
    mount_redirect(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/cgi/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_xml(&server, 600)))
        .expect(2)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let first = client.poll().await.unwrap();
    let second = client.poll().await.unwrap();

    assert_eq!(first.flock, 247);
    assert_eq!(first.sheep.len(), 2);
    assert_eq!(first, second);
    assert_eq!(
        client.server().map(|u| u.as_str().trim_end_matches('/')),
        Some(server.uri().as_str())
    );
}

#[tokio::test]
async fn test_poll_accepts_gzip_list() {
    let server = MockServer::start().await;
    mount_redirect(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/cgi/list"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(&list_xml(&server, 60))))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let snapshot = client.poll().await.unwrap();

    assert_eq!(snapshot.sheep.len(), 2);
    assert_eq!(snapshot.retry_after, Duration::from_secs(60));
    let second = &snapshot.sheep[1];
    assert_eq!((second.id, second.first, second.last), (2, 10, 20));
    assert!(second.url.ends_with("00247=00002=00010=00020.avi"));
}

#[tokio::test]
async fn test_error_status_keeps_resolved_server() {
    let server = MockServer::start().await;
    mount_redirect(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/cgi/list"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let err = client.poll().await.unwrap_err();
    assert!(matches!(err, Error::FeedUnavailable(_)));
    assert!(err.is_transient());
    assert!(client.server().is_some());

    // no new redirect query
    let err = client.poll().await.unwrap_err();
    assert!(matches!(err, Error::FeedUnavailable(_)));
    assert_eq!(client.time_until_next_poll(), Duration::ZERO);
}

#[tokio::test]
async fn test_malformed_list_is_feed_unavailable() {
    let server = MockServer::start().await;
    mount_redirect(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/cgi/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    assert!(matches!(
        client.poll().await,
        Err(Error::FeedUnavailable(_))
    ));
}

#[tokio::test]
async fn test_failed_redirect_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query.php"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    assert!(matches!(client.poll().await, Err(Error::FeedUnavailable(_))));
    assert!(client.server().is_none());
    assert!(matches!(client.poll().await, Err(Error::FeedUnavailable(_))));
}

#[tokio::test]
async fn test_reset_server_forces_new_resolution() {
    let server = MockServer::start().await;
    mount_redirect(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/cgi/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_xml(&server, 600)))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.poll().await.unwrap();
    client.reset_server();
    assert!(client.server().is_none());
    client.poll().await.unwrap();
}

#[tokio::test]
async fn test_retry_interval_is_remembered() {
    let server = MockServer::start().await;
    mount_redirect(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/cgi/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_xml(&server, 600)))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    assert_eq!(client.time_until_next_poll(), Duration::ZERO);

    client.poll().await.unwrap();
    let remaining = client.time_until_next_poll();
    assert!(remaining > Duration::from_secs(590), "{remaining:?}");
    assert!(remaining <= Duration::from_secs(600));
}
