//! Mock HTTP endpoints for tests.

use std::time::Duration;

use tokio::net::TcpListener;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start a server answering every GET with `status`. Bodyless statuses get
/// no body, everything else the two-byte body `ok`. The server shuts down
/// when the returned handle is dropped.
pub async fn status_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(template(status))
        .mount(&server)
        .await;
    server
}

/// A server that holds every request far longer than any test timeout.
pub async fn silent_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(template(200).set_delay(Duration::from_secs(60)))
        .mount(&server)
        .await;
    server
}

/// A URL on a local port nothing is listening on.
pub async fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind free port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/")
}

fn template(status: u16) -> ResponseTemplate {
    match status {
        204 | 304 => ResponseTemplate::new(status),
        _ => ResponseTemplate::new(status).set_body_string("ok"),
    }
}
