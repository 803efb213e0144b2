use async_trait::async_trait;
use tracing::debug;

use crate::error::ForwarderError;
use crate::logs::request::OutgoingRequest;

/// What came back from the ingestion API. `error` is set when a status was received but
/// the exchange did not complete cleanly, e.g. the body could not be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub error: Option<String>,
}

#[async_trait]
pub trait LogsSender: Send + Sync {
    /// Fails with [`ForwarderError::Transport`] only when no response was received.
    async fn send(&self, request: OutgoingRequest) -> Result<HttpResponse, ForwarderError>;
}

pub struct HttpSender {
    client: reqwest::Client,
}

impl HttpSender {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        HttpSender { client }
    }
}

#[async_trait]
impl LogsSender for HttpSender {
    async fn send(&self, request: OutgoingRequest) -> Result<HttpResponse, ForwarderError> {
        let post_time = std::time::Instant::now();
        let resp = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| ForwarderError::Transport(e.to_string()))?;
        debug!("Post time: {:?}", post_time.elapsed());

        let status = resp.status().as_u16();
        match resp.text().await {
            Ok(body) => Ok(HttpResponse {
                status,
                body,
                error: None,
            }),
            Err(e) => Ok(HttpResponse {
                status,
                body: String::new(),
                error: Some(e.to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Method;
    use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

    fn request(url: String) -> OutgoingRequest {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        OutgoingRequest {
            method: Method::POST,
            url,
            headers,
            body: "line one\nline two".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_returns_status_and_body() {
        let server = MockServer::start();
        let upload_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/uploadLogs")
                .query_param("token", "abc")
                .header("content-type", "text/plain")
                .body("line one\nline two");
            then.status(200).body("{\"status\":\"success\"}");
        });

        let sender = HttpSender::new(reqwest::Client::new());
        let response = sender
            .send(request(server.url("/api/uploadLogs?token=abc")))
            .await
            .expect("failed to send");

        assert_eq!(
            response,
            HttpResponse {
                status: 200,
                body: "{\"status\":\"success\"}".to_string(),
                error: None,
            }
        );
        upload_mock.assert();
    }

    #[tokio::test]
    async fn test_send_non_ok_status_is_not_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/uploadLogs");
            then.status(401).body("{\"status\":\"error/client/badParam\"}");
        });

        let sender = HttpSender::new(reqwest::Client::new());
        let response = sender
            .send(request(server.url("/api/uploadLogs")))
            .await
            .expect("a response was received");

        assert_eq!(response.status, 401);
        assert!(response.body.contains("badParam"));
    }

    #[tokio::test]
    async fn test_send_without_response_is_transport_error() {
        let sender = HttpSender::new(reqwest::Client::new());
        let err = sender
            .send(request("http://127.0.0.1:1/api/uploadLogs".to_string()))
            .await
            .expect_err("nothing listens on port 1");

        assert!(matches!(err, ForwarderError::Transport(_)));
    }
}
