use std::fmt::Display;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::ForwarderError;
use crate::logs::payload;
use crate::logs::request::RequestBuilder;
use crate::logs::sender::{HttpResponse, LogsSender};
use crate::logs::translator::{self, DeliveryMode};
use crate::secrets::cache::SecretCache;

/// How an invocation ended when nothing failed along the way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The batch had no log events, nothing was sent.
    Skipped,
    Delivered {
        events: usize,
    },
    /// The API answered with something other than 200. Reported as a success so the
    /// invoker does not retry the batch against an API that already answered.
    Rejected {
        events: usize,
        status: u16,
        error: Option<String>,
    },
}

impl Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchOutcome::Skipped => write!(f, "No log events to forward"),
            DispatchOutcome::Delivered { events } => {
                write!(f, "Successfully sent {events} log events")
            }
            DispatchOutcome::Rejected {
                events,
                status,
                error,
            } => {
                write!(f, "Failed to send {events} log events, status code {status}")?;
                if let Some(error) = error {
                    write!(f, ", error: {error}")?;
                }
                Ok(())
            }
        }
    }
}

/// Runs one batch through decrypt, decode, translate, send and interpret, in that order.
pub struct Dispatcher {
    mode: DeliveryMode,
    builder: RequestBuilder,
    secrets: Arc<SecretCache>,
    sender: Arc<dyn LogsSender>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: &Config, secrets: Arc<SecretCache>, sender: Arc<dyn LogsSender>) -> Self {
        Dispatcher {
            mode: DeliveryMode::from_add_events_flag(config.use_add_events_api),
            builder: RequestBuilder::new(
                &config.ingest_url,
                &config.parser_name,
                &config.server_attributes,
                config.attribute_encoding,
            ),
            secrets,
            sender,
        }
    }

    #[must_use]
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Forwards the base64, gzip compressed batch in `data`.
    pub async fn dispatch(&self, data: &str) -> Result<DispatchOutcome, ForwarderError> {
        self.try_dispatch(data).await.inspect_err(|e| {
            error!("{}", e);
        })
    }

    async fn try_dispatch(&self, data: &str) -> Result<DispatchOutcome, ForwarderError> {
        let token = self.secrets.get().await?;

        let batch = payload::decode(data)?;
        debug!(
            "Decoded {} log events from {} ({}), message type {:?}, filters {:?}",
            batch.log_events.len(),
            batch.log_group,
            batch.log_stream,
            batch.message_type,
            batch.subscription_filters
        );
        if batch.log_events.is_empty() {
            debug!("No log events in batch, skipping");
            return Ok(DispatchOutcome::Skipped);
        }

        let events = batch.log_events.len();
        let translation =
            translator::translate(self.mode, &batch, token, self.builder.parser_name());
        let request = self.builder.build(translation)?;
        debug!("Sending {} log events in {:?} mode", events, self.mode);

        let response = self.sender.send(request).await?;
        Ok(interpret(events, response))
    }
}

fn interpret(events: usize, response: HttpResponse) -> DispatchOutcome {
    if response.status == 200 {
        debug!("Sent {} log events", events);
        return DispatchOutcome::Delivered { events };
    }

    warn!(
        "Ingestion API returned status {}: {}",
        response.status, response.body
    );
    DispatchOutcome::Rejected {
        events,
        status: response.status,
        error: response.error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::payload::tests::encode;
    use crate::logs::request::OutgoingRequest;
    use crate::secrets::decrypt::Decryptor;
    use async_trait::async_trait;
    use reqwest::header::CONTENT_TYPE;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SCENARIO: &str = r#"{"owner":"123","logGroup":"/app/x","logStream":"s1","logEvents":[{"timestamp":1000,"id":"a","message":"hello\n"}]}"#;

    struct RecordingSender {
        requests: Mutex<Vec<OutgoingRequest>>,
        response: Result<HttpResponse, ForwarderError>,
    }

    impl RecordingSender {
        fn responding(status: u16, error: Option<&str>) -> Self {
            RecordingSender {
                requests: Mutex::new(vec![]),
                response: Ok(HttpResponse {
                    status,
                    body: String::new(),
                    error: error.map(str::to_string),
                }),
            }
        }

        fn sent(&self) -> Vec<OutgoingRequest> {
            self.requests.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl LogsSender for RecordingSender {
        async fn send(&self, request: OutgoingRequest) -> Result<HttpResponse, ForwarderError> {
            self.requests.lock().expect("lock poisoned").push(request);
            self.response.clone()
        }
    }

    struct FlakyDecryptor {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl Decryptor for FlakyDecryptor {
        async fn decrypt(&self, _ciphertext: &str) -> Result<String, ForwarderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                Err(ForwarderError::Decryption("throttled".to_string()))
            } else {
                Ok("write-key".to_string())
            }
        }
    }

    fn dispatcher(use_add_events_api: bool, sender: Arc<RecordingSender>) -> Dispatcher {
        let config = Config {
            use_add_events_api,
            ingest_url: "https://ingest.example.com".to_string(),
            ..Config::default()
        };
        Dispatcher::new(
            &config,
            Arc::new(SecretCache::from_plaintext("write-key".to_string())),
            sender,
        )
    }

    #[tokio::test]
    async fn test_plain_text_scenario() {
        let sender = Arc::new(RecordingSender::responding(200, None));
        let outcome = dispatcher(false, sender.clone())
            .dispatch(&encode(SCENARIO))
            .await
            .expect("dispatch failed");

        assert_eq!(outcome, DispatchOutcome::Delivered { events: 1 });
        assert_eq!(outcome.to_string(), "Successfully sent 1 log events");
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "hello");
        assert!(sent[0].url.contains("host=cloudwatch-123"));
        assert!(sent[0].url.contains("logfile=%2Fapp%2Fx"));
        assert_eq!(sent[0].headers[CONTENT_TYPE], "text/plain");
    }

    #[tokio::test]
    async fn test_structured_events_scenario() {
        let sender = Arc::new(RecordingSender::responding(200, None));
        let dispatcher = dispatcher(true, sender.clone());
        assert_eq!(dispatcher.mode(), DeliveryMode::StructuredEvents);
        dispatcher
            .dispatch(&encode(SCENARIO))
            .await
            .expect("dispatch failed");

        let sent = sender.sent();
        assert_eq!(sent[0].url, "https://ingest.example.com/addEvents");
        let body: serde_json::Value =
            serde_json::from_str(&sent[0].body).expect("body should be json");
        assert_eq!(body["events"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["events"][0]["ts"], "1000000000");
        assert_eq!(body["events"][0]["attrs"]["message"], "hello\n");
        assert_eq!(body["sessionInfo"]["serverHost"], "cloudwatch-123");
        assert_eq!(body["sessionInfo"]["parser"], "cloudWatchLogs");
    }

    #[tokio::test]
    async fn test_non_ok_status_is_reported_as_success() {
        let sender = Arc::new(RecordingSender::responding(503, Some("timeout")));
        let outcome = dispatcher(false, sender)
            .dispatch(&encode(SCENARIO))
            .await
            .expect("non-200 responses are not errors");

        let message = outcome.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("timeout"));
        assert_eq!(
            message,
            "Failed to send 1 log events, status code 503, error: timeout"
        );
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let sender = Arc::new(RecordingSender::responding(200, None));
        let outcome = dispatcher(false, sender.clone())
            .dispatch(&encode(
                r#"{"owner":"123","logGroup":"/app/x","logStream":"s1","logEvents":[]}"#,
            ))
            .await
            .expect("empty batch is not an error");

        assert_eq!(outcome, DispatchOutcome::Skipped);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced() {
        let sender = Arc::new(RecordingSender {
            requests: Mutex::new(vec![]),
            response: Err(ForwarderError::Transport("connection reset".to_string())),
        });
        let err = dispatcher(false, sender)
            .dispatch(&encode(SCENARIO))
            .await
            .expect_err("transport errors fail the invocation");

        assert_eq!(err, ForwarderError::Transport("connection reset".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_payload_is_surfaced() {
        let sender = Arc::new(RecordingSender::responding(200, None));
        let dispatcher = dispatcher(false, sender.clone());

        let err = dispatcher
            .dispatch("bm90IGd6aXA=")
            .await
            .expect_err("payload is not gzip");
        assert!(matches!(err, ForwarderError::Decompression(_)));

        let err = dispatcher
            .dispatch(&encode("[1, 2, 3]"))
            .await
            .expect_err("payload is not a batch");
        assert!(matches!(err, ForwarderError::Parse(_)));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_decrypt_failure_stops_pipeline_and_retries_next_time() {
        let sender = Arc::new(RecordingSender::responding(200, None));
        let decryptor = Arc::new(FlakyDecryptor {
            calls: AtomicUsize::new(0),
            fail_first: true,
        });
        let dispatcher = Dispatcher::new(
            &Config::default(),
            Arc::new(SecretCache::new("cipher".to_string(), decryptor.clone())),
            sender.clone(),
        );

        let err = dispatcher
            .dispatch(&encode(SCENARIO))
            .await
            .expect_err("first decrypt fails");
        assert!(matches!(err, ForwarderError::Decryption(_)));
        assert!(sender.sent().is_empty());

        for _ in 0..3 {
            dispatcher
                .dispatch(&encode(SCENARIO))
                .await
                .expect("dispatch failed");
        }
        assert_eq!(decryptor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sender.sent().len(), 3);
        assert!(sender.sent()[0].url.contains("token=write-key"));
    }

    #[tokio::test]
    async fn test_decrypt_happens_before_decoding() {
        let sender = Arc::new(RecordingSender::responding(200, None));
        let decryptor = Arc::new(FlakyDecryptor {
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let dispatcher = Dispatcher::new(
            &Config::default(),
            Arc::new(SecretCache::new("cipher".to_string(), decryptor.clone())),
            sender,
        );

        let err = dispatcher
            .dispatch("%%%")
            .await
            .expect_err("payload is not base64");
        assert!(matches!(err, ForwarderError::Decompression(_)));
        assert_eq!(decryptor.calls.load(Ordering::SeqCst), 1);
    }
}
