use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::error::ForwarderError;
use crate::logs::attributes::{AttributeEncoding, ServerAttribute, query_fragments};
use crate::logs::translator::{Translation, UploadLogsRequest};

pub const ADD_EVENTS_PATH: &str = "/addEvents";
pub const UPLOAD_LOGS_PATH: &str = "/api/uploadLogs";

#[derive(Clone, Debug)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: String,
}

/// Turns a [`Translation`] into a ready-to-send POST request.
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    ingest_url: String,
    parser_name: String,
    attribute_query: String,
}

impl RequestBuilder {
    /// The attribute fragments do not change between invocations, so they are rendered once.
    #[must_use]
    pub fn new(
        ingest_url: &str,
        parser_name: &str,
        server_attributes: &[ServerAttribute],
        attribute_encoding: AttributeEncoding,
    ) -> Self {
        RequestBuilder {
            ingest_url: ingest_url.trim_end_matches('/').to_string(),
            parser_name: parser_name.to_string(),
            attribute_query: query_fragments(server_attributes, attribute_encoding),
        }
    }

    #[must_use]
    pub fn parser_name(&self) -> &str {
        &self.parser_name
    }

    #[must_use]
    pub fn add_events_url(&self) -> String {
        format!("{}{ADD_EVENTS_PATH}", self.ingest_url)
    }

    #[must_use]
    pub fn upload_logs_url(&self, upload: &UploadLogsRequest) -> String {
        format!(
            "{}{UPLOAD_LOGS_PATH}?token={}&host={}&logfile={}&server-logstream={}&parser={}{}",
            self.ingest_url,
            upload.token,
            upload.host,
            upload.logfile,
            upload.logstream,
            self.parser_name,
            self.attribute_query,
        )
    }

    pub fn build(&self, translation: Translation) -> Result<OutgoingRequest, ForwarderError> {
        match translation {
            Translation::StructuredEvents(add_events) => {
                let body = serde_json::to_string(&add_events)
                    .map_err(|e| ForwarderError::Serialization(e.to_string()))?;
                Ok(OutgoingRequest {
                    method: Method::POST,
                    url: self.add_events_url(),
                    headers: content_type("application/json"),
                    body,
                })
            }
            Translation::PlainTextUpload(upload) => Ok(OutgoingRequest {
                method: Method::POST,
                url: self.upload_logs_url(&upload),
                headers: content_type("text/plain"),
                body: upload.body,
            }),
        }
    }
}

fn content_type(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
    headers
}
