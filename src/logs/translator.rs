use serde::Serialize;

use crate::logs::encoding::encode_component;
use crate::logs::payload::{InputBatch, InputEvent};

pub const SERVER_HOST_PREFIX: &str = "cloudwatch-";
/// Event type code for a plain log line.
pub const EVENT_TYPE: u8 = 0;
/// Severity code for info.
pub const EVENT_SEVERITY: u8 = 3;
/// Appended to millisecond timestamps; the API expects nanosecond resolution.
const TIMESTAMP_PADDING: &str = "000000";

/// Wire format of the outgoing request, chosen once per invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    StructuredEvents,
    #[default]
    PlainTextUpload,
}

impl DeliveryMode {
    #[must_use]
    pub fn from_add_events_flag(use_add_events_api: bool) -> Self {
        if use_add_events_api {
            DeliveryMode::StructuredEvents
        } else {
            DeliveryMode::PlainTextUpload
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Translation {
    StructuredEvents(AddEventsRequest),
    PlainTextUpload(UploadLogsRequest),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEventsRequest {
    pub token: String,
    pub session: String,
    pub session_info: SessionInfo,
    pub events: Vec<AddEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub server_host: String,
    pub logfile: String,
    pub parser: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AddEvent {
    pub ts: String,
    #[serde(rename = "type")]
    pub event_type: u8,
    pub sev: u8,
    pub attrs: EventAttributes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttributes {
    pub log_stream: String,
    pub id: String,
    pub message: String,
}

/// Upload fields. Everything except `body` is already URL encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadLogsRequest {
    pub token: String,
    pub host: String,
    pub logfile: String,
    pub logstream: String,
    pub body: String,
}

#[must_use]
pub fn server_host(owner: &str) -> String {
    format!("{SERVER_HOST_PREFIX}{owner}")
}

#[must_use]
pub fn translate(
    mode: DeliveryMode,
    batch: &InputBatch,
    token: &str,
    parser_name: &str,
) -> Translation {
    match mode {
        DeliveryMode::StructuredEvents => {
            Translation::StructuredEvents(to_add_events(batch, token, parser_name))
        }
        DeliveryMode::PlainTextUpload => Translation::PlainTextUpload(to_upload_logs(batch, token)),
    }
}

#[must_use]
pub fn to_add_events(batch: &InputBatch, token: &str, parser_name: &str) -> AddEventsRequest {
    AddEventsRequest {
        token: token.to_string(),
        session: batch.log_stream.clone(),
        session_info: SessionInfo {
            server_host: server_host(&batch.owner),
            logfile: batch.log_group.clone(),
            parser: parser_name.to_string(),
        },
        events: batch
            .log_events
            .iter()
            .map(|event| to_add_event(&batch.log_stream, event))
            .collect(),
    }
}

fn to_add_event(log_stream: &str, event: &InputEvent) -> AddEvent {
    AddEvent {
        ts: format!("{}{TIMESTAMP_PADDING}", event.timestamp),
        event_type: EVENT_TYPE,
        sev: EVENT_SEVERITY,
        attrs: EventAttributes {
            log_stream: log_stream.to_string(),
            id: event.id.clone(),
            message: event.message.clone(),
        },
    }
}

#[must_use]
pub fn to_upload_logs(batch: &InputBatch, token: &str) -> UploadLogsRequest {
    UploadLogsRequest {
        token: encode_component(token),
        host: encode_component(&server_host(&batch.owner)),
        logfile: encode_component(&batch.log_group),
        logstream: encode_component(&batch.log_stream),
        body: join_messages(&batch.log_events),
    }
}

/// Joins messages with `\n`, dropping at most one trailing newline from each message.
#[must_use]
pub fn join_messages(events: &[InputEvent]) -> String {
    events
        .iter()
        .map(|event| {
            event
                .message
                .strip_suffix('\n')
                .unwrap_or(event.message.as_str())
        })
        .collect::<Vec<&str>>()
        .join("\n")
}
