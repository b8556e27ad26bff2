use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::Request;

pub const MAX_REASON_CHARS: usize = 256;
pub const TIMEOUT_REASON: &str = "timeout";

const TRUNCATED_PREFIX: &str = "ERROR: (truncated) ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

impl ResponseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

/// Callback document PUT to the request's `ResponseURL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponsePayload {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_echo: bool,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ResponsePayload {
    pub fn success(
        request: &Request,
        physical_resource_id: String,
        data: Map<String, Value>,
        no_echo: bool,
    ) -> Self {
        Self {
            status: ResponseStatus::Success,
            reason: None,
            physical_resource_id: Some(physical_resource_id),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            no_echo,
            data,
        }
    }

    /// FAILED payload; the reason is truncated to [`MAX_REASON_CHARS`].
    pub fn failed(
        request: &Request,
        reason: &str,
        physical_resource_id: Option<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            status: ResponseStatus::Failed,
            reason: Some(truncate_reason(reason)),
            physical_resource_id,
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            no_echo: false,
            data,
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Caps a reason at [`MAX_REASON_CHARS`], keeping its tail.
pub fn truncate_reason(reason: &str) -> String {
    let total = reason.chars().count();
    if total <= MAX_REASON_CHARS {
        return reason.to_string();
    }
    let tail_chars = MAX_REASON_CHARS - TRUNCATED_PREFIX.chars().count();
    let tail: String = reason.chars().skip(total - tail_chars).collect();
    format!("{TRUNCATED_PREFIX}{tail}")
}

/// Falls back to a log-stream pointer when the error message is blank.
pub fn failure_reason(message: &str, log_stream_name: Option<&str>) -> String {
    if !message.trim().is_empty() {
        return message.to_string();
    }
    match log_stream_name {
        Some(stream) => format!("See the details in CloudWatch Log Stream: {stream}"),
        None => "Handler failed without an error message".to_string(),
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
