use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::carried_state::{CarriedState, CARRIED_STATE_KEY, POLL_MARKER_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }

    /// Case-insensitive parse of the `RequestType` keyword.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRequest {
    #[error("event must be a JSON object")]
    NotAnObject,
    #[error("event could not be decoded: {0}")]
    Decode(String),
    #[error("required field {0} is missing or empty")]
    MissingField(&'static str),
    #[error("unsupported RequestType {0:?}")]
    UnknownRequestType(String),
}

/// One lifecycle request issued by the stack manager.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub request_type: RequestType,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub physical_resource_id: Option<String>,
    pub resource_type: Option<String>,
    pub resource_properties: Map<String, Value>,
    pub old_resource_properties: Option<Map<String, Value>>,
    pub response_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    Initiating,
    Poll,
}

/// A parsed event: the request, how it arrived, and the carried state.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub request: Request,
    pub kind: InvocationKind,
    pub carried_state: CarriedState,
    original: Map<String, Value>,
}

impl Invocation {
    pub fn is_poll(&self) -> bool {
        self.kind == InvocationKind::Poll
    }

    /// Builds the event a poll trigger replays: the original stack-manager
    /// event plus the poll marker and the carried state block.
    pub fn poll_event(&self, carried_state: &CarriedState) -> Value {
        let mut event = self.original.clone();
        event.insert(POLL_MARKER_KEY.to_string(), Value::Bool(true));
        event.insert(
            CARRIED_STATE_KEY.to_string(),
            Value::Object(carried_state.to_block()),
        );
        Value::Object(event)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEvent {
    request_type: Option<String>,
    stack_id: Option<String>,
    request_id: Option<String>,
    logical_resource_id: Option<String>,
    physical_resource_id: Option<String>,
    resource_type: Option<String>,
    resource_properties: Option<Map<String, Value>>,
    old_resource_properties: Option<Map<String, Value>>,
    #[serde(rename = "ResponseURL")]
    response_url: Option<String>,
}

/// Parses a raw stack-manager event (initiating or poll re-invocation).
pub fn parse(raw_event: Value) -> Result<Invocation, MalformedRequest> {
    let Value::Object(mut original) = raw_event else {
        return Err(MalformedRequest::NotAnObject);
    };

    let poll_marker = original.remove(POLL_MARKER_KEY);
    let carried_block = original.remove(CARRIED_STATE_KEY);

    let raw: RawEvent = serde_json::from_value(Value::Object(original.clone()))
        .map_err(|error| MalformedRequest::Decode(error.to_string()))?;

    let request_type_keyword = required(raw.request_type, "RequestType")?;
    let request_type = RequestType::parse(&request_type_keyword)
        .ok_or(MalformedRequest::UnknownRequestType(request_type_keyword))?;

    let physical_resource_id = match (request_type, non_empty(raw.physical_resource_id)) {
        (RequestType::Update, None) => {
            return Err(MalformedRequest::MissingField("PhysicalResourceId"));
        }
        (RequestType::Create, _) => None,
        (_, id) => id,
    };

    let request = Request {
        request_type,
        stack_id: required(raw.stack_id, "StackId")?,
        request_id: required(raw.request_id, "RequestId")?,
        logical_resource_id: required(raw.logical_resource_id, "LogicalResourceId")?,
        physical_resource_id,
        resource_type: non_empty(raw.resource_type),
        resource_properties: raw.resource_properties.unwrap_or_default(),
        old_resource_properties: match request_type {
            RequestType::Create => None,
            _ => raw.old_resource_properties,
        },
        response_url: required(raw.response_url, "ResponseURL")?,
    };

    let is_poll = matches!(poll_marker, Some(Value::Bool(true))) || carried_block.is_some();
    let carried_state = match carried_block {
        Some(Value::Object(block)) => CarriedState::from_block(block),
        _ => CarriedState::default(),
    };

    Ok(Invocation {
        request,
        kind: if is_poll {
            InvocationKind::Poll
        } else {
            InvocationKind::Initiating
        },
        carried_state,
        original,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, MalformedRequest> {
    non_empty(value).ok_or(MalformedRequest::MissingField(field))
}
