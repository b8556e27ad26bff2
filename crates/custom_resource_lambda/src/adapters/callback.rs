use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transient transport failure: {0}")]
    Transient(String),
    #[error("permanent transport failure: {0}")]
    Permanent(String),
}

/// Uploads a serialized response to the stack manager's pre-signed URL.
#[async_trait]
pub trait CallbackTransport: Send + Sync {
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError>;
}

pub struct HttpCallbackTransport {
    client: reqwest::Client,
}

impl HttpCallbackTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackTransport for HttpCallbackTransport {
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError> {
        // The pre-signed upload target is signed for an empty content type.
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "")
            .body(body)
            .send()
            .await
            .map_err(classify_request_error)?;

        match classify_status(response.status()) {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }
}

pub fn classify_status(status: StatusCode) -> Option<TransportError> {
    if status.is_success() {
        return None;
    }
    let message = format!("callback endpoint answered HTTP {status}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Some(TransportError::Transient(message))
    } else {
        Some(TransportError::Permanent(message))
    }
}

fn classify_request_error(error: reqwest::Error) -> TransportError {
    // Strip the URL: it carries the upload signature.
    let error = error.without_url();
    if error.is_builder() {
        TransportError::Permanent(format!("invalid callback request: {error}"))
    } else {
        TransportError::Transient(format!("callback request failed: {error}"))
    }
}
