use std::fmt;

/// What a lifecycle handler reports back to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// Finished; respond with this physical resource id.
    Complete(String),
    /// Finished; the engine generates a physical resource id.
    GenerateId,
    /// Finished; keep the id the request (or carried state) already has.
    Done,
    /// Not finished yet. Only meaningful from a poll handler.
    Pending,
}

impl OperationOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl From<String> for OperationOutcome {
    fn from(physical_resource_id: String) -> Self {
        Self::Complete(physical_resource_id)
    }
}

impl From<&str> for OperationOutcome {
    fn from(physical_resource_id: &str) -> Self {
        Self::Complete(physical_resource_id.to_string())
    }
}

/// Failure raised by a user handler; its message becomes the response reason.
///
/// Any `std::error::Error` converts into it, so handlers can use `?` on
/// their own error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error.to_string())
    }
}
