use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::context::HandlerContext;
use crate::outcome::{HandlerError, OperationOutcome};
use crate::request::{Request, RequestType};

/// Create/update/delete work or a poll step.
pub type OperationFn =
    dyn Fn(&Request, &mut HandlerContext) -> Result<OperationOutcome, HandlerError> + Send + Sync;

/// Pre-flight check run before any phase is dispatched.
pub type PreflightFn = dyn Fn(&Request) -> Result<(), HandlerError> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Create,
    Update,
    Delete,
    PollCreate,
    PollUpdate,
    PollDelete,
    InitFailure,
}

impl Phase {
    pub fn direct(request_type: RequestType) -> Self {
        match request_type {
            RequestType::Create => Self::Create,
            RequestType::Update => Self::Update,
            RequestType::Delete => Self::Delete,
        }
    }

    pub fn poll(request_type: RequestType) -> Self {
        match request_type {
            RequestType::Create => Self::PollCreate,
            RequestType::Update => Self::PollUpdate,
            RequestType::Delete => Self::PollDelete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::PollCreate => "PollCreate",
            Self::PollUpdate => "PollUpdate",
            Self::PollDelete => "PollDelete",
            Self::InitFailure => "InitFailure",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub enum Handler {
    Operation(Arc<OperationFn>),
    Preflight(Arc<PreflightFn>),
}

impl Handler {
    pub fn operation<F>(handler: F) -> Self
    where
        F: Fn(&Request, &mut HandlerContext) -> Result<OperationOutcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self::Operation(Arc::new(handler))
    }

    pub fn preflight<F>(check: F) -> Self
    where
        F: Fn(&Request) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self::Preflight(Arc::new(check))
    }

    fn fits(&self, phase: Phase) -> bool {
        matches!(
            (self, phase),
            (Self::Preflight(_), Phase::InitFailure)
                | (
                    Self::Operation(_),
                    Phase::Create
                        | Phase::Update
                        | Phase::Delete
                        | Phase::PollCreate
                        | Phase::PollUpdate
                        | Phase::PollDelete
                )
        )
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(_) => f.write_str("Handler::Operation"),
            Self::Preflight(_) => f.write_str("Handler::Preflight"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate handler for phase {0}")]
    DuplicateHandler(Phase),
    #[error("handler kind does not fit phase {0}")]
    IncompatibleHandler(Phase),
}

/// Phase → handler table, built once at start-up and then shared read-only.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: BTreeMap<Phase, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, phase: Phase, handler: Handler) -> Result<(), RegistryError> {
        if !handler.fits(phase) {
            return Err(RegistryError::IncompatibleHandler(phase));
        }
        if self.handlers.contains_key(&phase) {
            return Err(RegistryError::DuplicateHandler(phase));
        }
        self.handlers.insert(phase, handler);
        Ok(())
    }

    pub fn lookup(&self, phase: Phase) -> Option<&Handler> {
        self.handlers.get(&phase)
    }

    pub fn operation(&self, phase: Phase) -> Option<Arc<OperationFn>> {
        match self.lookup(phase) {
            Some(Handler::Operation(handler)) => Some(Arc::clone(handler)),
            _ => None,
        }
    }

    pub fn preflight(&self) -> Option<Arc<PreflightFn>> {
        match self.lookup(Phase::InitFailure) {
            Some(Handler::Preflight(check)) => Some(Arc::clone(check)),
            _ => None,
        }
    }

    pub fn polls(&self, request_type: RequestType) -> bool {
        self.lookup(Phase::poll(request_type)).is_some()
    }

    pub fn on_create<F>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&Request, &mut HandlerContext) -> Result<OperationOutcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.register(Phase::Create, Handler::operation(handler))
    }

    pub fn on_update<F>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&Request, &mut HandlerContext) -> Result<OperationOutcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.register(Phase::Update, Handler::operation(handler))
    }

    pub fn on_delete<F>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&Request, &mut HandlerContext) -> Result<OperationOutcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.register(Phase::Delete, Handler::operation(handler))
    }

    pub fn on_poll_create<F>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&Request, &mut HandlerContext) -> Result<OperationOutcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.register(Phase::PollCreate, Handler::operation(handler))
    }

    pub fn on_poll_update<F>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&Request, &mut HandlerContext) -> Result<OperationOutcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.register(Phase::PollUpdate, Handler::operation(handler))
    }

    pub fn on_poll_delete<F>(&mut self, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&Request, &mut HandlerContext) -> Result<OperationOutcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.register(Phase::PollDelete, Handler::operation(handler))
    }

    pub fn on_init_failure<F>(&mut self, check: F) -> Result<(), RegistryError>
    where
        F: Fn(&Request) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(Phase::InitFailure, Handler::preflight(check))
    }

    /// Records that start-up failed; every later invocation answers FAILED
    /// with this error instead of dispatching.
    pub fn declare_init_failure(&mut self, error: impl fmt::Display) -> Result<(), RegistryError> {
        let error = HandlerError::new(error.to_string());
        self.on_init_failure(move |_| Err(error.clone()))
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
