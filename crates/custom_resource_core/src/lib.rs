//! Shared custom resource protocol primitives.
//!
//! This crate owns the stack-manager event and callback contracts, the
//! handler registry, and the deterministic naming used for poll triggers.
//! It intentionally excludes AWS SDK and Lambda runtime concerns; those live
//! in `custom_resource_lambda`.

pub mod carried_state;
pub mod context;
pub mod ids;
pub mod outcome;
pub mod registry;
pub mod request;
pub mod response;
pub mod trigger;

pub use carried_state::CarriedState;
pub use context::HandlerContext;
pub use outcome::{HandlerError, OperationOutcome};
pub use registry::{Handler, HandlerRegistry, Phase, RegistryError};
pub use request::{parse, Invocation, InvocationKind, MalformedRequest, Request, RequestType};
pub use response::{ResponsePayload, ResponseStatus};
pub use trigger::TriggerKey;
