//! Request lifecycle: dispatch, timeout watchdog, poll scheduling and
//! response delivery.

pub mod delivery;
pub mod dispatcher;
pub mod scheduler;
pub mod watchdog;

pub use delivery::{CompletionGuard, DeliveryError, DeliveryReport, ResponseDelivery, RetryPolicy};
pub use dispatcher::{Dispatcher, DispatcherSettings, InvocationContext, InvocationOutcome};
pub use scheduler::{PollSchedule, PollScheduler, SchedulingError};
pub use watchdog::Watchdog;
