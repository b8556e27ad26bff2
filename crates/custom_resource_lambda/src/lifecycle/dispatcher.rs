use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use custom_resource_core::ids::generate_physical_id;
use custom_resource_core::registry::OperationFn;
use custom_resource_core::response::{failure_reason, TIMEOUT_REASON};
use custom_resource_core::{
    CarriedState, HandlerContext, HandlerError, HandlerRegistry, Invocation, OperationOutcome,
    Phase, Request, RequestType, ResponsePayload, ResponseStatus, TriggerKey,
};
use serde_json::{Map, Value};
use tokio::task::JoinError;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::delivery::{CompletionGuard, DeliveryReport, ResponseDelivery};
use super::scheduler::PollScheduler;
use super::watchdog::{fire_delay, Watchdog};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatcherSettings {
    pub poll_interval_minutes: u32,
    pub timeout_margin: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval_minutes: 2,
            timeout_margin: Duration::from_secs(2),
        }
    }
}

/// Per-invocation facts supplied by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub remaining_time: Duration,
    pub log_stream_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The main path produced the terminal response.
    Responded {
        status: ResponseStatus,
        delivered: bool,
    },
    /// A poll trigger will re-invoke the function; nothing was sent.
    PollPending,
    /// The watchdog answered FAILED "timeout" before the main path finished.
    TimedOut,
    /// The event could not be parsed, so no response could be addressed.
    Unreportable,
}

impl InvocationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Responded { .. } => "responded",
            Self::PollPending => "poll_pending",
            Self::TimedOut => "timed_out",
            Self::Unreportable => "unreportable",
        }
    }
}

/// What the watchdog reports if it has to answer on the main path's behalf.
#[derive(Debug, Clone, Default)]
struct PartialResponse {
    physical_resource_id: Option<String>,
    data: Map<String, Value>,
}

type SharedPartial = Arc<Mutex<PartialResponse>>;

fn publish(
    partial: &SharedPartial,
    physical_resource_id: Option<String>,
    data: Map<String, Value>,
) {
    let mut guard = partial.lock().unwrap_or_else(PoisonError::into_inner);
    guard.physical_resource_id = physical_resource_id;
    guard.data = data;
}

fn snapshot(partial: &SharedPartial) -> PartialResponse {
    partial
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Runs one invocation through the custom resource lifecycle.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    delivery: ResponseDelivery,
    scheduler: PollScheduler,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        delivery: ResponseDelivery,
        scheduler: PollScheduler,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            registry,
            delivery,
            scheduler,
            settings,
        }
    }

    pub async fn handle(&self, raw_event: Value, context: InvocationContext) -> InvocationOutcome {
        let invocation = match custom_resource_core::parse(raw_event) {
            Ok(invocation) => invocation,
            Err(error) => {
                error!(error = %error, "malformed custom resource event; no response can be sent");
                return InvocationOutcome::Unreportable;
            }
        };

        let request = &invocation.request;
        let span = info_span!(
            "invocation",
            request_type = %request.request_type,
            stack_id = %request.stack_id,
            request_id = %request.request_id,
            logical_resource_id = %request.logical_resource_id,
            poll = invocation.is_poll(),
        );
        self.dispatch(invocation, context).instrument(span).await
    }

    async fn dispatch(
        &self,
        invocation: Invocation,
        context: InvocationContext,
    ) -> InvocationOutcome {
        info!("received custom resource request");
        let invocation = Arc::new(invocation);
        let guard = CompletionGuard::new();
        let partial: SharedPartial = Arc::new(Mutex::new(PartialResponse {
            physical_resource_id: known_physical_id(&invocation),
            data: invocation.carried_state.data().clone(),
        }));

        let fire_in = fire_delay(context.remaining_time, self.settings.timeout_margin);
        let watchdog = {
            let dispatcher = self.clone();
            let invocation = Arc::clone(&invocation);
            let guard = guard.clone();
            let partial = Arc::clone(&partial);
            Watchdog::arm(fire_in, move || async move {
                dispatcher.expire(&invocation, &guard, &partial).await
            })
        };

        let outcome = tokio::select! {
            outcome = self.run(&invocation, &guard, &partial, &context) => {
                if outcome == InvocationOutcome::TimedOut {
                    // the watchdog claimed the response; let it finish sending
                    watchdog.expired().await;
                }
                outcome
            }
            _ = watchdog.expired() => InvocationOutcome::TimedOut,
        };
        watchdog.disarm();

        if outcome == InvocationOutcome::TimedOut
            && self.registry.polls(invocation.request.request_type)
        {
            // scheduling calls from the abandoned main path may have landed
            // after the watchdog's own cleanup
            self.cancel_trigger(&invocation.request).await;
        }

        info!(outcome = outcome.as_str(), "invocation finished");
        outcome
    }

    async fn run(
        &self,
        invocation: &Arc<Invocation>,
        guard: &CompletionGuard,
        partial: &SharedPartial,
        context: &InvocationContext,
    ) -> InvocationOutcome {
        if let Err(failure) = self.preflight(invocation).await {
            warn!(error = %failure, "pre-flight check failed");
            if invocation.is_poll() {
                self.cancel_trigger(&invocation.request).await;
            }
            return self.fail(invocation, guard, partial, context, &failure).await;
        }

        if invocation.is_poll() {
            self.run_poll(invocation, guard, partial, context).await
        } else if self.registry.polls(invocation.request.request_type) {
            self.run_polled_start(invocation, guard, partial, context).await
        } else {
            self.run_direct(invocation, guard, partial, context).await
        }
    }

    async fn run_direct(
        &self,
        invocation: &Arc<Invocation>,
        guard: &CompletionGuard,
        partial: &SharedPartial,
        context: &InvocationContext,
    ) -> InvocationOutcome {
        let request = &invocation.request;
        let phase = Phase::direct(request.request_type);
        let (result, handler_context) = self.run_phase(phase, invocation).await;

        match result {
            Ok(OperationOutcome::Pending) => {
                let failure = HandlerError::new(format!(
                    "{phase} handler returned Pending but no poll handler is registered"
                ));
                self.fail(invocation, guard, partial, context, &failure).await
            }
            Ok(outcome) => {
                let physical_id = resolve_physical_id(request, &outcome, None);
                self.succeed(invocation, guard, partial, physical_id, handler_context).await
            }
            Err(failure) => self.fail(invocation, guard, partial, context, &failure).await,
        }
    }

    /// Initiating call of a phase that completes through polling: run the
    /// direct handler once, then hand over to the poll trigger.
    async fn run_polled_start(
        &self,
        invocation: &Arc<Invocation>,
        guard: &CompletionGuard,
        partial: &SharedPartial,
        context: &InvocationContext,
    ) -> InvocationOutcome {
        let request = &invocation.request;
        let phase = Phase::direct(request.request_type);
        let (result, handler_context) = self.run_phase(phase, invocation).await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(failure) => return self.fail(invocation, guard, partial, context, &failure).await,
        };

        let provisional_id = match outcome {
            OperationOutcome::Complete(id) if !id.trim().is_empty() => Some(id),
            OperationOutcome::GenerateId => Some(generate_physical_id(request)),
            _ => request.physical_resource_id.clone(),
        };
        let carried = CarriedState::new(handler_context.data.clone(), provisional_id.clone());
        publish(partial, provisional_id, handler_context.data);

        if guard.is_claimed() {
            return InvocationOutcome::TimedOut;
        }

        let key = trigger_key(request);
        let poll_event = invocation.poll_event(&carried);
        match self
            .scheduler
            .ensure_scheduled(&key, self.settings.poll_interval_minutes, &poll_event)
            .await
        {
            Ok(schedule) => {
                if guard.is_claimed() {
                    return InvocationOutcome::TimedOut;
                }
                info!(
                    rule_name = %schedule.rule_name,
                    interval_minutes = schedule.interval_minutes,
                    "operation pending; polling scheduled"
                );
                InvocationOutcome::PollPending
            }
            Err(scheduling_error) => {
                error!(error = %scheduling_error, "failed to schedule polling");
                self.cancel_trigger(request).await;
                let failure =
                    HandlerError::new(format!("failed to schedule polling: {scheduling_error}"));
                self.fail(invocation, guard, partial, context, &failure).await
            }
        }
    }

    async fn run_poll(
        &self,
        invocation: &Arc<Invocation>,
        guard: &CompletionGuard,
        partial: &SharedPartial,
        context: &InvocationContext,
    ) -> InvocationOutcome {
        let request = &invocation.request;
        let phase = Phase::poll(request.request_type);
        let Some(handler) = self.registry.operation(phase) else {
            error!(phase = %phase, "poll invocation but no poll handler is registered");
            self.cancel_trigger(request).await;
            let failure = HandlerError::new(format!("no handler registered for {phase}"));
            return self.fail(invocation, guard, partial, context, &failure).await;
        };

        let handler_context = HandlerContext::from_carried_state(
            &invocation.carried_state,
            request.physical_resource_id.as_deref(),
        );
        let (result, handler_context) =
            invoke_handler(handler, Arc::clone(invocation), handler_context).await;

        if matches!(result, Ok(OperationOutcome::Pending)) {
            if guard.is_claimed() {
                return InvocationOutcome::TimedOut;
            }
            debug!("operation still pending");
            return InvocationOutcome::PollPending;
        }

        self.cancel_trigger(request).await;
        match result {
            Ok(outcome) => {
                let physical_id = resolve_physical_id(
                    request,
                    &outcome,
                    invocation.carried_state.provisional_physical_id(),
                );
                self.succeed(invocation, guard, partial, physical_id, handler_context).await
            }
            Err(failure) => self.fail(invocation, guard, partial, context, &failure).await,
        }
    }

    async fn run_phase(
        &self,
        phase: Phase,
        invocation: &Arc<Invocation>,
    ) -> (Result<OperationOutcome, HandlerError>, HandlerContext) {
        let handler_context =
            HandlerContext::new(Map::new(), invocation.request.physical_resource_id.clone());
        match self.registry.operation(phase) {
            Some(handler) => invoke_handler(handler, Arc::clone(invocation), handler_context).await,
            None => {
                warn!(phase = %phase, "no handler registered; treating as a no-op");
                (Ok(OperationOutcome::Done), handler_context)
            }
        }
    }

    async fn preflight(&self, invocation: &Arc<Invocation>) -> Result<(), HandlerError> {
        let Some(check) = self.registry.preflight() else {
            return Ok(());
        };
        let invocation = Arc::clone(invocation);
        tokio::task::spawn_blocking(move || check(&invocation.request))
            .await
            .unwrap_or_else(|join_error| Err(join_failure(join_error)))
    }

    async fn succeed(
        &self,
        invocation: &Invocation,
        guard: &CompletionGuard,
        partial: &SharedPartial,
        physical_resource_id: String,
        handler_context: HandlerContext,
    ) -> InvocationOutcome {
        let request = &invocation.request;
        publish(
            partial,
            Some(physical_resource_id.clone()),
            handler_context.data.clone(),
        );
        let payload = ResponsePayload::success(
            request,
            physical_resource_id,
            handler_context.data,
            handler_context.no_echo,
        );
        self.respond(guard, &payload, request).await
    }

    async fn fail(
        &self,
        invocation: &Invocation,
        guard: &CompletionGuard,
        partial: &SharedPartial,
        context: &InvocationContext,
        failure: &HandlerError,
    ) -> InvocationOutcome {
        let request = &invocation.request;
        error!(error = %failure, "operation failed");
        let known = snapshot(partial);
        let reason = failure_reason(failure.message(), context.log_stream_name.as_deref());
        let payload = ResponsePayload::failed(
            request,
            &reason,
            known.physical_resource_id,
            known.data,
        );
        self.respond(guard, &payload, request).await
    }

    async fn respond(
        &self,
        guard: &CompletionGuard,
        payload: &ResponsePayload,
        request: &Request,
    ) -> InvocationOutcome {
        let status = payload.status;
        let url = &request.response_url;
        match self.delivery.send(guard, payload, url).await {
            Ok(DeliveryReport::Delivered { .. }) => InvocationOutcome::Responded {
                status,
                delivered: true,
            },
            Ok(DeliveryReport::Suppressed) => InvocationOutcome::TimedOut,
            Err(delivery_error) => {
                error!(
                    error = %delivery_error,
                    status = status.as_str(),
                    "failed to deliver response"
                );
                InvocationOutcome::Responded {
                    status,
                    delivered: false,
                }
            }
        }
    }

    /// Watchdog action. Returns `true` when it sent (or tried to send) the
    /// timeout response, `false` when the main path had already answered.
    async fn expire(
        &self,
        invocation: &Invocation,
        guard: &CompletionGuard,
        partial: &SharedPartial,
    ) -> bool {
        let request = &invocation.request;
        let known = snapshot(partial);
        let payload = ResponsePayload::failed(
            request,
            TIMEOUT_REASON,
            known.physical_resource_id,
            known.data,
        );

        let url = &request.response_url;
        match self.delivery.send(guard, &payload, url).await {
            Ok(DeliveryReport::Suppressed) => return false,
            Ok(DeliveryReport::Delivered { .. }) => {
                warn!("execution is about to time out; responded FAILED");
            }
            Err(delivery_error) => {
                error!(error = %delivery_error, "failed to deliver timeout response");
            }
        }

        if self.registry.polls(request.request_type) {
            self.cancel_trigger(request).await;
        }
        true
    }

    async fn cancel_trigger(&self, request: &Request) {
        if let Err(scheduling_error) = self.scheduler.cancel(&trigger_key(request)).await {
            error!(error = %scheduling_error, "failed to remove poll trigger");
        }
    }
}

async fn invoke_handler(
    handler: Arc<OperationFn>,
    invocation: Arc<Invocation>,
    mut handler_context: HandlerContext,
) -> (Result<OperationOutcome, HandlerError>, HandlerContext) {
    let before_call = handler_context.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let result = handler(&invocation.request, &mut handler_context);
        (result, handler_context)
    })
    .await;

    match joined {
        Ok(finished) => finished,
        Err(join_error) => (Err(join_failure(join_error)), before_call),
    }
}

fn join_failure(join_error: JoinError) -> HandlerError {
    if join_error.is_panic() {
        HandlerError::new(format!(
            "handler panicked: {}",
            panic_message(join_error.into_panic())
        ))
    } else {
        HandlerError::new("handler task was cancelled")
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn trigger_key(request: &Request) -> TriggerKey {
    TriggerKey::new(&request.stack_id, &request.logical_resource_id)
}

/// Physical id reported if the invocation fails before a handler returns.
fn known_physical_id(invocation: &Invocation) -> Option<String> {
    let request_id = invocation.request.physical_resource_id.as_deref();
    let provisional = invocation.carried_state.provisional_physical_id();
    let id = match invocation.request.request_type {
        RequestType::Delete => request_id.or(provisional),
        RequestType::Create | RequestType::Update => provisional.or(request_id),
    };
    id.map(str::to_string)
}

/// Physical id for a successful terminal response.
fn resolve_physical_id(
    request: &Request,
    outcome: &OperationOutcome,
    provisional: Option<&str>,
) -> String {
    if request.request_type == RequestType::Delete {
        if let Some(id) = &request.physical_resource_id {
            return id.clone();
        }
    }
    match outcome {
        OperationOutcome::Complete(id) if !id.trim().is_empty() => id.clone(),
        OperationOutcome::GenerateId => provisional
            .map(str::to_string)
            .unwrap_or_else(|| generate_physical_id(request)),
        _ => provisional
            .or(request.physical_resource_id.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| generate_physical_id(request)),
    }
}
