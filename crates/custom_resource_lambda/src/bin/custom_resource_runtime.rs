//! Sample provider: a "countdown" resource that becomes ready after
//! `DelaySeconds` and reports when it did.

use chrono::{DateTime, Utc};
use custom_resource_core::{
    HandlerContext, HandlerError, HandlerRegistry, OperationOutcome, Request,
};
use lambda_runtime::Error;
use serde_json::Value;

const DELAY_PROPERTY: &str = "DelaySeconds";
const READY_AT_KEY: &str = "ReadyAt";
const DEFAULT_DELAY_SECONDS: i64 = 60;

fn delay_seconds(request: &Request) -> Result<i64, HandlerError> {
    // template parameters arrive as strings
    let delay = match request.resource_properties.get(DELAY_PROPERTY) {
        None => DEFAULT_DELAY_SECONDS,
        Some(Value::Number(number)) => number
            .as_i64()
            .ok_or_else(|| HandlerError::new(format!("{DELAY_PROPERTY} must be an integer")))?,
        Some(Value::String(text)) => text.trim().parse::<i64>()?,
        Some(other) => {
            return Err(HandlerError::new(format!(
                "{DELAY_PROPERTY} must be an integer, got {other}"
            )));
        }
    };
    if delay < 0 {
        return Err(HandlerError::new(format!("{DELAY_PROPERTY} must not be negative")));
    }
    Ok(delay)
}

fn arm_countdown(request: &Request, context: &mut HandlerContext) -> Result<(), HandlerError> {
    let ready_at = chrono::Duration::try_seconds(delay_seconds(request)?)
        .and_then(|delay| Utc::now().checked_add_signed(delay))
        .ok_or_else(|| HandlerError::new(format!("{DELAY_PROPERTY} is out of range")))?;
    context.set(READY_AT_KEY, ready_at.to_rfc3339());
    Ok(())
}

fn create(
    request: &Request,
    context: &mut HandlerContext,
) -> Result<OperationOutcome, HandlerError> {
    arm_countdown(request, context)?;
    Ok(OperationOutcome::GenerateId)
}

fn update(
    request: &Request,
    context: &mut HandlerContext,
) -> Result<OperationOutcome, HandlerError> {
    arm_countdown(request, context)?;
    Ok(OperationOutcome::Done)
}

fn check_countdown(
    request: &Request,
    context: &mut HandlerContext,
) -> Result<OperationOutcome, HandlerError> {
    let ready_at = context
        .data
        .get(READY_AT_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::new(format!("carried state lost {READY_AT_KEY}")))?;
    let ready_at = DateTime::parse_from_rfc3339(ready_at)?.with_timezone(&Utc);

    if Utc::now() < ready_at {
        return Ok(OperationOutcome::Pending);
    }
    let name = &request.logical_resource_id;
    let ready_at = ready_at.to_rfc3339();
    context.set("Message", format!("{name} became ready at {ready_at}"));
    Ok(OperationOutcome::Done)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let mut registry = HandlerRegistry::new();
    registry.on_create(create)?;
    registry.on_update(update)?;
    registry.on_poll_create(check_countdown)?;
    registry.on_poll_update(check_countdown)?;
    registry.on_delete(|_, _| Ok(OperationOutcome::Done))?;

    custom_resource_lambda::runtime::run(registry).await
}
