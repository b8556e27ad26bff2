use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use custom_resource_core::HandlerRegistry;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use tracing::info;

use crate::adapters::aws_trigger_api::AwsTriggerApi;
use crate::adapters::callback::{CallbackTransport, HttpCallbackTransport};
use crate::config::LambdaConfig;
use crate::lifecycle::{Dispatcher, InvocationContext, PollScheduler, ResponseDelivery};
use crate::logging;

const LOG_STREAM_VAR: &str = "AWS_LAMBDA_LOG_STREAM_NAME";

/// Clients built once per cold start and shared by every invocation.
struct Shared {
    registry: Arc<HandlerRegistry>,
    config: LambdaConfig,
    delivery: ResponseDelivery,
    events: aws_sdk_eventbridge::Client,
    lambda: aws_sdk_lambda::Client,
    log_stream_name: Option<String>,
}

impl Shared {
    fn dispatcher(&self, function_arn: &str) -> Dispatcher {
        let trigger_api = AwsTriggerApi::new(
            self.events.clone(),
            self.lambda.clone(),
            function_arn,
        );
        Dispatcher::new(
            Arc::clone(&self.registry),
            self.delivery.clone(),
            PollScheduler::new(Arc::new(trigger_api)),
            self.config.dispatcher_settings(),
        )
    }
}

/// Serves custom resource events with the given handlers until the platform
/// shuts the environment down.
pub async fn run(registry: HandlerRegistry) -> Result<(), Error> {
    let config = LambdaConfig::from_env()?;
    logging::init(config.log_format, &config.log_level)?;
    info!(
        poll_interval_minutes = config.poll_interval_minutes,
        timeout_margin_ms = config.timeout_margin.as_millis() as u64,
        handlers = ?registry,
        "custom resource runtime starting"
    );

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let transport: Arc<dyn CallbackTransport> =
        Arc::new(HttpCallbackTransport::new(config.callback_timeout)?);
    let shared = Arc::new(Shared {
        registry: Arc::new(registry),
        delivery: ResponseDelivery::new(transport, config.retry),
        events: aws_sdk_eventbridge::Client::new(&aws_config),
        lambda: aws_sdk_lambda::Client::new(&aws_config),
        log_stream_name: std::env::var(LOG_STREAM_VAR).ok(),
        config,
    });

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let shared = Arc::clone(&shared);
        async move { handle_event(&shared, event).await }
    }))
    .await
}

async fn handle_event(shared: &Shared, event: LambdaEvent<Value>) -> Result<Value, Error> {
    let LambdaEvent { payload, context } = event;
    let dispatcher = shared.dispatcher(&context.invoked_function_arn);
    let invocation_context = InvocationContext {
        remaining_time: remaining_until(context.deadline, Utc::now().timestamp_millis()),
        log_stream_name: shared.log_stream_name.clone(),
    };

    let outcome = dispatcher.handle(payload, invocation_context).await;
    Ok(json!({ "outcome": outcome.as_str() }))
}

/// Time left before `deadline_ms`, both as milliseconds since the epoch.
fn remaining_until(deadline_ms: u64, now_ms: i64) -> Duration {
    let now_ms = u64::try_from(now_ms).unwrap_or_default();
    Duration::from_millis(deadline_ms.saturating_sub(now_ms))
}
