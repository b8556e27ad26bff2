#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use custom_resource_core::{HandlerRegistry, TriggerKey};
use custom_resource_lambda::adapters::callback::CallbackTransport;
use custom_resource_lambda::adapters::trigger_api::TriggerApi;
use custom_resource_lambda::lifecycle::{
    Dispatcher, DispatcherSettings, InvocationContext, PollScheduler, ResponseDelivery,
    RetryPolicy,
};
use serde_json::{json, Value};

pub const STACK_ID: &str =
    "arn:aws:cloudformation:eu-west-1:123456789012:stack/orders/6d0b2a40-0000-4000-8000-000000000001";
pub const RESPONSE_URL: &str =
    "https://cloudformation-custom-resource-response.example/signed?sig=abc";
pub const LOGICAL_ID: &str = "OrdersTable";

pub fn create_event() -> Value {
    json!({
        "RequestType": "Create",
        "ServiceToken": "arn:aws:lambda:eu-west-1:123456789012:function:provider",
        "ResponseURL": RESPONSE_URL,
        "StackId": STACK_ID,
        "RequestId": "11111111-aaaa-4bbb-8ccc-000000000001",
        "LogicalResourceId": LOGICAL_ID,
        "ResourceType": "Custom::Table",
        "ResourceProperties": {"ServiceToken": "arn:aws:lambda:eu-west-1:123456789012:function:provider", "Capacity": "5"}
    })
}

pub fn update_event(physical_resource_id: &str) -> Value {
    json!({
        "RequestType": "Update",
        "ResponseURL": RESPONSE_URL,
        "StackId": STACK_ID,
        "RequestId": "11111111-aaaa-4bbb-8ccc-000000000002",
        "LogicalResourceId": LOGICAL_ID,
        "PhysicalResourceId": physical_resource_id,
        "ResourceType": "Custom::Table",
        "ResourceProperties": {"Capacity": "10"},
        "OldResourceProperties": {"Capacity": "5"}
    })
}

pub fn delete_event(physical_resource_id: &str) -> Value {
    json!({
        "RequestType": "Delete",
        "ResponseURL": RESPONSE_URL,
        "StackId": STACK_ID,
        "RequestId": "11111111-aaaa-4bbb-8ccc-000000000003",
        "LogicalResourceId": LOGICAL_ID,
        "PhysicalResourceId": physical_resource_id,
        "ResourceType": "Custom::Table",
        "ResourceProperties": {"Capacity": "10"}
    })
}

pub fn rule_name() -> String {
    TriggerKey::new(STACK_ID, LOGICAL_ID).rule_name()
}

pub fn context(remaining: Duration) -> InvocationContext {
    InvocationContext {
        remaining_time: remaining,
        log_stream_name: Some("2026/10/19/[$LATEST]0123456789abcdef".to_string()),
    }
}

/// Plenty of time: the watchdog never fires.
pub fn relaxed_context() -> InvocationContext {
    context(Duration::from_secs(30))
}

pub fn dispatcher(
    registry: HandlerRegistry,
    transport: Arc<dyn CallbackTransport>,
    trigger_api: Arc<dyn TriggerApi>,
    timeout_margin: Duration,
) -> Dispatcher {
    Dispatcher::new(
        Arc::new(registry),
        ResponseDelivery::new(
            transport,
            RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
            },
        ),
        PollScheduler::new(trigger_api),
        DispatcherSettings {
            poll_interval_minutes: 1,
            timeout_margin,
        },
    )
}
