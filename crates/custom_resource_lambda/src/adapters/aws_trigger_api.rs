use async_trait::async_trait;
use aws_sdk_eventbridge::error::DisplayErrorContext;
use aws_sdk_eventbridge::types::{RuleState, Target};

use crate::adapters::trigger_api::{TriggerApi, TriggerApiError};

pub const TARGET_ID: &str = "1";
const EVENTS_PRINCIPAL: &str = "events.amazonaws.com";
const INVOKE_ACTION: &str = "lambda:InvokeFunction";

/// EventBridge scheduled rule plus Lambda resource policy for this function.
#[derive(Clone)]
pub struct AwsTriggerApi {
    events: aws_sdk_eventbridge::Client,
    lambda: aws_sdk_lambda::Client,
    function_arn: String,
}

impl AwsTriggerApi {
    pub fn new(
        events: aws_sdk_eventbridge::Client,
        lambda: aws_sdk_lambda::Client,
        function_arn: impl Into<String>,
    ) -> Self {
        Self {
            events,
            lambda,
            function_arn: function_arn.into(),
        }
    }
}

#[async_trait]
impl TriggerApi for AwsTriggerApi {
    async fn put_rule(
        &self,
        rule_name: &str,
        schedule_expression: &str,
    ) -> Result<String, TriggerApiError> {
        let output = self
            .events
            .put_rule()
            .name(rule_name)
            .schedule_expression(schedule_expression)
            .state(RuleState::Enabled)
            .description("Polls a pending custom resource operation")
            .send()
            .await
            .map_err(|error| {
                TriggerApiError::Other(format!(
                    "failed to put rule {rule_name}: {}",
                    DisplayErrorContext(&error)
                ))
            })?;

        output
            .rule_arn()
            .map(str::to_string)
            .ok_or_else(|| TriggerApiError::Other(format!("rule {rule_name} returned no ARN")))
    }

    async fn add_permission(
        &self,
        statement_id: &str,
        rule_arn: &str,
    ) -> Result<(), TriggerApiError> {
        match self
            .lambda
            .add_permission()
            .function_name(&self.function_arn)
            .statement_id(statement_id)
            .action(INVOKE_ACTION)
            .principal(EVENTS_PRINCIPAL)
            .source_arn(rule_arn)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(error) => {
                let error = error.into_service_error();
                if error.is_resource_conflict_exception() {
                    Err(TriggerApiError::Conflict(format!("permission {statement_id}")))
                } else {
                    Err(TriggerApiError::Other(format!(
                        "failed to add permission {statement_id}: {}",
                        aws_sdk_lambda::error::DisplayErrorContext(&error)
                    )))
                }
            }
        }
    }

    async fn put_target(&self, rule_name: &str, input: &str) -> Result<(), TriggerApiError> {
        let target = Target::builder()
            .id(TARGET_ID)
            .arn(&self.function_arn)
            .input(input)
            .build()
            .map_err(|error| TriggerApiError::Other(format!("invalid rule target: {error}")))?;

        let output = self
            .events
            .put_targets()
            .rule(rule_name)
            .targets(target)
            .send()
            .await
            .map_err(|error| {
                TriggerApiError::Other(format!(
                    "failed to put target on rule {rule_name}: {}",
                    DisplayErrorContext(&error)
                ))
            })?;

        match output.failed_entries().first() {
            None => Ok(()),
            Some(entry) => Err(TriggerApiError::Other(format!(
                "rule {rule_name} rejected target: {}",
                entry.error_message().unwrap_or("no error message")
            ))),
        }
    }

    async fn remove_target(&self, rule_name: &str) -> Result<(), TriggerApiError> {
        match self
            .events
            .remove_targets()
            .rule(rule_name)
            .ids(TARGET_ID)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(error) => {
                let error = error.into_service_error();
                if error.is_resource_not_found_exception() {
                    Err(TriggerApiError::NotFound(format!("rule {rule_name}")))
                } else {
                    Err(TriggerApiError::Other(format!(
                        "failed to remove target from rule {rule_name}: {}",
                        DisplayErrorContext(&error)
                    )))
                }
            }
        }
    }

    async fn remove_permission(&self, statement_id: &str) -> Result<(), TriggerApiError> {
        match self
            .lambda
            .remove_permission()
            .function_name(&self.function_arn)
            .statement_id(statement_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(error) => {
                let error = error.into_service_error();
                if error.is_resource_not_found_exception() {
                    Err(TriggerApiError::NotFound(format!("permission {statement_id}")))
                } else {
                    Err(TriggerApiError::Other(format!(
                        "failed to remove permission {statement_id}: {}",
                        aws_sdk_lambda::error::DisplayErrorContext(&error)
                    )))
                }
            }
        }
    }

    async fn delete_rule(&self, rule_name: &str) -> Result<(), TriggerApiError> {
        match self.events.delete_rule().name(rule_name).send().await {
            Ok(_) => Ok(()),
            Err(error) => {
                let error = error.into_service_error();
                if error.is_resource_not_found_exception() {
                    Err(TriggerApiError::NotFound(format!("rule {rule_name}")))
                } else {
                    Err(TriggerApiError::Other(format!(
                        "failed to delete rule {rule_name}: {}",
                        DisplayErrorContext(&error)
                    )))
                }
            }
        }
    }
}
