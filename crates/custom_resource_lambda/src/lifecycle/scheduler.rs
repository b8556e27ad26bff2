use std::fmt;
use std::sync::Arc;

use custom_resource_core::trigger::schedule_expression;
use custom_resource_core::TriggerKey;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::adapters::trigger_api::{TriggerApi, TriggerApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStep {
    PutRule,
    AddPermission,
    PutTarget,
    RemoveTarget,
    RemovePermission,
    DeleteRule,
}

impl fmt::Display for SchedulingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PutRule => "put rule",
            Self::AddPermission => "add invoke permission",
            Self::PutTarget => "put target",
            Self::RemoveTarget => "remove target",
            Self::RemovePermission => "remove invoke permission",
            Self::DeleteRule => "delete rule",
        })
    }
}

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("failed to encode poll input: {0}")]
    EncodeInput(#[from] serde_json::Error),
    #[error("{step} failed for poll trigger {rule_name}: {source}")]
    Step {
        step: SchedulingStep,
        rule_name: String,
        #[source]
        source: TriggerApiError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSchedule {
    pub rule_name: String,
    pub rule_arn: String,
    pub statement_id: String,
    pub interval_minutes: u32,
}

/// Owns the recurring trigger that re-invokes this function while an
/// operation is pending.
#[derive(Clone)]
pub struct PollScheduler {
    api: Arc<dyn TriggerApi>,
}

impl PollScheduler {
    pub fn new(api: Arc<dyn TriggerApi>) -> Self {
        Self { api }
    }

    /// Creates or refreshes the trigger. Order is rule, permission, target:
    /// the target is attached last so the rule can never fire without the
    /// permission in place.
    pub async fn ensure_scheduled(
        &self,
        key: &TriggerKey,
        interval_minutes: u32,
        input: &Value,
    ) -> Result<PollSchedule, SchedulingError> {
        let rule_name = key.rule_name();
        let statement_id = key.statement_id();
        let input = serde_json::to_string(input)?;
        let step_error = |step: SchedulingStep| {
            let rule_name = rule_name.clone();
            move |source: TriggerApiError| SchedulingError::Step {
                step,
                rule_name,
                source,
            }
        };

        let rule_arn = self
            .api
            .put_rule(&rule_name, &schedule_expression(interval_minutes))
            .await
            .map_err(step_error(SchedulingStep::PutRule))?;

        match self.api.add_permission(&statement_id, &rule_arn).await {
            Ok(()) => {}
            Err(TriggerApiError::Conflict(_)) => {
                debug!(statement_id = %statement_id, "invoke permission already present");
            }
            Err(source) => return Err(step_error(SchedulingStep::AddPermission)(source)),
        }

        self.api
            .put_target(&rule_name, &input)
            .await
            .map_err(step_error(SchedulingStep::PutTarget))?;

        info!(
            rule_name = %rule_name,
            interval_minutes,
            "poll trigger scheduled"
        );
        Ok(PollSchedule {
            rule_name,
            rule_arn,
            statement_id,
            interval_minutes,
        })
    }

    /// Tears the trigger down: target, then permission, then rule. Anything
    /// already gone counts as removed. Stops at the first real failure so a
    /// rule is never left targeting the function without its permission.
    pub async fn cancel(&self, key: &TriggerKey) -> Result<(), SchedulingError> {
        let rule_name = key.rule_name();
        let statement_id = key.statement_id();

        tolerate_absent(
            self.api.remove_target(&rule_name).await,
            SchedulingStep::RemoveTarget,
            &rule_name,
        )?;
        tolerate_absent(
            self.api.remove_permission(&statement_id).await,
            SchedulingStep::RemovePermission,
            &rule_name,
        )?;
        tolerate_absent(
            self.api.delete_rule(&rule_name).await,
            SchedulingStep::DeleteRule,
            &rule_name,
        )?;

        info!(rule_name = %rule_name, "poll trigger removed");
        Ok(())
    }
}

fn tolerate_absent(
    result: Result<(), TriggerApiError>,
    step: SchedulingStep,
    rule_name: &str,
) -> Result<(), SchedulingError> {
    match result {
        Ok(()) => Ok(()),
        Err(TriggerApiError::NotFound(what)) => {
            debug!(step = %step, what = %what, "already absent");
            Ok(())
        }
        Err(source) => Err(SchedulingError::Step {
            step,
            rule_name: rule_name.to_string(),
            source,
        }),
    }
}
