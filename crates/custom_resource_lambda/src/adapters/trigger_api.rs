use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerApiError {
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0}")]
    Other(String),
}

/// Platform calls behind the poll trigger: a scheduled rule, this function
/// as its only target, and the permission letting the rule invoke it.
#[async_trait]
pub trait TriggerApi: Send + Sync {
    /// Creates or updates the rule and returns its ARN.
    async fn put_rule(
        &self,
        rule_name: &str,
        schedule_expression: &str,
    ) -> Result<String, TriggerApiError>;

    async fn add_permission(&self, statement_id: &str, rule_arn: &str)
        -> Result<(), TriggerApiError>;

    async fn put_target(&self, rule_name: &str, input: &str) -> Result<(), TriggerApiError>;

    async fn remove_target(&self, rule_name: &str) -> Result<(), TriggerApiError>;

    async fn remove_permission(&self, statement_id: &str) -> Result<(), TriggerApiError>;

    async fn delete_rule(&self, rule_name: &str) -> Result<(), TriggerApiError>;
}
