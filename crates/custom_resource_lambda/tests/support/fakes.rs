#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use custom_resource_lambda::adapters::callback::{CallbackTransport, TransportError};
use custom_resource_lambda::adapters::trigger_api::{TriggerApi, TriggerApiError};
use serde_json::Value;

/// Captures every response body PUT to the callback URL.
#[derive(Default)]
pub struct RecordingTransport {
    bodies: Mutex<Vec<Value>>,
    urls: Mutex<Vec<String>>,
    failure: Option<TransportError>,
    latency: Duration,
}

impl RecordingTransport {
    pub fn failing(failure: TransportError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn responses(&self) -> Vec<Value> {
        self.bodies.lock().expect("poisoned mutex").clone()
    }

    pub fn only_response(&self) -> Value {
        let responses = self.responses();
        assert_eq!(
            responses.len(),
            1,
            "expected exactly one response: {responses:?}"
        );
        responses.into_iter().next().expect("one response")
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().expect("poisoned mutex").clone()
    }
}

#[async_trait]
impl CallbackTransport for RecordingTransport {
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.urls
            .lock()
            .expect("poisoned mutex")
            .push(url.to_string());
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let body: Value = serde_json::from_slice(&body).expect("response body should be json");
        self.bodies.lock().expect("poisoned mutex").push(body);
        Ok(())
    }
}

#[derive(Default)]
struct TriggerState {
    rules: BTreeMap<String, String>,
    permissions: BTreeSet<String>,
    targets: BTreeMap<String, String>,
}

/// In-memory EventBridge rule / Lambda permission pair that answers the way
/// the real APIs do for repeated or missing resources.
#[derive(Default)]
pub struct FakeTriggerApi {
    state: Mutex<TriggerState>,
    calls: Mutex<Vec<String>>,
    failing_call: Option<&'static str>,
    latency: Duration,
}

impl FakeTriggerApi {
    pub fn failing_on(call: &'static str) -> Self {
        Self {
            failing_call: Some(call),
            ..Self::default()
        }
    }

    /// Every call takes `latency` before it reaches the fake service.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    async fn record(&self, call: &'static str) -> Result<(), TriggerApiError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.calls
            .lock()
            .expect("poisoned mutex")
            .push(call.to_string());
        if self.failing_call == Some(call) {
            return Err(TriggerApiError::Other(format!("{call} is not allowed")));
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("poisoned mutex").clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls()
            .iter()
            .filter(|recorded| *recorded == call)
            .count()
    }

    /// Event the rule would deliver on its next firing.
    pub fn target_input(&self, rule_name: &str) -> Option<Value> {
        let state = self.state.lock().expect("poisoned mutex");
        state
            .targets
            .get(rule_name)
            .map(|input| serde_json::from_str(input).expect("target input should be json"))
    }

    pub fn has_leftovers(&self) -> bool {
        let state = self.state.lock().expect("poisoned mutex");
        !state.rules.is_empty() || !state.permissions.is_empty() || !state.targets.is_empty()
    }
}

#[async_trait]
impl TriggerApi for FakeTriggerApi {
    async fn put_rule(
        &self,
        rule_name: &str,
        schedule_expression: &str,
    ) -> Result<String, TriggerApiError> {
        self.record("put_rule").await?;
        self.state
            .lock()
            .expect("poisoned mutex")
            .rules
            .insert(rule_name.to_string(), schedule_expression.to_string());
        Ok(format!("arn:aws:events:eu-west-1:123456789012:rule/{rule_name}"))
    }

    async fn add_permission(
        &self,
        statement_id: &str,
        _rule_arn: &str,
    ) -> Result<(), TriggerApiError> {
        self.record("add_permission").await?;
        let mut state = self.state.lock().expect("poisoned mutex");
        if !state.permissions.insert(statement_id.to_string()) {
            return Err(TriggerApiError::Conflict(statement_id.to_string()));
        }
        Ok(())
    }

    async fn put_target(&self, rule_name: &str, input: &str) -> Result<(), TriggerApiError> {
        self.record("put_target").await?;
        let mut state = self.state.lock().expect("poisoned mutex");
        if !state.rules.contains_key(rule_name) {
            return Err(TriggerApiError::NotFound(rule_name.to_string()));
        }
        state
            .targets
            .insert(rule_name.to_string(), input.to_string());
        Ok(())
    }

    async fn remove_target(&self, rule_name: &str) -> Result<(), TriggerApiError> {
        self.record("remove_target").await?;
        let mut state = self.state.lock().expect("poisoned mutex");
        if !state.rules.contains_key(rule_name) {
            return Err(TriggerApiError::NotFound(rule_name.to_string()));
        }
        state.targets.remove(rule_name);
        Ok(())
    }

    async fn remove_permission(&self, statement_id: &str) -> Result<(), TriggerApiError> {
        self.record("remove_permission").await?;
        let mut state = self.state.lock().expect("poisoned mutex");
        if !state.permissions.remove(statement_id) {
            return Err(TriggerApiError::NotFound(statement_id.to_string()));
        }
        Ok(())
    }

    async fn delete_rule(&self, rule_name: &str) -> Result<(), TriggerApiError> {
        self.record("delete_rule").await?;
        let mut state = self.state.lock().expect("poisoned mutex");
        if state.targets.contains_key(rule_name) {
            return Err(TriggerApiError::Other(format!(
                "rule {rule_name} can't be deleted since it has targets"
            )));
        }
        if state.rules.remove(rule_name).is_none() {
            return Err(TriggerApiError::NotFound(rule_name.to_string()));
        }
        Ok(())
    }
}
