use serde_json::{Map, Value};

use crate::carried_state::CarriedState;

/// Mutable state a handler works on during one call.
///
/// `data` starts as the carried state (empty on an initiating call), is read
/// back by the engine after the handler returns, and becomes either the next
/// poll's carried state or the `Data` of the terminal response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerContext {
    pub data: Map<String, Value>,
    pub no_echo: bool,
    physical_resource_id: Option<String>,
}

impl HandlerContext {
    pub fn new(data: Map<String, Value>, physical_resource_id: Option<String>) -> Self {
        Self {
            data,
            no_echo: false,
            physical_resource_id,
        }
    }

    pub fn from_carried_state(state: &CarriedState, fallback_id: Option<&str>) -> Self {
        let physical_resource_id = state
            .provisional_physical_id()
            .or(fallback_id)
            .map(str::to_string);
        Self::new(state.data().clone(), physical_resource_id)
    }

    /// The physical resource id known before this call: the request's own id
    /// or, during polling, the provisional id seeded by the initiating call.
    pub fn physical_resource_id(&self) -> Option<&str> {
        self.physical_resource_id.as_deref()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }
}
