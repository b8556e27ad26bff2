use serde_json::{Map, Value};

/// Event key marking a poll re-invocation.
pub const POLL_MARKER_KEY: &str = "CrHelperPoll";
/// Event key holding the carried data bag.
pub const CARRIED_STATE_KEY: &str = "CrHelperData";
/// Engine-reserved key inside the carried data bag.
pub const PROVISIONAL_ID_KEY: &str = "CrHelperPhysicalResourceId";

/// Data bag threaded from the initiating invocation through every poll
/// re-invocation of the same operation.
///
/// The author-owned part is returned verbatim as the response `Data`; the
/// provisional physical resource id rides along under [`PROVISIONAL_ID_KEY`]
/// and never leaks into the response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarriedState {
    data: Map<String, Value>,
    provisional_physical_id: Option<String>,
}

impl CarriedState {
    pub fn new(data: Map<String, Value>, provisional_physical_id: Option<String>) -> Self {
        Self {
            data,
            provisional_physical_id,
        }
    }

    /// Restores state from the block stored under [`CARRIED_STATE_KEY`].
    pub fn from_block(mut block: Map<String, Value>) -> Self {
        let provisional_physical_id = match block.remove(PROVISIONAL_ID_KEY) {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            _ => None,
        };
        Self {
            data: block,
            provisional_physical_id,
        }
    }

    pub fn to_block(&self) -> Map<String, Value> {
        let mut block = self.data.clone();
        if let Some(id) = &self.provisional_physical_id {
            block.insert(PROVISIONAL_ID_KEY.to_string(), Value::String(id.clone()));
        }
        block
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }

    pub fn provisional_physical_id(&self) -> Option<&str> {
        self.provisional_physical_id.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.provisional_physical_id.is_none()
    }
}
