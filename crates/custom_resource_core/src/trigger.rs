use sha2::{Digest, Sha256};

const MAX_RULE_NAME_CHARS: usize = 64;
const DIGEST_HEX_CHARS: usize = 16;
const STATEMENT_SUFFIX: &str = "-invoke";

/// Identity of the poll trigger for one logical resource within a stack.
///
/// Names derive only from `StackId` + `LogicalResourceId`, so creating the
/// trigger is idempotent and a later poll invocation can tear it down
/// without any extra state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    pub stack_id: String,
    pub logical_resource_id: String,
}

impl TriggerKey {
    pub fn new(stack_id: impl Into<String>, logical_resource_id: impl Into<String>) -> Self {
        Self {
            stack_id: stack_id.into(),
            logical_resource_id: logical_resource_id.into(),
        }
    }

    /// `<sanitized logical id>-<16 hex digest>`, at most 64 characters.
    pub fn rule_name(&self) -> String {
        let prefix_budget = MAX_RULE_NAME_CHARS - DIGEST_HEX_CHARS - 1;
        let prefix: String = self
            .logical_resource_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .take(prefix_budget)
            .collect();
        let digest = self.digest();
        if prefix.is_empty() {
            format!("poll-{digest}")
        } else {
            format!("{prefix}-{digest}")
        }
    }

    pub fn statement_id(&self) -> String {
        format!("{}{STATEMENT_SUFFIX}", self.rule_name())
    }

    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.stack_id.as_bytes());
        hasher.update(b"/");
        hasher.update(self.logical_resource_id.as_bytes());
        let full = format!("{:x}", hasher.finalize());
        full[..DIGEST_HEX_CHARS].to_string()
    }
}

pub fn schedule_expression(interval_minutes: u32) -> String {
    if interval_minutes == 1 {
        "rate(1 minute)".to_string()
    } else {
        format!("rate({interval_minutes} minutes)")
    }
}
