use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::request::Request;

const SUFFIX_LEN: usize = 12;
const MAX_PREFIX_CHARS: usize = 200;

/// Generates a fresh physical resource id: `<LogicalResourceId>-<suffix>`.
pub fn generate_physical_id(request: &Request) -> String {
    generate_physical_id_with(&mut rand::thread_rng(), &request.logical_resource_id)
}

pub fn generate_physical_id_with(rng: &mut impl Rng, logical_resource_id: &str) -> String {
    let prefix: String = logical_resource_id.chars().take(MAX_PREFIX_CHARS).collect();
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{prefix}-{suffix}")
}
