pub mod aws_trigger_api;
pub mod callback;
pub mod trigger_api;
