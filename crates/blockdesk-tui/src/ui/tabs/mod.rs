pub mod api_keys;
pub mod api_logs;
pub mod audit;
pub mod blocklist;
pub mod submit;
