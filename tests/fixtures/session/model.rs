//! Fixture record with one alias directive, compiled together with its generated module.

use std::time::Duration;

use aliasgen_derive::CustomJson;

#[path = "session_json.rs"]
mod session_json;

#[derive(Debug, Clone, PartialEq, CustomJson)]
pub struct Session {
    pub id: u64,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(skip)]
    #[customjson = "ttlSecs=$.as_secs();Duration::from_secs($)"]
    pub ttl: Duration,
}
