//! Outcome record of a connection attempt.

use serde::{Deserialize, Serialize};

/// Message reported when the configuration disables the connection.
pub const MSG_UNAVAILABLE: &str = "database unavailable";
/// Message reported after a fresh dial and ping succeeded.
pub const MSG_CONNECTED: &str = "Connected successfully";
/// Message reported when an existing handle was handed back.
pub const MSG_REUSED: &str = "Connection reused";

/// What a call to `connect` did.
///
/// `connected == false` always comes with `error` set, except for a disabled
/// configuration, which is a deliberate non-connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub connected: bool,
    /// True only when this call actually dialed.
    pub new_instance: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub database: String,
    pub pid: u32,
}

impl ConnectionState {
    /// A blank state for the given database.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub(crate) fn unavailable(mut self) -> Self {
        self.connected = false;
        self.new_instance = false;
        self.message = MSG_UNAVAILABLE.to_string();
        self
    }

    pub(crate) fn failed(mut self, error: impl ToString) -> Self {
        let text = error.to_string();
        self.connected = false;
        self.new_instance = false;
        self.message = text.clone();
        self.error = Some(text);
        self
    }

    pub(crate) fn established(mut self) -> Self {
        self.connected = true;
        self.new_instance = true;
        self.message = MSG_CONNECTED.to_string();
        self.pid = std::process::id();
        self
    }

    pub(crate) fn reused(mut self) -> Self {
        self.connected = true;
        self.new_instance = false;
        self.message = MSG_REUSED.to_string();
        self.pid = std::process::id();
        self
    }

    pub(crate) fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Render as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_failed_sets_error_and_message() {
        let state = ConnectionState::new("app").failed("connection refused");
        assert!(!state.connected);
        assert_eq!(state.message, "connection refused");
        assert_eq!(state.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_unavailable_has_no_error() {
        let state = ConnectionState::new("app").unavailable();
        assert!(!state.connected);
        assert_eq!(state.message, MSG_UNAVAILABLE);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_established_records_pid() {
        let state = ConnectionState::new("app").established();
        assert!(state.connected);
        assert!(state.new_instance);
        assert_eq!(state.pid, std::process::id());
    }

    #[test]
    fn test_json_field_names() {
        let state = ConnectionState::new("app").reused();
        let value: serde_json::Value = serde_json::from_str(&state.to_json()).unwrap();

        assert_eq!(value["connected"], true);
        assert_eq!(value["newInstance"], false);
        assert_eq!(value["database"], "app");
        assert!(value.get("error").is_none());
    }
}
