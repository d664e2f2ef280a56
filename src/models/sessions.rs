use serde::{Deserialize, Serialize};

/// Canonical EOS configuration session states
pub mod session_state {
    pub const PENDING: &str = "pending";
}

/// ConfigSession is one row of `show configuration sessions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSession {
    pub name: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
    /// Marked with `*` by EOS: the session the querying terminal is in
    pub current: bool,
    pub details: String,
}

impl ConfigSession {
    pub fn is_pending(&self) -> bool {
        self.state.eq_ignore_ascii_case(session_state::PENDING)
    }
}

/// A session paired with the device it lives on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSession {
    pub hostname: String,
    pub session: ConfigSession,
}
