//! Per-request caller identity.

use std::fmt;

/// Who a request acts as. Resolved once per request by the identity middleware
/// and read by handlers through request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    /// No valid session; only public content is visible
    #[default]
    Anonymous,
    /// A signed-in user
    User(String),
}

impl Identity {
    pub fn user(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Anonymous => f.write_str("public"),
            Identity::User(user) => f.write_str(user),
        }
    }
}
