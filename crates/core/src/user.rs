//! Collaborator references.

use serde::{Deserialize, Deserializer, Serialize};

/// A user referenced by email, as used for task assignees.
///
/// The backend is the only authority on users; the client keeps nothing
/// beyond the email string and performs no validation on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct User {
    /// Email address identifying the user
    pub email: String,
}

impl User {
    /// Create a user reference.
    pub fn new(email: impl Into<String>) -> Self {
        Self { email: email.into() }
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.email)
    }
}

// Assignees arrive either as `{"email": ...}` objects (extra fields ignored)
// or as bare email strings.
impl<'de> Deserialize<'de> for User {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Email(String),
            Object { email: String },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Email(email) | Wire::Object { email } => User { email },
        })
    }
}
