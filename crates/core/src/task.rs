//! Task model - the unit of work kept by the tareas backend.

use serde::{Deserialize, Deserializer, Serialize};
use crate::id::TaskId;
use crate::user::User;

/// A task as the backend represents it.
///
/// The backend owns every task; the client only ever holds refetched copies.
/// Updates send the complete representation back, so fields this client does
/// not model are carried in `extra` and round-trip untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Task title
    #[serde(rename = "titulo")]
    pub title: String,

    /// Detailed description
    #[serde(rename = "descripcion", default)]
    pub description: String,

    /// Whether the task is done
    #[serde(rename = "completada", default)]
    pub completed: bool,

    /// Collaborators assigned to the task, without duplicates
    #[serde(default, deserialize_with = "distinct_users")]
    pub assignees: Vec<User>,

    /// Backend fields not modelled here (owner, timestamps, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    /// Full representation with `completed` flipped.
    pub fn toggled(&self) -> Self {
        Self {
            completed: !self.completed,
            ..self.clone()
        }
    }

    /// Full representation with the given fields replaced.
    pub fn with_changes(&self, title: Option<String>, description: Option<String>) -> Self {
        let mut task = self.clone();
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = description {
            task.description = description;
        }
        task
    }

    /// Whether `email` is among the assignees.
    pub fn is_assigned(&self, email: &str) -> bool {
        self.assignees.iter().any(|u| u.email == email)
    }
}

/// Creation payload for `POST /tareas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    /// Task title
    #[serde(rename = "titulo")]
    pub title: String,

    /// Detailed description
    #[serde(rename = "descripcion")]
    pub description: String,

    /// Always false for tasks created by this client
    #[serde(rename = "completada")]
    completed: bool,
}

impl NewTask {
    /// Build a creation payload. New tasks always start not completed.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            completed: false,
        }
    }
}

fn distinct_users<'de, D>(deserializer: D) -> Result<Vec<User>, D::Error>
where
    D: Deserializer<'de>,
{
    let users = Option::<Vec<User>>::deserialize(deserializer)?.unwrap_or_default();
    let mut distinct: Vec<User> = Vec::with_capacity(users.len());
    for user in users {
        if !distinct.contains(&user) {
            distinct.push(user);
        }
    }
    Ok(distinct)
}
