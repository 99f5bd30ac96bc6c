//! Command dispatch - named actions routed to the board.
//!
//! Front ends translate their own input (subcommands, key bindings, buttons)
//! into an [`Action`] and show whatever [`Outcome`] comes back. Failures are
//! turned into notices here, so no front end has to know the error taxonomy.

use std::sync::Arc;
use tareas_core::{BoardView, TaskId};
use tracing::debug;
use crate::board::TaskBoard;
use crate::error::ApiError;
use crate::session::SessionManager;
use crate::tasks::{Confirmation, TaskService};

/// Action names, keyed by the name front ends use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Show the collection
    List,
    /// Create a task
    Add,
    /// Change title/description
    Edit,
    /// Flip completed
    Toggle,
    /// Delete a task
    Delete,
    /// Add a collaborator
    Assign,
    /// Remove a collaborator
    Unassign,
    /// Show the logged-in identity
    WhoAmI,
    /// End the session
    Logout,
}

const ACTIONS: &[(&str, ActionKind)] = &[
    ("list", ActionKind::List),
    ("add", ActionKind::Add),
    ("edit", ActionKind::Edit),
    ("toggle", ActionKind::Toggle),
    ("delete", ActionKind::Delete),
    ("assign", ActionKind::Assign),
    ("unassign", ActionKind::Unassign),
    ("whoami", ActionKind::WhoAmI),
    ("logout", ActionKind::Logout),
];

impl ActionKind {
    /// The action's name.
    pub fn name(self) -> &'static str {
        ACTIONS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// All action names.
    pub fn names() -> impl Iterator<Item = &'static str> {
        ACTIONS.iter().map(|(name, _)| *name)
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ACTIONS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| format!("unknown action: {}", s))
    }
}

/// An action with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Show the collection
    List,
    /// Create a task
    Add {
        /// Title
        title: String,
        /// Description
        description: String,
    },
    /// Change title and/or description
    Edit {
        /// Task
        id: TaskId,
        /// New title
        title: Option<String>,
        /// New description
        description: Option<String>,
    },
    /// Flip completed
    Toggle {
        /// Task
        id: TaskId,
    },
    /// Delete a task
    Delete {
        /// Task
        id: TaskId,
        /// Whether the user confirmed
        confirmation: Confirmation,
    },
    /// Add a collaborator
    Assign {
        /// Task
        id: TaskId,
        /// Collaborator email
        email: String,
    },
    /// Remove a collaborator
    Unassign {
        /// Task
        id: TaskId,
        /// Collaborator email
        email: String,
    },
    /// Show the logged-in identity
    WhoAmI,
    /// End the session
    Logout,
}

impl Action {
    /// Which kind of action this is.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::List => ActionKind::List,
            Action::Add { .. } => ActionKind::Add,
            Action::Edit { .. } => ActionKind::Edit,
            Action::Toggle { .. } => ActionKind::Toggle,
            Action::Delete { .. } => ActionKind::Delete,
            Action::Assign { .. } => ActionKind::Assign,
            Action::Unassign { .. } => ActionKind::Unassign,
            Action::WhoAmI => ActionKind::WhoAmI,
            Action::Logout => ActionKind::Logout,
        }
    }
}

/// Message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Something succeeded
    Info(String),
    /// The session ended because the server rejected it
    SessionExpired,
    /// There is no session
    NotLoggedIn,
    /// The server could not be reached
    Connectivity,
    /// The server or client refused the action, with the reason
    Rejected(String),
    /// The server failed
    Failure,
}

impl Notice {
    /// Whether this notice reports a failure.
    pub fn is_error(&self) -> bool {
        !matches!(self, Notice::Info(_))
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Info(message) => f.write_str(message),
            Notice::SessionExpired => f.write_str("Your session has expired, please log in again."),
            Notice::NotLoggedIn => f.write_str("You are not logged in."),
            Notice::Connectivity => f.write_str("Could not connect to the task server."),
            Notice::Rejected(detail) => f.write_str(detail),
            Notice::Failure => f.write_str("Something went wrong on the task server, please try again."),
        }
    }
}

impl From<&ApiError> for Notice {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Transport(_) => Notice::Connectivity,
            ApiError::Unauthorized => Notice::SessionExpired,
            ApiError::NotAuthenticated => Notice::NotLoggedIn,
            ApiError::Rejected { detail, .. } => Notice::Rejected(detail.clone()),
            ApiError::Server { .. } | ApiError::Decode(_) => Notice::Failure,
            ApiError::Conflict(_)
            | ApiError::Busy(_)
            | ApiError::NotConfirmed
            | ApiError::Storage(_)
            | ApiError::Config(_) => Notice::Rejected(err.to_string()),
        }
    }
}

/// What a front end shows after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The collection to show; `None` when logged out or never loaded
    pub view: Option<BoardView>,

    /// Message to show, if any
    pub notice: Option<Notice>,
}

/// Routes actions to the board and session.
pub struct Dispatcher<S: TaskService> {
    board: TaskBoard<S>,
    session: Arc<SessionManager>,
}

impl<S: TaskService> Dispatcher<S> {
    /// Create a dispatcher.
    pub fn new(board: TaskBoard<S>, session: Arc<SessionManager>) -> Self {
        Self { board, session }
    }

    /// The board actions are applied to.
    pub fn board(&self) -> &TaskBoard<S> {
        &self.board
    }

    /// Run `action`. Never fails; failures come back as notices.
    pub async fn dispatch(&self, action: Action) -> Outcome {
        let kind = action.kind();
        debug!("Dispatching {}", kind.name());

        let result = match action {
            Action::List => self.board.refresh().await.map(|_| None),
            Action::Add { title, description } => self
                .board
                .create(&title, &description)
                .await
                .map(|_| Some(format!("Created \"{}\".", title))),
            Action::Edit { id, title, description } => self
                .board
                .edit(id, title, description)
                .await
                .map(|_| Some(format!("Updated task {}.", id))),
            Action::Toggle { id } => self.board.toggle(id).await.map(|snapshot| {
                snapshot.get(id).map(|task| {
                    if task.completed {
                        format!("Completed task {}.", id)
                    } else {
                        format!("Reopened task {}.", id)
                    }
                })
            }),
            Action::Delete { id, confirmation } => self
                .board
                .remove(id, confirmation)
                .await
                .map(|_| Some(format!("Deleted task {}.", id))),
            Action::Assign { id, email } => self
                .board
                .assign(id, &email)
                .await
                .map(|_| Some(format!("Assigned {} to task {}.", email, id))),
            Action::Unassign { id, email } => self
                .board
                .unassign(id, &email)
                .await
                .map(|_| Some(format!("Unassigned {} from task {}.", email, id))),
            Action::WhoAmI => {
                return match self.session.display_identity().await {
                    Some(subject) => self.outcome(Some(Notice::Info(format!("Logged in as {}.", subject)))),
                    None => {
                        self.board.clear();
                        self.outcome(Some(Notice::NotLoggedIn))
                    }
                };
            }
            Action::Logout => {
                self.board.clear();
                self.session.logout().await.map(|_| Some("Logged out.".to_string()))
            }
        };

        match result {
            Ok(message) => self.outcome(message.map(Notice::Info)),
            Err(e) => {
                debug!("{} failed: {}", kind.name(), e);
                self.outcome(Some(Notice::from(&e)))
            }
        }
    }

    fn outcome(&self, notice: Option<Notice>) -> Outcome {
        Outcome {
            view: self.board.view(),
            notice,
        }
    }
}
