//! Client for the tareas task API.
//!
//! Two collaborating components do the work:
//!
//! - [`SessionManager`] owns the bearer token lifecycle: login, persistence,
//!   decoding for display, and sign-out on any 401.
//! - [`TaskSyncClient`] issues authenticated task operations through the
//!   session manager.
//!
//! [`TaskBoard`] holds the last fetched collection and reloads it after
//! every mutation; [`Dispatcher`] maps named actions onto the board and turns
//! failures into user-facing notices.

#![warn(missing_docs)]

pub mod error;
pub mod config;
pub mod session;
pub mod tasks;
pub mod board;
pub mod dispatch;

pub use error::{ApiError, Result};
pub use config::ClientConfig;
pub use session::{Credentials, SessionEvent, SessionManager, SessionState, SignOutReason};
pub use tasks::{Confirmation, TaskService, TaskSyncClient, Versioned};
pub use board::TaskBoard;
pub use dispatch::{Action, ActionKind, Dispatcher, Notice, Outcome};
