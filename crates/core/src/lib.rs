//! tareas core data models.
//!
//! This crate defines the wire model of the tareas task API and the pure
//! value types the client builds on top of it: sessions, collection
//! snapshots and the rendered board view.

#![warn(missing_docs)]

mod id;
mod task;
mod user;
mod session;
mod snapshot;
mod view;

pub use id::{TaskId, ParseTaskIdError};
pub use task::{Task, NewTask};
pub use user::User;
pub use session::{Session, Claims, TokenError};
pub use snapshot::CollectionSnapshot;
pub use view::{render, BoardView, TaskRow};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
