//! Rendering a snapshot into a board view.
//!
//! The view is a pure function of the snapshot, so anything that displays
//! tasks can be tested without a terminal.

use crate::id::TaskId;
use crate::snapshot::CollectionSnapshot;

/// One displayed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    /// Task id
    pub id: TaskId,

    /// Whether the task is done
    pub completed: bool,

    /// Title
    pub title: String,

    /// Description
    pub description: String,

    /// Comma-joined assignee emails, empty if none
    pub assignees: String,
}

/// Everything shown for a task collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    /// Rows in server order
    pub rows: Vec<TaskRow>,

    /// Total tasks
    pub total: usize,

    /// Completed tasks
    pub completed: usize,
}

/// Project a snapshot into its view.
pub fn render(snapshot: &CollectionSnapshot) -> BoardView {
    let rows = snapshot
        .tasks()
        .iter()
        .map(|task| TaskRow {
            id: task.id,
            completed: task.completed,
            title: task.title.clone(),
            description: task.description.clone(),
            assignees: task
                .assignees
                .iter()
                .map(|u| u.email.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    BoardView {
        rows,
        total: snapshot.len(),
        completed: snapshot.completed(),
    }
}

impl std::fmt::Display for BoardView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.rows.is_empty() {
            return writeln!(f, "No tasks yet.");
        }

        let id_width = self
            .rows
            .iter()
            .map(|r| r.id.to_string().len())
            .max()
            .unwrap_or(1);

        for row in &self.rows {
            let mark = if row.completed { "x" } else { " " };
            write!(f, "{:>width$} [{}] {}", row.id, mark, row.title, width = id_width)?;
            if !row.description.is_empty() {
                write!(f, " - {}", row.description)?;
            }
            if !row.assignees.is_empty() {
                write!(f, " ({})", row.assignees)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "{}/{} completed", self.completed, self.total)
    }
}
