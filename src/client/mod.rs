//! Client side of the task list: HTTP transport, the in-memory list and the
//! optimistic synchronization that ties them together.

pub mod api;
pub mod session;
pub mod state;
pub mod sync;

pub use api::{ApiClient, TaskApi};
pub use session::SessionFile;
pub use state::{Snapshot, SyncStatus, TaskListState};
pub use sync::TaskListSync;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Server answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("not logged in; run `tasklist login` first")]
    NotLoggedIn,

    #[error("task {0} is not in the current list")]
    UnknownTask(i64),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
