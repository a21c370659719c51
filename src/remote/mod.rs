//! Remote data layer seam.
//!
//! The board never talks HTTP itself. It goes through [`IssueStore`], which
//! offers exactly two calls: a full snapshot and a status change.
//! [`GraphqlStore`] is the production implementation.

pub mod graphql;

use crate::model::{Item, ItemId, Status};

pub use graphql::GraphqlStore;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The HTTP request could not be sent or its body not read.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The access token cannot be sent as a header.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    /// The server answered with a non-success HTTP status.
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The GraphQL response carried an `errors` array.
    #[error("graphql error: {0}")]
    GraphQl(String),
    /// A required field was absent from the response payload.
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    /// The id cannot be expressed in the remote API's id type.
    #[error("invalid issue id: {0}")]
    InvalidId(ItemId),
}

/// Result of a status-change call that reached the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    pub success: bool,
    /// Failure reason or informational note from the server.
    pub message: Option<String>,
    /// The issue as stored after the update, when the server returns it.
    pub issue: Option<Item>,
}

impl StatusUpdate {
    #[must_use]
    pub fn accepted(issue: Option<Item>) -> Self {
        Self { success: true, message: None, issue }
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()), issue: None }
    }
}

#[async_trait::async_trait]
pub trait IssueStore: Send + Sync + 'static {
    /// Fetch every issue in the server's order.
    async fn fetch_issues(&self) -> Result<Vec<Item>, RemoteError>;

    /// Ask the server to move issue `id` to `status`.
    async fn update_status(&self, id: &ItemId, status: Status) -> Result<StatusUpdate, RemoteError>;
}
