//! GraphQL-over-HTTP implementation of [`IssueStore`].
//!
//! Only the two operations the board needs are issued: the `issues` listing
//! and the `updateIssue` mutation restricted to `status`. Response handling
//! is split into pure functions so it can be tested without a server.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use super::{IssueStore, RemoteError, StatusUpdate};
use crate::model::{Item, ItemId, Status};

const ISSUES_QUERY: &str = "query GetIssues { issues { id title description enhancedDescription \
status priority assigneeId reporterId createdAt updatedAt tags { id name color } } }";

const UPDATE_STATUS_MUTATION: &str = "mutation UpdateIssue($input: IssueUpdateInput!) { \
updateIssue(input: $input) { success message issue { id title description enhancedDescription \
status priority assigneeId reporterId createdAt updatedAt } } }";

#[derive(Clone, Debug)]
pub struct GraphqlStore {
    client: reqwest::Client,
    endpoint: String,
}

impl GraphqlStore {
    /// Build a store posting to `endpoint`, optionally sending a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(endpoint: impl Into<String>, access_token: Option<&str>) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = access_token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        let client = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    async fn execute(&self, query: &str, variables: Value) -> Result<Value, RemoteError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(RemoteError::Status { status: status.as_u16(), body: body.to_string() });
        }
        graphql_data(body)
    }
}

#[async_trait::async_trait]
impl IssueStore for GraphqlStore {
    async fn fetch_issues(&self) -> Result<Vec<Item>, RemoteError> {
        let data = self.execute(ISSUES_QUERY, json!({})).await?;
        parse_issues(&data)
    }

    async fn update_status(&self, id: &ItemId, status: Status) -> Result<StatusUpdate, RemoteError> {
        let variables = update_status_variables(id, status)?;
        let data = self.execute(UPDATE_STATUS_MUTATION, variables).await?;
        parse_status_update(&data)
    }
}

/// Unwrap a GraphQL envelope, turning an `errors` array into an error.
fn graphql_data(body: Value) -> Result<Value, RemoteError> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array).filter(|e| !e.is_empty()) {
        let message = errors
            .iter()
            .filter_map(|e| e.get("message").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(RemoteError::GraphQl(if message.is_empty() {
            "unknown error".to_owned()
        } else {
            message
        }));
    }
    match body {
        Value::Object(mut map) => map
            .remove("data")
            .filter(|d| !d.is_null())
            .ok_or(RemoteError::MissingField("data")),
        _ => Err(RemoteError::MissingField("data")),
    }
}

/// Decode the `issues` listing. Entries that do not decode (for instance a
/// status outside the board's three columns) are skipped with a warning.
fn parse_issues(data: &Value) -> Result<Vec<Item>, RemoteError> {
    let list = data
        .get("issues")
        .and_then(Value::as_array)
        .ok_or(RemoteError::MissingField("issues"))?;

    Ok(list
        .iter()
        .filter_map(|raw| match serde_json::from_value::<Item>(raw.clone()) {
            Ok(item) => Some(item),
            Err(e) => {
                let id = raw.get("id").unwrap_or(&Value::Null);
                tracing::warn!(id = %id, error = %e, "skipping undecodable issue");
                None
            }
        })
        .collect())
}

fn update_status_variables(id: &ItemId, status: Status) -> Result<Value, RemoteError> {
    let numeric: i64 = id.as_str().parse().map_err(|_| RemoteError::InvalidId(id.clone()))?;
    Ok(json!({ "input": { "id": numeric, "status": status.as_str() } }))
}

fn parse_status_update(data: &Value) -> Result<StatusUpdate, RemoteError> {
    let payload = data.get("updateIssue").ok_or(RemoteError::MissingField("updateIssue"))?;
    let success = payload
        .get("success")
        .and_then(Value::as_bool)
        .ok_or(RemoteError::MissingField("success"))?;
    let message = payload.get("message").and_then(Value::as_str).map(ToOwned::to_owned);
    // A bad echoed issue does not undo `success`.
    let issue = payload.get("issue").filter(|v| !v.is_null()).and_then(|v| {
        serde_json::from_value::<Item>(v.clone())
            .map_err(|e| tracing::warn!(error = %e, "ignoring undecodable issue in update response"))
            .ok()
    });
    Ok(StatusUpdate { success, message, issue })
}

#[cfg(test)]
#[path = "graphql_test.rs"]
mod tests;
