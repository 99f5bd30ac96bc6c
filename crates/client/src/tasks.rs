//! Task sync client - authenticated task operations.

use std::sync::Arc;
use async_trait::async_trait;
use reqwest::header::{ETAG, IF_MATCH};
use serde::Deserialize;
use tareas_core::{NewTask, Task, TaskId};
use tracing::debug;
use crate::error::{check_status, read_json, ApiError, Result};
use crate::session::SessionManager;

/// Whether the user confirmed a destructive action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The user confirmed
    Confirmed,

    /// The user declined or was not asked
    Declined,
}

impl Confirmation {
    /// Fail with [`ApiError::NotConfirmed`] unless confirmed.
    pub fn require(self) -> Result<()> {
        match self {
            Confirmation::Confirmed => Ok(()),
            Confirmation::Declined => Err(ApiError::NotConfirmed),
        }
    }
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Declined
        }
    }
}

/// A value together with the server's version tag for it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// The value
    pub value: T,

    /// Entity tag from the response, usable for conditional writes
    pub version: Option<String>,
}

/// Task operations against the backend.
///
/// Updates always carry a complete task representation; callers fetch the
/// current task first and change only what they mean to change.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Fetch the full collection in server order.
    async fn list(&self) -> Result<Vec<Task>>;

    /// Fetch one task.
    async fn get(&self, id: TaskId) -> Result<Task>;

    /// Create a task. New tasks always start not completed.
    async fn create(&self, title: &str, description: &str) -> Result<Task>;

    /// Replace a task with the complete representation `task`.
    async fn update(&self, id: TaskId, task: &Task) -> Result<Task>;

    /// Fetch a task, flip `completed` and write it back.
    async fn toggle_completed(&self, id: TaskId) -> Result<Task>;

    /// Delete a task. Nothing is sent unless `confirmation` is `Confirmed`.
    async fn remove(&self, id: TaskId, confirmation: Confirmation) -> Result<()>;

    /// Add a collaborator by email.
    async fn assign(&self, id: TaskId, email: &str) -> Result<()>;

    /// Remove a collaborator by email.
    async fn unassign(&self, id: TaskId, email: &str) -> Result<()>;
}

/// HTTP implementation of [`TaskService`].
#[derive(Clone)]
pub struct TaskSyncClient {
    session: Arc<SessionManager>,
}

impl TaskSyncClient {
    /// Create a client that authenticates through `session`.
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// The session this client authenticates with.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn task_url(&self, id: TaskId) -> String {
        self.session.url(&format!("/tareas/{}", id))
    }

    /// Fetch one page of the collection.
    pub async fn list_page(&self, skip: u32, limit: u32) -> Result<Vec<Task>> {
        let url = self.session.url("/tareas");
        debug!("GET {} skip={} limit={}", url, skip, limit);

        let request = self
            .session
            .http()
            .get(&url)
            .query(&[("skip", skip), ("limit", limit)]);
        let response = self.session.send_authorized(request).await?;
        read_json(response).await
    }

    /// Fetch a task together with its entity tag.
    pub async fn get_versioned(&self, id: TaskId) -> Result<Versioned<Task>> {
        let url = self.task_url(id);
        debug!("GET {}", url);

        let response = self
            .session
            .send_authorized(self.session.http().get(&url))
            .await?;
        let version = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let value = read_json(response).await?;
        Ok(Versioned { value, version })
    }

    /// Replace a task only if it is still at `expected_version`.
    ///
    /// Without a known version this is a plain update.
    pub async fn compare_and_swap(
        &self,
        id: TaskId,
        expected_version: Option<&str>,
        task: &Task,
    ) -> Result<Task> {
        let url = self.task_url(id);
        debug!("PUT {} if-match={:?}", url, expected_version);

        let mut request = self.session.http().put(&url).json(task);
        if let Some(version) = expected_version {
            request = request.header(IF_MATCH, version);
        }

        match self.session.send_authorized(request).await {
            Ok(response) => read_json(response).await,
            Err(ApiError::Rejected { status: 412, .. }) => Err(ApiError::Conflict(id)),
            Err(e) => Err(e),
        }
    }

    /// Backend liveness probe. Needs no session.
    pub async fn health(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct Health {
            status: String,
        }

        let url = self.session.url("/health");
        debug!("GET {}", url);

        let response = self
            .session
            .http()
            .get(&url)
            .send()
            .await
            .map_err(ApiError::Transport)?;
        let health: Health = read_json(check_status(response).await?).await?;
        Ok(health.status)
    }

    async fn post_email(&self, id: TaskId, action: &str, email: &str) -> Result<()> {
        let url = format!("{}/{}", self.task_url(id), action);
        debug!("POST {}", url);

        let request = self
            .session
            .http()
            .post(&url)
            .json(&serde_json::json!({ "email": email }));
        self.session.send_authorized(request).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskService for TaskSyncClient {
    async fn list(&self) -> Result<Vec<Task>> {
        let url = self.session.url("/tareas");
        debug!("GET {}", url);

        let response = self
            .session
            .send_authorized(self.session.http().get(&url))
            .await?;
        read_json(response).await
    }

    async fn get(&self, id: TaskId) -> Result<Task> {
        self.get_versioned(id).await.map(|v| v.value)
    }

    async fn create(&self, title: &str, description: &str) -> Result<Task> {
        let url = self.session.url("/tareas");
        debug!("POST {}", url);

        let request = self
            .session
            .http()
            .post(&url)
            .json(&NewTask::new(title, description));
        let response = self.session.send_authorized(request).await?;
        read_json(response).await
    }

    async fn update(&self, id: TaskId, task: &Task) -> Result<Task> {
        self.compare_and_swap(id, None, task).await
    }

    async fn toggle_completed(&self, id: TaskId) -> Result<Task> {
        let current = self.get_versioned(id).await?;
        let toggled = current.value.toggled();
        self.compare_and_swap(id, current.version.as_deref(), &toggled)
            .await
    }

    async fn remove(&self, id: TaskId, confirmation: Confirmation) -> Result<()> {
        confirmation.require()?;

        let url = self.task_url(id);
        debug!("DELETE {}", url);

        self.session
            .send_authorized(self.session.http().delete(&url))
            .await?;
        Ok(())
    }

    async fn assign(&self, id: TaskId, email: &str) -> Result<()> {
        self.post_email(id, "assign", email).await
    }

    async fn unassign(&self, id: TaskId, email: &str) -> Result<()> {
        self.post_email(id, "unassign", email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use tareas_storage::MemoryTokenStore;
    use crate::config::ClientConfig;

    const TOKEN: &str = "abc.eyJzdWIiOiJhQGIuY29tIn0.def";
    const BEARER: &str = "Bearer abc.eyJzdWIiOiJhQGIuY29tIn0.def";

    async fn client(server: &mockito::ServerGuard) -> TaskSyncClient {
        let config = ClientConfig::default().with_base_url(server.url());
        let session = SessionManager::restore(&config, Arc::new(MemoryTokenStore::with_token(TOKEN)))
            .await
            .unwrap();
        TaskSyncClient::new(Arc::new(session))
    }

    fn milk(completed: bool) -> serde_json::Value {
        json!({"id": 1, "titulo": "Buy milk", "descripcion": "2%", "completada": completed, "assignees": []})
    }

    #[tokio::test]
    async fn test_list_preserves_server_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tareas")
            .match_header("authorization", BEARER)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {"id": 9, "titulo": "b", "descripcion": "", "completada": false},
                    {"id": 2, "titulo": "a", "descripcion": "", "completada": true}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let tasks = client(&server).await.list().await.unwrap();
        let ids: Vec<_> = tasks.iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![9, 2]);
    }

    #[tokio::test]
    async fn test_list_page_sends_paging() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tareas")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("skip".into(), "100".into()),
                Matcher::UrlEncoded("limit".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let tasks = client(&server).await.list_page(100, 50).await.unwrap();
        assert!(tasks.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/tareas")
            .match_header("authorization", BEARER)
            .match_body(Matcher::Json(
                json!({"titulo": "Buy milk", "descripcion": "2%", "completada": false}),
            ))
            .with_status(201)
            .with_body(milk(false).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/tareas")
            .with_status(200)
            .with_body(json!([milk(false)]).to_string())
            .create_async()
            .await;

        let client = client(&server).await;
        let created = client.create("Buy milk", "2%").await.unwrap();
        create.assert_async().await;
        assert_eq!(created.id, TaskId::new(1));

        let tasks = client.list().await.unwrap();
        let task = tasks.iter().find(|t| t.id == created.id).unwrap();
        assert!(!task.completed);
        assert_eq!(task.title, "Buy milk");
    }

    #[tokio::test]
    async fn test_toggle_sends_full_representation() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tareas/1")
            .with_status(200)
            .with_body(json!({"id": 1, "titulo": "Buy milk", "descripcion": "2%",
                              "completada": false, "assignees": [], "owner_id": 4}).to_string())
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/tareas/1")
            .match_header("authorization", BEARER)
            .match_header("if-match", Matcher::Missing)
            .match_body(Matcher::Json(json!({"id": 1, "titulo": "Buy milk", "descripcion": "2%",
                                             "completada": true, "assignees": [], "owner_id": 4})))
            .with_status(200)
            .with_body(milk(true).to_string())
            .create_async()
            .await;

        let task = client(&server).await.toggle_completed(TaskId::new(1)).await.unwrap();
        put.assert_async().await;
        assert!(task.completed);
    }

    #[tokio::test]
    async fn test_toggle_uses_entity_tag_when_offered() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tareas/1")
            .with_status(200)
            .with_header("etag", "\"v7\"")
            .with_body(milk(false).to_string())
            .create_async()
            .await;
        server
            .mock("PUT", "/tareas/1")
            .match_header("if-match", "\"v7\"")
            .with_status(412)
            .with_body(r#"{"detail":"Precondition Failed"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .await
            .toggle_completed(TaskId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(id) if id == TaskId::new(1)));
    }

    #[tokio::test]
    async fn test_get_missing_task_surfaces_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tareas/404")
            .with_status(404)
            .with_body(r#"{"detail":"Tarea no encontrada"}"#)
            .create_async()
            .await;

        let err = client(&server).await.get(TaskId::new(404)).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected { status: 404, .. }));
        assert_eq!(err.to_string(), "Tarea no encontrada");
    }

    #[tokio::test]
    async fn test_remove_requires_confirmation() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/tareas/1")
            .match_header("authorization", BEARER)
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let client = client(&server).await;
        let err = client
            .remove(TaskId::new(1), Confirmation::Declined)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotConfirmed));

        client.remove(TaskId::new(1), Confirmation::Confirmed).await.unwrap();
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_assign_and_unassign_post_email() {
        let mut server = mockito::Server::new_async().await;
        let assign = server
            .mock("POST", "/tareas/1/assign")
            .match_header("authorization", BEARER)
            .match_body(Matcher::Json(json!({"email": "c@d.com"})))
            .with_status(200)
            .with_body(r#"{"message":"ok"}"#)
            .create_async()
            .await;
        let unassign = server
            .mock("POST", "/tareas/1/unassign")
            .match_body(Matcher::Json(json!({"email": "c@d.com"})))
            .with_status(200)
            .create_async()
            .await;

        let client = client(&server).await;
        client.assign(TaskId::new(1), "c@d.com").await.unwrap();
        client.unassign(TaskId::new(1), "c@d.com").await.unwrap();
        assign.assert_async().await;
        unassign.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tareas")
            .with_status(200)
            .with_body("<html>proxy login</html>")
            .create_async()
            .await;

        let err = client(&server).await.list().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_health_needs_no_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let client = client(&server).await;
        client.session().logout().await.unwrap();
        assert_eq!(client.health().await.unwrap(), "ok");
    }

    #[test]
    fn test_confirmation_from_bool() {
        assert_eq!(Confirmation::from(true), Confirmation::Confirmed);
        assert!(Confirmation::from(false).require().is_err());
    }
}
