//! REST client for the hosted document store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{RecordQuery, RemoteError, RemoteResult, RemoteStore};
use crate::models::{
    ContainerId, Deletion, GroupDraft, GroupId, Note, NoteDraft, NotePatch, RecordId,
    STAPLE_GROUP_ID,
};
use crate::util::{error_excerpt, is_http_url, normalize_text_option};

#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| crate::Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url,
            auth_token: normalize_text_option(auth_token),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        subject: &str,
    ) -> RemoteResult<reqwest::Response> {
        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body, subject))
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn create_record(&self, draft: &NoteDraft) -> RemoteResult<RecordId> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/v1/notes")
                    .json(&WireNoteDraft::from(draft)),
                "notes",
            )
            .await?;
        let created = response
            .json::<CreatedResponse>()
            .await
            .map_err(|error| RemoteError::Unknown(format!("invalid create response: {error}")))?;
        Ok(RecordId::Durable(created.id))
    }

    async fn update_record(&self, id: &RecordId, patch: &NotePatch) -> RemoteResult<()> {
        self.send(
            self.request(reqwest::Method::PATCH, &format!("/v1/notes/{}", id.as_str()))
                .json(&WirePatch::from(patch)),
            id.as_str(),
        )
        .await?;
        Ok(())
    }

    async fn query_records(&self, query: &RecordQuery) -> RemoteResult<Vec<Note>> {
        let mut params = vec![("containerId", query.container_id.as_str().to_string())];
        if let Some(group_id) = &query.group_id {
            params.push(("groupId", group_id.as_str().to_string()));
        }
        if let Some(owner_id) = &query.owner_id {
            params.push(("ownerId", owner_id.clone()));
        }

        let response = self
            .send(
                self.request(reqwest::Method::GET, "/v1/notes").query(&params),
                "notes",
            )
            .await?;
        let notes = response
            .json::<Vec<WireNote>>()
            .await
            .map_err(|error| RemoteError::Unknown(format!("invalid query response: {error}")))?;
        Ok(notes.into_iter().map(Note::from).collect())
    }

    async fn create_group(&self, draft: &GroupDraft) -> RemoteResult<GroupId> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/v1/groups")
                    .json(&WireGroupDraft::from(draft)),
                "groups",
            )
            .await?;
        let created = response
            .json::<CreatedResponse>()
            .await
            .map_err(|error| RemoteError::Unknown(format!("invalid create response: {error}")))?;
        Ok(GroupId::Durable(created.id))
    }
}

fn normalize_base_url(raw: String) -> crate::Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| crate::Error::Config("remote URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(crate::Error::Config(
            "remote URL must include http:// or https://".to_string(),
        ))
    }
}

fn classify_transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_connect() || error.is_timeout() {
        RemoteError::NetworkUnavailable(error.to_string())
    } else {
        RemoteError::Unknown(error.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str, subject: &str) -> RemoteError {
    let detail = if body.trim().is_empty() {
        format!("{subject} (HTTP {})", status.as_u16())
    } else {
        format!("{subject} (HTTP {}): {}", status.as_u16(), error_excerpt(body))
    };

    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => RemoteError::NotFound(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::PermissionDenied(detail),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            RemoteError::NetworkUnavailable(detail)
        }
        _ => RemoteError::Unknown(detail),
    }
}

fn parse_remote_group(id: String) -> GroupId {
    if id == STAPLE_GROUP_ID {
        GroupId::Staple
    } else {
        GroupId::Durable(id)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNote {
    id: String,
    container_id: String,
    group_id: String,
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    plain_text: String,
    created_at: i64,
    updated_at: i64,
    #[serde(default)]
    deleted_at: Option<i64>,
}

impl From<WireNote> for Note {
    fn from(wire: WireNote) -> Self {
        Self {
            id: RecordId::Durable(wire.id),
            container_id: ContainerId::new(wire.container_id),
            group_id: parse_remote_group(wire.group_id),
            owner_id: wire.owner_id,
            title: wire.title,
            content: wire.content,
            plain_text: wire.plain_text,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
            deleted_at: wire.deleted_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireNoteDraft<'a> {
    container_id: &'a str,
    group_id: &'a str,
    owner_id: Option<&'a str>,
    title: &'a str,
    content: &'a str,
    plain_text: &'a str,
    created_at: i64,
    updated_at: i64,
    deleted_at: Option<i64>,
}

impl<'a> From<&'a NoteDraft> for WireNoteDraft<'a> {
    fn from(draft: &'a NoteDraft) -> Self {
        Self {
            container_id: draft.container_id.as_str(),
            group_id: draft.group_id.as_str(),
            owner_id: draft.owner_id.as_deref(),
            title: &draft.title,
            content: &draft.content,
            plain_text: &draft.plain_text,
            created_at: draft.created_at,
            updated_at: draft.updated_at,
            deleted_at: draft.deleted_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plain_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<i64>,
    /// `Some(None)` clears the marker remotely
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_at: Option<Option<i64>>,
}

impl<'a> From<&'a NotePatch> for WirePatch<'a> {
    fn from(patch: &'a NotePatch) -> Self {
        Self {
            title: patch.title.as_deref(),
            content: patch.content.as_deref(),
            plain_text: patch.plain_text.as_deref(),
            group_id: patch.group_id.as_ref().map(GroupId::as_str),
            updated_at: patch.updated_at,
            deleted_at: patch.deletion.map(|deletion| match deletion {
                Deletion::Delete { at } => Some(at),
                Deletion::Restore => None,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGroupDraft<'a> {
    container_id: &'a str,
    name: &'a str,
    is_staple: bool,
    position: i64,
    created_at: i64,
}

impl<'a> From<&'a GroupDraft> for WireGroupDraft<'a> {
    fn from(draft: &'a GroupDraft) -> Self {
        Self {
            container_id: draft.container_id.as_str(),
            name: &draft.name,
            is_staple: draft.is_staple,
            position: draft.position,
            created_at: draft.created_at,
        }
    }
}
