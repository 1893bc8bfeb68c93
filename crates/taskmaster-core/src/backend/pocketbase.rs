//! PocketBase backend
//!
//! Talks to a PocketBase-compatible server:
//!
//! - Records: `/api/collections/{collection}/records[/{id}]`
//! - Realtime: `GET /api/realtime` (Server-Sent Events), then
//!   `POST /api/realtime` with the client id and topic list
//! - Auth: `/api/collections/{users}/auth-with-password`
//!
//! Full-collection fetches page through the records endpoint until a short
//! page comes back.

use std::future::Future;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::{Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::sse::{SseDecoder, SseEvent};
use super::{ChangeAction, ChangeEvent, ChangeFeed, ListQuery, TaskBackend};
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::models::{Task, TaskDraft};

/// Records per page on full fetches
const PAGE_SIZE: usize = 500;

/// How long to wait for the realtime handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request timeout for REST calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An authenticated user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Result of a successful password login
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(rename = "record")]
    pub user: AuthUser,
}

impl AuthSession {
    /// Whether the session token is still valid at `now`
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        token_is_valid(&self.token, now)
    }
}

/// PocketBase-backed task collection
#[derive(Debug, Clone)]
pub struct PocketBaseBackend {
    client: Client,
    base_url: String,
    collection: String,
    auth_collection: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<Task>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectPayload {
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct RealtimeMessage {
    action: ChangeAction,
    record: RealtimeRecord,
}

#[derive(Debug, Deserialize)]
struct RealtimeRecord {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest<'a> {
    client_id: &'a str,
    subscriptions: Vec<String>,
}

impl PocketBaseBackend {
    /// Create a backend for `base_url` serving the given task collection
    pub fn new(base_url: &str, collection: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            auth_collection: "users".to_string(),
            token: None,
        }
    }

    /// Create a backend from application configuration
    pub fn from_config(config: &Config) -> Self {
        let mut backend = Self::new(&config.backend_url, &config.collection)
            .with_auth_collection(&config.auth_collection);
        if let Some(ref token) = config.auth_token {
            backend = backend.with_token(token);
        }
        backend
    }

    /// Use a different auth collection for login/sign-up
    pub fn with_auth_collection(mut self, collection: &str) -> Self {
        self.auth_collection = collection.to_string();
        self
    }

    /// Send the given auth token with every request
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Backend base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Realtime topic covering every record in the collection
    pub fn topic(&self) -> String {
        format!("{}/*", self.collection)
    }

    fn records_url(&self) -> String {
        format!(
            "{}/api/collections/{}/records",
            self.base_url, self.collection
        )
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.records_url(), id)
    }

    fn realtime_url(&self) -> String {
        format!("{}/api/realtime", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.header(reqwest::header::AUTHORIZATION, token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> SyncResult<Response> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| SyncError::network(url, e))
    }

    /// Log in with email (or username) and password
    pub async fn authenticate(&self, identity: &str, password: &str) -> SyncResult<AuthSession> {
        let url = format!(
            "{}/api/collections/{}/auth-with-password",
            self.base_url, self.auth_collection
        );
        let request = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({ "identity": identity, "password": password }));

        let response = check_response(self.send(request, &url).await?, None).await?;
        let session: AuthSession = response.json().await?;
        info!(user = %session.user.id, "authenticated");
        Ok(session)
    }

    /// Create a user account
    ///
    /// The display name defaults to the local part of the email address.
    pub async fn sign_up(&self, email: &str, password: &str) -> SyncResult<AuthUser> {
        let url = format!(
            "{}/api/collections/{}/records",
            self.base_url, self.auth_collection
        );
        let name = email.split('@').next().unwrap_or(email);
        let request = self.client.post(&url).timeout(REQUEST_TIMEOUT).json(&serde_json::json!({
            "email": email,
            "password": password,
            "passwordConfirm": password,
            "name": name,
        }));

        let response = check_response(self.send(request, &url).await?, None).await?;
        Ok(response.json().await?)
    }

    async fn fetch_page(&self, query: &ListQuery, page: usize) -> SyncResult<Vec<Task>> {
        let url = self.records_url();
        let request = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("page", page.to_string()),
                ("perPage", PAGE_SIZE.to_string()),
                ("sort", query.sort.clone()),
                ("expand", query.expand.clone()),
                ("skipTotal", "1".to_string()),
            ]);

        let response = check_response(self.send(request, &url).await?, None).await?;
        let page: ListPage = response.json().await?;
        Ok(page.items)
    }
}

impl TaskBackend for PocketBaseBackend {
    async fn list_tasks(&self, query: &ListQuery) -> SyncResult<Vec<Task>> {
        let (tasks, pages) = collect_pages(move |page| self.fetch_page(query, page)).await?;

        debug!(count = tasks.len(), pages, "fetched task collection");
        Ok(tasks)
    }

    async fn subscribe(&self) -> SyncResult<ChangeFeed> {
        let url = self.realtime_url();
        let request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let response = check_response(self.send(request, &url).await?, None).await?;

        let mut stream = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();

        let client_id = tokio::time::timeout(
            CONNECT_TIMEOUT,
            wait_for_connect(&mut stream, &mut decoder, &url),
        )
        .await
        .map_err(|_| SyncError::network(&url, "timed out waiting for realtime handshake"))??;
        debug!(%client_id, "realtime connected");

        let body = SubscribeRequest {
            client_id: &client_id,
            subscriptions: vec![self.topic()],
        };
        let request = self.client.post(&url).timeout(REQUEST_TIMEOUT).json(&body);
        check_response(self.send(request, &url).await?, None).await?;
        info!(topic = %self.topic(), "subscribed to task changes");

        let (tx, rx) = mpsc::unbounded_channel();
        let topic = self.topic();
        let pump = tokio::spawn(async move {
            pump_events(stream, decoder, topic, tx).await;
        });

        Ok(ChangeFeed::with_pump(rx, pump.abort_handle()))
    }

    async fn create_task(&self, draft: &TaskDraft) -> SyncResult<Task> {
        let url = self.records_url();
        let request = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[("expand", "tags")])
            .json(draft);

        let response = check_response(self.send(request, &url).await?, None).await?;
        Ok(response.json().await?)
    }

    async fn update_task(&self, id: &str, fields: &TaskDraft) -> SyncResult<Task> {
        let url = self.record_url(id);
        let request = self
            .client
            .patch(&url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[("expand", "tags")])
            .json(fields);

        let response = check_response(self.send(request, &url).await?, Some(id)).await?;
        Ok(response.json().await?)
    }

    async fn delete_task(&self, id: &str) -> SyncResult<()> {
        let url = self.record_url(id);
        let request = self.client.delete(&url).timeout(REQUEST_TIMEOUT);

        check_response(self.send(request, &url).await?, Some(id)).await?;
        Ok(())
    }

    async fn health(&self) -> SyncResult<()> {
        let url = format!("{}/api/health", self.base_url);
        let request = self.client.get(&url).timeout(Duration::from_secs(5));

        check_response(self.send(request, &url).await?, None).await?;
        Ok(())
    }
}

/// Fetch pages from 1 upwards until a short page comes back
///
/// Returns the collected items and the number of pages read.
async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> SyncResult<(Vec<T>, usize)>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = SyncResult<Vec<T>>>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let batch = fetch_page(page).await?;
        let last = is_last_page(batch.len());
        items.extend(batch);
        if last {
            return Ok((items, page));
        }
        page += 1;
    }
}

/// A page shorter than `PAGE_SIZE` (including an empty one) ends the listing
fn is_last_page(len: usize) -> bool {
    len < PAGE_SIZE
}

/// Read the stream until the server announces our realtime client id
async fn wait_for_connect<S, B>(
    stream: &mut S,
    decoder: &mut SseDecoder,
    url: &str,
) -> SyncResult<String>
where
    S: Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SyncError::network(url, e))?;
        for event in decoder.push(chunk.as_ref()) {
            if event.event == "PB_CONNECT" {
                let payload: ConnectPayload = serde_json::from_str(&event.data)?;
                return Ok(payload.client_id);
            }
        }
    }
    Err(SyncError::FeedClosed)
}

/// Forward realtime messages for `topic` into the feed until either side closes
async fn pump_events<S, B>(
    mut stream: S,
    mut decoder: SseDecoder,
    topic: String,
    tx: mpsc::UnboundedSender<ChangeEvent>,
) where
    S: Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Realtime stream error: {}", e);
                break;
            }
        };

        for event in decoder.push(chunk.as_ref()) {
            let Some(change) = parse_change(&event, &topic) else {
                continue;
            };
            if tx.send(change).is_err() {
                return;
            }
        }
    }
    debug!("realtime stream ended");
}

/// Turn a realtime message into a change event, if it is one for `topic`
fn parse_change(event: &SseEvent, topic: &str) -> Option<ChangeEvent> {
    if event.event != topic {
        return None;
    }
    match serde_json::from_str::<RealtimeMessage>(&event.data) {
        Ok(message) => Some(ChangeEvent {
            action: message.action,
            record_id: message.record.id,
        }),
        Err(e) => {
            warn!("Ignoring malformed realtime message: {}", e);
            None
        }
    }
}

/// Map a non-success response to a typed error
async fn check_response(response: Response, id: Option<&str>) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: ApiError = response.json().await.unwrap_or_default();
    Err(error_from_status(status.as_u16(), body, id))
}

fn error_from_status(status: u16, body: ApiError, id: Option<&str>) -> SyncError {
    let message = if body.message.is_empty() {
        format!("request failed with status {}", status)
    } else {
        body.message
    };

    match status {
        400 => SyncError::Validation {
            message,
            fields: field_errors(&body.data),
        },
        401 | 403 => SyncError::Unauthorized { message },
        404 => match id {
            Some(id) => SyncError::NotFound { id: id.to_string() },
            None => SyncError::Backend { status, message },
        },
        _ => SyncError::Backend { status, message },
    }
}

/// Extract `{field: {message}}` pairs from an error body's `data`
fn field_errors(data: &serde_json::Value) -> Vec<(String, String)> {
    let Some(map) = data.as_object() else {
        return Vec::new();
    };

    let mut fields: Vec<(String, String)> = map
        .iter()
        .map(|(field, detail)| {
            let message = detail
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("invalid value")
                .to_string();
            (field.clone(), message)
        })
        .collect();
    fields.sort();
    fields
}

/// Expiry time encoded in a JWT auth token
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}

/// Whether a JWT auth token has not yet expired
pub fn token_is_valid(token: &str, now: DateTime<Utc>) -> bool {
    token_expiry(token).is_some_and(|exp| exp > now)
}
