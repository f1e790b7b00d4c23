//! Firestore-compatible REST backend.
//!
//! Documents live at
//! `{base}/projects/{project}/databases/(default)/documents/{collection}/{id}`.
//! Reads are `GET`, writes are `PATCH` without an update mask (a full
//! overwrite). Field values use Firestore's typed encoding, e.g.
//! `{"stringValue": "..."}` or `{"integerValue": "42"}`. The REST surface has
//! no streaming listen, so watches poll `updateTime`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{Document, DocumentPath, DocumentStore, DocumentWatch, Polled, spawn_poller};
use crate::error::StoreError;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    bearer_token: Option<String>,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteDocument {
    #[serde(default)]
    fields: Map<String, Value>,
    update_time: Option<String>,
}

impl FirestoreStore {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: project_id.into(),
            bearer_token: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Authenticate requests with the session's ID token.
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn document_url(&self, path: &DocumentPath) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}/{}",
            self.base_url, self.project_id, path.collection, path.document
        )
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn fetch(&self, path: &DocumentPath) -> Result<Option<RemoteDocument>, StoreError> {
        let resp = self
            .authorize(self.client.get(self.document_url(path)))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp, path).await?;
        let remote = resp.json::<RemoteDocument>().await?;
        Ok(Some(remote))
    }

    fn decode_remote(path: &DocumentPath, remote: &RemoteDocument) -> Result<Document, StoreError> {
        decode_fields(&remote.fields).map_err(|message| StoreError::Malformed {
            path: path.to_string(),
            message,
        })
    }
}

async fn check_status(
    resp: reqwest::Response,
    path: &DocumentPath,
) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(StoreError::PermissionDenied {
            path: path.to_string(),
        });
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        match self.fetch(path).await? {
            Some(remote) => Self::decode_remote(path, &remote).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, path: &DocumentPath, document: Document) -> Result<(), StoreError> {
        let body = json!({ "fields": encode_fields(&document) });
        let resp = self
            .authorize(self.client.patch(self.document_url(path)))
            .json(&body)
            .send()
            .await?;
        check_status(resp, path).await?;
        Ok(())
    }

    async fn watch(&self, path: &DocumentPath) -> Result<DocumentWatch, StoreError> {
        let store = self.clone();
        let path = path.clone();
        Ok(spawn_poller(self.poll_interval, move || {
            let store = store.clone();
            let path = path.clone();
            async move {
                match store.fetch(&path).await? {
                    Some(remote) => Ok(Polled {
                        document: Some(Self::decode_remote(&path, &remote)?),
                        revision: remote.update_time.clone(),
                    }),
                    None => Ok(Polled {
                        document: None,
                        revision: None,
                    }),
                }
            }
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Typed value encoding
// ────────────────────────────────────────────────────────────────────────────

pub fn encode_fields(document: &Map<String, Value>) -> Map<String, Value> {
    document
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // 64-bit integers travel as decimal strings.
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Document, String> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|d| (k.clone(), d)).map_err(|e| format!("{}: {}", k, e)))
        .collect()
}

pub fn decode_value(value: &Value) -> Result<Value, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "typed value is not an object".to_string())?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| "typed value is empty".to_string())?;
    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| "booleanValue is not a bool".to_string()),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(Value::from)
                .ok_or_else(|| format!("invalid integerValue {}", inner))
        }
        "doubleValue" => inner
            .as_f64()
            .map(Value::from)
            .ok_or_else(|| format!("invalid doubleValue {}", inner)),
        "stringValue" | "timestampValue" | "referenceValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| format!("{} is not a string", kind)),
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(values)) => values.clone(),
                Some(_) => return Err("arrayValue.values is not an array".to_string()),
                None => Vec::new(),
            };
            values
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "mapValue" => match inner.get("fields") {
            Some(Value::Object(fields)) => decode_fields(fields).map(Value::Object),
            Some(_) => Err("mapValue.fields is not an object".to_string()),
            None => Ok(Value::Object(Map::new())),
        },
        other => Err(format!("unsupported value type {}", other)),
    }
}
