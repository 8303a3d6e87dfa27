use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

pub mod model;

pub use model::{AnnotationRecord, Entry, JournalPage, StreamPage, TagMarkers};

/// Page size of the annotations journal. A shorter page ends a sync.
pub const JOURNAL_PAGE_SIZE: usize = 100;
/// Page size of the unread stream used by the exporter.
pub const STREAM_PAGE_SIZE: usize = 250;

#[derive(Clone)]
pub struct FeedlyClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for FeedlyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedlyClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// The endpoints the sync engine and the exporter depend on.
#[async_trait]
pub trait FeedlyService: Send + Sync {
    async fn annotations_journal(
        &self,
        newer_than: i64,
        continuation: Option<&str>,
    ) -> Result<JournalPage>;

    async fn stream_contents(
        &self,
        stream_id: &str,
        continuation: Option<&str>,
    ) -> Result<StreamPage>;

    async fn tag_markers(&self) -> Result<TagMarkers>;

    async fn entries(&self, ids: &[String]) -> Result<Vec<Entry>>;
}

impl FeedlyClient {
    pub fn new(token: String, base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("feedly-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut base = cfg.feedly.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|err| Error::Api {
            status: 0,
            message: format!("invalid base URL {base}: {err}"),
        })?;
        Self::new(cfg.feedly.access_token.clone(), base_url)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|err| Error::Api {
            status: 0,
            message: format!("invalid endpoint {path}: {err}"),
        })
    }

    pub fn build_request(
        &self,
        url: Url,
        method: Method,
        body: Option<&Value>,
    ) -> Result<reqwest::Request> {
        let mut builder = self
            .http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }

    /// Issue one request against `path` (relative to the base URL, query
    /// string allowed) and return the decoded JSON payload.
    pub async fn call(&self, path: &str, method: Method, body: Option<&Value>) -> Result<Value> {
        let url = self.endpoint(path)?;
        self.send(url, method, body).await
    }

    async fn send(&self, url: Url, method: Method, body: Option<&Value>) -> Result<Value> {
        let request = self.build_request(url, method, body)?;
        debug!(method = %request.method(), url = %request.url(), "sending feedly request");

        let res = self.http.execute(request).await?;
        let status = res.status();
        debug!(%status, "feedly response");

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body = res.text().await?;
        let payload: Value = serde_json::from_str(&body)?;
        check_embedded_error(payload)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        let value = self.send(url, Method::GET, None).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl FeedlyService for FeedlyClient {
    async fn annotations_journal(
        &self,
        newer_than: i64,
        continuation: Option<&str>,
    ) -> Result<JournalPage> {
        let mut query = vec![
            ("newerThan", newer_than.to_string()),
            ("withEntries", "true".to_string()),
            ("count", JOURNAL_PAGE_SIZE.to_string()),
        ];
        if let Some(token) = continuation {
            query.push(("continuation", token.to_string()));
        }
        self.get_json("annotations/journal", &query).await
    }

    async fn stream_contents(
        &self,
        stream_id: &str,
        continuation: Option<&str>,
    ) -> Result<StreamPage> {
        let mut query = vec![
            ("streamId", stream_id.to_string()),
            ("unreadOnly", "true".to_string()),
            ("count", STREAM_PAGE_SIZE.to_string()),
        ];
        if let Some(token) = continuation {
            query.push(("continuation", token.to_string()));
        }
        self.get_json("streams/contents", &query).await
    }

    async fn tag_markers(&self) -> Result<TagMarkers> {
        self.get_json("markers/tags", &[]).await
    }

    async fn entries(&self, ids: &[String]) -> Result<Vec<Entry>> {
        let body = serde_json::to_value(ids)?;
        let value = self.call("entries/.mget", Method::POST, Some(&body)).await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Map a non-success HTTP status onto the failure taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED => Error::AuthExpired,
        StatusCode::TOO_MANY_REQUESTS => {
            warn!("rate limited by Feedly: {}", body);
            Error::RateLimited
        }
        _ => Error::Api {
            status: status.as_u16(),
            message: error_message(body),
        },
    }
}

/// Feedly sometimes answers 200 with `{"errorCode": .., "errorMessage": ..}`.
pub fn check_embedded_error(payload: Value) -> Result<Value> {
    if payload.get("errorCode").is_none() {
        return Ok(payload);
    }
    let code = &payload["errorCode"];
    let code = code
        .as_u64()
        .or_else(|| code.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0);
    match code {
        401 => Err(Error::AuthExpired),
        429 => Err(Error::RateLimited),
        _ => Err(Error::Api {
            status: u16::try_from(code).unwrap_or(0),
            message: payload
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        }),
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("errorMessage").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> FeedlyClient {
        FeedlyClient::new("token".into(), Url::parse("https://cloud.feedly.com/v3/").unwrap())
            .unwrap()
    }

    #[test]
    fn build_request_sets_headers() {
        let client = client();
        let url = client.endpoint("entries/.mget").unwrap();
        let body = json!(["a", "b"]);
        let request = client.build_request(url, Method::POST, Some(&body)).unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().path(), "/v3/entries/.mget");
        let headers = request.headers();
        assert_eq!(
            headers.get("Authorization").and_then(|h| h.to_str().ok()).unwrap(),
            "Bearer token"
        );
        assert_eq!(
            headers.get("Accept").and_then(|h| h.to_str().ok()).unwrap(),
            "application/json"
        );
        assert_eq!(
            headers.get("Content-Type").and_then(|h| h.to_str().ok()).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn build_request_without_body_has_no_content_type() {
        let client = client();
        let url = client.endpoint("markers/tags").unwrap();
        let request = client.build_request(url, Method::GET, None).unwrap();
        assert!(request.headers().get("Content-Type").is_none());
        assert!(request.body().is_none());
    }

    #[test]
    fn statuses_are_classified() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            Error::AuthExpired
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            Error::RateLimited
        ));
        match classify_status(
            StatusCode::BAD_REQUEST,
            r#"{"errorCode":400,"errorMessage":"bad stream id"}"#,
        ) {
            Error::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad stream id");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn embedded_error_codes_are_detected() {
        assert!(check_embedded_error(json!({ "entries": [] })).is_ok());
        assert!(matches!(
            check_embedded_error(json!({ "errorCode": 401, "errorMessage": "token expired" })),
            Err(Error::AuthExpired)
        ));
        assert!(matches!(
            check_embedded_error(json!({ "errorCode": "429" })),
            Err(Error::RateLimited)
        ));
        match check_embedded_error(json!({ "errorCode": 500, "errorMessage": "boom" })) {
            Err(Error::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
