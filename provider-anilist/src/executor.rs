//! # GraphQL Request Executor
//!
//! The single path every GraphQL call takes to the wire:
//!
//! 1. Acquire a [`RateLimiter`] permit
//! 2. POST `{query, variables}` with JSON headers, adding a bearer token only
//!    when one is supplied
//! 3. Record quota headers, whatever the status
//! 4. Classify failures: 429 becomes [`RateLimitError`], any other non-2xx
//!    goes through [`RemoteError::from_response`]
//!
//! No retries happen here. Recovery is the caller's decision.

use crate::error::{status_line, ProviderError, RateLimitError, RemoteError, Result};
use crate::rate_limit::{parse_quota_header, RateLimiter};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_runtime::events::{ApiEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_if_sensitive;
use core_runtime::EngineConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Serialize)]
struct GraphQlBody<'a> {
    query: &'a str,
    variables: &'a Value,
}

pub struct RequestExecutor {
    http: Arc<dyn HttpClient>,
    limiter: Arc<RateLimiter>,
    endpoint: String,
    user_agent: String,
    timeout: Duration,
    event_bus: Option<EventBus>,
}

impl RequestExecutor {
    pub fn new(
        http: Arc<dyn HttpClient>,
        limiter: Arc<RateLimiter>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            http,
            limiter,
            endpoint: config.endpoint.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout,
            event_bus: None,
        }
    }

    /// Publish quota updates and 429s on `event_bus`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run one GraphQL document and return the decoded response body
    ///
    /// The body is the full `{data, errors}` envelope; use [`Self::query`]
    /// to extract typed `data`.
    #[instrument(skip(self, query, variables, token), fields(endpoint = %self.endpoint, authenticated = token.is_some()))]
    pub async fn execute(
        &self,
        query: &str,
        variables: &Value,
        token: Option<&str>,
    ) -> Result<Value> {
        let (response, body) = self.send(query, variables, token).await?;
        if let Some(error) = RemoteError::from_graphql_body(&response, &body) {
            warn!(error = %error, "AniList reported GraphQL errors");
            return Err(error.into());
        }
        Ok(body)
    }

    /// Run a document and deserialize its `data` member
    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &Value,
        token: Option<&str>,
    ) -> Result<T> {
        let mut body = self.execute(query, variables, token).await?;

        let data = match body.get_mut("data").map(Value::take) {
            Some(Value::Null) | None => {
                return Err(ProviderError::InvalidResponse(
                    "Response carried no data".to_string(),
                ))
            }
            Some(data) => data,
        };

        serde_json::from_value(data).map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn send(
        &self,
        query: &str,
        variables: &Value,
        token: Option<&str>,
    ) -> Result<(bridge_traits::http::HttpResponse, Value)> {
        let mut request = HttpRequest::new(HttpMethod::Post, self.endpoint.as_str())
            .header("Accept", "application/json")
            .header("User-Agent", self.user_agent.as_str())
            .timeout(self.timeout)
            .json(&GraphQlBody { query, variables })?;
        if let Some(token) = token {
            request = request.bearer_token(token);
        }
        if let Some(authorization) = request.headers.get("Authorization") {
            debug!(
                authorization = %redact_if_sensitive("authorization", authorization),
                "Sending authenticated AniList request"
            );
        }

        let response = {
            let _permit = self.limiter.acquire().await?;
            self.http.execute(request).await?
        };

        self.record_quota(&response);

        if response.status == 429 {
            let error = self.rate_limit_error(&response);
            warn!(
                retry_after_seconds = error.retry_after_seconds,
                "AniList rate limit hit"
            );
            self.emit(ApiEvent::RateLimited {
                retry_after_seconds: error.retry_after_seconds,
            });
            return Err(error.into());
        }

        if !response.is_success() {
            let error = RemoteError::from_response(&response);
            warn!(status = response.status, error = %error, "AniList request failed");
            return Err(error.into());
        }

        debug!(status = response.status, bytes = response.body.len(), "AniList request succeeded");

        let body = serde_json::from_slice(&response.body)
            .map_err(|e| ProviderError::Parse(format!("Response body is not JSON: {}", e)))?;
        Ok((response, body))
    }

    fn record_quota(&self, response: &bridge_traits::http::HttpResponse) {
        let snapshot = self.limiter.record_quota(
            response.header("X-RateLimit-Limit"),
            response.header("X-RateLimit-Remaining"),
        );

        if let Some(snapshot) = snapshot {
            if let (Some(limit), Some(remaining)) = (snapshot.limit, snapshot.remaining) {
                self.emit(ApiEvent::QuotaUpdated { limit, remaining });
            }
        }
    }

    fn rate_limit_error(&self, response: &bridge_traits::http::HttpResponse) -> RateLimitError {
        let inner = RemoteError::from_response(response);
        let retry_after = parse_quota_header("Retry-After", response.header("Retry-After"));

        RateLimitError::new(
            format!("{}\n{}", status_line(response), inner.message()),
            retry_after,
            Some(inner.into()),
        )
    }

    fn emit(&self, event: ApiEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Api(event)).ok();
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("endpoint", &self.endpoint)
            .field("limiter", &self.limiter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AniListError, ErrorCause};
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use mockall::mock;
    use serde_json::json;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn executor(mock: MockHttpClient) -> RequestExecutor {
        RequestExecutor::new(
            Arc::new(mock),
            Arc::new(RateLimiter::new(Duration::ZERO, 2)),
            &EngineConfig::default(),
        )
    }

    fn json_response(status: u16, reason: &str, body: Value) -> HttpResponse {
        HttpResponse::new(status, serde_json::to_vec(&body).unwrap())
            .with_reason(reason)
            .with_header("Content-Type", "application/json")
    }

    #[tokio::test]
    async fn test_request_shape_and_token() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|request| {
                let body: Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
                request.method == HttpMethod::Post
                    && request.url == "https://graphql.anilist.co"
                    && request.headers.get("Authorization") == Some(&"Bearer tok".to_string())
                    && request.headers.get("Accept") == Some(&"application/json".to_string())
                    && request.headers.get("Content-Type") == Some(&"application/json".to_string())
                    && request.headers.get("User-Agent")
                        == Some(&"UpNext/github.com/dantman/up-next".to_string())
                    && body["variables"]["id"] == 7
            })
            .times(1)
            .returning(|_| Ok(json_response(200, "OK", json!({ "data": { "Viewer": { "id": 7 } } }))));

        let body = executor(mock)
            .execute("query ($id: Int) { Viewer { id } }", &json!({ "id": 7 }), Some("tok"))
            .await
            .unwrap();
        assert_eq!(body["data"]["Viewer"]["id"], 7);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_token_is_redacted_in_logs() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(200, "OK", json!({ "data": {} }))));

        executor(mock)
            .execute("{ Viewer { id } }", &json!({}), Some("sekrit-token"))
            .await
            .unwrap();

        let text = logs.text();
        assert!(text.contains("Sending authenticated AniList request"));
        assert!(text.contains("authorization=[REDACTED]"));
        assert!(!text.contains("sekrit-token"));
    }

    #[tokio::test]
    async fn test_anonymous_request_has_no_authorization() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|request| !request.headers.contains_key("Authorization"))
            .times(1)
            .returning(|_| Ok(json_response(200, "OK", json!({ "data": {} }))));

        executor(mock)
            .execute("{ SiteStatistics { users { count } } }", &json!({}), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_429_with_retry_after() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(json_response(
                429,
                "Too Many Requests",
                json!({ "data": null, "errors": [{ "message": "Too Many Requests.", "status": 429 }] }),
            )
            .with_header("Retry-After", "30")
            .with_header("X-RateLimit-Limit", "90")
            .with_header("X-RateLimit-Remaining", "0"))
        });

        let executor = executor(mock);
        let error = executor.execute("{}", &json!({}), None).await.unwrap_err();

        let ProviderError::Remote(RemoteError::RateLimit(rate_limit)) = &error else {
            panic!("expected rate limit error, got {:?}", error);
        };
        assert_eq!(rate_limit.retry_after_seconds, 30);
        assert!(rate_limit
            .message
            .starts_with("429 Too Many Requests\nAniList responded with multiple errors:"));
        assert!(matches!(
            rate_limit.cause,
            Some(ErrorCause::Remote(ref inner)) if matches!(**inner, RemoteError::Multi(_))
        ));
        assert!(error.is_retryable());

        // Quota is recorded even on failure.
        assert_eq!(executor.limiter().quota().remaining, Some(0));
    }

    #[tokio::test]
    async fn test_429_without_retry_after_defaults_to_60() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(429, "slow down").with_reason("Too Many Requests")));

        let error = executor(mock).execute("{}", &json!({}), None).await.unwrap_err();
        assert_eq!(error.retry_after(), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_malformed_retry_after_defaults_to_60() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(429, "").with_header("Retry-After", "soon"))
        });

        let error = executor(mock).execute("{}", &json!({}), None).await.unwrap_err();
        assert_eq!(error.retry_after(), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_server_error_is_classified_not_retried() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(json_response(
                500,
                "Internal Server Error",
                json!({ "error": { "status": 500, "messages": ["Internal Server Error"] } }),
            ))
        });

        let error = executor(mock).execute("{}", &json!({}), None).await.unwrap_err();
        assert!(matches!(
            error,
            ProviderError::Remote(RemoteError::AniList(AniListError { ref message, .. }))
                if message == "Internal Server Error"
        ));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn test_errors_on_success_status() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(json_response(
                200,
                "OK",
                json!({ "data": null, "errors": [{ "message": "Private User", "status": 404 }] }),
            ))
        });

        let error = executor(mock).execute("{}", &json!({}), None).await.unwrap_err();
        assert!(matches!(error, ProviderError::Remote(RemoteError::Multi(_))));
    }

    #[tokio::test]
    async fn test_transport_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout("30s elapsed".to_string())));

        let error = executor(mock).execute("{}", &json!({}), None).await.unwrap_err();
        assert!(matches!(error, ProviderError::Transport(_)));
    }

    #[tokio::test]
    async fn test_query_extracts_data() {
        #[derive(serde::Deserialize)]
        struct ViewerData {
            #[serde(rename = "Viewer")]
            viewer: Viewer,
        }
        #[derive(serde::Deserialize)]
        struct Viewer {
            id: i64,
        }

        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(2)
            .returning(|request| {
                let body: Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
                if body["variables"]["empty"] == true {
                    Ok(json_response(200, "OK", json!({ "data": null })))
                } else {
                    Ok(json_response(200, "OK", json!({ "data": { "Viewer": { "id": 3 } } })))
                }
            });

        let executor = executor(mock);
        let data: ViewerData = executor.query("{ Viewer { id } }", &json!({}), None).await.unwrap();
        assert_eq!(data.viewer.id, 3);

        let missing = executor
            .query::<ViewerData>("{ Viewer { id } }", &json!({ "empty": true }), None)
            .await;
        assert!(matches!(missing, Err(ProviderError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_quota_event_emitted() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(json_response(200, "OK", json!({ "data": {} }))
                .with_header("x-ratelimit-limit", "90")
                .with_header("x-ratelimit-remaining", "89"))
        });

        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let executor = executor(mock).with_event_bus(bus);

        executor.execute("{}", &json!({}), None).await.unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            CoreEvent::Api(ApiEvent::QuotaUpdated { limit: 90, remaining: 89 })
        );
    }
}
