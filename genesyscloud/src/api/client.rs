use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::common::{ApiErrorDetails, ApiErrorResponse, ApiQueryParams};
use super::error::ApiError;
use super::pool::{HttpPool, Outcome, PoolSettings, RequestStats};

/// Genesys Cloud platform API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    retry_config: RetryConfig,
    pool: HttpPool,
}

/// Transport-level retries for throttling and server errors. Lifecycle
/// polling sits above this and is configured separately.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(base_url: &str, access_token: &str) -> Result<Self, ApiError> {
        Self::with_config(base_url, access_token, RetryConfig::default())
    }

    /// Create a new API client with custom retry configuration
    pub fn with_config(
        base_url: &str,
        access_token: &str,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let pool = HttpPool::new(PoolSettings {
            request_timeout: Duration::from_secs(retry_config.timeout_seconds),
            ..Default::default()
        });
        let http_client = pool.client()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                auth_header: format!("Bearer {}", access_token),
                retry_config,
                pool,
            }),
        })
    }

    /// Exchange OAuth client credentials for an access token at `login_url`.
    pub async fn authenticate(
        login_url: &str,
        client_id: &str,
        client_secret: &str,
        timeout: Duration,
    ) -> Result<String, ApiError> {
        let url = format!("{}/oauth/token", login_url.trim_end_matches('/'));
        tracing::debug!("Requesting access token from {}", url);

        let response = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()?
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::error!("Token request failed with HTTP {}: {}", status.as_u16(), text);
            return Err(ApiError::AuthError(format!(
                "token request returned HTTP {}",
                status.as_u16()
            )));
        }

        let token: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::ParseError(format!("Failed to parse token response: {}", e)))?;
        Ok(token.access_token)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(Method::GET, path, |request| request)
            .await?;
        self.parse_success_response(response).await
    }

    /// Execute a GET request with query parameters
    pub async fn get_with_params<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<T, ApiError> {
        let full_path = format!("{}{}", path, params.to_query_string());
        self.get(&full_path).await
    }

    /// Execute a POST request with retry logic
    pub async fn post<T: for<'de> Deserialize<'de>, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(Method::POST, path, |request| request.json(body))
            .await?;
        self.parse_success_response(response).await
    }

    /// POST whose response body is ignored; some endpoints answer with an
    /// empty body or one that does not match any documented model.
    pub async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        self.execute_with_retry(Method::POST, path, |request| request.json(body))
            .await?;
        Ok(())
    }

    pub async fn patch_no_content<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        self.execute_with_retry(Method::PATCH, path, |request| request.json(body))
            .await?;
        Ok(())
    }

    /// Execute a PUT request with retry logic
    pub async fn put<T: for<'de> Deserialize<'de>, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(Method::PUT, path, |request| request.json(body))
            .await?;
        self.parse_success_response(response).await
    }

    /// Execute a PATCH request with retry logic
    pub async fn patch<T: for<'de> Deserialize<'de>, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(Method::PATCH, path, |request| request.json(body))
            .await?;
        self.parse_success_response(response).await
    }

    /// Execute a DELETE request with retry logic. Response bodies are ignored.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute_with_retry(Method::DELETE, path, |request| request)
            .await?;
        Ok(())
    }

    pub async fn delete_with_params(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<(), ApiError> {
        let full_path = format!("{}{}", path, params.to_query_string());
        self.delete(&full_path).await
    }

    /// Request accounting for this client and its clones
    pub async fn request_stats(&self) -> RequestStats {
        self.inner.pool.stats().await
    }

    /// Authorization API operations
    pub fn authorization(&self) -> crate::api::authorization::AuthorizationApi<'_> {
        crate::api::authorization::AuthorizationApi::new(self)
    }

    /// Journey API operations
    pub fn journey(&self) -> crate::api::journey::JourneyApi<'_> {
        crate::api::journey::JourneyApi::new(self)
    }

    /// Routing API operations
    pub fn routing(&self) -> crate::api::routing::RoutingApi<'_> {
        crate::api::routing::RoutingApi::new(self)
    }

    /// Telephony API operations
    pub fn telephony(&self) -> crate::api::telephony::TelephonyApi<'_> {
        crate::api::telephony::TelephonyApi::new(self)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        tracing::debug!("{} request to: {}", method, url);
        self.inner
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, &self.inner.auth_header)
    }

    /// Execute request with retry logic. Throttled requests are retried for
    /// every method since the platform rejects them before processing.
    /// Server errors, timeouts and connection failures are retried only for
    /// idempotent methods; a POST or PATCH may already have been applied.
    async fn execute_with_retry<F>(
        &self,
        method: Method,
        path: &str,
        build: F,
    ) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    {
        let retry_config = &self.inner.retry_config;
        let idempotent = method.is_idempotent();
        let mut attempt = 0;
        let mut last_error = None;
        let mut retry_after: Option<Duration> = None;

        while attempt <= retry_config.max_retries {
            if attempt > 0 {
                let max_backoff = Duration::from_millis(retry_config.max_backoff_ms);
                let backoff = Duration::from_millis(
                    retry_config.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                )
                .max(retry_after.take().unwrap_or_default())
                .min(max_backoff);
                tracing::debug!(
                    "Retrying {} {} after {:?} (attempt {})",
                    method,
                    path,
                    backoff,
                    attempt
                );
                self.inner.pool.record_retry().await;
                tokio::time::sleep(backoff).await;
            }
            let last_attempt = attempt == retry_config.max_retries;

            match build(self.request(method.clone(), path)).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        self.inner.pool.record(Outcome::Success).await;
                        return Ok(response);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.inner.pool.record(Outcome::Throttled).await;
                        retry_after = retry_after_header(&response);
                        last_error = Some(ApiError::RateLimited);
                    } else {
                        self.inner.pool.record(Outcome::Failure).await;

                        if status == reqwest::StatusCode::UNAUTHORIZED {
                            return Err(ApiError::AuthError(format!(
                                "access token rejected for {}",
                                path
                            )));
                        }
                        if !status.is_server_error() || !idempotent || last_attempt {
                            return Err(self.handle_error_response(response).await);
                        }
                    }
                }
                Err(e) => {
                    self.inner.pool.record(Outcome::Failure).await;

                    let error = if e.is_timeout() {
                        ApiError::Timeout(retry_config.timeout_seconds)
                    } else if e.is_connect() {
                        ApiError::ServiceUnavailable
                    } else {
                        return Err(ApiError::RequestError(e));
                    };
                    if !idempotent {
                        tracing::warn!("{} {} failed and is not retried: {}", method, path, error);
                        return Err(error);
                    }
                    last_error = Some(error);
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response
    async fn parse_success_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        serde_json::from_str::<T>(&text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    /// Handle error response
    async fn handle_error_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let (message, details) = match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(body) => (
                body.message.unwrap_or_else(|| text.clone()),
                Some(Box::new(ApiErrorDetails {
                    code: body.code,
                    context_id: body.context_id,
                })),
            ),
            Err(_) => (text, None),
        };
        if status != 404 {
            tracing::error!("API error (HTTP {}): {}", status, message);
        }

        ApiError::ApiError {
            status,
            message,
            details,
        }
    }
}

/// Delay requested by a throttled response, in whole seconds.
fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn fast_retries() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            timeout_seconds: 5,
        }
    }

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    #[tokio::test]
    async fn client_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/routing/queues/q1")
            .match_header("authorization", "Bearer secret-token")
            .with_body(r#"{"id":"q1","name":"Support"}"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "secret-token").unwrap();
        let queue: Named = client.get("/api/v2/routing/queues/q1").await.unwrap();

        assert_eq!(queue.name, "Support");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_retries_server_errors() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/api/v2/journey/segments/s1")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let _ok = server
            .mock("GET", "/api/v2/journey/segments/s1")
            .with_body(r#"{"name":"VIP"}"#)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "t", fast_retries()).unwrap();
        let segment: Named = client.get("/api/v2/journey/segments/s1").await.unwrap();

        assert_eq!(segment.name, "VIP");
        failing.assert_async().await;
        assert_eq!(client.request_stats().await.retried, 1);
    }

    #[tokio::test]
    async fn throttled_requests_are_retried_and_counted() {
        let mut server = Server::new_async().await;
        let throttled = server
            .mock("GET", "/api/v2/routing/queues/q1")
            .with_status(429)
            .with_header("retry-after", "1")
            .expect(1)
            .create_async()
            .await;
        let _ok = server
            .mock("GET", "/api/v2/routing/queues/q1")
            .with_body(r#"{"name":"Support"}"#)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "t", fast_retries()).unwrap();
        let queue: Named = client.get("/api/v2/routing/queues/q1").await.unwrap();

        assert_eq!(queue.name, "Support");
        throttled.assert_async().await;
        let stats = client.request_stats().await;
        assert_eq!(stats.throttled, 1);
        assert_eq!(stats.sent, 2);
    }

    #[tokio::test]
    async fn client_gives_up_after_max_retries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/routing/queues")
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "t", fast_retries()).unwrap();
        let err = client
            .get::<serde_json::Value>("/api/v2/routing/queues")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::RateLimited));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_on_post_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/routing/queues")
            .with_status(500)
            .with_body(r#"{"message":"Internal failure","code":"internal.server.error"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "t", fast_retries()).unwrap();
        let err = client
            .post::<serde_json::Value, _>("/api/v2/routing/queues", &serde_json::json!({"name": "Support"}))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("Internal failure"));
        mock.assert_async().await;
        assert_eq!(client.request_stats().await.retried, 0);
    }

    #[tokio::test]
    async fn exhausted_server_errors_keep_status_and_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/journey/segments/s1")
            .with_status(502)
            .with_body(r#"{"message":"Upstream unavailable"}"#)
            .expect(3)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "t", fast_retries()).unwrap();
        let err = client
            .get::<serde_json::Value>("/api/v2/journey/segments/s1")
            .await
            .unwrap_err();

        match err {
            ApiError::ApiError { status, message, .. } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Upstream unavailable");
            }
            other => panic!("Unexpected error {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn throttled_posts_are_retried() {
        let mut server = Server::new_async().await;
        let throttled = server
            .mock("POST", "/api/v2/journey/segments")
            .with_status(429)
            .expect(1)
            .create_async()
            .await;
        let _created = server
            .mock("POST", "/api/v2/journey/segments")
            .with_status(201)
            .with_body(r#"{"name":"VIP"}"#)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "t", fast_retries()).unwrap();
        let segment: Named = client
            .post("/api/v2/journey/segments", &serde_json::json!({"displayName": "VIP"}))
            .await
            .unwrap();

        assert_eq!(segment.name, "VIP");
        throttled.assert_async().await;
    }

    #[tokio::test]
    async fn client_surfaces_error_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", "/api/v2/routing/queues/q1")
            .with_status(409)
            .with_body(r#"{"message":"Version mismatch","code":"conflict","contextId":"abc"}"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "t").unwrap();
        let err = client
            .put::<serde_json::Value, _>("/api/v2/routing/queues/q1", &serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            ApiError::ApiError {
                status,
                message,
                details,
            } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Version mismatch");
                assert_eq!(details.unwrap().context_id.as_deref(), Some("abc"));
            }
            other => panic!("Unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/routing/queues")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "expired", fast_retries()).unwrap();
        let err = client
            .get::<serde_json::Value>("/api/v2/routing/queues")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_credentials_grant_returns_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_header("authorization", "Basic aWQ6c2VjcmV0")
            .match_body("grant_type=client_credentials")
            .with_body(r#"{"access_token":"tok-123","token_type":"bearer","expires_in":86399}"#)
            .create_async()
            .await;

        let token = Client::authenticate(&server.url(), "id", "secret", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(token, "tok-123");
        mock.assert_async().await;
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            Client::new("not a url", "t"),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
