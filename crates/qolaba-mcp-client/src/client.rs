//! Request executor.
//!
//! One [`ApiClient`] owns a connection pool and one credential. A logical
//! call walks attempts through: attach auth headers, send, classify the
//! outcome, then retry, refresh-and-retry once on 401, fail with a typed
//! error, or return the response envelope.

use crate::auth::{self, Credential, TokenSlot};
use crate::backoff::BackoffPolicy;
use crate::classify::{
    classify_status, classify_transport, status_error_type, transport_error_type, Action,
    RetryClass,
};
use crate::config::ClientConfig;
use crate::error::{ApiClientError, ClientResult};
use crate::response::{build_response, ApiResponse};
use crate::telemetry::{AttemptRecord, NoopSink, SharedSink};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use reqwest::Method;

/// Ceiling on concurrent in-flight requests per client.
const MAX_CONNECTIONS: usize = 20;

/// Ceiling on idle keep-alive connections per host.
const MAX_KEEPALIVE_CONNECTIONS: usize = 10;

/// Idle connections are dropped after this long.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent for all requests.
const USER_AGENT: &str = concat!("qolaba-mcp/", env!("CARGO_PKG_VERSION"));

/// Request body for a call.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    None,
    /// JSON-encoded body (`Content-Type: application/json`).
    Json(serde_json::Value),
    /// Form-encoded body (`Content-Type: application/x-www-form-urlencoded`).
    Form(Vec<(String, String)>),
}

impl RequestBody {
    fn size(&self) -> usize {
        match self {
            RequestBody::None => 0,
            RequestBody::Json(value) => value.to_string().len(),
            RequestBody::Form(fields) => fields.iter().map(|(k, v)| k.len() + v.len() + 2).sum(),
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Extra request headers. Caller-supplied values win over defaults.
    pub headers: HashMap<String, String>,
    /// Query string parameters.
    pub query: Vec<(String, String)>,
    /// Tracing id, injected as `X-Request-ID` unless the caller already set
    /// that header explicitly.
    pub request_id: Option<String>,
    /// Cancellation token; aborts in-flight sends and retry sleeps.
    pub cancel: Option<CancellationToken>,
}

/// Fully read raw response: status, lowercased headers, body bytes.
type RawResponse = (u16, HashMap<String, String>, Vec<u8>);

/// Async HTTP client for the Qolaba API.
///
/// Handles both authentication modes, retries transient failures with
/// exponential backoff, honors `Retry-After` on 429, refreshes an expired
/// or rejected OAuth token once per call, and reports every physical
/// attempt to the injected telemetry sink.
pub struct ApiClient {
    /// Pool handle; `None` after close. In-flight calls hold their own
    /// clone, so closing doesn't abort them.
    http: tokio::sync::RwLock<Option<reqwest::Client>>,
    config: ClientConfig,
    credential: Option<Credential>,
    token: TokenSlot,
    backoff: BackoffPolicy,
    telemetry: SharedSink,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl ApiClient {
    /// Create a client from configuration with no telemetry sink.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::with_telemetry(config, Arc::new(NoopSink))
    }

    /// Create a client that reports attempts to `telemetry`.
    pub fn with_telemetry(config: ClientConfig, telemetry: SharedSink) -> ClientResult<Self> {
        let credential = config.credential()?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(MAX_KEEPALIVE_CONNECTIONS)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .user_agent(USER_AGENT);

        if !config.verify_tls() {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(proxy) = &config.http_proxy {
            builder = builder.proxy(reqwest::Proxy::http(proxy)?);
        }
        if let Some(proxy) = &config.https_proxy {
            builder = builder.proxy(reqwest::Proxy::https(proxy)?);
        }

        let http = builder.build()?;

        debug!(
            config = ?config,
            auth_mode = ?config.auth_mode(),
            "API client initialized"
        );

        Ok(Self {
            http: tokio::sync::RwLock::new(Some(http)),
            config,
            credential,
            token: TokenSlot::new(),
            backoff: BackoffPolicy::default(),
            telemetry,
            permits: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
            closed: AtomicBool::new(false),
        })
    }

    /// Clone of the pool handle, or `Closed` after close.
    async fn transport(&self) -> ClientResult<reqwest::Client> {
        self.http
            .read()
            .await
            .clone()
            .ok_or(ApiClientError::Closed)
    }

    /// Override the backoff policy (tests disable jitter through this).
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Execute one logical call.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        opts: CallOptions,
    ) -> ClientResult<ApiResponse> {
        let http = self.transport().await?;
        let url = self.resolve_url(path);
        let max_attempts = self.config.max_attempts();
        let request_size = body.size();
        let mut attempt: u32 = 0;
        let mut refreshed_for_auth = false;
        // Set after a 401-forced refresh so the retry uses the token just
        // obtained even when its lifetime is inside the proactive margin.
        let mut assume_fresh = false;

        debug!(method = %method, url = %url, "starting API request");

        while attempt < max_attempts {
            let headers = self.attempt_headers(&http, &opts, assume_fresh).await?;
            assume_fresh = false;

            let started = Instant::now();
            let outcome = match opts.cancel.as_ref() {
                Some(cancel) => tokio::select! {
                    result = self.send_once(&http, &method, &url, &headers, &body, &opts.query) => result,
                    _ = cancel.cancelled() => return Err(ApiClientError::Cancelled),
                },
                None => {
                    self.send_once(&http, &method, &url, &headers, &body, &opts.query)
                        .await
                }
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Err(err) => {
                    self.emit(
                        path,
                        &method,
                        0,
                        elapsed_ms,
                        request_size,
                        0,
                        Some(transport_error_type(&err).to_string()),
                    );

                    match classify_transport(&err) {
                        Action::Retry(RetryClass::Network) => {
                            if attempt + 1 < max_attempts {
                                let delay = self.backoff.delay(attempt);
                                warn!(
                                    error = %err,
                                    attempt = attempt + 1,
                                    delay_ms = delay.as_millis() as u64,
                                    "network error, retrying"
                                );
                                self.sleep(delay, opts.cancel.as_ref()).await?;
                                attempt += 1;
                                continue;
                            }
                            return Err(ApiClientError::timeout(
                                format!("request failed after {} attempts: {err}", attempt + 1),
                                attempt + 1,
                            ));
                        }
                        _ => return Err(err.into()),
                    }
                }
                Ok((status, resp_headers, bytes)) => {
                    let response = build_response(status, resp_headers, &bytes, elapsed_ms);
                    self.emit(
                        path,
                        &method,
                        status,
                        elapsed_ms,
                        request_size,
                        response.body.size(),
                        status_error_type(status).map(str::to_string),
                    );

                    match classify_status(status) {
                        Action::Success => {
                            debug!(status, elapsed_ms, "request completed");
                            return Ok(response);
                        }
                        Action::Unauthorized => {
                            let refreshable =
                                self.credential.as_ref().is_some_and(Credential::is_oauth);
                            if refreshable && attempt == 0 && !refreshed_for_auth {
                                refreshed_for_auth = true;
                                info!("received 401, refreshing OAuth token");
                                let credential = self.credential.as_ref().ok_or_else(|| {
                                    ApiClientError::authentication("credential missing")
                                })?;
                                let fresh = auth::refresh_token(&http, credential).await?;
                                self.token.replace(fresh).await;
                                // One-shot grant: no backoff delay, and the
                                // transient retry budget is untouched.
                                assume_fresh = true;
                                continue;
                            }
                            return Err(ApiClientError::Authentication {
                                message: "Authentication failed".into(),
                                status: Some(status),
                                response: Some(Box::new(response)),
                            });
                        }
                        Action::Retry(RetryClass::RateLimit) => {
                            if attempt + 1 < max_attempts {
                                if let Some(secs) = response.retry_after_secs() {
                                    warn!(
                                        retry_after = secs,
                                        attempt = attempt + 1,
                                        "rate limited, honoring Retry-After"
                                    );
                                    // The header is trusted verbatim; the
                                    // exponential ceiling does not apply here.
                                    self.sleep(Duration::from_secs(secs), opts.cancel.as_ref())
                                        .await?;
                                    attempt += 1;
                                    continue;
                                }
                            }
                            return Err(ApiClientError::rate_limit(
                                "Rate limit exceeded",
                                Some(response),
                            ));
                        }
                        Action::Retry(RetryClass::Server) => {
                            if attempt + 1 < max_attempts {
                                let delay = self.backoff.delay(attempt);
                                warn!(
                                    status,
                                    attempt = attempt + 1,
                                    delay_ms = delay.as_millis() as u64,
                                    "retryable HTTP error, backing off"
                                );
                                self.sleep(delay, opts.cancel.as_ref()).await?;
                                attempt += 1;
                                continue;
                            }
                            return Err(ApiClientError::http(response));
                        }
                        Action::FailPermanent | Action::Retry(RetryClass::Network)
                        | Action::Propagate => {
                            return Err(ApiClientError::http(response));
                        }
                    }
                }
            }
        }

        Err(ApiClientError::Internal(
            "retry loop exited without a result".into(),
        ))
    }

    /// GET a path.
    pub async fn get(&self, path: &str) -> ClientResult<ApiResponse> {
        self.call(Method::GET, path, RequestBody::None, CallOptions::default())
            .await
    }

    /// POST a body to a path.
    pub async fn post(&self, path: &str, body: RequestBody) -> ClientResult<ApiResponse> {
        self.call(Method::POST, path, body, CallOptions::default())
            .await
    }

    /// PUT a body to a path.
    pub async fn put(&self, path: &str, body: RequestBody) -> ClientResult<ApiResponse> {
        self.call(Method::PUT, path, body, CallOptions::default())
            .await
    }

    /// PATCH a body to a path.
    pub async fn patch(&self, path: &str, body: RequestBody) -> ClientResult<ApiResponse> {
        self.call(Method::PATCH, path, body, CallOptions::default())
            .await
    }

    /// DELETE a path.
    pub async fn delete(&self, path: &str) -> ClientResult<ApiResponse> {
        self.call(
            Method::DELETE,
            path,
            RequestBody::None,
            CallOptions::default(),
        )
        .await
    }

    /// Close the client. Idempotent; releases the pool handle and clears
    /// the cached token. In-flight calls hold their own pool clone and are
    /// unaffected.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.http.write().await = None;
        self.token.clear().await;
        debug!("API client closed");
    }

    /// Join the configured base URL with `path`, normalizing to exactly one
    /// separator. Without a base URL the path is used verbatim.
    fn resolve_url(&self, path: &str) -> String {
        match self.config.base_url.as_deref() {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path.to_string(),
        }
    }

    /// Install a previously obtained token, e.g. one restored from storage.
    pub async fn prime_token(&self, token: auth::OAuthToken) {
        self.token.replace(token).await;
    }

    /// Assemble the headers for one attempt, refreshing the OAuth token
    /// first when it is missing or expired. `assume_fresh` skips the expiry
    /// check right after a forced refresh.
    async fn attempt_headers(
        &self,
        http: &reqwest::Client,
        opts: &CallOptions,
        assume_fresh: bool,
    ) -> ClientResult<Vec<(String, String)>> {
        let mut headers: Vec<(String, String)> = Vec::new();

        match &self.credential {
            Some(Credential::ApiKey { secret }) => {
                headers.push(("Authorization".into(), auth::bearer(secret)));
            }
            Some(credential @ Credential::OAuth { .. }) => {
                if !assume_fresh && self.token.is_expired(Utc::now()).await {
                    let fresh = auth::refresh_token(http, credential).await?;
                    self.token.replace(fresh).await;
                }
                let token = self.token.get().await.ok_or_else(|| {
                    ApiClientError::authentication("Failed to obtain OAuth token")
                })?;
                headers.push(("Authorization".into(), auth::bearer(&token.access_token)));
            }
            None => {}
        }

        let has_header = |name: &str| opts.headers.keys().any(|k| k.eq_ignore_ascii_case(name));

        for (key, value) in &opts.headers {
            headers.push((key.clone(), value.clone()));
        }

        if let Some(id) = &opts.request_id {
            if !has_header("x-request-id") {
                headers.push(("X-Request-ID".into(), id.clone()));
            }
        }

        if !has_header("accept") {
            headers.push(("Accept".into(), "application/json".into()));
        }

        Ok(headers)
    }

    /// One physical attempt: send the request and read the body fully. Any
    /// failure here, including a mid-body disconnect, is a transport error.
    async fn send_once(
        &self,
        http: &reqwest::Client,
        method: &Method,
        url: &str,
        headers: &[(String, String)],
        body: &RequestBody,
        query: &[(String, String)],
    ) -> Result<RawResponse, reqwest::Error> {
        let _permit = self.permits.acquire().await.ok();

        let mut request = http.request(method.clone(), url);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        request = match body {
            RequestBody::None => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Form(fields) => request.form(fields),
        };

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let bytes = response.bytes().await?.to_vec();

        Ok((status, headers, bytes))
    }

    /// Sleep between attempts, aborting early on cancellation.
    async fn sleep(
        &self,
        delay: Duration,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<()> {
        match cancel {
            Some(token) => tokio::select! {
                _ = tokio::time::sleep(delay) => Ok(()),
                _ = token.cancelled() => Err(ApiClientError::Cancelled),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    /// Fire-and-forget attempt telemetry.
    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        endpoint: &str,
        method: &Method,
        status_code: u16,
        duration_ms: u64,
        request_size: usize,
        response_size: usize,
        error_type: Option<String>,
    ) {
        self.telemetry.record_attempt(AttemptRecord {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            status_code,
            duration_ms,
            request_size,
            response_size,
            error_type,
        });
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
