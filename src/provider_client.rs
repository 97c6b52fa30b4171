use std::fmt::Debug;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use reqwest::Method;
use reqwest::RequestBuilder;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde_json::Value;

use crate::configuration::ProviderKind;
use crate::utils::error_chain_fmt;

/// How a provider expects its key to be presented
#[derive(Clone)]
pub enum ProviderAuth {
    /// A single custom header holding the raw key (`X-Kit-Api-Key`, `api-key`)
    ApiKeyHeader {
        header: &'static str,
        key: Secret<String>,
    },
    /// PostgREST gateways want the same key twice: as a bearer token and as
    /// `apikey`
    BearerWithApiKey(Secret<String>),
}

impl ProviderAuth {
    fn apply(
        &self,
        request: RequestBuilder,
    ) -> RequestBuilder {
        match self {
            Self::ApiKeyHeader { header, key } => request.header(*header, key.expose_secret()),
            Self::BearerWithApiKey(key) => request
                .header("apikey", key.expose_secret())
                .header(AUTHORIZATION, format!("Bearer {}", key.expose_secret())),
        }
    }
}

#[derive(thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request timed out.")]
    Timeout {
        provider: ProviderKind,
        after: Duration,
    },
    #[error("{provider} returned a non-JSON response.")]
    MalformedResponse {
        provider: ProviderKind,
        #[source]
        source: serde_json::Error,
    },
    /// Non-2xx; `message` is the provider's own explanation when it gave one
    #[error("{message}")]
    Rejected {
        provider: ProviderKind,
        status: StatusCode,
        message: String,
    },
    #[error("{provider} request failed.")]
    Transport {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },
}

impl Debug for ProviderError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Authenticated JSON caller for one list-management API.
///
/// Every `call` is exactly one outbound request, bounded by `timeout`; there
/// are no retries, a failure is handed straight back to the caller.
// establishing a HTTP connection is expensive, so one `Client` is kept per
// provider for the lifetime of the server, and shared by all workers
#[derive(Clone)]
pub struct ProviderClient {
    http_client: Client,
    base_url: String,
    provider: ProviderKind,
    auth: ProviderAuth,
    timeout: Duration,
}

impl ProviderClient {
    pub fn new(
        base_url: &str,
        provider: ProviderKind,
        auth: ProviderAuth,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            provider,
            auth,
            timeout,
        }
    }

    fn url(
        &self,
        path: &str,
    ) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        self.call_with_headers(method, path, body, &[]).await
    }

    /// `call`, with extra per-request headers (e.g. PostgREST's `Prefer`).
    ///
    /// The deadline covers both sending the request and reading the body. An
    /// empty body is returned as `Value::Null`.
    #[tracing::instrument(
        name = "Calling provider API",
        skip(self, body, headers),
        fields(provider = %self.provider, http.status = tracing::field::Empty)
    )]
    pub async fn call_with_headers(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> Result<Value, ProviderError> {
        let mut request = self
            .http_client
            .request(method, self.url(path))
            .header(CONTENT_TYPE, "application/json");
        request = self.auth.apply(request);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let raw = response.text().await?;
            Ok::<_, reqwest::Error>((status, raw))
        };

        let (status, raw) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| self.timed_out())?
            .map_err(|e| match e.is_timeout() {
                true => self.timed_out(),
                false => ProviderError::Transport {
                    provider: self.provider,
                    source: e,
                },
            })?;

        tracing::Span::current().record("http.status", status.as_u16());

        let data = parse_body(&raw);

        if !status.is_success() {
            let message = data
                .as_ref()
                .ok()
                .and_then(error_message)
                .unwrap_or_else(|| format!("{} request failed.", self.provider));
            tracing::warn!(%status, %message, "provider rejected request");
            return Err(ProviderError::Rejected {
                provider: self.provider,
                status,
                message,
            });
        }

        data.map_err(|source| ProviderError::MalformedResponse {
            provider: self.provider,
            source,
        })
    }

    fn timed_out(&self) -> ProviderError {
        tracing::warn!(timeout = ?self.timeout, "provider request timed out");
        ProviderError::Timeout {
            provider: self.provider,
            after: self.timeout,
        }
    }
}

fn parse_body(raw: &str) -> Result<Value, serde_json::Error> {
    match raw.is_empty() {
        true => Ok(Value::Null),
        false => serde_json::from_str(raw),
    }
}

/// Providers disagree on where the explanation goes; take the first of
/// `message`, `error`, `error_description` that holds a non-empty string
fn error_message(data: &Value) -> Option<String> {
    ["message", "error", "error_description"]
        .iter()
        .filter_map(|key| data.get(key).and_then(Value::as_str))
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}
