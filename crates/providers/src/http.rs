//! HTTP plumbing shared by every adapter: client construction, status
//! mapping, body decoding, and cancellation.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use wikiagent_core::error::{BackendError, ProtocolError, ProviderError};

/// Build a client with the configured request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))
}

/// Classify a transport failure.
pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Turn a non-success status into a [`ProviderError`].
pub(crate) fn status_error(provider: &str, status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited { retry_after_secs: 5 },
        401 | 403 => ProviderError::AuthenticationFailed(format!(
            "{provider} rejected the API key or permissions"
        )),
        _ => {
            warn!(provider, status, body = %body, "Provider returned error");
            ProviderError::ApiError {
                status_code: status,
                message: body,
            }
        }
    }
}

/// Decode a JSON body into a wire type.
pub(crate) fn decode<T: DeserializeOwned>(provider: &str, body: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(body).map_err(|e| ProtocolError::MalformedBody {
        provider: provider.to_string(),
        reason: e.to_string(),
    })
}

/// POST `body` as JSON and return the response text, racing the whole
/// exchange against `cancel`.
pub(crate) async fn post_json(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    cancel: &CancellationToken,
) -> Result<String, BackendError> {
    cancellable(cancel, async {
        let response = request
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(BackendError::from(status_error(provider, status.as_u16(), text)));
        }
        Ok::<_, BackendError>(text)
    })
    .await
}

/// Run `fut`, aborting with `ProviderError::Cancelled` if `cancel` fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled.into()),
        result = fut => result,
    }
}
