use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use url::Url;

use crate::executor::dispatcher::{DispatchError, Dispatcher, StepInvocation, StepOutput};

#[derive(Debug, thiserror::Error)]
pub enum HttpDispatcherError {
    #[error("invalid dispatcher base url {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Dispatches each step as a JSON `POST` to `<base_url>/<action>`.
///
/// The request body carries the saga and step names, the action, the mode, the
/// trace and run ids, and the payload. A 2xx response succeeds with its body
/// as the step output (`null` if empty, a string if not JSON). Anything else
/// fails the step.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDispatcher {
    pub fn new(base_url: &str) -> Result<Self, HttpDispatcherError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("saga-exec/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, HttpDispatcherError> {
        // Without a trailing slash `join` would replace the last path segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized).map_err(|source| HttpDispatcherError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `action` under the base url. Absolute urls and dot segments
    /// are rejected so an action can never leave `base_url`.
    fn endpoint(&self, action: &str) -> Result<Url, DispatchError> {
        let invalid = |reason: &str| DispatchError::Rejected(format!("invalid action {action:?}: {reason}"));

        if Url::parse(action).is_ok() {
            return Err(invalid("absolute urls are not allowed"));
        }
        let has_dot_segment = action
            .split(['/', '\\'])
            .any(|seg| matches!(seg.to_ascii_lowercase().as_str(), ".." | "%2e%2e" | ".%2e" | "%2e."));
        if has_dot_segment {
            return Err(invalid("dot segments are not allowed"));
        }

        let url = self
            .base_url
            .join(action.trim_start_matches(['/', '\\']))
            .map_err(|e| invalid(&e.to_string()))?;
        if !url.as_str().starts_with(self.base_url.as_str()) {
            return Err(invalid("resolves outside the dispatcher base url"));
        }
        Ok(url)
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn execute(&self, invocation: StepInvocation<'_>) -> Result<StepOutput, DispatchError> {
        let url = self.endpoint(invocation.action)?;
        let body = json!({
            "saga": invocation.saga,
            "step": invocation.step.name,
            "action": invocation.action,
            "mode": invocation.mode.as_str(),
            "trace_id": invocation.trace_id,
            "run_id": invocation.run_id,
            "payload": invocation.payload,
        });

        let mut request = self
            .client
            .post(url.clone())
            .header("x-trace-id", invocation.trace_id)
            .json(&body);
        if let Some(remaining) = invocation.remaining() {
            if remaining.is_zero() {
                return Err(DispatchError::TimedOut(Duration::ZERO));
            }
            request = request.timeout(remaining);
        }

        // Dropping the in-flight request on cancellation closes the connection.
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        };
        let (status, bytes) = tokio::select! {
            _ = invocation.cancel.cancelled() => return Err(DispatchError::Cancelled),
            exchange = exchange => exchange.map_err(|e| map_reqwest_error(e, invocation.remaining()))?,
        };

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            let snippet: String = text.chars().take(256).collect();
            return Err(DispatchError::Failed(format!("{url} responded {status}: {snippet}")));
        }

        if bytes.is_empty() {
            return Ok(StepOutput::Null);
        }
        Ok(serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| StepOutput::String(String::from_utf8_lossy(&bytes).into_owned())))
    }
}

fn map_reqwest_error(e: reqwest::Error, remaining: Option<Duration>) -> DispatchError {
    if e.is_timeout() {
        return DispatchError::TimedOut(remaining.unwrap_or_default());
    }
    DispatchError::Failed(e.to_string())
}
