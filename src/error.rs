use reqwest::StatusCode;

/// Failures raised at the boundary with external services.
///
/// Callers work with `anyhow::Result`; these variants exist so a failure can be
/// told apart with `downcast_ref` (tests, exit messages).
#[derive(Debug, thiserror::Error)]
pub enum AutoReplyError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("{service} request failed ({status}): {body}")]
    ProviderRequest {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Missing API key: set the {0} environment variable or use --mode static")]
    MissingApiKey(&'static str),
}

impl AutoReplyError {
    pub fn auth(reason: impl Into<String>) -> Self {
        AutoReplyError::Authentication(reason.into())
    }
}

/// Turn a non-success response into `ProviderRequest`, passing successes through.
pub async fn check_response(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AutoReplyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AutoReplyError::ProviderRequest {
        service,
        status,
        body,
    })
}
