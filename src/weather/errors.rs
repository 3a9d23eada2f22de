//! Error types for the upstream weather client.

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Upstream unreachable, connection reset, or timed out.
    #[error("weather API request failed")]
    Transport(#[source] reqwest::Error),
    #[error("weather API returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
    /// Response headers arrived but the body could not be read in full.
    #[error("failed to read weather API response body")]
    Body(#[source] reqwest::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FetchError {
    /// Whether retrying later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Body(_) => true,
            FetchError::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            FetchError::Other(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        let status = |status| FetchError::UpstreamStatus {
            status,
            body: String::new(),
        };
        assert!(status(429).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(401).is_transient());
        assert!(!FetchError::Other(anyhow::anyhow!("bad config")).is_transient());
    }

    #[test]
    fn upstream_status_message_includes_body() {
        let err = FetchError::UpstreamStatus {
            status: 401,
            body: r#"{"cod":401,"message":"Invalid API key"}"#.into(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Invalid API key"));
    }
}
