use thiserror::Error;

/// Failures below HTTP status handling: the request never produced a response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Why a fetch ended without a usable body. Never leaves the API client.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("still rate limited after {0} waits")]
    RateLimited(u32),

    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: TransportError,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("nothing to draw")]
    Empty,

    #[error("failed to write chart: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to format chart: {0}")]
    Format(#[from] std::fmt::Error),
}

/// An unexpected failure caught at the refresh cycle boundary.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("refresh cycle panicked: {0}")]
    Panicked(String),

    #[error("refresh cycle was cancelled")]
    Cancelled,
}

impl From<tokio::task::JoinError> for CycleError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            let payload = err.into_panic();
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            CycleError::Panicked(message)
        } else {
            CycleError::Cancelled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FetchError::RetriesExhausted {
            attempts: 3,
            last_error: TransportError::Connect("refused".to_string()),
        };
        assert_eq!(err.to_string(), "gave up after 3 attempts: connection failed: refused");
        assert_eq!(FetchError::Status(500).to_string(), "unexpected HTTP status 500");
        assert_eq!(ParseError::NotAnObject("array").to_string(), "expected a JSON object, got array");
    }

    #[tokio::test]
    async fn test_cycle_error_from_panicking_task() {
        let handle = tokio::spawn(async {
            panic!("boom");
        });
        let err = CycleError::from(handle.await.unwrap_err());
        match err {
            CycleError::Panicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
