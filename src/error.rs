use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Which upstream call an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Universe,
    Quote,
    Candles,
    Profile,
    News,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CallKind::Universe => "universe",
            CallKind::Quote => "quote",
            CallKind::Candles => "candles",
            CallKind::Profile => "profile",
            CallKind::News => "news",
        };
        f.write_str(name)
    }
}

/// Errors at the market-data provider boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },
}

impl ProviderError {
    /// Only rate limiting is worth retrying within a cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Unavailable(e.to_string())
        }
    }
}

/// Errors raised while running a scan cycle.
///
/// Everything except [`ScanError::Configuration`] is local to one symbol.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("upstream unavailable for {symbol} ({call}): {reason}")]
    UpstreamUnavailable {
        symbol: String,
        call: CallKind,
        reason: String,
    },

    #[error("malformed {call} payload for {symbol}: {reason}")]
    MalformedPayload {
        symbol: String,
        call: CallKind,
        reason: String,
    },

    #[error("rate limit exceeded for {symbol} ({call}) after {attempts} attempts")]
    RateLimitExceeded {
        symbol: String,
        call: CallKind,
        attempts: u32,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl ScanError {
    /// Attach symbol and call context to a provider error.
    pub fn from_provider(symbol: &str, call: CallKind, err: ProviderError, attempts: u32) -> Self {
        let symbol = symbol.to_string();
        match err {
            ProviderError::Unavailable(reason) => Self::UpstreamUnavailable {
                symbol,
                call,
                reason,
            },
            ProviderError::Malformed(reason) => Self::MalformedPayload {
                symbol,
                call,
                reason,
            },
            ProviderError::RateLimited { .. } => Self::RateLimitExceeded {
                symbol,
                call,
                attempts,
            },
        }
    }

    /// Configuration errors abort the cycle; everything else only skips a symbol.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result store errors.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// HTTP-facing error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Sink(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_mapping() {
        let err = ScanError::from_provider(
            "ABC",
            CallKind::Quote,
            ProviderError::Malformed("missing c".into()),
            1,
        );
        assert!(matches!(err, ScanError::MalformedPayload { call: CallKind::Quote, .. }));
        assert_eq!(err.to_string(), "malformed quote payload for ABC: missing c");

        let err = ScanError::from_provider(
            "ABC",
            CallKind::Candles,
            ProviderError::RateLimited { retry_after_secs: None },
            4,
        );
        assert!(matches!(err, ScanError::RateLimitExceeded { attempts: 4, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(ScanError::Configuration("FINNHUB_API_KEY not set".into()).is_fatal());
        assert!(!ScanError::UpstreamUnavailable {
            symbol: "X".into(),
            call: CallKind::News,
            reason: "timeout".into(),
        }
        .is_fatal());
    }

    #[test]
    fn test_retryable() {
        assert!(ProviderError::RateLimited { retry_after_secs: Some(1) }.is_retryable());
        assert!(!ProviderError::Unavailable("502".into()).is_retryable());
    }

    #[test]
    fn test_app_error_status() {
        let response = AppError::BadRequest("limit".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = AppError::Unavailable("no provider".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
