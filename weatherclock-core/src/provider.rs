use crate::model::Location;
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openmeteo;

pub use openmeteo::OpenMeteoProvider;

/// What came back from one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A non-empty body, not yet validated.
    Success(String),
    /// Network, TLS, timeout or body-read failure.
    TransportError(String),
    /// The response carried no bytes at all.
    EmptyBody,
    /// The body decoded to an empty or whitespace-only string.
    EmptyPayload,
}

impl FetchOutcome {
    /// Classify a raw response body.
    pub fn from_body(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::EmptyBody;
        }

        let text = String::from_utf8_lossy(body);
        if text.trim().is_empty() {
            Self::EmptyPayload
        } else {
            Self::Success(text.into_owned())
        }
    }

    /// Transport failures and empty responses go through backoff.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Success(_))
    }

    /// Log-friendly summary of a failed outcome.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Success(_) => None,
            Self::TransportError(msg) => Some(msg.clone()),
            Self::EmptyBody => Some("No body bytes received".to_string()),
            Self::EmptyPayload => Some("Empty response body".to_string()),
        }
    }
}

/// Something that can fetch a raw forecast payload for a location.
#[async_trait]
pub trait ForecastSource: Send + Sync + Debug {
    async fn fetch(&self, location: &Location) -> FetchOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_body() {
        assert_eq!(FetchOutcome::from_body(b""), FetchOutcome::EmptyBody);
        assert_eq!(FetchOutcome::from_body(b" \r\n"), FetchOutcome::EmptyPayload);
        assert_eq!(
            FetchOutcome::from_body(b"{}"),
            FetchOutcome::Success("{}".to_string())
        );
    }

    #[test]
    fn only_success_is_not_retryable() {
        assert!(!FetchOutcome::Success("{}".into()).is_retryable());
        assert!(FetchOutcome::TransportError("reset".into()).is_retryable());
        assert!(FetchOutcome::EmptyBody.is_retryable());
        assert!(FetchOutcome::EmptyPayload.is_retryable());
    }

    #[test]
    fn failure_reason() {
        assert_eq!(FetchOutcome::Success("{}".into()).failure_reason(), None);
        assert_eq!(
            FetchOutcome::TransportError("dns".into()).failure_reason().as_deref(),
            Some("dns")
        );
    }
}
