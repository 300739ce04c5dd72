//! Error taxonomy for backend calls
//!
//! Every failure a view can observe falls into one of these buckets. None of
//! them is retried automatically; callers decide what to show.

use thiserror::Error;

use crate::storage::StorageError;

/// Failure of a request routed through the gateway
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 401. The stored credential has already been discarded.
    #[error("unauthorized{}", .message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Unauthorized { message: Option<String> },

    /// Any other non-2xx response
    #[error("request rejected ({status}){}", .message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Rejected { status: u16, message: Option<String> },

    /// Network unreachable, timeout, connection reset
    #[error("transport failure: {0}")]
    Transport(String),

    /// 2xx response whose body did not match the expected shape
    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Build an error from a non-2xx status and its raw body
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body);
        if status == 401 {
            Self::Unauthorized { message }
        } else {
            Self::Rejected { status, message }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Text to show the user: the server's own message when it sent one,
    /// otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Unauthorized { message: Some(m) } | Self::Rejected { message: Some(m), .. } => {
                m.clone()
            }
            _ => fallback.to_string(),
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Looks at `error` first, then `message`. Bodies that are not JSON objects,
/// or carry neither field as a non-empty string, yield `None`.
pub fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "message"].iter().find_map(|key| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_prefers_error_field() {
        let body = r#"{"error": "Solde insuffisant", "message": "ignored"}"#;
        assert_eq!(extract_message(body).as_deref(), Some("Solde insuffisant"));
    }

    #[test]
    fn test_extract_message_falls_back_to_message_field() {
        let body = r#"{"message": "Admin dashboard"}"#;
        assert_eq!(extract_message(body).as_deref(), Some("Admin dashboard"));
    }

    #[test]
    fn test_extract_message_without_structure() {
        assert_eq!(extract_message("<html>502 Bad Gateway</html>"), None);
        assert_eq!(extract_message(r#"{"detail": "nope"}"#), None);
        assert_eq!(extract_message(r#"{"error": ""}"#), None);
    }

    #[test]
    fn test_from_status_classifies_401() {
        let err = ApiError::from_status(401, r#"{"error": "Email ou mot de passe invalide"}"#);
        assert!(err.is_unauthorized());
        assert_eq!(err.user_message("fallback"), "Email ou mot de passe invalide");

        let err = ApiError::from_status(404, r#"{"error": "Aucun challenge actif trouvé"}"#);
        assert!(!err.is_unauthorized());
        assert_eq!(err.user_message("fallback"), "Aucun challenge actif trouvé");
    }

    #[test]
    fn test_user_message_fallbacks() {
        let err = ApiError::Transport("connection refused".to_string());
        assert_eq!(err.user_message("Failed to fetch data"), "Failed to fetch data");

        let err = ApiError::from_status(500, "");
        assert_eq!(err.user_message("Failed to fetch data"), "Failed to fetch data");
    }
}
