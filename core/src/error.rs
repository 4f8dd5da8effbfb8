use thiserror::Error;

/// Raised by the request guard before any model or store work begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("bad origin")]
    BadOrigin,

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// A tool call whose arguments parsed as JSON but failed the tool's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid argument `{field}` for tool `{tool}`: {reason}")]
pub struct SchemaViolation {
    pub tool: &'static str,
    pub field: String,
    pub reason: String,
}

impl SchemaViolation {
    pub fn new(tool: &'static str, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tool,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// The data source's own failure. Tool execution carries it as a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The provider rejected or failed a request before any output arrived.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// The provider failed after the answer stream was already open.
    #[error("provider stream fault: {0}")]
    StreamFault(String),

    /// We could not build a request the provider would accept.
    #[error("invalid provider request: {0}")]
    InvalidRequest(String),
}

impl From<async_openai::error::OpenAIError> for ModelError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        match err {
            async_openai::error::OpenAIError::InvalidArgument(msg) => Self::InvalidRequest(msg),
            other => Self::Provider(other.to_string()),
        }
    }
}

/// Everything that aborts a chat request before streaming starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invalid conversation: {0}")]
    InvalidConversation(String),
}

impl ChatError {
    /// The fixed, user-safe copy for this failure. Never includes internal detail.
    pub fn user_message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::Guard(GuardError::RateLimited { .. }), Locale::Ko) => {
                "요청이 너무 많아요. 잠시 후 다시 시도해줘."
            }
            (Self::Guard(GuardError::RateLimited { .. }), Locale::En) => {
                "Too many requests. Please try again shortly."
            }
            (Self::Guard(GuardError::BadOrigin), Locale::Ko) => "허용되지 않은 요청이에요.",
            (Self::Guard(GuardError::BadOrigin), Locale::En) => "This request is not allowed.",
            (_, Locale::Ko) => "서버 오류가 발생했어.",
            (_, Locale::En) => "A server error occurred.",
        }
    }
}

/// Language of the short error bodies and the streaming-error marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Ko,
    En,
}

impl Locale {
    /// Picks English only when the client's first preference is English.
    pub fn from_accept_language(header: Option<&str>) -> Self {
        let first = header
            .and_then(|h| h.split(',').next())
            .map(|tag| tag.split(';').next().unwrap_or("").trim().to_ascii_lowercase());

        match first {
            Some(tag) if tag == "en" || tag.starts_with("en-") => Self::En,
            _ => Self::Ko,
        }
    }

    pub fn stream_error_marker(self) -> &'static str {
        match self {
            Self::Ko => "\n\n(스트리밍 오류)",
            Self::En => "\n\n(streaming error)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_by_kind() {
        let limited = ChatError::from(GuardError::RateLimited { retry_after_secs: 10 });
        assert_eq!(limited.user_message(Locale::Ko), "요청이 너무 많아요. 잠시 후 다시 시도해줘.");

        let origin = ChatError::from(GuardError::BadOrigin);
        assert_eq!(origin.user_message(Locale::En), "This request is not allowed.");

        let schema = ChatError::from(SchemaViolation::new("list_jobs", "industryId", "expected a UUID"));
        assert_eq!(schema.user_message(Locale::Ko), "서버 오류가 발생했어.");
    }

    #[test]
    fn test_user_message_hides_provider_detail() {
        let err = ChatError::from(ModelError::Provider("401 invalid api key sk-live".into()));
        let msg = err.user_message(Locale::En);
        assert!(!msg.contains("sk-live"));
        assert_eq!(msg, "A server error occurred.");
    }

    #[test]
    fn test_locale_from_accept_language() {
        assert_eq!(Locale::from_accept_language(None), Locale::Ko);
        assert_eq!(Locale::from_accept_language(Some("en-US,en;q=0.9")), Locale::En);
        assert_eq!(Locale::from_accept_language(Some("ko-KR,ko;q=0.9,en;q=0.8")), Locale::Ko);
        assert_eq!(Locale::from_accept_language(Some("EN;q=1")), Locale::En);
        assert_eq!(Locale::from_accept_language(Some("eng")), Locale::Ko);
    }
}
