mod http;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub use http::HttpTransport;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Failures below the application protocol: the backend never produced a
/// usable answer. These are never shown to the user verbatim.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("response parsing failed: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Username/password pair handed to a login or signup submission.
///
/// Consumed by the submission; nothing in the crate keeps a copy.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `GET /auth/check`
#[derive(Debug, Clone, Deserialize)]
pub struct SessionCheck {
    #[serde(default)]
    pub logged_in: bool,
}

/// An empty `error` string carries no error
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Body of `POST /auth/login` and `POST /auth/signup`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    /// Present only when the backend rejected the credentials
    #[serde(default, deserialize_with = "non_empty")]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthResponse {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Raw body of `POST /chat`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatBody {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub error: Option<String>,
}

/// Application-level outcome of a chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Reply(String),
    Error(String),
}

impl ChatReply {
    /// The text that becomes the agent message, whichever variant this is
    pub fn into_text(self) -> String {
        match self {
            ChatReply::Reply(text) | ChatReply::Error(text) => text,
        }
    }
}

impl ChatBody {
    pub(crate) fn into_reply(self) -> TransportResult<ChatReply> {
        // An error field wins over a reply field
        match (self.error, self.reply) {
            (Some(error), _) => Ok(ChatReply::Error(error)),
            (None, Some(reply)) => Ok(ChatReply::Reply(reply)),
            (None, None) => Err(TransportError::Decode(
                "chat response carries neither reply nor error".to_string(),
            )),
        }
    }
}

/// Credentialed access to the conversational backend.
///
/// Implementations attach the session credential to every call themselves;
/// callers never see it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET /auth/check`
    async fn check_session(&self) -> TransportResult<SessionCheck>;

    /// `POST /auth/login`
    async fn login(&self, credentials: Credentials) -> TransportResult<AuthResponse>;

    /// `POST /auth/signup`
    async fn signup(&self, credentials: Credentials) -> TransportResult<AuthResponse>;

    /// `POST /auth/logout`; the response body is ignored
    async fn logout(&self) -> TransportResult<()>;

    /// `POST /chat`
    async fn chat(&self, message: &str) -> TransportResult<ChatReply>;

    /// Get the name of this transport
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> ChatBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_chat_reply_from_reply_body() {
        let reply = body(r#"{"reply": "Hi there"}"#).into_reply().unwrap();
        assert_eq!(reply, ChatReply::Reply("Hi there".to_string()));
    }

    #[test]
    fn test_chat_error_takes_precedence() {
        let reply =
            body(r#"{"reply": "ignored", "error": "Not logged in"}"#).into_reply().unwrap();
        assert_eq!(reply, ChatReply::Error("Not logged in".to_string()));
    }

    #[test]
    fn test_chat_body_without_fields_is_decode_error() {
        let result = body("{}").into_reply();
        assert!(matches!(result, Err(TransportError::Decode(_))));
    }

    #[test]
    fn test_auth_response_success_detection() {
        let ok: AuthResponse = serde_json::from_str(r#"{"message": "Login successful"}"#).unwrap();
        assert!(ok.is_success());

        let empty: AuthResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.is_success());

        let rejected: AuthResponse =
            serde_json::from_str(r#"{"error": "Invalid credentials"}"#).unwrap();
        assert!(!rejected.is_success());
    }

    #[test]
    fn test_empty_error_is_no_error() {
        let login: AuthResponse =
            serde_json::from_str(r#"{"error": "", "message": "Login successful"}"#).unwrap();
        assert!(login.is_success());

        let reply = body(r#"{"error": "", "reply": "Hi"}"#).into_reply().unwrap();
        assert_eq!(reply, ChatReply::Reply("Hi".to_string()));

        let nothing = body(r#"{"error": null}"#).into_reply();
        assert!(matches!(nothing, Err(TransportError::Decode(_))));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("alice", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_session_check_defaults_to_logged_out() {
        let check: SessionCheck = serde_json::from_str("{}").unwrap();
        assert!(!check.logged_in);
    }
}
