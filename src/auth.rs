//! Login and signup forms

use crate::transport::{Credentials, Transport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthKind {
    #[default]
    Login,
    Signup,
}

impl AuthKind {
    /// Message shown when the request never got an answer from the backend
    pub fn fallback_error(&self) -> &'static str {
        match self {
            AuthKind::Login => "Login failed",
            AuthKind::Signup => "Signup failed",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AuthKind::Login => "Login",
            AuthKind::Signup => "Signup",
        }
    }
}

/// Result of one form submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The backend accepted the credentials; a session now exists
    Accepted,
    /// The backend answered with an error message
    Rejected(String),
    /// No usable answer; the fallback message is shown
    Failed,
}

impl AuthOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AuthOutcome::Accepted)
    }
}

/// One credential form. Holds nothing but the inline error line.
#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    kind: AuthKind,
    error: Option<String>,
}

impl AuthForm {
    pub fn new(kind: AuthKind) -> Self {
        Self { kind, error: None }
    }

    pub fn kind(&self) -> AuthKind {
        self.kind
    }

    /// Inline error currently shown under the form
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Submit `credentials` as-is. The credentials are consumed here.
    pub async fn submit(
        &mut self,
        credentials: Credentials,
        transport: &dyn Transport,
    ) -> AuthOutcome {
        let username = credentials.username.clone();
        let result = match self.kind {
            AuthKind::Login => transport.login(credentials).await,
            AuthKind::Signup => transport.signup(credentials).await,
        };

        let outcome = match result {
            Ok(response) => match response.error {
                None => AuthOutcome::Accepted,
                Some(error) => AuthOutcome::Rejected(error),
            },
            Err(e) => {
                tracing::warn!("{} request for '{}' failed: {}", self.kind.title(), username, e);
                AuthOutcome::Failed
            }
        };

        self.error = match &outcome {
            AuthOutcome::Accepted => {
                tracing::info!("{} succeeded for '{}'", self.kind.title(), username);
                None
            }
            AuthOutcome::Rejected(error) => {
                tracing::info!("{} rejected for '{}': {}", self.kind.title(), username, error);
                Some(error.clone())
            }
            AuthOutcome::Failed => Some(self.kind.fallback_error().to_string()),
        };

        outcome
    }
}
