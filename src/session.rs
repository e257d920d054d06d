//! Session gate: decides whether the conversation is reachable at all.
//!
//! The gate owns the authentication status, the auth prompt and the
//! conversation. A [`ChatController`] exists exactly while the status is
//! [`SessionStatus::Authenticated`], which makes the protected view and the
//! auth prompt mutually exclusive by construction.

use crate::auth::{AuthForm, AuthKind, AuthOutcome};
use crate::chat::ChatController;
use crate::conversation::ReplyOrdering;
use crate::transport::{Credentials, Transport};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup check not answered yet
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// Client-visible routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Signup,
    /// Protected conversation route
    Chat,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::Chat => "/chat",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/" | "" => Some(Route::Landing),
            "/login" => Some(Route::Login),
            "/signup" => Some(Route::Signup),
            "/chat" => Some(Route::Chat),
            _ => None,
        }
    }
}

/// What the front-end should show right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Startup check in flight; show neither prompt nor conversation
    Pending,
    /// Auth prompt in the given mode
    AuthPrompt(AuthKind),
    /// Standalone login/signup page (reached by route, prompt hidden)
    AuthPage(AuthKind),
    Conversation,
    /// Landing page with nothing on it
    Blank,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("session check has not completed yet")]
    CheckPending,
}

pub struct SessionGate {
    transport: Arc<dyn Transport>,
    ordering: ReplyOrdering,
    status: SessionStatus,
    route: Route,
    prompt_visible: bool,
    auth_mode: AuthKind,
    login_form: AuthForm,
    signup_form: AuthForm,
    chat: Option<ChatController>,
}

impl SessionGate {
    pub fn new(transport: Arc<dyn Transport>, ordering: ReplyOrdering) -> Self {
        Self {
            transport,
            ordering,
            status: SessionStatus::Unknown,
            route: Route::Landing,
            prompt_visible: false,
            auth_mode: AuthKind::Login,
            login_form: AuthForm::new(AuthKind::Login),
            signup_form: AuthForm::new(AuthKind::Signup),
            chat: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn is_prompt_visible(&self) -> bool {
        self.prompt_visible
    }

    pub fn auth_mode(&self) -> AuthKind {
        self.auth_mode
    }

    /// Switch the prompt between login and signup
    pub fn set_auth_mode(&mut self, kind: AuthKind) {
        self.auth_mode = kind;
    }

    pub fn form(&self, kind: AuthKind) -> &AuthForm {
        match kind {
            AuthKind::Login => &self.login_form,
            AuthKind::Signup => &self.signup_form,
        }
    }

    fn form_mut(&mut self, kind: AuthKind) -> &mut AuthForm {
        match kind {
            AuthKind::Login => &mut self.login_form,
            AuthKind::Signup => &mut self.signup_form,
        }
    }

    /// The conversation, available only while authenticated
    pub fn chat(&self) -> Option<&ChatController> {
        self.chat.as_ref()
    }

    pub fn view(&self) -> View {
        match (self.status, self.route) {
            (SessionStatus::Unknown, _) => View::Pending,
            (SessionStatus::Authenticated, Route::Chat) => View::Conversation,
            _ if self.prompt_visible => View::AuthPrompt(self.auth_mode),
            (_, Route::Login) => View::AuthPage(AuthKind::Login),
            (_, Route::Signup) => View::AuthPage(AuthKind::Signup),
            _ => View::Blank,
        }
    }

    fn is_valid_transition(from: SessionStatus, to: SessionStatus) -> bool {
        use SessionStatus::*;

        match (from, to) {
            // Startup check resolves exactly once
            (Unknown, Authenticated) => true,
            (Unknown, Unauthenticated) => true,

            // Explicit login/logout afterwards
            (Unauthenticated, Authenticated) => true,
            (Authenticated, Unauthenticated) => true,

            _ => false,
        }
    }

    fn transition(&mut self, to: SessionStatus) -> Result<(), SessionError> {
        let from = self.status;
        if !Self::is_valid_transition(from, to) {
            return Err(SessionError::InvalidTransition { from, to });
        }

        match to {
            SessionStatus::Authenticated => {
                self.chat = Some(ChatController::new(self.transport.clone(), self.ordering));
                self.prompt_visible = false;
                self.route = Route::Chat;
            }
            SessionStatus::Unauthenticated => {
                if let Some(chat) = self.chat.take() {
                    chat.discard();
                }
                self.prompt_visible = true;
                self.auth_mode = AuthKind::Login;
                self.route = Route::Landing;
            }
            SessionStatus::Unknown => unreachable!("Unknown is never a transition target"),
        }

        self.status = to;
        tracing::info!("Session {:?} -> {:?}", from, to);
        Ok(())
    }

    /// Ask the backend whether a session already exists.
    ///
    /// Runs once; later calls return the current status without a request.
    /// Any answer other than `{logged_in: true}` counts as logged out.
    pub async fn check_session(&mut self) -> SessionStatus {
        if self.status != SessionStatus::Unknown {
            tracing::debug!("Session check already resolved to {:?}", self.status);
            return self.status;
        }

        let logged_in = match self.transport.check_session().await {
            Ok(check) => check.logged_in,
            Err(e) => {
                tracing::warn!("Session check failed, treating as logged out: {}", e);
                false
            }
        };

        let to = if logged_in {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        };
        if let Err(e) = self.transition(to) {
            tracing::error!("Startup check could not be applied: {}", e);
        }
        self.status
    }

    /// Enter the authenticated state after a successful login or signup
    pub fn complete_login(&mut self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Authenticated => Ok(()),
            SessionStatus::Unknown => Err(SessionError::CheckPending),
            SessionStatus::Unauthenticated => {
                self.login_form.clear_error();
                self.signup_form.clear_error();
                self.transition(SessionStatus::Authenticated)
            }
        }
    }

    /// Submit credentials through the form for the current auth mode and
    /// complete the login on success.
    pub async fn submit_credentials(
        &mut self,
        credentials: Credentials,
    ) -> Result<AuthOutcome, SessionError> {
        if self.status == SessionStatus::Unknown {
            return Err(SessionError::CheckPending);
        }

        let kind = self.auth_mode;
        let transport = self.transport.clone();
        let outcome = self
            .form_mut(kind)
            .submit(credentials, transport.as_ref())
            .await;

        if outcome.is_accepted() {
            self.complete_login()?;
        }
        Ok(outcome)
    }

    /// Leave the authenticated state.
    ///
    /// The local state flips before the logout request is awaited, so the
    /// conversation is gone even if the request fails or never returns.
    pub async fn logout(&mut self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Unknown => return Err(SessionError::CheckPending),
            SessionStatus::Unauthenticated => return Ok(()),
            SessionStatus::Authenticated => self.transition(SessionStatus::Unauthenticated)?,
        }

        if let Err(e) = self.transport.logout().await {
            tracing::warn!("Logout request failed (ignored): {}", e);
        }
        Ok(())
    }

    /// Move to `route`. The conversation route is only reachable while
    /// authenticated; otherwise this lands on the landing route with the
    /// prompt shown. Returns the route actually taken.
    pub fn navigate(&mut self, route: Route) -> Route {
        self.route = match route {
            Route::Chat if self.status != SessionStatus::Authenticated => {
                tracing::debug!("Refusing {} while {:?}", route.path(), self.status);
                if self.status == SessionStatus::Unauthenticated {
                    self.prompt_visible = true;
                }
                Route::Landing
            }
            Route::Login => {
                self.auth_mode = AuthKind::Login;
                Route::Login
            }
            Route::Signup => {
                self.auth_mode = AuthKind::Signup;
                Route::Signup
            }
            other => other,
        };
        self.route
    }
}
