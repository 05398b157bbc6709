//! Session state and its reducer.
//!
//! `Session` is the value every consumer observes. It only changes through
//! [`Session::apply`], which is pure and deterministic: the store performs IO
//! and then applies an action describing what happened.

use schoolerp_auth::{Role, SchoolSummary, SessionUser, ViewAccess, authorize_view};

/// Snapshot of the authentication state.
///
/// # Invariants
/// - A user is never held without a token.
/// - A user restored from storage is not trusted until the backend confirms
///   it; until then the session reports [`SessionPhase::Resolving`].
#[derive(Clone, Default, PartialEq)]
pub struct Session {
    user: Option<SessionUser>,
    token: Option<String>,
    loading: bool,
    error: Option<String>,
    verified: bool,
    selected_school: Option<SchoolSummary>,
}

/// State-machine view of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionPhase<'a> {
    Unauthenticated,
    /// A stored token or a login attempt is being checked with the backend.
    Resolving,
    Authenticated(&'a SessionUser),
    Error(&'a str),
}

/// Something that happened to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Persisted data was read at startup.
    Hydrated {
        token: Option<String>,
        user: Option<SessionUser>,
        selected_school: Option<SchoolSummary>,
    },
    /// An auth-affecting request went out.
    RequestStarted,
    /// The request finished without changing identity.
    RequestFinished,
    /// A non-credential request failed; the message is kept for display.
    RequestFailed { message: String },
    LoginSucceeded { user: SessionUser, token: String },
    LoginFailed { message: String },
    /// The backend confirmed who owns `token`.
    UserLoaded { token: String, user: SessionUser },
    /// The backend rejected `token`.
    Invalidated { token: String },
    LoggedOut,
    UserUpdated(SessionUser),
    SchoolSelected(SchoolSummary),
    ErrorCleared,
}

impl SessionAction {
    /// Short name for logs (actions carry tokens, so they are not logged whole).
    pub fn name(&self) -> &'static str {
        match self {
            SessionAction::Hydrated { .. } => "hydrated",
            SessionAction::RequestStarted => "request_started",
            SessionAction::RequestFinished => "request_finished",
            SessionAction::RequestFailed { .. } => "request_failed",
            SessionAction::LoginSucceeded { .. } => "login_succeeded",
            SessionAction::LoginFailed { .. } => "login_failed",
            SessionAction::UserLoaded { .. } => "user_loaded",
            SessionAction::Invalidated { .. } => "invalidated",
            SessionAction::LoggedOut => "logged_out",
            SessionAction::UserUpdated(_) => "user_updated",
            SessionAction::SchoolSelected(_) => "school_selected",
            SessionAction::ErrorCleared => "error_cleared",
        }
    }
}

impl Session {
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// The user, once the backend has confirmed it.
    pub fn verified_user(&self) -> Option<&SessionUser> {
        self.user.as_ref().filter(|_| self.verified)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn selected_school(&self) -> Option<&SchoolSummary> {
        self.selected_school.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.verified_user().is_some()
    }

    pub fn phase(&self) -> SessionPhase<'_> {
        match (self.verified_user(), self.loading, self.error.as_deref()) {
            (None, true, _) => SessionPhase::Resolving,
            (_, _, Some(message)) => SessionPhase::Error(message),
            (Some(user), _, None) => SessionPhase::Authenticated(user),
            (None, false, None) => SessionPhase::Unauthenticated,
        }
    }

    /// Guard a protected view; see [`authorize_view`].
    pub fn access(&self, allowed: &[Role]) -> ViewAccess {
        authorize_view(self.verified_user(), self.loading, allowed)
    }

    /// Apply an action. Returns `false` when the action was stale and ignored.
    pub fn apply(&mut self, action: &SessionAction) -> bool {
        match action {
            SessionAction::Hydrated {
                token,
                user,
                selected_school,
            } => {
                *self = Session::default();
                if let Some(token) = token {
                    self.token = Some(token.clone());
                    self.user = user.clone();
                    self.selected_school = selected_school.clone();
                    self.loading = true;
                }
                true
            }
            SessionAction::RequestStarted => {
                self.loading = true;
                self.error = None;
                true
            }
            SessionAction::RequestFinished => {
                self.loading = false;
                true
            }
            SessionAction::RequestFailed { message } | SessionAction::LoginFailed { message } => {
                self.loading = false;
                self.error = Some(message.clone());
                true
            }
            SessionAction::LoginSucceeded { user, token } => {
                // A selected school belongs to the user who chose it.
                if self.user.as_ref().is_none_or(|current| current.id != user.id) {
                    self.selected_school = None;
                }
                self.user = Some(user.clone());
                self.token = Some(token.clone());
                self.verified = true;
                self.loading = false;
                self.error = None;
                true
            }
            SessionAction::UserLoaded { token, user } => {
                if self.token.as_deref() != Some(token.as_str()) {
                    return false;
                }
                if self.user.as_ref().is_some_and(|current| current.id != user.id) {
                    self.selected_school = None;
                }
                self.user = Some(user.clone());
                self.verified = true;
                self.loading = false;
                true
            }
            SessionAction::Invalidated { token } => {
                if self.token.as_deref() != Some(token.as_str()) {
                    return false;
                }
                *self = Session::default();
                true
            }
            SessionAction::LoggedOut => {
                let changed = *self != Session::default();
                *self = Session::default();
                changed
            }
            SessionAction::UserUpdated(user) => match &self.user {
                Some(current) if current.id == user.id => {
                    self.user = Some(user.clone());
                    true
                }
                _ => false,
            },
            SessionAction::SchoolSelected(school) => {
                if self.verified_user().is_none() {
                    return false;
                }
                self.selected_school = Some(school.clone());
                true
            }
            SessionAction::ErrorCleared => self.error.take().is_some(),
        }
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user.as_ref().map(|u| u.id.as_str()))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("loading", &self.loading)
            .field("error", &self.error)
            .field("verified", &self.verified)
            .field("selected_school", &self.selected_school.as_ref().map(|s| s.id.as_str()))
            .finish()
    }
}
