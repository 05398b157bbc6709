//! The session store: single owner of the authentication state.
//!
//! Every operation follows the same shape: perform IO (backend, storage),
//! then describe the outcome as a [`SessionAction`] and apply it to the
//! shared [`Session`]. Observers hold a `watch` receiver and always see a
//! complete snapshot.
//!
//! Concurrency rules:
//! - a newer `login` cancels the one in flight (last writer wins)
//! - `logout` cancels any in-flight login
//! - results that arrive for a token that is no longer current are dropped
//! - state change and its storage write happen under one mutation lock, so
//!   storage never disagrees with memory once an operation returns

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Notify, broadcast, watch};

use schoolerp_auth::{
    AuthzError, Credentials, Dashboard, PasswordChange, Permission, Role, SchoolSummary, SessionUser,
    UserPatch, ViewAccess, authorize,
};
use schoolerp_core::{DomainError, SchoolId};

use crate::api::{ApiError, AuthApi, LoginResponse};
use crate::notice::{Notice, Notifier};
use crate::session::{Session, SessionAction};
use crate::storage::{PersistedSession, SessionStorage, StorageKey};

/// Shown when the backend rejects a login without saying why.
pub const LOGIN_FAILED: &str = "Login failed";
pub const PASSWORD_CHANGE_FAILED: &str = "Failed to change password";
pub const PROFILE_UPDATE_FAILED: &str = "Failed to update profile";
pub const SESSION_EXPIRED: &str = "Session expired, please log in again";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The backend refused the credentials (or could not be reached).
    #[error("{0}")]
    Credentials(String),

    /// The backend rejected the session token; the session has been ended.
    #[error("session expired")]
    SessionExpired,

    /// A profile or password mutation was refused.
    #[error("{0}")]
    Mutation(String),

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("not signed in")]
    NotAuthenticated,

    /// A newer login or a logout superseded this request.
    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Forbidden(#[from] AuthzError),
}

/// Shared handle to the one store of a running app.
pub type SessionHandle = Arc<SessionStore>;

pub struct SessionStore {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<Session>,
    notices: Notifier,
    /// Cancellation signal of the login currently in flight.
    login_flight: Mutex<Option<Arc<Notify>>>,
    mutation: tokio::sync::Mutex<()>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn AuthApi>, storage: Arc<dyn SessionStorage>) -> Self {
        let (state, _rx) = watch::channel(Session::default());
        Self {
            api,
            storage,
            state,
            notices: Notifier::default(),
            login_flight: Mutex::new(None),
            mutation: tokio::sync::Mutex::new(()),
        }
    }

    pub fn into_handle(self) -> SessionHandle {
        Arc::new(self)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Guard a protected view against the current state.
    pub fn access(&self, allowed: &[Role]) -> ViewAccess {
        self.state.borrow().access(allowed)
    }

    pub fn dashboard(&self) -> Option<Dashboard> {
        self.state
            .borrow()
            .verified_user()
            .map(|user| Dashboard::for_role(user.role))
    }

    /// School the current user is working in.
    ///
    /// Super-admins work in whichever school they selected; everyone else is
    /// bound to the school on their user record.
    pub fn active_school(&self) -> Option<SchoolId> {
        let session = self.state.borrow();
        let user = session.verified_user()?;
        if user.role.is_school_scoped() {
            user.school_id().cloned()
        } else {
            session.selected_school().map(|school| school.id.clone())
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Restore the persisted session and confirm it with the backend.
    ///
    /// Returns once the session has left the resolving phase.
    pub async fn start(&self) -> Session {
        let persisted = PersistedSession::load(self.storage.as_ref()).await;
        let has_token = persisted.token.is_some();

        if !has_token && (persisted.user.is_some() || persisted.selected_school.is_some()) {
            tracing::warn!("discarding persisted session data without a token");
            self.wipe_storage().await;
        }

        self.dispatch(SessionAction::Hydrated {
            token: persisted.token,
            user: persisted.user,
            selected_school: persisted.selected_school,
        });

        if has_token {
            tracing::info!("stored session found, resolving current user");
            self.load_user().await;
        } else {
            tracing::info!("no stored session");
        }

        self.snapshot()
    }

    /// Fetch the current user for the held token.
    ///
    /// Any failure ends the session: an unconfirmed token is never trusted.
    pub async fn load_user(&self) {
        // Nothing to resolve; a login in flight owns `loading`.
        let Some(token) = self.current_token() else {
            return;
        };

        self.dispatch(SessionAction::RequestStarted);
        let result = self.api.current_user(&token).await;

        let _guard = self.mutation.lock().await;
        match result {
            Ok(user) => {
                let (user_id, role) = (user.id.clone(), user.role);
                let other_user = self
                    .state
                    .borrow()
                    .user()
                    .is_some_and(|current| current.id != user.id);
                let loaded = SessionAction::UserLoaded {
                    token: token.clone(),
                    user: user.clone(),
                };
                if self.dispatch(loaded) {
                    self.persist_json(StorageKey::User, &user).await;
                    if other_user {
                        self.forget(StorageKey::SelectedSchool).await;
                    }
                    tracing::info!(user_id = %user_id, role = %role, "session resolved");
                }
            }
            Err(err) => {
                tracing::warn!("could not resolve current user, ending session: {err}");
                self.invalidate(&token).await;
            }
        }
    }

    /// Cancel in-flight work. The state is left as it is.
    pub fn shutdown(&self) {
        if self.cancel_login() {
            self.dispatch(SessionAction::RequestFinished);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Sign in with an email or username.
    ///
    /// A login started while another is in flight cancels the earlier one,
    /// which then returns [`SessionError::Cancelled`].
    pub async fn login(&self, identifier: &str, password: &str) -> Result<SessionUser, SessionError> {
        let credentials = match Credentials::new(identifier, password) {
            Ok(credentials) => credentials,
            Err(err) => {
                let message = domain_message(&err);
                self.dispatch(SessionAction::LoginFailed {
                    message: message.clone(),
                });
                self.notices.error(message);
                return Err(err.into());
            }
        };

        let flight = self.begin_login();
        self.dispatch(SessionAction::RequestStarted);
        tracing::debug!(identifier = credentials.identifier(), "login requested");

        let result = tokio::select! {
            biased;
            _ = flight.notified() => {
                tracing::info!(identifier = credentials.identifier(), "login superseded");
                return Err(SessionError::Cancelled);
            }
            result = self.api.login(&credentials) => result,
        };

        let _guard = self.mutation.lock().await;
        if !self.finish_login(&flight) {
            tracing::info!(identifier = credentials.identifier(), "discarding superseded login result");
            return Err(SessionError::Cancelled);
        }

        match result {
            Ok(LoginResponse { user, token }) => {
                let same_user = self
                    .state
                    .borrow()
                    .user()
                    .is_some_and(|current| current.id == user.id);

                self.persist_raw(StorageKey::Token, &token).await;
                self.persist_json(StorageKey::User, &user).await;
                if !same_user {
                    self.forget(StorageKey::SelectedSchool).await;
                }
                self.dispatch(SessionAction::LoginSucceeded {
                    user: user.clone(),
                    token,
                });

                tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
                self.notices.success("Login successful");
                Ok(user)
            }
            Err(err) => {
                let message = err.server_message().unwrap_or(LOGIN_FAILED).to_string();
                tracing::warn!(identifier = credentials.identifier(), "login failed: {err}");
                self.dispatch(SessionAction::LoginFailed {
                    message: message.clone(),
                });
                self.notices.error(message.clone());
                Err(SessionError::Credentials(message))
            }
        }
    }

    /// End the session locally. Safe to call at any time, any number of times.
    pub async fn logout(&self) {
        self.cancel_login();

        let _guard = self.mutation.lock().await;
        let was_signed_in = self.state.borrow().token().is_some();
        self.dispatch(SessionAction::LoggedOut);
        self.wipe_storage().await;

        if was_signed_in {
            tracing::info!("logged out");
            self.notices.info("Logged out successfully");
        }
    }

    /// Shallow-merge `patch` into the signed-in user and persist the result.
    ///
    /// Returns `Ok(None)` when nobody is signed in.
    pub async fn update_user(&self, patch: &UserPatch) -> Result<Option<SessionUser>, SessionError> {
        let _guard = self.mutation.lock().await;
        self.merge_user(patch).await
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), SessionError> {
        let change = PasswordChange::new(current, new).map_err(|err| self.rejected(err))?;
        let token = self.require_token()?;

        self.dispatch(SessionAction::RequestStarted);
        match self.api.change_password(&token, &change).await {
            Ok(()) => {
                self.dispatch(SessionAction::RequestFinished);
                tracing::info!("password changed");
                self.notices.success("Password changed successfully");
                Ok(())
            }
            Err(err) => Err(self.mutation_failed(&token, err, PASSWORD_CHANGE_FAILED).await),
        }
    }

    /// Send profile changes to the backend and adopt the user it returns.
    pub async fn update_profile(&self, fields: &UserPatch) -> Result<SessionUser, SessionError> {
        if fields.is_empty() {
            return Err(self.rejected(DomainError::validation("no profile fields to update")));
        }
        let token = self.require_token()?;

        self.dispatch(SessionAction::RequestStarted);
        let canonical = match self.api.update_profile(&token, fields).await {
            Ok(user) => user,
            Err(err) => return Err(self.mutation_failed(&token, err, PROFILE_UPDATE_FAILED).await),
        };

        let _guard = self.mutation.lock().await;
        let merged = match UserPatch::try_from(&canonical) {
            Ok(patch) => self.merge_user(&patch).await,
            Err(err) => Err(err.into()),
        };
        self.dispatch(SessionAction::RequestFinished);

        match merged {
            Ok(Some(user)) => {
                tracing::info!(user_id = %user.id, "profile updated");
                self.notices.success("Profile updated successfully");
                Ok(user)
            }
            // Signed out while the request was in flight.
            Ok(None) => Err(SessionError::NotAuthenticated),
            Err(err) => {
                self.notices.error(err.to_string());
                Err(err)
            }
        }
    }

    /// Choose the school a super-admin works in.
    pub async fn select_school(&self, school: SchoolSummary) -> Result<(), SessionError> {
        let _guard = self.mutation.lock().await;
        {
            let session = self.state.borrow();
            let user = session.verified_user().ok_or(SessionError::NotAuthenticated)?;
            authorize(Some(user), Permission::SchoolsManage)?;
        }

        if self.dispatch(SessionAction::SchoolSelected(school.clone())) {
            self.persist_json(StorageKey::SelectedSchool, &school).await;
            tracing::info!(school_id = %school.id, "school selected");
        }
        Ok(())
    }

    pub fn clear_error(&self) {
        self.dispatch(SessionAction::ErrorCleared);
    }

    /// Report that the backend answered 401 to a request made with the
    /// current token. Ends the session; returns whether it did.
    pub async fn report_unauthorized(&self) -> bool {
        match self.current_token() {
            Some(token) => self.expire(&token).await,
            None => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn dispatch(&self, action: SessionAction) -> bool {
        let applied = self.state.send_if_modified(|session| session.apply(&action));
        tracing::debug!(action = action.name(), applied, "session action");
        applied
    }

    fn current_token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    /// Token of a confirmed session, or `NotAuthenticated`.
    fn require_token(&self) -> Result<String, SessionError> {
        let session = self.state.borrow();
        match (session.verified_user(), session.token()) {
            (Some(_), Some(token)) => Ok(token.to_string()),
            _ => Err(SessionError::NotAuthenticated),
        }
    }

    /// Caller must hold the mutation lock.
    async fn merge_user(&self, patch: &UserPatch) -> Result<Option<SessionUser>, SessionError> {
        let mut outcome: Result<Option<SessionUser>, DomainError> = Ok(None);
        self.state.send_if_modified(|session| {
            let Some(current) = session.verified_user() else {
                return false;
            };
            match current.merged(patch) {
                Ok(merged) => {
                    let applied = session.apply(&SessionAction::UserUpdated(merged.clone()));
                    if applied {
                        outcome = Ok(Some(merged));
                    }
                    applied
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });

        let merged = outcome?;
        if let Some(user) = &merged {
            self.persist_json(StorageKey::User, user).await;
        }
        Ok(merged)
    }

    /// Map a failed password/profile request to the caller's error.
    async fn mutation_failed(&self, token: &str, err: ApiError, fallback: &str) -> SessionError {
        if err.is_unauthorized() {
            self.expire(token).await;
            return SessionError::SessionExpired;
        }

        let message = err.server_message().unwrap_or(fallback).to_string();
        tracing::warn!("session mutation failed: {err}");
        self.dispatch(SessionAction::RequestFailed {
            message: message.clone(),
        });
        self.notices.error(message.clone());
        SessionError::Mutation(message)
    }

    fn rejected(&self, err: DomainError) -> SessionError {
        self.notices.error(domain_message(&err));
        err.into()
    }

    async fn expire(&self, token: &str) -> bool {
        let _guard = self.mutation.lock().await;
        let ended = self.invalidate(token).await;
        if ended {
            tracing::warn!("backend rejected the session token, signing out");
            self.notices.error(SESSION_EXPIRED);
        }
        ended
    }

    /// Caller must hold the mutation lock.
    async fn invalidate(&self, token: &str) -> bool {
        let ended = self.dispatch(SessionAction::Invalidated {
            token: token.to_string(),
        });
        if ended {
            self.wipe_storage().await;
        }
        ended
    }

    fn lock_flight(&self) -> MutexGuard<'_, Option<Arc<Notify>>> {
        self.login_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_login(&self) -> Arc<Notify> {
        let flight = Arc::new(Notify::new());
        let previous = self.lock_flight().replace(flight.clone());
        if let Some(previous) = previous {
            previous.notify_one();
        }
        flight
    }

    /// Clear `flight` if it is still the current login. `false` means it was
    /// superseded.
    fn finish_login(&self, flight: &Arc<Notify>) -> bool {
        let mut slot = self.lock_flight();
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, flight)) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn cancel_login(&self) -> bool {
        let previous = self.lock_flight().take();
        match previous {
            Some(flight) => {
                flight.notify_one();
                true
            }
            None => false,
        }
    }

    // Storage failures are logged; the in-memory session stays authoritative.

    async fn persist_raw(&self, key: StorageKey, value: &str) {
        if let Err(err) = self.storage.set(key, value).await {
            tracing::error!("failed to persist '{}': {err:?}", key.as_str());
        }
    }

    async fn persist_json<T>(&self, key: StorageKey, value: &T)
    where
        T: Serialize + Sync,
    {
        match serde_json::to_string(value) {
            Ok(raw) => self.persist_raw(key, &raw).await,
            Err(err) => tracing::error!("failed to encode '{}': {err}", key.as_str()),
        }
    }

    async fn forget(&self, key: StorageKey) {
        if let Err(err) = self.storage.remove(key).await {
            tracing::error!("failed to remove '{}': {err:?}", key.as_str());
        }
    }

    async fn wipe_storage(&self) {
        if let Err(err) = self.storage.clear().await {
            tracing::error!("failed to clear session storage: {err:?}");
        }
    }
}

/// The user-facing part of a domain error.
fn domain_message(err: &DomainError) -> String {
    match err {
        DomainError::Validation(message)
        | DomainError::InvariantViolation(message)
        | DomainError::InvalidId(message) => message.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
