//! Role dispatch and view guards.
//!
//! - No IO
//! - No panics
//! - Every decision matches on [`Role`] exhaustively

use serde::Serialize;
use thiserror::Error;

use crate::{Permission, Role, SessionUser};

/// The dashboard a role lands on after sign-in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dashboard {
    SuperAdmin,
    Admin,
    Teacher,
    Student,
}

impl Dashboard {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::SuperAdmin => Dashboard::SuperAdmin,
            Role::Admin => Dashboard::Admin,
            Role::Teacher => Dashboard::Teacher,
            Role::Student => Dashboard::Student,
        }
    }

    /// Route of the dashboard's landing page.
    pub fn home_route(&self) -> &'static str {
        match self {
            Dashboard::SuperAdmin => "/superadmin/dashboard",
            Dashboard::Admin => "/admin/dashboard",
            Dashboard::Teacher => "/teacher/dashboard",
            Dashboard::Student => "/student/dashboard",
        }
    }
}

/// Route used when a view requires a signed-in user and there is none.
pub const LOGIN_ROUTE: &str = "/login";

/// Outcome of guarding a protected view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewAccess {
    /// The session is still resolving; render a placeholder, not the view.
    Pending,
    Granted { dashboard: Dashboard },
    RedirectToLogin,
    /// Signed in, but the role may not see this view.
    Forbidden { home: Dashboard },
}

impl ViewAccess {
    pub fn is_granted(&self) -> bool {
        matches!(self, ViewAccess::Granted { .. })
    }

    /// Route to navigate to instead of rendering, if any.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            ViewAccess::Pending | ViewAccess::Granted { .. } => None,
            ViewAccess::RedirectToLogin => Some(LOGIN_ROUTE),
            ViewAccess::Forbidden { home } => Some(home.home_route()),
        }
    }
}

/// Guard a protected view.
///
/// `allowed` lists the roles that may see the view; an empty list admits any
/// signed-in user. While `resolving` is true and no user is known yet the
/// decision is deferred, so a stored-but-unverified token never grants access.
pub fn authorize_view(user: Option<&SessionUser>, resolving: bool, allowed: &[Role]) -> ViewAccess {
    match user {
        None if resolving => ViewAccess::Pending,
        None => ViewAccess::RedirectToLogin,
        Some(user) => {
            let dashboard = Dashboard::for_role(user.role);
            if allowed.is_empty() || allowed.contains(&user.role) {
                ViewAccess::Granted { dashboard }
            } else {
                ViewAccess::Forbidden { home: dashboard }
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden { role: Role, permission: Permission },
}

/// Check a single permission for the signed-in user.
pub fn authorize(user: Option<&SessionUser>, required: Permission) -> Result<(), AuthzError> {
    let user = user.ok_or(AuthzError::Unauthenticated)?;
    if Permission::granted_to(user.role).contains(&required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            role: user.role,
            permission: required,
        })
    }
}
