//! `schoolerp-auth`: pure authentication/authorization model.
//!
//! No HTTP, no storage: this crate describes who the signed-in user is and
//! what each role may reach.

pub mod authorize;
pub mod credentials;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, Dashboard, LOGIN_ROUTE, ViewAccess, authorize, authorize_view};
pub use credentials::{Credentials, PasswordChange};
pub use permissions::Permission;
pub use roles::Role;
pub use user::{SchoolRef, SchoolSummary, SessionUser, UserPatch};
