//! `schoolerp-session`: the client-side authentication session.
//!
//! [`SessionStore`] owns who is signed in. It talks to the backend through
//! [`AuthApi`], persists identity through [`SessionStorage`], and publishes
//! [`Session`] snapshots to any number of views.

pub mod api;
pub mod config;
pub mod notice;
pub mod scope;
pub mod session;
pub mod sqlite;
pub mod storage;
pub mod store;

pub use api::{ApiError, AuthApi, HttpAuthApi, LoginResponse};
pub use config::{ConfigError, SessionConfig, StorageBackend};
pub use notice::{Notice, NoticeLevel, Notifier};
pub use scope::{scope, try_use_session, use_session};
pub use session::{Session, SessionAction, SessionPhase};
pub use sqlite::{SqliteStorage, default_storage_path};
pub use storage::{MemoryStorage, PersistedSession, SessionStorage, StorageKey};
pub use store::{SessionError, SessionHandle, SessionStore};
