//! Ambient access to the session store.
//!
//! An app runs its views inside [`scope`]; any code on that task can then
//! reach the store with [`use_session`] instead of threading a handle
//! through every call.

use std::future::Future;

use crate::store::SessionHandle;

tokio::task_local! {
    static CURRENT: SessionHandle;
}

/// Run `fut` with `handle` as the ambient session store.
pub async fn scope<F>(handle: SessionHandle, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(handle, fut).await
}

/// The ambient session store.
///
/// # Panics
/// When called outside [`scope`]. That is a wiring bug in the app, not a
/// runtime condition; use [`try_use_session`] to check first.
pub fn use_session() -> SessionHandle {
    match try_use_session() {
        Some(handle) => handle,
        None => panic!("use_session called outside of a session scope"),
    }
}

pub fn try_use_session() -> Option<SessionHandle> {
    CURRENT.try_with(SessionHandle::clone).ok()
}
