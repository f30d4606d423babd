use std::sync::Arc;

use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
    protocol::{ClientRequest, PointsSnapshot, ServerEvent},
};
use storage::Storage;

mod registry;
mod session;

pub use registry::{SessionRegistry, SharedSession};
pub use session::{AddOutcome, PointSession};

const MAX_USERNAME_BYTES: usize = 64;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub sessions: SessionRegistry,
}

impl ApiContext {
    pub fn new(storage: Storage, event_buffer: usize) -> Self {
        let sessions = SessionRegistry::new(Arc::new(storage.clone()), event_buffer);
        Self { storage, sessions }
    }
}

/// Resolves `username` to a user, creating it on first sight.
pub async fn login(ctx: &ApiContext, username: &str) -> Result<UserId, ApiError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "username is required"));
    }
    if username.len() > MAX_USERNAME_BYTES {
        return Err(ApiError::new(ErrorCode::Validation, "username is too long"));
    }
    ctx.storage.create_user(username).await.map_err(internal)
}

pub async fn ensure_user(ctx: &ApiContext, user_id: UserId) -> Result<(), ApiError> {
    ctx.storage
        .username_for_user(user_id)
        .await
        .map_err(internal)?
        .map(|_| ())
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "unknown user"))
}

pub async fn points_snapshot(
    ctx: &ApiContext,
    user_id: UserId,
) -> Result<PointsSnapshot, ApiError> {
    ensure_user(ctx, user_id).await?;
    let session = ctx.sessions.open(user_id).await?;
    let guard = session.lock().await;
    Ok(guard.snapshot())
}

pub async fn dispatch(
    ctx: &ApiContext,
    user_id: UserId,
    request: ClientRequest,
) -> Result<Vec<ServerEvent>, ApiError> {
    ensure_user(ctx, user_id).await?;
    let session = ctx.sessions.open(user_id).await?;
    let mut guard = session.lock().await;
    guard.handle(request).await
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod session_tests;
