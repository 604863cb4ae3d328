use tracing::warn;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::storage::{EntityKind, GuestbookStore};

/// Short-circuits with the kind's 404 unless the resource exists.
pub async fn ensure_exists(store: &dyn GuestbookStore, kind: EntityKind, id: Uuid) -> ApiResult<()> {
    if store.exists(kind, id).await? {
        Ok(())
    } else {
        warn!(?kind, %id, "resource not found");
        Err(ApiError::not_found(kind))
    }
}
