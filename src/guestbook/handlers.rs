use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    guard::ensure_exists,
    guestbook::{
        dto::{CreateEntryRequest, EntryIdParams, UpdateEntryRequest},
        repo_types::{Entry, EntryListItem, EntryWithUser, NewEntry},
    },
    state::AppState,
    storage::EntityKind,
    validation::Valid,
};

pub fn guestbook_routes() -> Router<AppState> {
    Router::new()
        .route("/guestbook", get(list_entries))
        .route("/guestbook/entries/:id", get(get_entry))
        .route("/guestbook/entry", post(create_entry))
        .route("/guestbook/entry/:id", put(update_entry).delete(delete_entry))
}

#[instrument(skip(state))]
pub async fn list_entries(State(state): State<AppState>) -> ApiResult<Json<Vec<EntryListItem>>> {
    let entries = state.store.list_entries().await?;
    Ok(Json(entries))
}

#[instrument(skip(state))]
pub async fn get_entry(
    State(state): State<AppState>,
    Valid(EntryIdParams { id }): Valid<EntryIdParams>,
) -> ApiResult<Json<EntryWithUser>> {
    let entry = state
        .store
        .find_entry(id)
        .await?
        .ok_or_else(|| ApiError::not_found(EntityKind::Entry))?;
    Ok(Json(entry))
}

#[instrument(skip(state, payload))]
pub async fn create_entry(
    State(state): State<AppState>,
    Valid(payload): Valid<CreateEntryRequest>,
) -> ApiResult<Json<Entry>> {
    ensure_exists(&*state.store, EntityKind::User, payload.user_id).await?;

    let entry = state
        .store
        .create_entry(NewEntry {
            id: Uuid::new_v4(),
            content: payload.content,
            user_id: payload.user_id,
        })
        .await?;

    info!(entry_id = %entry.id, user_id = %entry.user_id, "entry created");
    Ok(Json(entry))
}

#[instrument(skip(state, payload))]
pub async fn update_entry(
    State(state): State<AppState>,
    Valid(payload): Valid<UpdateEntryRequest>,
) -> ApiResult<Json<Entry>> {
    ensure_exists(&*state.store, EntityKind::Entry, payload.id).await?;
    let updated = state
        .store
        .update_entry(payload.id, payload.content)
        .await?;
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_entry(
    State(state): State<AppState>,
    Valid(EntryIdParams { id }): Valid<EntryIdParams>,
) -> ApiResult<StatusCode> {
    ensure_exists(&*state.store, EntityKind::Entry, id).await?;
    state.store.delete_entry(id).await?;
    info!(entry_id = %id, "entry deleted");
    Ok(StatusCode::NO_CONTENT)
}
