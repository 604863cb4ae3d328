use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    guard::ensure_exists,
    state::AppState,
    storage::EntityKind,
    users::{
        dto::{CreateUserRequest, CreatedUserResponse, UpdateUserRequest, UserIdParams},
        repo_types::{NewUser, User, UserChanges, UserDetail, UserSummary},
    },
    validation::Valid,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = state.store.list_users().await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Valid(UserIdParams { id }): Valid<UserIdParams>,
) -> ApiResult<Json<UserDetail>> {
    ensure_exists(&*state.store, EntityKind::User, id).await?;

    // Gone between the guard and this read: same 404.
    let user = state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found(EntityKind::User))?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Valid(payload): Valid<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<CreatedUserResponse>)> {
    if state.store.find_user_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already exists"));
    }

    let id = Uuid::new_v4();
    let user = state
        .store
        .create_user(NewUser {
            id,
            email: payload.email,
            full_name: payload.full_name,
            thumbnail_url: payload.thumbnail_url,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok((StatusCode::CREATED, Json(CreatedUserResponse { id: user.id })))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Valid(payload): Valid<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    ensure_exists(&*state.store, EntityKind::User, payload.id).await?;

    let updated = state
        .store
        .update_user(
            payload.id,
            UserChanges {
                full_name: payload.full_name,
                thumbnail_url: payload.thumbnail_url,
            },
        )
        .await?;
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Valid(UserIdParams { id }): Valid<UserIdParams>,
) -> ApiResult<StatusCode> {
    ensure_exists(&*state.store, EntityKind::User, id).await?;
    state.store.delete_user(id).await?;
    info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        response::Response,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use async_trait::async_trait;

    use crate::{
        app::build_app,
        config::{AppConfig, OperatingMode},
        error::REDACTED_DETAIL,
        guestbook::repo_types::{Entry, EntryListItem, EntryWithUser, NewEntry},
        storage::{memory::InMemoryStore, GuestbookStore, StoreError, StoreResult},
        state::AppState,
    };

    use super::*;

    struct Harness {
        store: Arc<InMemoryStore>,
        state: AppState,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let state = AppState::from_parts(
                Arc::new(AppConfig::for_tests(OperatingMode::Development)),
                store.clone() as Arc<dyn GuestbookStore>,
            );
            Self { store, state }
        }

        async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> Response {
            let mut req = Request::builder().method(method).uri(uri);
            let body = match body {
                Some(v) => {
                    req = req.header("content-type", "application/json");
                    Body::from(v.to_string())
                }
                None => Body::empty(),
            };
            build_app(self.state.clone())
                .oneshot(req.body(body).unwrap())
                .await
                .unwrap()
        }

        async fn create(&self, name: &str, email: &str) -> Uuid {
            let res = self
                .send("POST", "/users", Some(json!({ "fullName": name, "email": email })))
                .await;
            assert_eq!(res.status(), StatusCode::CREATED);
            let body = json_body(res).await;
            body["id"].as_str().unwrap().parse().unwrap()
        }
    }

    async fn json_body(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_then_fetch_round_trips() {
        let h = Harness::new();
        let res = h
            .send(
                "POST",
                "/users",
                Some(json!({
                    "fullName": "Ada",
                    "email": "ada@example.com",
                    "thumbnailUrl": "https://img.example.com/ada.png"
                })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let id = json_body(res).await["id"].as_str().unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok());

        let res = h.send("GET", &format!("/users/{id}"), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["id"], id.as_str());
        assert_eq!(body["fullName"], "Ada");
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["thumbnailUrl"], "https://img.example.com/ada.png");
        assert_eq!(body["entries"], json!([]));
        assert!(body["createdAt"].is_string());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let h = Harness::new();
        h.create("Ada", "ada@example.com").await;

        let res = h
            .send("POST", "/users", Some(json!({ "fullName": "Other", "email": "ada@example.com" })))
            .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(res).await, json!({ "message": "Email already exists" }));
        assert_eq!(h.store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_id_never_reaches_storage() {
        let h = Harness::new();
        for (method, body) in [
            ("GET", None),
            ("PUT", Some(json!({ "fullName": "x" }))),
            ("DELETE", None),
        ] {
            let res = h.send(method, "/users/not-a-uuid", body).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{method}");
            let body = json_body(res).await;
            assert_eq!(body["issues"][0]["field"], "id");
            assert_eq!(body["issues"][0]["code"], "invalid_uuid");
        }
        assert_eq!(h.store.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_create_reports_all_fields() {
        let h = Harness::new();
        let res = h
            .send(
                "POST",
                "/users",
                Some(json!({ "email": "nope", "thumbnailUrl": "not a url" })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        let fields: Vec<&str> = body["issues"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["fullName", "email", "thumbnailUrl"]);
        assert_eq!(h.store.calls(), 0);
    }

    #[tokio::test]
    async fn client_supplied_id_is_ignored() {
        let h = Harness::new();
        let forced = Uuid::new_v4();
        let res = h
            .send(
                "POST",
                "/users",
                Some(json!({ "id": forced, "fullName": "Ada", "email": "ada@example.com" })),
            )
            .await;
        let id = json_body(res).await["id"].as_str().unwrap().to_string();
        assert_ne!(id, forced.to_string());
    }

    #[tokio::test]
    async fn missing_user_is_404_for_every_single_user_route() {
        let h = Harness::new();
        h.create("Ada", "ada@example.com").await;
        let before = h.store.list_users().await.unwrap();
        let ghost = Uuid::new_v4();

        for (method, body) in [
            ("GET", None),
            ("PUT", Some(json!({ "fullName": "x" }))),
            ("DELETE", None),
        ] {
            let res = h.send(method, &format!("/users/{ghost}"), body).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{method}");
            assert_eq!(json_body(res).await, json!({ "message": "User does not exists" }));
        }
        assert_eq!(h.store.list_users().await.unwrap(), before);
    }

    #[tokio::test]
    async fn update_replaces_all_mutable_fields() {
        let h = Harness::new();
        let res = h
            .send(
                "POST",
                "/users",
                Some(json!({
                    "fullName": "Ada",
                    "email": "ada@example.com",
                    "thumbnailUrl": "https://img.example.com/a.png"
                })),
            )
            .await;
        let id = json_body(res).await["id"].as_str().unwrap().to_string();

        let res = h
            .send("PUT", &format!("/users/{id}"), Some(json!({ "fullName": "Ada L." })))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["fullName"], "Ada L.");
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["thumbnailUrl"], Value::Null);
    }

    #[tokio::test]
    async fn delete_returns_no_content_and_removes_user() {
        let h = Harness::new();
        let id = h.create("Ada", "ada@example.com").await;

        let res = h.send("DELETE", &format!("/users/{id}"), None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());

        let res = h.send("GET", &format!("/users/{id}"), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_is_ordered_by_entry_count() {
        let h = Harness::new();
        let quiet = h.create("Quiet", "quiet@example.com").await;
        let chatty = h.create("Chatty", "chatty@example.com").await;
        let medium = h.create("Medium", "medium@example.com").await;

        for (user, n) in [(chatty, 3), (medium, 1)] {
            for i in 0..n {
                let res = h
                    .send(
                        "POST",
                        "/guestbook/entry",
                        Some(json!({ "content": format!("hello {i}"), "userId": user })),
                    )
                    .await;
                assert_eq!(res.status(), StatusCode::OK);
            }
        }

        let res = h.send("GET", "/users", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        let rows = body.as_array().unwrap();
        let order: Vec<(String, i64)> = rows
            .iter()
            .map(|u| {
                (
                    u["id"].as_str().unwrap().to_string(),
                    u["entries"].as_i64().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![
                (chatty.to_string(), 3),
                (medium.to_string(), 1),
                (quiet.to_string(), 0),
            ]
        );
        let first = &rows[0];
        for key in ["id", "createdAt", "email", "fullName", "entries", "thumbnailUrl"] {
            assert!(first.get(key).is_some(), "missing {key}");
        }
    }

    struct DownStore;

    fn down<T>() -> StoreResult<T> {
        Err(StoreError::Backend(anyhow::anyhow!("db down")))
    }

    #[async_trait]
    impl GuestbookStore for DownStore {
        async fn exists(&self, _: EntityKind, _: Uuid) -> StoreResult<bool> {
            down()
        }
        async fn list_users(&self) -> StoreResult<Vec<UserSummary>> {
            down()
        }
        async fn find_user(&self, _: Uuid) -> StoreResult<Option<UserDetail>> {
            down()
        }
        async fn find_user_by_email(&self, _: &str) -> StoreResult<Option<User>> {
            down()
        }
        async fn create_user(&self, _: NewUser) -> StoreResult<User> {
            down()
        }
        async fn update_user(&self, _: Uuid, _: UserChanges) -> StoreResult<User> {
            down()
        }
        async fn delete_user(&self, _: Uuid) -> StoreResult<()> {
            down()
        }
        async fn list_entries(&self) -> StoreResult<Vec<EntryListItem>> {
            down()
        }
        async fn find_entry(&self, _: Uuid) -> StoreResult<Option<EntryWithUser>> {
            down()
        }
        async fn create_entry(&self, _: NewEntry) -> StoreResult<Entry> {
            down()
        }
        async fn update_entry(&self, _: Uuid, _: String) -> StoreResult<Entry> {
            down()
        }
        async fn delete_entry(&self, _: Uuid) -> StoreResult<()> {
            down()
        }
    }

    #[tokio::test]
    async fn storage_faults_are_opaque_500s_in_production() {
        let state = AppState::from_parts(
            Arc::new(AppConfig::for_tests(OperatingMode::Production)),
            Arc::new(DownStore) as Arc<dyn GuestbookStore>,
        );

        for (method, uri) in [
            ("GET", "/users".to_string()),
            ("DELETE", format!("/users/{}", Uuid::new_v4())),
        ] {
            let res = build_app(state.clone())
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(&uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR, "{method} {uri}");
            assert_eq!(
                json_body(res).await,
                json!({ "errorMessage": "db down", "stack": REDACTED_DETAIL })
            );
        }
    }
}
