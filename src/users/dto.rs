use serde::Serialize;
use uuid::Uuid;

use crate::validation::{Location, RequestShape, Validator};

/// `:id` path parameter shared by the single-user routes.
#[derive(Debug)]
pub struct UserIdParams {
    pub id: Uuid,
}

impl RequestShape for UserIdParams {
    fn check(v: &mut Validator) -> Option<Self> {
        Some(Self {
            id: v.uuid(Location::Params, "id")?,
        })
    }
}

#[derive(Debug)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub email: String,
    pub thumbnail_url: Option<String>,
}

impl RequestShape for CreateUserRequest {
    fn check(v: &mut Validator) -> Option<Self> {
        let full_name = v.string(Location::Body, "fullName", 0);
        let email = v.email(Location::Body, "email");
        let thumbnail_url = v.optional_url(Location::Body, "thumbnailUrl");
        Some(Self {
            full_name: full_name?,
            email: email?,
            thumbnail_url: thumbnail_url?,
        })
    }
}

#[derive(Debug)]
pub struct UpdateUserRequest {
    pub id: Uuid,
    pub full_name: String,
    pub thumbnail_url: Option<String>,
}

impl RequestShape for UpdateUserRequest {
    fn check(v: &mut Validator) -> Option<Self> {
        let id = v.uuid(Location::Params, "id");
        let full_name = v.string(Location::Body, "fullName", 0);
        let thumbnail_url = v.optional_url(Location::Body, "thumbnailUrl");
        Some(Self {
            id: id?,
            full_name: full_name?,
            thumbnail_url: thumbnail_url?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedUserResponse {
    pub id: Uuid,
}
