use uuid::Uuid;

use crate::validation::{Location, RequestShape, Validator};

#[derive(Debug)]
pub struct EntryIdParams {
    pub id: Uuid,
}

impl RequestShape for EntryIdParams {
    fn check(v: &mut Validator) -> Option<Self> {
        Some(Self {
            id: v.uuid(Location::Params, "id")?,
        })
    }
}

#[derive(Debug)]
pub struct CreateEntryRequest {
    pub content: String,
    pub user_id: Uuid,
}

impl RequestShape for CreateEntryRequest {
    fn check(v: &mut Validator) -> Option<Self> {
        let content = v.string(Location::Body, "content", 1);
        let user_id = v.uuid(Location::Body, "userId");
        Some(Self {
            content: content?,
            user_id: user_id?,
        })
    }
}

#[derive(Debug)]
pub struct UpdateEntryRequest {
    pub id: Uuid,
    pub content: String,
}

impl RequestShape for UpdateEntryRequest {
    fn check(v: &mut Validator) -> Option<Self> {
        let id = v.uuid(Location::Params, "id");
        let content = v.string(Location::Body, "content", 1);
        Some(Self {
            id: id?,
            content: content?,
        })
    }
}
